//! Scriptable agents shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;

use crate::agent::{Agent, AgentCore, ToolBox};
use crate::error::OrchestrationError;
use crate::models::{
    action_of, AgentContext, AgentResult, CoordinationContext, CoordinationResult, Parameters,
    TransferResult,
};

#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    Succeed,
    Fail(String),
    Panic,
    Sleep(Duration),
    /// Fail the first `n` calls, then succeed.
    FailTimes(usize),
}

pub(crate) struct ScriptedAgent {
    core: AgentCore,
    behavior: Behavior,
    calls: AtomicUsize,
    seen: Mutex<Vec<(AgentContext, Parameters)>>,
    inits: AtomicUsize,
    cleanups: AtomicUsize,
    fail_init: bool,
    fail_cleanup: bool,
    reject_transfer: bool,
    fail_coordination: bool,
}

impl ScriptedAgent {
    pub fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            core: AgentCore::new(name).with_capabilities(["run", "echo"]),
            behavior,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            inits: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
            fail_init: false,
            fail_cleanup: false,
            reject_transfer: false,
            fail_coordination: false,
        }
    }

    pub fn ok(name: &str) -> Self {
        Self::new(name, Behavior::Succeed)
    }

    pub fn failing(name: &str, msg: &str) -> Self {
        Self::new(name, Behavior::Fail(msg.to_string()))
    }

    pub fn with_failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn with_failing_cleanup(mut self) -> Self {
        self.fail_cleanup = true;
        self
    }

    pub fn rejecting_transfers(mut self) -> Self {
        self.reject_transfer = true;
        self
    }

    pub fn with_failing_coordination(mut self) -> Self {
        self.fail_coordination = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(AgentContext, Parameters)> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    async fn run(&self, call: usize, parameters: &Parameters) -> Result<serde_json::Value, OrchestrationError> {
        match action_of(parameters).unwrap_or("run") {
            "run" | "echo" => {}
            other => return Err(OrchestrationError::UnknownAction(other.to_string())),
        }
        match &self.behavior {
            Behavior::Succeed => {}
            Behavior::Fail(msg) => return Err(OrchestrationError::execution(msg.clone())),
            Behavior::Panic => panic!("scripted panic in {}", self.core.name()),
            Behavior::Sleep(d) => tokio::time::sleep(*d).await,
            Behavior::FailTimes(n) => {
                if call <= *n {
                    return Err(OrchestrationError::execution(format!("attempt {} failed", call)));
                }
            }
        }
        Ok(json!({
            "agent": self.core.name(),
            "call": call,
            "parameters": parameters,
        }))
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn id(&self) -> &str {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn capabilities(&self) -> Vec<String> {
        self.core.capabilities().to_vec()
    }

    fn tools(&self) -> Option<&ToolBox> {
        Some(self.core.tools())
    }

    async fn initialize(&self) -> Result<(), OrchestrationError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        if self.fail_init {
            return Err(OrchestrationError::Initialization(format!(
                "{} is missing its tools",
                self.core.name()
            )));
        }
        self.core.initialize().await
    }

    async fn execute(&self, context: &AgentContext, parameters: &Parameters) -> AgentResult {
        let started = Instant::now();
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((context.clone(), parameters.clone()));
        }
        let outcome = self.run(call, parameters).await;
        self.core.finish(started, outcome)
    }

    async fn cleanup(&self) -> Result<(), OrchestrationError> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        if self.fail_cleanup {
            return Err(OrchestrationError::execution(format!(
                "{} could not release resources",
                self.core.name()
            )));
        }
        Ok(())
    }

    async fn transfer_to_agent(&self, target_domain: &str, context: &AgentContext) -> TransferResult {
        if self.reject_transfer {
            return TransferResult::rejected(target_domain, context.clone(), "handoff refused");
        }
        TransferResult::ready(
            target_domain,
            context.with_metadata("transferredFrom", self.core.id()),
        )
    }

    async fn coordinate_with_other_domains(
        &self,
        domains: &[String],
        _coordination: &CoordinationContext,
    ) -> Result<CoordinationResult, OrchestrationError> {
        if self.fail_coordination {
            return Err(OrchestrationError::Coordination("peer unreachable".into()));
        }
        let responses = domains
            .iter()
            .map(|d| (d.clone(), json!({ "ack": self.core.name() })))
            .collect();
        Ok(CoordinationResult::from_parts(responses, Vec::new()))
    }
}
