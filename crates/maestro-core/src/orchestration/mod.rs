//! Orchestrator — domain registry, multi-agent fan-out, transfer and
//! coordination protocols, and lifecycle shutdown.
//!
//! Every agent call made from here goes through one backstop: a panic inside
//! an agent becomes a failed [`AgentResult`] and, when configured, a call
//! that exceeds `agent_timeout_ms` becomes one too. Nothing an agent does can
//! abort a fan-out, a transfer or a workflow step.

mod invoker;

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::Instrument;

use crate::agent::Agent;
use crate::config::OrchestratorConfig;
use crate::error::{panic_message, OrchestrationError};
use crate::models::{AgentContext, AgentResult, CoordinationContext, CoordinationResult, Parameters};
use crate::workflow::WorkflowRunner;

pub use invoker::OrchestratorInvoker;

// ─── Requests & Results ───────────────────────────────────────────────────

/// A fan-out call: the same context and parameters sent to several domains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationRequest {
    pub request_id: String,
    pub initiator: String,
    pub target_domains: Vec<String>,
    pub context: AgentContext,
    #[serde(default)]
    pub parameters: Parameters,
}

impl OrchestrationRequest {
    pub fn new(
        initiator: impl Into<String>,
        target_domains: Vec<String>,
        context: AgentContext,
        parameters: Parameters,
    ) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            initiator: initiator.into(),
            target_domains,
            context,
            parameters,
        }
    }
}

/// Aggregate of a fan-out. Every requested domain appears in exactly one of
/// `results` or `errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationResult {
    pub request_id: String,
    pub success: bool,
    pub results: BTreeMap<String, AgentResult>,
    pub errors: BTreeMap<String, String>,
    pub duration_ms: u64,
}

/// What `shutdown` did to each agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownReport {
    /// Domains whose cleanup succeeded.
    pub cleaned: Vec<String>,
    /// Domain → cleanup error.
    pub failures: BTreeMap<String, String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ─── Orchestrator Inner State ─────────────────────────────────────────────

#[derive(Default)]
struct OrchestratorInner {
    /// Map: domain → agent
    agents: HashMap<String, Arc<dyn Agent>>,
    /// Map: domain → workflow-capable agent (subset of `agents`)
    workflow_runners: HashMap<String, Arc<dyn WorkflowRunner>>,
}

/// Map: requestId → fan-out in progress
type InFlightTable = Mutex<HashMap<String, OrchestrationRequest>>;

/// Removes a fan-out from the in-flight table when it finishes or is dropped.
struct InFlightGuard<'a> {
    table: &'a InFlightTable,
    request_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.request_id);
    }
}

// ─── Orchestrator ─────────────────────────────────────────────────────────

/// Routes work to agents by domain key.
pub struct Orchestrator {
    inner: RwLock<OrchestratorInner>,
    in_flight: InFlightTable,
    config: OrchestratorConfig,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            inner: RwLock::new(OrchestratorInner::default()),
            in_flight: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // ─── Registry ─────────────────────────────────────────────────────────

    /// Register `agent` under `domain`, replacing any previous registration.
    pub async fn register_agent(&self, domain: impl Into<String>, agent: Arc<dyn Agent>) {
        let domain = domain.into();
        let runner = agent.clone().as_workflow_runner();
        let agent_id = agent.id().to_string();

        let mut inner = self.inner.write().await;
        match runner {
            Some(runner) => {
                inner.workflow_runners.insert(domain.clone(), runner);
            }
            None => {
                inner.workflow_runners.remove(&domain);
            }
        }
        if inner.agents.insert(domain.clone(), agent).is_some() {
            tracing::debug!("[Orchestrator] Replaced agent registration for domain {}", domain);
        }
        tracing::info!(domain = %domain, agent_id = %agent_id, "[Orchestrator] Registered agent");
    }

    pub async fn unregister_agent(&self, domain: &str) -> Option<Arc<dyn Agent>> {
        let mut inner = self.inner.write().await;
        inner.workflow_runners.remove(domain);
        inner.agents.remove(domain)
    }

    pub async fn get_agent(&self, domain: &str) -> Option<Arc<dyn Agent>> {
        self.inner.read().await.agents.get(domain).cloned()
    }

    /// Registered domain keys, sorted.
    pub async fn registered_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.inner.read().await.agents.keys().cloned().collect();
        domains.sort();
        domains
    }

    /// Domains whose agent can run workflows, sorted.
    pub async fn workflow_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .inner
            .read()
            .await
            .workflow_runners
            .keys()
            .cloned()
            .collect();
        domains.sort();
        domains
    }

    /// Request ids of fan-outs currently in progress.
    pub async fn in_flight_requests(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    // ─── Agent calls ──────────────────────────────────────────────────────

    /// Await an agent future under the panic backstop and the optional
    /// agent timeout.
    async fn guarded<T, F>(&self, agent_id: &str, what: &str, call: F) -> Result<T, OrchestrationError>
    where
        F: Future<Output = T>,
    {
        let call = AssertUnwindSafe(call).catch_unwind();
        let outcome = match self.config.agent_timeout() {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(agent_id = %agent_id, "[Orchestrator] {} timed out", what);
                    return Err(OrchestrationError::Timeout {
                        what: format!("Agent {}", agent_id),
                        millis: limit.as_millis() as u64,
                    });
                }
            },
            None => call.await,
        };
        outcome.map_err(|payload: Box<dyn Any + Send>| {
            let msg = panic_message(payload.as_ref());
            tracing::error!(agent_id = %agent_id, panic = %msg, "[Orchestrator] Agent panicked during {}", what);
            OrchestrationError::execution(format!("Agent {} panicked: {}", agent_id, msg))
        })
    }

    async fn call_agent(&self, agent: &Arc<dyn Agent>, context: &AgentContext, parameters: &Parameters) -> AgentResult {
        let started = Instant::now();
        match self
            .guarded(agent.id(), "execute", agent.execute(context, parameters))
            .await
        {
            Ok(result) => result,
            Err(OrchestrationError::Execution(msg)) => {
                AgentResult::failure(agent.id(), msg).with_duration(started)
            }
            Err(e) => AgentResult::failure(agent.id(), e.to_string()).with_duration(started),
        }
    }

    /// Execute a single agent by domain.
    pub async fn execute_agent(&self, domain: &str, context: &AgentContext, parameters: &Parameters) -> AgentResult {
        match self.get_agent(domain).await {
            Some(agent) => self.call_agent(&agent, context, parameters).await,
            None => AgentResult::failure(domain, OrchestrationError::AgentNotFound(domain.to_string()).to_string()),
        }
    }

    // ─── Fan-out ──────────────────────────────────────────────────────────

    /// Send the request to every target domain concurrently.
    ///
    /// Missing domains are reported in `errors` without affecting the other
    /// branches. Success iff `errors` is empty.
    pub async fn orchestrate_agents(&self, request: OrchestrationRequest) -> OrchestrationResult {
        let started = Instant::now();
        let request_id = request.request_id.clone();

        let span = tracing::info_span!(
            "orchestrate",
            request_id = %request_id,
            correlation_id = %request.context.correlation_id,
            initiator = %request.initiator,
        );

        async {
            self.in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(request_id.clone(), request.clone());
            let _in_flight = InFlightGuard {
                table: &self.in_flight,
                request_id: request_id.clone(),
            };

            let targets: Vec<(String, Option<Arc<dyn Agent>>)> = {
                let inner = self.inner.read().await;
                request
                    .target_domains
                    .iter()
                    .map(|d| (d.clone(), inner.agents.get(d).cloned()))
                    .collect()
            };

            let context = &request.context;
            let parameters = &request.parameters;
            let mut errors = BTreeMap::new();
            let mut calls = Vec::new();
            for (domain, agent) in targets {
                match agent {
                    Some(agent) => calls.push(async move {
                        let result = self.call_agent(&agent, context, parameters).await;
                        (domain, result)
                    }),
                    None => {
                        tracing::warn!(domain = %domain, "[Orchestrator] Fan-out target not registered");
                        errors.insert(domain.clone(), OrchestrationError::AgentNotFound(domain).to_string());
                    }
                }
            }

            let results: BTreeMap<String, AgentResult> = join_all(calls).await.into_iter().collect();

            let result = OrchestrationResult {
                request_id: request_id.clone(),
                success: errors.is_empty(),
                results,
                errors,
                duration_ms: started.elapsed().as_millis() as u64,
            };
            tracing::info!(
                results = result.results.len(),
                errors = result.errors.len(),
                duration_ms = result.duration_ms,
                "[Orchestrator] Fan-out complete"
            );
            result
        }
        .instrument(span)
        .await
    }

    // ─── Transfer ─────────────────────────────────────────────────────────

    /// Hand `context` from `from_domain` to `to_domain`, then execute the
    /// target with the transferred context.
    pub async fn transfer_between_agents(
        &self,
        from_domain: &str,
        to_domain: &str,
        context: &AgentContext,
        parameters: &Parameters,
    ) -> AgentResult {
        let started = Instant::now();
        let (source, target) = {
            let inner = self.inner.read().await;
            (inner.agents.get(from_domain).cloned(), inner.agents.get(to_domain).cloned())
        };
        let source = match source {
            Some(agent) => agent,
            None => {
                return AgentResult::failure(
                    from_domain,
                    OrchestrationError::AgentNotFound(from_domain.to_string()).to_string(),
                )
            }
        };
        let target = match target {
            Some(agent) => agent,
            None => {
                return AgentResult::failure(
                    to_domain,
                    OrchestrationError::AgentNotFound(to_domain.to_string()).to_string(),
                )
            }
        };

        let transfer = self
            .guarded(source.id(), "transfer", source.transfer_to_agent(to_domain, context))
            .await;
        let transferred = match transfer {
            Ok(t) if t.success => t.transferred_context,
            Ok(t) => {
                let reason = t.error.unwrap_or_else(|| "transfer rejected".to_string());
                tracing::warn!(from = %from_domain, to = %to_domain, reason = %reason, "[Orchestrator] Transfer failed");
                return AgentResult::failure(source.id(), OrchestrationError::Transfer(reason).to_string())
                    .with_duration(started);
            }
            Err(e) => {
                return AgentResult::failure(source.id(), OrchestrationError::Transfer(e.to_string()).to_string())
                    .with_duration(started);
            }
        };

        tracing::debug!(
            from = %from_domain,
            to = %to_domain,
            correlation_id = %transferred.correlation_id,
            "[Orchestrator] Transfer accepted"
        );
        self.call_agent(&target, &transferred, parameters).await
    }

    // ─── Coordination ─────────────────────────────────────────────────────

    /// Ask each domain to coordinate with its peers. Missing, failing or
    /// panicking domains become conflicts; success iff there are none.
    pub async fn coordinate_multiple_domains(&self, coordination: &CoordinationContext) -> CoordinationResult {
        let targets: Vec<(String, Option<Arc<dyn Agent>>)> = {
            let inner = self.inner.read().await;
            coordination
                .domains
                .iter()
                .map(|d| (d.clone(), inner.agents.get(d).cloned()))
                .collect()
        };

        let mut conflicts = Vec::new();
        let mut calls = Vec::new();
        for (domain, agent) in targets {
            let Some(agent) = agent else {
                conflicts.push(format!(
                    "{}: {}",
                    domain,
                    OrchestrationError::AgentNotFound(domain.clone())
                ));
                continue;
            };
            let peers: Vec<String> = coordination
                .domains
                .iter()
                .filter(|d| **d != domain)
                .cloned()
                .collect();
            calls.push(async move {
                let outcome = self
                    .guarded(
                        agent.id(),
                        "coordination",
                        agent.coordinate_with_other_domains(&peers, coordination),
                    )
                    .await
                    .and_then(|inner| inner);
                (domain, outcome)
            });
        }

        let mut responses = BTreeMap::new();
        for (domain, outcome) in join_all(calls).await {
            match outcome {
                Ok(result) => {
                    responses.insert(domain, serde_json::to_value(&result).unwrap_or_default());
                }
                Err(e) => conflicts.push(format!("{}: {}", domain, e)),
            }
        }

        if !conflicts.is_empty() {
            tracing::warn!(
                initiator = %coordination.initiator,
                conflicts = conflicts.len(),
                "[Orchestrator] Coordination finished with conflicts"
            );
        }
        CoordinationResult::from_parts(responses, conflicts)
    }

    // ─── Workflows ────────────────────────────────────────────────────────

    /// Run `workflow_id` on the workflow agent registered under `domain`.
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        domain: &str,
        context: &AgentContext,
        parameters: &Parameters,
    ) -> AgentResult {
        let started = Instant::now();
        let runner = self.inner.read().await.workflow_runners.get(domain).cloned();
        let Some(runner) = runner else {
            return AgentResult::failure(
                domain,
                OrchestrationError::NoWorkflowAgentForDomain(domain.to_string()).to_string(),
            );
        };

        // Workflows manage their own step timeouts.
        let call = AssertUnwindSafe(runner.run_workflow(workflow_id, context, parameters)).catch_unwind();
        match call.await {
            Ok(result) => result,
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                tracing::error!(domain = %domain, panic = %msg, "[Orchestrator] Workflow runner panicked");
                AgentResult::failure(domain, format!("Agent {} panicked: {}", domain, msg)).with_duration(started)
            }
        }
    }

    // ─── Shutdown ─────────────────────────────────────────────────────────

    /// Clean up every agent concurrently, then empty the registry.
    pub async fn shutdown(&self) -> ShutdownReport {
        let agents: Vec<(String, Arc<dyn Agent>)> = {
            self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).clear();
            let inner = self.inner.read().await;
            inner
                .agents
                .iter()
                .map(|(d, a)| (d.clone(), a.clone()))
                .collect()
        };
        tracing::info!("[Orchestrator] Shutting down {} agents", agents.len());

        let cleanups = agents.iter().map(|(domain, agent)| async move {
            let outcome = self
                .guarded(agent.id(), "cleanup", agent.cleanup())
                .await
                .and_then(|inner| inner);
            (domain.clone(), outcome)
        });

        let mut report = ShutdownReport::default();
        for (domain, outcome) in join_all(cleanups).await {
            match outcome {
                Ok(()) => report.cleaned.push(domain),
                Err(e) => {
                    tracing::warn!(domain = %domain, error = %e, "[Orchestrator] Cleanup failed");
                    report.failures.insert(domain, e.to_string());
                }
            }
        }
        report.cleaned.sort();

        let mut inner = self.inner.write().await;
        inner.agents.clear();
        inner.workflow_runners.clear();
        report
    }
}
