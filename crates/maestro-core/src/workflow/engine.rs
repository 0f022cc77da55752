//! Workflow engine — runs registered definitions under one of three
//! control-flow strategies.
//!
//! ```text
//! execute_workflow(id)
//!   │  lookup ──✗──► WorkflowRunResult { "Workflow not found: <id>" }
//!   ▼
//! track ActiveWorkflowState (removed on drop, whatever happens)
//!   │
//!   ├─ sequential: s1 → s2 → … stop at first failure
//!   ├─ parallel:   s1 ‖ s2 ‖ … wait for all, count failures
//!   └─ loop:       [s1 → s2 → …] × n until LoopCondition / safety ceiling
//!
//! every step: resolve target → merge + template params
//!             → invoke (timeout_ms, cancellable) × (1 + max_retries)
//! ```
//!
//! Successful step outputs are visible to later steps as
//! `${steps.<id>.data}`. Sequential and loop runs accumulate them (a loop
//! keeps the latest output of each step across iterations); parallel steps
//! cannot see each other.
//!
//! Step dependencies are carried on the definition but never used to
//! reorder execution.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tracing::Instrument;

use super::condition::LoopCondition;
use super::outcome::{IterationOutcome, StepOutcome, WorkflowRunResult};
use super::schema::{LoopConditionSpec, StepTarget, WorkflowDefinition, WorkflowStep, WorkflowType};
use super::template::TemplateScope;
use crate::config::EngineConfig;
use crate::error::OrchestrationError;
use crate::models::{AgentContext, AgentResult, Parameters};

/// Parameter key that overrides a loop workflow's condition per call.
pub const LOOP_CONDITION_PARAM: &str = "loopCondition";

/// Performs the transfer-and-execute call for one step.
#[async_trait]
pub trait StepInvoker: Send + Sync {
    async fn invoke(
        &self,
        target_domain: &str,
        context: &AgentContext,
        parameters: &Parameters,
    ) -> AgentResult;
}

/// Late binding for steps whose target is [`StepTarget::Resolve`].
pub trait DomainResolver: Send + Sync {
    fn resolve(&self, step: &WorkflowStep, context: &AgentContext) -> Option<String>;
}

impl<F> DomainResolver for F
where
    F: Fn(&WorkflowStep, &AgentContext) -> Option<String> + Send + Sync,
{
    fn resolve(&self, step: &WorkflowStep, context: &AgentContext) -> Option<String> {
        self(step, context)
    }
}

/// Default resolver: reads a string from the context metadata.
#[derive(Debug, Clone)]
pub struct MetadataDomainResolver {
    key: String,
}

impl MetadataDomainResolver {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Default for MetadataDomainResolver {
    fn default() -> Self {
        Self::new("domain")
    }
}

impl DomainResolver for MetadataDomainResolver {
    fn resolve(&self, _step: &WorkflowStep, context: &AgentContext) -> Option<String> {
        context.metadata_str(&self.key).map(str::to_string)
    }
}

/// Cooperative cancellation flag shared between a run and its canceller.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only returns once the flag flips.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-call knobs for `execute_workflow_with`.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Takes precedence over the `loopCondition` parameter and the
    /// definition's condition.
    pub loop_condition: Option<LoopCondition>,
    /// Supply a signal to cancel the run from outside the engine.
    pub cancel: Option<CancelSignal>,
}

/// Bookkeeping for a workflow that is currently running.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveWorkflowState {
    pub workflow_id: String,
    pub workflow_type: WorkflowType,
    pub context: AgentContext,
    pub parameters: Parameters,
    pub started_at: DateTime<Utc>,
}

struct ActiveEntry {
    run_id: u64,
    state: ActiveWorkflowState,
    cancel: CancelSignal,
}

type ActiveTable = Mutex<HashMap<String, ActiveEntry>>;

/// Removes a run's active entry when the run ends, however it ends.
struct ActiveGuard<'a> {
    table: &'a ActiveTable,
    workflow_id: String,
    run_id: u64,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // A newer run of the same id may have replaced this entry.
        if table.get(&self.workflow_id).map(|e| e.run_id) == Some(self.run_id) {
            table.remove(&self.workflow_id);
        }
    }
}

/// Everything a runner needs for one invocation.
struct RunScope<'a> {
    definition: &'a WorkflowDefinition,
    context: &'a AgentContext,
    parameters: &'a Parameters,
    cancel: &'a CancelSignal,
}

/// Owns workflow definitions and the active-run table of one workflow agent.
pub struct WorkflowEngine {
    definitions: RwLock<HashMap<String, Arc<WorkflowDefinition>>>,
    active: ActiveTable,
    invoker: Arc<dyn StepInvoker>,
    resolver: Arc<dyn DomainResolver>,
    config: EngineConfig,
    next_run: AtomicU64,
}

impl WorkflowEngine {
    pub fn new(invoker: Arc<dyn StepInvoker>, config: EngineConfig) -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            active: Mutex::new(HashMap::new()),
            invoker,
            resolver: Arc::new(MetadataDomainResolver::default()),
            config,
            next_run: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn DomainResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─── Definitions ─────────────────────────────────────────────────────

    /// Insert or replace a definition by id. No validation is performed.
    pub async fn register_workflow(&self, definition: WorkflowDefinition) {
        let id = definition.id.clone();
        let replaced = self
            .definitions
            .write()
            .await
            .insert(id.clone(), Arc::new(definition))
            .is_some();
        tracing::info!(workflow_id = %id, replaced, "[Workflow] Registered workflow");
    }

    pub async fn unregister_workflow(&self, workflow_id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.definitions.write().await.remove(workflow_id)
    }

    pub async fn workflow(&self, workflow_id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.definitions.read().await.get(workflow_id).cloned()
    }

    pub async fn workflow_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.definitions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Registered definitions, sorted by id.
    pub async fn workflows(&self) -> Vec<Arc<WorkflowDefinition>> {
        let mut defs: Vec<_> = self.definitions.read().await.values().cloned().collect();
        defs.sort_by(|a, b| a.id.cmp(&b.id));
        defs
    }

    // ─── Active runs ─────────────────────────────────────────────────────

    pub fn active_workflows(&self) -> Vec<ActiveWorkflowState> {
        let table = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let mut states: Vec<_> = table.values().map(|e| e.state.clone()).collect();
        states.sort_by(|a, b| a.workflow_id.cmp(&b.workflow_id));
        states
    }

    pub fn is_active(&self, workflow_id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(workflow_id)
    }

    /// Drop the bookkeeping for a running workflow and signal it to stop.
    ///
    /// The run stops issuing steps and stops waiting on the in-flight one;
    /// an agent call that is already executing is not interrupted beyond
    /// that. Returns false if nothing with that id was running.
    pub fn cancel_workflow(&self, workflow_id: &str) -> bool {
        let entry = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(workflow_id);
        match entry {
            Some(entry) => {
                entry.cancel.cancel();
                tracing::info!(workflow_id = %workflow_id, "[Workflow] Cancelled workflow");
                true
            }
            None => false,
        }
    }

    /// Cancel every running workflow; returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let entries: Vec<ActiveEntry> = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, e)| e)
            .collect();
        for entry in &entries {
            entry.cancel.cancel();
        }
        entries.len()
    }

    fn track(
        &self,
        definition: &WorkflowDefinition,
        context: &AgentContext,
        parameters: &Parameters,
        cancel: CancelSignal,
    ) -> ActiveGuard<'_> {
        let run_id = self.next_run.fetch_add(1, Ordering::Relaxed);
        let entry = ActiveEntry {
            run_id,
            state: ActiveWorkflowState {
                workflow_id: definition.id.clone(),
                workflow_type: definition.workflow_type,
                context: context.clone(),
                parameters: parameters.clone(),
                started_at: Utc::now(),
            },
            cancel,
        };
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(definition.id.clone(), entry);
        if previous.is_some() {
            tracing::warn!(
                workflow_id = %definition.id,
                "[Workflow] Workflow already running; tracking replaced by the new run"
            );
        }
        ActiveGuard {
            table: &self.active,
            workflow_id: definition.id.clone(),
            run_id,
        }
    }

    // ─── Execution ───────────────────────────────────────────────────────

    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        context: &AgentContext,
        parameters: &Parameters,
    ) -> WorkflowRunResult {
        self.execute_workflow_with(workflow_id, context, parameters, ExecutionOptions::default())
            .await
    }

    pub async fn execute_workflow_with(
        &self,
        workflow_id: &str,
        context: &AgentContext,
        parameters: &Parameters,
        options: ExecutionOptions,
    ) -> WorkflowRunResult {
        let started = Instant::now();

        let Some(definition) = self.workflow(workflow_id).await else {
            tracing::warn!(workflow_id = %workflow_id, "[Workflow] Unknown workflow");
            return WorkflowRunResult::rejected(
                workflow_id,
                OrchestrationError::WorkflowNotFound(workflow_id.to_string()).to_string(),
            )
            .finish(started);
        };

        let cancel = options.cancel.unwrap_or_default();
        let _guard = self.track(&definition, context, parameters, cancel.clone());

        let span = tracing::info_span!(
            "workflow",
            workflow_id = %definition.id,
            correlation_id = %context.correlation_id,
            kind = %definition.workflow_type,
        );

        let run = async {
            tracing::info!(steps = definition.steps.len(), "[Workflow] Starting");
            let scope = RunScope {
                definition: &definition,
                context,
                parameters,
                cancel: &cancel,
            };
            let result = match definition.workflow_type {
                WorkflowType::Sequential => self.run_sequential(&scope).await,
                WorkflowType::Parallel => self.run_parallel(&scope).await,
                WorkflowType::Loop => match self.loop_condition(&definition, parameters, options.loop_condition) {
                    Ok(condition) => self.run_loop(&scope, &condition).await,
                    Err(e) => {
                        let mut result = WorkflowRunResult::new(&definition.id, definition.workflow_type);
                        result.fail(e.to_string());
                        result
                    }
                },
            };
            tracing::info!(
                status = ?result.status,
                failed_steps = result.failed_steps,
                "[Workflow] Finished"
            );
            result
        };

        run.instrument(span).await.finish(started)
    }

    fn loop_condition(
        &self,
        definition: &WorkflowDefinition,
        parameters: &Parameters,
        explicit: Option<LoopCondition>,
    ) -> Result<LoopCondition, OrchestrationError> {
        if let Some(condition) = explicit {
            return Ok(condition);
        }
        if let Some(raw) = parameters.get(LOOP_CONDITION_PARAM) {
            let spec: LoopConditionSpec = serde_json::from_value(raw.clone()).map_err(|e| {
                OrchestrationError::Validation(vec![format!("Invalid loopCondition: {}", e)])
            })?;
            return Ok(LoopCondition::from_spec(&spec, &self.config));
        }
        Ok(definition
            .loop_condition
            .as_ref()
            .map(|spec| LoopCondition::from_spec(spec, &self.config))
            .unwrap_or_else(|| LoopCondition::default_for(&self.config)))
    }

    async fn run_sequential(&self, scope: &RunScope<'_>) -> WorkflowRunResult {
        let def = scope.definition;
        let mut result = WorkflowRunResult::new(&def.id, def.workflow_type);
        let mut outputs = Parameters::new();

        for step in &def.steps {
            if scope.cancel.is_cancelled() {
                result.cancel();
                return result;
            }

            let outcome = self.run_step(scope, step, scope.context, &outputs).await;
            record_output(&mut outputs, &outcome);
            let failed = !outcome.success();
            let error = outcome.result.error.clone();
            result.steps.push(outcome);

            if scope.cancel.is_cancelled() {
                result.failed_steps = usize::from(failed);
                result.cancel();
                return result;
            }

            if failed {
                result.failed_steps = 1;
                result.fail(format!(
                    "Step {} failed: {}",
                    step.id,
                    error.as_deref().unwrap_or("unknown error")
                ));
                tracing::warn!(step_id = %step.id, "[Workflow] Sequential run stopped at failing step");
                return result;
            }
        }

        result
    }

    async fn run_parallel(&self, scope: &RunScope<'_>) -> WorkflowRunResult {
        let def = scope.definition;
        let mut result = WorkflowRunResult::new(&def.id, def.workflow_type);

        let outputs = Parameters::new();
        let calls = def
            .steps
            .iter()
            .map(|step| self.run_step(scope, step, scope.context, &outputs));
        result.steps = join_all(calls).await;
        result.failed_steps = result.steps.iter().filter(|s| !s.success()).count();

        if scope.cancel.is_cancelled() {
            result.cancel();
        } else if result.failed_steps > 0 {
            let msg = format!("{} of {} steps failed", result.failed_steps, result.steps.len());
            result.fail(msg);
        }
        result
    }

    async fn run_loop(&self, scope: &RunScope<'_>, condition: &LoopCondition) -> WorkflowRunResult {
        let def = scope.definition;
        let mut result = WorkflowRunResult::new(&def.id, def.workflow_type);
        let ceiling = self.config.ceiling_for(condition.declared_iterations());
        let loop_started = Instant::now();
        let mut iteration: u32 = 0;
        let mut outputs = Parameters::new();

        loop {
            iteration += 1;
            let iteration_context = scope.context.with_metadata("iteration", iteration);
            let mut outcome = IterationOutcome {
                iteration,
                steps: Vec::with_capacity(def.steps.len()),
            };

            for step in &def.steps {
                if scope.cancel.is_cancelled() {
                    break;
                }
                let step_outcome = self.run_step(scope, step, &iteration_context, &outputs).await;
                record_output(&mut outputs, &step_outcome);
                if !step_outcome.success() {
                    tracing::warn!(
                        iteration,
                        step_id = %step.id,
                        error = step_outcome.result.error.as_deref().unwrap_or("unknown error"),
                        "[Workflow] Loop step failed; continuing"
                    );
                }
                outcome.steps.push(step_outcome);
            }

            result.failed_steps += outcome.failed_steps();
            let keep_going = condition.should_continue(iteration, &outcome, loop_started);
            result.iterations.push(outcome);
            result.total_iterations = iteration;

            if scope.cancel.is_cancelled() {
                result.cancel();
                return result;
            }
            if !keep_going {
                break;
            }
            if iteration >= ceiling {
                let warning = format!(
                    "Loop workflow {} hit the safety ceiling of {} iterations",
                    def.id, ceiling
                );
                tracing::warn!("[Workflow] {}", warning);
                result.warnings.push(warning);
                break;
            }
        }

        result
    }

    /// Resolve, prepare and invoke one step with retries, timeout and
    /// cancellation.
    async fn run_step(
        &self,
        scope: &RunScope<'_>,
        step: &WorkflowStep,
        context: &AgentContext,
        outputs: &Parameters,
    ) -> StepOutcome {
        let def = scope.definition;

        let domain = match &step.target {
            StepTarget::Domain(key) => key.clone(),
            StepTarget::Resolve => match self.resolver.resolve(step, context) {
                Some(domain) => domain,
                None => {
                    return StepOutcome {
                        step_id: step.id.clone(),
                        domain: String::new(),
                        attempts: 0,
                        result: AgentResult::failure(
                            "",
                            format!("Could not resolve target domain for step {}", step.id),
                        ),
                    }
                }
            },
        };

        let step_context = context.with_metadata_entries([
            ("workflowId", serde_json::Value::String(def.id.clone())),
            ("stepId", serde_json::Value::String(step.id.clone())),
        ]);

        let mut merged = scope.parameters.clone();
        merged.remove(LOOP_CONDITION_PARAM);
        for (key, value) in &step.parameters {
            merged.insert(key.clone(), value.clone());
        }
        let parameters = TemplateScope {
            params: scope.parameters,
            steps: outputs,
            context: &step_context,
            workflow_id: &def.id,
            step_id: &step.id,
        }
        .resolve_params(&merged);

        let timeout = Duration::from_millis(def.timeout_ms.max(1));
        let max_attempts = def.max_retries.saturating_add(1);
        let mut attempts = 0;

        let result = loop {
            attempts += 1;
            let result = self
                .attempt(&domain, step, &step_context, &parameters, timeout, scope.cancel)
                .await;

            if result.success || attempts >= max_attempts || scope.cancel.is_cancelled() {
                break result;
            }

            let delay = self.config.backoff(attempts);
            tracing::debug!(
                step_id = %step.id,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "[Workflow] Retrying step"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = scope.cancel.cancelled() => break result,
            }
        };

        StepOutcome {
            step_id: step.id.clone(),
            domain,
            attempts,
            result,
        }
    }

    async fn attempt(
        &self,
        domain: &str,
        step: &WorkflowStep,
        context: &AgentContext,
        parameters: &Parameters,
        timeout: Duration,
        cancel: &CancelSignal,
    ) -> AgentResult {
        let started = Instant::now();
        let call = tokio::time::timeout(timeout, self.invoker.invoke(domain, context, parameters));

        tokio::select! {
            outcome = call => match outcome {
                Ok(result) => result,
                Err(_) => AgentResult::failure(
                    domain,
                    OrchestrationError::Timeout {
                        what: format!("Step {}", step.id),
                        millis: timeout.as_millis() as u64,
                    }
                    .to_string(),
                )
                .with_duration(started),
            },
            _ = cancel.cancelled() => AgentResult::failure(
                domain,
                OrchestrationError::Cancelled(format!("step {}", step.id)).to_string(),
            )
            .with_duration(started),
        }
    }
}

/// Make a successful step's output available to the steps after it.
fn record_output(outputs: &mut Parameters, outcome: &StepOutcome) {
    if !outcome.success() {
        return;
    }
    outputs.insert(
        outcome.step_id.clone(),
        serde_json::json!({
            "data": outcome.result.data.clone().unwrap_or(serde_json::Value::Null),
            "domain": outcome.domain,
        }),
    );
}
