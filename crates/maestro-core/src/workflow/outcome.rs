//! Values produced by a workflow run.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::schema::WorkflowType;
use crate::models::AgentResult;

/// Result of one step invocation, after retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub step_id: String,
    /// Domain the step was sent to; empty when resolution failed.
    pub domain: String,
    pub attempts: u32,
    pub result: AgentResult,
}

impl StepOutcome {
    pub fn success(&self) -> bool {
        self.result.success
    }
}

/// One pass over the step list of a loop workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationOutcome {
    pub iteration: u32,
    pub steps: Vec<StepOutcome>,
}

impl IterationOutcome {
    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|s| !s.success()).count()
    }

    pub fn success(&self) -> bool {
        self.failed_steps() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Outcome of `WorkflowEngine::execute_workflow`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRunResult {
    pub workflow_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_type: Option<WorkflowType>,
    pub status: RunStatus,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Sequential and parallel runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepOutcome>,
    /// Loop runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub iterations: Vec<IterationOutcome>,
    pub failed_steps: usize,
    pub total_iterations: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

impl WorkflowRunResult {
    pub(crate) fn new(workflow_id: &str, workflow_type: WorkflowType) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            workflow_type: Some(workflow_type),
            status: RunStatus::Completed,
            success: true,
            error: None,
            steps: Vec::new(),
            iterations: Vec::new(),
            failed_steps: 0,
            total_iterations: 0,
            warnings: Vec::new(),
            duration_ms: 0,
        }
    }

    /// A run that never started, e.g. because the id is unknown.
    pub fn rejected(workflow_id: &str, error: impl Into<String>) -> Self {
        Self {
            workflow_type: None,
            status: RunStatus::Failed,
            success: false,
            error: Some(error.into()),
            ..Self::new(workflow_id, WorkflowType::Sequential)
        }
    }

    pub(crate) fn fail(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.success = false;
        self.error = Some(error.into());
    }

    pub(crate) fn cancel(&mut self) {
        self.status = RunStatus::Cancelled;
        self.success = false;
        self.error = Some(format!("Workflow {} was cancelled", self.workflow_id));
    }

    pub(crate) fn finish(mut self, started: Instant) -> Self {
        self.duration_ms = started.elapsed().as_millis() as u64;
        self
    }

    /// Fold into the agent contract's result shape.
    pub fn into_agent_result(self, agent_id: &str) -> AgentResult {
        let success = self.success;
        let error = self.error.clone();
        let duration_ms = self.duration_ms;
        AgentResult {
            success,
            data: Some(serde_json::to_value(&self).unwrap_or_default()),
            error,
            duration_ms,
            agent_id: agent_id.to_string(),
        }
    }
}
