//! Core error type for the Maestro platform.
//!
//! `OrchestrationError` is the single error taxonomy used throughout the
//! core. Per-call paths (agent execution, tool use, transfer, coordination,
//! fan-out) fold these into failed result values; only bring-up errors
//! (`Initialization`, `NotInitialized`, `Config`) are returned as `Err` to
//! callers.

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrchestrationError {
    #[error("Agent for domain {0} not found")]
    AgentNotFound(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("No workflow agent registered for domain {0}")]
    NoWorkflowAgentForDomain(String),

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("Coordination conflict: {0}")]
    Coordination(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("{what} timed out after {millis}ms")]
    Timeout { what: String, millis: u64 },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Agent system is not initialized")]
    NotInitialized,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl OrchestrationError {
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// True for the "something is missing" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::AgentNotFound(_)
                | Self::WorkflowNotFound(_)
                | Self::ToolNotFound(_)
                | Self::NoWorkflowAgentForDomain(_)
        )
    }
}

/// Render a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
