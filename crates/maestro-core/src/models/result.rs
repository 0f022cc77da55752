//! Result value objects returned by the agent contract.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::AgentContext;
use crate::error::OrchestrationError;

/// Outcome of a single `Agent::execute` call.
///
/// Agents never let internal failures escape: they report them here with
/// `success = false` and a human readable `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub agent_id: String,
}

impl AgentResult {
    pub fn success(agent_id: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            success: true,
            data: Some(serde_json::to_value(data).unwrap_or_default()),
            error: None,
            duration_ms: 0,
            agent_id: agent_id.into(),
        }
    }

    pub fn failure(agent_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
            duration_ms: 0,
            agent_id: agent_id.into(),
        }
    }

    /// Fold an internal outcome into a result, stamping the elapsed time.
    pub fn from_outcome(
        agent_id: impl Into<String>,
        started: Instant,
        outcome: Result<serde_json::Value, OrchestrationError>,
    ) -> Self {
        let result = match outcome {
            Ok(data) => Self::success(agent_id, data),
            Err(e) => Self::failure(agent_id, e.to_string()),
        };
        result.with_duration(started)
    }

    #[must_use]
    pub fn with_duration(mut self, started: Instant) -> Self {
        self.duration_ms = started.elapsed().as_millis() as u64;
        self
    }
}

/// Outcome of `Agent::transfer_to_agent`.
///
/// A transfer only relocates the unit of work; the target is executed by the
/// orchestrator, which fills in `result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub success: bool,
    pub target_domain: String,
    pub transferred_context: AgentContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AgentResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransferResult {
    pub fn ready(target_domain: impl Into<String>, transferred_context: AgentContext) -> Self {
        Self {
            success: true,
            target_domain: target_domain.into(),
            transferred_context,
            result: None,
            error: None,
        }
    }

    pub fn rejected(
        target_domain: impl Into<String>,
        context: AgentContext,
        msg: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            target_domain: target_domain.into(),
            transferred_context: context,
            result: None,
            error: Some(msg.into()),
        }
    }
}
