//! Agent contract — the uniform capability surface of every unit of work.
//!
//! An agent is addressed by a domain key in the [`crate::orchestration::Orchestrator`]
//! and exposes:
//!
//! - lifecycle: `initialize` / `cleanup` (both idempotent)
//! - `execute(context, parameters)`, where `parameters["action"]` selects the
//!   behaviour and every failure comes back as a failed [`AgentResult`]
//! - `transfer_to_agent`, which only prepares a handoff (the orchestrator
//!   performs the target call)
//! - `coordinate_with_other_domains`, a peer-broadcast primitive
//! - tool use through an owned [`ToolBox`]

pub mod core;
pub mod toolbox;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OrchestrationError;
use crate::models::{
    AgentContext, AgentResult, CoordinationContext, CoordinationResult, Parameters,
    TransferResult,
};
use crate::workflow::WorkflowRunner;

pub use self::core::{AgentCore, AgentInfo};
pub use toolbox::ToolBox;

#[async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    /// Tools owned by this agent, if it uses any.
    fn tools(&self) -> Option<&ToolBox> {
        None
    }

    fn info(&self) -> AgentInfo {
        AgentInfo {
            agent_id: self.id().to_string(),
            agent_name: self.name().to_string(),
            capabilities: self.capabilities(),
            tools: self.tools().map(ToolBox::names).unwrap_or_default(),
            created_at: chrono::Utc::now(),
        }
    }

    /// Idempotent setup. Must complete before anyone else calls `execute`.
    async fn initialize(&self) -> Result<(), OrchestrationError> {
        Ok(())
    }

    /// Run the action named by `parameters["action"]`.
    ///
    /// Implementations must not panic or leak errors; unknown actions yield
    /// a failed result with `Unknown action: <action>`.
    async fn execute(&self, context: &AgentContext, parameters: &Parameters) -> AgentResult;

    /// Idempotent teardown.
    async fn cleanup(&self) -> Result<(), OrchestrationError> {
        Ok(())
    }

    /// Prepare a handoff of `context` to `target_domain`.
    ///
    /// The default copies the context, records the source agent in
    /// `metadata.transferredFrom` and reports success. It never calls the
    /// target.
    async fn transfer_to_agent(&self, target_domain: &str, context: &AgentContext) -> TransferResult {
        TransferResult::ready(
            target_domain,
            context.with_metadata("transferredFrom", self.id()),
        )
    }

    /// Answer a peer coordination round. `domains` excludes this agent's own
    /// domain. The default acknowledges every peer.
    async fn coordinate_with_other_domains(
        &self,
        domains: &[String],
        coordination: &CoordinationContext,
    ) -> Result<CoordinationResult, OrchestrationError> {
        let responses: BTreeMap<String, serde_json::Value> = domains
            .iter()
            .map(|domain| {
                (
                    domain.clone(),
                    serde_json::json!({
                        "status": "acknowledged",
                        "from": self.id(),
                        "initiator": coordination.initiator,
                    }),
                )
            })
            .collect();
        Ok(CoordinationResult::from_parts(responses, Vec::new()))
    }

    /// Invoke one of this agent's tools.
    async fn use_tool(
        &self,
        name: &str,
        input: &Parameters,
    ) -> Result<crate::tools::ToolResult, OrchestrationError> {
        match self.tools() {
            Some(tools) => tools.use_tool(name, input).await,
            None => Err(OrchestrationError::ToolNotFound(name.to_string())),
        }
    }

    /// Workflow-capable agents return themselves so the orchestrator can
    /// index them for `execute_workflow`.
    fn as_workflow_runner(self: Arc<Self>) -> Option<Arc<dyn WorkflowRunner>> {
        None
    }
}

/// Dispatch helper: the `action` entry or an `UnknownAction` error.
pub fn require_action(parameters: &Parameters) -> Result<&str, OrchestrationError> {
    crate::models::action_of(parameters)
        .ok_or_else(|| OrchestrationError::UnknownAction("<none>".to_string()))
}
