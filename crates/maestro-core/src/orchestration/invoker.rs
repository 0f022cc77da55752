use std::sync::{Arc, Weak};

use async_trait::async_trait;

use super::Orchestrator;
use crate::error::OrchestrationError;
use crate::models::{AgentContext, AgentResult, Parameters};
use crate::workflow::StepInvoker;

/// Runs workflow steps through `Orchestrator::transfer_between_agents`,
/// with the owning workflow agent's domain as the transfer source.
///
/// Holds the orchestrator weakly: the orchestrator owns the workflow agent
/// that owns this invoker.
pub struct OrchestratorInvoker {
    orchestrator: Weak<Orchestrator>,
    source_domain: String,
}

impl OrchestratorInvoker {
    pub fn new(orchestrator: &Arc<Orchestrator>, source_domain: impl Into<String>) -> Self {
        Self {
            orchestrator: Arc::downgrade(orchestrator),
            source_domain: source_domain.into(),
        }
    }

    pub fn source_domain(&self) -> &str {
        &self.source_domain
    }
}

#[async_trait]
impl StepInvoker for OrchestratorInvoker {
    async fn invoke(&self, target_domain: &str, context: &AgentContext, parameters: &Parameters) -> AgentResult {
        match self.orchestrator.upgrade() {
            Some(orchestrator) => {
                orchestrator
                    .transfer_between_agents(&self.source_domain, target_domain, context, parameters)
                    .await
            }
            None => AgentResult::failure(
                &self.source_domain,
                OrchestrationError::Transfer("orchestrator is no longer running".to_string()).to_string(),
            ),
        }
    }
}

impl Orchestrator {
    /// Step invoker for a workflow agent that will be registered under
    /// `source_domain`.
    pub fn step_invoker(self: &Arc<Self>, source_domain: impl Into<String>) -> Arc<dyn StepInvoker> {
        Arc::new(OrchestratorInvoker::new(self, source_domain))
    }
}
