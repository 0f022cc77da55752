use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::engine::{DomainResolver, StepInvoker, WorkflowEngine};
use super::schema::WorkflowDefinition;
use super::WorkflowRunner;
use crate::agent::{require_action, Agent, AgentCore};
use crate::config::EngineConfig;
use crate::error::OrchestrationError;
use crate::models::{action_of, AgentContext, AgentResult, Parameters};

/// Agent that owns a [`WorkflowEngine`] and runs workflows on request.
///
/// Actions:
/// - `execute_workflow { workflowId, parameters? }`
/// - `list_workflows`
/// - `active_workflows`
/// - `cancel_workflow { workflowId }`
pub struct WorkflowAgent {
    core: AgentCore,
    engine: WorkflowEngine,
}

impl WorkflowAgent {
    pub fn new(name: impl Into<String>, invoker: Arc<dyn StepInvoker>, config: EngineConfig) -> Self {
        Self {
            core: AgentCore::new(name).with_capabilities([
                "execute_workflow",
                "list_workflows",
                "active_workflows",
                "cancel_workflow",
            ]),
            engine: WorkflowEngine::new(invoker, config),
        }
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn DomainResolver>) -> Self {
        self.engine = self.engine.with_resolver(resolver);
        self
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub async fn register_workflow(&self, definition: WorkflowDefinition) {
        self.engine.register_workflow(definition).await;
    }

    /// The run report travels as `data` on success and failure alike.
    async fn execute_workflow_action(&self, context: &AgentContext, parameters: &Parameters) -> AgentResult {
        let started = Instant::now();
        let workflow_id = match workflow_id(parameters) {
            Ok(id) => id,
            Err(e) => return self.core.finish(started, Err(e)),
        };
        let inner = match parameters.get("parameters") {
            None | Some(Value::Null) => Parameters::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                let err = OrchestrationError::Validation(vec![
                    "Parameter parameters must be of type object".to_string(),
                ]);
                return self.core.finish(started, Err(err));
            }
        };
        self.run_workflow(workflow_id, context, &inner).await
    }

    async fn dispatch(&self, parameters: &Parameters) -> Result<Value, OrchestrationError> {
        match require_action(parameters)? {
            "list_workflows" => {
                let workflows: Vec<Value> = self
                    .engine
                    .workflows()
                    .await
                    .iter()
                    .map(|def| {
                        json!({
                            "id": def.id,
                            "name": def.name,
                            "type": def.workflow_type,
                            "steps": def.steps.len(),
                            "maxRetries": def.max_retries,
                            "timeoutMs": def.timeout_ms,
                        })
                    })
                    .collect();
                Ok(json!({ "workflows": workflows }))
            }
            "active_workflows" => Ok(json!({ "active": self.engine.active_workflows() })),
            "cancel_workflow" => {
                let workflow_id = workflow_id(parameters)?;
                if self.engine.cancel_workflow(workflow_id) {
                    Ok(json!({ "workflowId": workflow_id, "cancelled": true }))
                } else {
                    Err(OrchestrationError::execution(format!(
                        "Workflow {} is not running",
                        workflow_id
                    )))
                }
            }
            other => Err(OrchestrationError::UnknownAction(other.to_string())),
        }
    }
}

fn workflow_id(parameters: &Parameters) -> Result<&str, OrchestrationError> {
    parameters
        .get("workflowId")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            OrchestrationError::Validation(vec!["Missing required parameter: workflowId".to_string()])
        })
}

#[async_trait]
impl Agent for WorkflowAgent {
    fn id(&self) -> &str {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn capabilities(&self) -> Vec<String> {
        self.core.capabilities().to_vec()
    }

    async fn initialize(&self) -> Result<(), OrchestrationError> {
        self.core.initialize().await
    }

    async fn execute(&self, context: &AgentContext, parameters: &Parameters) -> AgentResult {
        if action_of(parameters) == Some("execute_workflow") {
            return self.execute_workflow_action(context, parameters).await;
        }
        let started = Instant::now();
        let outcome = self.dispatch(parameters).await;
        self.core.finish(started, outcome)
    }

    async fn cleanup(&self) -> Result<(), OrchestrationError> {
        let cancelled = self.engine.cancel_all();
        if cancelled > 0 {
            tracing::info!(agent = %self.core.name(), cancelled, "[Workflow] Cancelled running workflows on cleanup");
        }
        Ok(())
    }

    fn as_workflow_runner(self: Arc<Self>) -> Option<Arc<dyn WorkflowRunner>> {
        Some(self)
    }
}

#[async_trait]
impl WorkflowRunner for WorkflowAgent {
    async fn run_workflow(&self, workflow_id: &str, context: &AgentContext, parameters: &Parameters) -> AgentResult {
        self.engine
            .execute_workflow(workflow_id, context, parameters)
            .await
            .into_agent_result(self.core.id())
    }
}
