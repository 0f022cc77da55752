//! Explicit container for one orchestrator and its agents.
//!
//! ```ignore
//! let system = AgentSystem::builder(config)
//!     .agent("goal_planning", Arc::new(PlanningAgent::new()))
//!     .workflow_agent("workflow", definitions)
//!     .build();
//! system.initialize().await?;
//! let result = system.orchestrator()?.execute_workflow("onboarding", "workflow", &ctx, &params).await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::agent::Agent;
use crate::config::MaestroConfig;
use crate::error::OrchestrationError;
use crate::orchestration::{Orchestrator, ShutdownReport};
use crate::workflow::{WorkflowAgent, WorkflowDefinition};

type AgentFactory = Box<dyn FnOnce(&Arc<Orchestrator>, &MaestroConfig) -> Arc<dyn Agent> + Send>;

enum Registration {
    Agent(Arc<dyn Agent>),
    Factory(AgentFactory),
    Workflow(Vec<WorkflowDefinition>),
}

/// Collects agent registrations in bring-up order.
pub struct AgentSystemBuilder {
    config: MaestroConfig,
    registrations: Vec<(String, Registration)>,
}

impl AgentSystemBuilder {
    #[must_use]
    pub fn agent(mut self, domain: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        self.registrations.push((domain.into(), Registration::Agent(agent)));
        self
    }

    /// Register an agent that needs the orchestrator (or the configuration)
    /// to be built.
    #[must_use]
    pub fn agent_with<F>(mut self, domain: impl Into<String>, factory: F) -> Self
    where
        F: FnOnce(&Arc<Orchestrator>, &MaestroConfig) -> Arc<dyn Agent> + Send + 'static,
    {
        self.registrations
            .push((domain.into(), Registration::Factory(Box::new(factory))));
        self
    }

    /// Register a [`WorkflowAgent`] under `domain` whose steps are routed
    /// through this system's orchestrator.
    #[must_use]
    pub fn workflow_agent(mut self, domain: impl Into<String>, definitions: Vec<WorkflowDefinition>) -> Self {
        self.registrations
            .push((domain.into(), Registration::Workflow(definitions)));
        self
    }

    pub fn build(self) -> AgentSystem {
        let orchestrator = Arc::new(Orchestrator::new(self.config.orchestrator.clone()));
        let mut agents: Vec<(String, Arc<dyn Agent>)> = Vec::with_capacity(self.registrations.len());
        let mut workflow_agents = HashMap::new();

        for (domain, registration) in self.registrations {
            let agent: Arc<dyn Agent> = match registration {
                Registration::Agent(agent) => agent,
                Registration::Factory(factory) => factory(&orchestrator, &self.config),
                Registration::Workflow(definitions) => {
                    let agent = Arc::new(WorkflowAgent::new(
                        format!("{}-workflows", domain),
                        orchestrator.step_invoker(domain.clone()),
                        self.config.engine.clone(),
                    ));
                    workflow_agents.insert(domain.clone(), (agent.clone(), definitions));
                    agent
                }
            };
            agents.push((domain, agent));
        }

        AgentSystem {
            config: self.config,
            orchestrator,
            agents,
            workflow_agents,
            initialized: OnceCell::new(),
        }
    }
}

/// Owns an [`Orchestrator`] and the agents registered on it.
pub struct AgentSystem {
    config: MaestroConfig,
    orchestrator: Arc<Orchestrator>,
    agents: Vec<(String, Arc<dyn Agent>)>,
    workflow_agents: HashMap<String, (Arc<WorkflowAgent>, Vec<WorkflowDefinition>)>,
    initialized: OnceCell<()>,
}

impl AgentSystem {
    pub fn builder(config: MaestroConfig) -> AgentSystemBuilder {
        AgentSystemBuilder {
            config,
            registrations: Vec::new(),
        }
    }

    pub fn config(&self) -> &MaestroConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Initialise every agent in registration order, then register them all
    /// with the orchestrator. The first failure is returned and leaves the
    /// system uninitialised with nothing registered; calling again retries.
    pub async fn initialize(&self) -> Result<(), OrchestrationError> {
        self.initialized
            .get_or_try_init(|| async {
                for (domain, agent) in &self.agents {
                    agent.initialize().await.map_err(|e| {
                        tracing::error!(domain = %domain, error = %e, "[AgentSystem] Agent failed to initialize");
                        match e {
                            OrchestrationError::Initialization(_) => e,
                            other => OrchestrationError::Initialization(format!("{}: {}", domain, other)),
                        }
                    })?;
                }
                for (domain, agent) in &self.agents {
                    if let Some((workflow_agent, definitions)) = self.workflow_agents.get(domain) {
                        for definition in definitions {
                            workflow_agent.register_workflow(definition.clone()).await;
                        }
                    }
                    self.orchestrator.register_agent(domain.clone(), agent.clone()).await;
                }
                tracing::info!("[AgentSystem] Initialized {} agents", self.agents.len());
                Ok(())
            })
            .await
            .map(|_| ())
    }

    pub fn orchestrator(&self) -> Result<&Arc<Orchestrator>, OrchestrationError> {
        if !self.is_initialized() {
            return Err(OrchestrationError::NotInitialized);
        }
        Ok(&self.orchestrator)
    }

    /// The workflow agent registered under `domain`.
    pub fn workflows(&self, domain: &str) -> Result<Arc<WorkflowAgent>, OrchestrationError> {
        if !self.is_initialized() {
            return Err(OrchestrationError::NotInitialized);
        }
        self.workflow_agents
            .get(domain)
            .map(|(agent, _)| agent.clone())
            .ok_or_else(|| OrchestrationError::NoWorkflowAgentForDomain(domain.to_string()))
    }

    pub async fn shutdown(&self) -> ShutdownReport {
        let report = self.orchestrator.shutdown().await;
        if !report.is_clean() {
            tracing::warn!(
                "[AgentSystem] Shutdown finished with {} cleanup failures",
                report.failures.len()
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{params, AgentContext, Parameters};
    use crate::testing::ScriptedAgent;
    use crate::workflow::{StepTarget, WorkflowStep, WorkflowType};
    use serde_json::json;

    fn definitions() -> Vec<WorkflowDefinition> {
        vec![WorkflowDefinition::new(
            "pair",
            WorkflowType::Parallel,
            vec![
                WorkflowStep::new("a", StepTarget::domain("alpha")),
                WorkflowStep::new("b", StepTarget::domain("beta")),
            ],
        )]
    }

    #[tokio::test]
    async fn test_accessors_require_initialization() {
        let system = AgentSystem::builder(MaestroConfig::default())
            .workflow_agent("workflow", definitions())
            .build();
        assert!(matches!(system.orchestrator(), Err(OrchestrationError::NotInitialized)));
        assert!(matches!(system.workflows("workflow"), Err(OrchestrationError::NotInitialized)));
    }

    #[tokio::test]
    async fn test_initialize_registers_in_order_and_is_idempotent() {
        let alpha = Arc::new(ScriptedAgent::ok("alpha"));
        let beta = Arc::new(ScriptedAgent::ok("beta"));
        let system = AgentSystem::builder(MaestroConfig::default())
            .agent("alpha", alpha.clone())
            .agent("beta", beta.clone())
            .workflow_agent("workflow", definitions())
            .build();

        system.initialize().await.unwrap();
        system.initialize().await.unwrap();

        assert_eq!(alpha.inits(), 1);
        assert_eq!(beta.inits(), 1);
        let orchestrator = system.orchestrator().unwrap();
        assert_eq!(orchestrator.registered_domains().await, vec!["alpha", "beta", "workflow"]);
        assert!(system.workflows("workflow").is_ok());
        assert!(matches!(
            system.workflows("alpha"),
            Err(OrchestrationError::NoWorkflowAgentForDomain(d)) if d == "alpha"
        ));
    }

    #[tokio::test]
    async fn test_initialization_error_propagates() {
        let broken = Arc::new(ScriptedAgent::ok("broken").with_failing_init());
        let system = AgentSystem::builder(MaestroConfig::default())
            .agent("ok", Arc::new(ScriptedAgent::ok("ok")))
            .agent("broken", broken.clone())
            .build();

        let err = system.initialize().await.unwrap_err();
        assert_eq!(
            err,
            OrchestrationError::Initialization("broken is missing its tools".into())
        );
        assert!(!system.is_initialized());
        assert!(system.orchestrator().is_err());
        assert!(system.orchestrator.registered_domains().await.is_empty());
    }

    #[tokio::test]
    async fn test_workflow_runs_through_system() {
        let alpha = Arc::new(ScriptedAgent::ok("alpha"));
        let beta = Arc::new(ScriptedAgent::ok("beta"));
        let system = AgentSystem::builder(MaestroConfig::default())
            .agent("alpha", alpha.clone())
            .agent("beta", beta.clone())
            .workflow_agent("workflow", definitions())
            .build();
        system.initialize().await.unwrap();

        let result = system
            .orchestrator()
            .unwrap()
            .execute_workflow("pair", "workflow", &AgentContext::new("tester"), &Parameters::new())
            .await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(alpha.calls(), 1);
        assert_eq!(beta.calls(), 1);
        assert_eq!(result.data.unwrap()["steps"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_agent_factory_sees_orchestrator() {
        let system = AgentSystem::builder(MaestroConfig::default())
            .agent("alpha", Arc::new(ScriptedAgent::ok("alpha")))
            .agent_with("custom", |orchestrator, config| {
                let agent = WorkflowAgent::new("custom", orchestrator.step_invoker("custom"), config.engine.clone());
                Arc::new(agent) as Arc<dyn Agent>
            })
            .build();
        system.initialize().await.unwrap();

        let orchestrator = system.orchestrator().unwrap();
        assert_eq!(orchestrator.workflow_domains().await, vec!["custom"]);
        let result = orchestrator
            .execute_agent("custom", &AgentContext::new("t"), &params(json!({ "action": "list_workflows" })))
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_shutdown_empties_orchestrator() {
        let system = AgentSystem::builder(MaestroConfig::default())
            .agent("alpha", Arc::new(ScriptedAgent::ok("alpha")))
            .build();
        system.initialize().await.unwrap();

        let report = system.shutdown().await;
        assert_eq!(report.cleaned, vec!["alpha"]);
        assert!(system.orchestrator().unwrap().registered_domains().await.is_empty());
    }
}
