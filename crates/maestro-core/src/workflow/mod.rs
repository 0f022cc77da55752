//! Multi-step workflows over domain agents.
//!
//! A [`WorkflowDefinition`] lists steps that each target a domain; the
//! [`WorkflowEngine`] runs them sequentially, in parallel or in a loop, and a
//! [`WorkflowAgent`] exposes an engine through the ordinary agent contract.

pub mod agent;
pub mod condition;
pub mod engine;
pub mod loader;
pub mod outcome;
pub mod schema;
pub mod template;

use async_trait::async_trait;

use crate::models::{AgentContext, AgentResult, Parameters};

pub use agent::WorkflowAgent;
pub use condition::{LoopCondition, LoopPredicate};
pub use engine::{
    ActiveWorkflowState, CancelSignal, DomainResolver, ExecutionOptions, MetadataDomainResolver,
    StepInvoker, WorkflowEngine, LOOP_CONDITION_PARAM,
};
pub use loader::WorkflowLoader;
pub use outcome::{IterationOutcome, RunStatus, StepOutcome, WorkflowRunResult};
pub use schema::{
    LoopConditionSpec, StepTarget, WorkflowDefinition, WorkflowStep, WorkflowType, RESOLVE_TARGET,
};
pub use template::TemplateScope;

/// Something the orchestrator can hand a workflow id to.
#[async_trait]
pub trait WorkflowRunner: Send + Sync {
    async fn run_workflow(
        &self,
        workflow_id: &str,
        context: &AgentContext,
        parameters: &Parameters,
    ) -> AgentResult;
}
