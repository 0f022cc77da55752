//! Maestro Core — agent orchestration and workflow execution.
//!
//! This crate contains the agent and tool contracts, the domain-keyed
//! [`Orchestrator`] and the [`WorkflowEngine`]. It has no I/O surface beyond
//! reading YAML files, making it suitable for use in:
//!
//! - CLI tools (via `maestro-cli`)
//! - services that embed an [`AgentSystem`]
//! - tests driving agents directly
//!
//! Per-call operations never fail with `Err`: agent execution, tool use,
//! transfer, coordination and fan-out all report failures inside their
//! result values. Only bring-up (`AgentSystem::initialize`, configuration
//! loading) returns [`OrchestrationError`] to the caller.

pub mod agent;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestration;
pub mod system;
pub mod tools;
pub mod workflow;

#[cfg(test)]
mod testing;

// Convenience re-exports
pub use agent::{Agent, AgentCore, AgentInfo, ToolBox};
pub use config::{EngineConfig, MaestroConfig, OrchestratorConfig};
pub use error::OrchestrationError;
pub use models::{
    params, AgentContext, AgentResult, CoordinationContext, CoordinationResult, Parameters,
    TransferResult,
};
pub use orchestration::{OrchestrationRequest, OrchestrationResult, Orchestrator, ShutdownReport};
pub use system::{AgentSystem, AgentSystemBuilder};
pub use tools::{Tool, ToolHandle, ToolMetadata, ToolResult};
pub use workflow::{WorkflowAgent, WorkflowDefinition, WorkflowEngine, WorkflowLoader, WorkflowRunResult};
