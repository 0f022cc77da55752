//! `maestro workflow` — run and validate YAML workflow definitions.

use std::path::PathBuf;

use maestro_core::{AgentContext, AgentResult, MaestroConfig, WorkflowDefinition, WorkflowLoader};

use super::{init_system, parse_params, print_json};
use crate::agents::WORKFLOW_DOMAIN;

/// Options for `maestro workflow run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Domain used for `@resolve` steps.
    pub domain: Option<String>,
    pub params: Vec<String>,
    pub actor: Option<String>,
    pub correlation_id: Option<String>,
}

/// Definitions from the default workflow directories, then from
/// `config.workflow_dirs`; later directories replace earlier ids.
pub fn discover(config: &MaestroConfig) -> Vec<WorkflowDefinition> {
    let mut loader = WorkflowLoader::new();
    loader.load_default_dirs();
    let configured: Vec<PathBuf> = config.workflow_dirs.iter().map(PathBuf::from).collect();
    loader.load_dirs(&configured);
    loader.into_definitions()
}

/// Run the workflow in `workflow_file` against the demo agents and return
/// the workflow agent's result.
pub async fn execute(config: MaestroConfig, workflow_file: &str, options: &RunOptions) -> Result<AgentResult, String> {
    let workflow = WorkflowDefinition::from_file(workflow_file).map_err(|e| e.to_string())?;
    let parameters = parse_params(&options.params)?;

    // Discovered definitions are available too; the file given on the
    // command line wins on id clashes.
    let mut definitions: Vec<WorkflowDefinition> = discover(&config)
        .into_iter()
        .filter(|d| d.id != workflow.id)
        .collect();
    let workflow_id = workflow.id.clone();
    definitions.push(workflow);

    let system = init_system(config, definitions).await?;
    let orchestrator = system.orchestrator().map_err(|e| e.to_string())?;

    let actor = options.actor.clone().unwrap_or_else(|| "cli".to_string());
    let mut context = match &options.correlation_id {
        Some(id) => AgentContext::with_correlation_id(id.clone(), actor),
        None => AgentContext::new(actor),
    };
    if let Some(domain) = &options.domain {
        context = context.with_metadata("domain", domain.clone());
    }

    tracing::info!(
        workflow_id = %workflow_id,
        correlation_id = %context.correlation_id,
        "[CLI] Running workflow"
    );
    let result = orchestrator
        .execute_workflow(&workflow_id, WORKFLOW_DOMAIN, &context, &parameters)
        .await;

    system.shutdown().await;
    Ok(result)
}

/// `maestro workflow run`
pub async fn run(config: MaestroConfig, workflow_file: &str, options: RunOptions) -> Result<(), String> {
    let result = execute(config, workflow_file, &options).await?;
    print_json(&serde_json::to_value(&result).unwrap_or_default());

    if result.success {
        Ok(())
    } else {
        Err(format!(
            "Workflow failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        ))
    }
}

/// Validate a workflow YAML file without executing it.
pub async fn validate(workflow_file: &str) -> Result<(), String> {
    let workflow = WorkflowDefinition::from_file(workflow_file).map_err(|e| e.to_string())?;

    println!("Workflow '{}' is valid", workflow.id);
    println!("   Name: {}", workflow.name);
    println!("   Type: {}", workflow.workflow_type);
    println!("   Retries: {}, step timeout: {}ms", workflow.max_retries, workflow.timeout_ms);
    println!("   Steps: {}", workflow.steps.len());

    for (i, step) in workflow.steps.iter().enumerate() {
        let deps = if step.dependencies.is_empty() {
            String::new()
        } else {
            format!(" (after: {})", step.dependencies.iter().cloned().collect::<Vec<_>>().join(", "))
        };
        println!("   {}. {} -> {}{}", i + 1, step.id, step.target, deps);
    }

    for (step, dep) in workflow.unresolved_dependencies() {
        println!("   warning: step '{}' depends on unknown step '{}'", step, dep);
    }

    Ok(())
}
