//! `maestro fanout` — send one action to several domains at once.

use maestro_core::{AgentContext, MaestroConfig, OrchestrationRequest, OrchestrationResult};
use serde_json::Value;

use super::{init_system, parse_domains, parse_params, print_json};

pub async fn execute(
    config: MaestroConfig,
    domains: &str,
    action: &str,
    params: &[String],
) -> Result<OrchestrationResult, String> {
    let targets = parse_domains(domains);
    if targets.is_empty() {
        return Err("No target domains given".to_string());
    }
    let mut parameters = parse_params(params)?;
    parameters.insert("action".to_string(), Value::String(action.to_string()));

    let system = init_system(config, Vec::new()).await?;
    let orchestrator = system.orchestrator().map_err(|e| e.to_string())?;

    let request = OrchestrationRequest::new("cli", targets, AgentContext::new("cli"), parameters);
    let result = orchestrator.orchestrate_agents(request).await;

    system.shutdown().await;
    Ok(result)
}

pub async fn run(config: MaestroConfig, domains: &str, action: &str, params: &[String]) -> Result<(), String> {
    let result = execute(config, domains, action, params).await?;
    print_json(&serde_json::to_value(&result).unwrap_or_default());

    if result.success {
        Ok(())
    } else {
        let missing: Vec<_> = result.errors.keys().cloned().collect();
        Err(format!("Fan-out incomplete. Missing domains: {}", missing.join(", ")))
    }
}
