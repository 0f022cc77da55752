//! Peer coordination rounds (`maestro coordinate`).

use maestro_core::{AgentContext, CoordinationContext, CoordinationResult, MaestroConfig};
use serde_json::Value;

use super::{init_system, parse_domains, print_json};

pub async fn execute(
    config: MaestroConfig,
    initiator: &str,
    domains: &str,
    payload: Option<&str>,
) -> Result<CoordinationResult, String> {
    let domains = parse_domains(domains);
    if domains.is_empty() {
        return Err("No domains given".to_string());
    }
    let payload = match payload {
        Some(raw) => serde_json::from_str(raw).map_err(|e| format!("Invalid payload JSON: {}", e))?,
        None => Value::Null,
    };

    let system = init_system(config, Vec::new()).await?;
    let orchestrator = system.orchestrator().map_err(|e| e.to_string())?;

    let coordination = CoordinationContext {
        initiator: initiator.to_string(),
        domains,
        payload,
        context: AgentContext::new(initiator),
    };
    let result = orchestrator.coordinate_multiple_domains(&coordination).await;

    system.shutdown().await;
    Ok(result)
}

pub async fn run(config: MaestroConfig, initiator: &str, domains: &str, payload: Option<&str>) -> Result<(), String> {
    let result = execute(config, initiator, domains, payload).await?;
    print_json(&serde_json::to_value(&result).unwrap_or_default());

    if result.success {
        Ok(())
    } else {
        Err(format!("Coordination had {} conflict(s)", result.conflicts.len()))
    }
}
