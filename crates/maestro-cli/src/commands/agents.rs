//! Agent listing for `maestro agents`.

use maestro_core::{AgentInfo, MaestroConfig};

use super::init_system;

/// Domain → agent summary for every registered agent, sorted by domain.
pub async fn collect(config: MaestroConfig) -> Result<Vec<(String, AgentInfo)>, String> {
    let system = init_system(config, Vec::new()).await?;
    let orchestrator = system.orchestrator().map_err(|e| e.to_string())?;

    let mut agents = Vec::new();
    for domain in orchestrator.registered_domains().await {
        if let Some(agent) = orchestrator.get_agent(&domain).await {
            agents.push((domain, agent.info()));
        }
    }

    system.shutdown().await;
    Ok(agents)
}

pub async fn list(config: MaestroConfig) -> Result<(), String> {
    let agents = collect(config).await?;

    println!("{:<16} {:<20} {:<40} TOOLS", "DOMAIN", "NAME", "CAPABILITIES");
    println!("{}", "-".repeat(90));
    for (domain, info) in &agents {
        println!(
            "{:<16} {:<20} {:<40} {}",
            domain,
            info.agent_name,
            info.capabilities.join(", "),
            info.tools.join(", ")
        );
    }
    Ok(())
}
