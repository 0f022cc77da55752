//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command. Commands build an
//! [`AgentSystem`] from the demo agents, run one operation through its
//! orchestrator and print the result as JSON.

pub mod agents;
pub mod coordinate;
pub mod fanout;
pub mod workflow;

use std::path::Path;

use maestro_core::{AgentSystem, MaestroConfig, Parameters, WorkflowDefinition};
use serde_json::Value;

use crate::agents::demo_system;

/// Load configuration from `path` (or the default locations), including
/// `MAESTRO_*` environment overrides.
pub fn load_config(path: Option<&str>) -> Result<MaestroConfig, String> {
    MaestroConfig::load(path.map(Path::new)).map_err(|e| e.to_string())
}

/// Build and initialise the demo system.
pub async fn init_system(config: MaestroConfig, definitions: Vec<WorkflowDefinition>) -> Result<AgentSystem, String> {
    let system = demo_system(config, definitions);
    system.initialize().await.map_err(|e| e.to_string())?;
    Ok(system)
}

/// Parse repeated `key=value` flags. Values that parse as JSON keep their
/// JSON type; anything else is taken as a string.
pub fn parse_params(pairs: &[String]) -> Result<Parameters, String> {
    let mut params = Parameters::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("Invalid parameter '{}': expected key=value", pair))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Invalid parameter '{}': empty key", pair));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

/// Split a comma separated domain list, dropping blanks.
pub fn parse_domains(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
