//! Runtime configuration.
//!
//! Loaded from YAML (all keys optional) with environment overrides:
//!
//! ```yaml
//! engine:
//!   default_max_iterations: 10
//!   default_max_duration_ms: 60000
//!   safety_ceiling: 1000
//!   retry_backoff_ms: 100
//!   max_backoff_ms: 5000
//! orchestrator:
//!   agent_timeout_ms: 30000
//! workflow_dirs:
//!   - ./workflows
//! ```
//!
//! Resolution order for the file: explicit path, `./.maestro/config.yaml`,
//! `~/.maestro/config.yaml`, then built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::OrchestrationError;

/// Iterations after which a loop workflow always stops.
pub const LOOP_SAFETY_CEILING: u32 = 1000;

/// Workflow engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `count` loop limit when the condition does not name one.
    pub default_max_iterations: u32,
    /// `time` loop limit when the condition does not name one.
    pub default_max_duration_ms: u64,
    /// Hard ceiling on loop iterations. Values above
    /// [`LOOP_SAFETY_CEILING`] are clamped to it.
    pub safety_ceiling: u32,
    /// First retry delay; doubles on every further attempt.
    pub retry_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_iterations: 10,
            default_max_duration_ms: 60_000,
            safety_ceiling: LOOP_SAFETY_CEILING,
            retry_backoff_ms: 100,
            max_backoff_ms: 5_000,
        }
    }
}

impl EngineConfig {
    pub fn effective_ceiling(&self) -> u32 {
        self.safety_ceiling.clamp(1, LOOP_SAFETY_CEILING)
    }

    /// Ceiling for a loop whose condition declares `declared` iterations.
    ///
    /// A lower `safety_ceiling` only bounds open-ended loops; a count loop
    /// still runs its declared iterations, up to [`LOOP_SAFETY_CEILING`].
    pub fn ceiling_for(&self, declared: Option<u32>) -> u32 {
        match declared {
            Some(n) => n.clamp(self.effective_ceiling(), LOOP_SAFETY_CEILING),
            None => self.effective_ceiling(),
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(
            self.retry_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound for a single agent call made by the orchestrator.
    pub agent_timeout_ms: Option<u64>,
}

impl OrchestratorConfig {
    pub fn agent_timeout(&self) -> Option<Duration> {
        self.agent_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaestroConfig {
    pub engine: EngineConfig,
    pub orchestrator: OrchestratorConfig,
    /// Extra directories scanned for workflow YAML files.
    pub workflow_dirs: Vec<String>,
}

impl MaestroConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, OrchestrationError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| OrchestrationError::Config(format!("Failed to parse config YAML: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OrchestrationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrchestrationError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Load from `explicit` if given, otherwise from the first default
    /// location that exists, then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, OrchestrationError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_paths().into_iter().find(|p| p.is_file()) {
                Some(path) => {
                    tracing::info!("[Config] Loaded configuration from '{}'", path.display());
                    Self::from_file(path)?
                }
                None => Self::default(),
            },
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".maestro").join("config.yaml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".maestro").join("config.yaml"));
        }
        paths
    }

    /// Apply `MAESTRO_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), OrchestrationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MAESTRO_LOOP_SAFETY_CEILING") {
            self.engine.safety_ceiling = parse_env("MAESTRO_LOOP_SAFETY_CEILING", &v)?;
        }
        if let Some(v) = lookup("MAESTRO_RETRY_BACKOFF_MS") {
            self.engine.retry_backoff_ms = parse_env("MAESTRO_RETRY_BACKOFF_MS", &v)?;
        }
        if let Some(v) = lookup("MAESTRO_AGENT_TIMEOUT_MS") {
            self.orchestrator.agent_timeout_ms = Some(parse_env("MAESTRO_AGENT_TIMEOUT_MS", &v)?);
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, OrchestrationError> {
    value
        .trim()
        .parse()
        .map_err(|_| OrchestrationError::Config(format!("Invalid value for {}: '{}'", key, value)))
}
