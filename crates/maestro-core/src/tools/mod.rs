//! Tool contract — schema-validated, side-effecting operations an agent may
//! invoke.
//!
//! A tool implements [`Tool`]; agents hold tools through a [`ToolHandle`],
//! which owns the call discipline:
//!
//! ```text
//! input ──► validate_parameters ──✗──► ToolResult { success: false }
//!                 │ ✓
//!                 ▼
//!          initialize (once) ──✗──► ToolResult { success: false }
//!                 │ ✓
//!                 ▼
//!          apply_defaults ──► execute ──► ToolResult
//! ```

pub mod schema;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::error::{panic_message, OrchestrationError};
use crate::models::Parameters;

pub use schema::{
    apply_defaults, validate_parameters, ParameterDef, ParameterType, ParameterValidator,
    ValidationReport,
};

/// Result of a tool operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tool_name: String,
    pub duration_ms: u64,
}

impl ToolResult {
    pub fn success(tool_name: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            success: true,
            data: Some(serde_json::to_value(data).unwrap_or_default()),
            error: None,
            tool_name: tool_name.into(),
            duration_ms: 0,
        }
    }

    pub fn error(tool_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
            tool_name: tool_name.into(),
            duration_ms: 0,
        }
    }

    fn timed(mut self, started: Instant) -> Self {
        self.duration_ms = started.elapsed().as_millis() as u64;
        self
    }
}

/// Descriptive metadata a tool declares about itself.
#[derive(Debug, Clone)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub category: String,
    pub parameters: Vec<ParameterDef>,
}

impl ToolMetadata {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category: category.into(),
            parameters: Vec::new(),
        }
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn param(mut self, def: ParameterDef) -> Self {
        self.parameters.push(def);
        self
    }
}

/// A named operation an agent can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn metadata(&self) -> &ToolMetadata;

    /// One-time setup. Called lazily by [`ToolHandle`] before the first
    /// execution; a failure leaves the tool uninitialised so the next call
    /// retries.
    async fn initialize(&self) -> Result<(), OrchestrationError> {
        Ok(())
    }

    /// Perform the operation. `input` has already been validated and has
    /// declared defaults filled in.
    async fn execute(&self, input: Parameters) -> Result<serde_json::Value, OrchestrationError>;
}

/// Owns a tool together with its lazy-initialisation state.
pub struct ToolHandle {
    tool: Arc<dyn Tool>,
    initialized: OnceCell<()>,
    timeout: Option<Duration>,
}

impl ToolHandle {
    pub fn new(tool: Arc<dyn Tool>) -> Self {
        Self {
            tool,
            initialized: OnceCell::new(),
            timeout: None,
        }
    }

    /// Bound every `execute` call; a call that overruns yields a failed
    /// result.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.tool.metadata().name
    }

    pub fn metadata(&self) -> &ToolMetadata {
        self.tool.metadata()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    pub fn validate(&self, input: &Parameters) -> ValidationReport {
        validate_parameters(&self.tool.metadata().parameters, input)
    }

    /// Run the tool's `initialize` unless it already succeeded.
    pub async fn ensure_initialized(&self) -> Result<(), OrchestrationError> {
        self.initialized
            .get_or_try_init(|| async { self.tool.initialize().await })
            .await
            .map(|_| ())
            .map_err(|e| match e {
                OrchestrationError::Initialization(_) => e,
                other => OrchestrationError::Initialization(format!(
                    "Tool {} failed to initialize: {}",
                    self.name(),
                    other
                )),
            })
    }

    /// Validate, initialise on first use, then execute. Never panics and
    /// never returns an error: every failure is folded into the result.
    pub async fn safe_execute(&self, input: &Parameters) -> ToolResult {
        let started = Instant::now();
        let name = self.name().to_string();

        let report = self.validate(input);
        if !report.valid {
            tracing::debug!(tool = %name, errors = ?report.errors, "[Tool] Validation failed");
            return ToolResult::error(
                name,
                OrchestrationError::Validation(report.errors).to_string(),
            )
            .timed(started);
        }

        if let Err(e) = self.ensure_initialized().await {
            tracing::warn!(tool = %name, error = %e, "[Tool] Initialization failed");
            return ToolResult::error(name, e.to_string()).timed(started);
        }

        let input = apply_defaults(&self.tool.metadata().parameters, input);
        let call = AssertUnwindSafe(self.tool.execute(input)).catch_unwind();

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return ToolResult::error(
                        &name,
                        OrchestrationError::Timeout {
                            what: format!("Tool {}", name),
                            millis: limit.as_millis() as u64,
                        }
                        .to_string(),
                    )
                    .timed(started)
                }
            },
            None => call.await,
        };

        match outcome {
            Ok(Ok(data)) => ToolResult::success(name, data).timed(started),
            Ok(Err(e)) => ToolResult::error(name, e.to_string()).timed(started),
            Err(panic) => ToolResult::error(
                &name,
                format!("Tool {} panicked: {}", name, panic_message(panic.as_ref())),
            )
            .timed(started),
        }
    }
}

impl std::fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolHandle")
            .field("name", &self.name())
            .field("initialized", &self.is_initialized())
            .field("timeout", &self.timeout)
            .finish()
    }
}
