use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use super::toolbox::ToolBox;
use crate::error::OrchestrationError;
use crate::models::AgentResult;

/// Identity summary of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub agent_id: String,
    pub agent_name: String,
    pub capabilities: Vec<String>,
    pub tools: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// State every agent implementation tends to need: identity, tools and an
/// idempotent initialisation latch.
///
/// Agents embed an `AgentCore` and forward the identity methods of
/// [`super::Agent`] to it.
#[derive(Debug)]
pub struct AgentCore {
    id: String,
    name: String,
    capabilities: Vec<String>,
    created_at: DateTime<Utc>,
    tools: ToolBox,
    initialized: OnceCell<()>,
}

impl AgentCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            capabilities: Vec::new(),
            created_at: Utc::now(),
            tools: ToolBox::new(),
            initialized: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn tools(&self) -> &ToolBox {
        &self.tools
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Initialise all registered tools once. Later calls are no-ops once a
    /// call has succeeded.
    pub async fn initialize(&self) -> Result<(), OrchestrationError> {
        self.initialized
            .get_or_try_init(|| async {
                self.tools.initialize_all().await.inspect_err(|e| {
                    tracing::error!(agent = %self.name, error = %e, "[Agent] Tool initialization failed");
                })
            })
            .await
            .map(|_| ())
    }

    /// Turn the outcome of an action into the uniform result shape.
    pub fn finish(
        &self,
        started: Instant,
        outcome: Result<serde_json::Value, OrchestrationError>,
    ) -> AgentResult {
        if let Err(e) = &outcome {
            tracing::debug!(agent = %self.name, error = %e, "[Agent] Action failed");
        }
        AgentResult::from_outcome(&self.id, started, outcome)
    }

    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            agent_id: self.id.clone(),
            agent_name: self.name.clone(),
            capabilities: self.capabilities.clone(),
            tools: self.tools.names(),
            created_at: self.created_at,
        }
    }
}
