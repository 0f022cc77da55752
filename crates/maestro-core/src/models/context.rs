use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request context handed to every agent call.
///
/// Contexts are never mutated in place: every "change" produces a new copy,
/// so an agent that receives a context cannot affect what its caller (or a
/// sibling in a fan-out) sees. `correlation_id` is carried unchanged across
/// an entire workflow so downstream observers can join results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentContext {
    pub correlation_id: String,
    pub actor_id: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AgentContext {
    /// Build a context with a fresh correlation id.
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self::with_correlation_id(uuid::Uuid::new_v4().to_string(), actor_id)
    }

    pub fn with_correlation_id(correlation_id: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            actor_id: actor_id.into(),
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Copy of this context with one metadata entry added or replaced.
    #[must_use]
    pub fn with_metadata(&self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let mut copy = self.clone();
        copy.metadata.insert(key.into(), value.into());
        copy
    }

    /// Copy of this context with several metadata entries merged in.
    #[must_use]
    pub fn with_metadata_entries<I, K>(&self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        let mut copy = self.clone();
        for (key, value) in entries {
            copy.metadata.insert(key.into(), value);
        }
        copy
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}
