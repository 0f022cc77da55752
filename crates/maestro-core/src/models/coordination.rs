use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::AgentContext;

/// Input to a peer-coordination round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationContext {
    /// Domain that started the round.
    pub initiator: String,
    /// Every domain taking part, in issuance order.
    pub domains: Vec<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub context: AgentContext,
}

/// Responses gathered in a coordination round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationResult {
    pub success: bool,
    pub responses: BTreeMap<String, serde_json::Value>,
    pub conflicts: Vec<String>,
}

impl CoordinationResult {
    pub fn from_parts(responses: BTreeMap<String, serde_json::Value>, conflicts: Vec<String>) -> Self {
        Self {
            success: conflicts.is_empty(),
            responses,
            conflicts,
        }
    }
}
