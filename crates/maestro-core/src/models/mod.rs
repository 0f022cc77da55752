pub mod context;
pub mod coordination;
pub mod result;

pub use context::AgentContext;
pub use coordination::{CoordinationContext, CoordinationResult};
pub use result::{AgentResult, TransferResult};

/// Open parameter mapping passed to `Agent::execute`.
///
/// The recognised key `action` selects the behaviour of the agent.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// The `action` entry of a parameter mapping, if present and a string.
pub fn action_of(parameters: &Parameters) -> Option<&str> {
    parameters.get("action").and_then(|v| v.as_str())
}

/// Build a parameter mapping from a JSON object literal.
///
/// Non-object values produce an empty mapping.
pub fn params(value: serde_json::Value) -> Parameters {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Parameters::new(),
    }
}
