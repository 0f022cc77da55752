//! `${...}` substitution in step parameters.
//!
//! Supported references:
//! - `${params.<path>}` — invocation parameters (dotted path into objects)
//! - `${metadata.<key>}` — context metadata
//! - `${context.correlationId}`, `${context.actorId}`
//! - `${workflow.id}`, `${step.id}`
//! - `${steps.<id>.data[.<path>]}` — output of an earlier successful step;
//!   in a loop this carries over from the previous iteration
//! - `${env.<VAR>}` — process environment
//!
//! `${a | b}` tries each alternative in turn and uses the first that
//! resolves, e.g. `${steps.refine.data | params.goal}`.
//!
//! A string that is exactly one reference is replaced by the referenced JSON
//! value (keeping its type); references embedded in longer text are
//! stringified. Unknown references are left as written.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::models::{AgentContext, Parameters};

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"))
}

/// Values visible to templates while a step is prepared.
pub struct TemplateScope<'a> {
    pub params: &'a Parameters,
    /// Step id → `{ "data": …, "domain": … }` of steps that already succeeded.
    pub steps: &'a Parameters,
    pub context: &'a AgentContext,
    pub workflow_id: &'a str,
    pub step_id: &'a str,
}

impl TemplateScope<'_> {
    fn lookup(&self, reference: &str) -> Option<Value> {
        reference
            .split('|')
            .map(str::trim)
            .find_map(|alternative| self.lookup_one(alternative))
    }

    fn lookup_one(&self, reference: &str) -> Option<Value> {
        let (root, rest) = reference.split_once('.')?;
        match root {
            "params" => lookup_path(self.params, rest),
            "steps" => lookup_path(self.steps, rest),
            "metadata" => self.context.metadata.get(rest).cloned(),
            "context" => match rest {
                "correlationId" => Some(Value::String(self.context.correlation_id.clone())),
                "actorId" => Some(Value::String(self.context.actor_id.clone())),
                _ => None,
            },
            "workflow" if rest == "id" => Some(Value::String(self.workflow_id.to_string())),
            "step" if rest == "id" => Some(Value::String(self.step_id.to_string())),
            "env" => std::env::var(rest).ok().map(Value::String),
            _ => None,
        }
    }

    /// Resolve every string inside `value`, recursing into arrays and
    /// objects.
    pub fn resolve_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => self.resolve_str(s),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.resolve_value(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    pub fn resolve_params(&self, params: &Parameters) -> Parameters {
        params
            .iter()
            .map(|(k, v)| (k.clone(), self.resolve_value(v)))
            .collect()
    }

    fn resolve_str(&self, template: &str) -> Value {
        let re = placeholder_re();

        if let Some(caps) = re.captures(template) {
            if caps.get(0).map(|m| m.as_str().len()) == Some(template.len()) {
                return self
                    .lookup(&caps[1])
                    .unwrap_or_else(|| Value::String(template.to_string()));
            }
        }

        let replaced = re.replace_all(template, |caps: &regex::Captures| match self.lookup(&caps[1]) {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => caps[0].to_string(),
        });
        Value::String(replaced.into_owned())
    }
}

fn lookup_path(params: &Parameters, path: &str) -> Option<Value> {
    let mut segments = path.split('.');
    let mut current = params.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}
