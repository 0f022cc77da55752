//! Parameter schema for tools and the validation pass run before every call.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::Parameters;

/// JSON type a tool parameter must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParameterType {
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            ParameterType::String => value.is_string(),
            ParameterType::Number => value.is_number(),
            ParameterType::Boolean => value.is_boolean(),
            ParameterType::Object => value.is_object(),
            ParameterType::Array => value.is_array(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Boolean => "boolean",
            ParameterType::Object => "object",
            ParameterType::Array => "array",
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Custom check applied after the type check passes.
pub type ParameterValidator = Arc<dyn Fn(&serde_json::Value) -> bool + Send + Sync>;

/// Declaration of a single tool parameter.
#[derive(Clone)]
pub struct ParameterDef {
    pub name: String,
    pub param_type: ParameterType,
    pub required: bool,
    pub default_value: Option<serde_json::Value>,
    pub validator: Option<ParameterValidator>,
}

impl ParameterDef {
    pub fn required(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            default_value: None,
            validator: None,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParameterType) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type)
        }
    }

    #[must_use]
    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }

    #[must_use]
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&serde_json::Value) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }
}

impl fmt::Debug for ParameterDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterDef")
            .field("name", &self.name)
            .field("param_type", &self.param_type)
            .field("required", &self.required)
            .field("default_value", &self.default_value)
            .field("validator", &self.validator.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Outcome of `validate_parameters`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Check `input` against the declared parameters.
///
/// Keys in `input` that are not declared are ignored.
pub fn validate_parameters(defs: &[ParameterDef], input: &Parameters) -> ValidationReport {
    let mut errors = Vec::new();

    for def in defs {
        let value = match input.get(&def.name) {
            Some(serde_json::Value::Null) | None => {
                if def.required {
                    errors.push(format!("Missing required parameter: {}", def.name));
                }
                continue;
            }
            Some(v) => v,
        };

        if !def.param_type.matches(value) {
            errors.push(format!(
                "Parameter {} must be of type {}",
                def.name, def.param_type
            ));
            continue;
        }

        if let Some(validator) = &def.validator {
            if !validator(value) {
                errors.push(format!("Parameter {} failed validation", def.name));
            }
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// Fill in declared defaults for parameters absent from `input`.
pub fn apply_defaults(defs: &[ParameterDef], input: &Parameters) -> Parameters {
    let mut filled = input.clone();
    for def in defs {
        if let Some(default) = &def.default_value {
            if filled.get(&def.name).map_or(true, |v| v.is_null()) {
                filled.insert(def.name.clone(), default.clone());
            }
        }
    }
    filled
}
