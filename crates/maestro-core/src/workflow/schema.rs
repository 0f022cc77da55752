//! Workflow definition types and their YAML form.
//!
//! ```yaml
//! id: "goal-refinement"
//! name: "Goal refinement"
//! type: loop            # sequential | parallel | loop
//! max_retries: 1
//! timeout_ms: 30000
//! loop_condition:
//!   kind: count         # count | time | predicate
//!   max_iterations: 3
//!
//! steps:
//!   - id: "refine"
//!     target: "goal_planning"
//!     parameters:
//!       action: "refine_goal"
//!       goal: "${params.goal}"
//!
//!   - id: "analyze"
//!     target: "@resolve"  # resolved at run time from the context
//!     parameters:
//!       action: "analyze_goal"
//!     dependencies: ["refine"]
//! ```

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::OrchestrationError;
use crate::models::Parameters;

/// Control-flow strategy of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowType {
    Sequential,
    Parallel,
    Loop,
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WorkflowType::Sequential => "sequential",
            WorkflowType::Parallel => "parallel",
            WorkflowType::Loop => "loop",
        })
    }
}

/// YAML spelling of [`StepTarget::Resolve`].
pub const RESOLVE_TARGET: &str = "@resolve";

/// Where a step is sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepTarget {
    /// A literal domain key.
    Domain(String),
    /// Resolved when the step runs, by the engine's `DomainResolver`.
    Resolve,
}

impl StepTarget {
    pub fn domain(key: impl Into<String>) -> Self {
        StepTarget::Domain(key.into())
    }
}

impl From<String> for StepTarget {
    fn from(value: String) -> Self {
        if value == RESOLVE_TARGET {
            StepTarget::Resolve
        } else {
            StepTarget::Domain(value)
        }
    }
}

impl From<StepTarget> for String {
    fn from(target: StepTarget) -> Self {
        match target {
            StepTarget::Domain(key) => key,
            StepTarget::Resolve => RESOLVE_TARGET.to_string(),
        }
    }
}

impl fmt::Display for StepTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepTarget::Domain(key) => f.write_str(key),
            StepTarget::Resolve => f.write_str(RESOLVE_TARGET),
        }
    }
}

/// A single step of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Unique within its definition.
    pub id: String,

    pub target: StepTarget,

    /// Merged over the invocation parameters; string values may contain
    /// `${...}` placeholders.
    #[serde(default)]
    pub parameters: Parameters,

    /// Declared ordering constraints. Advisory: runners execute in list
    /// order regardless.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub dependencies: BTreeSet<String>,
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, target: StepTarget) -> Self {
        Self {
            id: id.into(),
            target,
            parameters: Parameters::new(),
            dependencies: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    #[must_use]
    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.dependencies.insert(step_id.into());
        self
    }
}

/// Serialisable form of a loop condition.
///
/// Accepts both `snake_case` (YAML) and `camelCase` (JSON parameters) field
/// names. A `predicate` condition has no serialisable function, so unless a
/// predicate is supplied programmatically the loop stops after its first
/// iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LoopConditionSpec {
    Count {
        #[serde(default, alias = "maxIterations", skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u32>,
    },
    Time {
        #[serde(default, alias = "maxDurationMillis", skip_serializing_if = "Option::is_none")]
        max_duration_ms: Option<u64>,
    },
    Predicate,
}

fn default_timeout_ms() -> u64 {
    300_000
}

/// Top-level workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique within an engine.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type")]
    pub workflow_type: WorkflowType,

    pub steps: Vec<WorkflowStep>,

    /// Extra attempts per step after the first one fails.
    #[serde(default)]
    pub max_retries: u32,

    /// Bound on a single step attempt.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Loop workflows only; overridable per invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_condition: Option<LoopConditionSpec>,
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>, workflow_type: WorkflowType, steps: Vec<WorkflowStep>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            workflow_type,
            steps,
            max_retries: 0,
            timeout_ms: default_timeout_ms(),
            loop_condition: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_loop_condition(mut self, condition: LoopConditionSpec) -> Self {
        self.loop_condition = Some(condition);
        self
    }

    /// Parse and validate a definition from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, OrchestrationError> {
        let definition: Self = serde_yaml::from_str(yaml).map_err(|e| {
            OrchestrationError::Config(format!("Failed to parse workflow YAML: {}", e))
        })?;
        definition.validate()?;
        Ok(definition)
    }

    /// Load a definition from a file path.
    pub fn from_file(path: &str) -> Result<Self, OrchestrationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrchestrationError::Config(format!("Failed to read workflow file '{}': {}", path, e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> Result<String, OrchestrationError> {
        serde_yaml::to_string(self)
            .map_err(|e| OrchestrationError::Config(format!("Failed to render workflow YAML: {}", e)))
    }

    /// Structural checks applied when loading from text. The engine itself
    /// accepts any definition.
    pub fn validate(&self) -> Result<(), OrchestrationError> {
        let mut errors = Vec::new();

        if self.id.trim().is_empty() {
            errors.push("Workflow id must not be empty".to_string());
        }
        if self.timeout_ms == 0 {
            errors.push(format!("Workflow {} timeout_ms must be greater than 0", self.id));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                errors.push(format!("Duplicate step id: {}", step.id));
            }
            if let StepTarget::Domain(key) = &step.target {
                if key.trim().is_empty() {
                    errors.push(format!("Step {} has an empty target domain", step.id));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(OrchestrationError::Validation(errors))
        }
    }

    /// `(step, dependency)` pairs whose dependency names no step of this
    /// definition.
    pub fn unresolved_dependencies(&self) -> Vec<(String, String)> {
        let ids: HashSet<&str> = self.steps.iter().map(|s| s.id.as_str()).collect();
        self.steps
            .iter()
            .flat_map(|step| {
                step.dependencies
                    .iter()
                    .filter(|dep| !ids.contains(dep.as_str()))
                    .map(move |dep| (step.id.clone(), dep.clone()))
            })
            .collect()
    }
}
