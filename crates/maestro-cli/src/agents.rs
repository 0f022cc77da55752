//! Demo domain agents wired into every CLI command.
//!
//! | Domain           | Actions                        |
//! |------------------|--------------------------------|
//! | `goal_planning`  | `create_goal`, `refine_goal`   |
//! | `goal_analysis`  | `analyze_goal`                 |
//! | `smart_criteria` | `validate_goal` (tool-backed)  |
//! | `echo`           | `echo`                         |
//! | `workflow`       | workflow agent actions         |

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};

use maestro_core::agent::require_action;
use maestro_core::tools::{ParameterDef, ParameterType};
use maestro_core::{
    Agent, AgentContext, AgentCore, AgentResult, AgentSystem, AgentSystemBuilder, MaestroConfig,
    OrchestrationError, Parameters, Tool, ToolBox, ToolMetadata, WorkflowDefinition,
};

/// Domain the demo workflow agent is registered under.
pub const WORKFLOW_DOMAIN: &str = "workflow";

/// Every demo domain with its agent, in bring-up order.
pub fn demo_agents() -> Vec<(&'static str, Arc<dyn Agent>)> {
    vec![
        ("goal_planning", Arc::new(GoalPlanningAgent::new()) as Arc<dyn Agent>),
        ("goal_analysis", Arc::new(GoalAnalysisAgent::new())),
        ("smart_criteria", Arc::new(SmartCriteriaAgent::new())),
        ("echo", Arc::new(EchoAgent::new())),
    ]
}

/// A system with every demo agent plus a workflow agent holding
/// `definitions`.
pub fn demo_system(config: MaestroConfig, definitions: Vec<WorkflowDefinition>) -> AgentSystem {
    demo_builder(config)
        .workflow_agent(WORKFLOW_DOMAIN, definitions)
        .build()
}

fn demo_builder(config: MaestroConfig) -> AgentSystemBuilder {
    demo_agents()
        .into_iter()
        .fold(AgentSystem::builder(config), |builder, (domain, agent)| builder.agent(domain, agent))
}

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

/// `parameters["goal"]` as an object; a bare string is taken as the title.
fn goal_param(parameters: &Parameters) -> Result<Value, OrchestrationError> {
    match parameters.get("goal") {
        Some(Value::Object(goal)) => Ok(Value::Object(goal.clone())),
        Some(Value::String(title)) => Ok(json!({ "title": title })),
        _ => Err(OrchestrationError::Validation(vec![
            "Missing required parameter: goal".to_string(),
        ])),
    }
}

// ─── Goal planning ────────────────────────────────────────────────────────

pub struct GoalPlanningAgent {
    core: AgentCore,
}

impl GoalPlanningAgent {
    pub fn new() -> Self {
        Self {
            core: AgentCore::new("goal-planning").with_capabilities(["create_goal", "refine_goal"]),
        }
    }

    fn create_goal(&self, parameters: &Parameters) -> Result<Value, OrchestrationError> {
        let title = parameters
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                OrchestrationError::Validation(vec!["Missing required parameter: title".to_string()])
            })?;
        let weeks = parameters.get("weeks").and_then(Value::as_u64).unwrap_or(4).max(1);
        let checkpoints = weeks.min(4);
        let milestones: Vec<Value> = (1..=checkpoints)
            .map(|i| {
                json!({
                    "week": i * weeks / checkpoints,
                    "description": format!("{}: checkpoint {} of {}", title, i, checkpoints),
                })
            })
            .collect();
        Ok(json!({
            "title": title,
            "weeks": weeks,
            "milestones": milestones,
            "refinements": 0,
        }))
    }

    fn refine_goal(&self, parameters: &Parameters) -> Result<Value, OrchestrationError> {
        let mut goal = goal_param(parameters)?;
        let refinements = goal.get("refinements").and_then(Value::as_u64).unwrap_or(0) + 1;
        let title = text(&goal, "title").to_string();
        if let Some(obj) = goal.as_object_mut() {
            obj.insert("refinements".into(), json!(refinements));
            if !title.contains("by week") {
                let weeks = obj.get("weeks").and_then(Value::as_u64).unwrap_or(4);
                obj.insert("title".into(), json!(format!("{} by week {}", title, weeks)));
            }
        }
        Ok(goal)
    }
}

impl Default for GoalPlanningAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for GoalPlanningAgent {
    fn id(&self) -> &str {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn capabilities(&self) -> Vec<String> {
        self.core.capabilities().to_vec()
    }

    async fn execute(&self, _context: &AgentContext, parameters: &Parameters) -> AgentResult {
        let started = Instant::now();
        let outcome = require_action(parameters).and_then(|action| match action {
            "create_goal" => self.create_goal(parameters),
            "refine_goal" => self.refine_goal(parameters),
            other => Err(OrchestrationError::UnknownAction(other.to_string())),
        });
        self.core.finish(started, outcome)
    }
}

// ─── Goal analysis ────────────────────────────────────────────────────────

pub struct GoalAnalysisAgent {
    core: AgentCore,
}

impl GoalAnalysisAgent {
    pub fn new() -> Self {
        Self {
            core: AgentCore::new("goal-analysis").with_capabilities(["analyze_goal"]),
        }
    }
}

impl Default for GoalAnalysisAgent {
    fn default() -> Self {
        Self::new()
    }
}

/// Rough effort estimate from the goal's title and milestone count.
fn analyze(goal: &Value) -> Value {
    let title = text(goal, "title");
    let words = title.split_whitespace().count();
    let milestones = goal
        .get("milestones")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    let complexity = match words + milestones * 2 {
        0..=4 => "low",
        5..=10 => "medium",
        _ => "high",
    };
    let mut risks = Vec::new();
    if !title.chars().any(|c| c.is_ascii_digit()) {
        risks.push("No measurable target in the title");
    }
    if milestones == 0 {
        risks.push("No milestones defined");
    }
    json!({
        "title": title,
        "complexity": complexity,
        "milestones": milestones,
        "risks": risks,
    })
}

#[async_trait]
impl Agent for GoalAnalysisAgent {
    fn id(&self) -> &str {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn capabilities(&self) -> Vec<String> {
        self.core.capabilities().to_vec()
    }

    async fn execute(&self, context: &AgentContext, parameters: &Parameters) -> AgentResult {
        let started = Instant::now();
        let outcome = require_action(parameters).and_then(|action| match action {
            "analyze_goal" => goal_param(parameters).map(|goal| {
                let mut analysis = analyze(&goal);
                analysis["analyzedFor"] = json!(context.actor_id);
                analysis
            }),
            other => Err(OrchestrationError::UnknownAction(other.to_string())),
        });
        self.core.finish(started, outcome)
    }
}

// ─── SMART criteria ───────────────────────────────────────────────────────

/// Scores a goal against the SMART criteria.
pub struct SmartGoalTool {
    metadata: ToolMetadata,
}

impl SmartGoalTool {
    pub fn new() -> Self {
        Self {
            metadata: ToolMetadata::new("smart_goal", "validation")
                .describe("Score a goal against the SMART criteria")
                .param(ParameterDef::required("goal", ParameterType::Object))
                .param(
                    ParameterDef::optional("threshold", ParameterType::Number)
                        .with_default(json!(60))
                        .with_validator(|v| v.as_f64().is_some_and(|t| (0.0..=100.0).contains(&t))),
                ),
        }
    }
}

impl Default for SmartGoalTool {
    fn default() -> Self {
        Self::new()
    }
}

fn score_text(value: &str, keywords: &[&str], wants_digit: bool) -> u64 {
    let lower = value.to_lowercase();
    let mut score = 0;
    if value.len() > 15 {
        score += 40;
    }
    if keywords.iter().any(|k| lower.contains(k)) {
        score += 30;
    }
    if !wants_digit || value.chars().any(|c| c.is_ascii_digit()) {
        score += 30;
    }
    score
}

#[async_trait]
impl Tool for SmartGoalTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: Parameters) -> Result<Value, OrchestrationError> {
        let goal = input.get("goal").cloned().unwrap_or_default();
        let threshold = input.get("threshold").and_then(Value::as_f64).unwrap_or(60.0);

        let criteria = [
            ("specific", score_text(text(&goal, "specific"), &["what", "who", "where"], false)),
            ("measurable", score_text(text(&goal, "measurable"), &["track", "measure", "count"], true)),
            ("achievable", score_text(text(&goal, "achievable"), &["realistic", "skills", "resources"], false)),
            ("relevant", score_text(text(&goal, "relevant"), &["because", "important", "priority"], false)),
            ("timeBound", score_text(text(&goal, "timeBound"), &["by", "deadline", "week", "month"], true)),
        ];
        let overall = criteria.iter().map(|(_, s)| *s).sum::<u64>() as f64 / criteria.len() as f64;
        let scores: serde_json::Map<String, Value> = criteria
            .iter()
            .map(|(name, score)| (name.to_string(), json!(score)))
            .collect();

        Ok(json!({
            "scores": scores,
            "overallScore": overall,
            "passed": overall >= threshold,
        }))
    }
}

pub struct SmartCriteriaAgent {
    core: AgentCore,
}

impl SmartCriteriaAgent {
    pub fn new() -> Self {
        let core = AgentCore::new("smart-criteria").with_capabilities(["validate_goal"]);
        core.tools().register(Arc::new(SmartGoalTool::new()));
        Self { core }
    }
}

impl Default for SmartCriteriaAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for SmartCriteriaAgent {
    fn id(&self) -> &str {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn capabilities(&self) -> Vec<String> {
        self.core.capabilities().to_vec()
    }

    fn tools(&self) -> Option<&ToolBox> {
        Some(self.core.tools())
    }

    async fn initialize(&self) -> Result<(), OrchestrationError> {
        self.core.initialize().await
    }

    async fn execute(&self, _context: &AgentContext, parameters: &Parameters) -> AgentResult {
        let started = Instant::now();
        let action = match require_action(parameters) {
            Ok(action) => action,
            Err(e) => return self.core.finish(started, Err(e)),
        };
        if action != "validate_goal" {
            return self
                .core
                .finish(started, Err(OrchestrationError::UnknownAction(action.to_string())));
        }

        let mut input = Parameters::new();
        if let Some(goal) = parameters.get("goal") {
            input.insert("goal".into(), goal.clone());
        }
        if let Some(threshold) = parameters.get("threshold") {
            input.insert("threshold".into(), threshold.clone());
        }

        let outcome = match self.use_tool("smart_goal", &input).await {
            Ok(result) if result.success => Ok(result.data.unwrap_or_default()),
            Ok(result) => Err(OrchestrationError::execution(result.error.unwrap_or_default())),
            Err(e) => Err(e),
        };
        self.core.finish(started, outcome)
    }
}

// ─── Echo ─────────────────────────────────────────────────────────────────

/// Returns its parameters and context; handy for fan-out smoke tests.
pub struct EchoAgent {
    core: AgentCore,
}

impl EchoAgent {
    pub fn new() -> Self {
        Self {
            core: AgentCore::new("echo").with_capabilities(["echo"]),
        }
    }
}

impl Default for EchoAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for EchoAgent {
    fn id(&self) -> &str {
        self.core.id()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn capabilities(&self) -> Vec<String> {
        self.core.capabilities().to_vec()
    }

    async fn execute(&self, context: &AgentContext, parameters: &Parameters) -> AgentResult {
        let started = Instant::now();
        let outcome = require_action(parameters).and_then(|action| match action {
            "echo" => Ok(json!({
                "parameters": parameters,
                "correlationId": context.correlation_id,
                "actorId": context.actor_id,
                "metadata": context.metadata,
            })),
            other => Err(OrchestrationError::UnknownAction(other.to_string())),
        });
        self.core.finish(started, outcome)
    }
}
