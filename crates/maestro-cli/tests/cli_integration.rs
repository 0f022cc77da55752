//! Integration tests for the maestro-cli commands.
//!
//! These tests exercise the same code paths as the binary: workflow files
//! are written to a temporary directory and run against the demo agents.

use std::path::PathBuf;

use maestro_cli::commands;
use maestro_cli::commands::workflow::RunOptions;
use maestro_core::MaestroConfig;
use tempfile::TempDir;

/// Write `yaml` into a fresh temp dir and return (dir guard, file path).
fn workflow_file(yaml: &str) -> (TempDir, String) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path: PathBuf = dir.path().join("workflow.yaml");
    std::fs::write(&path, yaml).expect("Failed to write workflow file");
    (dir, path.to_string_lossy().into_owned())
}

fn test_config() -> MaestroConfig {
    let mut config = MaestroConfig::default();
    config.engine.retry_backoff_ms = 1;
    config
}

const ONBOARDING: &str = r#"
id: "goal-onboarding"
name: "Goal onboarding"
type: sequential
steps:
  - id: "plan"
    target: "goal_planning"
    parameters:
      action: "create_goal"
      title: "${params.title}"
      weeks: "${params.weeks}"
  - id: "analyze"
    target: "goal_analysis"
    parameters:
      action: "analyze_goal"
      goal: "${steps.plan.data}"
    dependencies: ["plan"]
  - id: "smart"
    target: "smart_criteria"
    parameters:
      action: "validate_goal"
      goal:
        specific: "Read what matters to me at home"
        measurable: "Track and count 12 books"
        timeBound: "Finish by week 12 deadline"
    dependencies: ["analyze"]
"#;

#[tokio::test]
async fn test_workflow_run_sequential() {
    let (_dir, path) = workflow_file(ONBOARDING);
    let options = RunOptions {
        params: vec!["title=Read 12 books".to_string(), "weeks=12".to_string()],
        ..Default::default()
    };

    let result = commands::workflow::execute(test_config(), &path, &options)
        .await
        .expect("workflow should load");

    assert!(result.success, "workflow failed: {:?}", result.error);
    let data = result.data.expect("Expected run data");
    assert_eq!(data["workflowId"], "goal-onboarding");
    assert_eq!(data["status"], "completed");

    let steps = data["steps"].as_array().expect("Expected steps array");
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[0]["stepId"], "plan");
    assert_eq!(steps[0]["domain"], "goal_planning");
    assert_eq!(steps[0]["result"]["data"]["weeks"], 12);
    assert_eq!(steps[0]["result"]["data"]["milestones"].as_array().unwrap().len(), 4);
    assert_eq!(steps[1]["result"]["data"]["title"], "Read 12 books");
    assert_eq!(steps[1]["result"]["data"]["milestones"], 4);
    assert!(steps[2]["result"]["data"]["overallScore"].is_number());
}

#[tokio::test]
async fn test_workflow_run_reuses_correlation_id_and_resolves_domain() {
    let (_dir, path) = workflow_file(
        r#"
id: "resolve-demo"
type: sequential
steps:
  - id: "ping"
    target: "@resolve"
    parameters:
      action: "echo"
      note: "${context.correlationId}"
"#,
    );
    let options = RunOptions {
        domain: Some("echo".to_string()),
        actor: Some("tester".to_string()),
        correlation_id: Some("corr-42".to_string()),
        ..Default::default()
    };

    let result = commands::workflow::execute(test_config(), &path, &options).await.unwrap();
    assert!(result.success, "workflow failed: {:?}", result.error);

    let step = &result.data.unwrap()["steps"][0];
    assert_eq!(step["domain"], "echo");
    let echoed = &step["result"]["data"];
    assert_eq!(echoed["correlationId"], "corr-42");
    assert_eq!(echoed["actorId"], "tester");
    assert_eq!(echoed["parameters"]["note"], "corr-42");
    assert_eq!(echoed["metadata"]["workflowId"], "resolve-demo");
    assert_eq!(echoed["metadata"]["stepId"], "ping");
}

#[tokio::test]
async fn test_workflow_run_loop_counts_iterations() {
    let (_dir, path) = workflow_file(
        r#"
id: "goal-refinement"
type: loop
loop_condition:
  kind: count
  max_iterations: 3
steps:
  - id: "refine"
    target: "goal_planning"
    parameters:
      action: "refine_goal"
      goal: "${params.goal}"
"#,
    );
    let options = RunOptions {
        params: vec![r#"goal={"title":"Run 5k","weeks":6}"#.to_string()],
        ..Default::default()
    };

    let result = commands::workflow::execute(test_config(), &path, &options).await.unwrap();
    assert!(result.success, "workflow failed: {:?}", result.error);

    let data = result.data.unwrap();
    assert_eq!(data["totalIterations"], 3);
    let iterations = data["iterations"].as_array().unwrap();
    assert_eq!(iterations.len(), 3);
    assert_eq!(iterations[2]["steps"][0]["result"]["data"]["title"], "Run 5k by week 6");
}

#[tokio::test]
async fn test_goal_refinement_feeds_each_iteration_the_last_result() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../workflows/goal-refinement.yaml");
    let options = RunOptions {
        params: vec![r#"goal={"title":"Run 5k","weeks":6}"#.to_string()],
        ..Default::default()
    };

    let result = commands::workflow::execute(test_config(), &path.to_string_lossy(), &options)
        .await
        .unwrap();
    assert!(result.success, "workflow failed: {:?}", result.error);

    let data = result.data.unwrap();
    let iterations = data["iterations"].as_array().unwrap();
    assert_eq!(iterations.len(), 3);
    for (i, iteration) in iterations.iter().enumerate() {
        let refined = &iteration["steps"][0]["result"]["data"];
        assert_eq!(refined["refinements"], i as u64 + 1);
        assert_eq!(refined["title"], "Run 5k by week 6");
        // analysis sees the goal refined in the same iteration
        assert_eq!(iteration["steps"][1]["result"]["data"]["title"], "Run 5k by week 6");
    }
}

#[tokio::test]
async fn test_workflow_run_finds_definitions_in_configured_dirs() {
    let flows = TempDir::new().unwrap();
    std::fs::write(
        flows.path().join("checkup.yaml"),
        "id: \"team-checkup\"\ntype: sequential\nsteps:\n  - id: \"ping\"\n    target: \"echo\"\n",
    )
    .unwrap();
    let mut config = test_config();
    config.workflow_dirs = vec![flows.path().to_string_lossy().into_owned()];

    let found = commands::workflow::discover(&config);
    let checkup = found.iter().find(|d| d.id == "team-checkup").expect("configured dir not loaded");
    assert_eq!(checkup.steps.len(), 1);

    // the file on the command line replaces a discovered definition with the same id
    let (_dir, path) = workflow_file(
        r#"
id: "team-checkup"
type: sequential
steps:
  - id: "first"
    target: "echo"
    parameters:
      action: "echo"
  - id: "second"
    target: "echo"
    parameters:
      action: "echo"
"#,
    );
    let result = commands::workflow::execute(config, &path, &RunOptions::default()).await.unwrap();
    assert!(result.success, "workflow failed: {:?}", result.error);
    assert_eq!(result.data.unwrap()["steps"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_workflow_run_fails_on_unknown_domain() {
    let (_dir, path) = workflow_file(
        r#"
id: "broken"
type: sequential
max_retries: 0
steps:
  - id: "first"
    target: "echo"
    parameters:
      action: "echo"
  - id: "second"
    target: "nowhere"
    parameters:
      action: "echo"
"#,
    );

    let result = commands::workflow::execute(test_config(), &path, &RunOptions::default())
        .await
        .unwrap();
    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("second"), "unexpected error: {}", error);
    assert!(error.contains("nowhere"), "unexpected error: {}", error);

    let err = commands::workflow::run(test_config(), &path, RunOptions::default())
        .await
        .unwrap_err();
    assert!(err.starts_with("Workflow failed:"));
}

#[tokio::test]
async fn test_workflow_run_missing_file() {
    let result = commands::workflow::execute(test_config(), "/nonexistent/workflow.yaml", &RunOptions::default()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_workflow_validate() {
    let (_dir, path) = workflow_file(ONBOARDING);
    assert!(commands::workflow::validate(&path).await.is_ok());

    let (_dir, bad) = workflow_file("id: \"x\"\ntype: sideways\nsteps: []\n");
    assert!(commands::workflow::validate(&bad).await.is_err());
}

#[tokio::test]
async fn test_fanout_reports_missing_domains() {
    let result = commands::fanout::execute(test_config(), "echo, ghost", "echo", &["k=1".to_string()])
        .await
        .unwrap();

    assert!(!result.success);
    assert!(result.results.contains_key("echo"));
    assert_eq!(result.results["echo"].data.as_ref().unwrap()["parameters"]["k"], 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors["ghost"].contains("ghost"));
}

#[tokio::test]
async fn test_fanout_failed_agent_stays_in_results() {
    let result = commands::fanout::execute(test_config(), "echo,goal_analysis", "echo", &[])
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.results["echo"].success);
    assert!(!result.results["goal_analysis"].success);
    assert_eq!(result.results["goal_analysis"].error.as_deref(), Some("Unknown action: echo"));
}

#[tokio::test]
async fn test_fanout_requires_domains() {
    assert!(commands::fanout::execute(test_config(), " , ", "echo", &[]).await.is_err());
}

#[tokio::test]
async fn test_coordinate() {
    let result = commands::coordinate::execute(
        test_config(),
        "planner",
        "goal_planning,goal_analysis",
        Some(r#"{"topic":"quarterly goals"}"#),
    )
    .await
    .unwrap();
    assert!(result.success);
    assert!(result.responses.contains_key("goal_planning"));
    assert!(result.responses.contains_key("goal_analysis"));
    assert!(result.conflicts.is_empty());

    let result = commands::coordinate::execute(test_config(), "planner", "goal_planning,ghost", None)
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.conflicts.len(), 1);
    assert!(result.conflicts[0].starts_with("ghost:"));
}

#[tokio::test]
async fn test_coordinate_rejects_bad_payload() {
    let err = commands::coordinate::execute(test_config(), "cli", "echo", Some("{not json"))
        .await
        .unwrap_err();
    assert!(err.starts_with("Invalid payload JSON"));
}

#[tokio::test]
async fn test_agents_list() {
    let agents = commands::agents::collect(test_config()).await.unwrap();
    let domains: Vec<&str> = agents.iter().map(|(d, _)| d.as_str()).collect();
    assert_eq!(
        domains,
        vec!["echo", "goal_analysis", "goal_planning", "smart_criteria", "workflow"]
    );

    let (_, smart) = agents.iter().find(|(d, _)| d == "smart_criteria").unwrap();
    assert_eq!(smart.tools, vec!["smart_goal"]);

    let (_, workflow) = agents.iter().find(|(d, _)| d == "workflow").unwrap();
    assert!(workflow.capabilities.iter().any(|c| c == "execute_workflow"));
}

#[test]
fn test_sample_workflows_load() {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../workflows");
    let mut loader = maestro_core::WorkflowLoader::new();
    assert_eq!(loader.load_dir(&dir).expect("sample workflows should parse"), 3);
    assert!(loader.get("goal-onboarding").is_some());
    assert!(loader.get("goal-checkup").is_some());
    assert!(loader.get("goal-refinement").is_some());
}
