//! Maestro CLI — run agent workflows, fan-outs and coordination rounds.
//!
//! Every command builds the demo agent system from maestro-core, runs a
//! single operation and prints the result as JSON.

use clap::{CommandFactory, Parser, Subcommand};

use maestro_cli::commands;
use maestro_cli::commands::workflow::RunOptions;

/// Maestro CLI — multi-agent orchestration
#[derive(Parser)]
#[command(name = "maestro", version, about = "Maestro CLI — multi-agent orchestration")]
pub struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true, env = "MAESTRO_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run or validate YAML-defined workflows
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },

    /// Send one action to several domains concurrently
    Fanout {
        /// Comma separated target domains
        #[arg(long)]
        domains: String,
        /// Action passed to every target
        #[arg(long)]
        action: String,
        /// Extra parameters as key=value (repeatable)
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
    },

    /// Run a peer coordination round
    Coordinate {
        /// Initiating actor
        #[arg(long, default_value = "cli")]
        initiator: String,
        /// Comma separated participating domains
        #[arg(long)]
        domains: String,
        /// Payload as a JSON string
        #[arg(long)]
        payload: Option<String>,
    },

    /// List registered agents and their capabilities
    Agents,
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// Execute a workflow file
    Run {
        /// Path to the workflow YAML file
        file: String,
        /// Domain used by `@resolve` steps
        #[arg(long)]
        domain: Option<String>,
        /// Workflow parameters as key=value (repeatable)
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
        /// Actor recorded on the context
        #[arg(long)]
        actor: Option<String>,
        /// Correlation id to reuse instead of a fresh one
        #[arg(long)]
        correlation_id: Option<String>,
    },
    /// Parse and check a workflow file without running it
    Validate {
        /// Path to the workflow YAML file
        file: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "maestro_core=warn,maestro_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        println!();
        return;
    };

    let result = match command {
        Commands::Workflow { action } => match action {
            WorkflowAction::Run {
                file,
                domain,
                params,
                actor,
                correlation_id,
            } => match commands::load_config(cli.config.as_deref()) {
                Ok(config) => {
                    let options = RunOptions {
                        domain,
                        params,
                        actor,
                        correlation_id,
                    };
                    commands::workflow::run(config, &file, options).await
                }
                Err(e) => Err(e),
            },
            WorkflowAction::Validate { file } => commands::workflow::validate(&file).await,
        },

        Commands::Fanout {
            domains,
            action,
            params,
        } => match commands::load_config(cli.config.as_deref()) {
            Ok(config) => commands::fanout::run(config, &domains, &action, &params).await,
            Err(e) => Err(e),
        },

        Commands::Coordinate {
            initiator,
            domains,
            payload,
        } => match commands::load_config(cli.config.as_deref()) {
            Ok(config) => commands::coordinate::run(config, &initiator, &domains, payload.as_deref()).await,
            Err(e) => Err(e),
        },

        Commands::Agents => match commands::load_config(cli.config.as_deref()) {
            Ok(config) => commands::agents::list(config).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
