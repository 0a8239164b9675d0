//! taskloop CLI: the main entry point.
//!
//! Commands:
//! - `init`    Write a default config file
//! - `run`     Run one task through the orchestrator and print the result
//! - `search`  Rank workspace files against a query
//! - `tools`   List the registered tools

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "taskloop",
    about = "taskloop: bounded gather/act/verify task orchestration",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.taskloop/config.toml
    #[arg(short, long, global = true, env = "TASKLOOP_CONFIG")]
    config: Option<PathBuf>,

    /// Override the workspace root
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Run a task through the gather/act/verify loop
    Run {
        /// Task type (search, code, feature, test, bugfix, refactor, ...)
        #[arg(short, long)]
        kind: String,

        /// What the task should accomplish
        #[arg(short, long)]
        description: String,

        /// Task priority
        #[arg(short, long, default_value_t = 0)]
        priority: i32,

        /// Extra context entries as key=value (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Override orchestrator.max_iterations
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// Rank cached workspace files against a query
    Search {
        /// Free-text query
        query: String,

        /// Show at most this many results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List registered tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let opts = commands::GlobalOpts {
        config: cli.config,
        workspace: cli.workspace,
    };

    match cli.command {
        Commands::Init { force } => commands::init::run(&opts, force).await?,
        Commands::Run {
            kind,
            description,
            priority,
            set,
            max_iterations,
        } => {
            commands::run::run(
                &opts,
                commands::run::RunArgs {
                    kind,
                    description,
                    priority,
                    set,
                    max_iterations,
                },
            )
            .await?
        }
        Commands::Search { query, limit } => commands::search::run(&opts, &query, limit).await?,
        Commands::Tools => commands::tools::run(&opts).await?,
    }

    Ok(())
}
