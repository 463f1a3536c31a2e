use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::application::{Application, InitBuilder};

#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Keel - run a backend program's endpoints and jobs", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Program JSON file (overrides config file and env vars)
    #[arg(short, long, global = true)]
    pub program: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the program's endpoints
    Routes,

    /// List the program's jobs and their triggers
    Jobs,

    /// Dispatch one request and print the result
    Call {
        /// HTTP method (case-insensitive)
        method: String,

        /// Request path, optionally with a query string
        path: String,

        /// Request body (JSON string)
        #[arg(long)]
        body: Option<String>,

        /// Records to insert first: {"Entity": [{...}]}
        #[arg(long)]
        seed: Option<String>,

        /// Print the database contents afterwards
        #[arg(long)]
        dump: bool,
    },

    /// Run one job immediately and print its result
    RunJob {
        /// Job name
        name: String,

        /// Records to insert first: {"Entity": [{...}]}
        #[arg(long)]
        seed: Option<String>,
    },

    /// Start the scheduler and run until Ctrl-C
    Run,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    let mut builder = InitBuilder::new();
    if let Some(config_path) = cli.config {
        builder = builder.config_path(config_path);
    }
    if let Some(program) = cli.program {
        builder = builder.program_path(program);
    }
    let app = builder.init()?;
    init_tracing(&app.config().logging.filter);

    match cli.command {
        Commands::Routes => {
            let routes = app.routes();
            if routes.is_empty() {
                println!("No endpoints defined");
                return Ok(());
            }
            for (method, path) in routes {
                println!("  {:<7} {}", method, path);
            }
        }

        Commands::Jobs => {
            let jobs = app.jobs();
            if jobs.is_empty() {
                println!("No jobs defined");
                return Ok(());
            }
            for (name, trigger, _) in jobs {
                println!("  {} | {}", name, trigger);
            }
        }

        Commands::Call {
            method,
            path,
            body,
            seed,
            dump,
        } => {
            seed_from_arg(&app, seed.as_deref())?;
            let body: Option<serde_json::Value> = body
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .context("Request body is not valid JSON")?;

            let result = app.dispatch(&method, &path, body)?;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if dump {
                println!("\nDatabase:");
                println!("{}", serde_json::to_string_pretty(&app.dump())?);
            }
        }

        Commands::RunJob { name, seed } => {
            seed_from_arg(&app, seed.as_deref())?;
            let result = app.run_job(&name)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Run => {
            if app.start() {
                println!("✓ Scheduler running {} job(s), Ctrl-C to stop", app.jobs().len());
            } else {
                println!("Scheduler disabled by configuration, Ctrl-C to exit");
            }
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            app.shutdown().await;
            println!("✓ Stopped");
        }
    }

    Ok(())
}

fn seed_from_arg(app: &Application, seed: Option<&str>) -> Result<()> {
    if let Some(seed) = seed {
        let data: serde_json::Value =
            serde_json::from_str(seed).context("Seed data is not valid JSON")?;
        let created = app.seed(&data)?;
        tracing::debug!(created, "seeded database");
    }
    Ok(())
}

/// Install the stderr subscriber; `RUST_LOG` wins over the configured filter
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // A host that already installed a subscriber keeps it
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
