//! Strata CLI - inspect and migrate a metadata database
//!
//! Usage:
//!   strata [--db <path>] [--config <file>] migrate
//!   strata status
//!   strata projects
//!   strata diagram <project-id>
//!   strata stats <project-id> [--text]
//!   strata relationships <project-id>
//!
//! Logging is controlled by `STRATA_LOG` (default `info`), written to stderr.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use strata::config::Settings;
use strata::engine::{EngineError, MetadataEngine};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata - dynamic schema metadata engine")]
#[command(version)]
struct Cli {
    /// Database file (overrides [database].path; `:memory:` for a scratch database)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Config file (defaults to STRATA_CONFIG, ./strata.toml, ~/.strata/strata.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply missing schema steps
    Migrate,

    /// Show which schema pieces are present and missing
    Status,

    /// List projects
    Projects,

    /// Print the entity-relationship diagram of a project
    Diagram {
        /// Project id
        project: String,
    },

    /// Print aggregate statistics of a project
    Stats {
        /// Project id
        project: String,

        /// Human-readable output instead of JSON
        #[arg(long)]
        text: bool,
    },

    /// List explicit and inferred relationships of a project
    Relationships {
        /// Project id
        project: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let settings = match load_settings(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let engine = match MetadataEngine::open(settings) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = run(&engine, cli.command);
    if let Err(e) = engine.shutdown() {
        eprintln!("Error closing database: {}", e);
    }

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error ({:?}): {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("STRATA_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings, EngineError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    };
    if let Some(db) = &cli.db {
        settings.database.path = Some(db.clone());
    }
    Ok(settings)
}

fn run(engine: &MetadataEngine, command: Commands) -> Result<ExitCode, EngineError> {
    match command {
        Commands::Migrate => {
            // Start already evolved the schema; report what it did.
            let report = engine.startup_report();
            print_json(report);
            Ok(exit_code(report.is_success()))
        }
        Commands::Status => {
            let status = engine.get_migration_status()?;
            print_json(&status);
            Ok(exit_code(status.is_current()))
        }
        Commands::Projects => {
            print_json(&engine.store().list_projects()?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Diagram { project } => {
            Ok(print_found(&project, engine.generate_diagram(&project)?))
        }
        Commands::Stats { project, text } => match engine.get_project_stats(&project)? {
            Some(stats) if text => {
                println!("{}", stats);
                Ok(ExitCode::SUCCESS)
            }
            found => Ok(print_found(&project, found)),
        },
        Commands::Relationships { project } => {
            Ok(print_found(&project, engine.list_relationships(&project)?))
        }
    }
}

fn print_found<T: Serialize>(project: &str, value: Option<T>) -> ExitCode {
    match value {
        Some(value) => {
            print_json(&value);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("Project not found: {}", project);
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
