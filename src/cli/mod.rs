//! Command-line interface.
//!
//! Every subcommand runs against a [`CliContext`]: a migrated SQLite pool
//! and the transactional [`TaskGraphService`] built on it.

pub mod commands;
pub mod id_resolver;
pub mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;

use crate::adapters::sqlite::{initialize_database, SqliteGraph};
use crate::domain::errors::{DomainError, ErrorKind};
use crate::domain::models::Config;
use crate::services::{StatusEngine, TaskGraphService};

#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(about = "Trellis - task and checklist tracker with status propagation", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to .trellis/config.yaml plus TRELLIS_* variables)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path, overriding the configured one
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Task management commands
    Task(commands::task::TaskArgs),
    /// Checklist commands
    Checklist(commands::checklist::ChecklistArgs),
    /// Review chain commands
    Review(commands::review::ReviewArgs),
    /// Soft-delete a task or checklist together with everything below it
    Delete(commands::delete::DeleteArgs),
    /// Show the audit history of a task or checklist
    Audit(commands::audit::AuditArgs),
}

/// Resources shared by all commands.
pub struct CliContext {
    pub pool: SqlitePool,
    pub service: TaskGraphService<SqliteGraph>,
}

impl CliContext {
    /// Open the configured database, applying migrations as needed.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = initialize_database(&config.database)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;
        let service = TaskGraphService::new(
            Arc::new(SqliteGraph::new(pool.clone())),
            StatusEngine::new(config.engine.clone()),
        );
        Ok(Self { pool, service })
    }
}

/// Run the parsed command.
pub async fn dispatch(cli: Cli, ctx: &CliContext) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Commands::Task(args) => commands::task::execute(args, ctx, json).await,
        Commands::Checklist(args) => commands::checklist::execute(args, ctx, json).await,
        Commands::Review(args) => commands::review::execute(args, ctx, json).await,
        Commands::Delete(args) => commands::delete::execute(args, ctx, json).await,
        Commands::Audit(args) => commands::audit::execute(args, ctx, json).await,
    }
}

/// Process exit code for a failed command.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<DomainError>().map(DomainError::kind) {
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::Conflict) => 4,
        Some(ErrorKind::Precondition) => 5,
        Some(ErrorKind::Authorization) => 6,
        Some(ErrorKind::Internal) => 70,
        None => 1,
    }
}

/// Print the error in the selected output mode and exit.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let kind = err
        .downcast_ref::<DomainError>()
        .map_or("error", |e| e.kind().as_str());
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "kind": kind,
            "error": format!("{err:#}"),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(exit_code(&err))
}
