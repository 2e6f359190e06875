//! Checklist CLI commands.

use anyhow::Result;
use clap::{ArgGroup, Args, Subcommand};
use serde::Serialize;

use crate::cli::commands::{ActionOutput, ActorArg};
use crate::cli::id_resolver::{resolve_checklist_id, resolve_task_id};
use crate::cli::output::{checklist_table, output, CommandOutput};
use crate::cli::CliContext;
use crate::domain::models::Checklist;

#[derive(Args, Debug)]
pub struct ChecklistArgs {
    #[command(subcommand)]
    pub command: ChecklistCommands,
}

#[derive(Subcommand, Debug)]
pub enum ChecklistCommands {
    /// Add a checklist to a task (a review's checklist goes to the task it reviews)
    Add {
        /// Task ID or unique prefix
        task: String,
        /// Checklist name
        name: String,
        #[command(flatten)]
        actor: ActorArg,
    },
    /// List the live checklists of a task
    List {
        /// Task ID or unique prefix
        task: String,
    },
    /// Mark a checklist complete or incomplete and propagate
    #[command(group(ArgGroup::new("state").required(true).args(["done", "undone"])))]
    Toggle {
        /// Checklist ID or unique prefix
        id: String,
        /// Mark complete
        #[arg(long)]
        done: bool,
        /// Mark incomplete
        #[arg(long)]
        undone: bool,
        #[command(flatten)]
        actor: ActorArg,
    },
    /// Rename a checklist
    Rename {
        /// Checklist ID or unique prefix
        id: String,
        /// New name
        name: String,
        #[command(flatten)]
        actor: ActorArg,
    },
    /// Regress a checklist and reopen everything above it
    Cascade {
        /// Checklist ID or unique prefix
        id: String,
        #[command(flatten)]
        actor: ActorArg,
    },
}

#[derive(Debug, Serialize)]
pub struct ChecklistListOutput {
    pub checklists: Vec<Checklist>,
    pub total: usize,
}

impl CommandOutput for ChecklistListOutput {
    fn to_human(&self) -> String {
        if self.checklists.is_empty() {
            return "No checklists found.".to_string();
        }
        format!("Found {} checklist(s):\n{}", self.total, checklist_table(&self.checklists))
    }
}

#[derive(Debug, Serialize)]
pub struct ChecklistOutput {
    pub success: bool,
    pub checklist: Checklist,
}

impl CommandOutput for ChecklistOutput {
    fn to_human(&self) -> String {
        let state = if self.checklist.is_completed { "complete" } else { "incomplete" };
        format!("Checklist {} ({}) is {state}", self.checklist.id, self.checklist.name)
    }
}

pub async fn execute(args: ChecklistArgs, ctx: &CliContext, json_mode: bool) -> Result<()> {
    match args.command {
        ChecklistCommands::Add { task, name, actor } => {
            let task_id = resolve_task_id(&ctx.pool, &task).await?;
            let checklist = ctx
                .service
                .add_checklist(task_id, name, &actor.actor_id())
                .await?;
            output(&ChecklistOutput { success: true, checklist }, json_mode);
        }

        ChecklistCommands::List { task } => {
            let task_id = resolve_task_id(&ctx.pool, &task).await?;
            let checklists = ctx.service.checklists_of(task_id).await?;
            let out = ChecklistListOutput {
                total: checklists.len(),
                checklists,
            };
            output(&out, json_mode);
        }

        ChecklistCommands::Toggle { id, done, undone: _, actor } => {
            let checklist_id = resolve_checklist_id(&ctx.pool, &id).await?;
            ctx.service
                .toggle_checklist(checklist_id, done, &actor.actor_id())
                .await?;
            let checklist = ctx.service.get_checklist(checklist_id).await?;
            output(&ChecklistOutput { success: true, checklist }, json_mode);
        }

        ChecklistCommands::Rename { id, name, actor } => {
            let checklist_id = resolve_checklist_id(&ctx.pool, &id).await?;
            let checklist = ctx
                .service
                .rename_checklist(checklist_id, name, &actor.actor_id())
                .await?;
            output(&ChecklistOutput { success: true, checklist }, json_mode);
        }

        ChecklistCommands::Cascade { id, actor } => {
            let checklist_id = resolve_checklist_id(&ctx.pool, &id).await?;
            ctx.service
                .cascade_incomplete(checklist_id, &actor.actor_id())
                .await?;
            output(
                &ActionOutput::ok(format!("Incompletion cascaded from {checklist_id}")),
                json_mode,
            );
        }
    }

    Ok(())
}
