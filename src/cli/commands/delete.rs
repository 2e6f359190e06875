//! Cascade delete CLI command.

use anyhow::Result;
use clap::{ArgGroup, Args};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::commands::ActorArg;
use crate::cli::id_resolver::{resolve_checklist_id, resolve_task_id};
use crate::cli::output::{output, short_id, CommandOutput};
use crate::cli::CliContext;
use crate::services::{DeleteTarget, DeletionClosure};

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("root").required(true).args(["task", "checklist"])))]
pub struct DeleteArgs {
    /// Root task ID or unique prefix
    #[arg(long)]
    pub task: Option<String>,
    /// Root checklist ID or unique prefix
    #[arg(long)]
    pub checklist: Option<String>,
    /// Only show what would be deleted
    #[arg(long)]
    pub dry_run: bool,
    #[command(flatten)]
    pub actor: ActorArg,
}

#[derive(Debug, Serialize)]
pub struct DeleteOutput {
    pub success: bool,
    pub dry_run: bool,
    pub task_ids: Vec<Uuid>,
    pub checklist_ids: Vec<Uuid>,
}

impl DeleteOutput {
    fn new(closure: DeletionClosure, dry_run: bool) -> Self {
        let mut task_ids: Vec<Uuid> = closure.task_ids.into_iter().collect();
        let mut checklist_ids: Vec<Uuid> = closure.checklist_ids.into_iter().collect();
        task_ids.sort_unstable();
        checklist_ids.sort_unstable();
        Self {
            success: true,
            dry_run,
            task_ids,
            checklist_ids,
        }
    }
}

impl CommandOutput for DeleteOutput {
    fn to_human(&self) -> String {
        let verb = if self.dry_run { "Would delete" } else { "Deleted" };
        let mut lines = vec![format!(
            "{verb} {} task(s) and {} checklist(s)",
            self.task_ids.len(),
            self.checklist_ids.len()
        )];
        lines.extend(self.task_ids.iter().map(|id| format!("  task      {}", short_id(id))));
        lines.extend(self.checklist_ids.iter().map(|id| format!("  checklist {}", short_id(id))));
        lines.join("\n")
    }
}

pub async fn execute(args: DeleteArgs, ctx: &CliContext, json_mode: bool) -> Result<()> {
    let task_id = match &args.task {
        Some(prefix) => Some(resolve_task_id(&ctx.pool, prefix).await?),
        None => None,
    };
    let checklist_id = match &args.checklist {
        Some(prefix) => Some(resolve_checklist_id(&ctx.pool, prefix).await?),
        None => None,
    };
    let target = DeleteTarget::from_parts(task_id, checklist_id)?;

    let closure = if args.dry_run {
        ctx.service.resolve_deletion_closure(target).await?
    } else {
        ctx.service.delete(target, &args.actor.actor_id()).await?
    };
    output(&DeleteOutput::new(closure, args.dry_run), json_mode);
    Ok(())
}
