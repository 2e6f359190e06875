//! Review chain CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::commands::{ActionOutput, ActorArg};
use crate::cli::id_resolver::resolve_task_id;
use crate::cli::output::{output, CommandOutput};
use crate::cli::CliContext;
use crate::domain::models::{ActorId, Task};

#[derive(Args, Debug)]
pub struct ReviewArgs {
    #[command(subcommand)]
    pub command: ReviewCommands,
}

#[derive(Subcommand, Debug)]
pub enum ReviewCommands {
    /// Approve a review and complete its chain
    Approve {
        /// Review task ID or unique prefix
        id: String,
        #[command(flatten)]
        actor: ActorArg,
    },
    /// Take back an approval
    Revoke {
        /// Review task ID or unique prefix
        id: String,
        #[command(flatten)]
        actor: ActorArg,
    },
    /// Turn review on or off for a task
    Require {
        /// Task ID or unique prefix
        id: String,
        /// Turn review off instead of on
        #[arg(long)]
        off: bool,
        #[command(flatten)]
        actor: ActorArg,
    },
    /// Chain a further review under a review
    Send {
        /// Review task ID or unique prefix
        id: String,
        /// Who should perform the new review
        #[arg(short, long)]
        assignee: Option<String>,
        #[command(flatten)]
        actor: ActorArg,
    },
}

#[derive(Debug, Serialize)]
pub struct ReviewTaskOutput {
    pub success: bool,
    pub message: String,
    pub task: Task,
}

impl CommandOutput for ReviewTaskOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

pub async fn execute(args: ReviewArgs, ctx: &CliContext, json_mode: bool) -> Result<()> {
    match args.command {
        ReviewCommands::Approve { id, actor } => {
            let review_id = resolve_task_id(&ctx.pool, &id).await?;
            ctx.service.approve_review(review_id, &actor.actor_id()).await?;
            output(&ActionOutput::ok(format!("Review approved: {review_id}")), json_mode);
        }

        ReviewCommands::Revoke { id, actor } => {
            let review_id = resolve_task_id(&ctx.pool, &id).await?;
            ctx.service.revoke_review(review_id, &actor.actor_id()).await?;
            output(&ActionOutput::ok(format!("Review revoked: {review_id}")), json_mode);
        }

        ReviewCommands::Require { id, off, actor } => {
            let task_id = resolve_task_id(&ctx.pool, &id).await?;
            let task = ctx
                .service
                .set_review_required(task_id, !off, &actor.actor_id())
                .await?;
            let state = if task.is_review_required { "on" } else { "off" };
            let out = ReviewTaskOutput {
                success: true,
                message: format!("Review {state} for {}", task.id),
                task,
            };
            output(&out, json_mode);
        }

        ReviewCommands::Send { id, assignee, actor } => {
            let review_id = resolve_task_id(&ctx.pool, &id).await?;
            let task = ctx
                .service
                .send_for_review(review_id, assignee.map(ActorId::new), &actor.actor_id())
                .await?;
            let out = ReviewTaskOutput {
                success: true,
                message: format!("Review created: {}", task.id),
                task,
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}
