//! Task CLI commands.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgGroup, Args, Subcommand};
use serde::Serialize;

use crate::cli::commands::{ActionOutput, ActorArg};
use crate::cli::id_resolver::{resolve_checklist_id, resolve_task_id};
use crate::cli::output::{checklist_table, output, task_table, CommandOutput};
use crate::cli::CliContext;
use crate::domain::models::{ActorId, Task, TaskStatus};
use crate::services::{CreatedTask, NewTask, TaskDetails, TaskFilter, TaskRelation, TaskUpdate};

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a new task
    Create {
        /// Task name
        name: String,
        /// Task description
        #[arg(short, long)]
        description: Option<String>,
        /// Checklist to create with the task (repeatable)
        #[arg(short = 'l', long = "checklist")]
        checklists: Vec<String>,
        /// Create a review task alongside
        #[arg(long)]
        review: bool,
        /// Make the task a subtask of this checklist
        #[arg(long)]
        under: Option<String>,
        /// Assignee
        #[arg(short, long)]
        assignee: Option<String>,
        /// Due date (RFC 3339)
        #[arg(long)]
        due: Option<String>,
        #[command(flatten)]
        actor: ActorArg,
    },
    /// Edit a task's name, description, assignee or due date
    Update {
        /// Task ID or unique prefix
        id: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
        /// New assignee (creator only)
        #[arg(short, long)]
        assignee: Option<String>,
        /// New due date, RFC 3339 (creator only)
        #[arg(long)]
        due: Option<String>,
        #[command(flatten)]
        actor: ActorArg,
    },
    /// List the tasks the actor created or is assigned to
    #[command(group(ArgGroup::new("relation").args(["created", "assigned"])))]
    List {
        /// Only tasks the actor created
        #[arg(long)]
        created: bool,
        /// Only tasks assigned to the actor
        #[arg(long)]
        assigned: bool,
        /// Only tasks in this status (e.g. in_progress)
        #[arg(short, long)]
        status: Option<String>,
        #[command(flatten)]
        actor: ActorArg,
    },
    /// Show a task with its checklists and reviews
    Show {
        /// Task ID or unique prefix
        id: String,
    },
    /// Record the output of a task and copy it along its review chain
    Output {
        /// Task ID or unique prefix
        id: String,
        /// Output text
        text: String,
        #[command(flatten)]
        actor: ActorArg,
    },
    /// Recompute a task's status from its checklists
    Rollup {
        /// Task ID or unique prefix
        id: String,
        #[command(flatten)]
        actor: ActorArg,
    },
}

#[derive(Debug, Serialize)]
pub struct TaskDetailOutput {
    #[serde(flatten)]
    pub details: TaskDetails,
}

impl CommandOutput for TaskDetailOutput {
    fn to_human(&self) -> String {
        let task = &self.details.task;
        let mut lines = vec![
            format!("Task: {}", task.name),
            format!("ID: {}", task.id),
            format!("Type: {}", task.task_type),
            format!("Status: {}", task.status),
        ];
        if !task.description.is_empty() {
            lines.push(format!("Description: {}", task.description));
        }
        if let Some(parent) = task.parent_task_id {
            lines.push(format!("Reviews: {parent}"));
        }
        if let Some(assignee) = &task.assigned_to {
            lines.push(format!("Assigned to: {assignee}"));
        }
        if let Some(due) = task.due_date {
            lines.push(format!("Due: {}", due.to_rfc3339()));
        }
        if let Some(out) = &task.output {
            lines.push(format!("Output: {out}"));
        }
        lines.push(format!("Review required: {}", task.is_review_required));
        if task.is_deleted {
            lines.push("Deleted: true".to_string());
        }

        if !self.details.checklists.is_empty() {
            lines.push(String::new());
            lines.push(checklist_table(&self.details.checklists));
        }
        if !self.details.reviews.is_empty() {
            lines.push("\nReviews:".to_string());
            lines.push(task_table(&self.details.reviews));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListOutput {
    pub tasks: Vec<Task>,
    pub total: usize,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks found.".to_string();
        }
        format!("Found {} task(s):\n{}", self.total, task_table(&self.tasks))
    }
}

#[derive(Debug, Serialize)]
pub struct TaskCreatedOutput {
    pub success: bool,
    #[serde(flatten)]
    pub created: CreatedTask,
}

impl CommandOutput for TaskCreatedOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("Task created: {}", self.created.task.id)];
        for checklist in &self.created.checklists {
            lines.push(format!("  checklist {} ({})", checklist.id, checklist.name));
        }
        if let Some(review) = &self.created.review {
            lines.push(format!("  review {}", review.id));
        }
        lines.join("\n")
    }
}

fn parse_status(status: Option<String>) -> Result<Option<TaskStatus>> {
    status
        .map(|s| {
            TaskStatus::from_str(&s).with_context(|| {
                format!("Unknown status '{s}', expected one of new, to_do, in_progress, in_review, completed, in_re_edit")
            })
        })
        .transpose()
}

fn parse_due(due: Option<String>) -> Result<Option<DateTime<Utc>>> {
    due.map(|d| {
        DateTime::parse_from_rfc3339(&d)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("Invalid due date '{d}', expected RFC 3339"))
    })
    .transpose()
}

pub async fn execute(args: TaskArgs, ctx: &CliContext, json_mode: bool) -> Result<()> {
    match args.command {
        TaskCommands::Create {
            name,
            description,
            checklists,
            review,
            under,
            assignee,
            due,
            actor,
        } => {
            let mut new_task = NewTask::new(name)
                .with_checklists(checklists)
                .with_review_required(review);
            new_task.description = description.unwrap_or_default();
            new_task.assigned_to = assignee.map(ActorId::new);
            new_task.due_date = parse_due(due)?;
            if let Some(under) = under {
                new_task = new_task.under_checklist(resolve_checklist_id(&ctx.pool, &under).await?);
            }

            let created = ctx.service.create_task(new_task, &actor.actor_id()).await?;
            output(&TaskCreatedOutput { success: true, created }, json_mode);
        }

        TaskCommands::Update {
            id,
            name,
            description,
            assignee,
            due,
            actor,
        } => {
            let update = TaskUpdate {
                name,
                description,
                assigned_to: assignee.map(ActorId::new),
                due_date: parse_due(due)?,
            };
            if update.is_empty() {
                bail!("Nothing to update; pass at least one of --name, --description, --assignee, --due");
            }
            let task_id = resolve_task_id(&ctx.pool, &id).await?;
            let task = ctx.service.update_task(task_id, update, &actor.actor_id()).await?;
            output(&ActionOutput::ok(format!("Task {} updated", task.id)), json_mode);
        }

        TaskCommands::List {
            created,
            assigned,
            status,
            actor,
        } => {
            let relation = match (created, assigned) {
                (true, _) => TaskRelation::Created,
                (_, true) => TaskRelation::Assigned,
                _ => TaskRelation::Any,
            };
            let filter = TaskFilter {
                relation,
                status: parse_status(status)?,
            };
            let tasks = ctx.service.list_tasks(&actor.actor_id(), filter).await?;
            output(
                &TaskListOutput {
                    total: tasks.len(),
                    tasks,
                },
                json_mode,
            );
        }

        TaskCommands::Show { id } => {
            let task_id = resolve_task_id(&ctx.pool, &id).await?;
            let details = ctx.service.task_details(task_id).await?;
            output(&TaskDetailOutput { details }, json_mode);
        }

        TaskCommands::Output { id, text, actor } => {
            let task_id = resolve_task_id(&ctx.pool, &id).await?;
            ctx.service
                .propagate_output(task_id, text, &actor.actor_id())
                .await?;
            output(&ActionOutput::ok(format!("Output recorded on {task_id}")), json_mode);
        }

        TaskCommands::Rollup { id, actor } => {
            let task_id = resolve_task_id(&ctx.pool, &id).await?;
            ctx.service.roll_up_completion(task_id, &actor.actor_id()).await?;
            let task: Task = ctx.service.get_task(task_id).await?;
            output(
                &ActionOutput::ok(format!("Task {} is now {}", task.id, task.status)),
                json_mode,
            );
        }
    }

    Ok(())
}
