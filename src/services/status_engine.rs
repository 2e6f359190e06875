//! Status propagation engine.
//!
//! [`StatusEngine`] keeps task and checklist status consistent after a single
//! node changes. Each public operation runs against a [`GraphStore`] that the
//! caller has already opened as a transaction; the engine never begins,
//! commits or rolls back. Every walk is an explicit worklist with its own
//! visited set, and every field write is paired with one audit record.
//!
//! The operations are split by concern:
//! - completion rollup ([`StatusEngine::roll_up_completion`])
//! - incompletion cascade ([`StatusEngine::cascade_incomplete`])
//! - review chain ([`StatusEngine::propagate_review_completion`],
//!   [`StatusEngine::reverse_review_completion`], [`StatusEngine::propagate_output`])
//! - deletion closure ([`StatusEngine::resolve_deletion_closure`])
//!
//! Checklist toggling lives here because it dispatches into the others.

use std::collections::HashSet;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActorId, AuditField, Checklist, EngineConfig, FieldChange, Task, TaskStatus,
};
use crate::domain::ports::GraphStore;

/// Entry point for every propagation operation.
#[derive(Debug, Clone, Default)]
pub struct StatusEngine {
    config: EngineConfig,
}

impl StatusEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn propagation<'a, S: GraphStore + ?Sized>(
        &'a self,
        store: &'a mut S,
        actor: &'a ActorId,
    ) -> Propagation<'a, S> {
        Propagation {
            store,
            actor,
            config: &self.config,
            budget: WalkBudget::new(self.config.max_walk_nodes),
        }
    }

    /// Set a checklist's completion flag by hand and propagate the change.
    ///
    /// Fails with `Conflict` when the checklist has live subtasks (its
    /// completion is derived) or no owner task. Setting the value it already
    /// holds succeeds without writing anything.
    #[instrument(skip(self, store), fields(actor = %actor))]
    pub async fn toggle_checklist<S: GraphStore + ?Sized>(
        &self,
        store: &mut S,
        checklist_id: Uuid,
        completed: bool,
        actor: &ActorId,
    ) -> DomainResult<()> {
        let mut run = self.propagation(store, actor);
        run.toggle_checklist(checklist_id, completed).await?;
        info!(visited = run.budget.visited(), "Checklist toggle propagated");
        Ok(())
    }
}

/// Counts nodes visited by one top-level operation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WalkBudget {
    limit: usize,
    visited: usize,
}

impl WalkBudget {
    pub(crate) const fn new(limit: usize) -> Self {
        Self { limit, visited: 0 }
    }

    pub(crate) fn tick(&mut self) -> DomainResult<()> {
        self.visited += 1;
        if self.visited > self.limit {
            return Err(DomainError::WalkLimitExceeded(self.limit));
        }
        Ok(())
    }

    pub(crate) const fn visited(&self) -> usize {
        self.visited
    }
}

/// State of one engine operation: the open store, the acting user and the
/// node budget shared by every walk the operation performs.
pub(crate) struct Propagation<'a, S: ?Sized> {
    pub(crate) store: &'a mut S,
    pub(crate) actor: &'a ActorId,
    pub(crate) config: &'a EngineConfig,
    pub(crate) budget: WalkBudget,
}

impl<S: GraphStore + ?Sized> Propagation<'_, S> {
    /// Load a task that exists and is not soft-deleted.
    pub(crate) async fn live_task(&mut self, id: Uuid) -> DomainResult<Task> {
        match self.store.get_task(id).await? {
            Some(task) if !task.is_deleted => Ok(task),
            _ => Err(DomainError::TaskNotFound(id)),
        }
    }

    /// Load a checklist that exists and is not soft-deleted.
    pub(crate) async fn live_checklist(&mut self, id: Uuid) -> DomainResult<Checklist> {
        match self.store.get_checklist(id).await? {
            Some(checklist) if !checklist.is_deleted => Ok(checklist),
            _ => Err(DomainError::ChecklistNotFound(id)),
        }
    }

    /// Move `task` to `status`, saving the prior status. Returns whether a
    /// write happened.
    pub(crate) async fn set_status(
        &mut self,
        task: &mut Task,
        status: TaskStatus,
    ) -> DomainResult<bool> {
        let Some(old) = task.transition_to(status) else {
            return Ok(false);
        };
        self.persist_status(task, old).await?;
        Ok(true)
    }

    /// Exchange `status` and `previous_status`.
    pub(crate) async fn swap_status(&mut self, task: &mut Task) -> DomainResult<bool> {
        let Some(old) = task.swap_with_previous() else {
            return Ok(false);
        };
        self.persist_status(task, old).await?;
        Ok(true)
    }

    async fn persist_status(&mut self, task: &mut Task, old: TaskStatus) -> DomainResult<()> {
        debug!(task_id = %task.id, from = %old, to = %task.status, "Task status changed");
        self.store.update_task(task).await?;
        self.store
            .record(FieldChange::task(
                task.id,
                AuditField::Status,
                old,
                task.status,
                self.actor,
            ))
            .await?;
        // An approval only stands while the review is Completed.
        if task.is_review() && old.is_completed() && !task.status.is_completed() {
            self.set_reviewed(task, false).await?;
        }
        Ok(())
    }

    pub(crate) async fn set_completed(
        &mut self,
        checklist: &mut Checklist,
        completed: bool,
    ) -> DomainResult<bool> {
        let Some(old) = checklist.set_completed(completed) else {
            return Ok(false);
        };
        debug!(checklist_id = %checklist.id, completed, "Checklist completion changed");
        self.store.update_checklist(checklist).await?;
        self.store
            .record(FieldChange::checklist(
                checklist.id,
                AuditField::IsCompleted,
                old,
                completed,
                self.actor,
            ))
            .await?;
        Ok(true)
    }

    pub(crate) async fn set_reviewed(&mut self, task: &mut Task, reviewed: bool) -> DomainResult<bool> {
        if task.is_reviewed == reviewed {
            return Ok(false);
        }
        let old = task.is_reviewed;
        task.is_reviewed = reviewed;
        task.updated_at = chrono::Utc::now();
        debug!(task_id = %task.id, reviewed, "Review approval changed");
        self.store.update_task(task).await?;
        self.store
            .record(FieldChange::task(
                task.id,
                AuditField::IsReviewed,
                old,
                reviewed,
                self.actor,
            ))
            .await?;
        Ok(true)
    }

    pub(crate) async fn set_output(
        &mut self,
        task: &mut Task,
        output: Option<String>,
    ) -> DomainResult<bool> {
        if task.output == output {
            return Ok(false);
        }
        let old = std::mem::replace(&mut task.output, output);
        task.updated_at = chrono::Utc::now();
        self.store.update_task(task).await?;
        self.store
            .record(FieldChange::new(
                crate::domain::models::EntityType::Task,
                task.id,
                AuditField::Output,
                old,
                task.output.clone(),
                self.actor,
            ))
            .await?;
        Ok(true)
    }

    async fn toggle_checklist(&mut self, checklist_id: Uuid, completed: bool) -> DomainResult<()> {
        let mut checklist = self.live_checklist(checklist_id).await?;

        if !self.store.subtasks_of_checklist(checklist_id).await?.is_empty() {
            return Err(DomainError::Conflict(format!(
                "checklist {checklist_id} has subtasks; its completion follows them"
            )));
        }
        if checklist.is_completed == completed {
            return Ok(());
        }

        let mut owners = Vec::new();
        for owner_id in self.store.owners_of_checklist(checklist_id).await? {
            if let Some(owner) = self.store.get_task(owner_id).await? {
                if !owner.is_deleted {
                    owners.push(owner);
                }
            }
        }
        if owners.is_empty() {
            return Err(DomainError::Conflict(format!(
                "checklist {checklist_id} is not attached to any task"
            )));
        }

        self.set_completed(&mut checklist, completed).await?;

        let mut regressed = HashSet::new();
        for owner in owners {
            match (owner.is_review(), completed) {
                (false, true) => self.roll_up_from(vec![owner.id]).await?,
                (false, false) => self.cascade_from(vec![checklist_id], &mut regressed).await?,
                (true, true) => self.reopen_next_reviews(owner.id).await?,
                (true, false) => {
                    if owner.is_reviewed {
                        self.reverse_review(owner.id).await?;
                    }
                }
            }
        }
        Ok(())
    }
}
