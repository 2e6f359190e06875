//! Transaction boundary and authoring flows for the task graph.
//!
//! Every method opens one transaction, runs one engine operation or one
//! authoring flow against it, then commits on success or rolls back on any
//! error, so a failed call leaves the graph exactly as it was.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActorId, AuditField, Checklist, EntityType, FieldChange, Link, Task, TaskStatus,
};
use crate::domain::ports::{AuditSink, GraphRepository, GraphStore};
use crate::services::deletion_closure::DeletionClosure;
use crate::services::status_engine::StatusEngine;

/// Root of a cascading delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    Task(Uuid),
    Checklist(Uuid),
}

impl DeleteTarget {
    /// Build a target from optional ids; exactly one must be present.
    pub fn from_parts(task_id: Option<Uuid>, checklist_id: Option<Uuid>) -> DomainResult<Self> {
        match (task_id, checklist_id) {
            (Some(id), None) => Ok(Self::Task(id)),
            (None, Some(id)) => Ok(Self::Checklist(id)),
            _ => Err(DomainError::ValidationFailed(
                "exactly one of a task or a checklist must be given".to_string(),
            )),
        }
    }

    fn parts(self) -> (Option<Uuid>, Option<Uuid>) {
        match self {
            Self::Task(id) => (Some(id), None),
            Self::Checklist(id) => (None, Some(id)),
        }
    }
}

/// Input for [`TaskGraphService::create_task`].
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub name: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<ActorId>,
    pub review_required: bool,
    pub checklist_names: Vec<String>,
    /// Make the new task a subtask of this checklist.
    pub under_checklist: Option<Uuid>,
}

impl NewTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_checklists<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.checklist_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_review_required(mut self, required: bool) -> Self {
        self.review_required = required;
        self
    }

    pub fn with_assignee(mut self, assignee: ActorId) -> Self {
        self.assigned_to = Some(assignee);
        self
    }

    pub fn under_checklist(mut self, checklist_id: Uuid) -> Self {
        self.under_checklist = Some(checklist_id);
        self
    }
}

/// Field edits for [`TaskGraphService::update_task`]. `None` leaves the
/// field as it is.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Creator only.
    pub assigned_to: Option<ActorId>,
    /// Creator only.
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.assigned_to.is_none()
            && self.due_date.is_none()
    }
}

/// How a listed task relates to the actor asking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskRelation {
    #[default]
    Any,
    Created,
    Assigned,
}

/// Narrows [`TaskGraphService::list_tasks`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskFilter {
    pub relation: TaskRelation,
    pub status: Option<TaskStatus>,
}

impl TaskFilter {
    fn matches(&self, task: &Task, actor: &ActorId) -> bool {
        let related = match self.relation {
            TaskRelation::Any => task.is_participant(actor),
            TaskRelation::Created => &task.created_by == actor,
            TaskRelation::Assigned => task.assigned_to.as_ref() == Some(actor),
        };
        related && self.status.is_none_or(|status| task.status == status)
    }
}

/// Everything `create_task` wrote.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedTask {
    pub task: Task,
    pub checklists: Vec<Checklist>,
    pub review: Option<Task>,
}

/// A task together with its live checklists and reviews.
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetails {
    pub task: Task,
    pub checklists: Vec<Checklist>,
    pub reviews: Vec<Task>,
}

pub struct TaskGraphService<R: GraphRepository> {
    repo: Arc<R>,
    engine: StatusEngine,
}

impl<R: GraphRepository> TaskGraphService<R> {
    pub fn new(repo: Arc<R>, engine: StatusEngine) -> Self {
        Self { repo, engine }
    }

    pub fn engine(&self) -> &StatusEngine {
        &self.engine
    }

    async fn finish<T>(&self, tx: R::Tx, result: DomainResult<T>) -> DomainResult<T> {
        match result {
            Ok(value) => {
                self.repo.commit(tx).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.repo.rollback(tx).await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    // Engine passthroughs

    pub async fn toggle_checklist(
        &self,
        checklist_id: Uuid,
        completed: bool,
        actor: &ActorId,
    ) -> DomainResult<()> {
        let mut tx = self.repo.begin().await?;
        let result = self.toggle_checklist_in(&mut tx, checklist_id, completed, actor).await;
        self.finish(tx, result).await
    }

    async fn toggle_checklist_in(
        &self,
        tx: &mut R::Tx,
        checklist_id: Uuid,
        completed: bool,
        actor: &ActorId,
    ) -> DomainResult<()> {
        live_checklist_in(tx, checklist_id).await?;
        authorize_checklist(tx, checklist_id, actor).await?;
        self.engine
            .toggle_checklist(tx, checklist_id, completed, actor)
            .await
    }

    pub async fn roll_up_completion(&self, task_id: Uuid, actor: &ActorId) -> DomainResult<()> {
        let mut tx = self.repo.begin().await?;
        let result = self.engine.roll_up_completion(&mut tx, task_id, actor).await;
        self.finish(tx, result).await
    }

    pub async fn cascade_incomplete(&self, checklist_id: Uuid, actor: &ActorId) -> DomainResult<()> {
        let mut tx = self.repo.begin().await?;
        let result = self.engine.cascade_incomplete(&mut tx, checklist_id, actor).await;
        self.finish(tx, result).await
    }

    pub async fn approve_review(&self, review_task_id: Uuid, actor: &ActorId) -> DomainResult<()> {
        let mut tx = self.repo.begin().await?;
        let result = self
            .engine
            .propagate_review_completion(&mut tx, review_task_id, actor)
            .await;
        self.finish(tx, result).await
    }

    pub async fn revoke_review(&self, review_task_id: Uuid, actor: &ActorId) -> DomainResult<()> {
        let mut tx = self.repo.begin().await?;
        let result = self
            .engine
            .reverse_review_completion(&mut tx, review_task_id, actor)
            .await;
        self.finish(tx, result).await
    }

    pub async fn propagate_output(
        &self,
        task_id: Uuid,
        output: String,
        actor: &ActorId,
    ) -> DomainResult<()> {
        let mut tx = self.repo.begin().await?;
        let result = self.engine.propagate_output(&mut tx, task_id, output, actor).await;
        self.finish(tx, result).await
    }

    pub async fn resolve_deletion_closure(&self, target: DeleteTarget) -> DomainResult<DeletionClosure> {
        let (task_id, checklist_id) = target.parts();
        let mut tx = self.repo.begin().await?;
        let result = self
            .engine
            .resolve_deletion_closure(&mut tx, task_id, checklist_id)
            .await;
        self.finish(tx, result).await
    }

    // Authoring flows

    /// Soft-delete the closure of `target` as one unit, with one
    /// `is_deleted` record per entity.
    ///
    /// Only the creator of the target task (or of a task owning the target
    /// checklist) may delete.
    pub async fn delete(&self, target: DeleteTarget, actor: &ActorId) -> DomainResult<DeletionClosure> {
        let mut tx = self.repo.begin().await?;
        let result = self.delete_in(&mut tx, target, actor).await;
        self.finish(tx, result).await
    }

    async fn delete_in(
        &self,
        tx: &mut R::Tx,
        target: DeleteTarget,
        actor: &ActorId,
    ) -> DomainResult<DeletionClosure> {
        authorize_delete(tx, target, actor).await?;
        let (task_id, checklist_id) = target.parts();
        let closure = self
            .engine
            .resolve_deletion_closure(tx, task_id, checklist_id)
            .await?;

        let mut task_ids: Vec<Uuid> = closure.task_ids.iter().copied().collect();
        let mut checklist_ids: Vec<Uuid> = closure.checklist_ids.iter().copied().collect();
        task_ids.sort_unstable();
        checklist_ids.sort_unstable();

        tx.mark_deleted(&task_ids, &checklist_ids).await?;
        for id in &task_ids {
            tx.record(FieldChange::task(*id, AuditField::IsDeleted, false, true, actor))
                .await?;
        }
        for id in &checklist_ids {
            tx.record(FieldChange::checklist(*id, AuditField::IsDeleted, false, true, actor))
                .await?;
        }

        info!(
            tasks = task_ids.len(),
            checklists = checklist_ids.len(),
            %actor,
            "Deleted task graph closure"
        );
        Ok(closure)
    }

    /// Create a Normal task with its checklists, its review when required,
    /// and optionally hang it under an existing checklist.
    pub async fn create_task(&self, new_task: NewTask, actor: &ActorId) -> DomainResult<CreatedTask> {
        let mut tx = self.repo.begin().await?;
        let result = self.create_task_in(&mut tx, new_task, actor).await;
        self.finish(tx, result).await
    }

    async fn create_task_in(
        &self,
        tx: &mut R::Tx,
        new_task: NewTask,
        actor: &ActorId,
    ) -> DomainResult<CreatedTask> {
        let mut task = Task::new(new_task.name, actor.clone())
            .with_description(new_task.description)
            .with_review_required(new_task.review_required);
        task.due_date = new_task.due_date;
        task.assigned_to = new_task.assigned_to;
        task.validate().map_err(DomainError::ValidationFailed)?;

        // Validate the target checklist before writing anything.
        let under = match new_task.under_checklist {
            Some(checklist_id) => Some(self.subtask_slot(tx, checklist_id).await?),
            None => None,
        };

        tx.insert_task(&task).await?;
        record_created(tx, &task, actor).await?;

        let mut checklists = Vec::with_capacity(new_task.checklist_names.len());
        for name in new_task.checklist_names {
            let checklist = Checklist::new(name, actor.clone());
            tx.insert_checklist(&checklist).await?;
            tx.insert_link(&Link::owns(task.id, checklist.id)).await?;
            checklists.push(checklist);
        }

        let review = if task.is_review_required {
            let review = Task::review_of(&task, actor.clone()).with_assignee(actor.clone());
            tx.insert_task(&review).await?;
            record_created(tx, &review, actor).await?;
            Some(review)
        } else {
            None
        };

        if let Some(slot) = under {
            tx.insert_link(&Link::requires(slot.id, task.id)).await?;
            if slot.is_completed {
                // A fresh subtask is not Completed, so the checklist no longer is.
                self.engine.cascade_incomplete(tx, slot.id, actor).await?;
            }
        }

        info!(task_id = %task.id, checklists = checklists.len(), "Task created");
        Ok(CreatedTask {
            task,
            checklists,
            review,
        })
    }

    async fn subtask_slot(&self, tx: &mut R::Tx, checklist_id: Uuid) -> DomainResult<Checklist> {
        let checklist = match tx.get_checklist(checklist_id).await? {
            Some(c) if !c.is_deleted => c,
            _ => return Err(DomainError::ChecklistNotFound(checklist_id)),
        };
        let owners = tx.owners_of_checklist(checklist_id).await?;
        if owners.is_empty() {
            return Err(DomainError::Conflict(format!(
                "checklist {checklist_id} is not attached to any task"
            )));
        }
        for owner_id in owners {
            if let Some(owner) = tx.get_task(owner_id).await? {
                if owner.is_review() {
                    return Err(DomainError::Conflict(
                        "cannot add a subtask to a review task's checklist".to_string(),
                    ));
                }
            }
        }
        Ok(checklist)
    }

    /// Attach a new checklist to a task. Checklists added to a review go to
    /// the task it reviews.
    pub async fn add_checklist(
        &self,
        task_id: Uuid,
        name: String,
        actor: &ActorId,
    ) -> DomainResult<Checklist> {
        let mut tx = self.repo.begin().await?;
        let result = self.add_checklist_in(&mut tx, task_id, name, actor).await;
        self.finish(tx, result).await
    }

    async fn add_checklist_in(
        &self,
        tx: &mut R::Tx,
        task_id: Uuid,
        name: String,
        actor: &ActorId,
    ) -> DomainResult<Checklist> {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationFailed("checklist name cannot be empty".to_string()));
        }
        let mut run = self.engine.propagation(tx, actor);
        let task = run.live_task(task_id).await?;
        let mut target = match task.parent_task_id {
            Some(parent_id) if task.is_review() => run.live_task(parent_id).await?,
            _ => task,
        };

        let checklist = Checklist::new(name, actor.clone());
        run.store.insert_checklist(&checklist).await?;
        run.store.insert_link(&Link::owns(target.id, checklist.id)).await?;

        let was_completed = target.status.is_completed();
        if target.is_review() {
            run.set_status(&mut target, TaskStatus::ToDo).await?;
            run.set_reviewed(&mut target, false).await?;
        } else {
            let status = if matches!(target.status, TaskStatus::InReview | TaskStatus::Completed) {
                TaskStatus::InProgress
            } else {
                TaskStatus::ToDo
            };
            run.set_status(&mut target, status).await?;
        }

        if was_completed {
            let requiring = run.store.checklists_requiring_task(target.id).await?;
            let mut visited = HashSet::new();
            run.cascade_from(requiring, &mut visited).await?;
        }

        info!(checklist_id = %checklist.id, task_id = %target.id, "Checklist added");
        Ok(checklist)
    }

    /// Turn review on or off for a Normal task.
    ///
    /// Turning it on revives the most recent soft-deleted review or creates
    /// a new one. Turning it off soft-deletes the live review, which is
    /// refused while that review is itself under review.
    pub async fn set_review_required(
        &self,
        task_id: Uuid,
        required: bool,
        actor: &ActorId,
    ) -> DomainResult<Task> {
        let mut tx = self.repo.begin().await?;
        let result = self.set_review_required_in(&mut tx, task_id, required, actor).await;
        self.finish(tx, result).await
    }

    async fn set_review_required_in(
        &self,
        tx: &mut R::Tx,
        task_id: Uuid,
        required: bool,
        actor: &ActorId,
    ) -> DomainResult<Task> {
        let mut task = match tx.get_task(task_id).await? {
            Some(t) if !t.is_deleted => t,
            _ => return Err(DomainError::TaskNotFound(task_id)),
        };
        if task.is_review() {
            return Err(DomainError::ValidationFailed(
                "review tasks are chained with send_for_review".to_string(),
            ));
        }
        if task.is_review_required == required {
            return Ok(task);
        }

        let live_reviews = tx.reviews_of_task(task_id).await?;
        if !required {
            for review in &live_reviews {
                if !tx.reviews_of_task(review.id).await?.is_empty() {
                    return Err(DomainError::Conflict(format!(
                        "review {} has reviews of its own",
                        review.id
                    )));
                }
            }
        }

        task.is_review_required = required;
        task.updated_at = Utc::now();
        tx.update_task(&task).await?;
        tx.record(FieldChange::task(
            task.id,
            AuditField::IsReviewRequired,
            !required,
            required,
            actor,
        ))
        .await?;

        if required {
            if live_reviews.is_empty() {
                let deleted = tx.deleted_reviews_of_task(task_id).await?;
                if let Some(mut review) = deleted.into_iter().next() {
                    review.is_deleted = false;
                    review.updated_at = Utc::now();
                    tx.update_task(&review).await?;
                    tx.record(FieldChange::task(review.id, AuditField::IsDeleted, true, false, actor))
                        .await?;
                    info!(review_id = %review.id, "Review re-enabled");
                } else {
                    let review = Task::review_of(&task, actor.clone())
                        .with_assignee(task.created_by.clone());
                    tx.insert_task(&review).await?;
                    record_created(tx, &review, actor).await?;
                    info!(review_id = %review.id, "Review created");
                }
            }
        } else {
            let ids: Vec<Uuid> = live_reviews.iter().map(|r| r.id).collect();
            tx.mark_deleted(&ids, &[]).await?;
            for id in ids {
                tx.record(FieldChange::task(id, AuditField::IsDeleted, false, true, actor))
                    .await?;
                info!(review_id = %id, "Review removed");
            }
        }
        Ok(task)
    }

    /// Edit a task's descriptive fields, one audit record per changed field.
    ///
    /// The creator and the assignee may rename and redescribe; only the
    /// creator may reassign or move the due date.
    pub async fn update_task(
        &self,
        task_id: Uuid,
        update: TaskUpdate,
        actor: &ActorId,
    ) -> DomainResult<Task> {
        let mut tx = self.repo.begin().await?;
        let result = update_task_in(&mut tx, task_id, update, actor).await;
        self.finish(tx, result).await
    }

    /// Rename a checklist. Same permission as toggling it.
    pub async fn rename_checklist(
        &self,
        checklist_id: Uuid,
        name: String,
        actor: &ActorId,
    ) -> DomainResult<Checklist> {
        let mut tx = self.repo.begin().await?;
        let result = rename_checklist_in(&mut tx, checklist_id, name, actor).await;
        self.finish(tx, result).await
    }

    /// Chain a further review under an existing review.
    pub async fn send_for_review(
        &self,
        review_task_id: Uuid,
        assignee: Option<ActorId>,
        actor: &ActorId,
    ) -> DomainResult<Task> {
        let mut tx = self.repo.begin().await?;
        let result = self.send_for_review_in(&mut tx, review_task_id, assignee, actor).await;
        self.finish(tx, result).await
    }

    async fn send_for_review_in(
        &self,
        tx: &mut R::Tx,
        review_task_id: Uuid,
        assignee: Option<ActorId>,
        actor: &ActorId,
    ) -> DomainResult<Task> {
        let mut review = match tx.get_task(review_task_id).await? {
            Some(t) if !t.is_deleted => t,
            _ => return Err(DomainError::TaskNotFound(review_task_id)),
        };
        if !review.is_review() {
            return Err(DomainError::PreconditionFailed(format!(
                "task {review_task_id} is not a review task"
            )));
        }

        if !review.is_review_required {
            review.is_review_required = true;
            review.updated_at = Utc::now();
            tx.update_task(&review).await?;
            tx.record(FieldChange::task(
                review.id,
                AuditField::IsReviewRequired,
                false,
                true,
                actor,
            ))
            .await?;
        }

        let mut next = Task::review_of(&review, actor.clone());
        next.name.clone_from(&review.name);
        next.assigned_to = assignee;
        tx.insert_task(&next).await?;
        record_created(tx, &next, actor).await?;

        info!(review_id = %next.id, reviewed = %review.id, "Review chained");
        Ok(next)
    }

    // Reads

    pub async fn get_task(&self, task_id: Uuid) -> DomainResult<Task> {
        let mut tx = self.repo.begin().await?;
        let result = tx
            .get_task(task_id)
            .await
            .and_then(|t| t.ok_or(DomainError::TaskNotFound(task_id)));
        self.finish(tx, result).await
    }

    pub async fn task_details(&self, task_id: Uuid) -> DomainResult<TaskDetails> {
        let mut tx = self.repo.begin().await?;
        let result = task_details_in(&mut tx, task_id).await;
        self.finish(tx, result).await
    }

    pub async fn get_checklist(&self, checklist_id: Uuid) -> DomainResult<Checklist> {
        let mut tx = self.repo.begin().await?;
        let result = tx
            .get_checklist(checklist_id)
            .await
            .and_then(|c| c.ok_or(DomainError::ChecklistNotFound(checklist_id)));
        self.finish(tx, result).await
    }

    pub async fn checklists_of(&self, task_id: Uuid) -> DomainResult<Vec<Checklist>> {
        let mut tx = self.repo.begin().await?;
        let result = tx.checklists_of_task(task_id).await;
        self.finish(tx, result).await
    }

    /// Live tasks the actor created or is assigned to, narrowed by `filter`.
    pub async fn list_tasks(&self, actor: &ActorId, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        let mut tx = self.repo.begin().await?;
        let result = tx.tasks_for_actor(actor).await.map(|tasks| {
            tasks
                .into_iter()
                .filter(|task| filter.matches(task, actor))
                .collect()
        });
        self.finish(tx, result).await
    }

    pub async fn history(&self, entity_id: Uuid) -> DomainResult<Vec<FieldChange>> {
        let mut tx = self.repo.begin().await?;
        let result = tx.history(entity_id).await;
        self.finish(tx, result).await
    }
}

async fn task_details_in<S: GraphStore + ?Sized>(
    store: &mut S,
    task_id: Uuid,
) -> DomainResult<TaskDetails> {
    let task = store
        .get_task(task_id)
        .await?
        .ok_or(DomainError::TaskNotFound(task_id))?;
    let checklists = store.checklists_of_task(task_id).await?;
    let reviews = store.reviews_of_task(task_id).await?;
    Ok(TaskDetails {
        task,
        checklists,
        reviews,
    })
}

async fn live_task_in<S: GraphStore + ?Sized>(store: &mut S, id: Uuid) -> DomainResult<Task> {
    match store.get_task(id).await? {
        Some(task) if !task.is_deleted => Ok(task),
        _ => Err(DomainError::TaskNotFound(id)),
    }
}

async fn live_checklist_in<S: GraphStore + ?Sized>(
    store: &mut S,
    id: Uuid,
) -> DomainResult<Checklist> {
    match store.get_checklist(id).await? {
        Some(checklist) if !checklist.is_deleted => Ok(checklist),
        _ => Err(DomainError::ChecklistNotFound(id)),
    }
}

async fn live_owners<S: GraphStore + ?Sized>(
    store: &mut S,
    checklist_id: Uuid,
) -> DomainResult<Vec<Task>> {
    let mut owners = Vec::new();
    for owner_id in store.owners_of_checklist(checklist_id).await? {
        if let Some(owner) = store.get_task(owner_id).await? {
            if !owner.is_deleted {
                owners.push(owner);
            }
        }
    }
    Ok(owners)
}

/// The actor must create or be assigned one of the checklist's live owners.
/// An ownerless checklist passes here and is rejected by the engine.
async fn authorize_checklist<S: GraphStore + ?Sized>(
    store: &mut S,
    checklist_id: Uuid,
    actor: &ActorId,
) -> DomainResult<()> {
    let owners = live_owners(store, checklist_id).await?;
    if owners.is_empty() || owners.iter().any(|owner| owner.is_participant(actor)) {
        return Ok(());
    }
    Err(DomainError::Unauthorized(format!(
        "{actor} is neither creator nor assignee of a task owning checklist {checklist_id}"
    )))
}

async fn authorize_delete<S: GraphStore + ?Sized>(
    store: &mut S,
    target: DeleteTarget,
    actor: &ActorId,
) -> DomainResult<()> {
    let allowed = match target {
        DeleteTarget::Task(id) => live_task_in(store, id).await?.created_by == *actor,
        DeleteTarget::Checklist(id) => {
            live_checklist_in(store, id).await?;
            let owners = live_owners(store, id).await?;
            owners.is_empty() || owners.iter().any(|owner| owner.created_by == *actor)
        }
    };
    if allowed {
        return Ok(());
    }
    let what = match target {
        DeleteTarget::Task(id) => format!("task {id}"),
        DeleteTarget::Checklist(id) => format!("checklist {id}"),
    };
    Err(DomainError::Unauthorized(format!("only the creator may delete {what}")))
}

async fn update_task_in<S: GraphStore + ?Sized>(
    store: &mut S,
    task_id: Uuid,
    update: TaskUpdate,
    actor: &ActorId,
) -> DomainResult<Task> {
    let mut task = live_task_in(store, task_id).await?;
    if !task.is_participant(actor) {
        return Err(DomainError::Unauthorized(format!(
            "{actor} is neither creator nor assignee of task {task_id}"
        )));
    }
    if task.created_by != *actor && (update.assigned_to.is_some() || update.due_date.is_some()) {
        return Err(DomainError::Unauthorized(format!(
            "only the creator of task {task_id} may change its assignee or due date"
        )));
    }

    let mut changes = Vec::new();
    if let Some(name) = update.name {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationFailed("task name cannot be empty".to_string()));
        }
        if name != task.name {
            let old = std::mem::replace(&mut task.name, name);
            changes.push(FieldChange::task(task_id, AuditField::Name, old, &task.name, actor));
        }
    }
    if let Some(description) = update.description {
        if description != task.description {
            let old = std::mem::replace(&mut task.description, description);
            changes.push(FieldChange::task(
                task_id,
                AuditField::Description,
                old,
                &task.description,
                actor,
            ));
        }
    }
    if let Some(assignee) = update.assigned_to {
        if task.assigned_to.as_ref() != Some(&assignee) {
            let old = task.assigned_to.replace(assignee);
            changes.push(FieldChange::new(
                EntityType::Task,
                task_id,
                AuditField::AssignedTo,
                old.map(|a| a.to_string()),
                task.assigned_to.as_ref().map(ToString::to_string),
                actor,
            ));
        }
    }
    if let Some(due_date) = update.due_date {
        if task.due_date != Some(due_date) {
            let old = task.due_date.replace(due_date);
            changes.push(FieldChange::new(
                EntityType::Task,
                task_id,
                AuditField::DueDate,
                old.map(|d| d.to_rfc3339()),
                Some(due_date.to_rfc3339()),
                actor,
            ));
        }
    }

    if changes.is_empty() {
        return Ok(task);
    }
    task.updated_at = Utc::now();
    store.update_task(&task).await?;
    let fields = changes.len();
    for change in changes {
        store.record(change).await?;
    }
    info!(task_id = %task_id, fields, "Task updated");
    Ok(task)
}

async fn rename_checklist_in<S: GraphStore + ?Sized>(
    store: &mut S,
    checklist_id: Uuid,
    name: String,
    actor: &ActorId,
) -> DomainResult<Checklist> {
    if name.trim().is_empty() {
        return Err(DomainError::ValidationFailed("checklist name cannot be empty".to_string()));
    }
    let mut checklist = live_checklist_in(store, checklist_id).await?;
    authorize_checklist(store, checklist_id, actor).await?;
    if checklist.name == name {
        return Ok(checklist);
    }

    let old = std::mem::replace(&mut checklist.name, name);
    checklist.updated_at = Utc::now();
    store.update_checklist(&checklist).await?;
    store
        .record(FieldChange::checklist(
            checklist_id,
            AuditField::Name,
            old,
            &checklist.name,
            actor,
        ))
        .await?;
    info!(checklist_id = %checklist_id, "Checklist renamed");
    Ok(checklist)
}

/// Creation is audited as a status change from nothing.
async fn record_created<S: GraphStore + ?Sized>(
    store: &mut S,
    task: &Task,
    actor: &ActorId,
) -> DomainResult<()> {
    store
        .record(FieldChange::new(
            EntityType::Task,
            task.id,
            AuditField::Status,
            None,
            Some(task.status.to_string()),
            actor,
        ))
        .await
}
