//! Transactional graph store port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ActorId, Checklist, Link, Task};
use crate::domain::ports::AuditSink;

/// Read/write access to tasks, checklists and links inside one open
/// transaction.
///
/// Every read must observe the writes made earlier through the same value.
/// Implementations backed by a database keep the transaction (and whatever
/// row locks it holds) for as long as the value lives; nothing is visible to
/// other transactions until the owning [`GraphRepository`] commits it.
///
/// Relationship queries skip soft-deleted tasks and checklists; point reads
/// (`get_task`, `get_checklist`) return deleted rows so callers can tell a
/// missing row from a deleted one.
///
/// [`GraphRepository`]: crate::domain::ports::GraphRepository
#[async_trait]
pub trait GraphStore: AuditSink + Send {
    async fn get_task(&mut self, id: Uuid) -> DomainResult<Option<Task>>;

    async fn insert_task(&mut self, task: &Task) -> DomainResult<()>;

    async fn update_task(&mut self, task: &Task) -> DomainResult<()>;

    async fn get_checklist(&mut self, id: Uuid) -> DomainResult<Option<Checklist>>;

    async fn insert_checklist(&mut self, checklist: &Checklist) -> DomainResult<()>;

    async fn update_checklist(&mut self, checklist: &Checklist) -> DomainResult<()>;

    async fn insert_link(&mut self, link: &Link) -> DomainResult<()>;

    /// Checklists the task owns.
    async fn checklists_of_task(&mut self, task_id: Uuid) -> DomainResult<Vec<Checklist>>;

    /// Ids of the tasks owning the checklist, deleted owners included.
    async fn owners_of_checklist(&mut self, checklist_id: Uuid) -> DomainResult<Vec<Uuid>>;

    /// Subtasks whose completion determines the checklist's completion.
    async fn subtasks_of_checklist(&mut self, checklist_id: Uuid) -> DomainResult<Vec<Task>>;

    /// Ids of checklists for which the task is a subtask item.
    async fn checklists_requiring_task(&mut self, task_id: Uuid) -> DomainResult<Vec<Uuid>>;

    /// Review tasks whose `parent_task_id` is the given task.
    async fn reviews_of_task(&mut self, task_id: Uuid) -> DomainResult<Vec<Task>>;

    /// Live tasks the actor created or is assigned to, oldest first.
    async fn tasks_for_actor(&mut self, actor: &ActorId) -> DomainResult<Vec<Task>>;

    /// Soft-deleted review tasks of the given task, newest first.
    async fn deleted_reviews_of_task(&mut self, task_id: Uuid) -> DomainResult<Vec<Task>>;

    /// Set `is_deleted` on every listed task and checklist.
    async fn mark_deleted(&mut self, task_ids: &[Uuid], checklist_ids: &[Uuid])
        -> DomainResult<()>;
}
