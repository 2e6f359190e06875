//! In-memory implementation of [`GraphRepository`].
//!
//! # Transactions
//!
//! `begin` takes an owned lock on the committed state and hands out a
//! working copy. Writes go to the copy; `commit` swaps it in, while
//! `rollback` (or dropping the transaction) discards it. Holding the lock for
//! the whole transaction serializes writers the same way row locks would.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActorId, Checklist, FieldChange, Link, LinkKind, Task};
use crate::domain::ports::{AuditSink, GraphRepository, GraphStore};

#[derive(Debug, Clone, Default)]
struct GraphState {
    tasks: HashMap<Uuid, Task>,
    checklists: HashMap<Uuid, Checklist>,
    links: Vec<Link>,
    changes: Vec<FieldChange>,
}

impl GraphState {
    fn live_task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.get(&id).filter(|t| !t.is_deleted)
    }

    fn live_checklist(&self, id: Uuid) -> Option<&Checklist> {
        self.checklists.get(&id).filter(|c| !c.is_deleted)
    }
}

/// Shared in-memory graph.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    state: Arc<Mutex<GraphState>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Working copy of the graph plus the lock on the committed state.
pub struct InMemoryGraphTransaction {
    committed: OwnedMutexGuard<GraphState>,
    working: GraphState,
}

#[async_trait]
impl GraphRepository for InMemoryGraph {
    type Tx = InMemoryGraphTransaction;

    async fn begin(&self) -> DomainResult<Self::Tx> {
        let committed = Arc::clone(&self.state).lock_owned().await;
        let working = committed.clone();
        Ok(InMemoryGraphTransaction { committed, working })
    }

    async fn commit(&self, tx: Self::Tx) -> DomainResult<()> {
        let InMemoryGraphTransaction { mut committed, working } = tx;
        *committed = working;
        Ok(())
    }

    async fn rollback(&self, tx: Self::Tx) -> DomainResult<()> {
        drop(tx);
        Ok(())
    }
}

#[async_trait]
impl AuditSink for InMemoryGraphTransaction {
    async fn record(&mut self, change: FieldChange) -> DomainResult<()> {
        self.working.changes.push(change);
        Ok(())
    }

    async fn history(&mut self, entity_id: Uuid) -> DomainResult<Vec<FieldChange>> {
        Ok(self
            .working
            .changes
            .iter()
            .filter(|c| c.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphTransaction {
    async fn get_task(&mut self, id: Uuid) -> DomainResult<Option<Task>> {
        Ok(self.working.tasks.get(&id).cloned())
    }

    async fn insert_task(&mut self, task: &Task) -> DomainResult<()> {
        if self.working.tasks.contains_key(&task.id) {
            return Err(DomainError::Conflict(format!("task {} already exists", task.id)));
        }
        self.working.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn update_task(&mut self, task: &Task) -> DomainResult<()> {
        match self.working.tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(())
            }
            None => Err(DomainError::TaskNotFound(task.id)),
        }
    }

    async fn get_checklist(&mut self, id: Uuid) -> DomainResult<Option<Checklist>> {
        Ok(self.working.checklists.get(&id).cloned())
    }

    async fn insert_checklist(&mut self, checklist: &Checklist) -> DomainResult<()> {
        if self.working.checklists.contains_key(&checklist.id) {
            return Err(DomainError::Conflict(format!(
                "checklist {} already exists",
                checklist.id
            )));
        }
        self.working.checklists.insert(checklist.id, checklist.clone());
        Ok(())
    }

    async fn update_checklist(&mut self, checklist: &Checklist) -> DomainResult<()> {
        match self.working.checklists.get_mut(&checklist.id) {
            Some(existing) => {
                *existing = checklist.clone();
                Ok(())
            }
            None => Err(DomainError::ChecklistNotFound(checklist.id)),
        }
    }

    async fn insert_link(&mut self, link: &Link) -> DomainResult<()> {
        if !self.working.checklists.contains_key(&link.checklist_id) {
            return Err(DomainError::ChecklistNotFound(link.checklist_id));
        }
        let task_id = match link.kind {
            LinkKind::Owns { parent_task_id } => parent_task_id,
            LinkKind::Requires { sub_task_id } => sub_task_id,
        };
        if !self.working.tasks.contains_key(&task_id) {
            return Err(DomainError::TaskNotFound(task_id));
        }
        self.working.links.push(*link);
        Ok(())
    }

    async fn checklists_of_task(&mut self, task_id: Uuid) -> DomainResult<Vec<Checklist>> {
        let state = &self.working;
        Ok(state
            .links
            .iter()
            .filter(|l| l.parent_task_id() == Some(task_id))
            .filter_map(|l| state.live_checklist(l.checklist_id).cloned())
            .collect())
    }

    async fn owners_of_checklist(&mut self, checklist_id: Uuid) -> DomainResult<Vec<Uuid>> {
        Ok(self
            .working
            .links
            .iter()
            .filter(|l| l.checklist_id == checklist_id)
            .filter_map(Link::parent_task_id)
            .collect())
    }

    async fn subtasks_of_checklist(&mut self, checklist_id: Uuid) -> DomainResult<Vec<Task>> {
        let state = &self.working;
        Ok(state
            .links
            .iter()
            .filter(|l| l.checklist_id == checklist_id)
            .filter_map(Link::sub_task_id)
            .filter_map(|id| state.live_task(id).cloned())
            .collect())
    }

    async fn checklists_requiring_task(&mut self, task_id: Uuid) -> DomainResult<Vec<Uuid>> {
        let state = &self.working;
        Ok(state
            .links
            .iter()
            .filter(|l| l.sub_task_id() == Some(task_id))
            .filter(|l| state.live_checklist(l.checklist_id).is_some())
            .map(|l| l.checklist_id)
            .collect())
    }

    async fn reviews_of_task(&mut self, task_id: Uuid) -> DomainResult<Vec<Task>> {
        let mut reviews: Vec<Task> = self
            .working
            .tasks
            .values()
            .filter(|t| t.is_review() && !t.is_deleted && t.parent_task_id == Some(task_id))
            .cloned()
            .collect();
        reviews.sort_by_key(|t| t.created_at);
        Ok(reviews)
    }

    async fn tasks_for_actor(&mut self, actor: &ActorId) -> DomainResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .working
            .tasks
            .values()
            .filter(|t| !t.is_deleted && t.is_participant(actor))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.created_at);
        Ok(tasks)
    }

    async fn deleted_reviews_of_task(&mut self, task_id: Uuid) -> DomainResult<Vec<Task>> {
        let mut reviews: Vec<Task> = self
            .working
            .tasks
            .values()
            .filter(|t| t.is_review() && t.is_deleted && t.parent_task_id == Some(task_id))
            .cloned()
            .collect();
        reviews.sort_by_key(|t| std::cmp::Reverse(t.created_at));
        Ok(reviews)
    }

    async fn mark_deleted(
        &mut self,
        task_ids: &[Uuid],
        checklist_ids: &[Uuid],
    ) -> DomainResult<()> {
        for id in task_ids {
            let task = self
                .working
                .tasks
                .get_mut(id)
                .ok_or(DomainError::TaskNotFound(*id))?;
            task.is_deleted = true;
        }
        for id in checklist_ids {
            let checklist = self
                .working
                .checklists
                .get_mut(id)
                .ok_or(DomainError::ChecklistNotFound(*id))?;
            checklist.is_deleted = true;
        }
        Ok(())
    }
}
