//! Cascade delete resolution.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::GraphStore;
use crate::services::status_engine::{StatusEngine, WalkBudget};

/// Everything that must be soft-deleted together with a deletion root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionClosure {
    pub task_ids: HashSet<Uuid>,
    pub checklist_ids: HashSet<Uuid>,
}

impl DeletionClosure {
    pub fn len(&self) -> usize {
        self.task_ids.len() + self.checklist_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_ids.is_empty() && self.checklist_ids.is_empty()
    }
}

impl StatusEngine {
    /// Compute the closure reachable from exactly one root.
    ///
    /// From a task: its reviews (recursively), the checklists it owns and
    /// those checklists' subtasks, repeated until nothing new appears. From
    /// a checklist: the checklist itself plus the same expansion from each
    /// of its subtasks. Deleted nodes are neither returned nor expanded.
    #[instrument(skip(self, store))]
    pub async fn resolve_deletion_closure<S: GraphStore + ?Sized>(
        &self,
        store: &mut S,
        task_id: Option<Uuid>,
        checklist_id: Option<Uuid>,
    ) -> DomainResult<DeletionClosure> {
        let mut budget = WalkBudget::new(self.config().max_walk_nodes);
        let mut closure = DeletionClosure::default();
        let mut tasks: VecDeque<Uuid> = VecDeque::new();
        let mut checklists: VecDeque<Uuid> = VecDeque::new();

        match (task_id, checklist_id) {
            (Some(task_id), None) => {
                match store.get_task(task_id).await? {
                    Some(task) if !task.is_deleted => tasks.push_back(task_id),
                    _ => return Err(DomainError::TaskNotFound(task_id)),
                }
            }
            (None, Some(checklist_id)) => {
                match store.get_checklist(checklist_id).await? {
                    Some(checklist) if !checklist.is_deleted => checklists.push_back(checklist_id),
                    _ => return Err(DomainError::ChecklistNotFound(checklist_id)),
                }
            }
            _ => {
                return Err(DomainError::ValidationFailed(
                    "exactly one of a task or a checklist must be given".to_string(),
                ))
            }
        }

        while !tasks.is_empty() || !checklists.is_empty() {
            while let Some(id) = tasks.pop_front() {
                if !closure.task_ids.insert(id) {
                    continue;
                }
                budget.tick()?;
                for review in store.reviews_of_task(id).await? {
                    tasks.push_back(review.id);
                }
                for checklist in store.checklists_of_task(id).await? {
                    checklists.push_back(checklist.id);
                }
            }
            while let Some(id) = checklists.pop_front() {
                if !closure.checklist_ids.insert(id) {
                    continue;
                }
                budget.tick()?;
                for subtask in store.subtasks_of_checklist(id).await? {
                    tasks.push_back(subtask.id);
                }
            }
        }

        info!(
            tasks = closure.task_ids.len(),
            checklists = closure.checklist_ids.len(),
            "Deletion closure resolved"
        );
        Ok(closure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryGraph, InMemoryGraphTransaction};
    use crate::domain::models::{ActorId, Checklist, Link, Task};
    use crate::domain::ports::GraphRepository;

    fn actor() -> ActorId {
        ActorId::new("carol")
    }

    async fn setup() -> (InMemoryGraph, InMemoryGraphTransaction) {
        let graph = InMemoryGraph::new();
        let tx = graph.begin().await.unwrap();
        (graph, tx)
    }

    async fn task(tx: &mut InMemoryGraphTransaction, name: &str) -> Task {
        let task = Task::new(name, actor());
        tx.insert_task(&task).await.unwrap();
        task
    }

    async fn checklist_of(tx: &mut InMemoryGraphTransaction, owner: &Task) -> Checklist {
        let checklist = Checklist::new("Items", actor());
        tx.insert_checklist(&checklist).await.unwrap();
        tx.insert_link(&Link::owns(owner.id, checklist.id)).await.unwrap();
        checklist
    }

    #[tokio::test]
    async fn test_task_root_collects_everything_below() {
        let (_graph, mut tx) = setup().await;
        let root = task(&mut tx, "Root").await;
        let review = Task::review_of(&root, actor());
        tx.insert_task(&review).await.unwrap();
        let review_of_review = Task::review_of(&review, actor());
        tx.insert_task(&review_of_review).await.unwrap();
        let c1 = checklist_of(&mut tx, &root).await;
        let sub = task(&mut tx, "Sub").await;
        tx.insert_link(&Link::requires(c1.id, sub.id)).await.unwrap();
        let c2 = checklist_of(&mut tx, &sub).await;
        let unrelated = task(&mut tx, "Unrelated").await;

        let closure = StatusEngine::default()
            .resolve_deletion_closure(&mut tx, Some(root.id), None)
            .await
            .unwrap();

        assert_eq!(
            closure.task_ids,
            HashSet::from([root.id, review.id, review_of_review.id, sub.id])
        );
        assert_eq!(closure.checklist_ids, HashSet::from([c1.id, c2.id]));
        assert!(!closure.task_ids.contains(&unrelated.id));
    }

    #[tokio::test]
    async fn test_checklist_root_seeds_from_subtasks() {
        let (_graph, mut tx) = setup().await;
        let owner = task(&mut tx, "Owner").await;
        let checklist = checklist_of(&mut tx, &owner).await;
        let sub = task(&mut tx, "Sub").await;
        tx.insert_link(&Link::requires(checklist.id, sub.id)).await.unwrap();

        let closure = StatusEngine::default()
            .resolve_deletion_closure(&mut tx, None, Some(checklist.id))
            .await
            .unwrap();

        assert_eq!(closure.task_ids, HashSet::from([sub.id]));
        assert_eq!(closure.checklist_ids, HashSet::from([checklist.id]));
    }

    #[tokio::test]
    async fn test_shared_checklist_visited_once() {
        let (_graph, mut tx) = setup().await;
        let a = task(&mut tx, "A").await;
        let b = task(&mut tx, "B").await;
        let shared = checklist_of(&mut tx, &a).await;
        tx.insert_link(&Link::owns(b.id, shared.id)).await.unwrap();
        tx.insert_link(&Link::requires(shared.id, b.id)).await.unwrap();

        let closure = StatusEngine::default()
            .resolve_deletion_closure(&mut tx, Some(a.id), None)
            .await
            .unwrap();

        assert_eq!(closure.task_ids, HashSet::from([a.id, b.id]));
        assert_eq!(closure.checklist_ids, HashSet::from([shared.id]));
        assert_eq!(closure.len(), 3);
    }

    #[tokio::test]
    async fn test_root_arguments_validated() {
        let (_graph, mut tx) = setup().await;
        let engine = StatusEngine::default();

        let err = engine.resolve_deletion_closure(&mut tx, None, None).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));

        let err = engine
            .resolve_deletion_closure(&mut tx, Some(Uuid::new_v4()), Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));

        let err = engine
            .resolve_deletion_closure(&mut tx, Some(Uuid::new_v4()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_deleted_root_not_found() {
        let (_graph, mut tx) = setup().await;
        let gone = task(&mut tx, "Gone").await;
        tx.mark_deleted(&[gone.id], &[]).await.unwrap();

        let err = StatusEngine::default()
            .resolve_deletion_closure(&mut tx, Some(gone.id), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::TaskNotFound(_)));
    }
}
