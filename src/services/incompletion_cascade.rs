//! Incompletion cascade: walks upward from a checklist that regressed to
//! incomplete, reopening every ancestor task that had moved past work.

use std::collections::{HashSet, VecDeque};

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ActorId, TaskStatus};
use crate::domain::ports::GraphStore;
use crate::services::status_engine::{Propagation, StatusEngine};

impl StatusEngine {
    #[instrument(skip(self, store), fields(actor = %actor))]
    pub async fn cascade_incomplete<S: GraphStore + ?Sized>(
        &self,
        store: &mut S,
        checklist_id: Uuid,
        actor: &ActorId,
    ) -> DomainResult<()> {
        let mut run = self.propagation(store, actor);
        run.live_checklist(checklist_id).await?;
        let mut visited = HashSet::new();
        run.cascade_from(vec![checklist_id], &mut visited).await?;
        info!(visited = run.budget.visited(), "Incompletion cascade finished");
        Ok(())
    }
}

impl<S: GraphStore + ?Sized> Propagation<'_, S> {
    /// Regress each seeded checklist and everything above it.
    ///
    /// `visited` holds checklist ids already handled by the current
    /// operation; callers that cascade more than once share it.
    pub(crate) async fn cascade_from(
        &mut self,
        seeds: Vec<Uuid>,
        visited: &mut HashSet<Uuid>,
    ) -> DomainResult<()> {
        let mut queue: VecDeque<Uuid> = seeds.into();

        while let Some(checklist_id) = queue.pop_front() {
            if !visited.insert(checklist_id) {
                continue;
            }
            self.budget.tick()?;

            let Some(mut checklist) = self.store.get_checklist(checklist_id).await? else {
                continue;
            };
            if checklist.is_deleted {
                continue;
            }
            self.set_completed(&mut checklist, false).await?;

            for owner_id in self.store.owners_of_checklist(checklist_id).await? {
                let Some(mut owner) = self.store.get_task(owner_id).await? else {
                    continue;
                };
                if owner.is_deleted {
                    continue;
                }

                if !owner.status.is_open() {
                    let siblings = self.store.checklists_of_task(owner_id).await?;
                    let target = if siblings.iter().any(|c| c.is_completed) {
                        TaskStatus::InProgress
                    } else {
                        TaskStatus::ToDo
                    };
                    self.set_status(&mut owner, target).await?;

                    if owner.is_review_required {
                        // Roll the review back rather than resetting it forward.
                        for mut review in self.store.reviews_of_task(owner_id).await? {
                            self.swap_status(&mut review).await?;
                        }
                    }
                }

                queue.extend(self.store.checklists_requiring_task(owner_id).await?);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryGraph, InMemoryGraphTransaction};
    use crate::domain::errors::DomainError;
    use crate::domain::models::{Checklist, Link, Task};
    use crate::domain::ports::{AuditSink, GraphRepository};

    fn actor() -> ActorId {
        ActorId::new("bob")
    }

    async fn setup() -> (InMemoryGraph, InMemoryGraphTransaction) {
        let graph = InMemoryGraph::new();
        let tx = graph.begin().await.unwrap();
        (graph, tx)
    }

    async fn owned(tx: &mut InMemoryGraphTransaction, owner: &Task, done: bool) -> Checklist {
        let mut checklist = Checklist::new("Items", actor());
        checklist.is_completed = done;
        tx.insert_checklist(&checklist).await.unwrap();
        tx.insert_link(&Link::owns(owner.id, checklist.id)).await.unwrap();
        checklist
    }

    #[tokio::test]
    async fn test_completed_task_reopens_by_sibling_count() {
        let (_graph, mut tx) = setup().await;
        let task = Task::new("Task", actor()).with_status(TaskStatus::Completed);
        tx.insert_task(&task).await.unwrap();
        let a = owned(&mut tx, &task, true).await;
        owned(&mut tx, &task, true).await;

        StatusEngine::default()
            .cascade_incomplete(&mut tx, a.id, &actor())
            .await
            .unwrap();

        assert!(!tx.get_checklist(a.id).await.unwrap().unwrap().is_completed);
        assert_eq!(tx.get_task(task.id).await.unwrap().unwrap().status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_no_completed_siblings_means_to_do() {
        let (_graph, mut tx) = setup().await;
        let task = Task::new("Task", actor()).with_status(TaskStatus::Completed);
        tx.insert_task(&task).await.unwrap();
        let only = owned(&mut tx, &task, true).await;

        StatusEngine::default()
            .cascade_incomplete(&mut tx, only.id, &actor())
            .await
            .unwrap();

        assert_eq!(tx.get_task(task.id).await.unwrap().unwrap().status, TaskStatus::ToDo);
    }

    #[tokio::test]
    async fn test_open_task_left_alone() {
        let (_graph, mut tx) = setup().await;
        let task = Task::new("Task", actor()).with_status(TaskStatus::InProgress);
        tx.insert_task(&task).await.unwrap();
        let only = owned(&mut tx, &task, true).await;

        StatusEngine::default()
            .cascade_incomplete(&mut tx, only.id, &actor())
            .await
            .unwrap();

        assert_eq!(tx.get_task(task.id).await.unwrap().unwrap().status, TaskStatus::InProgress);
        assert!(tx.history(task.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_review_status_swapped() {
        let (_graph, mut tx) = setup().await;
        let task = Task::new("Task", actor())
            .with_review_required(true)
            .with_status(TaskStatus::InReview);
        tx.insert_task(&task).await.unwrap();
        let mut review = Task::review_of(&task, actor()).with_status(TaskStatus::ToDo);
        review.previous_status = Some(TaskStatus::InProgress);
        tx.insert_task(&review).await.unwrap();
        let only = owned(&mut tx, &task, true).await;

        StatusEngine::default()
            .cascade_incomplete(&mut tx, only.id, &actor())
            .await
            .unwrap();

        let review = tx.get_task(review.id).await.unwrap().unwrap();
        assert_eq!(review.status, TaskStatus::InProgress);
        assert_eq!(review.previous_status, Some(TaskStatus::ToDo));
    }

    #[tokio::test]
    async fn test_regression_climbs_to_grandparent() {
        let (_graph, mut tx) = setup().await;
        let grandparent = Task::new("Grandparent", actor()).with_status(TaskStatus::Completed);
        let parent = Task::new("Parent", actor()).with_status(TaskStatus::Completed);
        tx.insert_task(&grandparent).await.unwrap();
        tx.insert_task(&parent).await.unwrap();
        let upper = owned(&mut tx, &grandparent, true).await;
        tx.insert_link(&Link::requires(upper.id, parent.id)).await.unwrap();
        let lower = owned(&mut tx, &parent, true).await;

        StatusEngine::default()
            .cascade_incomplete(&mut tx, lower.id, &actor())
            .await
            .unwrap();

        assert_eq!(tx.get_task(parent.id).await.unwrap().unwrap().status, TaskStatus::ToDo);
        assert!(!tx.get_checklist(upper.id).await.unwrap().unwrap().is_completed);
        assert_eq!(tx.get_task(grandparent.id).await.unwrap().unwrap().status, TaskStatus::ToDo);
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let (_graph, mut tx) = setup().await;
        let a = Task::new("A", actor()).with_status(TaskStatus::Completed);
        let b = Task::new("B", actor()).with_status(TaskStatus::Completed);
        tx.insert_task(&a).await.unwrap();
        tx.insert_task(&b).await.unwrap();
        let of_a = owned(&mut tx, &a, true).await;
        let of_b = owned(&mut tx, &b, true).await;
        tx.insert_link(&Link::requires(of_a.id, b.id)).await.unwrap();
        tx.insert_link(&Link::requires(of_b.id, a.id)).await.unwrap();

        StatusEngine::default()
            .cascade_incomplete(&mut tx, of_a.id, &actor())
            .await
            .unwrap();

        assert!(!tx.get_checklist(of_b.id).await.unwrap().unwrap().is_completed);
    }

    #[tokio::test]
    async fn test_missing_checklist_not_found() {
        let (_graph, mut tx) = setup().await;
        let err = StatusEngine::default()
            .cascade_incomplete(&mut tx, Uuid::new_v4(), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ChecklistNotFound(_)));
    }
}
