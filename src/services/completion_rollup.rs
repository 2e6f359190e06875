//! Completion rollup: upward status recomputation after a checklist under a
//! task becomes complete.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ActorId, TaskStatus};
use crate::domain::ports::GraphStore;
use crate::services::status_engine::{Propagation, StatusEngine};

impl StatusEngine {
    /// Recompute `task_id`'s status from its checklists and carry the
    /// result upward through every checklist that lists it as a subtask.
    #[instrument(skip(self, store), fields(actor = %actor))]
    pub async fn roll_up_completion<S: GraphStore + ?Sized>(
        &self,
        store: &mut S,
        task_id: Uuid,
        actor: &ActorId,
    ) -> DomainResult<()> {
        let mut run = self.propagation(store, actor);
        run.live_task(task_id).await?;
        run.roll_up_from(vec![task_id]).await?;
        info!(visited = run.budget.visited(), "Completion rollup finished");
        Ok(())
    }
}

impl<S: GraphStore + ?Sized> Propagation<'_, S> {
    /// Run the rollup over every queued task, each at most once.
    pub(crate) async fn roll_up_from(&mut self, seeds: Vec<Uuid>) -> DomainResult<()> {
        let mut queue: VecDeque<Uuid> = seeds.into();
        let mut visited = HashSet::new();
        let mut regressed = HashSet::new();

        while let Some(task_id) = queue.pop_front() {
            if !visited.insert(task_id) {
                continue;
            }
            self.budget.tick()?;

            let Some(mut task) = self.store.get_task(task_id).await? else {
                continue;
            };
            if task.is_deleted {
                continue;
            }

            let checklists = self.store.checklists_of_task(task_id).await?;
            if checklists.iter().all(|c| c.is_completed) {
                let target = if task.is_review_required {
                    TaskStatus::InReview
                } else {
                    TaskStatus::Completed
                };
                if self.set_status(&mut task, target).await? {
                    // A re-completed task needs a fresh look from its reviewer.
                    for mut review in self.store.reviews_of_task(task_id).await? {
                        self.set_status(&mut review, TaskStatus::ToDo).await?;
                    }
                }
                queue.extend(self.lift_dependents(task_id).await?);
            } else {
                let was_completed = task.status.is_completed();
                self.set_status(&mut task, TaskStatus::InProgress).await?;
                if was_completed {
                    let requiring = self.store.checklists_requiring_task(task_id).await?;
                    self.cascade_from(requiring, &mut regressed).await?;
                }
            }
        }
        Ok(())
    }

    /// Complete every checklist whose live subtasks are now all `Completed`
    /// because of `task_id`, returning the owners that need a rollup.
    pub(crate) async fn lift_dependents(&mut self, task_id: Uuid) -> DomainResult<Vec<Uuid>> {
        let mut owners = Vec::new();
        for checklist_id in self.store.checklists_requiring_task(task_id).await? {
            self.budget.tick()?;
            let subtasks = self.store.subtasks_of_checklist(checklist_id).await?;
            if subtasks.is_empty() || !subtasks.iter().all(|t| t.status.is_completed()) {
                continue;
            }
            let Some(mut checklist) = self.store.get_checklist(checklist_id).await? else {
                continue;
            };
            if self.set_completed(&mut checklist, true).await? {
                debug!(%checklist_id, "Checklist completed by its subtasks");
                owners.extend(self.store.owners_of_checklist(checklist_id).await?);
            }
        }
        Ok(owners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryGraph, InMemoryGraphTransaction};
    use crate::domain::errors::DomainError;
    use crate::domain::models::{Checklist, EngineConfig, Link, Task};
    use crate::domain::ports::{AuditSink, GraphRepository};

    fn actor() -> ActorId {
        ActorId::new("alice")
    }

    async fn setup() -> (InMemoryGraph, InMemoryGraphTransaction) {
        let graph = InMemoryGraph::new();
        let tx = graph.begin().await.unwrap();
        (graph, tx)
    }

    async fn add_checklist(tx: &mut InMemoryGraphTransaction, owner: &Task, done: bool) -> Checklist {
        let mut checklist = Checklist::new("Items", actor());
        checklist.is_completed = done;
        tx.insert_checklist(&checklist).await.unwrap();
        tx.insert_link(&Link::owns(owner.id, checklist.id)).await.unwrap();
        checklist
    }

    /// parent --owns--> checklist --requires--> child
    async fn nested(tx: &mut InMemoryGraphTransaction) -> (Task, Checklist, Task) {
        let parent = Task::new("Parent", actor());
        let child = Task::new("Child", actor());
        tx.insert_task(&parent).await.unwrap();
        tx.insert_task(&child).await.unwrap();
        let checklist = add_checklist(tx, &parent, false).await;
        tx.insert_link(&Link::requires(checklist.id, child.id)).await.unwrap();
        (parent, checklist, child)
    }

    #[tokio::test]
    async fn test_partial_checklists_mean_in_progress() {
        let (_graph, mut tx) = setup().await;
        let task = Task::new("Task", actor());
        tx.insert_task(&task).await.unwrap();
        add_checklist(&mut tx, &task, true).await;
        add_checklist(&mut tx, &task, false).await;

        StatusEngine::default()
            .roll_up_completion(&mut tx, task.id, &actor())
            .await
            .unwrap();

        let task = tx.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
    }

    #[tokio::test]
    async fn test_review_required_goes_in_review_and_resets_review() {
        let (_graph, mut tx) = setup().await;
        let task = Task::new("Task", actor()).with_review_required(true);
        tx.insert_task(&task).await.unwrap();
        let review = Task::review_of(&task, actor()).with_status(TaskStatus::Completed);
        tx.insert_task(&review).await.unwrap();
        add_checklist(&mut tx, &task, true).await;

        StatusEngine::default()
            .roll_up_completion(&mut tx, task.id, &actor())
            .await
            .unwrap();

        assert_eq!(tx.get_task(task.id).await.unwrap().unwrap().status, TaskStatus::InReview);
        let review = tx.get_task(review.id).await.unwrap().unwrap();
        assert_eq!(review.status, TaskStatus::ToDo);
        assert_eq!(review.previous_status, Some(TaskStatus::Completed));
    }

    #[tokio::test]
    async fn test_completion_lifts_through_nesting() {
        let (_graph, mut tx) = setup().await;
        let (parent, checklist, child) = nested(&mut tx).await;
        add_checklist(&mut tx, &child, true).await;

        StatusEngine::default()
            .roll_up_completion(&mut tx, child.id, &actor())
            .await
            .unwrap();

        assert_eq!(tx.get_task(child.id).await.unwrap().unwrap().status, TaskStatus::Completed);
        assert!(tx.get_checklist(checklist.id).await.unwrap().unwrap().is_completed);
        assert_eq!(tx.get_task(parent.id).await.unwrap().unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_deleted_subtasks_are_ignored() {
        let (_graph, mut tx) = setup().await;
        let (parent, checklist, child) = nested(&mut tx).await;
        let lagging = Task::new("Lagging", actor());
        tx.insert_task(&lagging).await.unwrap();
        tx.insert_link(&Link::requires(checklist.id, lagging.id)).await.unwrap();
        tx.mark_deleted(&[lagging.id], &[]).await.unwrap();

        StatusEngine::default()
            .roll_up_completion(&mut tx, child.id, &actor())
            .await
            .unwrap();

        assert!(tx.get_checklist(checklist.id).await.unwrap().unwrap().is_completed);
        assert_eq!(tx.get_task(parent.id).await.unwrap().unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_second_rollup_writes_nothing() {
        let (_graph, mut tx) = setup().await;
        let (parent, _checklist, child) = nested(&mut tx).await;
        add_checklist(&mut tx, &child, true).await;
        let engine = StatusEngine::default();

        engine.roll_up_completion(&mut tx, child.id, &actor()).await.unwrap();
        let before = tx.history(parent.id).await.unwrap().len() + tx.history(child.id).await.unwrap().len();
        engine.roll_up_completion(&mut tx, child.id, &actor()).await.unwrap();
        let after = tx.history(parent.id).await.unwrap().len() + tx.history(child.id).await.unwrap().len();

        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_missing_task_not_found() {
        let (_graph, mut tx) = setup().await;
        let err = StatusEngine::default()
            .roll_up_completion(&mut tx, Uuid::new_v4(), &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_walk_limit_aborts() {
        let (_graph, mut tx) = setup().await;
        let (_parent, _checklist, child) = nested(&mut tx).await;
        add_checklist(&mut tx, &child, true).await;
        let engine = StatusEngine::new(EngineConfig {
            max_walk_nodes: 1,
            ..EngineConfig::default()
        });

        let err = engine
            .roll_up_completion(&mut tx, child.id, &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::WalkLimitExceeded(1)));
    }
}
