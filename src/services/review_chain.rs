//! Review chain coordination.
//!
//! A Review task points at the task it reviews through `parent_task_id`.
//! Reviews may be reviewed in turn, so following parents from any review
//! walks a chain that ends at one Normal task. Approval runs up that chain
//! marking everything `Completed`; revocation restores the statuses approval
//! replaced, both up the chain and in any reviews below the revoked one.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ActorId, Task, TaskStatus};
use crate::domain::ports::GraphStore;
use crate::services::status_engine::{Propagation, StatusEngine};

/// A review chain resolved from one review up to the Normal task it
/// ultimately reviews.
struct ReviewChain {
    /// Reviews from the starting review upward.
    reviews: Vec<Task>,
    reviewed: Task,
}

impl StatusEngine {
    /// Approve the last review in a chain.
    ///
    /// Every precondition is checked before the first write: the task must
    /// be a review with no review of its own, its checklists must be
    /// complete, and (when configured) so must the reviewed task's.
    #[instrument(skip(self, store), fields(actor = %actor))]
    pub async fn propagate_review_completion<S: GraphStore + ?Sized>(
        &self,
        store: &mut S,
        review_task_id: Uuid,
        actor: &ActorId,
    ) -> DomainResult<()> {
        let mut run = self.propagation(store, actor);
        run.approve_review(review_task_id).await?;
        info!(visited = run.budget.visited(), "Review approval propagated");
        Ok(())
    }

    /// Undo an approval: restore the chain's prior statuses, clear the
    /// approval flags and regress anything that depended on the reviewed
    /// task being `Completed`.
    #[instrument(skip(self, store), fields(actor = %actor))]
    pub async fn reverse_review_completion<S: GraphStore + ?Sized>(
        &self,
        store: &mut S,
        review_task_id: Uuid,
        actor: &ActorId,
    ) -> DomainResult<()> {
        let mut run = self.propagation(store, actor);
        run.reverse_review(review_task_id).await?;
        info!(visited = run.budget.visited(), "Review approval reversed");
        Ok(())
    }

    /// Set a task's output and push it down its review chain, reopening
    /// every review so the new output gets looked at.
    #[instrument(skip(self, store, output), fields(actor = %actor))]
    pub async fn propagate_output<S: GraphStore + ?Sized>(
        &self,
        store: &mut S,
        task_id: Uuid,
        output: String,
        actor: &ActorId,
    ) -> DomainResult<()> {
        let mut run = self.propagation(store, actor);
        run.propagate_output(task_id, output).await?;
        info!(visited = run.budget.visited(), "Output propagated to reviews");
        Ok(())
    }
}

impl<S: GraphStore + ?Sized> Propagation<'_, S> {
    async fn review_chain(&mut self, review: Task) -> DomainResult<ReviewChain> {
        let mut seen = HashSet::from([review.id]);
        let mut cursor = review.parent_task_id;
        let mut reviews = vec![review];

        loop {
            self.budget.tick()?;
            let Some(parent_id) = cursor else {
                return Err(DomainError::ValidationFailed(
                    "review chain does not end in a normal task".to_string(),
                ));
            };
            if !seen.insert(parent_id) {
                return Err(DomainError::ValidationFailed(format!(
                    "review chain loops back to task {parent_id}"
                )));
            }
            let parent = match self.store.get_task(parent_id).await? {
                Some(task) if !task.is_deleted => task,
                _ => {
                    return Err(DomainError::ValidationFailed(format!(
                        "reviewed task {parent_id} is missing"
                    )))
                }
            };
            if parent.is_review() {
                cursor = parent.parent_task_id;
                reviews.push(parent);
            } else {
                return Ok(ReviewChain {
                    reviews,
                    reviewed: parent,
                });
            }
        }
    }

    async fn load_review(&mut self, review_task_id: Uuid) -> DomainResult<Task> {
        let review = self.live_task(review_task_id).await?;
        if !review.is_review() {
            return Err(DomainError::PreconditionFailed(format!(
                "task {review_task_id} is not a review task"
            )));
        }
        Ok(review)
    }

    pub(crate) async fn approve_review(&mut self, review_task_id: Uuid) -> DomainResult<()> {
        let review = self.load_review(review_task_id).await?;

        if !self.store.reviews_of_task(review_task_id).await?.is_empty() {
            return Err(DomainError::Unauthorized(format!(
                "review {review_task_id} is itself under review; only the last review in a chain can be approved"
            )));
        }
        if !self.store.checklists_of_task(review_task_id).await?.iter().all(|c| c.is_completed) {
            return Err(DomainError::PreconditionFailed(format!(
                "review {review_task_id} has incomplete checklists"
            )));
        }

        let chain = self.review_chain(review).await?;
        let reviewed_id = chain.reviewed.id;
        if self.config.require_reviewed_task_checklists
            && !self.store.checklists_of_task(reviewed_id).await?.iter().all(|c| c.is_completed)
        {
            return Err(DomainError::PreconditionFailed(format!(
                "reviewed task {reviewed_id} has incomplete checklists"
            )));
        }

        for mut review in chain.reviews {
            self.set_status(&mut review, TaskStatus::Completed).await?;
            self.set_reviewed(&mut review, true).await?;
        }
        let mut reviewed = chain.reviewed;
        self.set_status(&mut reviewed, TaskStatus::Completed).await?;
        debug!(task_id = %reviewed_id, "Reviewed task approved");

        let owners = self.lift_dependents(reviewed_id).await?;
        self.roll_up_from(owners).await
    }

    pub(crate) async fn reverse_review(&mut self, review_task_id: Uuid) -> DomainResult<()> {
        let review = self.load_review(review_task_id).await?;
        self.unapprove_reviews_below(review_task_id).await?;
        let chain = self.review_chain(review).await?;

        for mut review in chain.reviews {
            if review.status.is_completed() {
                let restored = review.previous_status.unwrap_or(TaskStatus::ToDo);
                self.set_status(&mut review, restored).await?;
            }
            self.set_reviewed(&mut review, false).await?;
        }

        let mut reviewed = chain.reviewed;
        if reviewed.status.is_completed() {
            let fallback = if reviewed.is_review_required {
                TaskStatus::InReview
            } else {
                TaskStatus::InProgress
            };
            let restored = reviewed
                .previous_status
                .filter(|s| !s.is_completed())
                .unwrap_or(fallback);
            self.set_status(&mut reviewed, restored).await?;

            let requiring = self.store.checklists_requiring_task(reviewed.id).await?;
            let mut visited = HashSet::new();
            self.cascade_from(requiring, &mut visited).await?;
        }
        Ok(())
    }

    /// Reviews further down the chain approved the work being reopened, so
    /// each of them goes back to the status it held before approval.
    async fn unapprove_reviews_below(&mut self, review_task_id: Uuid) -> DomainResult<()> {
        let mut queue: VecDeque<Task> = self.store.reviews_of_task(review_task_id).await?.into();
        let mut visited = HashSet::from([review_task_id]);
        while let Some(mut review) = queue.pop_front() {
            if !visited.insert(review.id) {
                continue;
            }
            self.budget.tick()?;
            if review.status.is_completed() {
                let restored = review
                    .previous_status
                    .filter(|s| !s.is_completed())
                    .unwrap_or(TaskStatus::ToDo);
                self.set_status(&mut review, restored).await?;
            }
            self.set_reviewed(&mut review, false).await?;
            queue.extend(self.store.reviews_of_task(review.id).await?);
        }
        Ok(())
    }

    async fn propagate_output(&mut self, task_id: Uuid, output: String) -> DomainResult<()> {
        let mut task = self.live_task(task_id).await?;
        self.set_output(&mut task, Some(output.clone())).await?;

        let mut queue: VecDeque<Task> = self.store.reviews_of_task(task_id).await?.into();
        let mut visited = HashSet::from([task_id]);
        while let Some(mut review) = queue.pop_front() {
            if !visited.insert(review.id) {
                continue;
            }
            self.budget.tick()?;
            self.set_output(&mut review, Some(output.clone())).await?;
            self.set_reviewed(&mut review, false).await?;
            self.set_status(&mut review, TaskStatus::ToDo).await?;
            queue.extend(self.store.reviews_of_task(review.id).await?);
        }
        Ok(())
    }

    /// Called when a review's own checklist is completed: once all of the
    /// review's checklists are done, every review of that review starts
    /// over with the review's output.
    pub(crate) async fn reopen_next_reviews(&mut self, review_task_id: Uuid) -> DomainResult<()> {
        if !self.store.checklists_of_task(review_task_id).await?.iter().all(|c| c.is_completed) {
            return Ok(());
        }
        let review = self.live_task(review_task_id).await?;
        for mut next in self.store.reviews_of_task(review_task_id).await? {
            self.budget.tick()?;
            self.set_status(&mut next, TaskStatus::ToDo).await?;
            self.set_output(&mut next, review.output.clone()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryGraph, InMemoryGraphTransaction};
    use crate::domain::models::{Checklist, EngineConfig, Link};
    use crate::domain::ports::{AuditSink, GraphRepository};

    fn actor() -> ActorId {
        ActorId::new("reviewer")
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

    /// A task in review with its checklist done, plus its review.
    async fn reviewed_pair(tx: &mut InMemoryGraphTransaction) -> (Task, Task) {
        let mut task = Task::new("Task", actor())
            .with_review_required(true)
            .with_status(TaskStatus::InReview);
        task.previous_status = Some(TaskStatus::InProgress);
        tx.insert_task(&task).await.unwrap();
        owned(tx, &task, true).await;
        let review = Task::review_of(&task, actor());
        tx.insert_task(&review).await.unwrap();
        (task, review)
    }

    #[tokio::test]
    async fn test_approve_then_revoke_round_trip() {
        let (_graph, mut tx) = setup().await;
        let (task, review) = reviewed_pair(&mut tx).await;
        let engine = StatusEngine::default();

        engine.propagate_review_completion(&mut tx, review.id, &actor()).await.unwrap();
        let approved = tx.get_task(review.id).await.unwrap().unwrap();
        assert_eq!(approved.status, TaskStatus::Completed);
        assert!(approved.is_reviewed);
        assert_eq!(tx.get_task(task.id).await.unwrap().unwrap().status, TaskStatus::Completed);

        engine.reverse_review_completion(&mut tx, review.id, &actor()).await.unwrap();
        let task_after = tx.get_task(task.id).await.unwrap().unwrap();
        let review_after = tx.get_task(review.id).await.unwrap().unwrap();
        assert_eq!(task_after.status, task.status);
        assert_eq!(review_after.status, review.status);
        assert!(!review_after.is_reviewed);
    }

    #[tokio::test]
    async fn test_approve_non_terminal_review_unauthorized() {
        let (_graph, mut tx) = setup().await;
        let (_task, review) = reviewed_pair(&mut tx).await;
        let second = Task::review_of(&review, actor());
        tx.insert_task(&second).await.unwrap();

        let err = StatusEngine::default()
            .propagate_review_completion(&mut tx, review.id, &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
        assert!(tx.history(review.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_approve_with_incomplete_review_checklist() {
        let (_graph, mut tx) = setup().await;
        let (task, review) = reviewed_pair(&mut tx).await;
        owned(&mut tx, &review, false).await;

        let err = StatusEngine::default()
            .propagate_review_completion(&mut tx, review.id, &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PreconditionFailed(_)));
        assert!(tx.history(task.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reviewed_task_checklists_gate_is_configurable() {
        let (_graph, mut tx) = setup().await;
        let (task, review) = reviewed_pair(&mut tx).await;
        owned(&mut tx, &task, false).await;

        let strict = StatusEngine::default();
        let err = strict
            .propagate_review_completion(&mut tx, review.id, &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PreconditionFailed(_)));

        let lenient = StatusEngine::new(EngineConfig {
            require_reviewed_task_checklists: false,
            ..EngineConfig::default()
        });
        lenient.propagate_review_completion(&mut tx, review.id, &actor()).await.unwrap();
        assert_eq!(tx.get_task(task.id).await.unwrap().unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_approve_normal_task_rejected() {
        let (_graph, mut tx) = setup().await;
        let (task, _review) = reviewed_pair(&mut tx).await;

        let err = StatusEngine::default()
            .propagate_review_completion(&mut tx, task.id, &actor())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn test_chain_of_reviews_completes_to_the_root() {
        let (_graph, mut tx) = setup().await;
        let (task, first) = reviewed_pair(&mut tx).await;
        let second = Task::review_of(&first, actor());
        tx.insert_task(&second).await.unwrap();

        StatusEngine::default()
            .propagate_review_completion(&mut tx, second.id, &actor())
            .await
            .unwrap();

        for id in [second.id, first.id, task.id] {
            assert_eq!(tx.get_task(id).await.unwrap().unwrap().status, TaskStatus::Completed);
        }
        assert!(tx.get_task(first.id).await.unwrap().unwrap().is_reviewed);
    }

    #[tokio::test]
    async fn test_approval_completes_parent_checklist() {
        let (_graph, mut tx) = setup().await;
        let (task, review) = reviewed_pair(&mut tx).await;
        let parent = Task::new("Parent", actor());
        tx.insert_task(&parent).await.unwrap();
        let gate = owned(&mut tx, &parent, false).await;
        tx.insert_link(&Link::requires(gate.id, task.id)).await.unwrap();

        let engine = StatusEngine::default();
        engine.propagate_review_completion(&mut tx, review.id, &actor()).await.unwrap();
        assert!(tx.get_checklist(gate.id).await.unwrap().unwrap().is_completed);
        assert_eq!(tx.get_task(parent.id).await.unwrap().unwrap().status, TaskStatus::Completed);

        engine.reverse_review_completion(&mut tx, review.id, &actor()).await.unwrap();
        assert!(!tx.get_checklist(gate.id).await.unwrap().unwrap().is_completed);
        assert_eq!(tx.get_task(parent.id).await.unwrap().unwrap().status, TaskStatus::ToDo);
    }

    #[tokio::test]
    async fn test_reopening_middle_review_unapproves_the_rest_of_the_chain() {
        let (_graph, mut tx) = setup().await;
        let (task, first) = reviewed_pair(&mut tx).await;
        let notes = owned(&mut tx, &first, true).await;
        let second = Task::review_of(&first, actor());
        tx.insert_task(&second).await.unwrap();
        let engine = StatusEngine::default();

        engine.propagate_review_completion(&mut tx, second.id, &actor()).await.unwrap();
        assert!(tx.get_task(second.id).await.unwrap().unwrap().is_reviewed);

        engine.toggle_checklist(&mut tx, notes.id, false, &actor()).await.unwrap();

        assert_eq!(tx.get_task(task.id).await.unwrap().unwrap().status, TaskStatus::InReview);
        for id in [first.id, second.id] {
            let review = tx.get_task(id).await.unwrap().unwrap();
            assert_eq!(review.status, TaskStatus::ToDo);
            assert!(!review.is_reviewed);
        }
    }

    #[tokio::test]
    async fn test_review_leaving_completed_drops_approval() {
        let (_graph, mut tx) = setup().await;
        let (task, review) = reviewed_pair(&mut tx).await;
        let engine = StatusEngine::default();
        engine.propagate_review_completion(&mut tx, review.id, &actor()).await.unwrap();

        let items = tx.checklists_of_task(task.id).await.unwrap();
        engine.cascade_incomplete(&mut tx, items[0].id, &actor()).await.unwrap();

        assert_eq!(tx.get_task(task.id).await.unwrap().unwrap().status, TaskStatus::ToDo);
        let review = tx.get_task(review.id).await.unwrap().unwrap();
        assert_eq!(review.status, TaskStatus::ToDo);
        assert!(!review.is_reviewed);
        let approvals: Vec<_> = tx
            .history(review.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.field == crate::domain::models::AuditField::IsReviewed)
            .collect();
        assert_eq!(approvals.len(), 2);
    }

    #[tokio::test]
    async fn test_output_flows_down_the_chain() {
        let (_graph, mut tx) = setup().await;
        let (task, first) = reviewed_pair(&mut tx).await;
        let mut second = Task::review_of(&first, actor()).with_status(TaskStatus::Completed);
        second.is_reviewed = true;
        tx.insert_task(&second).await.unwrap();

        StatusEngine::default()
            .propagate_output(&mut tx, task.id, "report.pdf".to_string(), &actor())
            .await
            .unwrap();

        assert_eq!(tx.get_task(task.id).await.unwrap().unwrap().output.as_deref(), Some("report.pdf"));
        let second = tx.get_task(second.id).await.unwrap().unwrap();
        assert_eq!(second.output.as_deref(), Some("report.pdf"));
        assert_eq!(second.status, TaskStatus::ToDo);
        assert!(!second.is_reviewed);
    }
}
