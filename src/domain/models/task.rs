//! Task domain model.
//!
//! Tasks are units of work. A Normal task owns checklists and may be reviewed
//! by a Review task; Review tasks point at the task they review through
//! `parent_task_id` and may themselves be reviewed, forming a chain that
//! always ends in exactly one Normal task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actor::ActorId;

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Freshly created, nothing planned yet
    New,
    /// Planned but no checklist completed
    ToDo,
    /// At least one checklist completed
    InProgress,
    /// All checklists complete, waiting for a reviewer
    InReview,
    /// Done
    Completed,
    /// Sent back for rework after review
    InReEdit,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::ToDo
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::ToDo => "to_do",
            Self::InProgress => "in_progress",
            Self::InReview => "in_review",
            Self::Completed => "completed",
            Self::InReEdit => "in_re_edit",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "to_do" => Some(Self::ToDo),
            "in_progress" => Some(Self::InProgress),
            "in_review" => Some(Self::InReview),
            "completed" => Some(Self::Completed),
            "in_re_edit" => Some(Self::InReEdit),
            _ => None,
        }
    }

    /// Statuses the incompletion cascade leaves untouched.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::ToDo | Self::InProgress)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Normal,
    Review,
}

impl Default for TaskType {
    fn default() -> Self {
        Self::Normal
    }
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Review => "review",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "review" => Some(Self::Review),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work in the task graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub output: Option<String>,
    pub assigned_to: Option<ActorId>,
    pub created_by: ActorId,
    pub status: TaskStatus,
    /// Status held before the current one; the cursor used when a
    /// transition is reversed.
    pub previous_status: Option<TaskStatus>,
    pub task_type: TaskType,
    /// For Review tasks, the task under review.
    pub parent_task_id: Option<Uuid>,
    pub is_review_required: bool,
    pub is_reviewed: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a Normal task in `ToDo`.
    pub fn new(name: impl Into<String>, created_by: ActorId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            due_date: None,
            output: None,
            assigned_to: None,
            created_by,
            status: TaskStatus::ToDo,
            previous_status: None,
            task_type: TaskType::Normal,
            parent_task_id: None,
            is_review_required: false,
            is_reviewed: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a Review task for `reviewed`, in `ToDo`.
    pub fn review_of(reviewed: &Task, created_by: ActorId) -> Self {
        let mut review = Self::new(format!("Review - {}", reviewed.name), created_by);
        review.description = "Review task".to_string();
        review.task_type = TaskType::Review;
        review.parent_task_id = Some(reviewed.id);
        review.due_date = reviewed.due_date;
        review.output = reviewed.output.clone();
        review
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_assignee(mut self, assignee: ActorId) -> Self {
        self.assigned_to = Some(assignee);
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_review_required(mut self, required: bool) -> Self {
        self.is_review_required = required;
        self
    }

    pub fn is_review(&self) -> bool {
        self.task_type == TaskType::Review
    }

    /// Whether `actor` created the task or is assigned to it.
    pub fn is_participant(&self, actor: &ActorId) -> bool {
        &self.created_by == actor || self.assigned_to.as_ref() == Some(actor)
    }

    /// Move to `status`, remembering the current status as the previous one.
    ///
    /// Returns the replaced status, or `None` when already in `status`.
    pub fn transition_to(&mut self, status: TaskStatus) -> Option<TaskStatus> {
        if self.status == status {
            return None;
        }
        let old = self.status;
        self.previous_status = Some(old);
        self.status = status;
        self.updated_at = Utc::now();
        Some(old)
    }

    /// Exchange `status` and `previous_status`.
    ///
    /// A task without a previous status falls back to `ToDo`.
    pub fn swap_with_previous(&mut self) -> Option<TaskStatus> {
        let restored = self.previous_status.unwrap_or(TaskStatus::ToDo);
        let old = self.status;
        self.previous_status = Some(old);
        self.status = restored;
        self.updated_at = Utc::now();
        (old != restored).then_some(old)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("task name cannot be empty".to_string());
        }
        match self.task_type {
            TaskType::Review if self.parent_task_id.is_none() => {
                Err("review task must reference the task it reviews".to_string())
            }
            TaskType::Normal if self.parent_task_id.is_some() => {
                Err("normal task cannot have a reviewed parent".to_string())
            }
            _ => Ok(()),
        }
    }
}
