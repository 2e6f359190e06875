//! Checklist and link domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actor::ActorId;

/// A named completion gate attached to a task.
///
/// Completion is set manually while the checklist has no subtasks, and is
/// derived from its subtasks (all `Completed`) once it has at least one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    pub id: Uuid,
    pub name: String,
    pub is_completed: bool,
    pub is_deleted: bool,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checklist {
    pub fn new(name: impl Into<String>, created_by: ActorId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            is_completed: false,
            is_deleted: false,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn completed(mut self) -> Self {
        self.is_completed = true;
        self
    }

    /// Set the completion flag. Returns the old value when it changed.
    pub fn set_completed(&mut self, value: bool) -> Option<bool> {
        if self.is_completed == value {
            return None;
        }
        self.is_completed = value;
        self.updated_at = Utc::now();
        Some(!value)
    }
}

/// The two roles a link row can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum LinkKind {
    /// The checklist belongs to `parent_task_id` as one of its items.
    Owns { parent_task_id: Uuid },
    /// `sub_task_id` is one completion-determining item of the checklist.
    Requires { sub_task_id: Uuid },
}

/// Join record between tasks and checklists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,
    pub checklist_id: Uuid,
    #[serde(flatten)]
    pub kind: LinkKind,
}

impl Link {
    pub fn owns(parent_task_id: Uuid, checklist_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            checklist_id,
            kind: LinkKind::Owns { parent_task_id },
        }
    }

    pub fn requires(checklist_id: Uuid, sub_task_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            checklist_id,
            kind: LinkKind::Requires { sub_task_id },
        }
    }

    pub fn parent_task_id(&self) -> Option<Uuid> {
        match self.kind {
            LinkKind::Owns { parent_task_id } => Some(parent_task_id),
            LinkKind::Requires { .. } => None,
        }
    }

    pub fn sub_task_id(&self) -> Option<Uuid> {
        match self.kind {
            LinkKind::Owns { .. } => None,
            LinkKind::Requires { sub_task_id } => Some(sub_task_id),
        }
    }
}
