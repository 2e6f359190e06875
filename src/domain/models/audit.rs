//! Field-change audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actor::ActorId;

/// Kind of entity a change applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Task,
    Checklist,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Checklist => "checklist",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "task" => Some(Self::Task),
            "checklist" => Some(Self::Checklist),
            _ => None,
        }
    }
}

/// Audited fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditField {
    Status,
    IsCompleted,
    IsReviewed,
    IsDeleted,
    IsReviewRequired,
    Output,
    Name,
    Description,
    AssignedTo,
    DueDate,
}

impl AuditField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::IsCompleted => "is_completed",
            Self::IsReviewed => "is_reviewed",
            Self::IsDeleted => "is_deleted",
            Self::IsReviewRequired => "is_review_required",
            Self::Output => "output",
            Self::Name => "name",
            Self::Description => "description",
            Self::AssignedTo => "assigned_to",
            Self::DueDate => "due_date",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "status" => Some(Self::Status),
            "is_completed" => Some(Self::IsCompleted),
            "is_reviewed" => Some(Self::IsReviewed),
            "is_deleted" => Some(Self::IsDeleted),
            "is_review_required" => Some(Self::IsReviewRequired),
            "output" => Some(Self::Output),
            "name" => Some(Self::Name),
            "description" => Some(Self::Description),
            "assigned_to" => Some(Self::AssignedTo),
            "due_date" => Some(Self::DueDate),
            _ => None,
        }
    }
}

/// One field mutation performed on behalf of an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub field: AuditField,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub actor: ActorId,
    pub changed_at: DateTime<Utc>,
}

impl FieldChange {
    pub fn new(
        entity_type: EntityType,
        entity_id: Uuid,
        field: AuditField,
        old_value: Option<String>,
        new_value: Option<String>,
        actor: &ActorId,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_type,
            entity_id,
            field,
            old_value,
            new_value,
            actor: actor.clone(),
            changed_at: Utc::now(),
        }
    }

    pub fn task(
        entity_id: Uuid,
        field: AuditField,
        old_value: impl ToString,
        new_value: impl ToString,
        actor: &ActorId,
    ) -> Self {
        Self::new(
            EntityType::Task,
            entity_id,
            field,
            Some(old_value.to_string()),
            Some(new_value.to_string()),
            actor,
        )
    }

    pub fn checklist(
        entity_id: Uuid,
        field: AuditField,
        old_value: impl ToString,
        new_value: impl ToString,
        actor: &ActorId,
    ) -> Self {
        Self::new(
            EntityType::Checklist,
            entity_id,
            field,
            Some(old_value.to_string()),
            Some(new_value.to_string()),
            actor,
        )
    }
}
