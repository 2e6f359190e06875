//! Domain errors for the Trellis task graph.

use thiserror::Error;
use uuid::Uuid;

/// Coarse classification of a [`DomainError`], used by callers to decide how
/// to surface a failure (client error, conflict, internal failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Precondition,
    Authorization,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Precondition => "precondition",
            Self::Authorization => "authorization",
            Self::Internal => "internal",
        }
    }
}

/// Domain-level errors that can occur while reading or mutating the task graph.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Checklist not found: {0}")]
    ChecklistNotFound(Uuid),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Graph walk visited more than {0} nodes")]
    WalkLimitExceeded(usize),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TaskNotFound(_) | Self::ChecklistNotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) | Self::ValidationFailed(_) => ErrorKind::Conflict,
            Self::PreconditionFailed(_) => ErrorKind::Precondition,
            Self::Unauthorized(_) => ErrorKind::Authorization,
            Self::WalkLimitExceeded(_) | Self::DatabaseError(_) | Self::SerializationError(_) => {
                ErrorKind::Internal
            }
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
