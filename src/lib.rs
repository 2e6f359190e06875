//! Trellis - task and checklist tracking with status propagation
//!
//! Tasks own checklists, checklists can require subtasks, and tasks can be
//! reviewed by chains of review tasks. Every change to one of these
//! entities is carried through the graph so that statuses stay consistent,
//! and every field the engine touches is recorded in an audit log.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and the storage ports
//! - **Service Layer** (`services`): The status engine and the transactional service
//! - **Adapters** (`adapters`): SQLite and in-memory implementations of the ports
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use trellis::adapters::memory::InMemoryGraph;
//! use trellis::domain::models::ActorId;
//! use trellis::services::{NewTask, StatusEngine, TaskGraphService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = TaskGraphService::new(Arc::new(InMemoryGraph::new()), StatusEngine::default());
//!     let actor = ActorId::new("alice");
//!     let created = service
//!         .create_task(NewTask::new("Release").with_checklists(["Build", "Publish"]), &actor)
//!         .await?;
//!     service.toggle_checklist(created.checklists[0].id, true, &actor).await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult, ErrorKind};
pub use domain::models::{
    ActorId, Checklist, Config, DatabaseConfig, EngineConfig, FieldChange, LoggingConfig, Task,
    TaskStatus, TaskType,
};
pub use domain::ports::{AuditSink, GraphRepository, GraphStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    DeleteTarget, DeletionClosure, NewTask, StatusEngine, TaskFilter, TaskGraphService, TaskUpdate,
};
