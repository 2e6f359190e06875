pub mod actor;
pub mod audit;
pub mod checklist;
pub mod config;
pub mod task;

pub use actor::ActorId;
pub use audit::{AuditField, EntityType, FieldChange};
pub use checklist::{Checklist, Link, LinkKind};
pub use config::{Config, DatabaseConfig, EngineConfig, LoggingConfig};
pub use task::{Task, TaskStatus, TaskType};
