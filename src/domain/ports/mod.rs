//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the async trait interfaces storage adapters implement:
//! - GraphStore: task/checklist/link access inside one transaction
//! - AuditSink: field-change records written in the same transaction
//! - GraphRepository: opens, commits and rolls back transactions

pub mod audit_sink;
pub mod graph_repository;
pub mod graph_store;

pub use audit_sink::AuditSink;
pub use graph_repository::GraphRepository;
pub use graph_store::GraphStore;
