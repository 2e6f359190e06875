//! Common test utilities for integration tests
//!
//! Provides shared fixtures for building task graphs on either storage
//! adapter and for reading back their audit trail.

#![allow(dead_code)]

use std::sync::Arc;

use trellis::adapters::memory::InMemoryGraph;
use trellis::adapters::sqlite::{create_migrated_test_pool, SqliteGraph};
use trellis::domain::models::{ActorId, EngineConfig};
use trellis::domain::ports::GraphRepository;
use trellis::services::{StatusEngine, TaskGraphService};
use uuid::Uuid;

/// The actor every fixture acts as.
pub fn actor() -> ActorId {
    ActorId::new("tester")
}

/// Setup test logging
///
/// Initializes a tracing subscriber writing to the test harness.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A service over a fresh in-memory SQLite database with migrations applied.
pub async fn sqlite_service() -> TaskGraphService<SqliteGraph> {
    sqlite_service_with(EngineConfig::default()).await
}

pub async fn sqlite_service_with(config: EngineConfig) -> TaskGraphService<SqliteGraph> {
    let pool = create_migrated_test_pool()
        .await
        .expect("Failed to create test database");
    TaskGraphService::new(Arc::new(SqliteGraph::new(pool)), StatusEngine::new(config))
}

/// A service over an empty in-memory graph.
pub fn memory_service() -> TaskGraphService<InMemoryGraph> {
    TaskGraphService::new(Arc::new(InMemoryGraph::new()), StatusEngine::default())
}

/// Total number of audit records across `ids`.
pub async fn audit_count<R: GraphRepository>(service: &TaskGraphService<R>, ids: &[Uuid]) -> usize {
    let mut total = 0;
    for id in ids {
        total += service.history(*id).await.expect("history").len();
    }
    total
}
