//! Audit sink port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::FieldChange;

/// Receives one record per field mutation.
///
/// Records are written inside the same transaction as the mutation they
/// describe and roll back with it.
#[async_trait]
pub trait AuditSink: Send {
    async fn record(&mut self, change: FieldChange) -> DomainResult<()>;

    /// Changes recorded for one entity, oldest first.
    async fn history(&mut self, entity_id: Uuid) -> DomainResult<Vec<FieldChange>>;
}
