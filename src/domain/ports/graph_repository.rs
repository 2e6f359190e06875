//! Transaction factory port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::ports::GraphStore;

/// Opens and finishes graph transactions.
///
/// Engine operations run against the [`GraphStore`] returned by `begin`;
/// the caller decides whether the whole unit commits or rolls back.
#[async_trait]
pub trait GraphRepository: Send + Sync {
    type Tx: GraphStore;

    async fn begin(&self) -> DomainResult<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> DomainResult<()>;

    async fn rollback(&self, tx: Self::Tx) -> DomainResult<()>;
}
