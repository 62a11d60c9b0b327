//! Persistence trait for normalized events.

use async_trait::async_trait;

use crate::{Result, record::PersistedRecord};

/// Durable backend behind the [`PersistenceGateway`](crate::PersistenceGateway).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Probe or (re)establish the connection. False means "use the fallback".
    async fn ensure_connected(&self) -> bool;
    /// Insert or overwrite the record stored under `record.key`.
    async fn upsert(&self, record: &PersistedRecord) -> Result<()>;
    async fn count(&self) -> Result<u64>;
    /// Most recent records first, by event timestamp.
    async fn recent(&self, limit: usize) -> Result<Vec<PersistedRecord>>;
}
