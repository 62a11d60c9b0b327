//! Durable event storage with a local-file fallback.
//!
//! [`StoreSupervisor`] owns the sqlx pool and reconnects on demand;
//! [`PersistenceGateway`] decides per event whether it lands in the store or
//! in the append-only [`FileSink`].

pub mod error;
pub mod file_sink;
pub mod gateway;
pub mod memory;
pub mod record;
pub mod store;
pub mod supervisor;

pub use {
    error::{Error, Result},
    file_sink::FileSink,
    gateway::{PersistenceGateway, SaveOutcome},
    memory::InMemoryStore,
    record::{ConnectionState, PersistedRecord, StoreStats},
    store::EventStore,
    supervisor::StoreSupervisor,
};
