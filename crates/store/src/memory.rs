//! In-memory store for testing.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;

use crate::{Error, Result, record::PersistedRecord, store::EventStore};

/// In-memory store backed by `HashMap`. No persistence, for tests only.
///
/// Availability and write failures can be toggled to drive the gateway's
/// fallback paths.
pub struct InMemoryStore {
    records: Mutex<HashMap<String, PersistedRecord>>,
    available: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Report as connected but reject every write.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, key: &str) -> Option<PersistedRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(key).cloned()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn ensure_connected(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn upsert(&self, record: &PersistedRecord) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::unavailable("writes disabled"));
        }
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.len() as u64)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<PersistedRecord>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<PersistedRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| b.event.timestamp.cmp(&a.event.timestamp));
        all.truncate(limit);
        Ok(all)
    }
}
