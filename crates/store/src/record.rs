use {
    chrono::{DateTime, Utc},
    courier_common::ChatEvent,
    serde::Serialize,
};

/// A [`ChatEvent`] as written to the durable store.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRecord {
    /// `{channel_id}_{timestamp}_{author_id}`; the upsert key.
    pub key: String,
    pub event: ChatEvent,
    pub created_at: DateTime<Utc>,
}

impl PersistedRecord {
    pub fn new(event: ChatEvent, created_at: DateTime<Utc>) -> Self {
        Self {
            key: event.record_key(),
            event,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connected,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unconnected => "unconnected",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

/// Point-in-time view of the store supervisor's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub enabled: bool,
    pub connected: bool,
    pub connection_attempts: u64,
    pub messages_saved: u64,
    pub last_error: Option<String>,
    pub database: String,
    pub table: String,
}
