use std::sync::Arc;

use {
    chrono::Utc,
    courier_common::ChatEvent,
    tracing::{debug, error, warn},
};

#[cfg(feature = "metrics")]
use courier_metrics::{counter, labels, store as store_metrics};

use crate::{FileSink, PersistedRecord, store::EventStore};

/// Where a saved event ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Stored,
    Fallback,
    /// Neither the store nor the fallback file took it.
    Dropped,
}

impl SaveOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Fallback => "fallback",
            Self::Dropped => "dropped",
        }
    }
}

impl std::fmt::Display for SaveOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chooses between the durable store and the fallback file for each event.
pub struct PersistenceGateway {
    /// `None` when the store is disabled by configuration.
    store: Option<Arc<dyn EventStore>>,
    fallback: FileSink,
}

impl PersistenceGateway {
    pub fn new(store: Option<Arc<dyn EventStore>>, fallback: FileSink) -> Self {
        Self { store, fallback }
    }

    pub fn fallback_only(fallback: FileSink) -> Self {
        Self::new(None, fallback)
    }

    pub fn fallback(&self) -> &FileSink {
        &self.fallback
    }

    pub async fn is_available(&self) -> bool {
        match &self.store {
            Some(store) => store.ensure_connected().await,
            None => false,
        }
    }

    /// Persist `event`. Never fails; the outcome says which sink took it.
    pub async fn save(&self, event: &ChatEvent) -> SaveOutcome {
        let outcome = self.save_inner(event).await;
        #[cfg(feature = "metrics")]
        counter!(store_metrics::SAVES_TOTAL, labels::OUTCOME => outcome.as_str()).increment(1);
        outcome
    }

    async fn save_inner(&self, event: &ChatEvent) -> SaveOutcome {
        let Some(store) = &self.store else {
            return self.fall_back(event).await;
        };
        if !store.ensure_connected().await {
            debug!(channel_id = event.channel_id, "store unavailable, writing to fallback file");
            return self.fall_back(event).await;
        }

        let record = PersistedRecord::new(event.clone(), Utc::now());
        match store.upsert(&record).await {
            Ok(()) => {
                debug!(key = %record.key, "event stored");
                SaveOutcome::Stored
            },
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(store_metrics::WRITE_ERRORS_TOTAL).increment(1);
                warn!(key = %record.key, error = %e, "store write failed, writing to fallback file");
                self.fall_back(event).await
            },
        }
    }

    async fn fall_back(&self, event: &ChatEvent) -> SaveOutcome {
        match self.fallback.append(event).await {
            Ok(()) => SaveOutcome::Fallback,
            Err(e) => {
                error!(
                    path = %self.fallback.path().display(),
                    key = %event.record_key(),
                    error = %e,
                    "fallback write failed, event dropped"
                );
                SaveOutcome::Dropped
            },
        }
    }
}
