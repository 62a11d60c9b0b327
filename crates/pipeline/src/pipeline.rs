//! The orchestrator: normalize, persist, fan out.

use std::{
    sync::{Arc, RwLock},
    time::Instant,
};

use {
    chrono::Utc,
    courier_channels::{ChannelFilter, Subscriber},
    courier_common::{ChatEvent, EventKind, preview},
    courier_store::{PersistenceGateway, SaveOutcome},
    futures::future::join_all,
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use courier_metrics::{counter, histogram, labels, pipeline as pipeline_metrics};

use crate::normalize::{RawEvent, normalize};

/// Characters of message content shown in the per-event log line.
const PREVIEW_CHARS: usize = 50;

/// What happened to one processed event.
#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub event: Arc<ChatEvent>,
    pub outcome: SaveOutcome,
    pub delivered: usize,
    pub failed: usize,
}

/// Normalizes raw events, persists them and fans them out to subscribers.
///
/// Subscribers are delivered to concurrently, one task each, so a slow,
/// failing or panicking subscriber never affects the others.
pub struct DistributionPipeline {
    filter: Arc<ChannelFilter>,
    persistence: Arc<PersistenceGateway>,
    subscribers: RwLock<Vec<Arc<dyn Subscriber>>>,
}

impl DistributionPipeline {
    pub fn new(filter: Arc<ChannelFilter>, persistence: Arc<PersistenceGateway>) -> Self {
        Self {
            filter,
            persistence,
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn filter(&self) -> &Arc<ChannelFilter> {
        &self.filter
    }

    pub fn persistence(&self) -> &Arc<PersistenceGateway> {
        &self.persistence
    }

    // ── Subscribers ────────────────────────────────────────────────────────

    /// Register a subscriber. One with the same name is replaced in place.
    pub fn add_subscriber(&self, subscriber: Arc<dyn Subscriber>) {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let name = subscriber.name().to_string();
        if let Some(slot) = subs.iter_mut().find(|s| s.name() == name) {
            warn!(subscriber = %name, "replacing subscriber with the same name");
            *slot = subscriber;
        } else {
            subs.push(subscriber);
            info!(subscriber = %name, "subscriber registered");
        }
    }

    pub fn remove_subscriber(&self, name: &str) -> bool {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let before = subs.len();
        subs.retain(|s| s.name() != name);
        let removed = subs.len() != before;
        if removed {
            info!(subscriber = %name, "subscriber removed");
        }
        removed
    }

    /// Names in registration order.
    pub fn subscriber_names(&self) -> Vec<String> {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    // ── Processing ─────────────────────────────────────────────────────────

    /// Gate on the monitored-channel set, then [`process`](Self::process).
    pub async fn ingest(&self, raw: RawEvent, kind: EventKind) -> Option<ProcessReport> {
        let channel_id = raw.channel_id?;
        if !self.filter.is_monitored(channel_id) {
            #[cfg(feature = "metrics")]
            counter!(pipeline_metrics::EVENTS_FILTERED_TOTAL).increment(1);
            return None;
        }
        self.process(raw, kind).await
    }

    /// Normalize, persist, fan out. `None` only when normalization fails.
    pub async fn process(&self, raw: RawEvent, kind: EventKind) -> Option<ProcessReport> {
        let started = Instant::now();
        #[cfg(feature = "metrics")]
        counter!(pipeline_metrics::EVENTS_TOTAL, labels::KIND => kind.as_str()).increment(1);

        let event = match normalize(raw, kind, Utc::now()) {
            Ok(event) => Arc::new(event),
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(pipeline_metrics::NORMALIZE_ERRORS_TOTAL).increment(1);
                error!(%kind, error = %e, "failed to normalize event, skipping");
                return None;
            },
        };

        let outcome = self.persistence.save(&event).await;
        let (delivered, failed) = self.fanout(&event).await;

        info!(
            kind = %event.kind,
            server = %event.origin(),
            channel = %event.channel,
            author = %event.author,
            sink = %outcome,
            delivered,
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            content = %preview(&event.content, PREVIEW_CHARS),
            "event relayed"
        );
        #[cfg(feature = "metrics")]
        histogram!(pipeline_metrics::PROCESS_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        Some(ProcessReport {
            event,
            outcome,
            delivered,
            failed,
        })
    }

    /// Deliver `event` to every subscriber, returning `(delivered, failed)`.
    pub async fn fanout(&self, event: &Arc<ChatEvent>) -> (usize, usize) {
        let subscribers: Vec<Arc<dyn Subscriber>> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if subscribers.is_empty() {
            debug!("no subscribers registered");
            return (0, 0);
        }

        let names: Vec<String> = subscribers.iter().map(|s| s.name().to_string()).collect();
        let handles = subscribers.into_iter().map(|subscriber| {
            let event = Arc::clone(event);
            tokio::spawn(async move { subscriber.deliver(&event).await })
        });
        let results = join_all(handles).await;

        let mut delivered = 0;
        let mut failed = 0;
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(Ok(())) => {
                    delivered += 1;
                    continue;
                },
                Ok(Err(e)) => {
                    warn!(subscriber = %name, error = %e, "subscriber delivery failed");
                },
                Err(e) => {
                    error!(subscriber = %name, error = %e, "subscriber task panicked");
                },
            }
            failed += 1;
            #[cfg(feature = "metrics")]
            counter!(pipeline_metrics::DELIVERY_FAILURES_TOTAL, labels::SUBSCRIBER => name.clone())
                .increment(1);
        }
        (delivered, failed)
    }
}
