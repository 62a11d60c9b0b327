//! Metric name and label definitions.
//!
//! Every metric courier records is named here so the exported set is
//! documented in one place.

/// Event pipeline metrics
pub mod pipeline {
    /// Events received from the platform, by kind
    pub const EVENTS_TOTAL: &str = "courier_pipeline_events_total";
    /// Events dropped because their channel is not monitored
    pub const EVENTS_FILTERED_TOTAL: &str = "courier_pipeline_events_filtered_total";
    /// Events that could not be normalized
    pub const NORMALIZE_ERRORS_TOTAL: &str = "courier_pipeline_normalize_errors_total";
    /// Time from receipt to the end of fan-out, in seconds
    pub const PROCESS_DURATION_SECONDS: &str = "courier_pipeline_process_duration_seconds";
    /// Subscriber deliveries that returned an error or panicked
    pub const DELIVERY_FAILURES_TOTAL: &str = "courier_pipeline_delivery_failures_total";
}

/// Durable store metrics
pub mod store {
    /// Connection attempts, successful or not
    pub const CONNECT_ATTEMPTS_TOTAL: &str = "courier_store_connect_attempts_total";
    /// 1 while the store is connected, 0 otherwise
    pub const CONNECTED: &str = "courier_store_connected";
    /// Save outcomes, labelled by `outcome` (stored, fallback, dropped)
    pub const SAVES_TOTAL: &str = "courier_store_saves_total";
    /// Failed writes to the durable store
    pub const WRITE_ERRORS_TOTAL: &str = "courier_store_write_errors_total";
}

/// Broadcast hub metrics
pub mod broadcast {
    /// Connections accepted since start
    pub const CONNECTIONS_TOTAL: &str = "courier_broadcast_connections_total";
    /// Currently registered clients
    pub const CLIENTS_CONNECTED: &str = "courier_broadcast_clients_connected";
    /// Event frames written successfully
    pub const EVENTS_SENT_TOTAL: &str = "courier_broadcast_events_sent_total";
    /// Writes that failed and evicted a client
    pub const SEND_FAILURES_TOTAL: &str = "courier_broadcast_send_failures_total";
    /// Heartbeat frames written
    pub const HEARTBEATS_SENT_TOTAL: &str = "courier_broadcast_heartbeats_sent_total";
}

/// Common label keys
pub mod labels {
    pub const KIND: &str = "kind";
    pub const OUTCOME: &str = "outcome";
    pub const SUBSCRIBER: &str = "subscriber";
}

/// Histogram bucket boundaries
pub mod buckets {
    use once_cell::sync::Lazy;

    /// Event processing duration buckets (in seconds)
    /// Covers 1ms to 10s; store timeouts dominate the tail
    pub static PROCESS_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_share_the_courier_prefix() {
        let names = [
            pipeline::EVENTS_TOTAL,
            pipeline::EVENTS_FILTERED_TOTAL,
            pipeline::NORMALIZE_ERRORS_TOTAL,
            pipeline::PROCESS_DURATION_SECONDS,
            pipeline::DELIVERY_FAILURES_TOTAL,
            store::CONNECT_ATTEMPTS_TOTAL,
            store::CONNECTED,
            store::SAVES_TOTAL,
            store::WRITE_ERRORS_TOTAL,
            broadcast::CONNECTIONS_TOTAL,
            broadcast::CLIENTS_CONNECTED,
            broadcast::EVENTS_SENT_TOTAL,
            broadcast::SEND_FAILURES_TOTAL,
            broadcast::HEARTBEATS_SENT_TOTAL,
        ];
        assert!(names.iter().all(|n| n.starts_with("courier_")));
    }

    #[test]
    fn buckets_are_sorted() {
        assert!(buckets::PROCESS_DURATION.windows(2).all(|w| w[0] < w[1]));
    }
}
