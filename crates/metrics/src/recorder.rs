//! Metrics recorder initialization and configuration.

use std::net::SocketAddr;

use tracing::info;

use crate::Result;

/// Handle to the installed metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsHandle {
    listen: Option<SocketAddr>,
}

impl MetricsHandle {
    /// Address the exporter is serving on, if one was started.
    #[must_use]
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listen
    }
}

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Where to serve `/metrics`. `None` leaves the no-op recorder in place.
    pub listen: Option<SocketAddr>,
    /// Global labels to add to all metrics
    pub global_labels: Vec<(String, String)>,
}

/// Initialize the metrics system.
///
/// Call once at startup, from within a Tokio runtime. Without a listen
/// address, or without the `prometheus` feature, every facade call is a no-op.
///
/// # Errors
///
/// Returns an error if the exporter cannot be built or installed.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    let Some(addr) = config.listen else {
        info!("metrics export disabled");
        return Ok(MetricsHandle::default());
    };

    #[cfg(feature = "prometheus")]
    {
        init_prometheus(addr, config.global_labels)?;
        info!(%addr, "prometheus metrics exporter listening");
        Ok(MetricsHandle { listen: Some(addr) })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        tracing::warn!(%addr, "metrics listen address set but the prometheus feature is not enabled");
        Ok(MetricsHandle::default())
    }
}

#[cfg(feature = "prometheus")]
fn init_prometheus(addr: SocketAddr, global_labels: Vec<(String, String)>) -> Result<()> {
    use {
        crate::{buckets, pipeline},
        metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    };

    let mut builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(pipeline::PROCESS_DURATION_SECONDS.to_string()),
            &buckets::PROCESS_DURATION,
        )?;

    for (key, value) in global_labels {
        builder = builder.add_global_label(key, value);
    }

    // Spawns the HTTP listener on the current runtime.
    builder.install()?;
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_listen_address_is_a_noop() {
        let handle = init_metrics(MetricsRecorderConfig::default()).unwrap();
        assert!(handle.listen_addr().is_none());
    }
}
