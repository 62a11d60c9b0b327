//! Metric names and the optional Prometheus exporter.
//!
//! Crates record through the re-exported `metrics` macros behind their own
//! `metrics` feature; the binary decides whether anything is exported by
//! calling [`init_metrics`].
//!
//! ```rust,ignore
//! use courier_metrics::{counter, labels, pipeline};
//!
//! counter!(pipeline::EVENTS_TOTAL, labels::KIND => "NEW").increment(1);
//! ```

mod definitions;
mod error;
mod recorder;

pub use {
    definitions::*,
    error::{Error, Result},
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, gauge, histogram};
