//! Normalization, persistence and fan-out of platform events.

pub mod error;
pub mod normalize;
pub mod pipeline;

pub use {
    error::{Error, Result},
    normalize::{RawEvent, normalize},
    pipeline::{DistributionPipeline, ProcessReport},
};
