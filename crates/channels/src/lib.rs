//! Channel gating and the subscriber seam.
//!
//! [`ChannelFilter`] decides which platform channels are relayed at all;
//! [`Subscriber`] is what every fan-out destination implements.

pub mod error;
pub mod filter;
pub mod subscriber;

pub use {
    error::{Error, Result},
    filter::ChannelFilter,
    subscriber::Subscriber,
};
