//! Discord ingestion for the relay.
//!
//! [`RelayHandler`] turns serenity gateway events into pipeline calls and
//! answers the monitoring commands; [`run`] drives the client until
//! cancelled.

pub mod bot;
pub mod cache;
pub mod commands;
pub mod convert;
pub mod error;
pub mod handler;

pub use {
    bot::run,
    cache::MessageCache,
    commands::Command,
    error::{Error, Result},
    handler::RelayHandler,
};
