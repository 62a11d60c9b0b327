//! Broadcast server for normalized chat events.
//!
//! [`BroadcastHub`] accepts TCP clients, keeps each alive with heartbeats
//! and writes every event it is handed to all of them. The [`wire`] module
//! defines the text protocol; [`client::listen`] is the receiving end.

pub mod client;
pub mod error;
pub mod hub;
pub mod registry;
pub mod wire;

pub use {
    error::{Error, Result},
    hub::{BroadcastHub, BroadcastReport, HUB_SUBSCRIBER_NAME, HubConfig, HubState},
    registry::{ClientConnection, ClientId, ClientRegistry},
    wire::{Frame, FrameCodec, HEARTBEAT, encode_event},
};
