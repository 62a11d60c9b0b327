use std::time::Duration;

use crate::registry::ClientId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid hub configuration: {message}")]
    InvalidConfig { message: String },

    #[error("broadcast hub is not running")]
    NotRunning,

    #[error("send to client {client} failed: {source}")]
    Send {
        client: ClientId,
        #[source]
        source: std::io::Error,
    },

    #[error("send to client {client} timed out after {}ms", timeout.as_millis())]
    SendTimeout { client: ClientId, timeout: Duration },

    #[error("client {client} is closed")]
    ClientClosed { client: ClientId },

    #[error("malformed event frame: {message}")]
    Decode { message: String },

    #[error("unexpected line on the wire: {line:?}")]
    UnexpectedLine { line: String },

    #[error("frame exceeds {max} bytes")]
    FrameTooLarge { max: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Event(#[from] courier_common::Error),
}

impl Error {
    #[must_use]
    pub fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }

    #[must_use]
    pub fn invalid_config(message: impl std::fmt::Display) -> Self {
        Self::InvalidConfig {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn decode(message: impl std::fmt::Display) -> Self {
        Self::Decode {
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
