use std::time::Duration;

use courier_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    /// No live connection to hand out.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    #[error("store operation timed out after {}ms", timeout.as_millis())]
    Timeout { timeout: Duration },

    #[error("invalid store configuration: {message}")]
    InvalidConfig { message: String },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Event(#[from] courier_common::Error),
}

impl Error {
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

courier_common::impl_context!();
