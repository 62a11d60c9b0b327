use std::path::PathBuf;

/// Crate-wide result type for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("unsupported config format: .{ext}")]
    UnsupportedFormat { ext: String },

    /// An environment override could not be parsed.
    #[error("invalid value for {name}: {value:?} ({reason})")]
    InvalidEnv {
        name: String,
        value: String,
        reason: String,
    },

    #[error("{name} is required")]
    Missing { name: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl Error {
    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_env(
        name: impl Into<String>,
        value: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidEnv {
            name: name.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn missing(name: impl Into<String>) -> Self {
        Self::Missing { name: name.into() }
    }

    #[must_use]
    pub fn invalid(message: impl std::fmt::Display) -> Self {
        Self::Invalid {
            message: message.to_string(),
        }
    }
}
