/// Crate-wide result type for the Discord integration.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A command argument that is not a channel id or mention.
    #[error("invalid channel id: {arg:?}")]
    InvalidChannel { arg: String },

    #[error(transparent)]
    Serenity(#[from] serenity::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_channel(arg: impl Into<String>) -> Self {
        Self::InvalidChannel { arg: arg.into() }
    }
}
