#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The raw event lacks a field every normalized event must carry.
    #[error("raw event is missing {field}")]
    MissingField { field: &'static str },
}

impl Error {
    #[must_use]
    pub fn missing(field: &'static str) -> Self {
        Self::MissingField { field }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
