use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type CourierError = Error;
pub type Result<T> = std::result::Result<T, Error>;

// ── Context ─────────────────────────────────────────────────────────────────

/// Error types with a plain-message variant, so foreign errors can be
/// wrapped with a prefix by [`impl_context!`].
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Define a crate-local `Context` extension for `Result<T, E: Display>`,
/// turning the error into `"{context}: {error}"` as the crate's own `Error`.
///
/// The invoking module must have `Error: FromMessage` and `Result<T>` in
/// scope.
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            fn context(self, context: impl Into<String>) -> Result<T>;

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                self.with_context(|| context)
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.map_err(|e| {
                    <Error as $crate::FromMessage>::from_message(format!("{}: {e}", f().into()))
                })
            }
        }
    };
}
