use thiserror::Error;

/// Error type shared by all fallible operations in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A configuration value is out of range, inconsistent, or missing.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A serialized table could not be parsed.
    #[error("unable to parse the serialized table: {0}")]
    Parse(String),
}

impl Error {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }
}

/// Alias for `std::result::Result` with this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
