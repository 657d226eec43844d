//! Error types for Evolve core.

use std::{error::Error, fmt, io};

/// Error type for Evolve core operations.
#[derive(Debug)]
pub enum EvolveError {
    /// An underlying I/O error.
    Io(io::Error),
    /// JSON encoding or decoding failed.
    Json(serde_json::Error),
    /// A remote text-generation provider failed or answered with junk.
    Provider(String),
    /// A catch-all error with a message.
    Other(String),
}

impl fmt::Display for EvolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::Provider(message) => write!(f, "provider error: {message}"),
            Self::Other(message) => write!(f, "{message}"),
        }
    }
}

impl Error for EvolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Provider(_) | Self::Other(_) => None,
        }
    }
}

impl From<io::Error> for EvolveError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for EvolveError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Convenience result type for Evolve core.
pub type Result<T> = std::result::Result<T, EvolveError>;
