//! Error types for batchrun.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The run's cancellation token fired. Not an item failure.
    #[error("cancelled")]
    Cancelled,

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single operation attempt.
///
/// The engine only reads `message` for reporting; `cause` is carried through
/// to [`ItemFailure`](crate::model::ItemFailure) untouched for diagnostics.
#[derive(Clone)]
pub struct OperationError {
    message: String,
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl OperationError {
    /// Wrap a typed error, keeping it as the cause.
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: err.to_string(),
            cause: Some(Arc::new(err)),
        }
    }

    /// An error that is only a message (no underlying cause).
    pub fn msg(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
            cause: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl fmt::Debug for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationError")
            .field("message", &self.message)
            .field("cause", &self.cause)
            .finish()
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<String> for OperationError {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<&str> for OperationError {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

impl From<std::io::Error> for OperationError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err)
    }
}

impl From<Error> for OperationError {
    fn from(err: Error) -> Self {
        Self::new(err)
    }
}

impl From<anyhow::Error> for OperationError {
    fn from(err: anyhow::Error) -> Self {
        let message = err.to_string();
        let boxed: Box<dyn std::error::Error + Send + Sync + 'static> = err.into();
        Self {
            message,
            cause: Some(Arc::from(boxed)),
        }
    }
}
