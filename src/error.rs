//! Smartcache error types

use std::error::Error as StdError;

/// Smartcache error types
#[derive(Debug, thiserror::Error)]
pub enum SmartCacheError {
    // Validation errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Collaborator failures
    #[error("cache error: {0}")]
    Cache(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The caller-supplied fetch callback failed.
    #[error("fetch failed: {0}")]
    Fetch(#[source] Box<dyn StdError + Send + Sync>),

    #[error("operation cancelled")]
    Cancelled,

    /// An error that has already been written to the log.
    ///
    /// Produced by [`log_once()`](Self::log_once). Display is transparent so
    /// the caller sees the original message.
    #[error(transparent)]
    Logged(Box<SmartCacheError>),
}

impl SmartCacheError {
    /// Wrap any error raised by a caller's fetch callback.
    pub fn fetch(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        SmartCacheError::Fetch(err.into())
    }

    /// Whether this error has already been logged.
    pub fn is_logged(&self) -> bool {
        matches!(self, SmartCacheError::Logged(_))
    }

    /// The underlying error, with the logged marker stripped.
    pub fn root(&self) -> &SmartCacheError {
        match self {
            SmartCacheError::Logged(inner) => inner.root(),
            other => other,
        }
    }

    /// Unwrap the logged marker, returning the underlying error.
    pub fn into_root(self) -> SmartCacheError {
        match self {
            SmartCacheError::Logged(inner) => inner.into_root(),
            other => other,
        }
    }

    /// Log the error once and mark it as logged.
    ///
    /// Errors already carrying the marker pass through untouched, so an
    /// error propagating through nested operations produces a single record.
    pub fn log_once(self, operation: &'static str) -> Self {
        if self.is_logged() {
            return self;
        }
        tracing::error!(operation, error = %self, "exception occurred in {operation}");
        metrics::counter!(crate::telemetry::ERRORS_TOTAL, "operation" => operation).increment(1);
        SmartCacheError::Logged(Box::new(self))
    }
}

/// Result type alias for Smartcache operations
pub type Result<T> = std::result::Result<T, SmartCacheError>;
