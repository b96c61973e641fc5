//! Error types for bloomgate.

use thiserror::Error;

/// The result type used throughout bloomgate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for gated store operations.
///
/// Every variant produced by an accessor carries the accessor's name so that
/// hosts running several named accessors can tell them apart.
#[derive(Debug, Error)]
pub enum Error {
    /// The logical key was empty.
    #[error("{accessor} cache: key is empty")]
    KeyEmpty {
        /// Name of the accessor that rejected the call.
        accessor: String,
    },

    /// The value to write was absent, or the store returned an empty value.
    #[error("{accessor} cache: value is empty")]
    ValueEmpty {
        /// Name of the accessor.
        accessor: String,
    },

    /// The accessor has no client yet.
    #[error("{accessor} cache: client not initialized")]
    ClientNotInitialized {
        /// Name of the accessor.
        accessor: String,
    },

    /// The membership filter reported the key as definitely absent.
    /// No store call was made.
    #[error("{accessor} cache: key {key:?} filtered")]
    FilteredMiss {
        /// Name of the accessor.
        accessor: String,
        /// The composite key that was tested.
        key: String,
    },

    /// The store confirmed the key does not exist.
    #[error("{accessor} cache: key {key:?} not found")]
    KeyNotFound {
        /// Name of the accessor.
        accessor: String,
        /// The composite key sent to the store.
        key: String,
    },

    /// The underlying key-value client failed.
    #[error("{accessor} cache: store error: {source}")]
    Store {
        /// Name of the accessor.
        accessor: String,
        /// The client error.
        #[source]
        source: StoreError,
    },

    /// A value could not be encoded or decoded.
    #[error("{accessor} cache: serialization error: {source}")]
    Serialization {
        /// Name of the accessor.
        accessor: String,
        /// The serde_json error.
        #[source]
        source: serde_json::Error,
    },

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be loaded or resolved.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// True when the filter alone decided the key is absent.
    pub fn is_filtered_miss(&self) -> bool {
        matches!(self, Error::FilteredMiss { .. })
    }

    /// True when the store decided the key is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound { .. })
    }

    /// True when the error came from the key-value client.
    pub fn is_store(&self) -> bool {
        matches!(self, Error::Store { .. })
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// An error reported by a key-value client.
///
/// The original error is kept as the source so callers can downcast to the
/// concrete client error type.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StoreError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl StoreError {
    /// Creates a store error with only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps a concrete client error.
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::new(err)
    }
}
