//! Error types for livesel.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for livesel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for livesel operations.
///
/// Errors fall into three families: configuration errors are returned
/// synchronously from `select()` and config validation, session errors end the
/// current change-stream session, and query errors stay local to one cache.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Invalid configuration value.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A select was registered without query text.
    #[error("Query text must not be empty")]
    EmptyQuery,

    /// A select was registered without triggers.
    #[error("At least one trigger is required")]
    EmptyTriggers,

    /// A trigger has no database and the connection has no default one.
    #[error("No database selected for trigger on table {table}")]
    NoDatabase { table: String },

    /// Unusable key strategy.
    #[error("Invalid key strategy: {message}")]
    InvalidKeyStrategy { message: String },

    /// The execution path could not be established.
    #[error("Connection failed: {message}")]
    Connect { message: String },

    /// The change stream reported an error.
    #[error("Change stream error: {message}")]
    Stream { message: String },

    /// The change stream did not become ready in time.
    #[error("Change stream was not ready after {0:?}")]
    ReadyTimeout(Duration),

    /// The session has already been ended.
    #[error("Session closed")]
    SessionClosed,

    /// A query execution failed.
    #[error("Query failed: {message}")]
    Query { message: String },

    /// JSON or TOML (de)serialization failed.
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl Error {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a missing database error.
    pub fn no_database(table: impl Into<String>) -> Self {
        Error::NoDatabase {
            table: table.into(),
        }
    }

    /// Creates an invalid key strategy error.
    pub fn invalid_key_strategy(message: impl Into<String>) -> Self {
        Error::InvalidKeyStrategy {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    pub fn connect(message: impl Into<String>) -> Self {
        Error::Connect {
            message: message.into(),
        }
    }

    /// Creates a change stream error.
    pub fn stream(message: impl Into<String>) -> Self {
        Error::Stream {
            message: message.into(),
        }
    }

    /// Creates a query execution error.
    pub fn query(message: impl Into<String>) -> Self {
        Error::Query {
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Error::Serialization {
            message: message.into(),
        }
    }

    /// Returns true for errors raised synchronously by `select()` or by
    /// configuration validation.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig { .. }
                | Error::EmptyQuery
                | Error::EmptyTriggers
                | Error::NoDatabase { .. }
                | Error::InvalidKeyStrategy { .. }
        )
    }

    /// Returns true for errors that end the change-stream session.
    pub fn is_session(&self) -> bool {
        matches!(
            self,
            Error::Connect { .. } | Error::Stream { .. } | Error::ReadyTimeout(_) | Error::SessionClosed
        )
    }

    /// Returns true for query execution errors.
    pub fn is_query(&self) -> bool {
        matches!(self, Error::Query { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::serialization(e.to_string())
    }
}
