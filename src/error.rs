//! Error types for the YugabyteDB receiver
//!
//! Every variant maps to one failure class of a scrape cycle. None of them is
//! fatal to the receiver: they are logged and the affected unit of work (the
//! whole cycle, one metric, one row, or one batch) is dropped.

use thiserror::Error;

use crate::queries::ActivityQuery;

/// Result type for receiver operations
pub type Result<T> = std::result::Result<T, ReceiverError>;

/// Errors that can occur while scraping YugabyteDB
#[derive(Error, Debug)]
pub enum ReceiverError {
    /// Could not establish the per-cycle database connection
    #[error("Connect error: {0}")]
    Connect(#[source] sqlx::Error),

    /// A query was rejected or its result stream failed mid-iteration
    #[error("Query error ({query}): {message}")]
    Query {
        query: ActivityQuery,
        message: String,
    },

    /// A single result row could not be decoded
    #[error("Row decode error ({query}): {reason}")]
    RowDecode {
        query: ActivityQuery,
        reason: String,
    },

    /// The downstream consumer rejected a metrics batch
    #[error("Consume error: {0}")]
    Consume(String),

    /// Invalid receiver configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Configuration sources could not be read or deserialized
    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),
}

impl ReceiverError {
    /// Create a query error from any displayable cause
    pub fn query<E: std::fmt::Display>(query: ActivityQuery, error: E) -> Self {
        Self::Query {
            query,
            message: error.to_string(),
        }
    }

    /// Create a row decode error from any displayable cause
    pub fn row_decode<E: std::fmt::Display>(query: ActivityQuery, error: E) -> Self {
        Self::RowDecode {
            query,
            reason: error.to_string(),
        }
    }

    /// Create a consume error
    pub fn consume<S: Into<String>>(message: S) -> Self {
        Self::Consume(message.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Stable label used as the `error_kind` logging field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect_error",
            Self::Query { .. } => "query_error",
            Self::RowDecode { .. } => "row_decode_error",
            Self::Consume(_) => "consume_error",
            Self::Configuration { .. } | Self::ConfigSource(_) => "configuration_error",
        }
    }

    /// Whether this error only invalidates a single row
    pub fn is_row_scoped(&self) -> bool {
        matches!(self, Self::RowDecode { .. })
    }
}
