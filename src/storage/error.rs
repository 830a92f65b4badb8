//! Data source error types.
//!
//! [`SourceError`] covers whole-statement failures reported by the
//! connection collaborator. [`ScanError`] covers a single row that could not
//! be decoded; it never fails the statement it belongs to.

use thiserror::Error;

/// Errors raised by a [`DataSource`](super::DataSource) for a whole statement.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Connection could not be established, was lost, or the pool is exhausted.
    #[error("connection error: {0}")]
    Connection(String),

    /// The statement was rejected (syntax, privilege, missing object).
    #[error("query error: {0}")]
    Query(String),
}

impl SourceError {
    /// Whether this failure is a connectivity problem rather than a bad statement.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<sqlx::Error> for SourceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Protocol(_) => Self::Connection(err.to_string()),
            other => Self::Query(other.to_string()),
        }
    }
}

/// Errors raised while scanning one row into a typed record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScanError {
    /// The row has fewer columns than the record expects.
    #[error("missing column {index} (row has {len} columns)")]
    MissingColumn { index: usize, len: usize },

    /// A column value cannot be converted to the requested type.
    #[error("column {index}: cannot read {found} as {expected}")]
    TypeMismatch {
        index: usize,
        expected: &'static str,
        found: String,
    },

    /// The driver could not decode the row at all.
    #[error("malformed row: {0}")]
    Malformed(String),
}
