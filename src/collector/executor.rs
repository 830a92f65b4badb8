//! Deadline-bound query execution.
//!
//! Every statement runs under a caller-supplied deadline. Failures are
//! classified ([`QueryError::Timeout`] vs connection vs statement failure)
//! and logged with the offending SQL. Rows that fail to scan are logged and
//! skipped; the remaining rows are still returned.
//!
//! The executor never retries. Fallback chains belong to the probe.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::storage::{DataSource, Row, ScanError, SourceError};

/// Classified failure of one statement.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The deadline elapsed before the statement completed.
    #[error("query timed out")]
    Timeout { sql: String },

    /// The data source could not be reached.
    #[error("connection failed: {source}")]
    Connection { sql: String, source: SourceError },

    /// The statement itself failed (syntax, privilege, missing object).
    #[error("query failed: {source}")]
    Failed { sql: String, source: SourceError },
}

impl QueryError {
    fn from_source(sql: &str, err: SourceError) -> Self {
        let sql = sql.to_string();
        if err.is_connection() {
            Self::Connection { sql, source: err }
        } else {
            Self::Failed { sql, source: err }
        }
    }

    /// Short cause label used in logs: `timeout`, `connection` or `query`.
    pub fn cause(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Connection { .. } => "connection",
            Self::Failed { .. } => "query",
        }
    }

    /// The statement that failed.
    pub fn sql(&self) -> &str {
        match self {
            Self::Timeout { sql } | Self::Connection { sql, .. } | Self::Failed { sql, .. } => sql,
        }
    }

    /// Whether the deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result of one statement: scanned records in query order, or a classified failure.
pub type QueryOutcome<T> = Result<Vec<T>, QueryError>;

/// Typed record scanned from a [`Row`].
pub trait FromRow: Sized {
    /// Scan one row. An error skips the row, not the statement.
    fn from_row(row: &Row) -> Result<Self, ScanError>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self, ScanError> {
        Ok(row.clone())
    }
}

/// Runs statements against the shared data source under a deadline.
#[derive(Clone)]
pub struct QueryExecutor {
    source: Arc<dyn DataSource>,
    timeout: Duration,
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("source", &self.source.id())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl QueryExecutor {
    /// Create an executor whose default deadline is `timeout` from now.
    pub fn new(source: Arc<dyn DataSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Identity of the underlying data source.
    pub fn source_id(&self) -> &str {
        self.source.id()
    }

    /// Configured per-query timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// A fresh deadline `timeout` from now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.timeout
    }

    /// Run `sql` and scan each row with `scan`, skipping rows that fail.
    pub async fn execute<T, F>(&self, deadline: Instant, sql: &str, scan: F) -> QueryOutcome<T>
    where
        F: Fn(&Row) -> Result<T, ScanError>,
    {
        let fetched = match tokio::time::timeout_at(deadline, self.source.fetch(sql)).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => return Err(self.report(QueryError::from_source(sql, e))),
            Err(_) => {
                return Err(self.report(QueryError::Timeout {
                    sql: sql.to_string(),
                }));
            }
        };

        let total = fetched.len();
        let records: Vec<T> = fetched
            .into_iter()
            .enumerate()
            .filter_map(|(index, row)| match row.and_then(|r| scan(&r)) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(source = %self.source.id(), sql, row = index, error = %e,
                        "Skipping row that failed to scan");
                    None
                }
            })
            .collect();

        tracing::trace!(source = %self.source.id(), rows = records.len(), total, "Query completed");
        Ok(records)
    }

    /// Run `sql` and scan rows into `T`.
    pub async fn execute_as<T: FromRow>(&self, deadline: Instant, sql: &str) -> QueryOutcome<T> {
        self.execute(deadline, sql, T::from_row).await
    }

    /// First successfully scanned row, if any.
    pub async fn fetch_first<T: FromRow>(
        &self,
        deadline: Instant,
        sql: &str,
    ) -> Result<Option<T>, QueryError> {
        Ok(self.execute_as::<T>(deadline, sql).await?.into_iter().next())
    }

    /// First column of the first row as a nullable integer.
    pub async fn fetch_int(&self, deadline: Instant, sql: &str) -> Result<Option<i64>, QueryError> {
        let values = self.execute(deadline, sql, |row| row.int(0)).await?;
        Ok(values.into_iter().next().flatten())
    }

    /// First column of the first row as nullable text.
    pub async fn fetch_text(
        &self,
        deadline: Instant,
        sql: &str,
    ) -> Result<Option<String>, QueryError> {
        let values = self.execute(deadline, sql, |row| row.text(0)).await?;
        Ok(values.into_iter().next().flatten())
    }

    /// Connectivity check bounded by `deadline`.
    pub async fn ping(&self, deadline: Instant) -> Result<(), QueryError> {
        const PING: &str = "<ping>";
        match tokio::time::timeout_at(deadline, self.source.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(self.report(QueryError::from_source(PING, e))),
            Err(_) => Err(self.report(QueryError::Timeout {
                sql: PING.to_string(),
            })),
        }
    }

    fn report(&self, err: QueryError) -> QueryError {
        let source = self.source.id();
        if err.is_timeout() {
            tracing::warn!(source, sql = err.sql(), cause = err.cause(),
                timeout_ms = self.timeout.as_millis(), "Query timed out");
        } else {
            tracing::error!(source, sql = err.sql(), cause = err.cause(), error = %err,
                "Query failed");
        }
        err
    }
}
