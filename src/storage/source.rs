//! Connection collaborator contract.

use async_trait::async_trait;

use crate::storage::{Row, ScanError, SourceError};

/// Rows returned by one statement. A row that could not be decoded is kept
/// in place as an error so callers can skip it and keep the rest.
pub type FetchedRows = Vec<Result<Row, ScanError>>;

/// A live, shared database handle the engine runs read-only queries against.
///
/// Implementations must tolerate concurrent use from many probes. The engine
/// never opens or closes the underlying connection; it only bounds each call
/// with a deadline, so implementations should be cancel-safe.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Stable identity of this source, used to namespace cached state.
    fn id(&self) -> &str;

    /// Lightweight connectivity check.
    async fn ping(&self) -> Result<(), SourceError>;

    /// Run one statement and return all of its rows.
    async fn fetch(&self, sql: &str) -> Result<FetchedRows, SourceError>;
}
