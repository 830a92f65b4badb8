//! Storage Layer
//!
//! The connection collaborator the engine queries through. The engine only
//! ever reads: it runs one statement at a time against a shared, pooled
//! handle and receives rows of nullable scalars.
//!
//! # Components
//!
//! - [`DataSource`]: Trait every connection handle implements
//! - [`Row`] / [`Scalar`]: Nullable column values with typed accessors
//! - [`SourceError`] / [`ScanError`]: Whole-statement and per-row failures
//! - [`db::SqlxSource`]: `sqlx` pool over the `Any` driver

pub mod db;
mod error;
mod source;
mod types;

pub use db::{PoolOptions, SqlxSource};
pub use error::{ScanError, SourceError};
pub use source::{DataSource, FetchedRows};
pub use types::{Row, Scalar};
