//! Database-backed [`DataSource`](crate::storage::DataSource) implementations.
//!
//! The abstraction is intentionally minimal:
//! - `SqlxSource`: Pooled connection over any driver compiled into `sqlx`
//!
//! # Example
//!
//! ```ignore
//! let source = SqlxSource::connect("primary", "sqlite::memory:", &PoolOptions::default()).await?;
//! let rows = source.fetch("SELECT 1").await?;
//! ```

mod any;

pub use any::{PoolOptions, SqlxSource};
