//! Collector Layer
//!
//! Adaptive metrics collection engine. Probes share one data source, a
//! capability cache and a result cache; each scrape runs every probe
//! concurrently and gathers their samples.
//!
//! # Architecture
//!
//! - [`Engine`]: Builds the probe set and drives collection cycles
//! - [`Probe`]: Core trait for implementing metric probes
//! - [`QueryExecutor`]: Deadline-bound statement execution
//! - [`CapabilityCache`]: Memoized optional-feature detection
//! - [`ResultCache`]: TTL cache for expensive result sets
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dmprobe::{Engine, EngineConfig, PoolOptions, SqlxSource};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source = SqlxSource::connect("primary", "postgres://localhost/db", &PoolOptions::default()).await?;
//! let engine = Engine::new(EngineConfig::default(), Arc::new(source))?;
//! for sample in engine.collect().await {
//!     println!("{} {:?} {}", sample.name(), sample.labels, sample.value);
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod capability;
pub mod coerce;
mod executor;
pub mod probes;
mod registry;
mod sample;
mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::ResultCache;
pub use capability::{CapabilityCache, CapabilityKey, DEFAULT_DETECT_TIMEOUT};
pub use executor::{FromRow, QueryError, QueryExecutor, QueryOutcome};
pub use registry::{Engine, EngineError, MetricRegistry};
pub use sample::{MetricDescriptor, Sample, SampleSink, ValueKind, dedup_rows};
pub use traits::{
    DEFAULT_CACHE_TTL, DEFAULT_QUERY_TIMEOUT, EngineConfig, Probe, ProbeContext, ProbeError,
    ProbeGroup,
};
