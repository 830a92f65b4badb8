//! dmprobe - DM Database Metrics Exporter
//!
//! This crate provides an adaptive metrics-collection engine for DM8
//! databases. It can be embedded as a library by other Rust projects, or run
//! as a standalone Prometheus exporter with the `dmprobe` executable.
//!
//! # Architecture
//!
//! - **Collector**: Probes, capability detection, result caching and the engine
//! - **Storage**: The pooled data source every probe queries through
//! - **Exposition**: Prometheus text rendering of one collection cycle
//! - **Server**: `/metrics`, `/healthz` and `/readyz` endpoints
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dmprobe::{AppConfig, Engine, SqlxSource, render};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load("configs/config.yaml")?;
//!     let source = SqlxSource::connect(
//!         config.engine.data_source.clone(),
//!         &config.database.dsn,
//!         &config.database.pool_options(),
//!     )
//!     .await?;
//!     let engine = Engine::new(config.engine, Arc::new(source))?;
//!     println!("{}", render(&engine.collect().await)?);
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod exposition;
pub mod server;
pub mod storage;

pub use collector::{
    Engine, EngineConfig, EngineError, MetricDescriptor, MetricRegistry, Probe, ProbeContext,
    ProbeError, ProbeGroup, Sample, SampleSink, ValueKind,
};
pub use config::{AppConfig, ConfigError};
pub use exposition::{ExpositionError, render};
pub use storage::{DataSource, FetchedRows, PoolOptions, Row, Scalar, ScanError, SourceError, SqlxSource};
