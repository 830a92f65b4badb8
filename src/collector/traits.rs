//! Core probe traits and types.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;
use tokio::time::Instant;

use super::cache::ResultCache;
use super::capability::CapabilityCache;
use super::executor::{QueryError, QueryExecutor};
use super::sample::{MetricDescriptor, SampleSink};
use crate::storage::{Row, ScanError};

/// Default per-query deadline (30 seconds).
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default result cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

fn default_query_timeout() -> Duration {
    DEFAULT_QUERY_TIMEOUT
}

fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

fn default_true() -> bool {
    true
}

fn default_data_source() -> String {
    "primary".to_string()
}

/// Settings consumed by the engine. Immutable for the life of an [`Engine`](super::Engine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Identity of the monitored data source.
    #[serde(default = "default_data_source")]
    pub data_source: String,

    /// Value of the `host_name` label. Falls back to `$HOSTNAME`.
    #[serde(default)]
    pub host_name: Option<String>,

    /// Deadline applied to every query (default: 30s).
    #[serde(default = "default_query_timeout", with = "humantime_serde")]
    pub query_timeout: Duration,

    /// Lifetime of cached expensive results (default: 5m).
    #[serde(default = "default_cache_ttl", with = "humantime_serde")]
    pub cache_ttl: Duration,

    #[serde(default = "default_true")]
    pub register_host_metrics: bool,

    #[serde(default = "default_true")]
    pub register_database_metrics: bool,

    #[serde(default)]
    pub register_middleware_metrics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_source: default_data_source(),
            host_name: None,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
            register_host_metrics: true,
            register_database_metrics: true,
            register_middleware_metrics: false,
        }
    }
}

impl EngineConfig {
    /// Whether probes of `group` should be built.
    pub fn enables(&self, group: ProbeGroup) -> bool {
        match group {
            ProbeGroup::Host => self.register_host_metrics,
            ProbeGroup::Database => self.register_database_metrics,
            ProbeGroup::Middleware => self.register_middleware_metrics,
        }
    }

    /// Resolved `host_name` label value.
    pub fn resolved_host_name(&self) -> String {
        self.host_name
            .clone()
            .filter(|h| !h.trim().is_empty())
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Probe groups selected by configuration toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ProbeGroup {
    Host,
    Database,
    Middleware,
}

/// Errors that end one probe cycle. Always contained by the engine.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// A statement failed or timed out.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A statement that must return a row returned none.
    #[error("no rows returned by: {sql}")]
    NoRows { sql: String },
}

/// Shared state handed to every probe cycle.
///
/// Cheap to clone; the caches are shared by reference.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    executor: QueryExecutor,
    capabilities: Arc<CapabilityCache>,
    results: Arc<ResultCache>,
    cache_ttl: Duration,
    host_name: Arc<str>,
}

impl ProbeContext {
    pub fn new(
        executor: QueryExecutor,
        capabilities: Arc<CapabilityCache>,
        results: Arc<ResultCache>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            executor,
            capabilities,
            results,
            cache_ttl: config.cache_ttl,
            host_name: config.resolved_host_name().into(),
        }
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// A fresh query deadline.
    pub fn deadline(&self) -> Instant {
        self.executor.deadline()
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn capabilities(&self) -> &CapabilityCache {
        &self.capabilities
    }

    pub fn results(&self) -> &ResultCache {
        &self.results
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Result cache key for `metric` on this context's data source.
    pub fn cache_key(&self, metric: &str) -> String {
        ResultCache::key(self.executor.source_id(), metric)
    }

    /// Memoized existence check: `feature` is present when the first column
    /// of `sql` equals `expected`.
    pub async fn capability(&self, feature: &str, sql: &str, expected: i64) -> bool {
        let executor = &self.executor;
        self.capabilities
            .probe(executor.source_id(), feature, || async move {
                let count = executor.fetch_int(executor.deadline(), sql).await?;
                Ok::<_, QueryError>(count == Some(expected))
            })
            .await
    }

    /// Rows for `metric`, served from the result cache while fresh.
    ///
    /// On a miss the statement runs under a fresh deadline and the scanned
    /// rows are cached for the configured TTL.
    pub async fn cached_query<T, F>(&self, metric: &str, sql: &str, scan: F) -> Result<Vec<T>, QueryError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(&Row) -> Result<T, ScanError>,
    {
        let key = self.cache_key(metric);
        if let Some(rows) = self.results.get_json::<Vec<T>>(&key) {
            tracing::debug!(key = %key, rows = rows.len(), "Serving rows from result cache");
            return Ok(rows);
        }

        let rows = self.executor.execute(self.deadline(), sql, scan).await?;
        self.results.set_json(&key, &rows, self.cache_ttl);
        Ok(rows)
    }
}

/// A self-contained metric-producing unit.
///
/// Each scrape the engine calls [`gate`](Probe::gate) and, if it passes,
/// [`collect`](Probe::collect). A probe that returns an error emits nothing
/// for that cycle; its siblings are unaffected.
///
/// # Error Handling
///
/// - A closed gate (feature absent, archiving disabled) is a normal outcome:
///   return `false` from `gate` and log at most informationally.
/// - A failed query that the probe cannot fall back from is returned as
///   [`ProbeError`] and logged by the engine.
/// - Probes that must report something even on failure (e.g. a health
///   value of 0) handle the error themselves and return `Ok(())`.
#[async_trait::async_trait]
pub trait Probe: Send + Sync + 'static {
    /// Unique probe name, used in logs.
    fn name(&self) -> &'static str;

    /// Configuration group this probe belongs to.
    fn group(&self) -> ProbeGroup;

    /// Every descriptor this probe may emit samples for.
    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>>;

    /// Whether this cycle should run at all.
    async fn gate(&self, _ctx: &ProbeContext) -> bool {
        true
    }

    /// Run one cycle, appending samples to `sink`.
    async fn collect(&self, ctx: &ProbeContext, sink: &mut SampleSink) -> Result<(), ProbeError>;
}
