//! Engine owning the probe set and driving collection cycles.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use thiserror::Error;
use tokio::task::JoinSet;

use super::cache::ResultCache;
use super::capability::CapabilityCache;
use super::executor::{QueryError, QueryExecutor};
use super::probes;
use super::sample::{MetricDescriptor, Sample, SampleSink};
use super::traits::{EngineConfig, Probe, ProbeContext, ProbeGroup};
use crate::storage::DataSource;

/// Names held by every engine built without an explicit registry.
static GLOBAL_REGISTRY: LazyLock<MetricRegistry> = LazyLock::new(MetricRegistry::new);

/// Set of metric names claimed by live engines.
///
/// A name can be held by at most one engine per registry. Names are released
/// when the owning [`Engine`] is dropped. Clones share the same set.
#[derive(Clone, Debug, Default)]
pub struct MetricRegistry {
    names: Arc<Mutex<HashSet<String>>>,
}

impl MetricRegistry {
    /// An empty registry, independent of the process-wide one.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by [`Engine::new`] and [`Engine::with_probes`].
    pub fn global() -> Self {
        GLOBAL_REGISTRY.clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains(name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and claim every descriptor of `probes`, all or nothing.
    fn register(&self, probes: &[Arc<dyn Probe>]) -> Result<Vec<Arc<MetricDescriptor>>, EngineError> {
        let mut held = self.lock();

        let mut claimed = HashSet::new();
        let mut descriptors = Vec::new();
        for probe in probes {
            for descriptor in probe.descriptors() {
                descriptor
                    .validate()
                    .map_err(|reason| EngineError::InvalidDescriptor {
                        name: descriptor.name().to_string(),
                        reason,
                    })?;
                if held.contains(descriptor.name()) || !claimed.insert(descriptor.name().to_string()) {
                    tracing::error!(probe = probe.name(), metric = descriptor.name(),
                        "Duplicate metric registration");
                    return Err(EngineError::DuplicateMetric(descriptor.name().to_string()));
                }
                descriptors.push(descriptor);
            }
        }

        held.extend(claimed);
        Ok(descriptors)
    }

    fn release(&self, descriptors: &[Arc<MetricDescriptor>]) {
        let mut held = self.lock();
        for descriptor in descriptors {
            held.remove(descriptor.name());
        }
    }
}

/// Fatal errors raised while building an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Two descriptors share a metric name.
    #[error("metric '{0}' is already registered")]
    DuplicateMetric(String),

    /// A descriptor violates the exposition grammar.
    #[error("invalid descriptor '{name}': {reason}")]
    InvalidDescriptor { name: String, reason: String },
}

/// Builds the active probe set once and collects samples from it on demand.
///
/// The result cache and capability cache are owned here and shared with
/// every probe through [`ProbeContext`].
pub struct Engine {
    probes: Vec<Arc<dyn Probe>>,
    descriptors: Vec<Arc<MetricDescriptor>>,
    ctx: ProbeContext,
    capabilities: Arc<CapabilityCache>,
    results: Arc<ResultCache>,
    registry: MetricRegistry,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("source", &self.ctx.executor().source_id())
            .field("probes", &self.probe_names())
            .field("descriptors", &self.descriptors.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build the probe set selected by `config` toggles, claiming its metric
    /// names in the process-wide registry.
    ///
    /// # Errors
    /// Returns `EngineError` if a metric name is declared twice, either within
    /// the probe set or by another live engine, or a descriptor is malformed.
    /// Both are programming errors and should abort startup.
    pub fn new(config: EngineConfig, source: Arc<dyn DataSource>) -> Result<Self, EngineError> {
        Self::new_in(config, source, MetricRegistry::global())
    }

    /// Like [`Engine::new`], claiming names in `registry` instead.
    pub fn new_in(
        config: EngineConfig,
        source: Arc<dyn DataSource>,
        registry: MetricRegistry,
    ) -> Result<Self, EngineError> {
        let probes = probes::build(&config);
        Self::with_probes_in(config, source, probes, registry)
    }

    /// Build an engine around an explicit probe set.
    ///
    /// # Errors
    /// Same as [`Engine::new`].
    pub fn with_probes(
        config: EngineConfig,
        source: Arc<dyn DataSource>,
        probes: Vec<Arc<dyn Probe>>,
    ) -> Result<Self, EngineError> {
        Self::with_probes_in(config, source, probes, MetricRegistry::global())
    }

    /// Like [`Engine::with_probes`], claiming names in `registry` instead.
    pub fn with_probes_in(
        config: EngineConfig,
        source: Arc<dyn DataSource>,
        probes: Vec<Arc<dyn Probe>>,
        registry: MetricRegistry,
    ) -> Result<Self, EngineError> {
        if config.register_middleware_metrics
            && !probes.iter().any(|p| p.group() == ProbeGroup::Middleware)
        {
            tracing::info!("Middleware metrics enabled but no middleware probes are defined");
        }

        let descriptors = registry.register(&probes)?;

        let capabilities = Arc::new(CapabilityCache::default());
        let results = Arc::new(ResultCache::new());
        let executor = QueryExecutor::new(source, config.query_timeout);
        let ctx = ProbeContext::new(
            executor,
            Arc::clone(&capabilities),
            Arc::clone(&results),
            &config,
        );

        tracing::info!(source = %ctx.executor().source_id(), probes = probes.len(),
            metrics = descriptors.len(), "Engine initialized");

        Ok(Self {
            probes,
            descriptors,
            ctx,
            capabilities,
            results,
            registry,
        })
    }

    /// Every registered descriptor, in registration order. Performs no I/O.
    pub fn describe(&self) -> &[Arc<MetricDescriptor>] {
        &self.descriptors
    }

    /// Names of the active probes.
    pub fn probe_names(&self) -> Vec<&'static str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    /// Run one cycle of every probe concurrently and gather their samples.
    ///
    /// Probe failures, including panics, are logged and contained: the
    /// affected probe contributes no samples, every other probe is unaffected.
    /// Samples from different probes arrive in no particular order.
    pub async fn collect(&self) -> Vec<Sample> {
        let mut tasks = JoinSet::new();
        for probe in &self.probes {
            let probe = Arc::clone(probe);
            let ctx = self.ctx.clone();
            tasks.spawn(async move { run_cycle(probe.as_ref(), &ctx).await });
        }

        let mut samples = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(batch) => samples.extend(batch),
                Err(e) => tracing::error!(error = %e, "Probe task aborted"),
            }
        }

        self.results.purge_expired();
        tracing::debug!(samples = samples.len(), "Collection cycle finished");
        samples
    }

    /// Check that the data source is reachable within the query timeout.
    pub async fn ping(&self) -> Result<(), QueryError> {
        let executor = self.ctx.executor();
        executor.ping(executor.deadline()).await
    }

    pub fn capabilities(&self) -> &CapabilityCache {
        &self.capabilities
    }

    pub fn results(&self) -> &ResultCache {
        &self.results
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.registry.release(&self.descriptors);
    }
}

async fn run_cycle(probe: &dyn Probe, ctx: &ProbeContext) -> Vec<Sample> {
    let name = probe.name();
    if !probe.gate(ctx).await {
        tracing::debug!(probe = name, "Probe gate closed, skipping cycle");
        return Vec::new();
    }

    let mut sink = SampleSink::new(name);
    match probe.collect(ctx, &mut sink).await {
        Ok(()) => sink.into_samples(),
        Err(e) => {
            tracing::warn!(probe = name, error = %e, "Probe cycle failed, no samples emitted");
            Vec::new()
        }
    }
}
