//! Engine Integration Tests
//!
//! End-to-end collection cycles against a scripted data source and a real
//! SQLite pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dmprobe::collector::probes::{DM_MONITOR, TableProbe, TablespaceProbe, VersionProbe, sql};
use dmprobe::{
    DataSource, Engine, EngineConfig, FetchedRows, MetricRegistry, PoolOptions, Probe, Row,
    SourceError, SqlxSource, render, row,
};
use tokio::time::Instant;

// =============================================================================
// Test Helpers
// =============================================================================

/// Answers statements whose text contains a registered pattern.
struct FakeDm {
    scripts: Vec<(&'static str, Result<FetchedRows, SourceError>, Duration)>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl FakeDm {
    fn new() -> Self {
        Self {
            scripts: Vec::new(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn rows(mut self, pattern: &'static str, rows: Vec<Row>) -> Self {
        self.scripts.push((pattern, Ok(rows.into_iter().map(Ok).collect()), Duration::ZERO));
        self
    }

    fn slow_rows(mut self, pattern: &'static str, rows: Vec<Row>, delay: Duration) -> Self {
        self.scripts.push((pattern, Ok(rows.into_iter().map(Ok).collect()), delay));
        self
    }

    fn error(mut self, pattern: &'static str, err: SourceError) -> Self {
        self.scripts.push((pattern, Err(err), Duration::ZERO));
        self
    }

    fn calls(&self, pattern: &str) -> usize {
        self.calls.lock().unwrap().get(pattern).copied().unwrap_or(0)
    }
}

#[async_trait]
impl DataSource for FakeDm {
    fn id(&self) -> &str {
        "fake-dm"
    }

    async fn ping(&self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn fetch(&self, sql: &str) -> Result<FetchedRows, SourceError> {
        let Some((pattern, result, delay)) = self.scripts.iter().find(|(p, _, _)| sql.contains(p))
        else {
            return Err(SourceError::Query(format!("invalid table or view name: {sql}")));
        };
        *self.calls.lock().unwrap().entry(*pattern).or_default() += 1;
        if !delay.is_zero() {
            tokio::time::sleep(*delay).await;
        }
        result.clone()
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        host_name: Some("db-01".to_string()),
        ..EngineConfig::default()
    }
}

fn engine(source: &Arc<FakeDm>, config: EngineConfig, probes: Vec<Arc<dyn Probe>>) -> Engine {
    let source: Arc<dyn DataSource> = source.clone();
    Engine::with_probes_in(config, source, probes, MetricRegistry::new())
        .expect("Failed to build engine")
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_tablespace_rows_served_from_cache_within_ttl() {
    let source = Arc::new(FakeDm::new().rows(
        "V$TABLESPACE",
        vec![row!["SYSTEM", 1024.0, 512.0], row!["MAIN", 4096.0, 100.0]],
    ));
    let engine = engine(&source, config(), vec![Arc::new(TablespaceProbe::new())]);

    let first = engine.collect().await;
    assert_eq!(first.len(), 4);
    assert_eq!(source.calls("V$TABLESPACE"), 1);

    tokio::time::advance(Duration::from_secs(60)).await;
    let second = engine.collect().await;
    assert_eq!(source.calls("V$TABLESPACE"), 1);
    assert_eq!(
        render(&first).unwrap(),
        render(&second).unwrap(),
        "cached cycle must render identically"
    );

    tokio::time::advance(Duration::from_secs(300)).await;
    engine.collect().await;
    assert_eq!(source.calls("V$TABLESPACE"), 2);
}

// =============================================================================
// Fallbacks and Gates
// =============================================================================

#[tokio::test]
async fn test_version_falls_back_to_banner() {
    let source = Arc::new(
        FakeDm::new()
            .error("INNER_VER", SourceError::Connection("broken pipe".into()))
            .rows("TABLEDEF", vec![row![0_i64]])
            .rows("BANNER", vec![row!["DM Database Server 08.1.2.100\n"]]),
    );
    let engine = engine(&source, config(), vec![Arc::new(VersionProbe::new())]);

    let samples = engine.collect().await;
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].name(), "dmdbms_version");
    assert_eq!(samples[0].labels, vec!["db-01", "08.1.2.100", "", ""]);
    assert_eq!(samples[0].value, 1.0);

    // Second cycle is served from the cached snapshot.
    engine.collect().await;
    assert_eq!(source.calls("INNER_VER"), 1);
    assert_eq!(source.calls("BANNER"), 1);
}

#[tokio::test]
async fn test_absent_feature_emits_nothing_and_is_detected_once() {
    let monitor = TableProbe::builder("monitor", sql::MONITOR)
        .requires(DM_MONITOR, sql::MONITOR_EXISTS, 1)
        .host_label()
        .label(4, "mon_version")
        .gauge(5, "dmdbms_monitor_info", "Information about DM monitor")
        .build();
    let source = Arc::new(
        FakeDm::new()
            .rows("V$DYNAMIC_TABLES", vec![row![0_i64]])
            .rows("FROM V$DMMONITOR", vec![row!["t", "c", 1_i64, "ip", "v", 1_i64]]),
    );
    let engine = engine(&source, config(), vec![Arc::new(monitor)]);

    assert!(engine.collect().await.is_empty());
    assert!(engine.collect().await.is_empty());
    assert_eq!(source.calls("V$DYNAMIC_TABLES"), 1);
    assert_eq!(source.calls("FROM V$DMMONITOR"), 0);
    assert_eq!(engine.capabilities().cached("fake-dm", DM_MONITOR), Some(false));
}

// =============================================================================
// Isolation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_slow_probe_does_not_block_siblings() {
    let purge = TableProbe::builder("purge", sql::PURGE)
        .host_label()
        .gauge(0, "dmdbms_purge_objects_info", "Number of purge objects")
        .build();
    let dual = TableProbe::builder("dual", sql::DUAL)
        .gauge(0, "dmdbms_dual_info", "Whether a query on DUAL succeeds, 1 or 0")
        .on_failure(0.0)
        .build();
    let source = Arc::new(
        FakeDm::new()
            .slow_rows("V$PURGE", vec![row![3_i64]], Duration::from_secs(3600))
            .rows("*/ 1 FROM DUAL", vec![row![1_i64]]),
    );
    let config = EngineConfig {
        query_timeout: Duration::from_secs(2),
        ..config()
    };
    let engine = engine(&source, config, vec![Arc::new(purge), Arc::new(dual)]);

    let started = Instant::now();
    let samples = engine.collect().await;
    assert!(started.elapsed() < Duration::from_secs(10));

    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].name(), "dmdbms_dual_info");
    assert_eq!(samples[0].value, 1.0);
}

#[tokio::test]
async fn test_malformed_row_skipped_rest_emitted() {
    let mut rows: Vec<Row> = (0..9)
        .map(|i| row![format!("PARAM_{i}"), i as f64])
        .collect();
    rows.insert(4, row!["BROKEN", "not-a-number"]);
    let parameter = TableProbe::builder("parameter", sql::PARAMETER)
        .host_label()
        .label(0, "param_name")
        .gauge(1, "dmdbms_parameter_info", "Information about DM database parameters")
        .build();
    let source = Arc::new(FakeDm::new().rows("V$DM_INI", rows));
    let engine = engine(&source, config(), vec![Arc::new(parameter)]);

    let samples = engine.collect().await;
    assert_eq!(samples.len(), 9);
    assert!(samples.iter().all(|s| s.labels[1] != "BROKEN"));
}

// =============================================================================
// Real Pool
// =============================================================================

#[tokio::test]
async fn test_sqlite_pool_cycle_contains_failures() {
    let source = SqlxSource::connect("sqlite", "sqlite::memory:", &PoolOptions::default())
        .await
        .expect("Failed to open sqlite pool");
    let engine = Engine::new_in(config(), Arc::new(source), MetricRegistry::new())
        .expect("Failed to build engine");

    engine.ping().await.expect("sqlite should be reachable");

    // None of the DM views exist here; only the DUAL fallback reports.
    let samples = engine.collect().await;
    let dual: Vec<_> = samples.iter().filter(|s| s.name() == "dmdbms_dual_info").collect();
    assert_eq!(dual.len(), 1);
    assert_eq!(dual[0].value, 0.0);
}
