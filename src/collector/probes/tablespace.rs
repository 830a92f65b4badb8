//! Tablespace and datafile capacity. Enumeration is expensive, so row sets
//! are served from the result cache while fresh.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::sql;
use crate::collector::coerce::{float_or_zero, string_or_empty};
use crate::collector::sample::{MetricDescriptor, SampleSink};
use crate::collector::traits::{Probe, ProbeContext, ProbeError, ProbeGroup};
use crate::storage::{Row, ScanError};

pub const TABLESPACE_SIZE_TOTAL: &str = "dmdbms_tablespace_size_total_info";
pub const TABLESPACE_SIZE_FREE: &str = "dmdbms_tablespace_size_free_info";
pub const TABLESPACE_FILE_TOTAL: &str = "dmdbms_tablespace_file_total_info";
pub const TABLESPACE_FILE_FREE: &str = "dmdbms_tablespace_file_free_info";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TablespaceUsage {
    name: String,
    total: f64,
    free: f64,
}

impl TablespaceUsage {
    fn scan(row: &Row) -> Result<Self, ScanError> {
        Ok(Self {
            name: string_or_empty(row.text(0)?),
            total: float_or_zero(row.float(1)?),
            free: float_or_zero(row.float(2)?),
        })
    }
}

pub struct TablespaceProbe {
    total: Arc<MetricDescriptor>,
    free: Arc<MetricDescriptor>,
}

impl TablespaceProbe {
    pub fn new() -> Self {
        Self {
            total: MetricDescriptor::gauge(TABLESPACE_SIZE_TOTAL, "Tablespace total size in bytes",
                &["host_name", "tablespace_name"]),
            free: MetricDescriptor::gauge(TABLESPACE_SIZE_FREE, "Tablespace free size in bytes",
                &["host_name", "tablespace_name"]),
        }
    }
}

#[async_trait]
impl Probe for TablespaceProbe {
    fn name(&self) -> &'static str {
        "tablespace"
    }

    fn group(&self) -> ProbeGroup {
        ProbeGroup::Database
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![Arc::clone(&self.total), Arc::clone(&self.free)]
    }

    async fn collect(&self, ctx: &ProbeContext, sink: &mut SampleSink) -> Result<(), ProbeError> {
        let rows = ctx
            .cached_query(TABLESPACE_SIZE_TOTAL, sql::TABLESPACE, TablespaceUsage::scan)
            .await?;

        let host = ctx.host_name();
        for ts in rows {
            sink.emit(&self.total, [host, ts.name.as_str()], ts.total);
            sink.emit(&self.free, [host, ts.name.as_str()], ts.free);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DatafileUsage {
    path: String,
    total: f64,
    free: f64,
    auto_extend: String,
    next_size: String,
    max_size: String,
}

impl DatafileUsage {
    fn scan(row: &Row) -> Result<Self, ScanError> {
        Ok(Self {
            path: string_or_empty(row.text(0)?),
            total: float_or_zero(row.float(1)?),
            free: float_or_zero(row.float(2)?),
            auto_extend: string_or_empty(row.text(3)?),
            next_size: string_or_empty(row.text(4)?),
            max_size: string_or_empty(row.text(5)?),
        })
    }
}

pub struct DatafileProbe {
    total: Arc<MetricDescriptor>,
    free: Arc<MetricDescriptor>,
}

impl DatafileProbe {
    const LABELS: [&'static str; 5] = ["host_name", "tablespace_name", "auto_extend", "next_size", "max_size"];

    pub fn new() -> Self {
        Self {
            total: MetricDescriptor::gauge(TABLESPACE_FILE_TOTAL, "Datafile total size in bytes", &Self::LABELS),
            free: MetricDescriptor::gauge(TABLESPACE_FILE_FREE, "Datafile free size in bytes", &Self::LABELS),
        }
    }
}

#[async_trait]
impl Probe for DatafileProbe {
    fn name(&self) -> &'static str {
        "tablespace_datafile"
    }

    fn group(&self) -> ProbeGroup {
        ProbeGroup::Database
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![Arc::clone(&self.total), Arc::clone(&self.free)]
    }

    async fn collect(&self, ctx: &ProbeContext, sink: &mut SampleSink) -> Result<(), ProbeError> {
        let rows = ctx
            .cached_query(TABLESPACE_FILE_TOTAL, sql::TABLESPACE_DATAFILE, DatafileUsage::scan)
            .await?;

        let host = ctx.host_name();
        for file in rows {
            let labels = [
                host,
                file.path.as_str(),
                file.auto_extend.as_str(),
                file.next_size.as_str(),
                file.max_size.as_str(),
            ];
            sink.emit(&self.total, labels, file.total);
            sink.emit(&self.free, labels, file.free);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::cache::ResultCache;
    use crate::collector::capability::CapabilityCache;
    use crate::collector::executor::QueryExecutor;
    use crate::collector::testing::ScriptedSource;
    use crate::collector::traits::EngineConfig;
    use crate::row;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_corrupt_cache_entry_falls_through_to_query() {
        let source = Arc::new(
            ScriptedSource::new("db1").with_rows("V$TABLESPACE", vec![row!["MAIN", 100.0, 40.0]]),
        );
        let results = Arc::new(ResultCache::new());
        let ctx = ProbeContext::new(
            QueryExecutor::new(source.clone(), Duration::from_secs(1)),
            Arc::new(CapabilityCache::default()),
            Arc::clone(&results),
            &EngineConfig::default(),
        );
        results.set(ctx.cache_key(TABLESPACE_SIZE_TOTAL), "{corrupt", Duration::from_secs(300));

        let mut sink = SampleSink::new("tablespace");
        TablespaceProbe::new().collect(&ctx, &mut sink).await.unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(source.calls("V$TABLESPACE"), 1);
        // The live result replaced the corrupt entry.
        assert!(results.get_json::<Vec<TablespaceUsage>>("db1:dmdbms_tablespace_size_total_info").is_some());
    }

    #[tokio::test]
    async fn test_datafile_labels() {
        let source = ScriptedSource::new("db1").with_rows(
            "V$DATAFILE",
            vec![row!["/dm/MAIN.DBF", 1024.0, 512.0, "Y", 16_i64, None::<String>]],
        );
        let ctx = ProbeContext::new(
            QueryExecutor::new(Arc::new(source), Duration::from_secs(1)),
            Arc::new(CapabilityCache::default()),
            Arc::new(ResultCache::new()),
            &EngineConfig {
                host_name: Some("db-01".into()),
                ..EngineConfig::default()
            },
        );

        let mut sink = SampleSink::new("tablespace_datafile");
        DatafileProbe::new().collect(&ctx, &mut sink).await.unwrap();

        let samples = sink.into_samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].labels, vec!["db-01", "/dm/MAIN.DBF", "Y", "16", ""]);
        assert_eq!(samples[1].value, 512.0);
    }
}
