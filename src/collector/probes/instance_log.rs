//! Recent error lines from the instance log.

use std::sync::Arc;

use async_trait::async_trait;

use super::sql;
use crate::collector::coerce::string_or_empty;
use crate::collector::sample::{MetricDescriptor, SampleSink, dedup_rows};
use crate::collector::traits::{Probe, ProbeContext, ProbeError, ProbeGroup};
use crate::storage::{Row, ScanError};

pub const INSTANCE_LOG_ERROR_INFO: &str = "dmdbms_instance_log_error_info";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LogLine {
    log_time: String,
    pid: String,
    level: String,
    txt: String,
}

impl LogLine {
    fn scan(row: &Row) -> Result<Self, ScanError> {
        Ok(Self {
            log_time: string_or_empty(row.text(0)?),
            pid: string_or_empty(row.text(1)?),
            level: string_or_empty(row.text(2)?),
            txt: string_or_empty(row.text(3)?),
        })
    }
}

/// One sample of value 1 per distinct (pid, level, time, text) log line.
pub struct InstanceLogProbe {
    desc: Arc<MetricDescriptor>,
}

impl InstanceLogProbe {
    pub fn new() -> Self {
        Self {
            desc: MetricDescriptor::gauge(INSTANCE_LOG_ERROR_INFO,
                "Information about DM database instance error log",
                &["pid", "level", "log_time", "txt"]),
        }
    }
}

#[async_trait]
impl Probe for InstanceLogProbe {
    fn name(&self) -> &'static str {
        "instance_log_error"
    }

    fn group(&self) -> ProbeGroup {
        ProbeGroup::Database
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![Arc::clone(&self.desc)]
    }

    async fn collect(&self, ctx: &ProbeContext, sink: &mut SampleSink) -> Result<(), ProbeError> {
        let lines = ctx
            .executor()
            .execute(ctx.deadline(), sql::INSTANCE_LOG_ERROR, LogLine::scan)
            .await?;

        // The history view repeats a line once per log flush.
        let lines = dedup_rows(lines, |l| l.clone());
        for line in lines {
            sink.emit(&self.desc, [line.pid, line.level, line.log_time, line.txt], 1.0);
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

    #[tokio::test]
    async fn test_duplicate_lines_emit_once_in_order() {
        let source = ScriptedSource::new("db1").with_rows(
            "V$INSTANCE_LOG_HISTORY",
            vec![
                row!["2024-05-01 10:00:00", 4012_i64, "ERROR", "disk full"],
                row!["2024-05-01 10:00:01", 4012_i64, "FATAL", "abort"],
                row!["2024-05-01 10:00:00", 4012_i64, "ERROR", "disk full"],
                row!["2024-05-01 10:00:02", None::<i64>, "ERROR", None::<String>],
            ],
        );
        let ctx = ProbeContext::new(
            QueryExecutor::new(Arc::new(source), Duration::from_secs(1)),
            Arc::new(CapabilityCache::default()),
            Arc::new(ResultCache::new()),
            &EngineConfig::default(),
        );

        let mut sink = SampleSink::new("instance_log_error");
        InstanceLogProbe::new().collect(&ctx, &mut sink).await.unwrap();

        let samples = sink.into_samples();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].labels, vec!["4012", "ERROR", "2024-05-01 10:00:00", "disk full"]);
        assert_eq!(samples[1].labels[1], "FATAL");
        assert_eq!(samples[2].labels, vec!["", "ERROR", "2024-05-01 10:00:02", ""]);
        assert!(samples.iter().all(|s| s.value == 1.0));
    }
}
