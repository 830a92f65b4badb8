//! Host sizing and scheduled-job health.

use std::sync::Arc;

use async_trait::async_trait;

use super::sql;
use crate::collector::coerce::{float_label, int_or_zero};
use crate::collector::executor::QueryError;
use crate::collector::sample::{MetricDescriptor, SampleSink};
use crate::collector::traits::{Probe, ProbeContext, ProbeError, ProbeGroup};

pub const SYSTEM_BASE_INFO: &str = "dmdbms_system_base_info";
pub const SYSTEM_CPU_INFO: &str = "dmdbms_system_cpu_info";
pub const SYSTEM_MEMORY_INFO: &str = "dmdbms_system_memory_info";
pub const JOBLOG_ERROR_NUM: &str = "dmdbms_joblog_error_num";

/// CPU, memory and disk sizing of the database host.
///
/// `dmdbms_system_base_info` is always 1 and carries the sizes as labels,
/// left empty when the host reports nothing. The CPU and memory gauges are
/// only emitted when the value is known.
pub struct SystemInfoProbe {
    base: Arc<MetricDescriptor>,
    cpu: Arc<MetricDescriptor>,
    memory: Arc<MetricDescriptor>,
}

impl SystemInfoProbe {
    pub fn new() -> Self {
        Self {
            base: MetricDescriptor::gauge(SYSTEM_BASE_INFO,
                "Database system base information (always 1, sizes in labels)",
                &["host_name", "n_cpu", "total_phy_size", "total_vir_size", "total_disk_size"]),
            cpu: MetricDescriptor::gauge(SYSTEM_CPU_INFO, "Number of CPU cores", &["host_name"]),
            memory: MetricDescriptor::gauge(SYSTEM_MEMORY_INFO, "Total physical memory size in bytes",
                &["host_name"]),
        }
    }
}

#[async_trait]
impl Probe for SystemInfoProbe {
    fn name(&self) -> &'static str {
        "system_info"
    }

    fn group(&self) -> ProbeGroup {
        ProbeGroup::Host
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![Arc::clone(&self.base), Arc::clone(&self.cpu), Arc::clone(&self.memory)]
    }

    async fn collect(&self, ctx: &ProbeContext, sink: &mut SampleSink) -> Result<(), ProbeError> {
        let info = ctx
            .executor()
            .execute(ctx.deadline(), sql::SYSTEM_INFO, |row| {
                Ok([row.float(0)?, row.float(1)?, row.float(2)?, row.float(3)?])
            })
            .await?
            .into_iter()
            .next()
            .unwrap_or_else(|| {
                tracing::debug!("V$SYSTEMINFO returned no rows, sizes unknown");
                [None; 4]
            });

        let [n_cpu, phy, vir, disk] = info;
        let host = ctx.host_name().to_string();
        sink.emit(
            &self.base,
            [host.clone(), float_label(n_cpu), float_label(phy), float_label(vir), float_label(disk)],
            1.0,
        );
        if let Some(n_cpu) = n_cpu {
            sink.emit(&self.cpu, [host.as_str()], n_cpu);
        }
        if let Some(phy) = phy {
            sink.emit(&self.memory, [host.as_str()], phy);
        }
        Ok(())
    }
}

/// Number of failed scheduled-job runs in the last day.
///
/// The job subsystem is optional; when its schema is missing the probe logs
/// once per cycle at info level and emits nothing.
pub struct JobErrorsProbe {
    desc: Arc<MetricDescriptor>,
}

impl JobErrorsProbe {
    pub fn new() -> Self {
        Self {
            desc: MetricDescriptor::gauge(JOBLOG_ERROR_NUM, "Failed scheduled job runs in the last day",
                &["host_name"]),
        }
    }
}

fn job_system_disabled(err: &QueryError) -> bool {
    matches!(err, QueryError::Failed { source, .. } if source.to_string().contains("SYSJOB"))
}

#[async_trait]
impl Probe for JobErrorsProbe {
    fn name(&self) -> &'static str {
        "job_errors"
    }

    fn group(&self) -> ProbeGroup {
        ProbeGroup::Database
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![Arc::clone(&self.desc)]
    }

    async fn collect(&self, ctx: &ProbeContext, sink: &mut SampleSink) -> Result<(), ProbeError> {
        let count = match ctx.executor().fetch_int(ctx.deadline(), sql::JOB_ERRORS).await {
            Ok(count) => count,
            Err(e) if job_system_disabled(&e) => {
                tracing::info!("Job subsystem not initialized (SP_INIT_JOB_SYS), skipping job error count");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        sink.emit(&self.desc, [ctx.host_name()], int_or_zero(count));
        Ok(())
    }
}
