//! Built-in DM8 probe definitions.
//!
//! [`build`] assembles the probe set selected by the engine configuration.
//! Simple view-to-metric mappings are [`TableProbe`] definitions; probes
//! with fallbacks, caching or gating have their own types.

mod archive;
mod instance_log;
pub mod sql;
mod system;
mod table;
mod tablespace;
mod users;
mod version;

use std::sync::Arc;

pub use archive::{
    ARCH_APPLY_INFO, ARCH_SEND_CODE_COLUMNS, ArchSendProbe, ArchStatusProbe, ArchSwitchProbe,
    ArchiveState, archive_state, without_send_code_columns,
};
pub use instance_log::InstanceLogProbe;
pub use system::{JobErrorsProbe, SystemInfoProbe};
pub use table::{TableProbe, TableProbeBuilder};
pub use tablespace::{DatafileProbe, TablespaceProbe};
pub use users::UserListProbe;
pub use version::{VersionProbe, VersionSnapshot, normalize_version};

use super::traits::{EngineConfig, Probe, ProbeGroup};

/// Capability key for the `V$DMMONITOR` view.
pub const DM_MONITOR: &str = "V$DMMONITOR";

/// Every built-in probe, regardless of configuration.
pub fn all() -> Vec<Arc<dyn Probe>> {
    vec![
        Arc::new(SystemInfoProbe::new()),
        Arc::new(DatafileProbe::new()),
        Arc::new(TablespaceProbe::new()),
        Arc::new(
            TableProbe::builder("memory_pool", sql::MEMORY_POOL)
                .host_label()
                .label(0, "pool_type")
                .gauge(3, "dmdbms_memory_total_pool_info", "Memory pool total size")
                .gauge(1, "dmdbms_memory_curr_pool_info", "Memory pool current size")
                .build(),
        ),
        Arc::new(JobErrorsProbe::new()),
        Arc::new(
            TableProbe::builder("monitor", sql::MONITOR)
                .requires(DM_MONITOR, sql::MONITOR_EXISTS, 1)
                .host_label()
                .label(0, "dw_conn_time")
                .label(1, "mon_confirm")
                .label(2, "mon_id")
                .label(3, "mon_ip")
                .label(4, "mon_version")
                .gauge(5, "dmdbms_monitor_info", "Information about DM monitor")
                .build(),
        ),
        Arc::new(
            TableProbe::builder("statement_type", sql::STATEMENT_TYPE)
                .host_label()
                .label(0, "statement_name")
                .counter(1, "dmdbms_statement_type_total", "Executed statements by type")
                .build(),
        ),
        Arc::new(
            TableProbe::builder("parameter", sql::PARAMETER)
                .host_label()
                .label(0, "param_name")
                .gauge(1, "dmdbms_parameter_info", "Information about DM database parameters")
                .build(),
        ),
        Arc::new(UserListProbe::new()),
        Arc::new(VersionProbe::new()),
        Arc::new(ArchStatusProbe::new()),
        Arc::new(InstanceLogProbe::new()),
        Arc::new(ArchSendProbe::new()),
        Arc::new(ArchSwitchProbe::new()),
        Arc::new(
            TableProbe::builder("buffer_pool", sql::BUFFER_POOL)
                .label(0, "buffer_name")
                .gauge(1, "dmdbms_bufferpool_info", "Buffer pool hit rate")
                .build(),
        ),
        Arc::new(
            TableProbe::builder("dual", sql::DUAL)
                .gauge(0, "dmdbms_dual_info", "Whether a query on DUAL succeeds, 1 or 0")
                .on_failure(0.0)
                .build(),
        ),
        Arc::new(
            TableProbe::builder("purge", sql::PURGE)
                .host_label()
                .gauge(0, "dmdbms_purge_objects_info", "Number of purge objects")
                .build(),
        ),
        Arc::new(
            TableProbe::builder("rapply_time_diff", sql::RAPPLY_TIME_DIFF)
                .host_label()
                .gauge(0, "dmdbms_rapply_time_diff",
                    "Seconds between APPLY_CMT_TIME and LAST_CMT_TIME on the standby")
                .build(),
        ),
    ]
}

/// Probes whose group is enabled in `config`.
pub fn build(config: &EngineConfig) -> Vec<Arc<dyn Probe>> {
    let probes: Vec<_> = all().into_iter().filter(|p| config.enables(p.group())).collect();

    for group in [ProbeGroup::Host, ProbeGroup::Database, ProbeGroup::Middleware] {
        if config.enables(group) {
            let count = probes.iter().filter(|p| p.group() == group).count();
            tracing::debug!(group = %group, probes = count, "Probe group enabled");
        }
    }
    probes
}
