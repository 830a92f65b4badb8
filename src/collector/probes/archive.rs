//! Archive log probes: status, send lag and switch rate.

use std::sync::Arc;

use async_trait::async_trait;

use super::sql;
use crate::collector::coerce::{float_or_zero, string_or_empty};
use crate::collector::executor::QueryError;
use crate::collector::sample::{MetricDescriptor, SampleSink};
use crate::collector::traits::{Probe, ProbeContext, ProbeError, ProbeGroup};

pub const ARCH_STATUS: &str = "dmdbms_arch_status";
pub const ARCH_STATUS_INFO: &str = "dmdbms_arch_status_info";
pub const ARCH_SEND_DETAIL_INFO: &str = "dmdbms_arch_send_detail_info";
pub const ARCH_SEND_DIFF_VALUE: &str = "dmdbms_arch_send_diff_value";
pub const ARCH_SWITCH_RATE: &str = "dmdbms_arch_switch_rate";
pub const ARCH_SWITCH_RATE_DETAIL: &str = "dmdbms_arch_switch_rate_detail_info";

/// Capability key for the `V$ARCH_APPLY_INFO` view.
pub const ARCH_APPLY_INFO: &str = "V$ARCH_APPLY_INFO";

/// Capability key for the `LAST_SEND_CODE` and `LAST_SEND_DESC` columns.
pub const ARCH_SEND_CODE_COLUMNS: &str = "V$ARCH_SEND_INFO.LAST_SEND_CODE";

/// Archiving state of the local archive destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveState {
    Disabled,
    Valid,
    Invalid,
}

impl ArchiveState {
    /// Value reported by `dmdbms_arch_status`.
    pub fn code(self) -> f64 {
        match self {
            Self::Disabled => -1.0,
            Self::Valid => 1.0,
            Self::Invalid => 2.0,
        }
    }
}

/// Read the archiving configuration and local destination status.
pub async fn archive_state(ctx: &ProbeContext) -> Result<ArchiveState, QueryError> {
    let executor = ctx.executor();
    let deadline = ctx.deadline();

    let enabled = executor.fetch_text(deadline, sql::ARCH_ENABLED).await?;
    match enabled.as_deref().map(str::trim) {
        Some("1") => {}
        Some("0") => return Ok(ArchiveState::Disabled),
        _ => return Ok(ArchiveState::Invalid),
    }

    let valid = executor.fetch_int(deadline, sql::ARCH_LOCAL_VALID).await?;
    Ok(match valid {
        Some(1) => ArchiveState::Valid,
        _ => ArchiveState::Invalid,
    })
}

/// Replace the optional send-code columns with empty placeholders.
pub fn without_send_code_columns(query: &str) -> String {
    query
        .replace("LAST_SEND_CODE,", "'' AS LAST_SEND_CODE,")
        .replace("LAST_SEND_DESC,", "'' AS LAST_SEND_DESC,")
}

/// `dmdbms_arch_status` (-1 disabled, 1 valid, 2 invalid) plus one
/// `dmdbms_arch_status_info` sample per destination when archiving is valid.
pub struct ArchStatusProbe {
    status: Arc<MetricDescriptor>,
    info: Arc<MetricDescriptor>,
}

impl ArchStatusProbe {
    pub fn new() -> Self {
        Self {
            status: MetricDescriptor::gauge(ARCH_STATUS, "Information about DM database archive status",
                &["host_name"]),
            info: MetricDescriptor::gauge(ARCH_STATUS_INFO,
                "Information about DM database archive status, value info: valid = 1, invalid = 0",
                &["arch_type", "arch_dest", "arch_src"]),
        }
    }
}

#[async_trait]
impl Probe for ArchStatusProbe {
    fn name(&self) -> &'static str {
        "arch_status"
    }

    fn group(&self) -> ProbeGroup {
        ProbeGroup::Database
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![Arc::clone(&self.status), Arc::clone(&self.info)]
    }

    async fn collect(&self, ctx: &ProbeContext, sink: &mut SampleSink) -> Result<(), ProbeError> {
        ctx.executor().ping(ctx.deadline()).await?;

        let state = archive_state(ctx).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Archive status check failed, reporting invalid");
            ArchiveState::Invalid
        });
        sink.emit(&self.status, [ctx.host_name()], state.code());

        if state != ArchiveState::Valid {
            return Ok(());
        }

        let rows = ctx
            .executor()
            .execute(ctx.deadline(), sql::ARCH_STATUS_DETAIL, |row| {
                Ok((
                    float_or_zero(row.float(0)?),
                    string_or_empty(row.text(1)?),
                    string_or_empty(row.text(2)?),
                    string_or_empty(row.text(3)?),
                ))
            })
            .await;

        // The overall status is already reported; a detail failure only drops the detail.
        if let Ok(rows) = rows {
            for (status, arch_type, dest, src) in rows {
                sink.emit(&self.info, [arch_type, dest, src], status);
            }
        }
        Ok(())
    }
}

/// Send lag per archive destination. Only runs while archiving is valid.
pub struct ArchSendProbe {
    detail: Arc<MetricDescriptor>,
    diff: Arc<MetricDescriptor>,
}

impl ArchSendProbe {
    pub fn new() -> Self {
        let help = "Archive send lag, MAX_SEND_LSN - LAST_SEND_LSN";
        Self {
            detail: MetricDescriptor::gauge(ARCH_SEND_DETAIL_INFO, help, &["arch_type", "arch_dest"]),
            diff: MetricDescriptor::gauge(ARCH_SEND_DIFF_VALUE, help, &["arch_type", "arch_dest"]),
        }
    }

    async fn query(&self, ctx: &ProbeContext) -> String {
        let base = if ctx.capability(ARCH_APPLY_INFO, sql::ARCH_APPLY_INFO_EXISTS, 1).await {
            sql::ARCH_SEND_DETAIL_WITH_APPLY
        } else {
            sql::ARCH_SEND_DETAIL
        };

        if ctx.capability(ARCH_SEND_CODE_COLUMNS, sql::ARCH_SEND_CODE_COLUMNS, 2).await {
            base.to_string()
        } else {
            without_send_code_columns(base)
        }
    }
}

#[async_trait]
impl Probe for ArchSendProbe {
    fn name(&self) -> &'static str {
        "arch_send"
    }

    fn group(&self) -> ProbeGroup {
        ProbeGroup::Database
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![Arc::clone(&self.detail), Arc::clone(&self.diff)]
    }

    async fn gate(&self, ctx: &ProbeContext) -> bool {
        match archive_state(ctx).await {
            Ok(ArchiveState::Valid) => true,
            Ok(state) => {
                tracing::debug!(?state, "Archiving not valid, skipping archive send metrics");
                false
            }
            Err(e) => {
                tracing::info!(error = %e, "Archive status unavailable, skipping archive send metrics");
                false
            }
        }
    }

    async fn collect(&self, ctx: &ProbeContext, sink: &mut SampleSink) -> Result<(), ProbeError> {
        let query = self.query(ctx).await;
        let rows = ctx
            .executor()
            .execute(ctx.deadline(), &query, |row| {
                Ok((
                    string_or_empty(row.text(0)?),
                    string_or_empty(row.text(1)?),
                    float_or_zero(row.float(2)?),
                ))
            })
            .await?;

        for (dest, arch_type, lag) in rows {
            sink.emit(&self.detail, [arch_type.as_str(), dest.as_str()], lag);
            sink.emit(&self.diff, [arch_type.as_str(), dest.as_str()], lag);
        }
        Ok(())
    }
}

/// Minutes between the two most recent archive files. Reports 0 while
/// archiving is not valid.
pub struct ArchSwitchProbe {
    rate: Arc<MetricDescriptor>,
    detail: Arc<MetricDescriptor>,
}

impl ArchSwitchProbe {
    pub fn new() -> Self {
        Self {
            rate: MetricDescriptor::gauge(ARCH_SWITCH_RATE,
                "Minutes between the latest archive switches", &[]),
            detail: MetricDescriptor::gauge(ARCH_SWITCH_RATE_DETAIL,
                "Minutes between the latest archive switches, detail", &[]),
        }
    }
}

#[async_trait]
impl Probe for ArchSwitchProbe {
    fn name(&self) -> &'static str {
        "arch_switch"
    }

    fn group(&self) -> ProbeGroup {
        ProbeGroup::Database
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![Arc::clone(&self.rate), Arc::clone(&self.detail)]
    }

    async fn collect(&self, ctx: &ProbeContext, sink: &mut SampleSink) -> Result<(), ProbeError> {
        if !matches!(archive_state(ctx).await, Ok(ArchiveState::Valid)) {
            sink.emit_unlabeled(&self.rate, 0.0);
            return Ok(());
        }

        let minutes = ctx
            .executor()
            .execute(ctx.deadline(), sql::ARCH_SWITCH_RATE, |row| row.float(5))
            .await?
            .into_iter()
            .next()
            .flatten();

        let value = float_or_zero(minutes);
        sink.emit_unlabeled(&self.rate, value);
        sink.emit_unlabeled(&self.detail, value);
        Ok(())
    }
}
