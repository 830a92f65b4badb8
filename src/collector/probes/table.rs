//! Definition-driven probe: one statement, label columns and value columns.
//!
//! Most DM views map straight onto metrics: some columns become label
//! values, others become one sample each. [`TableProbe`] covers that shape
//! so each such probe is a few lines of definition.

use std::sync::Arc;

use async_trait::async_trait;

use crate::collector::coerce::{float_or_zero, string_or_empty};
use crate::collector::sample::{MetricDescriptor, SampleSink, ValueKind};
use crate::collector::traits::{Probe, ProbeContext, ProbeError, ProbeGroup};
use crate::storage::{Row, ScanError};

struct Series {
    descriptor: Arc<MetricDescriptor>,
    column: usize,
}

struct Requirement {
    feature: &'static str,
    sql: &'static str,
    expected: i64,
}

/// Probe built from a [`TableProbeBuilder`].
pub struct TableProbe {
    name: &'static str,
    group: ProbeGroup,
    sql: &'static str,
    host_label: bool,
    label_columns: Vec<usize>,
    series: Vec<Series>,
    requires: Option<Requirement>,
    on_failure: Option<f64>,
}

impl TableProbe {
    pub fn builder(name: &'static str, sql: &'static str) -> TableProbeBuilder {
        TableProbeBuilder {
            name,
            group: ProbeGroup::Database,
            sql,
            host_label: false,
            labels: Vec::new(),
            series: Vec::new(),
            requires: None,
            on_failure: None,
        }
    }

    fn scan(&self, host: &str, row: &Row) -> Result<(Vec<String>, Vec<f64>), ScanError> {
        let mut labels = Vec::with_capacity(self.label_columns.len() + 1);
        if self.host_label {
            labels.push(host.to_string());
        }
        for &column in &self.label_columns {
            labels.push(string_or_empty(row.text(column)?));
        }
        let values = self
            .series
            .iter()
            .map(|s| row.float(s.column).map(float_or_zero))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((labels, values))
    }

    fn emit_fallback(&self, host: &str, value: f64, sink: &mut SampleSink) {
        let labels: Vec<&str> = if self.host_label { vec![host] } else { vec![] };
        for series in &self.series {
            sink.emit(&series.descriptor, labels.iter().copied(), value);
        }
    }
}

#[async_trait]
impl Probe for TableProbe {
    fn name(&self) -> &'static str {
        self.name
    }

    fn group(&self) -> ProbeGroup {
        self.group
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        self.series.iter().map(|s| Arc::clone(&s.descriptor)).collect()
    }

    async fn gate(&self, ctx: &ProbeContext) -> bool {
        match &self.requires {
            Some(req) => ctx.capability(req.feature, req.sql, req.expected).await,
            None => true,
        }
    }

    async fn collect(&self, ctx: &ProbeContext, sink: &mut SampleSink) -> Result<(), ProbeError> {
        let host = ctx.host_name();
        let outcome = ctx
            .executor()
            .execute(ctx.deadline(), self.sql, |row| self.scan(host, row))
            .await;

        let rows = match (outcome, self.on_failure) {
            (Ok(rows), Some(value)) if rows.is_empty() => {
                self.emit_fallback(host, value, sink);
                return Ok(());
            }
            (Ok(rows), _) => rows,
            (Err(_), Some(value)) => {
                self.emit_fallback(host, value, sink);
                return Ok(());
            }
            (Err(e), None) => return Err(e.into()),
        };

        for (labels, values) in rows {
            for (series, value) in self.series.iter().zip(values) {
                sink.emit(&series.descriptor, labels.iter().map(String::as_str), value);
            }
        }
        Ok(())
    }
}

/// Builder for [`TableProbe`]. Label columns must be declared before series.
pub struct TableProbeBuilder {
    name: &'static str,
    group: ProbeGroup,
    sql: &'static str,
    host_label: bool,
    labels: Vec<(usize, &'static str)>,
    series: Vec<(usize, &'static str, &'static str, ValueKind)>,
    requires: Option<Requirement>,
    on_failure: Option<f64>,
}

impl TableProbeBuilder {
    pub fn group(mut self, group: ProbeGroup) -> Self {
        self.group = group;
        self
    }

    /// Prepend a `host_name` label carrying the configured host name.
    pub fn host_label(mut self) -> Self {
        self.host_label = true;
        self
    }

    /// Use `column` as the value of label `name`.
    pub fn label(mut self, column: usize, name: &'static str) -> Self {
        self.labels.push((column, name));
        self
    }

    /// Emit `column` as a gauge.
    pub fn gauge(mut self, column: usize, metric: &'static str, help: &'static str) -> Self {
        self.series.push((column, metric, help, ValueKind::Gauge));
        self
    }

    /// Emit `column` as a counter.
    pub fn counter(mut self, column: usize, metric: &'static str, help: &'static str) -> Self {
        self.series.push((column, metric, help, ValueKind::Counter));
        self
    }

    /// Skip the probe unless `sql` returns `expected` for capability `feature`.
    pub fn requires(mut self, feature: &'static str, sql: &'static str, expected: i64) -> Self {
        self.requires = Some(Requirement {
            feature,
            sql,
            expected,
        });
        self
    }

    /// Emit `value` instead of nothing when the statement fails or returns no rows.
    pub fn on_failure(mut self, value: f64) -> Self {
        self.on_failure = Some(value);
        self
    }

    pub fn build(self) -> TableProbe {
        let mut label_names: Vec<&str> = Vec::with_capacity(self.labels.len() + 1);
        if self.host_label {
            label_names.push("host_name");
        }
        label_names.extend(self.labels.iter().map(|(_, name)| *name));

        let series = self
            .series
            .into_iter()
            .map(|(column, metric, help, kind)| Series {
                descriptor: Arc::new(MetricDescriptor::new(metric, help, &label_names, kind)),
                column,
            })
            .collect();

        TableProbe {
            name: self.name,
            group: self.group,
            sql: self.sql,
            host_label: self.host_label,
            label_columns: self.labels.into_iter().map(|(column, _)| column).collect(),
            series,
            requires: self.requires,
            on_failure: self.on_failure,
        }
    }
}
