//! Metric descriptors, samples and the per-probe sample sink.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use strum_macros::{AsRefStr, Display, EnumString};

/// How a sample's value evolves between scrapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    /// Point-in-time value.
    Gauge,
    /// Monotonically non-decreasing value.
    Counter,
}

/// Immutable metric identity: name, help text and ordered label names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    name: String,
    help: String,
    labels: Vec<String>,
    kind: ValueKind,
}

impl MetricDescriptor {
    pub fn new(name: &str, help: &str, labels: &[&str], kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            kind,
        }
    }

    /// Shared gauge descriptor.
    pub fn gauge(name: &str, help: &str, labels: &[&str]) -> Arc<Self> {
        Arc::new(Self::new(name, help, labels, ValueKind::Gauge))
    }

    /// Shared counter descriptor.
    pub fn counter(name: &str, help: &str, labels: &[&str]) -> Arc<Self> {
        Arc::new(Self::new(name, help, labels, ValueKind::Counter))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Check the name and label names against the exposition grammar.
    ///
    /// # Errors
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if !is_metric_name(&self.name) {
            return Err(format!("invalid metric name '{}'", self.name));
        }
        if self.help.trim().is_empty() {
            return Err("help text cannot be empty".to_string());
        }
        let mut seen = HashSet::new();
        for label in &self.labels {
            if !is_label_name(label) {
                return Err(format!("invalid label name '{label}'"));
            }
            if !seen.insert(label.as_str()) {
                return Err(format!("duplicate label name '{label}'"));
            }
        }
        Ok(())
    }
}

fn is_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    !name.starts_with("__")
        && matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// One observation produced during a collection cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub descriptor: Arc<MetricDescriptor>,
    /// Label values, positionally matching `descriptor.labels()`.
    pub labels: Vec<String>,
    pub value: f64,
}

impl Sample {
    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn kind(&self) -> ValueKind {
        self.descriptor.kind()
    }
}

/// Collects the samples one probe emits during a cycle.
///
/// Samples whose label arity does not match their descriptor, non-finite
/// values and negative counter values are logged and dropped.
#[derive(Debug)]
pub struct SampleSink {
    probe: &'static str,
    samples: Vec<Sample>,
}

impl SampleSink {
    pub fn new(probe: &'static str) -> Self {
        Self {
            probe,
            samples: Vec::new(),
        }
    }

    /// Append a sample. Returns whether it was accepted.
    pub fn emit<I, S>(&mut self, descriptor: &Arc<MetricDescriptor>, labels: I, value: f64) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();

        if labels.len() != descriptor.labels().len() {
            tracing::error!(probe = self.probe, metric = descriptor.name(),
                expected = descriptor.labels().len(), got = labels.len(),
                "Dropping sample with wrong label count");
            return false;
        }
        if !value.is_finite() {
            tracing::warn!(probe = self.probe, metric = descriptor.name(), value,
                "Dropping non-finite sample");
            return false;
        }
        if descriptor.kind() == ValueKind::Counter && value < 0.0 {
            tracing::warn!(probe = self.probe, metric = descriptor.name(), value,
                "Dropping negative counter sample");
            return false;
        }

        self.samples.push(Sample {
            descriptor: Arc::clone(descriptor),
            labels,
            value,
        });
        true
    }

    /// Append a sample for a descriptor without labels.
    pub fn emit_unlabeled(&mut self, descriptor: &Arc<MetricDescriptor>, value: f64) -> bool {
        self.emit(descriptor, std::iter::empty::<String>(), value)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

/// Drop rows whose key was already seen. First occurrence wins; order is kept.
pub fn dedup_rows<T, K, F>(rows: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    rows.into_iter().filter(|row| seen.insert(key(row))).collect()
}
