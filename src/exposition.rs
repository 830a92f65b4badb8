//! Prometheus text exposition of collected samples.
//!
//! Every scrape builds a fresh [`prometheus::Registry`] from the samples of
//! one collection cycle, so nothing survives between scrapes and a series
//! that was not produced this cycle is simply absent.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

use crate::collector::{Sample, ValueKind};

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Rendering errors.
#[derive(Debug, Error)]
pub enum ExpositionError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Encoder produced invalid UTF-8 at byte {0}")]
    InvalidUtf8(usize),
}

enum Family {
    Gauge(GaugeVec),
    Counter(CounterVec),
}

/// Render samples in the Prometheus text format.
///
/// Samples sharing a descriptor name form one metric family. When two
/// samples carry the same label values the later one wins. Non-finite
/// values and negative counters are skipped.
pub fn render(samples: &[Sample]) -> Result<String, ExpositionError> {
    let registry = Registry::new();
    let mut families: HashMap<&str, Family> = HashMap::new();

    for sample in samples {
        let desc = &sample.descriptor;
        if !sample.value.is_finite() || (desc.kind() == ValueKind::Counter && sample.value < 0.0) {
            tracing::warn!(metric = desc.name(), value = sample.value, "Skipping unrepresentable sample");
            continue;
        }
        let family = match families.entry(desc.name()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let opts = Opts::new(desc.name(), desc.help());
                let labels: Vec<&str> = desc.labels().iter().map(String::as_str).collect();
                let family = match desc.kind() {
                    ValueKind::Gauge => {
                        let vec = GaugeVec::new(opts, &labels)?;
                        registry.register(Box::new(vec.clone()))?;
                        Family::Gauge(vec)
                    }
                    ValueKind::Counter => {
                        let vec = CounterVec::new(opts, &labels)?;
                        registry.register(Box::new(vec.clone()))?;
                        Family::Counter(vec)
                    }
                };
                entry.insert(family)
            }
        };

        let values: Vec<&str> = sample.labels.iter().map(String::as_str).collect();
        match family {
            Family::Gauge(vec) => vec.get_metric_with_label_values(&values)?.set(sample.value),
            Family::Counter(vec) => {
                let counter = vec.get_metric_with_label_values(&values)?;
                counter.reset();
                counter.inc_by(sample.value);
            }
        }
    }

    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&metric_families, &mut buffer)?;

    tracing::trace!(
        families = metric_families.len(),
        bytes = buffer.len(),
        "Rendered exposition"
    );

    String::from_utf8(buffer).map_err(|e| ExpositionError::InvalidUtf8(e.utf8_error().valid_up_to()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{MetricDescriptor, SampleSink};
    use std::sync::Arc;

    #[test]
    fn test_render_gauge_and_counter() {
        let gauge = MetricDescriptor::gauge("dmdbms_dual_info", "DUAL reachable", &[]);
        let counter = MetricDescriptor::counter(
            "dmdbms_statement_type_total",
            "Executed statements by type",
            &["host_name", "statement_name"],
        );

        let mut sink = SampleSink::new("test");
        sink.emit_unlabeled(&gauge, 1.0);
        sink.emit(&counter, ["db-01", "SELECT"], 42.0);
        sink.emit(&counter, ["db-01", "INSERT"], 7.0);

        let text = render(sink.samples()).unwrap();
        assert!(text.contains("# HELP dmdbms_dual_info DUAL reachable"));
        assert!(text.contains("# TYPE dmdbms_dual_info gauge"));
        assert!(text.contains("dmdbms_dual_info 1"));
        assert!(text.contains("# TYPE dmdbms_statement_type_total counter"));
        assert!(text.contains(r#"dmdbms_statement_type_total{host_name="db-01",statement_name="SELECT"} 42"#));
        assert!(text.contains(r#"statement_name="INSERT"} 7"#));
    }

    #[test]
    fn test_repeated_label_set_keeps_last_value() {
        let counter = MetricDescriptor::counter("dmdbms_test_total", "Test counter", &["k"]);
        let mut sink = SampleSink::new("test");
        sink.emit(&counter, ["a"], 5.0);
        sink.emit(&counter, ["a"], 9.0);

        let text = render(sink.samples()).unwrap();
        assert!(text.contains(r#"dmdbms_test_total{k="a"} 9"#));
        assert!(!text.contains(r#"dmdbms_test_total{k="a"} 14"#));
    }

    #[test]
    fn test_label_values_are_escaped() {
        let gauge = MetricDescriptor::gauge("dmdbms_test_info", "Test", &["txt"]);
        let mut sink = SampleSink::new("test");
        sink.emit(&gauge, ["say \"hi\""], 1.0);

        let text = render(sink.samples()).unwrap();
        assert!(text.contains(r#"txt="say \"hi\"""#));
    }

    #[test]
    fn test_nan_counter_does_not_abort_render() {
        let counter = MetricDescriptor::counter(
            "dmdbms_statement_type_total",
            "Executed statements by type",
            &["statement_name"],
        );
        let gauge = MetricDescriptor::gauge("dmdbms_dual_info", "DUAL reachable", &[]);

        let mut sink = SampleSink::new("test");
        sink.emit(&counter, ["select statements"], f64::NAN);
        sink.emit_unlabeled(&gauge, 1.0);
        let mut samples = sink.into_samples();
        samples.push(Sample {
            descriptor: Arc::clone(&counter),
            labels: vec!["insert statements".to_string()],
            value: f64::NAN,
        });

        let text = render(&samples).unwrap();
        assert!(text.contains("dmdbms_dual_info 1"));
        assert!(!text.contains("insert statements"));
        assert!(!text.contains("NaN"));
    }

    #[test]
    fn test_empty_render() {
        assert_eq!(render(&[]).unwrap(), "");
    }
}
