//! Turning metric samples into panel descriptions
//!
//! Each `MetricConverter` recognizes one shape of metric. The `Registry`
//! asks its converters in a fixed priority order and the first one that
//! can handle a metric produces the panels for it.
use std::fmt;

use crate::promdash_types::model::{metric::MetricSample, panel::PanelDescription};

pub use self::converters::*;

mod converters;

/// Read-only settings passed to every converter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    /// The function applied to counters, usually `rate` or `increase`
    pub counter_change_func: String,
    pub datasource: String,
    /// Labels which become selectors bound to dashboard variables
    pub selector_labels: Vec<String>,
    /// A PromQL duration like `5m`
    pub time_range: String,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            counter_change_func: "rate".to_string(),
            datasource: String::new(),
            selector_labels: Vec::new(),
            time_range: "5m".to_string(),
        }
    }
}

/// Recognizes one shape of metric and converts it into panels
pub trait MetricConverter: Send + Sync + 'static {
    /// A short name used in diagnostics
    fn name(&self) -> &'static str;
    fn can_handle(&self, metric: &MetricSample) -> bool;
    fn convert(&self, metric: &MetricSample, options: &ConversionOptions) -> Vec<PanelDescription>;
}

/// An ordered list of converters where the first match wins
pub struct Registry {
    converters: Vec<Box<dyn MetricConverter>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self {
            converters: Vec::new(),
        }
    }

    /// Appends a converter with the lowest priority so far.
    pub fn register<C: MetricConverter>(mut self, converter: C) -> Self {
        self.converters.push(Box::new(converter));
        self
    }

    /// The converter responsible for `metric`, if any
    pub fn find(&self, metric: &MetricSample) -> Option<&dyn MetricConverter> {
        self.converters
            .iter()
            .find(|c| c.can_handle(metric))
            .map(|c| &**c)
    }

    /// Converts `metric` with the first matching converter.
    ///
    /// Returns `None` if no converter recognizes the metric.
    pub fn convert(
        &self,
        metric: &MetricSample,
        options: &ConversionOptions,
    ) -> Option<Vec<PanelDescription>> {
        self.find(metric).map(|c| c.convert(metric, options))
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl Default for Registry {
    /// Histogram, GaugeInfo, GaugeDeriv, GaugeTimestamp, GaugeWithLabels,
    /// Gauge and Counter in this order
    fn default() -> Self {
        Registry::empty()
            .register(HistogramConverter)
            .register(GaugeInfoConverter)
            .register(GaugeDerivConverter)
            .register(GaugeTimestampConverter)
            .register(GaugeWithLabelsConverter)
            .register(GaugeConverter)
            .register(CounterConverter)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.converters.iter().map(|c| c.name()))
            .finish()
    }
}

/// Builds `{l1="$l1",l2="$l2"}` or an empty string if there are no labels.
pub fn label_selectors(labels: &[String]) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let selectors = labels
        .iter()
        .map(|l| format!("{}=\"${}\"", l, l))
        .collect::<Vec<_>>()
        .join(",");

    format!("{{{}}}", selectors)
}

/// Escapes `"` as `\"` so that a query can be embedded into a template.
pub fn escape_query(query: &str) -> String {
    query.replace('"', "\\\"")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::promdash_types::model::metric::MetricType;

    #[test]
    fn selectors() {
        assert_eq!(label_selectors(&[]), "");
        assert_eq!(
            label_selectors(&["job".to_string(), "instance".to_string()]),
            "{job=\"$job\",instance=\"$instance\"}"
        );
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_query("up{job=\"a\"}"), "up{job=\\\"a\\\"}");
        assert_eq!(escape_query("up"), "up");
    }

    #[test]
    fn default_registry_priority() {
        let registry = Registry::default();
        assert_eq!(
            format!("{:?}", registry),
            "[\"histogram\", \"gauge_info\", \"gauge_deriv\", \"gauge_timestamp\", \
             \"gauge_with_labels\", \"gauge\", \"counter\"]"
        );
    }

    #[test]
    fn first_match_wins() {
        let registry = Registry::default();

        // matches GaugeInfo and GaugeWithLabels
        let metric = MetricSample::new("build_info", MetricType::Gauge)
            .with_label_keys(vec!["version".to_string()]);
        assert_eq!(registry.find(&metric).map(|c| c.name()), Some("gauge_info"));

        // matches GaugeDeriv and Gauge
        let metric = MetricSample::new("heap_bytes", MetricType::Gauge);
        assert_eq!(registry.find(&metric).map(|c| c.name()), Some("gauge_deriv"));

        // matches GaugeTimestamp and Gauge
        let metric = MetricSample::new("last_run_timestamp", MetricType::Gauge);
        assert_eq!(
            registry.find(&metric).map(|c| c.name()),
            Some("gauge_timestamp")
        );
    }

    #[test]
    fn unrecognized_metric_is_dropped() {
        let registry = Registry::default();
        let metric = MetricSample::new("rpc_latency", MetricType::Summary);
        assert!(registry
            .convert(&metric, &ConversionOptions::default())
            .is_none());
    }

    #[test]
    fn registration_order_decides() {
        let registry = Registry::empty()
            .register(GaugeConverter)
            .register(GaugeDerivConverter);
        let metric = MetricSample::new("heap_bytes", MetricType::Gauge);
        assert_eq!(registry.find(&metric).map(|c| c.name()), Some("gauge"));
    }
}
