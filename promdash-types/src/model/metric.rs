//! Metrics as read from a metrics-exposition endpoint
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// The reserved label holding the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

new_type! {
    #[doc="The name of a metric, e.g. `http_requests_total`.\n"]
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct MetricName(String);
}

impl MetricName {
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.0.ends_with(suffix)
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

/// The type of a metric as declared by its `# TYPE` line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Summary,
    Untyped,
}

impl MetricType {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
            MetricType::Summary => "summary",
            MetricType::Untyped => "untyped",
        }
    }
}

impl Default for MetricType {
    fn default() -> Self {
        MetricType::Untyped
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "counter" => Ok(MetricType::Counter),
            "gauge" => Ok(MetricType::Gauge),
            "histogram" | "gaugehistogram" => Ok(MetricType::Histogram),
            "summary" => Ok(MetricType::Summary),
            // OpenMetrics calls untyped metrics "unknown"
            "untyped" | "unknown" | "info" | "stateset" => Ok(MetricType::Untyped),
            _ => Err(Error::new(format!("not a valid metric type: {}", s))),
        }
    }
}

/// One logical metric of an exposition payload.
///
/// The type, help and sample lines of a metric are collapsed into one
/// record. Only the label keys of the first sample are kept since panels
/// query templates, not instantiated series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSample {
    name: MetricName,
    help: String,
    metric_type: MetricType,
    label_keys: Vec<String>,
}

impl MetricSample {
    pub fn new<N: Into<MetricName>>(name: N, metric_type: MetricType) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            metric_type,
            label_keys: Vec::new(),
        }
    }

    pub fn with_help<T: Into<String>>(mut self, help: T) -> Self {
        self.help = help.into();
        self
    }

    /// Sets the label keys of the metric.
    ///
    /// The reserved `__name__` label is dropped.
    pub fn with_label_keys<I, T>(mut self, label_keys: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.label_keys = label_keys
            .into_iter()
            .map(Into::into)
            .filter(|k| k != METRIC_NAME_LABEL)
            .collect();
        self
    }

    pub fn name(&self) -> &MetricName {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn label_keys(&self) -> &[String] {
        &self.label_keys
    }

    pub fn has_labels(&self) -> bool {
        !self.label_keys.is_empty()
    }

    pub fn is(&self, metric_type: MetricType) -> bool {
        self.metric_type == metric_type
    }
}
