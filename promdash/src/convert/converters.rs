use crate::format::{point_format, range_format};
use crate::promdash_types::model::{
    format::FormatHint,
    metric::{MetricSample, MetricType},
    panel::{Graph, PanelDescription, Singlestat, ValueReducer},
};

use super::{escape_query, label_selectors, ConversionOptions, MetricConverter};

const DEFAULT_LEGEND: &str = "{{instance}}";

/// Counters are plotted with the configured change function applied.
pub struct CounterConverter;

impl MetricConverter for CounterConverter {
    fn name(&self) -> &'static str {
        "counter"
    }

    fn can_handle(&self, metric: &MetricSample) -> bool {
        metric.is(MetricType::Counter)
    }

    fn convert(&self, metric: &MetricSample, options: &ConversionOptions) -> Vec<PanelDescription> {
        let name = metric.name().as_str();
        let query = format!(
            "{}({}{}[{}])",
            options.counter_change_func,
            name,
            label_selectors(&options.selector_labels),
            options.time_range
        );

        let mut graph = graph_base(
            metric,
            options,
            format!(
                "{} {} over {}",
                name, options.counter_change_func, options.time_range
            ),
            range_format(name),
        );
        set_legend(&mut graph, legend_keys(metric, |_| true));
        graph.push_query(escape_query(&query));

        vec![graph.into()]
    }
}

/// A gauge without labels is shown as its current value.
pub struct GaugeConverter;

impl MetricConverter for GaugeConverter {
    fn name(&self) -> &'static str {
        "gauge"
    }

    fn can_handle(&self, metric: &MetricSample) -> bool {
        metric.is(MetricType::Gauge) && !metric.has_labels()
    }

    fn convert(&self, metric: &MetricSample, options: &ConversionOptions) -> Vec<PanelDescription> {
        let name = metric.name().as_str();
        let query = format!("{}{}", name, label_selectors(&options.selector_labels));

        vec![singlestat_base(metric, options, name, point_format(name), query).into()]
    }
}

/// Byte gauges are plotted as their per-second derivative.
pub struct GaugeDerivConverter;

impl MetricConverter for GaugeDerivConverter {
    fn name(&self) -> &'static str {
        "gauge_deriv"
    }

    fn can_handle(&self, metric: &MetricSample) -> bool {
        metric.is(MetricType::Gauge) && metric.name().has_suffix("_bytes")
    }

    fn convert(&self, metric: &MetricSample, options: &ConversionOptions) -> Vec<PanelDescription> {
        let name = metric.name().as_str();
        let query = format!(
            "deriv({}{}[{}])",
            name,
            label_selectors(&options.selector_labels),
            options.time_range
        );

        let mut graph = graph_base(
            metric,
            options,
            format!("{} deriv over {}", name, options.time_range),
            range_format(name),
        );
        set_legend(&mut graph, legend_keys(metric, |_| true));
        graph.push_query(escape_query(&query));

        vec![graph.into()]
    }
}

/// Gauges holding a unix timestamp.
///
/// Values in seconds are scaled to milliseconds.
pub struct GaugeTimestampConverter;

impl MetricConverter for GaugeTimestampConverter {
    fn name(&self) -> &'static str {
        "gauge_timestamp"
    }

    fn can_handle(&self, metric: &MetricSample) -> bool {
        metric.is(MetricType::Gauge)
            && (metric.name().has_suffix("_timestamp_seconds")
                || metric.name().has_suffix("_timestamp"))
            && !metric.has_labels()
    }

    fn convert(&self, metric: &MetricSample, options: &ConversionOptions) -> Vec<PanelDescription> {
        let name = metric.name().as_str();
        let query = timestamp_query(metric, options);

        vec![singlestat_base(metric, options, name, point_format(name), query).into()]
    }
}

/// Info metrics like `go_info` carry their payload in labels.
///
/// One singlestat per label key shows the label's value.
pub struct GaugeInfoConverter;

impl MetricConverter for GaugeInfoConverter {
    fn name(&self) -> &'static str {
        "gauge_info"
    }

    fn can_handle(&self, metric: &MetricSample) -> bool {
        metric.is(MetricType::Gauge) && metric.name().has_suffix("_info")
    }

    fn convert(&self, metric: &MetricSample, options: &ConversionOptions) -> Vec<PanelDescription> {
        let name = metric.name().as_str();
        let query = format!("{}{}", name, label_selectors(&options.selector_labels));

        metric
            .label_keys()
            .iter()
            .map(|key| {
                let mut singlestat = singlestat_base(
                    metric,
                    options,
                    &format!("{} - {}", name, key),
                    FormatHint::Short,
                    query.clone(),
                );
                singlestat.legend = format!("{{{{{}}}}}", key);
                singlestat.value_reducer = ValueReducer::Name;
                singlestat.into()
            })
            .collect()
    }
}

pub struct GaugeWithLabelsConverter;

impl MetricConverter for GaugeWithLabelsConverter {
    fn name(&self) -> &'static str {
        "gauge_with_labels"
    }

    fn can_handle(&self, metric: &MetricSample) -> bool {
        metric.is(MetricType::Gauge) && metric.has_labels()
    }

    fn convert(&self, metric: &MetricSample, options: &ConversionOptions) -> Vec<PanelDescription> {
        let name = metric.name().as_str();

        let mut graph = graph_base(metric, options, name.to_string(), point_format(name));
        graph.legend = legend_keys(metric, |_| true).join(" ");
        graph.has_legend = true;
        graph.push_query(timestamp_query(metric, options));

        vec![graph.into()]
    }
}

/// Histograms get an average and three quantile graphs.
pub struct HistogramConverter;

const QUANTILES: &[(&str, &str)] = &[("p50", "0.5"), ("p90", "0.9"), ("p99", "0.99")];

impl MetricConverter for HistogramConverter {
    fn name(&self) -> &'static str {
        "histogram"
    }

    fn can_handle(&self, metric: &MetricSample) -> bool {
        metric.is(MetricType::Histogram)
    }

    fn convert(&self, metric: &MetricSample, options: &ConversionOptions) -> Vec<PanelDescription> {
        let name = metric.name().as_str();
        let selectors = label_selectors(&options.selector_labels);
        let legend = legend_keys(metric, |key| key != "le");

        let mut panels = Vec::with_capacity(QUANTILES.len() + 1);

        let mut avg = graph_base(metric, options, format!("{} avg", name), point_format(name));
        set_legend(&mut avg, legend.clone());
        avg.push_query(escape_query(&format!(
            "{}_sum{} / {}_count{}",
            name, selectors, name, selectors
        )));
        panels.push(avg.into());

        for (suffix, quantile) in QUANTILES {
            let mut graph = graph_base(
                metric,
                options,
                format!("{} {}", name, suffix),
                point_format(name),
            );
            set_legend(&mut graph, legend.clone());
            graph.push_query(escape_query(&format!(
                "histogram_quantile({}, rate({}_bucket{}[{}]))",
                quantile, name, selectors, options.time_range
            )));
            panels.push(graph.into());
        }

        panels
    }
}

fn graph_base(
    metric: &MetricSample,
    options: &ConversionOptions,
    title: String,
    format: FormatHint,
) -> Graph {
    let mut graph = Graph::new(title);
    graph.description = metric.help().to_string();
    graph.datasource = options.datasource.clone();
    graph.format = format;
    graph
}

fn singlestat_base(
    metric: &MetricSample,
    options: &ConversionOptions,
    title: &str,
    format: FormatHint,
    query: String,
) -> Singlestat {
    let mut singlestat = Singlestat::new(title, escape_query(&query));
    singlestat.description = metric.help().to_string();
    singlestat.datasource = options.datasource.clone();
    singlestat.format = format;
    singlestat.value_reducer = ValueReducer::Current;
    singlestat
}

/// `{{key}}` for every label key accepted by `keep`
fn legend_keys<F>(metric: &MetricSample, keep: F) -> Vec<String>
where
    F: Fn(&str) -> bool,
{
    metric
        .label_keys()
        .iter()
        .filter(|key| keep(key.as_str()))
        .map(|key| format!("{{{{{}}}}}", key))
        .collect()
}

/// Falls back to a hidden `{{instance}}` legend when there are no label keys.
fn set_legend(graph: &mut Graph, legend: Vec<String>) {
    if legend.is_empty() {
        graph.legend = DEFAULT_LEGEND.to_string();
        graph.has_legend = false;
    } else {
        graph.legend = legend.join(" ");
        graph.has_legend = true;
    }
}

fn timestamp_query(metric: &MetricSample, options: &ConversionOptions) -> String {
    let mut query = format!(
        "{}{}",
        metric.name(),
        label_selectors(&options.selector_labels)
    );
    if metric.name().has_suffix("_timestamp_seconds") {
        query.push_str(" * 1000");
    }
    escape_query(&query)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::promdash_types::model::panel::GraphQuery;

    fn options() -> ConversionOptions {
        ConversionOptions {
            datasource: "prometheus".to_string(),
            ..ConversionOptions::default()
        }
    }

    fn as_graph(panel: &PanelDescription) -> &Graph {
        match panel {
            PanelDescription::Graph(graph) => graph,
            other => panic!("expected a graph but got {:?}", other),
        }
    }

    fn as_singlestat(panel: &PanelDescription) -> &Singlestat {
        match panel {
            PanelDescription::Singlestat(singlestat) => singlestat,
            other => panic!("expected a singlestat but got {:?}", other),
        }
    }

    #[test]
    fn counter_with_labels() {
        let metric = MetricSample::new("http_requests_total", MetricType::Counter)
            .with_help("Total requests")
            .with_label_keys(vec!["method"]);

        let panels = CounterConverter.convert(&metric, &options());
        assert_eq!(panels.len(), 1);

        let graph = as_graph(&panels[0]);
        assert_eq!(graph.title, "http_requests_total rate over 5m");
        assert_eq!(
            graph.queries,
            vec![GraphQuery {
                query: "rate(http_requests_total[5m])".to_string(),
                has_more: false,
            }]
        );
        assert_eq!(graph.legend, "{{method}}");
        assert!(graph.has_legend);
        assert_eq!(graph.format, FormatHint::RequestsPerSecond);
        assert_eq!(graph.description, "Total requests");
        assert_eq!(graph.datasource, "prometheus");
        assert_eq!(graph.grid_pos, None);
    }

    #[test]
    fn counter_without_labels_hides_legend() {
        let metric = MetricSample::new("errors_total", MetricType::Counter);
        let options = ConversionOptions {
            counter_change_func: "increase".to_string(),
            time_range: "1h".to_string(),
            ..ConversionOptions::default()
        };

        let panels = CounterConverter.convert(&metric, &options);
        let graph = as_graph(&panels[0]);
        assert_eq!(graph.title, "errors_total increase over 1h");
        assert_eq!(graph.queries[0].query, "increase(errors_total[1h])");
        assert_eq!(graph.legend, "{{instance}}");
        assert!(!graph.has_legend);
    }

    #[test]
    fn selectors_are_escaped() {
        let metric = MetricSample::new("http_requests_total", MetricType::Counter);
        let options = ConversionOptions {
            selector_labels: vec!["job".to_string()],
            ..ConversionOptions::default()
        };

        let panels = CounterConverter.convert(&metric, &options);
        assert_eq!(
            as_graph(&panels[0]).queries[0].query,
            "rate(http_requests_total{job=\\\"$job\\\"}[5m])"
        );
    }

    #[test]
    fn gauge() {
        let metric = MetricSample::new("process_open_fds", MetricType::Gauge);
        let panels = GaugeConverter.convert(&metric, &options());

        let singlestat = as_singlestat(&panels[0]);
        assert_eq!(singlestat.title, "process_open_fds");
        assert_eq!(singlestat.query, "process_open_fds");
        assert_eq!(singlestat.value_reducer, ValueReducer::Current);
        assert_eq!(singlestat.format, FormatHint::Short);
        assert_eq!(singlestat.threshold, None);
    }

    #[test]
    fn gauge_deriv() {
        let metric = MetricSample::new("go_memstats_heap_alloc_bytes", MetricType::Gauge);
        let panels = GaugeDerivConverter.convert(&metric, &options());

        let graph = as_graph(&panels[0]);
        assert_eq!(graph.title, "go_memstats_heap_alloc_bytes deriv over 5m");
        assert_eq!(
            graph.queries[0].query,
            "deriv(go_memstats_heap_alloc_bytes[5m])"
        );
        assert_eq!(graph.format, FormatHint::BytesPerSecond);
        assert!(!graph.has_legend);
    }

    #[test]
    fn timestamp_seconds_are_scaled() {
        let metric = MetricSample::new("process_start_timestamp_seconds", MetricType::Gauge);
        let panels = GaugeTimestampConverter.convert(&metric, &options());
        let singlestat = as_singlestat(&panels[0]);
        assert!(singlestat.query.ends_with(" * 1000"));
        assert_eq!(singlestat.format, FormatHint::DateTimeAsIso);

        let metric = MetricSample::new("last_reload_timestamp", MetricType::Gauge);
        let panels = GaugeTimestampConverter.convert(&metric, &options());
        assert_eq!(as_singlestat(&panels[0]).query, "last_reload_timestamp");
    }

    #[test]
    fn timestamp_with_labels_is_not_handled() {
        let metric = MetricSample::new("job_last_run_timestamp", MetricType::Gauge)
            .with_label_keys(vec!["job"]);
        assert!(!GaugeTimestampConverter.can_handle(&metric));
        assert!(GaugeWithLabelsConverter.can_handle(&metric));
    }

    #[test]
    fn gauge_info() {
        let metric = MetricSample::new("build_info", MetricType::Gauge)
            .with_label_keys(vec!["version", "revision"]);

        let panels = GaugeInfoConverter.convert(&metric, &options());
        assert_eq!(panels.len(), 2);

        let version = as_singlestat(&panels[0]);
        assert_eq!(version.title, "build_info - version");
        assert_eq!(version.legend, "{{version}}");
        assert_eq!(version.value_reducer, ValueReducer::Name);
        assert_eq!(version.format, FormatHint::Short);
        assert_eq!(version.query, "build_info");

        let revision = as_singlestat(&panels[1]);
        assert_eq!(revision.title, "build_info - revision");
        assert_eq!(revision.legend, "{{revision}}");
    }

    #[test]
    fn gauge_info_without_labels_yields_nothing() {
        let metric = MetricSample::new("go_info", MetricType::Gauge);
        assert!(GaugeInfoConverter.convert(&metric, &options()).is_empty());
    }

    #[test]
    fn gauge_with_labels() {
        let metric = MetricSample::new("node_boot_timestamp_seconds", MetricType::Gauge)
            .with_label_keys(vec!["instance", "job"]);

        let panels = GaugeWithLabelsConverter.convert(&metric, &options());
        let graph = as_graph(&panels[0]);
        assert_eq!(graph.title, "node_boot_timestamp_seconds");
        assert_eq!(graph.queries[0].query, "node_boot_timestamp_seconds * 1000");
        assert_eq!(graph.legend, "{{instance}} {{job}}");
        assert!(graph.has_legend);
        assert_eq!(graph.format, FormatHint::DateTimeAsIso);
    }

    #[test]
    fn histogram() {
        let metric = MetricSample::new("http_request_duration_seconds", MetricType::Histogram)
            .with_label_keys(vec!["handler", "le"]);

        let panels = HistogramConverter.convert(&metric, &options());
        let graphs = panels.iter().map(as_graph).collect::<Vec<_>>();

        assert_eq!(
            graphs.iter().map(|g| g.title.as_str()).collect::<Vec<_>>(),
            vec![
                "http_request_duration_seconds avg",
                "http_request_duration_seconds p50",
                "http_request_duration_seconds p90",
                "http_request_duration_seconds p99",
            ]
        );
        assert_eq!(
            graphs[0].queries[0].query,
            "http_request_duration_seconds_sum / http_request_duration_seconds_count"
        );
        assert_eq!(
            graphs[3].queries[0].query,
            "histogram_quantile(0.99, rate(http_request_duration_seconds_bucket[5m]))"
        );
        assert!(graphs.iter().all(|g| g.legend == "{{handler}}" && g.has_legend));
        assert!(graphs.iter().all(|g| g.format == FormatHint::Seconds));
    }
}
