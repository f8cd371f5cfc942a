use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::api::{DashboardsApi, MetricsApi};
use crate::config::Config;
use crate::convert::{ConversionOptions, Registry};
use crate::exposition::parse_exposition;
use crate::layout::{layout, LayoutConfig};
use crate::logging::{Logger, LoggingAdapter, Logs};
use crate::promdash_types::model::{
    dashboard::{Dashboard, DashboardTitle},
    metric::MetricSample,
    panel::{PanelDescription, RowHeader},
};
use crate::render::render;

use super::{fetch_failed, publish_failed, RunError, RunReport};

/// Parameters of a single drilldown run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrilldownParams {
    /// Only metrics starting with this prefix are converted
    pub prefix: String,
    /// Number of leading name segments forming a row; 0 disables rows
    pub group_level: usize,
    pub options: ConversionOptions,
}

impl DrilldownParams {
    /// Parameters taking their conversion defaults from `config`
    pub fn from_config(config: &Config) -> Self {
        Self {
            prefix: String::new(),
            group_level: 0,
            options: ConversionOptions {
                counter_change_func: config.counter_change_func.clone(),
                datasource: config.datasource.as_str().to_string(),
                selector_labels: Vec::new(),
                time_range: config.time_range.clone(),
            },
        }
    }
}

/// Returns the first `level` `_`-separated segments of `metric_name`.
///
/// A level of 0 means no grouping.
pub fn group_key(metric_name: &str, level: usize) -> Option<String> {
    if level == 0 {
        return None;
    }

    let key: Vec<&str> = metric_name.split('_').take(level).collect();
    Some(key.join("_"))
}

/// Publishes a dashboard for the metrics of one endpoint
pub struct DrilldownDriver {
    metrics: Arc<dyn MetricsApi + Send + Sync>,
    dashboards: Arc<dyn DashboardsApi + Send + Sync>,
    registry: Registry,
    layout: LayoutConfig,
    folder: Option<String>,
    fetch_timeout: Duration,
    logger: Logger,
}

impl DrilldownDriver {
    pub fn new<M, D>(
        metrics: M,
        dashboards: D,
        config: &Config,
        logging_adapter: Arc<dyn LoggingAdapter>,
    ) -> Self
    where
        M: MetricsApi + Send + Sync + 'static,
        D: DashboardsApi + Send + Sync + 'static,
    {
        Self {
            metrics: Arc::new(metrics),
            dashboards: Arc::new(dashboards),
            registry: Registry::default(),
            layout: config.layout,
            folder: config.grafana_folder.clone(),
            fetch_timeout: config.metrics_fetch_timeout,
            logger: Logger::new(logging_adapter),
        }
    }

    /// Replaces the default converters.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub async fn run(
        &self,
        title: DashboardTitle,
        endpoint: &Url,
        params: &DrilldownParams,
    ) -> Result<RunReport, RunError> {
        let logger = self.logger.with_dashboard(title.clone());

        let payload = self
            .metrics
            .fetch_metrics(endpoint, self.fetch_timeout)
            .await
            .map_err(|err| fetch_failed(format!("could not read metrics from {}", endpoint), err))?;

        let samples = parse_exposition(&payload.body, &payload.content_type, &params.prefix)?;
        logger.debug(format_args!(
            "read {} metrics with prefix '{}' from {}",
            samples.len(),
            params.prefix,
            endpoint
        ));

        let (dashboard, skipped) = self.build_dashboard(title, &samples, params);

        let model = render(&dashboard);
        self.dashboards
            .create_dashboard(&model, self.folder.as_deref())
            .await
            .map_err(|err| {
                publish_failed(
                    format!("could not publish dashboard '{}'", dashboard.title),
                    err,
                )
            })?;
        logger.info(format_args!(
            "published dashboard with {} panels",
            dashboard.panels.len()
        ));

        Ok(RunReport {
            published: vec![dashboard.title.into_inner()],
            skipped,
        })
    }

    /// Converts, groups and lays out `samples`.
    ///
    /// Returns the number of metrics no converter recognized along with
    /// the dashboard.
    pub fn build_dashboard(
        &self,
        title: DashboardTitle,
        samples: &[MetricSample],
        params: &DrilldownParams,
    ) -> (Dashboard, usize) {
        let logger = self.logger.with_dashboard(title.clone());

        let mut panels: Vec<PanelDescription> = Vec::new();
        let mut skipped = 0;
        let mut current_group: Option<String> = None;

        for sample in samples {
            let converted = match self.registry.convert(sample, &params.options) {
                Some(converted) => converted,
                None => {
                    skipped += 1;
                    logger.with_metric(sample.name().clone()).debug(format_args!(
                        "no converter found for metric of type {}",
                        sample.metric_type()
                    ));
                    continue;
                }
            };

            if converted.is_empty() {
                continue;
            }

            if let Some(key) = group_key(sample.name().as_str(), params.group_level) {
                if current_group.as_deref() != Some(key.as_str()) {
                    panels.push(RowHeader::new(key.as_str()).into());
                    current_group = Some(key);
                }
            }

            panels.extend(converted);
        }

        layout(&mut panels, &self.layout);

        let mut dashboard = Dashboard::new(title, panels);
        dashboard.derive_variables(
            params.options.selector_labels.iter().cloned(),
            &params.options.datasource,
        );

        (dashboard, skipped)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use futures::{future, FutureExt};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    use super::*;
    use crate::api::{ApiError, ApiFuture, MetricsPayload};
    use crate::logging::DevNullLogger;
    use crate::promdash_types::model::metric::MetricType;

    const PAYLOAD: &str = "\
# HELP http_requests_total Requests.
# TYPE http_requests_total counter
http_requests_total{method=\"get\"} 3
# TYPE http_request_duration_seconds histogram
http_request_duration_seconds_bucket{le=\"+Inf\"} 3
# TYPE process_start_time_seconds gauge
process_start_time_seconds 1.6e+09
# TYPE process_weird summary
process_weird{quantile=\"0.5\"} 1
";

    struct FakeMetrics(Option<MetricsPayload>);

    impl MetricsApi for FakeMetrics {
        fn fetch_metrics(&self, _endpoint: &Url, _timeout: Duration) -> ApiFuture<MetricsPayload> {
            let result = self
                .0
                .clone()
                .ok_or_else(|| ApiError::io().with_context("connection refused"));
            future::ready(result).boxed()
        }
    }

    #[derive(Clone, Default)]
    struct FakeDashboards(Arc<Mutex<Vec<Value>>>);

    impl DashboardsApi for FakeDashboards {
        fn create_dashboard(&self, dashboard: &Value, _folder: Option<&str>) -> ApiFuture<()> {
            self.0.lock().unwrap().push(dashboard.clone());
            future::ready(Ok(())).boxed()
        }
    }

    fn config() -> Config {
        Config::builder().datasource("prom").finish().unwrap()
    }

    fn driver(payload: Option<&str>, dashboards: FakeDashboards) -> DrilldownDriver {
        let metrics = FakeMetrics(payload.map(|body| MetricsPayload {
            body: body.to_string(),
            content_type: "text/plain; version=0.0.4".to_string(),
        }));
        DrilldownDriver::new(metrics, dashboards, &config(), Arc::new(DevNullLogger))
    }

    fn titles(dashboard: &Dashboard) -> Vec<&str> {
        dashboard.panels.iter().map(PanelDescription::title).collect()
    }

    #[test]
    fn group_keys() {
        assert_eq!(group_key("http_requests_total", 0), None);
        assert_eq!(group_key("http_requests_total", 1), Some("http".to_string()));
        assert_eq!(group_key("http_requests_total", 2), Some("http_requests".to_string()));
        assert_eq!(group_key("up", 3), Some("up".to_string()));
    }

    #[test]
    fn rows_are_inserted_when_the_group_changes() {
        let driver = driver(None, FakeDashboards::default());
        let samples = vec![
            MetricSample::new("http_requests_total", MetricType::Counter),
            MetricSample::new("http_errors_total", MetricType::Counter),
            MetricSample::new("process_open_fds", MetricType::Gauge),
            MetricSample::new("process_weird", MetricType::Summary),
        ];
        let mut params = DrilldownParams::from_config(&config());
        params.group_level = 1;

        let (dashboard, skipped) = driver.build_dashboard("app".into(), &samples, &params);

        assert_eq!(
            titles(&dashboard),
            vec![
                "http",
                "http_requests_total rate over 5m",
                "http_errors_total rate over 5m",
                "process",
                "process_open_fds",
            ]
        );
        assert_eq!(skipped, 1);
        assert!(dashboard.panels[0].is_row_header());
        assert_eq!(dashboard.panels[3].grid_pos().map(|p| p.y), Some(6));
    }

    #[test]
    fn variables_come_from_the_first_query() {
        let driver = driver(None, FakeDashboards::default());
        let samples = vec![MetricSample::new("http_requests_total", MetricType::Counter)
            .with_label_keys(vec!["job", "method"])];
        let mut params = DrilldownParams::from_config(&config());
        params.options.selector_labels = vec!["job".to_string()];

        let (dashboard, _) = driver.build_dashboard("app".into(), &samples, &params);

        assert_eq!(dashboard.variables.len(), 1);
        assert_eq!(dashboard.variables[0].name, "job");
        assert_eq!(dashboard.variables[0].datasource, "prom");
        assert_eq!(
            dashboard.variables[0].query,
            "label_values(rate(http_requests_total{job=\\\"$job\\\"}[5m]), job)"
        );
    }

    #[tokio::test]
    async fn publishes_the_dashboard() {
        let dashboards = FakeDashboards::default();
        let driver = driver(Some(PAYLOAD), dashboards.clone());
        let endpoint: Url = "http://app:8080/metrics".parse().unwrap();
        let mut params = DrilldownParams::from_config(&config());
        params.prefix = "http_".to_string();

        let report = driver.run("app".into(), &endpoint, &params).await.unwrap();

        assert_eq!(report.published, vec!["app".to_string()]);
        assert_eq!(report.skipped, 0);

        let published = dashboards.0.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0]["title"], "app");
        let panels = published[0]["panels"].as_array().unwrap();
        assert_eq!(panels[0]["title"], "http_requests_total rate over 5m");
        assert_eq!(panels[0]["datasource"], "prom");
    }

    #[tokio::test]
    async fn fetch_failure_is_reported() {
        let driver = driver(None, FakeDashboards::default());
        let endpoint: Url = "http://app:8080/metrics".parse().unwrap();
        let params = DrilldownParams::from_config(&config());

        let err = driver.run("app".into(), &endpoint, &params).await.unwrap_err();

        assert!(err.is_fetch());
    }

    #[tokio::test]
    async fn malformed_metrics_are_a_parse_error() {
        let driver = driver(Some("# TYPE up gauge\nup{job=\"x} 1\n"), FakeDashboards::default());
        let endpoint: Url = "http://app:8080/metrics".parse().unwrap();
        let params = DrilldownParams::from_config(&config());

        let err = driver.run("app".into(), &endpoint, &params).await.unwrap_err();

        assert!(err.is_parse());
    }
}
