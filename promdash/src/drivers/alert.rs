use std::sync::Arc;

use regex::Regex;

use crate::alert::{analyze, AlertSettings};
use crate::api::{DashboardsApi, RulesApi};
use crate::config::Config;
use crate::layout::{layout, LayoutConfig};
use crate::logging::{Logger, LoggingAdapter, Logs};
use crate::promdash_types::model::{
    alert::AlertGroup,
    dashboard::{Dashboard, DashboardTitle},
};
use crate::render::render;

use super::{fetch_failed, publish_failed, RunError, RunReport};

/// Compiles the patterns selecting alert groups.
pub fn compile_filters<I, T>(patterns: I) -> Result<Vec<Regex>, RunError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|p| Regex::new(p.as_ref()).map_err(RunError::from))
        .collect()
}

/// Publishes one dashboard per alert group
pub struct AlertDriver {
    rules: Arc<dyn RulesApi + Send + Sync>,
    dashboards: Arc<dyn DashboardsApi + Send + Sync>,
    settings: AlertSettings,
    layout: LayoutConfig,
    folder: Option<String>,
    logger: Logger,
}

impl AlertDriver {
    pub fn new<R, D>(
        rules: R,
        dashboards: D,
        config: &Config,
        logging_adapter: Arc<dyn LoggingAdapter>,
    ) -> Self
    where
        R: RulesApi + Send + Sync + 'static,
        D: DashboardsApi + Send + Sync + 'static,
    {
        Self {
            rules: Arc::new(rules),
            dashboards: Arc::new(dashboards),
            settings: config.alert_settings.clone(),
            layout: config.layout,
            folder: config.grafana_folder.clone(),
            logger: Logger::new(logging_adapter),
        }
    }

    /// Publishes a dashboard for every alert group matching one of `filters`.
    ///
    /// Without filters nothing is published.
    pub async fn run(&self, filters: &[Regex]) -> Result<RunReport, RunError> {
        let groups = self
            .rules
            .rules()
            .await
            .map_err(|err| fetch_failed("could not read alerting rules".to_string(), err))?;

        let mut report = RunReport::default();

        for group in groups {
            if !is_selected(group.name.as_str(), filters) {
                self.logger
                    .debug(format_args!("alert group '{}' is not selected", group.name));
                continue;
            }

            let (dashboard, skipped) = self.build_dashboard(&group);
            report.skipped += skipped;

            let logger = self.logger.with_dashboard(dashboard.title.clone());
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
            report.published.push(dashboard.title.into_inner());
        }

        Ok(report)
    }

    /// Converts the alerts of a group into a laid out dashboard.
    ///
    /// Alerts with unusable queries are skipped. Returns the number of
    /// skipped alerts along with the dashboard.
    pub fn build_dashboard(&self, group: &AlertGroup) -> (Dashboard, usize) {
        let logger = self.logger.with_alert_group(group.name.clone());

        let mut panels = Vec::with_capacity(group.alerts.len());
        let mut skipped = 0;
        for alert in &group.alerts {
            match analyze(alert, &self.settings) {
                Ok(panel) => panels.push(panel),
                Err(err) => {
                    skipped += 1;
                    logger
                        .with_alert(alert.name.as_str())
                        .warn(format_args!("skipping alert: {}", err));
                }
            }
        }

        layout(&mut panels, &self.layout);

        let title = DashboardTitle::new(group.name.as_str());
        (Dashboard::new(title, panels), skipped)
    }
}

fn is_selected(group_name: &str, filters: &[Regex]) -> bool {
    filters.iter().any(|filter| filter.is_match(group_name))
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use futures::{future, FutureExt};
    use serde_json::Value;

    use super::*;
    use crate::api::{ApiError, ApiFuture};
    use crate::logging::DevNullLogger;
    use crate::promdash_types::model::alert::AlertRecord;

    struct FakeRules(Vec<AlertGroup>);

    impl RulesApi for FakeRules {
        fn rules(&self) -> ApiFuture<Vec<AlertGroup>> {
            future::ready(Ok(self.0.clone())).boxed()
        }
    }

    #[derive(Clone, Default)]
    struct FakeDashboards {
        published: Arc<Mutex<Vec<(Value, Option<String>)>>>,
        fail: bool,
    }

    impl DashboardsApi for FakeDashboards {
        fn create_dashboard(&self, dashboard: &Value, folder: Option<&str>) -> ApiFuture<()> {
            if self.fail {
                return future::ready(Err(ApiError::other().with_context("grafana is down"))).boxed();
            }
            self.published
                .lock()
                .unwrap()
                .push((dashboard.clone(), folder.map(str::to_string)));
            future::ready(Ok(())).boxed()
        }
    }

    fn groups() -> Vec<AlertGroup> {
        vec![
            AlertGroup {
                name: "node".into(),
                alerts: vec![
                    AlertRecord::new("InstanceDown", "up == 0"),
                    AlertRecord::new("Broken", "sum(up"),
                    AlertRecord::new("TooFew", "sum(up) < 3"),
                ],
            },
            AlertGroup {
                name: "kafka".into(),
                alerts: vec![AlertRecord::new("Lag", "kafka_lag > 100")],
            },
        ]
    }

    fn driver(dashboards: FakeDashboards) -> AlertDriver {
        let config = Config::builder().grafana_folder("Alerts").finish().unwrap();
        AlertDriver::new(FakeRules(groups()), dashboards, &config, Arc::new(DevNullLogger))
    }

    #[tokio::test]
    async fn publishes_selected_groups() {
        let dashboards = FakeDashboards::default();
        let driver = driver(dashboards.clone());
        let filters = compile_filters(vec!["^no"]).unwrap();

        let report = driver.run(&filters).await.unwrap();

        assert_eq!(report.published, vec!["node".to_string()]);
        assert_eq!(report.skipped, 1);

        let published = dashboards.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        let (model, folder) = &published[0];
        assert_eq!(folder.as_deref(), Some("Alerts"));
        assert_eq!(model["title"], "node");
        assert_eq!(model["panels"].as_array().unwrap().len(), 2);
        assert_eq!(model["panels"][0]["type"], "graph");
        assert_eq!(model["panels"][1]["type"], "singlestat");
        assert_eq!(model["panels"][1]["gridPos"]["x"], 12);
        assert_eq!(model["templating"]["list"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn no_filters_select_nothing() {
        let dashboards = FakeDashboards::default();
        let driver = driver(dashboards.clone());

        let report = driver.run(&[]).await.unwrap();

        assert!(report.published.is_empty());
        assert!(dashboards.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_aborts_the_run() {
        let driver = driver(FakeDashboards {
            fail: true,
            ..FakeDashboards::default()
        });
        let filters = compile_filters(vec![".*"]).unwrap();

        let err = driver.run(&filters).await.unwrap_err();

        assert!(err.is_publish());
    }

    #[test]
    fn invalid_filter_is_a_config_error() {
        assert!(compile_filters(vec!["(unclosed"]).unwrap_err().is_config());
    }
}
