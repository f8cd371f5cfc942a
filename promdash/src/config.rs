//! Configuration of the drivers
//!
//! Every value can be set in code, read from a TOML file or taken from
//! the environment. Environment variables are prefixed with `PROMDASH_`
//! unless a custom prefix is given.
use std::fmt;
use std::path::Path;
use std::time::Duration;

use promdash_types::new_type;
use serde::{Deserialize, Serialize};

use crate::alert::{AlertSettings, DEFAULT_ANNOTATION_PREFIX};
use crate::api::BasicAuth;
use crate::layout::LayoutConfig;
use crate::promdash_types::model::dashboard::Datasource;
use crate::promdash_types::BaseUrl;
use crate::promql::PromDuration;
use crate::Error;

new_type! {
    #[doc="The base URL of Grafana.\n\nDefault is `http://localhost:3000`.\n"]
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct GrafanaAddress(String, env="GRAFANA_ADDRESS");
}
impl Default for GrafanaAddress {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}

new_type! {
    #[doc="The user for basic authentication with Grafana.\n"]
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct GrafanaUsername(String, env="GRAFANA_USERNAME");
}

new_type! {
    #[doc="The password for basic authentication with Grafana.\n"]
    #[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct GrafanaPassword(String, env="GRAFANA_PASSWORD");
}

impl fmt::Debug for GrafanaPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GrafanaPassword(<secret>)")
    }
}

new_type! {
    #[doc="The title of the Grafana folder dashboards are published to.\n\n\
    If not set dashboards go into the general folder.\n"]
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct GrafanaFolder(String, env="GRAFANA_FOLDER");
}

new_type! {
    #[doc="The height of graphs and singlestats in grid units.\n\nDefault is 5.\n"]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub copy struct PanelHeight(u32, env="PANEL_HEIGHT");
}
impl Default for PanelHeight {
    fn default() -> Self {
        Self(5)
    }
}

new_type! {
    #[doc="The width of a graph in grid units.\n\nDefault is 12.\n"]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub copy struct GraphWidth(u32, env="GRAPH_WIDTH");
}
impl Default for GraphWidth {
    fn default() -> Self {
        Self(12)
    }
}

new_type! {
    #[doc="The width of a singlestat in grid units.\n\nDefault is 6.\n"]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub copy struct SinglestatWidth(u32, env="SINGLESTAT_WIDTH");
}
impl Default for SinglestatWidth {
    fn default() -> Self {
        Self(6)
    }
}

new_type! {
    #[doc="The width of the dashboard grid.\n\nDefault is 24 which is what Grafana uses.\n"]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub copy struct GridWidth(u32, env="GRID_WIDTH");
}
impl Default for GridWidth {
    fn default() -> Self {
        Self(24)
    }
}

new_type! {
    #[doc="The base URL of Prometheus.\n\nDefault is `http://localhost:9090`.\n"]
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PrometheusAddress(String, env="PROMETHEUS_ADDRESS");
}
impl Default for PrometheusAddress {
    fn default() -> Self {
        Self::new("http://localhost:9090")
    }
}

new_type! {
    #[doc="The prefix of alert annotations that configure a panel.\n\nDefault is `dash_`.\n"]
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AnnotationPrefix(String, env="ANNOTATION_PREFIX");
}
impl Default for AnnotationPrefix {
    fn default() -> Self {
        Self::new(DEFAULT_ANNOTATION_PREFIX)
    }
}

new_type! {
    #[doc="The function applied to counters.\n\nDefault is `rate`.\n"]
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct CounterChangeFunc(String, env="COUNTER_CHANGE_FUNC");
}
impl Default for CounterChangeFunc {
    fn default() -> Self {
        Self::new("rate")
    }
}

new_type! {
    #[doc="The range of range vectors in generated queries.\n\nDefault is `5m`.\n"]
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TimeRange(String, env="TIME_RANGE");
}
impl Default for TimeRange {
    fn default() -> Self {
        Self::new("5m")
    }
}

new_type! {
    #[doc="The time fetching a metrics endpoint may take.\n\nDefault is 5000 ms.\n"]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub millis struct MetricsFetchTimeoutMillis(u64, env="METRICS_FETCH_TIMEOUT_MILLIS");
}
impl Default for MetricsFetchTimeoutMillis {
    fn default() -> Self {
        Self(5_000)
    }
}

/// Collects configuration values from code, files and the environment
///
/// Values which are already set are never overwritten. Filling from a
/// source only sets what is still missing.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Builder {
    pub grafana_address: Option<GrafanaAddress>,
    pub grafana_username: Option<GrafanaUsername>,
    pub grafana_password: Option<GrafanaPassword>,
    pub grafana_folder: Option<GrafanaFolder>,
    pub datasource: Option<Datasource>,
    pub panel_height: Option<PanelHeight>,
    pub graph_width: Option<GraphWidth>,
    pub singlestat_width: Option<SinglestatWidth>,
    pub grid_width: Option<GridWidth>,
    pub prometheus_address: Option<PrometheusAddress>,
    pub annotation_prefix: Option<AnnotationPrefix>,
    pub counter_change_func: Option<CounterChangeFunc>,
    pub time_range: Option<TimeRange>,
    pub metrics_fetch_timeout_millis: Option<MetricsFetchTimeoutMillis>,
}

impl Builder {
    /// Creates a builder with values taken from variables prefixed with `PROMDASH`.
    pub fn from_env() -> Result<Self, Error> {
        let mut me = Self::default();
        me.fill_from_env()?;
        Ok(me)
    }

    pub fn from_env_prefixed<T: AsRef<str>>(prefix: T) -> Result<Self, Error> {
        let mut me = Self::default();
        me.fill_from_env_prefixed(prefix)?;
        Ok(me)
    }

    /// Parses a builder from TOML.
    ///
    /// Keys are the field names of the builder, e.g. `grafana_address`.
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        toml::from_str(s).map_err(|err| Error::new(format!("invalid configuration: {}", err)))
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::new(format!(
                "could not read configuration file {}: {}",
                path.display(),
                err
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn fill_from_env(&mut self) -> Result<(), Error> {
        self.fill_from_env_prefixed(promdash_types::PROMDASH_PREFIX)
    }

    pub fn fill_from_env_prefixed<T: AsRef<str>>(&mut self, prefix: T) -> Result<(), Error> {
        let prefix = prefix.as_ref();
        if self.grafana_address.is_none() {
            self.grafana_address = GrafanaAddress::try_from_env_prefixed(prefix)?;
        }
        if self.grafana_username.is_none() {
            self.grafana_username = GrafanaUsername::try_from_env_prefixed(prefix)?;
        }
        if self.grafana_password.is_none() {
            self.grafana_password = GrafanaPassword::try_from_env_prefixed(prefix)?;
        }
        if self.grafana_folder.is_none() {
            self.grafana_folder = GrafanaFolder::try_from_env_prefixed(prefix)?;
        }
        if self.datasource.is_none() {
            self.datasource = Datasource::try_from_env_prefixed(prefix)?;
        }
        if self.panel_height.is_none() {
            self.panel_height = PanelHeight::try_from_env_prefixed(prefix)?;
        }
        if self.graph_width.is_none() {
            self.graph_width = GraphWidth::try_from_env_prefixed(prefix)?;
        }
        if self.singlestat_width.is_none() {
            self.singlestat_width = SinglestatWidth::try_from_env_prefixed(prefix)?;
        }
        if self.grid_width.is_none() {
            self.grid_width = GridWidth::try_from_env_prefixed(prefix)?;
        }
        if self.prometheus_address.is_none() {
            self.prometheus_address = PrometheusAddress::try_from_env_prefixed(prefix)?;
        }
        if self.annotation_prefix.is_none() {
            self.annotation_prefix = AnnotationPrefix::try_from_env_prefixed(prefix)?;
        }
        if self.counter_change_func.is_none() {
            self.counter_change_func = CounterChangeFunc::try_from_env_prefixed(prefix)?;
        }
        if self.time_range.is_none() {
            self.time_range = TimeRange::try_from_env_prefixed(prefix)?;
        }
        if self.metrics_fetch_timeout_millis.is_none() {
            self.metrics_fetch_timeout_millis =
                MetricsFetchTimeoutMillis::try_from_env_prefixed(prefix)?;
        }

        Ok(())
    }

    /// Takes every value still missing from `other`.
    pub fn fill_from(&mut self, other: Builder) {
        macro_rules! take_missing {
            ($($field:ident),*) => {
                $(
                    if self.$field.is_none() {
                        self.$field = other.$field;
                    }
                )*
            };
        }

        take_missing!(
            grafana_address,
            grafana_username,
            grafana_password,
            grafana_folder,
            datasource,
            panel_height,
            graph_width,
            singlestat_width,
            grid_width,
            prometheus_address,
            annotation_prefix,
            counter_change_func,
            time_range,
            metrics_fetch_timeout_millis
        );
    }

    pub fn apply_defaults(&mut self) {
        if self.grafana_address.is_none() {
            self.grafana_address = Some(GrafanaAddress::default());
        }
        if self.datasource.is_none() {
            self.datasource = Some(Datasource::default());
        }
        if self.panel_height.is_none() {
            self.panel_height = Some(PanelHeight::default());
        }
        if self.graph_width.is_none() {
            self.graph_width = Some(GraphWidth::default());
        }
        if self.singlestat_width.is_none() {
            self.singlestat_width = Some(SinglestatWidth::default());
        }
        if self.grid_width.is_none() {
            self.grid_width = Some(GridWidth::default());
        }
        if self.prometheus_address.is_none() {
            self.prometheus_address = Some(PrometheusAddress::default());
        }
        if self.annotation_prefix.is_none() {
            self.annotation_prefix = Some(AnnotationPrefix::default());
        }
        if self.counter_change_func.is_none() {
            self.counter_change_func = Some(CounterChangeFunc::default());
        }
        if self.time_range.is_none() {
            self.time_range = Some(TimeRange::default());
        }
        if self.metrics_fetch_timeout_millis.is_none() {
            self.metrics_fetch_timeout_millis = Some(MetricsFetchTimeoutMillis::default());
        }
    }

    pub fn grafana_address<T: Into<GrafanaAddress>>(mut self, v: T) -> Self {
        self.grafana_address = Some(v.into());
        self
    }
    pub fn grafana_folder<T: Into<GrafanaFolder>>(mut self, v: T) -> Self {
        self.grafana_folder = Some(v.into());
        self
    }
    pub fn datasource<T: Into<Datasource>>(mut self, v: T) -> Self {
        self.datasource = Some(v.into());
        self
    }
    pub fn prometheus_address<T: Into<PrometheusAddress>>(mut self, v: T) -> Self {
        self.prometheus_address = Some(v.into());
        self
    }
    pub fn annotation_prefix<T: Into<AnnotationPrefix>>(mut self, v: T) -> Self {
        self.annotation_prefix = Some(v.into());
        self
    }

    /// Validates the values and applies defaults for missing ones.
    pub fn finish(mut self) -> Result<Config, Error> {
        self.apply_defaults();

        let grafana_address: BaseUrl = mandatory(self.grafana_address, "grafana_address")?
            .as_str()
            .parse()
            .map_err(|err| Error::new(format!("invalid grafana address: {}", err)))?;
        let prometheus_address: BaseUrl =
            mandatory(self.prometheus_address, "prometheus_address")?
                .as_str()
                .parse()
                .map_err(|err| Error::new(format!("invalid prometheus address: {}", err)))?;

        let time_range = mandatory(self.time_range, "time_range")?;
        time_range
            .as_str()
            .parse::<PromDuration>()
            .map_err(|err| Error::new(format!("invalid time range '{}': {}", time_range, err)))?;

        let layout = LayoutConfig {
            grid_width: mandatory(self.grid_width, "grid_width")?.into_inner(),
            row_height: mandatory(self.panel_height, "panel_height")?.into_inner(),
            graph_width: mandatory(self.graph_width, "graph_width")?.into_inner(),
            singlestat_width: mandatory(self.singlestat_width, "singlestat_width")?
                .into_inner(),
        };
        if layout.grid_width == 0
            || layout.graph_width > layout.grid_width
            || layout.singlestat_width > layout.grid_width
        {
            return Err(Error::new(format!(
                "panel widths must fit into the grid: {:?}",
                layout
            )));
        }

        let datasource = mandatory(self.datasource, "datasource")?;
        let alert_settings = AlertSettings {
            annotation_prefix: mandatory(self.annotation_prefix, "annotation_prefix")?
                .into_inner(),
            default_datasource: datasource.as_str().to_string(),
        };

        Ok(Config {
            grafana_address,
            grafana_auth: BasicAuth::from_parts(
                self.grafana_username.map(GrafanaUsername::into_inner),
                self.grafana_password.map(GrafanaPassword::into_inner),
            ),
            grafana_folder: self.grafana_folder.map(GrafanaFolder::into_inner),
            datasource,
            layout,
            prometheus_address,
            alert_settings,
            counter_change_func: mandatory(
                self.counter_change_func,
                "counter_change_func",
            )?
            .into_inner(),
            time_range: time_range.into_inner(),
            metrics_fetch_timeout: mandatory(
                self.metrics_fetch_timeout_millis,
                "metrics_fetch_timeout_millis",
            )?
            .into_duration(),
        })
    }
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub grafana_address: BaseUrl,
    pub grafana_auth: Option<BasicAuth>,
    pub grafana_folder: Option<String>,
    pub datasource: Datasource,
    pub layout: LayoutConfig,
    pub prometheus_address: BaseUrl,
    pub alert_settings: AlertSettings,
    pub counter_change_func: String,
    pub time_range: String,
    pub metrics_fetch_timeout: Duration,
}

impl Config {
    pub fn builder() -> Builder {
        Builder::default()
    }
}

fn mandatory<T>(v: Option<T>, field_name: &'static str) -> Result<T, Error> {
    v.ok_or_else(|| Error::new(format!("field '{}' is mandatory", field_name)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = Builder::default().finish().unwrap();

        assert_eq!(config.grafana_address.as_str(), "http://localhost:3000/");
        assert_eq!(config.prometheus_address.as_str(), "http://localhost:9090/");
        assert_eq!(config.grafana_auth, None);
        assert_eq!(config.grafana_folder, None);
        assert_eq!(config.datasource.as_str(), "");
        assert_eq!(config.layout, LayoutConfig::default());
        assert_eq!(config.alert_settings.annotation_prefix, "dash_");
        assert_eq!(config.counter_change_func, "rate");
        assert_eq!(config.time_range, "5m");
        assert_eq!(config.metrics_fetch_timeout, Duration::from_secs(5));
    }

    #[test]
    fn reads_toml() {
        let builder = Builder::from_toml_str(
            r#"
            grafana_address = "https://grafana.example.com"
            grafana_username = "admin"
            datasource = "thanos"
            panel_height = 8
            metrics_fetch_timeout_millis = 1500
            "#,
        )
        .unwrap();

        let config = builder.finish().unwrap();

        assert_eq!(config.grafana_address.as_str(), "https://grafana.example.com/");
        assert_eq!(
            config.grafana_auth,
            Some(BasicAuth {
                username: "admin".to_string(),
                password: String::new(),
            })
        );
        assert_eq!(config.datasource.as_str(), "thanos");
        assert_eq!(config.alert_settings.default_datasource, "thanos");
        assert_eq!(config.layout.row_height, 8);
        assert_eq!(config.metrics_fetch_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn unknown_toml_types_fail() {
        assert!(Builder::from_toml_str("panel_height = \"high\"").is_err());
    }

    #[test]
    fn reads_env_with_custom_prefix() {
        std::env::set_var("PROMDASH_TEST_CFG_GRAPH_WIDTH", "8");
        std::env::set_var("PROMDASH_TEST_CFG_ANNOTATION_PREFIX", "ab_");
        std::env::set_var("PROMDASH_TEST_CFG_DATASOURCE", "prom");

        let builder = Builder::from_env_prefixed("PROMDASH_TEST_CFG").unwrap();

        assert_eq!(builder.graph_width, Some(GraphWidth::new(8u32)));
        assert_eq!(builder.annotation_prefix, Some(AnnotationPrefix::new("ab_")));
        assert_eq!(builder.datasource, Some(Datasource::new("prom")));
        assert_eq!(builder.grid_width, None);
    }

    #[test]
    fn set_values_win_over_filled_ones() {
        let mut builder = Builder::default().datasource("cli");
        builder.fill_from(Builder::default().datasource("file").annotation_prefix("file_"));

        assert_eq!(builder.datasource, Some(Datasource::new("cli")));
        assert_eq!(builder.annotation_prefix, Some(AnnotationPrefix::new("file_")));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut builder = Builder::default();
        builder.time_range = Some(TimeRange::new("five minutes"));
        assert!(builder.finish().is_err());

        let mut builder = Builder::default();
        builder.graph_width = Some(GraphWidth::new(30u32));
        assert!(builder.finish().is_err());

        let builder = Builder::default().grafana_address("not a url");
        assert!(builder.finish().is_err());
    }
}
