use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use url::Url;

use promdash::alert::explain;
use promdash::api::{GrafanaClient, PrometheusClient};
use promdash::config::{Builder, Config};
use promdash::drivers::{compile_filters, AlertDriver, DrilldownDriver, DrilldownParams};
use promdash::logging::{log_adapter::LogLogger, LogConfig, LoggingAdapter};
use promdash::promql::PromDuration;

#[derive(Parser)]
#[command(name = "promdash")]
#[command(about = "Generates Grafana dashboards from Prometheus alerts and metrics", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// TOML file with configuration values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `promdash=debug`
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true)]
    grafana_address: Option<String>,

    #[arg(long, global = true)]
    grafana_username: Option<String>,

    #[arg(long, global = true)]
    grafana_password: Option<String>,

    /// Folder to publish dashboards into
    #[arg(long, global = true)]
    grafana_folder: Option<String>,

    /// Datasource set on every panel
    #[arg(long, global = true)]
    datasource: Option<String>,

    /// Height of graphs and singlestats
    #[arg(long, global = true)]
    panel_height: Option<u32>,

    #[arg(long, global = true)]
    graph_width: Option<u32>,

    #[arg(long, global = true)]
    singlestat_width: Option<u32>,

    #[arg(long, global = true)]
    grid_width: Option<u32>,

    #[arg(long, global = true)]
    prometheus_address: Option<String>,

    /// Prefix of alert annotations configuring a panel [default: dash_].
    /// Rules annotated with `ab_title`, `ab_legend`, ... need `--annotation-prefix ab_`
    #[arg(long, global = true)]
    annotation_prefix: Option<String>,

    #[arg(long, global = true)]
    metrics_fetch_timeout_millis: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create one dashboard per alert group
    Alert {
        /// Regexes selecting alert groups by name
        names: Vec<String>,
    },

    /// Create a dashboard for the metrics of an endpoint
    Drilldown {
        /// Title of the dashboard
        title: String,

        /// URL of the metrics endpoint
        endpoint: Url,

        /// Only convert metrics starting with this prefix
        #[arg(long, default_value = "")]
        prefix: String,

        /// Group metrics into rows by this many name segments
        #[arg(long, default_value_t = 0)]
        group_level: usize,

        /// Range used in range vectors, e.g. `5m`
        #[arg(long)]
        range: Option<String>,

        /// Function applied to counters
        #[arg(long)]
        counter_change_func: Option<String>,

        /// Label which becomes a dashboard variable
        #[arg(long = "label")]
        labels: Vec<String>,
    },

    /// Show how an alert query is analyzed
    Explain {
        /// The PromQL expression of an alert
        query: String,
    },

    /// Print the version
    Version,
}

impl GlobalArgs {
    fn builder(&self) -> Builder {
        let mut builder = Builder::default();
        builder.grafana_address = self.grafana_address.clone().map(Into::into);
        builder.grafana_username = self.grafana_username.clone().map(Into::into);
        builder.grafana_password = self.grafana_password.clone().map(Into::into);
        builder.grafana_folder = self.grafana_folder.clone().map(Into::into);
        builder.datasource = self.datasource.clone().map(Into::into);
        builder.panel_height = self.panel_height.map(Into::into);
        builder.graph_width = self.graph_width.map(Into::into);
        builder.singlestat_width = self.singlestat_width.map(Into::into);
        builder.grid_width = self.grid_width.map(Into::into);
        builder.prometheus_address = self.prometheus_address.clone().map(Into::into);
        builder.annotation_prefix = self.annotation_prefix.clone().map(Into::into);
        builder.metrics_fetch_timeout_millis = self.metrics_fetch_timeout_millis.map(Into::into);
        builder
    }

    /// Flags win over the file, the file wins over the environment.
    fn load_config(&self, mut builder: Builder) -> Result<Config> {
        if let Some(ref path) = self.config {
            builder.fill_from(Builder::from_toml_file(path)?);
        }
        builder.fill_from_env()?;
        Ok(builder.finish()?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.global.log_level))
        .init();
    let logging_adapter: Arc<dyn LoggingAdapter> = Arc::new(LogLogger::new(LogConfig::short()));

    match cli.command {
        Commands::Alert { names } => {
            let config = cli.global.load_config(cli.global.builder())?;
            if names.is_empty() {
                log::warn!("no alert group filters given, nothing will be published");
            }
            let filters = compile_filters(&names)?;

            let driver = AlertDriver::new(
                PrometheusClient::with_default_dispatcher(config.prometheus_address.clone()),
                GrafanaClient::with_default_dispatcher(
                    config.grafana_address.clone(),
                    config.grafana_auth.clone(),
                ),
                &config,
                logging_adapter,
            );

            let report = driver.run(&filters).await?;
            log::info!(
                "published {} dashboards, skipped {} alerts",
                report.published.len(),
                report.skipped
            );
        }
        Commands::Drilldown {
            title,
            endpoint,
            prefix,
            group_level,
            range,
            counter_change_func,
            labels,
        } => {
            if let Some(ref range) = range {
                if let Err(err) = range.parse::<PromDuration>() {
                    bail!("invalid range '{}': {}", range, err);
                }
            }

            let mut builder = cli.global.builder();
            builder.time_range = range.map(Into::into);
            builder.counter_change_func = counter_change_func.map(Into::into);
            let config = cli.global.load_config(builder)?;

            let mut params = DrilldownParams::from_config(&config);
            params.prefix = prefix;
            params.group_level = group_level;
            params.options.selector_labels = labels;

            let driver = DrilldownDriver::new(
                PrometheusClient::with_default_dispatcher(config.prometheus_address.clone()),
                GrafanaClient::with_default_dispatcher(
                    config.grafana_address.clone(),
                    config.grafana_auth.clone(),
                ),
                &config,
                logging_adapter,
            );

            let report = driver
                .run(title.into(), &endpoint, &params)
                .await
                .with_context(|| format!("drilldown of {} failed", endpoint))?;
            log::info!(
                "published dashboard, {} metrics had no converter",
                report.skipped
            );
        }
        Commands::Explain { query } => {
            let config = cli.global.load_config(cli.global.builder())?;
            let explanation = explain(&query, &config.alert_settings)?;

            println!("operator: {}", explanation.op);
            println!("left:     {} ({})", explanation.lhs, explanation.lhs_type);
            println!("right:    {} ({})", explanation.rhs, explanation.rhs_type);
            println!("panel:");
            println!("{}", serde_json::to_string_pretty(&explanation.panel)?);
        }
        Commands::Version => {
            println!("promdash {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
