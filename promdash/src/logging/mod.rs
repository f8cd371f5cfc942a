//! Pluggable logging
//!
//! Drivers log through a `LoggingAdapter` so that the library can be
//! embedded into applications using `log`, `slog` or no logging at all.
use std::fmt;
use std::fmt::Arguments;
use std::sync::Arc;

use crate::promdash_types::model::{
    alert::AlertGroupName, dashboard::DashboardTitle, metric::MetricName,
};

pub trait Logs {
    fn debug(&self, args: Arguments);
    fn info(&self, args: Arguments);
    fn warn(&self, args: Arguments);
    fn error(&self, args: Arguments);
}

#[derive(Clone)]
pub(crate) struct Logger {
    context: Arc<LoggingContext>,
    logging_adapter: Arc<dyn LoggingAdapter>,
}

impl Logger {
    pub fn new(logging_adapter: Arc<dyn LoggingAdapter>) -> Self {
        Logger {
            context: Arc::new(LoggingContext::default()),
            logging_adapter,
        }
    }

    pub fn with_dashboard(&self, dashboard: DashboardTitle) -> Self {
        self.with_context(|context| context.dashboard = Some(dashboard))
    }

    pub fn with_alert_group(&self, alert_group: AlertGroupName) -> Self {
        self.with_context(|context| context.alert_group = Some(alert_group))
    }

    pub fn with_alert<T: Into<String>>(&self, alert: T) -> Self {
        self.with_context(|context| context.alert = Some(alert.into()))
    }

    pub fn with_metric(&self, metric: MetricName) -> Self {
        self.with_context(|context| context.metric = Some(metric))
    }

    fn with_context<F>(&self, f: F) -> Self
    where
        F: FnOnce(&mut LoggingContext),
    {
        let mut context = (*self.context).clone();
        f(&mut context);
        let logging_adapter = Arc::clone(&self.logging_adapter);

        Logger {
            context: Arc::new(context),
            logging_adapter,
        }
    }
}

impl Logs for Logger {
    fn debug(&self, args: Arguments) {
        self.logging_adapter.debug(&self.context, args);
    }

    fn info(&self, args: Arguments) {
        self.logging_adapter.info(&self.context, args);
    }

    fn warn(&self, args: Arguments) {
        self.logging_adapter.warn(&self.context, args);
    }

    fn error(&self, args: Arguments) {
        self.logging_adapter.error(&self.context, args);
    }
}

/// An adapter for pluggable logging.
///
/// Implementors can be used by the drivers
pub trait LoggingAdapter: Send + Sync + 'static {
    fn debug(&self, context: &LoggingContext, args: Arguments);
    fn info(&self, context: &LoggingContext, args: Arguments);
    fn warn(&self, context: &LoggingContext, args: Arguments);
    fn error(&self, context: &LoggingContext, args: Arguments);
}

/// Logs to stdout
///
/// This does not use the tokio version. It blocks the current thread.
#[derive(Clone)]
pub struct StdOutLogger(LogConfig);

impl StdOutLogger {
    pub fn new(config: LogConfig) -> Self {
        Self(config)
    }
}

impl Default for StdOutLogger {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

impl LoggingAdapter for StdOutLogger {
    fn debug(&self, context: &LoggingContext, args: Arguments) {
        println!("[DEBUG]{}{}", context.create_display(&self.0), args);
    }
    fn info(&self, context: &LoggingContext, args: Arguments) {
        println!("[INFO]{}{}", context.create_display(&self.0), args);
    }

    fn warn(&self, context: &LoggingContext, args: Arguments) {
        println!("[WARN]{}{}", context.create_display(&self.0), args);
    }
    fn error(&self, context: &LoggingContext, args: Arguments) {
        println!("[ERROR]{}{}", context.create_display(&self.0), args);
    }
}

/// Logs to stderr
///
/// This does not use the tokio version. It blocks the current thread.
#[derive(Clone)]
pub struct StdErrLogger(LogConfig);

impl StdErrLogger {
    pub fn new(config: LogConfig) -> Self {
        Self(config)
    }
}

impl Default for StdErrLogger {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

impl LoggingAdapter for StdErrLogger {
    fn debug(&self, context: &LoggingContext, args: Arguments) {
        eprintln!("[DEBUG]{}{}", context.create_display(&self.0), args);
    }

    fn info(&self, context: &LoggingContext, args: Arguments) {
        eprintln!("[INFO]{}{}", context.create_display(&self.0), args);
    }

    fn warn(&self, context: &LoggingContext, args: Arguments) {
        eprintln!("[WARN]{}{}", context.create_display(&self.0), args);
    }
    fn error(&self, context: &LoggingContext, args: Arguments) {
        eprintln!("[ERROR]{}{}", context.create_display(&self.0), args);
    }
}

/// Does no logging at all
#[derive(Clone, Copy)]
pub struct DevNullLogger;

impl LoggingAdapter for DevNullLogger {
    fn debug(&self, _context: &LoggingContext, _args: Arguments) {}
    fn info(&self, _context: &LoggingContext, _args: Arguments) {}
    fn warn(&self, _context: &LoggingContext, _args: Arguments) {}
    fn error(&self, _context: &LoggingContext, _args: Arguments) {}
}

/// Contextual data passed to a logger to be displayed along with a log message
#[derive(Default, Debug, Clone)]
#[non_exhaustive]
pub struct LoggingContext {
    dashboard: Option<DashboardTitle>,
    alert_group: Option<AlertGroupName>,
    alert: Option<String>,
    metric: Option<MetricName>,
}

impl LoggingContext {
    pub fn dashboard(&self) -> Option<&DashboardTitle> {
        self.dashboard.as_ref()
    }

    pub fn alert_group(&self) -> Option<&AlertGroupName> {
        self.alert_group.as_ref()
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn metric(&self) -> Option<&MetricName> {
        self.metric.as_ref()
    }
}

/// Configures which contextual data should be made available with a log message
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LogConfig {
    pub show_dashboard: bool,
    pub show_alert_group: bool,
    pub show_alert: bool,
    pub show_metric: bool,
}

impl LogConfig {
    /// Only display the alert and the metric
    pub fn short() -> Self {
        Self {
            show_dashboard: false,
            show_alert_group: false,
            show_alert: true,
            show_metric: true,
        }
    }

    /// Display everything
    pub fn long() -> Self {
        Self {
            show_dashboard: true,
            show_alert_group: true,
            show_alert: true,
            show_metric: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::short()
    }
}

impl LoggingContext {
    /// Creates a `Display` based on the given `LogConfig`
    pub fn create_display<'a>(&'a self, config: &'a LogConfig) -> ContextDisplay<'a> {
        ContextDisplay {
            context: self,
            config,
        }
    }
}

pub struct ContextDisplay<'a> {
    config: &'a LogConfig,
    context: &'a LoggingContext,
}

impl<'a> ContextDisplay<'a> {
    fn format(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        let mut n = self.item_count();
        if n == 0 {
            return Ok(());
        }

        write!(f, "[")?;
        if self.config.show_dashboard {
            if let Some(ref dashboard) = self.context.dashboard {
                write!(f, "D:{}", dashboard)?;
                add_delimiter(&mut n, f)?;
            }
        }
        if self.config.show_alert_group {
            if let Some(ref alert_group) = self.context.alert_group {
                write!(f, "G:{}", alert_group)?;
                add_delimiter(&mut n, f)?;
            }
        }
        if self.config.show_alert {
            if let Some(ref alert) = self.context.alert {
                write!(f, "A:{}", alert)?;
                add_delimiter(&mut n, f)?;
            }
        }
        if self.config.show_metric {
            if let Some(ref metric) = self.context.metric {
                write!(f, "M:{}", metric)?;
                add_delimiter(&mut n, f)?;
            }
        }
        Ok(())
    }

    fn item_count(&self) -> usize {
        let mut n = 0;
        if self.config.show_dashboard && self.context.dashboard.is_some() {
            n += 1;
        }
        if self.config.show_alert_group && self.context.alert_group.is_some() {
            n += 1;
        }
        if self.config.show_alert && self.context.alert.is_some() {
            n += 1;
        }
        if self.config.show_metric && self.context.metric.is_some() {
            n += 1;
        }
        n
    }
}

fn add_delimiter(n: &mut usize, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    (*n) -= 1;
    if *n == 0 {
        write!(f, "] ")?;
    } else {
        write!(f, ";")?;
    }
    Ok(())
}

impl<'a> fmt::Display for ContextDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.format(f)
    }
}

#[cfg(feature = "slog")]
pub mod slog_adapter {
    use std::fmt;

    use super::*;
    use slog::{debug, error, info, o, warn, Logger};

    /// A logger based on `slog`
    #[derive(Clone)]
    pub struct SlogLogger {
        logger: Logger,
        config: LogConfig,
    }

    impl SlogLogger {
        pub fn new(logger: Logger) -> Self {
            SlogLogger {
                logger,
                config: LogConfig::short(),
            }
        }

        pub fn new_with_config(logger: Logger, config: LogConfig) -> Self {
            SlogLogger { logger, config }
        }
    }

    macro_rules! context_kvs {
        ($context:expr) => {
            o!("dashboard" => value($context.dashboard.as_ref()),
            "alert_group" => value($context.alert_group.as_ref()),
            "alert" => value($context.alert.as_ref()),
            "metric" => value($context.metric.as_ref()))
        };
    }

    impl LoggingAdapter for SlogLogger {
        fn debug(&self, context: &LoggingContext, args: Arguments) {
            let ctx_display = context.create_display(&self.config);
            let kvs = context_kvs!(context);
            debug!(&self.logger, "{}{}", ctx_display, args; kvs)
        }

        fn info(&self, context: &LoggingContext, args: Arguments) {
            let ctx_display = context.create_display(&self.config);
            let kvs = context_kvs!(context);
            info!(&self.logger, "{}{}", ctx_display, args; kvs)
        }

        fn warn(&self, context: &LoggingContext, args: Arguments) {
            let ctx_display = context.create_display(&self.config);
            let kvs = context_kvs!(context);
            warn!(&self.logger, "{}{}", ctx_display, args; kvs)
        }

        fn error(&self, context: &LoggingContext, args: Arguments) {
            let ctx_display = context.create_display(&self.config);
            let kvs = context_kvs!(context);
            error!(&self.logger, "{}{}", ctx_display, args; kvs)
        }
    }

    fn value<V: fmt::Display>(value: Option<&V>) -> String {
        value
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_owned())
    }
}

#[cfg(feature = "log")]
pub mod log_adapter {
    use std::fmt::Arguments;

    use super::*;
    use log::{debug, error, info, warn};

    /// A logger based on `log`
    #[derive(Clone)]
    pub struct LogLogger(LogConfig);

    impl LogLogger {
        pub fn new(config: LogConfig) -> Self {
            Self(config)
        }
    }

    impl Default for LogLogger {
        fn default() -> Self {
            Self::new(LogConfig::default())
        }
    }

    impl LoggingAdapter for LogLogger {
        fn debug(&self, context: &LoggingContext, args: Arguments) {
            debug!("{}{}", context.create_display(&self.0), args);
        }
        fn info(&self, context: &LoggingContext, args: Arguments) {
            info!("{}{}", context.create_display(&self.0), args);
        }
        fn warn(&self, context: &LoggingContext, args: Arguments) {
            warn!("{}{}", context.create_display(&self.0), args);
        }
        fn error(&self, context: &LoggingContext, args: Arguments) {
            error!("{}{}", context.create_display(&self.0), args);
        }
    }
}
