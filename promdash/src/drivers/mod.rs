//! End to end runs: read input, convert, lay out, render and publish
use std::error::Error as StdError;
use std::fmt;

use crate::api::ApiError;
use crate::exposition::ExpositionError;

pub use self::alert::{compile_filters, AlertDriver};
pub use self::drilldown::{group_key, DrilldownDriver, DrilldownParams};

mod alert;
mod drilldown;

/// The outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Titles of the published dashboards in publishing order
    pub published: Vec<String>,
    /// Alerts or metrics that did not produce a panel
    pub skipped: usize,
}

/// A run was aborted
#[derive(Debug)]
pub struct RunError {
    context: Option<String>,
    cause: Option<Box<dyn StdError + Send + Sync + 'static>>,
    kind: RunErrorKind,
}

impl RunError {
    pub fn new<T: Into<RunErrorKind>>(kind: T) -> Self {
        Self {
            context: None,
            cause: None,
            kind: kind.into(),
        }
    }

    pub fn caused_by<E>(mut self, err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Box::new(err));
        self
    }

    pub fn with_context<T: Into<String>>(mut self, context: T) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn kind(&self) -> RunErrorKind {
        self.kind
    }

    /// Input could not be read from Prometheus or a metrics endpoint
    pub fn is_fetch(&self) -> bool {
        self.kind == RunErrorKind::Fetch
    }

    /// Input was read but is malformed
    pub fn is_parse(&self) -> bool {
        self.kind == RunErrorKind::Parse
    }

    pub fn is_publish(&self) -> bool {
        self.kind == RunErrorKind::Publish
    }

    pub fn is_config(&self) -> bool {
        self.kind == RunErrorKind::Config
    }
}

impl StdError for RunError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|p| &**p as &dyn StdError)
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = self.context.as_ref() {
            write!(f, "{}", context)?;
        } else {
            write!(f, "{}", self.kind)?;
        }

        let mut source = self.source();
        while let Some(err) = source {
            write!(f, " - Caused by: {}", err)?;
            source = err.source();
        }

        Ok(())
    }
}

impl From<RunErrorKind> for RunError {
    fn from(kind: RunErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<ExpositionError> for RunError {
    fn from(err: ExpositionError) -> Self {
        RunError::new(RunErrorKind::Parse)
            .with_context("the metrics endpoint returned malformed data")
            .caused_by(err)
    }
}

impl From<crate::Error> for RunError {
    fn from(err: crate::Error) -> Self {
        RunError::new(RunErrorKind::Config).caused_by(err)
    }
}

impl From<regex::Error> for RunError {
    fn from(err: regex::Error) -> Self {
        RunError::new(RunErrorKind::Config)
            .with_context("invalid alert group filter")
            .caused_by(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunErrorKind {
    Fetch,
    Parse,
    Publish,
    Config,
}

impl fmt::Display for RunErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunErrorKind::Fetch => write!(f, "fetching input failed"),
            RunErrorKind::Parse => write!(f, "input is malformed"),
            RunErrorKind::Publish => write!(f, "publishing a dashboard failed"),
            RunErrorKind::Config => write!(f, "invalid configuration"),
        }
    }
}

fn fetch_failed(context: String, err: ApiError) -> RunError {
    RunError::new(RunErrorKind::Fetch)
        .with_context(context)
        .caused_by(err)
}

fn publish_failed(context: String, err: ApiError) -> RunError {
    RunError::new(RunErrorKind::Publish)
        .with_context(context)
        .caused_by(err)
}
