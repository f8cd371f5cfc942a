//! # promdash-types
//!
//! `promdash-types` contains the data model shared by the conversion engine,
//! the layout engine and the collaborators that feed them: metric samples
//! parsed from an exposition endpoint, alerting rules read from Prometheus,
//! panel descriptions and dashboards.

use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

#[macro_use]
pub(crate) mod env_vars;
pub mod model;

pub use env_vars::PROMDASH_PREFIX;

new_type! {
    #[doc="The base URL of a remote HTTP API, e.g. Grafana or Prometheus.\n"]
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct BaseUrl(Url);
}

impl BaseUrl {
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Joins a path onto the base URL.
    ///
    /// A base URL without a trailing slash is treated as a directory so that
    /// `http://host/grafana` joined with `api/search` yields
    /// `http://host/grafana/api/search`.
    pub fn join(&self, path: &str) -> Result<Url, Error> {
        let mut base = self.0.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }

        base.join(path.trim_start_matches('/'))
            .map_err(|err| Error::new(format!("could not join '{}' onto {}: {}", path, self, err)))
    }
}

impl AsRef<str> for BaseUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// A generic error carrying only a message.
///
/// Used for configuration and parsing failures that do not need
/// a dedicated error kind.
#[derive(Debug)]
pub struct Error(String);

impl Error {
    pub fn new<T: Into<String>>(msg: T) -> Self {
        Self(msg.into())
    }

    pub fn boxed(self) -> Box<dyn StdError + Send + Sync> {
        Box::new(self)
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        None
    }
}

impl<T> From<T> for Error
where
    T: Into<String>,
{
    fn from(msg: T) -> Self {
        Self::new(msg)
    }
}

/// Parses `s` and returns `None` for an empty string.
pub fn parse_non_empty<T>(s: &str) -> Result<Option<T>, Error>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    if s.trim().is_empty() {
        Ok(None)
    } else {
        s.parse::<T>()
            .map(Some)
            .map_err(|err| Error::new(format!("could not parse '{}': {}", s, err)))
    }
}
