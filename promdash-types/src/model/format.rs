//! Display-format hints understood by Grafana
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The unit a panel uses to display its values.
///
/// The well known units produced by the format classifier have their own
/// variants. Any other unit, e.g. one set by an alert annotation, is kept
/// as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FormatHint {
    /// A plain number
    Short,
    /// A byte count
    DecBytes,
    /// A duration in seconds
    Seconds,
    /// A timestamp displayed as a date
    DateTimeAsIso,
    /// Bytes per second
    BytesPerSecond,
    /// Requests per second
    RequestsPerSecond,
    Other(String),
}

impl FormatHint {
    pub fn as_str(&self) -> &str {
        match self {
            FormatHint::Short => "short",
            FormatHint::DecBytes => "decbytes",
            FormatHint::Seconds => "s",
            FormatHint::DateTimeAsIso => "dateTimeAsIso",
            FormatHint::BytesPerSecond => "Bps",
            FormatHint::RequestsPerSecond => "reqps",
            FormatHint::Other(unit) => unit,
        }
    }
}

impl Default for FormatHint {
    fn default() -> Self {
        FormatHint::Short
    }
}

impl fmt::Display for FormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FormatHint {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hint = match s {
            "short" => FormatHint::Short,
            "decbytes" => FormatHint::DecBytes,
            "s" => FormatHint::Seconds,
            "dateTimeAsIso" => FormatHint::DateTimeAsIso,
            "Bps" => FormatHint::BytesPerSecond,
            "reqps" => FormatHint::RequestsPerSecond,
            other => FormatHint::Other(other.to_owned()),
        };
        Ok(hint)
    }
}

impl From<String> for FormatHint {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(hint) => hint,
            Err(never) => match never {},
        }
    }
}

impl From<&str> for FormatHint {
    fn from(s: &str) -> Self {
        FormatHint::from(s.to_owned())
    }
}

impl From<FormatHint> for String {
    fn from(hint: FormatHint) -> Self {
        hint.as_str().to_owned()
    }
}
