//! Reading the Prometheus text exposition format
//!
//! Supports version 0.0.4 of the text format and the text flavour of
//! OpenMetrics. Only the structure needed to build panels is extracted:
//! the name, type, help text and label keys of every metric. Sample
//! values are validated but dropped.
use std::error::Error as StdError;
use std::fmt;

use crate::promdash_types::model::metric::{MetricName, MetricSample, MetricType, METRIC_NAME_LABEL};

const OPEN_METRICS_MEDIA_TYPE: &str = "application/openmetrics-text";

/// Parses an exposition payload into one `MetricSample` per metric.
///
/// Only metrics whose names start with `prefix` are returned.
pub fn parse_exposition(
    text: &str,
    content_type: &str,
    prefix: &str,
) -> Result<Vec<MetricSample>, ExpositionError> {
    let open_metrics = check_content_type(content_type)?;

    let mut samples = Vec::new();
    let mut current: Option<Pending> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(comment) = line.strip_prefix('#') {
            match parse_comment(comment, open_metrics).map_err(|msg| ExpositionError::new(line_no, msg))? {
                Comment::Type(name, metric_type) => {
                    current = Some(Pending::opened(current.take(), name).with_type(metric_type));
                }
                Comment::Help(name, help) => {
                    current = Some(Pending::opened(current.take(), name).with_help(help));
                }
                Comment::Eof => break,
                Comment::Other => {}
            }
            continue;
        }

        let label_keys = parse_sample(line).map_err(|msg| ExpositionError::new(line_no, msg))?;

        if let Some(pending) = current.take() {
            samples.push(pending.into_sample(label_keys));
        }
    }

    Ok(samples
        .into_iter()
        .filter(|sample| sample.name().has_prefix(prefix))
        .collect())
}

/// Returns whether the payload is OpenMetrics.
fn check_content_type(content_type: &str) -> Result<bool, ExpositionError> {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    if media_type == OPEN_METRICS_MEDIA_TYPE {
        return Ok(true);
    }

    if media_type.is_empty() || media_type.starts_with("text/") {
        return Ok(false);
    }

    Err(ExpositionError::new(
        0,
        format!("unsupported content type '{}'", content_type),
    ))
}

/// A metric whose `# TYPE` or `# HELP` line was seen but no sample yet
struct Pending {
    name: String,
    help: String,
    metric_type: MetricType,
}

impl Pending {
    /// Continues `previous` if it is about the same metric.
    fn opened(previous: Option<Pending>, name: String) -> Self {
        match previous {
            Some(pending) if pending.name == name => pending,
            _ => Pending {
                name,
                help: String::new(),
                metric_type: MetricType::Untyped,
            },
        }
    }

    fn with_type(mut self, metric_type: MetricType) -> Self {
        self.metric_type = metric_type;
        self
    }

    fn with_help(mut self, help: String) -> Self {
        self.help = help;
        self
    }

    fn into_sample(self, label_keys: Vec<String>) -> MetricSample {
        MetricSample::new(MetricName::from(self.name), self.metric_type)
            .with_help(self.help)
            .with_label_keys(label_keys)
    }
}

enum Comment {
    Type(String, MetricType),
    Help(String, String),
    Eof,
    Other,
}

fn parse_comment(comment: &str, open_metrics: bool) -> Result<Comment, String> {
    let comment = comment.trim_start();
    if open_metrics && comment == "EOF" {
        return Ok(Comment::Eof);
    }

    let (keyword, rest) = split_word(comment);
    match keyword {
        "TYPE" => {
            let (name, type_name) = split_word(rest);
            let name = metric_name(name)?;
            let metric_type = type_name
                .parse::<MetricType>()
                .map_err(|err| err.to_string())?;
            Ok(Comment::Type(name, metric_type))
        }
        "HELP" => {
            let (name, help) = split_word(rest);
            let name = metric_name(name)?;
            Ok(Comment::Help(name, unescape(help, open_metrics)?))
        }
        // UNIT lines of OpenMetrics and free comments carry nothing we need
        _ => Ok(Comment::Other),
    }
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(|c: char| c == ' ' || c == '\t') {
        Some(idx) => (&s[..idx], s[idx..].trim_start()),
        None => (s, ""),
    }
}

fn metric_name(name: &str) -> Result<String, String> {
    if is_metric_name(name) {
        Ok(name.to_string())
    } else {
        Err(format!("invalid metric name '{}'", name))
    }
}

fn is_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Help text escapes `\\` and `\n`; OpenMetrics also escapes `\"`.
fn unescape(s: &str, open_metrics: bool) -> Result<String, String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('"') if open_metrics => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => return Err("help text ends with an escape character".to_string()),
        }
    }
    Ok(out)
}

/// Parses `name{label="value",...} value [timestamp]` and returns the
/// label keys in order of appearance.
fn parse_sample(line: &str) -> Result<Vec<String>, String> {
    let name_end = line
        .find(|c: char| c == '{' || c == ' ' || c == '\t')
        .unwrap_or_else(|| line.len());
    let name = &line[..name_end];
    if !is_metric_name(name) {
        return Err(format!("invalid metric name '{}'", name));
    }

    let mut rest = &line[name_end..];
    let mut label_keys = Vec::new();

    if rest.starts_with('{') {
        let (keys, after) = parse_labels(&rest[1..])?;
        label_keys = keys;
        rest = after;
    }

    // OpenMetrics exemplars follow a '#'
    let rest = rest.split('#').next().unwrap_or("");
    let mut fields = rest.split_whitespace();
    let value = fields
        .next()
        .ok_or_else(|| format!("sample of '{}' has no value", name))?;
    parse_value(value)?;
    if let Some(timestamp) = fields.next() {
        timestamp
            .parse::<f64>()
            .map_err(|_| format!("invalid timestamp '{}'", timestamp))?;
    }
    if let Some(extra) = fields.next() {
        return Err(format!("unexpected '{}' after sample of '{}'", extra, name));
    }

    Ok(label_keys)
}

/// Parses the label set following `{`. Returns the keys and the remainder
/// after the closing `}`.
fn parse_labels(mut s: &str) -> Result<(Vec<String>, &str), String> {
    let mut keys = Vec::new();

    loop {
        s = s.trim_start();
        if let Some(after) = s.strip_prefix('}') {
            return Ok((keys, after));
        }

        let eq = s
            .find('=')
            .ok_or_else(|| "label set is not terminated".to_string())?;
        let key = s[..eq].trim();
        if !is_label_name(key) {
            return Err(format!("invalid label name '{}'", key));
        }

        s = s[eq + 1..].trim_start();
        s = s
            .strip_prefix('"')
            .ok_or_else(|| format!("value of label '{}' is not quoted", key))?;
        s = skip_label_value(s).ok_or_else(|| format!("value of label '{}' is not terminated", key))?;

        if key != METRIC_NAME_LABEL {
            keys.push(key.to_string());
        }

        s = s.trim_start();
        if let Some(after) = s.strip_prefix(',') {
            s = after;
        } else if !s.starts_with('}') {
            return Err("expected ',' or '}' in label set".to_string());
        }
    }
}

/// Skips a quoted label value up to and including the closing quote.
fn skip_label_value(s: &str) -> Option<&str> {
    let mut escaped = false;
    for (idx, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Some(&s[idx + 1..]);
        }
    }
    None
}

fn parse_value(value: &str) -> Result<f64, String> {
    match value {
        "+Inf" | "Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ => value
            .parse::<f64>()
            .map_err(|_| format!("invalid sample value '{}'", value)),
    }
}

/// The exposition payload could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpositionError {
    line: usize,
    message: String,
}

impl ExpositionError {
    pub fn new<T: Into<String>>(line: usize, message: T) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }

    /// The 1-based line of the offending input; 0 if the payload as a whole
    /// was rejected
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ExpositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "invalid exposition: {}", self.message)
        } else {
            write!(f, "invalid exposition in line {}: {}", self.line, self.message)
        }
    }
}

impl StdError for ExpositionError {}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    const TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

    const PAYLOAD: &str = r#"
# HELP http_requests_total The total number of HTTP requests.
# TYPE http_requests_total counter
http_requests_total{method="post",code="200"} 1027 1395066363000
http_requests_total{method="post",code="400"}    3 1395066363000

# A free comment
orphan_sample 12
# TYPE process_start_time_seconds gauge
process_start_time_seconds 1.6e+09
# HELP build_info Build information with "quotes" and a \\ backslash\nand a newline
# TYPE build_info gauge
build_info{version="1.2.3",revision="abc\"def"} 1
# TYPE http_request_duration_seconds histogram
http_request_duration_seconds_bucket{le="0.05"} 24054
http_request_duration_seconds_bucket{le="+Inf"} 144320
http_request_duration_seconds_sum 53423
"#;

    #[test]
    fn collapses_metric_records() {
        let samples = parse_exposition(PAYLOAD, TEXT, "").unwrap();

        let expected = vec![
            MetricSample::new("http_requests_total", MetricType::Counter)
                .with_help("The total number of HTTP requests.")
                .with_label_keys(vec!["method", "code"]),
            MetricSample::new("process_start_time_seconds", MetricType::Gauge),
            MetricSample::new("build_info", MetricType::Gauge)
                .with_help("Build information with \"quotes\" and a \\ backslash\nand a newline")
                .with_label_keys(vec!["version", "revision"]),
            MetricSample::new("http_request_duration_seconds", MetricType::Histogram)
                .with_label_keys(vec!["le"]),
        ];

        assert_eq!(samples, expected);
    }

    #[test]
    fn filters_by_prefix() {
        let samples = parse_exposition(PAYLOAD, TEXT, "http_").unwrap();
        let names: Vec<&str> = samples.iter().map(|s| s.name().as_str()).collect();
        assert_eq!(names, vec!["http_requests_total", "http_request_duration_seconds"]);
    }

    #[test]
    fn name_label_is_not_a_key() {
        let payload = "# TYPE up gauge\nup{__name__=\"up\",job=\"node\"} 1\n";
        let samples = parse_exposition(payload, "", "").unwrap();
        assert_eq!(samples[0].label_keys(), &["job".to_string()]);
    }

    #[test]
    fn accepts_open_metrics() {
        let payload = "# TYPE foo_seconds gauge\n# UNIT foo_seconds seconds\n# HELP foo_seconds Foo.\nfoo_seconds{a=\"b\"} 1.5 # {trace_id=\"x\"} 1\n# EOF\n# TYPE ignored gauge\nignored 1\n";
        let samples = parse_exposition(payload, "application/openmetrics-text; version=1.0.0", "").unwrap();

        assert_eq!(
            samples,
            vec![MetricSample::new("foo_seconds", MetricType::Gauge)
                .with_help("Foo.")
                .with_label_keys(vec!["a"])]
        );
    }

    #[test]
    fn rejects_protobuf() {
        let err = parse_exposition(
            "",
            "application/vnd.google.protobuf; proto=io.prometheus.client.MetricFamily; encoding=delimited",
            "",
        )
        .unwrap_err();
        assert_eq!(err.line(), 0);
    }

    #[test]
    fn reports_the_offending_line() {
        let err = parse_exposition("# TYPE up gauge\nup{job=\"node} 1\n", TEXT, "").unwrap_err();
        assert_eq!(err.line(), 2);

        let err = parse_exposition("# TYPE up gauge\nup one\n", TEXT, "").unwrap_err();
        assert_eq!(err.line(), 2);

        let err = parse_exposition("# TYPE up wobble\n", TEXT, "").unwrap_err();
        assert_eq!(err.line(), 1);
    }

    #[test]
    fn special_values_are_valid() {
        let payload = "# TYPE a gauge\na NaN\n# TYPE b gauge\nb -Inf\n";
        assert_eq!(parse_exposition(payload, TEXT, "").unwrap().len(), 2);
    }
}
