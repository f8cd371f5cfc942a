//! Derives a display format from the suffix of a metric name
use crate::promdash_types::model::format::FormatHint;

const DURATION_SUFFIXES: &[&str] = &[
    "_duration_seconds",
    "_interval_seconds",
    "_range_seconds",
    "_cleanup_seconds",
];

const TIMESTAMP_SUFFIXES: &[&str] = &["_seconds", "_timestamp", "_time"];

/// The format of a metric's current value
pub fn point_format(name: &str) -> FormatHint {
    if name.ends_with("_bytes") {
        return FormatHint::DecBytes;
    }

    if DURATION_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return FormatHint::Seconds;
    }

    if TIMESTAMP_SUFFIXES.iter().any(|s| name.ends_with(s)) {
        return FormatHint::DateTimeAsIso;
    }

    FormatHint::Short
}

/// The format of a metric's rate of change
pub fn range_format(name: &str) -> FormatHint {
    if name.ends_with("_bytes_total") || name.ends_with("_bytes") {
        return FormatHint::BytesPerSecond;
    }

    if name.ends_with("_requests_total") {
        return FormatHint::RequestsPerSecond;
    }

    FormatHint::Short
}

#[test]
fn point_formats() {
    let cases = [
        ("process_resident_memory_bytes", FormatHint::DecBytes),
        ("http_request_duration_seconds", FormatHint::Seconds),
        ("scrape_interval_seconds", FormatHint::Seconds),
        ("query_range_seconds", FormatHint::Seconds),
        ("tsdb_cleanup_seconds", FormatHint::Seconds),
        ("process_start_time_seconds", FormatHint::DateTimeAsIso),
        ("last_success_timestamp", FormatHint::DateTimeAsIso),
        ("boot_time", FormatHint::DateTimeAsIso),
        ("up", FormatHint::Short),
        ("http_requests_total", FormatHint::Short),
    ];

    for (name, expected) in cases.iter() {
        assert_eq!(&point_format(name), expected, "{}", name);
    }
}

#[test]
fn range_formats() {
    let cases = [
        ("network_receive_bytes_total", FormatHint::BytesPerSecond),
        ("heap_bytes", FormatHint::BytesPerSecond),
        ("http_requests_total", FormatHint::RequestsPerSecond),
        ("errors_total", FormatHint::Short),
        ("request_duration_seconds", FormatHint::Short),
    ];

    for (name, expected) in cases.iter() {
        assert_eq!(&range_format(name), expected, "{}", name);
    }
}
