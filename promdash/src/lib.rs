//! # promdash
//!
//! Generates Grafana dashboards from what a Prometheus setup already knows.
//!
//! Two kinds of dashboards are produced:
//!
//! * **Alert dashboards** show one panel per alerting rule of a rule group.
//!   The PromQL expression of a rule is parsed and its comparison decides
//!   whether the alert is shown as a graph with a threshold line or as a
//!   colored single value.
//! * **Drilldown dashboards** show the metrics of a single exposition
//!   endpoint. Each metric is converted by the first converter in a
//!   `Registry` which recognizes its type and name.
//!
//! Panels are laid out on Grafana's grid, rendered to Grafana's JSON model
//! and published through the Grafana HTTP API.
//!
//! ## Features
//!
//! * `reqwest` (default): an HTTP transport based on `reqwest`
//! * `cli` (default): the `promdash` binary
//! * `log`: a `LoggingAdapter` for the `log` crate
//! * `slog`: a `LoggingAdapter` for `slog`
#![recursion_limit = "256"]

pub use promdash_types;
pub use promdash_types::Error;

pub mod alert;
pub mod api;
pub mod config;
pub mod convert;
pub mod drivers;
pub mod exposition;
pub mod format;
pub mod layout;
pub mod logging;
pub mod promql;
pub mod render;
