//! Types flowing through a conversion run
//!
//! Metric samples and alert records are the input of a run, panel
//! descriptions and dashboards its output.
pub mod alert;
pub mod dashboard;
pub mod format;
pub mod metric;
pub mod panel;
