//! Turning alerting rules into panels
//!
//! The query of an alert must be a comparison. If an aggregate without
//! grouping is compared with a scalar, the alert is shown as a singlestat
//! colored by the threshold. Every other comparison becomes a graph of its
//! non-scalar sides with the scalar side drawn as a threshold line.
use std::error::Error as StdError;
use std::fmt;

use crate::convert::escape_query;
use crate::promdash_types::model::{
    alert::AlertRecord,
    format::FormatHint,
    panel::{
        Graph, GraphThreshold, PanelDescription, Singlestat, SinglestatThreshold,
        ThresholdColoring, ThresholdOp, ValueReducer,
    },
};
use crate::promql::{self, BinaryExpr, BinaryOp, Expr, ParseError, ValueType};

pub const DEFAULT_ANNOTATION_PREFIX: &str = "dash_";

const SETTING_FORMAT: &str = "format";
const SETTING_LEGEND: &str = "legend";
const SETTING_TITLE: &str = "title";
const SETTING_DATASOURCE: &str = "datasource";

/// Settings threaded into every analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertSettings {
    /// Overrides are read from annotations named `<annotation_prefix><key>`
    pub annotation_prefix: String,
    /// Used when an alert does not override the datasource
    pub default_datasource: String,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            annotation_prefix: DEFAULT_ANNOTATION_PREFIX.to_string(),
            default_datasource: String::new(),
        }
    }
}

/// Converts an alerting rule into exactly one panel.
pub fn analyze(
    alert: &AlertRecord,
    settings: &AlertSettings,
) -> Result<PanelDescription, QuerySyntaxError> {
    let expr = parse_query(&alert.query).map_err(|err| err.with_alert(alert.name.as_str()))?;
    let comparison = root_comparison(&expr).map_err(|err| err.with_alert(alert.name.as_str()))?;

    let prefix = settings.annotation_prefix.as_str();
    let format = FormatHint::from(alert.setting_or(prefix, SETTING_FORMAT, FormatHint::Short.as_str()));
    let title = alert.setting_or(prefix, SETTING_TITLE, &alert.name).to_string();
    let datasource = alert
        .setting_or(prefix, SETTING_DATASOURCE, &settings.default_datasource)
        .to_string();

    if let Some((aggregate_side, scalar_side, coloring)) = single_value_comparison(comparison) {
        let mut singlestat = Singlestat::new(title, escape_query(&aggregate_side.to_string()));
        singlestat.datasource = datasource;
        singlestat.format = format;
        singlestat.value_reducer = ValueReducer::Current;
        singlestat.threshold = Some(SinglestatThreshold {
            value: scalar_side.to_string(),
            coloring,
        });
        return Ok(singlestat.into());
    }

    let mut graph = Graph::new(title);
    graph.datasource = datasource;
    graph.format = format;
    graph.legend = rewrite_legend(alert.setting_or(prefix, SETTING_LEGEND, ""));
    graph.has_legend = !graph.legend.is_empty();

    for side in [&*comparison.lhs, &*comparison.rhs].iter() {
        if side.is_scalar() {
            if let Some(op) = threshold_op(comparison.op) {
                graph.threshold = Some(GraphThreshold {
                    op,
                    value: side.to_string(),
                });
            }
        } else {
            graph.push_query(escape_query(&side.to_string()));
        }
    }

    Ok(graph.into())
}

fn parse_query(query: &str) -> Result<Expr, QuerySyntaxError> {
    promql::parse(query).map_err(QuerySyntaxError::from)
}

/// The root of an alert query must compare two expressions.
fn root_comparison(expr: &Expr) -> Result<&BinaryExpr, QuerySyntaxError> {
    match expr.as_binary() {
        Some(binary) if binary.op.is_comparison() => Ok(binary),
        Some(binary) => Err(QuerySyntaxError::new(format!(
            "query is not a comparison but uses operator '{}'",
            binary.op
        ))),
        None => Err(QuerySyntaxError::new("query is not a binary expression")),
    }
}

/// Returns the aggregate side, the scalar side and the coloring if the
/// comparison is between an aggregate without grouping and a scalar.
fn single_value_comparison(
    comparison: &BinaryExpr,
) -> Option<(&Expr, &Expr, ThresholdColoring)> {
    let lhs_aggregate = is_ungrouped_aggregate(&comparison.lhs);
    let rhs_aggregate = is_ungrouped_aggregate(&comparison.rhs);

    if lhs_aggregate && comparison.rhs.is_scalar() {
        let coloring = match comparison.op {
            BinaryOp::Lss | BinaryOp::Lte => ThresholdColoring::CriticalLow,
            BinaryOp::Gtr | BinaryOp::Gte => ThresholdColoring::CriticalHigh,
            _ => ThresholdColoring::Unspecified,
        };
        return Some((&*comparison.lhs, &*comparison.rhs, coloring));
    }

    if rhs_aggregate && comparison.lhs.is_scalar() {
        let coloring = match comparison.op {
            BinaryOp::Gtr | BinaryOp::Gte => ThresholdColoring::CriticalLow,
            BinaryOp::Lss | BinaryOp::Lte => ThresholdColoring::CriticalHigh,
            _ => ThresholdColoring::Unspecified,
        };
        return Some((&*comparison.rhs, &*comparison.lhs, coloring));
    }

    None
}

fn is_ungrouped_aggregate(expr: &Expr) -> bool {
    expr.as_aggregate()
        .map(|aggregate| !aggregate.has_grouping())
        .unwrap_or(false)
}

fn threshold_op(op: BinaryOp) -> Option<ThresholdOp> {
    match op {
        BinaryOp::Lss | BinaryOp::Lte => Some(ThresholdOp::Lt),
        BinaryOp::Gtr | BinaryOp::Gte => Some(ThresholdOp::Gt),
        _ => None,
    }
}

/// Annotations cannot hold `{{..}}` since Prometheus templates them.
fn rewrite_legend(legend: &str) -> String {
    legend.replace("[[", "{{").replace("]]", "}}")
}

/// The parts of an alert query as the analyzer sees them
#[derive(Debug, Clone)]
pub struct Explanation {
    pub op: BinaryOp,
    pub lhs: String,
    pub lhs_type: ValueType,
    pub rhs: String,
    pub rhs_type: ValueType,
    pub panel: PanelDescription,
}

/// Explains how a query would be converted.
pub fn explain(query: &str, settings: &AlertSettings) -> Result<Explanation, QuerySyntaxError> {
    let expr = parse_query(query)?;
    let comparison = root_comparison(&expr)?;
    let panel = analyze(&AlertRecord::new("explain", query), settings)?;

    Ok(Explanation {
        op: comparison.op,
        lhs: comparison.lhs.to_string(),
        lhs_type: comparison.lhs.value_type(),
        rhs: comparison.rhs.to_string(),
        rhs_type: comparison.rhs.value_type(),
        panel,
    })
}

/// The query of an alert is not usable.
///
/// Either it does not parse or its root is not a comparison.
#[derive(Debug)]
pub struct QuerySyntaxError {
    alert: Option<String>,
    message: String,
    position: Option<usize>,
    cause: Option<ParseError>,
}

impl QuerySyntaxError {
    pub fn new<T: Into<String>>(message: T) -> Self {
        Self {
            alert: None,
            message: message.into(),
            position: None,
            cause: None,
        }
    }

    pub fn with_alert<T: Into<String>>(mut self, alert: T) -> Self {
        self.alert = Some(alert.into());
        self
    }

    /// The name of the alert whose query failed
    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Byte offset into the query if the query did not parse
    pub fn position(&self) -> Option<usize> {
        self.position
    }
}

impl fmt::Display for QuerySyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref alert) = self.alert {
            write!(f, "invalid query of alert '{}': ", alert)?;
        } else {
            write!(f, "invalid query: ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(position) = self.position {
            write!(f, " (at char {})", position + 1)?;
        }
        Ok(())
    }
}

impl StdError for QuerySyntaxError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|e| e as &dyn StdError)
    }
}

impl From<ParseError> for QuerySyntaxError {
    fn from(err: ParseError) -> Self {
        Self {
            alert: None,
            message: err.message().to_string(),
            position: Some(err.position()),
            cause: Some(err),
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::promdash_types::model::panel::GraphQuery;

    fn settings() -> AlertSettings {
        AlertSettings {
            annotation_prefix: "dash_".to_string(),
            default_datasource: "prometheus".to_string(),
        }
    }

    fn singlestat(panel: PanelDescription) -> Singlestat {
        match panel {
            PanelDescription::Singlestat(singlestat) => singlestat,
            other => panic!("expected a singlestat but got {:?}", other),
        }
    }

    fn graph(panel: PanelDescription) -> Graph {
        match panel {
            PanelDescription::Graph(graph) => graph,
            other => panic!("expected a graph but got {:?}", other),
        }
    }

    #[test]
    fn aggregate_below_scalar_is_critical_low() {
        let alert = AlertRecord::new("TooFewInstances", "sum(up) < 3");
        let panel = singlestat(analyze(&alert, &settings()).unwrap());

        assert_eq!(panel.title, "TooFewInstances");
        assert_eq!(panel.query, "sum(up)");
        assert_eq!(
            panel.threshold,
            Some(SinglestatThreshold {
                value: "3".to_string(),
                coloring: ThresholdColoring::CriticalLow,
            })
        );
        assert_eq!(panel.value_reducer, ValueReducer::Current);
        assert_eq!(panel.datasource, "prometheus");
        assert_eq!(panel.format, FormatHint::Short);
    }

    #[test]
    fn aggregate_above_scalar_is_critical_high() {
        let alert = AlertRecord::new("HighErrorRate", "sum(rate(errors_total[5m])) >= 0.5");
        let panel = singlestat(analyze(&alert, &settings()).unwrap());

        assert_eq!(panel.query, "sum(rate(errors_total[5m]))");
        let threshold = panel.threshold.unwrap();
        assert_eq!(threshold.value, "0.5");
        assert_eq!(threshold.coloring, ThresholdColoring::CriticalHigh);
    }

    #[test]
    fn aggregate_on_the_right_mirrors_coloring() {
        let alert = AlertRecord::new("A", "3 > sum(up)");
        let panel = singlestat(analyze(&alert, &settings()).unwrap());
        assert_eq!(panel.query, "sum(up)");
        assert_eq!(panel.threshold.unwrap().coloring, ThresholdColoring::CriticalLow);

        let alert = AlertRecord::new("B", "3 <= sum(up)");
        let panel = singlestat(analyze(&alert, &settings()).unwrap());
        assert_eq!(panel.threshold.unwrap().coloring, ThresholdColoring::CriticalHigh);
    }

    #[test]
    fn equality_sets_no_coloring() {
        let alert = AlertRecord::new("NoLeader", "max(has_leader) == 0");
        let panel = singlestat(analyze(&alert, &settings()).unwrap());
        let threshold = panel.threshold.unwrap();
        assert_eq!(threshold.value, "0");
        assert_eq!(threshold.coloring, ThresholdColoring::Unspecified);
    }

    #[test]
    fn scalar_side_is_printed_canonically() {
        let alert = AlertRecord::new("Latency", "avg(latency_seconds) > (0.25 * 4)");
        let panel = singlestat(analyze(&alert, &settings()).unwrap());
        assert_eq!(panel.threshold.unwrap().value, "(0.25 * 4)");
    }

    #[test]
    fn grouped_aggregate_becomes_a_graph() {
        let alert = AlertRecord::new("JobDown", "sum by (job) (up) < 1");
        let panel = graph(analyze(&alert, &settings()).unwrap());

        assert_eq!(
            panel.queries,
            vec![GraphQuery {
                query: "sum by(job) (up)".to_string(),
                has_more: false,
            }]
        );
        assert_eq!(
            panel.threshold,
            Some(GraphThreshold {
                op: ThresholdOp::Lt,
                value: "1".to_string(),
            })
        );
        assert!(!panel.has_legend);
    }

    #[test]
    fn vector_comparison_plots_both_sides() {
        let alert = AlertRecord::new("DiskFull", "node_filesystem_free_bytes{mountpoint=\"/\"} < node_filesystem_size_bytes * 0.1");
        let panel = graph(analyze(&alert, &settings()).unwrap());

        assert_eq!(
            panel.queries,
            vec![
                GraphQuery {
                    query: "node_filesystem_free_bytes{mountpoint=\\\"/\\\"}".to_string(),
                    has_more: true,
                },
                GraphQuery {
                    query: "node_filesystem_size_bytes * 0.1".to_string(),
                    has_more: false,
                },
            ]
        );
        assert_eq!(panel.threshold, None);
    }

    #[test]
    fn equality_against_scalar_draws_no_line() {
        let alert = AlertRecord::new("InstanceDown", "up == 0");
        let panel = graph(analyze(&alert, &settings()).unwrap());
        assert_eq!(panel.queries.len(), 1);
        assert_eq!(panel.threshold, None);
    }

    #[test]
    fn scalar_comparison_plots_nothing() {
        let alert = AlertRecord::new("AlwaysFiring", "1 < bool 2");
        let panel = graph(analyze(&alert, &settings()).unwrap());
        assert!(panel.queries.is_empty());
        assert_eq!(
            panel.threshold,
            Some(GraphThreshold {
                op: ThresholdOp::Lt,
                value: "2".to_string(),
            })
        );
    }

    #[test]
    fn overrides_from_annotations() {
        let alert = AlertRecord::new("InstanceDown", "up{job=\"node\"} < 1")
            .with_annotation("dash_title", "Node instances")
            .with_annotation("dash_legend", "[[instance]]")
            .with_annotation("dash_format", "percent")
            .with_annotation("dash_datasource", "thanos")
            .with_annotation("ab_title", "ignored");

        let panel = graph(analyze(&alert, &settings()).unwrap());
        assert_eq!(panel.title, "Node instances");
        assert_eq!(panel.legend, "{{instance}}");
        assert!(panel.has_legend);
        assert_eq!(panel.format, FormatHint::Other("percent".to_string()));
        assert_eq!(panel.datasource, "thanos");
        assert_eq!(panel.queries[0].query, "up{job=\\\"node\\\"}");
    }

    #[test]
    fn custom_prefix() {
        let alert = AlertRecord::new("A", "sum(up) < 1").with_annotation("ab_title", "Up");
        let settings = AlertSettings {
            annotation_prefix: "ab_".to_string(),
            ..AlertSettings::default()
        };
        assert_eq!(analyze(&alert, &settings).unwrap().title(), "Up");
    }

    #[test]
    fn unparsable_query_names_the_alert() {
        let alert = AlertRecord::new("Broken", "sum(up");
        let err = analyze(&alert, &settings()).unwrap_err();
        assert_eq!(err.alert(), Some("Broken"));
        assert!(err.position().is_some());
        assert!(err.source().is_some());
    }

    #[test]
    fn root_must_be_a_comparison() {
        for query in ["up", "sum(up)", "a + b", "a and b"].iter() {
            let alert = AlertRecord::new("NotAComparison", *query);
            let err = analyze(&alert, &settings()).unwrap_err();
            assert_eq!(err.alert(), Some("NotAComparison"), "{}", query);
            assert_eq!(err.position(), None, "{}", query);
        }
    }

    #[test]
    fn explain_reports_both_sides() {
        let explanation = explain("sum(up) by (job) > 2", &AlertSettings::default()).unwrap();
        assert_eq!(explanation.op, BinaryOp::Gtr);
        assert_eq!(explanation.lhs, "sum by(job) (up)");
        assert_eq!(explanation.lhs_type, ValueType::Vector);
        assert_eq!(explanation.rhs, "2");
        assert_eq!(explanation.rhs_type, ValueType::Scalar);
        assert!(matches!(explanation.panel, PanelDescription::Graph(_)));
    }
}
