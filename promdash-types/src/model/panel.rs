//! Panel descriptions produced by the converters and the alert analyzer
//!
//! A panel description is renderer agnostic. Its grid position stays unset
//! until the layout engine assigns one.
use std::fmt;

use serde::{Deserialize, Serialize};

use super::format::FormatHint;

/// Position and size of a panel on the dashboard grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GridPos {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl GridPos {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
}

/// Direction of a graph threshold line
///
/// `Lt` fills the area below the value, `Gt` the area above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdOp {
    Lt,
    Gt,
}

impl ThresholdOp {
    pub fn as_str(self) -> &'static str {
        match self {
            ThresholdOp::Lt => "lt",
            ThresholdOp::Gt => "gt",
        }
    }
}

impl fmt::Display for ThresholdOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A threshold line drawn on a graph
///
/// Operator and value always travel together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphThreshold {
    pub op: ThresholdOp,
    pub value: String,
}

/// Which end of the value range is colored as critical on a singlestat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdColoring {
    /// Values below the threshold are critical
    CriticalLow,
    /// Values above the threshold are critical
    CriticalHigh,
    /// No coloring, e.g. for equality comparisons
    Unspecified,
}

impl ThresholdColoring {
    pub fn invert_yes(self) -> bool {
        self == ThresholdColoring::CriticalLow
    }

    pub fn invert_no(self) -> bool {
        self == ThresholdColoring::CriticalHigh
    }
}

impl Default for ThresholdColoring {
    fn default() -> Self {
        ThresholdColoring::Unspecified
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinglestatThreshold {
    pub value: String,
    pub coloring: ThresholdColoring,
}

/// How a singlestat reduces its series to one displayed value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueReducer {
    Current,
    Name,
}

impl ValueReducer {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueReducer::Current => "current",
            ValueReducer::Name => "name",
        }
    }
}

impl Default for ValueReducer {
    fn default() -> Self {
        ValueReducer::Current
    }
}

/// A query plotted on a graph.
///
/// The text is stored template-escaped (`"` as `\"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQuery {
    pub query: String,
    /// Another query follows this one on the same graph
    pub has_more: bool,
}

/// A time series panel
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Graph {
    pub title: String,
    pub description: String,
    pub datasource: String,
    pub format: FormatHint,
    pub legend: String,
    pub has_legend: bool,
    pub queries: Vec<GraphQuery>,
    pub threshold: Option<GraphThreshold>,
    pub grid_pos: Option<GridPos>,
}

impl Graph {
    pub fn new<T: Into<String>>(title: T) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Appends a query and marks the previous one as having a sibling.
    pub fn push_query<T: Into<String>>(&mut self, query: T) {
        if let Some(last) = self.queries.last_mut() {
            last.has_more = true;
        }
        self.queries.push(GraphQuery {
            query: query.into(),
            has_more: false,
        });
    }

    pub fn with_query<T: Into<String>>(mut self, query: T) -> Self {
        self.push_query(query);
        self
    }
}

/// A single value panel
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Singlestat {
    pub title: String,
    pub description: String,
    pub datasource: String,
    pub format: FormatHint,
    pub legend: String,
    /// The only query; template-escaped
    pub query: String,
    pub threshold: Option<SinglestatThreshold>,
    pub value_reducer: ValueReducer,
    pub grid_pos: Option<GridPos>,
}

impl Singlestat {
    pub fn new<T: Into<String>, Q: Into<String>>(title: T, query: Q) -> Self {
        Self {
            title: title.into(),
            query: query.into(),
            ..Default::default()
        }
    }
}

/// A full width section header
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RowHeader {
    pub title: String,
    pub grid_pos: Option<GridPos>,
}

impl RowHeader {
    pub fn new<T: Into<String>>(title: T) -> Self {
        Self {
            title: title.into(),
            grid_pos: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PanelDescription {
    Graph(Graph),
    Singlestat(Singlestat),
    RowHeader(RowHeader),
}

impl PanelDescription {
    pub fn title(&self) -> &str {
        match self {
            PanelDescription::Graph(p) => &p.title,
            PanelDescription::Singlestat(p) => &p.title,
            PanelDescription::RowHeader(p) => &p.title,
        }
    }

    pub fn grid_pos(&self) -> Option<GridPos> {
        match self {
            PanelDescription::Graph(p) => p.grid_pos,
            PanelDescription::Singlestat(p) => p.grid_pos,
            PanelDescription::RowHeader(p) => p.grid_pos,
        }
    }

    pub fn set_grid_pos(&mut self, grid_pos: GridPos) {
        match self {
            PanelDescription::Graph(p) => p.grid_pos = Some(grid_pos),
            PanelDescription::Singlestat(p) => p.grid_pos = Some(grid_pos),
            PanelDescription::RowHeader(p) => p.grid_pos = Some(grid_pos),
        }
    }

    /// The first query of a graph or the query of a singlestat
    pub fn primary_query(&self) -> Option<&str> {
        match self {
            PanelDescription::Graph(p) => p.queries.first().map(|q| q.query.as_str()),
            PanelDescription::Singlestat(p) => Some(p.query.as_str()),
            PanelDescription::RowHeader(_) => None,
        }
    }

    pub fn is_row_header(&self) -> bool {
        matches!(self, PanelDescription::RowHeader(_))
    }
}

impl From<Graph> for PanelDescription {
    fn from(p: Graph) -> Self {
        PanelDescription::Graph(p)
    }
}

impl From<Singlestat> for PanelDescription {
    fn from(p: Singlestat) -> Self {
        PanelDescription::Singlestat(p)
    }
}

impl From<RowHeader> for PanelDescription {
    fn from(p: RowHeader) -> Self {
        PanelDescription::RowHeader(p)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn push_query_marks_predecessor() {
        let graph = Graph::new("errors").with_query("a").with_query("b");

        assert_eq!(
            graph.queries,
            vec![
                GraphQuery {
                    query: "a".to_string(),
                    has_more: true
                },
                GraphQuery {
                    query: "b".to_string(),
                    has_more: false
                },
            ]
        );
    }

    #[test]
    fn coloring_flags() {
        assert!(ThresholdColoring::CriticalLow.invert_yes());
        assert!(!ThresholdColoring::CriticalLow.invert_no());
        assert!(ThresholdColoring::CriticalHigh.invert_no());
        assert!(!ThresholdColoring::Unspecified.invert_yes());
        assert!(!ThresholdColoring::Unspecified.invert_no());
    }

    #[test]
    fn primary_query() {
        let row: PanelDescription = RowHeader::new("http").into();
        assert_eq!(row.primary_query(), None);

        let stat: PanelDescription = Singlestat::new("up", "sum(up)").into();
        assert_eq!(stat.primary_query(), Some("sum(up)"));

        let graph: PanelDescription = Graph::new("empty").into();
        assert_eq!(graph.primary_query(), None);
    }

    #[test]
    fn grid_pos_is_unset_until_assigned() {
        let mut panel: PanelDescription = Graph::new("g").into();
        assert_eq!(panel.grid_pos(), None);
        panel.set_grid_pos(GridPos::new(0, 5, 12, 5));
        assert_eq!(panel.grid_pos(), Some(GridPos::new(0, 5, 12, 5)));
    }
}
