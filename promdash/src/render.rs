//! Rendering dashboards as Grafana JSON models
//!
//! Panels must have been laid out before rendering. A panel without a
//! position is rendered at the origin.
use serde_json::{json, Value};

use crate::promdash_types::model::{
    dashboard::{Dashboard, Variable},
    panel::{
        Graph, GraphThreshold, GridPos, PanelDescription, RowHeader, Singlestat, ThresholdColoring,
    },
};

const COLOR_OK: &str = "#299c46";
const COLOR_WARN: &str = "rgba(237, 129, 40, 0.89)";
const COLOR_CRITICAL: &str = "#d44a3a";

/// Renders the complete dashboard model.
pub fn render(dashboard: &Dashboard) -> Value {
    let panels: Vec<Value> = dashboard
        .panels
        .iter()
        .enumerate()
        .map(|(idx, panel)| render_panel(panel, idx as u64 + 1))
        .collect();

    let variables: Vec<Value> = dashboard.variables.iter().map(render_variable).collect();

    json!({
        "annotations": {
            "list": [{
                "builtIn": 1,
                "datasource": "-- Grafana --",
                "enable": true,
                "hide": true,
                "iconColor": "rgba(0, 211, 255, 1)",
                "name": "Annotations & Alerts",
                "type": "dashboard"
            }]
        },
        "editable": true,
        "gnetId": null,
        "graphTooltip": 0,
        "links": [],
        "panels": panels,
        "schemaVersion": 22,
        "style": "dark",
        "tags": [],
        "templating": { "list": variables },
        "time": { "from": "now-1h", "to": "now" },
        "timepicker": {
            "refresh_intervals": ["5s", "10s", "30s", "1m", "5m", "15m", "30m", "1h", "2h", "1d"],
            "time_options": ["5m", "15m", "1h", "6h", "12h", "24h", "2d", "7d", "30d"]
        },
        "timezone": "",
        "title": dashboard.title.as_str()
    })
}

pub fn render_panel(panel: &PanelDescription, id: u64) -> Value {
    match panel {
        PanelDescription::Graph(graph) => render_graph(graph, id),
        PanelDescription::Singlestat(singlestat) => render_singlestat(singlestat, id),
        PanelDescription::RowHeader(row) => render_row(row, id),
    }
}

fn render_graph(graph: &Graph, id: u64) -> Value {
    let targets: Vec<Value> = graph
        .queries
        .iter()
        .enumerate()
        .map(|(idx, query)| {
            json!({
                "expr": decode_query(&query.query),
                "format": "time_series",
                "intervalFactor": 1,
                "legendFormat": graph.legend,
                "refId": ref_id(idx)
            })
        })
        .collect();

    let thresholds: Vec<Value> = graph.threshold.iter().map(render_graph_threshold).collect();

    let show_legend = graph.has_legend;

    json!({
        "aliasColors": {},
        "bars": false,
        "dashLength": 10,
        "dashes": false,
        "datasource": datasource(&graph.datasource),
        "description": graph.description,
        "fill": 1,
        "fillGradient": 0,
        "gridPos": grid_pos(graph.grid_pos),
        "hiddenSeries": false,
        "id": id,
        "legend": {
            "avg": false,
            "current": false,
            "hideEmpty": true,
            "hideZero": true,
            "max": false,
            "min": false,
            "show": show_legend,
            "alignAsTable": show_legend,
            "total": show_legend,
            "values": show_legend
        },
        "lines": true,
        "linewidth": 1,
        "links": [],
        "nullPointMode": "null",
        "percentage": false,
        "pointradius": 2,
        "points": false,
        "renderer": "flot",
        "seriesOverrides": [],
        "spaceLength": 10,
        "stack": false,
        "steppedLine": false,
        "targets": targets,
        "thresholds": thresholds,
        "timeFrom": null,
        "timeRegions": [],
        "timeShift": null,
        "title": graph.title,
        "tooltip": { "shared": true, "sort": 2, "value_type": "individual" },
        "type": "graph",
        "xaxis": { "buckets": null, "mode": "time", "name": null, "show": true, "values": [] },
        "yaxes": [
            { "format": graph.format.as_str(), "label": null, "logBase": 1, "max": null, "min": null, "show": true },
            { "format": "short", "label": null, "logBase": 1, "max": null, "min": null, "show": true }
        ],
        "yaxis": { "align": false, "alignLevel": null }
    })
}

fn render_graph_threshold(threshold: &GraphThreshold) -> Value {
    json!({
        "colorMode": "critical",
        "fill": true,
        "line": true,
        "op": threshold.op.as_str(),
        "value": threshold_value(&threshold.value),
        "yaxis": "left"
    })
}

fn render_singlestat(singlestat: &Singlestat, id: u64) -> Value {
    let coloring = singlestat
        .threshold
        .as_ref()
        .map(|t| t.coloring)
        .unwrap_or_default();
    let colors: Vec<&str> = match coloring {
        ThresholdColoring::CriticalLow => vec![COLOR_CRITICAL, COLOR_WARN, COLOR_OK],
        ThresholdColoring::CriticalHigh => vec![COLOR_OK, COLOR_WARN, COLOR_CRITICAL],
        ThresholdColoring::Unspecified => Vec::new(),
    };
    let thresholds = singlestat
        .threshold
        .as_ref()
        .map(|t| format!("{},{}", t.value, t.value))
        .unwrap_or_default();

    json!({
        "cacheTimeout": null,
        "colorBackground": false,
        "colorValue": true,
        "colors": colors,
        "datasource": datasource(&singlestat.datasource),
        "description": singlestat.description,
        "format": singlestat.format.as_str(),
        "gauge": {
            "maxValue": 100,
            "minValue": 0,
            "show": false,
            "thresholdLabels": false,
            "thresholdMarkers": true
        },
        "gridPos": grid_pos(singlestat.grid_pos),
        "id": id,
        "interval": null,
        "links": [],
        "mappingType": 1,
        "mappingTypes": [
            { "name": "value to text", "value": 1 },
            { "name": "range to text", "value": 2 }
        ],
        "maxDataPoints": 100,
        "nullPointMode": "connected",
        "nullText": null,
        "postfix": "",
        "postfixFontSize": "50%",
        "prefix": "",
        "prefixFontSize": "50%",
        "rangeMaps": [{ "from": "null", "text": "N/A", "to": "null" }],
        "sparkline": {
            "fillColor": "rgba(31, 118, 189, 0.18)",
            "full": false,
            "lineColor": "rgb(31, 120, 193)",
            "show": false
        },
        "tableColumn": "",
        "targets": [{
            "expr": decode_query(&singlestat.query),
            "format": "time_series",
            "instant": true,
            "intervalFactor": 1,
            "legendFormat": singlestat.legend,
            "refId": "A"
        }],
        "thresholds": thresholds,
        "timeFrom": null,
        "timeShift": null,
        "title": singlestat.title,
        "type": "singlestat",
        "valueFontSize": "80%",
        "valueMaps": [{ "op": "=", "text": "N/A", "value": "null" }],
        "valueName": singlestat.value_reducer.as_str()
    })
}

fn render_row(row: &RowHeader, id: u64) -> Value {
    json!({
        "collapsed": false,
        "gridPos": grid_pos(row.grid_pos),
        "id": id,
        "panels": [],
        "title": row.title,
        "type": "row"
    })
}

fn render_variable(variable: &Variable) -> Value {
    let query = decode_query(&variable.query);

    json!({
        "allValue": null,
        "current": {},
        "datasource": datasource(&variable.datasource),
        "definition": query,
        "hide": 0,
        "includeAll": true,
        "label": null,
        "multi": true,
        "name": variable.name,
        "options": [],
        "query": query,
        "refresh": 1,
        "regex": "",
        "skipUrlSync": false,
        "sort": 1,
        "tagValuesQuery": "",
        "tags": [],
        "tagsQuery": "",
        "type": "query",
        "useTags": false
    })
}

fn grid_pos(pos: Option<GridPos>) -> Value {
    let pos = pos.unwrap_or_default();
    json!({ "h": pos.h, "w": pos.w, "x": pos.x, "y": pos.y })
}

/// An empty datasource selects the default datasource of Grafana.
fn datasource(name: &str) -> Value {
    if name.is_empty() {
        Value::Null
    } else {
        Value::String(name.to_string())
    }
}

/// Reverses the quote escaping applied to stored queries.
fn decode_query(query: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", query)).unwrap_or_else(|_| query.to_string())
}

/// Plain numbers are emitted as JSON numbers, anything else verbatim.
fn threshold_value(value: &str) -> Value {
    value
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(value.to_string()))
}

/// `A`, `B`, ..., `Z`, `AA`, `AB`, ...
fn ref_id(mut idx: usize) -> String {
    let mut id = Vec::new();
    loop {
        id.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    id.reverse();
    String::from_utf8_lossy(&id).into_owned()
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::convert::{ConversionOptions, Registry};
    use crate::promdash_types::model::{
        metric::{MetricSample, MetricType},
        panel::{SinglestatThreshold, ThresholdOp},
    };

    #[test]
    fn ref_ids() {
        assert_eq!(ref_id(0), "A");
        assert_eq!(ref_id(1), "B");
        assert_eq!(ref_id(25), "Z");
        assert_eq!(ref_id(26), "AA");
        assert_eq!(ref_id(27), "AB");
    }

    #[test]
    fn graph_panel() {
        let mut graph = Graph::new("Disk")
            .with_query("node_filesystem_free_bytes{mountpoint=\\\"/\\\"}")
            .with_query("node_filesystem_size_bytes");
        graph.legend = "{{instance}}".to_string();
        graph.has_legend = true;
        graph.datasource = "prom".to_string();
        graph.threshold = Some(GraphThreshold {
            op: ThresholdOp::Lt,
            value: "1".to_string(),
        });
        graph.grid_pos = Some(GridPos::new(12, 5, 12, 5));

        let value = render_panel(&graph.into(), 3);

        assert_eq!(value["id"], json!(3));
        assert_eq!(value["type"], json!("graph"));
        assert_eq!(value["datasource"], json!("prom"));
        assert_eq!(value["gridPos"], json!({"h": 5, "w": 12, "x": 12, "y": 5}));
        assert_eq!(value["legend"]["show"], json!(true));
        assert_eq!(
            value["targets"][0]["expr"],
            json!("node_filesystem_free_bytes{mountpoint=\"/\"}")
        );
        assert_eq!(value["targets"][0]["refId"], json!("A"));
        assert_eq!(value["targets"][1]["refId"], json!("B"));
        assert_eq!(value["targets"][1]["legendFormat"], json!("{{instance}}"));
        assert_eq!(
            value["thresholds"],
            json!([{
                "colorMode": "critical",
                "fill": true,
                "line": true,
                "op": "lt",
                "value": 1.0,
                "yaxis": "left"
            }])
        );
        assert_eq!(value["yaxes"][0]["format"], json!("short"));
    }

    #[test]
    fn singlestat_panel() {
        let mut singlestat = Singlestat::new("Instances", "sum(up)");
        singlestat.threshold = Some(SinglestatThreshold {
            value: "3".to_string(),
            coloring: ThresholdColoring::CriticalLow,
        });

        let value = render_panel(&singlestat.into(), 1);

        assert_eq!(value["type"], json!("singlestat"));
        assert_eq!(value["datasource"], Value::Null);
        assert_eq!(value["colors"], json!([COLOR_CRITICAL, COLOR_WARN, COLOR_OK]));
        assert_eq!(value["thresholds"], json!("3,3"));
        assert_eq!(value["valueName"], json!("current"));
        assert_eq!(value["targets"][0]["instant"], json!(true));
        assert_eq!(value["gridPos"], json!({"h": 0, "w": 0, "x": 0, "y": 0}));
    }

    #[test]
    fn dashboard_model() {
        let mut dashboard = Dashboard::new(
            "node",
            vec![
                RowHeader::new("node_cpu").into(),
                Graph::new("cpu").with_query("rate(node_cpu_seconds_total[5m])").into(),
            ],
        );
        dashboard.derive_variables(vec!["instance"], "");

        let value = render(&dashboard);

        assert_eq!(value["title"], json!("node"));
        assert_eq!(value["panels"][0]["type"], json!("row"));
        assert_eq!(value["panels"][0]["collapsed"], json!(false));
        assert_eq!(value["panels"][0]["id"], json!(1));
        assert_eq!(value["panels"][1]["id"], json!(2));
        assert_eq!(value["templating"]["list"][0]["name"], json!("instance"));
        assert_eq!(
            value["templating"]["list"][0]["query"],
            json!("label_values(rate(node_cpu_seconds_total[5m]), instance)")
        );
        assert_eq!(value["time"], json!({"from": "now-1h", "to": "now"}));
    }

    #[test]
    fn variable_queries_are_unescaped() {
        let sample = MetricSample::new("http_requests_total", MetricType::Counter)
            .with_label_keys(vec!["job", "method"]);
        let options = ConversionOptions {
            selector_labels: vec!["job".to_string()],
            ..ConversionOptions::default()
        };
        let panels = Registry::default().convert(&sample, &options).unwrap();
        let mut dashboard = Dashboard::new("http", panels);
        dashboard.derive_variables(vec!["job"], "");

        let value = render(&dashboard);

        assert_eq!(
            value["panels"][0]["targets"][0]["expr"],
            json!("rate(http_requests_total{job=\"$job\"}[5m])")
        );
        let variable = &value["templating"]["list"][0];
        assert_eq!(
            variable["query"],
            json!("label_values(rate(http_requests_total{job=\"$job\"}[5m]), job)")
        );
        assert_eq!(variable["definition"], variable["query"]);
    }

    #[test]
    fn non_numeric_threshold_is_kept_as_text() {
        assert_eq!(threshold_value("0.5"), json!(0.5));
        assert_eq!(threshold_value("(0.25 * 4)"), json!("(0.25 * 4)"));
    }
}
