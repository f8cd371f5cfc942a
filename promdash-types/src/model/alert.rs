//! Alerting rules as returned by the Prometheus rules API
//!
//! See also [Prometheus HTTP API](https://prometheus.io/docs/prometheus/latest/querying/api/#rules)
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

new_type! {
    #[doc="The name of a rule group. Each eligible group becomes one dashboard.\n"]
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct AlertGroupName(String);
}

/// One alerting rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    pub name: String,
    /// The raw PromQL text of the rule
    pub query: String,
    pub annotations: BTreeMap<String, String>,
}

impl AlertRecord {
    pub fn new<N: Into<String>, Q: Into<String>>(name: N, query: Q) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_annotation<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Looks up the per-alert setting `key` stored in the annotation `<prefix><key>`.
    pub fn setting(&self, prefix: &str, key: &str) -> Option<&str> {
        let mut annotation_key = String::with_capacity(prefix.len() + key.len());
        annotation_key.push_str(prefix);
        annotation_key.push_str(key);
        self.annotations.get(&annotation_key).map(String::as_str)
    }

    /// Like `setting` but falls back to `default` when the annotation is absent.
    pub fn setting_or<'a>(&'a self, prefix: &str, key: &str, default: &'a str) -> &'a str {
        self.setting(prefix, key).unwrap_or(default)
    }
}

/// The alerting rules of one rule group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertGroup {
    pub name: AlertGroupName,
    pub alerts: Vec<AlertRecord>,
}

/// Envelope of `GET /api/v1/rules`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<RuleGroups>,
    #[serde(rename = "errorType", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RulesResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Returns the alert groups of a successful response.
    ///
    /// Recording rules are dropped.
    pub fn into_alert_groups(self) -> Vec<AlertGroup> {
        self.data
            .map(|data| data.groups.into_iter().map(RuleGroup::into_alert_group).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleGroups {
    pub groups: Vec<RuleGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleGroup {
    pub name: AlertGroupName,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleGroup {
    pub fn into_alert_group(self) -> AlertGroup {
        let alerts = self
            .rules
            .into_iter()
            .filter_map(|rule| match rule {
                Rule::Alerting(rule) => Some(AlertRecord {
                    name: rule.name,
                    query: rule.query,
                    annotations: rule.annotations,
                }),
                Rule::Recording(_) => None,
            })
            .collect();

        AlertGroup {
            name: self.name,
            alerts,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Rule {
    Alerting(AlertingRule),
    Recording(RecordingRule),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingRule {
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingRule {
    pub name: String,
    pub query: String,
}

#[cfg(test)]
mod test {
    use super::*;

    use serde_json::{self, json};

    #[test]
    fn settings_are_read_with_prefix() {
        let alert = AlertRecord::new("HighLoad", "sum(load) > 3")
            .with_annotation("dash_title", "Load")
            .with_annotation("summary", "load is high");

        assert_eq!(alert.setting("dash_", "title"), Some("Load"));
        assert_eq!(alert.setting("ab_", "title"), None);
        assert_eq!(alert.setting_or("dash_", "legend", "{{instance}}"), "{{instance}}");
    }

    #[test]
    fn rules_response_keeps_only_alerting_rules() {
        let json = json!({
            "status": "success",
            "data": {
                "groups": [
                    {
                        "name": "node",
                        "file": "/etc/prometheus/rules.yml",
                        "interval": 60,
                        "rules": [
                            {
                                "type": "alerting",
                                "name": "InstanceDown",
                                "query": "up == 0",
                                "duration": 300,
                                "labels": {"severity": "page"},
                                "annotations": {"dash_title": "Instances down"},
                                "alerts": [],
                                "health": "ok"
                            },
                            {
                                "type": "recording",
                                "name": "job:up:sum",
                                "query": "sum by(job) (up)",
                                "health": "ok"
                            }
                        ]
                    }
                ]
            }
        });

        let response = serde_json::from_value::<RulesResponse>(json).unwrap();
        assert!(response.is_success());

        let groups = response.into_alert_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name.as_str(), "node");
        assert_eq!(
            groups[0].alerts,
            vec![AlertRecord::new("InstanceDown", "up == 0")
                .with_annotation("dash_title", "Instances down")]
        );
    }

    #[test]
    fn rules_error_response() {
        let json = json!({
            "status": "error",
            "errorType": "unavailable",
            "error": "rule manager not ready"
        });

        let response = serde_json::from_value::<RulesResponse>(json).unwrap();
        assert!(!response.is_success());
        assert_eq!(response.error.as_deref(), Some("rule manager not ready"));
        assert!(response.into_alert_groups().is_empty());
    }
}
