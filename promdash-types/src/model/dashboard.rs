//! The dashboard wrapper around a list of laid out panels
use serde::{Deserialize, Serialize};

use super::panel::PanelDescription;

new_type! {
    #[doc="The title of a dashboard. Publishing a dashboard with an existing title overwrites it.\n"]
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DashboardTitle(String);
}

new_type! {
    #[doc="The name of the datasource panels query.\n\n"]
    #[doc="An empty datasource means the default datasource of the dashboard server.\n"]
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Datasource(String, env="DATASOURCE");
}

/// A templating variable bound to the values of a label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub datasource: String,
    /// `label_values(<query>, <label>)`
    pub query: String,
}

impl Variable {
    pub fn label_values<N: Into<String>, D: Into<String>>(name: N, datasource: D, query: &str) -> Self {
        let name = name.into();
        let query = format!("label_values({}, {})", query, name);
        Self {
            name,
            datasource: datasource.into(),
            query,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    pub title: DashboardTitle,
    pub panels: Vec<PanelDescription>,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl Dashboard {
    pub fn new<T: Into<DashboardTitle>>(title: T, panels: Vec<PanelDescription>) -> Self {
        Self {
            title: title.into(),
            panels,
            variables: Vec::new(),
        }
    }

    /// Creates one variable per label from the first graph or singlestat query.
    ///
    /// Without such a panel no variables are created.
    pub fn derive_variables<I, S>(&mut self, labels: I, datasource: &str)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let query = match self.panels.iter().find_map(PanelDescription::primary_query) {
            Some(query) => query.to_string(),
            None => {
                self.variables.clear();
                return;
            }
        };

        self.variables = labels
            .into_iter()
            .map(|label| Variable::label_values(label, datasource, &query))
            .collect();
    }
}
