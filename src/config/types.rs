//! Raw module definitions as read from JSON. Resolved through the builders by [`super::resolve`].

use crate::schema::{ActionScope, Control, NamedFormat, OptionSource, Pagination, SortDirection};
use crate::service::Capabilities;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_primary_key() -> String {
    "id".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub format: Option<NamedFormat>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterConfig {
    pub column: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub options: OptionSource,
    /// Postgres type the selected value is cast to; filled from the catalog when absent.
    #[serde(default, rename = "type")]
    pub pg_type: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterLinkConfig {
    pub label: String,
    /// Trusted SQL predicate, inserted as written.
    pub condition: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionConfig {
    pub name: String,
    pub scope: ActionScope,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(default, rename = "type")]
    pub pg_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub control: Option<Control>,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub options: Option<OptionSource>,
    #[serde(default)]
    pub datalist: Vec<String>,
    #[serde(default)]
    pub accept: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub required_on_create: bool,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub help: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderConfig {
    pub column: String,
    #[serde(default)]
    pub sort: SortDirection,
}

/// One module file. `key` addresses the module in routes, grants and state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub key: String,
    pub table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub primary_key_type: Option<String>,
    #[serde(default)]
    pub joins: Vec<String>,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
    #[serde(default)]
    pub filter_links: Vec<FilterLinkConfig>,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
    #[serde(default)]
    pub order_by: Option<OrderConfig>,
    #[serde(default)]
    pub date_column: Option<String>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub capabilities: Capabilities,
    /// Trusted predicate AND-ed into every listing of the module.
    #[serde(default)]
    pub scope: Option<String>,
}

/// A module file holds either one module or a list of them.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ModuleFile {
    Many(Vec<ModuleConfig>),
    One(Box<ModuleConfig>),
}

impl ModuleFile {
    pub fn into_vec(self) -> Vec<ModuleConfig> {
        match self {
            ModuleFile::Many(v) => v,
            ModuleFile::One(m) => vec![*m],
        }
    }
}
