//! Dropdown filters, filter links and the option sources they share with form fields.

use serde::{Deserialize, Serialize};

/// One selectable value for a dropdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        SelectOption {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Where dropdown options come from. A query is captured at build time and run
/// by the executor when a form is rendered; its first column is the value and
/// its second (if any) the label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionSource {
    Static(Vec<SelectOption>),
    Query(String),
}

impl Default for OptionSource {
    fn default() -> Self {
        OptionSource::Static(Vec::new())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilterDefinition {
    /// Column or expression compared with `=`.
    pub column: String,
    pub label: String,
    pub options: OptionSource,
    /// Cast applied to the bound value, e.g. `integer`. Values arrive as text.
    pub pg_type: Option<String>,
}

impl FilterDefinition {
    /// State key holding the selected value for the filter at `index`.
    pub fn state_key(index: usize) -> String {
        format!("dropdowns_{}", index)
    }
}

/// Author-written predicate toggled as the single active link.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterLinkDefinition {
    pub label: String,
    pub raw_condition: String,
}
