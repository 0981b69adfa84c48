//! Listing columns and their display formatting.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Custom formatter: `(column name, raw value) -> rendered value`.
pub type FormatFn = Arc<dyn Fn(&str, &Value) -> Value + Send + Sync>;

/// Built-in display formats, selectable from config files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum NamedFormat {
    /// `YYYY-MM-DD` from a date or timestamp.
    Date,
    /// `YYYY-MM-DD HH:MM` from a timestamp.
    DateTime,
    /// Booleans (and 0/1) as `Yes` / `No`.
    YesNo,
    /// Fixed number of decimals.
    Decimal { places: u8 },
    /// Cut text to at most `max` characters, appending an ellipsis.
    Truncate { max: usize },
}

/// Tagged formatting strategy for a column.
#[derive(Clone)]
pub enum Formatter {
    Named(NamedFormat),
    Custom(FormatFn),
}

impl fmt::Debug for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formatter::Named(n) => f.debug_tuple("Named").field(n).finish(),
            Formatter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Formatter {
    pub fn apply(&self, column: &str, value: &Value) -> Value {
        match self {
            Formatter::Named(named) => crate::format::apply_named(named, value),
            Formatter::Custom(f) => f(column, value),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ColumnDefinition {
    /// Alias used in SELECT, ORDER BY and result rows.
    pub name: String,
    pub label: String,
    /// SQL fragment selected for this column (author-written).
    pub expression: String,
    pub sortable: bool,
    pub searchable: bool,
    pub formatter: Option<Formatter>,
}

impl ColumnDefinition {
    pub fn format_value(&self, value: &Value) -> Value {
        match &self.formatter {
            Some(f) => f.apply(&self.name, value),
            None => value.clone(),
        }
    }
}
