//! Compiled listing schema.

use super::{ActionDefinition, ActionScope, ColumnDefinition, FilterDefinition, FilterLinkDefinition};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn flipped(&self) -> SortDirection {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            _ => Err(format!("invalid sort direction: {} (expected ASC or DESC)", s)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub default_per_page: u32,
    pub allowed_per_page: Vec<u32>,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            default_per_page: 25,
            allowed_per_page: vec![10, 25, 50, 100],
        }
    }
}

impl Pagination {
    pub fn allows(&self, per_page: u32) -> bool {
        self.allowed_per_page.contains(&per_page)
    }
}

#[derive(Clone, Debug)]
pub struct TableSchema {
    pub table: String,
    /// Full JOIN clauses, in declaration order.
    pub joins: Vec<String>,
    pub primary_key: String,
    /// Cast applied to bound ids, e.g. `uuid`.
    pub primary_key_type: Option<String>,
    pub columns: Vec<ColumnDefinition>,
    pub filters: Vec<FilterDefinition>,
    pub filter_links: Vec<FilterLinkDefinition>,
    pub actions: Vec<ActionDefinition>,
    pub default_order_by: String,
    pub default_sort: SortDirection,
    pub date_column: Option<String>,
    pub pagination: Pagination,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether `name` may appear in ORDER BY.
    pub fn is_orderable(&self, name: &str) -> bool {
        name == self.default_order_by
            || name == self.primary_key
            || self.columns.iter().any(|c| c.sortable && c.name == name)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.label.as_str()).collect()
    }

    pub fn actions_in(&self, scope: ActionScope) -> impl Iterator<Item = &ActionDefinition> {
        self.actions.iter().filter(move |a| a.scope == scope)
    }

    /// Primary-key expression qualified with the base table when the schema joins others.
    pub fn qualified_primary_key(&self) -> String {
        if self.joins.is_empty() || self.primary_key.contains('.') {
            self.primary_key.clone()
        } else {
            format!("{}.{}", self.table, self.primary_key)
        }
    }
}
