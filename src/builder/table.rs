//! Fluent builder for [`TableSchema`].

use crate::case::{is_identifier, is_type_name, to_label};
use crate::error::ConfigError;
use crate::schema::{
    ActionDefinition, ActionScope, ColumnDefinition, FilterDefinition, FilterLinkDefinition, FormatFn,
    Formatter, NamedFormat, OptionSource, Pagination, SortDirection, TableSchema,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Declares one listing column. Consumed by [`TableSchemaBuilder::column`].
#[derive(Clone, Debug)]
pub struct ColumnBuilder {
    name: String,
    label: Option<String>,
    expression: Option<String>,
    sortable: bool,
    searchable: bool,
    formatter: Option<Formatter>,
}

impl ColumnBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        ColumnBuilder {
            name: name.into(),
            label: None,
            expression: None,
            sortable: false,
            searchable: false,
            formatter: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// SQL selected for the column. Defaults to the column name.
    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable;
        self
    }

    pub fn format(mut self, format: NamedFormat) -> Self {
        self.formatter = Some(Formatter::Named(format));
        self
    }

    pub fn formatter<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &Value) -> Value + Send + Sync + 'static,
    {
        let f: FormatFn = Arc::new(f);
        self.formatter = Some(Formatter::Custom(f));
        self
    }

    fn to_definition(&self) -> ColumnDefinition {
        ColumnDefinition {
            name: self.name.clone(),
            label: self.label.clone().unwrap_or_else(|| to_label(&self.name)),
            expression: self.expression.clone().unwrap_or_else(|| self.name.clone()),
            sortable: self.sortable,
            searchable: self.searchable,
            formatter: self.formatter.clone(),
        }
    }
}

/// Declares one table action. Consumed by [`TableSchemaBuilder::action`].
#[derive(Clone, Debug)]
pub struct ActionBuilder {
    name: String,
    label: Option<String>,
    icon: Option<String>,
    requires_confirmation_form: bool,
    scope: ActionScope,
}

impl ActionBuilder {
    pub fn new(name: impl Into<String>, scope: ActionScope) -> Self {
        ActionBuilder {
            name: name.into(),
            label: None,
            icon: None,
            requires_confirmation_form: false,
            scope,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn confirm(mut self, requires_confirmation_form: bool) -> Self {
        self.requires_confirmation_form = requires_confirmation_form;
        self
    }

    fn to_definition(&self) -> ActionDefinition {
        ActionDefinition {
            name: self.name.clone(),
            label: self.label.clone().unwrap_or_else(|| to_label(&self.name)),
            icon: self.icon.clone(),
            requires_confirmation_form: self.requires_confirmation_form,
            scope: self.scope,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TableSchemaBuilder {
    table: String,
    joins: Vec<String>,
    primary_key: String,
    primary_key_type: Option<String>,
    columns: Vec<ColumnBuilder>,
    filters: Vec<FilterDefinition>,
    filter_links: Vec<FilterLinkDefinition>,
    actions: Vec<ActionBuilder>,
    order_by: Option<String>,
    sort: SortDirection,
    date_column: Option<String>,
    pagination: Pagination,
}

impl TableSchemaBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        TableSchemaBuilder {
            table: table.into(),
            joins: Vec::new(),
            primary_key: "id".into(),
            primary_key_type: None,
            columns: Vec::new(),
            filters: Vec::new(),
            filter_links: Vec::new(),
            actions: Vec::new(),
            order_by: None,
            sort: SortDirection::default(),
            date_column: None,
            pagination: Pagination::default(),
        }
    }

    /// Full JOIN clause, e.g. `LEFT JOIN users ON users.id = orders.user_id`.
    pub fn join(&mut self, clause: impl Into<String>) -> &mut Self {
        self.joins.push(clause.into());
        self
    }

    pub fn primary_key(&mut self, column: impl Into<String>) -> &mut Self {
        self.primary_key = column.into();
        self
    }

    /// PostgreSQL type the bound id is cast to. Needed when ids arrive as text
    /// but the key is not a text column.
    pub fn primary_key_type(&mut self, pg_type: impl Into<String>) -> &mut Self {
        self.primary_key_type = Some(pg_type.into());
        self
    }

    pub fn column(&mut self, column: ColumnBuilder) -> &mut Self {
        self.columns.push(column);
        self
    }

    pub fn filter(&mut self, column: impl Into<String>, label: impl Into<String>, options: OptionSource) -> &mut Self {
        self.filters.push(FilterDefinition {
            column: column.into(),
            label: label.into(),
            options,
            pg_type: None,
        });
        self
    }

    /// Dropdown filter whose selected value is cast to `pg_type` before comparison.
    pub fn typed_filter(
        &mut self,
        column: impl Into<String>,
        label: impl Into<String>,
        options: OptionSource,
        pg_type: impl Into<String>,
    ) -> &mut Self {
        self.filter(column, label, options);
        if let Some(f) = self.filters.last_mut() {
            f.pg_type = Some(pg_type.into());
        }
        self
    }

    /// Dropdown filter whose options are loaded by `query` when the filter form is rendered.
    pub fn filter_options_from(
        &mut self,
        column: impl Into<String>,
        label: impl Into<String>,
        query: impl Into<String>,
    ) -> &mut Self {
        self.filter(column, label, OptionSource::Query(query.into()))
    }

    pub fn filter_link(&mut self, label: impl Into<String>, raw_condition: impl Into<String>) -> &mut Self {
        self.filter_links.push(FilterLinkDefinition {
            label: label.into(),
            raw_condition: raw_condition.into(),
        });
        self
    }

    pub fn action(&mut self, action: ActionBuilder) -> &mut Self {
        self.actions.push(action);
        self
    }

    pub fn order_by(&mut self, column: impl Into<String>, sort: SortDirection) -> &mut Self {
        self.order_by = Some(column.into());
        self.sort = sort;
        self
    }

    pub fn date_column(&mut self, column: impl Into<String>) -> &mut Self {
        self.date_column = Some(column.into());
        self
    }

    pub fn per_page(&mut self, default_per_page: u32, allowed: impl IntoIterator<Item = u32>) -> &mut Self {
        self.pagination = Pagination {
            default_per_page,
            allowed_per_page: allowed.into_iter().collect(),
        };
        self
    }

    /// Produce an independent schema snapshot. Builder state is left untouched.
    pub fn build(&self) -> Result<TableSchema, ConfigError> {
        if !is_identifier(&self.table) {
            return Err(ConfigError::InvalidIdentifier {
                kind: "table",
                name: self.table.clone(),
            });
        }
        if !is_identifier(&self.primary_key) {
            return Err(ConfigError::InvalidIdentifier {
                kind: "primary key",
                name: self.primary_key.clone(),
            });
        }

        let columns: Vec<ColumnDefinition> = self.columns.iter().map(ColumnBuilder::to_definition).collect();
        let mut seen = HashSet::new();
        for c in &columns {
            if !is_identifier(&c.name) || c.name.contains('.') {
                return Err(ConfigError::InvalidIdentifier {
                    kind: "column",
                    name: c.name.clone(),
                });
            }
            if c.expression.trim().is_empty() {
                return Err(ConfigError::Missing {
                    kind: "column expression",
                    name: c.name.clone(),
                });
            }
            if !seen.insert(c.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "column",
                    name: c.name.clone(),
                });
            }
        }

        let default_order_by = self.order_by.clone().unwrap_or_else(|| self.primary_key.clone());
        if default_order_by != self.primary_key && !seen.contains(default_order_by.as_str()) {
            return Err(ConfigError::UnknownColumn {
                column: default_order_by,
                by: "default order",
            });
        }

        for f in &self.filters {
            if f.column.trim().is_empty() {
                return Err(ConfigError::Missing {
                    kind: "filter column",
                    name: f.label.clone(),
                });
            }
        }
        for t in self
            .filters
            .iter()
            .filter_map(|f| f.pg_type.as_ref())
            .chain(self.primary_key_type.as_ref())
        {
            if !is_type_name(t) {
                return Err(ConfigError::InvalidIdentifier {
                    kind: "column type",
                    name: t.clone(),
                });
            }
        }
        for l in &self.filter_links {
            if l.raw_condition.trim().is_empty() {
                return Err(ConfigError::Missing {
                    kind: "filter link condition",
                    name: l.label.clone(),
                });
            }
        }
        if let Some(d) = &self.date_column {
            if d.trim().is_empty() {
                return Err(ConfigError::Missing {
                    kind: "date column",
                    name: self.table.clone(),
                });
            }
        }

        let actions: Vec<ActionDefinition> = self.actions.iter().map(ActionBuilder::to_definition).collect();
        let mut action_names = HashSet::new();
        for a in &actions {
            if a.name.is_empty() {
                return Err(ConfigError::Missing {
                    kind: "action name",
                    name: a.label.clone(),
                });
            }
            if !action_names.insert(a.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "action",
                    name: a.name.clone(),
                });
            }
        }

        let p = &self.pagination;
        if p.allowed_per_page.is_empty() || p.allowed_per_page.contains(&0) {
            return Err(ConfigError::Pagination(
                "allowed per-page values must be non-empty and positive".into(),
            ));
        }
        if !p.allows(p.default_per_page) {
            return Err(ConfigError::Pagination(format!(
                "default per-page {} is not one of {:?}",
                p.default_per_page, p.allowed_per_page
            )));
        }

        Ok(TableSchema {
            table: self.table.clone(),
            joins: self.joins.clone(),
            primary_key: self.primary_key.clone(),
            primary_key_type: self.primary_key_type.clone(),
            columns,
            filters: self.filters.clone(),
            filter_links: self.filter_links.clone(),
            actions,
            default_order_by,
            default_sort: self.sort,
            date_column: self.date_column.clone(),
            pagination: self.pagination.clone(),
        })
    }
}
