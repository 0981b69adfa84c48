//! Builds parameterized SELECT/COUNT/INSERT/UPDATE/DELETE from a compiled schema.
//! Identifiers come from the schema only; every value is a `?` parameter.

use crate::module_state::{ModuleState, DATE_END, DATE_START, SEARCH};
use crate::schema::TableSchema;
use chrono::{Days, NaiveDate};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Extra predicate supplied by the caller, with its own parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

impl WhereClause {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        WhereClause {
            sql: sql.into(),
            params,
        }
    }
}

/// One column written by INSERT or UPDATE.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Value,
    pub pg_type: Option<String>,
}

impl Assignment {
    pub fn new(column: impl Into<String>, value: Value) -> Self {
        Assignment {
            column: column.into(),
            value,
            pg_type: None,
        }
    }

    pub fn cast(mut self, pg_type: Option<String>) -> Self {
        self.pg_type = pg_type;
        self
    }
}

/// `?`, or `?::<type>` when the target column has a declared type.
fn param(pg_type: Option<&str>) -> String {
    match pg_type {
        Some(t) => format!("?::{}", t),
        None => "?".to_string(),
    }
}

fn id_predicate(schema: &TableSchema, key: &str) -> String {
    format!("{} = {}", key, param(schema.primary_key_type.as_deref()))
}

/// AND-ed predicates with their parameters, in placeholder order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conditions {
    pub parts: Vec<String>,
    pub params: Vec<Value>,
}

impl Conditions {
    fn push(&mut self, sql: String, params: impl IntoIterator<Item = Value>) {
        self.parts.push(sql);
        self.params.extend(params);
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// ` WHERE a AND b`, or an empty string.
    pub fn where_sql(&self) -> String {
        if self.parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.parts.join(" AND "))
        }
    }
}

/// Raw condition of the filter link at `index`, parenthesized.
pub fn filter_link_condition(schema: &TableSchema, index: usize) -> Option<String> {
    schema
        .filter_links
        .get(index)
        .map(|l| format!("({})", l.raw_condition))
}

/// WHERE in fixed order: filter link, search, date range, dropdowns, then `extra`.
pub fn listing_conditions(schema: &TableSchema, state: &ModuleState, extra: &[WhereClause]) -> Conditions {
    let mut c = Conditions::default();

    if let Some(cond) = state
        .active_filter_link()
        .and_then(|i| filter_link_condition(schema, i))
    {
        c.push(cond, []);
    }

    if let Some(term) = state.filter(SEARCH) {
        let searchable: Vec<_> = schema.columns.iter().filter(|col| col.searchable).collect();
        if !searchable.is_empty() {
            let pattern = Value::String(format!("%{}%", term));
            let ors: Vec<String> = searchable
                .iter()
                .map(|col| format!("({} LIKE ?)", col.expression))
                .collect();
            c.push(
                format!("({})", ors.join(" OR ")),
                std::iter::repeat(pattern).take(searchable.len()),
            );
        }
    }

    if let Some(date_col) = &schema.date_column {
        let start = state.filter(DATE_START).map(|s| Value::String(s.to_string()));
        let end = state.filter(DATE_END).map(upper_bound);
        match (start, end) {
            (Some(s), Some((op, e))) => c.push(format!("{} >= ? AND {} {} ?", date_col, date_col, op), [s, e]),
            (Some(s), None) => c.push(format!("{} >= ?", date_col), [s]),
            (None, Some((op, e))) => c.push(format!("{} {} ?", date_col, op), [e]),
            (None, None) => {}
        }
    }

    for (i, filter) in schema.filters.iter().enumerate() {
        if let Some(v) = state.dropdown(i) {
            c.push(
                format!("{} = {}", filter.column, param(filter.pg_type.as_deref())),
                [Value::String(v.to_string())],
            );
        }
    }

    for w in extra {
        c.push(format!("({})", w.sql), w.params.iter().cloned());
    }
    c
}

/// A bare date as the upper bound covers the whole day: `< next day`.
/// Anything else is an inclusive bound as written.
fn upper_bound(s: &str) -> (&'static str, Value) {
    match NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.checked_add_days(Days::new(1)))
    {
        Some(next) => ("<", Value::String(next.format("%Y-%m-%d").to_string())),
        None => ("<=", Value::String(s.to_string())),
    }
}

/// `table JOIN ...`
pub fn from_clause(schema: &TableSchema) -> String {
    let mut out = schema.table.clone();
    for j in &schema.joins {
        out.push(' ');
        out.push_str(j);
    }
    out
}

/// Column expressions aliased to their names; the primary key is appended when no column carries it.
pub fn select_list(schema: &TableSchema) -> String {
    let mut parts: Vec<String> = schema
        .columns
        .iter()
        .map(|c| format!("{} AS {}", c.expression, c.name))
        .collect();
    if schema.column(&schema.primary_key).is_none() {
        parts.push(format!("{} AS {}", schema.qualified_primary_key(), schema.primary_key));
    }
    parts.join(", ")
}

/// ORDER BY target: the requested column when the schema allows it, else the default.
pub fn order_clause(schema: &TableSchema, state: &ModuleState) -> String {
    let requested = state.order_by(&schema.default_order_by);
    let column = if schema.is_orderable(requested) {
        requested
    } else {
        tracing::warn!(column = %requested, "ignoring order by undeclared column");
        schema.default_order_by.as_str()
    };
    let target = if schema.column(column).is_some() {
        column.to_string()
    } else {
        schema.qualified_primary_key()
    };
    format!(" ORDER BY {} {}", target, state.sort(schema.default_sort).as_sql())
}

pub fn select_page(schema: &TableSchema, state: &ModuleState, cond: &Conditions, page: u32, per_page: u32) -> QueryBuf {
    let offset = u64::from(page.saturating_sub(1)) * u64::from(per_page);
    QueryBuf {
        sql: format!(
            "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
            select_list(schema),
            from_clause(schema),
            cond.where_sql(),
            order_clause(schema, state),
            per_page,
            offset
        ),
        params: cond.params.clone(),
    }
}

/// Same as [`select_page`] without LIMIT/OFFSET (export).
pub fn select_all(schema: &TableSchema, state: &ModuleState, cond: &Conditions) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "SELECT {} FROM {}{}{}",
            select_list(schema),
            from_clause(schema),
            cond.where_sql(),
            order_clause(schema, state)
        ),
        params: cond.params.clone(),
    }
}

pub fn count(schema: &TableSchema, cond: &Conditions) -> QueryBuf {
    QueryBuf {
        sql: format!("SELECT COUNT(*) AS total FROM {}{}", from_clause(schema), cond.where_sql()),
        params: cond.params.clone(),
    }
}

/// Load one record for a form: the given select expressions over the joined table.
pub fn select_record(schema: &TableSchema, select: &[String], id: &Value) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "SELECT {} FROM {} WHERE {}",
            select.join(", "),
            from_clause(schema),
            id_predicate(schema, &schema.qualified_primary_key())
        ),
        params: vec![id.clone()],
    }
}

/// Full base-table row, used for audit snapshots.
pub fn select_row(schema: &TableSchema, id: &Value) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "SELECT * FROM {} WHERE {}",
            schema.table,
            id_predicate(schema, &schema.primary_key)
        ),
        params: vec![id.clone()],
    }
}

pub fn insert(schema: &TableSchema, values: &[Assignment]) -> QueryBuf {
    let sql = if values.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", schema.table, schema.primary_key)
    } else {
        let cols: Vec<&str> = values.iter().map(|a| a.column.as_str()).collect();
        let placeholders: Vec<String> = values.iter().map(|a| param(a.pg_type.as_deref())).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            schema.table,
            cols.join(", "),
            placeholders.join(", "),
            schema.primary_key
        )
    };
    QueryBuf {
        sql,
        params: values.iter().map(|a| a.value.clone()).collect(),
    }
}

/// UPDATE by id. Returns None when there is nothing to set.
pub fn update(schema: &TableSchema, id: &Value, values: &[Assignment]) -> Option<QueryBuf> {
    if values.is_empty() {
        return None;
    }
    let sets: Vec<String> = values
        .iter()
        .map(|a| format!("{} = {}", a.column, param(a.pg_type.as_deref())))
        .collect();
    let mut params: Vec<Value> = values.iter().map(|a| a.value.clone()).collect();
    params.push(id.clone());
    Some(QueryBuf {
        sql: format!(
            "UPDATE {} SET {} WHERE {}",
            schema.table,
            sets.join(", "),
            id_predicate(schema, &schema.primary_key)
        ),
        params,
    })
}

pub fn delete(schema: &TableSchema, id: &Value) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "DELETE FROM {} WHERE {}",
            schema.table,
            id_predicate(schema, &schema.primary_key)
        ),
        params: vec![id.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ColumnBuilder, TableSchemaBuilder};
    use crate::schema::{OptionSource, SortDirection};
    use serde_json::json;

    fn schema() -> TableSchema {
        let mut b = TableSchemaBuilder::new("orders");
        b.join("LEFT JOIN users ON users.id = orders.user_id")
            .column(ColumnBuilder::new("id").expression("orders.id").sortable(true))
            .column(ColumnBuilder::new("email").expression("email").searchable(true))
            .column(ColumnBuilder::new("title").expression("orders.title").searchable(true).sortable(true))
            .filter("status", "Status", OptionSource::Static(vec![]))
            .filter("kind", "Kind", OptionSource::Static(vec![]))
            .filter_link("Open", "orders.closed_at IS NULL")
            .filter_link("Big", "orders.total > 100 OR orders.priority = 1")
            .date_column("orders.created_at")
            .order_by("id", SortDirection::Desc)
            .per_page(10, [10, 20]);
        b.build().unwrap()
    }

    #[test]
    fn empty_state_has_no_where() {
        let c = listing_conditions(&schema(), &ModuleState::new(), &[]);
        assert!(c.is_empty());
        assert_eq!(c.where_sql(), "");
    }

    #[test]
    fn search_ors_every_searchable_column() {
        let mut state = ModuleState::new();
        state.set_filter(SEARCH, "alice");
        let c = listing_conditions(&schema(), &state, &[]);
        assert_eq!(c.parts, ["((email LIKE ?) OR (orders.title LIKE ?))"]);
        assert_eq!(c.params, [json!("%alice%"), json!("%alice%")]);
    }

    #[test]
    fn dropdown_uses_filter_position() {
        let mut state = ModuleState::new();
        state.set_filter("dropdowns_1", "retail");
        let c = listing_conditions(&schema(), &state, &[]);
        assert_eq!(c.parts, ["kind = ?"]);
        assert_eq!(c.params, [json!("retail")]);
    }

    #[test]
    fn date_range_variants() {
        let s = schema();
        let mut state = ModuleState::new();
        state.set_filter(DATE_START, "2024-01-01");
        let c = listing_conditions(&s, &state, &[]);
        assert_eq!(c.parts, ["orders.created_at >= ?"]);

        state.set_filter(DATE_END, "2024-01-31");
        let c = listing_conditions(&s, &state, &[]);
        assert_eq!(c.parts, ["orders.created_at >= ? AND orders.created_at < ?"]);
        assert_eq!(c.params, [json!("2024-01-01"), json!("2024-02-01")]);

        state.remove_filter(DATE_START);
        let c = listing_conditions(&s, &state, &[]);
        assert_eq!(c.parts, ["orders.created_at < ?"]);
    }

    #[test]
    fn bare_end_date_keeps_the_last_second() {
        let s = schema();
        let mut state = ModuleState::new();
        state.set_filter(DATE_END, "2024-12-31");
        let c = listing_conditions(&s, &state, &[]);
        assert_eq!(c.parts, ["orders.created_at < ?"]);
        assert_eq!(c.params, [json!("2025-01-01")]);

        state.set_filter(DATE_END, "2024-12-31 12:00:00");
        let c = listing_conditions(&s, &state, &[]);
        assert_eq!(c.parts, ["orders.created_at <= ?"]);
        assert_eq!(c.params, [json!("2024-12-31 12:00:00")]);
    }

    #[test]
    fn typed_columns_cast_their_placeholders() {
        let mut b = TableSchemaBuilder::new("articles");
        b.primary_key_type("integer")
            .column(ColumnBuilder::new("id"))
            .typed_filter("articles.author_id", "Author", OptionSource::default(), "integer");
        let s = b.build().unwrap();

        let mut state = ModuleState::new();
        state.set_filter("dropdowns_0", "1");
        let c = listing_conditions(&s, &state, &[]);
        assert_eq!(c.parts, ["articles.author_id = ?::integer"]);
        assert_eq!(c.params, [json!("1")]);

        let values = [
            Assignment::new("title", json!("t")),
            Assignment::new("author_id", json!("2")).cast(Some("integer".into())),
        ];
        assert_eq!(
            insert(&s, &values).sql,
            "INSERT INTO articles (title, author_id) VALUES (?, ?::integer) RETURNING id"
        );
        assert_eq!(
            update(&s, &json!("7"), &values).unwrap().sql,
            "UPDATE articles SET title = ?, author_id = ?::integer WHERE id = ?::integer"
        );
        assert_eq!(delete(&s, &json!("7")).sql, "DELETE FROM articles WHERE id = ?::integer");
        assert_eq!(select_row(&s, &json!("7")).sql, "SELECT * FROM articles WHERE id = ?::integer");
    }

    #[test]
    fn precedence_and_param_order() {
        let mut state = ModuleState::new();
        state.set_active_filter_link(Some(1));
        state.set_filter(SEARCH, "x");
        state.set_filter(DATE_START, "2024-01-01");
        state.set_filter("dropdowns_0", "pending");
        let extra = [WhereClause::new("orders.tenant_id = ?", vec![json!(7)])];
        let c = listing_conditions(&schema(), &state, &extra);
        assert_eq!(
            c.where_sql(),
            " WHERE (orders.total > 100 OR orders.priority = 1) AND ((email LIKE ?) OR (orders.title LIKE ?)) \
             AND orders.created_at >= ? AND status = ? AND (orders.tenant_id = ?)"
        );
        assert_eq!(
            c.params,
            [json!("%x%"), json!("%x%"), json!("2024-01-01"), json!("pending"), json!(7)]
        );
    }

    #[test]
    fn filter_link_resolution_is_deterministic() {
        let s = schema();
        let mut state = ModuleState::new();
        state.set_active_filter_link(Some(0));
        let a = listing_conditions(&s, &state, &[]).where_sql();
        let b = listing_conditions(&s, &state, &[]).where_sql();
        assert_eq!(a, b);
        assert_eq!(a, " WHERE (orders.closed_at IS NULL)");
        state.set_active_filter_link(Some(9));
        assert!(listing_conditions(&s, &state, &[]).is_empty());
    }

    #[test]
    fn page_query_uses_aliases_and_offset() {
        let s = schema();
        let mut state = ModuleState::new();
        state.set_order_by("title");
        state.set_sort(SortDirection::Asc);
        let q = select_page(&s, &state, &Conditions::default(), 3, 20);
        assert_eq!(
            q.sql,
            "SELECT orders.id AS id, email AS email, orders.title AS title FROM orders \
             LEFT JOIN users ON users.id = orders.user_id ORDER BY title ASC LIMIT 20 OFFSET 40"
        );
        let q = count(&s, &Conditions::default());
        assert_eq!(q.sql, "SELECT COUNT(*) AS total FROM orders LEFT JOIN users ON users.id = orders.user_id");
    }

    #[test]
    fn order_by_rejects_non_sortable_columns() {
        let s = schema();
        let mut state = ModuleState::new();
        state.set_order_by("email; DROP TABLE orders");
        assert_eq!(order_clause(&s, &state), " ORDER BY id DESC");
        state.set_order_by("email");
        assert_eq!(order_clause(&s, &state), " ORDER BY id DESC");
    }

    #[test]
    fn mutations() {
        let s = schema();
        let values = vec![Assignment::new("title", json!("t")), Assignment::new("status", json!("new"))];
        let q = insert(&s, &values);
        assert_eq!(q.sql, "INSERT INTO orders (title, status) VALUES (?, ?) RETURNING id");
        let q = update(&s, &json!(5), &values).unwrap();
        assert_eq!(q.sql, "UPDATE orders SET title = ?, status = ? WHERE id = ?");
        assert_eq!(q.params, [json!("t"), json!("new"), json!(5)]);
        assert!(update(&s, &json!(5), &[]).is_none());
        assert_eq!(delete(&s, &json!(5)).sql, "DELETE FROM orders WHERE id = ?");
        let q = select_record(&s, &["title".into(), "users.name AS owner".into()], &json!(5));
        assert_eq!(
            q.sql,
            "SELECT title, users.name AS owner FROM orders LEFT JOIN users ON users.id = orders.user_id WHERE orders.id = ?"
        );
    }
}
