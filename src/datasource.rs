//! Turns schema + state into executed, paginated listing results.

use crate::error::AppError;
use crate::module_state::ModuleState;
use crate::schema::TableSchema;
use crate::service::{fetch_count, QueryExecutor, Row, RowStream};
use crate::sql::{self, WhereClause};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TableResult {
    pub rows: Vec<Row>,
    pub page: u32,
    pub per_page: u32,
    pub total_rows: u64,
    pub total_pages: u64,
}

impl TableResult {
    pub fn total_pages(total_rows: u64, per_page: u32) -> u64 {
        if per_page == 0 {
            return 0;
        }
        total_rows.div_ceil(u64::from(per_page))
    }
}

pub struct DataSource;

impl DataSource {
    /// One page of rows plus the total under the same conditions.
    /// A page past the end yields no rows; totals are still reported.
    pub async fn fetch(
        executor: &dyn QueryExecutor,
        schema: &TableSchema,
        state: &ModuleState,
        extra: &[WhereClause],
    ) -> Result<TableResult, AppError> {
        let per_page = effective_per_page(schema, state);
        let page = state.page();
        let cond = sql::listing_conditions(schema, state, extra);

        let count = sql::count(schema, &cond);
        let total_rows = fetch_count(executor, &count.sql, &count.params).await?;

        let select = sql::select_page(schema, state, &cond, page, per_page);
        let rows = executor.fetch_all(&select.sql, &select.params).await?;

        Ok(TableResult {
            rows,
            page,
            per_page,
            total_rows,
            total_pages: TableResult::total_pages(total_rows, per_page),
        })
    }

    /// Every row under the current conditions, in listing order, without pagination.
    pub fn stream_all(
        executor: &dyn QueryExecutor,
        schema: &TableSchema,
        state: &ModuleState,
        extra: &[WhereClause],
    ) -> RowStream {
        let cond = sql::listing_conditions(schema, state, extra);
        let q = sql::select_all(schema, state, &cond);
        executor.fetch_stream(q.sql, q.params)
    }
}

/// Stored per-page when still allowed by the schema, else the schema default.
pub fn effective_per_page(schema: &TableSchema, state: &ModuleState) -> u32 {
    let per_page = state.per_page(schema.pagination.default_per_page);
    if schema.pagination.allows(per_page) {
        per_page
    } else {
        schema.pagination.default_per_page
    }
}
