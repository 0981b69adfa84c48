//! Query execution collaborator and its PostgreSQL implementation.

use crate::error::AppError;
use crate::sql::{to_numbered, PgBindValue};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{Map, Value};
use sqlx::PgPool;

/// One result row, keyed by column alias.
pub type Row = Map<String, Value>;

/// Rows delivered one at a time; nothing is buffered beyond the driver and channel.
pub type RowStream = BoxStream<'static, Result<Row, AppError>>;

/// Executes parameterized SQL with `?` placeholders.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, AppError>;

    async fn fetch_optional(&self, sql: &str, params: &[Value]) -> Result<Option<Row>, AppError> {
        Ok(self.fetch_all(sql, params).await?.into_iter().next())
    }

    /// Run an INSERT ... RETURNING <pk> and return the generated id.
    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> Result<Value, AppError>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, AppError>;

    fn fetch_stream(&self, sql: String, params: Vec<Value>) -> RowStream;
}

/// First column of the first row as an integer (COUNT queries).
pub async fn fetch_count(executor: &dyn QueryExecutor, sql: &str, params: &[Value]) -> Result<u64, AppError> {
    let row = executor.fetch_optional(sql, params).await?;
    Ok(row
        .and_then(|r| r.values().next().cloned())
        .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or(0))
}

const STREAM_BUFFER: usize = 64;

#[derive(Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        PgExecutor { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn query<'q>(sql: &'q str, params: &[Value]) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        let mut query = sqlx::query(sql);
        for p in params {
            query = query.bind(PgBindValue::from_json(p));
        }
        query
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, AppError> {
        let sql = to_numbered(sql);
        tracing::debug!(sql = %sql, params = ?params, "query");
        let rows = Self::query(&sql, params).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn fetch_optional(&self, sql: &str, params: &[Value]) -> Result<Option<Row>, AppError> {
        let sql = to_numbered(sql);
        tracing::debug!(sql = %sql, params = ?params, "query");
        let row = Self::query(&sql, params).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_json))
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> Result<Value, AppError> {
        let sql = to_numbered(sql);
        tracing::debug!(sql = %sql, params = ?params, "insert");
        let row = Self::query(&sql, params).fetch_one(&self.pool).await?;
        Ok(row_to_json(&row).into_iter().next().map(|(_, v)| v).unwrap_or(Value::Null))
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, AppError> {
        let sql = to_numbered(sql);
        tracing::debug!(sql = %sql, params = ?params, "execute");
        let result = Self::query(&sql, params).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    fn fetch_stream(&self, sql: String, params: Vec<Value>) -> RowStream {
        let pool = self.pool.clone();
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<Row, AppError>>(STREAM_BUFFER);
        tokio::spawn(async move {
            let sql = to_numbered(&sql);
            tracing::debug!(sql = %sql, params = ?params, "stream");
            let mut rows = Self::query(&sql, &params).fetch(&pool);
            while let Some(row) = rows.next().await {
                let item = row.map(|r| row_to_json(&r)).map_err(AppError::from);
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });
        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
    }
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> Row {
    use sqlx::Column;
    use sqlx::Row as _;
    let mut map = Map::new();
    for col in row.columns() {
        map.insert(col.name().to_string(), cell_to_value(row, col.ordinal()));
    }
    map
}

fn cell_to_value(row: &sqlx::postgres::PgRow, idx: usize) -> Value {
    use sqlx::{Row as _, TypeInfo, ValueRef};
    let Ok(raw) = row.try_get_raw(idx) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    let type_name = raw.type_info().name().to_string();
    match type_name.as_str() {
        "INT2" => row.try_get::<i16, _>(idx).map(Value::from).unwrap_or(Value::Null),
        "INT4" => row.try_get::<i32, _>(idx).map(Value::from).unwrap_or(Value::Null),
        "INT8" => row.try_get::<i64, _>(idx).map(Value::from).unwrap_or(Value::Null),
        "FLOAT4" => row.try_get::<f32, _>(idx).map(|n| Value::from(f64::from(n))).unwrap_or(Value::Null),
        "FLOAT8" => row.try_get::<f64, _>(idx).map(Value::from).unwrap_or(Value::Null),
        "BOOL" => row.try_get::<bool, _>(idx).map(Value::Bool).unwrap_or(Value::Null),
        "UUID" => row
            .try_get::<uuid::Uuid, _>(idx)
            .map(|u| Value::String(u.to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(idx)
            .map(|d| Value::String(d.to_rfc3339()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(idx)
            .map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(idx)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx).unwrap_or(Value::Null),
        _ => row
            .try_get::<String, _>(idx)
            .map(Value::String)
            .unwrap_or_else(|_| {
                tracing::debug!(column = idx, pg_type = %type_name, "undecodable column; cast it to text in the schema expression");
                Value::Null
            }),
    }
}
