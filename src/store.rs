//! Admin table DDL (audit log, module grants) and startup checks. Admin tables live in a
//! schema named from `ADMIN_SCHEMA` env (default `architect`).

use crate::error::{AppError, ConfigError};
use crate::service::QueryExecutor;
use serde_json::Value;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::str::FromStr;

/// Schema name for admin tables. From env `ADMIN_SCHEMA`, default `architect`. Must be a valid PostgreSQL identifier.
pub fn admin_schema() -> String {
    std::env::var("ADMIN_SCHEMA").unwrap_or_else(|_| "architect".into())
}

/// Returns schema-qualified table name for admin tables (e.g. "architect.audit_log").
pub fn qualified_admin_table(table: &str) -> String {
    format!("{}.{}", admin_schema(), table)
}

/// Create schema from `ADMIN_SCHEMA` env if not exists, then the audit and grant tables.
pub async fn ensure_admin_tables(pool: &PgPool) -> Result<(), AppError> {
    let schema = admin_schema();
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
        .execute(pool)
        .await?;

    let audit_ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            action TEXT NOT NULL,
            table_name TEXT NOT NULL,
            record_id TEXT NOT NULL,
            old_values JSONB,
            new_values JSONB,
            actor TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        qualified_admin_table("audit_log")
    );
    sqlx::query(&audit_ddl).execute(pool).await?;
    let audit_index = format!(
        "CREATE INDEX IF NOT EXISTS audit_log_record_idx ON {} (table_name, record_id)",
        qualified_admin_table("audit_log")
    );
    sqlx::query(&audit_index).execute(pool).await?;

    let grants_ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            user_id TEXT NOT NULL,
            module_id TEXT NOT NULL,
            mode TEXT NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (user_id, module_id, mode)
        )
        "#,
        qualified_admin_table("module_grants")
    );
    sqlx::query(&grants_ddl).execute(pool).await?;
    Ok(())
}

/// Fail with a configuration error when `table` or its `primary_key` column is absent.
/// `table` may be schema-qualified; unqualified names are looked up on the search path.
/// Returns each column's Postgres type, usable as a placeholder cast. Array columns are
/// left out.
pub async fn verify_table(
    executor: &dyn QueryExecutor,
    table: &str,
    primary_key: &str,
) -> Result<HashMap<String, String>, AppError> {
    let (schema, name) = match table.split_once('.') {
        Some((s, t)) => (Some(s), t),
        None => (None, table),
    };
    let schema_cond = if schema.is_some() {
        "table_schema = ?"
    } else {
        "table_schema = ANY (current_schemas(false))"
    };
    let sql = format!(
        "SELECT column_name, data_type, udt_schema, udt_name FROM information_schema.columns \
         WHERE {} AND table_name = ?",
        schema_cond
    );
    let mut params = Vec::new();
    if let Some(s) = schema {
        params.push(Value::String(s.to_string()));
    }
    params.push(Value::String(name.to_string()));
    let rows = executor.fetch_all(&sql, &params).await?;
    if rows.is_empty() {
        return Err(ConfigError::Missing {
            kind: "table",
            name: table.to_string(),
        }
        .into());
    }
    let pk = primary_key.rsplit('.').next().unwrap_or(primary_key);
    let has_pk = rows
        .iter()
        .any(|r| r.get("column_name").and_then(Value::as_str) == Some(pk));
    if !has_pk {
        return Err(ConfigError::UnknownColumn {
            column: primary_key.to_string(),
            by: "primary key",
        }
        .into());
    }
    Ok(rows
        .iter()
        .filter_map(|r| {
            let column = r.get("column_name").and_then(Value::as_str)?;
            Some((column.to_string(), cast_type(&Value::Object(r.clone()))?))
        })
        .collect())
}

fn cast_type(row: &Value) -> Option<String> {
    let text = |k: &str| row.get(k).and_then(Value::as_str);
    match text("data_type")? {
        "ARRAY" => None,
        "USER-DEFINED" => Some(format!(
            "{}.{}",
            quote_ident(text("udt_schema")?),
            quote_ident(text("udt_name")?)
        )),
        other => Some(other.to_string()),
    }
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await.map_err(AppError::Db)?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await
        .map_err(AppError::Db)?;
    if !exists.0 {
        let quoted = quote_ident(&db_name);
        sqlx::query(&format!("CREATE DATABASE {}", quoted))
            .execute(&mut conn)
            .await
            .map_err(AppError::Db)?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url.rfind('/').ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))? + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
