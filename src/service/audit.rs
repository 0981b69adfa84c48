//! Audit trail collaborator. One event per successful mutation, stamped with the
//! acting user.

use crate::error::AppError;
use crate::service::executor::{QueryExecutor, Row};
use crate::store::qualified_admin_table;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

#[async_trait]
pub trait AuditLogger: Send + Sync {
    async fn log_created(&self, actor: &str, table: &str, id: &Value, values: &Row) -> Result<(), AppError>;
    async fn log_updated(&self, actor: &str, table: &str, id: &Value, old: &Row, new: &Row) -> Result<(), AppError>;
    async fn log_deleted(&self, actor: &str, table: &str, id: &Value, old: &Row) -> Result<(), AppError>;
}

/// Emits audit events as structured `tracing` records on the `audit` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditLogger;

#[async_trait]
impl AuditLogger for TracingAuditLogger {
    async fn log_created(&self, actor: &str, table: &str, id: &Value, values: &Row) -> Result<(), AppError> {
        tracing::info!(target: "audit", actor, table, id = %id, new = ?values, "created");
        Ok(())
    }

    async fn log_updated(&self, actor: &str, table: &str, id: &Value, old: &Row, new: &Row) -> Result<(), AppError> {
        tracing::info!(target: "audit", actor, table, id = %id, old = ?old, new = ?new, "updated");
        Ok(())
    }

    async fn log_deleted(&self, actor: &str, table: &str, id: &Value, old: &Row) -> Result<(), AppError> {
        tracing::info!(target: "audit", actor, table, id = %id, old = ?old, "deleted");
        Ok(())
    }
}

/// Writes audit rows to `<admin schema>.audit_log` (see `ensure_admin_tables`).
#[derive(Clone)]
pub struct PgAuditLogger {
    executor: Arc<dyn QueryExecutor>,
}

impl PgAuditLogger {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        PgAuditLogger { executor }
    }

    async fn write(
        &self,
        actor: &str,
        action: &str,
        table: &str,
        id: &Value,
        old: Option<&Row>,
        new: Option<&Row>,
    ) -> Result<(), AppError> {
        let sql = format!(
            "INSERT INTO {} (action, table_name, record_id, old_values, new_values, actor) VALUES (?, ?, ?, ?, ?, ?)",
            qualified_admin_table("audit_log")
        );
        let record_id = match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let params = [
            Value::String(action.into()),
            Value::String(table.into()),
            Value::String(record_id),
            old.map(|r| Value::Object(r.clone())).unwrap_or(Value::Null),
            new.map(|r| Value::Object(r.clone())).unwrap_or(Value::Null),
            Value::String(actor.into()),
        ];
        self.executor.execute(&sql, &params).await?;
        Ok(())
    }
}

#[async_trait]
impl AuditLogger for PgAuditLogger {
    async fn log_created(&self, actor: &str, table: &str, id: &Value, values: &Row) -> Result<(), AppError> {
        self.write(actor, "create", table, id, None, Some(values)).await
    }

    async fn log_updated(&self, actor: &str, table: &str, id: &Value, old: &Row, new: &Row) -> Result<(), AppError> {
        self.write(actor, "update", table, id, Some(old), Some(new)).await
    }

    async fn log_deleted(&self, actor: &str, table: &str, id: &Value, old: &Row) -> Result<(), AppError> {
        self.write(actor, "delete", table, id, Some(old), None).await
    }
}
