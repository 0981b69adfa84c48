//! In-memory collaborators for driving a `Module` without a database.

#![allow(dead_code)]

use architect_crud::error::AppError;
use architect_crud::module::Context;
use architect_crud::service::{
    AuditLogger, MemoryPermissionStore, PermissionStore, Principal, QueryExecutor, Row, RowStream, RuleValidator,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

/// One table keyed by `id`. Answers the statement shapes the orchestrator issues and
/// records every statement. WHERE clauses are recorded, not evaluated.
#[derive(Default)]
pub struct FakeExecutor {
    pub rows: Mutex<Vec<Row>>,
    pub options: Mutex<Vec<Row>>,
    pub log: Mutex<Vec<(String, Vec<Value>)>>,
    pub fail_writes: Mutex<bool>,
    /// Single-row reads of this id fail as if the connection dropped.
    pub fail_reads_for: Mutex<Option<Value>>,
    /// Rows answered for `information_schema.columns`.
    pub catalog: Mutex<Vec<Row>>,
    next_id: Mutex<i64>,
}

impl FakeExecutor {
    pub fn with_rows(rows: Vec<Value>) -> Arc<Self> {
        let rows: Vec<Row> = rows.into_iter().filter_map(|v| v.as_object().cloned()).collect();
        let next = rows.iter().filter_map(|r| r.get("id").and_then(Value::as_i64)).max().unwrap_or(0) + 1;
        Arc::new(FakeExecutor {
            rows: Mutex::new(rows),
            next_id: Mutex::new(next),
            ..Default::default()
        })
    }

    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.log.lock().unwrap().clone()
    }

    pub fn last_matching(&self, prefix: &str) -> Option<(String, Vec<Value>)> {
        self.statements().into_iter().rev().find(|(sql, _)| sql.starts_with(prefix))
    }

    pub fn row(&self, id: i64) -> Option<Row> {
        self.rows.lock().unwrap().iter().find(|r| r.get("id") == Some(&json!(id))).cloned()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    pub fn fail_reads_for(&self, id: Value) {
        *self.fail_reads_for.lock().unwrap() = Some(id);
    }

    /// Catalog columns as `(name, data_type)`.
    pub fn set_catalog(&self, columns: &[(&str, &str)]) {
        *self.catalog.lock().unwrap() = columns
            .iter()
            .map(|(name, data_type)| {
                json!({"column_name": name, "data_type": data_type, "udt_schema": "pg_catalog", "udt_name": data_type})
            })
            .filter_map(|v| v.as_object().cloned())
            .collect();
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.log.lock().unwrap().push((sql.to_string(), params.to_vec()));
    }

    fn find(&self, id: &Value) -> Option<Row> {
        self.rows.lock().unwrap().iter().find(|r| r.get("id") == Some(id)).cloned()
    }

    fn write_failure(&self) -> Result<(), AppError> {
        if *self.fail_writes.lock().unwrap() {
            Err(AppError::Persistence("disk full".into()))
        } else {
            Ok(())
        }
    }
}

fn between<'a>(s: &'a str, start: &str, end: &str) -> &'a str {
    let from = s.find(start).map(|i| i + start.len()).unwrap_or(0);
    let to = s[from..].find(end).map(|i| from + i).unwrap_or(s.len());
    &s[from..to]
}

/// `... WHERE <key> = ?`, optionally with a cast on the placeholder.
fn keyed_by_last_param(sql: &str) -> bool {
    sql.rsplit(" = ").next().is_some_and(|p| p == "?" || p.starts_with("?::"))
}

fn page_window(sql: &str) -> Option<(usize, usize)> {
    let limit = between(sql, " LIMIT ", " ").parse().ok()?;
    let offset = sql.rsplit(" OFFSET ").next()?.trim().parse().ok()?;
    Some((limit, offset))
}

#[async_trait]
impl QueryExecutor for FakeExecutor {
    async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, AppError> {
        self.record(sql, params);
        if sql.contains("information_schema.columns") {
            return Ok(self.catalog.lock().unwrap().clone());
        }
        let rows = self.rows.lock().unwrap().clone();
        if sql.starts_with("SELECT COUNT(*)") {
            let mut total = Map::new();
            total.insert("total".into(), json!(rows.len()));
            return Ok(vec![total]);
        }
        if sql.contains(" AS value") {
            return Ok(self.options.lock().unwrap().clone());
        }
        if let Some((limit, offset)) = page_window(sql) {
            return Ok(rows.into_iter().skip(offset).take(limit).collect());
        }
        if keyed_by_last_param(sql) {
            let id = params.last();
            if id.is_some() && id == self.fail_reads_for.lock().unwrap().as_ref() {
                return Err(AppError::Persistence("connection reset".into()));
            }
            return Ok(id.and_then(|id| self.find(id)).into_iter().collect());
        }
        Ok(rows)
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> Result<Value, AppError> {
        self.record(sql, params);
        self.write_failure()?;
        let columns: Vec<&str> = between(sql, "(", ")").split(", ").collect();
        let mut next = self.next_id.lock().unwrap();
        let id = json!(*next);
        *next += 1;
        let mut row = Map::new();
        row.insert("id".into(), id.clone());
        for (c, v) in columns.iter().zip(params) {
            row.insert(c.to_string(), v.clone());
        }
        self.rows.lock().unwrap().push(row);
        Ok(id)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, AppError> {
        self.record(sql, params);
        self.write_failure()?;
        let Some(id) = params.last() else {
            return Ok(0);
        };
        let mut rows = self.rows.lock().unwrap();
        let Some(pos) = rows.iter().position(|r| r.get("id") == Some(id)) else {
            return Ok(0);
        };
        if sql.starts_with("DELETE") {
            rows.remove(pos);
        } else if sql.starts_with("UPDATE") {
            let sets = between(sql, " SET ", " WHERE ");
            for (assignment, v) in sets.split(", ").zip(params) {
                let column = assignment.split(" = ").next().unwrap_or(assignment);
                rows[pos].insert(column.to_string(), v.clone());
            }
        }
        Ok(1)
    }

    fn fetch_stream(&self, sql: String, params: Vec<Value>) -> RowStream {
        self.record(&sql, &params);
        let rows = self.rows.lock().unwrap().clone();
        stream::iter(rows.into_iter().map(Ok)).boxed()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AuditEvent {
    Created { table: String, id: Value, values: Row },
    Updated { table: String, id: Value, old: Row, new: Row },
    Deleted { table: String, id: Value, old: Row },
}

#[derive(Default)]
pub struct RecordingAudit {
    pub events: Mutex<Vec<AuditEvent>>,
    /// Acting user of each recorded event, parallel to `events`.
    pub actors: Mutex<Vec<String>>,
    pub fail: Mutex<bool>,
}

impl RecordingAudit {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn actors(&self) -> Vec<String> {
        self.actors.lock().unwrap().clone()
    }

    fn push(&self, actor: &str, event: AuditEvent) -> Result<(), AppError> {
        if *self.fail.lock().unwrap() {
            return Err(AppError::Persistence("audit store offline".into()));
        }
        self.events.lock().unwrap().push(event);
        self.actors.lock().unwrap().push(actor.to_string());
        Ok(())
    }
}

#[async_trait]
impl AuditLogger for RecordingAudit {
    async fn log_created(&self, actor: &str, table: &str, id: &Value, values: &Row) -> Result<(), AppError> {
        self.push(actor, AuditEvent::Created {
            table: table.into(),
            id: id.clone(),
            values: values.clone(),
        })
    }

    async fn log_updated(&self, actor: &str, table: &str, id: &Value, old: &Row, new: &Row) -> Result<(), AppError> {
        self.push(actor, AuditEvent::Updated {
            table: table.into(),
            id: id.clone(),
            old: old.clone(),
            new: new.clone(),
        })
    }

    async fn log_deleted(&self, actor: &str, table: &str, id: &Value, old: &Row) -> Result<(), AppError> {
        self.push(actor, AuditEvent::Deleted {
            table: table.into(),
            id: id.clone(),
            old: old.clone(),
        })
    }
}

pub struct Harness {
    pub executor: Arc<FakeExecutor>,
    pub audit: Arc<RecordingAudit>,
    pub grants: Arc<MemoryPermissionStore>,
}

impl Harness {
    pub fn new(rows: Vec<Value>) -> Self {
        Harness {
            executor: FakeExecutor::with_rows(rows),
            audit: Arc::new(RecordingAudit::default()),
            grants: Arc::new(MemoryPermissionStore::new()),
        }
    }

    pub fn ctx(&self, principal: Principal) -> Context {
        let permissions: Arc<dyn PermissionStore> = self.grants.clone();
        Context::new(
            self.executor.clone(),
            permissions,
            self.audit.clone(),
            Arc::new(RuleValidator),
            principal,
        )
    }

    pub fn admin(&self) -> Context {
        self.ctx(Principal::admin("root"))
    }
}

pub fn articles(n: i64) -> Vec<Value> {
    (1..=n)
        .map(|i| json!({"id": i, "title": format!("Article {}", i), "status": "draft"}))
        .collect()
}
