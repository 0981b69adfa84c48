//! Permission collaborator and the per-module gating rules.

use crate::error::AppError;
use crate::service::executor::QueryExecutor;
use crate::store::qualified_admin_table;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    Create,
    Edit,
    Delete,
    Show,
    Export,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Create => "create",
            PermissionMode::Edit => "edit",
            PermissionMode::Delete => "delete",
            PermissionMode::Show => "show",
            PermissionMode::Export => "export",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static per-module switches, fixed when the module is declared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub create: bool,
    pub edit: bool,
    pub delete: bool,
    pub show: bool,
    pub export: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            create: true,
            edit: true,
            delete: true,
            show: true,
            export: true,
        }
    }
}

impl Capabilities {
    pub fn allows(&self, mode: PermissionMode) -> bool {
        match mode {
            PermissionMode::Create => self.create,
            PermissionMode::Edit => self.edit,
            PermissionMode::Delete => self.delete,
            PermissionMode::Show => self.show,
            PermissionMode::Export => self.export,
        }
    }
}

/// The user a request acts for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub is_admin: bool,
}

impl Principal {
    pub fn user(user_id: impl Into<String>) -> Self {
        Principal {
            user_id: user_id.into(),
            is_admin: false,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Principal {
            user_id: user_id.into(),
            is_admin: true,
        }
    }
}

/// Optional per-record policy AND-ed into id-scoped checks.
pub type RecordPolicy = Arc<dyn Fn(PermissionMode, &Value) -> bool + Send + Sync>;

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn has_module_grant(&self, user_id: &str, module_id: &str, mode: PermissionMode) -> Result<bool, AppError>;
}

/// Grants held in memory.
#[derive(Default)]
pub struct MemoryPermissionStore {
    grants: RwLock<HashSet<(String, String, PermissionMode)>>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, user_id: &str, module_id: &str, mode: PermissionMode) {
        if let Ok(mut g) = self.grants.write() {
            g.insert((user_id.to_string(), module_id.to_string(), mode));
        }
    }

    pub fn revoke(&self, user_id: &str, module_id: &str, mode: PermissionMode) {
        if let Ok(mut g) = self.grants.write() {
            g.remove(&(user_id.to_string(), module_id.to_string(), mode));
        }
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn has_module_grant(&self, user_id: &str, module_id: &str, mode: PermissionMode) -> Result<bool, AppError> {
        let g = self
            .grants
            .read()
            .map_err(|_| AppError::Persistence("permission store lock poisoned".into()))?;
        Ok(g.contains(&(user_id.to_string(), module_id.to_string(), mode)))
    }
}

/// Grants stored in `<admin schema>.module_grants`.
#[derive(Clone)]
pub struct PgPermissionStore {
    executor: Arc<dyn QueryExecutor>,
}

impl PgPermissionStore {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        PgPermissionStore { executor }
    }
}

#[async_trait]
impl PermissionStore for PgPermissionStore {
    async fn has_module_grant(&self, user_id: &str, module_id: &str, mode: PermissionMode) -> Result<bool, AppError> {
        let sql = format!(
            "SELECT 1 AS granted FROM {} WHERE user_id = ? AND module_id = ? AND mode = ?",
            qualified_admin_table("module_grants")
        );
        let params = [
            Value::String(user_id.into()),
            Value::String(module_id.into()),
            Value::String(mode.as_str().into()),
        ];
        Ok(self.executor.fetch_optional(&sql, &params).await?.is_some())
    }
}
