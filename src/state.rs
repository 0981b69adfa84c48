//! Shared application state for all routes: compiled modules plus collaborators.

use crate::error::AppError;
use crate::extractors::{HeaderPrincipalResolver, PrincipalResolver};
use crate::module::{Context, Module};
use crate::module_state::{MemoryStateStore, StateStore};
use crate::service::{
    AuditLogger, MemoryPermissionStore, PermissionStore, Principal, QueryExecutor, RuleValidator, TracingAuditLogger,
    Validator,
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<dyn QueryExecutor>,
    /// Compiled once at startup, keyed by module key.
    pub modules: Arc<HashMap<String, Arc<Module>>>,
    pub state_store: Arc<dyn StateStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub audit: Arc<dyn AuditLogger>,
    pub validator: Arc<dyn Validator>,
    /// Decides who a request acts as, admin status included.
    pub principals: Arc<dyn PrincipalResolver>,
}

impl AppState {
    /// In-memory state and grants, tracing audit, built-in rule validator. Principals come
    /// from `X-User-ID` and are never admin until a resolver is installed.
    pub fn new(executor: Arc<dyn QueryExecutor>, modules: Vec<Module>) -> Self {
        let modules = modules
            .into_iter()
            .map(|m| (m.key().to_string(), Arc::new(m)))
            .collect();
        AppState {
            executor,
            modules: Arc::new(modules),
            state_store: Arc::new(MemoryStateStore::new()),
            permissions: Arc::new(MemoryPermissionStore::new()),
            audit: Arc::new(TracingAuditLogger),
            validator: Arc::new(RuleValidator),
            principals: Arc::new(HeaderPrincipalResolver),
        }
    }

    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.state_store = store;
        self
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionStore>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_principal_resolver(mut self, principals: Arc<dyn PrincipalResolver>) -> Self {
        self.principals = principals;
        self
    }

    pub fn module(&self, key: &str) -> Result<Arc<Module>, AppError> {
        self.modules
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("module {}", key)))
    }

    pub fn module_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn context(&self, principal: Principal) -> Context {
        Context::new(
            self.executor.clone(),
            self.permissions.clone(),
            self.audit.clone(),
            self.validator.clone(),
            principal,
        )
    }
}
