use crate::service::{AuditLogger, PermissionStore, Principal, QueryExecutor, Validator};
use std::sync::Arc;

/// Collaborators and the acting principal for one orchestrator call.
#[derive(Clone)]
pub struct Context {
    pub executor: Arc<dyn QueryExecutor>,
    pub permissions: Arc<dyn PermissionStore>,
    pub audit: Arc<dyn AuditLogger>,
    pub validator: Arc<dyn Validator>,
    pub principal: Principal,
}

impl Context {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        permissions: Arc<dyn PermissionStore>,
        audit: Arc<dyn AuditLogger>,
        validator: Arc<dyn Validator>,
        principal: Principal,
    ) -> Self {
        Context {
            executor,
            permissions,
            audit,
            validator,
            principal,
        }
    }

    /// Same collaborators acting for another principal.
    pub fn for_principal(&self, principal: Principal) -> Self {
        Context {
            principal,
            ..self.clone()
        }
    }
}
