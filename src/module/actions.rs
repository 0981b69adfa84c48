//! Table actions, dispatched by name through a registry.

use super::{Context, Module};
use crate::error::AppError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Denied,
    NotFound,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Skipped {
    pub id: Value,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Completed {
        action: String,
        succeeded: Vec<Value>,
        skipped: Vec<Skipped>,
    },
    /// No handler is registered under the requested name.
    Unknown { action: String },
}

impl ActionOutcome {
    pub fn is_unknown(&self) -> bool {
        matches!(self, ActionOutcome::Unknown { .. })
    }
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn run(&self, module: &Module, ctx: &Context, ids: &[Value]) -> Result<ActionOutcome, AppError>;
}

/// Deletes each id the principal may delete; the rest are reported as skipped.
pub struct DeleteAction;

#[async_trait]
impl ActionHandler for DeleteAction {
    async fn run(&self, module: &Module, ctx: &Context, ids: &[Value]) -> Result<ActionOutcome, AppError> {
        let mut succeeded = Vec::new();
        let mut skipped = Vec::new();
        for id in ids {
            let reason = match module.has_delete(ctx, id).await {
                Ok(true) => match module.delete_record(ctx, id).await {
                    Ok(true) => {
                        succeeded.push(id.clone());
                        continue;
                    }
                    Ok(false) => SkipReason::Failed,
                    Err(AppError::NotFound(_)) => SkipReason::NotFound,
                    Err(e) => {
                        tracing::error!(module = %module.key(), id = %id, error = %e, "delete errored");
                        SkipReason::Failed
                    }
                },
                Ok(false) => {
                    tracing::warn!(module = %module.key(), id = %id, "delete denied");
                    SkipReason::Denied
                }
                Err(e) => {
                    tracing::error!(module = %module.key(), id = %id, error = %e, "delete permission check errored");
                    SkipReason::Failed
                }
            };
            skipped.push(Skipped { id: id.clone(), reason });
        }
        Ok(ActionOutcome::Completed {
            action: "delete".into(),
            succeeded,
            skipped,
        })
    }
}

#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `delete` action.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        r.register("delete", DeleteAction);
        r
    }

    /// Later registrations under the same name replace earlier ones.
    pub fn register(&mut self, name: impl Into<String>, handler: impl ActionHandler + 'static) {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
