//! Collaborators consumed by the orchestrator: query execution, validation, audit, permissions.

pub mod audit;
pub mod executor;
pub mod permission;
mod validation;

pub use audit::{AuditLogger, PgAuditLogger, TracingAuditLogger};
pub use executor::{fetch_count, PgExecutor, QueryExecutor, Row, RowStream};
pub use permission::{
    Capabilities, MemoryPermissionStore, PermissionMode, PermissionStore, PgPermissionStore, Principal, RecordPolicy,
};
pub use validation::{RuleSet, RuleValidator, Validator};
