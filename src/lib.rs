//! Architect CRUD: declarative admin tables over PostgreSQL.
//!
//! A [`Module`] binds a [`TableSchema`] (listing) and a [`FormSchema`] (forms) to one base
//! table. Listings, forms, mutations with audit trail, table actions and CSV export are
//! driven by the schema and the caller's [`ModuleState`].

pub mod builder;
pub mod case;
pub mod config;
pub mod datasource;
pub mod error;
pub mod extractors;
pub mod format;
pub mod handlers;
pub mod module;
pub mod module_state;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use builder::{ActionBuilder, ColumnBuilder, FieldBuilder, FormSchemaBuilder, TableSchemaBuilder};
pub use config::{load_from_path, parse_modules, resolve, resolve_all, ModuleConfig};
pub use datasource::{DataSource, TableResult};
pub use error::{AppError, ConfigError, FieldErrors};
pub use module::{ActionHandler, ActionOutcome, Context, Module, MutationOutcome, Notice};
pub use module_state::{MemoryStateStore, ModuleState, StateKey, StateStore};
pub use routes::{common_routes, common_routes_with_ready, module_routes};
pub use schema::{FormSchema, FormType, TableSchema};
pub use service::{
    AuditLogger, Capabilities, PermissionMode, PermissionStore, PgAuditLogger, PgExecutor, PgPermissionStore, Principal,
    QueryExecutor, RuleValidator, TracingAuditLogger, Validator,
};
pub use sql::WhereClause;
pub use state::AppState;
pub use store::{ensure_admin_tables, ensure_database_exists};
