//! Example consumer: an admin server over the modules in `MODULES_PATH`.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Or from this directory: `cargo run`

mod auth;

use architect_crud::{
    common_routes_with_ready, ensure_admin_tables, ensure_database_exists, load_from_path, module_routes, resolve_all,
    AppState, PgAuditLogger, PgExecutor, PgPermissionStore, QueryExecutor,
};
use auth::AdminTokenResolver;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("architect_crud=info,audit=info")),
        )
        .init();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/architect".into());
    ensure_database_exists(&database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    ensure_admin_tables(&pool).await?;

    let modules_path = std::env::var("MODULES_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/modules")));
    let configs = load_from_path(&modules_path)?;
    let mut modules = resolve_all(&configs)?;

    let executor: Arc<dyn QueryExecutor> = Arc::new(PgExecutor::new(pool.clone()));
    for m in &mut modules {
        m.verify(executor.as_ref()).await?;
        tracing::info!(module = %m.key(), table = %m.table().table, "module ready");
    }

    let mut state = AppState::new(executor.clone(), modules)
        .with_permissions(Arc::new(PgPermissionStore::new(executor.clone())))
        .with_audit(Arc::new(PgAuditLogger::new(executor.clone())));
    match AdminTokenResolver::from_env() {
        Some(resolver) => state = state.with_principal_resolver(Arc::new(resolver)),
        None => tracing::warn!("ADMIN_TOKEN not set; access rests on per-user grants only"),
    }

    let app = common_routes_with_ready(state.clone()).merge(module_routes(state));
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
