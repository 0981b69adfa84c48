//! Service routes outside any module: liveness, readiness and build info.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct Liveness {
    status: &'static str,
}

#[derive(Serialize)]
struct Readiness {
    status: &'static str,
    database: &'static str,
    modules: usize,
}

#[derive(Serialize)]
struct BuildInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    modules: Option<Vec<String>>,
}

impl BuildInfo {
    fn current(modules: Option<Vec<String>>) -> Self {
        BuildInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            modules,
        }
    }
}

async fn live() -> Json<Liveness> {
    Json(Liveness { status: "ok" })
}

/// 503 while the executor cannot answer a trivial query.
async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let modules = state.modules.len();
    match state.executor.fetch_optional("SELECT 1 AS ok", &[]).await {
        Ok(_) => (
            StatusCode::OK,
            Json(Readiness {
                status: "ok",
                database: "ok",
                modules,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Readiness {
                    status: "degraded",
                    database: "unavailable",
                    modules,
                }),
            )
        }
    }
}

async fn build_info() -> Json<BuildInfo> {
    Json(BuildInfo::current(None))
}

async fn registry_info(State(state): State<AppState>) -> Json<BuildInfo> {
    let keys = state.module_keys().into_iter().map(String::from).collect();
    Json(BuildInfo::current(Some(keys)))
}

/// GET /health and GET /version; needs no state.
pub fn common_routes() -> Router {
    Router::new()
        .route("/health", get(live))
        .route("/version", get(build_info))
}

/// Adds GET /ready (database probe) and lists the registered modules under GET /version.
pub fn common_routes_with_ready(state: AppState) -> Router {
    Router::new()
        .route("/health", get(live))
        .route("/ready", get(ready))
        .route("/version", get(registry_info))
        .with_state(state)
}
