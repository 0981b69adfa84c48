//! Admin access for the demo server: a shared bearer token from `ADMIN_TOKEN`.

use architect_crud::extractors::{HeaderPrincipalResolver, PrincipalResolver};
use architect_crud::{AppError, Principal};
use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, request::Parts};

/// Admin when `Authorization: Bearer <token>` matches; otherwise the header-named user.
pub struct AdminTokenResolver {
    token: String,
}

impl AdminTokenResolver {
    /// `None` when `ADMIN_TOKEN` is unset or empty.
    pub fn from_env() -> Option<Self> {
        std::env::var("ADMIN_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(|token| AdminTokenResolver { token })
    }
}

#[async_trait]
impl PrincipalResolver for AdminTokenResolver {
    async fn resolve(&self, parts: &Parts) -> Result<Principal, AppError> {
        let mut principal = HeaderPrincipalResolver.resolve(parts).await?;
        principal.is_admin = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|t| t == self.token);
        Ok(principal)
    }
}
