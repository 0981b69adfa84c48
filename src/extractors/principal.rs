//! Who is acting on a request. Identity and admin status come from a resolver the
//! application installs on [`AppState`](crate::state::AppState); request headers alone
//! never grant admin.

use crate::error::AppError;
use crate::service::Principal;
use async_trait::async_trait;
use axum::http::request::Parts;

pub const USER_ID_HEADER: &str = "X-User-ID";

/// Requests without a user id act as this user, which holds no grants unless given some.
pub const ANONYMOUS_USER: &str = "anonymous";

#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    async fn resolve(&self, parts: &Parts) -> Result<Principal, AppError>;
}

/// Takes the user id from `X-User-ID` and never resolves an admin. Access then rests on
/// the permission store's grants for that user. Put an authenticating proxy in front, or
/// install a resolver that verifies credentials.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeaderPrincipalResolver;

#[async_trait]
impl PrincipalResolver for HeaderPrincipalResolver {
    async fn resolve(&self, parts: &Parts) -> Result<Principal, AppError> {
        let user_id = header(parts, USER_ID_HEADER).unwrap_or_else(|| ANONYMOUS_USER.to_string());
        Ok(Principal::user(user_id))
    }
}

pub(crate) fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
