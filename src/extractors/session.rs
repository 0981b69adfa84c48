//! Extract the client session and the acting principal for a request.

use super::principal::header;
use crate::error::AppError;
use crate::service::Principal;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

pub const SESSION_ID_HEADER: &str = "X-Session-ID";

#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    pub principal: Principal,
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = header(parts, SESSION_ID_HEADER)
            .ok_or_else(|| AppError::BadRequest(format!("missing {} header", SESSION_ID_HEADER)))?;
        let principal = state.principals.resolve(parts).await?;
        Ok(Session { id, principal })
    }
}
