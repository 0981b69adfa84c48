//! Standard response envelope helpers.

use crate::module::Notice;
use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

#[derive(Serialize)]
pub struct Meta {
    pub notice: Notice,
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::CREATED, Json(SuccessOne { data, meta: None }))
}

pub fn success_one_ok<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::OK, Json(SuccessOne { data, meta: None }))
}

/// Envelope carrying a user-visible notice alongside the data.
pub fn with_notice<T: Serialize>(status: StatusCode, data: T, notice: Notice) -> (StatusCode, Json<SuccessOne<T>>) {
    (
        status,
        Json(SuccessOne {
            data,
            meta: Some(Meta { notice }),
        }),
    )
}
