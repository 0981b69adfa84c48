//! Module handlers: load the caller's module state, call the orchestrator, save, serialize.

use crate::error::AppError;
use crate::extractors::Session;
use crate::module::{FilterPayload, Module, MutationOutcome, Notice};
use crate::module_state::{ModuleState, StateKey};
use crate::response::{success_one_ok, with_notice};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Integer-looking ids bind as integers; everything else as text (UUIDs are typed by the binder).
fn parse_id(id: &str) -> Value {
    match id.parse::<i64>() {
        Ok(n) => Value::Number(n.into()),
        Err(_) => Value::String(id.to_string()),
    }
}

fn body_to_map(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

struct Loaded {
    module: Arc<Module>,
    key: StateKey,
    state: ModuleState,
}

async fn load(app: &AppState, module: &str, session: &Session) -> Result<Loaded, AppError> {
    let m = app.module(module)?;
    let key = StateKey::new(module, &session.id);
    let state = ModuleState::load(app.state_store.as_ref(), &key).await?;
    Ok(Loaded { module: m, key, state })
}

impl Loaded {
    async fn save(&self, app: &AppState) -> Result<(), AppError> {
        self.state.save(app.state_store.as_ref(), &self.key).await
    }
}

pub async fn index(State(app): State<AppState>) -> impl IntoResponse {
    let keys: Vec<String> = app.module_keys().into_iter().map(String::from).collect();
    success_one_ok(keys)
}

pub async fn list(
    State(app): State<AppState>,
    Path(module): Path<String>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let l = load(&app, &module, &session).await?;
    let listing = l.module.list(&app.context(session.principal), &l.state).await?;
    Ok(success_one_ok(listing))
}

pub async fn set_page(
    State(app): State<AppState>,
    Path((module, page)): Path<(String, u32)>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let mut l = load(&app, &module, &session).await?;
    let listing = l
        .module
        .set_page(&app.context(session.principal), &mut l.state, page)
        .await?;
    l.save(&app).await?;
    Ok(success_one_ok(listing))
}

pub async fn set_sort(
    State(app): State<AppState>,
    Path((module, column)): Path<(String, usize)>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let mut l = load(&app, &module, &session).await?;
    let listing = l
        .module
        .set_sort(&app.context(session.principal), &mut l.state, column)
        .await?;
    l.save(&app).await?;
    Ok(success_one_ok(listing))
}

pub async fn set_per_page(
    State(app): State<AppState>,
    Path((module, per_page)): Path<(String, u32)>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let mut l = load(&app, &module, &session).await?;
    let listing = l
        .module
        .set_per_page(&app.context(session.principal), &mut l.state, per_page)
        .await?;
    l.save(&app).await?;
    Ok(success_one_ok(listing))
}

pub async fn export_csv(
    State(app): State<AppState>,
    Path(module): Path<String>,
    session: Session,
) -> Result<Response, AppError> {
    let l = load(&app, &module, &session).await?;
    let stream = l.module.export_csv(&app.context(session.principal), &l.state).await?;
    let disposition = format!("attachment; filename=\"{}.csv\"", l.module.key());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

pub async fn filter_form(
    State(app): State<AppState>,
    Path(module): Path<String>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let l = load(&app, &module, &session).await?;
    let form = l
        .module
        .render_filter_form(&app.context(session.principal), &l.state)
        .await?;
    Ok(success_one_ok(form))
}

pub async fn filter_set(
    State(app): State<AppState>,
    Path(module): Path<String>,
    session: Session,
    Json(payload): Json<FilterPayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut l = load(&app, &module, &session).await?;
    let ctx = app.context(session.principal);
    l.module.filter_set(&ctx, &mut l.state, &payload)?.map_err(AppError::Validation)?;
    l.save(&app).await?;
    Ok(success_one_ok(l.module.list(&ctx, &l.state).await?))
}

pub async fn filter_clear(
    State(app): State<AppState>,
    Path(module): Path<String>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let mut l = load(&app, &module, &session).await?;
    l.module.filter_clear(&mut l.state);
    l.save(&app).await?;
    Ok(success_one_ok(l.module.list(&app.context(session.principal), &l.state).await?))
}

pub async fn filter_link_count(
    State(app): State<AppState>,
    Path((module, index)): Path<(String, usize)>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let m = app.module(&module)?;
    let count = m.filter_link_count(&app.context(session.principal), index).await?;
    Ok(success_one_ok(serde_json::json!({ "index": index, "count": count })))
}

pub async fn set_filter_link(
    State(app): State<AppState>,
    Path((module, index)): Path<(String, usize)>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let mut l = load(&app, &module, &session).await?;
    let listing = l
        .module
        .set_active_filter_link(&app.context(session.principal), &mut l.state, index)
        .await?;
    l.save(&app).await?;
    Ok(success_one_ok(listing))
}

pub async fn create_form(
    State(app): State<AppState>,
    Path(module): Path<String>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let m = app.module(&module)?;
    Ok(success_one_ok(m.render_create_form(&app.context(session.principal)).await?))
}

pub async fn edit_form(
    State(app): State<AppState>,
    Path((module, id)): Path<(String, String)>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let m = app.module(&module)?;
    let form = m.render_edit_form(&app.context(session.principal), &parse_id(&id)).await?;
    Ok(success_one_ok(form))
}

pub async fn show(
    State(app): State<AppState>,
    Path((module, id)): Path<(String, String)>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let m = app.module(&module)?;
    let form = m.render_show_form(&app.context(session.principal), &parse_id(&id)).await?;
    Ok(success_one_ok(form))
}

fn mutation_response(module: &Module, outcome: MutationOutcome, status: StatusCode) -> Result<Response, AppError> {
    if let MutationOutcome::Invalid { errors } = outcome {
        return Err(AppError::Validation(errors));
    }
    let status = if outcome.succeeded() {
        status
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let notice = outcome
        .notice(module.key())
        .unwrap_or_else(|| Notice::warning("the record could not be saved"));
    Ok(with_notice(status, outcome, notice).into_response())
}

pub async fn store(
    State(app): State<AppState>,
    Path(module): Path<String>,
    session: Session,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let mut l = load(&app, &module, &session).await?;
    let payload = body_to_map(body)?;
    let outcome = l
        .module
        .store(&app.context(session.principal), &mut l.state, &payload)
        .await?;
    if outcome.succeeded() {
        l.save(&app).await?;
    }
    mutation_response(&l.module, outcome, StatusCode::CREATED)
}

pub async fn update(
    State(app): State<AppState>,
    Path((module, id)): Path<(String, String)>,
    session: Session,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let m = app.module(&module)?;
    let payload = body_to_map(body)?;
    let outcome = m.update(&app.context(session.principal), &parse_id(&id), &payload).await?;
    mutation_response(&m, outcome, StatusCode::OK)
}

pub async fn destroy(
    State(app): State<AppState>,
    Path((module, id)): Path<(String, String)>,
    session: Session,
) -> Result<Response, AppError> {
    let m = app.module(&module)?;
    if m.destroy(&app.context(session.principal), &parse_id(&id)).await? {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(with_notice(
            StatusCode::INTERNAL_SERVER_ERROR,
            Value::Null,
            Notice::warning("the record could not be deleted"),
        )
        .into_response())
    }
}

#[derive(Debug, Deserialize)]
pub struct ActionBody {
    #[serde(default)]
    pub ids: Vec<Value>,
}

pub async fn table_action(
    State(app): State<AppState>,
    Path((module, name)): Path<(String, String)>,
    session: Session,
    Json(body): Json<ActionBody>,
) -> Result<Response, AppError> {
    let m = app.module(&module)?;
    let outcome = m.table_action(&app.context(session.principal), &name, &body.ids).await?;
    if outcome.is_unknown() {
        let notice = Notice::warning(format!("unknown action: {}", name));
        return Ok(with_notice(StatusCode::OK, outcome, notice).into_response());
    }
    Ok(success_one_ok(outcome).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_bind_as_integers_when_numeric() {
        assert_eq!(parse_id("42"), json!(42));
        assert_eq!(parse_id("a1"), json!("a1"));
        assert_eq!(
            parse_id("8a1b2c3d-0000-4000-8000-000000000000"),
            json!("8a1b2c3d-0000-4000-8000-000000000000")
        );
    }
}
