//! Module routes: listing, filters, forms, mutations, actions and export under `/modules/:module`.

use crate::handlers::module::{
    create_form, destroy, edit_form, export_csv, filter_clear, filter_form, filter_link_count, filter_set, index, list,
    set_filter_link, set_page, set_per_page, set_sort, show, store, table_action, update,
};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

/// Largest accepted request body (form and filter payloads).
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn module_routes(state: AppState) -> Router {
    Router::new()
        .route("/modules", get(index))
        .route("/modules/:module", get(list))
        .route("/modules/:module/page/:page", post(set_page))
        .route("/modules/:module/sort/:column", post(set_sort))
        .route("/modules/:module/per-page/:per_page", post(set_per_page))
        .route("/modules/:module/export.csv", get(export_csv))
        .route(
            "/modules/:module/filters",
            get(filter_form).post(filter_set).delete(filter_clear),
        )
        .route("/modules/:module/filter-links/:index/count", get(filter_link_count))
        .route("/modules/:module/filter-links/:index", post(set_filter_link))
        .route("/modules/:module/create", get(create_form))
        .route("/modules/:module/records", post(store))
        .route("/modules/:module/actions/:name", post(table_action))
        .route("/modules/:module/:id/edit", get(edit_form))
        .route("/modules/:module/:id", get(show).put(update).delete(destroy))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
