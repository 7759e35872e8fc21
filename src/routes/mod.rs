pub mod api;
pub mod extract;
pub mod pages;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(pages::index))
        .route("/admin", get(pages::admin_dashboard))
        .route("/admin/view/:id", get(pages::admin_view))
        .route("/reviewer", get(pages::reviewer_dashboard))
        .route("/edit-submission", get(pages::edit_submission))
        .route(
            "/api/applications",
            get(api::list_applications).post(api::submit_application),
        )
        .route(
            "/api/applications/:id",
            get(api::get_application).put(api::update_application),
        )
        .route("/api/applications/:id/complete", post(api::complete_application))
        .route("/api/applications/:id/protocol-code", post(api::assign_protocol_code))
        .route("/api/applications/:id/slots/:slot", put(api::assign_slot))
        .route("/api/applications/:id/slots/:slot/status", put(api::set_slot_status))
        .route("/api/applications/:id/files/:category/url", get(api::file_url))
        .route("/api/applications/:id/files.zip", get(api::download_all))
        .route("/api/applications/:id/reviews", get(api::list_reviews))
        .route("/api/reviewers", get(api::list_reviewers).post(api::add_reviewer))
        .route("/api/reviewers/:id/active", put(api::set_reviewer_active))
        .route("/api/reviewer/login", post(api::reviewer_login))
        .route("/api/reviewer/assignments", get(api::reviewer_assignments))
        .route("/api/forms/:kind/prefill/:id", get(api::form_prefill))
        .route("/api/forms/:kind", post(api::submit_form))
        .route("/api/admin/init-db", post(api::init_db))
        .route("/files/*path", get(api::download_file))
        .nest_service("/static", tower_http::services::ServeDir::new("static"))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
