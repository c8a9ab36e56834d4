use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    about, ajax, browse, healthz, index, longtask, readyz, result, task_status, upload,
    upload_form,
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/", get(index))
        .route("/about", get(about))
        .route("/upload", get(upload_form).post(upload))
        .route("/longtask", post(longtask))
        .route("/status/:task_id", get(task_status))
        .route("/ajax", post(ajax))
        .route("/browse", get(browse))
        .route("/results/:filename", get(result))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
