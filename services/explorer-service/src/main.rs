mod app;
mod config;
mod errors;
mod handlers;
mod models;
mod pages;
mod pca;
mod service;
mod state;
mod table;
mod tasks;
mod uploads;
mod windower;

use std::sync::Arc;

use pca_explorer_common::{bind_listener, init_tracing, shutdown_signal};

use crate::config::AppConfig;
use crate::pca::CommandPcaRoutine;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    let guards = init_tracing("explorer-service");
    if !guards.has_file_output() {
        tracing::warn!("file logging unavailable, logging to stdout only");
    }

    let config = AppConfig::from_env();
    let routine = Arc::new(CommandPcaRoutine::new(config.pca.clone()));
    let state = AppState::from_config(&config, routine);
    state.tasks.spawn_result_expiry(config.task_result_ttl);
    tracing::info!(
        port = config.port,
        upload_dir = %state.uploads.upload_dir().display(),
        results_dir = %state.uploads.results_dir().display(),
        workers = config.worker_count,
        result_ttl_secs = config.task_result_ttl.as_secs(),
        pca_program = config.pca.program.as_str(),
        "starting explorer service"
    );
    state
        .uploads
        .ensure_dirs()
        .await
        .expect("create upload and results directories");

    let app = app::build_router(state);
    let listener = bind_listener(config.port).await;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("serve");
}
