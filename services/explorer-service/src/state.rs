use std::{sync::Arc, time::Duration};

use crate::config::AppConfig;
use crate::pca::PcaRoutine;
use crate::tasks::TaskRunner;
use crate::uploads::UploadStore;

#[derive(Clone)]
pub struct AppState {
    pub uploads: Arc<UploadStore>,
    pub tasks: TaskRunner,
    pub task_wait_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn from_config(config: &AppConfig, routine: Arc<dyn PcaRoutine>) -> Self {
        let uploads = UploadStore::new(
            config.upload_dir.clone(),
            config.results_dir.clone(),
            config.allowed_extensions.clone(),
        );
        Self {
            uploads: Arc::new(uploads),
            tasks: TaskRunner::new(routine, config.worker_count),
            task_wait_timeout: config.task_wait_timeout,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}
