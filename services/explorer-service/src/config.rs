use std::{path::PathBuf, time::Duration};

use pca_explorer_common::{env_list, env_or, env_string};

use crate::pca::CommandPcaConfig;

const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["txt", "pdf", "png", "jpg", "jpeg", "gif"];
const DEFAULT_PCA_ARGS: &[&str] = &["-m", "vec2pca"];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub upload_dir: PathBuf,
    pub results_dir: PathBuf,
    pub allowed_extensions: Vec<String>,
    pub worker_count: usize,
    /// Upper bound on how long an upload request waits for its task.
    pub task_wait_timeout: Duration,
    /// How long finished task results stay queryable; zero keeps them forever.
    pub task_result_ttl: Duration,
    pub max_upload_bytes: usize,
    pub pca: CommandPcaConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_or("PORT", 5000u16),
            upload_dir: PathBuf::from(env_string("UPLOAD_DIR", "uploads")),
            results_dir: PathBuf::from(env_string("RESULTS_DIR", "results")),
            allowed_extensions: env_list("ALLOWED_EXTENSIONS", DEFAULT_ALLOWED_EXTENSIONS),
            worker_count: env_or("WORKER_COUNT", 2usize),
            task_wait_timeout: Duration::from_secs(env_or("TASK_WAIT_TIMEOUT_SECS", 600u64)),
            task_result_ttl: Duration::from_secs(env_or("TASK_RESULT_TTL_SECS", 86_400u64)),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 32 * 1024 * 1024usize),
            pca: CommandPcaConfig {
                program: env_string("PCA_PROGRAM", "python3"),
                args: env_list("PCA_ARGS", DEFAULT_PCA_ARGS),
                timeout: Duration::from_secs(env_or("PCA_TIMEOUT_SECS", 900u64)),
                output_limit_bytes: env_or("PCA_OUTPUT_LIMIT_BYTES", 4 * 1024 * 1024u64),
            },
        }
    }
}
