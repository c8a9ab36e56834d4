use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),
    #[error("unsupported file type: {0:?}")]
    UnsupportedFileType(String),
    #[error("malformed table document: {0}")]
    MalformedDocument(&'static str),
    #[error("result table is unusable: {0}")]
    InvalidTable(String),
    #[error("task failed: {0}")]
    TaskFailure(String),
    #[error("task {task_id} did not finish within {}s", .timeout.as_secs())]
    TaskTimeout { task_id: String, timeout: Duration },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("upload too large: {0}")]
    PayloadTooLarge(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExplorerError {
    pub fn code(&self) -> &'static str {
        match self {
            ExplorerError::InvalidFilename(_) => "invalid_filename",
            ExplorerError::UnsupportedFileType(_) => "unsupported_file_type",
            ExplorerError::MalformedDocument(_) => "malformed_document",
            ExplorerError::InvalidTable(_) => "invalid_table",
            ExplorerError::TaskFailure(_) => "task_failure",
            ExplorerError::TaskTimeout { .. } => "task_timeout",
            ExplorerError::NotFound(_) => "not_found",
            ExplorerError::BadRequest(_) => "bad_request",
            ExplorerError::PayloadTooLarge(_) => "payload_too_large",
            ExplorerError::Io(_) => "io_error",
        }
    }
}
