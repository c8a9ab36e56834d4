use axum::http::StatusCode;
use uuid::Uuid;

use crate::errors::ExplorerError;
use crate::models::{AjaxResponse, ErrorResponse, TaskStatusResponse};
use crate::pca::PcaJob;
use crate::state::AppState;
use crate::table::{
    ComponentSummary, ResultTable, STORED_SUMMARY_SEPARATOR, TASK_SUMMARY_SEPARATOR,
};
use crate::windower::{self, DEFAULT_WINDOW_ROWS};

const DATAFRAME_CLASS: &str = r#"class="dataframe""#;
const DISPLAY_CLASS: &str = r#"class="centered striped""#;

#[derive(Debug)]
pub struct ServiceError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ServiceError {
    pub fn new(status: StatusCode, code: &'static str, message: String) -> Self {
        Self {
            status,
            body: ErrorResponse {
                code,
                message,
                reasons: Vec::new(),
            },
        }
    }

    pub fn with_reasons(
        status: StatusCode,
        code: &'static str,
        message: String,
        reasons: Vec<String>,
    ) -> Self {
        Self {
            status,
            body: ErrorResponse {
                code,
                message,
                reasons,
            },
        }
    }
}

impl From<ExplorerError> for ServiceError {
    fn from(err: ExplorerError) -> Self {
        let status = match &err {
            ExplorerError::InvalidFilename(_) | ExplorerError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ExplorerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ExplorerError::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ExplorerError::MalformedDocument(_) | ExplorerError::InvalidTable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ExplorerError::NotFound(_) => StatusCode::NOT_FOUND,
            ExplorerError::TaskTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ExplorerError::TaskFailure(_) | ExplorerError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if let ExplorerError::Io(io_err) = &err {
            tracing::error!(error = %io_err, "filesystem error");
            return ServiceError::new(status, err.code(), "filesystem error".to_string());
        }
        if let ExplorerError::TaskFailure(message) = &err {
            return ServiceError::with_reasons(
                status,
                err.code(),
                "analysis failed".to_string(),
                vec![message.clone()],
            );
        }
        ServiceError::new(status, err.code(), err.to_string())
    }
}

/// Store an upload, run the analysis and wait (bounded) for its summaries.
pub async fn analyze_upload(
    state: &AppState,
    raw_filename: &str,
    contents: &[u8],
) -> Result<Vec<ComponentSummary>, ServiceError> {
    let resolved = state.uploads.resolve(raw_filename)?;
    state.uploads.ensure_allowed(&resolved.name)?;

    tokio::fs::write(&resolved.upload_path, contents)
        .await
        .map_err(ExplorerError::from)?;
    tracing::info!(
        filename = resolved.name.as_str(),
        bytes = contents.len(),
        "upload stored"
    );

    let job = PcaJob {
        upload_path: resolved.upload_path.clone(),
        result_base: resolved.result_base(),
    };
    let task_id = state.tasks.submit(job).await;
    let table = state.tasks.wait(&task_id, state.task_wait_timeout).await?;
    Ok(table.component_summaries(TASK_SUMMARY_SEPARATOR)?)
}

/// Queue analysis of an already uploaded file without waiting for it.
pub async fn start_long_task(
    state: &AppState,
    filename: Option<&str>,
) -> Result<Uuid, ServiceError> {
    let filename = filename
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ExplorerError::BadRequest("filename is required".to_string()))?;
    let resolved = state.uploads.resolve(filename)?;
    state.uploads.ensure_allowed(&resolved.name)?;

    if !tokio::fs::try_exists(&resolved.upload_path)
        .await
        .map_err(ExplorerError::from)?
    {
        return Err(ExplorerError::NotFound(format!("upload {}", resolved.name)).into());
    }

    let task_id = state
        .tasks
        .submit(PcaJob {
            upload_path: resolved.upload_path.clone(),
            result_base: resolved.result_base(),
        })
        .await;
    Ok(task_id)
}

pub async fn task_status(
    state: &AppState,
    task_id: &str,
) -> Result<TaskStatusResponse, ServiceError> {
    let not_found = || ExplorerError::NotFound(format!("task {task_id}"));
    let id = Uuid::parse_str(task_id).map_err(|_| not_found())?;
    let snapshot = state.tasks.status(&id).await.ok_or_else(not_found)?;
    Ok(TaskStatusResponse::from(snapshot))
}

pub async fn window_result(
    state: &AppState,
    filename: Option<&str>,
) -> Result<AjaxResponse, ServiceError> {
    let filename =
        filename.ok_or_else(|| ExplorerError::BadRequest("filename is required".to_string()))?;
    let path = state.uploads.results_path(filename)?;
    let document = match tokio::fs::read_to_string(&path).await {
        Ok(document) => document,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ExplorerError::NotFound(format!("result {filename}")).into());
        }
        Err(err) => return Err(ExplorerError::from(err).into()),
    };

    let document = document.replace(DATAFRAME_CLASS, DISPLAY_CLASS);
    let window = windower::window(&document, DEFAULT_WINDOW_ROWS)?;
    Ok(AjaxResponse {
        filename: window.full,
        thead: window.head,
        ttail: window.tail,
    })
}

/// Rebuild summaries from a CSV kept in the results directory.
pub async fn stored_summaries(
    state: &AppState,
    filename: &str,
) -> Result<Vec<ComponentSummary>, ServiceError> {
    let path = state.uploads.results_path(filename)?;
    let table = ResultTable::load_csv(&path).await.map_err(|err| match err {
        ExplorerError::NotFound(_) => ExplorerError::NotFound(format!("result {filename}")),
        other => other,
    })?;
    Ok(table.component_summaries(STORED_SUMMARY_SEPARATOR)?)
}

pub async fn list_results(state: &AppState) -> Result<Vec<String>, ServiceError> {
    Ok(state.uploads.list_results().await?)
}
