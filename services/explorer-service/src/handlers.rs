use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Form, Json,
};

use crate::errors::ExplorerError;
use crate::models::{AcceptedResponse, AjaxRequest, LongTaskRequest};
use crate::pages;
use crate::service::{self, ServiceError};
use crate::state::AppState;

const UPLOAD_FIELD: &str = "file";

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz() -> StatusCode {
    StatusCode::OK
}

pub async fn index() -> Html<String> {
    Html(pages::index_page())
}

pub async fn about() -> Html<String> {
    Html(pages::about_page())
}

pub async fn upload_form() -> Html<String> {
    Html(pages::upload_page(None))
}

pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> impl IntoResponse {
    let outcome = match multipart {
        Ok(multipart) => match read_upload(multipart).await {
            Ok((filename, contents)) => {
                service::analyze_upload(&state, &filename, &contents).await
            }
            Err(err) => Err(err.into()),
        },
        Err(rejection) => Err(ExplorerError::BadRequest(rejection.body_text()).into()),
    };

    match outcome {
        Ok(components) => {
            (StatusCode::OK, Html(pages::components_page("Results", &components))).into_response()
        }
        Err(err) => {
            tracing::warn!(
                code = err.body.code,
                message = err.body.message.as_str(),
                reasons = ?err.body.reasons,
                "upload rejected"
            );
            let message = match err.body.reasons.first() {
                Some(reason) => format!("{}: {reason}", err.body.message),
                None => err.body.message.clone(),
            };
            (err.status, Html(pages::upload_page(Some(&message)))).into_response()
        }
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), ExplorerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(ExplorerError::InvalidFilename(filename));
        }
        let contents = field
            .bytes()
            .await
            .map_err(multipart_error)?;
        return Ok((filename, contents.to_vec()));
    }
    Err(ExplorerError::BadRequest(format!(
        "missing multipart field {UPLOAD_FIELD:?}"
    )))
}

fn multipart_error(err: MultipartError) -> ExplorerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ExplorerError::PayloadTooLarge(err.body_text())
    } else {
        ExplorerError::BadRequest(err.body_text())
    }
}

pub async fn longtask(
    State(state): State<AppState>,
    Form(payload): Form<LongTaskRequest>,
) -> impl IntoResponse {
    match service::start_long_task(&state, payload.filename.as_deref()).await {
        Ok(task_id) => (
            StatusCode::ACCEPTED,
            [(header::LOCATION, format!("/status/{task_id}"))],
            Json(AcceptedResponse {}),
        )
            .into_response(),
        Err(err) => json_error(err),
    }
}

pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    match service::task_status(&state, &task_id).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => json_error(err),
    }
}

pub async fn ajax(
    State(state): State<AppState>,
    Form(payload): Form<AjaxRequest>,
) -> impl IntoResponse {
    match service::window_result(&state, payload.filename.as_deref()).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => json_error(err),
    }
}

pub async fn browse(State(state): State<AppState>) -> impl IntoResponse {
    match service::list_results(&state).await {
        Ok(files) => (StatusCode::OK, Html(pages::browse_page(&files))).into_response(),
        Err(err) => html_error(err),
    }
}

pub async fn result(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> impl IntoResponse {
    match service::stored_summaries(&state, &filename).await {
        Ok(components) => {
            (StatusCode::OK, Html(pages::components_page(&filename, &components))).into_response()
        }
        Err(err) => html_error(err),
    }
}

fn json_error(err: ServiceError) -> axum::response::Response {
    (err.status, Json(err.body)).into_response()
}

fn html_error(err: ServiceError) -> axum::response::Response {
    (
        err.status,
        Html(pages::error_page("Something went wrong", &err.body.message)),
    )
        .into_response()
}
