use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::table::ResultTable;
use crate::tasks::TaskState;

#[derive(Deserialize)]
pub struct LongTaskRequest {
    pub filename: Option<String>,
}

/// Body of a `202 Accepted`; the task URL travels in `Location`.
#[derive(Serialize)]
pub struct AcceptedResponse {}

#[derive(Debug, Serialize, PartialEq)]
pub struct TaskStatusResponse {
    pub state: &'static str,
    pub current: u64,
    pub total: u64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Arc<ResultTable>>,
}

impl From<TaskState> for TaskStatusResponse {
    fn from(state: TaskState) -> Self {
        let label = state.label();
        match state {
            TaskState::Pending => Self {
                state: label,
                current: 0,
                total: 1,
                status: "Pending...".to_string(),
                result: None,
            },
            TaskState::Progress {
                current,
                total,
                status,
            } => Self {
                state: label,
                current,
                total,
                status,
                result: None,
            },
            TaskState::Success { result } => Self {
                state: label,
                current: 1,
                total: 1,
                status: "Complete".to_string(),
                result: Some(result),
            },
            TaskState::Failure { message } => Self {
                state: label,
                current: 1,
                total: 1,
                status: message,
                result: None,
            },
        }
    }
}

#[derive(Deserialize)]
pub struct AjaxRequest {
    pub filename: Option<String>,
}

/// Windowed views of a stored result table. `filename` carries the full
/// table markup, not the file name.
#[derive(Debug, Serialize)]
pub struct AjaxResponse {
    pub filename: String,
    pub thead: String,
    pub ttail: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
    pub reasons: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::sample_table;

    #[test]
    fn pending_reports_placeholder_progress() {
        let response = TaskStatusResponse::from(TaskState::Pending);
        assert_eq!(response.state, "PENDING");
        assert_eq!((response.current, response.total), (0, 1));
        assert_eq!(response.status, "Pending...");
        let json = serde_json::to_value(&response).expect("json");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn success_carries_result_table() {
        let response = TaskStatusResponse::from(TaskState::Success {
            result: Arc::new(sample_table(1)),
        });
        let json = serde_json::to_value(&response).expect("json");
        assert_eq!(json["state"], "SUCCESS");
        assert_eq!(json["result"]["columns"][1], "PC1");
        assert_eq!(json["result"]["rows"][0][8], "w8_0");
    }

    #[test]
    fn failure_reports_message_as_status() {
        let response = TaskStatusResponse::from(TaskState::Failure {
            message: "vectorizer exploded".to_string(),
        });
        assert_eq!(response.state, "FAILURE");
        assert_eq!(response.status, "vectorizer exploded");
        assert_eq!((response.current, response.total), (1, 1));
    }
}
