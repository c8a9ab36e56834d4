//! In-process task queue for PCA jobs.
//!
//! Each submission gets a UUID and a `watch` channel holding its current
//! state. Workers are bounded by a semaphore, so a task stays `PENDING` until a
//! permit frees up. State only moves forward: PENDING, then PROGRESS, then
//! SUCCESS or FAILURE, after which it never changes. Finished tasks are
//! forgotten once their result TTL passes.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    sync::{watch, Mutex, Semaphore},
    time::Instant,
};
use uuid::Uuid;

use crate::errors::ExplorerError;
use crate::pca::{PcaJob, PcaRoutine};
use crate::table::ResultTable;

pub const STARTED_STATUS: &str = "Started";
const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Progress {
        current: u64,
        total: u64,
        status: String,
    },
    Success {
        result: Arc<ResultTable>,
    },
    Failure {
        message: String,
    },
}

impl TaskState {
    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Progress { .. } => "PROGRESS",
            TaskState::Success { .. } => "SUCCESS",
            TaskState::Failure { .. } => "FAILURE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success { .. } | TaskState::Failure { .. })
    }

    fn can_advance_to(&self, next: &TaskState) -> bool {
        match (self, next) {
            (TaskState::Pending, TaskState::Progress { .. }) => true,
            (TaskState::Progress { .. }, TaskState::Progress { .. }) => true,
            (TaskState::Progress { .. }, TaskState::Success { .. } | TaskState::Failure { .. }) => {
                true
            }
            _ => false,
        }
    }
}

struct TaskEntry {
    state: Arc<watch::Sender<TaskState>>,
    finished_at: Option<Instant>,
}

type TaskMap = HashMap<Uuid, TaskEntry>;

#[derive(Clone)]
pub struct TaskRunner {
    tasks: Arc<Mutex<TaskMap>>,
    routine: Arc<dyn PcaRoutine>,
    workers: Arc<Semaphore>,
}

impl TaskRunner {
    pub fn new(routine: Arc<dyn PcaRoutine>, worker_count: usize) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            routine,
            workers: Arc::new(Semaphore::new(worker_count.max(1))),
        }
    }

    /// Queue a job and return its id straight away.
    pub async fn submit(&self, job: PcaJob) -> Uuid {
        let id = Uuid::new_v4();
        let (sender, _) = watch::channel(TaskState::Pending);
        let sender = Arc::new(sender);
        self.tasks.lock().await.insert(
            id,
            TaskEntry {
                state: sender.clone(),
                finished_at: None,
            },
        );

        tracing::info!(
            task_id = %id,
            upload = %job.upload_path.display(),
            result_base = %job.result_base.display(),
            "task submitted"
        );
        tokio::spawn(run_task(
            id,
            job,
            sender,
            self.tasks.clone(),
            self.routine.clone(),
            self.workers.clone(),
        ));
        id
    }

    pub async fn status(&self, id: &Uuid) -> Option<TaskState> {
        let tasks = self.tasks.lock().await;
        tasks.get(id).map(|entry| entry.state.borrow().clone())
    }

    /// Block until the task is terminal or `timeout` elapses.
    pub async fn wait(
        &self,
        id: &Uuid,
        timeout: Duration,
    ) -> Result<Arc<ResultTable>, ExplorerError> {
        let mut receiver = {
            let tasks = self.tasks.lock().await;
            tasks
                .get(id)
                .map(|entry| entry.state.subscribe())
                .ok_or_else(|| ExplorerError::NotFound(format!("task {id}")))?
        };

        let finished = tokio::time::timeout(timeout, receiver.wait_for(TaskState::is_terminal))
            .await
            .map_err(|_| ExplorerError::TaskTimeout {
                task_id: id.to_string(),
                timeout,
            })?
            .map_err(|_| ExplorerError::TaskFailure("task state channel closed".to_string()))?;

        match &*finished {
            TaskState::Success { result } => Ok(result.clone()),
            TaskState::Failure { message } => Err(ExplorerError::TaskFailure(message.clone())),
            other => Err(ExplorerError::TaskFailure(format!(
                "task stopped in {}",
                other.label()
            ))),
        }
    }

    /// Drop tasks that finished at least `ttl` ago. Returns how many went.
    pub async fn evict_finished(&self, ttl: Duration) -> usize {
        let mut tasks = self.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|_, entry| {
            entry
                .finished_at
                .map_or(true, |finished_at| finished_at.elapsed() < ttl)
        });
        before - tasks.len()
    }

    /// Periodically evict finished tasks. A zero `ttl` keeps them forever.
    pub fn spawn_result_expiry(&self, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let runner = self.clone();
        let period = ttl.min(MAX_SWEEP_PERIOD);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let evicted = runner.evict_finished(ttl).await;
                if evicted > 0 {
                    tracing::debug!(evicted, "expired finished tasks");
                }
            }
        });
    }
}

async fn run_task(
    id: Uuid,
    job: PcaJob,
    state: Arc<watch::Sender<TaskState>>,
    tasks: Arc<Mutex<TaskMap>>,
    routine: Arc<dyn PcaRoutine>,
    workers: Arc<Semaphore>,
) {
    let Ok(_permit) = workers.acquire_owned().await else {
        tracing::error!(task_id = %id, "worker pool closed before task started");
        return;
    };

    advance(
        id,
        &state,
        TaskState::Progress {
            current: 0,
            total: 0,
            status: STARTED_STATUS.to_string(),
        },
    );

    // Run on its own task so a panic inside the routine lands in FAILURE.
    let computation = tokio::spawn(async move { routine.compute(&job).await });
    let next = match computation.await {
        Ok(Ok(output)) => {
            tracing::debug!(
                task_id = %id,
                raw_model_bytes = output.raw_model.len(),
                rows = output.table.rows.len(),
                "pca output received"
            );
            TaskState::Success {
                result: Arc::new(output.table),
            }
        }
        Ok(Err(message)) => TaskState::Failure { message },
        Err(err) if err.is_panic() => TaskState::Failure {
            message: format!("pca routine panicked: {}", panic_message(err.into_panic())),
        },
        Err(err) => TaskState::Failure {
            message: format!("pca routine aborted: {err}"),
        },
    };

    match &next {
        TaskState::Failure { message } => {
            tracing::warn!(task_id = %id, error = message.as_str(), "task failed");
        }
        _ => tracing::info!(task_id = %id, "task succeeded"),
    }

    let mut tasks = tasks.lock().await;
    advance(id, &state, next);
    if let Some(entry) = tasks.get_mut(&id) {
        entry.finished_at = Some(Instant::now());
    }
}

fn advance(id: Uuid, state: &watch::Sender<TaskState>, next: TaskState) -> bool {
    state.send_if_modified(|current| {
        if current.can_advance_to(&next) {
            *current = next;
            true
        } else {
            tracing::warn!(
                task_id = %id,
                from = current.label(),
                to = next.label(),
                "ignored task state transition"
            );
            false
        }
    })
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
