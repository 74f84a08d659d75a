//! Meilisearch task views and the task poll loop.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::backends::Target;
use crate::core::{RequestContext, TaskWaiter};
use crate::error::{ClientResult, ErrorKind, TaskError};
use crate::transport::{HttpResponse, Method};

use super::client::Inner;
use super::errors::code_kind;

/// The `202 Accepted` body of every enqueued write.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TaskInfo {
    pub task_uid: u64,
    #[serde(default)]
    pub index_uid: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

impl TaskInfo {
    pub fn from_response(response: &HttpResponse) -> ClientResult<Self> {
        response.json()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TaskStatus {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TaskFailure {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// `GET /tasks/{uid}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TaskView {
    pub uid: u64,
    pub status: TaskStatus,
    #[serde(rename = "type", default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub error: Option<TaskFailure>,
}

/// `GET /tasks?...`, paginated with `next`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TaskList {
    #[serde(default)]
    pub results: Vec<TaskView>,
    #[serde(default)]
    pub next: Option<u64>,
}

impl TaskView {
    /// Maps a terminal state to the caller-facing outcome; `None` while running.
    pub fn outcome(&self) -> Option<ClientResult<()>> {
        match self.status {
            TaskStatus::Succeeded => Some(Ok(())),
            TaskStatus::Failed => {
                let (code, message) = match &self.error {
                    Some(error) => (error.code.clone(), error.message.clone()),
                    None => (None, "task failed without an error payload".to_string()),
                };
                let kind = code.as_deref().map(code_kind).unwrap_or(ErrorKind::Other);
                Some(Err(TaskError::Failed {
                    task_uid: self.uid,
                    code,
                    kind,
                    message,
                }
                .into()))
            }
            TaskStatus::Canceled => Some(Err(TaskError::Canceled { task_uid: self.uid }.into())),
            TaskStatus::Enqueued | TaskStatus::Processing | TaskStatus::Unknown => None,
        }
    }
}

#[async_trait]
impl TaskWaiter for Inner {
    async fn wait_for_task(&self, ctx: &RequestContext, task_uid: u64) -> ClientResult<()> {
        let started = Instant::now();
        let uid = task_uid.to_string();
        let mut polls: u32 = 0;
        loop {
            ctx.check()?;
            polls += 1;

            let response = self
                .execute_ok(ctx, Method::Get, &["tasks", &uid], &[], None, Target::none())
                .await?;
            let task: TaskView = response.json()?;
            if let Some(outcome) = task.outcome() {
                match &outcome {
                    Ok(()) => debug!(
                        task_uid = task_uid,
                        task_type = ?task.task_type,
                        polls = polls,
                        "Task succeeded"
                    ),
                    Err(err) => warn!(
                        task_uid = task_uid,
                        task_type = ?task.task_type,
                        error = %err,
                        "Task did not succeed"
                    ),
                }
                return outcome;
            }

            if let Some(timeout) = self.config.task_timeout {
                if started.elapsed() >= timeout {
                    return Err(TaskError::TimedOut {
                        task_uid,
                        timeout_ms: timeout.as_millis() as u64,
                    }
                    .into());
                }
            }
            ctx.sleep(self.config.poll_interval).await?;
        }
    }
}
