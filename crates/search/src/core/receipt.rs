//! Completion handles for mutating calls.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ClientResult;

use super::RequestContext;

/// Something that can block until an engine task has finished.
#[async_trait]
pub trait TaskWaiter: Send + Sync {
    /// Waits for `task_uid` to reach a terminal state.
    ///
    /// Returns `Ok(())` on success and an error for a failed or canceled task.
    async fn wait_for_task(&self, ctx: &RequestContext, task_uid: u64) -> ClientResult<()>;
}

/// Returned by every mutating call.
///
/// Elasticsearch writes are applied by the time the call returns, so their
/// receipts are complete. Meilisearch enqueues writes as tasks; the receipt
/// carries the task uid and `wait` polls it.
#[derive(Clone)]
pub struct WriteReceipt {
    state: ReceiptState,
}

#[derive(Clone)]
enum ReceiptState {
    Completed,
    Task {
        uid: u64,
        waiter: Arc<dyn TaskWaiter>,
    },
}

impl WriteReceipt {
    /// A receipt for a write that has already been applied.
    pub fn completed() -> Self {
        Self {
            state: ReceiptState::Completed,
        }
    }

    /// A receipt for an enqueued engine task.
    pub fn task(uid: u64, waiter: Arc<dyn TaskWaiter>) -> Self {
        Self {
            state: ReceiptState::Task { uid, waiter },
        }
    }

    /// The engine task uid, for task-based engines.
    pub fn task_uid(&self) -> Option<u64> {
        match &self.state {
            ReceiptState::Completed => None,
            ReceiptState::Task { uid, .. } => Some(*uid),
        }
    }

    /// True when no waiting is needed.
    pub fn is_completed(&self) -> bool {
        matches!(self.state, ReceiptState::Completed)
    }

    /// Blocks until the write has been applied.
    pub async fn wait(&self, ctx: &RequestContext) -> ClientResult<()> {
        match &self.state {
            ReceiptState::Completed => ctx.check(),
            ReceiptState::Task { uid, waiter } => waiter.wait_for_task(ctx, *uid).await,
        }
    }
}

impl fmt::Debug for WriteReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            ReceiptState::Completed => f.write_str("WriteReceipt::Completed"),
            ReceiptState::Task { uid, .. } => {
                f.debug_struct("WriteReceipt::Task").field("uid", uid).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, ErrorKind, TaskError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingWaiter {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TaskWaiter for CountingWaiter {
        async fn wait_for_task(&self, _ctx: &RequestContext, task_uid: u64) -> ClientResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(TaskError::Failed {
                    task_uid,
                    code: None,
                    kind: ErrorKind::Other,
                    message: "boom".to_string(),
                }
                .into())
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_completed_receipt() {
        let receipt = WriteReceipt::completed();
        assert!(receipt.is_completed());
        assert_eq!(receipt.task_uid(), None);
        receipt.wait(&RequestContext::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_task_receipt_delegates_to_waiter() {
        let waiter = Arc::new(CountingWaiter {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let receipt = WriteReceipt::task(12, waiter.clone());
        assert_eq!(receipt.task_uid(), Some(12));
        receipt.wait(&RequestContext::new()).await.unwrap();
        receipt.wait(&RequestContext::new()).await.unwrap();
        assert_eq!(waiter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_task_receipt_surfaces_failure() {
        let waiter = Arc::new(CountingWaiter {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let receipt = WriteReceipt::task(3, waiter);
        let err = receipt.wait(&RequestContext::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::Task(TaskError::Failed { task_uid: 3, .. })));
    }
}
