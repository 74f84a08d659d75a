//! Per-call cancellation and deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, ClientResult};

/// Carries cancellation and an optional deadline through one client call.
///
/// Clones share the same cancellation token, so cancelling any clone cancels
/// every call that was handed one.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context driven by an existing cancellation token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Sets the deadline to `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Sets an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// A child context: cancelled with its parent, or on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancels this context and its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The underlying cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fails if the context was cancelled or its deadline has passed.
    pub fn check(&self) -> ClientResult<()> {
        if self.token.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(self.deadline_exceeded());
            }
        }
        Ok(())
    }

    /// Sleeps for `duration`, waking early on cancellation or deadline.
    pub async fn sleep(&self, duration: Duration) -> ClientResult<()> {
        self.run(tokio::time::sleep(duration)).await
    }

    /// Drives `future` to completion unless the context ends first.
    pub async fn run<F: Future>(&self, future: F) -> ClientResult<F::Output> {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = self.token.cancelled() => Err(ClientError::Cancelled),
            _ = deadline => Err(self.deadline_exceeded()),
            output = future => Ok(output),
        }
    }

    fn deadline_exceeded(&self) -> ClientError {
        ClientError::Timeout {
            message: "request deadline exceeded".to_string(),
        }
    }
}
