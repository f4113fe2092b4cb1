use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::authz::errors::AuthzError;

/// Per-request cancellation and deadline, threaded through every store call.
#[derive(Debug, Clone, Default)]
pub struct RequestCtx {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Make this context abort when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drive `fut` to completion unless the context is cancelled or its
    /// deadline passes first. The losing future is dropped, which aborts any
    /// in-flight store call.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, AuthzError>
    where
        F: Future<Output = Result<T, AuthzError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(AuthzError::Cancelled);
        }

        let guarded = async {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(AuthzError::Cancelled),
                res = fut => res,
            }
        };

        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, guarded)
                .await
                .map_err(|_| AuthzError::DeadlineExceeded)?,
            None => guarded.await,
        }
    }
}
