use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::ClientError;

/// Cancellation and deadline carried by a single broker call.
///
/// Cloning a context shares its cancellation token, so cancelling any clone
/// (or the token handed out by [`RequestContext::cancellation_token`]) ends
/// every call running under it.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Sets the deadline, keeping an existing earlier one.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns the error this context has already ended with, if any.
    pub fn check(&self) -> Result<(), ClientError> {
        if self.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Err(ClientError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drives `fut` until it completes or the context ends, whichever comes
    /// first. `fut` is dropped on cancellation.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ClientError> {
        self.check()?;
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(ClientError::Cancelled),
                res = tokio::time::timeout_at(deadline, fut) => {
                    res.map_err(|_| ClientError::DeadlineExceeded)
                }
            },
            None => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(ClientError::Cancelled),
                out = fut => Ok(out),
            },
        }
    }
}
