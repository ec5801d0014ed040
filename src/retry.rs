use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Exponential backoff schedule for operations that are expected to fail
/// while a node settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Slow schedule for reaching a node that may still be starting up.
    pub const fn connect() -> Self {
        Self {
            base: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(30),
            max_attempts: None,
        }
    }

    /// Fast schedule for channel opens racing peer confirmation.
    pub const fn open_channel() -> Self {
        Self {
            base: Duration::from_millis(100),
            multiplier: 2,
            max_delay: Duration::from_secs(2),
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }

    /// Delay before the retry that follows failed attempt number `attempt`
    /// (zero based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt);
        self.base.saturating_mul(factor).min(self.max_delay)
    }

    fn has_attempts_left(&self, attempts_made: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts_made < max)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    pub async fn retry<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempts = 0u32;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            attempts = attempts.saturating_add(1);

            if !err.is_retryable() || !self.has_attempts_left(attempts) {
                return Err(err);
            }

            let delay = self.delay(attempts - 1);
            log::warn!("{label} failed (attempt {attempts}): {err}, retrying in {delay:?}");
            sleep(delay).await;
        }
    }
}

/// Fixed interval poll with an optional deadline and cancellation.
#[derive(Debug, Clone)]
pub struct Poll {
    interval: Duration,
    deadline: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl Default for Poll {
    fn default() -> Self {
        Self::every(Duration::from_secs(1))
    }
}

impl Poll {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
            cancel: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    /// Calls `check` until it reports `true`. Errors from `check` end the poll.
    pub async fn until<F, Fut>(&self, label: &str, mut check: F) -> Result<(), Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, Error>>,
    {
        let start = Instant::now();
        loop {
            if self.is_cancelled() {
                return Err(Error::Cancelled(label.to_string()));
            }

            if check().await? {
                return Ok(());
            }

            if let Some(deadline) = self.deadline {
                if start.elapsed() >= deadline {
                    return Err(Error::Timeout(label.to_string(), deadline));
                }
            }

            log::debug!("waiting for {label}");
            match &self.cancel {
                Some(token) => {
                    tokio::select! {
                        _ = token.cancelled() => return Err(Error::Cancelled(label.to_string())),
                        _ = sleep(self.interval) => {}
                    }
                }
                None => sleep(self.interval).await,
            }
        }
    }
}
