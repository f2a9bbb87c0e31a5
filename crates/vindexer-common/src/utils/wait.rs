//! Bounded polling for conditions that become true on-chain eventually,
//! such as a submitted message showing up in the account's history.

use {
    std::{future::Future, time::Duration},
    tokio::time::{sleep, timeout, Instant},
    tracing::debug,
};

use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Wall-clock budget across all attempts
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: u32, timeout: Duration) -> Self {
        Self {
            interval,
            max_attempts,
            timeout,
        }
    }
}

impl Default for RetryPolicy {
    /// 20 checks three seconds apart.
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 20,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    Confirmed { value: T, attempts: u32 },
    TimedOut { attempts: u32 },
}

impl<T> WaitOutcome<T> {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, WaitOutcome::Confirmed { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            WaitOutcome::Confirmed { attempts, .. } | WaitOutcome::TimedOut { attempts } => *attempts,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            WaitOutcome::Confirmed { value, .. } => Some(value),
            WaitOutcome::TimedOut { .. } => None,
        }
    }
}

/// Runs `check` until it yields `Some`, the attempt budget is spent, or the
/// timeout elapses. Check errors count as "not yet".
pub async fn wait_for<T, F, Fut>(policy: &RetryPolicy, mut check: F) -> WaitOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + policy.timeout;
    let mut attempts = 0;

    while attempts < policy.max_attempts {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        attempts += 1;
        match timeout(remaining, check(attempts)).await {
            Ok(Ok(Some(value))) => return WaitOutcome::Confirmed { value, attempts },
            Ok(Ok(None)) => {}
            Ok(Err(e)) => debug!("Check attempt {} failed: {}", attempts, e),
            Err(_) => break,
        }

        if attempts == policy.max_attempts {
            break;
        }
        if Instant::now() + policy.interval >= deadline {
            break;
        }
        sleep(policy.interval).await;
    }

    WaitOutcome::TimedOut { attempts }
}
