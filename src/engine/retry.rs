use std::future::Future;
use std::time::Duration;

/// Attempt budget for a polling operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT: Self = Self {
        max_attempts: 10,
        delay: Duration::from_millis(500),
    };

    /// Dropdown triggers and file inputs render late.
    pub const SLOW: Self = Self {
        max_attempts: 15,
        delay: Duration::from_millis(800),
    };

    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn budget(&self) -> Duration {
        self.delay * self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Run `op` until it yields `Some`, sleeping `policy.delay` after every miss.
/// An exhausted run has slept the whole `max_attempts × delay` budget.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for _ in 0..policy.max_attempts {
        if let Some(found) = op().await {
            return Some(found);
        }
        tokio::time::sleep(policy.delay).await;
    }
    None
}
