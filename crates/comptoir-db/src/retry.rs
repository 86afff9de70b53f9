//! # Transient Conflict Retry
//!
//! Replays a whole unit of work when SQLite reports lock contention.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  attempt 1 ──► BEGIN … COMMIT ──► Ok ──────────────────────────► done   │
//! │                     │                                                   │
//! │                     └─► Err(Busy | Conflict)                            │
//! │                              │  (transaction dropped = rolled back)     │
//! │                              ▼                                          │
//! │                         sleep(backoff) ──► attempt 2 ──► …              │
//! │                                                                         │
//! │  Validation / NotFound / Unique ──► returned immediately, never retried │
//! │  max_attempts reached           ──► last transient error returned       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::warn;

/// Errors that know whether replaying the operation may succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// How often and how patiently to replay a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Minimum 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Default::default()
        }
    }

    /// Single attempt, no replay.
    pub fn no_retry() -> Self {
        RetryPolicy::new(1, Duration::ZERO)
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            max_interval: self.max_delay.max(self.base_delay),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(500),
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or
/// `policy.max_attempts` is reached.
///
/// `op` must build a fresh unit of work on every call: each attempt opens
/// and commits its own transaction.
///
/// ## Example
/// ```rust,ignore
/// let code = retry_transient(&policy, "sequence.next", || async {
///     let mut tx = pool.begin().await?;
///     let code = generator.next_for(&mut tx, SequenceType::Customer).await?;
///     tx.commit().await?;
///     Ok::<_, DbError>(code)
/// })
/// .await?;
/// ```
pub async fn retry_transient<T, E, F, Fut>(policy: &RetryPolicy, op_name: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let mut backoff = policy.create_backoff();
    let mut attempt = 1u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = backoff.next_backoff().unwrap_or(policy.max_delay);
                warn!(
                    op = op_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient conflict, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_transient() {
                    warn!(op = op_name, attempts = attempt, error = %err, "Retries exhausted");
                }
                return Err(err);
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
