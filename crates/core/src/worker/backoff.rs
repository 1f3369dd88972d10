//! Retry scheduling.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::WorkError;

/// Exponent cap, keeps the delay finite for large attempt counts.
const MAX_EXPONENT: u32 = 16;

/// What to do with a failed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run again at `next_run_at`; `attempt` is the new attempt count.
    Retry {
        attempt: u32,
        next_run_at: DateTime<Utc>,
        delay: Duration,
    },
    /// Give up with this message.
    Fail { message: String },
}

/// `2^attempt` seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(MAX_EXPONENT))
}

/// Decide between retry and failure. `attempt_count` is the number of attempts
/// already recorded on the row; `max_attempts` of 0 means "use the default".
pub fn decide(
    error: &WorkError,
    attempt_count: u32,
    max_attempts: u32,
    default_max: u32,
    now: DateTime<Utc>,
) -> RetryDecision {
    if error.is_permanent() {
        return RetryDecision::Fail {
            message: error.message.clone(),
        };
    }

    let max = if max_attempts == 0 {
        default_max
    } else {
        max_attempts
    };
    let attempt = attempt_count.saturating_add(1);
    if attempt >= max {
        return RetryDecision::Fail {
            message: format!("max attempts ({}) exceeded: {}", max, error.message),
        };
    }

    let delay = backoff_delay(attempt);
    let next_run_at = now
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(1));
    RetryDecision::Retry {
        attempt,
        next_run_at,
        delay,
    }
}
