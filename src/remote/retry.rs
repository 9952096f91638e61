//! Exponential backoff with jitter for remote calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use super::RemoteError;
use crate::config::RetryPolicy;

/// Delay before retry number `attempt` (zero-based).
///
/// `min(max_delay, base_delay * 2^attempt)` scaled by `1 ± jitter_factor`;
/// `random` in `[0, 1)` picks the point in that range.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32, random: f64) -> Duration {
    let base_ms = policy.base_delay.as_millis() as u64;
    let max_ms = policy.max_delay.as_millis() as u64;
    let capped = base_ms.saturating_mul(1u64 << attempt.min(31)).min(max_ms);

    let jitter = 1.0 + (random * 2.0 - 1.0) * policy.jitter_factor;
    let millis = (capped as f64 * jitter).round().max(0.0) as u64;
    Duration::from_millis(millis)
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's retries are used up. The last error is returned.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = backoff_delay(policy, attempt, rand::thread_rng().gen());
                tracing::warn!(
                    operation = what,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Remote call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
