use core::time::Duration;
use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Classification used to guide retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Worth another attempt once the backoff delay elapses.
    Transient,
    /// Re-raised immediately; more attempts cannot help.
    Fatal,
    /// Re-raised immediately, uncounted and undelayed.
    Cancelled,
}

/// Maps a caller error type onto retry classes.
///
/// `cancelled()` lets the executor manufacture the caller's cancellation
/// error when the token fires during a backoff wait.
pub trait Classify {
    fn retry_class(&self) -> RetryClass;

    fn cancelled() -> Self;
}

/// Backoff policy governing inter-attempt delays.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            max_jitter: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-indexed), without jitter.
    ///
    /// The first retry uses exponent 0, so it waits exactly `base_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let scaled =
            self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent as i32);
        let capped = scaled.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Runs `op` up to `max_attempts` times (clamped to at least one).
///
/// Success returns immediately. `Fatal`-class errors are re-raised without
/// another attempt. `Cancelled`-class errors always win: they are re-raised
/// undelayed, and a token fired during a backoff wait resolves the wait
/// immediately with `E::cancelled()` rather than completing the delay.
/// When attempts are exhausted the last error is returned.
pub async fn retry_with_backoff<T, E, F, Fut>(
    max_attempts: u32,
    policy: RetryPolicy,
    token: &CancellationToken,
    mut op: F,
) -> Result<T, E>
where
    E: Classify,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut jitter = JitterRng::from_entropy();
    let mut attempt = 0u32;

    loop {
        if token.is_cancelled() {
            return Err(E::cancelled());
        }
        attempt += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        match err.retry_class() {
            RetryClass::Fatal | RetryClass::Cancelled => return Err(err),
            RetryClass::Transient => {
                if attempt >= max_attempts {
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt) + jitter.sample(policy.max_jitter);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, retrying after backoff"
                );
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(E::cancelled()),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

/// xorshift64* generator for jitter. Not cryptographic, does not need to be.
struct JitterRng(u64);

impl JitterRng {
    fn from_entropy() -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        Self(seed ^ 0x9e3779b97f4a7c15)
    }

    fn next_unit(&mut self) -> f64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        let y = x.wrapping_mul(0x2545F4914F6CDD1D);
        // scale to [0,1)
        (y >> 11) as f64 / ((u64::MAX >> 11) as f64)
    }

    fn sample(&mut self, max: Duration) -> Duration {
        if max.is_zero() {
            return Duration::ZERO;
        }
        Duration::from_millis((max.as_millis() as f64 * self.next_unit()) as u64)
    }
}
