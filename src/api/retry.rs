use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use tokio::time::{sleep, Duration};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 2000; // Start with 2 seconds
const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

/// Bounded exponential backoff with jitter
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Extra random delay as a fraction of the computed backoff (0.0 disables)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, never waits
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Delay before retrying after failed attempt number `attempt` (1-based), without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Worst-case wall time of `run` when every attempt takes up to `per_attempt`
    pub fn budget(&self, per_attempt: Duration) -> Duration {
        let max_attempts = self.max_attempts.max(1);
        let waits: Duration = (1..max_attempts)
            .map(|attempt| self.backoff(attempt).mul_f64(1.0 + self.jitter.max(0.0)))
            .sum();
        per_attempt.saturating_mul(max_attempts) + waits
    }

    fn backoff_with_jitter(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0.0..=self.jitter);
        base + base.mul_f64(extra)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or attempts run out
    pub async fn run<T, E, F, Fut>(
        &self,
        what: &str,
        is_retryable: impl Fn(&E) -> bool,
        mut op: F,
    ) -> std::result::Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!("✓ {} succeeded after {} attempts", what, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if attempt < max_attempts && is_retryable(&e) => {
                    let delay = self.backoff_with_jitter(attempt);
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}. Retrying in {:?}...",
                        attempt,
                        max_attempts,
                        what,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
            jitter: 0.0,
        };

        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(5));
        assert_eq!(policy.backoff(40), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let d = policy.backoff_with_jitter(1);
            assert!(d >= Duration::from_millis(2000));
            assert!(d <= Duration::from_millis(2500));
        }
    }

    #[test]
    fn test_budget_covers_every_attempt_and_wait() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            jitter: 0.25,
        };

        // 3 attempts of 2s, then waits of 2s and 4s stretched by jitter
        assert_eq!(
            policy.budget(Duration::from_secs(2)),
            Duration::from_millis(6_000 + 2_500 + 5_000)
        );
        assert_eq!(
            RetryPolicy::none().budget(Duration::from_secs(7)),
            Duration::from_secs(7)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default().with_max_attempts(3);

        let result: std::result::Result<u32, String> = policy
            .run("fetch", |_: &String| true, move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(format!("boom {}", n))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default().with_max_attempts(2);

        let result: std::result::Result<(), String> = policy
            .run("fetch", |_: &String| true, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("still down".to_string())
            })
            .await;

        assert_eq!(result, Err("still down".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default().with_max_attempts(5);

        let result: std::result::Result<(), String> = policy
            .run("order", |e: &String| e != "fatal", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("fatal".to_string())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
