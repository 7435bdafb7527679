//! Minimum-interval admission scheduler for outbound work.
//!
//! Admits at most one call at a time, each no sooner than the configured
//! interval after the previous admission. Admission spacing is measured
//! from admission to admission, not from completion, so slow work does not
//! stretch the schedule beyond the configured rate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

/// Serializes scheduled work and paces admissions.
///
/// Built from a messages-per-second rate; rate 0 means unlimited (work
/// runs immediately, unserialized). Cloning shares the admission slot, so
/// a limiter rebuilt from unchanged configuration keeps pacing correctly
/// while any in-flight call finishes under the instance that admitted it.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Option<Duration>,
    slot: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Build a limiter for the given rate (messages/second, 0 = unlimited).
    pub fn from_rate(messages_per_second: u32) -> Self {
        let min_interval = if messages_per_second > 0 {
            Some(Duration::from_secs_f64(1.0 / messages_per_second as f64))
        } else {
            None
        };
        Self {
            min_interval,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether this limiter actually paces admissions.
    pub fn is_limited(&self) -> bool {
        self.min_interval.is_some()
    }

    /// Run `fut` under the limiter.
    ///
    /// Holds the admission slot for the duration of the call, so at most
    /// one scheduled future executes at a time. Errors from the future
    /// propagate unchanged to the caller.
    pub async fn schedule<F, T, E>(&self, fut: F) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        let Some(interval) = self.min_interval else {
            return fut.await;
        };

        let mut last_admitted = self.slot.lock().await;
        if let Some(previous) = *last_admitted {
            let since = previous.elapsed();
            if since < interval {
                let wait = interval - since;
                debug!("rate limit: waiting {:?} for next admission slot", wait);
                tokio::time::sleep(wait).await;
            }
        }
        *last_admitted = Some(Instant::now());

        // Slot stays held until the call finishes: max one concurrent
        fut.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[tokio::test]
    async fn test_unlimited_runs_immediately() {
        let limiter = RateLimiter::from_rate(0);
        assert!(!limiter.is_limited());

        let start = Instant::now();
        for _ in 0..5 {
            limiter
                .schedule(async { Ok::<_, Infallible>(()) })
                .await
                .unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_admissions_respect_min_interval() {
        // 20/s => 50ms between admissions
        let limiter = RateLimiter::from_rate(20);
        assert!(limiter.is_limited());

        let mut admissions = Vec::new();
        for _ in 0..3 {
            limiter
                .schedule(async {
                    Ok::<_, Infallible>(Instant::now())
                })
                .await
                .map(|at| admissions.push(at))
                .unwrap();
        }

        for pair in admissions.windows(2) {
            let delta = pair[1] - pair[0];
            // tokio::time::sleep guarantees at-least semantics; allow a
            // millisecond of Instant sampling slack
            assert!(
                delta >= Duration::from_millis(49),
                "admissions too close: {:?}",
                delta
            );
        }
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let limiter = RateLimiter::from_rate(100);
        let result = limiter
            .schedule(async { Err::<(), _>("handler exploded") })
            .await;
        assert_eq!(result, Err("handler exploded"));

        // The slot must be usable after a failure
        let ok = limiter.schedule(async { Ok::<_, &str>(42) }).await;
        assert_eq!(ok, Ok(42));
    }

    #[tokio::test]
    async fn test_rebuilt_limiter_does_not_affect_in_flight_work() {
        let limiter = RateLimiter::from_rate(10);
        let handle = {
            let limiter = limiter.clone();
            tokio::spawn(async move {
                limiter
                    .schedule(async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, Infallible>("done")
                    })
                    .await
            })
        };

        // Simulates a config change: a new limiter replaces the old one
        let replacement = RateLimiter::from_rate(50);
        let fast = replacement
            .schedule(async { Ok::<_, Infallible>("new") })
            .await
            .unwrap();
        assert_eq!(fast, "new");

        let old = handle.await.unwrap().unwrap();
        assert_eq!(old, "done");
    }
}
