//! Per-tier request scheduling.
//!
//! Slack enforces a requests-per-minute budget per method tier. Each tier gets
//! its own limiter; callers queue on it and are admitted one at a time, in
//! arrival order, with a minimum gap between dispatches.

use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use super::types::ExportError;

/// Single-slot admission queue for one endpoint tier
pub struct RateLimiter {
    min_interval: Duration,
    // The tokio mutex queues waiters fairly, which gives FIFO admission.
    last_dispatch: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Budget minus a 20% safety margin (rounded up), e.g. 20 rpm -> 16 rpm.
    pub fn safe_rate(requests_per_minute: u32) -> u32 {
        let margin = (u64::from(requests_per_minute) * 2).div_ceil(10);
        (u64::from(requests_per_minute) - margin) as u32
    }

    pub fn per_minute(requests_per_minute: u32) -> Result<Self, ExportError> {
        let safe = Self::safe_rate(requests_per_minute);
        if safe == 0 {
            return Err(ExportError::Config(format!(
                "rate budget of {} requests per minute leaves no safe rate",
                requests_per_minute
            )));
        }

        Ok(Self::with_interval(Duration::from_secs_f64(60.0 / f64::from(safe))))
    }

    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_dispatch: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Run `task` once this tier admits it and return its output.
    ///
    /// The slot stays held until the task resolves, so at most one task per
    /// limiter is in flight. Errors from the task are returned unchanged.
    pub async fn schedule<F, Fut, T>(&self, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut last_dispatch = self.last_dispatch.lock().await;

        if let Some(previous) = *last_dispatch {
            sleep_until(previous + self.min_interval).await;
        }
        *last_dispatch = Some(Instant::now());

        task().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_safe_rate_subtracts_margin() {
        assert_eq!(RateLimiter::safe_rate(20), 16);
        assert_eq!(RateLimiter::safe_rate(50), 40);
        assert_eq!(RateLimiter::safe_rate(3), 2);
        assert_eq!(RateLimiter::safe_rate(1), 0);
        assert_eq!(RateLimiter::safe_rate(0), 0);
    }

    #[test]
    fn test_per_minute_interval() {
        let limiter = RateLimiter::per_minute(20).unwrap();
        assert_eq!(limiter.min_interval(), Duration::from_millis(3750));

        let limiter = RateLimiter::per_minute(50).unwrap();
        assert_eq!(limiter.min_interval(), Duration::from_millis(1500));
    }

    #[test]
    fn test_per_minute_rejects_zero_safe_rate() {
        assert!(matches!(RateLimiter::per_minute(1), Err(ExportError::Config(_))));
        assert!(matches!(RateLimiter::per_minute(0), Err(ExportError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatches_are_spaced() {
        let limiter = RateLimiter::per_minute(20).unwrap();
        let interval = limiter.min_interval();
        let start = Instant::now();
        let mut dispatched = Vec::new();

        for _ in 0..4 {
            let at = limiter.schedule(|| async { Instant::now() }).await;
            dispatched.push(at);
        }

        assert!(dispatched[0] - start < interval);
        for pair in dispatched.windows(2) {
            assert!(pair[1] - pair[0] >= interval);
        }
        assert!(start.elapsed() >= interval * 3);
    }

    struct Tracker {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        order: std::sync::Mutex<Vec<usize>>,
    }

    async fn tracked_task(limiter: &RateLimiter, tracker: &Tracker, id: usize) {
        limiter
            .schedule(|| async move {
                let now = tracker.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                tracker.max_in_flight.fetch_max(now, Ordering::SeqCst);
                tracker.order.lock().unwrap().push(id);
                tokio::time::sleep(Duration::from_secs(1)).await;
                tracker.in_flight.fetch_sub(1, Ordering::SeqCst);
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_tasks_run_one_at_a_time_in_order() {
        let limiter = RateLimiter::with_interval(Duration::from_millis(100));
        let tracker = Tracker {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            order: std::sync::Mutex::new(Vec::new()),
        };

        tokio::join!(
            tracked_task(&limiter, &tracker, 0),
            tracked_task(&limiter, &tracker, 1),
            tracked_task(&limiter, &tracker, 2),
            tracked_task(&limiter, &tracker, 3),
        );

        assert_eq!(tracker.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_limiter_bounds_spawned_branches() {
        let limiter = Arc::new(RateLimiter::with_interval(Duration::from_secs(2)));
        let start = Instant::now();
        let mut handles = Vec::new();

        for _ in 0..3 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.schedule(|| async { Instant::now() }).await
            }));
        }

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }
        times.sort();

        assert!(times[1] - times[0] >= Duration::from_secs(2));
        assert!(times[2] - times[1] >= Duration::from_secs(2));
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_error_propagates_and_limiter_recovers() {
        let limiter = RateLimiter::with_interval(Duration::from_millis(10));

        let result: Result<(), String> = limiter.schedule(|| async { Err("boom".to_string()) }).await;
        assert_eq!(result, Err("boom".to_string()));

        let result: Result<u32, String> = limiter.schedule(|| async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }
}
