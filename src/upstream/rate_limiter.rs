//! Token-bucket rate limiter + concurrency cap for the upstream client.
//!
//! No `governor`/token-bucket crate sits in the teacher's own dependency
//! graph, so this is hand-rolled in the teacher's cooperative-suspension
//! style (`tokio::time::sleep` + `tokio::select!`, see
//! `bpmn_integration::pending_dispatch_worker`), rather than pulling in a
//! dependency the rest of the crate has no other use for.

use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::{Duration, Instant};

struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(rps: u32, burst: u32) -> Self {
        Self {
            tokens: burst as f64,
            capacity: burst as f64,
            refill_per_sec: rps.max(1) as f64,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Seconds to wait before at least one token is available.
    fn wait_secs(&self) -> f64 {
        if self.tokens >= 1.0 {
            0.0
        } else {
            (1.0 - self.tokens) / self.refill_per_sec
        }
    }
}

/// Global rate + concurrency gate shared by every `UpstreamClient` clone.
///
/// Callers block cooperatively (never the executor thread) until a token
/// is free, per spec.md §4.3 ("Rate control").
#[derive(Clone)]
pub struct RateLimiter {
    bucket: Arc<Mutex<Bucket>>,
    inflight: Arc<Semaphore>,
}

impl RateLimiter {
    pub fn new(rps: u32, burst: u32, concurrency: usize) -> Self {
        Self {
            bucket: Arc::new(Mutex::new(Bucket::new(rps, burst))),
            inflight: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Acquire one token and one concurrency slot. Resolves once both are
    /// available; holds the semaphore permit for the caller to drop after
    /// the request completes.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                bucket.refill();
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    0.0
                } else {
                    bucket.wait_secs()
                }
            };
            if wait <= 0.0 {
                break;
            }
            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
        }

        self.inflight
            .acquire()
            .await
            .expect("semaphore never closed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_capacity_is_immediately_available() {
        let limiter = RateLimiter::new(1, 3, 10);
        let start = Instant::now();
        for _ in 0..3 {
            let _permit = limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn exhausted_bucket_forces_a_wait() {
        let limiter = RateLimiter::new(10, 1, 10);
        let _first = limiter.acquire().await;
        let start = Instant::now();
        let _second = limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
