use std::{sync::Arc, time::Duration};

use tokio::{sync::{Mutex, Semaphore}, time::Instant};

/// Spec §6.2/§5's `{maxConcurrentRequests, maxBatchSize, requestDelayMs}`.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_concurrent_requests: usize,
    pub max_batch_size: usize,
    pub request_delay: Duration,
    pub response_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 16,
            max_batch_size: 100,
            request_delay: Duration::from_millis(0),
            response_timeout: Duration::from_secs(30),
        }
    }
}

/// Enforces `maxConcurrentRequests` via a semaphore and `requestDelayMs`
/// as a floor on the spacing between request *starts*, shared across
/// every caller. Grounded on the teacher's reader task pacing itself
/// with `tokio::time::sleep` between poll iterations
/// (`other_examples/…btcio-src-reader-query.rs`'s `poll_dur`), applied
/// here per-request instead of per-poll-loop.
#[derive(Debug)]
pub struct RateLimiter {
    permits: Semaphore,
    last_request_started: Mutex<Option<Instant>>,
    request_delay: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            permits: Semaphore::new(config.max_concurrent_requests),
            last_request_started: Mutex::new(None),
            request_delay: config.request_delay,
        }
    }

    /// Waits for a free concurrency slot and for `requestDelayMs` to
    /// have elapsed since the last request started. Holds the
    /// returned guard for the duration of the RPC call.
    pub async fn acquire(&self) -> tokio::sync::SemaphorePermit<'_> {
        let permit = self.permits.acquire().await.expect("semaphore never closed");

        if !self.request_delay.is_zero() {
            let mut last = self.last_request_started.lock().await;
            if let Some(previous) = *last {
                let elapsed = previous.elapsed();
                if elapsed < self.request_delay {
                    tokio::time::sleep(self.request_delay - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        permit
    }
}

pub fn chunk_heights(heights: &[u64], max_batch_size: usize) -> impl Iterator<Item = &[u64]> {
    heights.chunks(max_batch_size.max(1))
}

pub type SharedRateLimiter = Arc<RateLimiter>;
