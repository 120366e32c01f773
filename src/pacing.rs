//! Paced task queue for rate-limited oracle calls.
//!
//! At most `max_concurrency` tasks run at once, and consecutive task starts
//! are spaced at least `min_interval` apart. Tasks start in the order they
//! acquire a permit.

use std::future::Future;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::debug;

pub struct PacedQueue {
    permits: Semaphore,
    min_interval: Duration,
    next_start: Mutex<Option<Instant>>,
}

impl PacedQueue {
    pub fn new(max_concurrency: usize, min_interval: Duration) -> Self {
        Self {
            permits: Semaphore::new(max_concurrency.max(1)),
            min_interval,
            next_start: Mutex::new(None),
        }
    }

    /// Run `task` once a slot is free and the start interval has elapsed.
    pub async fn run<F, T>(&self, label: &str, task: F) -> T
    where
        F: Future<Output = T>,
    {
        // The semaphore is never closed, so acquisition cannot fail.
        let _permit = self.permits.acquire().await.ok();
        self.wait_turn(label).await;
        task.await
    }

    async fn wait_turn(&self, label: &str) {
        let mut next = self.next_start.lock().await;
        if let Some(at) = *next {
            if at > Instant::now() {
                debug!(task = label, wait_ms = (at - Instant::now()).as_millis() as u64, "pacing");
                tokio::time::sleep_until(at).await;
            }
        }
        *next = Some(Instant::now() + self.min_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_starts_are_spaced() {
        let queue = Arc::new(PacedQueue::new(1, Duration::from_millis(1000)));
        let origin = Instant::now();

        let mut handles = Vec::new();
        for i in 0..3 {
            let q = queue.clone();
            handles.push(tokio::spawn(async move {
                q.run("test", async move { (i, Instant::now()) }).await
            }));
        }

        let mut starts = Vec::new();
        for h in handles {
            starts.push(h.await.unwrap().1);
        }
        starts.sort();

        assert_eq!(starts[0], origin);
        assert!(starts[1] - starts[0] >= Duration::from_millis(1000));
        assert!(starts[2] - starts[1] >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_task_is_immediate() {
        let queue = PacedQueue::new(1, Duration::from_secs(60));
        let before = Instant::now();
        queue.run("only", async {}).await;
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bound() {
        let queue = Arc::new(PacedQueue::new(2, Duration::ZERO));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let q = queue.clone();
            let running = running.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                q.run("slow", async {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }
}
