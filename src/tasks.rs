/// Bounded background task pool
///
/// Fire-and-forget work (per-wallet purchases, notification dispatch) runs
/// here instead of on bare `tokio::spawn`, so concurrency is capped and
/// tests can `drain()` to observe completion deterministically.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

pub struct TaskPool {
    semaphore: Arc<Semaphore>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskPool {
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Submit a task. It starts once a slot frees up; errors never propagate
    /// to the submitter.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let handle = tokio::spawn(async move {
            // Closed semaphores never happen - the pool owns it
            let _permit = semaphore.acquire_owned().await;
            future.await;
        });
        self.handles.lock().push(handle);
    }

    /// Await every submitted task. Used on shutdown and by tests.
    pub async fn drain(&self) {
        loop {
            let handles: Vec<_> = {
                let mut guard = self.handles.lock();
                guard.drain(..).collect()
            };
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                let _ = handle.await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn drain_observes_all_spawned_work() {
        let pool = TaskPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.spawn(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.drain().await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let pool = TaskPool::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            pool.spawn(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }

        pool.drain().await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
