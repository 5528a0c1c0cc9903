use crate::error::ApiError;
use futures::future::{BoxFuture, FutureExt};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneConfig {
    pub max_concurrent: usize,
    /// Pause after a task completes before its slot is handed to the next one
    pub inter_dispatch_delay: Duration,
}

impl LaneConfig {
    pub fn new(max_concurrent: usize, inter_dispatch_delay: Duration) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            inter_dispatch_delay,
        }
    }

    /// Cheap, frequent reads
    pub fn light() -> Self {
        Self::new(6, Duration::ZERO)
    }

    /// Search and recommendation calls
    pub fn heavy() -> Self {
        Self::new(2, Duration::from_millis(400))
    }
}

#[derive(Default)]
struct LaneState {
    running: usize,
    pending: VecDeque<BoxFuture<'static, ()>>,
}

struct LaneInner {
    name: &'static str,
    config: LaneConfig,
    state: Mutex<LaneState>,
}

impl LaneInner {
    fn lock(&self) -> MutexGuard<'_, LaneState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start queued tasks while the lane has free slots
    fn pump(lane: &Arc<LaneInner>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(lane = lane.name, "no runtime available, queued tasks left pending");
            return;
        };

        let mut ready = Vec::new();
        {
            let mut state = lane.lock();
            while state.running < lane.config.max_concurrent {
                let Some(job) = state.pending.pop_front() else {
                    break;
                };
                state.running += 1;
                trace!(lane = lane.name, running = state.running, queued = state.pending.len(), "dispatching task");
                ready.push(job);
            }
        }

        // Spawn outside the lock: a rejected spawn drops its slot immediately
        let delay = lane.config.inter_dispatch_delay;
        for job in ready {
            let slot = Slot { lane: Arc::clone(lane) };
            runtime.spawn(async move {
                job.await;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                drop(slot);
            });
        }
    }
}

/// A claimed running slot; releasing it lets the next queued task start
struct Slot {
    lane: Arc<LaneInner>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        {
            let mut state = self.lane.lock();
            state.running = state.running.saturating_sub(1);
        }
        LaneInner::pump(&self.lane);
    }
}

/// A concurrency-limited FIFO lane.
///
/// At most `max_concurrent` tasks run at once. Tasks are never cancelled:
/// dropping the future returned by `enqueue` leaves the task queued or running.
#[derive(Clone)]
pub struct ConcurrencyQueue {
    inner: Arc<LaneInner>,
}

impl ConcurrencyQueue {
    pub fn new(name: &'static str, config: LaneConfig) -> Self {
        Self {
            inner: Arc::new(LaneInner {
                name,
                config,
                state: Mutex::new(LaneState::default()),
            }),
        }
    }

    pub async fn enqueue<T, F, Fut>(&self, task: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job = async move {
            let result = task().await;
            // The caller may have gone away; the task still ran to completion
            let _ = tx.send(result);
        }
        .boxed();

        self.inner.lock().pending.push_back(job);
        LaneInner::pump(&self.inner);

        rx.await
            .map_err(|_| ApiError::Internal(format!("{} lane task aborted", self.inner.name)))?
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn config(&self) -> LaneConfig {
        self.inner.config
    }

    /// Tasks holding a slot, including ones in their post-completion delay
    pub fn running(&self) -> usize {
        self.inner.lock().running
    }

    pub fn queued(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneKind {
    Light,
    Heavy,
}

/// The two independent lanes used by the API layer
#[derive(Clone)]
pub struct Lanes {
    pub light: ConcurrencyQueue,
    pub heavy: ConcurrencyQueue,
}

impl Lanes {
    pub fn new(light: LaneConfig, heavy: LaneConfig) -> Self {
        Self {
            light: ConcurrencyQueue::new("light", light),
            heavy: ConcurrencyQueue::new("heavy", heavy),
        }
    }

    pub fn lane(&self, kind: LaneKind) -> &ConcurrencyQueue {
        match kind {
            LaneKind::Light => &self.light,
            LaneKind::Heavy => &self.heavy,
        }
    }
}

impl Default for Lanes {
    fn default() -> Self {
        Self::new(LaneConfig::light(), LaneConfig::heavy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_running_never_exceeds_max_concurrent() {
        let lane = ConcurrencyQueue::new("test", LaneConfig::new(2, Duration::from_millis(5)));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let peak_slots = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..10 {
            let lane_handle = lane.clone();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let peak_slots = Arc::clone(&peak_slots);
            handles.push(tokio::spawn(async move {
                let observer = lane_handle.clone();
                lane_handle
                    .enqueue(move || async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        peak_slots.fetch_max(observer.running(), Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(i)
                    })
                    .await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }
        results.sort();

        assert_eq!(results, (0..10).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak_slots.load(Ordering::SeqCst) <= 2);
        assert_eq!(lane.queued(), 0);
    }

    #[tokio::test]
    async fn test_fifo_dispatch_order() {
        let lane = ConcurrencyQueue::new("fifo", LaneConfig::new(1, Duration::ZERO));
        let order = Arc::new(Mutex::new(Vec::new()));

        let tasks = (0..5).map(|i| {
            let order = Arc::clone(&order);
            lane.enqueue(move || async move {
                order.lock().unwrap().push(i);
                tokio::time::sleep(Duration::from_millis(2)).await;
                Ok(())
            })
        });
        let results = futures::future::join_all(tasks).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_failed_task_does_not_block_siblings() {
        let lane = ConcurrencyQueue::new("errors", LaneConfig::new(1, Duration::ZERO));

        let (failed, ok) = tokio::join!(
            lane.enqueue(|| async { Err::<u8, _>(ApiError::Network("down".to_string())) }),
            lane.enqueue(|| async { Ok(5u8) }),
        );

        assert!(failed.unwrap_err().is_network());
        assert_eq!(ok.unwrap(), 5);
        assert_eq!(lane.running(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_dispatch_delay_holds_slot() {
        let lane = ConcurrencyQueue::new("heavy", LaneConfig::new(1, Duration::from_millis(400)));

        lane.enqueue(|| async { Ok(()) }).await.unwrap();
        // The task finished but its slot stays taken for the delay
        assert_eq!(lane.running(), 1);

        let started = tokio::time::Instant::now();
        lane.enqueue(|| async { Ok(()) }).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_panicking_task_frees_its_slot() {
        let lane = ConcurrencyQueue::new("panic", LaneConfig::new(1, Duration::ZERO));

        let failed = lane
            .enqueue(|| async {
                if true {
                    panic!("task exploded");
                }
                Ok(())
            })
            .await;
        assert!(matches!(failed, Err(ApiError::Internal(_))));

        let next = lane.enqueue(|| async { Ok(3) }).await;
        assert_eq!(next.unwrap(), 3);
    }

    #[test]
    fn test_default_lane_configs() {
        let lanes = Lanes::default();
        assert_eq!(lanes.lane(LaneKind::Light).config().max_concurrent, 6);
        assert_eq!(lanes.lane(LaneKind::Heavy).config().inter_dispatch_delay, Duration::from_millis(400));
    }
}
