use crate::error::ApiError;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type SharedResult<T> = Shared<BoxFuture<'static, Result<T, ApiError>>>;

struct InFlight<T> {
    generation: u64,
    result: SharedResult<T>,
}

type Registry<T> = Arc<Mutex<HashMap<String, InFlight<T>>>>;

fn lock<T>(registry: &Registry<T>) -> MutexGuard<'_, HashMap<String, InFlight<T>>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Removes the registry entry once the underlying call settles, whatever the outcome
struct InFlightGuard<T> {
    registry: Registry<T>,
    key: String,
    generation: u64,
}

impl<T> Drop for InFlightGuard<T> {
    fn drop(&mut self) {
        let mut in_flight = lock(&self.registry);
        if in_flight.get(&self.key).map(|f| f.generation) == Some(self.generation) {
            in_flight.remove(&self.key);
        }
    }
}

/// Shares one in-flight call between every caller asking for the same key.
///
/// The call is spawned onto the runtime so it finishes even if all callers
/// stop waiting. Its key is released when it settles, so a failure never
/// blocks later retries.
pub struct RequestCoalescer<T> {
    in_flight: Registry<T>,
    next_generation: AtomicU64,
}

impl<T> RequestCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    pub async fn run<F, Fut>(&self, key: &str, make: F) -> Result<T, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let shared = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get(key) {
                Some(existing) => {
                    debug!(key = %key, "joining in-flight request");
                    existing.result.clone()
                }
                None => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let guard = InFlightGuard {
                        registry: Arc::clone(&self.in_flight),
                        key: key.to_string(),
                        generation,
                    };
                    let call = make();
                    let handle = tokio::spawn(async move {
                        let _guard = guard;
                        call.await
                    });
                    let result = async move {
                        match handle.await {
                            Ok(result) => result,
                            Err(e) => Err(ApiError::Internal(format!("request task failed: {}", e))),
                        }
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(
                        key.to_string(),
                        InFlight {
                            generation,
                            result: result.clone(),
                        },
                    );
                    result
                }
            }
        };

        shared.await
    }

    /// Keys with a call still in flight
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        lock(&self.in_flight).contains_key(key)
    }

    /// Forget every registered call; running calls still finish on their own
    pub fn clear(&self) {
        lock(&self.in_flight).clear();
    }
}

impl<T> Default for RequestCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_call() {
        let coalescer = Arc::new(RequestCoalescer::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let coalescer = Arc::clone(&coalescer);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                coalescer
                    .run("discover:popular:1", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(7)
                    })
                    .await
            }));
        }

        let results = futures::future::join_all(handles).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap(), Ok(7));
        }
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_key_released() {
        let coalescer = RequestCoalescer::<u32>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let make = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err::<u32, _>(ApiError::Server { status: 502, message: None })
            }
        };

        let (a, b) = tokio::join!(
            coalescer.run("movie:1", make(Arc::clone(&calls))),
            coalescer.run("movie:1", make(Arc::clone(&calls))),
        );
        assert!(matches!(a, Err(ApiError::Server { status: 502, .. })));
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!coalescer.is_in_flight("movie:1"));

        // A retry after the failure issues a fresh call
        let retry = coalescer.run("movie:1", || async { Ok(1) }).await;
        assert_eq!(retry, Ok(1));
    }

    #[tokio::test]
    async fn test_different_keys_do_not_coalesce() {
        let coalescer = RequestCoalescer::<String>::new();
        let (a, b) = tokio::join!(
            coalescer.run("movie:1", || async { Ok("one".to_string()) }),
            coalescer.run("movie:2", || async { Ok("two".to_string()) }),
        );
        assert_eq!(a.unwrap(), "one");
        assert_eq!(b.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_panicking_call_releases_key() {
        let coalescer = RequestCoalescer::<u32>::new();
        let result = coalescer
            .run("genres", || async {
                if true {
                    panic!("backend exploded");
                }
                Ok(0)
            })
            .await;
        assert!(matches!(result, Err(ApiError::Internal(_))));
        assert_eq!(coalescer.in_flight(), 0);
    }
}
