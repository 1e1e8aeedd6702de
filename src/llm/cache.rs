use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

type InFlight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct CacheState<K, V, E> {
    ready: HashMap<K, (Instant, V)>,
    inflight: HashMap<K, InFlight<V, E>>,
}

/// TTL cache where concurrent misses for one key share a single computation.
///
/// Only successes are stored. A failure is handed to every caller that was
/// waiting on it, and the next call computes again.
pub struct SingleFlightCache<K, V, E> {
    ttl: Duration,
    state: Mutex<CacheState<K, V, E>>,
}

impl<K, V, E> SingleFlightCache<K, V, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState {
                ready: HashMap::new(),
                inflight: HashMap::new(),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<K, V, E>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fresh value for `key`, if any. Expired entries are dropped.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut state = self.lock();
        match state.ready.get(key) {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                state.ready.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let shared = {
            let mut state = self.lock();
            if let Some((stored_at, value)) = state.ready.get(&key) {
                if stored_at.elapsed() < self.ttl {
                    return Ok(value.clone());
                }
                state.ready.remove(&key);
            }
            match state.inflight.get(&key) {
                Some(running) => running.clone(),
                None => {
                    let running = compute().boxed().shared();
                    state.inflight.insert(key.clone(), running.clone());
                    running
                }
            }
        };

        let result = shared.clone().await;

        let mut state = self.lock();
        let finished_here = state
            .inflight
            .get(&key)
            .is_some_and(|running| running.ptr_eq(&shared));
        if finished_here {
            state.inflight.remove(&key);
            if let Ok(value) = &result {
                state.ready.insert(key, (Instant::now(), value.clone()));
            }
        }
        result
    }

    pub fn invalidate(&self, key: &K) {
        self.lock().ready.remove(key);
    }

    pub fn clear(&self) {
        self.lock().ready.clear();
    }

    /// Stored entries, including ones that have expired but not been evicted yet.
    pub fn len(&self) -> usize {
        self.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
