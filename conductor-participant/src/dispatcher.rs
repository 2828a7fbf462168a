/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! A bounded worker pool with strict per-(resource, partition)
//! mutual exclusion. Generalizes the receiver-plus-spawn shape of a
//! single global manager loop into a keyed fan-out: each key gets its
//! own serialization lock, while a semaphore bounds how many keys may
//! be active at once across the whole pool.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex as AsyncMutex, Semaphore};

type Key = (String, String);

pub struct KeyedDispatcher {
    semaphore: Arc<Semaphore>,
    locks: StdMutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

impl KeyedDispatcher {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Runs `f` with exclusive access to `(resource, partition)`,
    /// blocking until a pool slot and the key's lock are both free.
    /// Other keys proceed concurrently up to the pool's capacity.
    pub async fn run_exclusive<F, Fut, T>(&self, resource: &str, partition: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("dispatcher semaphore is never closed");
        let key_lock = self.key_lock(resource, partition);
        let _guard = key_lock.lock().await;
        let result = f().await;
        drop(permit);
        result
    }

    fn key_lock(&self, resource: &str, partition: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry((resource.to_string(), partition.to_string()))
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drops the serialization lock for a partition once it reaches
    /// DROPPED, so the key map doesn't grow unbounded over the
    /// participant's lifetime.
    pub fn forget(&self, resource: &str, partition: &str) {
        self.locks.lock().unwrap().remove(&(resource.to_string(), partition.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_runs_are_serialized() {
        let dispatcher = Arc::new(KeyedDispatcher::new(4));
        let order = Arc::new(StdMutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..3 {
            let dispatcher = Arc::clone(&dispatcher);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                dispatcher
                    .run_exclusive("R", "R_0", || async move {
                        order.lock().unwrap().push(format!("start-{i}"));
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        order.lock().unwrap().push(format!("end-{i}"));
                    })
                    .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let order = order.lock().unwrap();
        // Every start must be immediately followed by its own end: no two
        // runs for the same key interleave.
        for pair in order.chunks(2) {
            let start = pair[0].strip_prefix("start-").unwrap();
            let end = pair[1].strip_prefix("end-").unwrap();
            assert_eq!(start, end);
        }
    }

    #[tokio::test]
    async fn distinct_keys_run_concurrently() {
        let dispatcher = Arc::new(KeyedDispatcher::new(4));
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..3 {
            let dispatcher = Arc::clone(&dispatcher);
            let concurrent = Arc::clone(&concurrent);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                dispatcher
                    .run_exclusive("R", &format!("R_{i}"), || async move {
                        let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        concurrent.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) > 1);
    }
}
