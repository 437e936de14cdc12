//! Per-key mutual exclusion.
//!
//! Fee computation for an order and lifecycle transitions on a report must never run concurrently for the same key,
//! but work on different keys proceeds in parallel. [`KeyedLocks`] hands out one async mutex per key, created on
//! demand and discarded when the last holder or waiter lets go.
use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex},
    time::Duration,
};

use log::*;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

#[derive(Clone)]
pub struct KeyedLocks<K: Eq + Hash + Clone> {
    locks: LockMap<K>,
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self { locks: Arc::new(Mutex::new(HashMap::new())) }
    }
}

impl<K: Eq + Hash + Clone + std::fmt::Display> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &K) -> Arc<AsyncMutex<()>> {
        let mut map = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        map.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Waits until the lock for `key` is free and takes it.
    pub async fn lock(&self, key: &K) -> KeyedGuard<K> {
        let mutex = self.entry(key);
        let guard = mutex.lock_owned().await;
        trace!("🔒️ Acquired lock for {key}");
        KeyedGuard { key: key.clone(), locks: Arc::clone(&self.locks), guard: Some(guard) }
    }

    /// Like [`Self::lock`], but gives up after `timeout`. Returns `None` if the lock could not be acquired in time.
    pub async fn lock_with_timeout(&self, key: &K, timeout: Duration) -> Option<KeyedGuard<K>> {
        match tokio::time::timeout(timeout, self.lock(key)).await {
            Ok(guard) => Some(guard),
            Err(_) => {
                debug!("🔒️ Timed out after {}ms waiting for the lock on {key}", timeout.as_millis());
                None
            },
        }
    }

    /// The number of keys that are currently locked or being waited on.
    pub fn active_keys(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

pub struct KeyedGuard<K: Eq + Hash + Clone> {
    key: K,
    locks: LockMap<K>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyedGuard<K> {
    fn drop(&mut self) {
        let mut map = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        drop(self.guard.take());
        // Anyone still waiting holds a clone, so the count only drops to one once we were the last user
        if map.get(&self.key).is_some_and(|m| Arc::strong_count(m) == 1) {
            map.remove(&self.key);
        }
    }
}
