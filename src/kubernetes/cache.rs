// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! TTL cache for list results
//!
//! Memoizes an expensive async computation (a list call) per key. Concurrent
//! callers of the same key wait on a per-key lock, so one computation serves
//! all of them. Failed computations are never stored.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::resources::ResourceInfo;
use super::source::ListParams;

/// Default number of keys kept
pub const DEFAULT_CAPACITY: usize = 1024;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// One key's storage. `value` is held across the computation, `expires_at`
/// mirrors the stored entry for eviction decisions.
struct Slot<V> {
    value: tokio::sync::Mutex<Option<Entry<V>>>,
    expires_at: Mutex<Option<Instant>>,
}

impl<V> Slot<V> {
    fn new() -> Self {
        Self {
            value: tokio::sync::Mutex::new(None),
            expires_at: Mutex::new(None),
        }
    }

    fn expires_at(&self) -> Option<Instant> {
        *self.expires_at.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_expires_at(&self, at: Option<Instant>) {
        *self.expires_at.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }
}

pub struct ResultCache<V> {
    capacity: usize,
    slots: Mutex<HashMap<String, Arc<Slot<V>>>>,
}

impl<V: Clone + Send> ResultCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached value for `key`, or run `compute` and cache its
    /// result for `ttl`. A zero `ttl` bypasses the cache entirely. Errors
    /// from `compute` are returned as is and not cached.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &str, ttl: Duration, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if ttl.is_zero() {
            trace!(key = %key, "cache bypassed");
            return compute().await;
        }

        let slot = self.slot(key);
        let mut guard = slot.value.lock().await;

        if let Some(entry) = guard.as_ref() {
            if entry.expires_at > Instant::now() {
                debug!(key = %key, "cache hit");
                return Ok(entry.value.clone());
            }
            debug!(key = %key, "cache entry expired");
        } else {
            debug!(key = %key, "cache miss");
        }

        match compute().await {
            Ok(value) => {
                let expires_at = Instant::now() + ttl;
                *guard = Some(Entry {
                    value: value.clone(),
                    expires_at,
                });
                slot.set_expires_at(Some(expires_at));
                Ok(value)
            }
            Err(e) => {
                *guard = None;
                slot.set_expires_at(None);
                Err(e)
            }
        }
    }

    /// Drop one key
    pub fn invalidate(&self, key: &str) {
        self.lock_slots().remove(key);
    }

    /// Drop everything
    pub fn clear(&self) {
        self.lock_slots().clear();
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Slot<V>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Existing slot for `key`, or a new one. Makes room first when full.
    fn slot(&self, key: &str) -> Arc<Slot<V>> {
        let mut slots = self.lock_slots();
        if let Some(slot) = slots.get(key) {
            return Arc::clone(slot);
        }
        if slots.len() >= self.capacity {
            Self::make_room(&mut slots, self.capacity);
        }
        let slot = Arc::new(Slot::new());
        slots.insert(key.to_string(), Arc::clone(&slot));
        slot
    }

    fn make_room(slots: &mut HashMap<String, Arc<Slot<V>>>, capacity: usize) {
        let now = Instant::now();
        // Expired entries, and empty slots nobody is waiting on
        slots.retain(|_, slot| match slot.expires_at() {
            Some(at) => at > now,
            None => Arc::strong_count(slot) > 1,
        });
        if slots.len() < capacity {
            return;
        }
        let oldest = slots
            .iter()
            .filter_map(|(k, slot)| slot.expires_at().map(|at| (at, k.clone())))
            .min()
            .map(|(_, k)| k);
        if let Some(key) = oldest {
            trace!(key = %key, "evicting cache entry");
            slots.remove(&key);
        }
    }
}

impl<V: Clone + Send> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Cache key of one list call: namespace, group, version, resource and the
/// pushed-down selectors
pub fn list_key(resource: &ResourceInfo, params: &ListParams) -> String {
    format!(
        "{}/{}/{}/{}?labels={}&fields={}",
        params.namespace.as_deref().unwrap_or("*"),
        resource.group,
        resource.version,
        resource.plural,
        params.filters.label_selector.as_deref().unwrap_or(""),
        params.filters.field_selector.as_deref().unwrap_or(""),
    )
}
