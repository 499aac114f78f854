//! TTL cache for parsed input files, keyed by file content.
//!
//! An entry is reused only while it is younger than the TTL *and* the bytes
//! it was parsed from are unchanged, so an edited file is never served stale.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

/// Default time-to-live for cached loads.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Content fingerprint of one or more input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Fingerprints `(name, bytes)` pairs; order matters.
    pub fn of<'a>(parts: impl IntoIterator<Item = (&'a str, &'a [u8])>) -> Self {
        let mut hasher = DefaultHasher::new();
        for (name, bytes) in parts {
            name.hash(&mut hasher);
            bytes.len().hash(&mut hasher);
            bytes.hash(&mut hasher);
        }
        Fingerprint(hasher.finish())
    }
}

struct Entry<T> {
    loaded_at: Instant,
    value: Arc<T>,
}

pub struct LoadCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<Fingerprint, Entry<T>>>,
}

impl<T> LoadCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value for `key`, or runs `load` and caches its
    /// success. Failures are returned as-is and never cached.
    pub fn get_or_load<E>(
        &self,
        key: Fingerprint,
        load: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        if let Some(hit) = self.get(key) {
            debug!(?key, "cache hit");
            return Ok(hit);
        }

        debug!(?key, "cache miss");
        Ok(self.insert(key, load()?))
    }

    /// Live entry for `key`, if any.
    pub fn get(&self, key: Fingerprint) -> Option<Arc<T>> {
        let entries = self.lock();
        entries
            .get(&key)
            .filter(|e| e.loaded_at.elapsed() < self.ttl)
            .map(|e| Arc::clone(&e.value))
    }

    /// Stores `value` under `key`, replacing any previous entry.
    pub fn insert(&self, key: Fingerprint, value: T) -> Arc<T> {
        let value = Arc::new(value);
        let mut entries = self.lock();
        // Expired entries for older content are dropped on every insert.
        let ttl = self.ttl;
        entries.retain(|_, e| e.loaded_at.elapsed() < ttl);
        entries.insert(
            key,
            Entry {
                loaded_at: Instant::now(),
                value: Arc::clone(&value),
            },
        );
        value
    }

    pub fn invalidate(&self, key: Fingerprint) -> bool {
        self.lock().remove(&key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Fingerprint, Entry<T>>> {
        // A poisoned lock only means a loader panicked mid-insert; the map is still usable.
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl<T> Default for LoadCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
