//! Client-side settings cache with change notifications.
//!
//! One cache per client session. Entries stay valid until they are
//! invalidated or the process exits. Subscribers hear about every accepted
//! update and every invalidation.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use settingsdoc_core::Document;

/// A published change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Updated { path: String, version: u64 },
    Invalidated { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type Listener = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

#[derive(Debug, Clone)]
struct CacheEntry {
    document: Document,
    version: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    listeners: BTreeMap<SubscriptionId, Listener>,
    next_id: u64,
}

#[derive(Default)]
pub struct SettingsCache {
    state: Mutex<CacheState>,
}

impl SettingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    // A listener that panicked must not take the cache down with it.
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cached document and its version.
    pub fn get(&self, path: &str) -> Option<(Document, u64)> {
        self.lock()
            .entries
            .get(path)
            .map(|entry| (entry.document.clone(), entry.version))
    }

    pub fn version(&self, path: &str) -> Option<u64> {
        self.lock().entries.get(path).map(|entry| entry.version)
    }

    /// Store `document` unless a newer version is already cached. Returns
    /// whether it was accepted.
    pub fn put(&self, path: &str, document: Document, version: u64) -> bool {
        let listeners = {
            let mut state = self.lock();
            if let Some(existing) = state.entries.get(path) {
                if existing.version > version {
                    return false;
                }
            }
            state
                .entries
                .insert(path.to_string(), CacheEntry { document, version });
            snapshot(&state)
        };
        publish(
            &listeners,
            &CacheEvent::Updated {
                path: path.to_string(),
                version,
            },
        );
        true
    }

    /// Drop the entry for `path`. Returns whether one was present.
    pub fn invalidate(&self, path: &str) -> bool {
        let (removed, listeners) = {
            let mut state = self.lock();
            let removed = state.entries.remove(path).is_some();
            (removed, snapshot(&state))
        };
        publish(
            &listeners,
            &CacheEvent::Invalidated {
                path: path.to_string(),
            },
        );
        removed
    }

    pub fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let mut state = self.lock();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.listeners.insert(id, listener);
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().listeners.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

fn snapshot(state: &CacheState) -> Vec<Listener> {
    state.listeners.values().cloned().collect()
}

// Runs outside the lock so listeners may call back into the cache.
fn publish(listeners: &[Listener], event: &CacheEvent) {
    for listener in listeners {
        listener(event);
    }
}
