//! In-process signal store

use crate::store::{SignalStore, WatchCallback, WatcherId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

struct Watcher {
    key: String,
    callback: Arc<Mutex<WatchCallback>>,
}

#[derive(Default)]
struct Inner {
    values: HashMap<String, i32>,
    watchers: HashMap<WatcherId, Watcher>,
    next_id: WatcherId,
}

/// HashMap-backed store firing watchers synchronously on every write
///
/// Watcher callbacks run outside the store lock, so a callback may call
/// back into the store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of installed watchers
    pub fn watcher_count(&self) -> usize {
        self.inner.lock().watchers.len()
    }
}

impl SignalStore for MemoryStore {
    fn get_int(&self, key: &str) -> Option<i32> {
        self.inner.lock().values.get(key).copied()
    }

    fn set_int(&self, key: &str, value: i32) {
        let to_fire: Vec<Arc<Mutex<WatchCallback>>> = {
            let mut inner = self.inner.lock();
            inner.values.insert(key.to_string(), value);
            inner
                .watchers
                .values()
                .filter(|w| w.key == key)
                .map(|w| Arc::clone(&w.callback))
                .collect()
        };
        for callback in to_fire {
            (callback.lock())(key, value);
        }
    }

    fn watch(&self, key: &str, callback: WatchCallback) -> WatcherId {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.watchers.insert(
            id,
            Watcher {
                key: key.to_string(),
                callback: Arc::new(Mutex::new(callback)),
            },
        );
        id
    }

    fn unwatch(&self, id: WatcherId) {
        self.inner.lock().watchers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn set_then_get() {
        let store = MemoryStore::new();
        assert_eq!(store.get_int("memory/pm/state"), None);
        store.set_int("memory/pm/state", 1);
        assert_eq!(store.get_int("memory/pm/state"), Some(1));
    }

    #[test]
    fn watcher_fires_on_matching_key_only() {
        let store = MemoryStore::new();
        let seen = Arc::new(AtomicI32::new(0));
        let seen2 = Arc::clone(&seen);
        store.watch(
            "memory/sensor/10001",
            Box::new(move |_, v| {
                seen2.store(v, Ordering::SeqCst);
            }),
        );

        store.set_int("memory/sensor/20001", 7);
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        store.set_int("memory/sensor/10001", 3);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn unwatch_stops_delivery() {
        let store = MemoryStore::new();
        let seen = Arc::new(AtomicI32::new(0));
        let seen2 = Arc::clone(&seen);
        let id = store.watch(
            "k",
            Box::new(move |_, v| {
                seen2.store(v, Ordering::SeqCst);
            }),
        );
        store.unwatch(id);
        store.set_int("k", 9);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(store.watcher_count(), 0);
    }

    #[test]
    fn watcher_may_reenter_the_store() {
        let store = MemoryStore::new();
        let store2 = store.clone();
        store.watch(
            "a",
            Box::new(move |_, v| {
                store2.set_int("b", v + 1);
            }),
        );
        store.set_int("a", 1);
        assert_eq!(store.get_int("b"), Some(2));
    }
}
