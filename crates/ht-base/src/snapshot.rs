//! Per-page store of the last-known data, shared by the page and its background threads.
//!
//! The payload is only ever replaced wholesale under the write lock. Readers get
//! an `Arc` to an immutable payload, so a render never observes a half-written
//! update and never holds the lock while drawing.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Local};

use crate::cancel::CancelToken;

/// Last-known-good data for one page.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub data: Arc<T>,
    pub updated_at: DateTime<Local>,
    /// Monotonic refresh counter, survives `clear()`
    pub refresh: u64,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self { data: Arc::clone(&self.data), updated_at: self.updated_at, refresh: self.refresh }
    }
}

struct StoreInner<T> {
    current: Option<Snapshot<T>>,
    refreshes: u64,
}

/// Clones share the same lock.
pub struct SnapshotStore<T> {
    inner: Arc<RwLock<StoreInner<T>>>,
}

impl<T> Clone for SnapshotStore<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> Default for SnapshotStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SnapshotStore<T> {
    /// Created empty; populated by the first successful refresh after activation.
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(StoreInner { current: None, refreshes: 0 })) }
    }

    /// Shared read. Never blocks another reader.
    pub fn read(&self) -> Option<Snapshot<T>> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.current.clone()
    }

    /// Replace the payload unconditionally. Returns the new refresh counter.
    pub fn write(&self, data: T) -> u64 {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        Self::replace(&mut inner, data)
    }

    /// Replace the payload unless `token` was cancelled.
    /// The liveness check happens under the write lock, so a deactivation that
    /// clears the store can never be followed by a late write from its tasks.
    pub fn write_live(&self, token: &CancelToken, data: T) -> Option<Snapshot<T>> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if token.is_cancelled() {
            return None;
        }
        Self::replace(&mut inner, data);
        inner.current.clone()
    }

    /// Build the next payload from the current one and replace it, atomically.
    /// `build` runs under the write lock and receives the previous payload, if any.
    pub fn update_live<F>(&self, token: &CancelToken, build: F) -> Option<Snapshot<T>>
    where
        F: FnOnce(Option<&T>) -> T,
    {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if token.is_cancelled() {
            return None;
        }
        let next = build(inner.current.as_ref().map(|s| s.data.as_ref()));
        Self::replace(&mut inner, next);
        inner.current.clone()
    }

    /// Drop the payload. The refresh counter keeps counting.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.current = None;
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.current.is_none()
    }

    /// Total successful writes since construction
    pub fn refresh_count(&self) -> u64 {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.refreshes
    }

    fn replace(inner: &mut StoreInner<T>, data: T) -> u64 {
        inner.refreshes += 1;
        inner.current = Some(Snapshot { data: Arc::new(data), updated_at: Local::now(), refresh: inner.refreshes });
        inner.refreshes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_empty() {
        let store: SnapshotStore<Vec<u32>> = SnapshotStore::new();
        assert!(store.read().is_none());
        assert!(store.is_empty());
        assert_eq!(store.refresh_count(), 0);
    }

    #[test]
    fn last_write_wins() {
        let store = SnapshotStore::new();
        store.write(vec![1, 2, 3]);
        store.write(vec![4]);
        let snap = store.read().map(|s| s.data.as_ref().clone());
        assert_eq!(snap, Some(vec![4]));
        assert_eq!(store.refresh_count(), 2);
    }

    #[test]
    fn clear_keeps_counter_monotonic() {
        let store = SnapshotStore::new();
        store.write("a");
        store.clear();
        assert!(store.read().is_none());
        assert_eq!(store.write("b"), 2);
    }

    #[test]
    fn write_live_discards_after_cancel() {
        let store = SnapshotStore::new();
        let token = CancelToken::new();
        assert!(store.write_live(&token, 1).is_some());
        token.cancel();
        assert!(store.write_live(&token, 2).is_none());
        assert_eq!(store.read().map(|s| *s.data), Some(1));
    }

    #[test]
    fn update_live_sees_previous_payload() {
        let store = SnapshotStore::new();
        let token = CancelToken::new();
        store.update_live(&token, |prev| prev.map(|v: &Vec<u8>| v.clone()).unwrap_or_default());
        store.update_live(&token, |prev| {
            let mut next = prev.cloned().unwrap_or_default();
            next.push(9);
            next
        });
        assert_eq!(store.read().map(|s| s.data.as_ref().clone()), Some(vec![9]));
    }

    #[test]
    fn readers_keep_their_snapshot_across_writes() {
        let store = SnapshotStore::new();
        store.write(String::from("old"));
        let held = store.read();
        store.write(String::from("new"));
        assert_eq!(held.map(|s| s.data.as_ref().clone()), Some("old".to_string()));
    }

    #[test]
    fn concurrent_writers_never_lose_updates() {
        let store: SnapshotStore<u64> = SnapshotStore::new();
        let token = CancelToken::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let token = token.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.update_live(&token, |prev| prev.copied().unwrap_or(0) + 1);
                    }
                })
            })
            .collect();
        for h in handles {
            let _ = h.join();
        }
        assert_eq!(store.read().map(|s| *s.data), Some(800));
    }
}
