//! Caches for resources derived from windows and applications.

use std::collections::hash_map::Entry;
use std::hash::Hash;

use tracing::{debug, trace};

use crate::common::collections::{HashMap, HashSet};
use crate::model::window::{Window, WindowId};
use crate::sys::platform::{HostError, Image};

#[derive(Debug, Clone)]
pub struct ResourceCache<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Default for ResourceCache<K, V> {
    fn default() -> Self { Self { entries: HashMap::default() } }
}

impl<K: Eq + Hash + Clone, V: Clone> ResourceCache<K, V> {
    pub fn new() -> Self { Self::default() }

    /// Returns the cached value, computing and storing it on a miss.
    pub fn get(&mut self, key: &K, compute: impl FnOnce(&K) -> V) -> V {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => entry.insert(compute(key)).clone(),
        }
    }

    pub fn peek(&self, key: &K) -> Option<&V> { self.entries.get(key) }

    pub fn insert(&mut self, key: K, value: V) { self.entries.insert(key, value); }

    pub fn contains(&self, key: &K) -> bool { self.entries.contains_key(key) }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Drops every entry whose key is not in `current`. Returns how many were
    /// dropped.
    pub fn evict_stale(&mut self, current: &HashSet<K>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| current.contains(key));
        before - self.entries.len()
    }
}

/// Application icons keyed by bundle id.
#[derive(Debug, Default)]
pub struct IconCache {
    cache: ResourceCache<String, Image>,
}

impl IconCache {
    /// Looks up the icon for `bundle_id`, asking `fetch` on a miss.
    ///
    /// Windows with no known owner have an empty bundle id; they get an empty
    /// placeholder and `fetch` is never consulted. A failed fetch is cached as
    /// empty too, until the application goes away.
    pub fn get(&mut self, bundle_id: &str, fetch: impl FnOnce(&str) -> Option<Image>) -> Image {
        if bundle_id.is_empty() {
            return Image::empty();
        }
        self.cache.get(&bundle_id.to_owned(), |bundle_id| {
            let icon = fetch(bundle_id);
            if icon.is_none() {
                debug!(bundle_id, "no icon available");
            }
            icon.unwrap_or_default()
        })
    }

    pub fn evict_stale(&mut self, current: &HashSet<String>) -> usize {
        self.cache.evict_stale(current)
    }

    pub fn len(&self) -> usize { self.cache.len() }

    pub fn is_empty(&self) -> bool { self.cache.is_empty() }
}

/// Window thumbnails keyed by window id.
///
/// The host renders minimized windows as empty images, so the cache keeps the
/// last image captured while each window was visible and never captures a
/// minimized one.
#[derive(Debug)]
pub struct SnapshotCache {
    cache: ResourceCache<WindowId, Image>,
    refresh_on_tick: bool,
}

impl Default for SnapshotCache {
    fn default() -> Self { Self::new(true) }
}

impl SnapshotCache {
    /// With `refresh_on_tick` off, snapshots are only captured on demand and
    /// before a minimize issued by a click.
    pub fn new(refresh_on_tick: bool) -> Self {
        Self { cache: ResourceCache::new(), refresh_on_tick }
    }

    /// Called on every state tick. Overwrites the cached image of a visible
    /// window so it is current when the window is eventually minimized.
    pub fn refresh(
        &mut self,
        id: WindowId,
        is_minimized: bool,
        capture: impl FnOnce() -> Result<Image, HostError>,
    ) {
        if !self.refresh_on_tick || is_minimized {
            return;
        }
        self.store(id, capture);
    }

    pub fn get(
        &mut self,
        id: WindowId,
        is_minimized: bool,
        capture: impl FnOnce() -> Result<Image, HostError>,
    ) -> Image {
        // Without tick refreshes a cached image of a visible window is only
        // as old as its last `get`, so capture again.
        let reuse = is_minimized || self.refresh_on_tick;
        if reuse && let Some(image) = self.cache.peek(&id) {
            return image.clone();
        }
        if is_minimized {
            trace!(window_id = %id, "no snapshot captured before minimize");
            return Image::empty();
        }
        match self.store(id, capture) {
            Some(image) => image,
            None => self.cache.peek(&id).cloned().unwrap_or_default(),
        }
    }

    /// Forces a capture right before this process minimizes the window.
    pub fn capture_before_minimize(
        &mut self,
        id: WindowId,
        capture: impl FnOnce() -> Result<Image, HostError>,
    ) {
        self.store(id, capture);
    }

    pub fn peek(&self, id: WindowId) -> Option<&Image> { self.cache.peek(&id) }

    pub fn evict_stale(&mut self, current: &HashSet<WindowId>) -> usize {
        self.cache.evict_stale(current)
    }

    pub fn len(&self) -> usize { self.cache.len() }

    pub fn is_empty(&self) -> bool { self.cache.is_empty() }

    fn store(
        &mut self,
        id: WindowId,
        capture: impl FnOnce() -> Result<Image, HostError>,
    ) -> Option<Image> {
        match capture() {
            Ok(image) if !image.is_empty() => {
                self.cache.insert(id, image.clone());
                Some(image)
            }
            Ok(_) => {
                trace!(window_id = %id, "host returned an empty snapshot");
                None
            }
            Err(err) => {
                debug!(window_id = %id, %err, "snapshot capture failed");
                None
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ResourceCaches {
    pub icons: IconCache,
    pub snapshots: SnapshotCache,
}

impl ResourceCaches {
    pub fn new(refresh_snapshots: bool) -> Self {
        Self {
            icons: IconCache::default(),
            snapshots: SnapshotCache::new(refresh_snapshots),
        }
    }

    /// Evicts everything not backed by a window in `windows`.
    pub fn evict_stale(&mut self, windows: &[Window]) {
        let bundle_ids: HashSet<String> = windows.iter().map(|w| w.bundle_id.clone()).collect();
        let window_ids: HashSet<WindowId> = windows.iter().map(|w| w.id).collect();
        let icons = self.icons.evict_stale(&bundle_ids);
        let snapshots = self.snapshots.evict_stale(&window_ids);
        if icons + snapshots > 0 {
            debug!(icons, snapshots, "evicted stale resources");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn image(tag: u8) -> Image { Image::new(1, 1, vec![tag]) }

    #[test]
    fn get_computes_once_until_evicted() {
        let mut cache: ResourceCache<u32, &str> = ResourceCache::new();
        let calls = Cell::new(0);
        let compute = |_: &u32| {
            calls.set(calls.get() + 1);
            "value"
        };

        assert_eq!(cache.get(&1, compute), "value");
        assert_eq!(cache.get(&1, compute), "value");
        assert_eq!(calls.get(), 1);

        assert_eq!(cache.evict_stale(&HashSet::default()), 1);
        assert!(!cache.contains(&1));
        cache.get(&1, compute);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn evict_stale_keeps_current_keys() {
        let mut cache = ResourceCache::new();
        cache.insert(1u32, 'a');
        cache.insert(2u32, 'b');
        cache.insert(3u32, 'c');

        let current: HashSet<u32> = [1, 3, 9].into_iter().collect();
        assert_eq!(cache.evict_stale(&current), 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.peek(&2), None);
        assert_eq!(cache.peek(&3), Some(&'c'));
    }

    #[test]
    fn icon_for_unknown_owner_is_an_empty_placeholder() {
        let mut icons = IconCache::default();
        let icon = icons.get("", |_| panic!("must not query the host for an empty bundle id"));
        assert!(icon.is_empty());
        assert!(icons.is_empty());
    }

    #[test]
    fn missing_icon_is_cached_as_empty() {
        let mut icons = IconCache::default();
        let calls = Cell::new(0);
        for _ in 0..3 {
            let icon = icons.get("com.example.app", |_| {
                calls.set(calls.get() + 1);
                None
            });
            assert!(icon.is_empty());
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn minimized_window_returns_last_visible_capture() {
        let mut snapshots = SnapshotCache::default();
        let id = WindowId::new(7);

        snapshots.refresh(id, false, || Ok(image(1)));
        snapshots.refresh(id, false, || Ok(image(2)));
        snapshots.refresh(id, true, || panic!("must not capture a minimized window"));

        let got = snapshots.get(id, true, || panic!("must not capture a minimized window"));
        assert_eq!(got, image(2));
    }

    #[test]
    fn empty_or_failed_captures_do_not_overwrite() {
        let mut snapshots = SnapshotCache::default();
        let id = WindowId::new(3);

        snapshots.refresh(id, false, || Ok(image(5)));
        snapshots.refresh(id, false, || Ok(Image::empty()));
        snapshots.refresh(id, false, || Err(HostError::WindowGone(id)));
        assert_eq!(snapshots.peek(id), Some(&image(5)));
    }

    #[test]
    fn minimized_window_without_history_is_empty() {
        let mut snapshots = SnapshotCache::default();
        let got = snapshots.get(WindowId::new(1), true, || Ok(image(9)));
        assert!(got.is_empty());
        assert!(snapshots.is_empty());
    }

    #[test]
    fn visible_window_is_captured_fresh_without_tick_refresh() {
        let mut snapshots = SnapshotCache::new(false);
        let id = WindowId::new(6);

        assert_eq!(snapshots.get(id, false, || Ok(image(1))), image(1));
        assert_eq!(snapshots.get(id, false, || Ok(image(2))), image(2));
        // A failed capture falls back to the last good image.
        assert_eq!(snapshots.get(id, false, || Err(HostError::WindowGone(id))), image(2));
        assert_eq!(snapshots.get(id, true, || panic!("must not capture a minimized window")), image(2));
    }

    #[test]
    fn capture_before_minimize_overrides_refresh_setting() {
        let mut snapshots = SnapshotCache::new(false);
        let id = WindowId::new(4);

        snapshots.refresh(id, false, || Ok(image(1)));
        assert!(snapshots.peek(id).is_none());

        snapshots.capture_before_minimize(id, || Ok(image(2)));
        assert_eq!(snapshots.get(id, true, || Ok(image(3))), image(2));
    }
}
