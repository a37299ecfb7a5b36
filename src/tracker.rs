// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! Favorites and recently viewed channels.
//!
//! Both collections are written back to the store after every change. A store
//! that cannot be read or written never fails the caller; the tracker keeps
//! working in memory and logs the problem.

use crate::store::KeyValueStore;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

pub const MAX_RECENT_CHANNELS: usize = 10;
pub const FAVORITES_KEY: &str = "iptv_favorites";
pub const RECENT_KEY: &str = "iptv_recent_channels";

/// Most-recent-first list of stream ids with a fixed capacity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentList {
    ids: Vec<u32>,
    max: usize,
}

impl RecentList {
    pub fn new(max: usize) -> Self {
        Self {
            ids: Vec::new(),
            max,
        }
    }

    /// Build from stored ids, dropping repeats and anything past capacity
    pub fn from_ids(ids: Vec<u32>, max: usize) -> Self {
        let mut list = Self::new(max);
        for id in ids {
            if !list.ids.contains(&id) && list.ids.len() < max {
                list.ids.push(id);
            }
        }
        list
    }

    /// Move `id` to the front, evicting the oldest entry when full
    pub fn push_front(&mut self, id: u32) {
        self.ids.retain(|&existing| existing != id);
        self.ids.insert(0, id);
        self.ids.truncate(self.max);
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for RecentList {
    fn default() -> Self {
        Self::new(MAX_RECENT_CHANNELS)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoriteSet {
    ids: BTreeSet<u32>,
}

impl FavoriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or remove `id`; returns true when it is now a favorite
    pub fn toggle(&mut self, id: u32) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<u32> for FavoriteSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug)]
pub struct Tracker<S: KeyValueStore> {
    store: S,
    favorites: FavoriteSet,
    recent: RecentList,
}

impl<S: KeyValueStore> Tracker<S> {
    /// Load both collections from `store`, discarding malformed entries
    pub fn load(mut store: S, max_recent: usize) -> Self {
        let favorites = load_ids(&mut store, FAVORITES_KEY)
            .map(FavoriteSet::from_iter)
            .unwrap_or_default();
        let recent = load_ids(&mut store, RECENT_KEY)
            .map(|ids| RecentList::from_ids(ids, max_recent))
            .unwrap_or_else(|| RecentList::new(max_recent));

        debug!(
            "Tracker loaded {} favourites, {} recent",
            favorites.len(),
            recent.len()
        );

        Self {
            store,
            favorites,
            recent,
        }
    }

    pub fn add_recent(&mut self, id: u32) -> &RecentList {
        self.recent.push_front(id);
        persist(&mut self.store, RECENT_KEY, self.recent.ids());
        &self.recent
    }

    pub fn toggle_favorite(&mut self, id: u32) -> &FavoriteSet {
        let added = self.favorites.toggle(id);
        debug!(
            "Stream {} {} favourites",
            id,
            if added { "added to" } else { "removed from" }
        );
        let ids: Vec<u32> = self.favorites.iter().collect();
        persist(&mut self.store, FAVORITES_KEY, &ids);
        &self.favorites
    }

    pub fn is_favorite(&self, id: u32) -> bool {
        self.favorites.contains(id)
    }

    pub fn favorites(&self) -> &FavoriteSet {
        &self.favorites
    }

    pub fn recent(&self) -> &RecentList {
        &self.recent
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

fn load_ids<S: KeyValueStore>(store: &mut S, key: &str) -> Option<Vec<u32>> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read {} from store: {}", key, e);
            return None;
        }
    };

    match serde_json::from_str::<Vec<u32>>(&raw) {
        Ok(ids) => Some(ids),
        Err(e) => {
            warn!("Stored {} format incorrect, resetting: {}", key, e);
            if let Err(e) = store.remove(key) {
                warn!("Failed to clear {} from store: {}", key, e);
            }
            None
        }
    }
}

fn persist<S: KeyValueStore, T: Serialize + ?Sized>(store: &mut S, key: &str, value: &T) {
    let encoded = match serde_json::to_string(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!("Failed to encode {}: {}", key, e);
            return;
        }
    };

    if let Err(e) = store.set(key, &encoded) {
        warn!("Failed to save {} to store: {}", key, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Io {
                path: "broken".into(),
                source: std::io::Error::other("read failed"),
            })
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Io {
                path: "broken".into(),
                source: std::io::Error::other("write failed"),
            })
        }

        fn remove(&mut self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn test_recent_never_exceeds_capacity() {
        let mut recent = RecentList::default();
        for id in 0..25 {
            recent.push_front(id);
            assert!(recent.len() <= MAX_RECENT_CHANNELS);
        }
        assert_eq!(recent.ids()[0], 24);
        assert_eq!(recent.ids()[9], 15);
    }

    #[test]
    fn test_recent_moves_existing_to_front() {
        let mut recent = RecentList::default();
        recent.push_front(1);
        recent.push_front(2);
        recent.push_front(3);
        recent.push_front(1);
        assert_eq!(recent.ids(), &[1, 3, 2]);
    }

    #[test]
    fn test_recent_from_ids_dedups_and_truncates() {
        let recent = RecentList::from_ids(vec![5, 4, 5, 3, 2, 1], 3);
        assert_eq!(recent.ids(), &[5, 4, 3]);
    }

    #[test]
    fn test_toggle_favorite_twice_is_identity() {
        let mut tracker = Tracker::load(MemoryStore::new(), MAX_RECENT_CHANNELS);
        tracker.toggle_favorite(7);
        let before = tracker.favorites().clone();

        tracker.toggle_favorite(42);
        assert!(tracker.is_favorite(42));
        tracker.toggle_favorite(42);
        assert_eq!(tracker.favorites(), &before);
    }

    #[test]
    fn test_mutations_are_persisted() {
        let mut tracker = Tracker::load(MemoryStore::new(), MAX_RECENT_CHANNELS);
        tracker.toggle_favorite(3);
        tracker.toggle_favorite(1);
        tracker.add_recent(10);
        tracker.add_recent(11);

        let store = tracker.store();
        assert_eq!(store.get(FAVORITES_KEY).unwrap().as_deref(), Some("[1,3]"));
        assert_eq!(store.get(RECENT_KEY).unwrap().as_deref(), Some("[11,10]"));
    }

    #[test]
    fn test_reload_restores_collections() {
        let mut store = MemoryStore::new();
        store.set(FAVORITES_KEY, "[4,2]").unwrap();
        store.set(RECENT_KEY, "[9,8,7]").unwrap();

        let tracker = Tracker::load(store, MAX_RECENT_CHANNELS);
        assert!(tracker.is_favorite(2));
        assert!(tracker.is_favorite(4));
        assert_eq!(tracker.recent().ids(), &[9, 8, 7]);
    }

    #[test]
    fn test_malformed_values_are_discarded_and_cleared() {
        let mut store = MemoryStore::new();
        store.set(FAVORITES_KEY, r#"{"not":"an array"}"#).unwrap();
        store.set(RECENT_KEY, "definitely not json").unwrap();

        let tracker = Tracker::load(store, MAX_RECENT_CHANNELS);
        assert!(tracker.favorites().is_empty());
        assert!(tracker.recent().is_empty());
        assert_eq!(tracker.store().get(FAVORITES_KEY).unwrap(), None);
        assert_eq!(tracker.store().get(RECENT_KEY).unwrap(), None);
    }

    #[test]
    fn test_broken_store_degrades_to_memory() {
        let mut tracker = Tracker::load(BrokenStore, MAX_RECENT_CHANNELS);
        assert!(tracker.favorites().is_empty());

        tracker.toggle_favorite(5);
        tracker.add_recent(5);
        assert!(tracker.is_favorite(5));
        assert_eq!(tracker.recent().ids(), &[5]);
    }
}
