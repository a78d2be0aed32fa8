//! Authoritative item state management utilities.

use std::collections::BTreeMap;

use stowage_core::{CellRect, GridItem, ItemId, TemplateId};

/// Dense key the occupancy grid stores instead of cloning string identities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ItemKey(u32);

/// Snapshot of an item stored inside the container.
#[derive(Clone, Debug)]
pub(crate) struct StoredItem {
    /// Identity reported to the engine.
    pub(crate) id: ItemId,
    /// Region of cells occupied by the item.
    pub(crate) region: CellRect,
    /// Template that produced the item, when known.
    pub(crate) spawn_tag: Option<TemplateId>,
    /// Stack quantity carried by the item.
    pub(crate) quantity: u32,
}

impl StoredItem {
    pub(crate) fn to_grid_item(&self) -> GridItem {
        GridItem {
            id: self.id.clone(),
            origin: self.region.origin(),
            size: self.region.size(),
            spawn_tag: self.spawn_tag.clone(),
        }
    }
}

/// Registry that stores items and manages key and identifier allocation.
#[derive(Debug)]
pub(crate) struct ItemRegistry {
    entries: BTreeMap<ItemKey, StoredItem>,
    next_key: u32,
    next_serial: u64,
}

impl ItemRegistry {
    /// Creates an empty registry with reset counters.
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_key: 0,
            next_serial: 1,
        }
    }

    /// Stores `item` under a fresh key, skipping keys still held after the counter wraps.
    pub(crate) fn insert(&mut self, item: StoredItem) -> ItemKey {
        while self.entries.contains_key(&ItemKey(self.next_key)) {
            self.next_key = self.next_key.wrapping_add(1);
        }
        let key = ItemKey(self.next_key);
        self.next_key = self.next_key.wrapping_add(1);
        let _ = self.entries.insert(key, item);
        key
    }

    pub(crate) fn remove(&mut self, key: ItemKey) -> Option<StoredItem> {
        self.entries.remove(&key)
    }

    pub(crate) fn get(&self, key: ItemKey) -> Option<&StoredItem> {
        self.entries.get(&key)
    }

    pub(crate) fn get_mut(&mut self, key: ItemKey) -> Option<&mut StoredItem> {
        self.entries.get_mut(&key)
    }

    pub(crate) fn key_of(&self, id: &ItemId) -> Option<ItemKey> {
        self.entries
            .iter()
            .find(|(_, item)| &item.id == id)
            .map(|(key, _)| *key)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ItemKey, &StoredItem)> {
        self.entries.iter().map(|(key, item)| (*key, item))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Allocates an identity of the form `<template>#<serial>` that is not in use.
    pub(crate) fn allocate_id(&mut self, template: &TemplateId) -> ItemId {
        loop {
            let candidate = ItemId::new(format!("{template}#{}", self.next_serial));
            self.next_serial = self.next_serial.wrapping_add(1);
            if self.key_of(&candidate).is_none() {
                return candidate;
            }
        }
    }
}
