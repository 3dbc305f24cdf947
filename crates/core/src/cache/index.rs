//! In-memory bookkeeping and size-bounded eviction.
//!
//! Entries live in a hash map keyed by identifier plus a second, ordered
//! index from write time to identifier. Both always hold the same set of
//! identifiers and `current_size` is always the sum of their sizes.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use super::ObjectId;

/// Bookkeeping for one stored object. The bytes themselves live on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub size: u64,
    pub written_at: DateTime<Utc>,
}

/// Position in eviction order. `seq` keeps equal timestamps in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OrderKey {
    written_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug)]
struct Slot {
    entry: CacheEntry,
    key: OrderKey,
}

/// Index plus eviction order, bounded by `max_size`.
#[derive(Debug)]
pub struct EvictionIndex {
    entries: HashMap<ObjectId, Slot>,
    order: BTreeMap<OrderKey, ObjectId>,
    current_size: u64,
    max_size: u64,
    next_seq: u64,
}

impl EvictionIndex {
    pub fn new(max_size: u64) -> Self {
        Self { entries: HashMap::new(), order: BTreeMap::new(), current_size: 0, max_size, next_seq: 0 }
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &ObjectId) -> Option<&CacheEntry> {
        self.entries.get(id).map(|slot| &slot.entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Add `entry` under `id`, superseding any previous entry for it.
    ///
    /// Oldest entries are evicted until the new one fits the budget; they are
    /// returned so the caller can delete their files. An entry larger than the
    /// whole budget empties the index and is still inserted.
    pub fn insert(&mut self, id: ObjectId, entry: CacheEntry) -> Vec<(ObjectId, CacheEntry)> {
        self.remove(&id);

        let mut evicted = Vec::new();
        while self.current_size + entry.size > self.max_size {
            match self.pop_oldest() {
                Some(victim) => evicted.push(victim),
                None => break,
            }
        }

        let key = OrderKey { written_at: entry.written_at, seq: self.next_seq };
        self.next_seq += 1;
        self.order.insert(key, id.clone());
        self.entries.insert(id, Slot { entry, key });
        self.current_size += entry.size;

        debug_assert_eq!(self.entries.len(), self.order.len());
        evicted
    }

    /// Forget `id`. Returns its entry, or None if it was not tracked.
    pub fn remove(&mut self, id: &ObjectId) -> Option<CacheEntry> {
        let slot = self.entries.remove(id)?;
        self.order.remove(&slot.key);
        self.current_size -= slot.entry.size;

        debug_assert_eq!(self.entries.len(), self.order.len());
        Some(slot.entry)
    }

    /// Evict oldest entries until `current_size <= max_size`, then adopt
    /// `max_size` as the budget for later inserts.
    pub fn set_max_size(&mut self, max_size: u64) -> Vec<(ObjectId, CacheEntry)> {
        let mut evicted = Vec::new();
        while self.current_size > max_size {
            match self.pop_oldest() {
                Some(victim) => evicted.push(victim),
                None => break,
            }
        }
        self.max_size = max_size;
        evicted
    }

    /// Entries from oldest to newest write.
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = (&ObjectId, &CacheEntry)> {
        self.order
            .values()
            .filter_map(|id| self.entries.get_key_value(id).map(|(id, slot)| (id, &slot.entry)))
    }

    fn pop_oldest(&mut self) -> Option<(ObjectId, CacheEntry)> {
        let (_, id) = self.order.pop_first()?;
        let slot = self.entries.remove(&id)?;
        self.current_size -= slot.entry.size;
        Some((id, slot.entry))
    }
}
