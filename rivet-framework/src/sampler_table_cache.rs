use fnv::{FnvHashMap, FnvHasher};
use rivet_api::{RivetDescriptorTable, RivetSamplerId, MAX_SAMPLER_SLOTS};
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

/// Key for an interned sampler table. The id array is a fixed size and zero-padded past `count`
/// so the whole struct hashes without looking at `count` first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SamplerTableKey {
    pub count: u8,
    pub sampler_ids: [RivetSamplerId; MAX_SAMPLER_SLOTS],
}

impl SamplerTableKey {
    /// Build a key from the populated prefix of a sampler slot array. Unpopulated slots within
    /// the prefix fall back to the default sampler, matching the descriptors actually written.
    pub fn from_slots(slots: &[Option<RivetSamplerId>]) -> Self {
        debug_assert!(slots.len() <= MAX_SAMPLER_SLOTS);
        let mut sampler_ids = [RivetSamplerId(0); MAX_SAMPLER_SLOTS];
        for (i, slot) in slots.iter().enumerate() {
            sampler_ids[i] = slot.unwrap_or(RivetSamplerId::DEFAULT);
        }

        SamplerTableKey {
            count: slots.len() as u8,
            sampler_ids,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct SamplerTableHash(u64);

impl SamplerTableHash {
    fn from_key(key: &SamplerTableKey) -> SamplerTableHash {
        let mut hasher = FnvHasher::default();
        key.hash(&mut hasher);
        SamplerTableHash(hasher.finish())
    }
}

#[derive(Default)]
struct SamplerTableCacheInner {
    tables: FnvHashMap<SamplerTableHash, RivetDescriptorTable>,
    #[cfg(debug_assertions)]
    keys: FnvHashMap<SamplerTableHash, SamplerTableKey>,
    hit_count: u64,
    miss_count: u64,
}

/// Interns descriptor tables for sampler sets. Sampler combinations repeat heavily from draw to
/// draw, so identical sequences share one table in the backing pool instead of consuming fresh
/// slots per draw. Entries are stamped with the pool generation they were written under and are
/// never returned once the pool rolls past that generation, the rollover invalidates the whole
/// cache in O(1) without walking it.
pub struct SamplerTableCache {
    inner: Mutex<SamplerTableCacheInner>,
}

#[derive(Debug)]
pub struct SamplerTableCacheMetrics {
    pub entry_count: usize,
    pub hit_count: u64,
    pub miss_count: u64,
}

impl SamplerTableCache {
    pub fn new() -> Self {
        SamplerTableCache {
            inner: Mutex::new(Default::default()),
        }
    }

    /// Look up an interned table, ignoring entries staler than `pool_generation`. Stale entries
    /// found on the way are evicted.
    pub fn find(
        &self,
        key: &SamplerTableKey,
        pool_generation: u64,
    ) -> Option<RivetDescriptorTable> {
        let hash = SamplerTableHash::from_key(key);
        let mut guard = self.inner.lock().unwrap();

        if let Some(&table) = guard.tables.get(&hash) {
            if table.generation == pool_generation {
                #[cfg(debug_assertions)]
                debug_assert!(guard.keys.get(&hash).unwrap() == key);

                guard.hit_count += 1;
                return Some(table);
            }

            guard.tables.remove(&hash);
            #[cfg(debug_assertions)]
            guard.keys.remove(&hash);
        }

        guard.miss_count += 1;
        None
    }

    pub fn insert(
        &self,
        key: &SamplerTableKey,
        table: RivetDescriptorTable,
    ) {
        let hash = SamplerTableHash::from_key(key);
        let mut guard = self.inner.lock().unwrap();
        log::trace!(
            "intern sampler table count={} generation={} first_slot={}",
            key.count,
            table.generation,
            table.first_slot
        );
        guard.tables.insert(hash, table);
        #[cfg(debug_assertions)]
        guard.keys.insert(hash, *key);
    }

    pub fn metrics(&self) -> SamplerTableCacheMetrics {
        let guard = self.inner.lock().unwrap();
        SamplerTableCacheMetrics {
            entry_count: guard.tables.len(),
            hit_count: guard.hit_count,
            miss_count: guard.miss_count,
        }
    }
}

impl Default for SamplerTableCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(
        generation: u64,
        first_slot: u32,
        count: u32,
    ) -> RivetDescriptorTable {
        RivetDescriptorTable {
            generation,
            first_slot,
            count,
        }
    }

    #[test]
    fn identical_slot_sequences_share_a_key() {
        let a = SamplerTableKey::from_slots(&[Some(RivetSamplerId(1)), Some(RivetSamplerId(2))]);
        let b = SamplerTableKey::from_slots(&[Some(RivetSamplerId(1)), Some(RivetSamplerId(2))]);
        assert_eq!(a, b);

        // An unpopulated slot and the default sampler produce the same descriptors, so they
        // intern to the same key
        let c = SamplerTableKey::from_slots(&[None, Some(RivetSamplerId(2))]);
        let d = SamplerTableKey::from_slots(&[Some(RivetSamplerId::DEFAULT), Some(RivetSamplerId(2))]);
        assert_eq!(c, d);
        assert_ne!(a, c);
    }

    #[test]
    fn prefix_length_is_part_of_the_key() {
        let a = SamplerTableKey::from_slots(&[Some(RivetSamplerId(1))]);
        let b = SamplerTableKey::from_slots(&[Some(RivetSamplerId(1)), None]);
        assert_ne!(a, b);
    }

    #[test]
    fn find_hits_current_generation() {
        let cache = SamplerTableCache::new();
        let key = SamplerTableKey::from_slots(&[Some(RivetSamplerId(5))]);

        assert!(cache.find(&key, 0).is_none());
        cache.insert(&key, table(0, 16, 1));
        assert_eq!(cache.find(&key, 0), Some(table(0, 16, 1)));

        let metrics = cache.metrics();
        assert_eq!(metrics.entry_count, 1);
        assert_eq!(metrics.hit_count, 1);
        assert_eq!(metrics.miss_count, 1);
    }

    #[test]
    fn stale_entries_are_not_returned_after_rollover() {
        let cache = SamplerTableCache::new();
        let key = SamplerTableKey::from_slots(&[Some(RivetSamplerId(5))]);
        cache.insert(&key, table(0, 16, 1));

        // The pool rolled over to generation 1, the interned table's slots may be reused
        assert!(cache.find(&key, 1).is_none());
        // The stale entry was evicted
        assert_eq!(cache.metrics().entry_count, 0);

        cache.insert(&key, table(1, 0, 1));
        assert_eq!(cache.find(&key, 1), Some(table(1, 0, 1)));
    }
}
