//! Write-optimized ranked map
//!
//! Backing hash map with a lazily rebuilt sorted cache. Mutations are O(1)
//! amortized and only mark the cache dirty; the next read pays one
//! O(n log n) resort.

use super::RankedMap;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::hash::Hash;

#[derive(Debug)]
pub struct WriteEfficientRankedMap<K, V> {
    store: FxHashMap<K, V>,
    reversed: bool,
    cache_keys: Vec<K>,
    cache_values: Vec<V>,
    cache_fresh: bool,
}

impl<K, V> WriteEfficientRankedMap<K, V>
where
    K: Eq + Hash + Copy,
    V: PartialOrd + Copy,
{
    pub fn new(reversed: bool) -> Self {
        WriteEfficientRankedMap {
            store: FxHashMap::default(),
            reversed,
            cache_keys: Vec::new(),
            cache_values: Vec::new(),
            cache_fresh: false,
        }
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.cache_fresh = false;
    }

    fn rebuild_cache(&mut self) {
        let mut pairs: Vec<(K, V)> = self.store.iter().map(|(&k, &v)| (k, v)).collect();
        pairs.sort_unstable_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

        self.cache_keys = pairs.iter().map(|&(k, _)| k).collect();
        self.cache_values = pairs.iter().map(|&(_, v)| v).collect();
        self.cache_fresh = true;
    }

    fn rank_to_index(&self, rank: usize) -> usize {
        if self.reversed {
            self.store.len() - 1 - rank
        } else {
            rank
        }
    }
}

impl<K, V> RankedMap<K, V> for WriteEfficientRankedMap<K, V>
where
    K: Eq + Hash + Copy,
    V: PartialOrd + Copy,
{
    fn insert(&mut self, key: K, value: V) {
        self.store.insert(key, value);
        self.cache_fresh = false;
    }

    fn remove(&mut self, key: &K) {
        self.store.remove(key);
        self.cache_fresh = false;
    }

    fn len(&self) -> usize {
        self.store.len()
    }

    fn get(&mut self, rank: usize) -> Option<(K, V)> {
        if rank >= self.store.len() {
            return None;
        }

        if !self.cache_fresh {
            self.rebuild_cache();
        }

        let index = self.rank_to_index(rank);
        Some((self.cache_keys[index], self.cache_values[index]))
    }

    fn position(&mut self, key: &K) -> Option<usize> {
        if !self.cache_fresh {
            self.rebuild_cache();
        }

        let index = self.cache_keys.iter().position(|k| k == key)?;
        Some(self.rank_to_index(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_ranked_get() {
        let mut map = WriteEfficientRankedMap::new(false);
        map.insert(1u64, 0.5f32);
        map.insert(2, 2.0);
        map.insert(3, 1.0);

        assert_eq!(map.len(), 3);
        assert_eq!(map.get(0), Some((1, 0.5)));
        assert_eq!(map.get(1), Some((3, 1.0)));
        assert_eq!(map.get(2), Some((2, 2.0)));
        assert_eq!(map.get(3), None);
    }

    #[test]
    fn test_reversed_puts_highest_first() {
        let mut map = WriteEfficientRankedMap::new(true);
        map.insert(1u64, 0.5f32);
        map.insert(2, 2.0);
        map.insert(3, 1.0);

        assert_eq!(map.get(0), Some((2, 2.0)));
        assert_eq!(map.get(2), Some((1, 0.5)));
    }

    #[test]
    fn test_update_invalidates_cache() {
        let mut map = WriteEfficientRankedMap::new(true);
        map.insert(1u64, 1.0f32);
        map.insert(2, 2.0);
        assert_eq!(map.get(0), Some((2, 2.0)));

        map.insert(1, 3.0);
        assert_eq!(map.get(0), Some((1, 3.0)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_remove() {
        let mut map = WriteEfficientRankedMap::new(false);
        map.insert(1u64, 1.0f32);
        map.insert(2, 2.0);
        map.remove(&1);

        assert_eq!(map.len(), 1);
        assert_eq!(map.get(0), Some((2, 2.0)));
        assert_eq!(map.position(&1), None);
    }

    #[test]
    fn test_position_follows_rank_order() {
        let mut map = WriteEfficientRankedMap::new(true);
        map.insert(1u64, 0.5f32);
        map.insert(2, 2.0);
        map.insert(3, 1.0);

        assert_eq!(map.position(&2), Some(0));
        assert_eq!(map.position(&3), Some(1));
        assert_eq!(map.position(&1), Some(2));
    }
}
