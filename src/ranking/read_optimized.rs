//! Read-optimized ranked map
//!
//! Two parallel rank-ordered sequences kept sorted on every write via
//! binary-search insert and delete. Reads are index lookups.

use super::RankedMap;

#[derive(Debug)]
pub struct ReadEfficientRankedMap<K, V> {
    keys: Vec<K>,
    values: Vec<V>,
    reversed: bool,
}

impl<K, V> ReadEfficientRankedMap<K, V>
where
    K: PartialEq + Copy,
    V: PartialOrd + Copy,
{
    pub fn new(reversed: bool) -> Self {
        ReadEfficientRankedMap {
            keys: Vec::new(),
            values: Vec::new(),
            reversed,
        }
    }

    fn rank_to_index(&self, rank: usize) -> usize {
        if self.reversed {
            self.keys.len() - 1 - rank
        } else {
            rank
        }
    }
}

impl<K, V> RankedMap<K, V> for ReadEfficientRankedMap<K, V>
where
    K: PartialEq + Copy,
    V: PartialOrd + Copy,
{
    fn insert(&mut self, key: K, value: V) {
        self.remove(&key);

        let index = self.values.partition_point(|v| *v < value);
        self.keys.insert(index, key);
        self.values.insert(index, value);
    }

    fn remove(&mut self, key: &K) {
        if let Some(index) = self.keys.iter().position(|k| k == key) {
            self.keys.remove(index);
            self.values.remove(index);
        }
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn get(&mut self, rank: usize) -> Option<(K, V)> {
        if rank >= self.keys.len() {
            return None;
        }

        let index = self.rank_to_index(rank);
        Some((self.keys[index], self.values[index]))
    }

    fn position(&mut self, key: &K) -> Option<usize> {
        let index = self.keys.iter().position(|k| k == key)?;
        Some(self.rank_to_index(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_insert_and_get() {
        let mut map = ReadEfficientRankedMap::new(false);
        map.insert(10u64, 3.0f32);
        map.insert(20, 1.0);
        map.insert(30, 2.0);

        assert_eq!(map.get(0), Some((20, 1.0)));
        assert_eq!(map.get(1), Some((30, 2.0)));
        assert_eq!(map.get(2), Some((10, 3.0)));
    }

    #[test]
    fn test_reinsert_moves_key() {
        let mut map = ReadEfficientRankedMap::new(false);
        map.insert(1u64, 1.0f32);
        map.insert(2, 2.0);

        map.insert(1, 5.0);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(1), Some((1, 5.0)));
    }

    #[test]
    fn test_reversed_get_and_position() {
        let mut map = ReadEfficientRankedMap::new(true);
        map.insert(1u64, 0.5f32);
        map.insert(2, 2.0);
        map.insert(3, 1.0);

        assert_eq!(map.get(0), Some((2, 2.0)));
        assert_eq!(map.position(&2), Some(0));
        assert_eq!(map.position(&1), Some(2));
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut map = ReadEfficientRankedMap::new(false);
        map.insert(1u64, 1.0f32);
        map.remove(&99);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_out_of_range_get() {
        let mut map: ReadEfficientRankedMap<u64, f32> = ReadEfficientRankedMap::new(false);
        assert_eq!(map.get(0), None);
    }
}
