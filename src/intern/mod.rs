//! Interning of symbols, methods and canonical stacks.
//!
//! Every table hands out dense, 1-based ids in first-seen order. Id 0 is
//! reserved to mean "absent" so it can be written into the payload without
//! colliding with a real entry. Because ids follow insertion order, iterating
//! a table in id order yields exactly the order its entries are written out.

pub mod method;

pub use method::{FrameType, Method};

use std::hash::{BuildHasherDefault, Hash};

pub type FxIndexSet<K> = indexmap::IndexSet<K, BuildHasherDefault<rustc_hash::FxHasher>>;
pub type FxIndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<rustc_hash::FxHasher>>;

/// Insertion-ordered deduplicating table with 1-based ids.
#[derive(Debug, Clone)]
pub struct Interner<K> {
    keys: FxIndexSet<K>,
}

impl<K> Default for Interner<K> {
    fn default() -> Self {
        Self {
            keys: FxIndexSet::default(),
        }
    }
}

impl<K: Hash + Eq> Interner<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id of `key`, assigning the next sequential id if it is new.
    ///
    /// # Panics
    /// Panics if more than `u32::MAX - 1` keys are interned.
    pub fn index(&mut self, key: K) -> u32 {
        let (offset, _) = self.keys.insert_full(key);
        id_from_offset(offset)
    }

    /// Look up the id of `key` without inserting it.
    pub fn lookup(&self, key: &K) -> Option<u32> {
        self.keys.get_index_of(key).map(id_from_offset)
    }

    /// Key stored under `id`, or `None` for 0 and unknown ids.
    pub fn get(&self, id: u32) -> Option<&K> {
        let offset = (id as usize).checked_sub(1)?;
        self.keys.get_index(offset)
    }

    /// Keys in id order: the n-th item has id `n + 1`.
    pub fn ordered_keys(&self) -> impl ExactSizeIterator<Item = &K> + '_ {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[inline]
fn id_from_offset(offset: usize) -> u32 {
    u32::try_from(offset)
        .ok()
        .and_then(|small| small.checked_add(1))
        .unwrap_or_else(|| panic!("interner overflow at offset {offset}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_index_is_idempotent() {
        let mut symbols = Interner::new();
        let a = symbols.index(b"main".to_vec());
        let b = symbols.index(b"run".to_vec());

        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(symbols.index(b"main".to_vec()), a);
        assert_eq!(symbols.len(), 2);
    }

    #[test]
    fn test_ordered_keys_follow_ids() {
        let mut symbols = Interner::new();
        for name in ["c", "a", "b", "a"] {
            symbols.index(name.to_string());
        }

        let keys: Vec<_> = symbols.ordered_keys().cloned().collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
        for (offset, key) in keys.iter().enumerate() {
            assert_eq!(symbols.get(offset as u32 + 1), Some(key));
        }
    }

    #[test]
    fn test_zero_is_never_an_id() {
        let mut symbols = Interner::new();
        symbols.index(42u64);
        assert_eq!(symbols.get(0), None);
        assert_eq!(symbols.get(2), None);
        assert_eq!(symbols.lookup(&7), None);
    }

    proptest! {
        #[test]
        fn proptest_ids_are_dense(values in proptest::collection::vec(any::<u16>(), 0..256)) {
            let mut table = Interner::new();
            let mut distinct = HashSet::new();
            for v in &values {
                let id = table.index(*v);
                prop_assert_eq!(table.index(*v), id);
                distinct.insert(*v);
            }

            prop_assert_eq!(table.len(), distinct.len());
            let ids: HashSet<u32> = distinct.iter().map(|v| table.lookup(v).unwrap()).collect();
            let expected: HashSet<u32> = (1..=distinct.len() as u32).collect();
            prop_assert_eq!(ids, expected);
        }
    }
}
