//! Sequential ids for the values seen under each key.

use std::hash::Hash;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
struct Slot<V> {
    ids: FxHashMap<V, usize>,
    last: V,
}

/// Maps `key → {value → id}` and remembers the last value inserted per key.
///
/// Ids count up from 0 independently per key. All state sits behind one
/// mutex, so workers may insert concurrently; cloning snapshots under the
/// lock.
#[derive(Debug)]
pub struct ForallIndex<K, V> {
    slots: Mutex<FxHashMap<K, Slot<V>>>,
}

impl<K, V> Default for ForallIndex<K, V> {
    fn default() -> Self {
        ForallIndex {
            slots: Mutex::new(FxHashMap::default()),
        }
    }
}

impl<K: Clone, V: Clone> Clone for ForallIndex<K, V> {
    fn clone(&self) -> Self {
        ForallIndex {
            slots: Mutex::new(self.slots.lock().clone()),
        }
    }
}

impl<K, V> ForallIndex<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        ForallIndex::default()
    }

    /// Record `value` under `key` and make it the key's last value.
    ///
    /// Returns the value's id together with the last value before this
    /// call for a fresh value, or the value itself for one seen before.
    /// The first value of a key has no predecessor.
    pub fn insert(&self, key: K, value: V) -> (usize, Option<V>) {
        let mut slots = self.slots.lock();
        match slots.get_mut(&key) {
            None => {
                let mut ids = FxHashMap::default();
                ids.insert(value.clone(), 0);
                slots.insert(key, Slot { ids, last: value });
                (0, None)
            }
            Some(slot) => {
                if let Some(&id) = slot.ids.get(&value) {
                    slot.last = value.clone();
                    return (id, Some(value));
                }
                let id = slot.ids.len();
                slot.ids.insert(value.clone(), id);
                let previous = std::mem::replace(&mut slot.last, value);
                (id, Some(previous))
            }
        }
    }

    /// Id of `value` under `key`, if recorded.
    pub fn id_of(&self, key: &K, value: &V) -> Option<usize> {
        self.slots.lock().get(key)?.ids.get(value).copied()
    }

    pub fn last(&self, key: &K) -> Option<V> {
        self.slots.lock().get(key).map(|slot| slot.last.clone())
    }

    /// Number of distinct values recorded under `key`.
    pub fn count(&self, key: &K) -> usize {
        self.slots.lock().get(key).map_or(0, |slot| slot.ids.len())
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_ids_and_last_values() {
        let index: ForallIndex<u32, &str> = ForallIndex::new();
        assert_eq!(index.insert(1, "a"), (0, None));
        assert_eq!(index.insert(1, "b"), (1, Some("a")));
        assert_eq!(index.insert(1, "a"), (0, Some("a")));
        assert_eq!(index.last(&1), Some("a"));
        assert_eq!(index.insert(2, "a"), (0, None));
        assert_eq!(index.count(&1), 2);
    }

    #[test]
    fn test_clone_is_independent() {
        let index: ForallIndex<u32, u32> = ForallIndex::new();
        index.insert(0, 10);
        let copy = index.clone();
        index.insert(0, 11);
        assert_eq!(copy.count(&0), 1);
        assert_eq!(index.count(&0), 2);
    }

    #[test]
    fn test_concurrent_inserts_assign_dense_ids() {
        let index = Arc::new(ForallIndex::<u32, u32>::new());
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let index = Arc::clone(&index);
                thread::spawn(move || {
                    for v in 0..50 {
                        index.insert(0, worker * 50 + v);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(index.count(&0), 200);
        let mut ids: Vec<usize> = (0..200).filter_map(|v| index.id_of(&0, &v)).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..200).collect::<Vec<_>>());
    }
}
