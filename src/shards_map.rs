use foldhash::fast::{FixedState, RandomState};
use std::borrow::Borrow;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::Mutex;

/// A thread-safe hashmap shard.
///
/// This struct wraps a `HashMap` protected by a `Mutex` to ensure thread
/// safety. The mutex is only ever held for a single map operation, never
/// across a blocking wait.
#[derive(Debug)]
pub struct ShardMap<K, V> {
    /// The underlying hashmap protected by a `Mutex`.
    map: Mutex<HashMap<K, V, RandomState>>,
}

impl<K, V> ShardMap<K, V>
where
    K: Eq + Hash,
{
    /// Creates a new `ShardMap` with the specified initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: Mutex::new(HashMap::with_capacity_and_hasher(
                capacity,
                RandomState::default(),
            )),
        }
    }

    pub fn len(&self) -> usize {
        self.map.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().unwrap().is_empty()
    }

    /// Inserts the value produced by `make` if the key is not present.
    ///
    /// Returns `true` if the value was inserted, `false` if the key was
    /// already occupied (in which case `make` is never called).
    pub fn insert_with<F>(&self, key: K, make: F) -> bool
    where
        F: FnOnce() -> V,
    {
        let mut map = self.map.lock().unwrap();
        match map.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(make());
                true
            }
        }
    }

    /// Returns a clone of the value associated with the given key.
    pub fn get_cloned<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: Clone,
    {
        self.map.lock().unwrap().get(key).cloned()
    }

    /// Removes the key and returns its value, if present.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.map.lock().unwrap().remove(key)
    }
}

/// A collection of `ShardMap` instances, providing sharded access to a
/// hashmap.
///
/// Keys are distributed over shards by a fixed-seed hash, so all operations
/// on one key contend only on that key's shard.
pub struct ShardsMap<K, V> {
    /// The vector of `ShardMap` instances.
    shards: Vec<ShardMap<K, V>>,
}

impl<K, V> ShardsMap<K, V>
where
    K: Eq + Hash,
{
    /// Creates a new `ShardsMap` with the specified capacity and number of
    /// shards.
    pub fn with_capacity_and_shard_amount(capacity: usize, shard_amount: usize) -> Self {
        let shard_capacity = capacity / shard_amount;
        Self {
            shards: (0..shard_amount)
                .map(|_| ShardMap::with_capacity(shard_capacity))
                .collect::<Vec<_>>(),
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.is_empty())
    }

    /// Inserts the value produced by `make` if the key is not present.
    ///
    /// Returns `true` if the value was inserted, `false` if the key was
    /// already occupied.
    pub fn insert_with<F>(&self, key: K, make: F) -> bool
    where
        F: FnOnce() -> V,
    {
        self.shard(&key).insert_with(key, make)
    }

    /// Returns a clone of the value associated with the given key.
    pub fn get_cloned<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: Clone,
    {
        self.shard(key).get_cloned(key)
    }

    /// Removes the key and returns its value, if present.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.shard(key).remove(key)
    }

    #[inline(always)]
    fn shard<Q>(&self, key: &Q) -> &ShardMap<K, V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let idx = FixedState::default().hash_one(key) as usize % self.shards.len();
        &self.shards[idx]
    }
}
