use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

struct Slot<V> {
    value: V,
    tick: u64,
}

/// Fixed-capacity cache with least-recently-used eviction
///
/// Every `get` hit and every `put` marks the key as most recently used.
/// When an insertion pushes the size past the capacity, the entry that was
/// accessed longest ago is evicted.
///
/// Not synchronized: callers sharing a cache between threads wrap it in a
/// single lock.
pub struct LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    entries: HashMap<K, Slot<V>>,
    /// Access order, oldest tick first
    order: BTreeMap<u64, K>,
    next_tick: u64,
    capacity: usize,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Creates an empty cache holding at most `capacity` entries
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity.min(1024)),
            order: BTreeMap::new(),
            next_tick: 0,
            capacity,
        }
    }

    /// Looks up a key and marks it most recently used on a hit
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let tick = self.bump();
        let slot = self.entries.get_mut(key)?;
        self.order.remove(&slot.tick);
        slot.tick = tick;
        self.order.insert(tick, key.clone());
        Some(&slot.value)
    }

    /// Looks up a key without touching the access order
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    /// Inserts or overwrites a value, evicting the least recently used entry if full
    ///
    /// Returns the evicted key, if any.
    pub fn put(&mut self, key: K, value: V) -> Option<K> {
        let tick = self.bump();
        if let Some(old) = self.entries.insert(key.clone(), Slot { value, tick }) {
            self.order.remove(&old.tick);
        }
        self.order.insert(tick, key);

        if self.entries.len() > self.capacity {
            return self.evict_lru();
        }
        None
    }

    /// Removes a key; absent keys are ignored
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.tick);
        Some(slot.value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn evict_lru(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }

    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }
}
