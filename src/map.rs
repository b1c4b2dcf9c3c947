use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;

use seize::Collector;

use crate::list::{InsertStatus, ListStrategy, LockCoupled};
use crate::raw::RawTable;
use crate::BuildError;

/// A concurrent hash map with a fixed number of buckets.
///
/// Every bucket is an independent concurrent list, chosen by the strategy parameter `L`:
///
/// - [`LockCoupled`] (the default): inserting an existing key overwrites its value and returns
///   [`InsertStatus::Replaced`].
/// - [`LockFree`](crate::LockFree): inserting a key whose hash is already present in its bucket
///   leaves the map unchanged and returns [`InsertStatus::Rejected`].
///
/// The map never resizes. A key's bucket is its hash modulo [`capacity`](HashMap::capacity),
/// so performance degrades gracefully as buckets grow longer, but the capacity should be
/// chosen with the expected number of entries in mind.
///
/// # Examples
///
/// ```
/// use bucketed::{HashMap, InsertStatus};
///
/// let map = HashMap::new(16);
/// assert_eq!(map.insert("a", 1), InsertStatus::Inserted);
/// assert_eq!(map.insert("a", 2), InsertStatus::Replaced);
/// assert_eq!(map.get("a"), Some(2));
///
/// assert!(map.remove("a"));
/// assert!(!map.contains_key("a"));
/// ```
pub struct HashMap<K, V, L: ListStrategy = LockCoupled, S = RandomState> {
    raw: RawTable<Entry<K, V>, L, S>,
}

// An entry in a bucket. Entries are equal when their keys are.
pub(crate) struct Entry<K, V> {
    key: K,
    value: V,
}

impl<K: PartialEq, V> PartialEq for Entry<K, V> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

/// A builder for a [`HashMap`].
///
/// # Examples
///
/// ```rust
/// use bucketed::{HashMap, LockFree};
/// use seize::Collector;
/// use std::collections::hash_map::RandomState;
///
/// let map: HashMap<i32, i32, LockFree> = HashMap::builder()
///     // Set the number of buckets.
///     .capacity(2048)
///     // Set the hasher.
///     .hasher(RandomState::new())
///     // Use lock-free buckets.
///     .strategy::<LockFree>()
///     // Set a custom garbage collector.
///     .collector(Collector::new().batch_size(128))
///     // Construct the hash map.
///     .build()
///     .unwrap();
/// ```
pub struct HashMapBuilder<K, V, L = LockCoupled, S = RandomState> {
    hasher: S,
    capacity: usize,
    collector: Collector,
    _kv: PhantomData<(K, V, L)>,
}

impl<K, V, L> HashMapBuilder<K, V, L> {
    /// Set the hash builder used to hash keys.
    ///
    /// Warning: `hash_builder` is normally randomly generated, and is designed
    /// to allow maps to be resistant to attacks that cause many collisions
    /// and very poor performance. Setting it manually using this function can
    /// expose a DoS attack vector.
    pub fn hasher<S>(self, hasher: S) -> HashMapBuilder<K, V, L, S> {
        HashMapBuilder {
            hasher,
            capacity: self.capacity,
            collector: self.collector,
            _kv: PhantomData,
        }
    }
}

impl<K, V, L, S> HashMapBuilder<K, V, L, S> {
    /// Set the number of buckets.
    ///
    /// The map never resizes, so this is fixed for the lifetime of the map. It must be
    /// non-zero.
    pub fn capacity(self, capacity: usize) -> Self {
        HashMapBuilder { capacity, ..self }
    }

    /// Set the list implementation used for buckets. See [`ListStrategy`] for details.
    pub fn strategy<L2: ListStrategy>(self) -> HashMapBuilder<K, V, L2, S> {
        HashMapBuilder {
            hasher: self.hasher,
            capacity: self.capacity,
            collector: self.collector,
            _kv: PhantomData,
        }
    }

    /// Set the [`seize::Collector`] used to reclaim removed entries.
    ///
    /// Only lock-free buckets defer reclamation; lock-coupled buckets free entries as soon as
    /// they are unlinked and ignore the collector.
    pub fn collector(self, collector: Collector) -> Self {
        HashMapBuilder { collector, ..self }
    }
}

impl<K, V, L: ListStrategy, S> HashMapBuilder<K, V, L, S> {
    /// Construct a [`HashMap`] from the builder, using the configured options.
    ///
    /// Returns [`BuildError::ZeroCapacity`] if no capacity was configured.
    pub fn build(self) -> Result<HashMap<K, V, L, S>, BuildError> {
        Ok(HashMap {
            raw: RawTable::new(self.capacity, self.hasher, self.collector)?,
        })
    }
}

impl<K, V, L, S> fmt::Debug for HashMapBuilder<K, V, L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashMapBuilder")
            .field("capacity", &self.capacity)
            .field("collector", &self.collector)
            .finish()
    }
}

impl<K, V> HashMap<K, V> {
    /// Creates an empty `HashMap` with `capacity` lock-coupled buckets.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Use [`HashMap::builder`] to handle this as an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use bucketed::HashMap;
    /// let map: HashMap<&str, i32> = HashMap::new(10);
    /// ```
    pub fn new(capacity: usize) -> HashMap<K, V> {
        HashMap::with_capacity_and_hasher(capacity, RandomState::new())
    }

    /// Returns a builder for a `HashMap`.
    ///
    /// The builder can be used for more complex configuration, such as choosing the bucket
    /// strategy or using a custom [`Collector`].
    pub fn builder() -> HashMapBuilder<K, V> {
        HashMapBuilder {
            capacity: 0,
            hasher: RandomState::default(),
            collector: Collector::new(),
            _kv: PhantomData,
        }
    }
}

impl<K, V, L: ListStrategy, S> HashMap<K, V, L, S> {
    /// Creates an empty `HashMap` with `capacity` buckets, using `hasher` to hash keys.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> HashMap<K, V, L, S> {
        match RawTable::new(capacity, hasher, Collector::new()) {
            Ok(raw) => HashMap { raw },
            Err(err) => panic!("invalid map configuration: {err}"),
        }
    }

    /// Returns the number of entries in the map.
    ///
    /// The value may be stale under concurrent modification.
    ///
    /// # Examples
    ///
    /// ```
    /// use bucketed::HashMap;
    ///
    /// let map = HashMap::new(4);
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    /// assert!(map.len() == 2);
    /// ```
    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the map is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of buckets.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// Returns a reference to the map's [`BuildHasher`].
    #[inline]
    pub fn hasher(&self) -> &S {
        self.raw.hasher()
    }
}

impl<K, V, L, S> HashMap<K, V, L, S>
where
    K: Hash + Eq,
    L: ListStrategy,
    S: BuildHasher,
{
    /// Inserts a key-value pair into the map.
    ///
    /// The outcome for a key that is already present depends on the bucket strategy, see
    /// [`HashMap`].
    ///
    /// # Examples
    ///
    /// ```
    /// use bucketed::{HashMap, InsertStatus, LockFree};
    ///
    /// let map: HashMap<_, _, LockFree> = HashMap::builder()
    ///     .capacity(8)
    ///     .strategy::<LockFree>()
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(map.insert(37, "a"), InsertStatus::Inserted);
    /// assert_eq!(map.insert(37, "b"), InsertStatus::Rejected);
    /// assert_eq!(map.get(&37), Some("a"));
    /// ```
    #[inline]
    pub fn insert(&self, key: K, value: V) -> InsertStatus {
        let hash = self.raw.hash(&key);
        self.insert_hashed(hash, key, value)
    }

    // Inserts a key-value pair whose hash is already known.
    #[inline]
    pub(crate) fn insert_hashed(&self, hash: u64, key: K, value: V) -> InsertStatus {
        self.raw.insert(hash, Entry { key, value })
    }

    #[inline]
    pub(crate) fn hash<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        self.raw.hash(key)
    }

    /// Returns a copy of the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but [`Hash`] and [`Eq`] on the
    /// borrowed form *must* match those for the key type.
    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.get_with(key, V::clone)
    }

    /// Calls `f` with a reference to the value corresponding to the key.
    ///
    /// With lock-coupled buckets the entry stays locked while `f` runs, so `f` must not access
    /// the same map.
    ///
    /// # Examples
    ///
    /// ```
    /// use bucketed::HashMap;
    ///
    /// let map = HashMap::new(4);
    /// map.insert("a", vec![1, 2, 3]);
    /// assert_eq!(map.get_with("a", Vec::len), Some(3));
    /// assert_eq!(map.get_with("b", Vec::len), None);
    /// ```
    #[inline]
    pub fn get_with<Q, R>(&self, key: &Q, f: impl FnOnce(&V) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.raw.hash(key);
        self.raw.find(
            hash,
            |entry| entry.key.borrow() == key,
            |entry| f(&entry.value),
        )
    }

    /// Returns `true` if the map contains a value for the specified key.
    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_with(key, |_| ()).is_some()
    }

    /// Removes a key from the map, returning whether it was present.
    ///
    /// # Examples
    ///
    /// ```
    /// use bucketed::HashMap;
    ///
    /// let map = HashMap::new(4);
    /// map.insert(1, "a");
    /// assert!(map.remove(&1));
    /// assert!(!map.remove(&1));
    /// ```
    #[inline]
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.raw.hash(key);
        self.raw.remove(hash, |entry| entry.key.borrow() == key)
    }
}

impl<K, V, L: ListStrategy, S> fmt::Debug for HashMap<K, V, L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashMap")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
