use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;

use seize::Collector;

use crate::list::{ListStrategy, LockFree};
use crate::raw::RawTable;
use crate::BuildError;

/// A concurrent hash set with a fixed number of buckets.
///
/// Buckets are [`LockFree`] lists by default: an item is stored under its hash, and inserting
/// an item whose hash is already present in its bucket fails. With
/// [`LockCoupled`](crate::LockCoupled) buckets, inserting an equal item replaces it instead.
///
/// # Examples
///
/// ```
/// use bucketed::HashSet;
///
/// let set = HashSet::new(16);
/// assert!(set.insert("test"));
/// assert!(!set.insert("test"));
/// assert!(set.contains("test"));
/// assert!(!set.contains("testy"));
/// ```
pub struct HashSet<T, L: ListStrategy = LockFree, S = RandomState> {
    raw: RawTable<T, L, S>,
}

/// A builder for a [`HashSet`].
///
/// # Examples
///
/// ```rust
/// use bucketed::{HashSet, LockCoupled};
/// use std::collections::hash_map::RandomState;
///
/// let set: HashSet<i32, LockCoupled> = HashSet::builder()
///     // Set the number of buckets.
///     .capacity(2048)
///     // Set the hasher.
///     .hasher(RandomState::new())
///     // Use lock-coupled buckets.
///     .strategy::<LockCoupled>()
///     // Construct the hash set.
///     .build()
///     .unwrap();
/// ```
pub struct HashSetBuilder<T, L = LockFree, S = RandomState> {
    hasher: S,
    capacity: usize,
    collector: Collector,
    _t: PhantomData<(T, L)>,
}

impl<T, L> HashSetBuilder<T, L> {
    /// Set the hash builder used to hash items.
    ///
    /// Warning: `hash_builder` is normally randomly generated, and is designed
    /// to allow sets to be resistant to attacks that cause many collisions
    /// and very poor performance. Setting it manually using this function can
    /// expose a DoS attack vector.
    pub fn hasher<S>(self, hasher: S) -> HashSetBuilder<T, L, S> {
        HashSetBuilder {
            hasher,
            capacity: self.capacity,
            collector: self.collector,
            _t: PhantomData,
        }
    }
}

impl<T, L, S> HashSetBuilder<T, L, S> {
    /// Set the number of buckets. It must be non-zero.
    pub fn capacity(self, capacity: usize) -> Self {
        HashSetBuilder { capacity, ..self }
    }

    /// Set the list implementation used for buckets. See [`ListStrategy`] for details.
    pub fn strategy<L2: ListStrategy>(self) -> HashSetBuilder<T, L2, S> {
        HashSetBuilder {
            hasher: self.hasher,
            capacity: self.capacity,
            collector: self.collector,
            _t: PhantomData,
        }
    }

    /// Set the [`seize::Collector`] used to reclaim removed items.
    pub fn collector(self, collector: Collector) -> Self {
        HashSetBuilder { collector, ..self }
    }
}

impl<T, L: ListStrategy, S> HashSetBuilder<T, L, S> {
    /// Construct a [`HashSet`] from the builder, using the configured options.
    pub fn build(self) -> Result<HashSet<T, L, S>, BuildError> {
        Ok(HashSet {
            raw: RawTable::new(self.capacity, self.hasher, self.collector)?,
        })
    }
}

impl<T, L, S> fmt::Debug for HashSetBuilder<T, L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashSetBuilder")
            .field("capacity", &self.capacity)
            .field("collector", &self.collector)
            .finish()
    }
}

impl<T> HashSet<T> {
    /// Creates an empty `HashSet` with `capacity` lock-free buckets.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Use [`HashSet::builder`] to handle this as an error.
    pub fn new(capacity: usize) -> HashSet<T> {
        HashSet::with_capacity_and_hasher(capacity, RandomState::new())
    }

    /// Returns a builder for a `HashSet`.
    pub fn builder() -> HashSetBuilder<T> {
        HashSetBuilder {
            capacity: 0,
            hasher: RandomState::default(),
            collector: Collector::new(),
            _t: PhantomData,
        }
    }
}

impl<T, L: ListStrategy, S> HashSet<T, L, S> {
    /// Creates an empty `HashSet` with `capacity` buckets, using `hasher` to hash items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> HashSet<T, L, S> {
        match RawTable::new(capacity, hasher, Collector::new()) {
            Ok(raw) => HashSet { raw },
            Err(err) => panic!("invalid set configuration: {err}"),
        }
    }

    /// Returns the number of items in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of buckets.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// Returns a reference to the set's [`BuildHasher`].
    #[inline]
    pub fn hasher(&self) -> &S {
        self.raw.hasher()
    }
}

impl<T, L, S> HashSet<T, L, S>
where
    T: Hash + Eq,
    L: ListStrategy,
    S: BuildHasher,
{
    /// Adds an item to the set, returning whether it was newly inserted.
    #[inline]
    pub fn insert(&self, item: T) -> bool {
        let hash = self.raw.hash(&item);
        self.raw.insert(hash, item).is_inserted()
    }

    /// Returns `true` if the set contains the item.
    #[inline]
    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.raw.hash(item);
        self.raw
            .find(hash, |x| x.borrow() == item, |_| ())
            .is_some()
    }

    /// Removes an item from the set, returning whether it was present.
    #[inline]
    pub fn remove<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.raw.hash(item);
        self.raw.remove(hash, |x| x.borrow() == item)
    }
}

impl<T, L: ListStrategy, S> fmt::Debug for HashSet<T, L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashSet")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
