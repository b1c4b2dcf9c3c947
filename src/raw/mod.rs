mod counter;

use std::fmt;
use std::hash::{BuildHasher, Hash};

use seize::Collector;

use self::counter::Counter;
use crate::cfg::trace;
use crate::list::{InsertStatus, ListStrategy};
use crate::BuildError;

// A fixed-capacity table of buckets, each a concurrent list of `T`.
//
// The table never resizes. An item lives in the bucket at `hash % capacity` for its entire
// lifetime, and no operation ever touches more than one bucket.
pub struct RawTable<T, L: ListStrategy, S> {
    buckets: Box<[L::List<T>]>,
    // Must be dropped after the buckets, which may retire nodes into it.
    shared: L::Shared,
    hasher: S,
    count: Counter,
}

// Safety: Both bucket lists are `Send` for `T: Send` and `Sync` for `T: Send + Sync`, and the
// shared state is either `()` or a `Collector`. The strategy trait is sealed.
unsafe impl<T: Send, L: ListStrategy, S: Send> Send for RawTable<T, L, S> {}
unsafe impl<T: Send + Sync, L: ListStrategy, S: Sync> Sync for RawTable<T, L, S> {}

impl<T, L: ListStrategy, S> RawTable<T, L, S> {
    pub fn new(capacity: usize, hasher: S, collector: Collector) -> Result<Self, BuildError> {
        if capacity == 0 {
            return Err(BuildError::ZeroCapacity);
        }

        trace!("allocating table with {} buckets", capacity);

        Ok(RawTable {
            buckets: (0..capacity).map(|_| L::list()).collect(),
            shared: L::shared(collector),
            hasher,
            count: Counter::default(),
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count.sum()
    }

    #[inline]
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    // Returns the bucket responsible for `hash`.
    #[inline]
    fn bucket(&self, hash: u64) -> &L::List<T> {
        let index = hash % self.buckets.len() as u64;
        &self.buckets[index as usize]
    }

    // Inserts `item` into its bucket.
    #[inline]
    pub fn insert(&self, hash: u64, item: T) -> InsertStatus
    where
        T: PartialEq,
    {
        let status = L::insert(self.bucket(hash), &self.shared, hash, item);
        if status.is_inserted() {
            self.count.add(1);
        }
        status
    }

    // Calls `f` on the item in `hash`'s bucket matching `eq`.
    #[inline]
    pub fn find<R>(
        &self,
        hash: u64,
        eq: impl Fn(&T) -> bool,
        f: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        L::find(self.bucket(hash), &self.shared, hash, eq, f)
    }

    // Removes the item in `hash`'s bucket matching `eq`.
    #[inline]
    pub fn remove(&self, hash: u64, eq: impl Fn(&T) -> bool) -> bool {
        let removed = L::remove(self.bucket(hash), &self.shared, hash, eq);
        if removed {
            self.count.add(-1);
        }
        removed
    }
}

impl<T, L: ListStrategy, S: BuildHasher> RawTable<T, L, S> {
    #[inline]
    pub fn hash<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        self.hasher.hash_one(key)
    }
}

impl<T, L: ListStrategy, S> fmt::Debug for RawTable<T, L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawTable")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{LockCoupled, LockFree};
    use std::collections::hash_map::RandomState;

    fn collisions<L: ListStrategy>() {
        let table = RawTable::<u64, L, _>::new(4, RandomState::new(), Collector::new()).unwrap();

        // Every hash lands in bucket 1.
        for x in 0..8 {
            assert!(table.insert(1 + 4 * x, x).is_inserted());
        }
        assert_eq!(table.len(), 8);

        for x in 0..8 {
            let found = table.find(1 + 4 * x, |&y| y == x, |&y| y);
            assert_eq!(found, Some(x));
        }

        assert!(table.remove(1 + 4 * 3, |&y| y == 3));
        assert!(!table.remove(1 + 4 * 3, |&y| y == 3));
        assert_eq!(table.find(1 + 4 * 3, |&y| y == 3, |_| ()), None);
        assert_eq!(table.len(), 7);
    }

    #[test]
    fn collisions_coupled() {
        collisions::<LockCoupled>();
    }

    #[test]
    fn collisions_lock_free() {
        collisions::<LockFree>();
    }

    #[test]
    fn zero_capacity() {
        let table = RawTable::<u64, LockCoupled, _>::new(0, RandomState::new(), Collector::new());
        assert!(matches!(table, Err(BuildError::ZeroCapacity)));
    }
}
