//! Concurrent singly-linked lists, usable on their own or as hash table buckets.
//!
//! Two strategies are provided:
//!
//! - [`LockCoupled`]: every node carries a mutex and traversals lock hand-over-hand, holding at
//!   most two adjacent locks. Inserting an item equal to an existing one overwrites it in place.
//! - [`LockFree`]: nodes are ordered by the hash of their item and linked through
//!   [`MarkableReference`](crate::MarkableReference)s. Removal marks a node before unlinking it
//!   and unlinked nodes are reclaimed through a [`seize::Collector`]. Inserting an item whose
//!   hash is already present is rejected.
//!
//! A table built on either strategy inherits its list's insertion contract unchanged.

pub(crate) mod coupled;
pub(crate) mod sorted;

pub use coupled::LockCoupledList;
pub use sorted::{LockFreeList, LockFreeListRef};

use seize::Collector;

/// The outcome of an insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertStatus {
    /// The item was not present and has been inserted.
    Inserted,

    /// An equal item was present and has been overwritten.
    Replaced,

    /// An item with the same hash was present; nothing was written.
    Rejected,
}

impl InsertStatus {
    /// Returns `true` if a new item was added.
    #[inline]
    pub fn is_inserted(self) -> bool {
        self == InsertStatus::Inserted
    }
}

/// Hand-over-hand locked buckets. See the [module documentation](self).
#[derive(Debug, Clone, Copy, Default)]
pub struct LockCoupled;

/// Lock-free sorted buckets. See the [module documentation](self).
#[derive(Debug, Clone, Copy, Default)]
pub struct LockFree;

/// The list implementation backing every bucket of a table.
///
/// This trait is sealed and implemented by [`LockCoupled`] and [`LockFree`].
pub trait ListStrategy: sealed::Sealed + 'static {
    #[doc(hidden)]
    type List<T>;

    #[doc(hidden)]
    type Shared;

    #[doc(hidden)]
    fn shared(collector: Collector) -> Self::Shared;

    #[doc(hidden)]
    fn list<T>() -> Self::List<T>;

    #[doc(hidden)]
    fn insert<T: PartialEq>(
        list: &Self::List<T>,
        shared: &Self::Shared,
        hash: u64,
        item: T,
    ) -> InsertStatus;

    #[doc(hidden)]
    fn find<T, R>(
        list: &Self::List<T>,
        shared: &Self::Shared,
        hash: u64,
        eq: impl Fn(&T) -> bool,
        f: impl FnOnce(&T) -> R,
    ) -> Option<R>;

    #[doc(hidden)]
    fn remove<T>(
        list: &Self::List<T>,
        shared: &Self::Shared,
        hash: u64,
        eq: impl Fn(&T) -> bool,
    ) -> bool;
}

impl ListStrategy for LockCoupled {
    type List<T> = coupled::RawList<T>;
    type Shared = ();

    #[inline]
    fn shared(_collector: Collector) {}

    #[inline]
    fn list<T>() -> coupled::RawList<T> {
        coupled::RawList::new()
    }

    #[inline]
    fn insert<T: PartialEq>(list: &coupled::RawList<T>, _: &(), _: u64, item: T) -> InsertStatus {
        list.insert(item)
    }

    #[inline]
    fn find<T, R>(
        list: &coupled::RawList<T>,
        _: &(),
        _: u64,
        eq: impl Fn(&T) -> bool,
        f: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        list.find(eq, f)
    }

    #[inline]
    fn remove<T>(list: &coupled::RawList<T>, _: &(), _: u64, eq: impl Fn(&T) -> bool) -> bool {
        list.remove(eq)
    }
}

impl ListStrategy for LockFree {
    type List<T> = sorted::RawList<T>;
    type Shared = Collector;

    #[inline]
    fn shared(collector: Collector) -> Collector {
        collector
    }

    #[inline]
    fn list<T>() -> sorted::RawList<T> {
        sorted::RawList::new()
    }

    #[inline]
    fn insert<T: PartialEq>(
        list: &sorted::RawList<T>,
        collector: &Collector,
        hash: u64,
        item: T,
    ) -> InsertStatus {
        match list.insert(hash, item, &collector.enter()) {
            Ok(()) => InsertStatus::Inserted,
            Err(_) => InsertStatus::Rejected,
        }
    }

    #[inline]
    fn find<T, R>(
        list: &sorted::RawList<T>,
        collector: &Collector,
        hash: u64,
        eq: impl Fn(&T) -> bool,
        f: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        list.get(hash, eq, &collector.enter()).map(f)
    }

    #[inline]
    fn remove<T>(
        list: &sorted::RawList<T>,
        collector: &Collector,
        hash: u64,
        eq: impl Fn(&T) -> bool,
    ) -> bool {
        list.remove(hash, eq, &collector.enter())
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::LockCoupled {}
    impl Sealed for super::LockFree {}
}
