use std::borrow::Borrow;
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::InsertStatus;

type Link<T> = *mut Node<T>;

// A list node. The lock protects both the item and the link to the next node.
struct Node<T> {
    slot: Mutex<Slot<T>>,
}

struct Slot<T> {
    item: T,
    next: Link<T>,
}

/// An unsorted hand-over-hand locked list.
///
/// The head sentinel is the list's own lock, which guards the first link. Traversals always
/// acquire the lock on a node before releasing the lock on its predecessor, so a node can only
/// be unlinked by a thread holding the locks of both the node and its predecessor.
pub struct RawList<T> {
    head: Mutex<Link<T>>,
}

// Safety: Items are only accessed under their node's lock, and nodes are owned by the list.
unsafe impl<T: Send> Send for RawList<T> {}
unsafe impl<T: Send> Sync for RawList<T> {}

// A locked predecessor during a traversal: either the head sentinel or a node.
enum Cursor<'a, T> {
    Head(MutexGuard<'a, Link<T>>),
    Node(MutexGuard<'a, Slot<T>>),
}

impl<T> Cursor<'_, T> {
    // The link to the node after this one.
    #[inline]
    fn next(&mut self) -> &mut Link<T> {
        match self {
            Cursor::Head(link) => link,
            Cursor::Node(slot) => &mut slot.next,
        }
    }
}

// Poisoning is ignored: a panic while a lock is held (in a user `eq` or `f`) cannot leave
// a link half-written.
#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> RawList<T> {
    pub fn new() -> RawList<T> {
        RawList {
            head: Mutex::new(ptr::null_mut()),
        }
    }

    // Locks the successor of `cursor`, if any.
    //
    // The cursor must stay locked until the returned guard has been acquired.
    #[inline]
    fn lock_next<'a>(&'a self, cursor: &mut Cursor<'a, T>) -> Option<MutexGuard<'a, Slot<T>>> {
        let next = *cursor.next();
        if next.is_null() {
            return None;
        }

        // Safety: `next` is reachable from the locked cursor, so it cannot be unlinked,
        // and therefore not freed, until the cursor is released.
        Some(lock(unsafe { &(*next).slot }))
    }

    /// Inserts `item`, or overwrites the first equal item in place.
    pub fn insert(&self, item: T) -> InsertStatus
    where
        T: PartialEq,
    {
        let mut cursor = Cursor::Head(lock(&self.head));

        loop {
            let Some(mut slot) = self.lock_next(&mut cursor) else {
                break;
            };

            if slot.item == item {
                slot.item = item;
                return InsertStatus::Replaced;
            }

            // Moving the cursor releases the predecessor only after the successor is locked.
            cursor = Cursor::Node(slot);
        }

        // Append after the last node, which is still locked.
        let node = Box::into_raw(Box::new(Node {
            slot: Mutex::new(Slot {
                item,
                next: ptr::null_mut(),
            }),
        }));

        *cursor.next() = node;
        InsertStatus::Inserted
    }

    /// Calls `f` on the first item matching `eq`, with the item's node locked.
    pub fn find<R>(&self, eq: impl Fn(&T) -> bool, f: impl FnOnce(&T) -> R) -> Option<R> {
        let mut cursor = Cursor::Head(lock(&self.head));

        while let Some(slot) = self.lock_next(&mut cursor) {
            if eq(&slot.item) {
                return Some(f(&slot.item));
            }

            cursor = Cursor::Node(slot);
        }

        None
    }

    /// Unlinks and drops the first item matching `eq`.
    pub fn remove(&self, eq: impl Fn(&T) -> bool) -> bool {
        let mut cursor = Cursor::Head(lock(&self.head));

        while let Some(slot) = self.lock_next(&mut cursor) {
            if eq(&slot.item) {
                let node = *cursor.next();
                *cursor.next() = slot.next;

                drop(slot);
                drop(cursor);

                // Safety: The node was unlinked while both it and its predecessor were locked.
                // Any other thread reaching it must have locked the predecessor first, so none
                // is holding or waiting on the node's lock, and none can find it from now on.
                drop(unsafe { Box::from_raw(node) });
                return true;
            }

            cursor = Cursor::Node(slot);
        }

        false
    }

    // Counts the nodes without locking.
    #[cfg(test)]
    fn count_nodes(&mut self) -> usize {
        let mut count = 0;
        let mut link = *self.head.get_mut().unwrap_or_else(PoisonError::into_inner);

        while !link.is_null() {
            count += 1;
            // Safety: We have unique access to the list.
            link = unsafe { (*link).slot.get_mut() }
                .unwrap_or_else(PoisonError::into_inner)
                .next;
        }

        count
    }
}

impl<T> Drop for RawList<T> {
    fn drop(&mut self) {
        let mut link = *self.head.get_mut().unwrap_or_else(PoisonError::into_inner);

        while !link.is_null() {
            // Safety: We have unique access to the list, and every node was allocated
            // with `Box` and is reachable exactly once.
            let node = unsafe { Box::from_raw(link) };
            link = node.slot.into_inner().unwrap_or_else(PoisonError::into_inner).next;
        }
    }
}

/// A concurrent linked list using hand-over-hand locking.
///
/// Each node is protected by its own mutex, and a traversal never holds more than two adjacent
/// locks at once: the lock on the next node is acquired before the lock on the current node is
/// released. Operations on different parts of the list can therefore proceed in parallel behind
/// one another, and no thread can be starved by another holding the whole list.
///
/// Items are kept in insertion order. [`add`](LockCoupledList::add) overwrites an item that
/// compares equal instead of inserting a duplicate, which makes a list of key-equal entries
/// behave as an associative container.
///
/// # Examples
///
/// ```
/// use bucketed::{InsertStatus, LockCoupledList};
///
/// let list = LockCoupledList::new();
/// assert_eq!(list.add(1), InsertStatus::Inserted);
/// assert_eq!(list.add(1), InsertStatus::Replaced);
/// assert_eq!(list.len(), 1);
///
/// assert!(list.contains(&1));
/// assert!(list.remove(&1));
/// assert!(!list.contains(&1));
/// ```
pub struct LockCoupledList<T> {
    raw: RawList<T>,
    len: AtomicUsize,
}

impl<T> LockCoupledList<T> {
    /// Creates an empty list.
    pub fn new() -> LockCoupledList<T> {
        LockCoupledList {
            raw: RawList::new(),
            len: AtomicUsize::new(0),
        }
    }

    /// Returns the number of items in the list.
    ///
    /// The value may be stale under concurrent modification.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Returns `true` if the list contains no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> LockCoupledList<T>
where
    T: PartialEq,
{
    /// Appends `item`, or overwrites the first item equal to it.
    pub fn add(&self, item: T) -> InsertStatus {
        let status = self.raw.insert(item);
        if status.is_inserted() {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
        status
    }

    /// Calls `f` on the item equal to `item`, with the item's node locked.
    pub fn find<Q, R>(&self, item: &Q, f: impl FnOnce(&T) -> R) -> Option<R>
    where
        T: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.raw.find(|x| x.borrow() == item, f)
    }

    /// Returns a copy of the stored item equal to `item`.
    pub fn get<Q>(&self, item: &Q) -> Option<T>
    where
        T: Borrow<Q> + Clone,
        Q: PartialEq + ?Sized,
    {
        self.find(item, T::clone)
    }

    /// Returns `true` if the list contains an item equal to `item`.
    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.find(item, |_| ()).is_some()
    }

    /// Removes the item equal to `item`, returning whether it was present.
    pub fn remove<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        let removed = self.raw.remove(|x| x.borrow() == item);
        if removed {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }
}

impl<T> Default for LockCoupledList<T> {
    fn default() -> Self {
        LockCoupledList::new()
    }
}

impl<T> fmt::Debug for LockCoupledList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockCoupledList")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
