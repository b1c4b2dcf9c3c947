use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::Backoff;
use seize::{Collector, Guard, LocalGuard};

use crate::cfg::trace;
use crate::markable::MarkableReference;

// A list node.
//
// A set mark on `next` means this node is logically deleted. Once marked, `next` never
// changes again.
struct Node<T> {
    key: u64,
    item: T,
    next: MarkableReference<Node<T>>,
}

// Reclaims a node retired after being unlinked.
unsafe fn reclaim<T>(node: *mut Node<T>, _collector: &Collector) {
    let _: Box<Node<T>> = unsafe { Box::from_raw(node) };
}

/// A lock-free list of items sorted by key, after Harris and Michael.
///
/// The head link is the sentinel with key −∞ and the null link is the sentinel with key +∞;
/// neither can be removed, so the list needs no empty or end-of-list special cases.
///
/// Removal happens in two steps. A node is first logically deleted by marking its `next` link,
/// then physically unlinked by swinging its predecessor's link past it. Traversals that pass a
/// marked node unlink it themselves. Whichever thread's CAS unlinks a node retires it to the
/// guard's collector; it is freed once no guard that could have observed it is alive.
///
/// Every operation takes a guard, and all guards used with one list must come from the same
/// collector.
pub struct RawList<T> {
    head: MarkableReference<Node<T>>,
}

// Safety: Items are moved in and dropped by arbitrary threads, and shared by reference.
unsafe impl<T: Send> Send for RawList<T> {}
unsafe impl<T: Send + Sync> Sync for RawList<T> {}

// A position in the list: `pred` is the link pointing at `curr`, and every key before `curr`
// is smaller than the key searched for.
struct Window<'g, T> {
    pred: &'g MarkableReference<Node<T>>,
    curr: *mut Node<T>,
}

impl<T> RawList<T> {
    pub fn new() -> RawList<T> {
        RawList {
            head: MarkableReference::null(),
        }
    }

    // Returns the window for `key`, unlinking every marked node on the way.
    //
    // `curr` is either null or an unmarked node with a key greater than or equal to `key`.
    fn find<'g>(&'g self, key: u64, guard: &'g impl Guard) -> Window<'g, T> {
        let backoff = Backoff::new();

        'retry: loop {
            let mut pred = &self.head;
            let (mut curr, _) = pred.protect(guard);

            loop {
                if curr.is_null() {
                    return Window { pred, curr };
                }

                // Safety: `curr` was loaded through the guard from a link that was reachable,
                // so it has not been reclaimed.
                let node = unsafe { &*curr };
                let (succ, marked) = node.next.protect(guard);

                if marked {
                    if pred
                        .compare_exchange_both(curr, false, succ, false)
                        .is_err()
                    {
                        // `pred` was marked, or its link moved.
                        trace!("restarting traversal for key {:#x}", key);
                        backoff.spin();
                        continue 'retry;
                    }

                    // Safety: Our CAS unlinked `curr`, so it is unreachable from the head and no
                    // other thread can retire it.
                    unsafe { guard.defer_retire(curr, reclaim::<T>) };
                    trace!("unlinked node with key {:#x}", node.key);

                    curr = succ;
                    continue;
                }

                if node.key >= key {
                    return Window { pred, curr };
                }

                pred = &node.next;
                curr = succ;
            }
        }
    }

    /// Links `item` under `key`.
    ///
    /// If a node with the same key is present, the item is handed back.
    pub fn insert(&self, key: u64, item: T, guard: &impl Guard) -> Result<(), T> {
        let node = Box::into_raw(Box::new(Node {
            key,
            item,
            next: MarkableReference::null(),
        }));

        let backoff = Backoff::new();

        loop {
            let Window { pred, curr } = self.find(key, guard);

            // Safety: `find` returns protected pointers.
            if !curr.is_null() && unsafe { (*curr).key } == key {
                // Safety: The node was never published.
                let node = unsafe { Box::from_raw(node) };
                return Err(node.item);
            }

            // Safety: The node is not published until the CAS below succeeds.
            unsafe { (*node).next.store(curr, false) };

            if pred
                .compare_exchange_both(curr, false, node, false)
                .is_ok()
            {
                return Ok(());
            }

            backoff.spin();
        }
    }

    /// Returns the unmarked item stored under `key`, if it matches `eq`.
    ///
    /// Wait-free: this walks through marked nodes without unlinking them.
    pub fn get<'g>(
        &'g self,
        key: u64,
        eq: impl Fn(&T) -> bool,
        guard: &'g impl Guard,
    ) -> Option<&'g T> {
        let (mut curr, _) = self.head.protect(guard);

        while !curr.is_null() {
            // Safety: Loaded through the guard from a link that was reachable.
            let node = unsafe { &*curr };

            if node.key >= key {
                let (_, marked) = node.next.get_both();

                if node.key == key && !marked && eq(&node.item) {
                    return Some(&node.item);
                }

                return None;
            }

            curr = node.next.protect(guard).0;
        }

        None
    }

    /// Logically deletes the item stored under `key` if it matches `eq`, then tries to unlink it.
    pub fn remove(&self, key: u64, eq: impl Fn(&T) -> bool, guard: &impl Guard) -> bool {
        let backoff = Backoff::new();

        loop {
            let Window { pred, curr } = self.find(key, guard);

            if curr.is_null() {
                return false;
            }

            // Safety: `find` returns protected pointers.
            let node = unsafe { &*curr };

            if node.key != key || !eq(&node.item) {
                return false;
            }

            let (succ, marked) = node.next.get_both();

            // Another remove got here first.
            if marked {
                return false;
            }

            if node
                .next
                .compare_exchange_both_weak(succ, false, succ, true)
                .is_err()
            {
                // A node was linked after `curr`, or `curr` was marked. Start over.
                backoff.spin();
                continue;
            }

            // The node is logically deleted. Unlink it now if the window still holds,
            // otherwise a later traversal will.
            if pred
                .compare_exchange_both(curr, false, succ, false)
                .is_ok()
            {
                // Safety: Our CAS unlinked `curr`, see `find`.
                unsafe { guard.defer_retire(curr, reclaim::<T>) };
            }

            return true;
        }
    }

    // Counts the reachable nodes, marked or not.
    #[cfg(test)]
    fn count_nodes(&mut self) -> usize {
        let mut count = 0;
        let (mut curr, _) = self.head.get_mut();

        while !curr.is_null() {
            count += 1;
            // Safety: We have unique access to the list.
            curr = unsafe { (*curr).next.get_mut().0 };
        }

        count
    }
}

impl<T> Drop for RawList<T> {
    fn drop(&mut self) {
        let (mut curr, _) = self.head.get_mut();

        // Free every node that is still linked. Unlinked nodes were retired and are
        // reclaimed by the collector.
        while !curr.is_null() {
            // Safety: We have unique access to the list, and linked nodes were never retired.
            let mut node = unsafe { Box::from_raw(curr) };
            curr = node.next.get_mut().0;
        }
    }
}

/// A lock-free sorted linked list.
///
/// Items are ordered by their hash under the list's [`BuildHasher`], and the hash is the
/// item's identity for insertion: [`add`](LockFreeList::add) refuses an item whose hash is
/// already present, even if the items differ. Lookups and removals additionally compare the
/// items themselves, so a colliding item is never reported as present.
///
/// Removed nodes are reclaimed through a [`seize::Collector`]. References handed out by
/// [`LockFreeListRef::get`] stay valid for as long as the pinned reference is held.
///
/// # Examples
///
/// ```
/// use bucketed::LockFreeList;
///
/// let list = LockFreeList::new();
/// assert!(list.add("a"));
/// assert!(!list.add("a"));
///
/// let pinned = list.pin();
/// assert_eq!(pinned.get("a"), Some(&"a"));
/// assert!(pinned.remove("a"));
/// assert!(!pinned.contains("a"));
/// ```
pub struct LockFreeList<T, S = RandomState> {
    raw: RawList<T>,
    len: AtomicUsize,
    hasher: S,
    collector: Collector,
}

impl<T> LockFreeList<T> {
    /// Creates an empty list.
    pub fn new() -> LockFreeList<T> {
        LockFreeList::with_hasher(RandomState::new())
    }
}

impl<T, S: Default> Default for LockFreeList<T, S> {
    fn default() -> Self {
        LockFreeList::with_hasher(S::default())
    }
}

impl<T, S> LockFreeList<T, S> {
    /// Creates an empty list that orders items by their hash under `hasher`.
    pub fn with_hasher(hasher: S) -> LockFreeList<T, S> {
        LockFreeList::with_hasher_and_collector(hasher, Collector::new())
    }

    /// Creates an empty list that reclaims removed nodes through `collector`.
    pub fn with_hasher_and_collector(hasher: S, collector: Collector) -> LockFreeList<T, S> {
        LockFreeList {
            raw: RawList::new(),
            len: AtomicUsize::new(0),
            hasher,
            collector,
        }
    }

    /// Returns a pinned reference to the list.
    ///
    /// The reference holds a guard, which delays the reclamation of removed nodes for as long
    /// as it is alive.
    #[inline]
    pub fn pin(&self) -> LockFreeListRef<'_, T, S> {
        LockFreeListRef {
            guard: self.collector.enter(),
            list: self,
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

impl<T, S> LockFreeList<T, S>
where
    T: Hash + Eq,
    S: BuildHasher,
{
    /// Inserts `item`, returning `false` if an item with the same hash is present.
    pub fn add(&self, item: T) -> bool {
        self.pin().add(item)
    }

    /// Returns `true` if the list contains `item`.
    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.pin().contains(item)
    }

    /// Removes `item`, returning whether it was present.
    pub fn remove<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.pin().remove(item)
    }
}

impl<T, S> fmt::Debug for LockFreeList<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeList")
            .field("len", &self.len())
            .field("collector", &self.collector)
            .finish_non_exhaustive()
    }
}

/// A pinned reference to a [`LockFreeList`].
///
/// Created by [`LockFreeList::pin`].
pub struct LockFreeListRef<'list, T, S = RandomState> {
    guard: LocalGuard<'list>,
    list: &'list LockFreeList<T, S>,
}

impl<T, S> LockFreeListRef<'_, T, S>
where
    T: Hash + Eq,
    S: BuildHasher,
{
    /// Inserts `item`, returning `false` if an item with the same hash is present.
    pub fn add(&self, item: T) -> bool {
        let key = self.list.hasher.hash_one(&item);

        match self.list.raw.insert(key, item, &self.guard) {
            Ok(()) => {
                self.list.len.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => false,
        }
    }

    /// Returns a reference to the stored item equal to `item`.
    pub fn get<Q>(&self, item: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let key = self.list.hasher.hash_one(item);
        self.list
            .raw
            .get(key, |x: &T| x.borrow() == item, &self.guard)
    }

    /// Returns `true` if the list contains `item`.
    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(item).is_some()
    }

    /// Removes `item`, returning whether it was present.
    pub fn remove<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let key = self.list.hasher.hash_one(item);
        let removed = self
            .list
            .raw
            .remove(key, |x: &T| x.borrow() == item, &self.guard);

        if removed {
            self.list.len.fetch_sub(1, Ordering::Relaxed);
        }

        removed
    }
}

impl<T, S> fmt::Debug for LockFreeListRef<'_, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LockFreeListRef").field(&self.list).finish()
    }
}
