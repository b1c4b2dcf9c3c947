use bucketed::{InsertStatus, LockCoupledList, LockFreeList};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

mod common;
use common::threads;

#[test]
fn coupled_upserts() {
    #[derive(Clone, Debug)]
    struct Pair(u32, &'static str);

    // Pairs are equal when their keys are.
    impl PartialEq for Pair {
        fn eq(&self, other: &Self) -> bool {
            self.0 == other.0
        }
    }

    let list = LockCoupledList::new();
    assert_eq!(list.add(Pair(1, "a")), InsertStatus::Inserted);
    assert_eq!(list.add(Pair(2, "b")), InsertStatus::Inserted);
    assert_eq!(list.add(Pair(1, "c")), InsertStatus::Replaced);
    assert_eq!(list.len(), 2);

    assert_eq!(list.find(&Pair(1, ""), |p| p.1), Some("c"));
    assert_eq!(list.get(&Pair(2, "")).map(|p| p.1), Some("b"));
}

#[test]
fn coupled_remove_then_get() {
    let list = LockCoupledList::new();
    for x in 0..16 {
        list.add(x);
    }

    for x in 0..16 {
        assert!(list.remove(&x));
        assert_eq!(list.get(&x), None);
        assert!(!list.remove(&x));
    }

    assert!(list.is_empty());
}

#[test]
fn lock_free_rejects_duplicates() {
    let list = LockFreeList::new();
    assert!(list.add(7));
    assert!(!list.add(7));
    assert_eq!(list.len(), 1);

    assert!(list.remove(&7));
    assert!(list.add(7));
    assert_eq!(list.len(), 1);
}

#[test]
fn lock_free_pinned_references() {
    let list = LockFreeList::new();
    list.add("a".to_owned());

    let pinned = list.pin();
    let a = pinned.get("a").unwrap();

    // The node is unlinked, but stays valid while the list is pinned.
    assert!(list.remove("a"));
    assert!(!pinned.contains("a"));
    assert_eq!(a, "a");
}

// Each thread owns a set of items and checks its own view of them, while other threads churn
// through theirs. An item is only ever reported present between its add and remove.
fn owned_churn<A, R, C>(add: A, remove: R, contains: C)
where
    A: Fn(usize) -> bool + Sync,
    R: Fn(usize) -> bool + Sync,
    C: Fn(usize) -> bool + Sync,
{
    const ITEMS: usize = if cfg!(miri) { 16 } else { 256 };
    const ROUNDS: usize = if cfg!(miri) { 2 } else { 32 };

    let threads = threads();
    let barrier = Barrier::new(threads);

    thread::scope(|s| {
        for t in 0..threads {
            let (add, remove, contains, barrier) = (&add, &remove, &contains, &barrier);
            s.spawn(move || {
                barrier.wait();
                for _ in 0..ROUNDS {
                    for x in (t..ITEMS).step_by(threads) {
                        assert!(!contains(x));
                        assert!(add(x));
                        assert!(contains(x));
                    }

                    for x in (t..ITEMS).step_by(threads) {
                        assert!(remove(x));
                        assert!(!contains(x));
                        assert!(!remove(x));
                    }
                }
            });
        }
    });
}

#[test]
fn coupled_churn() {
    let list = LockCoupledList::new();
    owned_churn(
        |x| list.add(x).is_inserted(),
        |x| list.remove(&x),
        |x| list.contains(&x),
    );
    assert!(list.is_empty());
}

#[test]
fn lock_free_churn() {
    let list = LockFreeList::new();
    owned_churn(|x| list.add(x), |x| list.remove(&x), |x| list.contains(&x));
    assert!(list.is_empty());
}

// A reader never observes an item after a remove of it has completed, even while other
// threads modify the neighbouring nodes.
#[test]
fn lock_free_no_resurrection() {
    const ITEMS: usize = if cfg!(miri) { 16 } else { 1 << 10 };

    let list = LockFreeList::new();
    for x in 0..ITEMS {
        list.add(x);
    }

    let removed: Vec<AtomicBool> = (0..ITEMS).map(|_| AtomicBool::new(false)).collect();
    let violations = AtomicUsize::new(0);
    let barrier = Barrier::new(3);

    thread::scope(|s| {
        // Remove the even items.
        s.spawn(|| {
            barrier.wait();
            for x in (0..ITEMS).step_by(2) {
                assert!(list.remove(&x));
                removed[x].store(true, Ordering::SeqCst);
            }
        });

        // Re-add and remove odd items around them.
        s.spawn(|| {
            barrier.wait();
            for x in (1..ITEMS).step_by(2) {
                assert!(list.remove(&x));
                assert!(list.add(x));
            }
        });

        s.spawn(|| {
            barrier.wait();
            for _ in 0..4 {
                for x in (0..ITEMS).step_by(2) {
                    let gone = removed[x].load(Ordering::SeqCst);
                    if gone && list.contains(&x) {
                        violations.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        });
    });

    assert_eq!(violations.load(Ordering::Relaxed), 0);
    assert_eq!(list.len(), ITEMS / 2);
    for x in 0..ITEMS {
        assert_eq!(list.contains(&x), x % 2 == 1);
    }
}
