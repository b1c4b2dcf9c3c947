use bucketed::{BuildError, HashMap, InsertStatus, ListStrategy, LockCoupled, LockFree};

use std::hash::{BuildHasherDefault, Hasher};
use std::sync::Arc;
use std::thread;

mod common;
use common::map;

#[test]
fn new() {
    fn new<L: ListStrategy>() {
        let map = map::<usize, usize, L>(1);
        assert!(map.is_empty());
        assert_eq!(map.capacity(), 1);
    }

    with_strategies!(new);
}

#[test]
fn zero_capacity() {
    let result = HashMap::<usize, usize>::builder().build();
    assert!(matches!(result, Err(BuildError::ZeroCapacity)));

    let result = HashMap::<usize, usize>::builder()
        .strategy::<LockFree>()
        .capacity(0)
        .build();
    assert!(matches!(result, Err(BuildError::ZeroCapacity)));
}

#[test]
#[should_panic]
fn new_zero_capacity() {
    let _ = HashMap::<usize, usize>::new(0);
}

#[test]
fn insert() {
    fn insert<L: ListStrategy>() {
        let map = map::<usize, usize, L>(13);
        assert_eq!(map.insert(42, 0), InsertStatus::Inserted);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&42), Some(0));
    }

    with_strategies!(insert);
}

#[test]
fn get_empty() {
    fn get_empty<L: ListStrategy>() {
        let map = map::<usize, usize, L>(13);
        assert_eq!(map.get(&42), None);
        assert!(!map.contains_key(&42));
    }

    with_strategies!(get_empty);
}

#[test]
fn remove_empty() {
    fn remove_empty<L: ListStrategy>() {
        let map = map::<usize, usize, L>(13);
        assert!(!map.remove(&42));
        assert_eq!(map.len(), 0);
    }

    with_strategies!(remove_empty);
}

#[test]
fn insert_and_remove() {
    fn insert_and_remove<L: ListStrategy>() {
        let map = map::<usize, usize, L>(13);
        map.insert(42, 0);
        assert!(map.remove(&42));
        assert_eq!(map.get(&42), None);
        assert!(map.is_empty());

        // The key can be inserted again.
        assert_eq!(map.insert(42, 1), InsertStatus::Inserted);
        assert_eq!(map.get(&42), Some(1));
    }

    with_strategies!(insert_and_remove);
}

#[test]
fn last_write_wins() {
    fn last_write_wins<L: ListStrategy>() {
        let map = map::<usize, usize, L>(7);
        for k in 0..64 {
            map.insert(k, k);
        }

        for k in 0..64 {
            assert_eq!(map.get(&k), Some(k));
        }

        for k in 64..128 {
            assert_eq!(map.get(&k), None);
        }
    }

    with_strategies!(last_write_wins);
}

#[test]
fn reinsert_coupled() {
    let map = map::<usize, usize, LockCoupled>(13);
    assert_eq!(map.insert(42, 0), InsertStatus::Inserted);
    assert_eq!(map.insert(42, 0), InsertStatus::Replaced);
    assert_eq!(map.get(&42), Some(0));
    assert_eq!(map.len(), 1);

    assert_eq!(map.insert(42, 1), InsertStatus::Replaced);
    assert_eq!(map.get(&42), Some(1));
    assert_eq!(map.len(), 1);
}

#[test]
fn reinsert_lock_free() {
    let map = map::<usize, usize, LockFree>(13);
    assert_eq!(map.insert(42, 0), InsertStatus::Inserted);
    assert_eq!(map.insert(42, 0), InsertStatus::Rejected);
    assert_eq!(map.insert(42, 1), InsertStatus::Rejected);
    assert_eq!(map.get(&42), Some(0));
    assert_eq!(map.len(), 1);
}

#[test]
fn get_with() {
    fn get_with<L: ListStrategy>() {
        let map = map::<&str, Vec<u8>, L>(13);
        map.insert("a", vec![1, 2, 3]);

        assert_eq!(map.get_with("a", |v| v.len()), Some(3));
        assert_eq!(map.get_with("a", |v| v[1]), Some(2));
        assert_eq!(map.get_with("b", |v| v.len()), None);
    }

    with_strategies!(get_with);
}

#[test]
fn borrowed_keys() {
    fn borrowed_keys<L: ListStrategy>() {
        let map = map::<String, usize, L>(13);
        map.insert("hello".to_owned(), 1);

        assert_eq!(map.get("hello"), Some(1));
        assert!(map.contains_key("hello"));
        assert!(!map.contains_key("hell"));
        assert!(map.remove("hello"));
        assert!(!map.contains_key("hello"));
    }

    with_strategies!(borrowed_keys);
}

#[test]
fn single_bucket() {
    fn single_bucket<L: ListStrategy>() {
        let map = map::<usize, usize, L>(1);
        for k in 0..100 {
            assert_eq!(map.insert(k, k * 2), InsertStatus::Inserted);
        }

        assert_eq!(map.len(), 100);
        for k in (0..100).step_by(3) {
            assert!(map.remove(&k));
        }

        for k in 0..100 {
            assert_eq!(map.get(&k), (k % 3 != 0).then_some(k * 2));
        }
    }

    with_strategies!(single_bucket);
}

#[derive(Default)]
struct Zero;

impl Hasher for Zero {
    fn finish(&self) -> u64 {
        0
    }

    fn write(&mut self, _: &[u8]) {}
}

// Distinct keys with equal hashes share an identity in lock-free buckets.
#[test]
fn colliding_hashes() {
    let coupled: HashMap<usize, usize, LockCoupled, BuildHasherDefault<Zero>> =
        HashMap::with_capacity_and_hasher(8, BuildHasherDefault::default());
    assert_eq!(coupled.insert(1, 1), InsertStatus::Inserted);
    assert_eq!(coupled.insert(2, 2), InsertStatus::Inserted);
    assert_eq!(coupled.get(&1), Some(1));
    assert_eq!(coupled.get(&2), Some(2));
    assert_eq!(coupled.len(), 2);

    let lock_free: HashMap<usize, usize, LockFree, BuildHasherDefault<Zero>> =
        HashMap::with_capacity_and_hasher(8, BuildHasherDefault::default());
    assert_eq!(lock_free.insert(1, 1), InsertStatus::Inserted);
    assert_eq!(lock_free.insert(2, 2), InsertStatus::Rejected);
    assert_eq!(lock_free.get(&1), Some(1));

    // A lookup never matches on the hash alone.
    assert_eq!(lock_free.get(&2), None);
    assert!(!lock_free.remove(&2));
    assert_eq!(lock_free.len(), 1);
}

#[test]
fn concurrent_insert() {
    fn concurrent_insert<L: ListStrategy>() {
        let map = Arc::new(map::<usize, usize, L>(97));

        let map1 = map.clone();
        let t1 = thread::spawn(move || {
            for i in 0..64 {
                map1.insert(i, 0);
            }
        });

        let map2 = map.clone();
        let t2 = thread::spawn(move || {
            for i in 64..128 {
                map2.insert(i, 1);
            }
        });

        t1.join().unwrap();
        t2.join().unwrap();

        assert_eq!(map.len(), 128);
        for i in 0..128 {
            assert_eq!(map.get(&i), Some(usize::from(i >= 64)));
        }
    }

    with_strategies!(concurrent_insert);
}

#[test]
fn concurrent_remove() {
    fn concurrent_remove<L: ListStrategy>() {
        let map = Arc::new(map::<usize, usize, L>(97));

        for i in 0..64 {
            map.insert(i, i);
        }

        let map1 = map.clone();
        let t1 = thread::spawn(move || {
            let mut removed = 0;
            for i in 0..64 {
                removed += usize::from(map1.remove(&i));
            }
            removed
        });

        let map2 = map.clone();
        let t2 = thread::spawn(move || {
            let mut removed = 0;
            for i in 0..64 {
                removed += usize::from(map2.remove(&i));
            }
            removed
        });

        // Every key is removed exactly once.
        let removed = t1.join().unwrap() + t2.join().unwrap();
        assert_eq!(removed, 64);

        assert!(map.is_empty());
        for i in 0..64 {
            assert_eq!(map.get(&i), None);
        }
    }

    with_strategies!(concurrent_remove);
}

#[test]
fn drop_values() {
    fn drop_values<L: ListStrategy>() {
        let value = Arc::new(());
        {
            let map = map::<usize, Arc<()>, L>(7);
            for i in 0..32 {
                map.insert(i, value.clone());
            }

            for i in 0..16 {
                map.remove(&i);
            }
        }

        // Both removed and remaining entries were dropped with the map.
        assert_eq!(Arc::strong_count(&value), 1);
    }

    with_strategies!(drop_values);
}

#[test]
fn debug() {
    let map = HashMap::<usize, usize>::new(3);
    map.insert(1, 1);

    let debug = format!("{map:?}");
    assert!(debug.contains("capacity: 3"));
    assert!(debug.contains("len: 1"));
}
