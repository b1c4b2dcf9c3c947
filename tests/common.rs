#![allow(dead_code)]

use bucketed::{HashMap, HashSet, ListStrategy};

// Runs a test that is generic over the bucket strategy once for every strategy.
#[macro_export]
macro_rules! with_strategies {
    ($test:ident) => {{
        $crate::debug!("{}: lock-coupled buckets", stringify!($test));
        $test::<bucketed::LockCoupled>();

        $crate::debug!("{}: lock-free buckets", stringify!($test));
        $test::<bucketed::LockFree>();
    }};
}

// Prints a log message if `RUST_LOG=debug` is set.
#[macro_export]
macro_rules! debug {
    ($($x:tt)*) => {
        if std::env::var("RUST_LOG").as_deref() == Ok("debug") {
            println!($($x)*);
        }
    };
}

// Creates a map with the given strategy and number of buckets.
pub fn map<K, V, L: ListStrategy>(capacity: usize) -> HashMap<K, V, L> {
    HashMap::builder()
        .capacity(capacity)
        .strategy::<L>()
        .build()
        .unwrap()
}

// Creates a set with the given strategy and number of buckets.
pub fn set<T, L: ListStrategy>(capacity: usize) -> HashSet<T, L> {
    HashSet::builder()
        .capacity(capacity)
        .strategy::<L>()
        .build()
        .unwrap()
}

// Returns the number of threads to use for stress testing.
pub fn threads() -> usize {
    if cfg!(miri) {
        2
    } else {
        num_cpus::get_physical().next_power_of_two()
    }
}
