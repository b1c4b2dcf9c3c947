#![allow(unstable_name_collisions)]
#![doc = include_str!("../README.md")]

mod bounded;
mod cfg;
mod error;
mod list;
mod map;
mod markable;
mod raw;
mod set;
mod sync;

pub use bounded::{BoundedHashMap, BoundedHashMapBuilder, DEFAULT_MAX_WORKERS};
pub use error::BuildError;
pub use list::{
    InsertStatus, ListStrategy, LockCoupled, LockCoupledList, LockFree, LockFreeList,
    LockFreeListRef,
};
pub use map::{HashMap, HashMapBuilder};
pub use markable::MarkableReference;
pub use set::{HashSet, HashSetBuilder};
pub use sync::{CountingSemaphore, WaitGroup};

pub use seize::Collector;
