use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, SendError, Sender};
use seize::Collector;

use crate::cfg::trace;
use crate::list::{ListStrategy, LockCoupled};
use crate::map::{HashMap, HashMapBuilder};
use crate::sync::{CountingSemaphore, WaitGroup};
use crate::BuildError;

/// The default maximum number of concurrent writes.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// A concurrent hash map whose writes are applied asynchronously by a bounded pool of writers.
///
/// [`insert`](BoundedHashMap::insert) hands the write to one of `max_workers` writer threads and
/// returns without waiting for it, but only once fewer than `max_workers` writes are in flight;
/// otherwise it blocks until one completes. Reads wait for every in-flight write to finish
/// first, so a `get` observes every `insert` that returned before it started.
///
/// Writes are routed to writers by key hash, so writes to the same key from one thread are
/// applied in the order they were issued.
///
/// The writer threads are owned by the map and joined when it is dropped, after all queued
/// writes have been applied.
///
/// # Examples
///
/// ```
/// use bucketed::BoundedHashMap;
///
/// let map = BoundedHashMap::new(16);
/// map.insert("a", 1);
/// map.insert("a", 2);
/// assert_eq!(map.get("a"), Some(2));
/// ```
pub struct BoundedHashMap<K, V, L: ListStrategy = LockCoupled, S = RandomState> {
    table: Arc<HashMap<K, V, L, S>>,
    gate: Arc<Gate>,
    // One queue per writer.
    jobs: Vec<Sender<Job<K, V>>>,
    workers: Vec<JoinHandle<()>>,
    max_workers: usize,
}

// An admitted write. Dropping it, applied or not, completes the write.
struct Job<K, V> {
    hash: u64,
    key: K,
    value: V,
    completion: Completion,
}

// Tracks the writes in flight.
struct Gate {
    // Bounds the number of writes in flight.
    admission: CountingSemaphore,
    // Counts the writes in flight, for readers to wait on.
    writes: WaitGroup,
}

impl Gate {
    // Blocks until a write may be admitted.
    fn admit(self: &Arc<Self>) -> Completion {
        self.admission.acquire();
        self.writes.add(1);
        Completion(self.clone())
    }
}

// Marks a write as complete when dropped, even if the write panicked or was never applied.
struct Completion(Arc<Gate>);

impl Drop for Completion {
    fn drop(&mut self) {
        self.0.admission.release();
        self.0.writes.done();
    }
}

// Applies an admitted write.
fn write<K, V, L, S>(table: &HashMap<K, V, L, S>, job: Job<K, V>)
where
    K: Hash + Eq,
    L: ListStrategy,
    S: BuildHasher,
{
    let Job {
        hash,
        key,
        value,
        completion,
    } = job;

    table.insert_hashed(hash, key, value);
    drop(completion);
}

// The body of a writer thread: apply writes until the queue is closed.
fn run<K, V, L, S>(table: Arc<HashMap<K, V, L, S>>, jobs: Receiver<Job<K, V>>)
where
    K: Hash + Eq,
    L: ListStrategy,
    S: BuildHasher,
{
    trace!("writer started");

    for job in jobs {
        // A panicking write is completed by its own token, and the writer moves on.
        if panic::catch_unwind(AssertUnwindSafe(|| write(&table, job))).is_err() {
            trace!("write panicked");
        }
    }

    trace!("writer exiting");
}

/// A builder for a [`BoundedHashMap`].
///
/// # Examples
///
/// ```rust
/// use bucketed::{BoundedHashMap, LockFree};
///
/// let map: BoundedHashMap<u64, u64, LockFree> = BoundedHashMap::builder()
///     // Set the number of buckets.
///     .capacity(1024)
///     // Allow up to eight writes in flight.
///     .max_workers(8)
///     // Use lock-free buckets.
///     .strategy::<LockFree>()
///     // Construct the map and spawn its writers.
///     .build()
///     .unwrap();
/// ```
pub struct BoundedHashMapBuilder<K, V, L = LockCoupled, S = RandomState> {
    map: HashMapBuilder<K, V, L, S>,
    max_workers: usize,
}

impl<K, V, L> BoundedHashMapBuilder<K, V, L> {
    /// Set the hash builder used to hash keys.
    pub fn hasher<S>(self, hasher: S) -> BoundedHashMapBuilder<K, V, L, S> {
        BoundedHashMapBuilder {
            map: self.map.hasher(hasher),
            max_workers: self.max_workers,
        }
    }
}

impl<K, V, L, S> BoundedHashMapBuilder<K, V, L, S> {
    /// Set the number of buckets. It must be non-zero.
    pub fn capacity(self, capacity: usize) -> Self {
        BoundedHashMapBuilder {
            map: self.map.capacity(capacity),
            ..self
        }
    }

    /// Set the maximum number of writes in flight, which is also the number of writer threads.
    ///
    /// Defaults to [`DEFAULT_MAX_WORKERS`]. It must be non-zero.
    pub fn max_workers(self, max_workers: usize) -> Self {
        BoundedHashMapBuilder {
            max_workers,
            ..self
        }
    }

    /// Set the list implementation used for buckets. See [`ListStrategy`] for details.
    pub fn strategy<L2: ListStrategy>(self) -> BoundedHashMapBuilder<K, V, L2, S> {
        BoundedHashMapBuilder {
            map: self.map.strategy::<L2>(),
            max_workers: self.max_workers,
        }
    }

    /// Set the [`seize::Collector`] used to reclaim removed entries.
    pub fn collector(self, collector: Collector) -> Self {
        BoundedHashMapBuilder {
            map: self.map.collector(collector),
            ..self
        }
    }
}

impl<K, V, L, S> BoundedHashMapBuilder<K, V, L, S>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
    L: ListStrategy,
    S: BuildHasher + Send + Sync + 'static,
{
    /// Construct a [`BoundedHashMap`] and spawn its writer threads.
    ///
    /// Returns an error if the capacity or the number of workers is zero, or if a writer thread
    /// could not be spawned.
    pub fn build(self) -> Result<BoundedHashMap<K, V, L, S>, BuildError> {
        if self.max_workers == 0 {
            return Err(BuildError::ZeroWorkers);
        }

        let permits = u32::try_from(self.max_workers).unwrap_or(u32::MAX);
        let gate = Arc::new(Gate {
            admission: CountingSemaphore::new(permits),
            writes: WaitGroup::new(),
        });

        // Workers spawned before a failure are joined when `map` is dropped.
        let mut map = BoundedHashMap {
            table: Arc::new(self.map.build()?),
            gate,
            jobs: Vec::with_capacity(self.max_workers),
            workers: Vec::with_capacity(self.max_workers),
            max_workers: self.max_workers,
        };

        for i in 0..self.max_workers {
            // Admission bounds the writes in flight, so sending never blocks.
            let (sender, receiver) = crossbeam_channel::bounded(self.max_workers);
            let table = map.table.clone();

            let worker = thread::Builder::new()
                .name(format!("bucketed-writer-{i}"))
                .spawn(move || run(table, receiver))?;

            map.jobs.push(sender);
            map.workers.push(worker);
        }

        trace!("spawned {} writers", map.workers.len());
        Ok(map)
    }
}

impl<K, V, L, S> fmt::Debug for BoundedHashMapBuilder<K, V, L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedHashMapBuilder")
            .field("map", &self.map)
            .field("max_workers", &self.max_workers)
            .finish()
    }
}

impl<K, V> BoundedHashMap<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates an empty `BoundedHashMap` with `capacity` lock-coupled buckets and
    /// [`DEFAULT_MAX_WORKERS`] writers.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or a writer thread cannot be spawned. Use
    /// [`BoundedHashMap::builder`] to handle these as errors.
    pub fn new(capacity: usize) -> BoundedHashMap<K, V> {
        match BoundedHashMap::builder().capacity(capacity).build() {
            Ok(map) => map,
            Err(err) => panic!("failed to create map: {err}"),
        }
    }
}

impl<K, V> BoundedHashMap<K, V> {
    /// Returns a builder for a `BoundedHashMap`.
    pub fn builder() -> BoundedHashMapBuilder<K, V> {
        BoundedHashMapBuilder {
            map: HashMap::builder(),
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl<K, V, L: ListStrategy, S> BoundedHashMap<K, V, L, S> {
    /// Returns the number of writes currently in flight.
    ///
    /// This never exceeds [`max_workers`](BoundedHashMap::max_workers).
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.gate.admission.active() as usize
    }

    /// Returns the maximum number of writes in flight.
    #[inline]
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Returns the number of buckets.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Blocks until every write in flight has been applied.
    pub fn flush(&self) {
        self.gate.writes.wait();
    }

    /// Returns the number of entries in the map, once all writes in flight have been applied.
    pub fn len(&self) -> usize {
        self.flush();
        self.table.len()
    }

    /// Returns `true` if the map is empty, once all writes in flight have been applied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V, L, S> BoundedHashMap<K, V, L, S>
where
    K: Hash + Eq,
    L: ListStrategy,
    S: BuildHasher,
{
    /// Schedules a write of `value` under `key`.
    ///
    /// Blocks while `max_workers` writes are already in flight. The outcome for an existing key
    /// follows the bucket strategy, as for [`HashMap::insert`].
    pub fn insert(&self, key: K, value: V) {
        let hash = self.table.hash(&key);
        let job = Job {
            hash,
            key,
            value,
            completion: self.gate.admit(),
        };

        let jobs = &self.jobs[(hash % self.jobs.len() as u64) as usize];
        if let Err(SendError(job)) = jobs.send(job) {
            // The writer has exited, apply the write here instead.
            trace!("writer unavailable, writing inline");
            write(&self.table, job);
        }
    }

    /// Returns a copy of the value corresponding to the key, once all writes in flight have
    /// been applied.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.flush();
        self.table.get(key)
    }

    /// Returns `true` if the map contains the key, once all writes in flight have been applied.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.flush();
        self.table.contains_key(key)
    }
}

impl<K, V, L: ListStrategy, S> Drop for BoundedHashMap<K, V, L, S> {
    fn drop(&mut self) {
        // Closing the queues lets the writers drain them and exit.
        self.jobs.clear();

        for worker in self.workers.drain(..) {
            // Writes that panicked were completed by their jobs.
            let _ = worker.join();
        }
    }
}

impl<K, V, L: ListStrategy, S> fmt::Debug for BoundedHashMap<K, V, L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedHashMap")
            .field("capacity", &self.capacity())
            .field("in_flight", &self.in_flight())
            .field("max_workers", &self.max_workers())
            .finish_non_exhaustive()
    }
}
