use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::OnceLock;

use crossbeam_utils::CachePadded;

// A sharded atomic counter.
//
// Every table keeps one of these for its length. A single atomic would be a point of
// contention shared by otherwise independent buckets.
pub struct Counter(Box<[CachePadded<AtomicIsize>]>);

impl Default for Counter {
    fn default() -> Counter {
        // available_parallelism is quite slow (microseconds).
        static CPUS: OnceLock<usize> = OnceLock::new();
        let num_cpus = *CPUS.get_or_init(|| {
            std::thread::available_parallelism()
                .map(Into::into)
                .unwrap_or(1)
        });

        // Round up to the next power-of-two for fast modulo.
        let shards = (0..num_cpus.next_power_of_two())
            .map(|_| Default::default())
            .collect();

        Counter(shards)
    }
}

impl Counter {
    // Adds `delta` to the shard owned by the current thread.
    #[inline]
    pub fn add(&self, delta: isize) {
        let shard = shard_id() & (self.0.len() - 1);
        self.0[shard].fetch_add(delta, Ordering::Relaxed);
    }

    // Returns the sum of all counter shards.
    #[inline]
    pub fn sum(&self) -> usize {
        self.0
            .iter()
            .map(|x| x.load(Ordering::Relaxed))
            .sum::<isize>()
            .try_into()
            // A removal can be counted before the insertion it observed,
            // in which case we assume the table is empty.
            .unwrap_or(0)
    }
}

// Returns a small integer identifying the current thread.
//
// Identifiers are handed out in creation order, so threads that run together tend to land on
// distinct shards.
#[inline]
fn shard_id() -> usize {
    static NEXT: AtomicUsize = AtomicUsize::new(0);

    thread_local! {
        static SHARD: usize = NEXT.fetch_add(1, Ordering::Relaxed);
    }

    SHARD.with(|shard| *shard)
}
