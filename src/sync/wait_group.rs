use std::sync::atomic::{AtomicU32, Ordering};

/// A counter of outstanding tasks that threads can wait to drain.
///
/// Every [`add`](WaitGroup::add) must be balanced by a [`done`](WaitGroup::done). Waiters
/// sleep on a futex and are woken by the `done` call that brings the count to zero, which also
/// makes every write performed before the matching `done` calls visible to them.
#[derive(Debug, Default)]
pub struct WaitGroup {
    count: AtomicU32,
}

impl WaitGroup {
    /// Creates an empty wait group.
    pub fn new() -> WaitGroup {
        WaitGroup::default()
    }

    /// Registers `n` outstanding tasks.
    #[inline]
    pub fn add(&self, n: u32) {
        let previous = self.count.fetch_add(n, Ordering::AcqRel);
        debug_assert!(previous.checked_add(n).is_some(), "wait group overflow");
    }

    /// Marks one task as complete.
    #[inline]
    pub fn done(&self) {
        let previous = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "wait group underflow");

        if previous == 1 {
            atomic_wait::wake_all(&self.count);
        }
    }

    /// Blocks until the number of outstanding tasks is zero.
    pub fn wait(&self) {
        loop {
            let count = self.count.load(Ordering::Acquire);
            if count == 0 {
                return;
            }

            // Returns immediately if the count changed since the load above.
            atomic_wait::wait(&self.count, count);
        }
    }

    /// Returns the number of outstanding tasks.
    #[inline]
    pub fn pending(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }
}
