use std::sync::atomic::{AtomicU32, Ordering};

/// A counting semaphore.
///
/// [`acquire`](CountingSemaphore::acquire) blocks the calling thread on a futex while no
/// permit is available. In addition to the permit count, the semaphore publishes the number of
/// permits currently held, see [`active`](CountingSemaphore::active).
#[derive(Debug)]
pub struct CountingSemaphore {
    // Permits available for acquisition.
    permits: AtomicU32,

    // Permits acquired but not yet released.
    active: AtomicU32,
}

impl CountingSemaphore {
    /// Creates a semaphore with `permits` initially available permits.
    pub fn new(permits: u32) -> CountingSemaphore {
        CountingSemaphore {
            permits: AtomicU32::new(permits),
            active: AtomicU32::new(0),
        }
    }

    /// Takes a permit, blocking until one is available.
    pub fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }

            // Sleep until a release changes the permit count. A spurious or stale
            // wake-up simply retries.
            atomic_wait::wait(&self.permits, 0);
        }
    }

    /// Takes a permit if one is available, without blocking.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.load(Ordering::Acquire);

        loop {
            if permits == 0 {
                return false;
            }

            match self.permits.compare_exchange_weak(
                permits,
                permits - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // Counted after the permit is taken, so `active` never exceeds the
                    // initial number of permits.
                    self.active.fetch_add(1, Ordering::AcqRel);
                    return true;
                }
                Err(found) => permits = found,
            }
        }
    }

    /// Returns a permit and wakes one waiting thread.
    ///
    /// Must be paired with a previous successful [`acquire`](CountingSemaphore::acquire) or
    /// [`try_acquire`](CountingSemaphore::try_acquire).
    pub fn release(&self) {
        // Uncounted before the permit is returned, see `try_acquire`.
        let active = self.active.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(active > 0, "released a permit that was never acquired");

        self.permits.fetch_add(1, Ordering::Release);
        atomic_wait::wake_one(&self.permits);
    }

    /// Returns the number of permits currently held.
    ///
    /// The value is exact at the instant of the load but may be stale by the time it is
    /// observed.
    #[inline]
    pub fn active(&self) -> u32 {
        self.active.load(Ordering::Acquire)
    }

    /// Returns the number of permits currently available.
    #[inline]
    pub fn available(&self) -> u32 {
        self.permits.load(Ordering::Acquire)
    }
}
