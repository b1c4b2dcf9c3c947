use std::fmt;
use std::mem::align_of;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use seize::Guard;

// The mark occupies the lowest address bit.
const MARK: usize = 0b1;

/// A pointer and a boolean mark, read and updated as one atomic word.
///
/// The mark lives in the lowest bit of the pointer, so `T` must have an alignment of at least
/// two bytes. This is checked at compile time.
///
/// Single-field updates ([`exchange_ref`](Self::exchange_ref), [`set_mark`](Self::set_mark))
/// are atomic read-modify-write operations on the whole word and never tear the other field.
pub struct MarkableReference<T> {
    raw: AtomicPtr<T>,
}

// Fails to compile if a valid `*mut T` can have the mark bit set.
const fn assert_markable<T>() {
    struct Dummy<T>(T);
    impl<T> Dummy<T> {
        const ASSERT: () = assert!(align_of::<T>() > MARK);
    }
    Dummy::<T>::ASSERT
}

impl<T> MarkableReference<T> {
    /// Creates a reference holding `ptr` and `mark`.
    #[inline]
    pub fn new(ptr: *mut T, mark: bool) -> MarkableReference<T> {
        assert_markable::<T>();

        MarkableReference {
            raw: AtomicPtr::new(pack(ptr, mark)),
        }
    }

    /// Creates an unmarked null reference.
    #[inline]
    pub fn null() -> MarkableReference<T> {
        MarkableReference::new(ptr::null_mut(), false)
    }

    /// Returns the current pointer.
    #[inline]
    pub fn get_ref(&self) -> *mut T {
        self.get_both().0
    }

    /// Returns the current mark.
    #[inline]
    pub fn get_mark(&self) -> bool {
        self.get_both().1
    }

    /// Returns the pointer and mark from a single atomic load.
    #[inline]
    pub fn get_both(&self) -> (*mut T, bool) {
        unpack(self.raw.load(Ordering::Acquire))
    }

    /// Loads the pointer and mark through a `seize` guard.
    ///
    /// The pointer stays valid to dereference for as long as the guard is held, provided the
    /// pointee is only ever freed through the guard's collector.
    #[inline]
    pub fn protect(&self, guard: &impl Guard) -> (*mut T, bool) {
        unpack(guard.protect(&self.raw, Ordering::Acquire))
    }

    /// Overwrites both fields.
    #[inline]
    pub fn store(&self, ptr: *mut T, mark: bool) {
        self.raw.store(pack(ptr, mark), Ordering::Release)
    }

    /// Replaces the pointer, keeping the mark, and returns the previous pointer.
    pub fn exchange_ref(&self, new: *mut T) -> *mut T {
        let mut current = self.raw.load(Ordering::Relaxed);

        loop {
            let (old, mark) = unpack(current);

            match self.raw.compare_exchange_weak(
                current,
                pack(new, mark),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return old,
                Err(found) => current = found,
            }
        }
    }

    /// Sets the mark, keeping the pointer.
    #[inline]
    pub fn set_mark(&self, mark: bool) {
        self.exchange_mark(mark);
    }

    /// Sets the mark, keeping the pointer, and returns the previous mark.
    #[inline]
    pub fn exchange_mark(&self, mark: bool) -> bool {
        let previous = if mark {
            self.raw.fetch_set_bits(MARK, Ordering::AcqRel)
        } else {
            self.raw.fetch_clear_bits(MARK, Ordering::AcqRel)
        };

        unpack(previous).1
    }

    /// Replaces both fields if they currently equal `(expected_ref, expected_mark)`.
    ///
    /// On failure the current pair is returned.
    #[inline]
    pub fn compare_exchange_both(
        &self,
        expected_ref: *mut T,
        expected_mark: bool,
        new_ref: *mut T,
        new_mark: bool,
    ) -> Result<(), (*mut T, bool)> {
        self.raw
            .compare_exchange(
                pack(expected_ref, expected_mark),
                pack(new_ref, new_mark),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(drop)
            .map_err(unpack)
    }

    /// Like [`compare_exchange_both`](Self::compare_exchange_both), but allowed to fail
    /// spuriously. Callers are expected to retry in a loop.
    #[inline]
    pub fn compare_exchange_both_weak(
        &self,
        expected_ref: *mut T,
        expected_mark: bool,
        new_ref: *mut T,
        new_mark: bool,
    ) -> Result<(), (*mut T, bool)> {
        self.raw
            .compare_exchange_weak(
                pack(expected_ref, expected_mark),
                pack(new_ref, new_mark),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(drop)
            .map_err(unpack)
    }

    /// Returns both fields through a unique reference.
    #[inline]
    pub fn get_mut(&mut self) -> (*mut T, bool) {
        unpack(*self.raw.get_mut())
    }
}

impl<T> Default for MarkableReference<T> {
    fn default() -> MarkableReference<T> {
        MarkableReference::null()
    }
}

impl<T> fmt::Debug for MarkableReference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (ptr, mark) = self.get_both();

        f.debug_struct("MarkableReference")
            .field("ref", &ptr)
            .field("mark", &mark)
            .finish()
    }
}

#[inline]
fn pack<T>(ptr: *mut T, mark: bool) -> *mut T {
    ptr.map_addr(|addr| addr | (mark as usize))
}

#[inline]
fn unpack<T>(raw: *mut T) -> (*mut T, bool) {
    (raw.map_addr(|addr| addr & !MARK), raw.addr() & MARK != 0)
}

// Polyfill for the strict-provenance pointer APIs.
#[allow(dead_code)]
trait StrictProvenance: Sized {
    fn addr(self) -> usize;
    fn map_addr(self, f: impl FnOnce(usize) -> usize) -> Self;
}

impl<T> StrictProvenance for *mut T {
    #[inline(always)]
    fn addr(self) -> usize {
        self as usize
    }

    #[inline(always)]
    fn map_addr(self, f: impl FnOnce(usize) -> usize) -> Self {
        f(self.addr()) as Self
    }
}

// Bitwise read-modify-write operations on the address of an `AtomicPtr`.
trait AtomicPtrBitOps<T> {
    fn fetch_set_bits(&self, bits: usize, ordering: Ordering) -> *mut T;
    fn fetch_clear_bits(&self, bits: usize, ordering: Ordering) -> *mut T;
}

impl<T> AtomicPtrBitOps<T> for AtomicPtr<T> {
    #[inline]
    fn fetch_set_bits(&self, bits: usize, ordering: Ordering) -> *mut T {
        // Safety: `AtomicPtr` and `AtomicUsize` have the same size and alignment.
        unsafe { &*(self as *const AtomicPtr<T> as *const AtomicUsize) }.fetch_or(bits, ordering)
            as *mut T
    }

    #[inline]
    fn fetch_clear_bits(&self, bits: usize, ordering: Ordering) -> *mut T {
        // Safety: See above.
        unsafe { &*(self as *const AtomicPtr<T> as *const AtomicUsize) }
            .fetch_and(!bits, ordering) as *mut T
    }
}
