//! Test-and-set spin lock
//!
//! Every zone and every IPC endpoint owns one of these. The lock is a single
//! atomic flag: `lock` spins on a test-and-set, `drop` of the guard clears
//! the flag with release ordering.
//!
//! # Safety Invariants
//!
//! 1. **Exclusion**: At most one `SpinLockGuard` exists per lock at any time
//! 2. **Publication**: Writes made under the lock happen-before the next
//!    acquirer's reads (acquire on lock, release on unlock)
//! 3. **No sleeping**: Holders must not block; contention is bounded spinning
//!
//! With the `loom` feature the flag is a loom atomic so the model checker can
//! explore acquire/release interleavings.

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};

#[cfg(feature = "loom")]
use loom::sync::atomic::{AtomicBool, Ordering};

#[cfg(not(feature = "loom"))]
use core::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "loom")]
use loom::hint::spin_loop;

#[cfg(not(feature = "loom"))]
use core::hint::spin_loop;

/// A test-and-set spin lock protecting a `T`.
///
/// # Example
///
/// ```
/// use lim_primitives::SpinLock;
///
/// let counter = SpinLock::new(0u64);
/// *counter.lock() += 1;
/// assert_eq!(*counter.lock(), 1);
/// ```
pub struct SpinLock<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

// SAFETY: SpinLock hands out access to `value` only through a guard, and the
// `locked` flag guarantees at most one guard exists. Moving the lock between
// threads moves the `T`, so `T: Send` is sufficient for both impls.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Create a new, unlocked spin lock.
    #[cfg(not(feature = "loom"))]
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Create a new, unlocked spin lock.
    #[cfg(feature = "loom")]
    pub fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire the lock, spinning until it is free.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            // Test before the next test-and-set so waiters spin on a shared
            // cache line instead of bouncing it with writes.
            while self.locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    /// Attempt a single test-and-set. Returns `None` if the lock is held.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        if self.locked.swap(true, Ordering::Acquire) {
            None
        } else {
            Some(SpinLockGuard { lock: self })
        }
    }

    /// Whether the lock is currently held. Only meaningful for diagnostics.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Get a mutable reference without locking. The `&mut self` borrow
    /// proves no guard is alive.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    /// Consume the lock and return the protected value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f.debug_struct("SpinLock").field("value", &*guard).finish(),
            None => f.debug_struct("SpinLock").field("value", &"<locked>").finish(),
        }
    }
}

/// RAII guard returned by [`SpinLock::lock`]. Releases the lock on drop.
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: The guard exists only while `locked` is set by us, so no
        // other reference to `value` can be live.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: As above; `&mut self` on the guard makes this the only
        // reference derived from it.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

impl<T: fmt::Debug> fmt::Debug for SpinLockGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

// ============================================================================
// Kani Proofs
// ============================================================================

#[cfg(kani)]
mod proofs {
    use super::*;

    /// Proof: A held lock cannot be acquired a second time
    #[kani::proof]
    fn held_lock_excludes() {
        let lock = SpinLock::new(0u8);
        let guard = lock.try_lock();
        kani::assert(guard.is_some(), "Fresh lock must be acquirable");
        kani::assert(lock.try_lock().is_none(), "Held lock must not be re-acquired");
        drop(guard);
        kani::assert(lock.try_lock().is_some(), "Released lock must be acquirable");
    }

    /// Proof: Writes under the guard are visible after release
    #[kani::proof]
    fn writes_survive_release() {
        let value: u32 = kani::any();
        let lock = SpinLock::new(0u32);
        *lock.lock() = value;
        kani::assert(*lock.lock() == value, "Value written under lock must persist");
    }
}

// ============================================================================
// Tests
// ============================================================================
