//! Non-blocking access gate serializing writers of one venue's order set.
//!
//! [`ExclusiveLock`] never waits: a conflicting request fails immediately and
//! the caller decides what to do. The orchestrator drops remote book updates
//! that arrive while a reconciliation cycle is still in flight instead of
//! queueing them, since a queued book would be stale by the time it runs.

use std::sync::atomic::{AtomicUsize, Ordering};

/// High bit marks the single outstanding acquisition as exclusive
const EXCLUSIVE: usize = 1 << (usize::BITS - 1);

/// Counting gate with exclusive and shared acquisitions.
///
/// # Examples
///
/// ```
/// use liquidity_mirror::ExclusiveLock;
///
/// let lock = ExclusiveLock::new();
/// assert!(lock.acquire(true));
/// assert!(!lock.acquire(true));
/// assert!(!lock.acquire(false));
/// lock.release();
/// assert_eq!(lock.using(), 0);
/// assert!(lock.acquire(true));
/// ```
#[derive(Debug, Default)]
pub struct ExclusiveLock {
    state: AtomicUsize,
}

impl ExclusiveLock {
    /// Creates an unheld gate
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tries to acquire the gate.
    ///
    /// An exclusive request succeeds only when nothing is outstanding; a
    /// shared request succeeds unless an exclusive acquisition is
    /// outstanding. Returns `false` immediately on conflict.
    pub fn acquire(&self, exclusive: bool) -> bool {
        if exclusive {
            return self
                .state
                .compare_exchange(0, EXCLUSIVE | 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();
        }
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                (state & EXCLUSIVE == 0).then(|| state + 1)
            })
            .is_ok()
    }

    /// Releases one outstanding acquisition. Returns `false` if nothing was held.
    pub fn release(&self) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                match state & !EXCLUSIVE {
                    0 => None,
                    1 => Some(0),
                    _ => Some(state - 1),
                }
            })
            .is_ok()
    }

    /// Number of outstanding acquisitions
    #[must_use]
    pub fn using(&self) -> usize {
        self.state.load(Ordering::Acquire) & !EXCLUSIVE
    }

    /// Returns `true` while an exclusive acquisition is outstanding
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.state.load(Ordering::Acquire) & EXCLUSIVE != 0
    }

    /// Exclusive acquisition released when the guard drops
    #[must_use]
    pub fn try_exclusive(&self) -> Option<AccessGuard<'_>> {
        self.acquire(true).then_some(AccessGuard { lock: self })
    }

    /// Shared acquisition released when the guard drops
    #[must_use]
    pub fn try_shared(&self) -> Option<AccessGuard<'_>> {
        self.acquire(false).then_some(AccessGuard { lock: self })
    }
}

/// Releases its acquisition on drop, on every exit path.
#[derive(Debug)]
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct AccessGuard<'a> {
    lock: &'a ExclusiveLock,
}

impl Drop for AccessGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
