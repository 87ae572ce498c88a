//! Global Filesystem Lock
//!
//! A single spinlock owns the filesystem collaborator, so the only way to
//! reach it is through an [`FsGuard`]. This totally orders every
//! filesystem-affecting system call across all processes.
//!
//! The lock also serializes descriptor table mutation as a side effect,
//! since every table operation happens with a guard held. Splitting it into
//! a filesystem lock and a per-table lock is a possible performance
//! refinement.
//!
//! # Instrumentation
//! The lock counts current holders and remembers the highest count ever
//! observed. The count can never legitimately exceed one.

use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::{Mutex, MutexGuard};

/// The global filesystem lock.
pub struct FsLock<F> {
    fs: Mutex<F>,
    holders: AtomicUsize,
    peak: AtomicUsize,
}

impl<F> FsLock<F> {
    /// Wrap the filesystem. Called once at subsystem start.
    pub const fn new(fs: F) -> Self {
        Self {
            fs: Mutex::new(fs),
            holders: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Acquire the lock, spinning until it is free.
    pub fn lock(&self) -> FsGuard<'_, F> {
        let guard = self.fs.lock();
        let now = self.holders.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        FsGuard { guard, lock: self }
    }

    /// Number of threads currently holding the lock.
    pub fn holders(&self) -> usize {
        self.holders.load(Ordering::Acquire)
    }

    /// Highest number of simultaneous holders ever observed.
    pub fn peak_holders(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}

/// Exclusive access to the filesystem. Released on drop.
pub struct FsGuard<'a, F> {
    guard: MutexGuard<'a, F>,
    lock: &'a FsLock<F>,
}

impl<F> Deref for FsGuard<'_, F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.guard
    }
}

impl<F> DerefMut for FsGuard<'_, F> {
    fn deref_mut(&mut self) -> &mut F {
        &mut self.guard
    }
}

impl<F> Drop for FsGuard<'_, F> {
    fn drop(&mut self) {
        // Runs before the inner mutex guard is released.
        self.lock.holders.fetch_sub(1, Ordering::AcqRel);
    }
}
