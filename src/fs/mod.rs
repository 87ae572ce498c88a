//! Filesystem interface for the system-call layer
//!
//! The on-disk filesystem lives elsewhere. This module defines:
//! - The [`FileSystem`] collaborator trait
//! - The global filesystem lock that serializes every call into it
//! - The per-process descriptor table mapping small integers to handles

pub mod fdtable;
pub mod lock;

pub use fdtable::DescriptorTable;
pub use lock::{FsGuard, FsLock};

/// Filesystem collaborator.
///
/// Every method is reached only through an [`FsGuard`], so implementations
/// never see two callers at once.
pub trait FileSystem {
    /// An open file. Owned by exactly one descriptor table entry and
    /// released through [`close`](FileSystem::close).
    type Handle;

    /// Create `path` with `initial_size` bytes. True iff created.
    fn create(&mut self, path: &str, initial_size: u32) -> bool;

    /// Remove `path`. Already-open handles stay usable. True iff removed.
    fn remove(&mut self, path: &str) -> bool;

    /// Open `path`, or `None` if missing or unreadable.
    fn open(&mut self, path: &str) -> Option<Self::Handle>;

    /// Read at the current position. Returns bytes read; 0 at end of file.
    fn read(&mut self, file: &mut Self::Handle, buf: &mut [u8]) -> usize;

    /// Write at the current position. Returns bytes written.
    fn write(&mut self, file: &mut Self::Handle, buf: &[u8]) -> usize;

    /// Move the position to `position` bytes from the start.
    fn seek(&mut self, file: &mut Self::Handle, position: u32);

    /// Current position in bytes from the start.
    fn tell(&mut self, file: &Self::Handle) -> u32;

    /// File length in bytes.
    fn length(&mut self, file: &Self::Handle) -> u32;

    /// Close the handle.
    fn close(&mut self, file: Self::Handle);
}
