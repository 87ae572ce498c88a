//! Per-Process File Descriptor Table
//!
//! Maps small integers to open file handles for one process.
//!
//! # Design
//! - Descriptors come from a per-process counter starting at 2 and are
//!   never reused within the process's lifetime
//! - 0 and 1 (console input/output) never appear in the table
//! - Each entry exclusively owns its handle; the handle is closed exactly
//!   once, when the entry is removed
//! - Lookup is a linear scan; tables are small
//!
//! The table has no lock of its own. Callers hold the global filesystem
//! lock, which is needed anyway to open or close the underlying handle.

use alloc::vec::Vec;

use super::FileSystem;

/// Descriptor of the console input stream.
pub const STDIN_FILENO: i32 = 0;
/// Descriptor of the console output stream.
pub const STDOUT_FILENO: i32 = 1;
/// First descriptor handed out by `open`.
pub const FIRST_FD: i32 = 2;

/// One open file.
struct FileDescriptor<H> {
    fd: i32,
    handle: H,
}

/// A process's open files.
pub struct DescriptorTable<H> {
    entries: Vec<FileDescriptor<H>>,
    next_fd: i32,
}

impl<H> DescriptorTable<H> {
    /// Create an empty table.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_fd: FIRST_FD,
        }
    }

    /// Open `path` and enter the handle into the table.
    ///
    /// Returns the new descriptor, or -1 if the file could not be opened.
    pub fn open<F>(&mut self, fs: &mut F, path: &str) -> i32
    where
        F: FileSystem<Handle = H>,
    {
        let Some(handle) = fs.open(path) else {
            log::debug!("[FD] open: {:?} not found", path);
            return -1;
        };

        match self.insert(handle) {
            Ok(fd) => fd,
            Err(handle) => {
                log::warn!("[FD] open: descriptor space exhausted");
                fs.close(handle);
                -1
            }
        }
    }

    /// Enter an already-open handle, allocating the next descriptor.
    ///
    /// Hands the handle back if the counter is exhausted.
    pub fn insert(&mut self, handle: H) -> Result<i32, H> {
        let fd = self.next_fd;
        let Some(next) = fd.checked_add(1) else {
            return Err(handle);
        };
        self.next_fd = next;
        self.entries.push(FileDescriptor { fd, handle });
        Ok(fd)
    }

    /// Find the handle behind `fd`.
    pub fn lookup(&mut self, fd: i32) -> Option<&mut H> {
        self.entries
            .iter_mut()
            .find(|entry| entry.fd == fd)
            .map(|entry| &mut entry.handle)
    }

    /// Take the entry for `fd` out of the table.
    pub fn remove(&mut self, fd: i32) -> Option<H> {
        let index = self.entries.iter().position(|entry| entry.fd == fd)?;
        Some(self.entries.swap_remove(index).handle)
    }

    /// Close `fd`. Unknown or already-closed descriptors are ignored.
    pub fn close<F>(&mut self, fs: &mut F, fd: i32)
    where
        F: FileSystem<Handle = H>,
    {
        if let Some(handle) = self.remove(fd) {
            fs.close(handle);
        }
    }

    /// Close every entry. Used at process teardown.
    pub fn close_all<F>(&mut self, fs: &mut F)
    where
        F: FileSystem<Handle = H>,
    {
        for entry in self.entries.drain(..) {
            fs.close(entry.handle);
        }
    }

    /// Number of open entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check for an empty table.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The descriptor the next successful `open` will return.
    pub fn next_fd(&self) -> i32 {
        self.next_fd
    }
}

impl<H> Default for DescriptorTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Drop for DescriptorTable<H> {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            log::warn!(
                "[FD] table dropped with {} open file(s); handles not closed",
                self.entries.len()
            );
        }
    }
}
