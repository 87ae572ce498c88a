//! Filesystem System Calls
//!
//! create, remove, open, filesize, read, write, seek, tell, close.
//!
//! Each handler takes the global filesystem lock first and holds it for
//! its whole body; the guard releases it on every return path. Buffers
//! arrive already validated and translated.
//!
//! Descriptors 0 and 1 are the console streams and never live in the
//! descriptor table.

use alloc::vec;

use crate::drivers::{Console, Keyboard};
use crate::fs::fdtable::{STDIN_FILENO, STDOUT_FILENO};
use crate::fs::{DescriptorTable, FileSystem};
use crate::process::ProcessLifecycle;

use super::handler::Syscalls;
use super::validate::{KernelBuffer, KernelBufferMut};

/// `tell` result for an unknown descriptor.
pub const TELL_NOT_FOUND: u32 = u32::MAX;

/// Interpret a user-supplied name. A name that is not UTF-8 cannot exist.
fn path_from(name: &[u8]) -> Option<&str> {
    match core::str::from_utf8(name) {
        Ok(path) => Some(path),
        Err(_) => {
            log::debug!("[SYSCALL] rejecting non-UTF-8 name ({} bytes)", name.len());
            None
        }
    }
}

impl<F, L, C, K> Syscalls<F, L, C, K>
where
    F: FileSystem,
    L: ProcessLifecycle,
    C: Console,
    K: Keyboard,
{
    /// create(file, initial_size) -> bool
    pub(crate) fn sys_create(&self, name: &[u8], initial_size: u32) -> bool {
        let mut fs = self.fs.lock();
        path_from(name).is_some_and(|path| fs.create(path, initial_size))
    }

    /// remove(file) -> bool
    pub(crate) fn sys_remove(&self, name: &[u8]) -> bool {
        let mut fs = self.fs.lock();
        path_from(name).is_some_and(|path| fs.remove(path))
    }

    /// open(file) -> fd or -1
    pub(crate) fn sys_open(&self, fds: &mut DescriptorTable<F::Handle>, name: &[u8]) -> i32 {
        let mut fs = self.fs.lock();
        match path_from(name) {
            Some(path) => fds.open(&mut *fs, path),
            None => -1,
        }
    }

    /// filesize(fd) -> size or -1
    pub(crate) fn sys_filesize(&self, fds: &mut DescriptorTable<F::Handle>, fd: i32) -> i32 {
        let mut fs = self.fs.lock();
        match fds.lookup(fd) {
            Some(file) => fs.length(file) as i32,
            None => -1,
        }
    }

    /// read(fd, buffer, size) -> bytes read or -1
    ///
    /// Console input always yields exactly `size` bytes. Reading the output
    /// stream, or any descriptor while the table is empty, yields 0.
    pub(crate) fn sys_read(
        &self,
        fds: &mut DescriptorTable<F::Handle>,
        fd: i32,
        mut buf: KernelBufferMut,
    ) -> i32 {
        let mut fs = self.fs.lock();

        if fd == STDIN_FILENO {
            let mut keys = vec![0u8; buf.len()];
            for key in keys.iter_mut() {
                *key = self.keyboard.read_char();
            }
            buf.copy_from(&keys);
            return buf.len() as i32;
        }

        if fd == STDOUT_FILENO || fds.is_empty() {
            return 0;
        }

        let Some(file) = fds.lookup(fd) else {
            log::debug!("[SYSCALL] read: unknown fd {}", fd);
            return -1;
        };

        let mut data = vec![0u8; buf.len()];
        let n = fs.read(file, &mut data).min(data.len());
        buf.copy_from(&data[..n]) as i32
    }

    /// write(fd, buffer, size) -> bytes written or -1
    ///
    /// Console output is handed over in a single `write_bytes` call.
    pub(crate) fn sys_write(
        &self,
        fds: &mut DescriptorTable<F::Handle>,
        fd: i32,
        buf: &KernelBuffer,
    ) -> i32 {
        let mut fs = self.fs.lock();

        if fd == STDOUT_FILENO {
            self.console.write_bytes(&buf.to_vec());
            return buf.len() as i32;
        }

        if fd == STDIN_FILENO || fds.is_empty() {
            return 0;
        }

        let Some(file) = fds.lookup(fd) else {
            log::debug!("[SYSCALL] write: unknown fd {}", fd);
            return -1;
        };

        fs.write(file, &buf.to_vec()) as i32
    }

    /// seek(fd, position)
    pub(crate) fn sys_seek(&self, fds: &mut DescriptorTable<F::Handle>, fd: i32, position: u32) {
        let mut fs = self.fs.lock();
        if let Some(file) = fds.lookup(fd) {
            fs.seek(file, position);
        }
    }

    /// tell(fd) -> position, or `u32::MAX` for an unknown descriptor
    pub(crate) fn sys_tell(&self, fds: &mut DescriptorTable<F::Handle>, fd: i32) -> u32 {
        let mut fs = self.fs.lock();
        match fds.lookup(fd) {
            Some(file) => fs.tell(file),
            None => TELL_NOT_FOUND,
        }
    }

    /// close(fd)
    pub(crate) fn sys_close(&self, fds: &mut DescriptorTable<F::Handle>, fd: i32) {
        let mut fs = self.fs.lock();
        fds.close(&mut *fs, fd);
    }
}
