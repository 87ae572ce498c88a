//! System Call Input Validation
//!
//! Every address a process hands the kernel goes through this module
//! before anything reads or writes it.
//!
//! # Security Principles
//! - Validate ALL inputs before use
//! - Fail-secure: a bad address is fatal to the caller, never recoverable
//! - Check every byte of a buffer, since a buffer can straddle into an
//!   unmapped page
//! - Copy user data into kernel memory once (no TOCTOU on user pages)
//!
//! An address is invalid if it is null, at or above `PHYS_BASE`, below the
//! start of the program image, or on a page the process has not mapped.

use alloc::vec::Vec;

use crate::mm::{KernelAddr, PageDirectory, PageFlags, PageMapping, Translation, VirtAddr};
use crate::mm::{PAGE_SIZE, WORD_SIZE};

use super::handler::SyscallError;

/// How the kernel is going to touch a user address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The kernel reads from user memory.
    Read,
    /// The kernel writes into user memory.
    Write,
}

/// Validator and translator for one process's address space.
pub struct UserMemory<'a, P: ?Sized> {
    pagedir: &'a P,
}

impl<'a, P: PageDirectory + ?Sized> UserMemory<'a, P> {
    /// Bind to the current process's page directory.
    pub fn new(pagedir: &'a P) -> Self {
        Self { pagedir }
    }

    /// Check that `addr` is safe to read.
    pub fn validate(&self, addr: VirtAddr) -> Result<(), SyscallError> {
        self.check(addr, Access::Read).map(|_| ())
    }

    /// Full check of a single byte address.
    fn check(&self, addr: VirtAddr, access: Access) -> Result<PageMapping, SyscallError> {
        if addr.is_null() || !addr.is_user() {
            return Err(SyscallError::InvalidAccess(addr));
        }

        let mapping = self
            .pagedir
            .lookup(addr.align_down())
            .ok_or(SyscallError::InvalidAccess(addr))?;

        if !mapping.flags.contains(PageFlags::USER) {
            return Err(SyscallError::InvalidAccess(addr));
        }
        if access == Access::Write && !mapping.flags.contains(PageFlags::WRITABLE) {
            return Err(SyscallError::InvalidAccess(addr));
        }

        Ok(mapping)
    }

    /// Translate a validated address to the kernel address backing it.
    ///
    /// An address can pass the range check and still be unmapped, so an
    /// unmapped page is an invalid access here too.
    pub fn translate(&self, addr: VirtAddr) -> Result<KernelAddr, SyscallError> {
        match Translation::of(self.pagedir, addr) {
            Translation::Mapped(kaddr) => Ok(kaddr),
            Translation::Unmapped => Err(SyscallError::InvalidAccess(addr)),
        }
    }

    /// Validate `[addr, addr + len)` one byte at a time.
    ///
    /// The start address is checked even for an empty buffer.
    fn check_range(&self, addr: VirtAddr, len: usize, access: Access) -> Result<(), SyscallError> {
        self.check(addr, access)?;
        for offset in 1..len {
            let byte = addr
                .checked_add(offset)
                .ok_or(SyscallError::InvalidAccess(addr))?;
            self.check(byte, access)?;
        }
        Ok(())
    }

    /// Validate a buffer the kernel will read from.
    pub fn validate_buffer(&self, addr: VirtAddr, len: usize) -> Result<UserBuffer, SyscallError> {
        self.check_range(addr, len, Access::Read)?;
        Ok(UserBuffer { addr, len })
    }

    /// Validate a buffer the kernel will write into.
    pub fn validate_buffer_mut(
        &self,
        addr: VirtAddr,
        len: usize,
    ) -> Result<UserBufferMut, SyscallError> {
        self.check_range(addr, len, Access::Write)?;
        Ok(UserBufferMut { addr, len })
    }

    /// Validate, translate and read one byte.
    pub fn read_byte(&self, addr: VirtAddr) -> Result<u8, SyscallError> {
        self.validate(addr)?;
        let kaddr = self.translate(addr)?;

        // SAFETY:
        // - The byte lies on a present user page of this address space
        // - PageDirectory implementors guarantee the frame stays readable
        //   while the process is inside a system call
        Ok(unsafe { core::ptr::read_volatile(kaddr.as_ptr::<u8>()) })
    }

    /// Read a little-endian machine word, validating each of its bytes.
    ///
    /// The word may straddle a page boundary.
    pub fn read_word(&self, addr: VirtAddr) -> Result<u32, SyscallError> {
        let mut bytes = [0u8; WORD_SIZE];
        for (offset, byte) in bytes.iter_mut().enumerate() {
            let at = addr
                .checked_add(offset)
                .ok_or(SyscallError::InvalidAccess(addr))?;
            *byte = self.read_byte(at)?;
        }
        Ok(u32::from_le_bytes(bytes))
    }

    /// Copy a NUL-terminated string into kernel memory.
    ///
    /// Each byte is validated before it is read, up to and including the
    /// terminator. The terminator is not part of the result.
    pub fn read_cstr(&self, addr: VirtAddr) -> Result<Vec<u8>, SyscallError> {
        let mut bytes = Vec::new();
        let mut at = addr;
        loop {
            match self.read_byte(at)? {
                0 => return Ok(bytes),
                byte => bytes.push(byte),
            }
            at = at.checked_add(1).ok_or(SyscallError::InvalidAccess(at))?;
        }
    }
}

/// A contiguous run of kernel memory inside one page frame.
#[derive(Debug, Clone, Copy)]
struct KernelChunk {
    base: KernelAddr,
    len: usize,
}

/// Split `[addr, addr + len)` at page boundaries and translate each piece.
fn translate_chunks<P: PageDirectory + ?Sized>(
    mem: &UserMemory<'_, P>,
    addr: VirtAddr,
    len: usize,
) -> Result<Vec<KernelChunk>, SyscallError> {
    let mut chunks = Vec::new();
    let mut at = addr;
    let mut remaining = len;

    while remaining > 0 {
        let chunk_len = (PAGE_SIZE - at.page_offset()).min(remaining);
        chunks.push(KernelChunk {
            base: mem.translate(at)?,
            len: chunk_len,
        });
        remaining -= chunk_len;
        if remaining > 0 {
            at = at
                .checked_add(chunk_len)
                .ok_or(SyscallError::InvalidAccess(at))?;
        }
    }

    Ok(chunks)
}

/// A validated user-space buffer the kernel reads from.
///
/// This type guarantees that every byte is inside user space and on a
/// present user page. It is only constructed by
/// [`UserMemory::validate_buffer`].
#[derive(Debug)]
pub struct UserBuffer {
    addr: VirtAddr,
    len: usize,
}

impl UserBuffer {
    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check for an empty buffer.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Translate into kernel-addressable pieces.
    pub fn translate<P: PageDirectory + ?Sized>(
        &self,
        mem: &UserMemory<'_, P>,
    ) -> Result<KernelBuffer, SyscallError> {
        Ok(KernelBuffer {
            chunks: translate_chunks(mem, self.addr, self.len)?,
            len: self.len,
        })
    }
}

/// A validated user-space buffer the kernel writes into.
///
/// Like [`UserBuffer`], plus every page is writable.
#[derive(Debug)]
pub struct UserBufferMut {
    addr: VirtAddr,
    len: usize,
}

impl UserBufferMut {
    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check for an empty buffer.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Translate into kernel-addressable pieces.
    pub fn translate<P: PageDirectory + ?Sized>(
        &self,
        mem: &UserMemory<'_, P>,
    ) -> Result<KernelBufferMut, SyscallError> {
        Ok(KernelBufferMut {
            chunks: translate_chunks(mem, self.addr, self.len)?,
            len: self.len,
        })
    }
}

/// A user buffer as the kernel sees it, valid for the current call only.
#[derive(Debug)]
pub struct KernelBuffer {
    chunks: Vec<KernelChunk>,
    len: usize,
}

impl KernelBuffer {
    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check for an empty buffer.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy the user bytes into kernel memory.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for chunk in &self.chunks {
            // SAFETY:
            // - Each chunk was translated from a validated user range
            // - A chunk never crosses the end of its page frame
            let bytes = unsafe { core::slice::from_raw_parts(chunk.base.as_ptr::<u8>(), chunk.len) };
            out.extend_from_slice(bytes);
        }
        out
    }
}

/// A writable user buffer as the kernel sees it.
#[derive(Debug)]
pub struct KernelBufferMut {
    chunks: Vec<KernelChunk>,
    len: usize,
}

impl KernelBufferMut {
    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check for an empty buffer.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy `data` into the user buffer. Returns the number of bytes copied,
    /// at most `len()`.
    pub fn copy_from(&mut self, data: &[u8]) -> usize {
        let mut copied = 0;
        for chunk in &self.chunks {
            if copied == data.len() {
                break;
            }
            let n = chunk.len.min(data.len() - copied);
            // SAFETY:
            // - Each chunk was translated from a range validated for writing
            // - A chunk never crosses the end of its page frame
            // - `data` is kernel memory and cannot overlap a user frame view
            //   handed out for this call
            unsafe {
                core::ptr::copy_nonoverlapping(
                    data[copied..].as_ptr(),
                    chunk.base.as_mut_ptr::<u8>(),
                    n,
                );
            }
            copied += n;
        }
        copied
    }
}
