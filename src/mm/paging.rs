//! Process Page Directory Interface
//!
//! The page tables themselves belong to the virtual memory subsystem.
//! This module defines the narrow view the system-call layer needs:
//! "which kernel address backs this user page, and with what rights".
//!
//! # Security Properties
//! - Lookups are per address space; one process never sees another's pages
//! - The result is a tagged [`Translation`], never a raw integer

use bitflags::bitflags;

use super::address::{KernelAddr, VirtAddr};

bitflags! {
    /// Attributes of a user page mapping.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        /// Page may be written by user code.
        const WRITABLE = 1 << 1;
        /// Page is accessible from user mode.
        const USER = 1 << 2;

        /// Read-only user page (code, rodata).
        const USER_CODE = Self::USER.bits();
        /// Read/write user page (data, bss, stack).
        const USER_DATA = Self::USER.bits() | Self::WRITABLE.bits();
    }
}

/// One present user page as seen by the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageMapping {
    /// Kernel address of the first byte of the page frame.
    pub frame: KernelAddr,
    /// Access attributes.
    pub flags: PageFlags,
}

/// Page-table collaborator for one address space.
///
/// # Safety
/// Implementors guarantee that for every `Some(mapping)` returned by
/// [`lookup`](PageDirectory::lookup), the `PAGE_SIZE` bytes starting at
/// `mapping.frame` are valid for reads (and for writes when the mapping is
/// `WRITABLE`) until the page is unmapped. Unmapping never happens while the
/// owning process is inside a system call.
pub unsafe trait PageDirectory {
    /// Look up the page containing `upage`. `upage` is page-aligned.
    fn lookup(&self, upage: VirtAddr) -> Option<PageMapping>;
}

/// Result of translating a user address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Translation {
    /// The byte is backed by this kernel address.
    Mapped(KernelAddr),
    /// No page backs the address.
    Unmapped,
}

impl Translation {
    /// Translate a single user address through `pagedir`.
    pub fn of<P: PageDirectory + ?Sized>(pagedir: &P, addr: VirtAddr) -> Self {
        match pagedir.lookup(addr.align_down()) {
            Some(mapping) => Translation::Mapped(mapping.frame.add(addr.page_offset())),
            None => Translation::Unmapped,
        }
    }
}
