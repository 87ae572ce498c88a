//! User and Kernel Address Types
//!
//! Type-safe wrappers that keep user virtual addresses and kernel-mapped
//! addresses apart at compile time.
//!
//! # Security Properties
//! - A user address is never dereferenced; it must be translated first
//! - A kernel address only comes out of a page directory lookup
//! - Pointer conversion of a kernel address is explicitly `unsafe`

use core::fmt;

/// Page size (4 KiB)
pub const PAGE_SIZE: usize = 4096;
/// Page size mask
pub const PAGE_MASK: usize = PAGE_SIZE - 1;

/// Size of one argument word on the user stack (32-bit user ABI).
pub const WORD_SIZE: usize = 4;

/// User address space layout.
pub mod regions {
    /// Lowest address a user program maps; the code segment starts here
    /// and nothing legitimate lives below it.
    pub const USER_CODE_START: usize = 0x0804_8000;
    /// First kernel address (the user/kernel split).
    pub const PHYS_BASE: usize = 0xC000_0000;
}

/// A user virtual address as handed to the kernel by a process.
///
/// Holding a `VirtAddr` says nothing about whether it is safe to touch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtAddr(usize);

impl VirtAddr {
    /// The null user address.
    pub const NULL: Self = Self(0);

    /// Create a new user virtual address.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check for the null address.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Check if the address lies in the user half, below `PHYS_BASE`
    /// and not below the start of the program image.
    #[inline]
    pub const fn is_user(self) -> bool {
        self.0 >= regions::USER_CODE_START && self.0 < regions::PHYS_BASE
    }

    /// Align the address down to the start of its page.
    #[inline]
    pub const fn align_down(self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }

    /// Get the page offset (lowest 12 bits).
    #[inline]
    pub const fn page_offset(self) -> usize {
        self.0 & PAGE_MASK
    }

    /// Add an offset, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(self, offset: usize) -> Option<Self> {
        match self.0.checked_add(offset) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#010x})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// A kernel-side address backing some user page.
///
/// Only a [`PageDirectory`](super::paging::PageDirectory) produces these, so
/// a `KernelAddr` is never an arithmetic value that happened to look like
/// a pointer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct KernelAddr(usize);

impl KernelAddr {
    /// Wrap a kernel mapping address.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Wrap a kernel pointer.
    #[inline]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Add an offset to this address.
    #[inline]
    pub const fn add(self, offset: usize) -> Self {
        Self(self.0 + offset)
    }

    /// Convert to a raw pointer.
    ///
    /// # Safety
    /// The caller must ensure the address is still mapped by the page
    /// directory that produced it.
    #[inline]
    pub const unsafe fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    /// Convert to a mutable raw pointer.
    ///
    /// # Safety
    /// The caller must ensure the address is still mapped, writable,
    /// and not aliased.
    #[inline]
    pub const unsafe fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

impl fmt::Debug for KernelAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KernelAddr({:#018x})", self.0)
    }
}
