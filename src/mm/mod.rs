//! Memory management interface for the system-call layer
//!
//! Provides:
//! - User and kernel address types
//! - The page directory lookup used to translate user addresses
//!
//! # Security Principles
//! - User addresses are opaque until translated
//! - Unsafe code is minimal and audited

pub mod address;
pub mod paging;

pub use address::{regions, KernelAddr, VirtAddr, PAGE_SIZE, WORD_SIZE};
pub use paging::{PageDirectory, PageFlags, PageMapping, Translation};
