//! PantherOS User Program System Calls
//!
//! The kernel side of the user-program interface: trap entry on vector
//! 0x30, argument marshaling, user-memory validation, per-process file
//! descriptors and the thirteen system calls.
//!
//! # Security Features
//! - Every user pointer is checked byte by byte before it is dereferenced
//! - Type-safe split between user and kernel addresses
//! - Fatal errors are values; a misbehaving process is torn down, the
//!   kernel keeps running
//! - One global lock serializes all filesystem access
//!
//! # Architecture
//! - Target: 32-bit user ABI (4-byte little-endian words)
//! - User space: `[0x0804_8000, 0xc000_0000)`
//! - Collaborators (filesystem, scheduler, console, keyboard, page
//!   directory) are traits, so the layer builds and tests on the host

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod drivers;
pub mod fs;
pub mod mm;
pub mod process;
pub mod syscall;
pub mod trap;

#[cfg(test)]
mod testkit;

pub use process::{Pid, UserProcess};
pub use syscall::{SyscallError, Syscalls, Termination};
pub use trap::{Outcome, TrapFrame};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
