//! System Call Argument Marshaling
//!
//! User stack at the time of the trap:
//!
//! ```text
//!   esp + 12  | arg 2 |
//!   esp +  8  | arg 1 |
//!   esp +  4  | arg 0 |
//!   esp       | number|
//! ```
//!
//! Every slot is validated on its own right before it is read, so a corrupt
//! stack pointer fails on the first bad slot. Pointer arguments come out of
//! here as plain words; the dispatcher validates what they point at.

use crate::mm::{PageDirectory, VirtAddr, WORD_SIZE};

use super::handler::SyscallError;
use super::validate::UserMemory;

/// Most arguments any call takes.
pub const MAX_ARGS: usize = 3;

/// The argument words of one system call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallArgs {
    words: [u32; MAX_ARGS],
    count: usize,
}

impl SyscallArgs {
    /// Number of marshaled words.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check for a call without arguments.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Raw word `index`. Unmarshaled slots read as 0.
    pub fn word(&self, index: usize) -> u32 {
        self.words.get(index).copied().unwrap_or(0)
    }

    /// Argument `index` as a signed integer (fd, pid, status).
    pub fn int(&self, index: usize) -> i32 {
        self.word(index) as i32
    }

    /// Argument `index` as an unsigned size or position.
    pub fn size(&self, index: usize) -> u32 {
        self.word(index)
    }

    /// Argument `index` as a user pointer.
    pub fn ptr(&self, index: usize) -> VirtAddr {
        VirtAddr::new(self.word(index) as usize)
    }
}

/// Address of argument slot `index` above `sp`.
fn slot(sp: VirtAddr, index: usize) -> Result<VirtAddr, SyscallError> {
    (index + 1)
        .checked_mul(WORD_SIZE)
        .and_then(|offset| sp.checked_add(offset))
        .ok_or(SyscallError::InvalidAccess(sp))
}

/// Read `count` argument words above the syscall-number slot at `sp`.
pub fn marshal<P: PageDirectory + ?Sized>(
    mem: &UserMemory<'_, P>,
    sp: VirtAddr,
    count: usize,
) -> Result<SyscallArgs, SyscallError> {
    debug_assert!(count <= MAX_ARGS);

    let mut args = SyscallArgs {
        words: [0; MAX_ARGS],
        count: count.min(MAX_ARGS),
    };
    for index in 0..args.count {
        args.words[index] = mem.read_word(slot(sp, index)?)?;
    }
    Ok(args)
}
