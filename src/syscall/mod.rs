//! System Call Interface
//!
//! Entry point for user programs trapping on vector 0x30.
//!
//! # Security Model
//! - Whitelist approach: only the thirteen numbered calls exist
//! - Every user address is validated before the kernel touches it
//! - Contract violations kill the caller; they never panic the kernel
//! - Filesystem work is serialized by one global lock
//!
//! # Calls
//! - 0: halt()
//! - 1: exit(status)
//! - 2: exec(cmd_line) -> pid
//! - 3: wait(pid) -> status
//! - 4: create(file, initial_size) -> bool
//! - 5: remove(file) -> bool
//! - 6: open(file) -> fd
//! - 7: filesize(fd) -> size
//! - 8: read(fd, buffer, size) -> count
//! - 9: write(fd, buffer, size) -> count
//! - 10: seek(fd, position)
//! - 11: tell(fd) -> position
//! - 12: close(fd)

mod args;
mod file;
mod handler;
mod process;
mod validate;

pub use args::{marshal, SyscallArgs, MAX_ARGS};
pub use file::TELL_NOT_FOUND;
pub use handler::{numbers, SyscallError, SyscallNumber, Syscalls, Termination};
pub use validate::{Access, KernelBuffer, KernelBufferMut, UserBuffer, UserBufferMut, UserMemory};
