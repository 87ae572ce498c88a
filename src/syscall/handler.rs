//! System Call Dispatcher
//!
//! Decodes a trapped system call and runs the matching handler.
//!
//! # Security Considerations
//! - The syscall-number slot is validated before the number is read
//! - Each argument slot is validated before it is read
//! - Pointer arguments are validated (every byte of a buffer) and then
//!   translated before any handler sees them
//! - Unknown syscall numbers kill the caller (fail-closed)

use core::fmt;

use crate::drivers::{Console, Keyboard};
use crate::fs::{FileSystem, FsLock};
use crate::mm::{PageDirectory, VirtAddr};
use crate::process::{Pid, ProcessLifecycle, UserProcess};
use crate::trap::{TrapFrame, SYSCALL_VECTOR};

use super::args;
use super::validate::UserMemory;

/// System call numbers.
///
/// Binary contract with existing user programs; never renumber.
pub mod numbers {
    pub const SYS_HALT: u32 = 0;
    pub const SYS_EXIT: u32 = 1;
    pub const SYS_EXEC: u32 = 2;
    pub const SYS_WAIT: u32 = 3;
    pub const SYS_CREATE: u32 = 4;
    pub const SYS_REMOVE: u32 = 5;
    pub const SYS_OPEN: u32 = 6;
    pub const SYS_FILESIZE: u32 = 7;
    pub const SYS_READ: u32 = 8;
    pub const SYS_WRITE: u32 = 9;
    pub const SYS_SEEK: u32 = 10;
    pub const SYS_TELL: u32 = 11;
    pub const SYS_CLOSE: u32 = 12;
}

/// A decoded system call number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SyscallNumber {
    /// Power off the machine.
    Halt = numbers::SYS_HALT,
    /// Terminate the calling process.
    Exit = numbers::SYS_EXIT,
    /// Start a child process.
    Exec = numbers::SYS_EXEC,
    /// Wait for a child to die.
    Wait = numbers::SYS_WAIT,
    /// Create a file.
    Create = numbers::SYS_CREATE,
    /// Delete a file.
    Remove = numbers::SYS_REMOVE,
    /// Open a file.
    Open = numbers::SYS_OPEN,
    /// Size of an open file.
    Filesize = numbers::SYS_FILESIZE,
    /// Read from a descriptor.
    Read = numbers::SYS_READ,
    /// Write to a descriptor.
    Write = numbers::SYS_WRITE,
    /// Move a file position.
    Seek = numbers::SYS_SEEK,
    /// Report a file position.
    Tell = numbers::SYS_TELL,
    /// Close a descriptor.
    Close = numbers::SYS_CLOSE,
}

impl SyscallNumber {
    /// Number of argument words the call takes.
    pub const fn arg_count(self) -> usize {
        match self {
            Self::Halt => 0,
            Self::Exit | Self::Exec | Self::Wait => 1,
            Self::Remove | Self::Open | Self::Filesize | Self::Tell | Self::Close => 1,
            Self::Create | Self::Seek => 2,
            Self::Read | Self::Write => 3,
        }
    }
}

impl TryFrom<u32> for SyscallNumber {
    type Error = SyscallError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        use numbers::*;
        Ok(match raw {
            SYS_HALT => Self::Halt,
            SYS_EXIT => Self::Exit,
            SYS_EXEC => Self::Exec,
            SYS_WAIT => Self::Wait,
            SYS_CREATE => Self::Create,
            SYS_REMOVE => Self::Remove,
            SYS_OPEN => Self::Open,
            SYS_FILESIZE => Self::Filesize,
            SYS_READ => Self::Read,
            SYS_WRITE => Self::Write,
            SYS_SEEK => Self::Seek,
            SYS_TELL => Self::Tell,
            SYS_CLOSE => Self::Close,
            _ => return Err(SyscallError::UnrecognizedCall(raw)),
        })
    }
}

/// Conditions that are fatal to the calling process.
///
/// Recoverable conditions (unknown descriptor, missing file, failed load)
/// never show up here; they are returned to the caller as sentinel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// Null, out-of-range or unmapped user address.
    InvalidAccess(VirtAddr),
    /// No such system call.
    UnrecognizedCall(u32),
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAccess(addr) => write!(f, "invalid user access at {}", addr),
            Self::UnrecognizedCall(nr) => write!(f, "unrecognized system call {}", nr),
        }
    }
}

/// Why the calling process stops running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process called `exit`.
    Exit(i32),
    /// The process broke the system-call contract.
    Killed(SyscallError),
    /// The process raised an exception other than a system call.
    Fault(u32),
    /// The process called `halt`.
    PowerOff,
}

impl Termination {
    /// Exit status recorded for the process.
    pub const fn exit_status(self) -> i32 {
        match self {
            Self::Exit(status) => status,
            Self::Killed(_) | Self::Fault(_) => -1,
            Self::PowerOff => 0,
        }
    }
}

impl From<SyscallError> for Termination {
    fn from(err: SyscallError) -> Self {
        Self::Killed(err)
    }
}

/// The system-call layer: the global filesystem lock plus the
/// collaborators every handler calls into.
pub struct Syscalls<F, L, C, K> {
    pub(crate) fs: FsLock<F>,
    pub(crate) lifecycle: L,
    pub(crate) console: C,
    pub(crate) keyboard: K,
}

impl<F, L, C, K> Syscalls<F, L, C, K>
where
    F: FileSystem,
    L: ProcessLifecycle,
    C: Console,
    K: Keyboard,
{
    /// Bring up the system-call layer. Called once at kernel start, after
    /// the trap vector is installed.
    pub fn new(fs: F, lifecycle: L, console: C, keyboard: K) -> Self {
        log::info!("[SYSCALL] handler on vector {:#04x}", SYSCALL_VECTOR);
        Self {
            fs: FsLock::new(fs),
            lifecycle,
            console,
            keyboard,
        }
    }

    /// The global filesystem lock.
    pub fn fs_lock(&self) -> &FsLock<F> {
        &self.fs
    }

    /// The process-lifecycle collaborator.
    pub fn lifecycle(&self) -> &L {
        &self.lifecycle
    }

    /// The console collaborator.
    pub fn console(&self) -> &C {
        &self.console
    }

    /// The keyboard collaborator.
    pub fn keyboard(&self) -> &K {
        &self.keyboard
    }

    /// Decode and run the system call described by `frame`.
    ///
    /// On success the return value, if the call has one, is stored in
    /// `frame.eax`. An `Err` means the process must stop; the caller hands it
    /// to the teardown path.
    pub fn dispatch<P: PageDirectory>(
        &self,
        process: &mut UserProcess<F::Handle, P>,
        frame: &mut TrapFrame,
    ) -> Result<(), Termination> {
        let UserProcess {
            pid,
            pagedir,
            descriptors,
            ..
        } = process;
        let pid = *pid;
        let mem = UserMemory::new(&*pagedir);

        let sp = VirtAddr::new(frame.esp as usize);
        let call = SyscallNumber::try_from(mem.read_word(sp)?)?;
        let args = args::marshal(&mem, sp, call.arg_count())?;
        log::trace!("[SYSCALL] pid {}: {:?} {:?}", pid, call, args);

        let ret = match call {
            SyscallNumber::Halt => return Err(Termination::PowerOff),
            SyscallNumber::Exit => return Err(Termination::Exit(args.int(0))),
            SyscallNumber::Exec => {
                let cmd_line = args.ptr(0);
                let child = if cmd_line.is_null() {
                    Pid::ERROR
                } else {
                    self.sys_exec(pid, &mem.read_cstr(cmd_line)?)
                };
                Some(child.as_i32() as u32)
            }
            SyscallNumber::Wait => Some(self.sys_wait(pid, Pid::new(args.int(0))) as u32),
            SyscallNumber::Create => {
                let name = mem.read_cstr(args.ptr(0))?;
                Some(u32::from(self.sys_create(&name, args.size(1))))
            }
            SyscallNumber::Remove => {
                let name = mem.read_cstr(args.ptr(0))?;
                Some(u32::from(self.sys_remove(&name)))
            }
            SyscallNumber::Open => {
                let name = mem.read_cstr(args.ptr(0))?;
                Some(self.sys_open(descriptors, &name) as u32)
            }
            SyscallNumber::Filesize => Some(self.sys_filesize(descriptors, args.int(0)) as u32),
            SyscallNumber::Read => {
                let buf = mem
                    .validate_buffer_mut(args.ptr(1), args.size(2) as usize)?
                    .translate(&mem)?;
                Some(self.sys_read(descriptors, args.int(0), buf) as u32)
            }
            SyscallNumber::Write => {
                let buf = mem
                    .validate_buffer(args.ptr(1), args.size(2) as usize)?
                    .translate(&mem)?;
                Some(self.sys_write(descriptors, args.int(0), &buf) as u32)
            }
            SyscallNumber::Seek => {
                self.sys_seek(descriptors, args.int(0), args.size(1));
                None
            }
            SyscallNumber::Tell => Some(self.sys_tell(descriptors, args.int(0))),
            SyscallNumber::Close => {
                self.sys_close(descriptors, args.int(0));
                None
            }
        };

        if let Some(value) = ret {
            frame.eax = value;
        }
        Ok(())
    }
}
