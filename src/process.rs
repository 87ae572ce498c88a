//! User Process State
//!
//! The scheduler owns threads and the parent/child bookkeeping. This module
//! holds the part of a process the system-call layer reads and writes,
//! plus the lifecycle collaborator interface it calls into.

use alloc::string::String;
use core::fmt;

use crate::fs::DescriptorTable;
use crate::mm::PageDirectory;

/// A process identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Pid(i32);

impl Pid {
    /// Sentinel returned to user code when no process was created.
    pub const ERROR: Self = Self(-1);

    /// Wrap a raw process id.
    #[inline]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self.0
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pid({})", self.0)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A child as seen by its parent right after creation.
pub trait ChildProcess {
    /// Block until the child reports whether its program image loaded.
    /// True iff the child is runnable.
    fn wait_loaded(&self) -> bool;
}

/// Process-lifecycle collaborator (scheduler side).
pub trait ProcessLifecycle {
    /// Handle to a freshly created child.
    type Child: ChildProcess;

    /// Start a new process running `cmd_line`, child of `parent`.
    fn create_process(&self, parent: Pid, cmd_line: &str) -> Option<Pid>;

    /// Look up `pid` among the children of `parent` not yet waited for,
    /// whether still running or already exited.
    fn get_child(&self, parent: Pid, pid: Pid) -> Option<Self::Child>;

    /// Wait for child `pid` of `parent` to die and return its exit status.
    ///
    /// Returns -1 for a non-child or a child already waited for.
    fn join(&self, parent: Pid, pid: Pid) -> i32;

    /// Tear down the thread of `pid` after it recorded `status`, waking a
    /// parent blocked in `join`.
    fn exit(&self, pid: Pid, status: i32);

    /// Power off the machine.
    fn power_off(&self);
}

/// Per-process state owned by the system-call layer.
///
/// Created with the process and torn down by
/// [`Syscalls::terminate`](crate::syscall::Syscalls::terminate).
pub struct UserProcess<H, P> {
    pub(crate) pid: Pid,
    pub(crate) name: String,
    pub(crate) exit_status: Option<i32>,
    pub(crate) descriptors: DescriptorTable<H>,
    pub(crate) pagedir: P,
}

impl<H, P: PageDirectory> UserProcess<H, P> {
    /// Create the state for a freshly loaded process.
    pub fn new(pid: Pid, name: &str, pagedir: P) -> Self {
        Self {
            pid,
            name: String::from(name),
            exit_status: None,
            descriptors: DescriptorTable::new(),
            pagedir,
        }
    }

    /// Process id.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Program name, as printed in the exit message.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exit status, once the process has terminated.
    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    /// Open files.
    pub fn descriptors(&self) -> &DescriptorTable<H> {
        &self.descriptors
    }

    /// The process's address space.
    pub fn pagedir(&self) -> &P {
        &self.pagedir
    }

    /// Record the exit status. Only the first call has any effect.
    pub(crate) fn record_exit(&mut self, status: i32) -> i32 {
        *self.exit_status.get_or_insert(status)
    }
}
