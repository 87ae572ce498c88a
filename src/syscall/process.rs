//! Process System Calls
//!
//! exec and wait. halt and exit never get here; the dispatcher turns them
//! straight into a [`Termination`](super::Termination).

use crate::drivers::{Console, Keyboard};
use crate::fs::FileSystem;
use crate::process::{ChildProcess, Pid, ProcessLifecycle};

use super::handler::Syscalls;

impl<F, L, C, K> Syscalls<F, L, C, K>
where
    F: FileSystem,
    L: ProcessLifecycle,
    C: Console,
    K: Keyboard,
{
    /// exec(cmd_line) -> pid or -1
    ///
    /// Returns only once the child has either loaded its program or failed
    /// to. The filesystem lock is held throughout, since loading reads the
    /// executable.
    pub(crate) fn sys_exec(&self, parent: Pid, cmd_line: &[u8]) -> Pid {
        let Ok(cmd_line) = core::str::from_utf8(cmd_line) else {
            log::debug!("[SYSCALL] exec: command line is not UTF-8");
            return Pid::ERROR;
        };

        let _fs = self.fs.lock();

        let Some(pid) = self.lifecycle.create_process(parent, cmd_line) else {
            log::debug!("[SYSCALL] exec: could not create process for {:?}", cmd_line);
            return Pid::ERROR;
        };

        match self.lifecycle.get_child(parent, pid) {
            Some(child) if child.wait_loaded() => {
                log::debug!("[SYSCALL] pid {}: exec {:?} -> {}", parent, cmd_line, pid);
                pid
            }
            _ => {
                log::debug!("[SYSCALL] pid {}: exec {:?} failed to load", parent, cmd_line);
                Pid::ERROR
            }
        }
    }

    /// wait(pid) -> exit status or -1
    ///
    /// Blocks inside the lifecycle collaborator. Never takes the filesystem
    /// lock.
    pub(crate) fn sys_wait(&self, parent: Pid, pid: Pid) -> i32 {
        if self.lifecycle.get_child(parent, pid).is_none() {
            return -1;
        }
        self.lifecycle.join(parent, pid)
    }
}
