//! Trap Entry
//!
//! The single point where user traps land and where a process that must
//! stop is torn down.
//!
//! # Trap Causes
//! - 0x30: system call
//! - 0x0e: page fault
//! - anything else raised from user mode
//!
//! # Security Considerations
//! - Faults raised by user code kill only that process, never the kernel
//! - Every termination runs the same teardown, so files are always closed
//!   and the parent is always woken

use alloc::format;

use crate::drivers::{Console, Keyboard};
use crate::fs::FileSystem;
use crate::mm::PageDirectory;
use crate::process::{ProcessLifecycle, UserProcess};
use crate::syscall::{Syscalls, Termination};

/// Interrupt vector user programs use to enter the kernel.
pub const SYSCALL_VECTOR: u32 = 0x30;

/// Page-fault exception vector.
pub const PAGE_FAULT_VECTOR: u32 = 0x0e;

/// Registers saved by the interrupt stub.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrapFrame {
    /// Interrupt vector number
    pub vec_no: u32,
    /// Error code pushed by the CPU, or 0
    pub error_code: u32,
    /// Return value register
    pub eax: u32,
    /// Interrupted instruction
    pub eip: u32,
    /// User stack pointer
    pub esp: u32,
    /// Faulting address (CR2) for page faults
    pub fault_addr: u32,
}

impl TrapFrame {
    /// Frame for a system call trap with the given user stack pointer.
    pub const fn syscall(esp: u32) -> Self {
        Self {
            vec_no: SYSCALL_VECTOR,
            error_code: 0,
            eax: 0,
            eip: 0,
            esp,
            fault_addr: 0,
        }
    }
}

/// Why the CPU entered the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCause {
    Syscall,
    PageFault,
    Other(u32),
}

impl From<u32> for TrapCause {
    fn from(vec_no: u32) -> Self {
        match vec_no {
            SYSCALL_VECTOR => TrapCause::Syscall,
            PAGE_FAULT_VECTOR => TrapCause::PageFault,
            other => TrapCause::Other(other),
        }
    }
}

/// What the trap stub does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Return to user mode with the (possibly updated) frame.
    Resume,
    /// The process is gone; schedule something else.
    Exited(i32),
    /// The machine is powering off.
    Halted,
}

impl<F, L, C, K> Syscalls<F, L, C, K>
where
    F: FileSystem,
    L: ProcessLifecycle,
    C: Console,
    K: Keyboard,
{
    /// Handle a trap raised by `process`.
    pub fn handle_trap<P: PageDirectory>(
        &self,
        process: &mut UserProcess<F::Handle, P>,
        frame: &mut TrapFrame,
    ) -> Outcome {
        let result = match TrapCause::from(frame.vec_no) {
            TrapCause::Syscall => self.dispatch(process, frame),
            TrapCause::PageFault => {
                log::warn!(
                    "[TRAP] pid {}: page fault at {:#010x} (eip {:#010x}, error {:#x})",
                    process.pid,
                    frame.fault_addr,
                    frame.eip,
                    frame.error_code
                );
                Err(Termination::Fault(PAGE_FAULT_VECTOR))
            }
            TrapCause::Other(vec_no) => {
                log::warn!(
                    "[TRAP] pid {}: unexpected exception {:#04x} at {:#010x}",
                    process.pid,
                    vec_no,
                    frame.eip
                );
                Err(Termination::Fault(vec_no))
            }
        };

        match result {
            Ok(()) => Outcome::Resume,
            Err(how) => self.terminate(process, how),
        }
    }

    /// Tear down `process`.
    ///
    /// Records the exit status, prints the exit message and closes every
    /// open file under the filesystem lock, then hands the status to the
    /// lifecycle collaborator. `halt` skips all of that and powers the
    /// machine off.
    pub fn terminate<P: PageDirectory>(
        &self,
        process: &mut UserProcess<F::Handle, P>,
        how: Termination,
    ) -> Outcome {
        match how {
            Termination::PowerOff => {
                log::info!("[TRAP] pid {}: halt", process.pid);
                self.lifecycle.power_off();
                return Outcome::Halted;
            }
            Termination::Killed(err) => {
                log::warn!("[TRAP] pid {} ({}) killed: {}", process.pid, process.name, err);
            }
            Termination::Exit(_) | Termination::Fault(_) => {}
        }

        let status = process.record_exit(how.exit_status());
        let message = format!("{}: exit({})\n", process.name, status);

        {
            let mut fs = self.fs.lock();
            self.console.write_bytes(message.as_bytes());
            process.descriptors.close_all(&mut *fs);
        }

        self.lifecycle.exit(process.pid, status);
        Outcome::Exited(status)
    }
}
