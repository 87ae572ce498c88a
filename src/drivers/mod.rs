//! Console device interfaces for the system-call layer
//!
//! The UART and keyboard drivers live in the kernel proper. This module
//! defines what the system-call layer needs from them and routes kernel
//! log records to the console.

pub mod console;

pub use console::{init_logger, Console, Keyboard};
