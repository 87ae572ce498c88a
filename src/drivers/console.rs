//! Console and Keyboard Interfaces
//!
//! # Console Output
//! A buffer handed to [`Console::write_bytes`] reaches the device in one
//! piece. Writes from different processes may interleave with each other,
//! but never in the middle of a buffer.
//!
//! # Kernel Log
//! [`ConsoleLogger`] sends `log` records to the same console, one record
//! per write.

use core::fmt::{self, Write};

use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Once;

/// Console output collaborator.
pub trait Console {
    /// Write the whole buffer to the console in one call.
    fn write_bytes(&self, buf: &[u8]);
}

/// Keyboard input collaborator.
pub trait Keyboard {
    /// Block until a key is available and return it.
    fn read_char(&self) -> u8;
}

/// Maximum size of one formatted log line
const LOG_LINE_SIZE: usize = 256;

/// Stack buffer a log line is formatted into before it is written.
struct LineBuffer {
    data: [u8; LOG_LINE_SIZE],
    len: usize,
}

impl LineBuffer {
    const fn new() -> Self {
        Self {
            data: [0u8; LOG_LINE_SIZE],
            len: 0,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

impl Write for LineBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let remaining = LOG_LINE_SIZE - self.len;
        let to_copy = bytes.len().min(remaining);
        self.data[self.len..self.len + to_copy].copy_from_slice(&bytes[..to_copy]);
        self.len += to_copy;
        Ok(())
    }
}

/// Formats one record as `LEVEL target: message\n`.
fn format_record(buf: &mut LineBuffer, record: &Record) {
    let level = match record.level() {
        Level::Error => "ERROR",
        Level::Warn => " WARN",
        Level::Info => " INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    };
    let _ = write!(buf, "{} {}: {}", level, record.target(), record.args());

    // Keep the newline even when the message was truncated.
    if buf.len == LOG_LINE_SIZE {
        buf.len -= 1;
    }
    let _ = buf.write_str("\n");
}

/// `log` backend writing to the kernel console.
pub struct ConsoleLogger {
    console: Once<&'static (dyn Console + Sync)>,
}

impl ConsoleLogger {
    const fn new() -> Self {
        Self {
            console: Once::new(),
        }
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(console) = self.console.get() {
            let mut line = LineBuffer::new();
            format_record(&mut line, record);
            console.write_bytes(line.as_bytes());
        }
    }

    fn flush(&self) {}
}

/// Global logger instance
static LOGGER: ConsoleLogger = ConsoleLogger::new();

/// Route kernel log records to `console` at or above `level`.
///
/// Only the first call installs the logger; later calls only change the
/// level.
pub fn init_logger(console: &'static (dyn Console + Sync), level: LevelFilter) {
    LOGGER.console.call_once(|| console);
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}
