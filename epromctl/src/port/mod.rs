//! Port abstraction for serial communication with the programmer.
//!
//! The protocol layer never touches the OS serial API directly. It works
//! against the [`Port`] trait, which the native backend implements on top
//! of the `serialport` crate and which tests implement with in-memory
//! virtual devices.
//!
//! ```text
//! +------------------+
//! |    Programmer    |   bulk read / write / verify / fill
//! +--------+---------+
//!          |
//! +--------+---------+
//! |  CommandClient   |   S / R / W / P round trips
//! +--------+---------+
//!          |
//! +--------+---------+
//! |    Connection    |   line framing, response window
//! +--------+---------+
//!          |
//! +--------+---------+
//! |    Port trait    |
//! +--------+---------+
//!          |
//! +--------+---------+
//! | NativePort       |
//! |   (serialport)   |
//! +------------------+
//! ```

#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Default link speed of the programmer firmware.
pub const DEFAULT_BAUD: u32 = 115200;

/// Serial port configuration.
///
/// The line format is always 8 data bits, no parity, one stop bit and no
/// flow control.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM4").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Poll interval of a single OS-level read.
    pub timeout: Duration,
    /// Window for one complete response line.
    pub response_timeout: Duration,
    /// Time the programmer needs after the port opens before it talks.
    pub settle_delay: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD,
            timeout: Duration::from_millis(50),
            response_timeout: crate::protocol::DEFAULT_RESPONSE_TIMEOUT,
            settle_delay: Duration::from_secs(3),
        }
    }
}

impl SerialConfig {
    /// Create a new configuration for the given port with default line settings.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Default::default()
        }
    }

    /// Set the response window.
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the settle delay applied after opening.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the OS-level poll interval.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Byte channel to the programmer.
///
/// Reads are expected to return `ErrorKind::TimedOut` (or `Ok(0)`) when no
/// data arrived within the poll interval; the connection layer treats both
/// as "poll again".
pub trait Port: Read + Write + Send {
    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }
}

#[cfg(feature = "native")]
pub use native::NativePort;
