//! Error types for epromctl.

use std::io;
use thiserror::Error;

/// Result type for epromctl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for epromctl operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The serial port could not be opened.
    #[error("Cannot open the serial port {port}: {source}")]
    PortUnavailable {
        /// Port name that was requested.
        port: String,
        /// Underlying cause reported by the driver.
        #[source]
        source: io::Error,
    },

    /// No complete response line arrived within the response window.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The programmer answered with an error frame.
    #[error("{0}")]
    DeviceRejected(String),

    /// Malformed input detected before any device I/O.
    #[error("{0}")]
    Validation(String),

    /// Verify found a byte that differs from the image.
    #[error(
        "The data in the EPROM ({actual:#x}) does not match the data in the file ({expected:#x}) at address {address:#x}"
    )]
    DataMismatch {
        /// Address of the first differing byte.
        address: u32,
        /// Value read back from the device.
        actual: u8,
        /// Value from the image.
        expected: u8,
    },

    /// The programmer sent a success frame that could not be parsed.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A byte-level command was issued before a device was selected.
    #[error("No EPROM type has been selected on this connection")]
    NotSelected,
}

impl Error {
    /// Whether the failure was detected before talking to the device.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_mismatch_message_uses_hex() {
        let err = Error::DataMismatch {
            address: 0x2,
            actual: 0x3,
            expected: 0xff,
        };
        assert_eq!(
            err.to_string(),
            "The data in the EPROM (0x3) does not match the data in the file (0xff) at address 0x2"
        );
    }

    #[test]
    fn test_device_rejected_is_verbatim() {
        let err = Error::DeviceRejected("unsupported".into());
        assert_eq!(err.to_string(), "unsupported");
        assert!(!err.is_validation());
    }
}
