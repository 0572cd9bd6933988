//! Line protocol spoken by the programmer firmware.
//!
//! Every exchange is one ASCII request line answered by exactly one ASCII
//! response line. Nothing is pipelined.
//!
//! | Request                 | Success payload            |
//! |-------------------------|----------------------------|
//! | `S,<name>`              | none                       |
//! | `R,<hexAddr>`           | `<2-char prefix><hexByte>` |
//! | `W,<hexAddr>,<hexByte>` | none                       |
//! | `P,<0/1>`               | none                       |
//!
//! A response starting with `E` is an error; the rest of the line is the
//! message.

pub mod decoder;

use std::fmt;
use std::time::Duration;

pub use decoder::{FrameDecoder, Response};

/// Line terminator, the only byte that ends a frame.
pub const TERMINATOR: u8 = b'\n';

/// First character of an error response.
pub const ERROR_PREFIX: char = 'E';

/// Separator between the command code and its arguments.
pub const SEPARATOR: char = ',';

/// Length of the response-code prefix in front of the hex byte of an `R`
/// response. These characters are skipped, not parsed.
pub const READ_PAYLOAD_OFFSET: usize = 2;

/// Default window for one complete response line.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(5000);

/// One request frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `S,<name>`: choose the EPROM type for this connection.
    SelectDevice(String),
    /// `R,<addr>`: read one byte.
    ReadByte(u32),
    /// `W,<addr>,<value>`: write one byte.
    WriteByte(u32, u8),
    /// `P,<flag>`: enable or disable write protection.
    SetProtection(bool),
}

impl Request {
    /// One-letter command code.
    pub fn code(&self) -> char {
        match self {
            Self::SelectDevice(_) => 'S',
            Self::ReadByte(_) => 'R',
            Self::WriteByte(..) => 'W',
            Self::SetProtection(_) => 'P',
        }
    }

    /// Encode the request as a terminated line.
    pub fn encode(&self) -> Vec<u8> {
        let mut line = self.to_string().into_bytes();
        line.push(TERMINATOR);
        line
    }
}

impl fmt::Display for Request {
    /// Formats the frame without its terminator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.code();
        match self {
            Self::SelectDevice(name) => write!(f, "{code}{SEPARATOR}{name}"),
            Self::ReadByte(addr) => write!(f, "{code}{SEPARATOR}{addr:x}"),
            Self::WriteByte(addr, value) => {
                write!(f, "{code}{SEPARATOR}{addr:x}{SEPARATOR}{value:x}")
            },
            Self::SetProtection(enabled) => {
                write!(f, "{code}{SEPARATOR}{}", u8::from(*enabled))
            },
        }
    }
}
