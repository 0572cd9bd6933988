//! Response frame decoding.
//!
//! Bytes coming off the wire pass through three stages:
//!
//! 1. **accumulate**: printable ASCII (32..=125) is appended to the line,
//!    everything else except the terminator is discarded;
//! 2. **terminate**: `\n` closes the line (the terminator is not stored);
//! 3. **classify**: the finished line becomes a [`Response`].
//!
//! Bytes that arrive after a terminator stay queued for the next frame.

use std::collections::VecDeque;

use log::trace;

use super::{ERROR_PREFIX, SEPARATOR, TERMINATOR};

/// What a single input byte did to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The byte was appended to the current line.
    Stored,
    /// The byte is outside the printable range and was dropped.
    Dropped,
    /// The byte terminated a non-empty line.
    Terminated,
    /// The byte terminated an empty line, which is not a frame.
    Skipped,
}

/// Incremental decoder for newline-terminated response frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: VecDeque<u8>,
    line: String,
}

impl FrameDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `byte` belongs in a frame.
    pub fn is_printable(byte: u8) -> bool {
        byte > 31 && byte < 126
    }

    /// Queue raw bytes read from the port.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend(bytes);
    }

    /// Advance the state machine by one byte.
    pub fn step(&mut self, byte: u8) -> Step {
        if byte == TERMINATOR {
            if self.line.is_empty() {
                Step::Skipped
            } else {
                Step::Terminated
            }
        } else if Self::is_printable(byte) {
            self.line.push(char::from(byte));
            Step::Stored
        } else {
            Step::Dropped
        }
    }

    /// Consume queued bytes until a complete line is available.
    ///
    /// Returns `None` when the queue runs dry first; the partial line is
    /// kept and completed by later calls.
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(byte) = self.pending.pop_front() {
            match self.step(byte) {
                Step::Terminated => {
                    let line = std::mem::take(&mut self.line);
                    trace!("Decoded line {line:?}");
                    return Some(line);
                },
                Step::Dropped => trace!("Dropped byte 0x{byte:02x}"),
                Step::Stored | Step::Skipped => {},
            }
        }
        None
    }

    /// Characters of the line assembled so far.
    pub fn partial(&self) -> &str {
        &self.line
    }

    /// Forget both the partial line and all queued bytes.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.line.clear();
    }
}

/// A classified response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Success; the whole line is the payload.
    Ok(String),
    /// Error frame; the message without the `E` marker.
    Error(String),
}

impl Response {
    /// Classify a decoded line.
    ///
    /// `E,unsupported` and `Eunsupported` both yield the message
    /// `unsupported`.
    pub fn classify(line: &str) -> Self {
        match line.strip_prefix(ERROR_PREFIX) {
            Some(rest) => {
                let message = rest.strip_prefix(SEPARATOR).unwrap_or(rest);
                Self::Error(message.to_string())
            },
            None => Self::Ok(line.to_string()),
        }
    }
}
