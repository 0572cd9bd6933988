//! Line-oriented connection to the programmer.
//!
//! A [`Connection`] owns its [`Port`] exclusively. It frames outgoing
//! requests, assembles incoming response lines within the response window,
//! and closes the port when dropped so every exit path releases it.

use std::io::ErrorKind;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::port::{Port, SerialConfig};
use crate::protocol::{FrameDecoder, Request, Response};

/// Pause between polls that returned no data.
const POLL_BACKOFF: Duration = Duration::from_millis(1);

/// Size of a single read from the port.
const READ_CHUNK: usize = 64;

/// Exclusive, line-framed connection to one programmer.
pub struct Connection<P: Port> {
    port: P,
    decoder: FrameDecoder,
    response_timeout: Duration,
    closed: bool,
}

impl<P: Port> Connection<P> {
    /// Wrap an already opened port without any start-up handshake.
    pub fn new(port: P, response_timeout: Duration) -> Self {
        Self {
            port,
            decoder: FrameDecoder::new(),
            response_timeout,
            closed: false,
        }
    }

    /// Wrap an opened port and synchronise with the programmer.
    ///
    /// The firmware resets when the port opens and prints one greeting line
    /// once it is ready. This waits `settle_delay`, then reads and discards
    /// that line so the first request starts on a clean frame boundary.
    pub fn establish(port: P, config: &SerialConfig) -> Result<Self> {
        let mut connection = Self::new(port, config.response_timeout);

        if !config.settle_delay.is_zero() {
            info!(
                "Waiting {} ms for the programmer on {} to start",
                config.settle_delay.as_millis(),
                connection.port.name()
            );
            thread::sleep(config.settle_delay);
        }

        let greeting = connection.read_line()?;
        debug!("Programmer greeting: {greeting:?}");

        Ok(connection)
    }

    /// Write one encoded request frame.
    pub fn write_line(&mut self, frame: &[u8]) -> Result<()> {
        self.ensure_open()?;
        trace!("-> {:?}", String::from_utf8_lossy(frame).trim_end());
        self.port.write_all_bytes(frame)
    }

    /// Read one response line.
    ///
    /// The deadline runs from the start of this call and is not extended
    /// when bytes trickle in.
    pub fn read_line(&mut self) -> Result<String> {
        self.ensure_open()?;

        let start = Instant::now();
        let mut buf = [0u8; READ_CHUNK];

        loop {
            if let Some(line) = self.decoder.next_line() {
                trace!("<- {line:?}");
                return Ok(line);
            }

            if start.elapsed() >= self.response_timeout {
                return Err(Error::Timeout(format!(
                    "No response from the programmer within {} ms",
                    self.response_timeout.as_millis()
                )));
            }

            match self.port.read(&mut buf) {
                Ok(0) => thread::sleep(POLL_BACKOFF),
                Ok(n) => self.decoder.extend(&buf[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    thread::sleep(POLL_BACKOFF);
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Send one request and wait for its response frame.
    pub fn transact(&mut self, request: &Request) -> Result<Response> {
        self.write_line(&request.encode())?;
        let line = self.read_line()?;
        Ok(Response::classify(&line))
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Whether [`Connection::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the port. Calling this more than once is harmless.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.decoder.reset();
        self.port.close()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Io(std::io::Error::new(
                ErrorKind::NotConnected,
                "connection closed",
            )))
        } else {
            Ok(())
        }
    }
}

impl<P: Port> Drop for Connection<P> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close {}: {e}", self.port.name());
        }
    }
}

#[cfg(feature = "native")]
impl Connection<crate::port::NativePort> {
    /// Open the configured serial port and synchronise with the programmer.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = crate::port::NativePort::open(config)?;
        Self::establish(port, config)
    }
}
