//! # epromctl
//!
//! A library for driving serial EPROM programmers.
//!
//! The programmer firmware speaks a line-based ASCII protocol: one request
//! line per operation, one response line back. This crate provides:
//!
//! - the request codec and response frame decoder
//! - a deadline-bounded line connection over any [`Port`]
//! - a typed command client (select, read byte, write byte, protection)
//! - whole-device read, write, verify and fill with progress reporting
//! - the catalog of supported EPROM types
//! - the text image file format
//!
//! ## Features
//!
//! - `native` (default): Native serial port support via `serialport`
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use epromctl::{DeviceProfile, NoProgress, Programmer, SerialConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let profile = DeviceProfile::from_name("28C16").ok_or("unknown EPROM type")?;
//!     let image = epromctl::image::load("firmware.txt", profile.size as usize)?;
//!
//!     #[cfg(feature = "native")]
//!     {
//!         let config = SerialConfig::new("/dev/ttyUSB0");
//!         let mut programmer = Programmer::open(profile, &config)?;
//!         programmer.write(&image, &mut NoProgress)?;
//!         programmer.verify(&image, &mut NoProgress)?;
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod connection;
pub mod device;
pub mod error;
pub mod image;
pub mod port;
pub mod programmer;
pub mod protocol;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::NativePort;
pub use {
    client::CommandClient,
    connection::Connection,
    device::DeviceProfile,
    error::{Error, Result},
    port::{Port, SerialConfig},
    programmer::{FillSource, NoProgress, OperationState, Programmer, Progress, ProgressLayout},
    protocol::{FrameDecoder, Request, Response},
};
