//! Whole-device operations.
//!
//! A [`Programmer`] drives a [`CommandClient`] across every address of the
//! selected EPROM, one round trip per byte, reporting progress as it goes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use epromctl::{DeviceProfile, NoProgress, Programmer, SerialConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let profile = DeviceProfile::from_name("28C64").ok_or("unknown EPROM type")?;
//!     let config = SerialConfig::new("/dev/ttyUSB0");
//!
//!     let mut programmer = Programmer::open(profile, &config)?;
//!     let image = programmer.read(&mut NoProgress)?;
//!     epromctl::image::save("dump.txt", &image)?;
//!     Ok(())
//! }
//! ```

use std::fmt;

use log::{debug, info, trace};
use rand::Rng;

use crate::client::CommandClient;
use crate::connection::Connection;
use crate::device::DeviceProfile;
use crate::error::{Error, Result};
use crate::port::{Port, SerialConfig};

/// Addresses per progress mark.
pub const DEFAULT_STRIDE: usize = 64;

/// Marks per progress line.
pub const DEFAULT_MARKS_PER_LINE: usize = 64;

/// Largest value [`Programmer::fill`] writes. `0xff` is never written.
pub const MAX_FILL_VALUE: u8 = 254;

/// Where a [`Programmer`] is in its life cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    /// Port open, waiting for the device to be selected.
    Connecting,
    /// Device selected, no operation running.
    DeviceSelected,
    /// Working on the given address.
    Iterating(u32),
    /// All addresses processed.
    Finalizing,
    /// Last operation completed.
    Done,
    /// Last operation stopped on an error.
    Failed(String),
}

impl OperationState {
    fn same_phase(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("connecting"),
            Self::DeviceSelected => f.write_str("device selected"),
            Self::Iterating(address) => write!(f, "iterating at {address:#x}"),
            Self::Finalizing => f.write_str("finalizing"),
            Self::Done => f.write_str("done"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Receives progress marks from a running operation.
///
/// Implementations only observe; they cannot stop the operation.
pub trait Progress {
    /// An operation is starting and will emit `total_marks` marks.
    fn begin(&mut self, total_marks: usize);

    /// One stride of addresses has started.
    fn mark(&mut self);

    /// A full line of marks has been emitted.
    fn newline(&mut self);

    /// The operation ended, successfully or not.
    fn finish(&mut self);
}

/// Progress sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn begin(&mut self, _total_marks: usize) {}
    fn mark(&mut self) {}
    fn newline(&mut self) {}
    fn finish(&mut self) {}
}

/// Spacing of progress marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressLayout {
    stride: usize,
    marks_per_line: usize,
}

impl Default for ProgressLayout {
    fn default() -> Self {
        Self {
            stride: DEFAULT_STRIDE,
            marks_per_line: DEFAULT_MARKS_PER_LINE,
        }
    }
}

impl ProgressLayout {
    /// Create a layout; both values must be non-zero.
    pub fn new(stride: usize, marks_per_line: usize) -> Result<Self> {
        if stride == 0 || marks_per_line == 0 {
            return Err(Error::Validation(
                "Progress stride and marks per line must be greater than zero".into(),
            ));
        }
        Ok(Self {
            stride,
            marks_per_line,
        })
    }

    /// Addresses per mark.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Marks per line.
    pub fn marks_per_line(&self) -> usize {
        self.marks_per_line
    }

    /// Number of marks emitted for `addresses` addresses.
    pub fn total_marks(&self, addresses: usize) -> usize {
        addresses.div_ceil(self.stride)
    }
}

/// Turns address indices into calls on a [`Progress`] sink.
struct Ticker<'a> {
    layout: ProgressLayout,
    marks: usize,
    sink: &'a mut dyn Progress,
}

impl<'a> Ticker<'a> {
    fn start(layout: ProgressLayout, addresses: usize, sink: &'a mut dyn Progress) -> Self {
        sink.begin(layout.total_marks(addresses));
        Self {
            layout,
            marks: 0,
            sink,
        }
    }

    fn tick(&mut self, index: usize) {
        if index % self.layout.stride != 0 {
            return;
        }
        self.sink.mark();
        self.marks += 1;
        if self.marks % self.layout.marks_per_line == 0 {
            self.sink.newline();
        }
    }

    fn finish(self) {
        self.sink.finish();
    }
}

/// Supplies the values written by [`Programmer::fill`].
///
/// Values above [`MAX_FILL_VALUE`] are folded back into range before they
/// reach the device.
pub trait FillSource {
    /// Next value, normally in `0..=MAX_FILL_VALUE`.
    fn next_value(&mut self) -> u8;
}

impl<R: rand::RngCore> FillSource for R {
    fn next_value(&mut self) -> u8 {
        self.gen_range(0..=MAX_FILL_VALUE)
    }
}

/// Bulk operations against one selected EPROM.
///
/// The connection is closed when the programmer is dropped, whichever way
/// the operation ended.
pub struct Programmer<P: Port> {
    client: CommandClient<P>,
    profile: DeviceProfile,
    layout: ProgressLayout,
    state: OperationState,
}

impl<P: Port> Programmer<P> {
    /// Synchronise with the programmer on `port` and select `profile`.
    pub fn connect(port: P, profile: DeviceProfile, config: &SerialConfig) -> Result<Self> {
        let connection = Connection::establish(port, config)?;
        Self::with_connection(connection, profile)
    }

    /// Select `profile` over an established connection.
    pub fn with_connection(connection: Connection<P>, profile: DeviceProfile) -> Result<Self> {
        let mut programmer = Self {
            client: CommandClient::new(connection),
            profile,
            layout: ProgressLayout::default(),
            state: OperationState::Connecting,
        };
        debug!("Programmer state: {}", programmer.state);

        if let Err(e) = programmer.client.select_device(&profile) {
            programmer.transition(OperationState::Failed(e.to_string()));
            return Err(e);
        }
        programmer.transition(OperationState::DeviceSelected);
        Ok(programmer)
    }

    /// Use a custom progress layout.
    #[must_use]
    pub fn with_layout(mut self, layout: ProgressLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Current state.
    pub fn state(&self) -> &OperationState {
        &self.state
    }

    /// Selected EPROM type.
    pub fn profile(&self) -> DeviceProfile {
        self.profile
    }

    /// Get a reference to the command client.
    pub fn client(&self) -> &CommandClient<P> {
        &self.client
    }

    /// Read every address of the device.
    pub fn read(&mut self, progress: &mut dyn Progress) -> Result<Vec<u8>> {
        info!("Reading {} bytes from {}", self.profile.size, self.profile);
        let mut ticker = Ticker::start(self.layout, self.size(), progress);
        let result = self.read_each(&mut ticker);
        self.conclude(result, ticker)
    }

    /// Write `image` starting at address 0. Returns the bytes written.
    pub fn write(&mut self, image: &[u8], progress: &mut dyn Progress) -> Result<usize> {
        self.check_image(image)?;
        info!("Writing {} bytes to {}", image.len(), self.profile);
        let mut ticker = Ticker::start(self.layout, image.len(), progress);
        let result = self.write_each(image, &mut ticker);
        self.conclude(result, ticker)
    }

    /// Compare the device against `image`. Returns the bytes verified.
    ///
    /// Stops at the first differing byte with [`Error::DataMismatch`].
    pub fn verify(&mut self, image: &[u8], progress: &mut dyn Progress) -> Result<usize> {
        self.check_image(image)?;
        info!("Verifying {} bytes of {}", image.len(), self.profile);
        let mut ticker = Ticker::start(self.layout, image.len(), progress);
        let result = self.verify_each(image, &mut ticker);
        self.conclude(result, ticker)
    }

    /// Write a value from `source` to every address. Returns what was written.
    pub fn fill(
        &mut self,
        source: &mut dyn FillSource,
        progress: &mut dyn Progress,
    ) -> Result<Vec<u8>> {
        info!("Filling {} bytes of {}", self.profile.size, self.profile);
        let mut ticker = Ticker::start(self.layout, self.size(), progress);
        let result = self.fill_each(source, &mut ticker);
        self.conclude(result, ticker)
    }

    /// Read a single byte.
    pub fn read_byte(&mut self, address: u32) -> Result<u8> {
        let result = self.client.read_byte(address);
        self.track(result)
    }

    /// Write a single byte.
    pub fn write_byte(&mut self, address: u32, value: u8) -> Result<()> {
        let result = self.client.write_byte(address, value);
        self.track(result)
    }

    /// Enable or disable write protection.
    pub fn set_protection(&mut self, enabled: bool) -> Result<()> {
        let result = self.client.set_protection(enabled);
        self.track(result)
    }

    /// Release the connection now instead of on drop.
    pub fn close(mut self) -> Result<()> {
        self.client.close()
    }

    fn read_each(&mut self, ticker: &mut Ticker<'_>) -> Result<Vec<u8>> {
        let mut image = Vec::with_capacity(self.size());
        for (index, address) in (0..self.profile.size).enumerate() {
            self.enter(address);
            ticker.tick(index);
            image.push(self.client.read_byte(address)?);
        }
        Ok(image)
    }

    fn write_each(&mut self, image: &[u8], ticker: &mut Ticker<'_>) -> Result<usize> {
        for (index, (address, &value)) in (0u32..).zip(image).enumerate() {
            self.enter(address);
            ticker.tick(index);
            self.client.write_byte(address, value)?;
        }
        Ok(image.len())
    }

    fn verify_each(&mut self, image: &[u8], ticker: &mut Ticker<'_>) -> Result<usize> {
        for (index, (address, &expected)) in (0u32..).zip(image).enumerate() {
            self.enter(address);
            ticker.tick(index);
            let actual = self.client.read_byte(address)?;
            if actual != expected {
                return Err(Error::DataMismatch {
                    address,
                    actual,
                    expected,
                });
            }
        }
        Ok(image.len())
    }

    fn fill_each(
        &mut self,
        source: &mut dyn FillSource,
        ticker: &mut Ticker<'_>,
    ) -> Result<Vec<u8>> {
        let mut image = Vec::with_capacity(self.size());
        for (index, address) in (0..self.profile.size).enumerate() {
            self.enter(address);
            ticker.tick(index);
            let value = source.next_value() % (MAX_FILL_VALUE + 1);
            self.client.write_byte(address, value)?;
            image.push(value);
        }
        Ok(image)
    }

    fn size(&self) -> usize {
        // Device sizes fit in usize on every supported target
        usize::try_from(self.profile.size).unwrap_or(usize::MAX)
    }

    fn check_image(&self, image: &[u8]) -> Result<()> {
        if image.is_empty() {
            return Err(Error::Validation("The input file contains no data".into()));
        }
        if image.len() > self.size() {
            return Err(Error::Validation(format!(
                "The data in the file is greater than the EPROM size ({} > {})",
                image.len(),
                self.profile.size
            )));
        }
        Ok(())
    }

    fn enter(&mut self, address: u32) {
        self.transition(OperationState::Iterating(address));
    }

    fn transition(&mut self, next: OperationState) {
        if self.state.same_phase(&next) {
            trace!("Programmer state: {next}");
        } else {
            debug!("Programmer state: {} -> {next}", self.state);
        }
        self.state = next;
    }

    fn conclude<T>(&mut self, result: Result<T>, ticker: Ticker<'_>) -> Result<T> {
        match result {
            Ok(value) => {
                self.transition(OperationState::Finalizing);
                ticker.finish();
                self.transition(OperationState::Done);
                Ok(value)
            },
            Err(e) => {
                ticker.finish();
                self.transition(OperationState::Failed(e.to_string()));
                Err(e)
            },
        }
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.transition(OperationState::Done);
                Ok(value)
            },
            Err(e) => {
                self.transition(OperationState::Failed(e.to_string()));
                Err(e)
            },
        }
    }
}

#[cfg(feature = "native")]
impl Programmer<crate::port::NativePort> {
    /// Open the configured serial port, synchronise, and select `profile`.
    pub fn open(profile: DeviceProfile, config: &SerialConfig) -> Result<Self> {
        let connection = Connection::open(config)?;
        Self::with_connection(connection, profile)
    }
}
