//! Settings resolved for one invocation that talks to the programmer.

use anyhow::Result;
use console::style;
use epromctl::programmer::{DEFAULT_MARKS_PER_LINE, DEFAULT_STRIDE};
use epromctl::{DeviceProfile, NativePort, Programmer, ProgressLayout, SerialConfig};
use log::debug;

use crate::config::Config;
use crate::{Cli, CliError};

/// Everything needed to open the programmer, validated up front.
pub(crate) struct Session {
    profile: DeviceProfile,
    serial: SerialConfig,
    layout: ProgressLayout,
    quiet: bool,
}

impl Session {
    /// Merge CLI arguments, environment and config into a session.
    pub(crate) fn resolve(cli: &Cli, config: &Config) -> Result<Self> {
        let profile = resolve_device(cli.device.as_deref().or(config.device.name.as_deref()))?;

        let port = cli
            .port
            .clone()
            .or_else(|| config.connection.port.clone())
            .ok_or_else(|| {
                CliError::Usage(
                    "No serial port given; use --port or set EPROMCTL_PORT".to_string(),
                )
            })?;

        let mut serial = SerialConfig::new(port);
        if let Some(delay) = config.settle_delay() {
            serial = serial.with_settle_delay(delay);
        }
        if let Some(timeout) = config.response_timeout() {
            serial = serial.with_response_timeout(timeout);
        }

        let layout = ProgressLayout::new(
            config.progress.stride.unwrap_or(DEFAULT_STRIDE),
            config.progress.marks_per_line.unwrap_or(DEFAULT_MARKS_PER_LINE),
        )?;

        debug!(
            "Session: {} on {} (settle {} ms, timeout {} ms)",
            profile,
            serial.port_name,
            serial.settle_delay.as_millis(),
            serial.response_timeout.as_millis()
        );

        Ok(Self {
            profile,
            serial,
            layout,
            quiet: cli.quiet,
        })
    }

    /// Selected EPROM type.
    pub(crate) fn profile(&self) -> DeviceProfile {
        self.profile
    }

    /// Byte capacity of the selected EPROM.
    pub(crate) fn size(&self) -> usize {
        self.profile.size as usize
    }

    /// Reject an address outside the selected EPROM.
    pub(crate) fn check_address(&self, address: u32) -> Result<()> {
        if self.profile.contains(address) {
            return Ok(());
        }
        let last = self.profile.last_address();
        Err(CliError::Validation(format!(
            "The address must be between 0x0 and {last:#x} (which is 0 and {last} in decimal)"
        ))
        .into())
    }

    /// Open the port, wait for the programmer and select the EPROM type.
    pub(crate) fn open(&self) -> Result<Programmer<NativePort>> {
        if !self.quiet {
            eprintln!(
                "{} {} on {}",
                style("Connecting to").cyan(),
                self.profile,
                self.serial.port_name
            );
        }
        let programmer = Programmer::open(self.profile, &self.serial)?;
        Ok(programmer.with_layout(self.layout))
    }
}

/// Look up the EPROM type by name.
pub(crate) fn resolve_device(name: Option<&str>) -> Result<DeviceProfile> {
    let name = name.ok_or_else(|| {
        CliError::Usage("No EPROM type given; use --device or set EPROMCTL_DEVICE".to_string())
    })?;

    DeviceProfile::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = DeviceProfile::all().iter().map(|p| p.name).collect();
        CliError::Validation(format!(
            "The EPROM type {name} is not one that is supported (supported: {})",
            known.join(", ")
        ))
        .into()
    })
}
