//! Catalog of EPROM types the programmer firmware understands.

use std::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

/// A named EPROM type with a fixed capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct DeviceProfile {
    /// Identifier sent to the programmer with `S,<name>`.
    pub name: &'static str,
    /// Capacity in bytes.
    pub size: u32,
}

/// Every supported EPROM type.
const CATALOG: &[DeviceProfile] = &[
    DeviceProfile::new("28C16", 2048),
    DeviceProfile::new("28C64", 8192),
    DeviceProfile::new("28C256", 32768),
    DeviceProfile::new("28C512", 65536),
    DeviceProfile::new("27C16", 2048),
    DeviceProfile::new("27C256", 32768),
];

impl DeviceProfile {
    const fn new(name: &'static str, size: u32) -> Self {
        Self { name, size }
    }

    /// All known profiles in catalog order.
    pub fn all() -> &'static [DeviceProfile] {
        CATALOG
    }

    /// Look up a profile by its exact name.
    pub fn find(name: &str) -> Option<Self> {
        CATALOG.iter().copied().find(|p| p.name == name)
    }

    /// Look up a profile ignoring ASCII case (`28c64` finds `28C64`).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::find(&name.to_ascii_uppercase())
    }

    /// Whether `address` lies inside this device.
    pub fn contains(&self, address: u32) -> bool {
        address < self.size
    }

    /// Highest valid address.
    pub fn last_address(&self) -> u32 {
        self.size - 1
    }
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
