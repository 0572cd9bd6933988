//! Command implementations.
//!
//! Each subcommand is implemented in its own module for clean separation.

pub(crate) mod bytes;
pub(crate) mod completions;
pub(crate) mod devices;
pub(crate) mod transfer;
