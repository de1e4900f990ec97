//! Command implementations.
//!
//! Each subcommand group is implemented in its own module.

pub(crate) mod bootloader;
pub(crate) mod completions;
pub(crate) mod crypt;
pub(crate) mod menu;
pub(crate) mod ports;
