//! Firmware image handling.

pub mod firmware;

pub use firmware::{BLOCK_SIZE, Block, FILL_BYTE, FirmwareImage, header_size, split};
