//! Flat binary firmware images.
//!
//! The bootloader receives the application image in fixed 1024-byte blocks.
//!
//! ```text
//! +------------+------------+-----+---------------------------+
//! |  Block 0   |  Block 1   | ... |  Block n-1 (tail + 0xFF)  |
//! +------------+------------+-----+---------------------------+
//! |  1024 B    |  1024 B    |     |  1024 B                   |
//! +------------+------------+-----+---------------------------+
//! ```
//!
//! A short final block is padded with `0xFF`, the erased state of STM32
//! flash, so padding never changes what ends up programmed.

use crate::error::{Error, Result};
use log::debug;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Number of firmware bytes carried by one `DATA` packet.
pub const BLOCK_SIZE: usize = 1024;

/// Erased-flash fill byte used to pad the last block.
pub const FILL_BYTE: u8 = 0xFF;

/// One fixed-size firmware block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    data: Vec<u8>,
}

impl Block {
    /// Create a block of `capacity` bytes from `chunk`, padding with [`FILL_BYTE`].
    ///
    /// `chunk` longer than `capacity` is truncated.
    pub fn padded(chunk: &[u8], capacity: usize) -> Self {
        let mut data = Vec::with_capacity(capacity);
        data.extend_from_slice(&chunk[..chunk.len().min(capacity)]);
        data.resize(capacity, FILL_BYTE);
        Self { data }
    }

    /// Block contents including padding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Block length (always the block capacity).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the block holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Split `image` into `block_size` blocks, padding the last one.
///
/// Returns `ceil(image.len() / block_size)` blocks; an empty image yields
/// none.
pub fn split(image: &[u8], block_size: usize) -> Vec<Block> {
    assert!(block_size > 0, "block size must be non-zero");
    image
        .chunks(block_size)
        .map(|chunk| Block::padded(chunk, block_size))
        .collect()
}

/// Size field of the `HEAD` packet for an image of `len` bytes.
pub fn header_size(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::ImageTooLarge(len))
}

/// An immutable flat binary firmware image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    data: Vec<u8>,
}

impl FirmwareImage {
    /// Load an image from a `.bin` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading firmware from: {}", path.display());

        let file = File::open(path).map_err(|e| Error::from_file_io(path, e))?;
        let mut reader = BufReader::new(file);

        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        Ok(Self::from_bytes(data))
    }

    /// Wrap raw image bytes.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Raw image bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Image size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Image size as announced in the `HEAD` packet.
    pub fn wire_size(&self) -> Result<u32> {
        header_size(self.data.len())
    }

    /// Number of [`BLOCK_SIZE`] blocks the image occupies.
    pub fn block_count(&self) -> usize {
        self.data.len().div_ceil(BLOCK_SIZE)
    }

    /// Split into transfer blocks.
    pub fn blocks(&self) -> Vec<Block> {
        split(&self.data, BLOCK_SIZE)
    }
}
