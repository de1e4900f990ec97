//! Repeating-XOR cipher keyed by a 32-bit value.
//!
//! Two indexing conventions exist and must not be merged:
//!
//! - [`xor_transform`] cycles the key bytes over the whole buffer. It is used
//!   for the key exchange (`PASS` packets).
//! - [`xor_transform_grouped`] restarts the key at every 4-byte group. It is
//!   used for whole-file firmware encryption, and files already encrypted by
//!   the device tooling depend on it.
//!
//! Both apply the key low byte first and are their own inverse.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// A 32-bit cipher key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherKey(u32);

impl CipherKey {
    /// Wrap a raw value.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Raw value.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Key bytes in the order they are applied (low byte first).
    const fn byte(self, index: usize) -> u8 {
        ((self.0 >> (8 * (index % 4))) & 0xFF) as u8
    }

    /// Scramble another key for transmission, keyed by `self`.
    ///
    /// The other key is serialized big-endian before the transform.
    pub fn scramble_key(self, key: CipherKey) -> [u8; 4] {
        self.scramble_word(key.0.to_be_bytes())
    }

    /// Scramble a 4-byte word keyed by `self`.
    pub fn scramble_word(self, word: [u8; 4]) -> [u8; 4] {
        let mut out = word;
        for (i, b) in out.iter_mut().enumerate() {
            *b ^= self.byte(i);
        }
        out
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CipherKey({:#010x})", self.0)
    }
}

impl fmt::Display for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<u32> for CipherKey {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl FromStr for CipherKey {
    type Err = Error;

    /// Parse exactly 8 hexadecimal characters, e.g. `01020304`.
    ///
    /// A leading `0x` is accepted.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.len() != 8 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidKey(format!(
                "'{s}': expected 4 bytes as 8 hex characters (e.g. 01020304)"
            )));
        }
        u32::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|e| Error::InvalidKey(format!("'{s}': {e}")))
    }
}

/// XOR `data` with the key bytes applied cyclically over the whole buffer.
pub fn xor_transform(data: &[u8], key: CipherKey) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, b)| b ^ key.byte(i))
        .collect()
}

/// XOR `data` in place, restarting the key at every 4-byte group.
pub fn xor_transform_grouped_in_place(data: &mut [u8], key: CipherKey) {
    for group in data.chunks_mut(4) {
        for (j, b) in group
            .iter_mut()
            .enumerate()
        {
            *b ^= key.byte(j);
        }
    }
}

/// XOR `data`, restarting the key at every 4-byte group.
pub fn xor_transform_grouped(data: &[u8], key: CipherKey) -> Vec<u8> {
    let mut out = data.to_vec();
    xor_transform_grouped_in_place(&mut out, key);
    out
}
