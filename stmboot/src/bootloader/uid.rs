//! Device unique ID.

use crate::cipher::CipherKey;
use crate::error::{Error, Result};
use std::fmt;

/// MCU unique ID as three 32-bit fragments.
///
/// The second fragment doubles as the device secret used to scramble a new
/// encryption key in transit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceUid {
    fragments: [u32; 3],
}

impl DeviceUid {
    /// Build from raw fragment values.
    pub const fn new(fragments: [u32; 3]) -> Self {
        Self { fragments }
    }

    /// Parse three hexadecimal fragments such as `"0x1A2B3C4D"`.
    pub fn from_fragments(fragments: [&str; 3]) -> Result<Self> {
        let mut values = [0u32; 3];
        for (value, text) in values
            .iter_mut()
            .zip(fragments)
        {
            *value = parse_fragment(text)?;
        }
        Ok(Self::new(values))
    }

    /// Raw fragment values.
    pub fn fragments(&self) -> [u32; 3] {
        self.fragments
    }

    /// The device secret: the second fragment read as a big-endian integer.
    pub fn secret_key(&self) -> CipherKey {
        CipherKey::new(self.fragments[1])
    }
}

fn parse_fragment(text: &str) -> Result<u32> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > 8 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidUid(format!("'{text}' is not a 32-bit hex value")));
    }
    u32::from_str_radix(digits, 16).map_err(|e| Error::InvalidUid(format!("'{text}': {e}")))
}

impl fmt::Display for DeviceUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.fragments;
        write!(f, "{a:#x}-{b:#x}-{c:#x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_from_second_fragment() {
        let uid = DeviceUid::from_fragments(["0x1A2B3C4D", "0x5E6F7081", "0x92A3B4C5"]).unwrap();
        assert_eq!(
            uid.secret_key()
                .value(),
            u32::from_be_bytes([0x5E, 0x6F, 0x70, 0x81])
        );
    }

    #[test]
    fn test_operator_key_round_trip_through_secret() {
        let uid = DeviceUid::from_fragments(["0x1A2B3C4D", "0x5E6F7081", "0x92A3B4C5"]).unwrap();
        let secret = uid.secret_key();
        let scrambled = secret.scramble_key(CipherKey::new(0x0102_0304));
        assert_ne!(u32::from_be_bytes(scrambled), 0x0102_0304);
        assert_eq!(u32::from_be_bytes(secret.scramble_word(scrambled)), 0x0102_0304);
    }

    #[test]
    fn test_display_joins_with_dash() {
        let uid = DeviceUid::new([0x1A2B_3C4D, 0x5E6F_7081, 0x92A3_B4C5]);
        assert_eq!(uid.to_string(), "0x1a2b3c4d-0x5e6f7081-0x92a3b4c5");
    }

    #[test]
    fn test_short_fragment_accepted() {
        // Fragments rendered without zero padding must still parse.
        let uid = DeviceUid::from_fragments(["0x1", "0x102", "ff"]).unwrap();
        assert_eq!(uid.fragments(), [1, 0x102, 0xFF]);
    }

    #[test]
    fn test_invalid_fragment() {
        assert!(DeviceUid::from_fragments(["0x", "0x1", "0x2"]).is_err());
        assert!(DeviceUid::from_fragments(["0x123456789", "0x1", "0x2"]).is_err());
        assert!(DeviceUid::from_fragments(["0xZZ", "0x1", "0x2"]).is_err());
    }
}
