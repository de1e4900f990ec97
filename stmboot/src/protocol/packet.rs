//! Bootloader packet framing and response recognition.
//!
//! ## Frame Format
//!
//! Every host-to-device packet uses the same layout:
//!
//! ```text
//! +-----------+---------------------+-----------------+
//! |   Magic   |       Payload       |      CRC32      |
//! +-----------+---------------------+-----------------+
//! |  4 bytes  |  0, 4 or 1024 bytes |  4 bytes (BE)   |
//! +-----------+---------------------+-----------------+
//! | "COMD"... |  depends on magic   | MPEG-2 of M + P |
//! +-----------+---------------------+-----------------+
//! ```
//!
//! The device answers either with plain text lines containing `ACKW` / `NACK`
//! or with a `RESP` marker followed by a 4-byte little-endian value. Device
//! responses carry no checksum that the host verifies; they are matched by
//! position only.

use crate::image::Block;
use crate::protocol::crc::crc32_mpeg2_parts;
use byteorder::{BigEndian, WriteBytesExt};
use std::fmt;

/// Response value meaning success.
pub const RESPONSE_OK: u32 = 0xFFFF_FFFF;

/// Response value meaning failure.
pub const RESPONSE_FAIL: u32 = 0x3333_3333;

/// Literal word scrambled with the operator key to check key agreement.
pub const TEST_WORD: [u8; 4] = *b"TEST";

/// Status token for an accepted step.
pub const ACK_TOKEN: &str = "ACKW";

/// Status token for a rejected step.
pub const NACK_TOKEN: &str = "NACK";

/// Packet magic words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Magic {
    /// Command selection, payload is a big-endian `i32` code.
    Command,
    /// Firmware header, payload is the big-endian `u32` image size.
    Header,
    /// One firmware block.
    Data,
    /// Scrambled key or test word.
    Key,
    /// Device response marker.
    Response,
}

impl Magic {
    /// The four ASCII bytes on the wire.
    pub const fn bytes(self) -> [u8; 4] {
        match self {
            Self::Command => *b"COMD",
            Self::Header => *b"HEAD",
            Self::Data => *b"DATA",
            Self::Key => *b"PASS",
            Self::Response => *b"RESP",
        }
    }
}

impl fmt::Display for Magic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.bytes();
        write!(f, "{}", String::from_utf8_lossy(&bytes))
    }
}

/// Host-to-device packet builder.
#[derive(Debug, Clone)]
pub struct Packet {
    magic: Magic,
    payload: Vec<u8>,
}

impl Packet {
    /// Create a packet with an arbitrary payload.
    pub fn new(magic: Magic, payload: Vec<u8>) -> Self {
        Self { magic, payload }
    }

    /// Build a `COMD` packet.
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn command(code: i32) -> Self {
        let mut payload = Vec::with_capacity(4);
        payload.write_i32::<BigEndian>(code).unwrap();
        Self::new(Magic::Command, payload)
    }

    /// Build a `HEAD` packet announcing the firmware size in bytes.
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn header(firmware_size: u32) -> Self {
        let mut payload = Vec::with_capacity(4);
        payload.write_u32::<BigEndian>(firmware_size).unwrap();
        Self::new(Magic::Header, payload)
    }

    /// Build a `DATA` packet carrying one block.
    pub fn data(block: &Block) -> Self {
        Self::new(Magic::Data, block.as_bytes().to_vec())
    }

    /// Build a `PASS` packet carrying four already scrambled bytes.
    pub fn key(scrambled: [u8; 4]) -> Self {
        Self::new(Magic::Key, scrambled.to_vec())
    }

    /// Get the magic word.
    pub fn magic(&self) -> Magic {
        self.magic
    }

    /// Get the payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// CRC-32/MPEG-2 over magic and payload.
    pub fn crc(&self) -> u32 {
        crc32_mpeg2_parts(&[&self.magic.bytes(), &self.payload])
    }

    /// Serialize to `magic || payload || crc`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.payload.len());
        buf.extend_from_slice(&self.magic.bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.crc().to_be_bytes());
        buf
    }
}

/// Classified content of a `RESP` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Success sentinel `0xFFFFFFFF`.
    Success,
    /// Failure sentinel `0x33333333`.
    Failure,
    /// Any other value, e.g. a UID fragment.
    Opaque(u32),
    /// No complete `RESP` marker in the buffer.
    NotFound,
}

impl ResponseOutcome {
    /// Classify a raw response value.
    pub fn from_value(value: u32) -> Self {
        match value {
            RESPONSE_OK => Self::Success,
            RESPONSE_FAIL => Self::Failure,
            other => Self::Opaque(other),
        }
    }

    /// The literal value the device sent, if any.
    pub fn value(self) -> Option<u32> {
        match self {
            Self::Success => Some(RESPONSE_OK),
            Self::Failure => Some(RESPONSE_FAIL),
            Self::Opaque(v) => Some(v),
            Self::NotFound => None,
        }
    }
}

impl fmt::Display for ResponseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Opaque(v) => write!(f, "{v:#x}"),
            Self::NotFound => write!(f, "no response"),
        }
    }
}

/// Position of the `RESP` marker in `raw`, if present.
pub fn find_response(raw: &[u8]) -> Option<usize> {
    let marker = Magic::Response.bytes();
    raw.windows(marker.len())
        .position(|w| w == marker)
}

/// Locate `RESP` anywhere in `raw` and classify the 4 bytes following it.
///
/// Leading noise before the marker is skipped. A marker without four
/// following bytes is treated as not found.
pub fn decode_response(raw: &[u8]) -> ResponseOutcome {
    let Some(pos) = find_response(raw) else {
        return ResponseOutcome::NotFound;
    };
    let start = pos + 4;
    match raw.get(start..start + 4) {
        Some(v) => ResponseOutcome::from_value(u32::from_le_bytes([v[0], v[1], v[2], v[3]])),
        None => ResponseOutcome::NotFound,
    }
}

/// Classification of a plain text status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLine {
    /// Line contains `ACKW`.
    Ack,
    /// Line contains `NACK`.
    Nack,
    /// Neither token present.
    Unmatched,
}

impl StatusLine {
    /// Classify a raw line read from the device.
    pub fn classify(raw: &[u8]) -> Self {
        let text = decode_line(raw);
        if text.contains(ACK_TOKEN) {
            Self::Ack
        } else if text.contains(NACK_TOKEN) {
            Self::Nack
        } else {
            Self::Unmatched
        }
    }
}

/// Decode a device line as UTF-8 (lossy) with surrounding whitespace removed.
pub fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim()
        .to_string()
}
