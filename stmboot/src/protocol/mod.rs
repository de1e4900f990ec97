//! Protocol implementations.

pub mod crc;
pub mod packet;

// Re-export common types
pub use packet::{
    Magic, Packet, ResponseOutcome, StatusLine, decode_line, decode_response, find_response,
};
