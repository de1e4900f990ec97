//! # stmboot
//!
//! A library for talking to an STM32 UART bootloader.
//!
//! This crate provides the host side of the bootloader protocol, including:
//!
//! - CRC-32/MPEG-2 framed packets (`COMD`, `HEAD`, `DATA`, `PASS`)
//! - `RESP` frame and `ACKW`/`NACK` status line parsing
//! - Firmware block splitting with `0xFF` padding
//! - XOR firmware cipher and UID-derived key scrambling
//! - Bounded retries for every exchange
//!
//! ## Features
//!
//! - `native` (default): Native serial port support via the `serialport` crate
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use stmboot::{BootloaderSession, Outcome, Request};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "native")]
//!     {
//!         let port = stmboot::NativePort::open_simple("/dev/ttyUSB0", 115200)?;
//!         let mut session = BootloaderSession::new(port);
//!
//!         // Reset the board with the User button held
//!         if let Outcome::Uid(uid) = session.execute(&Request::GetUid, |_, _| {})? {
//!             println!("UID = {uid}");
//!         }
//!
//!         session.close()?;
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bootloader;
pub mod cipher;
pub mod error;
pub mod image;
pub mod port;
pub mod protocol;
pub mod retry;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
pub use {
    bootloader::{
        BootloaderSession, Command, DevicePhrases, DeviceUid, FlashReport, Outcome, Persona,
        Request, SessionConfig,
    },
    cipher::{CipherKey, xor_transform, xor_transform_grouped},
    error::{Error, FileAccessKind, Result},
    image::{Block, FirmwareImage},
    port::{Port, PortEnumerator, PortInfo, SerialConfig},
    protocol::{Magic, Packet, ResponseOutcome, StatusLine},
    retry::RetryPolicy,
};
