//! Bootloader command layer.
//!
//! - [`command`]: command codes, personas, requests and outcomes
//! - [`uid`]: device unique ID and the secret derived from it
//! - [`session`]: the per-command state machine driving a [`Port`](crate::port::Port)

pub mod command;
pub mod session;
pub mod uid;

pub use command::{Command, FlashReport, Outcome, Persona, Request};
pub use session::{BootloaderSession, DevicePhrases, PACKET_DELAY, SessionConfig, TRAILING_LINES};
pub use uid::DeviceUid;
