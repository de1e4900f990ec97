//! Port abstraction for serial communication with the bootloader.
//!
//! The bootloader multiplexes two message styles over one byte stream: framed
//! binary packets and free text lines. The protocol layer therefore only needs
//! three primitives from a port: write bytes, read one line with a timeout,
//! and close.
//!
//! ```text
//! +----------------------+
//! |  BootloaderSession   |
//! +----------+-----------+
//!            |
//!            v
//! +----------+-----------+
//! |      Port trait      |   write_all_bytes / read_line / close
//! +----------+-----------+
//!            |
//!            v
//! +----------+-----------+
//! |  NativePort          |
//! |  (serialport crate)  |
//! +----------------------+
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use stmboot::port::Port;
//!
//! fn example<P: Port>(port: &mut P) -> stmboot::Result<()> {
//!     port.write_all_bytes(b"COMD")?;
//!     if let Some(line) = port.read_line()? {
//!         println!("Received: {:?}", line);
//!     }
//!     Ok(())
//! }
//! ```

#[cfg(feature = "native")]
pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use crate::error::Result;

/// Default baud rate of the bootloader UART.
pub const DEFAULT_BAUD: u32 = 115200;

/// Default per-line read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Serial port configuration.
///
/// The bootloader UART is fixed at 8 data bits, no parity, one stop bit and
/// no flow control, so only the speed and read timeout are configurable.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Per-line read timeout.
    pub timeout: Duration,
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial port information.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
}

/// Unified port trait for bootloader communication.
pub trait Port: Read + Write + Send {
    /// Upper bound of one [`Port::read_line`] call.
    fn timeout(&self) -> Duration;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }

    /// Read bytes up to and including `\n`, for at most [`Port::timeout`].
    ///
    /// Returns `None` if nothing arrived before the timeout. A partial line
    /// received before the timeout is returned as is. The bytes are not
    /// decoded: a line may carry a binary `RESP` frame.
    fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let deadline = Instant::now() + self.timeout();
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            match self.read(&mut byte) {
                Ok(1) => {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                },
                Ok(_) => {},
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) => {},
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            if Instant::now() >= deadline {
                break;
            }
        }

        Ok((!line.is_empty()).then_some(line))
    }
}

/// Trait for listing available serial ports.
///
/// This is separated from `Port` because it's a static operation that
/// doesn't require an open port instance.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>>;
}

// Re-export the appropriate implementation based on features
#[cfg(feature = "native")]
pub use native::{NativePort, NativePortEnumerator};
