//! Error types for stmboot.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for stmboot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a firmware or key file could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccessKind {
    /// The path does not exist.
    NotFound,
    /// The operating system refused access.
    PermissionDenied,
}

impl std::fmt::Display for FileAccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::PermissionDenied => write!(f, "permission denied"),
        }
    }
}

/// Error type for stmboot operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// No serial device reachable.
    #[error("Serial port unavailable: {0}")]
    TransportUnavailable(String),

    /// No recognizable reply within the retry ceiling.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The device affirmatively rejected a step.
    #[error("Device rejected {0}")]
    Nack(String),

    /// A retried exchange never succeeded.
    #[error("{what} failed after {attempts} attempts")]
    RetriesExhausted {
        /// Exchange that was being retried.
        what: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The device answered with the failure sentinel.
    #[error("Device reported failure ({0})")]
    FailureCode(String),

    /// The device answered with neither the success nor the failure sentinel.
    #[error("Unexpected device response 0x{0:08x}")]
    UnknownResponse(u32),

    /// One or more UID fragments were not received.
    #[error("UID must not be empty")]
    UidEmpty,

    /// The user button was not held, the device started its application.
    #[error("User button not pressed, device continued to user application")]
    BootloaderNotEntered,

    /// Command code with no handler.
    #[error("Unsupported command: {0}")]
    UnsupportedCommand(i32),

    /// Firmware or key file could not be opened.
    #[error("Cannot access '{}': {kind}", path.display())]
    FileAccess {
        /// Offending path.
        path: PathBuf,
        /// Failure class.
        kind: FileAccessKind,
    },

    /// Image does not fit the 32-bit size field of the `HEAD` packet.
    #[error("Firmware image too large: {0} bytes")]
    ImageTooLarge(usize),

    /// Malformed cipher key.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Malformed UID fragment.
    #[error("Invalid UID: {0}")]
    InvalidUid(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Map an I/O error raised while opening `path`.
    ///
    /// Not-found and permission errors become [`Error::FileAccess`], anything
    /// else stays an I/O error.
    pub fn from_file_io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => FileAccessKind::NotFound,
            io::ErrorKind::PermissionDenied => FileAccessKind::PermissionDenied,
            _ => return Self::Io(err),
        };
        Self::FileAccess {
            path: path.into(),
            kind,
        }
    }
}
