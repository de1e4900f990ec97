//! Bootloader command enumeration and request/outcome types.

use crate::bootloader::uid::DeviceUid;
use crate::cipher::CipherKey;
use crate::error::{Error, Result};
use crate::image::FirmwareImage;
use std::fmt;

/// Bootloader commands.
///
/// The discriminants are the codes sent in the `COMD` packet and must match
/// the `cmd_t` enumeration of the device firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Command {
    /// Download and program a new application image.
    UpdateFirmware = 1,
    /// Install a new firmware encryption key.
    SetKey = 2,
    /// Report the flash read-protection option bytes.
    CheckProtection = 3,
    /// Enable flash read protection.
    LockFlash = 4,
    /// Disable flash read protection.
    UnlockFlash = 5,
    /// Read the MCU unique ID.
    GetUid = 6,
    /// Check that the operator key matches the installed key.
    CheckKey = 7,
    /// Erase the application area.
    EraseFirmware = 8,
}

impl Command {
    /// All commands in code order.
    pub const ALL: [Self; 8] = [
        Self::UpdateFirmware,
        Self::SetKey,
        Self::CheckProtection,
        Self::LockFlash,
        Self::UnlockFlash,
        Self::GetUid,
        Self::CheckKey,
        Self::EraseFirmware,
    ];

    /// Wire code.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Human description, as offered in menus.
    pub const fn description(self) -> &'static str {
        match self {
            Self::UpdateFirmware => "Upload firmware to the microcontroller",
            Self::SetKey => "Change the firmware encryption key",
            Self::CheckProtection => "Check flash memory protection",
            Self::LockFlash => "Lock microcontroller flash memory",
            Self::UnlockFlash => "Unlock microcontroller flash memory",
            Self::GetUid => "Read the microcontroller UID",
            Self::CheckKey => "Check that encryption keys match",
            Self::EraseFirmware => "Erase the firmware flash area",
        }
    }

    /// Whether the host only listens after sending the command code.
    pub const fn is_drain(self) -> bool {
        matches!(
            self,
            Self::CheckProtection | Self::LockFlash | Self::UnlockFlash | Self::EraseFirmware
        )
    }
}

impl TryFrom<i32> for Command {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or(Error::UnsupportedCommand(code))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Who is operating the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Persona {
    /// End user: firmware update and UID only.
    #[default]
    User,
    /// Developer: every bootloader command.
    Developer,
}

impl Persona {
    /// Commands available to this persona, in menu order.
    pub fn commands(self) -> &'static [Command] {
        match self {
            Self::User => &[Command::UpdateFirmware, Command::GetUid],
            Self::Developer => &Command::ALL,
        }
    }

    /// Resolve a 1-based menu number to a command.
    pub fn command_for(self, number: i32) -> Result<Command> {
        usize::try_from(number)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| {
                self.commands()
                    .get(i)
                    .copied()
            })
            .ok_or(Error::UnsupportedCommand(number))
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Developer => write!(f, "Developer"),
        }
    }
}

/// A command together with the inputs its handler needs.
#[derive(Debug, Clone)]
pub enum Request {
    /// Program `image`.
    UpdateFirmware(FirmwareImage),
    /// Install the given key.
    SetKey(CipherKey),
    /// Option-byte check.
    CheckProtection,
    /// Flash lock.
    LockFlash,
    /// Flash unlock.
    UnlockFlash,
    /// Read the UID.
    GetUid,
    /// Verify the given key.
    CheckKey(CipherKey),
    /// Erase the application.
    EraseFirmware,
}

impl Request {
    /// Command code this request is dispatched under.
    pub fn command(&self) -> Command {
        match self {
            Self::UpdateFirmware(_) => Command::UpdateFirmware,
            Self::SetKey(_) => Command::SetKey,
            Self::CheckProtection => Command::CheckProtection,
            Self::LockFlash => Command::LockFlash,
            Self::UnlockFlash => Command::UnlockFlash,
            Self::GetUid => Command::GetUid,
            Self::CheckKey(_) => Command::CheckKey,
            Self::EraseFirmware => Command::EraseFirmware,
        }
    }
}

/// Summary of a firmware update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashReport {
    /// Image size in bytes.
    pub size: usize,
    /// Number of blocks transferred.
    pub blocks: usize,
    /// Device reported the image as programmed.
    pub programmed: bool,
    /// Device announced a reboot.
    pub rebooting: bool,
}

/// Result of a successfully executed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every block was accepted.
    FirmwareUpdated(FlashReport),
    /// UID read from the device.
    Uid(DeviceUid),
    /// Key installed on the device identified by `uid`.
    KeyInstalled {
        /// Installed key.
        key: CipherKey,
        /// Device identity.
        uid: DeviceUid,
    },
    /// The device confirmed the operator key.
    KeyVerified,
    /// Lines the device printed while acting on its own.
    DeviceLog(Vec<String>),
}
