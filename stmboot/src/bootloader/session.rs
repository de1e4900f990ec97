//! Bootloader session: one state machine per bootloader command.
//!
//! Every command follows the same outline:
//!
//! ```text
//! WAIT_BUTTON --> READY --COMD--> command steps --> DONE
//!      |                               |
//!      +----------> FAILED <-----------+
//! ```
//!
//! The device mixes free text lines with binary `RESP` frames on one stream,
//! so every read is "read one line, then look for a frame inside it".
//!
//! ## Example
//!
//! ```rust,no_run
//! use stmboot::{BootloaderSession, FirmwareImage, Request};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let port = stmboot::NativePort::open_simple("/dev/ttyUSB0", 115200)?;
//!     let mut session = BootloaderSession::new(port);
//!
//!     let image = FirmwareImage::from_file("app.bin")?;
//!     session.execute(&Request::UpdateFirmware(image), |current, total| {
//!         println!("[{current} / {total}]");
//!     })?;
//!
//!     session.close()?;
//!     Ok(())
//! }
//! ```

use crate::bootloader::command::{Command, FlashReport, Outcome, Request};
use crate::bootloader::uid::DeviceUid;
use crate::cipher::CipherKey;
use crate::error::{Error, Result};
use crate::image::FirmwareImage;
use crate::port::Port;
use crate::protocol::packet::{
    Packet, ResponseOutcome, StatusLine, TEST_WORD, decode_line, decode_response, find_response,
};
use crate::retry::{Attempt, CONNECTION_RETRIES, DRAIN_LINES, RetryPolicy};
use log::{debug, info, trace, warn};
use std::thread;
use std::time::Duration;

/// Pause before each `DATA` packet, covering the device flash-write latency.
pub const PACKET_DELAY: Duration = Duration::from_millis(600);

/// Lines read after a firmware transfer or a refused bootloader entry.
pub const TRAILING_LINES: u32 = 10;

/// Literal lines printed by the bootloader firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DevicePhrases {
    /// User button held at reset, bootloader mode entered.
    pub bootloader_entered: String,
    /// User button not held, device starts the application.
    pub application_start: String,
    /// Image programmed.
    pub firmware_programmed: String,
    /// Device about to reset.
    pub rebooting: String,
}

impl Default for DevicePhrases {
    fn default() -> Self {
        Self {
            bootloader_entered: "Кнопка User была нажата, переходим в режим загрузчика".into(),
            application_start:
                "Кнопка User не нажата, переходим к исполнению пользовательского приложения".into(),
            firmware_programmed: "Прошивка запрограммирована успешно!".into(),
            rebooting: "Перезагрузка МК!".into(),
        }
    }
}

/// Session timing and retry parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Attempt ceiling for exchanges and status/response waits.
    pub retries: u32,
    /// Line ceiling for best-effort drains.
    pub drain_lines: u32,
    /// Lines read after a transfer completes.
    pub trailing_lines: u32,
    /// Pause before each `DATA` packet.
    pub packet_delay: Duration,
    /// Device text lines to recognise.
    pub phrases: DevicePhrases,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retries: CONNECTION_RETRIES,
            drain_lines: DRAIN_LINES,
            trailing_lines: TRAILING_LINES,
            packet_delay: PACKET_DELAY,
            phrases: DevicePhrases::default(),
        }
    }
}

impl SessionConfig {
    /// Set the pause before each `DATA` packet.
    #[must_use]
    pub fn with_packet_delay(mut self, delay: Duration) -> Self {
        self.packet_delay = delay;
        self
    }

    /// Replace the recognised device phrases.
    #[must_use]
    pub fn with_phrases(mut self, phrases: DevicePhrases) -> Self {
        self.phrases = phrases;
        self
    }
}

/// Host side of one bootloader connection.
///
/// Owns the port for its whole lifetime; exchanges are strictly sequential.
pub struct BootloaderSession<P: Port> {
    port: P,
    config: SessionConfig,
    /// Start of a `RESP` frame cut short by a newline inside its value.
    pending: Vec<u8>,
}

impl<P: Port> BootloaderSession<P> {
    /// Create a session with default parameters.
    pub fn new(port: P) -> Self {
        Self::with_config(port, SessionConfig::default())
    }

    /// Create a session with custom parameters.
    pub fn with_config(port: P, config: SessionConfig) -> Self {
        Self {
            port,
            config,
            pending: Vec::new(),
        }
    }

    /// Session parameters.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Close the port.
    pub fn close(&mut self) -> Result<()> {
        self.port.close()
    }

    /// Attempt ceiling; a configured zero still allows one attempt.
    fn attempts(&self) -> u32 {
        self.config.retries.max(1)
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts())
    }

    /// Log a device line, returning its text if non-empty.
    fn report_line(raw: &[u8]) -> Option<String> {
        let text = decode_line(raw);
        if text.is_empty() {
            return None;
        }
        info!("Bootloader: {text}");
        Some(text)
    }

    /// Run one command end to end: wait for bootloader mode, send the
    /// command code, then the command's own steps.
    ///
    /// `progress` receives `(blocks_done, blocks_total)` during a firmware
    /// update and is not called otherwise.
    pub fn execute<F>(&mut self, request: &Request, progress: F) -> Result<Outcome>
    where
        F: FnMut(usize, usize),
    {
        let command = request.command();
        info!("{command}");

        self.wait_bootloader_mode()?;
        self.send_command(command)?;

        match request {
            Request::UpdateFirmware(image) => self
                .update_firmware(image, progress)
                .map(Outcome::FirmwareUpdated),
            Request::SetKey(key) => self
                .set_key(*key)
                .map(|uid| Outcome::KeyInstalled { key: *key, uid }),
            Request::GetUid => self
                .get_uid()
                .map(Outcome::Uid),
            Request::CheckKey(key) => self
                .check_key(*key)
                .map(|()| Outcome::KeyVerified),
            Request::CheckProtection
            | Request::LockFlash
            | Request::UnlockFlash
            | Request::EraseFirmware => self
                .drain_log()
                .map(Outcome::DeviceLog),
        }
    }

    /// Wait for the device to announce bootloader mode after reset.
    pub fn wait_bootloader_mode(&mut self) -> Result<()> {
        info!("Waiting for bootloader on {}...", self.port.name());

        for _ in 0..self.attempts() {
            let Some(raw) = self.port.read_line()? else {
                continue;
            };
            let Some(text) = Self::report_line(&raw) else {
                continue;
            };

            if text == self.config.phrases.bootloader_entered {
                info!("Bootloader mode entered");
                return Ok(());
            }
            if text == self.config.phrases.application_start {
                for _ in 0..self.config.trailing_lines {
                    if let Some(raw) = self.port.read_line()? {
                        Self::report_line(&raw);
                    }
                }
                return Err(Error::BootloaderNotEntered);
            }
        }

        Err(Error::Timeout("bootloader not responding".into()))
    }

    /// Send the `COMD` packet selecting `command`.
    pub fn send_command(&mut self, command: Command) -> Result<()> {
        debug!("Sending command code {}", command.code());
        self.send_packet(&Packet::command(command.code()))
    }

    fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        let data = packet.encode();
        trace!(
            "Sending {} packet: {} bytes, crc {:#010x}",
            packet.magic(),
            data.len(),
            packet.crc()
        );
        self.port.write_all_bytes(&data)
    }

    /// Read lines until one carries `ACKW` or `NACK`.
    ///
    /// Gives up after the attempt ceiling with [`StatusLine::Unmatched`].
    pub fn await_status(&mut self) -> Result<StatusLine> {
        for _ in 0..self.attempts() {
            let Some(raw) = self.port.read_line()? else {
                continue;
            };
            match StatusLine::classify(&raw) {
                StatusLine::Unmatched => {
                    trace!("Ignoring line while awaiting status: {:?}", decode_line(&raw));
                },
                status => return Ok(status),
            }
        }
        Ok(StatusLine::Unmatched)
    }

    /// Send `packet` until the device acknowledges it.
    ///
    /// With `paced`, sleep the configured packet delay before every send.
    fn exchange(&mut self, what: &str, packet: &Packet, paced: bool) -> Result<()> {
        let policy = self.retry_policy();
        let mut rejected = false;

        let result = policy.run(what, |_| {
            if paced {
                thread::sleep(self.config.packet_delay);
            }
            self.send_packet(packet)?;
            Ok(match self.await_status()? {
                StatusLine::Ack => Attempt::Done(()),
                StatusLine::Nack => {
                    rejected = true;
                    Attempt::Retry("rejected by device".into())
                },
                StatusLine::Unmatched => {
                    rejected = false;
                    Attempt::Retry("no status from device".into())
                },
            })
        });

        match result {
            Err(Error::RetriesExhausted { what, attempts }) if rejected => {
                Err(Error::Nack(format!("{what} ({attempts} attempts)")))
            },
            other => other,
        }
    }

    /// Read lines until one carries a `RESP` frame.
    ///
    /// Returns [`ResponseOutcome::Success`] or [`ResponseOutcome::Opaque`];
    /// the failure sentinel becomes [`Error::FailureCode`] and an exhausted
    /// ceiling [`Error::Timeout`].
    pub fn await_response(&mut self) -> Result<ResponseOutcome> {
        for _ in 0..self.attempts() {
            let Some(raw) = self.port.read_line()? else {
                continue;
            };

            let mut buf = std::mem::take(&mut self.pending);
            buf.extend_from_slice(&raw);

            match decode_response(&buf) {
                ResponseOutcome::Success => {
                    info!("Response: success");
                    return Ok(ResponseOutcome::Success);
                },
                ResponseOutcome::Failure => {
                    return Err(Error::FailureCode("response 0x33333333".into()));
                },
                ResponseOutcome::Opaque(value) => {
                    debug!("Response: {value:#x}");
                    return Ok(ResponseOutcome::Opaque(value));
                },
                ResponseOutcome::NotFound => {
                    if let Some(pos) = find_response(&buf) {
                        trace!("Partial response frame, waiting for the rest");
                        self.pending = buf[pos..].to_vec();
                    } else {
                        Self::report_line(&buf);
                    }
                },
            }
        }

        // A partial frame never completed; it must not prefix the next wait
        self.pending.clear();
        Err(Error::Timeout("no response from bootloader".into()))
    }

    /// Await a response that must be the success sentinel.
    fn await_verdict(&mut self) -> Result<()> {
        match self.await_response()? {
            ResponseOutcome::Opaque(value) => Err(Error::UnknownResponse(value)),
            _ => Ok(()),
        }
    }

    /// Read up to the drain ceiling of lines, stopping at the first timeout.
    pub fn drain_log(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        for _ in 0..self.config.drain_lines {
            match self.port.read_line()? {
                Some(raw) => lines.extend(Self::report_line(&raw)),
                None => break,
            }
        }
        Ok(lines)
    }

    /// Transfer and program a firmware image.
    ///
    /// Aborts on the first block the device does not acknowledge within the
    /// attempt ceiling; later blocks are never sent.
    pub fn update_firmware<F>(&mut self, image: &FirmwareImage, mut progress: F) -> Result<FlashReport>
    where
        F: FnMut(usize, usize),
    {
        let blocks = image.blocks();
        let total = blocks.len();
        let size = image.wire_size()?;

        info!(
            "Firmware size: {size} bytes, {total} blocks of {} bytes",
            crate::image::BLOCK_SIZE
        );

        info!("Sending firmware header");
        self.exchange("header", &Packet::header(size), false)?;

        info!("Waiting for free flash space confirmation");
        self.await_response()?;

        info!("Transferring firmware");
        for (index, block) in blocks
            .iter()
            .enumerate()
        {
            let what = format!("block {}/{total}", index + 1);
            self.exchange(&what, &Packet::data(block), true)?;
            debug!("[{} / {total}]", index + 1);
            progress(index + 1, total);
        }

        let mut report = FlashReport {
            size: image.size(),
            blocks: total,
            programmed: false,
            rebooting: false,
        };

        for _ in 0..self.config.trailing_lines {
            let Some(raw) = self.port.read_line()? else {
                continue;
            };
            let Some(text) = Self::report_line(&raw) else {
                continue;
            };
            if text == self.config.phrases.firmware_programmed {
                report.programmed = true;
            } else if text == self.config.phrases.rebooting {
                report.rebooting = true;
                break;
            }
        }

        if !report.programmed {
            warn!("Device did not confirm programming");
        }

        Ok(report)
    }

    /// Read the three UID fragments the device sends after the command code.
    pub fn get_uid(&mut self) -> Result<DeviceUid> {
        let mut fragments = [0u32; 3];
        for fragment in &mut fragments {
            *fragment = match self.await_response() {
                Ok(outcome) => outcome
                    .value()
                    .ok_or(Error::UidEmpty)?,
                Err(Error::Timeout(_)) => return Err(Error::UidEmpty),
                Err(e) => return Err(e),
            };
        }

        let uid = DeviceUid::new(fragments);
        info!("UID = {uid}");
        Ok(uid)
    }

    /// Install `key`, scrambled with the secret derived from the device UID.
    pub fn set_key(&mut self, key: CipherKey) -> Result<DeviceUid> {
        let uid = self.get_uid()?;
        let scrambled = uid
            .secret_key()
            .scramble_key(key);

        self.exchange("key", &Packet::key(scrambled), false)?;
        info!("Key packet accepted");

        info!("Waiting for key installation result");
        self.await_verdict()?;

        info!("Encryption key {key} installed for MCU with UID {uid}");
        Ok(uid)
    }

    /// Ask the device to confirm that `key` matches its installed key.
    pub fn check_key(&mut self, key: CipherKey) -> Result<()> {
        let scrambled = key.scramble_word(TEST_WORD);

        self.exchange("key check", &Packet::key(scrambled), false)?;
        info!("Key packet accepted");

        info!("Waiting for key comparison result");
        self.await_verdict()
    }
}
