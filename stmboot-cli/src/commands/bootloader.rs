//! Bootloader command implementations.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::path::Path;
use std::time::Duration;
use stmboot::port::{DEFAULT_BAUD, DEFAULT_TIMEOUT};
use stmboot::{
    BootloaderSession, CipherKey, Command, FirmwareImage, NativePort, Outcome, Request,
    SerialConfig,
};

use crate::config::Config;
use crate::prompt::resolve_key;
use crate::{Cli, get_port, use_fancy_output};

/// Baud rate: flag or environment, then config, then the bootloader default.
pub(crate) fn resolve_baud(cli: &Cli, config: &Config) -> u32 {
    cli.baud
        .or(config.connection.baud)
        .unwrap_or(DEFAULT_BAUD)
}

/// Per-line read timeout: flag, then config, then the default.
pub(crate) fn resolve_timeout(cli: &Cli, config: &Config) -> Duration {
    cli.timeout_ms
        .map(Duration::from_millis)
        .or_else(|| config.line_timeout())
        .unwrap_or(DEFAULT_TIMEOUT)
}

/// Request for a command that needs no operator input.
pub(crate) fn plain_request(command: Command) -> Option<Request> {
    match command {
        Command::CheckProtection => Some(Request::CheckProtection),
        Command::LockFlash => Some(Request::LockFlash),
        Command::UnlockFlash => Some(Request::UnlockFlash),
        Command::GetUid => Some(Request::GetUid),
        Command::EraseFirmware => Some(Request::EraseFirmware),
        Command::UpdateFirmware | Command::SetKey | Command::CheckKey => None,
    }
}

fn open_session(cli: &Cli, config: &Config) -> Result<BootloaderSession<NativePort>> {
    let port_name = get_port(cli, config)?;
    let baud = resolve_baud(cli, config);
    let serial = SerialConfig::new(&port_name, baud).with_timeout(resolve_timeout(cli, config));

    if !cli.quiet {
        eprintln!(
            "{} Using port {} at {} baud",
            style("🔌").cyan(),
            style(&port_name).green(),
            baud
        );
    }

    let port = NativePort::open(&serial)?;
    Ok(BootloaderSession::with_config(port, config.session_config()))
}

fn progress_bar(cli: &Cli) -> ProgressBar {
    if cli.quiet || !use_fancy_output() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    #[allow(clippy::unwrap_used)] // Static template string
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    pb
}

/// Open a session, run one request and release the port.
fn run_request(cli: &Cli, config: &Config, request: &Request) -> Result<Outcome> {
    let mut session = open_session(cli, config)?;

    if !cli.quiet {
        eprintln!(
            "{} Reset the board while holding the User button...",
            style("⏳").yellow()
        );
    }

    let pb = progress_bar(cli);
    let result = session.execute(request, |current, total| {
        pb.set_length(total as u64);
        pb.set_position(current as u64);
    });

    if result.is_ok() {
        pb.finish();
    } else {
        pb.abandon();
    }

    if let Err(e) = session.close() {
        warn!("Failed to close port: {e}");
    }

    let command = request.command();
    result.with_context(|| format!("Command {} ({command}) failed", command.code()))
}

fn report(cli: &Cli, outcome: &Outcome) {
    match outcome {
        Outcome::FirmwareUpdated(report) => {
            if cli.quiet {
                return;
            }
            eprintln!(
                "{} Transferred {} bytes in {} blocks",
                style("✓").green(),
                report.size,
                report.blocks
            );
            if report.programmed {
                eprintln!("{} Firmware programmed", style("✓").green());
            }
            if report.rebooting {
                eprintln!("{} Rebooting microcontroller", style("🔄").cyan());
            }
        },
        // Data goes to stdout for scripts
        Outcome::Uid(uid) => println!("{uid}"),
        Outcome::KeyInstalled { key, uid } => {
            if !cli.quiet {
                eprintln!(
                    "{} Encryption key {} installed for MCU with UID {}",
                    style("✓").green(),
                    style(key).yellow(),
                    style(uid).cyan()
                );
            }
        },
        Outcome::KeyVerified => {
            if !cli.quiet {
                eprintln!("{} Encryption keys match", style("✓").green());
            }
        },
        Outcome::DeviceLog(lines) => {
            if lines.is_empty() {
                warn!("Bootloader printed no status");
            } else if !cli.quiet {
                eprintln!("{} Done", style("✓").green());
            }
        },
    }
}

/// Update command implementation.
pub(crate) fn cmd_update(cli: &Cli, config: &Config, firmware: &Path) -> Result<()> {
    if !cli.quiet {
        eprintln!(
            "{} Loading firmware: {}",
            style("📦").cyan(),
            firmware.display()
        );
    }

    // Fail on an unreadable image before touching the port
    let image = FirmwareImage::from_file(firmware)?;

    if !cli.quiet {
        eprintln!(
            "{} {} bytes, {} blocks of {} bytes",
            style("ℹ").blue(),
            image.size(),
            image.block_count(),
            stmboot::image::BLOCK_SIZE
        );
    }

    let outcome = run_request(cli, config, &Request::UpdateFirmware(image))?;
    report(cli, &outcome);
    Ok(())
}

/// Set-key command implementation.
pub(crate) fn cmd_set_key(cli: &Cli, config: &Config, key: Option<CipherKey>) -> Result<()> {
    let key = resolve_key(key, cli.non_interactive)?;
    let outcome = run_request(cli, config, &Request::SetKey(key))?;
    report(cli, &outcome);
    Ok(())
}

/// Check-key command implementation.
pub(crate) fn cmd_check_key(cli: &Cli, config: &Config, key: Option<CipherKey>) -> Result<()> {
    let key = resolve_key(key, cli.non_interactive)?;
    let outcome = run_request(cli, config, &Request::CheckKey(key))?;
    report(cli, &outcome);
    Ok(())
}

/// UID, option-byte check, lock, unlock and erase.
pub(crate) fn cmd_plain(cli: &Cli, config: &Config, command: Command) -> Result<()> {
    let request = plain_request(command)
        .with_context(|| format!("'{command}' needs operator input"))?;
    let outcome = run_request(cli, config, &request)?;
    report(cli, &outcome);
    Ok(())
}
