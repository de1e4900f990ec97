//! stmboot CLI - Command-line host for an STM32 UART bootloader.
//!
//! ## Features
//!
//! - Upload firmware images block by block
//! - Read the MCU UID, install and check the firmware encryption key
//! - Flash protection check, lock, unlock and erase
//! - Offline firmware file encryption and decryption
//! - Interactive menu and serial port selection
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use stmboot::{CipherKey, Command};

mod commands;
mod config;
mod prompt;
mod serial;

use commands::bootloader::{cmd_check_key, cmd_plain, cmd_set_key, cmd_update};
use commands::completions::cmd_completions;
use commands::crypt::{Direction, cmd_crypt};
use commands::menu::cmd_menu;
use commands::ports::cmd_list_ports;
use config::Config;
use prompt::parse_key;
use serial::{SerialOptions, select_serial_port};

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Check if emoji/animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Failures classified for the exit code.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Bad or missing operator input.
    #[error("{0}")]
    Usage(String),
    /// Unusable configuration.
    #[error("{0}")]
    Config(String),
    /// The operator backed out of a prompt.
    #[error("{0}")]
    Cancelled(String),
}

/// stmboot - Host-side client for an STM32 UART bootloader.
///
/// Environment variables:
///   STMBOOT_PORT              - Default serial port
///   STMBOOT_BAUD              - Default baud rate (default: 115200)
///   STMBOOT_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "stmboot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = "Examples:\n  \
    stmboot -p /dev/ttyUSB0 update app.bin\n  \
    stmboot uid\n  \
    stmboot encrypt app.bin --key 01020304")]
struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "STMBOOT_PORT")]
    port: Option<String>,

    /// Baud rate [default: 115200].
    #[arg(short, long, global = true, env = "STMBOOT_BAUD")]
    baud: Option<u32>,

    /// Per-line read timeout in milliseconds [default: 1000].
    #[arg(long, global = true, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "STMBOOT_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Upload a firmware image to the microcontroller (command 1).
    Update {
        /// Path to the .bin firmware file.
        firmware: PathBuf,
    },

    /// Read the microcontroller UID (command 6).
    Uid,

    /// Change the firmware encryption key (command 2).
    SetKey {
        /// New key as 8 hex digits (prompted if omitted).
        #[arg(short, long, value_parser = parse_key)]
        key: Option<CipherKey>,
    },

    /// Check that the encryption keys match (command 7).
    CheckKey {
        /// Key to check as 8 hex digits (prompted if omitted).
        #[arg(short, long, value_parser = parse_key)]
        key: Option<CipherKey>,
    },

    /// Check flash memory protection (command 3).
    ObCheck,

    /// Lock microcontroller flash memory (command 4).
    Lock,

    /// Unlock microcontroller flash memory (command 5).
    Unlock,

    /// Erase the firmware flash area (command 8).
    Erase,

    /// Encrypt a firmware file.
    Encrypt {
        /// Plain firmware file.
        file: PathBuf,

        /// Key as 8 hex digits (prompted if omitted).
        #[arg(short, long, value_parser = parse_key)]
        key: Option<CipherKey>,

        /// Output path [default: <stem>_encrypted.bin].
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decrypt a firmware file.
    Decrypt {
        /// Encrypted firmware file.
        file: PathBuf,

        /// Key as 8 hex digits (prompted if omitted).
        #[arg(short, long, value_parser = parse_key)]
        key: Option<CipherKey>,

        /// Output path [default: <stem>_decrypted.bin].
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Choose a command from an interactive menu.
    Menu,

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Map an error to the process exit code.
///
/// 2 usage, 3 config, 4 serial device unavailable, 130 cancelled, 1 otherwise.
fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(cli_err) = cause.downcast_ref::<CliError>() {
            return match cli_err {
                CliError::Usage(_) => 2,
                CliError::Config(_) => 3,
                CliError::Cancelled(_) => 130,
            };
        }
        if let Some(lib_err) = cause.downcast_ref::<stmboot::Error>() {
            return match lib_err {
                stmboot::Error::TransportUnavailable(_) | stmboot::Error::Serial(_) => 4,
                stmboot::Error::Config(_) => 3,
                stmboot::Error::InvalidKey(_) => 2,
                _ => 1,
            };
        }
    }
    1
}

fn init_logging(cli: &Cli) {
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

/// Get serial port from CLI args, config or interactive selection.
fn get_port(cli: &Cli, config: &Config) -> Result<String> {
    let options = SerialOptions {
        port: cli
            .port
            .clone(),
        non_interactive: cli.non_interactive,
    };
    select_serial_port(&options, config)
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config_path {
        Some(path) if !path.exists() => Err(CliError::Config(format!(
            "Config file not found: {}",
            path.display()
        ))
        .into()),
        Some(path) => Ok(Config::load_from_path(path)),
        None => Ok(Config::load()),
    }
}

fn run(cli: &Cli) -> Result<()> {
    init_logging(cli);

    debug!(
        "stmboot v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    let config = load_config(cli)?;

    match &cli.command {
        Commands::Update { firmware } => cmd_update(cli, &config, firmware),
        Commands::Uid => cmd_plain(cli, &config, Command::GetUid),
        Commands::SetKey { key } => cmd_set_key(cli, &config, *key),
        Commands::CheckKey { key } => cmd_check_key(cli, &config, *key),
        Commands::ObCheck => cmd_plain(cli, &config, Command::CheckProtection),
        Commands::Lock => cmd_plain(cli, &config, Command::LockFlash),
        Commands::Unlock => cmd_plain(cli, &config, Command::UnlockFlash),
        Commands::Erase => cmd_plain(cli, &config, Command::EraseFirmware),
        Commands::Encrypt { file, key, output } => {
            cmd_crypt(cli, Direction::Encrypt, file, *key, output.as_deref())
        },
        Commands::Decrypt { file, key, output } => {
            cmd_crypt(cli, Direction::Decrypt, file, *key, output.as_deref())
        },
        Commands::ListPorts { json } => cmd_list_ports(*json),
        Commands::Menu => cmd_menu(cli, &config),
        Commands::Completions { shell } => {
            cmd_completions(*shell);
            Ok(())
        },
    }
}

fn main() {
    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        eprintln!("{} {err:#}", style("Error:").red().bold());
        std::process::exit(exit_code(&err));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_command_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_update() {
        let cli = Cli::try_parse_from(["stmboot", "-p", "/dev/ttyUSB0", "update", "app.bin"])
            .unwrap();
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyUSB0"));
        match cli.command {
            Commands::Update { firmware } => assert_eq!(firmware, PathBuf::from("app.bin")),
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn test_cli_parse_set_key() {
        let cli = Cli::try_parse_from(["stmboot", "set-key", "--key", "01020304"]).unwrap();
        match cli.command {
            Commands::SetKey { key } => assert_eq!(key, Some(CipherKey::new(0x0102_0304))),
            _ => panic!("expected set-key"),
        }
    }

    #[test]
    fn test_cli_parse_check_key_without_key() {
        let cli = Cli::try_parse_from(["stmboot", "check-key"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckKey { key: None }));
    }

    #[test]
    fn test_cli_rejects_malformed_key() {
        assert!(Cli::try_parse_from(["stmboot", "set-key", "-k", "1234"]).is_err());
        assert!(Cli::try_parse_from(["stmboot", "encrypt", "a.bin", "-k", "zzzzzzzz"]).is_err());
    }

    #[test]
    fn test_cli_parse_encrypt_with_output() {
        let cli = Cli::try_parse_from([
            "stmboot", "encrypt", "app.bin", "-k", "CAFEF00D", "-o", "out.bin",
        ])
        .unwrap();
        match cli.command {
            Commands::Encrypt { file, key, output } => {
                assert_eq!(file, PathBuf::from("app.bin"));
                assert_eq!(key, Some(CipherKey::new(0xCAFE_F00D)));
                assert_eq!(output, Some(PathBuf::from("out.bin")));
            },
            _ => panic!("expected encrypt"),
        }
    }

    #[test]
    fn test_cli_parse_drain_commands() {
        for name in ["ob-check", "lock", "unlock", "erase", "uid", "menu"] {
            assert!(
                Cli::try_parse_from(["stmboot", name]).is_ok(),
                "{name} should parse"
            );
        }
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from([
            "stmboot",
            "-vv",
            "--timeout-ms",
            "2000",
            "--non-interactive",
            "--config",
            "custom.toml",
            "list-ports",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.timeout_ms, Some(2000));
        assert!(cli.non_interactive);
        assert_eq!(cli.config_path, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::ListPorts { json: true }));
    }

    #[test]
    fn test_cli_missing_subcommand() {
        assert!(Cli::try_parse_from(["stmboot"]).is_err());
    }

    #[test]
    fn test_exit_code_cli_errors() {
        assert_eq!(exit_code(&CliError::Usage("x".into()).into()), 2);
        assert_eq!(exit_code(&CliError::Config("x".into()).into()), 3);
        assert_eq!(exit_code(&CliError::Cancelled("x".into()).into()), 130);
    }

    #[test]
    fn test_exit_code_library_errors() {
        let unavailable = anyhow::Error::new(stmboot::Error::TransportUnavailable(
            "/dev/ttyUSB9".into(),
        ));
        assert_eq!(exit_code(&unavailable), 4);
        assert_eq!(
            exit_code(&anyhow::Error::new(stmboot::Error::BootloaderNotEntered)),
            1
        );
        assert_eq!(
            exit_code(&anyhow::Error::new(stmboot::Error::ImageTooLarge(usize::MAX))),
            1
        );
        assert_eq!(exit_code(&anyhow::anyhow!("plain failure")), 1);
    }

    #[test]
    fn test_exit_code_sees_through_context() {
        let err = anyhow::Error::new(stmboot::Error::TransportUnavailable("COM9".into()))
            .context("Command 6 failed");
        assert_eq!(exit_code(&err), 4);
    }
}
