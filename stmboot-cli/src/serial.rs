//! Serial port selection.
//!
//! The port is taken from, in order:
//! - the `--port` flag or `STMBOOT_PORT`
//! - the `[connection] serial` config entry
//! - enumeration: a single port is auto-selected, several are offered in a
//!   `dialoguer` list, none is a usage error

use {
    crate::{CliError, config::Config},
    anyhow::Result,
    console::style,
    dialoguer::{Error as DialoguerError, Select, theme::ColorfulTheme},
    log::{debug, info},
    std::{cmp::Ordering, io::IsTerminal},
    stmboot::{NativePortEnumerator, PortEnumerator, PortInfo},
};

/// Options for serial port selection.
#[derive(Debug, Clone, Default)]
pub struct SerialOptions {
    /// Explicit port specified via CLI.
    pub port: Option<String>,
    /// Non-interactive mode (fail if multiple ports).
    pub non_interactive: bool,
}

pub(crate) fn usage_err(message: &str) -> anyhow::Error {
    CliError::Usage(message.to_string()).into()
}

pub(crate) fn ensure_interactive_terminal() -> Result<()> {
    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        Err(usage_err(
            "Interactive prompt requires a terminal; pass the value as an argument",
        ))
    }
}

pub(crate) fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) => {
            if io_err.kind() == std::io::ErrorKind::Interrupted {
                CliError::Cancelled("Prompt cancelled".to_string()).into()
            } else {
                usage_err(&format!("Prompt failed: {io_err}"))
            }
        },
    }
}

/// Select a serial port name.
pub fn select_serial_port(options: &SerialOptions, config: &Config) -> Result<String> {
    if let Some(port_name) = &options.port {
        return Ok(port_name.clone());
    }

    if let Some(port_name) = &config
        .connection
        .serial
    {
        debug!("Using port from config: {port_name}");
        return Ok(port_name.clone());
    }

    let ports = NativePortEnumerator::list_ports()?;
    choose_port(ports, options.non_interactive)
}

fn choose_port(ports: Vec<PortInfo>, non_interactive: bool) -> Result<String> {
    match ports
        .len()
        .cmp(&1)
    {
        Ordering::Less => Err(usage_err(
            "No serial ports found; connect the board or pass --port",
        )),
        Ordering::Equal => {
            let port = ports
                .into_iter()
                .next()
                .ok_or_else(|| usage_err("No serial ports found"))?;
            info!("Auto-selected port: {}", port.name);
            Ok(port.name)
        },
        Ordering::Greater if non_interactive => Err(usage_err(
            "Found multiple serial ports; pass --port in non-interactive mode",
        )),
        Ordering::Greater => {
            ensure_interactive_terminal()?;
            select_port_interactive(ports)
        },
    }
}

/// One-line description of a port for lists and prompts.
pub(crate) fn port_label(port: &PortInfo) -> String {
    let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
        format!(" ({vid:04X}:{pid:04X})")
    } else {
        String::new()
    };
    let product = port
        .product
        .as_ref()
        .map(|p| format!(" - {}", style(p).dim()))
        .unwrap_or_default();

    format!("{}{vid_pid}{product}", port.name)
}

fn select_port_interactive(ports: Vec<PortInfo>) -> Result<String> {
    eprintln!(
        "{} Detected {} serial ports",
        style("ℹ").blue(),
        ports.len()
    );

    // Truncate labels to fit terminal width to prevent wrapping in narrow
    // terminals.
    let term_width = console::Term::stderr()
        .size()
        .1 as usize;
    let max_item_width = term_width.saturating_sub(4);
    let labels: Vec<String> = ports
        .iter()
        .map(|p| console::truncate_str(&port_label(p), max_item_width, "\u{2026}").into_owned())
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select the serial port connected to the bootloader")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?;

    match selection {
        Some(index) => ports
            .into_iter()
            .nth(index)
            .map(|p| p.name)
            .ok_or_else(|| anyhow::anyhow!("Invalid port index: {index}")),
        None => Err(CliError::Cancelled("Port selection cancelled".to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(name: &str) -> PortInfo {
        PortInfo {
            name: name.to_string(),
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }

    fn assert_usage(err: &anyhow::Error) {
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Usage(_))
        ));
    }

    #[test]
    fn test_explicit_port_wins_over_config() {
        let mut config = Config::default();
        config.connection.serial = Some("/dev/ttyUSB1".to_string());
        let options = SerialOptions {
            port: Some("/dev/ttyACM0".to_string()),
            non_interactive: true,
        };
        assert_eq!(
            select_serial_port(&options, &config).unwrap(),
            "/dev/ttyACM0"
        );
    }

    #[test]
    fn test_config_port_used_without_flag() {
        let mut config = Config::default();
        config.connection.serial = Some("COM3".to_string());
        let options = SerialOptions {
            non_interactive: true,
            ..Default::default()
        };
        assert_eq!(select_serial_port(&options, &config).unwrap(), "COM3");
    }

    #[test]
    fn test_single_port_auto_selected() {
        let name = choose_port(vec![port("/dev/ttyUSB0")], true).unwrap();
        assert_eq!(name, "/dev/ttyUSB0");
    }

    #[test]
    fn test_no_ports_is_usage_error() {
        let err = choose_port(vec![], false).unwrap_err();
        assert_usage(&err);
    }

    #[test]
    fn test_multiple_ports_non_interactive_is_usage_error() {
        let err = choose_port(vec![port("/dev/ttyUSB0"), port("/dev/ttyUSB1")], true).unwrap_err();
        assert_usage(&err);
        assert!(err.to_string().contains("multiple"));
    }

    #[test]
    fn test_port_label_with_usb_ids() {
        console::set_colors_enabled(false);
        let mut info = port("/dev/ttyUSB0");
        info.vid = Some(0x0483);
        info.pid = Some(0x5740);
        info.product = Some("STM32 Virtual ComPort".to_string());
        assert_eq!(
            port_label(&info),
            "/dev/ttyUSB0 (0483:5740) - STM32 Virtual ComPort"
        );
    }

    #[test]
    fn test_port_label_plain() {
        assert_eq!(port_label(&port("COM1")), "COM1");
    }
}
