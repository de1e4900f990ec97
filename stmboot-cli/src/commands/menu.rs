//! Interactive menu mirroring the bootloader host workflow.
//!
//! ```text
//! User      -> 1. Upload firmware     2. Read UID
//! Developer -> Encrypt file | Decrypt file | Bootloader commands 1-8
//! ```

use anyhow::Result;
use console::style;
use dialoguer::{Select, theme::ColorfulTheme};
use stmboot::{Command, Persona};

use crate::commands::bootloader::{cmd_check_key, cmd_plain, cmd_set_key, cmd_update};
use crate::commands::crypt::{Direction, cmd_crypt};
use crate::config::Config;
use crate::prompt::prompt_path;
use crate::serial::{ensure_interactive_terminal, map_prompt_error, usage_err};
use crate::{Cli, CliError};

const PERSONAS: [Persona; 2] = [Persona::User, Persona::Developer];

/// Developer actions besides talking to the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeveloperAction {
    Encrypt,
    Decrypt,
    Bootloader,
}

impl DeveloperAction {
    const ALL: [Self; 3] = [Self::Encrypt, Self::Decrypt, Self::Bootloader];

    fn label(self) -> &'static str {
        match self {
            Self::Encrypt => "Encrypt a firmware file",
            Self::Decrypt => "Decrypt a firmware file",
            Self::Bootloader => "Work with the bootloader",
        }
    }
}

/// Numbered menu lines for a persona's commands.
fn command_items(persona: Persona) -> Vec<String> {
    persona
        .commands()
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c.description()))
        .collect()
}

fn select(prompt: &str, items: &[String]) -> Result<usize> {
    Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?
        .ok_or_else(|| CliError::Cancelled("Menu closed".to_string()).into())
}

fn select_command(persona: Persona) -> Result<Command> {
    let index = select("Bootloader command", &command_items(persona))?;
    let number = i32::try_from(index + 1)?;
    Ok(persona.command_for(number)?)
}

fn run_command(cli: &Cli, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::UpdateFirmware => {
            let firmware = prompt_path("Path to the .bin firmware")?;
            cmd_update(cli, config, &firmware)
        },
        Command::SetKey => cmd_set_key(cli, config, None),
        Command::CheckKey => cmd_check_key(cli, config, None),
        other => cmd_plain(cli, config, other),
    }
}

fn run_developer_action(cli: &Cli, config: &Config, action: DeveloperAction) -> Result<()> {
    let direction = match action {
        DeveloperAction::Encrypt => Direction::Encrypt,
        DeveloperAction::Decrypt => Direction::Decrypt,
        DeveloperAction::Bootloader => {
            let command = select_command(Persona::Developer)?;
            return run_command(cli, config, command);
        },
    };
    let file = prompt_path("Path to the .bin firmware")?;
    cmd_crypt(cli, direction, &file, None, None)
}

/// Menu command implementation.
pub(crate) fn cmd_menu(cli: &Cli, config: &Config) -> Result<()> {
    if cli.non_interactive {
        return Err(usage_err(
            "The menu needs a terminal; use a subcommand in non-interactive mode",
        ));
    }
    ensure_interactive_terminal()?;

    eprintln!("{}", style("STM32 bootloader host").bold().underlined());

    let personas: Vec<String> = PERSONAS
        .iter()
        .map(ToString::to_string)
        .collect();
    let persona = PERSONAS[select("Who is using the bootloader?", &personas)?];

    match persona {
        Persona::User => {
            let command = select_command(persona)?;
            run_command(cli, config, command)
        },
        Persona::Developer => {
            let labels: Vec<String> = DeveloperAction::ALL
                .iter()
                .map(|a| a.label().to_string())
                .collect();
            let action = DeveloperAction::ALL[select("Developer action", &labels)?];
            run_developer_action(cli, config, action)
        },
    }
}
