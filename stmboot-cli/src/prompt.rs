//! Operator prompts for values missing from the command line.

use {
    crate::serial::{ensure_interactive_terminal, map_prompt_error, usage_err},
    anyhow::Result,
    dialoguer::{Input, theme::ColorfulTheme},
    std::path::PathBuf,
    stmboot::CipherKey,
};

/// Parse a `--key` argument for clap.
pub(crate) fn parse_key(s: &str) -> Result<CipherKey, String> {
    s.parse::<CipherKey>()
        .map_err(|e| e.to_string())
}

/// Use `key` if given, otherwise ask for it.
///
/// Non-interactive runs never prompt: a missing key is a usage error.
pub(crate) fn resolve_key(key: Option<CipherKey>, non_interactive: bool) -> Result<CipherKey> {
    if let Some(key) = key {
        return Ok(key);
    }
    if non_interactive {
        return Err(usage_err(
            "An encryption key is required: pass --key in non-interactive mode",
        ));
    }
    ensure_interactive_terminal()?;

    let text: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Enter the 4-byte encryption key (8 hex digits, e.g. 01020304)")
        .validate_with(|input: &String| parse_key(input).map(|_| ()))
        .interact_text()
        .map_err(map_prompt_error)?;

    Ok(text.parse::<CipherKey>()?)
}

/// Ask for a file path.
pub(crate) fn prompt_path(prompt: &str) -> Result<PathBuf> {
    ensure_interactive_terminal()?;

    let text: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .validate_with(|input: &String| {
            if input
                .trim()
                .is_empty()
            {
                Err("path must not be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .map_err(map_prompt_error)?;

    Ok(PathBuf::from(text.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CliError;

    #[test]
    fn test_parse_key_accepts_eight_hex_digits() {
        assert_eq!(
            parse_key("01020304")
                .unwrap()
                .value(),
            0x0102_0304
        );
        assert_eq!(
            parse_key("0xDEADBEEF")
                .unwrap()
                .value(),
            0xDEAD_BEEF
        );
    }

    #[test]
    fn test_parse_key_rejects_bad_input() {
        assert!(parse_key("0102").is_err());
        assert!(parse_key("0102030G").is_err());
        assert!(parse_key("").is_err());
    }

    #[test]
    fn test_resolve_key_uses_given_key() {
        let key = CipherKey::new(7);
        assert_eq!(resolve_key(Some(key), true).unwrap(), key);
    }

    #[test]
    fn test_resolve_key_non_interactive_missing_is_usage_error() {
        let err = resolve_key(None, true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Usage(_))
        ));
    }
}
