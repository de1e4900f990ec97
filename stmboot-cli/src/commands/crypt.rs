//! Offline firmware file encryption and decryption.

use anyhow::{Context, Result};
use console::style;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use stmboot::{CipherKey, xor_transform_grouped};

use crate::Cli;
use crate::prompt::resolve_key;

/// Which way a file is transformed. The cipher is symmetric; only names differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    fn suffix(self) -> &'static str {
        match self {
            Self::Encrypt => "_encrypted.bin",
            Self::Decrypt => "_decrypted.bin",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            Self::Encrypt => "encrypted",
            Self::Decrypt => "decrypted",
        }
    }
}

/// `<dir>/<stem>_encrypted.bin` or `<dir>/<stem>_decrypted.bin`.
pub(crate) fn default_output(input: &Path, direction: Direction) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}{}", direction.suffix()))
}

/// Transform `input` into `output` with the per-group key layout. Returns the byte count.
pub(crate) fn transform_file(input: &Path, output: &Path, key: CipherKey) -> Result<usize> {
    let data = fs::read(input).map_err(|e| stmboot::Error::from_file_io(input, e))?;
    let transformed = xor_transform_grouped(&data, key);
    fs::write(output, &transformed)
        .map_err(|e| stmboot::Error::from_file_io(output, e))
        .with_context(|| format!("Failed to write {}", output.display()))?;
    debug!(
        "Transformed {} bytes from {} into {}",
        data.len(),
        input.display(),
        output.display()
    );
    Ok(transformed.len())
}

/// Encrypt or decrypt command implementation.
pub(crate) fn cmd_crypt(
    cli: &Cli,
    direction: Direction,
    file: &Path,
    key: Option<CipherKey>,
    output: Option<&Path>,
) -> Result<()> {
    let key = resolve_key(key, cli.non_interactive)?;
    let output = output.map_or_else(|| default_output(file, direction), Path::to_path_buf);

    let size = transform_file(file, &output, key)?;

    if !cli.quiet {
        eprintln!(
            "{} File {} {} into {} ({size} bytes)",
            style("✓").green(),
            style(file.display()).cyan(),
            direction.past_tense(),
            style(output.display()).yellow()
        );
    }
    Ok(())
}
