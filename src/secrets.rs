// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Secrets file decryption.
//!
//! Dotfile repositories are public, so anything sensitive rides along as a
//! single encrypted blob that gets decrypted into place during bootstrap.
//! Decryption is delegated to the openssl binary with a password-derived
//! symmetric cipher (`aes-256-cbc` with PBKDF2 key derivation), matching how
//! the blob is produced in the first place:
//!
//! ```sh
//! openssl enc -aes-256-cbc -pbkdf2 -in plaintext -out secrets.enc
//! ```
//!
//! The password comes from the `SECRETS_PASSWORD` environment variable, or
//! an interactive prompt when the variable is unset. It is handed to openssl
//! through the environment, never through argv, so it cannot leak through a
//! process listing.

use crate::proc::{self, ProcError};

use inquire::Password;
use std::{env, path::Path};
use tracing::{info, instrument};

/// Environment variable consulted for the decryption password.
pub const PASSWORD_VAR: &str = "SECRETS_PASSWORD";

// Name openssl reads the password back out of; see `-pass env:` in enc(1).
const PASSTHROUGH_VAR: &str = "RIGUP_SECRETS_PASSWORD";

/// Resolve decryption password.
///
/// Consults [`PASSWORD_VAR`] first, then falls back to prompting when
/// `interactive` allows it.
///
/// # Errors
///
/// - Return [`SecretsError::MissingPassword`] if the variable is unset and
///   prompting is disallowed.
/// - Return [`SecretsError::Prompt`] if the prompt itself fails.
pub fn resolve_password(interactive: bool) -> Result<String> {
    match env::var(PASSWORD_VAR) {
        Ok(password) if !password.is_empty() => return Ok(password),
        _ => {}
    }

    if !interactive {
        return Err(SecretsError::MissingPassword);
    }

    let password = Password::new("secrets password")
        .without_confirmation()
        .prompt()?;

    Ok(password)
}

/// Decrypt encrypted secrets file into plaintext path.
///
/// # Errors
///
/// - Return [`SecretsError::MissingCiphertext`] if the encrypted file does
///   not exist.
/// - Return [`SecretsError::MissingOpenssl`] if openssl is absent from PATH.
/// - Return [`SecretsError::Proc`] if the decryption process fails, e.g.,
///   wrong password.
#[instrument(skip(encrypted, plaintext, password), level = "debug")]
pub fn decrypt(
    encrypted: impl AsRef<Path>,
    plaintext: impl AsRef<Path>,
    password: impl AsRef<str>,
) -> Result<()> {
    let encrypted = encrypted.as_ref();
    let plaintext = plaintext.as_ref();

    if !encrypted.exists() {
        return Err(SecretsError::MissingCiphertext {
            path: encrypted.to_path_buf(),
        });
    }

    if !proc::command_on_path("openssl") {
        return Err(SecretsError::MissingOpenssl);
    }

    proc::run_captured_with_env(
        "openssl",
        [
            "enc",
            "-d",
            "-aes-256-cbc",
            "-pbkdf2",
            "-pass",
            format!("env:{PASSTHROUGH_VAR}").as_str(),
            "-in",
            encrypted.to_string_lossy().as_ref(),
            "-out",
            plaintext.to_string_lossy().as_ref(),
        ],
        [(PASSTHROUGH_VAR, password.as_ref())],
    )?;

    info!(
        "decrypted {:?} into {:?}",
        encrypted.display(),
        plaintext.display()
    );

    Ok(())
}

/// Secrets decryption error types.
#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    /// No password available, and prompting disallowed.
    #[error("no secrets password: set {PASSWORD_VAR} or run interactively")]
    MissingPassword,

    /// The openssl binary is absent from PATH.
    #[error("openssl is required for secrets decryption, but was not found on PATH")]
    MissingOpenssl,

    /// Encrypted file does not exist.
    #[error("encrypted secrets file {:?} does not exist", path.display())]
    MissingCiphertext { path: std::path::PathBuf },

    /// Password prompt failed.
    #[error(transparent)]
    Prompt(#[from] inquire::InquireError),

    /// Decryption process failed.
    #[error(transparent)]
    Proc(#[from] ProcError),
}

/// Friendly result alias :3
pub type Result<T, E = SecretsError> = std::result::Result<T, E>;
