// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Secrets decryption step.
//!
//! Decrypts the manifest's encrypted secrets file into its plaintext
//! destination. An existing plaintext file is treated as the step being
//! satisfied; rotating secrets means deleting the plaintext and running the
//! step again.

use crate::{
    manifest::SecretsSpec,
    secrets,
    step::{Outcome, Result},
};

use tracing::{info, instrument};

/// Decrypt the manifest's secrets file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretsStep {
    spec: SecretsSpec,
}

impl SecretsStep {
    /// Construct new secrets step from manifest spec.
    pub fn new(spec: SecretsSpec) -> Self {
        Self { spec }
    }

    /// Check if the plaintext file already exists.
    pub fn is_satisfied(&self) -> bool {
        self.spec.plaintext.exists()
    }

    /// Apply the step: resolve the password and decrypt.
    ///
    /// # Errors
    ///
    /// - Return [`StepError::Secrets`] if no password can be resolved, or
    ///   decryption fails.
    ///
    /// [`StepError::Secrets`]: crate::step::StepError::Secrets
    #[instrument(skip(self), level = "debug")]
    pub fn apply(&self) -> Result<Outcome> {
        if self.is_satisfied() {
            info!(
                "plaintext secrets already present at {:?}",
                self.spec.plaintext.display()
            );
            return Ok(Outcome::AlreadySatisfied);
        }

        let password = secrets::resolve_password(true)?;
        secrets::decrypt(&self.spec.encrypted, &self.spec.plaintext, password)?;

        Ok(Outcome::Changed)
    }
}
