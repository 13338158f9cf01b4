// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Git configuration step.
//!
//! Writes the handful of global git configuration values a fresh machine
//! needs through libgit2, straight into `$HOME/.gitconfig`. Values are only
//! written when they differ from what is already configured, so hand-edited
//! configuration survives repeated bootstrap runs untouched.

use crate::{
    manifest::GitConfigSpec,
    step::{Outcome, Result, StepContext},
};

use git2::Config;
use tracing::{debug, info, instrument};

/// Apply global git configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitConfigStep {
    spec: GitConfigSpec,
}

impl GitConfigStep {
    /// Construct new git configuration step from manifest spec.
    pub fn new(spec: GitConfigSpec) -> Self {
        Self { spec }
    }

    fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(name) = &self.spec.user_name {
            pairs.push(("user.name", name.as_str()));
        }
        if let Some(email) = &self.spec.user_email {
            pairs.push(("user.email", email.as_str()));
        }
        if let Some(branch) = &self.spec.default_branch {
            pairs.push(("init.defaultBranch", branch.as_str()));
        }

        pairs
    }

    /// Check if every configured value already matches.
    pub fn is_satisfied(&self, ctx: &StepContext<'_>) -> bool {
        let mut config = match Config::open(&ctx.home.join(".gitconfig")) {
            Ok(config) => config,
            Err(_) => return false,
        };

        self.pairs()
            .into_iter()
            .all(|(key, value)| current_value(&mut config, key).as_deref() == Some(value))
    }

    /// Apply the step: write values that differ from the current ones.
    ///
    /// # Errors
    ///
    /// - Return [`StepError::Git2`] if the configuration file cannot be
    ///   opened or written.
    ///
    /// [`StepError::Git2`]: crate::step::StepError::Git2
    #[instrument(skip(self, ctx), level = "debug")]
    pub fn apply(&self, ctx: &StepContext<'_>) -> Result<Outcome> {
        let mut config = Config::open(&ctx.home.join(".gitconfig"))?;
        let mut changed = false;

        for (key, value) in self.pairs() {
            if current_value(&mut config, key).as_deref() == Some(value) {
                debug!("git {key} already set");
                continue;
            }

            config.set_str(key, value)?;
            info!("git {key} = {value}");
            changed = true;
        }

        Ok(if changed {
            Outcome::Changed
        } else {
            Outcome::AlreadySatisfied
        })
    }
}

// Reads require a snapshot; live Config handles only support writes reliably.
fn current_value(config: &mut Config, key: &str) -> Option<String> {
    config.snapshot().ok()?.get_string(key).ok()
}
