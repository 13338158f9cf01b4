// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository cloning step.
//!
//! Clones every repository the manifest lists. Destinations that already
//! hold a repository are skipped, so the step settles after its first
//! successful run.

use crate::{
    manifest::RepoSpec,
    repo,
    step::{Outcome, Result},
};

use tracing::instrument;

/// Clone repositories listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReposStep {
    repos: Vec<RepoSpec>,
}

impl ReposStep {
    /// Construct new repository step from manifest specs.
    pub fn new(repos: Vec<RepoSpec>) -> Self {
        Self { repos }
    }

    /// Check if every destination already holds a repository.
    pub fn is_satisfied(&self) -> bool {
        self.repos
            .iter()
            .all(|spec| spec.path.join(".git").exists())
    }

    /// Apply the step: clone whatever is missing.
    ///
    /// # Errors
    ///
    /// - Return [`StepError::Repo`] if any clone fails.
    ///
    /// [`StepError::Repo`]: crate::step::StepError::Repo
    #[instrument(skip(self), level = "debug")]
    pub fn apply(&self) -> Result<Outcome> {
        let mut changed = false;

        for spec in &self.repos {
            changed |= repo::clone_repo(&spec.url, &spec.path)?;
        }

        Ok(if changed {
            Outcome::Changed
        } else {
            Outcome::AlreadySatisfied
        })
    }
}
