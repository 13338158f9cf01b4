// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile deployment step.
//!
//! Deploys everything the manifest declares about dotfiles in one step:
//! symlinks out of the dotfile directory, and the rc lines that belong to
//! no particular tool.

use crate::{
    links,
    manifest::{LinkSpec, RcLineSpec},
    step::{Outcome, Result, StepContext},
};

use tracing::instrument;

/// Deploy dotfile symlinks and global rc lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotfilesStep {
    links: Vec<LinkSpec>,
    lines: Vec<RcLineSpec>,
}

impl DotfilesStep {
    /// Construct new dotfiles step from manifest specs.
    pub fn new(links: Vec<LinkSpec>, lines: Vec<RcLineSpec>) -> Self {
        Self { links, lines }
    }

    /// Check if every link and rc line is already in place.
    pub fn is_satisfied(&self, ctx: &StepContext<'_>) -> bool {
        let links_ok = self.links.iter().all(|spec| {
            links::resolve_links(&ctx.dotfile_dir, spec)
                .map(|pairs| {
                    pairs
                        .iter()
                        .all(|(source, target)| links::link_satisfied(source, target))
                })
                .unwrap_or(false)
        });

        links_ok && self.lines.iter().all(|line| ctx.rc_line_present(line))
    }

    /// Apply the step: deploy every link, then ensure every rc line.
    ///
    /// # Errors
    ///
    /// - Return [`StepError::Link`] if symlink deployment fails.
    /// - Return [`StepError::Rc`] if rc lines cannot be ensured.
    ///
    /// [`StepError::Link`]: crate::step::StepError::Link
    /// [`StepError::Rc`]: crate::step::StepError::Rc
    #[instrument(skip(self, ctx), level = "debug")]
    pub fn apply(&self, ctx: &StepContext<'_>) -> Result<Outcome> {
        let mut changed = false;

        for spec in &self.links {
            for (source, target) in links::resolve_links(&ctx.dotfile_dir, spec)? {
                changed |= links::deploy_link(source, target)?;
            }
        }

        for line in &self.lines {
            changed |= ctx.ensure_rc_line(line)?;
        }

        Ok(if changed {
            Outcome::Changed
        } else {
            Outcome::AlreadySatisfied
        })
    }
}
