// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bootstrap step engine.
//!
//! A __step__ is one unit of bootstrap work: install a tool, apply git
//! configuration, deploy dotfile symlinks, clone repositories, or decrypt
//! the secrets file. Steps are built from the manifest into a __plan__, and
//! the plan applies them strictly in order, one at a time, blocking on each.
//!
//! # Idempotency
//!
//! Every step is built from check-then-apply primitives, so applying a plan
//! twice leaves the machine in the same state as applying it once. A step
//! whose checks already pass reports [`Outcome::AlreadySatisfied`] and
//! short-circuits without invoking any installer.
//!
//! # Failure Policy
//!
//! Required steps abort the whole run on failure. Optional steps log a
//! warning and let the run continue, which is the right call for the long
//! tail of nice-to-have tools that break their installers every other month.

pub mod dotfiles;
pub mod git;
pub mod repos;
pub mod secrets;
pub mod tool;

use crate::{
    fetch::{FetchError, Fetcher, RetryPolicy},
    links::LinkError,
    manifest::{Manifest, RcLineSpec},
    path::NoWayHome,
    rc::{RcError, RcFile},
    repo::RepoError,
    secrets::SecretsError,
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::PathBuf,
};
use tracing::{info, warn};

/// What applying a step did to the machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Something was installed, appended, linked, cloned, or decrypted.
    Changed,

    /// Every check already passed, nothing was touched.
    AlreadySatisfied,
}

/// How step failure affects the rest of the run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Severity {
    /// Failure aborts the whole bootstrap run.
    #[default]
    Required,

    /// Failure logs a warning, and the run continues.
    Optional,
}

impl Display for Severity {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Required => write!(fmt, "required"),
            Self::Optional => write!(fmt, "optional"),
        }
    }
}

/// Shared state steps need while applying.
pub struct StepContext<'a> {
    /// User's home directory, where rc files and link targets live.
    pub home: PathBuf,

    /// Directory holding repo-tracked dotfiles.
    pub dotfile_dir: PathBuf,

    /// Prepend safety headers to managed rc files.
    pub safety_header: bool,

    /// Retry policy for installer downloads.
    pub retry: RetryPolicy,

    /// Transfer tool for installer downloads.
    pub fetcher: &'a dyn Fetcher,
}

impl<'a> StepContext<'a> {
    /// Construct new step context from manifest settings.
    ///
    /// # Errors
    ///
    /// - Return [`NoWayHome`] if home directory path cannot be determined.
    pub fn new(manifest: &Manifest, fetcher: &'a dyn Fetcher) -> Result<Self, NoWayHome> {
        Ok(Self {
            home: crate::path::home_dir()?,
            dotfile_dir: manifest.settings.dotfile_dir.clone(),
            safety_header: manifest.settings.safety_header,
            retry: manifest.settings.retry,
            fetcher,
        })
    }

    /// Ensure one rc line spec across every shell family it names.
    ///
    /// Returns true if and only if any file actually changed.
    ///
    /// # Errors
    ///
    /// - Return [`RcError`] if any rc file cannot be created, read, or
    ///   written.
    pub fn ensure_rc_line(&self, spec: &RcLineSpec) -> Result<bool, RcError> {
        let mut changed = false;
        for family in &spec.shells {
            let rc = RcFile::new(family.rc_path(&self.home));
            if self.safety_header {
                changed |= rc.ensure_safety_header(*family)?;
            }
            changed |= rc.ensure_line(&spec.text)?;
        }

        Ok(changed)
    }

    /// Check if one rc line spec is present across every family it names.
    pub fn rc_line_present(&self, spec: &RcLineSpec) -> bool {
        spec.shells.iter().all(|family| {
            read_to_string(family.rc_path(&self.home))
                .map(|content| content.lines().any(|line| line == spec.text))
                .unwrap_or(false)
        })
    }
}

/// One unit of bootstrap work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Install one tool and wire its rc lines.
    Tool(tool::ToolStep),

    /// Apply global git configuration values.
    GitConfig(git::GitConfigStep),

    /// Deploy dotfile symlinks and global rc lines.
    Dotfiles(dotfiles::DotfilesStep),

    /// Clone repositories.
    Repos(repos::ReposStep),

    /// Decrypt the secrets file.
    Secrets(secrets::SecretsStep),
}

impl Step {
    /// Stable name used for dispatch and logging.
    pub fn name(&self) -> &str {
        match self {
            Self::Tool(step) => step.name(),
            Self::GitConfig(_) => "git",
            Self::Dotfiles(_) => "dotfiles",
            Self::Repos(_) => "repositories",
            Self::Secrets(_) => "secrets",
        }
    }

    /// How failure of this step affects the rest of the run.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Tool(step) => step.severity(),
            _ => Severity::Required,
        }
    }

    /// Check if every condition the step enforces already holds.
    pub fn is_satisfied(&self, ctx: &StepContext<'_>) -> bool {
        match self {
            Self::Tool(step) => step.is_satisfied(ctx),
            Self::GitConfig(step) => step.is_satisfied(ctx),
            Self::Dotfiles(step) => step.is_satisfied(ctx),
            Self::Repos(step) => step.is_satisfied(),
            Self::Secrets(step) => step.is_satisfied(),
        }
    }

    /// Apply the step to the machine.
    ///
    /// # Errors
    ///
    /// - Return [`StepError`] if any primitive the step drives fails.
    pub async fn apply(&self, ctx: &StepContext<'_>) -> Result<Outcome> {
        match self {
            Self::Tool(step) => step.apply(ctx).await,
            Self::GitConfig(step) => step.apply(ctx),
            Self::Dotfiles(step) => step.apply(ctx),
            Self::Repos(step) => step.apply(),
            Self::Secrets(step) => step.apply(),
        }
    }
}

/// Ordered listing of steps built from one manifest.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    /// Construct new plan from manifest.
    ///
    /// Step order is fixed: tools in manifest order, then git
    /// configuration, dotfiles, repositories, and secrets last. Sections
    /// the manifest leaves empty produce no step at all.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut steps = Vec::new();

        for spec in &manifest.tools {
            steps.push(Step::Tool(tool::ToolStep::new(spec.clone())));
        }

        if let Some(spec) = &manifest.git {
            steps.push(Step::GitConfig(git::GitConfigStep::new(spec.clone())));
        }

        if !manifest.links.is_empty() || !manifest.lines.is_empty() {
            steps.push(Step::Dotfiles(dotfiles::DotfilesStep::new(
                manifest.links.clone(),
                manifest.lines.clone(),
            )));
        }

        if !manifest.repos.is_empty() {
            steps.push(Step::Repos(repos::ReposStep::new(manifest.repos.clone())));
        }

        if let Some(spec) = &manifest.secrets {
            steps.push(Step::Secrets(secrets::SecretsStep::new(spec.clone())));
        }

        Self { steps }
    }

    /// Steps in application order.
    pub fn steps(&self) -> &[Step] {
        self.steps.as_slice()
    }

    /// Find step by name.
    pub fn find(&self, name: impl AsRef<str>) -> Option<&Step> {
        self.steps.iter().find(|step| step.name() == name.as_ref())
    }

    /// Apply every step in order.
    ///
    /// Required step failure aborts immediately. Optional step failure logs
    /// a warning and the run continues.
    ///
    /// # Errors
    ///
    /// - Return [`StepError`] of the first required step that fails.
    pub async fn apply_all(&self, ctx: &StepContext<'_>) -> Result<()> {
        for step in &self.steps {
            info!("step {}", step.name());
            match step.apply(ctx).await {
                Ok(Outcome::Changed) => info!("step {} applied", step.name()),
                Ok(Outcome::AlreadySatisfied) => {
                    info!("step {} already satisfied", step.name())
                }
                Err(error) if step.severity() == Severity::Optional => {
                    warn!("skipping optional step {}: {error}", step.name());
                }
                Err(error) => return Err(error),
            }
        }

        Ok(())
    }

    /// Apply one step selected by name.
    ///
    /// # Errors
    ///
    /// - Return [`StepError::UnknownStep`] if no step carries the name.
    /// - Return [`StepError`] if the step itself fails.
    pub async fn apply_one(
        &self,
        ctx: &StepContext<'_>,
        name: impl AsRef<str>,
    ) -> Result<Outcome> {
        let step = self
            .find(name.as_ref())
            .ok_or_else(|| StepError::UnknownStep {
                name: name.as_ref().to_string(),
            })?;

        step.apply(ctx).await
    }
}

/// Step engine error types.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Dispatch-by-name found no matching step.
    #[error("no step named {name:?} in the manifest")]
    UnknownStep { name: String },

    /// Tool declares an installer command with no argv entries.
    #[error("tool {name:?} declares an empty installer command")]
    EmptyInstaller { name: String },

    /// Rc file mutation fails.
    #[error(transparent)]
    Rc(#[from] RcError),

    /// Symlink deployment fails.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Installer download fails.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Repository cloning fails.
    #[error(transparent)]
    Repo(#[from] RepoError),

    /// Secrets decryption fails.
    #[error(transparent)]
    Secrets(#[from] SecretsError),

    /// External process invocation fails.
    #[error(transparent)]
    Proc(#[from] crate::proc::ProcError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Home directory path cannot be determined.
    #[error(transparent)]
    Path(#[from] NoWayHome),
}

/// Friendly result alias :3
pub type Result<T, E = StepError> = std::result::Result<T, E>;
