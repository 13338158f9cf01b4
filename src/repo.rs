// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository cloning.
//!
//! Clone the repositories a developer machine needs, e.g., the dotfile
//! repository itself, through libgit2. Clone progress is displayed through a
//! progress bar, and authentication goes through auth-git2: `GITHUB_TOKEN`
//! is used as a plaintext credential for github.com when set, and anything
//! else falls back to prompting the user.
//!
//! A destination that already contains a repository is left alone. Cloning
//! is the one network-heavy operation rigup performs besides installer
//! downloads, and skipping it keeps repeated bootstrap runs cheap.

use auth_git2::{GitAuthenticator, Prompter};
use git2::{build::RepoBuilder, Config, FetchOptions, RemoteCallbacks};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{env, path::Path, time};
use tracing::{debug, info, instrument};

/// Clone repository from URL into destination path.
///
/// Short-circuits when the destination already holds a repository. The
/// progress of the clone is displayed through a progress bar. If any
/// credentials are required for the clone to continue, then the user will be
/// prompted for that information accordingly, with the progress bar blocked
/// for user input.
///
/// Returns true if and only if a clone actually happened.
///
/// # Errors
///
/// - Return [`RepoError::Git2`] if libgit2 operations fail.
/// - Return [`RepoError::BarStyle`] if the progress bar template is invalid.
/// - Return [`RepoError::CreateParent`] if the destination parent cannot be
///   created.
#[instrument(skip(url, dest), level = "debug")]
pub fn clone_repo(url: impl AsRef<str>, dest: impl AsRef<Path>) -> Result<bool> {
    let url = url.as_ref();
    let dest = dest.as_ref();

    if dest.join(".git").exists() {
        info!("{:?} already cloned", dest.display());
        return Ok(false);
    }

    if let Some(parent) = dest.parent() {
        mkdirp::mkdirp(parent).map_err(|err| RepoError::CreateParent {
            source: err,
            path: parent.to_path_buf(),
        })?;
    }

    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
    )?
    .progress_chars("-Cco.");
    bar.set_style(style);
    bar.set_message(url.to_string());
    bar.enable_steady_tick(time::Duration::from_millis(100));

    let prompter = BarPrompter::new(bar);
    let mut authenticator = GitAuthenticator::default().set_prompter(prompter.clone());
    if let Ok(token) = env::var("GITHUB_TOKEN") {
        debug!("using GITHUB_TOKEN credential for github.com");
        authenticator = authenticator.add_plaintext_credentials("github.com", "x-access-token", token);
    }
    let config = Config::open_default()?;

    let mut throttle = time::Instant::now();
    let mut rc = RemoteCallbacks::new();
    rc.credentials(authenticator.credentials(&config));
    rc.transfer_progress(|progress| {
        let stats = progress.to_owned();
        let bar_size = stats.total_objects() as u64;
        let bar_pos = stats.received_objects() as u64;
        if throttle.elapsed() > time::Duration::from_millis(10) {
            throttle = time::Instant::now();
            prompter.bar.set_length(bar_size);
            prompter.bar.set_position(bar_pos);
        }
        true
    });

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(rc);
    RepoBuilder::new().fetch_options(fo).clone(url, dest)?;
    prompter.bar.finish_and_clear();

    info!("cloned {url} into {:?}", dest.display());
    Ok(true)
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
struct BarPrompter {
    pub(crate) bar: ProgressBar,
}

impl BarPrompter {
    /// Construct new progress bar prompter.
    fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for BarPrompter {
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

/// Repository cloning error types.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    BarStyle(#[from] indicatif::style::TemplateError),

    /// Destination parent directory cannot be created.
    #[error("failed to create parent directory {:?}", path.display())]
    CreateParent {
        #[source]
        source: std::io::Error,
        path: std::path::PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = RepoError> = std::result::Result<T, E>;
