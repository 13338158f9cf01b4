// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Interactive pickers.
//!
//! Small quality-of-life menus for the bootstrapped machine: pick a
//! package.json script, a Taskfile task, or a tmux session from an arrow-key
//! list and run it. Parsing is kept separate from the prompting so it can be
//! exercised without a terminal.

use crate::proc::{self, ProcError};

use inquire::Select;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::Path,
};
use tracing::{info, instrument};

/// One runnable entry offered by a menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    /// Name shown and dispatched on.
    pub name: String,

    /// Free-form detail column, e.g. the script text or session status.
    pub detail: String,
}

impl MenuEntry {
    fn new(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: detail.into(),
        }
    }
}

impl Display for MenuEntry {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.detail.is_empty() {
            return write!(fmt, "{}", self.name);
        }

        write!(fmt, "{:<24}  {}", self.name, self.detail)
    }
}

/// Parse the `scripts` table out of package.json contents.
///
/// Entries come back sorted by name.
///
/// # Errors
///
/// - Return [`MenuError::Json`] if the contents are not valid JSON.
/// - Return [`MenuError::NoScripts`] if no scripts table is present, or it
///   is empty.
pub fn parse_package_scripts(contents: &str) -> Result<Vec<MenuEntry>> {
    let json: serde_json::Value = serde_json::from_str(contents)?;
    let scripts = json
        .get("scripts")
        .and_then(serde_json::Value::as_object)
        .ok_or(MenuError::NoScripts)?;

    let mut entries = scripts
        .iter()
        .filter_map(|(name, command)| {
            command
                .as_str()
                .map(|command| MenuEntry::new(name, command))
        })
        .collect::<Vec<_>>();

    if entries.is_empty() {
        return Err(MenuError::NoScripts);
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Parse `task --list-all` output into task entries.
///
/// Task lines look like `* name: description`, with the description column
/// padded out by whitespace. Lines that do not start with `* ` are headers
/// or noise and get skipped.
pub fn parse_task_list(output: &str) -> Vec<MenuEntry> {
    let mut entries = Vec::new();
    for line in output.lines() {
        let Some(line) = line.trim().strip_prefix("* ") else {
            continue;
        };

        match line.split_once(':') {
            Some((name, detail)) => entries.push(MenuEntry::new(name.trim(), detail.trim())),
            None => entries.push(MenuEntry::new(line.trim(), "")),
        }
    }

    entries
}

/// Parse `tmux ls` output into session entries.
///
/// Session lines look like `name: 2 windows (created ...)`.
pub fn parse_tmux_sessions(output: &str) -> Vec<MenuEntry> {
    let mut entries = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(':') {
            Some((name, detail)) => entries.push(MenuEntry::new(name.trim(), detail.trim())),
            None => entries.push(MenuEntry::new(line, "")),
        }
    }

    entries
}

/// Pick a package.json script and run it.
///
/// Prefers bun as the script runner when present, falling back to npm.
///
/// # Errors
///
/// - Return [`MenuError::NoPackageJson`] if the current directory has no
///   package.json.
/// - Return [`MenuError::Prompt`] if the selection prompt fails.
/// - Return [`MenuError::Proc`] if the chosen script fails.
#[instrument(level = "debug")]
pub fn scripts_menu() -> Result<()> {
    let path = Path::new("package.json");
    if !path.exists() {
        return Err(MenuError::NoPackageJson);
    }

    let contents = read_to_string(path).map_err(|_| MenuError::NoPackageJson)?;
    let entries = parse_package_scripts(&contents)?;
    let choice = Select::new("script", entries).prompt()?;

    let runner = if proc::command_on_path("bun") { "bun" } else { "npm" };
    info!("{runner} run {}", choice.name);
    proc::run_interactive(runner, ["run", choice.name.as_str()])?;

    Ok(())
}

/// Pick a Taskfile task and run it.
///
/// # Errors
///
/// - Return [`MenuError::NothingToPick`] if task lists nothing.
/// - Return [`MenuError::Prompt`] if the selection prompt fails.
/// - Return [`MenuError::Proc`] if task itself is missing or the chosen
///   task fails.
#[instrument(level = "debug")]
pub fn tasks_menu() -> Result<()> {
    let output = proc::run_captured("task", ["--list-all"])?;
    let entries = parse_task_list(&output);
    if entries.is_empty() {
        return Err(MenuError::NothingToPick {
            what: "tasks".into(),
        });
    }

    let choice = Select::new("task", entries).prompt()?;
    info!("task {}", choice.name);
    proc::run_interactive("task", [choice.name.as_str()])?;

    Ok(())
}

/// Pick a tmux session and attach to it.
///
/// # Errors
///
/// - Return [`MenuError::NothingToPick`] if no tmux server is running, or
///   it has no sessions.
/// - Return [`MenuError::Prompt`] if the selection prompt fails.
/// - Return [`MenuError::Proc`] if attaching fails.
#[instrument(level = "debug")]
pub fn tmux_menu() -> Result<()> {
    let output = match proc::run_captured("tmux", ["ls"]) {
        Ok(output) => output,
        Err(ProcError::Unsuccessful { message, .. })
            if message.to_lowercase().contains("no server running") =>
        {
            return Err(MenuError::NothingToPick {
                what: "tmux sessions".into(),
            });
        }
        Err(error) => return Err(error.into()),
    };

    let entries = parse_tmux_sessions(&output);
    if entries.is_empty() {
        return Err(MenuError::NothingToPick {
            what: "tmux sessions".into(),
        });
    }

    let choice = Select::new("session", entries).prompt()?;
    info!("tmux attach -t {}", choice.name);
    proc::run_interactive("tmux", ["attach", "-t", choice.name.as_str()])?;

    Ok(())
}

/// Menu error types.
#[derive(Debug, thiserror::Error)]
pub enum MenuError {
    /// No package.json in the current directory.
    #[error("no package.json in the current directory")]
    NoPackageJson,

    /// package.json has no usable scripts table.
    #[error("package.json declares no scripts")]
    NoScripts,

    /// The menu source produced nothing to choose from.
    #[error("no {what} to pick from")]
    NothingToPick { what: String },

    /// package.json cannot be parsed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Selection prompt failed.
    #[error(transparent)]
    Prompt(#[from] inquire::InquireError),

    /// Chosen entry failed to run.
    #[error(transparent)]
    Proc(#[from] ProcError),
}

/// Friendly result alias :3
pub type Result<T, E = MenuError> = std::result::Result<T, E>;
