// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Run-control file handling.
//!
//! Utilities to manage the export and source lines that rigup appends to the
//! user's shell run-control files.
//!
//! # Why Append-Only?
//!
//! Rc files are owned by the user, not by rigup. The user hand-edits them,
//! other tools append to them, and their ordering is load-bearing because
//! shells execute them top to bottom. So rigup never rewrites, reorders, or
//! deduplicates what is already there. The only mutation it performs is
//! appending a line at end-of-file when that exact line is not present yet.
//! Comparison is exact-string on whole lines, never pattern-based. Running
//! the same insertion twice therefore yields a byte-identical file, and the
//! file is only ever written when a line was actually appended.
//!
//! # Markers And Safety Headers
//!
//! Multi-line template blocks are guarded by a __marker__: a literal line
//! placed at the top of the block. The marker doubles as the idempotency
//! check, so a block is inserted at most once no matter how often it is
//! requested. Each rc file can also carry a __safety header__, a comment
//! block warning that the file is shell-family-specific. The header is
//! guarded by its own first line the same way.
//!
//! # Shell Families
//!
//! Rigup writes to two rc files: one for the POSIX family (`.bashrc`), and
//! one for the Z shell family (`.zshrc`). Manifest entries pick the families
//! they apply to; most export lines go to both.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, write, OpenOptions},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Shell families whose rc files rigup manages.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellFamily {
    /// Bourne-compatible shells sourcing `.bashrc`.
    #[default]
    Posix,

    /// Z shell sourcing `.zshrc`.
    Zsh,
}

impl ShellFamily {
    /// Every shell family rigup knows about, in rc-file order.
    pub const ALL: [ShellFamily; 2] = [ShellFamily::Posix, ShellFamily::Zsh];

    /// File name of the rc file for this family.
    pub fn rc_file_name(&self) -> &'static str {
        match self {
            Self::Posix => ".bashrc",
            Self::Zsh => ".zshrc",
        }
    }

    /// Absolute path of the rc file for this family under given home.
    pub fn rc_path(&self, home: impl AsRef<Path>) -> PathBuf {
        home.as_ref().join(self.rc_file_name())
    }

    /// Safety header comment block for this family's rc file.
    ///
    /// Warns readers that the file is shell-family-specific. The first line
    /// acts as the idempotency marker.
    pub fn safety_header(&self) -> (&'static str, &'static str) {
        match self {
            Self::Posix => (
                "# rigup: POSIX shell configuration.",
                "# Lines below are appended by rigup. This file is sourced by\n\
                 # bash and other Bourne-compatible shells only, so keep the\n\
                 # syntax POSIX. Zsh-specific configuration belongs in .zshrc.",
            ),
            Self::Zsh => (
                "# rigup: zsh configuration.",
                "# Lines below are appended by rigup. This file is sourced by\n\
                 # zsh only, so zsh-specific syntax is fine here. Configuration\n\
                 # meant for every shell belongs in .bashrc.",
            ),
        }
    }

    /// Guess the user's shell family from the `SHELL` environment variable.
    ///
    /// Defaults to [`ShellFamily::Posix`] when the variable is unset or names
    /// an unknown shell.
    pub fn detect() -> Self {
        match std::env::var("SHELL") {
            Ok(shell) if shell.ends_with("/zsh") || shell == "zsh" => Self::Zsh,
            _ => Self::Posix,
        }
    }
}

impl Display for ShellFamily {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Posix => write!(fmt, "posix"),
            Self::Zsh => write!(fmt, "zsh"),
        }
    }
}

/// Manage idempotent insertions into one rc file.
///
/// Provides methods to ensure single lines, marker-guarded blocks, and the
/// safety header are present, creating the file empty when missing.
#[derive(Clone, Debug)]
pub struct RcFile {
    path: PathBuf,
}

impl RcFile {
    /// Construct new rc file handle for target path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the rc file being managed.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Ensure exact line is present, appending at end-of-file otherwise.
    ///
    /// Returns true if and only if the line was actually appended.
    ///
    /// # Errors
    ///
    /// - Return [`RcError::CreateRcFile`] if rc file cannot be created when
    ///   missing.
    /// - Return [`RcError::ReadRcFile`] if rc file cannot be read.
    /// - Return [`RcError::WriteRcFile`] if rc file cannot be written back.
    #[instrument(skip(self, line), level = "debug")]
    pub fn ensure_line(&self, line: impl AsRef<str>) -> Result<bool> {
        self.edit(|edit| edit.append_line(line.as_ref()))
    }

    /// Ensure marker-guarded block is present, appending it otherwise.
    ///
    /// The marker line is written directly above the block, and its presence
    /// anywhere in the file counts as the block already being inserted.
    /// Returns true if and only if the block was actually appended.
    ///
    /// # Errors
    ///
    /// - Return [`RcError::CreateRcFile`] if rc file cannot be created when
    ///   missing.
    /// - Return [`RcError::ReadRcFile`] if rc file cannot be read.
    /// - Return [`RcError::WriteRcFile`] if rc file cannot be written back.
    #[instrument(skip(self, marker, block), level = "debug")]
    pub fn ensure_block(&self, marker: impl AsRef<str>, block: impl AsRef<str>) -> Result<bool> {
        self.edit(|edit| edit.append_block(marker.as_ref(), block.as_ref()))
    }

    /// Ensure safety header for given shell family is present.
    ///
    /// # Errors
    ///
    /// - Return [`RcError::CreateRcFile`] if rc file cannot be created when
    ///   missing.
    /// - Return [`RcError::ReadRcFile`] if rc file cannot be read.
    /// - Return [`RcError::WriteRcFile`] if rc file cannot be written back.
    pub fn ensure_safety_header(&self, family: ShellFamily) -> Result<bool> {
        let (marker, body) = family.safety_header();
        self.ensure_block(marker, body)
    }

    /// Edit rc file contents.
    ///
    /// Read current contents into an [`RcEdit`] instance, apply the editor,
    /// and write the result back if and only if something changed. The file
    /// is created empty when missing, so an edit that appends nothing leaves
    /// an empty file behind and an untouched mtime on an existing one.
    fn edit<E>(&self, editor: E) -> Result<bool>
    where
        E: FnOnce(&mut RcEdit),
    {
        // INVARIANT: Create rc file if needed.
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|err| RcError::CreateRcFile {
                source: err,
                path: self.path.clone(),
            })?;

        let content = read_to_string(&self.path).map_err(|err| RcError::ReadRcFile {
            source: err,
            path: self.path.clone(),
        })?;

        let mut edit = RcEdit::from(content.as_str());
        editor(&mut edit);

        if !edit.changed {
            debug!("no change needed for {:?}", self.path.display());
            return Ok(false);
        }

        write(&self.path, edit.to_string().as_bytes()).map_err(|err| RcError::WriteRcFile {
            source: err,
            path: self.path.clone(),
        })?;

        Ok(true)
    }
}

/// Append-only rc line editor.
///
/// # Invariant
///
/// - Existing lines keep their content and relative order.
/// - A line is appended at most once per file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RcEdit {
    lines: Vec<String>,
    changed: bool,
}

impl RcEdit {
    /// Construct new empty rc line editor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if exact line is already present.
    pub fn contains_line(&self, line: impl AsRef<str>) -> bool {
        self.lines.iter().any(|known| known == line.as_ref())
    }

    /// Append line at end-of-file unless the exact line is already present.
    pub fn append_line(&mut self, line: impl Into<String>) {
        let line = line.into();
        if !self.contains_line(&line) {
            self.lines.push(line);
            self.changed = true;
        }
    }

    /// Append marker line plus block unless the marker is already present.
    pub fn append_block(&mut self, marker: impl Into<String>, block: impl AsRef<str>) {
        let marker = marker.into();
        if self.contains_line(&marker) {
            return;
        }

        self.lines.push(marker);
        self.lines
            .extend(block.as_ref().lines().map(str::to_owned));
        self.changed = true;
    }
}

impl Display for RcEdit {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.lines.is_empty() {
            return write!(fmt, "");
        }

        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }

        write!(fmt, "{out}")
    }
}

impl From<&str> for RcEdit {
    fn from(content: &str) -> Self {
        let lines = content.lines().map(str::to_owned).collect::<Vec<_>>();

        Self {
            lines,
            changed: false,
        }
    }
}

impl From<String> for RcEdit {
    fn from(content: String) -> Self {
        Self::from(content.as_str())
    }
}

/// Rc file management error types.
#[derive(Debug, thiserror::Error)]
pub enum RcError {
    /// Rc file cannot be created when missing.
    #[error("failed to create rc file at {:?}", path.display())]
    CreateRcFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Rc file cannot be read from.
    #[error("failed to read from rc file at {:?}", path.display())]
    ReadRcFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Rc file cannot be written to.
    #[error("failed to write to rc file at {:?}", path.display())]
    WriteRcFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = RcError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;

    #[sealed_test]
    fn ensure_line_creates_missing_file() -> anyhow::Result<()> {
        let rc = RcFile::new("testrc");

        let appended = rc.ensure_line("export PATH=\"$HOME/.cargo/bin:$PATH\"")?;

        assert!(appended);
        let result = read_to_string("testrc")?;
        assert_eq!(result, "export PATH=\"$HOME/.cargo/bin:$PATH\"\n");
        Ok(())
    }

    #[sealed_test]
    fn ensure_line_twice_equals_once() -> anyhow::Result<()> {
        let rc = RcFile::new("testrc");
        let line = "export PATH=\"$HOME/.bun/bin:$PATH\"";

        assert!(rc.ensure_line(line)?);
        assert!(!rc.ensure_line(line)?);

        let result = read_to_string("testrc")?;
        let occurrences = result.lines().filter(|known| *known == line).count();
        assert_eq!(occurrences, 1);
        assert_eq!(result, format!("{line}\n"));
        Ok(())
    }

    #[sealed_test]
    fn ensure_line_preserves_existing_content() -> anyhow::Result<()> {
        let existing = indoc! {r#"
            # hand-written prelude
            alias ll='ls -la'
            export EDITOR=vim
        "#};
        write("testrc", existing)?;
        let rc = RcFile::new("testrc");

        rc.ensure_line("source \"$HOME/.cargo/env\"")?;

        let result = read_to_string("testrc")?;
        let expect = indoc! {r#"
            # hand-written prelude
            alias ll='ls -la'
            export EDITOR=vim
            source "$HOME/.cargo/env"
        "#};
        assert_eq!(result, expect);
        Ok(())
    }

    #[sealed_test]
    fn ensure_line_skips_present_line_without_rewrite() -> anyhow::Result<()> {
        let existing = indoc! {r#"
            export EDITOR=vim
            source "$HOME/.cargo/env"
        "#};
        write("testrc", existing)?;
        let rc = RcFile::new("testrc");

        let appended = rc.ensure_line("source \"$HOME/.cargo/env\"")?;

        assert!(!appended);
        let result = read_to_string("testrc")?;
        assert_eq!(result, existing);
        Ok(())
    }

    #[sealed_test]
    fn ensure_block_guarded_by_marker() -> anyhow::Result<()> {
        let rc = RcFile::new("testrc");
        let marker = "# >>> rigup nvm >>>";
        let block = indoc! {r#"
            export NVM_DIR="$HOME/.nvm"
            [ -s "$NVM_DIR/nvm.sh" ] && . "$NVM_DIR/nvm.sh"
        "#};

        assert!(rc.ensure_block(marker, block)?);
        assert!(!rc.ensure_block(marker, block)?);

        let result = read_to_string("testrc")?;
        let expect = indoc! {r#"
            # >>> rigup nvm >>>
            export NVM_DIR="$HOME/.nvm"
            [ -s "$NVM_DIR/nvm.sh" ] && . "$NVM_DIR/nvm.sh"
        "#};
        assert_eq!(result, expect);
        Ok(())
    }

    #[sealed_test]
    fn safety_header_applied_at_most_once() -> anyhow::Result<()> {
        let rc = RcFile::new("testrc");

        assert!(rc.ensure_safety_header(ShellFamily::Zsh)?);
        assert!(!rc.ensure_safety_header(ShellFamily::Zsh)?);

        let (marker, _) = ShellFamily::Zsh.safety_header();
        let result = read_to_string("testrc")?;
        let occurrences = result.lines().filter(|known| *known == marker).count();
        assert_eq!(occurrences, 1);
        Ok(())
    }

    #[sealed_test]
    fn header_then_line_then_repeat_is_stable() -> anyhow::Result<()> {
        let rc = RcFile::new("testrc");
        let line = "export BUN_INSTALL=\"$HOME/.bun\"";

        rc.ensure_safety_header(ShellFamily::Posix)?;
        rc.ensure_line(line)?;
        let first = read_to_string("testrc")?;

        rc.ensure_safety_header(ShellFamily::Posix)?;
        rc.ensure_line(line)?;
        let second = read_to_string("testrc")?;

        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn rc_edit_preserves_order() {
        let content = indoc! {r#"
            zeta
            alpha
            mid
        "#};
        let mut edit = RcEdit::from(content);

        edit.append_line("omega");
        edit.append_line("alpha");

        let result = edit.to_string();
        let expect = indoc! {r#"
            zeta
            alpha
            mid
            omega
        "#};
        assert_eq!(result, expect);
    }

    #[test]
    fn rc_edit_tracks_changes() {
        let mut edit = RcEdit::from("alpha\n");

        edit.append_line("alpha");
        assert!(!edit.changed);

        edit.append_line("beta");
        assert!(edit.changed);
    }

    #[test_case(ShellFamily::Posix, ".bashrc"; "posix family")]
    #[test_case(ShellFamily::Zsh, ".zshrc"; "zsh family")]
    #[test]
    fn rc_file_name_per_family(family: ShellFamily, expect: &str) {
        assert_eq!(family.rc_file_name(), expect);
    }

    #[sealed_test]
    fn detect_family_from_shell_variable() {
        std::env::set_var("SHELL", "/usr/bin/zsh");
        assert_eq!(ShellFamily::detect(), ShellFamily::Zsh);

        std::env::set_var("SHELL", "/bin/bash");
        assert_eq!(ShellFamily::detect(), ShellFamily::Posix);

        std::env::remove_var("SHELL");
        assert_eq!(ShellFamily::detect(), ShellFamily::Posix);
    }
}
