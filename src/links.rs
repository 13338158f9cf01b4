// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile symlink deployment.
//!
//! Deploy repo-tracked dotfiles by symlinking them over home-directory
//! paths. Whatever sits at the target gets replaced: stale regular files,
//! symlinks into old checkouts, and dangling symlinks all go. The one thing
//! rigup refuses to replace is a real directory, because silently removing a
//! directory tree is how bootstrap scripts earn their reputation.
//!
//! Sources are glob patterns relative to the dotfile directory. A pattern
//! that matches exactly one file links it straight to the target path. A
//! pattern that matches several treats the target as a directory and links
//! each match under it by file name.

use crate::manifest::LinkSpec;

use std::{
    fs,
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Resolve link spec into concrete (source, target) pairs.
///
/// # Errors
///
/// - Return [`LinkError::Pattern`] if the source glob fails to parse.
/// - Return [`LinkError::Walk`] if a matched path cannot be read.
/// - Return [`LinkError::NoMatches`] if the source glob matches nothing.
pub fn resolve_links(
    dotfile_dir: impl AsRef<Path>,
    spec: &LinkSpec,
) -> Result<Vec<(PathBuf, PathBuf)>> {
    let pattern = dotfile_dir
        .as_ref()
        .join(&spec.source)
        .to_string_lossy()
        .into_owned();

    let mut sources = Vec::new();
    for entry in glob::glob(&pattern)? {
        sources.push(entry?);
    }

    if sources.is_empty() {
        return Err(LinkError::NoMatches {
            pattern: spec.source.clone(),
        });
    }

    if let [source] = sources.as_slice() {
        return Ok(vec![(source.clone(), spec.target.clone())]);
    }

    // INVARIANT: Multiple matches land under the target by file name.
    let pairs = sources
        .into_iter()
        .filter_map(|source| {
            let name = source.file_name()?.to_os_string();
            Some((source, spec.target.join(name)))
        })
        .collect();

    Ok(pairs)
}

/// Symlink source over target, replacing whatever was there.
///
/// Creates target parent directories as needed. Returns true if and only if
/// the filesystem changed, so re-running on an already-correct link is a
/// no-op.
///
/// # Errors
///
/// - Return [`LinkError::TargetIsDirectory`] if the target is a real
///   directory.
/// - Return [`LinkError::CreateParent`] if parent directories cannot be
///   created.
/// - Return [`LinkError::Replace`] if the old target cannot be removed.
/// - Return [`LinkError::Symlink`] if the symlink cannot be created.
#[instrument(skip(source, target), level = "debug")]
pub fn deploy_link(source: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<bool> {
    let source = source.as_ref();
    let target = target.as_ref();

    if let Ok(existing) = fs::read_link(target) {
        if existing == source {
            debug!("{:?} already links to {:?}", target.display(), source.display());
            return Ok(false);
        }
    }

    // symlink_metadata also catches dangling symlinks.
    if let Ok(metadata) = fs::symlink_metadata(target) {
        if metadata.is_dir() {
            return Err(LinkError::TargetIsDirectory {
                path: target.to_path_buf(),
            });
        }

        fs::remove_file(target).map_err(|err| LinkError::Replace {
            source: err,
            path: target.to_path_buf(),
        })?;
    }

    if let Some(parent) = target.parent() {
        mkdirp::mkdirp(parent).map_err(|err| LinkError::CreateParent {
            source: err,
            path: parent.to_path_buf(),
        })?;
    }

    symlink(source, target).map_err(|err| LinkError::Symlink {
        source: err,
        path: target.to_path_buf(),
    })?;

    info!("linked {:?} -> {:?}", target.display(), source.display());
    Ok(true)
}

/// Check if target already links to source.
pub fn link_satisfied(source: impl AsRef<Path>, target: impl AsRef<Path>) -> bool {
    fs::read_link(target.as_ref())
        .map(|existing| existing == source.as_ref())
        .unwrap_or(false)
}

/// Symlink deployment error types.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Source glob pattern cannot be parsed.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Matched path cannot be read.
    #[error(transparent)]
    Walk(#[from] glob::GlobError),

    /// Source glob matched nothing in the dotfile directory.
    #[error("link source pattern {pattern:?} matched no files")]
    NoMatches { pattern: String },

    /// Target is a real directory, which rigup refuses to replace.
    #[error("refusing to replace directory at {:?} with a symlink", path.display())]
    TargetIsDirectory { path: PathBuf },

    /// Parent directories for target cannot be created.
    #[error("failed to create parent directory {:?}", path.display())]
    CreateParent {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Old target cannot be removed.
    #[error("failed to replace {:?}", path.display())]
    Replace {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Symlink cannot be created.
    #[error("failed to symlink {:?}", path.display())]
    Symlink {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, read_to_string, write};

    #[sealed_test]
    fn deploy_link_creates_fresh_symlink() -> anyhow::Result<()> {
        // Dotfile directories are always absolute after manifest expansion.
        let cwd = std::env::current_dir()?;
        create_dir_all("dotfiles/shell")?;
        write("dotfiles/shell/aliases", "alias ll='ls -la'\n")?;

        let changed = deploy_link(cwd.join("dotfiles/shell/aliases"), "home/.aliases")?;

        assert!(changed);
        assert_eq!(read_to_string("home/.aliases")?, "alias ll='ls -la'\n");
        Ok(())
    }

    #[sealed_test]
    fn deploy_link_twice_is_noop() -> anyhow::Result<()> {
        create_dir_all("dotfiles")?;
        write("dotfiles/aliases", "blah\n")?;

        assert!(deploy_link("dotfiles/aliases", "home/.aliases")?);
        assert!(!deploy_link("dotfiles/aliases", "home/.aliases")?);
        Ok(())
    }

    #[sealed_test]
    fn deploy_link_replaces_regular_file() -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        create_dir_all("dotfiles")?;
        create_dir_all("home")?;
        write("dotfiles/aliases", "new\n")?;
        write("home/.aliases", "old hand-written aliases\n")?;

        let changed = deploy_link(cwd.join("dotfiles/aliases"), "home/.aliases")?;

        assert!(changed);
        assert_eq!(read_to_string("home/.aliases")?, "new\n");
        Ok(())
    }

    #[sealed_test]
    fn deploy_link_replaces_dangling_symlink() -> anyhow::Result<()> {
        create_dir_all("dotfiles")?;
        create_dir_all("home")?;
        write("dotfiles/aliases", "blah\n")?;
        symlink("does/not/exist", "home/.aliases")?;

        let changed = deploy_link("dotfiles/aliases", "home/.aliases")?;

        assert!(changed);
        assert!(link_satisfied("dotfiles/aliases", "home/.aliases"));
        Ok(())
    }

    #[sealed_test]
    fn deploy_link_refuses_directory_target() -> anyhow::Result<()> {
        create_dir_all("dotfiles")?;
        create_dir_all("home/.aliases")?;
        write("dotfiles/aliases", "blah\n")?;

        let result = deploy_link("dotfiles/aliases", "home/.aliases");

        assert!(matches!(
            result,
            Err(LinkError::TargetIsDirectory { .. })
        ));
        Ok(())
    }

    #[sealed_test]
    fn resolve_links_single_match_keeps_target() -> anyhow::Result<()> {
        create_dir_all("dotfiles/shell")?;
        write("dotfiles/shell/aliases", "blah\n")?;
        let spec = LinkSpec {
            source: "shell/aliases".into(),
            target: PathBuf::from("home/.aliases"),
        };

        let result = resolve_links("dotfiles", &spec)?;

        assert_eq!(
            result,
            vec![(
                PathBuf::from("dotfiles/shell/aliases"),
                PathBuf::from("home/.aliases")
            )]
        );
        Ok(())
    }

    #[sealed_test]
    fn resolve_links_glob_fans_out_under_target() -> anyhow::Result<()> {
        create_dir_all("dotfiles/bin")?;
        write("dotfiles/bin/one", "1\n")?;
        write("dotfiles/bin/two", "2\n")?;
        let spec = LinkSpec {
            source: "bin/*".into(),
            target: PathBuf::from("home/bin"),
        };

        let mut result = resolve_links("dotfiles", &spec)?;
        result.sort();

        assert_eq!(
            result,
            vec![
                (PathBuf::from("dotfiles/bin/one"), PathBuf::from("home/bin/one")),
                (PathBuf::from("dotfiles/bin/two"), PathBuf::from("home/bin/two")),
            ]
        );
        Ok(())
    }

    #[sealed_test]
    fn resolve_links_errors_on_no_matches() -> anyhow::Result<()> {
        create_dir_all("dotfiles")?;
        let spec = LinkSpec {
            source: "missing/*".into(),
            target: PathBuf::from("home/missing"),
        };

        let result = resolve_links("dotfiles", &spec);

        assert!(matches!(result, Err(LinkError::NoMatches { .. })));
        Ok(())
    }
}
