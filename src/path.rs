// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for the external files that rigup
//! needs to read or mutate, i.e., the bootstrap manifest, and the user's
//! home directory where rc files and dotfile symlinks live.

use std::{env, path::PathBuf};

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine absolute path to bootstrap manifest.
///
/// The `RIGUP_MANIFEST` environment variable takes priority when set.
/// Otherwise, uses XDG Base Directory path `$XDG_CONFIG_HOME/rigup/rigup.toml`
/// as the default absolute path. Does not check if the path returned actually
/// exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn manifest_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os("RIGUP_MANIFEST") {
        return Ok(PathBuf::from(path));
    }

    dirs::config_dir()
        .map(|path| path.join("rigup").join("rigup.toml"))
        .ok_or(NoWayHome)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("RIGUP_MANIFEST", "/tmp/blah/rigup.toml")])]
    fn manifest_path_honors_environment_override() -> anyhow::Result<()> {
        let result = manifest_path()?;
        assert_eq!(result, PathBuf::from("/tmp/blah/rigup.toml"));
        Ok(())
    }

    #[sealed_test]
    fn manifest_path_defaults_to_xdg_config() -> anyhow::Result<()> {
        std::env::remove_var("RIGUP_MANIFEST");
        let result = manifest_path()?;
        assert!(result.ends_with("rigup/rigup.toml"));
        Ok(())
    }
}
