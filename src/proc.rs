// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process invocation.
//!
//! Everything rigup does to a machine eventually bottoms out in somebody
//! else's binary: curl, git, sh, openssl, tmux, chsh. This module wraps those
//! invocations in two flavors. Interactive calls inherit the current stdio so
//! installers can talk to the user directly. Non-interactive calls capture
//! stdout and stderr into a single message for logging or parsing.
//!
//! Every call blocks the current process until the child exits. There is no
//! timeout handling here on purpose: bootstrap runs once, interactively, on a
//! single machine, and the user can always interrupt it.

use std::{
    env,
    ffi::{OsStr, OsString},
    process::Command,
};
use tracing::debug;

/// Invoke external command, inheriting current stdio.
///
/// Blocks current process to allow for direct interaction with the child,
/// e.g., installers that prompt the user.
///
/// # Errors
///
/// - Return [`ProcError::Spawn`] if the command cannot be spawned.
/// - Return [`ProcError::Unsuccessful`] if the command exits non-zero.
pub fn run_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<()> {
    debug!("run interactive command {:?}", cmd.as_ref());
    let status = Command::new(cmd.as_ref())
        .args(args)
        .spawn()
        .map_err(|err| ProcError::Spawn {
            source: err,
            command: cmd.as_ref().to_os_string(),
        })?
        .wait()
        .map_err(|err| ProcError::Spawn {
            source: err,
            command: cmd.as_ref().to_os_string(),
        })?;

    if !status.success() {
        return Err(ProcError::Unsuccessful {
            command: cmd.as_ref().to_os_string(),
            message: String::new(),
        });
    }

    Ok(())
}

/// Invoke external command, capturing its output.
///
/// Does not inherit stdio. Output to stdout and stderr is returned together
/// as a [`String`].
///
/// # Errors
///
/// - Return [`ProcError::Spawn`] if the command cannot be spawned.
/// - Return [`ProcError::Unsuccessful`] if the command exits non-zero.
pub fn run_captured(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    run_captured_with_env(cmd, args, Vec::<(OsString, OsString)>::new())
}

/// Invoke external command with extra environment variables, capturing output.
///
/// Used for children that must receive data too sensitive for argv, e.g.,
/// passing a decryption password through the environment.
///
/// # Errors
///
/// - Return [`ProcError::Spawn`] if the command cannot be spawned.
/// - Return [`ProcError::Unsuccessful`] if the command exits non-zero.
pub fn run_captured_with_env(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    envs: impl IntoIterator<Item = (impl AsRef<OsStr>, impl AsRef<OsStr>)>,
) -> Result<String> {
    debug!("run captured command {:?}", cmd.as_ref());
    let output = Command::new(cmd.as_ref())
        .args(args)
        .envs(
            envs.into_iter()
                .map(|(key, value)| (key.as_ref().to_os_string(), value.as_ref().to_os_string())),
        )
        .output()
        .map_err(|err| ProcError::Spawn {
            source: err,
            command: cmd.as_ref().to_os_string(),
        })?;

    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(stdout.as_str());
    }

    if !stderr.is_empty() {
        message.push_str(stderr.as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(ProcError::Unsuccessful {
            command: cmd.as_ref().to_os_string(),
            message,
        });
    }

    Ok(message)
}

/// Check if a command can be resolved through the user's PATH.
///
/// Probes through `command -v` the same way the usual "is X already
/// installed?" shell guard does. Any failure at all counts as the command
/// being absent.
pub fn command_on_path(name: impl AsRef<str>) -> bool {
    run_captured("sh", ["-c", format!("command -v {}", name.as_ref()).as_str()]).is_ok()
}

/// Determine effective user id of current process.
///
/// Probes through `id -u` rather than linking against libc. Used to refuse
/// bootstrapping an entire machine as root.
///
/// # Errors
///
/// - Return [`ProcError::Spawn`] if `id` cannot be spawned.
/// - Return [`ProcError::Unsuccessful`] if `id` fails.
/// - Return [`ProcError::MalformedUid`] if `id -u` prints something that is
///   not a number.
pub fn effective_uid() -> Result<u32> {
    let output = run_captured("id", ["-u"])?;
    output
        .trim()
        .parse::<u32>()
        .map_err(|_| ProcError::MalformedUid { output })
}

/// Expand environment variables inside a raw path string.
///
/// Returns [`None`] when any referenced variable is unset, which callers
/// treat as "the directory this variable would name does not exist yet."
pub fn expand_env_path(raw: impl AsRef<str>) -> Option<String> {
    let raw = raw.as_ref();
    let context = |name: &str| -> std::result::Result<Option<String>, env::VarError> {
        match env::var(name) {
            Ok(value) => Ok(Some(value)),
            Err(err) => Err(err),
        }
    };

    let home_dir = || dirs::home_dir().map(|path| path.to_string_lossy().into_owned());
    shellexpand::full_with_context(raw, home_dir, context)
        .ok()
        .map(|expanded| expanded.into_owned())
}

/// External process invocation error types.
#[derive(Debug, thiserror::Error)]
pub enum ProcError {
    /// Command cannot be spawned at all, e.g., binary absent from PATH.
    #[error("failed to invoke command {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: OsString,
    },

    /// Command ran, but exited with a non-zero status.
    #[error("command {command:?} failed:\n{message}")]
    Unsuccessful { command: OsString, message: String },

    /// Output of `id -u` cannot be parsed.
    #[error("cannot parse effective uid from {output:?}")]
    MalformedUid { output: String },
}

/// Friendly result alias :3
pub type Result<T, E = ProcError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;

    #[test]
    fn run_captured_merges_and_chomps_output() -> anyhow::Result<()> {
        let result = run_captured("sh", ["-c", "echo hello"])?;
        assert_eq!(result, "hello");
        Ok(())
    }

    #[test]
    fn run_captured_reports_failure_with_message() {
        let result = run_captured("sh", ["-c", "echo oops >&2; exit 3"]);
        match result {
            Err(ProcError::Unsuccessful { message, .. }) => assert_eq!(message, "oops"),
            other => panic!("expected Unsuccessful, got {other:?}"),
        }
    }

    #[test]
    fn run_captured_reports_missing_binary() {
        let result = run_captured("definitely-not-a-real-binary", ["blah"]);
        assert!(matches!(result, Err(ProcError::Spawn { .. })));
    }

    #[test_case("sh", true; "shell is always present")]
    #[test_case("definitely-not-a-real-binary", false; "gibberish is absent")]
    #[test]
    fn command_on_path_probes_commands(name: &str, expect: bool) {
        assert_eq!(command_on_path(name), expect);
    }

    #[sealed_test(env = [("RIGUP_TEST_DIR", "/opt/blah")])]
    fn expand_env_path_expands_known_variables() {
        let result = expand_env_path("$RIGUP_TEST_DIR/bin");
        assert_eq!(result, Some("/opt/blah/bin".to_string()));
    }

    #[sealed_test]
    fn expand_env_path_rejects_unset_variables() {
        std::env::remove_var("RIGUP_TEST_UNSET");
        let result = expand_env_path("$RIGUP_TEST_UNSET/bin");
        assert_eq!(result, None);
    }
}
