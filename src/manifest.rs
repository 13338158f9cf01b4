// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bootstrap manifest layout.
//!
//! Specify the layout of the manifest file that rigup uses to simplify the
//! process of serialization and deserialization. File I/O is left to the
//! caller to figure out.
//!
//! # General Layout
//!
//! A manifest is composed of a settings section followed by the actual
//! configuration data of the machine being bootstrapped: the tools to
//! install, the rc lines to append, the dotfiles to symlink, the
//! repositories to clone, and the secrets file to decrypt. The list of
//! tools is data, not code; adding a tool means adding a `[[tool]]` entry,
//! never touching rigup itself.

use crate::{fetch::RetryPolicy, rc::ShellFamily};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Bootstrap manifest layout.
///
/// Everything rigup does to a machine is declared here. Section order in the
/// file does not matter, but steps are applied in the order the sections are
/// listed in this struct: tools first, then dotfiles, repositories, and
/// secrets last.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Manifest {
    /// Settings for the bootstrap run itself.
    pub settings: Settings,

    /// Global git configuration to apply.
    pub git: Option<GitConfigSpec>,

    /// Tools to install.
    #[serde(rename = "tool", default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSpec>,

    /// Rc lines to append independent of any tool.
    #[serde(rename = "line", default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<RcLineSpec>,

    /// Dotfiles to symlink out of the dotfile directory.
    #[serde(rename = "link", default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkSpec>,

    /// Repositories to clone.
    #[serde(rename = "repo", default, skip_serializing_if = "Vec::is_empty")]
    pub repos: Vec<RepoSpec>,

    /// Encrypted secrets file to decrypt.
    pub secrets: Option<SecretsSpec>,
}

impl FromStr for Manifest {
    type Err = ManifestError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut manifest: Manifest =
            toml::de::from_str(data).map_err(ManifestError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path the user writes
        // with `~` or environment variables. Tool check directories are left
        // raw, because the variables they name may only appear mid-run.
        manifest.settings.dotfile_dir = expand_path(&manifest.settings.dotfile_dir)?;
        for link in &mut manifest.links {
            link.target = expand_path(&link.target)?;
        }
        for repo in &mut manifest.repos {
            repo.path = expand_path(&repo.path)?;
        }
        if let Some(secrets) = &mut manifest.secrets {
            secrets.encrypted = expand_path(&secrets.encrypted)?;
            secrets.plaintext = expand_path(&secrets.plaintext)?;
        }

        Ok(manifest)
    }
}

impl Display for Manifest {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ManifestError::Serialize)?
                .as_str(),
        )
    }
}

fn expand_path(path: &PathBuf) -> Result<PathBuf, ManifestError> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(raw.as_ref())
        .map_err(ManifestError::ShellExpansion)?
        .into_owned();

    Ok(PathBuf::from(expanded))
}

/// Bootstrap run settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Brief description of what the manifest bootstraps.
    pub description: String,

    /// Directory holding repo-tracked dotfiles to symlink from.
    pub dotfile_dir: PathBuf,

    /// Prepend a safety header comment block to managed rc files.
    #[serde(default = "default_safety_header")]
    pub safety_header: bool,

    /// Retry policy for installer downloads.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            description: String::new(),
            dotfile_dir: PathBuf::new(),
            safety_header: true,
            retry: RetryPolicy::default(),
        }
    }
}

fn default_safety_header() -> bool {
    true
}

/// Global git configuration values to apply.
///
/// Only the values that are set get written, and only when they differ from
/// what the global git configuration already holds.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct GitConfigSpec {
    /// Value for `user.name`.
    pub user_name: Option<String>,

    /// Value for `user.email`.
    pub user_email: Option<String>,

    /// Value for `init.defaultBranch`.
    pub default_branch: Option<String>,
}

/// One tool to install.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ToolSpec {
    /// Name of the tool, doubling as the step name.
    pub name: String,

    /// Command whose presence on PATH means the tool is installed.
    pub check_command: Option<String>,

    /// Directory whose existence means the tool is installed.
    ///
    /// Kept raw, e.g. `$NVM_DIR`, and expanded against the live environment
    /// at check time. An unset variable counts as "not installed."
    pub check_dir: Option<String>,

    /// Warn and continue instead of aborting when installation fails.
    #[serde(default)]
    pub optional: bool,

    /// How to install the tool when the checks fail.
    pub installer: Option<InstallerSpec>,

    /// Rc lines the tool needs on shell startup.
    #[serde(rename = "line", default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<RcLineSpec>,
}

/// How to install a tool.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum InstallerSpec {
    /// Download installer script from URL, then run it through `sh`.
    Script { url: String },

    /// Invoke command directly.
    Argv { command: Vec<String> },
}

/// One literal line to keep present in rc files.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RcLineSpec {
    /// Exact line of text to ensure.
    pub text: String,

    /// Shell families whose rc file receives the line.
    #[serde(default = "all_families")]
    pub shells: Vec<ShellFamily>,
}

impl RcLineSpec {
    /// Construct new rc line spec for every shell family.
    pub fn for_all(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            shells: all_families(),
        }
    }

    /// Construct new rc line spec for one shell family.
    pub fn for_family(text: impl Into<String>, family: ShellFamily) -> Self {
        Self {
            text: text.into(),
            shells: vec![family],
        }
    }
}

fn all_families() -> Vec<ShellFamily> {
    ShellFamily::ALL.to_vec()
}

/// One dotfile symlink to deploy.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct LinkSpec {
    /// Glob pattern relative to the dotfile directory.
    pub source: String,

    /// Target path to replace with a symlink.
    ///
    /// When the source glob matches more than one file, the target is
    /// treated as a directory and each match is linked under it by file
    /// name.
    pub target: PathBuf,
}

/// One repository to clone.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RepoSpec {
    /// Local name of the repository.
    pub name: String,

    /// Remote URL to clone from.
    pub url: String,

    /// Destination path for the clone.
    pub path: PathBuf,
}

/// Encrypted secrets file to decrypt on bootstrap.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SecretsSpec {
    /// Path of the encrypted file.
    pub encrypted: PathBuf,

    /// Path the plaintext gets written to.
    pub plaintext: PathBuf,
}

impl Manifest {
    /// Construct the starter manifest written by `rigup init`.
    ///
    /// Carries the usual developer-machine tool set. All of it is plain
    /// manifest data, so users are expected to prune and extend it freely.
    pub fn starter() -> Self {
        Self {
            settings: Settings {
                description: "<put one sentence description here>".into(),
                dotfile_dir: PathBuf::from("~/dotfiles"),
                safety_header: true,
                retry: RetryPolicy::default(),
            },
            git: Some(GitConfigSpec {
                user_name: Some("<put your name here>".into()),
                user_email: Some("<put your email here>".into()),
                default_branch: Some("main".into()),
            }),
            tools: vec![
                ToolSpec {
                    name: "rust".into(),
                    check_command: Some("cargo".into()),
                    check_dir: Some("$CARGO_HOME".into()),
                    installer: Some(InstallerSpec::Script {
                        url: "https://sh.rustup.rs".into(),
                    }),
                    lines: vec![RcLineSpec::for_all(r#". "$HOME/.cargo/env""#)],
                    optional: false,
                },
                ToolSpec {
                    name: "bun".into(),
                    check_command: Some("bun".into()),
                    check_dir: Some("$BUN_INSTALL".into()),
                    installer: Some(InstallerSpec::Script {
                        url: "https://bun.sh/install".into(),
                    }),
                    lines: vec![
                        RcLineSpec::for_all(r#"export BUN_INSTALL="$HOME/.bun""#),
                        RcLineSpec::for_all(r#"export PATH="$BUN_INSTALL/bin:$PATH""#),
                    ],
                    optional: false,
                },
                ToolSpec {
                    name: "nvm".into(),
                    check_dir: Some("$HOME/.nvm".into()),
                    installer: Some(InstallerSpec::Script {
                        url: "https://raw.githubusercontent.com/nvm-sh/nvm/v0.40.1/install.sh"
                            .into(),
                    }),
                    lines: vec![
                        RcLineSpec::for_all(r#"export NVM_DIR="$HOME/.nvm""#),
                        RcLineSpec::for_all(
                            r#"[ -s "$NVM_DIR/nvm.sh" ] && \. "$NVM_DIR/nvm.sh""#,
                        ),
                    ],
                    ..Default::default()
                },
                ToolSpec {
                    name: "uv".into(),
                    check_command: Some("uv".into()),
                    installer: Some(InstallerSpec::Script {
                        url: "https://astral.sh/uv/install.sh".into(),
                    }),
                    lines: vec![RcLineSpec::for_all(
                        r#"export PATH="$HOME/.local/bin:$PATH""#,
                    )],
                    ..Default::default()
                },
                ToolSpec {
                    name: "ruff".into(),
                    check_command: Some("ruff".into()),
                    installer: Some(InstallerSpec::Argv {
                        command: vec!["uv".into(), "tool".into(), "install".into(), "ruff".into()],
                    }),
                    optional: true,
                    ..Default::default()
                },
                ToolSpec {
                    name: "oh-my-zsh".into(),
                    check_dir: Some("$HOME/.oh-my-zsh".into()),
                    installer: Some(InstallerSpec::Script {
                        url: "https://raw.githubusercontent.com/ohmyzsh/ohmyzsh/master/tools/install.sh"
                            .into(),
                    }),
                    optional: true,
                    ..Default::default()
                },
            ],
            lines: vec![RcLineSpec::for_all("export EDITOR=vim")],
            links: vec![LinkSpec {
                source: "shell/aliases".into(),
                target: PathBuf::from("~/.aliases"),
            }],
            repos: Vec::new(),
            secrets: None,
        }
    }
}

/// Manifest error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ManifestError {
    /// Failed to deserialize manifest.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize manifest.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on manifest.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ManifestError> for FmtError {
    fn from(_: ManifestError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ManifestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("BLAH", "/home/blah")])]
    fn deserialize_manifest() -> anyhow::Result<()> {
        let result: Manifest = r#"
            [settings]
            description = "blah blah blah"
            dotfile_dir = "$BLAH/dotfiles"

            [git]
            user_name = "Blah Blah"
            user_email = "blah@blah.org"

            [[tool]]
            name = "bun"
            check_command = "bun"
            check_dir = "$BUN_INSTALL"

            [tool.installer]
            url = "https://bun.sh/install"

            [[tool.line]]
            text = "export BUN_INSTALL=\"$HOME/.bun\""
            shells = ["posix", "zsh"]

            [[link]]
            source = "shell/aliases"
            target = "$BLAH/.aliases"

            [[repo]]
            name = "scratch"
            url = "https://blah.org/scratch.git"
            path = "$BLAH/scratch"

            [secrets]
            encrypted = "$BLAH/dotfiles/env.enc"
            plaintext = "$BLAH/.env"
        "#
        .parse()?;

        let expect = Manifest {
            settings: Settings {
                description: "blah blah blah".into(),
                dotfile_dir: PathBuf::from("/home/blah/dotfiles"),
                safety_header: true,
                retry: RetryPolicy::default(),
            },
            git: Some(GitConfigSpec {
                user_name: Some("Blah Blah".into()),
                user_email: Some("blah@blah.org".into()),
                default_branch: None,
            }),
            tools: vec![ToolSpec {
                name: "bun".into(),
                check_command: Some("bun".into()),
                check_dir: Some("$BUN_INSTALL".into()),
                installer: Some(InstallerSpec::Script {
                    url: "https://bun.sh/install".into(),
                }),
                lines: vec![RcLineSpec::for_all(r#"export BUN_INSTALL="$HOME/.bun""#)],
                optional: false,
            }],
            lines: Vec::new(),
            links: vec![LinkSpec {
                source: "shell/aliases".into(),
                target: PathBuf::from("/home/blah/.aliases"),
            }],
            repos: vec![RepoSpec {
                name: "scratch".into(),
                url: "https://blah.org/scratch.git".into(),
                path: PathBuf::from("/home/blah/scratch"),
            }],
            secrets: Some(SecretsSpec {
                encrypted: PathBuf::from("/home/blah/dotfiles/env.enc"),
                plaintext: PathBuf::from("/home/blah/.env"),
            }),
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test]
    fn check_dir_stays_raw_after_parse() -> anyhow::Result<()> {
        std::env::remove_var("NVM_DIR");
        let result: Manifest = r#"
            [settings]
            description = "blah"
            dotfile_dir = "/tmp/dotfiles"

            [[tool]]
            name = "nvm"
            check_dir = "$NVM_DIR"
        "#
        .parse()?;

        assert_eq!(result.tools[0].check_dir.as_deref(), Some("$NVM_DIR"));
        Ok(())
    }

    #[sealed_test]
    fn starter_manifest_round_trips() -> anyhow::Result<()> {
        std::env::set_var("HOME", "/home/blah");
        let starter = Manifest::starter();
        let reparsed: Manifest = starter.to_string().parse()?;

        // Paths written with `~` come back expanded.
        assert_eq!(
            reparsed.settings.dotfile_dir,
            PathBuf::from("/home/blah/dotfiles")
        );
        assert_eq!(reparsed.tools.len(), starter.tools.len());
        assert!(reparsed.tools.iter().any(|tool| tool.name == "rust"));
        Ok(())
    }

    #[test]
    fn default_settings_enable_safety_header() {
        let settings = Settings::default();
        assert!(settings.safety_header);
    }
}
