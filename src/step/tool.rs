// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tool installation step.
//!
//! Installs one tool from its manifest spec. The shape is the classic
//! bootstrap guard: check whether the tool is already there, run its
//! installer only when it is not, and make sure the rc lines it needs are
//! present either way. Installers come in two flavors: a script downloaded
//! by URL and piped through `sh`, and a direct command invocation.

use crate::{
    fetch,
    manifest::{InstallerSpec, ToolSpec},
    proc,
    step::{Outcome, Result, Severity, StepContext, StepError},
};

use std::{env, path::Path};
use tracing::{info, instrument, warn};

/// Install one tool and wire its rc lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStep {
    spec: ToolSpec,
}

impl ToolStep {
    /// Construct new tool step from manifest spec.
    pub fn new(spec: ToolSpec) -> Self {
        Self { spec }
    }

    /// Name of the tool, doubling as the step name.
    pub fn name(&self) -> &str {
        self.spec.name.as_str()
    }

    /// Optional tools warn and continue on failure.
    pub fn severity(&self) -> Severity {
        if self.spec.optional {
            Severity::Optional
        } else {
            Severity::Required
        }
    }

    /// Check if the tool looks installed already.
    ///
    /// Either check passing counts: the check command resolving on PATH, or
    /// the check directory existing after expansion against the live
    /// environment. A tool with no checks at all never looks installed.
    pub fn installed(&self) -> bool {
        if let Some(command) = &self.spec.check_command {
            if proc::command_on_path(command) {
                return true;
            }
        }

        if let Some(raw) = &self.spec.check_dir {
            if let Some(dir) = proc::expand_env_path(raw) {
                if Path::new(&dir).is_dir() {
                    return true;
                }
            }
        }

        false
    }

    /// Check if the tool is installed and all its rc lines are present.
    pub fn is_satisfied(&self, ctx: &StepContext<'_>) -> bool {
        self.installed()
            && self
                .spec
                .lines
                .iter()
                .all(|line| ctx.rc_line_present(line))
    }

    /// Apply the step: install when missing, then ensure rc lines.
    ///
    /// # Errors
    ///
    /// - Return [`StepError::Fetch`] if the installer download fails.
    /// - Return [`StepError::Proc`] if the installer process fails.
    /// - Return [`StepError::Rc`] if rc lines cannot be ensured.
    /// - Return [`StepError::EmptyInstaller`] if the installer argv is empty.
    #[instrument(skip(self, ctx), fields(tool = %self.spec.name), level = "debug")]
    pub async fn apply(&self, ctx: &StepContext<'_>) -> Result<Outcome> {
        let mut changed = false;

        if self.installed() {
            info!("{} already installed", self.spec.name);
        } else if let Some(installer) = &self.spec.installer {
            self.install(ctx, installer).await?;
            changed = true;
        } else {
            warn!(
                "{} is not installed, and declares no installer",
                self.spec.name
            );
        }

        for line in &self.spec.lines {
            changed |= ctx.ensure_rc_line(line)?;
        }

        Ok(if changed {
            Outcome::Changed
        } else {
            Outcome::AlreadySatisfied
        })
    }

    async fn install(&self, ctx: &StepContext<'_>, installer: &InstallerSpec) -> Result<()> {
        match installer {
            InstallerSpec::Script { url } => {
                let script = env::temp_dir().join(format!("{}-install.sh", self.spec.name));
                fetch::fetch_with_retry(ctx.fetcher, url, &script, ctx.retry).await?;
                info!("running installer script for {}", self.spec.name);
                proc::run_interactive("sh", [script.as_os_str()])?;
            }
            InstallerSpec::Argv { command } => {
                let (cmd, args) = command.split_first().ok_or(StepError::EmptyInstaller {
                    name: self.spec.name.clone(),
                })?;
                info!("running installer command for {}", self.spec.name);
                proc::run_interactive(cmd, args)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{CurlFetcher, Fetcher, RetryPolicy};
    use crate::manifest::RcLineSpec;
    use crate::rc::ShellFamily;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, read_to_string, write};
    use std::path::PathBuf;

    fn ctx<'a>(fetcher: &'a dyn Fetcher) -> StepContext<'a> {
        StepContext {
            home: PathBuf::from("home"),
            dotfile_dir: PathBuf::from("dotfiles"),
            safety_header: false,
            retry: RetryPolicy {
                max_attempts: 1,
                sleep_secs: 0,
            },
            fetcher,
        }
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime must build")
            .block_on(future)
    }

    #[sealed_test]
    fn installed_tool_skips_installer_but_ensures_lines() -> anyhow::Result<()> {
        create_dir_all("home")?;
        let fetcher = CurlFetcher::new();
        let ctx = ctx(&fetcher);
        let step = ToolStep::new(ToolSpec {
            name: "shell".into(),
            check_command: Some("sh".into()),
            // A real run would explode if this installer were invoked.
            installer: Some(InstallerSpec::Argv {
                command: vec!["sh".into(), "-c".into(), "exit 97".into()],
            }),
            lines: vec![RcLineSpec::for_family(
                "export SHELL_READY=1",
                ShellFamily::Posix,
            )],
            ..Default::default()
        });

        let outcome = block_on(step.apply(&ctx))?;

        assert_eq!(outcome, Outcome::Changed);
        assert!(read_to_string("home/.bashrc")?.contains("export SHELL_READY=1"));
        Ok(())
    }

    #[sealed_test]
    fn missing_tool_runs_argv_installer() -> anyhow::Result<()> {
        create_dir_all("home")?;
        let fetcher = CurlFetcher::new();
        let ctx = ctx(&fetcher);
        let step = ToolStep::new(ToolSpec {
            name: "touchfile".into(),
            installer: Some(InstallerSpec::Argv {
                command: vec!["sh".into(), "-c".into(), "touch installed-proof".into()],
            }),
            ..Default::default()
        });

        let outcome = block_on(step.apply(&ctx))?;

        assert_eq!(outcome, Outcome::Changed);
        assert!(Path::new("installed-proof").exists());
        Ok(())
    }

    #[sealed_test]
    fn check_dir_counts_as_installed() -> anyhow::Result<()> {
        create_dir_all("home")?;
        create_dir_all("fake-nvm")?;
        std::env::set_var("FAKE_NVM_DIR", "fake-nvm");
        let step = ToolStep::new(ToolSpec {
            name: "nvm".into(),
            check_dir: Some("$FAKE_NVM_DIR".into()),
            ..Default::default()
        });

        assert!(step.installed());
        Ok(())
    }

    #[sealed_test]
    fn unset_check_dir_variable_means_not_installed() {
        std::env::remove_var("FAKE_NVM_DIR");
        let step = ToolStep::new(ToolSpec {
            name: "nvm".into(),
            check_dir: Some("$FAKE_NVM_DIR".into()),
            ..Default::default()
        });

        assert!(!step.installed());
    }

    #[sealed_test]
    fn script_installer_downloads_then_runs() -> anyhow::Result<()> {
        create_dir_all("home")?;

        /// Fetcher that fakes the download by writing a script locally.
        struct FileFetcher;
        impl Fetcher for FileFetcher {
            fn fetch(&self, _url: &str, dest: &Path) -> crate::fetch::Result<()> {
                write(dest, "#!/bin/sh\ntouch script-proof\n").expect("write fake script");
                Ok(())
            }
        }

        let fetcher = FileFetcher;
        let ctx = ctx(&fetcher);
        let step = ToolStep::new(ToolSpec {
            name: "scripted".into(),
            installer: Some(InstallerSpec::Script {
                url: "https://blah.org/install.sh".into(),
            }),
            ..Default::default()
        });

        let outcome = block_on(step.apply(&ctx))?;

        assert_eq!(outcome, Outcome::Changed);
        assert!(Path::new("script-proof").exists());
        Ok(())
    }

    #[sealed_test]
    fn empty_installer_argv_is_an_error() {
        let fetcher = CurlFetcher::new();
        let ctx = ctx(&fetcher);
        let step = ToolStep::new(ToolSpec {
            name: "broken".into(),
            installer: Some(InstallerSpec::Argv {
                command: Vec::new(),
            }),
            ..Default::default()
        });

        let result = block_on(step.apply(&ctx));

        assert!(matches!(result, Err(StepError::EmptyInstaller { .. })));
    }
}
