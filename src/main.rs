// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use rigup::{
    fetch::CurlFetcher,
    menu,
    path::manifest_path,
    proc,
    step::Outcome,
    Manifest, Plan, StepContext,
};

use anyhow::{bail, Context, Result};
use clap::{error::ErrorKind, Parser, Subcommand, ValueEnum};
use inquire::Select;
use std::{fs, path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  rigup [options] <rigup-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to the bootstrap manifest.
    #[arg(short, long, value_name = "path", global = true)]
    pub manifest: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let path = match &self.manifest {
            Some(path) => path.clone(),
            None => manifest_path()?,
        };

        match self.command {
            Command::Init(opts) => run_init(path, opts),
            Command::Apply => run_apply(path).await,
            Command::Step(opts) => run_step(path, opts).await,
            Command::Status => run_status(path),
            Command::Link => run_link(path).await,
            Command::Secrets => run_secrets(path).await,
            Command::Menu(opts) => run_menu(path, opts).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Write a starter manifest to get going.
    #[command(override_usage = "rigup init [options]")]
    Init(InitOptions),

    /// Apply every bootstrap step in manifest order.
    #[command(override_usage = "rigup apply [options]")]
    Apply,

    /// Apply one bootstrap step selected by name.
    #[command(override_usage = "rigup step [options] <step_name>")]
    Step(StepOptions),

    /// Show which bootstrap steps are already satisfied.
    #[command(override_usage = "rigup status [options]")]
    Status,

    /// Deploy dotfile symlinks and rc lines only.
    #[command(override_usage = "rigup link [options]")]
    Link,

    /// Decrypt the secrets file only.
    #[command(override_usage = "rigup secrets [options]")]
    Secrets,

    /// Pick something to run from an interactive menu.
    #[command(override_usage = "rigup menu [options] <which>")]
    Menu(MenuOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// Overwrite an existing manifest.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct StepOptions {
    /// Name of step to apply, i.e., a tool name or a section step like
    /// "dotfiles".
    #[arg(required = true, value_name = "step_name")]
    pub step_name: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct MenuOptions {
    /// Which menu to open.
    #[arg(value_enum, value_name = "which")]
    pub which: MenuKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum MenuKind {
    /// package.json scripts in the current directory.
    Scripts,

    /// Taskfile tasks.
    Tasks,

    /// Running tmux sessions.
    Tmux,

    /// Bootstrap steps from the manifest.
    Steps,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer().compact().with_target(false).without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    // The scripts rigup replaces exit 1 with a usage message when invoked
    // with no arguments, so clap's default exit code 2 is overridden here.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            exit(0)
        }
        Err(err) => {
            let _ = err.print();
            exit(1)
        }
    };

    if let Err(error) = cli.run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn load_manifest(path: &PathBuf) -> Result<Manifest> {
    let contents = fs::read_to_string(path).with_context(|| {
        format!(
            "cannot read manifest at {:?}; run `rigup init` to write a starter one",
            path.display()
        )
    })?;

    let manifest = contents
        .parse::<Manifest>()
        .with_context(|| format!("cannot parse manifest at {:?}", path.display()))?;

    Ok(manifest)
}

fn run_init(path: PathBuf, opts: InitOptions) -> Result<()> {
    if path.exists() && !opts.force {
        bail!(
            "manifest already exists at {:?}; pass --force to overwrite",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        mkdirp::mkdirp(parent)?;
    }

    fs::write(&path, Manifest::starter().to_string())?;
    info!("wrote starter manifest to {:?}", path.display());
    info!("edit it, then run `rigup apply`");

    Ok(())
}

async fn run_apply(path: PathBuf) -> Result<()> {
    // Installers drop files all over $HOME; running them as root plants
    // root-owned files a normal user can never manage again.
    if proc::effective_uid()? == 0 {
        bail!("refusing to bootstrap a machine as root");
    }

    let manifest = load_manifest(&path)?;
    if !manifest.settings.description.is_empty() {
        info!("{}", manifest.settings.description);
    }

    let fetcher = CurlFetcher::new();
    let ctx = StepContext::new(&manifest, &fetcher)?;
    let plan = Plan::from_manifest(&manifest);
    plan.apply_all(&ctx).await?;

    info!("bootstrap complete; restart your shell to pick up rc changes");
    Ok(())
}

async fn run_step(path: PathBuf, opts: StepOptions) -> Result<()> {
    let manifest = load_manifest(&path)?;
    let fetcher = CurlFetcher::new();
    let ctx = StepContext::new(&manifest, &fetcher)?;
    let plan = Plan::from_manifest(&manifest);

    match plan.apply_one(&ctx, &opts.step_name).await? {
        Outcome::Changed => info!("step {} applied", opts.step_name),
        Outcome::AlreadySatisfied => info!("step {} already satisfied", opts.step_name),
    }

    Ok(())
}

fn run_status(path: PathBuf) -> Result<()> {
    let manifest = load_manifest(&path)?;
    let fetcher = CurlFetcher::new();
    let ctx = StepContext::new(&manifest, &fetcher)?;
    let plan = Plan::from_manifest(&manifest);

    for step in plan.steps() {
        let state = if step.is_satisfied(&ctx) {
            "satisfied"
        } else {
            "pending"
        };
        info!("{:<16} {:<8} {state}", step.name(), step.severity().to_string());
    }

    Ok(())
}

async fn run_link(path: PathBuf) -> Result<()> {
    let manifest = load_manifest(&path)?;
    if manifest.links.is_empty() && manifest.lines.is_empty() {
        bail!("manifest declares no [[link]] or [[line]] entries");
    }

    let fetcher = CurlFetcher::new();
    let ctx = StepContext::new(&manifest, &fetcher)?;
    let plan = Plan::from_manifest(&manifest);
    plan.apply_one(&ctx, "dotfiles").await?;

    Ok(())
}

async fn run_secrets(path: PathBuf) -> Result<()> {
    let manifest = load_manifest(&path)?;
    if manifest.secrets.is_none() {
        bail!("manifest declares no [secrets] section");
    }

    let fetcher = CurlFetcher::new();
    let ctx = StepContext::new(&manifest, &fetcher)?;
    let plan = Plan::from_manifest(&manifest);
    plan.apply_one(&ctx, "secrets").await?;

    Ok(())
}

async fn run_menu(path: PathBuf, opts: MenuOptions) -> Result<()> {
    match opts.which {
        MenuKind::Scripts => menu::scripts_menu()?,
        MenuKind::Tasks => menu::tasks_menu()?,
        MenuKind::Tmux => menu::tmux_menu()?,
        MenuKind::Steps => {
            let manifest = load_manifest(&path)?;
            let fetcher = CurlFetcher::new();
            let ctx = StepContext::new(&manifest, &fetcher)?;
            let plan = Plan::from_manifest(&manifest);

            let names = plan
                .steps()
                .iter()
                .map(|step| step.name().to_string())
                .collect::<Vec<_>>();
            if names.is_empty() {
                bail!("manifest declares no steps");
            }

            let choice = Select::new("step", names).prompt()?;
            plan.apply_one(&ctx, &choice).await?;
        }
    }

    Ok(())
}
