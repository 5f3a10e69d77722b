// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use sitefab::{
    config::Settings,
    deploy::{
        artifact::find_release_archive,
        plan::{DeploymentPlan, PlanOptions},
    },
    path::default_settings_file,
    prompt::{AssumeDefault, Confirm, InquireConfirm},
    workspace::{vcs::GitCli, Scanner},
    Resolver, RunContext,
};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  sitefab [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<i32> {
        let settings = match &self.global.config {
            Some(path) => Settings::load(path)?,
            None => Settings::load(default_settings_file()?)?,
        };

        match self.command {
            Command::Status(opts) => run_status(&self.global, &settings, opts),
            Command::Guard(opts) => run_guard(&self.global, &settings, opts),
            Command::Target(opts) => run_target(&self.global, &settings, opts),
            Command::Plan(opts) => run_plan(&self.global, &settings, opts),
            Command::Push(opts) => run_push(&self.global, &settings, opts),
        }
    }
}

#[derive(Debug, Clone, Args)]
struct GlobalOptions {
    /// Path to settings file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Never prompt, and answer every question with "no".
    #[arg(short, long, global = true)]
    pub non_interactive: bool,

    /// Run mode, "release" implies --non-interactive.
    #[arg(long, global = true, env = "SITEFAB_MODE", value_name = "mode")]
    pub mode: Option<String>,

    /// Build number of this run.
    #[arg(short, long, global = true, env = "BUILD_NUMBER", value_name = "number")]
    pub build: Option<String>,
}

impl GlobalOptions {
    fn is_unattended(&self) -> bool {
        self.non_interactive || self.mode.as_deref() == Some("release")
    }

    fn confirm(&self) -> Box<dyn Confirm> {
        if self.is_unattended() {
            Box::new(AssumeDefault::new(false))
        } else {
            Box::new(InquireConfirm)
        }
    }

    fn resolver(&self, settings: &Settings) -> Resolver {
        Resolver::new(settings, RunContext::new(self.build.clone()))
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Check git status of every repository in the workspace.
    #[command(override_usage = "sitefab status [options]")]
    Status(ScanOptions),

    /// Like status, but exit with code 2 if the workspace is dirty.
    #[command(override_usage = "sitefab guard [options]")]
    Guard(ScanOptions),

    /// Show resolved deployment target of environment.
    #[command(override_usage = "sitefab target [options] <environment>")]
    Target(TargetOptions),

    /// Show commands that would deploy to environment.
    #[command(override_usage = "sitefab plan [options] <environment>")]
    Plan(DeployOptions),

    /// Deploy release to environment.
    #[command(override_usage = "sitefab push [options] <environment>")]
    Push(DeployOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ScanOptions {
    /// Workspace root to scan instead of the configured one.
    #[arg(short, long, value_name = "path")]
    pub root: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct TargetOptions {
    /// Environment name from the alias table.
    #[arg(required = true, value_name = "environment")]
    pub environment: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DeployOptions {
    /// Environment name from the alias table.
    #[arg(required = true, value_name = "environment")]
    pub environment: String,

    /// Migrate sites onto the new Aegir platform.
    #[arg(short, long)]
    pub migrate: bool,

    /// Push current site root without unpacking a release archive.
    #[arg(long)]
    pub no_extract: bool,

    /// Skip confirmation before pushing.
    #[arg(short, long)]
    pub yes: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    match run() {
        Ok(code) => exit(code),
        Err(error) => {
            error!("{error:?}");
            exit(1);
        }
    }
}

fn run() -> Result<i32> {
    Cli::parse().run()
}

fn scan(global: &GlobalOptions, settings: &Settings, opts: ScanOptions) -> Result<bool> {
    let root = opts.root.unwrap_or_else(|| settings.workspace.root.clone());
    let scanner = Scanner::new(settings.workspace.clone(), GitCli, global.confirm());

    Ok(scanner.scan(root)?)
}

fn run_status(global: &GlobalOptions, settings: &Settings, opts: ScanOptions) -> Result<i32> {
    scan(global, settings, opts)?;
    Ok(0)
}

fn run_guard(global: &GlobalOptions, settings: &Settings, opts: ScanOptions) -> Result<i32> {
    if scan(global, settings, opts)? {
        warn!("Refusing to go on with a dirty workspace.");
        return Ok(2);
    }

    Ok(0)
}

fn run_target(global: &GlobalOptions, settings: &Settings, opts: TargetOptions) -> Result<i32> {
    let destination = global
        .resolver(settings)
        .rsync_destination(&opts.environment)?;
    println!("{destination}");

    Ok(0)
}

fn build_plan(
    global: &GlobalOptions,
    settings: &Settings,
    opts: &DeployOptions,
) -> Result<DeploymentPlan> {
    let archive = if opts.no_extract {
        None
    } else {
        Some(find_release_archive(&settings.workspace.build_path())?)
    };
    let options = PlanOptions {
        archive,
        migrate: opts.migrate,
    };

    Ok(DeploymentPlan::build(
        &global.resolver(settings),
        &opts.environment,
        &settings.workspace,
        &options,
    )?)
}

fn run_plan(global: &GlobalOptions, settings: &Settings, opts: DeployOptions) -> Result<i32> {
    let plan = build_plan(global, settings, &opts)?;
    print!("{plan}");

    Ok(0)
}

fn run_push(global: &GlobalOptions, settings: &Settings, opts: DeployOptions) -> Result<i32> {
    let plan = build_plan(global, settings, &opts)?;
    info!("deployment plan for {}:\n{plan}", opts.environment);

    if !opts.yes {
        let question = format!("Deploy to {}?", opts.environment);
        if !global.confirm().confirm(&question, false)? {
            bail!("deployment to {} cancelled", opts.environment);
        }
    }

    plan.execute()?;

    Ok(0)
}
