// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deployment command plan.
//!
//! Pushing a release is a fixed sequence of external commands. The plan lays
//! that sequence out up front, so it can be shown to the user before anything
//! runs, and executes it step by step afterwards. The first failing step
//! stops the whole deployment.
//!
//! # Steps
//!
//! 1. Replace the local site root with the content of the release archive,
//!    if one is given, and make sure the archive really held a site.
//! 2. Rsync the site root to the target directory.
//! 3. For Aegir targets, register the new platform with Aegir, import it into
//!    the hostmaster, and dispatch the hosting queue.
//! 4. For Aegir targets, and only when asked to, migrate the environment's
//!    sites onto the new platform.

use crate::{
    config::WorkspaceSettings,
    deploy::{DeployError, DeploymentTarget, Resolver, Result},
    syscall::syscall_interactive,
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Knobs of a deployment run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlanOptions {
    /// Release archive to unpack into the site root before pushing.
    pub archive: Option<PathBuf>,

    /// Migrate the environment's sites onto the new Aegir platform.
    pub migrate: bool,
}

/// Site entry point that every release must carry.
const SITE_ENTRY_POINT: &str = "cron.php";

/// What a plan step does when executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Run external program.
    Run {
        /// Program to run.
        program: String,

        /// Arguments handed to program.
        args: Vec<String>,
    },

    /// Check that unpacking `archive` left a site at `site`.
    VerifyRelease { archive: PathBuf, site: PathBuf },
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    /// What the step does, for humans.
    pub description: String,

    /// What the step does, for the machine.
    pub action: StepAction,
}

impl PlanStep {
    fn new(
        description: impl Into<String>,
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            description: description.into(),
            action: StepAction::Run {
                program: program.into(),
                args: args.into_iter().map(Into::into).collect(),
            },
        }
    }

    fn remote(target: &DeploymentTarget, description: impl Into<String>, command: String) -> Self {
        Self::new(description, "ssh", [target.ssh_destination(), command])
    }
}

impl PlanStep {
    fn execute(&self) -> Result<()> {
        match &self.action {
            StepAction::Run { program, args } => Ok(syscall_interactive(program, args)?),
            StepAction::VerifyRelease { archive, site } => verify_release(archive, site),
        }
    }
}

impl Display for PlanStep {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match &self.action {
            StepAction::Run { program, args } => {
                fmt.write_str(program)?;
                for arg in args {
                    if arg.contains(char::is_whitespace) {
                        write!(fmt, " '{arg}'")?;
                    } else {
                        write!(fmt, " {arg}")?;
                    }
                }
            }
            StepAction::VerifyRelease { site, .. } => {
                write!(fmt, "check {}", site.join(SITE_ENTRY_POINT).display())?;
            }
        }

        Ok(())
    }
}

/// Ordered deployment commands for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    /// Resolved target of the plan.
    pub target: DeploymentTarget,

    /// Steps in execution order.
    pub steps: Vec<PlanStep>,
}

impl DeploymentPlan {
    /// Lay out deployment of the workspace's site root to `environment`.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError`] if the environment cannot be resolved to a
    ///   target directory.
    /// - Return [`DeployError::MissingTargetKey`] if an Aegir target lacks
    ///   `aegir_path` or `aegir_destsrv`.
    #[instrument(skip(resolver, workspace, options), level = "debug")]
    pub fn build(
        resolver: &Resolver,
        environment: &str,
        workspace: &WorkspaceSettings,
        options: &PlanOptions,
    ) -> Result<Self> {
        let target = resolver.resolve(environment)?;
        let directory = resolver.target_directory_of(&target)?;
        let site = workspace.site_path();
        let mut steps = Vec::new();

        if let Some(archive) = &options.archive {
            steps.extend(unpack_steps(archive, &site));
        }

        steps.push(PlanStep::new(
            format!("Rsync {} to {}", site.display(), target.name),
            "rsync",
            [
                "-a".to_string(),
                format!("{}/", site.display()),
                format!("{}:{}", target.ssh_destination(), directory),
            ],
        ));

        if target.uses_specialized_hosting {
            let platform = resolver.platform_name_of(&target)?;
            let aegir_path = required(&target, target.aegir_path.as_deref(), "aegir_path")?;
            let destsrv = required(&target, target.aegir_destsrv.as_deref(), "aegir_destsrv")?;

            steps.push(PlanStep::remote(
                &target,
                format!("Declare platform {platform} in aegir"),
                format!(
                    "drush --root=\"{aegir_path}/platforms/{platform}\" provision-save \
                     \"@platform_{platform}\" --context_type=\"platform\" --web_server=@{destsrv}"
                ),
            ));
            steps.push(PlanStep::remote(
                &target,
                format!("Import platform {platform} into hostmaster"),
                format!("drush @hostmaster hosting-import platform_{platform}"),
            ));
            steps.push(PlanStep::remote(
                &target,
                "Dispatch hosting queue",
                "drush @hostmaster hosting-dispatch".to_string(),
            ));

            if options.migrate {
                steps.push(PlanStep::remote(
                    &target,
                    format!("Migrate sites of {} to {platform}", target.name),
                    format!("{aegir_path}/migrate-sites {} {platform}", target.name),
                ));
            }
        }

        Ok(Self { target, steps })
    }

    /// Run every step in order.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError::CommandFailed`] on the first command that
    ///   fails. Later steps do not run.
    /// - Return [`DeployError::BrokenRelease`] if the unpacked archive holds
    ///   no site. Nothing has been pushed at that point.
    pub fn execute(&self) -> Result<()> {
        for step in &self.steps {
            info!("{}", step.description);
            step.execute()?;
        }
        info!("Deployment to {} finished", self.target.name);

        Ok(())
    }
}

impl Display for DeploymentPlan {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for (number, step) in self.steps.iter().enumerate() {
            writeln!(fmt, "{}. {}", number + 1, step.description)?;
            writeln!(fmt, "   {step}")?;
        }

        Ok(())
    }
}

fn unpack_steps(archive: &Path, site: &Path) -> Vec<PlanStep> {
    let parent = site.parent().unwrap_or(Path::new("."));
    vec![
        PlanStep::new(
            format!("Clear currently installed site at {}", site.display()),
            "rm",
            ["-rf".to_string(), site.display().to_string()],
        ),
        PlanStep::new(
            format!("Extract {}", archive.display()),
            "tar",
            [
                "-xzf".to_string(),
                archive.display().to_string(),
                "-C".to_string(),
                parent.display().to_string(),
            ],
        ),
        PlanStep {
            description: format!("Verify {} holds a site", archive.display()),
            action: StepAction::VerifyRelease {
                archive: archive.to_path_buf(),
                site: site.to_path_buf(),
            },
        },
    ]
}

fn verify_release(archive: &Path, site: &Path) -> Result<()> {
    let entry_point = site.join(SITE_ENTRY_POINT);
    let missing = if !site.is_dir() {
        site.to_path_buf()
    } else if !entry_point.is_file() {
        entry_point
    } else {
        return Ok(());
    };

    Err(DeployError::BrokenRelease {
        archive: archive.to_path_buf(),
        missing,
    })
}

fn required<'a>(
    target: &DeploymentTarget,
    value: Option<&'a str>,
    key: &'static str,
) -> Result<&'a str> {
    value.ok_or_else(|| DeployError::MissingTargetKey {
        environment: target.name.clone(),
        key,
    })
}
