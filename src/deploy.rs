// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deployment target resolution.
//!
//! Deployment steps never deal with raw alias entries. They ask a [`Resolver`]
//! to turn a logical environment name, e.g., "dev" or "prod", into a
//! [`DeploymentTarget`] with everything needed to reach it.
//!
//! # Aegir Platforms
//!
//! A target can be an Aegir managed host. Aegir does not deploy into one fixed
//! directory. Every release becomes a new __platform__, i.e., a directory of
//! its own below the target root, that sites are later migrated onto. The
//! platform name comes from the alias' `aegir_platform` template, where the
//! placeholders `{name}`, `{env}`, and `{build}` are replaced by the project
//! name, the environment name, and the build number of the current run.
//! Literal braces are written `{{` and `}}`.

pub mod artifact;
pub mod plan;

use crate::{
    config::{AliasTable, Settings, TargetDefinition},
    syscall::ToolInvocationError,
};

use std::path::PathBuf;
use tracing::{debug, instrument};

/// Values that belong to one run rather than to the settings file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Build number handed over by the continuous integration server.
    pub build_number: Option<String>,
}

impl RunContext {
    /// Construct new run context.
    pub fn new(build_number: Option<String>) -> Self {
        Self { build_number }
    }
}

/// Fully resolved deployment target.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    /// Environment name the target was resolved from.
    pub name: String,

    /// Login name on the target host.
    pub user: String,

    /// Target host name.
    pub host: String,

    /// Destination directory on the target host.
    pub root: String,

    /// Target is provisioned through Aegir.
    pub uses_specialized_hosting: bool,

    /// Platform name template.
    pub hosting_platform_template: Option<String>,

    /// Aegir home directory on the target host.
    pub aegir_path: Option<String>,

    /// Aegir web server context.
    pub aegir_destsrv: Option<String>,
}

impl DeploymentTarget {
    /// Login destination for ssh, i.e., "user@host".
    pub fn ssh_destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Check if target definition describes an Aegir managed host.
///
/// The marker must be present and true. A missing marker means a plain web
/// server.
pub fn is_specialized_hosting(definition: &TargetDefinition) -> bool {
    definition.aegir == Some(true)
}

/// Resolve environment names to deployment targets.
#[derive(Debug, Clone)]
pub struct Resolver {
    project_name: String,
    aliases: AliasTable,
    context: RunContext,
}

impl Resolver {
    /// Construct new resolver from loaded settings.
    pub fn new(settings: &Settings, context: RunContext) -> Self {
        Self {
            project_name: settings.project.name.clone(),
            aliases: settings.aliases.clone(),
            context,
        }
    }

    /// Resolve environment name to its target.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError::UnknownEnvironment`] if the environment is not
    ///   in the alias table.
    #[instrument(skip(self), level = "debug")]
    pub fn resolve(&self, environment: &str) -> Result<DeploymentTarget> {
        let definition = self
            .aliases
            .get(environment)
            .ok_or_else(|| DeployError::UnknownEnvironment(environment.to_string()))?;

        Ok(DeploymentTarget {
            name: environment.to_string(),
            user: definition.user.clone(),
            host: definition.host.clone(),
            root: definition.root.clone(),
            uses_specialized_hosting: is_specialized_hosting(definition),
            hosting_platform_template: definition.aegir_platform.clone(),
            aegir_path: definition.aegir_path.clone(),
            aegir_destsrv: definition.aegir_destsrv.clone(),
        })
    }

    /// Interpolated platform name of an environment's target.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError::UnknownEnvironment`] if the environment is not
    ///   in the alias table.
    /// - Return [`DeployError::MissingPlatformTemplate`] if the target has no
    ///   platform template.
    /// - Return [`DeployError::MissingBuildNumber`] if the run has no build
    ///   number.
    /// - Return [`DeployError::UnknownPlaceholder`] or
    ///   [`DeployError::UnbalancedBrace`] if the template is malformed.
    pub fn platform_name(&self, environment: &str) -> Result<String> {
        let target = self.resolve(environment)?;
        self.platform_name_of(&target)
    }

    /// Final directory to deploy to on an environment's target.
    ///
    /// Aegir targets get the platform name appended to their root verbatim,
    /// so a root meant as a parent directory needs its trailing slash. Other
    /// targets deploy into their root as is.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError`] under the same conditions as
    ///   [`Resolver::platform_name`], for Aegir targets only.
    #[instrument(skip(self), level = "debug")]
    pub fn target_directory(&self, environment: &str) -> Result<String> {
        let target = self.resolve(environment)?;
        self.target_directory_of(&target)
    }

    /// Rsync destination of an environment, i.e., "user@host:directory".
    ///
    /// # Errors
    ///
    /// - Return [`DeployError`] under the same conditions as
    ///   [`Resolver::target_directory`].
    pub fn rsync_destination(&self, environment: &str) -> Result<String> {
        let target = self.resolve(environment)?;
        let directory = self.target_directory_of(&target)?;

        Ok(format!("{}:{}", target.ssh_destination(), directory))
    }

    pub(crate) fn target_directory_of(&self, target: &DeploymentTarget) -> Result<String> {
        if !target.uses_specialized_hosting {
            return Ok(target.root.clone());
        }

        let platform = self.platform_name_of(target)?;
        debug!("aegir platform of {:?} is {platform:?}", target.name);

        Ok(format!("{}{}", target.root, platform))
    }

    pub(crate) fn platform_name_of(&self, target: &DeploymentTarget) -> Result<String> {
        let template = target
            .hosting_platform_template
            .as_deref()
            .ok_or_else(|| DeployError::MissingPlatformTemplate(target.name.clone()))?;
        let build = self
            .context
            .build_number
            .as_deref()
            .ok_or(DeployError::MissingBuildNumber)?;

        interpolate(template, |key| match key {
            "name" => Some(self.project_name.as_str()),
            "env" => Some(target.name.as_str()),
            "build" => Some(build),
            _ => None,
        })
    }
}

/// Replace `{key}` placeholders in `template` through `lookup`.
fn interpolate<'a>(template: &str, lookup: impl Fn(&str) -> Option<&'a str>) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                output.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                output.push('}');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(next) => key.push(next),
                        None => return Err(DeployError::UnbalancedBrace(template.to_string())),
                    }
                }

                let value = lookup(key.as_str()).ok_or(DeployError::UnknownPlaceholder(key))?;
                output.push_str(value);
            }
            '}' => return Err(DeployError::UnbalancedBrace(template.to_string())),
            other => output.push(other),
        }
    }

    Ok(output)
}

/// Deployment error types.
///
/// None of these are retryable. Each one names the environment, key, or path
/// that needs fixing before a deployment can go ahead.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Environment missing from alias table.
    #[error("environment {0:?} could not be found in the aliases definition")]
    UnknownEnvironment(String),

    /// Aegir target without platform template.
    #[error(
        "aegir needs a unique platform name for environment {0:?}, check its aegir_platform key"
    )]
    MissingPlatformTemplate(String),

    /// Aegir target without build number for this run.
    #[error("no build number given, pass --build or set BUILD_NUMBER")]
    MissingBuildNumber,

    /// Platform template names an unsupported placeholder.
    #[error("unknown placeholder {{{0}}} in platform template, use {{name}}, {{env}}, or {{build}}")]
    UnknownPlaceholder(String),

    /// Platform template has a stray brace.
    #[error("unbalanced brace in platform template {0:?}")]
    UnbalancedBrace(String),

    /// Aegir target lacks a key needed for provisioning.
    #[error("environment {environment:?} needs the {key} key to provision aegir platforms")]
    MissingTargetKey {
        environment: String,
        key: &'static str,
    },

    /// Build directory holds no release archive.
    #[error("no tarball found in {0:?}")]
    NoArchive(PathBuf),

    /// Build directory holds more than one release archive.
    #[error("more than one tarball found in {dir:?}, cannot decide which one to deploy: {candidates:?}")]
    AmbiguousArchive {
        dir: PathBuf,
        candidates: Vec<String>,
    },

    /// Unpacked release archive holds no site.
    #[error("release archive {archive:?} holds no site, {missing:?} is missing")]
    BrokenRelease { archive: PathBuf, missing: PathBuf },

    /// Archive lookup pattern is not valid.
    #[error(transparent)]
    InvalidArchiveGlob(#[from] glob::PatternError),

    /// Deployment command is missing or fails.
    #[error(transparent)]
    CommandFailed(#[from] ToolInvocationError),
}

/// Friendly result alias :3
type Result<T, E = DeployError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectSettings;
    use simple_test_case::test_case;

    fn settings() -> Settings {
        Settings {
            project: ProjectSettings {
                name: "acme".into(),
            },
            aliases: AliasTable::new([
                (
                    "prod",
                    TargetDefinition {
                        user: "aegir".into(),
                        host: "prod.acme.org".into(),
                        root: "/var/aegir/platforms/".into(),
                        aegir: Some(true),
                        aegir_platform: Some("{name}-{env}-{build}".into()),
                        aegir_path: Some("/var/aegir".into()),
                        aegir_destsrv: Some("server_master".into()),
                    },
                ),
                (
                    "staging",
                    TargetDefinition {
                        user: "deploy".into(),
                        host: "staging.acme.org".into(),
                        root: "/var/www/acme".into(),
                        ..Default::default()
                    },
                ),
                (
                    "legacy",
                    TargetDefinition {
                        user: "deploy".into(),
                        host: "legacy.acme.org".into(),
                        root: "/var/www/legacy".into(),
                        aegir: Some(false),
                        aegir_platform: Some("{name}-{env}-{build}".into()),
                        ..Default::default()
                    },
                ),
                (
                    "dev",
                    TargetDefinition {
                        user: "aegir".into(),
                        host: "dev.acme.org".into(),
                        root: "/var/aegir/platforms/".into(),
                        aegir: Some(true),
                        ..Default::default()
                    },
                ),
            ]),
            ..Default::default()
        }
    }

    fn resolver(build: Option<&str>) -> Resolver {
        Resolver::new(&settings(), RunContext::new(build.map(ToString::to_string)))
    }

    #[test]
    fn aegir_target_gets_platform_appended() -> anyhow::Result<()> {
        let result = resolver(Some("42")).target_directory("prod")?;
        assert_eq!(result, "/var/aegir/platforms/acme-prod-42");

        Ok(())
    }

    #[test]
    fn plain_target_keeps_root() -> anyhow::Result<()> {
        let result = resolver(None).target_directory("staging")?;
        assert_eq!(result, "/var/www/acme");

        Ok(())
    }

    #[test]
    fn false_marker_is_plain_target() -> anyhow::Result<()> {
        let result = resolver(None).target_directory("legacy")?;
        assert_eq!(result, "/var/www/legacy");

        Ok(())
    }

    #[test]
    fn unknown_environment_is_fatal() {
        let result = resolver(Some("42")).resolve("nonexistent");
        assert!(matches!(result, Err(DeployError::UnknownEnvironment(env)) if env == "nonexistent"));
    }

    #[test]
    fn aegir_target_needs_template() {
        let result = resolver(Some("42")).target_directory("dev");
        assert!(matches!(result, Err(DeployError::MissingPlatformTemplate(env)) if env == "dev"));
    }

    #[test]
    fn aegir_target_needs_build_number() {
        let result = resolver(None).target_directory("prod");
        assert!(matches!(result, Err(DeployError::MissingBuildNumber)));
    }

    #[test]
    fn resolve_copies_definition() -> anyhow::Result<()> {
        let result = resolver(None).resolve("prod")?;
        let expect = DeploymentTarget {
            name: "prod".into(),
            user: "aegir".into(),
            host: "prod.acme.org".into(),
            root: "/var/aegir/platforms/".into(),
            uses_specialized_hosting: true,
            hosting_platform_template: Some("{name}-{env}-{build}".into()),
            aegir_path: Some("/var/aegir".into()),
            aegir_destsrv: Some("server_master".into()),
        };

        assert_eq!(result, expect);
        assert_eq!(result.ssh_destination(), "aegir@prod.acme.org");

        Ok(())
    }

    #[test]
    fn rsync_destination_joins_host_and_directory() -> anyhow::Result<()> {
        let resolver = resolver(Some("7"));
        assert_eq!(
            resolver.rsync_destination("prod")?,
            "aegir@prod.acme.org:/var/aegir/platforms/acme-prod-7"
        );
        assert_eq!(
            resolver.rsync_destination("staging")?,
            "deploy@staging.acme.org:/var/www/acme"
        );

        Ok(())
    }

    #[test_case(None, false; "missing marker")]
    #[test_case(Some(false), false; "false marker")]
    #[test_case(Some(true), true; "true marker")]
    #[test]
    fn specialized_hosting_marker(marker: Option<bool>, expect: bool) {
        let definition = TargetDefinition {
            aegir: marker,
            ..Default::default()
        };

        assert_eq!(is_specialized_hosting(&definition), expect);
    }

    #[test_case("{name}-{env}-{build}", "acme-prod-42"; "all placeholders")]
    #[test_case("platform_{build}", "platform_42"; "build only")]
    #[test_case("{{{name}}}", "{acme}"; "escaped braces")]
    #[test_case("static", "static"; "no placeholders")]
    #[test]
    fn interpolate_template(template: &str, expect: &str) -> anyhow::Result<()> {
        let result = interpolate(template, |key| match key {
            "name" => Some("acme"),
            "env" => Some("prod"),
            "build" => Some("42"),
            _ => None,
        })?;
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn interpolate_rejects_unknown_placeholder() {
        let result = interpolate("{name}-{branch}", |key| (key == "name").then_some("acme"));
        assert!(matches!(result, Err(DeployError::UnknownPlaceholder(key)) if key == "branch"));
    }

    #[test_case("{name"; "unclosed")]
    #[test_case("name}"; "stray closing")]
    #[test]
    fn interpolate_rejects_unbalanced_braces(template: &str) {
        let result = interpolate(template, |_| Some("acme"));
        assert!(matches!(result, Err(DeployError::UnbalancedBrace(_))));
    }
}
