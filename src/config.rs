// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the settings file that sitefab reads at start-up to
//! simplify the process of serialization and deserialization. The settings
//! are loaded exactly once, and then handed to the workspace scanner and the
//! deployment resolver by reference. Nothing mutates them afterwards.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Settings layout.
///
/// # General Layout
///
/// The settings are composed of three parts: the project itself, the
/// workspace that holds the project's repositories, and the alias table of
/// deployment targets. Each alias is keyed by its environment name.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Project identity.
    pub project: ProjectSettings,

    /// Workspace layout.
    #[serde(default)]
    pub workspace: WorkspaceSettings,

    /// Deployment targets by environment name.
    #[serde(rename = "alias", default, skip_serializing_if = "AliasTable::is_empty")]
    pub aliases: AliasTable,
}

impl Settings {
    /// Read and parse settings file at `path`.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if the file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if the file is not valid.
    /// - Return [`ConfigError::ShellExpansion`] if a path field references an
    ///   unset variable.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_to_string(path.as_ref())
            .map_err(|source| ConfigError::Read {
                path: path.as_ref().to_path_buf(),
                source,
            })?
            .parse()
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path-like field.
        settings.workspace.root = PathBuf::from(expand(
            settings.workspace.root.to_string_lossy().as_ref(),
        )?);
        for target in settings.aliases.0.values_mut() {
            target.root = expand(&target.root)?;
        }

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand(value: &str) -> Result<String> {
    Ok(shellexpand::full(value)
        .map_err(ConfigError::ShellExpansion)?
        .into_owned())
}

/// Project identity.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ProjectSettings {
    /// Short project name, interpolated as `{name}` in platform templates.
    pub name: String,
}

/// Workspace layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    /// Directory containing every repository of the project.
    pub root: PathBuf,

    /// Name of sitefab's own directory inside a repository.
    ///
    /// A file status listing is evaluated only up to this path, so the
    /// tooling never reports on its own working copy.
    pub tool_dir: String,

    /// Directory names never descended into during repository discovery.
    pub prune: Vec<String>,

    /// Directory holding release artifacts, relative to the root.
    pub build_dir: PathBuf,

    /// Directory of the built site, relative to the root.
    pub site_root: PathBuf,
}

impl WorkspaceSettings {
    /// Absolute path of the release artifact directory.
    pub fn build_path(&self) -> PathBuf {
        self.root.join(&self.build_dir)
    }

    /// Absolute path of the built site.
    pub fn site_path(&self) -> PathBuf {
        self.root.join(&self.site_root)
    }
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            tool_dir: "fabfile".into(),
            prune: vec!["docker-runtime".into()],
            build_dir: PathBuf::from("build"),
            site_root: PathBuf::from("src/drupal"),
        }
    }
}

/// Alias table of deployment targets.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AliasTable(BTreeMap<String, TargetDefinition>);

impl AliasTable {
    /// Construct new alias table.
    pub fn new(aliases: impl IntoIterator<Item = (impl Into<String>, TargetDefinition)>) -> Self {
        Self(
            aliases
                .into_iter()
                .map(|(name, target)| (name.into(), target))
                .collect(),
        )
    }

    /// Look up target definition by environment name.
    pub fn get(&self, environment: &str) -> Option<&TargetDefinition> {
        self.0.get(environment)
    }

    /// Check if no deployment target is defined.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Deployment target definition.
///
/// The `aegir*` keys only matter to targets provisioned through the Aegir
/// hosting system.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct TargetDefinition {
    /// Login name on the target host.
    pub user: String,

    /// Target host name.
    pub host: String,

    /// Destination directory on the target host.
    pub root: String,

    /// Marks target as an Aegir managed host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aegir: Option<bool>,

    /// Template of the platform name, e.g., "{name}-{env}-{build}".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aegir_platform: Option<String>,

    /// Aegir home directory on the target host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aegir_path: Option<String>,

    /// Aegir web server context that platforms are attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aegir_destsrv: Option<String>,
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read settings file.
    #[error("cannot read settings file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
