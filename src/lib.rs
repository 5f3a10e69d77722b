// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Pre-flight checks and deployment target resolution for site builds.
//!
//! Sitefab guards the destructive parts of a site build workflow. Before an
//! update runs, the [`workspace`] scanner walks every Git repository below the
//! workspace root and reports uncommitted files, branches missing from the
//! remote, and branches ahead of their remote counterpart. Before a push, the
//! [`deploy`] resolver maps a logical environment name like "dev" or "prod"
//! onto the host, user, and directory that the release should land in,
//! including the platform naming required by Aegir managed hosts.
//!
//! Both pieces read a single immutable [`Settings`] document loaded once at
//! start-up.

pub mod config;
pub mod deploy;
pub mod path;
pub mod prompt;
pub mod workspace;

pub(crate) mod syscall;

pub use config::{Settings, TargetDefinition};
pub use deploy::{DeploymentTarget, Resolver, RunContext};
pub use prompt::{AssumeDefault, Confirm, InquireConfirm};
pub use syscall::ToolInvocationError;
pub use workspace::{RepositoryRecord, ScanReport, Scanner};
