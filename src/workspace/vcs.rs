// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control collaborator.
//!
//! The scanner never touches repository internals itself. It asks a
//! [`VersionControl`] implementation for raw, line-oriented listings and hands
//! them to the [`parse`](crate::workspace::parse) module.

use crate::syscall::{syscall_interactive, syscall_non_interactive, ToolInvocationError};

use std::{ffi::OsString, path::Path};
use tracing::instrument;

/// Line-oriented queries and updates against a repository.
pub trait VersionControl {
    /// Names of configured remotes, in the order the tool lists them.
    fn remotes(&self, repo: &Path) -> Result<Vec<String>>;

    /// Working tree status in short form, one line per file.
    fn status_lines(&self, repo: &Path) -> Result<Vec<String>>;

    /// Local branches with verbose tracking information, one line per
    /// branch.
    fn branch_lines(&self, repo: &Path) -> Result<Vec<String>>;

    /// Check if `remote` carries a branch named `branch`.
    fn remote_branch_exists(&self, repo: &Path, remote: &str, branch: &str) -> Result<bool>;

    /// Push `branch` to `remote`, optionally recording it as upstream.
    fn push(&self, repo: &Path, remote: &str, branch: &str, set_upstream: bool) -> Result<()>;
}

/// Version control through the Git binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCli;

impl GitCli {
    fn gitcall_non_interactive(
        &self,
        repo: &Path,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Result<Vec<String>> {
        let output = syscall_non_interactive("git", expand_bin_args(repo, args))?;
        Ok(output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(ToString::to_string)
            .collect())
    }
}

impl VersionControl for GitCli {
    #[instrument(skip(self), level = "debug")]
    fn remotes(&self, repo: &Path) -> Result<Vec<String>> {
        self.gitcall_non_interactive(repo, ["remote"])
    }

    #[instrument(skip(self), level = "debug")]
    fn status_lines(&self, repo: &Path) -> Result<Vec<String>> {
        self.gitcall_non_interactive(repo, ["status", "-s"])
    }

    #[instrument(skip(self), level = "debug")]
    fn branch_lines(&self, repo: &Path) -> Result<Vec<String>> {
        self.gitcall_non_interactive(repo, ["branch", "--list", "-vv"])
    }

    #[instrument(skip(self), level = "debug")]
    fn remote_branch_exists(&self, repo: &Path, remote: &str, branch: &str) -> Result<bool> {
        let pattern = format!("{remote}/{branch}");
        let lines =
            self.gitcall_non_interactive(repo, ["branch", "--list", "--remote", pattern.as_str()])?;

        Ok(!lines.is_empty())
    }

    #[instrument(skip(self), level = "debug")]
    fn push(&self, repo: &Path, remote: &str, branch: &str, set_upstream: bool) -> Result<()> {
        let mut args: Vec<OsString> = vec!["push".into()];
        if set_upstream {
            args.push("--set-upstream".into());
        }
        args.push(remote.into());
        args.push(branch.into());

        syscall_interactive("git", expand_bin_args(repo, args))
    }
}

fn expand_bin_args(
    repo: &Path,
    args: impl IntoIterator<Item = impl Into<OsString>>,
) -> Vec<OsString> {
    let mut bin_args: Vec<OsString> = vec!["-C".into(), repo.as_os_str().to_owned()];
    bin_args.extend(args.into_iter().map(Into::into));

    bin_args
}

/// Friendly result alias :3
type Result<T, E = ToolInvocationError> = std::result::Result<T, E>;
