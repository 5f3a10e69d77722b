// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process invocation.

use std::{
    ffi::OsStr,
    process::{Command, Stdio},
};
use tracing::debug;

/// Run command with inherited standard streams.
///
/// Blocks until the command exits. Used for anything that may need to talk
/// to the user, e.g., a push asking for credentials.
pub(crate) fn syscall_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<()> {
    let mut command = Command::new(cmd.as_ref());
    command.args(args);

    let rendered = render(&command);
    debug!("run {rendered}");
    let status = command
        .spawn()
        .and_then(|mut child| child.wait())
        .map_err(|source| ToolInvocationError::Spawn {
            command: rendered.clone(),
            source,
        })?;

    if !status.success() {
        return Err(ToolInvocationError::Failed {
            command: rendered,
            message: format!("exited with {status}"),
        });
    }

    Ok(())
}

/// Run command and capture its standard output.
///
/// Standard error is only kept to explain a failure.
pub(crate) fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let mut command = Command::new(cmd.as_ref());
    command.args(args).stdin(Stdio::null());

    let rendered = render(&command);
    debug!("run {rendered}");
    let output = command
        .output()
        .map_err(|source| ToolInvocationError::Spawn {
            command: rendered.clone(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(output.stderr.as_slice());
        return Err(ToolInvocationError::Failed {
            command: rendered,
            message: chomp(&stderr).to_string(),
        });
    }

    Ok(chomp(&stdout).to_string())
}

// INVARIANT: Only trailing newlines go, leading whitespace is significant.
fn chomp(text: &str) -> &str {
    text.trim_end_matches(['\r', '\n'])
}

fn render(command: &Command) -> String {
    let mut rendered = command.get_program().to_string_lossy().into_owned();
    for arg in command.get_args() {
        rendered.push(' ');
        rendered.push_str(arg.to_string_lossy().as_ref());
    }

    rendered
}

/// External tool is missing or failed.
#[derive(Debug, thiserror::Error)]
pub enum ToolInvocationError {
    /// Tool could not be started at all, most likely because it is not
    /// installed.
    #[error("cannot run {command:?}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// Tool ran but exited with failure.
    #[error("command {command:?} failed:\n{message}")]
    Failed { command: String, message: String },
}

/// Friendly result alias :3
type Result<T, E = ToolInvocationError> = std::result::Result<T, E>;
