// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Release artifact lookup.

use crate::deploy::{DeployError, Result};

use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Find the one release tarball in `dir`.
///
/// A release run leaves exactly one `*.tar.gz` archive in the build
/// directory. Anything else means the directory holds leftovers from an
/// earlier run, and there is no safe way to pick one.
///
/// # Errors
///
/// - Return [`DeployError::NoArchive`] if `dir` holds no tarball.
/// - Return [`DeployError::AmbiguousArchive`] if `dir` holds more than one.
/// - Return [`DeployError::InvalidArchiveGlob`] if `dir` cannot be turned
///   into a search pattern.
#[instrument(level = "debug")]
pub fn find_release_archive(dir: &Path) -> Result<PathBuf> {
    let pattern = format!(
        "{}/*.tar.gz",
        Pattern::escape(dir.to_string_lossy().as_ref())
    );
    let mut candidates = glob::glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    candidates.sort();
    debug!("release archive candidates: {candidates:?}");

    match candidates.len() {
        0 => Err(DeployError::NoArchive(dir.to_path_buf())),
        1 => Ok(candidates.remove(0)),
        _ => Err(DeployError::AmbiguousArchive {
            dir: dir.to_path_buf(),
            candidates: candidates
                .iter()
                .filter_map(|path| path.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect(),
        }),
    }
}
