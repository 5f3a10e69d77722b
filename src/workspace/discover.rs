// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository discovery.
//!
//! A workspace is any directory tree. Every directory below it that holds a
//! `.git` entry is a repository, no matter how deep it sits. Build and runtime
//! output, e.g., the volumes of a local container stack, can carry their own
//! checkouts, so directories listed for pruning are never descended into.

use ignore::{DirEntry, WalkBuilder};
use std::{
    fs::canonicalize,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// Find every repository below `root`.
///
/// Repositories are returned as absolute working directory paths, in
/// file name order of the walk.
///
/// # Errors
///
/// - Return [`DiscoverError::UnreadableRoot`] if `root` is not a readable
///   directory.
#[instrument(skip(prune), level = "debug")]
pub fn discover_repositories(root: &Path, prune: &[String]) -> Result<Vec<PathBuf>> {
    let root = canonicalize(root).map_err(|source| DiscoverError::UnreadableRoot {
        path: root.to_path_buf(),
        source,
    })?;
    if let Err(source) = root.read_dir() {
        return Err(DiscoverError::UnreadableRoot { path: root, source });
    }

    let prune = prune.to_vec();
    let walker = WalkBuilder::new(&root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|left, right| left.cmp(right))
        .filter_entry(move |entry| should_visit(entry, &prune))
        .build();

    let mut repositories = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!("skip unreadable entry: {error}");
                continue;
            }
        };

        if entry.depth() == 0 || entry.file_name() != ".git" {
            continue;
        }

        if let Some(repository) = entry.path().parent() {
            debug!("found repository {}", repository.display());
            repositories.push(repository.to_path_buf());
        }
    }

    Ok(repositories)
}

fn should_visit(entry: &DirEntry, prune: &[String]) -> bool {
    if entry.depth() == 0 {
        return true;
    }

    // INVARIANT: Never look inside Git metadata, only at the entry itself.
    if entry
        .path()
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|name| name == ".git")
    {
        return false;
    }

    let is_dir = entry.file_type().is_some_and(|kind| kind.is_dir());
    !(is_dir
        && prune
            .iter()
            .any(|name| entry.file_name() == name.as_str()))
}

/// Discovery error types.
#[derive(Debug, thiserror::Error)]
pub enum DiscoverError {
    /// Workspace root cannot be read.
    #[error("cannot read workspace root {path:?}: {source}")]
    UnreadableRoot {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Friendly result alias :3
type Result<T, E = DiscoverError> = std::result::Result<T, E>;
