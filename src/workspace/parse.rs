// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control output parsing.
//!
//! Every assumption about the textual output of Git lives here. The scanner
//! only ever sees [`FileStatus`] and [`BranchStatus`] values, so a change in
//! output format touches this module alone.
//!
//! # Expected Formats
//!
//! File status lines come from `git status -s`, i.e., a status code followed
//! by a path:
//!
//! ```text
//!  M src/settings.php
//! ?? notes.txt
//! ```
//!
//! Paths with unusual characters are quoted by Git, e.g., `?? "my notes.txt"`,
//! and come back unquoted.
//!
//! Branch lines come from `git branch --list -vv`. The first column marks the
//! current branch with an asterisk, and branches checked out in another
//! worktree with a plus sign. Tracking information is given in brackets:
//!
//! ```text
//! * main    1a2b3c4 [origin/main: ahead 2] Fix cron
//! + hotfix  9f8e7d6 (/srv/acme-hotfix) [origin/hotfix] Fix mail
//!   feature 5d6e7f8 Add theme
//!   (HEAD detached at 1a2b3c4) 1a2b3c4 Fix cron
//! ```
//!
//! Git translates the tracking information, so "ahead" is matched by pattern
//! for every supported language instead of by exact text.

use regex::Regex;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    sync::LazyLock,
};

// INVARIANT: Match "ahead" marker inside tracking brackets only.
//   - English: "[origin/main: ahead 2]", "[ahead 2, behind 1]".
//   - French: "[origin/main : en avance de 3]".
static AHEAD_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?:[^\]]*\s)?(?:ahead|en avance de)\s[^\]]*\]").expect("valid ahead pattern")
});

static DETACHED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(.*\)").expect("valid detached pattern"));

/// State of a file in the working tree relative to the current commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    /// Uncommitted modifications.
    Modified,

    /// Tracked file removed from working tree.
    Deleted,

    /// File unknown to the index.
    Untracked,

    /// Any other status code, kept verbatim.
    Unknown(String),
}

impl FileState {
    fn from_code(code: &str) -> Self {
        match code {
            "M" => Self::Modified,
            "D" => Self::Deleted,
            "??" => Self::Untracked,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl Display for FileState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Modified => fmt.write_str("has uncommitted modifications"),
            Self::Deleted => fmt.write_str("has been deleted"),
            Self::Untracked => fmt.write_str("is not indexed"),
            Self::Unknown(code) => write!(fmt, "is in an unknown state ({code})"),
        }
    }
}

/// Status of a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    /// Path relative to the repository's top-level.
    pub path: String,

    /// State of file.
    pub state: FileState,
}

/// Parse one line of `git status -s` output.
///
/// Returns `None` for blank lines. A line that does not follow the expected
/// layout is never an error: it becomes [`FileState::Unknown`] holding
/// whatever code could be read.
pub fn parse_file_status(line: &str) -> Option<FileStatus> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (code, path) = match line.split_once(char::is_whitespace) {
        Some((code, path)) => (code, path.trim()),
        None => (line, ""),
    };

    let state = if path.is_empty() {
        FileState::Unknown(code.to_string())
    } else {
        FileState::from_code(code)
    };

    Some(FileStatus {
        path: unquote(path),
        state,
    })
}

// INVARIANT: Undo C-style quoting of `core.quotePath`.
//   - Octal escapes are raw bytes of a UTF-8 sequence.
//   - Anything not wrapped in double quotes is taken verbatim.
fn unquote(path: &str) -> String {
    let Some(inner) = path
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return path.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0; 4];
            bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('a') => bytes.push(0x07),
            Some('b') => bytes.push(0x08),
            Some('f') => bytes.push(0x0c),
            Some('r') => bytes.push(b'\r'),
            Some('v') => bytes.push(0x0b),
            Some(digit @ '0'..='7') => {
                let mut value = digit as u32 - '0' as u32;
                for _ in 0..2 {
                    let next = chars.clone().next();
                    match next.and_then(|next| next.to_digit(8)) {
                        Some(octal) => {
                            value = value * 8 + octal;
                            chars.next();
                        }
                        None => break,
                    }
                }
                bytes.push(value as u8);
            }
            Some(other) => {
                let mut buf = [0; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => bytes.push(b'\\'),
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

/// Tracking status of a local branch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BranchStatus {
    /// Branch name, or `None` if the entry is a detached checkout.
    pub name: Option<String>,

    /// Branch has local commits missing from its tracked remote branch.
    pub is_ahead_of_remote: bool,

    /// Branch of the same name exists on the repository's remote.
    ///
    /// Branch listing does not carry this information, so parsing leaves it
    /// unset until it is asked for.
    pub exists_on_remote: bool,
}

/// Parse one line of `git branch --list -vv` output.
///
/// Returns `None` for blank lines.
pub fn parse_branch_line(line: &str) -> Option<BranchStatus> {
    // INVARIANT: Only the marker column goes, never text of the entry itself.
    let entry = line.trim_start();
    let entry = entry.strip_prefix(['*', '+']).unwrap_or(entry).trim();
    if entry.is_empty() {
        return None;
    }

    Some(BranchStatus {
        name: branch_name(entry),
        is_ahead_of_remote: AHEAD_MARKER.is_match(entry),
        exists_on_remote: false,
    })
}

fn branch_name(entry: &str) -> Option<String> {
    if DETACHED_MARKER.is_match(entry) {
        return None;
    }

    entry.split_whitespace().next().map(ToString::to_string)
}
