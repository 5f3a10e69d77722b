// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Workspace cleanliness checks.
//!
//! A __workspace__ is the directory holding every repository of a site
//! project: the site itself, its installation profile, custom themes, and
//! sitefab's own checkout. Updating a site wipes and rebuilds large parts of
//! that tree, so any work that only exists locally is at risk. The scanner
//! looks for such work before anything destructive happens.
//!
//! # What Counts as Dirty
//!
//! For each repository, in discovery order, the scanner reports:
//!
//! 1. Files with uncommitted changes against the current commit.
//! 2. Named branches that do not exist on the repository's remote.
//! 3. Named branches whose history is ahead of their remote counterpart.
//!
//! Every finding adds one warning to the repository's total. The workspace is
//! dirty if any repository ends up with at least one warning.
//!
//! Only the first remote listed by Git is consulted. A repository without any
//! remote yields no branch findings at all, and detached checkouts never
//! yield branch findings since they have no name to act on.
//!
//! # Offers to Push
//!
//! When branches are missing from the remote, or ahead of it, the scanner asks
//! through its [`Confirm`] capability whether to push them. An accepted offer
//! pushes every branch of that kind, and their warnings no longer count
//! against the repository. Unattended runs use
//! [`AssumeDefault`](crate::prompt::AssumeDefault) so nothing is ever pushed
//! without a person saying so.

pub mod discover;
pub mod parse;
pub mod vcs;

use crate::{
    config::WorkspaceSettings,
    prompt::{Confirm, PromptError},
    syscall::ToolInvocationError,
    workspace::{
        discover::{discover_repositories, DiscoverError},
        parse::{parse_branch_line, parse_file_status, BranchStatus, FileStatus},
        vcs::{GitCli, VersionControl},
    },
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Problem found in a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// File with uncommitted changes.
    DirtyFile(FileStatus),

    /// Local branch unknown to the remote.
    MissingOnRemote { branch: String, remote: String },

    /// Local branch with commits the remote does not have.
    AheadOfRemote { branch: String, remote: String },
}

impl Display for Finding {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::DirtyFile(status) => write!(fmt, "File {:?} {}.", status.path, status.state),
            Self::MissingOnRemote { branch, remote } => {
                write!(fmt, "Local branch {branch:?} is not present on {remote:?} remote.")
            }
            Self::AheadOfRemote { branch, remote } => {
                write!(fmt, "Local branch {branch:?} is ahead of {remote:?} remote branch.")
            }
        }
    }
}

/// Result of checking one repository.
///
/// # Invariant
///
/// - `warning_count` equals the number of findings, minus the branch
///   findings resolved by an accepted push offer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepositoryRecord {
    /// Absolute path of the working directory.
    pub path: PathBuf,

    /// First configured remote, if any.
    pub remote_name: Option<String>,

    /// Local branches, detached entries included.
    pub local_branches: Vec<BranchStatus>,

    /// Full working tree status listing.
    pub file_statuses: Vec<FileStatus>,

    /// Everything reported for this repository, in report order.
    pub findings: Vec<Finding>,

    /// Branches pushed after an accepted offer.
    pub pushed_branches: Vec<String>,

    /// Warnings still standing against this repository.
    pub warning_count: usize,
}

impl RepositoryRecord {
    /// Check if repository produced any standing warning.
    pub fn is_dirty(&self) -> bool {
        self.warning_count > 0
    }
}

/// Result of scanning a whole workspace.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Checked repositories in discovery order.
    pub repositories: Vec<RepositoryRecord>,
}

impl ScanReport {
    /// Sum of standing warnings across all repositories.
    pub fn warning_count(&self) -> usize {
        self.repositories
            .iter()
            .map(|record| record.warning_count)
            .sum()
    }

    /// Check if the workspace is dirty.
    pub fn is_dirty(&self) -> bool {
        self.warning_count() > 0
    }
}

/// Workspace scanner.
///
/// Owns its settings, its version control collaborator, and its confirmation
/// capability. Holds no state between scans.
pub struct Scanner<V = GitCli, C = Box<dyn Confirm>>
where
    V: VersionControl,
    C: Confirm,
{
    settings: WorkspaceSettings,
    vcs: V,
    confirm: C,
}

impl<V, C> Scanner<V, C>
where
    V: VersionControl,
    C: Confirm,
{
    /// Construct new scanner.
    pub fn new(settings: WorkspaceSettings, vcs: V, confirm: C) -> Self {
        Self {
            settings,
            vcs,
            confirm,
        }
    }

    /// Check if workspace at `root` is dirty.
    ///
    /// # Errors
    ///
    /// - Return [`ScanError`] under the same conditions as
    ///   [`Scanner::scan_report`].
    pub fn scan(&self, root: impl AsRef<Path>) -> Result<bool> {
        let report = self.scan_report(root)?;
        if report.is_dirty() {
            warn!("Your workspace is not clean.");
        } else {
            info!("Your workspace is clean.");
        }

        Ok(report.is_dirty())
    }

    /// Check every repository below `root`, and collect the results.
    ///
    /// Repositories are checked one after the other. The first failing
    /// command aborts the whole scan, and nothing gathered so far is returned.
    ///
    /// # Errors
    ///
    /// - Return [`ScanError::Discover`] if `root` cannot be read.
    /// - Return [`ScanError::ToolInvocation`] if Git is missing or fails.
    /// - Return [`ScanError::Prompt`] if a push offer cannot be answered.
    #[instrument(skip(self, root), level = "debug")]
    pub fn scan_report(&self, root: impl AsRef<Path>) -> Result<ScanReport> {
        let repositories = discover_repositories(root.as_ref(), &self.settings.prune)?;
        let mut report = ScanReport::default();
        for path in repositories {
            report.repositories.push(self.check_repository(path)?);
        }

        Ok(report)
    }

    /// Check a single repository.
    ///
    /// # Errors
    ///
    /// - Return [`ScanError::ToolInvocation`] if Git is missing or fails.
    /// - Return [`ScanError::Prompt`] if a push offer cannot be answered.
    #[instrument(skip(self, path), level = "debug")]
    pub fn check_repository(&self, path: impl Into<PathBuf>) -> Result<RepositoryRecord> {
        let mut record = RepositoryRecord {
            path: path.into(),
            ..Default::default()
        };
        info!("---");
        info!("Verify repo in {}", record.path.display());

        record.remote_name = self.vcs.remotes(&record.path)?.into_iter().next();

        record.file_statuses = self
            .vcs
            .status_lines(&record.path)?
            .iter()
            .filter_map(|line| parse_file_status(line))
            .collect();
        info!("Verify local files status against current HEAD commit...");
        let dirty = self.dirty_files(&record.file_statuses);
        record.warning_count += dirty.len();
        record.findings.extend(dirty);

        record.local_branches = self
            .vcs
            .branch_lines(&record.path)?
            .iter()
            .filter_map(|line| parse_branch_line(line))
            .collect();

        let Some(remote) = record.remote_name.clone() else {
            info!("No remote configured, skip branch checks");
            return Ok(record);
        };

        for branch in record.local_branches.iter_mut() {
            if let Some(name) = branch.name.as_deref() {
                branch.exists_on_remote =
                    self.vcs.remote_branch_exists(&record.path, &remote, name)?;
            }
        }

        info!("Verify local branches exist on remote {remote:?}...");
        let missing: Vec<String> = named(&record.local_branches)
            .filter(|branch| !branch.exists_on_remote)
            .filter_map(|branch| branch.name.clone())
            .collect();
        let findings = missing.iter().map(|branch| Finding::MissingOnRemote {
            branch: branch.clone(),
            remote: remote.clone(),
        });
        self.evaluate_branches(
            &mut record,
            findings.collect(),
            &missing,
            "There are local branches not present on remote. Do you want to sync these?",
            true,
        )?;

        info!("Verify branches status against remote...");
        let ahead: Vec<String> = named(&record.local_branches)
            .filter(|branch| branch.is_ahead_of_remote)
            .filter_map(|branch| branch.name.clone())
            .collect();
        let findings = ahead.iter().map(|branch| Finding::AheadOfRemote {
            branch: branch.clone(),
            remote: remote.clone(),
        });
        self.evaluate_branches(
            &mut record,
            findings.collect(),
            &ahead,
            "There are local branches ahead of remote branch. Do you want to sync these?",
            false,
        )?;

        Ok(record)
    }

    // INVARIANT: Stop at sitefab's own directory, whatever comes after it.
    fn dirty_files(&self, statuses: &[FileStatus]) -> Vec<Finding> {
        let mut findings = Vec::new();
        for status in statuses {
            if status.path == self.settings.tool_dir {
                break;
            }

            let finding = Finding::DirtyFile(status.clone());
            warn!("{finding}");
            findings.push(finding);
        }

        findings
    }

    fn evaluate_branches(
        &self,
        record: &mut RepositoryRecord,
        findings: Vec<Finding>,
        branches: &[String],
        question: &str,
        set_upstream: bool,
    ) -> Result<()> {
        if findings.is_empty() {
            return Ok(());
        }

        for finding in &findings {
            warn!("{finding}");
        }

        let remote = record.remote_name.clone().unwrap_or_default();
        if self.confirm.confirm(question, false)? {
            for branch in branches {
                info!("Push {branch:?} to {remote:?}");
                self.vcs.push(&record.path, &remote, branch, set_upstream)?;
                record.pushed_branches.push(branch.clone());
            }
        } else {
            record.warning_count += findings.len();
        }
        record.findings.extend(findings);

        Ok(())
    }
}

fn named(branches: &[BranchStatus]) -> impl Iterator<Item = &BranchStatus> {
    branches.iter().filter(|branch| branch.name.is_some())
}

/// Workspace scan error types.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Repository discovery fails.
    #[error(transparent)]
    Discover(#[from] DiscoverError),

    /// Version control tool is missing or fails.
    #[error(transparent)]
    ToolInvocation(#[from] ToolInvocationError),

    /// Confirmation prompt fails.
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Friendly result alias :3
type Result<T, E = ScanError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{prompt::AssumeDefault, workspace::parse::FileState};
    use pretty_assertions::assert_eq;
    use std::{
        cell::RefCell,
        collections::{HashMap, HashSet},
    };

    #[derive(Debug, Default)]
    struct FakeRepository {
        remotes: Vec<String>,
        status: Vec<String>,
        branches: Vec<String>,
        remote_branches: HashSet<String>,
    }

    #[derive(Debug, Default)]
    struct FakeVcs {
        repositories: HashMap<PathBuf, FakeRepository>,
        pushes: RefCell<Vec<(String, String, bool)>>,
        broken: bool,
    }

    impl FakeVcs {
        fn with(path: &str, repository: FakeRepository) -> Self {
            let mut vcs = Self::default();
            vcs.repositories.insert(PathBuf::from(path), repository);
            vcs
        }

        fn repository(&self, repo: &Path) -> std::result::Result<&FakeRepository, ToolInvocationError> {
            if self.broken {
                return Err(ToolInvocationError::Failed {
                    command: "git status -s".into(),
                    message: "fatal: not a git repository".into(),
                });
            }

            Ok(&self.repositories[repo])
        }
    }

    impl VersionControl for FakeVcs {
        fn remotes(&self, repo: &Path) -> std::result::Result<Vec<String>, ToolInvocationError> {
            Ok(self.repository(repo)?.remotes.clone())
        }

        fn status_lines(&self, repo: &Path) -> std::result::Result<Vec<String>, ToolInvocationError> {
            Ok(self.repository(repo)?.status.clone())
        }

        fn branch_lines(&self, repo: &Path) -> std::result::Result<Vec<String>, ToolInvocationError> {
            Ok(self.repository(repo)?.branches.clone())
        }

        fn remote_branch_exists(
            &self,
            repo: &Path,
            remote: &str,
            branch: &str,
        ) -> std::result::Result<bool, ToolInvocationError> {
            Ok(self
                .repository(repo)?
                .remote_branches
                .contains(&format!("{remote}/{branch}")))
        }

        fn push(
            &self,
            _repo: &Path,
            remote: &str,
            branch: &str,
            set_upstream: bool,
        ) -> std::result::Result<(), ToolInvocationError> {
            self.pushes
                .borrow_mut()
                .push((remote.into(), branch.into(), set_upstream));
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct ScriptedConfirm {
        answers: RefCell<Vec<bool>>,
        questions: RefCell<Vec<String>>,
    }

    impl ScriptedConfirm {
        fn answering(answers: impl IntoIterator<Item = bool>) -> Self {
            let mut answers = answers.into_iter().collect::<Vec<_>>();
            answers.reverse();
            Self {
                answers: RefCell::new(answers),
                questions: RefCell::default(),
            }
        }
    }

    impl Confirm for ScriptedConfirm {
        fn confirm(&self, message: &str, default: bool) -> std::result::Result<bool, PromptError> {
            self.questions.borrow_mut().push(message.into());
            Ok(self.answers.borrow_mut().pop().unwrap_or(default))
        }
    }

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    fn scanner<C: Confirm>(vcs: FakeVcs, confirm: C) -> Scanner<FakeVcs, C> {
        Scanner::new(WorkspaceSettings::default(), vcs, confirm)
    }

    #[test]
    fn dirty_files_are_reported_in_order() -> anyhow::Result<()> {
        let vcs = FakeVcs::with(
            "/ws/site",
            FakeRepository {
                status: lines(&["M  foo.txt", "?? bar.txt", "D  baz.txt"]),
                ..Default::default()
            },
        );
        let record = scanner(vcs, AssumeDefault::new(false)).check_repository("/ws/site")?;

        let states = record
            .findings
            .iter()
            .map(|finding| match finding {
                Finding::DirtyFile(status) => status.state.clone(),
                other => panic!("unexpected finding {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(
            states,
            vec![FileState::Modified, FileState::Untracked, FileState::Deleted]
        );
        assert_eq!(record.warning_count, 3);

        Ok(())
    }

    #[test]
    fn file_evaluation_stops_at_tool_dir() -> anyhow::Result<()> {
        let vcs = FakeVcs::with(
            "/ws/site",
            FakeRepository {
                status: lines(&["M  foo.txt", " M fabfile", "?? bar.txt", "D  baz.txt"]),
                ..Default::default()
            },
        );
        let record = scanner(vcs, AssumeDefault::new(false)).check_repository("/ws/site")?;

        assert_eq!(record.file_statuses.len(), 4);
        assert_eq!(
            record.findings,
            vec![Finding::DirtyFile(FileStatus {
                path: "foo.txt".into(),
                state: FileState::Modified,
            })]
        );
        assert_eq!(record.warning_count, 1);

        Ok(())
    }

    #[test]
    fn tool_dir_first_hides_everything() -> anyhow::Result<()> {
        let vcs = FakeVcs::with(
            "/ws/site",
            FakeRepository {
                status: lines(&[" M fabfile", "M  foo.txt", "?? bar.txt"]),
                ..Default::default()
            },
        );
        let record = scanner(vcs, AssumeDefault::new(false)).check_repository("/ws/site")?;

        assert!(record.findings.is_empty());
        assert!(!record.is_dirty());

        Ok(())
    }

    #[test]
    fn no_remote_means_no_branch_findings() -> anyhow::Result<()> {
        let vcs = FakeVcs::with(
            "/ws/site",
            FakeRepository {
                branches: lines(&[
                    "* main 1a2b3c4 [ahead 2] Fix cron",
                    "  feature 5d6e7f8 Add theme",
                ]),
                ..Default::default()
            },
        );
        let confirm = ScriptedConfirm::default();
        let record = scanner(vcs, &confirm).check_repository("/ws/site")?;

        assert_eq!(record.remote_name, None);
        assert_eq!(record.local_branches.len(), 2);
        assert!(record.findings.is_empty());
        assert_eq!(record.warning_count, 0);
        assert!(confirm.questions.borrow().is_empty());

        Ok(())
    }

    #[test]
    fn detached_entries_never_fire() -> anyhow::Result<()> {
        let vcs = FakeVcs::with(
            "/ws/site",
            FakeRepository {
                remotes: lines(&["origin"]),
                branches: lines(&["* (HEAD detached at 1a2b3c4) 1a2b3c4 [ahead 1] Fix cron"]),
                ..Default::default()
            },
        );
        let record = scanner(vcs, AssumeDefault::new(false)).check_repository("/ws/site")?;

        assert_eq!(record.local_branches[0].name, None);
        assert!(record.findings.is_empty());
        assert_eq!(record.warning_count, 0);

        Ok(())
    }

    #[test]
    fn branch_can_be_missing_and_ahead() -> anyhow::Result<()> {
        let vcs = FakeVcs::with(
            "/ws/site",
            FakeRepository {
                remotes: lines(&["origin", "upstream"]),
                branches: lines(&[
                    "* main 1a2b3c4 [origin/main: ahead 2] Fix cron",
                    "  feature 5d6e7f8 [gone: en avance de 3] Ajoute theme",
                    "  synced 9a8b7c6 [origin/synced] Done",
                ]),
                remote_branches: HashSet::from([
                    "origin/main".into(),
                    "origin/synced".into(),
                    "upstream/feature".into(),
                ]),
                ..Default::default()
            },
        );
        let record = scanner(vcs, AssumeDefault::new(false)).check_repository("/ws/site")?;

        let expect = vec![
            Finding::MissingOnRemote {
                branch: "feature".into(),
                remote: "origin".into(),
            },
            Finding::AheadOfRemote {
                branch: "main".into(),
                remote: "origin".into(),
            },
            Finding::AheadOfRemote {
                branch: "feature".into(),
                remote: "origin".into(),
            },
        ];
        assert_eq!(record.remote_name.as_deref(), Some("origin"));
        assert_eq!(record.findings, expect);
        assert_eq!(record.warning_count, 3);
        assert!(record.pushed_branches.is_empty());

        Ok(())
    }

    #[test]
    fn accepted_offer_clears_its_dimension() -> anyhow::Result<()> {
        let vcs = FakeVcs::with(
            "/ws/site",
            FakeRepository {
                remotes: lines(&["origin"]),
                status: lines(&["?? notes.txt"]),
                branches: lines(&[
                    "* main 1a2b3c4 [origin/main: ahead 2] Fix cron",
                    "  feature 5d6e7f8 Add theme",
                ]),
                remote_branches: HashSet::from(["origin/main".into()]),
            },
        );
        let confirm = ScriptedConfirm::answering([true, false]);
        let scanner = scanner(vcs, &confirm);
        let record = scanner.check_repository("/ws/site")?;

        assert_eq!(record.findings.len(), 3);
        assert_eq!(record.pushed_branches, vec!["feature".to_string()]);
        assert_eq!(record.warning_count, 2);
        assert_eq!(
            *scanner.vcs.pushes.borrow(),
            vec![("origin".to_string(), "feature".to_string(), true)]
        );
        assert_eq!(confirm.questions.borrow().len(), 2);

        Ok(())
    }

    #[test]
    fn ahead_offer_pushes_without_upstream() -> anyhow::Result<()> {
        let vcs = FakeVcs::with(
            "/ws/site",
            FakeRepository {
                remotes: lines(&["origin"]),
                branches: lines(&["* main 1a2b3c4 [origin/main: ahead 2] Fix cron"]),
                remote_branches: HashSet::from(["origin/main".into()]),
                ..Default::default()
            },
        );
        let scanner = scanner(vcs, ScriptedConfirm::answering([true]));
        let record = scanner.check_repository("/ws/site")?;

        assert_eq!(record.warning_count, 0);
        assert_eq!(
            *scanner.vcs.pushes.borrow(),
            vec![("origin".to_string(), "main".to_string(), false)]
        );

        Ok(())
    }

    #[test]
    fn unattended_run_never_pushes() -> anyhow::Result<()> {
        let vcs = FakeVcs::with(
            "/ws/site",
            FakeRepository {
                remotes: lines(&["origin"]),
                branches: lines(&["  feature 5d6e7f8 Add theme"]),
                ..Default::default()
            },
        );
        let scanner = scanner(vcs, AssumeDefault::new(false));
        let first = scanner.check_repository("/ws/site")?;
        let second = scanner.check_repository("/ws/site")?;

        assert!(scanner.vcs.pushes.borrow().is_empty());
        assert_eq!(first, second);
        assert_eq!(first.warning_count, 1);

        Ok(())
    }

    #[test]
    fn tool_failure_aborts_check() {
        let vcs = FakeVcs {
            broken: true,
            ..Default::default()
        };
        let result = scanner(vcs, AssumeDefault::new(false)).check_repository("/ws/site");

        assert!(matches!(result, Err(ScanError::ToolInvocation(_))));
    }

    #[test]
    fn report_sums_repositories() {
        let report = ScanReport {
            repositories: vec![
                RepositoryRecord {
                    warning_count: 2,
                    ..Default::default()
                },
                RepositoryRecord::default(),
                RepositoryRecord {
                    warning_count: 1,
                    ..Default::default()
                },
            ],
        };

        assert_eq!(report.warning_count(), 3);
        assert!(report.is_dirty());
        assert!(!ScanReport::default().is_dirty());
    }
}
