//! Versioned file operations with Git-based version control.
//!
//! Each clinical attention lives in its own directory, versioned as a local Git repository
//! (`git2`/libgit2). This module provides:
//!
//! - **Atomic writes**: write the episode file and commit it in a single transaction, restoring
//!   the previous contents if any step fails
//! - **Atomic creation**: initialise the repository and make the first commit, removing the
//!   directory if anything fails
//! - **Structured commit messages**: `attention:<action>: <summary>` followed by fixed trailers
//! - **History**: the commit log of an episode, newest first
//!
//! ## Branch Policy
//!
//! All episode repositories use `refs/heads/main`.
//!
//! ## Safety/Intent
//!
//! Commit messages are labels and indexes. Patient names, diagnoses and observation text never
//! appear in them; that content lives only in `ATTENTION.yaml`.

use crate::author::CommitAuthor;
use crate::error::{AttentionError, AttentionResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use ulr_types::NonEmptyText;

const MAIN_REF: &str = "refs/heads/main";
const SUBJECT_PREFIX: &str = "attention";

const ACTOR_ID_TRAILER: &str = "Actor-Id";
const ACTOR_ROLE_TRAILER: &str = "Actor-Role";
const CARE_LOCATION_TRAILER: &str = "Care-Location";

/// The operation recorded by a commit.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionAction {
    Create,
    Resident,
    Supervisor,
    Pertinence,
    Close,
}

impl AttentionAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Resident => "resident",
            Self::Supervisor => "supervisor",
            Self::Pertinence => "pertinence",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for AttentionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttentionAction {
    type Err = AttentionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "resident" => Ok(Self::Resident),
            "supervisor" => Ok(Self::Supervisor),
            "pertinence" => Ok(Self::Pertinence),
            "close" => Ok(Self::Close),
            other => Err(AttentionError::InvalidInput(format!(
                "unknown commit action: '{other}'"
            ))),
        }
    }
}

/// A single commit trailer line, rendered as `Key: Value`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct CommitTrailer {
    key: String,
    value: String,
}

impl CommitTrailer {
    pub(crate) fn new(key: impl Into<String>, value: impl Into<String>) -> AttentionResult<Self> {
        let key = key.into().trim().to_string();
        let value = value.into().trim().to_string();

        if key.is_empty()
            || key.contains(['\n', '\r'])
            || key.contains(':')
            || value.is_empty()
            || value.contains(['\n', '\r'])
        {
            return Err(AttentionError::InvalidInput(
                "commit trailer key/value must be non-empty and single-line (key cannot contain ':')".into()
            ));
        }

        Ok(Self { key, value })
    }
}

fn is_reserved_trailer_key(key: &str) -> bool {
    let key = key.trim();
    key.starts_with("Actor-") || key == CARE_LOCATION_TRAILER
}

/// A structured, predictable commit message.
///
/// Rendering rules:
///
/// - Subject line: `attention:<action>: <summary>`
/// - One blank line, then `Actor-Id`, `Actor-Role`, `Care-Location`
/// - Extra trailers follow, sorted by key then value
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct AttentionCommitMessage {
    action: AttentionAction,
    summary: NonEmptyText,
    care_location: NonEmptyText,
    trailers: Vec<CommitTrailer>,
}

impl AttentionCommitMessage {
    /// # Errors
    ///
    /// - [`AttentionError::InvalidInput`] if the summary is empty or multi-line.
    /// - [`AttentionError::MissingCareLocation`] / [`AttentionError::InvalidCareLocation`].
    pub(crate) fn new(
        action: AttentionAction,
        summary: impl AsRef<str>,
        care_location: impl AsRef<str>,
    ) -> AttentionResult<Self> {
        let summary = NonEmptyText::single_line(summary.as_ref()).map_err(|_| {
            AttentionError::InvalidInput("commit summary must be non-empty and single-line".into())
        })?;

        let care_location_str = care_location.as_ref().trim();
        if care_location_str.contains(['\n', '\r']) {
            return Err(AttentionError::InvalidCareLocation);
        }
        let care_location = NonEmptyText::new(care_location_str)
            .map_err(|_| AttentionError::MissingCareLocation)?;

        Ok(Self {
            action,
            summary,
            care_location,
            trailers: Vec::new(),
        })
    }

    /// Adds an extra trailer. `Actor-*` and `Care-Location` are reserved.
    pub(crate) fn with_trailer(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> AttentionResult<Self> {
        let key = key.into();
        if is_reserved_trailer_key(&key) {
            return Err(AttentionError::ReservedTrailerKey);
        }
        self.trailers.push(CommitTrailer::new(key, value)?);
        Ok(self)
    }

    pub(crate) fn render_with_author(&self, author: &CommitAuthor) -> String {
        let mut rendered = format!(
            "{SUBJECT_PREFIX}:{}: {}",
            self.action,
            self.summary.as_str()
        );

        let mut other = self.trailers.clone();
        other.sort_by(|a, b| {
            (a.key.as_str(), a.value.as_str()).cmp(&(b.key.as_str(), b.value.as_str()))
        });

        rendered.push_str("\n\n");
        for (key, value) in [
            (ACTOR_ID_TRAILER, author.name()),
            (ACTOR_ROLE_TRAILER, author.role().as_str()),
            (CARE_LOCATION_TRAILER, self.care_location.as_str()),
        ] {
            rendered.push_str(key);
            rendered.push_str(": ");
            rendered.push_str(value);
            rendered.push('\n');
        }

        for trailer in other {
            rendered.push_str(&trailer.key);
            rendered.push_str(": ");
            rendered.push_str(&trailer.value);
            rendered.push('\n');
        }

        rendered.truncate(rendered.trim_end().len());
        rendered
    }
}

/// A commit message read back from history.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ParsedCommitMessage {
    pub(crate) action: AttentionAction,
    pub(crate) summary: String,
    pub(crate) trailers: Vec<(String, String)>,
}

impl ParsedCommitMessage {
    /// Returns `None` for messages that do not follow the `attention:<action>: …` layout.
    pub(crate) fn parse(message: &str) -> Option<Self> {
        let mut lines = message.lines();
        let subject = lines.next()?;
        let (action, summary) = subject
            .strip_prefix(SUBJECT_PREFIX)?
            .strip_prefix(':')?
            .split_once(": ")?;

        let trailers = lines
            .filter_map(|line| line.split_once(": "))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        Some(Self {
            action: action.parse().ok()?,
            summary: summary.trim().to_string(),
            trailers,
        })
    }

    pub(crate) fn trailer(&self, key: &str) -> Option<&str> {
        self.trailers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn actor_id(&self) -> Option<&str> {
        self.trailer(ACTOR_ID_TRAILER)
    }

    pub(crate) fn actor_role(&self) -> Option<&str> {
        self.trailer(ACTOR_ROLE_TRAILER)
    }

    pub(crate) fn care_location(&self) -> Option<&str> {
        self.trailer(CARE_LOCATION_TRAILER)
    }
}

/// One entry of an episode's commit log.
#[derive(Clone, Debug)]
pub(crate) struct CommitInfo {
    pub(crate) oid: String,
    pub(crate) time: DateTime<Utc>,
    pub(crate) message: String,
}

/// Replaces `path` with `contents` via a sibling temp file and a rename.
///
/// Readers that do not hold the episode lock see either the old file or the new one, never a
/// truncated one.
fn replace_file(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".pending-")
        .tempfile_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Represents a file to be written and committed.
#[derive(Debug, Clone)]
pub(crate) struct FileToWrite<'a> {
    /// Path relative to the repository directory.
    pub relative_path: &'a Path,
    pub content: &'a str,
    /// Previous content for rollback. `None` if this is a new file.
    pub old_content: Option<&'a str>,
}

/// Git operations on an episode repository rooted at `workdir`.
pub(crate) struct VersionedFileService {
    repo: git2::Repository,
    workdir: PathBuf,
}

impl VersionedFileService {
    pub(crate) fn init(workdir: &Path) -> AttentionResult<Self> {
        let repo = git2::Repository::init(workdir).map_err(AttentionError::GitInit)?;
        let actual_workdir = repo
            .workdir()
            .ok_or_else(|| {
                AttentionError::GitInit(git2::Error::from_str(
                    "repository has no working directory",
                ))
            })?
            .to_path_buf();
        Ok(Self {
            repo,
            workdir: actual_workdir,
        })
    }

    /// Opens exactly the repository at `workdir`; parent directories are not searched.
    pub(crate) fn open(workdir: &Path) -> AttentionResult<Self> {
        let repo = git2::Repository::open_ext(
            workdir,
            git2::RepositoryOpenFlags::NO_SEARCH,
            std::iter::empty::<&std::ffi::OsStr>(),
        )
        .map_err(AttentionError::GitOpen)?;
        let actual_workdir = repo
            .workdir()
            .ok_or_else(|| {
                AttentionError::GitOpen(git2::Error::from_str(
                    "repository has no working directory",
                ))
            })?
            .to_path_buf();
        Ok(Self {
            repo,
            workdir: actual_workdir,
        })
    }

    fn ensure_main_head(&self) -> AttentionResult<()> {
        self.repo
            .set_head(MAIN_REF)
            .map_err(AttentionError::GitSetHead)
    }

    fn commit_paths(
        &self,
        author: &CommitAuthor,
        message: &AttentionCommitMessage,
        relative_paths: &[PathBuf],
    ) -> AttentionResult<git2::Oid> {
        let rendered = message.render_with_author(author);
        self.ensure_main_head()?;
        let mut index = self.repo.index().map_err(AttentionError::GitIndex)?;

        for path in relative_paths {
            if path.is_absolute()
                || path
                    .components()
                    .any(|c| matches!(c, std::path::Component::ParentDir))
            {
                return Err(AttentionError::InvalidInput(
                    "commit paths must be relative to the repository and must not contain '..'"
                        .into(),
                ));
            }
            index.add_path(path).map_err(AttentionError::GitAdd)?;
        }
        index.write().map_err(AttentionError::GitIndex)?;

        let tree_id = index.write_tree().map_err(AttentionError::GitWriteTree)?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(AttentionError::GitFindTree)?;
        let sig = author.signature()?;

        let parents = self.resolve_head_parents()?;
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, &rendered, &tree, &parent_refs)
            .map_err(AttentionError::GitCommit)
    }

    /// Writes files and commits them, rolling back file contents if anything fails.
    ///
    /// On error, files that existed are restored to `old_content` and new files are removed.
    pub(crate) fn write_and_commit_files(
        repo_path: &Path,
        author: &CommitAuthor,
        msg: &AttentionCommitMessage,
        files: &[FileToWrite],
    ) -> AttentionResult<()> {
        let repo = Self::open(repo_path)?;
        let mut written_files: Vec<(PathBuf, Option<&str>)> = Vec::new();

        let result: AttentionResult<()> = (|| {
            for file in files {
                let full_path = repo.workdir.join(file.relative_path);
                replace_file(&full_path, file.content).map_err(AttentionError::FileWrite)?;
                written_files.push((full_path, file.old_content));
            }

            let paths: Vec<PathBuf> = files
                .iter()
                .map(|f| f.relative_path.to_path_buf())
                .collect();
            repo.commit_paths(author, msg, &paths)?;
            Ok(())
        })();

        if let Err(write_error) = result {
            for (full_path, old_content) in written_files.iter().rev() {
                let restored = match old_content {
                    Some(contents) => replace_file(full_path, contents),
                    None => std::fs::remove_file(full_path),
                };
                if let Err(e) = restored {
                    tracing::error!(path = %full_path.display(), "rollback failed: {e}");
                }
            }
            return Err(write_error);
        }

        Ok(())
    }

    /// Initialises a repository in `attention_dir` and makes the first commit.
    ///
    /// On failure the whole directory is removed. If that also fails,
    /// [`AttentionError::CleanupAfterInitialiseFailed`] carries both errors.
    pub(crate) fn init_and_commit(
        attention_dir: &Path,
        author: &CommitAuthor,
        message: &AttentionCommitMessage,
        files: &[FileToWrite],
    ) -> AttentionResult<()> {
        let result: AttentionResult<()> = (|| {
            let _repo = Self::init(attention_dir)?;
            Self::write_and_commit_files(attention_dir, author, message, files)
        })();

        match result {
            Ok(()) => Ok(()),
            Err(init_error) => {
                if let Err(cleanup_error) = std::fs::remove_dir_all(attention_dir) {
                    return Err(AttentionError::CleanupAfterInitialiseFailed {
                        path: attention_dir.to_path_buf(),
                        init_error: Box::new(init_error),
                        cleanup_error,
                    });
                }
                Err(init_error)
            }
        }
    }

    /// Commit log of `refs/heads/main`, newest first.
    pub(crate) fn history(&self) -> AttentionResult<Vec<CommitInfo>> {
        let mut walk = self.repo.revwalk().map_err(AttentionError::GitRevwalk)?;
        walk.push_ref(MAIN_REF)
            .map_err(AttentionError::GitRevwalk)?;
        walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)
            .map_err(AttentionError::GitRevwalk)?;

        let mut commits = Vec::new();
        for oid in walk {
            let oid = oid.map_err(AttentionError::GitRevwalk)?;
            let commit = self
                .repo
                .find_commit(oid)
                .map_err(AttentionError::GitRevwalk)?;
            commits.push(CommitInfo {
                oid: oid.to_string(),
                time: DateTime::from_timestamp(commit.time().seconds(), 0).unwrap_or_default(),
                message: commit.message().unwrap_or_default().to_string(),
            });
        }
        Ok(commits)
    }

    /// Parent list for the next commit: empty on an unborn branch, otherwise `HEAD`.
    fn resolve_head_parents(&self) -> AttentionResult<Vec<git2::Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => {
                let commit = head.peel_to_commit().map_err(AttentionError::GitPeel)?;
                Ok(vec![commit])
            }
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(vec![]),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(vec![]),
            Err(e) => Err(AttentionError::GitHead(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use ulr_workflow::{Actor, ActorId, Role};

    fn author() -> CommitAuthor {
        let actor = Actor::new(ActorId::new("res-1").unwrap(), Role::Resident);
        CommitAuthor::for_actor(&actor, "ulr.test")
    }

    fn message(action: AttentionAction) -> AttentionCommitMessage {
        AttentionCommitMessage::new(action, "Resident approved AI result", "Servicio de Urgencia")
            .unwrap()
    }

    #[test]
    fn renders_subject_and_fixed_trailers() {
        let rendered = message(AttentionAction::Resident)
            .with_trailer("Decision", "approved")
            .unwrap()
            .render_with_author(&author());

        assert_eq!(
            rendered,
            "attention:resident: Resident approved AI result\n\n\
             Actor-Id: res-1\n\
             Actor-Role: resident\n\
             Care-Location: Servicio de Urgencia\n\
             Decision: approved"
        );
    }

    #[test]
    fn rendered_message_parses_back() {
        let rendered = message(AttentionAction::Close).render_with_author(&author());
        let parsed = ParsedCommitMessage::parse(&rendered).unwrap();
        assert_eq!(parsed.action, AttentionAction::Close);
        assert_eq!(parsed.summary, "Resident approved AI result");
        assert_eq!(parsed.actor_id(), Some("res-1"));
        assert_eq!(parsed.actor_role(), Some("resident"));
        assert_eq!(parsed.care_location(), Some("Servicio de Urgencia"));
    }

    #[test]
    fn parse_ignores_foreign_messages() {
        assert_eq!(ParsedCommitMessage::parse("Initial commit"), None);
        assert_eq!(
            ParsedCommitMessage::parse("attention:reopen: nope"),
            None
        );
    }

    #[test]
    fn rejects_reserved_trailer_keys() {
        for key in ["Actor-Id", "Actor-Role", "Care-Location"] {
            assert!(matches!(
                message(AttentionAction::Create).with_trailer(key, "x"),
                Err(AttentionError::ReservedTrailerKey)
            ));
        }
    }

    #[test]
    fn rejects_multiline_summary_and_blank_care_location() {
        assert!(matches!(
            AttentionCommitMessage::new(AttentionAction::Create, "a\nb", "Urgencia"),
            Err(AttentionError::InvalidInput(_))
        ));
        assert!(matches!(
            AttentionCommitMessage::new(AttentionAction::Create, "Created", " "),
            Err(AttentionError::MissingCareLocation)
        ));
    }

    #[test]
    fn init_and_commit_then_update_builds_linear_history() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("episode");
        std::fs::create_dir(&dir).unwrap();

        let path = Path::new("ATTENTION.yaml");
        VersionedFileService::init_and_commit(
            &dir,
            &author(),
            &message(AttentionAction::Create),
            &[FileToWrite {
                relative_path: path,
                content: "v1\n",
                old_content: None,
            }],
        )
        .unwrap();

        VersionedFileService::write_and_commit_files(
            &dir,
            &author(),
            &message(AttentionAction::Resident),
            &[FileToWrite {
                relative_path: path,
                content: "v2\n",
                old_content: Some("v1\n"),
            }],
        )
        .unwrap();

        let history = VersionedFileService::open(&dir).unwrap().history().unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].message.starts_with("attention:resident:"));
        assert!(history[1].message.starts_with("attention:create:"));
        assert_eq!(std::fs::read_to_string(dir.join(path)).unwrap(), "v2\n");
    }

    #[test]
    fn failed_commit_restores_previous_content() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("episode");
        std::fs::create_dir(&dir).unwrap();
        let path = Path::new("ATTENTION.yaml");

        VersionedFileService::init_and_commit(
            &dir,
            &author(),
            &message(AttentionAction::Create),
            &[FileToWrite {
                relative_path: path,
                content: "v1\n",
                old_content: None,
            }],
        )
        .unwrap();

        let result = VersionedFileService::write_and_commit_files(
            &dir,
            &author(),
            &message(AttentionAction::Resident),
            &[
                FileToWrite {
                    relative_path: path,
                    content: "v2\n",
                    old_content: Some("v1\n"),
                },
                FileToWrite {
                    relative_path: Path::new("missing/dir/file.yaml"),
                    content: "x",
                    old_content: None,
                },
            ],
        );

        assert!(matches!(result, Err(AttentionError::FileWrite(_))));
        assert_eq!(std::fs::read_to_string(dir.join(path)).unwrap(), "v1\n");
    }

    #[test]
    fn failed_initialise_removes_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("episode");
        std::fs::create_dir(&dir).unwrap();

        let result = VersionedFileService::init_and_commit(
            &dir,
            &author(),
            &message(AttentionAction::Create),
            &[FileToWrite {
                relative_path: Path::new("nested/ATTENTION.yaml"),
                content: "v1\n",
                old_content: None,
            }],
        );

        assert!(result.is_err());
        assert!(!dir.exists());
    }
}
