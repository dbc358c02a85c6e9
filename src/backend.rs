//! The version-control backend: diffs in, patches out.
//!
//! [`Backend`] is the seam between the selection model and a real
//! repository. [`GitBackend`] implements it by running the `git` executable.

use crate::config::Settings;
use crate::diff::Anchor;
use error_set::error_set;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

error_set! {
    /// Errors from talking to the backend
    BackendError := {
        #[display("Failed to run git {command}: {message}")]
        SpawnFailed { command: String, message: String },
        #[display("git {command} failed: {stderr}")]
        ExitError { command: String, stderr: String },
        #[display("Invalid UTF-8 in git output: {message}")]
        InvalidUtf8 { message: String },
        #[display("Failed to get stdin handle for git apply")]
        ApplyStdinFailed,
        #[display("Failed to write patch to git apply: {message}")]
        ApplyWriteFailed { message: String },
        /// Patch rejected; `stderr` is git's own explanation
        #[display("git apply failed: {stderr}")]
        ApplyExitError { stderr: String },
        #[display("Unexpected git status entry '{entry}'")]
        InvalidStatus { entry: String },
    }
}

/// What a backend can do with patches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Accepts patches that contain only some hunks or lines of a file
    pub partial_patches: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            partial_patches: true,
        }
    }
}

/// Working-tree status of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    TypeChanged,
    Untracked,
    Conflicted,
}

impl ChangeKind {
    /// Classify a porcelain v1 `XY` status pair
    fn from_xy(x: char, y: char) -> Self {
        match (x, y) {
            ('D', 'D') | ('A', 'A') | ('U', _) | (_, 'U') => ChangeKind::Conflicted,
            ('?', '?') => ChangeKind::Untracked,
            ('R', _) | (_, 'R') => ChangeKind::Renamed,
            ('C', _) | (_, 'C') => ChangeKind::Copied,
            ('D', _) | (_, 'D') => ChangeKind::Deleted,
            ('A', _) | (_, 'A') => ChangeKind::Added,
            ('T', _) | (_, 'T') => ChangeKind::TypeChanged,
            _ => ChangeKind::Modified,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed => "renamed",
            ChangeKind::Copied => "copied",
            ChangeKind::TypeChanged => "typechange",
            ChangeKind::Untracked => "untracked",
            ChangeKind::Conflicted => "conflicted",
        };
        f.pad(label)
    }
}

/// One entry of the working-tree status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPath {
    pub path: String,
    pub kind: ChangeKind,
    /// Source path of a rename or copy
    pub original: Option<String>,
}

/// Commit message split the way `git commit -m ... -m ...` takes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage {
    pub summary: String,
    pub description: Option<String>,
}

impl CommitMessage {
    pub fn new(summary: impl Into<String>, description: Option<String>) -> Self {
        Self {
            summary: summary.into(),
            description: description.filter(|d| !d.trim().is_empty()),
        }
    }

    /// Full message text, summary and description separated by a blank line
    pub fn text(&self) -> String {
        match &self.description {
            Some(description) => format!("{}\n\n{}", self.summary, description),
            None => self.summary.clone(),
        }
    }
}

/// What applying a patch does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchMode {
    /// Stage the patch and commit it
    Commit(CommitMessage),
    /// Reverse the patch in the working tree
    Discard,
}

impl PatchMode {
    /// Side of the diff whose line numbers match what the patch lands on:
    /// the index for a commit, the working tree for a discard
    pub fn anchor(&self) -> Anchor {
        match self {
            PatchMode::Commit(_) => Anchor::Old,
            PatchMode::Discard => Anchor::New,
        }
    }
}

/// A repository that produces diffs and accepts patches
pub trait Backend {
    fn capabilities(&self) -> Capabilities;

    /// Raw diff of one path (working tree against index), split into lines
    fn diff_lines(&self, path: &str) -> Result<Vec<String>, BackendError>;

    /// Apply a unified-diff patch; the error carries the backend's reason
    fn apply_patch(&self, patch: &str, mode: &PatchMode) -> Result<(), BackendError>;

    /// Current working-tree status
    fn changed_paths(&self) -> Result<Vec<ChangedPath>, BackendError>;
}

/// [`Backend`] running the `git` executable against one repository
#[derive(Debug, Clone)]
pub struct GitBackend {
    repo: PathBuf,
    capabilities: Capabilities,
    context_lines: u32,
}

impl GitBackend {
    /// Backend for the repository at `repo`, with default settings
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self::with_settings(repo, &Settings::default())
    }

    pub fn with_settings(repo: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self {
            repo: repo.into(),
            capabilities: Capabilities {
                partial_patches: settings.partial_patches,
            },
            context_lines: settings.context_lines,
        }
    }

    fn git(&self) -> Command {
        let mut command = Command::new("git");
        command.arg("-C").arg(&self.repo);
        command
    }

    /// Run git and return stdout; exit codes in `accepted` count as success
    fn run(&self, args: &[&str], accepted: &[i32]) -> Result<String, BackendError> {
        let command = args.first().copied().unwrap_or_default().to_string();
        let output = self
            .git()
            .args(args)
            .output()
            .map_err(|e| BackendError::SpawnFailed {
                command: command.clone(),
                message: e.to_string(),
            })?;

        let ok = output.status.success()
            || output
                .status
                .code()
                .is_some_and(|code| accepted.contains(&code));
        if !ok {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::ExitError {
                command,
                stderr: stderr.trim_end().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|e| BackendError::InvalidUtf8 {
            message: e.to_string(),
        })
    }

    /// Feed `patch` to `git apply` on stdin
    fn apply(&self, patch: &str, args: &[&str]) -> Result<(), BackendError> {
        let mut child = self
            .git()
            .arg("apply")
            .args(args)
            .args(["--unidiff-zero", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BackendError::SpawnFailed {
                command: "apply".to_string(),
                message: e.to_string(),
            })?;

        child
            .stdin
            .take()
            .ok_or(BackendError::ApplyStdinFailed)?
            .write_all(patch.as_bytes())
            .map_err(|e| BackendError::ApplyWriteFailed {
                message: e.to_string(),
            })?;

        let output = child
            .wait_with_output()
            .map_err(|e| BackendError::SpawnFailed {
                command: "apply".to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::ApplyExitError {
                stderr: stderr.trim_end().to_string(),
            });
        }

        Ok(())
    }

    fn is_untracked(&self, path: &str) -> Result<bool, BackendError> {
        let listed = self.run(
            &["ls-files", "--others", "--exclude-standard", "--", path],
            &[],
        )?;
        Ok(!listed.trim().is_empty())
    }
}

impl Backend for GitBackend {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn diff_lines(&self, path: &str) -> Result<Vec<String>, BackendError> {
        let context = format!("-U{}", self.context_lines);
        log::info!("git diff {path}");

        let tracked = self.run(
            &["diff", "--no-ext-diff", "--no-color", &context, "--", path],
            &[],
        )?;
        if !tracked.is_empty() || !self.is_untracked(path)? {
            return Ok(split_lines(&tracked));
        }

        // exit status 1 means "files differ" for --no-index
        let untracked = self.run(
            &[
                "diff",
                "--no-index",
                "--no-ext-diff",
                "--no-color",
                &context,
                "--",
                "/dev/null",
                path,
            ],
            &[1],
        )?;
        Ok(split_lines(&untracked))
    }

    fn apply_patch(&self, patch: &str, mode: &PatchMode) -> Result<(), BackendError> {
        match mode {
            PatchMode::Commit(message) => {
                log::info!("git apply --cached ({} bytes)", patch.len());
                self.apply(patch, &["--cached"])?;

                let mut args = vec!["commit", "-m", message.summary.as_str()];
                if let Some(description) = &message.description {
                    args.extend(["-m", description.as_str()]);
                }
                log::info!("git commit -m {:?}", message.summary);
                self.run(&args, &[])?;
            }
            PatchMode::Discard => {
                log::info!("git apply --reverse ({} bytes)", patch.len());
                self.apply(patch, &["--reverse"])?;
            }
        }
        Ok(())
    }

    fn changed_paths(&self) -> Result<Vec<ChangedPath>, BackendError> {
        log::info!("git status");
        let status = self.run(
            &["status", "--porcelain=v1", "-z", "--untracked-files=all"],
            &[],
        )?;
        parse_status(&status)
    }
}

/// Split command output on `\n`, keeping any `\r`
pub fn split_lines(output: &str) -> Vec<String> {
    if output.is_empty() {
        return Vec::new();
    }
    output
        .strip_suffix('\n')
        .unwrap_or(output)
        .split('\n')
        .map(str::to_string)
        .collect()
}

/// Parse `git status --porcelain=v1 -z` output.
///
/// Entries are `XY PATH` separated by NUL. Renames and copies are followed
/// by one more NUL-terminated field holding the source path.
pub fn parse_status(output: &str) -> Result<Vec<ChangedPath>, BackendError> {
    let mut fields = output.split('\0').filter(|field| !field.is_empty());
    let mut changed = Vec::new();

    while let Some(entry) = fields.next() {
        let mut chars = entry.chars();
        let (Some(x), Some(y), Some(' ')) = (chars.next(), chars.next(), chars.next()) else {
            return Err(BackendError::InvalidStatus {
                entry: entry.to_string(),
            });
        };
        let path = chars.as_str();
        if path.is_empty() {
            return Err(BackendError::InvalidStatus {
                entry: entry.to_string(),
            });
        }

        let kind = ChangeKind::from_xy(x, y);
        let original = match kind {
            ChangeKind::Renamed | ChangeKind::Copied => fields.next().map(str::to_string),
            _ => None,
        };

        changed.push(ChangedPath {
            path: path.to_string(),
            kind,
            original,
        });
    }

    Ok(changed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn entry(path: &str, kind: ChangeKind) -> ChangedPath {
        ChangedPath {
            path: path.to_string(),
            kind,
            original: None,
        }
    }

    #[test]
    fn status_kinds() {
        let output = " M src/lib.rs\0A  new.rs\0 D gone.rs\0?? notes.txt\0UU both.rs\0 T link\0";
        assert_eq!(
            parse_status(output).unwrap(),
            vec![
                entry("src/lib.rs", ChangeKind::Modified),
                entry("new.rs", ChangeKind::Added),
                entry("gone.rs", ChangeKind::Deleted),
                entry("notes.txt", ChangeKind::Untracked),
                entry("both.rs", ChangeKind::Conflicted),
                entry("link", ChangeKind::TypeChanged),
            ]
        );
    }

    #[test]
    fn status_rename_consumes_source_field() {
        let output = "R  new name.rs\0old name.rs\0 M other.rs\0";
        let changed = parse_status(output).unwrap();
        assert_eq!(changed.len(), 2);
        assert_eq!(changed[0].kind, ChangeKind::Renamed);
        assert_eq!(changed[0].path, "new name.rs");
        assert_eq!(changed[0].original.as_deref(), Some("old name.rs"));
        assert_eq!(changed[1], entry("other.rs", ChangeKind::Modified));
    }

    #[test]
    fn status_empty_and_invalid() {
        assert!(parse_status("").unwrap().is_empty());
        assert!(matches!(
            parse_status("garbage\0"),
            Err(BackendError::InvalidStatus { .. })
        ));
    }

    #[test]
    fn split_keeps_carriage_returns() {
        assert_eq!(split_lines("a\r\nb\n"), vec!["a\r", "b"]);
        assert_eq!(split_lines("a\n\nb"), vec!["a", "", "b"]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn commit_message_text() {
        assert_eq!(CommitMessage::new("Fix", None).text(), "Fix");
        assert_eq!(
            CommitMessage::new("Fix", Some("Details".into())).text(),
            "Fix\n\nDetails"
        );
        assert_eq!(CommitMessage::new("Fix", Some("  ".into())).description, None);
    }

    #[test]
    fn change_kind_labels() {
        assert_eq!(ChangeKind::Untracked.to_string(), "untracked");
        assert_eq!(format!("{:>9}", ChangeKind::Added), "    added");
    }
}
