use error_set::error_set;
use std::path::PathBuf;

pub mod backend;
pub mod config;
pub mod diff;
pub mod drag;
pub mod parse;
pub mod patch;
pub mod selection;
pub mod session;

pub use backend::{Backend, BackendError, ChangedPath, CommitMessage, GitBackend, PatchMode};
pub use config::{ConfigError, Settings};
pub use diff::{FileDiff, format_diff};
pub use parse::{RefParseError, SelectionRef, Selector, parse_ref};
pub use selection::{SelectionState, Tristate};
pub use session::{CommitSession, SessionError};

error_set! {
    /// Top-level error for git-partial operations
    GitPartialError := {
        #[display("No changes found in {file}")]
        NoChanges { file: String },
        #[display("{file} has no hunk {hunk}")]
        UnknownHunk { file: String, hunk: usize },
        #[display("Offset {offset} in hunk {hunk} of {file} is not an added or removed line")]
        NotAChange { file: String, hunk: usize, offset: usize },
        SessionError(SessionError),
        RefParseError(RefParseError),
        ConfigError(ConfigError),
        BackendError(BackendError),
    }
}

/// Main interface for selecting and committing parts of a working tree
pub struct GitPartial {
    session: CommitSession<GitBackend>,
}

impl GitPartial {
    /// Open the repository at `repo` and read its status
    ///
    /// # Examples
    /// ```no_run
    /// # use git_partial::{GitPartial, Settings};
    /// let mut partial = GitPartial::open(".", &Settings::default()).unwrap();
    /// partial.select("src/lib.rs:0").unwrap();
    /// ```
    pub fn open(repo: impl Into<PathBuf>, settings: &Settings) -> Result<Self, GitPartialError> {
        let backend = GitBackend::with_settings(repo, settings);
        let mut session = CommitSession::new(backend, settings);
        session.refresh_status()?;
        Ok(Self { session })
    }

    pub fn session(&mut self) -> &mut CommitSession<GitBackend> {
        &mut self.session
    }

    /// Changed paths from the last status refresh
    pub fn status(&self) -> &[ChangedPath] {
        self.session.status()
    }

    /// Diffs of `paths` (or every changed path if empty) with hunk indices
    /// and line offsets, ready to be turned into references.
    pub fn diff(&mut self, paths: &[String]) -> Result<String, GitPartialError> {
        let paths: Vec<String> = if paths.is_empty() {
            self.status().iter().map(|c| c.path.clone()).collect()
        } else {
            paths.to_vec()
        };

        let mut output = String::new();
        for path in &paths {
            let diff = self.session.open(path)?;
            if diff.prelude.is_empty() && diff.is_empty() {
                return Err(GitPartialError::NoChanges { file: path.clone() });
            }
            output.push_str(&format_diff(diff));
        }
        Ok(output)
    }

    /// Add one reference (`FILE`, `FILE:H,..` or `FILE:H/N,..`) to the
    /// selection.
    ///
    /// Hunks and offsets are checked against a freshly loaded diff.
    pub fn select(&mut self, reference: &str) -> Result<(), GitPartialError> {
        let SelectionRef { file, selector } = parse_ref(reference)?;

        if !self.status().iter().any(|c| c.path == file) {
            return Err(GitPartialError::NoChanges { file });
        }

        match selector {
            Selector::WholeFile => {
                self.session.selection_mut().set_file_selected(&file, true);
            }
            Selector::Hunks(hunks) => {
                let count = self.session.open(&file)?.hunks.len();
                if let Some(&hunk) = hunks.iter().find(|&&hunk| hunk >= count) {
                    return Err(GitPartialError::UnknownHunk { file, hunk });
                }
                for hunk in hunks {
                    self.session.selection_mut().toggle_hunk(&file, hunk, true);
                }
            }
            Selector::Lines { hunk, offsets } => {
                let diff = self.session.open(&file)?;
                let Some(changes) = diff.hunk(hunk).map(|h| h.change_offsets()) else {
                    return Err(GitPartialError::UnknownHunk { file, hunk });
                };
                if let Some(&offset) = offsets.difference(&changes).next() {
                    return Err(GitPartialError::NotAChange { file, hunk, offset });
                }
                self.session
                    .selection_mut()
                    .toggle_lines(&file, hunk, offsets, true);
            }
        }

        log::debug!("selected {reference}");
        Ok(())
    }

    /// Commit exactly the parts named by `references`
    pub fn commit(
        &mut self,
        references: &[String],
        message: CommitMessage,
    ) -> Result<(), GitPartialError> {
        for reference in references {
            self.select(reference)?;
        }
        Ok(self.session.commit(message)?)
    }

    /// Remove exactly the parts named by `references` from the working tree
    pub fn discard(&mut self, references: &[String]) -> Result<(), GitPartialError> {
        for reference in references {
            self.select(reference)?;
        }
        Ok(self.session.discard()?)
    }
}
