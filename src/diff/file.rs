use super::hunk::{DiffLine, Hunk};
use std::fmt;
use std::ops::Range;

/// How a file diff changes the file as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    /// The old side is `/dev/null`
    Created,
    /// The new side is `/dev/null`
    Deleted,
    Modified,
}

/// A complete diff for a single file.
///
/// Contains the prelude (everything before the first hunk header: `diff
/// --git`, mode and index lines, `---`/`+++` pair) and all hunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Path the diff was requested for
    pub path: String,
    /// Lines before the first hunk header
    pub prelude: Vec<String>,
    /// All hunks, in the order they appear in the diff
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    /// Parse a single-file diff from its lines.
    ///
    /// Every line starting with `@@` opens a new hunk whose body runs up to
    /// the next `@@` line. Input without any hunk header (binary file or no
    /// textual change) gives a diff with zero hunks. Trailing empty lines,
    /// left over from splitting text on `\n`, are dropped.
    #[must_use]
    pub fn parse<S: AsRef<str>>(path: impl Into<String>, lines: &[S]) -> Self {
        let end = lines
            .iter()
            .rposition(|line| !line.as_ref().is_empty())
            .map_or(0, |last| last + 1);
        let lines = &lines[..end];

        let first_hunk = lines
            .iter()
            .position(|line| line.as_ref().starts_with("@@"))
            .unwrap_or(lines.len());

        let prelude = lines[..first_hunk]
            .iter()
            .map(|line| line.as_ref().to_string())
            .collect();

        let mut hunks = Vec::new();
        let mut current: Option<(&str, Vec<DiffLine>)> = None;

        for line in &lines[first_hunk..] {
            let line = line.as_ref();
            if line.starts_with("@@") {
                if let Some((header, body)) = current.take() {
                    hunks.push(Hunk::parse(hunks.len(), header, body));
                }
                current = Some((line, Vec::new()));
            } else if let Some((_, body)) = current.as_mut() {
                body.push(DiffLine::new(line));
            }
        }

        if let Some((header, body)) = current {
            hunks.push(Hunk::parse(hunks.len(), header, body));
        }

        FileDiff {
            path: path.into(),
            prelude,
            hunks,
        }
    }

    /// Indices of every hunk, the way "select everything" is expressed
    pub fn all_hunk_indices(&self) -> Range<usize> {
        0..self.hunks.len()
    }

    pub fn hunk(&self, index: usize) -> Option<&Hunk> {
        self.hunks.get(index)
    }

    /// Whether the diff has no textual hunks
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Creation or deletion of the whole file, detected from `/dev/null`
    /// markers in the prelude.
    pub fn change(&self) -> FileChange {
        if self.prelude.iter().any(|line| line == "--- /dev/null") {
            FileChange::Created
        } else if self.prelude.iter().any(|line| line == "+++ /dev/null") {
            FileChange::Deleted
        } else {
            FileChange::Modified
        }
    }

    /// The `new file mode` or `deleted file mode` line, if any
    pub fn mode_line(&self) -> Option<&str> {
        self.prelude
            .iter()
            .map(String::as_str)
            .find(|line| line.starts_with("new file mode ") || line.starts_with("deleted file mode "))
    }
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.prelude {
            writeln!(f, "{}", line)?;
        }
        for hunk in &self.hunks {
            write!(f, "{}", hunk)?;
        }
        Ok(())
    }
}
