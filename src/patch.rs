//! Turn a selection into a patch that `git apply --unidiff-zero` accepts.
//!
//! Whole hunks are copied verbatim. Line selections are cut into runs of
//! consecutive change lines and each run becomes a zero-context hunk of its
//! own. Zero-context hunks are placed by line number alone, so every hunk is
//! numbered against the file the patch is applied to: the [`Anchor`] side
//! keeps the diff's own numbering and the other side accounts only for what
//! was actually emitted before it.

use crate::diff::{Anchor, FileChange, FileDiff, Hunk};
use crate::diff::hunk::contiguous_runs;
use crate::selection::SelectionState;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// What to emit for one file, resolved from the selection
#[derive(Debug, Default)]
struct Intent {
    whole: BTreeSet<usize>,
    lines: BTreeMap<usize, BTreeSet<usize>>,
}

impl Intent {
    fn resolve(path: &str, diff: &FileDiff, selection: &SelectionState) -> Self {
        let hunks = selection.selected_hunks(path);
        let lines = selection.selected_lines(path);

        if hunks.is_none() && lines.is_none() {
            if selection.is_file_selected(path) {
                return Intent {
                    whole: diff.all_hunk_indices().collect(),
                    lines: BTreeMap::new(),
                };
            }
            return Intent::default();
        }

        let whole = hunks.cloned().unwrap_or_default();
        let lines = lines
            .into_iter()
            .flatten()
            .filter(|(index, _)| !whole.contains(index))
            .map(|(index, offsets)| (*index, offsets.clone()))
            .collect();
        Intent { whole, lines }
    }

    fn is_empty(&self) -> bool {
        self.whole.is_empty() && self.lines.is_empty()
    }

    fn stale_indices(&self, diff: &FileDiff) -> Vec<usize> {
        self.whole
            .iter()
            .chain(self.lines.keys())
            .copied()
            .filter(|&index| diff.hunk(index).is_none())
            .collect()
    }
}

/// Build the patch for `path` from the selection.
///
/// `anchor` is [`Anchor::Old`] for a patch applied forward to the index and
/// [`Anchor::New`] for one applied in reverse to the working tree.
///
/// Returns an empty string when nothing is selected or nothing selected
/// still exists in `diff`. Hunk indices past the end of `diff` are skipped.
pub fn synthesize(
    path: &str,
    diff: &FileDiff,
    selection: &SelectionState,
    anchor: Anchor,
) -> String {
    let intent = Intent::resolve(path, diff, selection);
    if intent.is_empty() {
        return String::new();
    }

    let stale = intent.stale_indices(diff);
    if !stale.is_empty() {
        log::warn!("skipping stale hunk indices {stale:?} for {path}");
    }

    let mut body = String::new();
    let mut emitted_delta = 0i64;
    let mut original_delta = 0i64;
    let mut all_whole = true;

    for hunk in &diff.hunks {
        if intent.whole.contains(&hunk.index) {
            body.push_str(&whole_hunk(hunk, emitted_delta, original_delta, anchor));
            emitted_delta += hunk.line_delta();
        } else {
            all_whole = false;
            if let Some(offsets) = intent.lines.get(&hunk.index) {
                let changes = hunk.change_offsets();
                let offsets = offsets.intersection(&changes).copied().collect();
                for run in contiguous_runs(&offsets) {
                    if let Some(extracted) = hunk.extract(run, emitted_delta, anchor) {
                        emitted_delta += extracted.line_delta();
                        body.push_str(&extracted.to_string());
                    }
                }
            }
        }
        original_delta += hunk.line_delta();
    }

    if body.is_empty() {
        return String::new();
    }

    let mut patch = file_header(path, diff, all_whole, anchor);
    patch.push_str(&body);
    patch
}

/// Concatenate the patches of `paths`, in order.
///
/// Paths without a diff in `diffs` and paths with nothing to emit are
/// skipped.
pub fn synthesize_multi<'a, I>(
    paths: I,
    diffs: &HashMap<String, FileDiff>,
    selection: &SelectionState,
    anchor: Anchor,
) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    paths
        .into_iter()
        .filter_map(|path| match diffs.get(path) {
            Some(diff) => Some(synthesize(path, diff, selection, anchor)),
            None => {
                log::debug!("no diff loaded for {path}, leaving it out of the patch");
                None
            }
        })
        .collect()
}

/// A whole hunk, verbatim unless earlier partial selections moved it
fn whole_hunk(hunk: &Hunk, emitted_delta: i64, original_delta: i64, anchor: Anchor) -> String {
    if emitted_delta == original_delta {
        hunk.to_string()
    } else {
        hunk.relocated(emitted_delta, anchor).to_string()
    }
}

/// Creation and deletion headers are kept only while the side the patch is
/// applied to lacks the file, or when the whole file is emitted.
fn file_header(path: &str, diff: &FileDiff, all_whole: bool, anchor: Anchor) -> String {
    let mut header = format!("diff --git a/{path} b/{path}\n");
    let mode_line = diff.mode_line().map(|line| format!("{line}\n"));

    match diff.change() {
        FileChange::Created if all_whole || anchor == Anchor::Old => {
            header.push_str(mode_line.as_deref().unwrap_or(""));
            header.push_str(&format!("--- /dev/null\n+++ b/{path}\n"));
        }
        FileChange::Deleted if all_whole || anchor == Anchor::New => {
            header.push_str(mode_line.as_deref().unwrap_or(""));
            header.push_str(&format!("--- a/{path}\n+++ /dev/null\n"));
        }
        FileChange::Created | FileChange::Deleted | FileChange::Modified => {
            header.push_str(&format!("--- a/{path}\n+++ b/{path}\n"));
        }
    }

    header
}
