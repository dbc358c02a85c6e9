//! Per-file selection state at three granularities.
//!
//! A path can be selected as a whole file, as a set of whole hunks, or as
//! individual addition/deletion lines inside hunks. [`SelectionState`] owns
//! all three maps and keeps them consistent:
//!
//! - a path without hunk or line entries is governed by whole-file
//!   membership alone
//! - a whole-hunk entry wins over line entries for the same hunk
//! - selecting every hunk of the current diff makes the path a whole-file
//!   selection again, selecting nothing removes it, anything in between is
//!   [`Tristate::Partial`]
//!
//! Hunk indices and line offsets are positional and only meaningful for the
//! diff they were made against; see [`SelectionState::forget_indices`].
//!
//! The state also carries the "marked for diff view" set, which is
//! independent of what gets committed.

use crate::diff::FileDiff;
use crate::drag::{DragMode, RowTarget};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Aggregated selection of a file, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tristate {
    Full,
    None,
    Partial,
}

/// Everything selected for one path, as captured by [`SelectionState::snapshot`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSelection {
    pub whole: bool,
    pub hunks: BTreeSet<usize>,
    pub lines: BTreeMap<usize, BTreeSet<usize>>,
}

/// Selection of files, hunks and lines, keyed by path
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    files: BTreeSet<String>,
    hunks: HashMap<String, BTreeSet<usize>>,
    lines: HashMap<String, BTreeMap<usize, BTreeSet<usize>>>,
    marked: BTreeSet<String>,
    /// Change-line offsets of every hunk, per path, from the last loaded diff
    layouts: HashMap<String, Vec<BTreeSet<usize>>>,
    active: Option<String>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `diff` the displayed diff and record its hunk layout.
    ///
    /// Whole-file intent is mirrored onto the hunks so that unticking a single
    /// hunk afterwards leaves the others selected. Indices that no longer
    /// exist in `diff` are dropped.
    pub fn set_active_diff(&mut self, diff: &FileDiff) {
        let path = diff.path.as_str();
        let layout: Vec<BTreeSet<usize>> = diff.hunks.iter().map(|h| h.change_offsets()).collect();
        let count = layout.len();

        if let Some(hunks) = self.hunks.get_mut(path) {
            hunks.retain(|&index| index < count);
        }
        if let Some(lines) = self.lines.get_mut(path) {
            lines.retain(|&index, offsets| {
                offsets.retain(|offset| layout.get(index).is_some_and(|c| c.contains(offset)));
                !offsets.is_empty()
            });
        }

        self.layouts.insert(path.to_string(), layout);
        self.active = Some(path.to_string());

        if self.has_entries(path) {
            self.sync(path);
        } else if self.files.contains(path) && count > 0 {
            self.hunks.insert(path.to_string(), (0..count).collect());
        }

        log::debug!("active diff {path} ({count} hunks)");
    }

    /// Path of the displayed diff, if any
    pub fn active_path(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn clear_active(&mut self) {
        self.active = None;
    }

    /// Drop every hunk and line entry for `path`.
    ///
    /// Called when the diff for `path` was re-fetched and differs from the
    /// one the indices were made against. Whole-file intent survives.
    pub fn forget_indices(&mut self, path: &str) {
        let whole = self.tristate(path) == Tristate::Full;
        self.hunks.remove(path);
        self.lines.remove(path);
        if !whole {
            self.files.remove(path);
        }
        log::debug!("dropped stale hunk/line selection for {path}");
    }

    /// Select or deselect a whole file.
    ///
    /// Whole-file intent supersedes partial intent: line entries are always
    /// cleared. For the active diff the hunk set mirrors the change.
    pub fn set_file_selected(&mut self, path: &str, on: bool) {
        if on {
            self.files.insert(path.to_string());
        } else {
            self.files.remove(path);
        }
        self.lines.remove(path);

        let count = self.hunk_count(path).unwrap_or(0);
        if on && self.active.as_deref() == Some(path) && count > 0 {
            self.hunks.insert(path.to_string(), (0..count).collect());
        } else {
            self.hunks.remove(path);
        }

        log::debug!("file {path} selected={on}");
    }

    /// Select or deselect one whole hunk, then recompute the file's state.
    pub fn toggle_hunk(&mut self, path: &str, hunk: usize, on: bool) {
        if self.hunk_count(path).is_some_and(|count| hunk >= count) {
            log::debug!("ignoring toggle of missing hunk {hunk} in {path}");
            return;
        }
        self.expand_whole(path);

        if let Some(lines) = self.lines.get_mut(path) {
            lines.remove(&hunk);
        }
        let hunks = self.hunks.entry(path.to_string()).or_default();
        if on {
            hunks.insert(hunk);
        } else {
            hunks.remove(&hunk);
        }

        log::debug!("hunk {path}[{hunk}] selected={on}");
        self.sync(path);
    }

    /// Select or deselect single lines of one hunk.
    ///
    /// Only addition and deletion offsets are recorded. When the result
    /// covers every change line of the hunk it becomes a whole-hunk selection.
    pub fn toggle_lines<I>(&mut self, path: &str, hunk: usize, offsets: I, on: bool)
    where
        I: IntoIterator<Item = usize>,
    {
        let Some(changes) = self
            .layouts
            .get(path)
            .and_then(|layout| layout.get(hunk))
            .cloned()
        else {
            log::warn!("cannot select lines of {path}[{hunk}]: diff not loaded");
            return;
        };
        self.expand_whole(path);

        let whole = self.hunks.get(path).is_some_and(|h| h.contains(&hunk));
        let mut selected = if whole {
            changes.clone()
        } else {
            self.lines
                .get(path)
                .and_then(|lines| lines.get(&hunk))
                .cloned()
                .unwrap_or_default()
        };

        for offset in offsets.into_iter().filter(|offset| changes.contains(offset)) {
            if on {
                selected.insert(offset);
            } else {
                selected.remove(&offset);
            }
        }

        if whole && let Some(hunks) = self.hunks.get_mut(path) {
            hunks.remove(&hunk);
        }

        if !changes.is_empty() && selected == changes {
            if let Some(lines) = self.lines.get_mut(path) {
                lines.remove(&hunk);
            }
            self.toggle_hunk(path, hunk, true);
            return;
        }

        if selected.is_empty() {
            if let Some(lines) = self.lines.get_mut(path) {
                lines.remove(&hunk);
            }
        } else {
            self.lines
                .entry(path.to_string())
                .or_default()
                .insert(hunk, selected);
        }

        log::debug!("lines of {path}[{hunk}] selected={on}");
        self.sync(path);
    }

    /// Full, none or partial, for display only
    pub fn tristate(&self, path: &str) -> Tristate {
        let has_hunks = self.hunks.get(path).is_some_and(|h| !h.is_empty());
        let has_lines = self.lines.get(path).is_some_and(|l| !l.is_empty());

        match (has_hunks, has_lines) {
            (_, true) => Tristate::Partial,
            (true, false) if self.files.contains(path) => Tristate::Full,
            (true, false) => Tristate::Partial,
            (false, false) if self.files.contains(path) => Tristate::Full,
            (false, false) => Tristate::None,
        }
    }

    /// Whole-file membership
    pub fn is_file_selected(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    /// Whole hunks selected for `path`
    pub fn selected_hunks(&self, path: &str) -> Option<&BTreeSet<usize>> {
        self.hunks.get(path).filter(|h| !h.is_empty())
    }

    /// Line offsets selected per hunk for `path`
    pub fn selected_lines(&self, path: &str) -> Option<&BTreeMap<usize, BTreeSet<usize>>> {
        self.lines.get(path).filter(|l| !l.is_empty())
    }

    /// Every path with any selection, sorted
    pub fn selected_paths(&self) -> Vec<String> {
        let mut paths: BTreeSet<&String> = self.files.iter().collect();
        paths.extend(self.hunks.iter().filter(|(_, h)| !h.is_empty()).map(|(p, _)| p));
        paths.extend(self.lines.iter().filter(|(_, l)| !l.is_empty()).map(|(p, _)| p));
        paths.into_iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.selected_paths().is_empty()
    }

    /// Paths selected only in part
    pub fn partial_paths(&self) -> Vec<String> {
        self.selected_paths()
            .into_iter()
            .filter(|path| self.tristate(path) == Tristate::Partial)
            .collect()
    }

    pub fn has_partial_intent(&self) -> bool {
        !self.partial_paths().is_empty()
    }

    /// Remove every selection for `path`
    pub fn clear_path(&mut self, path: &str) {
        self.files.remove(path);
        self.hunks.remove(path);
        self.lines.remove(path);
    }

    /// Keep state only for paths still present in the working-tree status.
    pub fn prune<'a, I>(&mut self, present: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: BTreeSet<&str> = present.into_iter().collect();
        let before = self.selected_paths().len();

        self.files.retain(|p| present.contains(p.as_str()));
        self.hunks.retain(|p, _| present.contains(p.as_str()));
        self.lines.retain(|p, _| present.contains(p.as_str()));
        self.marked.retain(|p| present.contains(p.as_str()));
        self.layouts.retain(|p, _| present.contains(p.as_str()));
        if self
            .active
            .as_deref()
            .is_some_and(|active| !present.contains(active))
        {
            self.active = None;
        }

        let pruned = before - self.selected_paths().len();
        if pruned > 0 {
            log::debug!("pruned selection of {pruned} vanished path(s)");
        }
    }

    /// Capture everything selected for `path`
    pub fn snapshot(&self, path: &str) -> PathSelection {
        PathSelection {
            whole: self.files.contains(path),
            hunks: self.hunks.get(path).cloned().unwrap_or_default(),
            lines: self.lines.get(path).cloned().unwrap_or_default(),
        }
    }

    /// Put back a capture taken with [`snapshot`](Self::snapshot)
    pub fn restore(&mut self, path: &str, snapshot: PathSelection) {
        if snapshot.whole {
            self.files.insert(path.to_string());
        } else {
            self.files.remove(path);
        }
        if snapshot.hunks.is_empty() {
            self.hunks.remove(path);
        } else {
            self.hunks.insert(path.to_string(), snapshot.hunks);
        }
        if snapshot.lines.is_empty() {
            self.lines.remove(path);
        } else {
            self.lines.insert(path.to_string(), snapshot.lines);
        }
    }

    /// Mark or unmark a path for multi-file diff viewing
    pub fn set_marked(&mut self, path: &str, on: bool) {
        if on {
            self.marked.insert(path.to_string());
        } else {
            self.marked.remove(path);
        }
    }

    pub fn is_marked(&self, path: &str) -> bool {
        self.marked.contains(path)
    }

    /// Paths marked for diff viewing, sorted
    pub fn marked(&self) -> impl Iterator<Item = &str> {
        self.marked.iter().map(String::as_str)
    }

    fn hunk_count(&self, path: &str) -> Option<usize> {
        self.layouts.get(path).map(Vec::len)
    }

    fn has_entries(&self, path: &str) -> bool {
        self.selected_hunks(path).is_some() || self.selected_lines(path).is_some()
    }

    /// Turn bare whole-file membership into explicit hunk indices, so a
    /// following hunk or line toggle starts from "everything".
    fn expand_whole(&mut self, path: &str) {
        if !self.files.contains(path) || self.has_entries(path) {
            return;
        }
        if let Some(count) = self.hunk_count(path).filter(|&count| count > 0) {
            self.hunks.insert(path.to_string(), (0..count).collect());
        }
    }

    /// Re-establish whole-file membership from the hunk and line entries
    fn sync(&mut self, path: &str) {
        if self.hunks.get(path).is_some_and(BTreeSet::is_empty) {
            self.hunks.remove(path);
        }
        if self.lines.get(path).is_some_and(BTreeMap::is_empty) {
            self.lines.remove(path);
        }

        let selected_hunks = self.hunks.get(path).map_or(0, BTreeSet::len);
        let full = !self.lines.contains_key(path)
            && self
                .hunk_count(path)
                .is_some_and(|count| count > 0 && selected_hunks == count);

        if full {
            self.files.insert(path.to_string());
        } else {
            self.files.remove(path);
        }
    }
}

/// Saved state of one row during a drag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSnapshot {
    Marked(bool),
    Selection(PathSelection),
}

impl RowTarget<String> for SelectionState {
    type Snapshot = RowSnapshot;

    fn is_selected(&self, mode: DragMode, row: &String) -> bool {
        match mode {
            DragMode::FileSelect => self.tristate(row) == Tristate::Full,
            DragMode::DiffMark => self.is_marked(row),
        }
    }

    fn set_selected(&mut self, mode: DragMode, row: &String, on: bool) {
        match mode {
            DragMode::FileSelect => self.set_file_selected(row, on),
            DragMode::DiffMark => self.set_marked(row, on),
        }
    }

    fn snapshot(&self, mode: DragMode, row: &String) -> RowSnapshot {
        match mode {
            DragMode::FileSelect => RowSnapshot::Selection(SelectionState::snapshot(self, row)),
            DragMode::DiffMark => RowSnapshot::Marked(self.is_marked(row)),
        }
    }

    fn restore(&mut self, _mode: DragMode, row: &String, snapshot: RowSnapshot) {
        match snapshot {
            RowSnapshot::Selection(saved) => SelectionState::restore(self, row, saved),
            RowSnapshot::Marked(on) => self.set_marked(row, on),
        }
    }
}
