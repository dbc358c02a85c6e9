//! One commit-preparation session against a backend.
//!
//! [`CommitSession`] ties the pieces together: it keeps the status
//! snapshot, the loaded diffs and the selection, routes drag gestures to
//! the selection, and turns the selection into a patch for commit or
//! discard. Two guards live here:
//!
//! - every diff request carries a [`DiffTicket`]; a response that does not
//!   match the latest ticket is dropped
//! - between [`prepare`](CommitSession::prepare) and
//!   [`finish`](CommitSession::finish) no second operation may start

use crate::backend::{Backend, BackendError, ChangedPath, CommitMessage, PatchMode};
use crate::config::Settings;
use crate::diff::FileDiff;
use crate::drag::{DragMode, DragOutcome, Modifiers, Point, PointerButton, RangeSelector};
use crate::patch::synthesize_multi;
use crate::selection::{RowSnapshot, SelectionState, Tristate};
use error_set::error_set;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

error_set! {
    /// Errors from committing or discarding a selection
    SessionError := {
        #[display("Nothing is selected")]
        EmptySelection,
        #[display("The selection no longer matches the current diff; review and reselect")]
        StaleSelection,
        #[display("This backend cannot apply partial selections; select whole files for: {paths}")]
        PartialUnsupported { paths: String },
        #[display("Another commit or discard is still running")]
        OperationInFlight,
        #[display("No textual changes to apply for: {paths}")]
        NothingApplicable { paths: String },
        BackendError(BackendError),
    }
}

/// Tag of one diff request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffTicket {
    pub path: String,
    serial: u64,
}

/// A synthesized patch waiting to be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApply {
    pub patch: String,
    pub mode: PatchMode,
    /// Paths whose selection the patch was built from
    pub paths: Vec<String>,
}

pub struct CommitSession<B> {
    backend: B,
    selection: SelectionState,
    status: Vec<ChangedPath>,
    diffs: HashMap<String, FileDiff>,
    requested: Option<DiffTicket>,
    serial: u64,
    in_flight: bool,
    drag: RangeSelector<String, RowSnapshot>,
    rows: Vec<String>,
}

impl<B: Backend> CommitSession<B> {
    pub fn new(backend: B, settings: &Settings) -> Self {
        Self {
            backend,
            selection: SelectionState::new(),
            status: Vec::new(),
            diffs: HashMap::new(),
            requested: None,
            serial: 0,
            in_flight: false,
            drag: RangeSelector::new(settings.drag_threshold),
            rows: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionState {
        &mut self.selection
    }

    /// Last status snapshot
    pub fn status(&self) -> &[ChangedPath] {
        &self.status
    }

    /// The loaded diff for `path`, if any
    pub fn diff(&self, path: &str) -> Option<&FileDiff> {
        self.diffs.get(path)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Fetch the status and forget everything about paths that vanished.
    pub fn refresh_status(&mut self) -> Result<&[ChangedPath], SessionError> {
        self.status = self.backend.changed_paths()?;

        let present: Vec<&str> = self.status.iter().map(|c| c.path.as_str()).collect();
        self.selection.prune(present.iter().copied());
        self.diffs.retain(|path, _| present.contains(&path.as_str()));
        if self
            .requested
            .as_ref()
            .is_some_and(|ticket| !present.contains(&ticket.path.as_str()))
        {
            self.requested = None;
        }

        log::debug!("status: {} changed path(s)", self.status.len());
        Ok(&self.status)
    }

    /// Start a diff request for `path`; only the newest request is honoured
    pub fn request_diff(&mut self, path: &str) -> DiffTicket {
        self.serial += 1;
        let ticket = DiffTicket {
            path: path.to_string(),
            serial: self.serial,
        };
        self.requested = Some(ticket.clone());
        ticket
    }

    /// Deliver the response to `ticket`.
    ///
    /// Returns `false` and drops the lines when a newer request was made
    /// since.
    pub fn receive_diff(&mut self, ticket: &DiffTicket, lines: &[String]) -> bool {
        if self.requested.as_ref() != Some(ticket) {
            log::debug!("dropping stale diff response for {}", ticket.path);
            return false;
        }
        self.requested = None;
        self.load(&ticket.path, lines);
        true
    }

    /// Request, fetch and load the diff for `path`
    pub fn open(&mut self, path: &str) -> Result<&FileDiff, SessionError> {
        let ticket = self.request_diff(path);
        let lines = self.backend.diff_lines(path)?;
        self.requested = None;
        log::debug!("opened {} (request {})", ticket.path, ticket.serial);
        Ok(self.load(path, &lines))
    }

    fn load(&mut self, path: &str, lines: &[String]) -> &FileDiff {
        let diff = FileDiff::parse(path, lines);
        if self.diffs.get(path).is_some_and(|old| old.hunks != diff.hunks) {
            self.selection.forget_indices(path);
        }
        self.selection.set_active_diff(&diff);

        match self.diffs.entry(path.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(diff);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(diff),
        }
    }

    /// Status paths containing `query`, case-insensitively.
    ///
    /// The result is also the row list drag gestures refer to.
    pub fn visible_rows(&mut self, query: &str) -> &[String] {
        let query = query.to_lowercase();
        self.rows = self
            .status
            .iter()
            .map(|change| change.path.clone())
            .filter(|path| path.to_lowercase().contains(&query))
            .collect();
        &self.rows
    }

    pub fn pointer_down(
        &mut self,
        index: usize,
        point: Point,
        button: PointerButton,
        modifiers: Modifiers,
    ) -> bool {
        self.drag
            .pointer_down(&self.selection, &self.rows, index, point, button, modifiers)
    }

    pub fn pointer_move(&mut self, index: Option<usize>, point: Point) {
        self.drag.pointer_move(&mut self.selection, index, point);
    }

    /// End the gesture; a plain click toggles the row it landed on.
    pub fn pointer_up(&mut self) -> Option<DragOutcome<String>> {
        let outcome = self.drag.pointer_up()?;
        if outcome.is_click {
            let row = outcome.anchor.as_str();
            match outcome.mode {
                DragMode::FileSelect => {
                    let on = self.selection.tristate(row) != Tristate::Full;
                    self.selection.set_file_selected(row, on);
                }
                DragMode::DiffMark => {
                    let on = !self.selection.is_marked(row);
                    self.selection.set_marked(row, on);
                }
            }
        }
        Some(outcome)
    }

    pub fn cancel_drag(&mut self) {
        self.drag.cancel(&mut self.selection);
    }

    /// Build the patch for the current selection and mark the operation
    /// in flight.
    ///
    /// Whole-file selections are diffed afresh; hunk and line selections
    /// use the diff they were made against.
    pub fn prepare(&mut self, mode: PatchMode) -> Result<PendingApply, SessionError> {
        if self.in_flight {
            return Err(SessionError::OperationInFlight);
        }
        if self.selection.is_empty() {
            return Err(SessionError::EmptySelection);
        }

        let partial = self.selection.partial_paths();
        if !self.backend.capabilities().partial_patches && !partial.is_empty() {
            return Err(SessionError::PartialUnsupported {
                paths: partial.join(", "),
            });
        }

        let paths = self.selection.selected_paths();
        let mut diffs = HashMap::new();
        let mut index_based = false;

        for path in &paths {
            if self.selection.selected_hunks(path).is_some()
                || self.selection.selected_lines(path).is_some()
            {
                index_based = true;
                match self.diffs.get(path) {
                    Some(diff) => {
                        diffs.insert(path.clone(), diff.clone());
                    }
                    None => log::warn!("no diff loaded for partially selected {path}"),
                }
            } else {
                let lines = self.backend.diff_lines(path)?;
                diffs.insert(path.clone(), FileDiff::parse(path.as_str(), &lines));
            }
        }

        let patch = synthesize_multi(
            paths.iter().map(String::as_str),
            &diffs,
            &self.selection,
            mode.anchor(),
        );
        if patch.is_empty() {
            return Err(if index_based {
                SessionError::StaleSelection
            } else {
                SessionError::NothingApplicable {
                    paths: paths.join(", "),
                }
            });
        }

        self.in_flight = true;
        log::debug!("prepared patch for {} path(s)", paths.len());
        Ok(PendingApply { patch, mode, paths })
    }

    /// Record the backend's answer for `pending`.
    ///
    /// On success the patched paths' selections and diffs are dropped. A
    /// rejection is returned unchanged and nothing is retried.
    pub fn finish(
        &mut self,
        pending: PendingApply,
        result: Result<(), BackendError>,
    ) -> Result<(), SessionError> {
        self.in_flight = false;

        if let Err(e) = result {
            log::warn!("backend rejected patch: {e}");
            return Err(e.into());
        }

        for path in &pending.paths {
            self.selection.clear_path(path);
            self.diffs.remove(path);
            if self.selection.active_path() == Some(path.as_str()) {
                self.selection.clear_active();
            }
        }
        Ok(())
    }

    /// Commit exactly the selection
    pub fn commit(&mut self, message: CommitMessage) -> Result<(), SessionError> {
        self.run(PatchMode::Commit(message))
    }

    /// Throw away exactly the selection from the working tree
    pub fn discard(&mut self) -> Result<(), SessionError> {
        self.run(PatchMode::Discard)
    }

    fn run(&mut self, mode: PatchMode) -> Result<(), SessionError> {
        let pending = self.prepare(mode)?;
        let result = self.backend.apply_patch(&pending.patch, &pending.mode);
        self.finish(pending, result)?;
        self.refresh_status()?;
        Ok(())
    }
}
