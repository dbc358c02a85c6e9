//! Click-and-drag range selection over a list of rows.
//!
//! [`RangeSelector`] is a two-state machine (idle, dragging) driven by
//! pointer events. While dragging, every visible row between the anchor and
//! the cursor is forced to one target state and every other row is put back
//! exactly as it was when the drag started. Dragging out and back to the
//! anchor therefore leaves the selection untouched.

use std::collections::HashSet;
use std::hash::Hash;

/// Which selection a drag operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    /// Commit selection of whole files
    FileSelect,
    /// Marks for multi-file diff viewing
    DiffMark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Modifier keys held at pointer-down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Drag marks rows for diff viewing instead of selecting them
    pub mark_for_view: bool,
    /// Explicit commit-selection modifier, same as no modifier
    pub commit_toggle: bool,
}

impl Modifiers {
    fn mode(self) -> DragMode {
        if self.mark_for_view {
            DragMode::DiffMark
        } else {
            DragMode::FileSelect
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Something whose rows can be selected by a drag
pub trait RowTarget<T> {
    /// Saved state of a single row
    type Snapshot: Clone;

    fn is_selected(&self, mode: DragMode, row: &T) -> bool;
    fn set_selected(&mut self, mode: DragMode, row: &T, on: bool);
    fn snapshot(&self, mode: DragMode, row: &T) -> Self::Snapshot;
    fn restore(&mut self, mode: DragMode, row: &T, snapshot: Self::Snapshot);
}

impl<T: Eq + Hash + Clone> RowTarget<T> for HashSet<T> {
    type Snapshot = bool;

    fn is_selected(&self, _mode: DragMode, row: &T) -> bool {
        self.contains(row)
    }

    fn set_selected(&mut self, _mode: DragMode, row: &T, on: bool) {
        if on {
            self.insert(row.clone());
        } else {
            self.remove(row);
        }
    }

    fn snapshot(&self, _mode: DragMode, row: &T) -> bool {
        self.contains(row)
    }

    fn restore(&mut self, mode: DragMode, row: &T, snapshot: bool) {
        self.set_selected(mode, row, snapshot);
    }
}

/// Result of releasing the pointer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragOutcome<T> {
    pub mode: DragMode,
    /// Row the drag started on
    pub anchor: T,
    /// The pointer travelled beyond the threshold; swallow the click event
    /// that follows the release
    pub suppress_click: bool,
    /// Neither the pointer nor the cursor row moved
    pub is_click: bool,
}

#[derive(Debug, Clone)]
struct DragSession<T, S> {
    mode: DragMode,
    anchor: usize,
    cursor: usize,
    rows: Vec<T>,
    baseline: Vec<S>,
    target: bool,
    origin: Point,
    moved: bool,
}

#[derive(Debug, Clone)]
enum DragState<T, S> {
    Idle,
    Dragging(DragSession<T, S>),
}

/// Drag-to-select state machine over rows of type `T`, saving row state as
/// `S` (the target's [`RowTarget::Snapshot`])
#[derive(Debug, Clone)]
pub struct RangeSelector<T, S> {
    threshold: f64,
    state: DragState<T, S>,
}

impl<T: Clone, S: Clone> RangeSelector<T, S> {
    /// `threshold` is the pointer travel, in pixels, that counts as a drag
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            state: DragState::Idle,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// Current anchor and cursor indices, while dragging
    pub fn range(&self) -> Option<(usize, usize)> {
        match &self.state {
            DragState::Dragging(session) => Some((session.anchor, session.cursor)),
            DragState::Idle => None,
        }
    }

    /// Start a drag on `rows[index]`.
    ///
    /// Returns whether a drag started: only the primary button over an
    /// existing row does. Every visible row is snapshotted as the baseline.
    pub fn pointer_down<R>(
        &mut self,
        target: &R,
        rows: &[T],
        index: usize,
        point: Point,
        button: PointerButton,
        modifiers: Modifiers,
    ) -> bool
    where
        R: RowTarget<T, Snapshot = S>,
    {
        if button != PointerButton::Primary {
            return false;
        }
        let Some(anchor_row) = rows.get(index) else {
            return false;
        };
        if self.is_dragging() {
            log::debug!("pointer down during drag, keeping previous range");
        }

        let mode = modifiers.mode();
        let target_state = match mode {
            DragMode::DiffMark => true,
            DragMode::FileSelect => !target.is_selected(mode, anchor_row),
        };
        let baseline = rows.iter().map(|row| target.snapshot(mode, row)).collect();

        self.state = DragState::Dragging(DragSession {
            mode,
            anchor: index,
            cursor: index,
            rows: rows.to_vec(),
            baseline,
            target: target_state,
            origin: point,
            moved: false,
        });
        true
    }

    /// Follow the pointer. `index` is the visible row under it, if any.
    pub fn pointer_move<R>(&mut self, target: &mut R, index: Option<usize>, point: Point)
    where
        R: RowTarget<T, Snapshot = S>,
    {
        let DragState::Dragging(session) = &mut self.state else {
            return;
        };

        if session.origin.distance(point) > self.threshold {
            session.moved = true;
        }

        let Some(index) = index.filter(|&i| i < session.rows.len()) else {
            return;
        };
        if index == session.cursor {
            return;
        }
        session.cursor = index;
        session.apply(target);
    }

    /// Finish the drag, keeping the last computed range.
    pub fn pointer_up(&mut self) -> Option<DragOutcome<T>> {
        let DragState::Dragging(session) = std::mem::replace(&mut self.state, DragState::Idle) else {
            return None;
        };

        let anchor = session.rows.get(session.anchor)?.clone();
        Some(DragOutcome {
            mode: session.mode,
            anchor,
            suppress_click: session.moved,
            is_click: !session.moved && session.cursor == session.anchor,
        })
    }

    /// Abort the drag and put every row back to its baseline.
    pub fn cancel<R>(&mut self, target: &mut R)
    where
        R: RowTarget<T, Snapshot = S>,
    {
        if let DragState::Dragging(mut session) = std::mem::replace(&mut self.state, DragState::Idle)
        {
            session.cursor = session.anchor;
            session.apply(target);
        }
    }
}

impl<T, S: Clone> DragSession<T, S> {
    /// Force the anchor..=cursor range to the target, restore the rest
    fn apply<R>(&self, target: &mut R)
    where
        R: RowTarget<T, Snapshot = S>,
    {
        let (low, high) = (self.anchor.min(self.cursor), self.anchor.max(self.cursor));
        let ranged = self.anchor != self.cursor;

        for (i, (row, saved)) in self.rows.iter().zip(&self.baseline).enumerate() {
            if ranged && (low..=high).contains(&i) {
                target.set_selected(self.mode, row, self.target);
            } else {
                target.restore(self.mode, row, saved.clone());
            }
        }
    }
}
