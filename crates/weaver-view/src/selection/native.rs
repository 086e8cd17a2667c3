use std::cell::RefCell;
use std::rc::Rc;

use crate::dom::DomPoint;

/// Snapshot of a native selection. Compared structurally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DomSelectionRange {
    pub anchor: Option<DomPoint>,
    pub focus: Option<DomPoint>,
}

impl DomSelectionRange {
    pub fn new(anchor: DomPoint, focus: DomPoint) -> Self {
        Self {
            anchor: Some(anchor),
            focus: Some(focus),
        }
    }

    pub fn collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// The host's selection, expressed in nodes of the view's DOM arena.
pub trait NativeSelection {
    fn range(&self) -> DomSelectionRange;

    fn set(&mut self, anchor: DomPoint, focus: DomPoint);

    /// Whether the editable element has focus.
    fn has_focus(&self) -> bool;
}

#[derive(Debug, Default)]
struct SimulatedState {
    range: DomSelectionRange,
    focused: bool,
    writes: usize,
}

/// In-memory selection for hosts without a native one, and for tests.
/// Clones share state, so a test can keep a handle after giving one to a
/// view.
#[derive(Clone, Debug, Default)]
pub struct SimulatedSelection(Rc<RefCell<SimulatedState>>);

impl SimulatedSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the selection as the user would. Not counted as a write.
    pub fn set_range(&self, anchor: DomPoint, focus: DomPoint) {
        self.0.borrow_mut().range = DomSelectionRange::new(anchor, focus);
    }

    pub fn collapse(&self, point: DomPoint) {
        self.set_range(point, point);
    }

    pub fn clear(&self) {
        self.0.borrow_mut().range = DomSelectionRange::default();
    }

    pub fn focus(&self) {
        self.0.borrow_mut().focused = true;
    }

    pub fn blur(&self) {
        self.0.borrow_mut().focused = false;
    }

    /// How many times the view wrote the selection.
    pub fn writes(&self) -> usize {
        self.0.borrow().writes
    }

    pub fn current(&self) -> DomSelectionRange {
        self.0.borrow().range
    }
}

impl NativeSelection for SimulatedSelection {
    fn range(&self) -> DomSelectionRange {
        self.current()
    }

    fn set(&mut self, anchor: DomPoint, focus: DomPoint) {
        let mut state = self.0.borrow_mut();
        state.range = DomSelectionRange::new(anchor, focus);
        state.writes += 1;
    }

    fn has_focus(&self) -> bool {
        self.0.borrow().focused
    }
}
