//! Input bookkeeping the selection heuristics consult.

use web_time::Instant;

use crate::viewdesc::DescId;

/// What last moved the selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionOrigin {
    Pointer,
    Key,
}

/// Recent input activity, updated by the host's event handlers.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    /// An input method composition is in progress.
    pub composing: bool,
    /// Incremented for every composition session.
    pub composition_id: u32,
    /// Document changes made during the current composition.
    pub composition_pending_changes: u32,
    /// Composition descriptors resolved during the current session.
    pub composition_nodes: Vec<DescId>,
    pub last_focus: Option<Instant>,
    pub last_touch: Option<Instant>,
    pub last_click: Option<Instant>,
    pub last_key: Option<Instant>,
    pub last_selection_origin: Option<SelectionOrigin>,
    pub last_selection_time: Option<Instant>,
}

impl InputState {
    pub fn start_composition(&mut self) {
        self.composing = true;
        self.composition_id = self.composition_id.wrapping_add(1);
        self.composition_pending_changes = 0;
        self.composition_nodes.clear();
    }

    pub fn end_composition(&mut self) {
        self.composing = false;
        self.composition_pending_changes = 0;
    }

    /// Tag the next selection read with where it came from.
    pub fn set_selection_origin(&mut self, origin: SelectionOrigin, now: Instant) {
        self.last_selection_origin = Some(origin);
        self.last_selection_time = Some(now);
    }
}
