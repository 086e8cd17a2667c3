use tracing::{debug, trace};

use super::{DomSelectionRange, is_equivalent_position, selection_from_dom, selection_points};
use crate::config::within;
use crate::input::SelectionOrigin;
use crate::model::Selection;
use crate::props::ViewMutation;
use crate::view::EditorView;

impl EditorView {
    /// Handle a native selection change notification.
    pub fn on_selection_change(&mut self) {
        if !self.has_focus() {
            return;
        }
        let range = self.native.range();
        if range.focus.is_none() {
            return;
        }
        if self.input.composing {
            trace!(target: "weaver::selection", "ignoring selection change during composition");
            return;
        }
        let now = self.now();
        if self.suppress_until.is_some_and(|until| now < until) {
            // Restore the native selection instead of reading it; the
            // snapshot then holds what we wrote.
            trace!(target: "weaver::selection", "selection change inside suppression window");
            let selection = self.state().selection();
            self.selection_to_dom(&selection, false);
            return;
        }
        if range == self.last_snapshot {
            return;
        }
        if self.ignore_selection_change(&range) {
            return;
        }
        self.flush_selection();
    }

    /// Whether the selection sits inside a descriptor that opted out of
    /// selection handling. The selection is still recorded.
    fn ignore_selection_change(&mut self, range: &DomSelectionRange) -> bool {
        let (Some(anchor), Some(focus)) = (range.anchor, range.focus) else {
            return true;
        };
        let mut ancestors = Vec::new();
        let mut scan = Some(focus.node);
        while let Some(node) = scan {
            ancestors.push(node);
            scan = self.dom.parent(node);
        }
        let mut container = None;
        let mut scan = Some(anchor.node);
        while let Some(node) = scan {
            if ancestors.contains(&node) {
                container = Some(node);
                break;
            }
            scan = self.dom.parent(node);
        }
        let Some(container) = container else {
            return false;
        };
        let ignored = self
            .descs
            .nearest_desc(&self.dom, container, false)
            .and_then(|id| self.descs.get(id))
            .is_some_and(|desc| desc.ignore_mutation(&ViewMutation::Selection));
        if ignored {
            trace!(target: "weaver::selection", "selection inside a view that ignores it");
            self.last_snapshot = *range;
        }
        ignored
    }

    /// Read the native selection into the document state.
    pub fn flush_selection(&mut self) {
        let range = self.native.range();
        self.last_snapshot = range;
        let origin = self.selection_origin();
        let create_between = self.some_prop(|p| p.create_selection_between.clone());
        let state = self.state().clone();
        let Some(selection) = selection_from_dom(
            &self.dom,
            &self.descs,
            &range,
            &state,
            origin,
            create_between.as_ref(),
        ) else {
            trace!(target: "weaver::selection", ?range, "native selection outside the document");
            return;
        };

        if self.is_focus_reset(&range, &selection) {
            debug!(target: "weaver::selection", "restoring selection after focus reset it");
            self.input.last_focus = None;
            self.selection_to_dom(&state.selection(), true);
            return;
        }

        if selection != state.selection() {
            self.update_selection(selection, origin);
        }
    }

    /// Browsers put the caret at the document start when an editor gains
    /// focus. Unless the user clicked there, that isn't a real selection.
    fn is_focus_reset(&self, range: &DomSelectionRange, read: &Selection) -> bool {
        let now = self.now();
        let state = self.state();
        within(now, self.input.last_focus, self.config.focus_reset_window())
            && !within(now, self.input.last_click, self.config.pointer_quiet_window())
            && !within(now, self.input.last_touch, self.config.pointer_quiet_window())
            && range.collapsed()
            && *read == Selection::near(state.doc(), 0, 1)
            && *read != state.selection()
    }

    fn selection_origin(&self) -> Option<SelectionOrigin> {
        let now = self.now();
        within(
            now,
            self.input.last_selection_time,
            self.config.selection_origin_window(),
        )
        .then_some(self.input.last_selection_origin)
        .flatten()
    }

    fn update_selection(&mut self, selection: Selection, origin: Option<SelectionOrigin>) {
        debug!(target: "weaver::selection", ?selection, ?origin, "native selection changed");
        let mut tr = self.state().tr();
        tr.set_selection(selection);
        if origin == Some(SelectionOrigin::Pointer) {
            tr.meta.pointer = true;
        } else {
            tr.meta.scroll_into_view = true;
        }
        self.dispatch(tr);
    }

    /// Write `selection` to the native selection unless it already shows
    /// the same position. Opens the suppression window after a write.
    pub(crate) fn selection_to_dom(&mut self, selection: &Selection, force: bool) {
        if !self.editable_owns_selection() {
            return;
        }
        let Some((anchor, head)) = selection_points(&self.dom, &self.descs, selection) else {
            trace!(target: "weaver::selection", ?selection, "no dom position for selection");
            return;
        };
        let current = self.native.range();
        if !force {
            let same = |point: Option<crate::dom::DomPoint>, target| {
                point.is_some_and(|point| {
                    point == target || is_equivalent_position(&self.dom, &self.descs, point, target)
                })
            };
            if same(current.anchor, anchor) && same(current.focus, head) {
                self.last_snapshot = current;
                return;
            }
        }
        self.native.set(anchor, head);
        self.last_snapshot = self.native.range();
        self.suppress_until = Some(self.now() + self.config.suppress_selection_window());
        trace!(target: "weaver::selection", ?anchor, ?head, "wrote native selection");
    }

    fn editable_owns_selection(&self) -> bool {
        if self.is_editable() {
            return self.has_focus();
        }
        self.native
            .range()
            .focus
            .is_some_and(|focus| self.dom.is_attached(focus.node))
    }
}
