//! Native selection backed by `window.getSelection()`.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;
use weaver_view::dom::DomPoint;
use weaver_view::selection::{DomSelectionRange, NativeSelection};

use crate::mirror::DomMirror;

struct Inner {
    mirror: Rc<RefCell<DomMirror>>,
    /// A write whose nodes may not be in the browser yet. Applied after the
    /// next mirror sync.
    pending: Option<(DomPoint, DomPoint)>,
}

/// Reads and writes the browser selection in terms of arena nodes.
///
/// Writes happen while the view commits a render, before the mirror has
/// created the nodes they point at, so they are held until
/// [`BrowserSelection::apply_pending`]. Clones share state.
#[derive(Clone)]
pub struct BrowserSelection(Rc<RefCell<Inner>>);

impl BrowserSelection {
    pub fn new(mirror: Rc<RefCell<DomMirror>>) -> Self {
        Self(Rc::new(RefCell::new(Inner {
            mirror,
            pending: None,
        })))
    }

    /// Push a held write to the browser.
    pub fn apply_pending(&self) {
        let Some((anchor, focus)) = self.0.borrow_mut().pending.take() else {
            return;
        };
        let inner = self.0.borrow();
        let mirror = inner.mirror.borrow();
        let (Some(anchor_node), Some(focus_node)) = (mirror.node(anchor.node), mirror.node(focus.node))
        else {
            trace!(target: "weaver::selection", "selection target is not mirrored, dropping write");
            return;
        };
        let Some(selection) = gloo_utils::window().get_selection().ok().flatten() else {
            return;
        };
        if let Err(err) = selection.set_base_and_extent(
            anchor_node,
            anchor.offset as u32,
            focus_node,
            focus.offset as u32,
        ) {
            tracing::warn!(target: "weaver::selection", ?err, "set_base_and_extent failed");
        }
    }
}

impl NativeSelection for BrowserSelection {
    fn range(&self) -> DomSelectionRange {
        let inner = self.0.borrow();
        if let Some((anchor, focus)) = inner.pending {
            return DomSelectionRange::new(anchor, focus);
        }
        let Some(selection) = gloo_utils::window().get_selection().ok().flatten() else {
            return DomSelectionRange::default();
        };
        let mirror = inner.mirror.borrow();
        let point = |node: Option<web_sys::Node>, offset: u32| {
            let id = mirror.id_of(&node?)?;
            Some(DomPoint::new(id, offset as usize))
        };
        DomSelectionRange {
            anchor: point(selection.anchor_node(), selection.anchor_offset()),
            focus: point(selection.focus_node(), selection.focus_offset()),
        }
    }

    fn set(&mut self, anchor: DomPoint, focus: DomPoint) {
        self.0.borrow_mut().pending = Some((anchor, focus));
    }

    fn has_focus(&self) -> bool {
        let inner = self.0.borrow();
        let mirror = inner.mirror.borrow();
        gloo_utils::document()
            .active_element()
            .is_some_and(|active| mirror.mount().contains(Some(&*active)))
    }
}
