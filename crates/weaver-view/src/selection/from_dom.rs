use tracing::trace;

use super::DomSelectionRange;
use crate::dom::Dom;
use crate::input::SelectionOrigin;
use crate::model::{EditorState, Selection, is_selectable};
use crate::props::CreateSelectionFn;
use crate::viewdesc::DescTree;

/// Resolve a native selection to a document selection.
///
/// Returns `None` when either end can't be mapped into the document, which
/// is expected while the DOM is in flux. `origin` picks the direction to
/// lean when an endpoint is ambiguous.
pub fn selection_from_dom(
    dom: &Dom,
    descs: &DescTree,
    range: &DomSelectionRange,
    state: &EditorState,
    origin: Option<SelectionOrigin>,
    create_between: Option<&CreateSelectionFn>,
) -> Option<Selection> {
    let focus = range.focus?;
    let doc = state.doc();
    let nearest = descs.nearest_desc(dom, focus.node, false);
    let in_widget = nearest.is_some_and(|id| descs.size(id) == 0);
    let head = descs.pos_from_dom(dom, focus.node, focus.offset, 1)?;
    if head > doc.content_size() {
        return None;
    }

    let anchor;
    if range.collapsed() {
        anchor = head;
        let mut node_desc = nearest;
        while let Some(id) = node_desc {
            match descs.get(id) {
                Some(desc) if desc.node().is_none() => node_desc = desc.parent,
                _ => break,
            }
        }
        if let Some(id) = node_desc {
            if let Some(desc) = descs.get(id) {
                let on_inline_edge = desc.node().is_some_and(|n| n.is_inline())
                    && dom.is_on_edge(focus.node, focus.offset, desc.dom);
                let atom = desc
                    .node()
                    .filter(|n| n.is_atom() && is_selectable(n) && !n.is_text());
                if let (Some(node), Some(_)) = (atom, desc.parent) {
                    if !on_inline_edge {
                        let from = descs.pos_before(id);
                        trace!(target: "weaver::selection", from, "collapsed selection inside an atom");
                        return Some(Selection::Node {
                            from,
                            to: from + node.node_size(),
                        });
                    }
                }
            }
        }
    } else {
        let anchor_point = range.anchor?;
        anchor = descs.pos_from_dom(dom, anchor_point.node, anchor_point.offset, 1)?;
        if anchor > doc.content_size() {
            return None;
        }
        let (from, to) = (anchor.min(head), anchor.max(head));
        if let Some(node) = doc.node_at(from) {
            if node.is_atom() && is_selectable(node) && from + node.node_size() == to {
                trace!(target: "weaver::selection", from, to, "range covers exactly one atom");
                return Some(Selection::Node { from, to });
            }
        }
    }

    let bias = if origin == Some(SelectionOrigin::Pointer)
        || (state.selection().head() < head && !in_widget)
    {
        1
    } else {
        -1
    };
    if let Some(create) = create_between {
        if let Some(selection) = create(state, anchor, head) {
            return Some(selection);
        }
    }
    Some(Selection::between(doc, anchor, head, bias))
}
