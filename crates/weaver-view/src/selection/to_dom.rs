use crate::dom::{Dom, DomId, DomPoint};
use crate::model::Selection;
use crate::viewdesc::DescTree;

/// Elements a caret can't be placed inside.
const ATOM_ELEMENTS: &[&str] = &["img", "br", "input", "textarea", "hr"];

/// DOM anchor and focus for a document selection.
pub fn selection_points(
    dom: &Dom,
    descs: &DescTree,
    selection: &Selection,
) -> Option<(DomPoint, DomPoint)> {
    let side = |pos: usize| if pos > 0 { -1 } else { 1 };
    let anchor = selection.anchor();
    let head = selection.head();
    let anchor_point = descs.dom_from_pos(dom, anchor, side(anchor))?;
    let head_point = if head == anchor {
        anchor_point
    } else {
        descs.dom_from_pos(dom, head, side(head))?
    };
    Some((anchor_point, head_point))
}

/// Whether two DOM points denote the same caret position, looking through
/// inline element boundaries.
pub fn is_equivalent_position(dom: &Dom, descs: &DescTree, a: DomPoint, b: DomPoint) -> bool {
    scan_for(dom, descs, a, b, -1) || scan_for(dom, descs, a, b, 1)
}

fn scan_for(dom: &Dom, descs: &DescTree, from: DomPoint, target: DomPoint, dir: i32) -> bool {
    let mut node = from.node;
    let mut offset = from.offset;
    loop {
        if node == target.node && offset == target.offset {
            return true;
        }
        let edge = if dir < 0 { 0 } else { dom.node_size(node) };
        if offset == edge {
            let Some(parent) = dom.parent(node) else {
                return false;
            };
            if has_block_desc(dom, descs, node) || is_atom_element(dom, node) || not_editable(dom, node)
            {
                return false;
            }
            let Some(index) = dom.index_of(node) else {
                return false;
            };
            offset = if dir < 0 { index } else { index + 1 };
            node = parent;
        } else if dom.is_element(node) {
            let index = if dir < 0 { offset.checked_sub(1) } else { Some(offset) };
            let Some(child) = index.and_then(|i| dom.child(node, i)) else {
                return false;
            };
            if not_editable(dom, child) {
                return false;
            }
            node = child;
            offset = if dir < 0 { dom.node_size(child) } else { 0 };
        } else {
            return false;
        }
    }
}

fn is_atom_element(dom: &Dom, node: DomId) -> bool {
    dom.tag(node).is_some_and(|tag| ATOM_ELEMENTS.contains(&tag))
}

fn not_editable(dom: &Dom, node: DomId) -> bool {
    dom.attr(node, "contenteditable") == Some("false")
}

/// Whether `node` is the outer or content DOM of a block node's
/// descriptor.
fn has_block_desc(dom: &Dom, descs: &DescTree, node: DomId) -> bool {
    let mut cur = Some(node);
    while let Some(scan) = cur {
        if let Some(desc) = dom.desc(scan).and_then(|id| descs.get(id)) {
            return desc.node().is_some_and(|n| n.is_block())
                && (desc.dom == node || desc.content_dom == Some(node));
        }
        cur = dom.parent(scan);
    }
    false
}
