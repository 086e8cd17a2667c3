//! Document commands that need view-level bookkeeping.

use std::collections::BTreeMap;

use crate::model::{EditorState, Transaction};

/// Reorder the children of the node whose content starts at `pos`.
///
/// `order[i]` is the current index of the child that should end up at
/// index `i`, so `[1, 0, 2]` swaps the first two of three children. The
/// transaction records where each child moved, so node keys follow their
/// nodes instead of being dropped by the replace.
///
/// Returns `false` without dispatching when `pos` is not the start of a
/// node's content, or `order` is not a permutation of its children.
pub fn reorder_siblings(
    pos: usize,
    order: &[usize],
    state: &EditorState,
    dispatch: Option<&mut dyn FnMut(Transaction)>,
) -> bool {
    let Ok(resolved) = state.doc().resolve(pos) else {
        return false;
    };
    if resolved.start(resolved.depth()) != pos {
        return false;
    }
    let parent = resolved.parent().clone();
    let children = parent.children();
    let mut seen = vec![false; children.len()];
    if order.len() != children.len()
        || order
            .iter()
            .any(|&i| i >= children.len() || std::mem::replace(&mut seen[i], true))
    {
        return false;
    }
    let Some(dispatch) = dispatch else {
        return true;
    };

    let old_positions: Vec<usize> = parent
        .children_with_offsets()
        .map(|(offset, _)| pos + offset)
        .collect();
    let reordered: Vec<_> = order.iter().map(|&i| children[i].clone()).collect();

    let mut overrides = BTreeMap::new();
    let mut start = pos;
    for (new_index, node) in reordered.iter().enumerate() {
        overrides.insert(old_positions[order[new_index]], start);
        start += node.node_size();
    }

    let mut tr = state.tr();
    if tr
        .replace_with(pos, pos + parent.content_size(), reordered)
        .is_err()
    {
        return false;
    }
    tr.meta.key_overrides = Some(overrides);
    dispatch(tr);
    true
}
