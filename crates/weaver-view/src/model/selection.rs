//! Document-level selections.

use super::{Mapping, Node};

/// A selection in document positions.
///
/// `Text` covers cursors and ranges whose endpoints sit in textblocks.
/// `Node` selects exactly one selectable node, from its start to its end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    Text { anchor: usize, head: usize },
    Node { from: usize, to: usize },
}

impl Default for Selection {
    fn default() -> Self {
        Selection::cursor(0)
    }
}

impl Selection {
    pub fn text(anchor: usize, head: usize) -> Self {
        Selection::Text { anchor, head }
    }

    pub fn cursor(pos: usize) -> Self {
        Selection::Text {
            anchor: pos,
            head: pos,
        }
    }

    /// Select the node starting at `pos`, if there is a selectable one.
    pub fn node(doc: &Node, pos: usize) -> Option<Self> {
        let node = doc.node_at(pos)?;
        is_selectable(node).then(|| Selection::Node {
            from: pos,
            to: pos + node.node_size(),
        })
    }

    pub fn anchor(&self) -> usize {
        match *self {
            Selection::Text { anchor, .. } => anchor,
            Selection::Node { from, .. } => from,
        }
    }

    pub fn head(&self) -> usize {
        match *self {
            Selection::Text { head, .. } => head,
            Selection::Node { to, .. } => to,
        }
    }

    pub fn from(&self) -> usize {
        self.anchor().min(self.head())
    }

    pub fn to(&self) -> usize {
        self.anchor().max(self.head())
    }

    pub fn is_empty(&self) -> bool {
        self.anchor() == self.head()
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Selection::Node { .. })
    }

    /// The nearest valid selection to `pos`, searching in `bias` direction
    /// first.
    pub fn near(doc: &Node, pos: usize, bias: i32) -> Selection {
        if let Some(found) = find_text(doc, pos, bias).or_else(|| find_text(doc, pos, -bias)) {
            return Selection::cursor(found);
        }
        let mut first_node = None;
        doc.descendants(&mut |node, node_pos| {
            if first_node.is_none() && is_selectable(node) && node.is_atom() {
                first_node = Some(Selection::Node {
                    from: node_pos,
                    to: node_pos + node.node_size(),
                });
            }
            first_node.is_none()
        });
        first_node.unwrap_or_default()
    }

    /// A text selection between two positions, moving endpoints that sit
    /// outside textblocks to the nearest text position.
    pub fn between(doc: &Node, anchor: usize, head: usize, bias: i32) -> Selection {
        let d_pos = anchor as isize - head as isize;
        let bias = if bias == 0 || d_pos != 0 {
            if d_pos >= 0 { 1 } else { -1 }
        } else {
            bias
        };
        let mut head = head;
        if !in_textblock(doc, head) {
            match find_text(doc, head, bias).or_else(|| find_text(doc, head, -bias)) {
                Some(found) => head = found,
                None => return Selection::near(doc, head, bias),
            }
        }
        let mut anchor = anchor;
        if !in_textblock(doc, anchor) {
            if d_pos == 0 {
                anchor = head;
            } else {
                anchor = find_text(doc, anchor, -bias)
                    .or_else(|| find_text(doc, anchor, bias))
                    .unwrap_or(head);
                if (anchor < head) != (d_pos < 0) {
                    anchor = head;
                }
            }
        }
        Selection::text(anchor, head)
    }

    /// Map this selection through a document change.
    pub fn map(&self, doc: &Node, mapping: &Mapping) -> Selection {
        match *self {
            Selection::Text { anchor, head } => {
                let anchor = mapping.map(anchor, 1);
                let head = mapping.map(head, 1);
                Selection::between(doc, anchor, head, 1)
            }
            Selection::Node { from, .. } => {
                let result = mapping.map_result(from, 1);
                if result.deleted {
                    Selection::near(doc, result.pos, 1)
                } else {
                    Selection::node(doc, result.pos)
                        .unwrap_or_else(|| Selection::near(doc, result.pos, 1))
                }
            }
        }
    }
}

/// Whether the innermost node holding both ends of `prev` (in `prev_doc`)
/// starts somewhere else than the one holding `next` (in `doc`).
pub fn selection_context_changed(prev_doc: &Node, prev: &Selection, doc: &Node, next: &Selection) -> bool {
    let (Ok(before), Ok(after)) = (prev_doc.resolve(prev.anchor()), doc.resolve(next.anchor())) else {
        return true;
    };
    let depth = before
        .shared_depth(prev.head())
        .min(after.shared_depth(next.head()));
    before.start(depth) != after.start(depth)
}

/// Whether `node` may be the target of a node selection.
pub fn is_selectable(node: &Node) -> bool {
    !node.is_text() && node.ty().is_selectable()
}

/// Content ranges of every textblock in the document.
fn text_ranges(doc: &Node) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    if doc.is_textblock() {
        ranges.push((0, doc.content_size()));
        return ranges;
    }
    doc.descendants(&mut |node, pos| {
        if node.is_textblock() {
            ranges.push((pos + 1, pos + 1 + node.content_size()));
            false
        } else {
            true
        }
    });
    ranges
}

fn in_textblock(doc: &Node, pos: usize) -> bool {
    text_ranges(doc)
        .iter()
        .any(|&(start, end)| start <= pos && pos <= end)
}

/// The closest text position at or beyond `pos` in direction `dir`.
fn find_text(doc: &Node, pos: usize, dir: i32) -> Option<usize> {
    let ranges = text_ranges(doc);
    if dir > 0 {
        ranges
            .iter()
            .find(|&&(_, end)| end >= pos)
            .map(|&(start, _)| start.max(pos))
    } else {
        ranges
            .iter()
            .rev()
            .find(|&&(start, _)| start <= pos)
            .map(|&(_, end)| end.min(pos))
    }
}
