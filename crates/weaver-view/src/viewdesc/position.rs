//! Mapping between DOM points and document positions through the
//! descriptor tree.

use tracing::trace;

use super::{DescId, DescKind, DescTree};
use crate::dom::{Dom, DomId, DomPoint};

impl DescTree {
    /// The descriptor annotated on `node`, if it is part of this tree.
    pub fn desc_of(&self, dom: &Dom, node: DomId) -> Option<DescId> {
        let id = dom.desc(node)?;
        let root = self.root?;
        let mut cur = id;
        loop {
            if cur == root {
                return Some(id);
            }
            cur = self.get(cur)?.parent?;
        }
    }

    /// The innermost descriptor whose DOM contains `node`. With
    /// `only_nodes`, widgets, marks and other non-node descriptors are
    /// skipped.
    pub fn nearest_desc(&self, dom: &Dom, node: DomId, only_nodes: bool) -> Option<DescId> {
        let mut first = true;
        let mut cur = Some(node);
        while let Some(scan) = cur {
            if let Some(id) = self.desc_of(dom, scan) {
                let desc = self.get(id)?;
                if !only_nodes || desc.node().is_some() {
                    // A node inside the descriptor's DOM but outside its node
                    // DOM (a decoration wrapper, say) does not count for the
                    // first match.
                    let outside = first
                        && desc.node_dom().is_some_and(|node_dom| {
                            if dom.is_element(node_dom) {
                                let target = if dom.is_element(node) {
                                    Some(node)
                                } else {
                                    dom.parent(node)
                                };
                                !target.is_some_and(|t| dom.contains(node_dom, t))
                            } else {
                                node_dom != node
                            }
                        });
                    if outside {
                        first = false;
                    } else {
                        return Some(id);
                    }
                }
            }
            cur = dom.parent(scan);
        }
        None
    }

    /// Resolve a DOM point to a document position. `None` when the point
    /// is outside the tree.
    pub fn pos_from_dom(&self, dom: &Dom, node: DomId, offset: usize, bias: i32) -> Option<usize> {
        let mut scan = Some(node);
        while let Some(cur) = scan {
            if let Some(id) = self.desc_of(dom, cur) {
                return Some(self.local_pos_from_dom(dom, id, node, offset, bias));
            }
            scan = dom.parent(cur);
        }
        trace!(target: "weaver::viewdesc", ?node, offset, "dom point outside the view");
        None
    }

    fn local_pos_from_dom(
        &self,
        dom: &Dom,
        id: DescId,
        node: DomId,
        offset: usize,
        bias: i32,
    ) -> usize {
        let Some(desc) = self.get(id) else {
            return 0;
        };
        match &desc.kind {
            DescKind::Text(text) if text.node_dom == node => {
                return self.pos_at_start(id) + offset.min(text.node.node_size());
            }
            DescKind::Composition(comp) => {
                return if comp.text_dom == node {
                    self.pos_at_start(id) + offset.min(self.size(id))
                } else {
                    self.pos_at_start(id) + if offset > 0 { self.size(id) } else { 0 }
                };
            }
            _ => {}
        }

        if let Some(content) = desc.content_dom {
            let target = if dom.is_element(node) {
                Some(node)
            } else {
                dom.parent(node)
            };
            if target.is_some_and(|t| dom.contains(content, t)) {
                return if bias < 0 {
                    self.pos_before_dom(dom, id, content, node, offset)
                } else {
                    self.pos_after_dom(dom, id, content, node, offset)
                };
            }
        }

        let mut at_end = None;
        if let (true, Some(content)) = (node == desc.dom, desc.content_dom) {
            at_end = Some(dom.index_of(content).is_some_and(|index| offset > index));
        } else if let Some(content) = desc
            .content_dom
            .filter(|&content| content != desc.dom && dom.contains(desc.dom, content))
        {
            at_end = Some(dom.precedes(content, node));
        } else if dom.first_child(desc.dom).is_some() {
            if offset == 0 {
                let mut search = Some(node);
                while let Some(cur) = search {
                    if cur == desc.dom {
                        at_end = Some(false);
                        break;
                    }
                    if dom.previous_sibling(cur).is_some() {
                        break;
                    }
                    search = dom.parent(cur);
                }
            }
            if at_end.is_none() && offset == dom.children(node).len() {
                let mut search = Some(node);
                while let Some(cur) = search {
                    if cur == desc.dom {
                        at_end = Some(true);
                        break;
                    }
                    if dom.next_sibling(cur).is_some() {
                        break;
                    }
                    search = dom.parent(cur);
                }
            }
        }
        if at_end.unwrap_or(bias > 0) {
            self.pos_at_end(id)
        } else {
            self.pos_at_start(id)
        }
    }

    /// Position after the last child descriptor before the point.
    fn pos_before_dom(
        &self,
        dom: &Dom,
        id: DescId,
        content: DomId,
        node: DomId,
        offset: usize,
    ) -> usize {
        let mut before = if node == content {
            offset.checked_sub(1).and_then(|i| dom.child(content, i))
        } else {
            self.child_of(dom, content, node)
                .and_then(|child| dom.previous_sibling(child))
        };
        while let Some(cur) = before {
            if let Some(child) = self.child_desc(dom, id, cur) {
                return self.pos_before(child) + self.size(child);
            }
            before = dom.previous_sibling(cur);
        }
        self.pos_at_start(id)
    }

    /// Position before the first child descriptor after the point.
    fn pos_after_dom(
        &self,
        dom: &Dom,
        id: DescId,
        content: DomId,
        node: DomId,
        offset: usize,
    ) -> usize {
        let mut after = if node == content {
            dom.child(content, offset)
        } else {
            self.child_of(dom, content, node)
                .and_then(|child| dom.next_sibling(child))
        };
        while let Some(cur) = after {
            if let Some(child) = self.child_desc(dom, id, cur) {
                return self.pos_before(child);
            }
            after = dom.next_sibling(cur);
        }
        self.pos_at_end(id)
    }

    /// The ancestor of `node` (inclusive) that is a direct child of
    /// `content`.
    fn child_of(&self, dom: &Dom, content: DomId, node: DomId) -> Option<DomId> {
        let mut cur = node;
        while dom.parent(cur) != Some(content) {
            cur = dom.parent(cur)?;
        }
        Some(cur)
    }

    /// The descriptor on `node` if it is a direct child of `parent`.
    fn child_desc(&self, dom: &Dom, parent: DescId, node: DomId) -> Option<DescId> {
        let child = dom.desc(node)?;
        (self.get(child)?.parent == Some(parent)).then_some(child)
    }

    /// The descriptor starting at `pos`, or the innermost one around it.
    pub fn desc_at(&self, pos: usize) -> Option<DescId> {
        self.desc_at_in(self.root?, pos)
    }

    fn desc_at_in(&self, id: DescId, pos: usize) -> Option<DescId> {
        let mut offset = 0;
        for &child in self.children(id) {
            let end = offset + self.size(child);
            if offset == pos && end != offset {
                let mut found = child;
                while self.border(found) == 0 && !self.children(found).is_empty() {
                    match self
                        .children(found)
                        .iter()
                        .copied()
                        .find(|&inner| self.size(inner) > 0)
                    {
                        Some(inner) => found = inner,
                        None => break,
                    }
                }
                return Some(found);
            }
            if pos < end {
                return self.desc_at_in(child, pos - offset - self.border(child));
            }
            offset = end;
        }
        None
    }

    /// Resolve a document position to a DOM point. `side` says which
    /// neighbour to prefer at a boundary: negative for the content before,
    /// positive for the content after.
    pub fn dom_from_pos(&self, dom: &Dom, pos: usize, side: i32) -> Option<DomPoint> {
        self.dom_from_pos_in(dom, self.root?, pos, side)
    }

    fn dom_from_pos_in(&self, dom: &Dom, id: DescId, pos: usize, side: i32) -> Option<DomPoint> {
        let desc = self.get(id)?;
        match &desc.kind {
            DescKind::Text(text) => return Some(DomPoint::new(text.node_dom, pos)),
            DescKind::Composition(comp) => return Some(DomPoint::new(comp.text_dom, pos)),
            _ => {}
        }
        let Some(content) = desc.content_dom else {
            return Some(DomPoint::new(desc.dom, 0));
        };
        let children = self.children(id);

        let mut i = 0;
        let mut offset = 0;
        let mut cur = 0;
        while i < children.len() {
            let child = children[i];
            let end = cur + self.size(child);
            if end > pos || self.get(child).is_some_and(|c| c.is_trailing_hack()) {
                offset = pos.saturating_sub(cur);
                break;
            }
            cur = end;
            i += 1;
        }
        if offset > 0 {
            let child = children[i];
            return self.dom_from_pos_in(dom, child, offset - self.border(child), side);
        }

        // Step back over zero-size widgets that stick to what follows them.
        while i > 0 {
            let prev = children[i - 1];
            let sticky = match self.get(prev).map(|d| &d.kind) {
                Some(DescKind::Widget(widget)) => widget.side() >= 0,
                _ => false,
            };
            if self.size(prev) == 0 && sticky {
                i -= 1;
            } else {
                break;
            }
        }

        let direct = |child: DescId| {
            self.get(child)
                .is_some_and(|c| dom.parent(c.dom) == Some(content))
        };
        let enterable = |child: DescId| {
            self.border(child) == 0 && !self.get(child).is_some_and(|c| c.dom_atom())
        };

        if side <= 0 {
            let mut enter = true;
            let mut prev;
            loop {
                prev = i.checked_sub(1).map(|p| children[p]);
                match prev {
                    Some(p) if !direct(p) => {
                        i -= 1;
                        enter = false;
                    }
                    _ => break,
                }
            }
            if let Some(p) = prev {
                if side != 0 && enter && enterable(p) {
                    return self.dom_from_pos_in(dom, p, self.size(p), side);
                }
            }
            let index = prev
                .and_then(|p| self.get(p))
                .and_then(|p| dom.index_of(p.dom))
                .map_or(0, |index| index + 1);
            Some(DomPoint::new(content, index))
        } else {
            let mut enter = true;
            let mut next;
            loop {
                next = children.get(i).copied();
                match next {
                    Some(n) if !direct(n) => {
                        i += 1;
                        enter = false;
                    }
                    _ => break,
                }
            }
            if let Some(n) = next {
                if enter && enterable(n) {
                    return self.dom_from_pos_in(dom, n, 0, side);
                }
            }
            let index = next
                .and_then(|n| self.get(n))
                .and_then(|n| dom.index_of(n.dom))
                .unwrap_or_else(|| dom.children(content).len());
            Some(DomPoint::new(content, index))
        }
    }
}
