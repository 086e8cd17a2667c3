//! Arena model of the rendered DOM.
//!
//! The renderer creates, moves and removes nodes here. The view layer only
//! reads the structure and annotates nodes with the descriptor that owns
//! them.

use std::fmt::Write as _;

use slotmap::SlotMap;
use smol_str::SmolStr;

use crate::model::{Attrs, utf16_len};
use crate::viewdesc::DescId;

slotmap::new_key_type! {
    /// Handle to a node in the [`Dom`] arena.
    pub struct DomId;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomKind {
    Element {
        tag: SmolStr,
        attrs: Attrs,
        classes: Vec<SmolStr>,
    },
    Text {
        data: String,
    },
}

#[derive(Clone, Debug)]
pub struct DomNode {
    pub kind: DomKind,
    parent: Option<DomId>,
    children: Vec<DomId>,
    desc: Option<DescId>,
}

/// A (node, offset) pair. Offsets count UTF-16 units in text nodes and
/// children in elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DomPoint {
    pub node: DomId,
    pub offset: usize,
}

impl DomPoint {
    pub fn new(node: DomId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// The rendered tree, rooted at the editor mount element.
#[derive(Clone, Debug)]
pub struct Dom {
    nodes: SlotMap<DomId, DomNode>,
    root: DomId,
}

impl Dom {
    /// Create a tree whose root is a `<tag>` mount element.
    pub fn new(tag: &str) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(DomNode {
            kind: DomKind::Element {
                tag: tag.into(),
                attrs: Attrs::new(),
                classes: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
            desc: None,
        });
        Self { nodes, root }
    }

    pub fn root(&self) -> DomId {
        self.root
    }

    pub fn exists(&self, node: DomId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn get(&self, node: DomId) -> Option<&DomNode> {
        self.nodes.get(node)
    }

    pub fn create_element(&mut self, tag: &str) -> DomId {
        self.insert(DomKind::Element {
            tag: tag.into(),
            attrs: Attrs::new(),
            classes: Vec::new(),
        })
    }

    pub fn create_text(&mut self, data: &str) -> DomId {
        self.insert(DomKind::Text {
            data: data.to_string(),
        })
    }

    fn insert(&mut self, kind: DomKind) -> DomId {
        self.nodes.insert(DomNode {
            kind,
            parent: None,
            children: Vec::new(),
            desc: None,
        })
    }

    pub fn append_child(&mut self, parent: DomId, child: DomId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` into `parent` before `before`, or at the end. The
    /// child is detached from its previous parent first.
    pub fn insert_before(&mut self, parent: DomId, child: DomId, before: Option<DomId>) {
        if !self.exists(parent) || !self.exists(child) || parent == child {
            return;
        }
        self.detach(child);
        let index = before
            .and_then(|before| self.index_of(before).filter(|_| self.parent(before) == Some(parent)))
            .unwrap_or_else(|| self.children(parent).len());
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.insert(index, child);
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
    }

    /// Unlink a node from its parent, keeping it alive.
    pub fn detach(&mut self, node: DomId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.retain(|&c| c != node);
        }
        if let Some(node) = self.nodes.get_mut(node) {
            node.parent = None;
        }
    }

    /// Detach a node and drop it along with its subtree.
    pub fn remove(&mut self, node: DomId) {
        self.detach(node);
        let mut stack = vec![node];
        while let Some(next) = stack.pop() {
            if let Some(removed) = self.nodes.remove(next) {
                stack.extend(removed.children);
            }
        }
    }

    pub fn parent(&self, node: DomId) -> Option<DomId> {
        self.nodes.get(node)?.parent
    }

    pub fn children(&self, node: DomId) -> &[DomId] {
        self.nodes
            .get(node)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn child(&self, node: DomId, index: usize) -> Option<DomId> {
        self.children(node).get(index).copied()
    }

    pub fn first_child(&self, node: DomId) -> Option<DomId> {
        self.children(node).first().copied()
    }

    pub fn last_child(&self, node: DomId) -> Option<DomId> {
        self.children(node).last().copied()
    }

    pub fn index_of(&self, node: DomId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|&c| c == node)
    }

    pub fn previous_sibling(&self, node: DomId) -> Option<DomId> {
        let index = self.index_of(node)?;
        let parent = self.parent(node)?;
        index.checked_sub(1).and_then(|i| self.child(parent, i))
    }

    pub fn next_sibling(&self, node: DomId) -> Option<DomId> {
        let index = self.index_of(node)?;
        self.child(self.parent(node)?, index + 1)
    }

    pub fn is_text(&self, node: DomId) -> bool {
        matches!(
            self.nodes.get(node).map(|n| &n.kind),
            Some(DomKind::Text { .. })
        )
    }

    pub fn is_element(&self, node: DomId) -> bool {
        matches!(
            self.nodes.get(node).map(|n| &n.kind),
            Some(DomKind::Element { .. })
        )
    }

    pub fn tag(&self, node: DomId) -> Option<&str> {
        match &self.nodes.get(node)?.kind {
            DomKind::Element { tag, .. } => Some(tag.as_str()),
            DomKind::Text { .. } => None,
        }
    }

    pub fn text(&self, node: DomId) -> Option<&str> {
        match &self.nodes.get(node)?.kind {
            DomKind::Text { data } => Some(data.as_str()),
            DomKind::Element { .. } => None,
        }
    }

    pub fn set_text(&mut self, node: DomId, value: &str) {
        if let Some(DomKind::Text { data }) = self.nodes.get_mut(node).map(|n| &mut n.kind) {
            if data != value {
                *data = value.to_string();
            }
        }
    }

    /// Concatenated text of a subtree.
    pub fn text_content(&self, node: DomId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: DomId, out: &mut String) {
        match self.nodes.get(node).map(|n| &n.kind) {
            Some(DomKind::Text { data }) => out.push_str(data),
            Some(DomKind::Element { .. }) => {
                for &child in self.children(node) {
                    self.collect_text(child, out);
                }
            }
            None => {}
        }
    }

    pub fn attr(&self, node: DomId, name: &str) -> Option<&str> {
        match &self.nodes.get(node)?.kind {
            DomKind::Element { attrs, .. } => attrs.get(name).map(SmolStr::as_str),
            DomKind::Text { .. } => None,
        }
    }

    pub fn set_attr(&mut self, node: DomId, name: &str, value: &str) {
        if let Some(DomKind::Element { attrs, .. }) = self.nodes.get_mut(node).map(|n| &mut n.kind)
        {
            attrs.insert(name.into(), value.into());
        }
    }

    pub fn remove_attr(&mut self, node: DomId, name: &str) {
        if let Some(DomKind::Element { attrs, .. }) = self.nodes.get_mut(node).map(|n| &mut n.kind)
        {
            attrs.remove(name);
        }
    }

    pub fn has_class(&self, node: DomId, class: &str) -> bool {
        match self.nodes.get(node).map(|n| &n.kind) {
            Some(DomKind::Element { classes, .. }) => classes.iter().any(|c| c == class),
            _ => false,
        }
    }

    pub fn add_class(&mut self, node: DomId, class: &str) {
        if let Some(DomKind::Element { classes, .. }) =
            self.nodes.get_mut(node).map(|n| &mut n.kind)
        {
            if !classes.iter().any(|c| c == class) {
                classes.push(class.into());
            }
        }
    }

    pub fn remove_class(&mut self, node: DomId, class: &str) {
        if let Some(DomKind::Element { classes, .. }) =
            self.nodes.get_mut(node).map(|n| &mut n.kind)
        {
            classes.retain(|c| c != class);
        }
    }

    /// Length of a node for offset purposes: UTF-16 units for text,
    /// child count for elements.
    pub fn node_size(&self, node: DomId) -> usize {
        match self.nodes.get(node).map(|n| &n.kind) {
            Some(DomKind::Text { data }) => utf16_len(data),
            Some(DomKind::Element { .. }) => self.children(node).len(),
            None => 0,
        }
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    pub fn contains(&self, ancestor: DomId, node: DomId) -> bool {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if n == ancestor {
                return true;
            }
            cur = self.parent(n);
        }
        false
    }

    /// Whether a node is connected to the root.
    pub fn is_attached(&self, node: DomId) -> bool {
        self.exists(node) && self.contains(self.root, node)
    }

    pub fn desc(&self, node: DomId) -> Option<DescId> {
        self.nodes.get(node)?.desc
    }

    pub fn set_desc(&mut self, node: DomId, desc: Option<DescId>) {
        if let Some(node) = self.nodes.get_mut(node) {
            node.desc = desc;
        }
    }

    /// Whether `(node, offset)` sits at the very start or end of `parent`'s
    /// content, looking through every ancestor in between.
    pub fn is_on_edge(&self, node: DomId, offset: usize, parent: DomId) -> bool {
        let mut at_start = offset == 0;
        let mut at_end = offset == self.node_size(node);
        let mut cur = node;
        while at_start || at_end {
            if cur == parent {
                return true;
            }
            let Some(index) = self.index_of(cur) else {
                return false;
            };
            let Some(up) = self.parent(cur) else {
                return false;
            };
            at_start = at_start && index == 0;
            at_end = at_end && index + 1 == self.node_size(up);
            cur = up;
        }
        false
    }

    /// Child indices from the root down to `node`.
    fn path(&self, node: DomId) -> Vec<usize> {
        let mut path = Vec::new();
        let mut cur = node;
        while let Some(index) = self.index_of(cur) {
            path.push(index);
            match self.parent(cur) {
                Some(parent) => cur = parent,
                None => break,
            }
        }
        path.reverse();
        path
    }

    /// Whether `a` comes before `b` in document order without being one
    /// of its ancestors.
    pub fn precedes(&self, a: DomId, b: DomId) -> bool {
        if self.contains(a, b) {
            return false;
        }
        self.path(a) < self.path(b)
    }

    /// First text node in document order under `node`, inclusive.
    pub fn first_text_leaf(&self, node: DomId) -> Option<DomId> {
        if self.is_text(node) {
            return Some(node);
        }
        self.children(node)
            .iter()
            .find_map(|&child| self.first_text_leaf(child))
    }

    /// Serialise a subtree as markup. Used in logs and tests.
    pub fn to_html(&self, node: DomId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: DomId, out: &mut String) {
        match self.nodes.get(node).map(|n| &n.kind) {
            Some(DomKind::Text { data }) => out.push_str(data),
            Some(DomKind::Element {
                tag,
                attrs,
                classes,
            }) => {
                let _ = write!(out, "<{tag}");
                if !classes.is_empty() {
                    let _ = write!(out, " class=\"{}\"", classes.join(" "));
                }
                for (name, value) in attrs {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                out.push('>');
                for &child in self.children(node) {
                    self.write_html(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_edits() {
        let mut dom = Dom::new("div");
        let root = dom.root();
        let p = dom.create_element("p");
        let a = dom.create_text("a");
        let b = dom.create_text("b");
        dom.append_child(root, p);
        dom.append_child(p, b);
        dom.insert_before(p, a, Some(b));
        assert_eq!(dom.to_html(root), "<div><p>ab</p></div>");
        assert_eq!(dom.index_of(b), Some(1));
        assert_eq!(dom.previous_sibling(b), Some(a));
        assert!(dom.contains(root, a));

        dom.remove(p);
        assert!(!dom.exists(a));
        assert_eq!(dom.to_html(root), "<div></div>");
    }

    #[test]
    fn test_is_on_edge() {
        let mut dom = Dom::new("div");
        let root = dom.root();
        let p = dom.create_element("p");
        let em = dom.create_element("em");
        let t = dom.create_text("xy");
        let u = dom.create_text("z");
        dom.append_child(root, p);
        dom.append_child(p, em);
        dom.append_child(em, t);
        dom.append_child(p, u);
        assert!(dom.is_on_edge(t, 0, p));
        assert!(!dom.is_on_edge(t, 2, p));
        assert!(dom.is_on_edge(u, 1, p));
        assert!(!dom.is_on_edge(t, 1, p));
        assert!(dom.precedes(t, u));
        assert!(dom.precedes(em, u));
        assert!(!dom.precedes(p, t));
        assert!(!dom.precedes(u, em));
    }

    #[test]
    fn test_classes_and_attrs() {
        let mut dom = Dom::new("div");
        let img = dom.create_element("img");
        dom.add_class(img, "selected");
        dom.add_class(img, "selected");
        dom.set_attr(img, "src", "a.png");
        assert_eq!(dom.to_html(img), "<img class=\"selected\" src=\"a.png\"></img>");
        dom.remove_class(img, "selected");
        assert!(!dom.has_class(img, "selected"));
    }
}
