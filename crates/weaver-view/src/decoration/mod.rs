//! Decorations: attribute spans, node markers and widgets that the view
//! renders on top of the document.
//!
//! Positions in a [`DecorationSet`] are relative to the content start of
//! the node the set is attached to.

mod normalize;

use std::sync::{Arc, LazyLock};

use smol_str::SmolStr;

use crate::model::{Attrs, Mapping, Node};

pub use normalize::{DecorationCache, DecorationGroup, DecorationSource, remove_overlap};

/// Specification of a widget decoration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WidgetSpec {
    /// Identity used to reuse rendered widgets across updates.
    pub key: Option<SmolStr>,
    /// Which side of the position the widget sticks to. Widgets with a
    /// lower side sort first.
    pub side: i32,
    pub tag: SmolStr,
    pub attrs: Attrs,
    /// Selection changes inside the widget are not read back.
    pub ignore_selection: bool,
}

impl WidgetSpec {
    pub fn new(tag: impl Into<SmolStr>) -> Self {
        Self {
            key: None,
            side: 0,
            tag: tag.into(),
            attrs: Attrs::new(),
            ignore_selection: false,
        }
    }

    pub fn with_key(mut self, key: impl Into<SmolStr>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_side(mut self, side: i32) -> Self {
        self.side = side;
        self
    }

    pub fn ignore_selection(mut self) -> Self {
        self.ignore_selection = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecorationKind {
    /// Attributes applied to inline content in the range.
    Inline { attrs: Attrs },
    /// Attributes applied to the node spanning exactly the range.
    Node { attrs: Attrs },
    Widget(WidgetSpec),
}

#[derive(Clone, Debug)]
pub struct Decoration {
    pub from: usize,
    pub to: usize,
    kind: Arc<DecorationKind>,
}

impl PartialEq for Decoration {
    fn eq(&self, other: &Self) -> bool {
        self.from == other.from
            && self.to == other.to
            && (Arc::ptr_eq(&self.kind, &other.kind) || self.kind == other.kind)
    }
}

impl Eq for Decoration {}

impl Decoration {
    pub fn inline(from: usize, to: usize, attrs: Attrs) -> Self {
        Self {
            from,
            to,
            kind: Arc::new(DecorationKind::Inline { attrs }),
        }
    }

    pub fn node(from: usize, to: usize, attrs: Attrs) -> Self {
        Self {
            from,
            to,
            kind: Arc::new(DecorationKind::Node { attrs }),
        }
    }

    pub fn widget(pos: usize, spec: WidgetSpec) -> Self {
        Self {
            from: pos,
            to: pos,
            kind: Arc::new(DecorationKind::Widget(spec)),
        }
    }

    /// Same decoration over a different range.
    pub fn copy(&self, from: usize, to: usize) -> Self {
        Self {
            from,
            to,
            kind: self.kind.clone(),
        }
    }

    pub fn kind(&self) -> &DecorationKind {
        &self.kind
    }

    /// Whether two decorations come from the same original.
    pub fn same_origin(&self, other: &Decoration) -> bool {
        Arc::ptr_eq(&self.kind, &other.kind)
    }

    pub fn is_inline(&self) -> bool {
        matches!(*self.kind, DecorationKind::Inline { .. })
    }

    pub fn is_node(&self) -> bool {
        matches!(*self.kind, DecorationKind::Node { .. })
    }

    pub fn widget_spec(&self) -> Option<&WidgetSpec> {
        match &*self.kind {
            DecorationKind::Widget(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn attrs(&self) -> Option<&Attrs> {
        match &*self.kind {
            DecorationKind::Inline { attrs } | DecorationKind::Node { attrs } => Some(attrs),
            DecorationKind::Widget(_) => None,
        }
    }

    fn shifted(&self, by: isize) -> Self {
        self.copy(
            (self.from as isize + by) as usize,
            (self.to as isize + by) as usize,
        )
    }

    fn map(&self, mapping: &Mapping) -> Option<Decoration> {
        match &*self.kind {
            DecorationKind::Inline { .. } => {
                let from = mapping.map(self.from, 1);
                let to = mapping.map(self.to, -1);
                (from < to).then(|| self.copy(from, to))
            }
            DecorationKind::Node { .. } => {
                let from = mapping.map_result(self.from, 1);
                let to = mapping.map_result(self.to, -1);
                (!from.deleted && !to.deleted && from.pos < to.pos)
                    .then(|| self.copy(from.pos, to.pos))
            }
            DecorationKind::Widget(spec) => {
                let result = mapping.map_result(self.from, if spec.side < 0 { -1 } else { 1 });
                (!result.deleted).then(|| self.copy(result.pos, result.pos))
            }
        }
    }
}

/// Sort order used throughout: start ascending, then end ascending.
pub(crate) fn by_pos(a: &Decoration, b: &Decoration) -> std::cmp::Ordering {
    a.from.cmp(&b.from).then(a.to.cmp(&b.to))
}

static EMPTY: LazyLock<DecorationSet> = LazyLock::new(|| DecorationSet(Arc::from(Vec::new())));

/// An immutable collection of decorations for one node's content.
#[derive(Clone, Debug)]
pub struct DecorationSet(Arc<[Decoration]>);

impl Default for DecorationSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for DecorationSet {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl DecorationSet {
    /// The shared empty set. Every empty result is this exact instance.
    pub fn empty() -> Self {
        EMPTY.clone()
    }

    pub fn create(mut decorations: Vec<Decoration>) -> Self {
        if decorations.is_empty() {
            return Self::empty();
        }
        decorations.sort_by(by_pos);
        DecorationSet(Arc::from(decorations))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ptr_eq(&self, other: &DecorationSet) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.0.iter()
    }

    /// Decorations inside the content of `child`, which starts at `offset`,
    /// rebased onto the child's content start. Inline spans are clipped to
    /// the child.
    pub fn for_child(&self, offset: usize, child: &Node) -> DecorationSet {
        if child.is_leaf() || self.is_empty() {
            return Self::empty();
        }
        let start = offset + 1;
        let end = offset + child.node_size() - 1;
        let mut found = Vec::new();
        for deco in self.iter() {
            if deco.is_inline() {
                let from = deco.from.max(start);
                let to = deco.to.min(end);
                if from < to {
                    found.push(deco.copy(from, to).shifted(-(start as isize)));
                }
            } else if start <= deco.from && deco.to <= end {
                found.push(deco.shifted(-(start as isize)));
            }
        }
        Self::create(found)
    }

    /// Decorations rendered at this node's level, with partial overlaps
    /// split apart.
    pub fn locals(&self, node: &Node) -> Vec<Decoration> {
        remove_overlap(self.locals_inner(node))
    }

    fn locals_inner(&self, node: &Node) -> Vec<Decoration> {
        let textblock = node.is_textblock();
        self.iter()
            .filter(|deco| {
                if deco.is_inline() {
                    textblock
                } else {
                    !inside_child(node, deco)
                }
            })
            .cloned()
            .collect()
    }

    /// Map every decoration through a document change, dropping those
    /// whose anchor was deleted.
    pub fn map(&self, mapping: &Mapping) -> DecorationSet {
        if mapping.is_empty() {
            return self.clone();
        }
        Self::create(self.iter().filter_map(|deco| deco.map(mapping)).collect())
    }
}

/// Whether a node or widget decoration lies strictly within the content of
/// one of `node`'s non-leaf children.
fn inside_child(node: &Node, deco: &Decoration) -> bool {
    node.children_with_offsets().any(|(offset, child)| {
        !child.is_leaf()
            && !child.is_text()
            && offset < deco.from
            && deco.to < offset + child.node_size()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeType, StepMap};

    fn attrs(class: &str) -> Attrs {
        let mut attrs = Attrs::new();
        attrs.insert("class".into(), class.into());
        attrs
    }

    fn doc() -> Node {
        let p = NodeType::textblock("paragraph", "p");
        Node::new(
            NodeType::doc(),
            Attrs::new(),
            vec![
                Node::new(p.clone(), Attrs::new(), vec![Node::text("hello", vec![])]),
                Node::new(p, Attrs::new(), vec![Node::text("world", vec![])]),
            ],
        )
    }

    #[test]
    fn test_empty_is_singleton() {
        let a = DecorationSet::create(vec![]);
        let d = doc();
        let b = DecorationSet::create(vec![Decoration::inline(1, 3, attrs("x"))])
            .for_child(7, d.child(1).unwrap());
        assert!(a.ptr_eq(&DecorationSet::empty()));
        assert!(b.ptr_eq(&DecorationSet::empty()));
    }

    #[test]
    fn test_for_child_clips_inline() {
        let d = doc();
        let set = DecorationSet::create(vec![
            Decoration::inline(3, 10, attrs("hl")),
            Decoration::node(7, 14, attrs("block")),
            Decoration::widget(9, WidgetSpec::new("span")),
        ]);
        let first = set.for_child(0, d.child(0).unwrap());
        assert_eq!(
            first.iter().map(|d| (d.from, d.to)).collect::<Vec<_>>(),
            vec![(2, 5)]
        );
        let second = set.for_child(7, d.child(1).unwrap());
        assert_eq!(
            second.iter().map(|d| (d.from, d.to)).collect::<Vec<_>>(),
            vec![(0, 2), (1, 1)]
        );
        assert!(set.locals(&d).iter().all(|deco| !deco.is_inline()));
        assert_eq!(set.locals(&d).len(), 1);
    }

    #[test]
    fn test_map_drops_deleted() {
        let set = DecorationSet::create(vec![
            Decoration::inline(1, 4, attrs("a")),
            Decoration::widget(3, WidgetSpec::new("span")),
            Decoration::widget(8, WidgetSpec::new("span")),
        ]);
        let mut mapping = Mapping::default();
        mapping.push(StepMap {
            start: 2,
            old_size: 3,
            new_size: 0,
        });
        let mapped = set.map(&mapping);
        let ranges: Vec<_> = mapped.iter().map(|d| (d.from, d.to)).collect();
        assert_eq!(ranges, vec![(1, 2), (5, 5)]);
    }
}
