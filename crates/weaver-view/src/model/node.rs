//! Immutable document nodes and marks.
//!
//! Positions follow the usual token-stream convention: entering or leaving a
//! non-leaf node costs one position, a leaf costs one, and text costs its
//! length in UTF-16 code units (matching DOM text offsets).

use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use super::{Attrs, OutputSpec};
use crate::error::{Result, ViewError};

/// Length of a string in UTF-16 code units.
pub fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Slice a string by UTF-16 offsets, clamping to char boundaries.
pub fn utf16_slice(s: &str, from: usize, to: usize) -> &str {
    let mut units = 0;
    let mut start = s.len();
    let mut end = s.len();
    for (byte, ch) in s.char_indices() {
        if units >= from && start == s.len() {
            start = byte;
        }
        if units >= to {
            end = byte;
            break;
        }
        units += ch.len_utf16();
    }
    if start > end { "" } else { &s[start..end] }
}

#[derive(Debug)]
struct NodeTypeSpec {
    name: SmolStr,
    inline: bool,
    atom: bool,
    leaf: bool,
    text: bool,
    selectable: bool,
    draggable: bool,
    inline_content: bool,
    output: Option<OutputSpec>,
}

/// A node type as declared by the document schema.
#[derive(Clone, Debug)]
pub struct NodeType(Arc<NodeTypeSpec>);

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for NodeType {}

/// Builder for [`NodeType`].
pub struct NodeTypeBuilder(NodeTypeSpec);

impl NodeTypeBuilder {
    pub fn inline(mut self) -> Self {
        self.0.inline = true;
        self
    }

    /// Leaf node with no content.
    pub fn leaf(mut self) -> Self {
        self.0.leaf = true;
        self.0.atom = true;
        self
    }

    /// Treat the node as a single unit for selection and editing.
    pub fn atom(mut self) -> Self {
        self.0.atom = true;
        self
    }

    pub fn inline_content(mut self) -> Self {
        self.0.inline_content = true;
        self
    }

    pub fn selectable(mut self, selectable: bool) -> Self {
        self.0.selectable = selectable;
        self
    }

    pub fn draggable(mut self) -> Self {
        self.0.draggable = true;
        self
    }

    pub fn output(mut self, spec: OutputSpec) -> Self {
        self.0.output = Some(spec);
        self
    }

    pub fn build(self) -> NodeType {
        NodeType(Arc::new(self.0))
    }
}

impl NodeType {
    pub fn builder(name: impl Into<SmolStr>) -> NodeTypeBuilder {
        NodeTypeBuilder(NodeTypeSpec {
            name: name.into(),
            inline: false,
            atom: false,
            leaf: false,
            text: false,
            selectable: true,
            draggable: false,
            inline_content: false,
            output: None,
        })
    }

    /// The schema's text type.
    pub fn text() -> NodeType {
        let mut builder = Self::builder("text").inline();
        builder.0.text = true;
        builder.0.leaf = true;
        builder.build()
    }

    /// The top-level document type, rendered into the editor mount.
    pub fn doc() -> NodeType {
        Self::builder("doc").output(OutputSpec::wrapping("div")).build()
    }

    /// A block holding inline content, rendered as `<tag>`.
    pub fn textblock(name: impl Into<SmolStr>, tag: &str) -> NodeType {
        Self::builder(name)
            .inline_content()
            .output(OutputSpec::wrapping(tag))
            .build()
    }

    /// A block holding other blocks, rendered as `<tag>`.
    pub fn container(name: impl Into<SmolStr>, tag: &str) -> NodeType {
        Self::builder(name).output(OutputSpec::wrapping(tag)).build()
    }

    /// A block-level leaf such as a horizontal rule.
    pub fn block_leaf(name: impl Into<SmolStr>, tag: &str) -> NodeType {
        Self::builder(name)
            .leaf()
            .output(OutputSpec::element(tag))
            .build()
    }

    /// An inline leaf such as an image or a hard break.
    pub fn inline_leaf(name: impl Into<SmolStr>, tag: &str) -> NodeType {
        Self::builder(name)
            .inline()
            .leaf()
            .output(OutputSpec::element(tag))
            .build()
    }

    pub fn name(&self) -> &SmolStr {
        &self.0.name
    }

    pub fn is_inline(&self) -> bool {
        self.0.inline
    }

    pub fn is_text(&self) -> bool {
        self.0.text
    }

    pub fn is_leaf(&self) -> bool {
        self.0.leaf
    }

    pub fn is_atom(&self) -> bool {
        self.0.atom
    }

    pub fn is_selectable(&self) -> bool {
        self.0.selectable
    }

    pub fn is_draggable(&self) -> bool {
        self.0.draggable
    }

    pub fn has_inline_content(&self) -> bool {
        self.0.inline_content
    }

    /// Default output template, if the schema declares one.
    pub fn output(&self) -> Option<&OutputSpec> {
        self.0.output.as_ref()
    }
}

#[derive(Debug)]
struct MarkTypeSpec {
    name: SmolStr,
    output: Option<OutputSpec>,
}

/// A mark type as declared by the document schema.
#[derive(Clone, Debug)]
pub struct MarkType(Arc<MarkTypeSpec>);

impl MarkType {
    pub fn new(name: impl Into<SmolStr>, output: Option<OutputSpec>) -> Self {
        MarkType(Arc::new(MarkTypeSpec {
            name: name.into(),
            output,
        }))
    }

    pub fn name(&self) -> &SmolStr {
        &self.0.name
    }

    pub fn output(&self) -> Option<&OutputSpec> {
        self.0.output.as_ref()
    }
}

impl PartialEq for MarkType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for MarkType {}

/// An inline formatting span applied to inline nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mark {
    ty: MarkType,
    attrs: Attrs,
}

impl Mark {
    pub fn new(ty: MarkType, attrs: Attrs) -> Self {
        Self { ty, attrs }
    }

    pub fn ty(&self) -> &MarkType {
        &self.ty
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }
}

struct NodeData {
    ty: NodeType,
    attrs: Attrs,
    content: Vec<Node>,
    text: Option<String>,
    marks: Vec<Mark>,
    size: usize,
    content_size: usize,
}

/// An immutable, cheaply clonable document node.
#[derive(Clone)]
pub struct Node(Arc<NodeData>);

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.text_content() {
            return write!(f, "{:?}", text);
        }
        write!(f, "{}", self.type_name())?;
        if !self.0.content.is_empty() {
            f.debug_list().entries(self.0.content.iter()).finish()?;
        }
        Ok(())
    }
}

impl Node {
    /// Create a non-text node.
    pub fn new(ty: NodeType, attrs: Attrs, content: Vec<Node>) -> Self {
        Self::with_marks(ty, attrs, content, Vec::new())
    }

    pub fn with_marks(ty: NodeType, attrs: Attrs, content: Vec<Node>, marks: Vec<Mark>) -> Self {
        let content_size = content.iter().map(Node::node_size).sum();
        let size = if ty.is_leaf() { 1 } else { content_size + 2 };
        Node(Arc::new(NodeData {
            ty,
            attrs,
            content,
            text: None,
            marks,
            size,
            content_size,
        }))
    }

    /// Create a text node.
    pub fn text(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        let text = text.into();
        let size = utf16_len(&text);
        Node(Arc::new(NodeData {
            ty: NodeType::text(),
            attrs: Attrs::new(),
            content: Vec::new(),
            text: Some(text),
            marks,
            size,
            content_size: 0,
        }))
    }

    pub fn ty(&self) -> &NodeType {
        &self.0.ty
    }

    pub fn type_name(&self) -> &SmolStr {
        self.0.ty.name()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.0.attrs
    }

    pub fn marks(&self) -> &[Mark] {
        &self.0.marks
    }

    pub fn text_content(&self) -> Option<&str> {
        self.0.text.as_deref()
    }

    pub fn children(&self) -> &[Node] {
        &self.0.content
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.0.content.get(index)
    }

    pub fn child_count(&self) -> usize {
        self.0.content.len()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.0.content.last()
    }

    pub fn is_text(&self) -> bool {
        self.0.text.is_some()
    }

    pub fn is_leaf(&self) -> bool {
        self.0.ty.is_leaf()
    }

    pub fn is_atom(&self) -> bool {
        self.0.ty.is_atom()
    }

    pub fn is_inline(&self) -> bool {
        self.0.ty.is_inline()
    }

    pub fn is_block(&self) -> bool {
        !self.0.ty.is_inline()
    }

    pub fn is_textblock(&self) -> bool {
        self.0.ty.has_inline_content()
    }

    /// Size of this node in the token stream.
    pub fn node_size(&self) -> usize {
        self.0.size
    }

    /// Size of this node's content.
    pub fn content_size(&self) -> usize {
        self.0.content_size
    }

    /// Referential identity.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Same type, attributes and marks. Content is not compared.
    pub fn eq_markup(&self, other: &Node) -> bool {
        self.ptr_eq(other)
            || (self.0.ty == other.0.ty
                && self.0.attrs == other.0.attrs
                && self.0.marks == other.0.marks)
    }

    /// Full structural equality, including content.
    pub fn eq(&self, other: &Node) -> bool {
        self.ptr_eq(other)
            || (self.eq_markup(other)
                && self.0.text == other.0.text
                && self.0.content.len() == other.0.content.len()
                && self
                    .0
                    .content
                    .iter()
                    .zip(other.0.content.iter())
                    .all(|(a, b)| a.eq(b)))
    }

    /// Children paired with their offset from this node's content start.
    pub fn children_with_offsets(&self) -> impl Iterator<Item = (usize, &Node)> {
        self.0.content.iter().scan(0usize, |offset, child| {
            let start = *offset;
            *offset += child.node_size();
            Some((start, child))
        })
    }

    /// Visit every descendant with its position relative to this node's
    /// content start. Returning `false` skips the node's children.
    pub fn descendants(&self, f: &mut impl FnMut(&Node, usize) -> bool) {
        self.descendants_from(0, f);
    }

    fn descendants_from(&self, base: usize, f: &mut impl FnMut(&Node, usize) -> bool) {
        for (offset, child) in self.children_with_offsets() {
            let pos = base + offset;
            if f(child, pos) && !child.is_leaf() {
                child.descendants_from(pos + 1, f);
            }
        }
    }

    /// Find the child index at `pos` (relative to content start), and the
    /// offset at which that child starts. A position at a child boundary
    /// resolves to the child after it.
    pub fn find_index(&self, pos: usize) -> (usize, usize) {
        if pos == 0 {
            return (0, 0);
        }
        if pos >= self.content_size() {
            return (self.child_count(), self.content_size());
        }
        let mut cur = 0;
        for (i, child) in self.0.content.iter().enumerate() {
            let end = cur + child.node_size();
            if end >= pos {
                if end == pos {
                    return (i + 1, end);
                }
                return (i, cur);
            }
            cur = end;
        }
        (self.child_count(), self.content_size())
    }

    /// The node that starts directly at `pos`, if any.
    pub fn node_at(&self, mut pos: usize) -> Option<&Node> {
        let mut node = self;
        loop {
            let (index, offset) = node.find_index(pos);
            node = node.child(index)?;
            if offset == pos || node.is_text() {
                return Some(node);
            }
            pos -= offset + 1;
        }
    }

    /// Resolve a position into its ancestor path.
    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos> {
        if pos > self.content_size() {
            return Err(ViewError::PositionOutsideDocument {
                pos,
                size: self.content_size(),
            });
        }
        let mut path = Vec::new();
        let mut start = 0;
        let mut parent_offset = pos;
        let mut node = self.clone();
        loop {
            let (index, offset) = node.find_index(parent_offset);
            let rem = parent_offset - offset;
            path.push(PathEntry {
                node: node.clone(),
                index,
                offset: start + offset,
            });
            if rem == 0 {
                break;
            }
            let Some(child) = node.child(index).cloned() else {
                break;
            };
            if child.is_text() {
                break;
            }
            node = child;
            parent_offset = rem - 1;
            start += offset + 1;
        }
        Ok(ResolvedPos {
            pos,
            path,
            parent_offset,
        })
    }

    /// Copy of a text node covering UTF-16 range `from..to`.
    pub fn cut_text(&self, from: usize, to: usize) -> Node {
        match self.text_content() {
            Some(text) if from > 0 || to < self.node_size() => {
                Node::text(utf16_slice(text, from, to), self.0.marks.clone())
            }
            _ => self.clone(),
        }
    }

    /// Copy of this node with different children.
    pub fn copy_with(&self, content: Vec<Node>) -> Node {
        Node::with_marks(
            self.0.ty.clone(),
            self.0.attrs.clone(),
            content,
            self.0.marks.clone(),
        )
    }

    /// Replace the children between `from` and `to` with `nodes`.
    ///
    /// Both positions must share a parent and sit on child boundaries.
    pub fn replace_children(&self, from: usize, to: usize, nodes: Vec<Node>) -> Result<Node> {
        let rfrom = self.resolve(from)?;
        let rto = self.resolve(to)?;
        let depth = rfrom.depth();
        let outside = ViewError::PositionOutsideDocument {
            pos: to,
            size: self.content_size(),
        };
        if rto.depth() != depth || rfrom.start(depth) != rto.start(depth) {
            return Err(outside);
        }
        let parent = rfrom.parent();
        let (start_index, start_offset) = parent.find_index(rfrom.parent_offset);
        let (end_index, end_offset) = parent.find_index(rto.parent_offset);
        if start_offset != rfrom.parent_offset || end_offset != rto.parent_offset {
            return Err(outside);
        }
        let mut content = parent.children()[..start_index].to_vec();
        content.extend(nodes);
        content.extend_from_slice(&parent.children()[end_index..]);
        let mut replaced = parent.copy_with(content);
        for d in (0..depth).rev() {
            let ancestor = rfrom.node(d);
            let mut content = ancestor.children().to_vec();
            content[rfrom.index(d)] = replaced;
            replaced = ancestor.copy_with(content);
        }
        Ok(replaced)
    }
}

#[derive(Clone, Debug)]
struct PathEntry {
    node: Node,
    index: usize,
    offset: usize,
}

/// A position resolved against a document, with its ancestor path.
#[derive(Clone, Debug)]
pub struct ResolvedPos {
    pub pos: usize,
    path: Vec<PathEntry>,
    pub parent_offset: usize,
}

impl ResolvedPos {
    /// Number of ancestors between the document and the innermost parent.
    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    pub fn node(&self, depth: usize) -> &Node {
        &self.path[depth].node
    }

    pub fn parent(&self) -> &Node {
        self.node(self.depth())
    }

    /// Index of the child the position points into at `depth`.
    pub fn index(&self, depth: usize) -> usize {
        self.path[depth].index
    }

    /// Start of the content of the ancestor at `depth`.
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].offset + 1
        }
    }

    /// End of the content of the ancestor at `depth`.
    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Depth of the deepest ancestor whose content also contains `pos`.
    pub fn shared_depth(&self, pos: usize) -> usize {
        (1..=self.depth())
            .rev()
            .find(|&depth| self.start(depth) <= pos && self.end(depth) >= pos)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content: Vec<Node>) -> Node {
        Node::new(NodeType::doc(), Attrs::new(), content)
    }

    fn p(text: &str) -> Node {
        let content = if text.is_empty() {
            vec![]
        } else {
            vec![Node::text(text, vec![])]
        };
        Node::new(NodeType::textblock("paragraph", "p"), Attrs::new(), content)
    }

    #[test]
    fn test_sizes() {
        let d = doc(vec![p("hello"), p("")]);
        assert_eq!(d.child(0).unwrap().node_size(), 7);
        assert_eq!(d.child(1).unwrap().node_size(), 2);
        assert_eq!(d.content_size(), 9);
    }

    #[test]
    fn test_utf16_sizes() {
        let t = Node::text("a😀b", vec![]);
        assert_eq!(t.node_size(), 4);
        assert_eq!(t.cut_text(1, 3).text_content(), Some("😀"));
    }

    #[test]
    fn test_resolve() {
        let d = doc(vec![p("hello"), p("world")]);
        let r = d.resolve(3).unwrap();
        assert_eq!(r.depth(), 1);
        assert_eq!(r.parent().type_name(), "paragraph");
        assert_eq!(r.start(1), 1);
        assert_eq!(r.parent_offset, 2);
        assert_eq!(r.shared_depth(2), 1);
        assert_eq!(r.shared_depth(9), 0);

        let r = d.resolve(7).unwrap();
        assert_eq!(r.depth(), 0);
        assert_eq!(r.index(0), 1);

        assert!(d.resolve(15).is_err());
    }

    #[test]
    fn test_node_at() {
        let d = doc(vec![p("hello"), p("world")]);
        assert_eq!(d.node_at(0).unwrap().type_name(), "paragraph");
        assert_eq!(d.node_at(7).unwrap().type_name(), "paragraph");
        assert!(d.node_at(1).unwrap().is_text());
        assert!(d.node_at(14).is_none());
    }

    #[test]
    fn test_replace_children() {
        let d = doc(vec![p("a"), p("b"), p("c")]);
        let replaced = d
            .replace_children(3, 9, vec![p("c"), p("b")])
            .unwrap();
        let texts: Vec<_> = replaced
            .children()
            .iter()
            .map(|c| c.child(0).unwrap().text_content().unwrap().to_string())
            .collect();
        assert_eq!(texts, ["a", "c", "b"]);

        assert!(d.replace_children(1, 9, vec![]).is_err());
    }

    #[test]
    fn test_eq_markup_ignores_content() {
        assert!(p("a").eq_markup(&p("b")));
        assert!(!p("a").eq(&p("b")));
    }
}
