//! View descriptors: the bookkeeping tree that mirrors the rendered DOM.
//!
//! Each descriptor covers one region of the document. Descriptors live in
//! an arena, children are kept in per-parent lists sorted by document
//! position, and parents are tracked as plain ids used for upward lookups
//! only. The DOM node a descriptor owns is annotated with its id so DOM
//! positions can be traced back to the document.

mod position;

use std::fmt::Write as _;
use std::rc::Rc;

use slotmap::SlotMap;
use tracing::trace;

use crate::decoration::{Decoration, DecorationSource};
use crate::dom::{Dom, DomId};
use crate::model::{Mark, Node, utf16_len};
use crate::props::{DomEvent, SharedCapabilities, ViewMutation};

slotmap::new_key_type! {
    /// Handle to a descriptor in a [`DescTree`].
    pub struct DescId;
    /// Handle to an ordered list of sibling descriptors.
    pub struct ChildListId;
}

/// Live accessor for a region's start position. Positions shift with every
/// edit, so this is called on demand rather than cached.
pub type GetPos = Rc<dyn Fn() -> usize>;

/// Class applied to the DOM of a node-selected node.
pub const SELECTED_NODE_CLASS: &str = "ProseMirror-selectednode";

#[derive(Clone, Debug)]
pub struct NodeDesc {
    pub node: Node,
    pub outer_deco: Vec<Decoration>,
    pub inner_deco: DecorationSource,
    /// The element that represents the node itself, inside any decoration
    /// wrappers.
    pub node_dom: DomId,
    pub capabilities: SharedCapabilities,
}

#[derive(Clone, Debug)]
pub struct TextDesc {
    pub node: Node,
    pub outer_deco: Vec<Decoration>,
    /// The text node itself.
    pub node_dom: DomId,
}

#[derive(Clone, Debug)]
pub struct MarkDesc {
    pub mark: Mark,
    pub capabilities: SharedCapabilities,
}

#[derive(Clone, Debug)]
pub struct WidgetDesc {
    pub widget: Decoration,
}

impl WidgetDesc {
    pub fn side(&self) -> i32 {
        self.widget.widget_spec().map_or(0, |spec| spec.side)
    }
}

/// Stand-in for a text node being edited by an input method.
#[derive(Clone, Debug)]
pub struct CompositionDesc {
    pub text_dom: DomId,
    pub text: String,
    /// Whether `dom` and `text_dom` point at the real composition DOM yet,
    /// rather than the placeholders it was created with.
    pub resolved: bool,
}

#[derive(Clone, Debug)]
pub enum DescKind {
    Doc(NodeDesc),
    Node(NodeDesc),
    Text(TextDesc),
    Mark(MarkDesc),
    Widget(WidgetDesc),
    Composition(CompositionDesc),
    /// Filler after the last inline node of a textblock, keeping the caret
    /// addressable there.
    TrailingHack,
}

#[derive(Clone)]
pub struct ViewDesc {
    pub parent: Option<DescId>,
    /// The sibling list this descriptor was inserted into.
    pub siblings: Option<ChildListId>,
    pub children: ChildListId,
    pub get_pos: GetPos,
    pub dom: DomId,
    pub content_dom: Option<DomId>,
    pub kind: DescKind,
}

impl std::fmt::Debug for ViewDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewDesc")
            .field("kind", &self.kind_name())
            .field("pos", &(self.get_pos)())
            .field("dom", &self.dom)
            .field("content_dom", &self.content_dom)
            .finish()
    }
}

impl ViewDesc {
    pub fn new(children: ChildListId, get_pos: GetPos, dom: DomId, kind: DescKind) -> Self {
        Self {
            parent: None,
            siblings: None,
            children,
            get_pos,
            dom,
            content_dom: None,
            kind,
        }
    }

    pub fn with_content_dom(mut self, content_dom: Option<DomId>) -> Self {
        self.content_dom = content_dom;
        self
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            DescKind::Doc(_) => "doc",
            DescKind::Node(_) => "node",
            DescKind::Text(_) => "text",
            DescKind::Mark(_) => "mark",
            DescKind::Widget(_) => "widget",
            DescKind::Composition(_) => "composition",
            DescKind::TrailingHack => "trailing",
        }
    }

    /// The document node this descriptor stands for, if any.
    pub fn node(&self) -> Option<&Node> {
        match &self.kind {
            DescKind::Doc(desc) | DescKind::Node(desc) => Some(&desc.node),
            DescKind::Text(desc) => Some(&desc.node),
            _ => None,
        }
    }

    pub fn node_desc(&self) -> Option<&NodeDesc> {
        match &self.kind {
            DescKind::Doc(desc) | DescKind::Node(desc) => Some(desc),
            _ => None,
        }
    }

    pub fn node_dom(&self) -> Option<DomId> {
        match &self.kind {
            DescKind::Doc(desc) | DescKind::Node(desc) => Some(desc.node_dom),
            DescKind::Text(desc) => Some(desc.node_dom),
            _ => None,
        }
    }

    pub fn is_widget(&self) -> bool {
        matches!(self.kind, DescKind::Widget(_))
    }

    pub fn is_trailing_hack(&self) -> bool {
        matches!(self.kind, DescKind::TrailingHack)
    }

    pub fn is_composition(&self) -> bool {
        matches!(self.kind, DescKind::Composition(_))
    }

    /// Whether the DOM should be treated as a single opaque unit when
    /// mapping positions.
    pub fn dom_atom(&self) -> bool {
        match &self.kind {
            DescKind::Widget(_) => true,
            DescKind::Node(desc) => desc.node.is_atom(),
            _ => false,
        }
    }

    fn capabilities(&self) -> Option<&SharedCapabilities> {
        match &self.kind {
            DescKind::Doc(desc) | DescKind::Node(desc) => Some(&desc.capabilities),
            DescKind::Mark(desc) => Some(&desc.capabilities),
            _ => None,
        }
    }

    /// Whether a mutation inside this descriptor can be ignored by the
    /// editor.
    pub fn ignore_mutation(&self, mutation: &ViewMutation) -> bool {
        let hook = self
            .capabilities()
            .and_then(|caps| caps.borrow().ignore_mutation.clone());
        if let Some(hook) = hook {
            return hook(mutation);
        }
        let is_selection = matches!(mutation, ViewMutation::Selection);
        match &self.kind {
            DescKind::Widget(desc) => {
                !is_selection || desc.widget.widget_spec().is_some_and(|s| s.ignore_selection)
            }
            DescKind::Text(_) => {
                !is_selection && !matches!(mutation, ViewMutation::CharacterData { .. })
            }
            DescKind::Composition(_) => false,
            _ => self.content_dom.is_none() && !is_selection,
        }
    }

    /// Whether the node view wants to handle `event` itself.
    pub fn stop_event(&self, event: &DomEvent) -> bool {
        let hook = self
            .capabilities()
            .and_then(|caps| caps.borrow().stop_event.clone());
        hook.is_some_and(|hook| hook(event))
    }
}

/// Arena of descriptors and their child lists.
#[derive(Debug, Default)]
pub struct DescTree {
    descs: SlotMap<DescId, ViewDesc>,
    lists: SlotMap<ChildListId, Vec<DescId>>,
    root: Option<DescId>,
}

impl DescTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<DescId> {
        self.root
    }

    pub fn set_root(&mut self, root: DescId) {
        self.root = Some(root);
    }

    pub fn get(&self, id: DescId) -> Option<&ViewDesc> {
        self.descs.get(id)
    }

    pub fn get_mut(&mut self, id: DescId) -> Option<&mut ViewDesc> {
        self.descs.get_mut(id)
    }

    pub fn contains(&self, id: DescId) -> bool {
        self.descs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.descs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    pub fn new_child_list(&mut self) -> ChildListId {
        self.lists.insert(Vec::new())
    }

    pub fn drop_child_list(&mut self, list: ChildListId) {
        self.lists.remove(list);
    }

    pub fn list(&self, list: ChildListId) -> &[DescId] {
        self.lists.get(list).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn children(&self, id: DescId) -> &[DescId] {
        self.get(id).map_or(&[], |desc| self.list(desc.children))
    }

    /// Add a descriptor and annotate the DOM it owns.
    pub fn insert(&mut self, dom: &mut Dom, desc: ViewDesc) -> DescId {
        let annotate = owned_dom(&desc);
        let kind = desc.kind_name();
        let id = self.descs.insert(desc);
        for node in annotate {
            dom.set_desc(node, Some(id));
        }
        trace!(target: "weaver::viewdesc", ?id, kind, "created descriptor");
        id
    }

    /// Re-point DOM annotations at `id` after its DOM fields changed.
    pub fn annotate(&self, dom: &mut Dom, id: DescId) {
        if let Some(desc) = self.get(id) {
            for node in owned_dom(desc) {
                dom.set_desc(node, Some(id));
            }
        }
    }

    /// Remove a descriptor: run its destroy hook, take it out of its
    /// sibling list and clear its DOM annotations. Its children list is
    /// left alone, since it belongs to the rendered region.
    pub fn destroy(&mut self, dom: &mut Dom, id: DescId) -> Option<ViewDesc> {
        let desc = self.descs.remove(id)?;
        if let Some(list) = desc.siblings.and_then(|list| self.lists.get_mut(list)) {
            list.retain(|&d| d != id);
        }
        for node in owned_dom(&desc) {
            if dom.desc(node) == Some(id) {
                dom.set_desc(node, None);
            }
        }
        if let Some(hook) = desc
            .capabilities()
            .and_then(|caps| caps.borrow().destroy.clone())
        {
            hook();
        }
        if self.root == Some(id) {
            self.root = None;
        }
        trace!(target: "weaver::viewdesc", ?id, kind = desc.kind_name(), "destroyed descriptor");
        Some(desc)
    }

    /// Insert `id` into `list` if it is not there yet, then restore
    /// position order. Safe to repeat.
    pub fn attach(&mut self, id: DescId, list: ChildListId) {
        if let Some(desc) = self.descs.get_mut(id) {
            desc.siblings = Some(list);
        }
        if let Some(children) = self.lists.get_mut(list) {
            if !children.contains(&id) {
                children.push(id);
            }
        }
        self.sort_list(list);
    }

    /// Point every child in `id`'s list back at `id`.
    pub fn adopt_children(&mut self, id: DescId) {
        let Some(list) = self.get(id).map(|desc| desc.children) else {
            return;
        };
        let children = self.list(list).to_vec();
        for child in children {
            if let Some(child) = self.descs.get_mut(child) {
                child.parent = Some(id);
            }
        }
    }

    /// Sort a child list by document position. Trailing fillers go last,
    /// and zero-size widgets go before content starting at the same
    /// position, ordered by side.
    pub fn sort_list(&mut self, list: ChildListId) {
        let Some(ids) = self.lists.get(list) else {
            return;
        };
        let mut keyed: Vec<_> = ids.iter().map(|&id| (self.sort_key(id), id)).collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(ids) = self.lists.get_mut(list) {
            *ids = keyed.into_iter().map(|(_, id)| id).collect();
        }
    }

    fn sort_key(&self, id: DescId) -> (bool, usize, bool, i32) {
        let Some(desc) = self.get(id) else {
            return (true, usize::MAX, true, 0);
        };
        if desc.is_trailing_hack() {
            return (true, 0, false, 0);
        }
        let side = match &desc.kind {
            DescKind::Widget(widget) => widget.side(),
            _ => 0,
        };
        (false, (desc.get_pos)(), self.size(id) > 0, side)
    }

    /// Size of the region in document positions.
    pub fn size(&self, id: DescId) -> usize {
        let Some(desc) = self.get(id) else {
            return 0;
        };
        match &desc.kind {
            DescKind::Doc(desc) => desc.node.content_size(),
            DescKind::Node(desc) => desc.node.node_size(),
            DescKind::Text(desc) => desc.node.node_size(),
            DescKind::Mark(_) => self.children(id).iter().map(|&c| self.size(c)).sum(),
            DescKind::Composition(desc) => utf16_len(&desc.text),
            DescKind::Widget(_) | DescKind::TrailingHack => 0,
        }
    }

    /// Positions taken by the region's opening (and closing) token.
    pub fn border(&self, id: DescId) -> usize {
        match self.get(id).map(|desc| &desc.kind) {
            Some(DescKind::Node(desc)) if !desc.node.is_leaf() => 1,
            _ => 0,
        }
    }

    pub fn pos_before(&self, id: DescId) -> usize {
        self.get(id).map_or(0, |desc| (desc.get_pos)())
    }

    pub fn pos_at_start(&self, id: DescId) -> usize {
        self.pos_before(id) + self.border(id)
    }

    pub fn pos_after(&self, id: DescId) -> usize {
        self.pos_before(id) + self.size(id)
    }

    pub fn pos_at_end(&self, id: DescId) -> usize {
        self.pos_at_start(id) + self.size(id) - 2 * self.border(id)
    }

    /// Default node selection styling: mark the node DOM selected and make
    /// the outer DOM draggable.
    pub fn select_node(&self, dom: &mut Dom, id: DescId) {
        let Some(desc) = self.get(id) else {
            return;
        };
        let Some(node_desc) = desc.node_desc() else {
            return;
        };
        let hook = node_desc.capabilities.borrow().select_node.clone();
        if let Some(hook) = hook {
            hook(dom, node_desc.node_dom);
            return;
        }
        if dom.is_element(node_desc.node_dom) {
            dom.add_class(node_desc.node_dom, SELECTED_NODE_CLASS);
        }
        if desc.content_dom.is_some() || !node_desc.node.ty().is_draggable() {
            dom.set_attr(desc.dom, "draggable", "true");
        }
    }

    pub fn deselect_node(&self, dom: &mut Dom, id: DescId) {
        let Some(desc) = self.get(id) else {
            return;
        };
        let Some(node_desc) = desc.node_desc() else {
            return;
        };
        let hook = node_desc.capabilities.borrow().deselect_node.clone();
        if let Some(hook) = hook {
            hook(dom, node_desc.node_dom);
            return;
        }
        if dom.is_element(node_desc.node_dom) {
            dom.remove_class(node_desc.node_dom, SELECTED_NODE_CLASS);
            if desc.content_dom.is_some() || !node_desc.node.ty().is_draggable() {
                dom.remove_attr(desc.dom, "draggable");
            }
        }
    }

    /// Whether the root describes `doc` with the given decorations.
    pub fn matches_doc(&self, doc: &Node, inner_deco: &DecorationSource) -> bool {
        self.root
            .and_then(|root| self.get(root))
            .and_then(ViewDesc::node_desc)
            .is_some_and(|desc| desc.node.eq(doc) && desc.inner_deco == *inner_deco)
    }

    /// Indented outline of the tree, one descriptor per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root {
            self.dump_desc(root, 0, &mut out);
        }
        out
    }

    fn dump_desc(&self, id: DescId, depth: usize, out: &mut String) {
        let Some(desc) = self.get(id) else {
            return;
        };
        let _ = write!(out, "{:indent$}{}", "", desc.kind_name(), indent = depth * 2);
        match &desc.kind {
            DescKind::Doc(node) | DescKind::Node(node) => {
                let _ = write!(out, " {}", node.node.type_name());
            }
            DescKind::Text(text) => {
                let _ = write!(out, " {:?}", text.node.text_content().unwrap_or_default());
            }
            DescKind::Mark(mark) => {
                let _ = write!(out, " {}", mark.mark.ty().name());
            }
            DescKind::Composition(comp) => {
                let _ = write!(out, " {:?}", comp.text);
            }
            DescKind::Widget(_) | DescKind::TrailingHack => {}
        }
        let _ = writeln!(out, " {}..{}", self.pos_before(id), self.pos_after(id));
        for &child in self.children(id) {
            self.dump_desc(child, depth + 1, out);
        }
    }
}

/// DOM nodes a descriptor is recorded on.
fn owned_dom(desc: &ViewDesc) -> Vec<DomId> {
    let mut nodes = vec![desc.dom];
    if let DescKind::Composition(comp) = &desc.kind {
        nodes.push(comp.text_dom);
    }
    nodes
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::decoration::WidgetSpec;
    use crate::model::{Attrs, NodeType};
    use crate::props::Capabilities;

    fn fixed(pos: usize) -> GetPos {
        Rc::new(move || pos)
    }

    fn text_desc(tree: &mut DescTree, dom: &mut Dom, text: &str, pos: usize) -> DescId {
        let node_dom = dom.create_text(text);
        let list = tree.new_child_list();
        tree.insert(
            dom,
            ViewDesc::new(
                list,
                fixed(pos),
                node_dom,
                DescKind::Text(TextDesc {
                    node: Node::text(text, vec![]),
                    outer_deco: Vec::new(),
                    node_dom,
                }),
            ),
        )
    }

    fn widget_desc(tree: &mut DescTree, dom: &mut Dom, pos: usize, side: i32) -> DescId {
        let el = dom.create_element("span");
        let list = tree.new_child_list();
        tree.insert(
            dom,
            ViewDesc::new(
                list,
                fixed(pos),
                el,
                DescKind::Widget(WidgetDesc {
                    widget: Decoration::widget(pos, WidgetSpec::new("span").with_side(side)),
                }),
            ),
        )
    }

    #[test]
    fn test_attach_sorts_and_dedupes() {
        let mut dom = Dom::new("div");
        let mut tree = DescTree::new();
        let list = tree.new_child_list();
        let c = text_desc(&mut tree, &mut dom, "c", 4);
        let a = text_desc(&mut tree, &mut dom, "a", 1);
        let w = widget_desc(&mut tree, &mut dom, 4, 1);
        let v = widget_desc(&mut tree, &mut dom, 4, -1);
        let trailing_dom = dom.create_element("br");
        let child_list = tree.new_child_list();
        let t = tree.insert(
            &mut dom,
            ViewDesc::new(child_list, fixed(0), trailing_dom, DescKind::TrailingHack),
        );
        for id in [t, c, w, a, v, c, a] {
            tree.attach(id, list);
        }
        assert_eq!(tree.list(list), &[a, v, w, c, t]);
    }

    #[test]
    fn test_destroy_clears_annotation_and_sibling_entry() {
        let mut dom = Dom::new("div");
        let mut tree = DescTree::new();
        let list = tree.new_child_list();
        let a = text_desc(&mut tree, &mut dom, "a", 1);
        tree.attach(a, list);
        let text_dom = tree.get(a).unwrap().dom;
        assert_eq!(dom.desc(text_dom), Some(a));
        tree.destroy(&mut dom, a);
        assert_eq!(dom.desc(text_dom), None);
        assert!(tree.list(list).is_empty());
        assert!(!tree.contains(a));
    }

    #[test]
    fn test_node_selection_styling() {
        let mut dom = Dom::new("div");
        let mut tree = DescTree::new();
        let img = dom.create_element("img");
        let list = tree.new_child_list();
        let ty = NodeType::inline_leaf("image", "img");
        let id = tree.insert(
            &mut dom,
            ViewDesc::new(
                list,
                fixed(3),
                img,
                DescKind::Node(NodeDesc {
                    node: Node::new(ty, Attrs::new(), vec![]),
                    outer_deco: Vec::new(),
                    inner_deco: DecorationSource::empty(),
                    node_dom: img,
                    capabilities: Rc::new(RefCell::new(Capabilities::default())),
                }),
            ),
        );
        tree.select_node(&mut dom, id);
        assert_eq!(
            dom.to_html(img),
            "<img class=\"ProseMirror-selectednode\" draggable=\"true\"></img>"
        );
        tree.deselect_node(&mut dom, id);
        assert_eq!(dom.to_html(img), "<img></img>");
        assert_eq!(tree.size(id), 1);
        assert_eq!(tree.border(id), 0);
        assert_eq!(tree.pos_after(id), 4);
    }

    #[test]
    fn test_custom_hooks_take_over() {
        let mut dom = Dom::new("div");
        let mut tree = DescTree::new();
        let el = dom.create_element("figure");
        let list = tree.new_child_list();
        let destroyed = Rc::new(Cell::new(false));
        let flag = destroyed.clone();
        let capabilities = Capabilities {
            ignore_mutation: Some(Rc::new(|_| true)),
            stop_event: Some(Rc::new(|event| event.kind == "mousedown")),
            destroy: Some(Rc::new(move || flag.set(true))),
            ..Default::default()
        };
        let id = tree.insert(
            &mut dom,
            ViewDesc::new(
                list,
                fixed(0),
                el,
                DescKind::Node(NodeDesc {
                    node: Node::new(NodeType::block_leaf("figure", "figure"), Attrs::new(), vec![]),
                    outer_deco: Vec::new(),
                    inner_deco: DecorationSource::empty(),
                    node_dom: el,
                    capabilities: Rc::new(RefCell::new(capabilities)),
                }),
            ),
        );
        let desc = tree.get(id).unwrap();
        assert!(desc.ignore_mutation(&ViewMutation::Selection));
        assert!(desc.stop_event(&DomEvent {
            kind: "mousedown".into(),
            target: el
        }));
        assert!(!desc.stop_event(&DomEvent {
            kind: "keydown".into(),
            target: el
        }));
        tree.destroy(&mut dom, id);
        assert!(destroyed.get());
    }
}
