//! A small keyed renderer that stands in for a declarative UI library.
//!
//! Each render reconciles the document against the regions rendered last
//! time, keyed by node key, and writes the DOM. Unmount cleanups then run,
//! followed by layout effects, children before parents, which hand every
//! region to the descriptor synchroniser. Last, the view commits its
//! pending state.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use smol_str::{SmolStr, format_smolstr};
use tracing::{debug, trace};

use crate::decoration::{Decoration, DecorationSource};
use crate::dom::{Dom, DomId};
use crate::error::Result;
use crate::keys::NodeKeys;
use crate::model::{Attrs, Mark, Node, OutputSpec};
use crate::props::{MarkViews, NodeViewConstructor, NodeViewProps, NodeViews, SharedCapabilities};
use crate::sync::{
    self, ChildSlot, MarkRegion, NodeRegion, SyncCx, TextRegion, TrailingRegion, WidgetRegion,
};
use crate::view::EditorView;
use crate::viewdesc::{ChildListId, DescId, DescTree, GetPos};

/// Order in which sibling layout effects fire. Children always fire
/// before their parent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EffectOrder {
    #[default]
    InOrder,
    Reversed,
}

/// Renders an [`EditorView`]'s pending state into its DOM.
#[derive(Default)]
pub struct DocRenderer {
    root: Option<Region>,
    order: EffectOrder,
}

struct Region {
    key: SmolStr,
    pos: Rc<Cell<usize>>,
    get_pos: GetPos,
    /// Outermost DOM node. Text regions may lose theirs to an input method.
    dom: Option<DomId>,
    child_list: ChildListId,
    children: Vec<Region>,
    desc: Option<DescId>,
    capabilities: SharedCapabilities,
    kind: RegionKind,
}

enum RegionKind {
    Doc {
        node: Node,
        inner: DecorationSource,
    },
    Node {
        node: Node,
        outer: Vec<Decoration>,
        inner: DecorationSource,
        node_dom: DomId,
        content_dom: Option<DomId>,
        template: OutputSpec,
        view: Option<NodeViewConstructor>,
        /// Attributes last written to `node_dom`.
        attrs: Attrs,
    },
    Text {
        node: Node,
        outer: Vec<Decoration>,
        wrappers: Vec<Attrs>,
        text_dom: DomId,
    },
    Mark {
        mark: Mark,
        content_dom: Option<DomId>,
        template: OutputSpec,
    },
    Widget {
        deco: Decoration,
    },
    Trailing,
}

/// A child the current document asks for.
enum Want {
    Node {
        key: SmolStr,
        pos: usize,
        node: Node,
        outer: Vec<Decoration>,
        inner: DecorationSource,
    },
    Text {
        key: SmolStr,
        pos: usize,
        node: Node,
        outer: Vec<Decoration>,
    },
    Mark {
        key: SmolStr,
        pos: usize,
        mark: Mark,
        children: Vec<Want>,
    },
    Widget {
        key: SmolStr,
        pos: usize,
        deco: Decoration,
    },
    Trailing {
        pos: usize,
    },
}

impl Want {
    fn key(&self) -> SmolStr {
        match self {
            Want::Node { key, .. }
            | Want::Text { key, .. }
            | Want::Mark { key, .. }
            | Want::Widget { key, .. } => key.clone(),
            Want::Trailing { .. } => SmolStr::new_static("trailing"),
        }
    }

    fn pos(&self) -> usize {
        match self {
            Want::Node { pos, .. }
            | Want::Text { pos, .. }
            | Want::Mark { pos, .. }
            | Want::Widget { pos, .. }
            | Want::Trailing { pos } => *pos,
        }
    }
}

/// An inline or block child with the marks it sits under.
struct Leaf {
    marks: Vec<Mark>,
    want: Want,
}

struct RenderCx<'a> {
    dom: &'a mut Dom,
    descs: &'a mut DescTree,
    node_views: &'a NodeViews,
    mark_views: &'a MarkViews,
    keys: Option<&'a NodeKeys>,
    composing: bool,
    selection_head: usize,
    unmounted: Vec<(Option<DescId>, ChildListId)>,
}

impl DocRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_effect_order(mut self, order: EffectOrder) -> Self {
        self.order = order;
        self
    }

    pub fn set_effect_order(&mut self, order: EffectOrder) {
        self.order = order;
    }

    /// Render the view's pending state, run layout effects, and commit.
    ///
    /// Configuration errors abort the cycle before the state is committed.
    pub fn render(&mut self, view: &mut EditorView) -> Result<()> {
        let state = view.state().clone();
        let deco = view.decorations();
        let mut cx = RenderCx {
            dom: &mut view.dom,
            descs: &mut view.descs,
            node_views: &view.node_views,
            mark_views: &view.mark_views,
            keys: state.node_keys(),
            composing: view.input.composing,
            selection_head: state.selection().head(),
            unmounted: Vec::new(),
        };
        let mut root = cx.render_doc(self.root.take(), state.doc(), &deco)?;
        let unmounted = std::mem::take(&mut cx.unmounted);
        debug!(target: "weaver::render", unmounted = unmounted.len(), "rendered document");

        let mut sync = SyncCx {
            dom: &mut view.dom,
            descs: &mut view.descs,
            input: &mut view.input,
        };
        for (desc, list) in unmounted {
            sync::unmount(&mut sync, desc, list);
        }
        let result = run_effects(&mut sync, &mut root, None, self.order);
        self.root = Some(root);
        result?;
        view.commit_pending_effects();
        Ok(())
    }

    /// Tear down everything rendered so far.
    pub fn unmount(&mut self, view: &mut EditorView) {
        let Some(root) = self.root.take() else {
            return;
        };
        let mut cx = RenderCx {
            dom: &mut view.dom,
            descs: &mut view.descs,
            node_views: &view.node_views,
            mark_views: &view.mark_views,
            keys: None,
            composing: false,
            selection_head: 0,
            unmounted: Vec::new(),
        };
        for child in root.children {
            cx.unmount_region(child);
        }
        cx.unmounted.push((root.desc, root.child_list));
        let unmounted = std::mem::take(&mut cx.unmounted);
        let mut sync = SyncCx {
            dom: &mut view.dom,
            descs: &mut view.descs,
            input: &mut view.input,
        };
        for (desc, list) in unmounted {
            sync::unmount(&mut sync, desc, list);
        }
        view.forget_committed();
    }
}

impl RenderCx<'_> {
    fn new_region(&mut self, key: SmolStr, pos: usize, dom: Option<DomId>, kind: RegionKind) -> Region {
        let cell = Rc::new(Cell::new(pos));
        let get_pos: GetPos = {
            let cell = cell.clone();
            Rc::new(move || cell.get())
        };
        Region {
            key,
            pos: cell,
            get_pos,
            dom,
            child_list: self.descs.new_child_list(),
            children: Vec::new(),
            desc: None,
            capabilities: sync::new_capabilities(),
            kind,
        }
    }

    /// `prev` if `keep` accepts it. A rejected region is unmounted.
    fn keep_if(&mut self, prev: Option<Region>, keep: impl FnOnce(&Dom, &Region) -> bool) -> Option<Region> {
        let region = prev?;
        if keep(&*self.dom, &region) {
            Some(region)
        } else {
            self.unmount_region(region);
            None
        }
    }

    fn unmount_region(&mut self, region: Region) {
        if let Some(node) = region.dom {
            if self.dom.exists(node) && node != self.dom.root() {
                self.dom.remove(node);
            }
        }
        self.collect_unmounts(region);
    }

    fn collect_unmounts(&mut self, region: Region) {
        for child in region.children {
            self.collect_unmounts(child);
        }
        self.unmounted.push((region.desc, region.child_list));
    }

    fn render_doc(&mut self, prev: Option<Region>, doc: &Node, deco: &DecorationSource) -> Result<Region> {
        let root = self.dom.root();
        let mut region = match prev {
            Some(region) => region,
            None => self.new_region(
                SmolStr::new_static("doc"),
                0,
                Some(root),
                RegionKind::Doc {
                    node: doc.clone(),
                    inner: deco.clone(),
                },
            ),
        };
        region.kind = RegionKind::Doc {
            node: doc.clone(),
            inner: deco.clone(),
        };
        let wants = self.child_wants(doc, 0, deco);
        let old = std::mem::take(&mut region.children);
        region.children = self.reconcile(root, old, wants)?;
        Ok(region)
    }

    fn reconcile(&mut self, container: DomId, old: Vec<Region>, wants: Vec<Want>) -> Result<Vec<Region>> {
        let mut index: HashMap<SmolStr, usize> = HashMap::new();
        for (i, region) in old.iter().enumerate() {
            index.entry(region.key.clone()).or_insert(i);
        }
        let mut old: Vec<Option<Region>> = old.into_iter().map(Some).collect();
        let mut out = Vec::with_capacity(wants.len());
        for want in wants {
            let prev = index
                .get(&want.key())
                .and_then(|&i| old.get_mut(i))
                .and_then(Option::take);
            out.push(self.render_region(prev, want)?);
        }
        for region in old.into_iter().flatten() {
            trace!(target: "weaver::render", key = %region.key, "unmounting region");
            self.unmount_region(region);
        }
        self.place(container, &out);
        Ok(out)
    }

    /// Put the regions' DOM into `container` in order, moving only nodes
    /// that are out of place. Nodes the renderer doesn't own are left
    /// where they are.
    fn place(&mut self, container: DomId, regions: &[Region]) {
        let mut next: Option<DomId> = None;
        for region in regions.iter().rev() {
            let Some(node) = region.dom.filter(|&node| self.dom.exists(node)) else {
                continue;
            };
            let in_place = self.dom.parent(node) == Some(container)
                && next.is_none_or(|next| self.dom.index_of(node) < self.dom.index_of(next));
            if !in_place {
                self.dom.insert_before(container, node, next);
            }
            next = Some(node);
        }
    }

    fn render_region(&mut self, prev: Option<Region>, want: Want) -> Result<Region> {
        match want {
            Want::Node {
                key,
                pos,
                node,
                outer,
                inner,
            } => self.render_node(prev, key, pos, node, outer, inner),
            Want::Text {
                key,
                pos,
                node,
                outer,
            } => Ok(self.render_text(prev, key, pos, node, outer)),
            Want::Mark {
                key,
                pos,
                mark,
                children,
            } => self.render_mark(prev, key, pos, mark, children),
            Want::Widget { key, pos, deco } => Ok(self.render_widget(prev, key, pos, deco)),
            Want::Trailing { pos } => Ok(self.render_trailing(prev, pos)),
        }
    }

    fn render_node(
        &mut self,
        prev: Option<Region>,
        key: SmolStr,
        pos: usize,
        node: Node,
        outer: Vec<Decoration>,
        inner: DecorationSource,
    ) -> Result<Region> {
        let view = self.node_views.get(node.type_name()).cloned();
        let get_pos: GetPos = match &prev {
            Some(region) => region.get_pos.clone(),
            None => Rc::new(move || pos),
        };
        let spec = sync::resolve_node_output(
            self.node_views,
            &NodeViewProps {
                node: node.clone(),
                get_pos,
                outer_deco: outer.clone(),
                inner_deco: inner.clone(),
            },
        )?;
        let attrs = merge_attrs(top_attrs(&spec.output), &outer);

        let reusable = self.keep_if(prev, |dom, region| match &region.kind {
            RegionKind::Node {
                node: old,
                template,
                view: old_view,
                ..
            } => {
                old.ty() == node.ty()
                    && shape(template) == shape(&spec.output)
                    && same_view(old_view, &view)
                    && region.dom.is_some_and(|node| dom.exists(node))
            }
            _ => false,
        });

        let mut region = match reusable {
            Some(mut region) => {
                if let RegionKind::Node {
                    node_dom,
                    attrs: applied,
                    ..
                } = &region.kind
                {
                    patch_attrs(self.dom, *node_dom, applied, &attrs);
                }
                region.pos.set(pos);
                region
            }
            None => {
                let (dom, content_dom) = build_output(self.dom, &spec.output);
                patch_attrs(self.dom, dom, &top_attrs(&spec.output), &attrs);
                let mut region = self.new_region(
                    key,
                    pos,
                    Some(dom),
                    RegionKind::Node {
                        node: node.clone(),
                        outer: Vec::new(),
                        inner: DecorationSource::empty(),
                        node_dom: dom,
                        content_dom,
                        template: spec.output.clone(),
                        view: view.clone(),
                        attrs: Attrs::new(),
                    },
                );
                region.pos.set(pos);
                region
            }
        };
        *region.capabilities.borrow_mut() = spec.capabilities;

        let (node_dom, content_dom) = match &region.kind {
            RegionKind::Node {
                node_dom,
                content_dom,
                ..
            } => (*node_dom, *content_dom),
            _ => unreachable!("node regions keep their kind"),
        };
        let old_children = std::mem::take(&mut region.children);
        match content_dom.filter(|_| !node.is_leaf()) {
            Some(content) => {
                let wants = self.child_wants(&node, pos + 1, &inner);
                region.children = self.reconcile(content, old_children, wants)?;
            }
            None => {
                for child in old_children {
                    self.unmount_region(child);
                }
            }
        }
        region.kind = RegionKind::Node {
            node,
            outer,
            inner,
            node_dom,
            content_dom,
            template: spec.output,
            view,
            attrs,
        };
        Ok(region)
    }

    fn render_text(
        &mut self,
        prev: Option<Region>,
        key: SmolStr,
        pos: usize,
        node: Node,
        outer: Vec<Decoration>,
    ) -> Region {
        let text = node.text_content().unwrap_or_default().to_string();
        let wrappers: Vec<Attrs> = outer.iter().filter_map(|d| d.attrs().cloned()).collect();
        let prev = self.keep_if(prev, |_, region| matches!(region.kind, RegionKind::Text { .. }));

        // Leave the DOM alone while an input method is writing into it.
        let frozen =
            self.composing && pos <= self.selection_head && self.selection_head <= pos + node.node_size();
        if frozen {
            if let Some(mut region) = prev {
                trace!(target: "weaver::render", pos, "text frozen during composition");
                region.pos.set(pos);
                if let RegionKind::Text {
                    node: old,
                    outer: old_outer,
                    ..
                } = &mut region.kind
                {
                    *old = node;
                    *old_outer = outer;
                }
                return region;
            }
            return self.build_text(key, pos, node, outer, &text, wrappers);
        }

        let reusable = self.keep_if(prev, |dom, region| match &region.kind {
            RegionKind::Text {
                wrappers: old,
                text_dom,
                ..
            } => *old == wrappers && dom.is_attached(*text_dom),
            _ => false,
        });
        match reusable {
            Some(mut region) => {
                if let RegionKind::Text {
                    node: old,
                    outer: old_outer,
                    text_dom,
                    ..
                } = &mut region.kind
                {
                    self.dom.set_text(*text_dom, &text);
                    *old = node;
                    *old_outer = outer;
                }
                region.pos.set(pos);
                region
            }
            None => self.build_text(key, pos, node, outer, &text, wrappers),
        }
    }

    fn build_text(
        &mut self,
        key: SmolStr,
        pos: usize,
        node: Node,
        outer: Vec<Decoration>,
        text: &str,
        wrappers: Vec<Attrs>,
    ) -> Region {
        let text_dom = self.dom.create_text(text);
        let mut dom = text_dom;
        for attrs in wrappers.iter().rev() {
            let span = self.dom.create_element("span");
            patch_attrs(self.dom, span, &Attrs::new(), attrs);
            self.dom.append_child(span, dom);
            dom = span;
        }
        self.new_region(
            key,
            pos,
            Some(dom),
            RegionKind::Text {
                node,
                outer,
                wrappers,
                text_dom,
            },
        )
    }

    fn render_mark(
        &mut self,
        prev: Option<Region>,
        key: SmolStr,
        pos: usize,
        mark: Mark,
        children: Vec<Want>,
    ) -> Result<Region> {
        let template = sync::resolve_mark_output(self.mark_views, &mark, true)?;
        let reusable = self.keep_if(prev, |dom, region| match &region.kind {
            RegionKind::Mark {
                mark: old,
                template: old_template,
                ..
            } => {
                *old == mark
                    && *old_template == template
                    && region.dom.is_some_and(|node| dom.exists(node))
            }
            _ => false,
        });
        let mut region = match reusable {
            Some(region) => region,
            None => {
                let (dom, content_dom) = build_output(self.dom, &template);
                self.new_region(
                    key,
                    pos,
                    Some(dom),
                    RegionKind::Mark {
                        mark,
                        content_dom: Some(content_dom.unwrap_or(dom)),
                        template,
                    },
                )
            }
        };
        region.pos.set(pos);
        let content = match &region.kind {
            RegionKind::Mark { content_dom, .. } => *content_dom,
            _ => None,
        };
        let old_children = std::mem::take(&mut region.children);
        if let Some(content) = content {
            region.children = self.reconcile(content, old_children, children)?;
        }
        Ok(region)
    }

    fn render_widget(&mut self, prev: Option<Region>, key: SmolStr, pos: usize, deco: Decoration) -> Region {
        let reusable = self.keep_if(prev, |dom, region| match &region.kind {
            RegionKind::Widget { deco: old } => {
                old.kind() == deco.kind() && region.dom.is_some_and(|node| dom.exists(node))
            }
            _ => false,
        });
        let mut region = match reusable {
            Some(region) => region,
            None => {
                let spec = deco.widget_spec().cloned();
                let tag = spec.as_ref().map_or("span", |spec| spec.tag.as_str());
                let dom = self.dom.create_element(tag);
                if let Some(spec) = &spec {
                    patch_attrs(self.dom, dom, &Attrs::new(), &spec.attrs);
                }
                self.dom.set_attr(dom, "contenteditable", "false");
                self.dom.add_class(dom, "ProseMirror-widget");
                self.new_region(key, pos, Some(dom), RegionKind::Widget { deco: deco.clone() })
            }
        };
        region.pos.set(pos);
        region.kind = RegionKind::Widget { deco };
        region
    }

    fn render_trailing(&mut self, prev: Option<Region>, pos: usize) -> Region {
        let reusable = self.keep_if(prev, |dom, region| {
            matches!(region.kind, RegionKind::Trailing)
                && region.dom.is_some_and(|node| dom.exists(node))
        });
        let region = match reusable {
            Some(region) => region,
            None => {
                let dom = self.dom.create_element("br");
                self.dom.add_class(dom, "ProseMirror-trailingBreak");
                self.new_region(SmolStr::new_static("trailing"), pos, Some(dom), RegionKind::Trailing)
            }
        };
        region.pos.set(pos);
        region
    }

    /// The children `parent` renders, with widgets interleaved, text split
    /// at decoration boundaries, and inline content grouped under marks.
    fn child_wants(&self, parent: &Node, content_start: usize, deco: &DecorationSource) -> Vec<Want> {
        let locals = deco.locals(parent);
        let mut widgets: Vec<&Decoration> = locals.iter().filter(|d| d.widget_spec().is_some()).collect();
        widgets.sort_by_key(|d| (d.from, d.widget_spec().map_or(0, |spec| spec.side)));
        let inline: Vec<&Decoration> = locals.iter().filter(|d| d.is_inline()).collect();
        let node_decos: Vec<&Decoration> = locals.iter().filter(|d| d.is_node()).collect();

        let mut leaves = Vec::new();
        let mut next_widget = 0;
        for (index, (offset, child)) in parent.children_with_offsets().enumerate() {
            let end = offset + child.node_size();
            if child.is_text() {
                let mut cuts: Vec<usize> = inline
                    .iter()
                    .flat_map(|d| [d.from, d.to])
                    .chain(widgets.iter().map(|d| d.from))
                    .filter(|&cut| cut > offset && cut < end)
                    .collect();
                cuts.sort_unstable();
                cuts.dedup();
                cuts.push(end);
                let mut start = offset;
                for cut in cuts {
                    take_widgets(&widgets, &mut next_widget, start, content_start, &mut leaves);
                    let outer = inline
                        .iter()
                        .filter(|d| d.from <= start && cut <= d.to)
                        .map(|d| (*d).clone())
                        .collect();
                    leaves.push(Leaf {
                        marks: child.marks().to_vec(),
                        want: Want::Text {
                            key: format_smolstr!("text:{index}:{}", start - offset),
                            pos: content_start + start,
                            node: child.cut_text(start - offset, cut - offset),
                            outer,
                        },
                    });
                    start = cut;
                }
            } else {
                take_widgets(&widgets, &mut next_widget, offset, content_start, &mut leaves);
                let mut outer: Vec<Decoration> = node_decos
                    .iter()
                    .filter(|d| d.from == offset && d.to == end)
                    .map(|d| (*d).clone())
                    .collect();
                if child.is_inline() {
                    outer.extend(
                        inline
                            .iter()
                            .filter(|d| d.from <= offset && end <= d.to)
                            .map(|d| (*d).clone()),
                    );
                }
                let pos = content_start + offset;
                let key = self
                    .keys
                    .and_then(|keys| keys.key_at(pos))
                    .cloned()
                    .unwrap_or_else(|| format_smolstr!("{}:{index}", child.type_name()));
                leaves.push(Leaf {
                    marks: child.marks().to_vec(),
                    want: Want::Node {
                        key,
                        pos,
                        node: child.clone(),
                        outer,
                        inner: deco.for_child(offset, child),
                    },
                });
            }
        }
        take_widgets(&widgets, &mut next_widget, usize::MAX, content_start, &mut leaves);

        let needs_trailing = parent.is_textblock()
            && match leaves.last().map(|leaf| &leaf.want) {
                Some(Want::Text { node, .. }) => {
                    node.text_content().is_some_and(|text| text.ends_with('\n'))
                }
                _ => true,
            };
        let mut wants = group_marks(leaves, 0);
        if needs_trailing {
            wants.push(Want::Trailing {
                pos: content_start + parent.content_size(),
            });
        }
        wants
    }
}

fn take_widgets(
    widgets: &[&Decoration],
    next: &mut usize,
    upto: usize,
    content_start: usize,
    leaves: &mut Vec<Leaf>,
) {
    while let Some(deco) = widgets.get(*next).filter(|d| d.from <= upto) {
        let key = deco
            .widget_spec()
            .and_then(|spec| spec.key.clone())
            .unwrap_or_else(|| format_smolstr!("widget:{}", *next));
        leaves.push(Leaf {
            marks: Vec::new(),
            want: Want::Widget {
                key,
                pos: content_start + deco.from,
                deco: (*deco).clone(),
            },
        });
        *next += 1;
    }
}

/// Nest runs of leaves sharing the mark at `depth` under a mark child.
fn group_marks(leaves: Vec<Leaf>, depth: usize) -> Vec<Want> {
    let mut out = Vec::new();
    let mut leaves = leaves.into_iter().peekable();
    while let Some(leaf) = leaves.next() {
        let Some(mark) = leaf.marks.get(depth).cloned() else {
            out.push(leaf.want);
            continue;
        };
        let key = format_smolstr!("mark:{}:{}", mark.ty().name(), leaf.want.key());
        let pos = leaf.want.pos();
        let mut run = vec![leaf];
        while let Some(next) = leaves.next_if(|next| next.marks.get(depth) == Some(&mark)) {
            run.push(next);
        }
        out.push(Want::Mark {
            key,
            pos,
            mark,
            children: group_marks(run, depth + 1),
        });
    }
    out
}

fn run_effects(
    cx: &mut SyncCx<'_>,
    region: &mut Region,
    slot: Option<ChildSlot>,
    order: EffectOrder,
) -> Result<()> {
    let child_slot = ChildSlot {
        parent: region.desc,
        siblings: region.child_list,
    };
    match order {
        EffectOrder::InOrder => {
            for child in region.children.iter_mut() {
                run_effects(cx, child, Some(child_slot), order)?;
            }
        }
        EffectOrder::Reversed => {
            for child in region.children.iter_mut().rev() {
                run_effects(cx, child, Some(child_slot), order)?;
            }
        }
    }

    let Some(dom) = region.dom else {
        return Ok(());
    };
    match (&region.kind, slot) {
        (RegionKind::Doc { node, inner }, _) => {
            sync::commit_doc(
                cx,
                &mut region.desc,
                NodeRegion {
                    node,
                    get_pos: &region.get_pos,
                    outer_deco: &[],
                    inner_deco: inner,
                    dom,
                    node_dom: dom,
                    content_dom: Some(dom),
                    children: region.child_list,
                    capabilities: &region.capabilities,
                },
            )?;
        }
        (
            RegionKind::Node {
                node,
                outer,
                inner,
                node_dom,
                content_dom,
                ..
            },
            Some(slot),
        ) => {
            sync::commit_node(
                cx,
                &mut region.desc,
                slot,
                NodeRegion {
                    node,
                    get_pos: &region.get_pos,
                    outer_deco: outer,
                    inner_deco: inner,
                    dom,
                    node_dom: *node_dom,
                    content_dom: *content_dom,
                    children: region.child_list,
                    capabilities: &region.capabilities,
                },
            )?;
        }
        (RegionKind::Text { node, outer, .. }, Some(slot)) => {
            sync::commit_text(
                cx,
                &mut region.desc,
                slot,
                TextRegion {
                    node,
                    get_pos: &region.get_pos,
                    outer_deco: outer,
                    dom: Some(dom),
                    children: region.child_list,
                },
            )?;
        }
        (RegionKind::Mark { mark, content_dom, .. }, Some(slot)) => {
            sync::commit_mark(
                cx,
                &mut region.desc,
                slot,
                MarkRegion {
                    mark,
                    get_pos: &region.get_pos,
                    dom,
                    content_dom: *content_dom,
                    children: region.child_list,
                    capabilities: &region.capabilities,
                },
            );
        }
        (RegionKind::Widget { deco }, Some(slot)) => {
            sync::commit_widget(
                cx,
                &mut region.desc,
                slot,
                WidgetRegion {
                    widget: deco,
                    get_pos: &region.get_pos,
                    dom,
                    children: region.child_list,
                },
            );
        }
        (RegionKind::Trailing, Some(slot)) => {
            sync::commit_trailing(
                cx,
                &mut region.desc,
                slot,
                TrailingRegion {
                    get_pos: &region.get_pos,
                    dom,
                    children: region.child_list,
                },
            );
        }
        (_, None) => {}
    }
    Ok(())
}

/// Build DOM for a template. Returns the top node and the content hole's
/// parent, if the template has a hole.
fn build_output(dom: &mut Dom, spec: &OutputSpec) -> (DomId, Option<DomId>) {
    let mut content = None;
    match build_spec(dom, spec, &mut content) {
        Some(top) => (top, content),
        None => {
            let top = dom.create_element("div");
            (top, Some(top))
        }
    }
}

fn build_spec(dom: &mut Dom, spec: &OutputSpec, content: &mut Option<DomId>) -> Option<DomId> {
    match spec {
        OutputSpec::Element {
            tag,
            attrs,
            children,
        } => {
            let el = dom.create_element(tag);
            patch_attrs(dom, el, &Attrs::new(), attrs);
            for child in children {
                if matches!(child, OutputSpec::Hole) {
                    *content = Some(el);
                } else if let Some(node) = build_spec(dom, child, content) {
                    dom.append_child(el, node);
                }
            }
            Some(el)
        }
        OutputSpec::Text(text) => Some(dom.create_text(text)),
        OutputSpec::Hole => None,
    }
}

fn top_attrs(spec: &OutputSpec) -> Attrs {
    match spec {
        OutputSpec::Element { attrs, .. } => attrs.clone(),
        _ => Attrs::new(),
    }
}

/// A template with its top-level attributes dropped. Templates with the
/// same shape can be patched in place.
fn shape(spec: &OutputSpec) -> OutputSpec {
    match spec {
        OutputSpec::Element { tag, children, .. } => OutputSpec::Element {
            tag: tag.clone(),
            attrs: Attrs::new(),
            children: children.clone(),
        },
        other => other.clone(),
    }
}

fn same_view(a: &Option<NodeViewConstructor>, b: &Option<NodeViewConstructor>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// Template attributes with node decoration attributes on top. Classes
/// accumulate, other attributes are overridden.
fn merge_attrs(mut attrs: Attrs, outer: &[Decoration]) -> Attrs {
    for deco in outer.iter().filter(|d| d.is_node()) {
        let Some(extra) = deco.attrs() else {
            continue;
        };
        for (name, value) in extra {
            if name == "class" {
                let merged = match attrs.get("class") {
                    Some(existing) => format_smolstr!("{existing} {value}"),
                    None => value.clone(),
                };
                attrs.insert(name.clone(), merged);
            } else {
                attrs.insert(name.clone(), value.clone());
            }
        }
    }
    attrs
}

/// Move an element's attributes from `old` to `new`. Classes are handled
/// one by one so classes added by others survive.
fn patch_attrs(dom: &mut Dom, node: DomId, old: &Attrs, new: &Attrs) {
    let classes = |attrs: &Attrs| -> Vec<SmolStr> {
        attrs
            .get("class")
            .map(|c| c.split_whitespace().map(SmolStr::new).collect())
            .unwrap_or_default()
    };
    let (old_classes, new_classes) = (classes(old), classes(new));
    for class in old_classes.iter().filter(|c| !new_classes.contains(*c)) {
        dom.remove_class(node, class);
    }
    for class in &new_classes {
        dom.add_class(node, class);
    }
    for name in old.keys().filter(|name| *name != "class" && !new.contains_key(*name)) {
        dom.remove_attr(node, name);
    }
    for (name, value) in new.iter().filter(|(name, _)| *name != "class") {
        if old.get(name) != Some(value) || dom.attr(node, name) != Some(value.as_str()) {
            dom.set_attr(node, name, value);
        }
    }
}
