//! Descriptor synchronisation, run from the renderer's layout effects.
//!
//! Each rendered region calls one `commit_*` function after the renderer
//! has written its DOM. The function either updates the region's existing
//! descriptor in place or replaces it, then files it into the parent's
//! child list. Children commit before their parents, and siblings in any
//! order, so every step here is idempotent and re-sorts the list it
//! touches.

use tracing::{debug, trace};

use crate::decoration::{Decoration, DecorationSource};
use crate::dom::{Dom, DomId};
use crate::error::{Result, ViewError};
use crate::input::InputState;
use crate::model::{Mark, Node, OutputSpec};
use crate::props::{
    Capabilities, MarkViews, NodeViewProps, NodeViewSpec, NodeViews, SharedCapabilities,
};
use crate::viewdesc::{
    ChildListId, CompositionDesc, DescId, DescKind, DescTree, GetPos, MarkDesc, NodeDesc,
    TextDesc, ViewDesc, WidgetDesc,
};

/// Mutable view state a commit works on.
pub struct SyncCx<'a> {
    pub dom: &'a mut Dom,
    pub descs: &'a mut DescTree,
    pub input: &'a mut InputState,
}

/// Where a region's descriptor is filed.
#[derive(Clone, Copy, Debug)]
pub struct ChildSlot {
    /// The parent's descriptor as of the last commit. The parent adopts
    /// its children again when it commits.
    pub parent: Option<DescId>,
    pub siblings: ChildListId,
}

/// A rendered document node.
pub struct NodeRegion<'a> {
    pub node: &'a Node,
    pub get_pos: &'a GetPos,
    pub outer_deco: &'a [Decoration],
    pub inner_deco: &'a DecorationSource,
    /// Outermost DOM of the region.
    pub dom: DomId,
    /// The element for the node itself.
    pub node_dom: DomId,
    pub content_dom: Option<DomId>,
    pub children: ChildListId,
    pub capabilities: &'a SharedCapabilities,
}

/// A rendered text run. `dom` is `None` when the renderer has nothing
/// mounted for it.
pub struct TextRegion<'a> {
    pub node: &'a Node,
    pub get_pos: &'a GetPos,
    pub outer_deco: &'a [Decoration],
    pub dom: Option<DomId>,
    pub children: ChildListId,
}

pub struct MarkRegion<'a> {
    pub mark: &'a Mark,
    pub get_pos: &'a GetPos,
    pub dom: DomId,
    pub content_dom: Option<DomId>,
    pub children: ChildListId,
    pub capabilities: &'a SharedCapabilities,
}

pub struct WidgetRegion<'a> {
    pub widget: &'a Decoration,
    pub get_pos: &'a GetPos,
    pub dom: DomId,
    pub children: ChildListId,
}

pub struct TrailingRegion<'a> {
    pub get_pos: &'a GetPos,
    pub dom: DomId,
    pub children: ChildListId,
}

/// Resolve the template a node renders with: its node view if one is
/// registered, otherwise its type's output template.
pub fn resolve_node_output(node_views: &NodeViews, props: &NodeViewProps) -> Result<NodeViewSpec> {
    if let Some(view) = node_views.get(props.node.type_name()) {
        return Ok(view(props));
    }
    match props.node.ty().output() {
        Some(output) => Ok(NodeViewSpec::new(output.clone())),
        None => Err(ViewError::MissingRenderer {
            node_type: props.node.type_name().to_string(),
        }),
    }
}

pub fn resolve_mark_output(mark_views: &MarkViews, mark: &Mark, inline: bool) -> Result<OutputSpec> {
    if let Some(view) = mark_views.get(mark.ty().name()) {
        if let Some(output) = view(mark, inline) {
            return Ok(output);
        }
    }
    mark.ty()
        .output()
        .cloned()
        .ok_or_else(|| ViewError::MissingMarkRenderer {
            mark_type: mark.ty().name().to_string(),
        })
}

fn file(cx: &mut SyncCx<'_>, id: DescId, slot: ChildSlot) {
    if let Some(desc) = cx.descs.get_mut(id) {
        desc.parent = slot.parent;
    }
    cx.descs.attach(id, slot.siblings);
}

/// Drop the old descriptor in `desc`, if any, so a new one can take over.
fn replace(cx: &mut SyncCx<'_>, desc: &mut Option<DescId>) {
    if let Some(old) = desc.take() {
        if let Some(removed) = cx.descs.destroy(cx.dom, old) {
            remove_composition_dom(cx.dom, &removed, None);
        }
    }
}

/// A composition descriptor owns DOM the renderer never created. Remove it
/// once the descriptor is gone, unless it is being handed to `keep`.
fn remove_composition_dom(dom: &mut Dom, removed: &ViewDesc, keep: Option<DomId>) {
    let DescKind::Composition(comp) = &removed.kind else {
        return;
    };
    for node in [comp.text_dom, removed.dom] {
        if Some(node) != keep && dom.exists(node) && dom.desc(node).is_none() {
            trace!(target: "weaver::sync", ?node, "removing orphaned composition dom");
            dom.remove(node);
        }
    }
}

fn node_matches(cx: &SyncCx<'_>, id: DescId, region: &NodeRegion<'_>) -> bool {
    let Some(desc) = cx.descs.get(id) else {
        return false;
    };
    let Some(node_desc) = desc.node_desc() else {
        return false;
    };
    desc.dom == region.dom
        && desc.content_dom == region.content_dom
        && node_desc.node.eq_markup(region.node)
        && cx.dom.contains(region.dom, node_desc.node_dom)
}

fn node_kind(region: &NodeRegion<'_>) -> NodeDesc {
    NodeDesc {
        node: region.node.clone(),
        outer_deco: region.outer_deco.to_vec(),
        inner_deco: region.inner_deco.clone(),
        node_dom: region.node_dom,
        capabilities: region.capabilities.clone(),
    }
}

fn commit_node_desc(
    cx: &mut SyncCx<'_>,
    desc: &mut Option<DescId>,
    region: &NodeRegion<'_>,
    root: bool,
) -> DescId {
    if let Some(id) = desc.filter(|&id| node_matches(cx, id, region)) {
        if let Some(existing) = cx.descs.get_mut(id) {
            existing.get_pos = region.get_pos.clone();
            match &mut existing.kind {
                DescKind::Doc(node_desc) | DescKind::Node(node_desc) => {
                    node_desc.node = region.node.clone();
                    node_desc.outer_deco = region.outer_deco.to_vec();
                    node_desc.inner_deco = region.inner_deco.clone();
                    node_desc.node_dom = region.node_dom;
                    node_desc.capabilities = region.capabilities.clone();
                }
                _ => {}
            }
        }
        cx.descs.annotate(cx.dom, id);
        return id;
    }

    if desc.is_some() {
        debug!(
            target: "weaver::sync",
            node_type = %region.node.type_name(),
            "node descriptor no longer matches, replacing"
        );
    }
    replace(cx, desc);
    let kind = if root {
        DescKind::Doc(node_kind(region))
    } else {
        DescKind::Node(node_kind(region))
    };
    let id = cx.descs.insert(
        cx.dom,
        ViewDesc::new(region.children, region.get_pos.clone(), region.dom, kind)
            .with_content_dom(region.content_dom),
    );
    *desc = Some(id);
    id
}

/// Layout effect of a node region.
pub fn commit_node(
    cx: &mut SyncCx<'_>,
    desc: &mut Option<DescId>,
    slot: ChildSlot,
    region: NodeRegion<'_>,
) -> Result<DescId> {
    let id = commit_node_desc(cx, desc, &region, false);
    file(cx, id, slot);
    cx.descs.adopt_children(id);
    resolve_compositions(cx, id)?;
    Ok(id)
}

/// Layout effect of the document root.
pub fn commit_doc(
    cx: &mut SyncCx<'_>,
    desc: &mut Option<DescId>,
    region: NodeRegion<'_>,
) -> Result<DescId> {
    let id = commit_node_desc(cx, desc, &region, true);
    if let Some(root) = cx.descs.get_mut(id) {
        root.parent = None;
        root.siblings = None;
    }
    cx.descs.set_root(id);
    cx.descs.sort_list(region.children);
    cx.descs.adopt_children(id);
    resolve_compositions(cx, id)?;
    Ok(id)
}

/// Point unresolved composition children at the text node the input
/// method is writing into.
fn resolve_compositions(cx: &mut SyncCx<'_>, id: DescId) -> Result<()> {
    let Some(content) = cx.descs.get(id).and_then(|desc| desc.content_dom) else {
        return Ok(());
    };
    let pending: Vec<DescId> = cx
        .descs
        .children(id)
        .iter()
        .copied()
        .filter(|&child| {
            matches!(
                cx.descs.get(child).map(|d| &d.kind),
                Some(DescKind::Composition(CompositionDesc { resolved: false, .. }))
            )
        })
        .collect();
    for child in pending {
        let text_dom = find_unowned_text(cx.dom, content).ok_or(ViewError::CompositionTextNotFound)?;
        let text = cx.dom.text(text_dom).unwrap_or_default().to_string();
        let mut placeholder = None;
        if let Some(desc) = cx.descs.get_mut(child) {
            placeholder = Some(desc.dom);
            desc.dom = text_dom;
            desc.kind = DescKind::Composition(CompositionDesc {
                text_dom,
                text,
                resolved: true,
            });
        }
        if let Some(placeholder) = placeholder {
            cx.dom.remove(placeholder);
        }
        cx.descs.annotate(cx.dom, child);
        cx.input.composition_nodes.push(child);
        debug!(target: "weaver::sync", ?child, ?text_dom, "resolved composition text");
    }
    Ok(())
}

/// First text node under `root` that no descriptor claims, skipping
/// claimed subtrees.
fn find_unowned_text(dom: &Dom, root: DomId) -> Option<DomId> {
    dom.children(root).iter().find_map(|&child| {
        if dom.desc(child).is_some() {
            None
        } else if dom.is_text(child) {
            Some(child)
        } else {
            find_unowned_text(dom, child)
        }
    })
}

/// Layout effect of a text region.
///
/// While composing, a text region whose DOM disappeared (the input method
/// replaced it) keeps its place as a composition placeholder, and nothing
/// else is torn down.
pub fn commit_text(
    cx: &mut SyncCx<'_>,
    desc: &mut Option<DescId>,
    slot: ChildSlot,
    region: TextRegion<'_>,
) -> Result<Option<DescId>> {
    let mounted = region.dom.filter(|&node| cx.dom.is_attached(node));
    let Some(dom_node) = mounted else {
        if !cx.input.composing {
            trace!(target: "weaver::sync", "text region has no dom, skipping");
            return Ok(*desc);
        }
        let existing = desc.filter(|&id| cx.descs.get(id).is_some_and(ViewDesc::is_composition));
        if let Some(id) = existing {
            if let Some(comp) = cx.descs.get_mut(id) {
                comp.get_pos = region.get_pos.clone();
            }
            file(cx, id, slot);
            return Ok(Some(id));
        }
        let text = region.node.text_content().unwrap_or_default();
        let placeholder = cx.dom.create_element("div");
        let text_dom = cx.dom.create_text(text);
        cx.dom.append_child(placeholder, text_dom);
        replace(cx, desc);
        let id = cx.descs.insert(
            cx.dom,
            ViewDesc::new(
                region.children,
                region.get_pos.clone(),
                placeholder,
                DescKind::Composition(CompositionDesc {
                    text_dom,
                    text: text.to_string(),
                    resolved: false,
                }),
            ),
        );
        debug!(target: "weaver::sync", ?id, "text dom lost during composition, holding placeholder");
        *desc = Some(id);
        file(cx, id, slot);
        return Ok(Some(id));
    };

    let node_dom = cx.dom.first_text_leaf(dom_node).unwrap_or(dom_node);
    let reusable = desc.filter(|&id| {
        cx.descs
            .get(id)
            .is_some_and(|d| d.dom == dom_node && matches!(d.kind, DescKind::Text(_)))
    });
    let id = match reusable {
        Some(id) => {
            if let Some(existing) = cx.descs.get_mut(id) {
                existing.get_pos = region.get_pos.clone();
                existing.kind = DescKind::Text(TextDesc {
                    node: region.node.clone(),
                    outer_deco: region.outer_deco.to_vec(),
                    node_dom,
                });
            }
            cx.descs.annotate(cx.dom, id);
            id
        }
        None => {
            if let Some(old) = desc.take() {
                if let Some(removed) = cx.descs.destroy(cx.dom, old) {
                    remove_composition_dom(cx.dom, &removed, Some(dom_node));
                }
            }
            let id = cx.descs.insert(
                cx.dom,
                ViewDesc::new(
                    region.children,
                    region.get_pos.clone(),
                    dom_node,
                    DescKind::Text(TextDesc {
                        node: region.node.clone(),
                        outer_deco: region.outer_deco.to_vec(),
                        node_dom,
                    }),
                ),
            );
            *desc = Some(id);
            id
        }
    };
    file(cx, id, slot);
    Ok(Some(id))
}

/// Layout effect of a mark region.
pub fn commit_mark(
    cx: &mut SyncCx<'_>,
    desc: &mut Option<DescId>,
    slot: ChildSlot,
    region: MarkRegion<'_>,
) -> DescId {
    let reusable = desc.filter(|&id| {
        cx.descs.get(id).is_some_and(|d| {
            d.dom == region.dom
                && d.content_dom == region.content_dom
                && matches!(&d.kind, DescKind::Mark(m) if m.mark == *region.mark)
        })
    });
    let id = match reusable {
        Some(id) => {
            if let Some(existing) = cx.descs.get_mut(id) {
                existing.get_pos = region.get_pos.clone();
            }
            cx.descs.annotate(cx.dom, id);
            id
        }
        None => {
            replace(cx, desc);
            let id = cx.descs.insert(
                cx.dom,
                ViewDesc::new(
                    region.children,
                    region.get_pos.clone(),
                    region.dom,
                    DescKind::Mark(MarkDesc {
                        mark: region.mark.clone(),
                        capabilities: region.capabilities.clone(),
                    }),
                )
                .with_content_dom(region.content_dom),
            );
            *desc = Some(id);
            id
        }
    };
    file(cx, id, slot);
    cx.descs.adopt_children(id);
    id
}

/// Layout effect of a widget region.
pub fn commit_widget(
    cx: &mut SyncCx<'_>,
    desc: &mut Option<DescId>,
    slot: ChildSlot,
    region: WidgetRegion<'_>,
) -> DescId {
    let reusable = desc.filter(|&id| {
        cx.descs.get(id).is_some_and(|d| {
            d.dom == region.dom
                && matches!(&d.kind, DescKind::Widget(w) if w.widget == *region.widget)
        })
    });
    let id = match reusable {
        Some(id) => {
            if let Some(existing) = cx.descs.get_mut(id) {
                existing.get_pos = region.get_pos.clone();
            }
            id
        }
        None => {
            replace(cx, desc);
            let id = cx.descs.insert(
                cx.dom,
                ViewDesc::new(
                    region.children,
                    region.get_pos.clone(),
                    region.dom,
                    DescKind::Widget(WidgetDesc {
                        widget: region.widget.clone(),
                    }),
                ),
            );
            *desc = Some(id);
            id
        }
    };
    file(cx, id, slot);
    id
}

/// Layout effect of a trailing filler.
pub fn commit_trailing(
    cx: &mut SyncCx<'_>,
    desc: &mut Option<DescId>,
    slot: ChildSlot,
    region: TrailingRegion<'_>,
) -> DescId {
    let reusable = desc.filter(|&id| {
        cx.descs
            .get(id)
            .is_some_and(|d| d.dom == region.dom && d.is_trailing_hack())
    });
    let id = match reusable {
        Some(id) => {
            if let Some(existing) = cx.descs.get_mut(id) {
                existing.get_pos = region.get_pos.clone();
            }
            id
        }
        None => {
            replace(cx, desc);
            let id = cx.descs.insert(
                cx.dom,
                ViewDesc::new(
                    region.children,
                    region.get_pos.clone(),
                    region.dom,
                    DescKind::TrailingHack,
                ),
            );
            *desc = Some(id);
            id
        }
    };
    file(cx, id, slot);
    id
}

/// Unmount cleanup of a region: destroy its descriptor and release its
/// child list.
pub fn unmount(cx: &mut SyncCx<'_>, desc: Option<DescId>, children: ChildListId) {
    if let Some(id) = desc {
        if let Some(removed) = cx.descs.destroy(cx.dom, id) {
            remove_composition_dom(cx.dom, &removed, None);
        }
        cx.input.composition_nodes.retain(|&c| c != id);
    }
    cx.descs.drop_child_list(children);
}

/// Fresh, empty capabilities for a region.
pub fn new_capabilities() -> SharedCapabilities {
    std::rc::Rc::new(std::cell::RefCell::new(Capabilities::default()))
}
