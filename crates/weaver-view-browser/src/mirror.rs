//! Mirrors the view's DOM arena onto browser nodes.
//!
//! The arena is the source of truth. [`DomMirror::sync`] writes it out,
//! touching only nodes whose contents changed and moving children only
//! when they are out of order. While an input method is composing, the
//! browser edits text on its own; [`DomMirror::pull_text`] copies those
//! edits back into the arena before the next render.

use std::collections::{HashMap, HashSet};

use tracing::trace;
use wasm_bindgen::JsCast;
use weaver_view::dom::{Dom, DomId, DomKind};

use crate::BrowserError;

pub struct DomMirror {
    document: web_sys::Document,
    mount: web_sys::Element,
    nodes: HashMap<DomId, web_sys::Node>,
    /// Contents last written to each mirrored node.
    written: HashMap<DomId, DomKind>,
}

impl DomMirror {
    /// Mirror `dom` into `mount`. The arena root maps to the mount element.
    pub fn new(mount: web_sys::Element, dom: &Dom) -> Result<Self, BrowserError> {
        let document = mount.owner_document().ok_or(BrowserError::NoDocument)?;
        let mut nodes = HashMap::new();
        nodes.insert(dom.root(), web_sys::Node::from(mount.clone()));
        Ok(Self {
            document,
            mount,
            nodes,
            written: HashMap::new(),
        })
    }

    pub fn mount(&self) -> &web_sys::Element {
        &self.mount
    }

    pub fn node(&self, id: DomId) -> Option<&web_sys::Node> {
        self.nodes.get(&id)
    }

    /// The arena node mirrored by `node`, if any.
    pub fn id_of(&self, node: &web_sys::Node) -> Option<DomId> {
        self.nodes
            .iter()
            .find(|(_, mirrored)| mirrored.is_same_node(Some(node)))
            .map(|(&id, _)| id)
    }

    /// Write the arena out. Browser nodes the arena no longer has are
    /// removed.
    pub fn sync(&mut self, dom: &Dom) -> Result<(), BrowserError> {
        let mut seen = HashSet::new();
        self.sync_node(dom, dom.root(), &mut seen)?;
        let before = self.nodes.len();
        self.nodes.retain(|id, _| seen.contains(id));
        self.written.retain(|id, _| seen.contains(id));
        trace!(
            target: "weaver::render",
            mirrored = self.nodes.len(),
            dropped = before - self.nodes.len(),
            "synced browser dom"
        );
        Ok(())
    }

    fn sync_node(
        &mut self,
        dom: &Dom,
        id: DomId,
        seen: &mut HashSet<DomId>,
    ) -> Result<web_sys::Node, BrowserError> {
        seen.insert(id);
        let Some(kind) = dom.get(id).map(|node| &node.kind) else {
            return Err(BrowserError::Js("arena node vanished during sync".into()));
        };
        let native = self.native(id, kind)?;
        self.write(id, &native, kind)?;

        if let DomKind::Element { .. } = kind {
            let mut children = Vec::with_capacity(dom.children(id).len());
            for &child in dom.children(id) {
                children.push(self.sync_node(dom, child, seen)?);
            }
            let mut cursor = native.first_child();
            for child in &children {
                match &cursor {
                    Some(current) if current.is_same_node(Some(child)) => {
                        cursor = current.next_sibling();
                    }
                    _ => {
                        native.insert_before(child, cursor.as_ref())?;
                    }
                }
            }
            while let Some(extra) = cursor {
                cursor = extra.next_sibling();
                native.remove_child(&extra)?;
            }
        }
        Ok(native)
    }

    fn native(&mut self, id: DomId, kind: &DomKind) -> Result<web_sys::Node, BrowserError> {
        if let Some(node) = self.nodes.get(&id) {
            return Ok(node.clone());
        }
        let node: web_sys::Node = match kind {
            DomKind::Text { data } => self.document.create_text_node(data).into(),
            DomKind::Element { tag, .. } => self.document.create_element(tag)?.into(),
        };
        if let DomKind::Text { .. } = kind {
            self.written.insert(id, kind.clone());
        }
        self.nodes.insert(id, node.clone());
        Ok(node)
    }

    fn write(&mut self, id: DomId, node: &web_sys::Node, kind: &DomKind) -> Result<(), BrowserError> {
        let old = self.written.get(&id);
        if old == Some(kind) {
            return Ok(());
        }
        match kind {
            DomKind::Text { data } => node.set_text_content(Some(data)),
            DomKind::Element { attrs, classes, .. } => {
                let element = node
                    .dyn_ref::<web_sys::Element>()
                    .ok_or(BrowserError::NotAnElement)?;
                let (old_attrs, old_classes) = match old {
                    Some(DomKind::Element { attrs, classes, .. }) => (Some(attrs), classes.as_slice()),
                    _ => (None, &[][..]),
                };
                for (name, value) in attrs {
                    if old_attrs.and_then(|old| old.get(name)) != Some(value) {
                        element.set_attribute(name, value)?;
                    }
                }
                if let Some(old_attrs) = old_attrs {
                    for name in old_attrs.keys().filter(|name| !attrs.contains_key(*name)) {
                        element.remove_attribute(name)?;
                    }
                }
                let list = element.class_list();
                for class in old_classes.iter().filter(|class| !classes.contains(*class)) {
                    list.remove_1(class)?;
                }
                for class in classes.iter().filter(|class| !old_classes.contains(*class)) {
                    list.add_1(class)?;
                }
            }
        }
        self.written.insert(id, kind.clone());
        Ok(())
    }

    /// Copy text changes the browser made on its own into the arena: edited
    /// text nodes, text nodes it inserted and ones it removed. Returns how
    /// many arena nodes changed.
    pub fn pull_text(&mut self, dom: &mut Dom) -> usize {
        let mut elements = vec![dom.root()];
        let mut changed = 0;
        while let Some(parent) = elements.pop() {
            let Some(native_parent) = self.nodes.get(&parent).cloned() else {
                continue;
            };
            changed += self.pull_children(dom, parent, &native_parent);
            elements.extend(dom.children(parent).iter().copied().filter(|&c| dom.is_element(c)));
        }
        if changed > 0 {
            trace!(target: "weaver::render", changed, "pulled browser text edits");
        }
        changed
    }

    fn pull_children(&mut self, dom: &mut Dom, parent: DomId, native_parent: &web_sys::Node) -> usize {
        let mut changed = 0;

        // Text the browser removed.
        for child in dom.children(parent).to_vec() {
            if !dom.is_text(child) {
                continue;
            }
            let gone = self.nodes.get(&child).is_none_or(|node| {
                node.parent_node()
                    .is_none_or(|p| !p.is_same_node(Some(native_parent)))
            });
            if gone {
                dom.remove(child);
                self.nodes.remove(&child);
                self.written.remove(&child);
                changed += 1;
            }
        }

        // Edited and inserted text, walking backwards so every insertion
        // has its next sibling in place.
        let mut next: Option<DomId> = None;
        let mut cursor = native_parent.last_child();
        while let Some(node) = cursor {
            cursor = node.previous_sibling();
            let known = dom
                .children(parent)
                .iter()
                .copied()
                .find(|id| self.nodes.get(id).is_some_and(|n| n.is_same_node(Some(&node))));
            match known {
                Some(id) => {
                    if dom.is_text(id) {
                        let data = node.text_content().unwrap_or_default();
                        if dom.text(id) != Some(data.as_str()) {
                            dom.set_text(id, &data);
                            self.written.insert(id, DomKind::Text { data });
                            changed += 1;
                        }
                    }
                    next = Some(id);
                }
                None if node.node_type() == web_sys::Node::TEXT_NODE => {
                    let data = node.text_content().unwrap_or_default();
                    let id = dom.create_text(&data);
                    dom.insert_before(parent, id, next);
                    self.nodes.insert(id, node.clone());
                    self.written.insert(id, DomKind::Text { data });
                    next = Some(id);
                    changed += 1;
                }
                None => {}
            }
        }
        changed
    }
}
