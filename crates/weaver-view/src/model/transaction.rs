//! Transactions, position mapping and editor state.

use std::collections::BTreeMap;
use std::rc::Rc;

use super::{Node, Selection};
use crate::error::Result;
use crate::keys::NodeKeys;
use crate::props::Plugin;

/// One replaced range: `old_size` positions at `start` became `new_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepMap {
    pub start: usize,
    pub old_size: usize,
    pub new_size: usize,
}

/// Result of mapping a single position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    /// The token on the side given by `assoc` was removed.
    pub deleted: bool,
}

impl StepMap {
    fn map_result(&self, pos: usize, assoc: i32) -> MapResult {
        let end = self.start + self.old_size;
        if pos < self.start {
            return MapResult {
                pos,
                deleted: false,
            };
        }
        if pos > end {
            return MapResult {
                pos: pos - self.old_size + self.new_size,
                deleted: false,
            };
        }
        if self.old_size == 0 {
            let pos = if assoc < 0 {
                self.start
            } else {
                self.start + self.new_size
            };
            return MapResult {
                pos,
                deleted: false,
            };
        }
        let side = if pos == self.start {
            -1
        } else if pos == end {
            1
        } else {
            assoc
        };
        MapResult {
            pos: if side < 0 {
                self.start
            } else {
                self.start + self.new_size
            },
            deleted: if assoc < 0 { pos != self.start } else { pos != end },
        }
    }
}

/// A sequence of step maps, applied in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn map(&self, pos: usize, assoc: i32) -> usize {
        self.map_result(pos, assoc).pos
    }

    pub fn map_result(&self, pos: usize, assoc: i32) -> MapResult {
        let mut result = MapResult {
            pos,
            deleted: false,
        };
        for map in &self.maps {
            let step = map.map_result(result.pos, assoc);
            result = MapResult {
                pos: step.pos,
                deleted: result.deleted || step.deleted,
            };
        }
        result
    }
}

/// Metadata attached to a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionMeta {
    /// The selection change came from a pointer interaction.
    pub pointer: bool,
    pub scroll_into_view: bool,
    /// Composition session this change belongs to.
    pub composition: Option<u32>,
    /// An IME composition was active when the transaction was dispatched.
    pub composing: bool,
    /// Explicit old → new node positions, overriding mapping for node keys.
    pub key_overrides: Option<BTreeMap<usize, usize>>,
}

/// A pending state change.
#[derive(Clone, Debug)]
pub struct Transaction {
    before: Node,
    doc: Node,
    start_selection: Selection,
    selection: Option<Selection>,
    mapping: Mapping,
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(state: &EditorState) -> Self {
        Self {
            before: state.doc.clone(),
            doc: state.doc.clone(),
            start_selection: state.selection,
            selection: None,
            mapping: Mapping::default(),
            meta: TransactionMeta::default(),
        }
    }

    pub fn before(&self) -> &Node {
        &self.before
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn doc_changed(&self) -> bool {
        !self.mapping.is_empty()
    }

    pub fn selection_set(&self) -> bool {
        self.selection.is_some()
    }

    /// The selection after this transaction, mapping the starting
    /// selection when none was set explicitly.
    pub fn selection(&self) -> Selection {
        match self.selection {
            Some(selection) => selection,
            None if self.doc_changed() => self.start_selection.map(&self.doc, &self.mapping),
            None => self.start_selection,
        }
    }

    pub fn set_selection(&mut self, selection: Selection) -> &mut Self {
        self.selection = Some(selection);
        self
    }

    /// Replace the children between `from` and `to` with `nodes`.
    pub fn replace_with(&mut self, from: usize, to: usize, nodes: Vec<Node>) -> Result<&mut Self> {
        let new_size = nodes.iter().map(Node::node_size).sum();
        self.doc = self.doc.replace_children(from, to, nodes)?;
        self.mapping.push(StepMap {
            start: from,
            old_size: to - from,
            new_size,
        });
        Ok(self)
    }
}

/// The document engine's state: document, selection and plugins.
#[derive(Clone)]
pub struct EditorState {
    doc: Node,
    selection: Selection,
    plugins: Rc<[Plugin]>,
    keys: Option<NodeKeys>,
}

impl EditorState {
    pub fn new(doc: Node) -> Self {
        let selection = Selection::near(&doc, 0, 1);
        Self {
            doc,
            selection,
            plugins: Rc::from(Vec::new()),
            keys: None,
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_plugins(mut self, plugins: Vec<Plugin>) -> Self {
        self.plugins = Rc::from(plugins);
        self
    }

    /// Track a stable key for every node.
    pub fn with_node_keys(mut self) -> Self {
        self.keys = Some(NodeKeys::new(&self.doc));
        self
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn plugins(&self) -> &Rc<[Plugin]> {
        &self.plugins
    }

    pub fn node_keys(&self) -> Option<&NodeKeys> {
        self.keys.as_ref()
    }

    pub fn tr(&self) -> Transaction {
        Transaction::new(self)
    }

    /// Produce the state that results from applying `tr`.
    pub fn apply(&self, tr: Transaction) -> EditorState {
        let selection = tr.selection();
        let keys = self
            .keys
            .as_ref()
            .map(|keys| keys.apply(&tr, tr.doc()));
        EditorState {
            doc: tr.doc,
            selection,
            plugins: self.plugins.clone(),
            keys,
        }
    }
}
