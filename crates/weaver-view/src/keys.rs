//! Stable identity for document nodes across transactions.
//!
//! Every node is keyed by its current position. Keys move with their node
//! as transactions are applied, so a renderer can reuse the DOM it built
//! for a node even after edits shift its position.

use std::collections::{BTreeMap, HashMap};

use smol_str::{SmolStr, format_smolstr};
use tracing::trace;

use crate::model::{Node, Transaction};

/// A fresh random 48-bit key, in hex.
pub fn create_node_key() -> SmolStr {
    format_smolstr!("{:x}", fastrand::u64(..0xffff_ffff_ffff))
}

/// Two-way map between node positions and node keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeKeys {
    pos_to_key: BTreeMap<usize, SmolStr>,
    key_to_pos: HashMap<SmolStr, usize>,
}

impl NodeKeys {
    /// Key every node in `doc`.
    pub fn new(doc: &Node) -> Self {
        let mut keys = NodeKeys::default();
        keys.fill(doc);
        keys
    }

    pub fn key_at(&self, pos: usize) -> Option<&SmolStr> {
        self.pos_to_key.get(&pos)
    }

    pub fn pos_of(&self, key: &str) -> Option<usize> {
        self.key_to_pos.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.pos_to_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos_to_key.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &SmolStr)> {
        self.pos_to_key.iter().map(|(&pos, key)| (pos, key))
    }

    fn insert(&mut self, pos: usize, key: SmolStr) {
        self.key_to_pos.insert(key.clone(), pos);
        self.pos_to_key.insert(pos, key);
    }

    fn fill(&mut self, doc: &Node) {
        doc.descendants(&mut |_, pos| {
            if !self.pos_to_key.contains_key(&pos) {
                self.insert(pos, create_node_key());
            }
            true
        });
    }

    /// Carry keys through `tr`, whose resulting document is `doc`.
    ///
    /// Explicit position overrides on the transaction win over mapping and
    /// carry the moved node's descendants along. Other keys follow the
    /// transaction's mapping, and keys of deleted nodes are dropped. Keys
    /// are frozen while a composition is in progress.
    pub fn apply(&self, tr: &Transaction, doc: &Node) -> NodeKeys {
        if !tr.doc_changed() || tr.meta.composing {
            return self.clone();
        }
        let moved = self.moved_ranges(tr);
        let mut next = NodeKeys::default();
        for (&pos, key) in &self.pos_to_key {
            let new_pos = match moved
                .iter()
                .find(|(old, size, _)| *old <= pos && pos < old + size)
            {
                Some(&(old, _, new)) => pos - old + new,
                None => {
                    let result = tr.mapping().map_result(pos, 1);
                    if result.deleted {
                        continue;
                    }
                    result.pos
                }
            };
            next.insert(new_pos, key.clone());
        }
        let before = next.len();
        next.fill(doc);
        trace!(
            target: "weaver::keys",
            carried = before,
            created = next.len() - before,
            "mapped node keys"
        );
        next
    }

    /// `(old position, node size, new position)` for every overridden node.
    fn moved_ranges(&self, tr: &Transaction) -> Vec<(usize, usize, usize)> {
        let Some(overrides) = &tr.meta.key_overrides else {
            return Vec::new();
        };
        overrides
            .iter()
            .filter_map(|(&old, &new)| {
                let size = tr.before().node_at(old)?.node_size();
                Some((old, size, new))
            })
            .collect()
    }
}
