//! The document engine interface the view layer is built against.
//!
//! A small immutable document model: typed nodes with UTF-16 position
//! semantics, marks, selections and transactions with position mapping.

mod node;
mod output;
mod selection;
mod transaction;

use std::collections::BTreeMap;

use smol_str::SmolStr;

pub use node::{
    Mark, MarkType, Node, NodeType, NodeTypeBuilder, ResolvedPos, utf16_len, utf16_slice,
};
pub use output::OutputSpec;
pub use selection::{Selection, is_selectable, selection_context_changed};
pub use transaction::{
    EditorState, MapResult, Mapping, StepMap, Transaction, TransactionMeta,
};

/// Node, mark and decoration attributes.
pub type Attrs = BTreeMap<SmolStr, SmolStr>;
