//! weaver-view: the view layer of a structured rich-text editor.
//!
//! This crate provides:
//! - `model` - the document engine the view is built against
//! - `decoration` - decoration sets and their per-node normalisation
//! - `viewdesc` - the descriptor tree mirroring the rendered DOM
//! - `sync` - descriptor synchronisation run from layout effects
//! - `selection` - translation between native and document selections
//! - `view` - the `EditorView` coordinator
//! - `render` - a keyed renderer driving all of the above
//!
//! The DOM is an arena (`dom::Dom`) so the whole engine runs natively.
//! `weaver-view-browser` mirrors it onto a live page.

pub mod commands;
pub mod config;
pub mod decoration;
pub mod dom;
pub mod error;
pub mod input;
pub mod keys;
pub mod model;
pub mod props;
pub mod render;
pub mod selection;
pub mod sync;
pub mod view;
pub mod viewdesc;

pub use smol_str::SmolStr;

pub use config::{Clock, ManualClock, SystemClock, ViewConfig};
pub use decoration::{Decoration, DecorationSet, DecorationSource, WidgetSpec};
pub use dom::{Dom, DomId, DomPoint};
pub use error::{Result, ViewError};
pub use keys::NodeKeys;
pub use model::{EditorState, Mark, MarkType, Node, NodeType, OutputSpec, Selection, Transaction};
pub use props::{
    Capabilities, DirectEditorProps, DomEvent, EditorProps, NodeViewProps, NodeViewSpec, Plugin,
    ViewMutation,
};
pub use render::{DocRenderer, EffectOrder};
pub use selection::{DomSelectionRange, NativeSelection, SimulatedSelection};
pub use view::EditorView;
pub use viewdesc::{DescId, DescTree, ViewDesc};
