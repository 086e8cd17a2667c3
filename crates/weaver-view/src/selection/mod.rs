//! Selection bridge between the native selection and the document
//! selection.
//!
//! Reads resolve native (node, offset) pairs through the descriptor tree.
//! Writes go the other way and open a short window in which native
//! selection changes are taken to be echoes of the write.

mod from_dom;
mod native;
mod observer;
mod to_dom;

pub use from_dom::selection_from_dom;
pub use native::{DomSelectionRange, NativeSelection, SimulatedSelection};
pub use to_dom::{is_equivalent_position, selection_points};
