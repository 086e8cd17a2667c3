use miette::Diagnostic;
use thiserror::Error;

/// Failures raised by the view layer.
///
/// Only integration mistakes surface here. Descriptor mismatches are
/// repaired in place and unresolvable native selections are ignored.
#[derive(Debug, Error, Diagnostic)]
pub enum ViewError {
    #[error("node type `{node_type}` has no node view and no output template")]
    #[diagnostic(
        code(weaver_view::missing_renderer),
        help("register a node view for this type or give the type an output template")
    )]
    MissingRenderer { node_type: String },

    #[error("mark type `{mark_type}` has no mark view and no output template")]
    #[diagnostic(code(weaver_view::missing_mark_renderer))]
    MissingMarkRenderer { mark_type: String },

    #[error("started a composition but couldn't find the text node it belongs to")]
    #[diagnostic(code(weaver_view::composition_text_not_found))]
    CompositionTextNotFound,

    #[error("position {pos} is outside the document (size {size})")]
    #[diagnostic(code(weaver_view::position_outside_document))]
    PositionOutsideDocument { pos: usize, size: usize },

    #[error("no view descriptor for this region")]
    #[diagnostic(code(weaver_view::unknown_descriptor))]
    UnknownDescriptor,
}

pub type Result<T, E = ViewError> = std::result::Result<T, E>;
