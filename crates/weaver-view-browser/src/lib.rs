//! Browser DOM layer for weaver-view.
//!
//! The view renders into an arena; this crate keeps a real DOM subtree in
//! step with it and feeds native selection, focus, pointer, key and
//! composition events back into the view. It assumes a
//! `wasm32-unknown-unknown` target environment.
//!
//! # Architecture
//!
//! - `mirror`: arena to `web_sys` node mirroring, plus reading back text an
//!   input method wrote on its own
//! - `selection`: [`NativeSelection`](weaver_view::selection::NativeSelection)
//!   over `window.getSelection()`
//! - `events`: the mounted view and its native event listeners

pub use weaver_view;
pub use weaver_view::*;

pub mod events;
pub mod mirror;
pub mod selection;

pub use events::{BrowserView, Listeners, attach};
pub use mirror::DomMirror;
pub use selection::BrowserSelection;

use wasm_bindgen::{JsCast, JsValue};

/// Failures from the browser layer.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error(transparent)]
    View(#[from] ViewError),

    #[error("mount element is not attached to a document")]
    NoDocument,

    #[error("no window")]
    NoWindow,

    #[error("mirrored node is not an element")]
    NotAnElement,

    #[error("dom call failed: {0}")]
    Js(String),
}

impl From<JsValue> for BrowserError {
    fn from(value: JsValue) -> Self {
        let message = value
            .dyn_ref::<js_sys::Error>()
            .map(|err| String::from(err.message()))
            .unwrap_or_else(|| format!("{value:?}"));
        BrowserError::Js(message)
    }
}
