//! The mounted view and the native listeners that drive it.

use std::cell::RefCell;
use std::rc::Rc;

use gloo_events::EventListener;
use tracing::{debug, error, trace};
use wasm_bindgen::JsCast;
use weaver_view::{
    DirectEditorProps, Dom, DomEvent, DocRenderer, EditorState, EditorView, NativeSelection,
};

use crate::BrowserError;
use crate::mirror::DomMirror;
use crate::selection::BrowserSelection;

/// An [`EditorView`] rendered into a browser element.
pub struct BrowserView {
    view: EditorView,
    renderer: DocRenderer,
    mirror: Rc<RefCell<DomMirror>>,
    selection: BrowserSelection,
    destroyed: bool,
}

impl BrowserView {
    pub fn new(mount: web_sys::Element, props: DirectEditorProps) -> Result<Self, BrowserError> {
        let dom = Dom::new(&mount.tag_name().to_ascii_lowercase());
        let mirror = Rc::new(RefCell::new(DomMirror::new(mount, &dom)?));
        let selection = BrowserSelection::new(mirror.clone());
        let view = EditorView::new(dom, props, Box::new(selection.clone()));
        Ok(Self {
            view,
            renderer: DocRenderer::new(),
            mirror,
            selection,
            destroyed: false,
        })
    }

    pub fn view(&self) -> &EditorView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut EditorView {
        &mut self.view
    }

    pub fn renderer_mut(&mut self) -> &mut DocRenderer {
        &mut self.renderer
    }

    pub fn mirror(&self) -> std::cell::Ref<'_, DomMirror> {
        self.mirror.borrow()
    }

    /// Render the pending state and write it to the browser.
    pub fn render(&mut self) -> Result<(), BrowserError> {
        if self.view.input().composing {
            self.mirror.borrow_mut().pull_text(self.view.dom_mut());
        }
        self.renderer.render(&mut self.view)?;
        self.mirror.borrow_mut().sync(self.view.dom())?;
        self.selection.apply_pending();
        Ok(())
    }

    pub fn update_state(&mut self, state: EditorState) -> Result<(), BrowserError> {
        self.view.update_state(state);
        self.render()
    }

    /// Tear down the rendered tree and empty the mount.
    pub fn destroy(&mut self) -> Result<(), BrowserError> {
        self.destroyed = true;
        self.renderer.unmount(&mut self.view);
        self.mirror.borrow_mut().sync(self.view.dom())
    }

    fn needs_render(&self) -> bool {
        if self.destroyed {
            return false;
        }
        let state = self.view.state();
        self.view.committed_state().is_none_or(|committed| {
            committed.selection() != state.selection() || !committed.doc().ptr_eq(state.doc())
        })
    }

    /// Render if the last event changed the state, and flush held
    /// selection writes either way.
    fn settle(&mut self) {
        if self.needs_render() {
            if let Err(err) = self.render() {
                error!(target: "weaver::view", %err, "render after native event failed");
            }
        }
        self.selection.apply_pending();
    }

    fn dom_event(&self, event: &web_sys::Event) -> Option<DomEvent> {
        let target = event.target()?.dyn_into::<web_sys::Node>().ok()?;
        let target = self.mirror.borrow().id_of(&target)?;
        Some(DomEvent {
            kind: event.type_().into(),
            target,
        })
    }

    /// Whether the view should react to `event` rather than a node view
    /// that claimed it. Events on unmirrored nodes belong to the view.
    fn owns(&self, event: &web_sys::Event) -> bool {
        self.dom_event(event)
            .is_none_or(|event| self.view.event_belongs_to_view(&event))
    }

    pub fn has_focus(&self) -> bool {
        self.selection.has_focus()
    }
}

/// Native listeners for a [`BrowserView`]. Dropping this detaches them.
pub struct Listeners {
    _listeners: Vec<EventListener>,
}

fn listen(
    target: &web_sys::EventTarget,
    kind: &'static str,
    view: &Rc<RefCell<BrowserView>>,
    handler: fn(&mut BrowserView, &web_sys::Event),
) -> EventListener {
    let view = Rc::downgrade(view);
    EventListener::new(target, kind, move |event| {
        let Some(view) = view.upgrade() else {
            return;
        };
        // Re-entrant events fire while a handler is running; drop them.
        let Ok(mut view) = view.try_borrow_mut() else {
            trace!(target: "weaver::view", kind, "view busy, event dropped");
            return;
        };
        handler(&mut view, event);
    })
}

/// Attach selection, focus, pointer, key and composition listeners.
pub fn attach(view: &Rc<RefCell<BrowserView>>) -> Listeners {
    let mount: web_sys::EventTarget = view.borrow().mirror().mount().clone().into();
    let document: web_sys::EventTarget = gloo_utils::document().into();

    let listeners = vec![
        listen(&document, "selectionchange", view, |view, _| {
            view.view.on_selection_change();
            view.settle();
        }),
        listen(&mount, "focus", view, |view, _| {
            view.view.record_focus();
        }),
        listen(&mount, "mousedown", view, |view, event| {
            if view.owns(event) {
                view.view.record_pointer_down();
            }
        }),
        listen(&mount, "touchstart", view, |view, event| {
            if view.owns(event) {
                view.view.record_touch();
            }
        }),
        listen(&mount, "keydown", view, |view, event| {
            if view.owns(event) {
                view.view.record_key_down();
            }
        }),
        listen(&mount, "compositionstart", view, |view, _| {
            view.view.composition_start();
        }),
        listen(&mount, "compositionend", view, |view, _| {
            view.view.composition_end();
            if let Err(err) = view.render() {
                error!(target: "weaver::view", %err, "render after composition failed");
            }
        }),
    ];
    debug!(target: "weaver::view", count = listeners.len(), "attached native listeners");
    Listeners {
        _listeners: listeners,
    }
}
