//! The editor view: owns the DOM arena and descriptor tree, and the two
//! state snapshots that keep document-level checks behind the renderer's
//! DOM commits.

use std::rc::Rc;

use tracing::{debug, trace, warn};
use web_time::Instant;

use crate::config::{Clock, SystemClock, ViewConfig};
use crate::decoration::{Decoration, DecorationCache, DecorationSet, DecorationSource, WidgetSpec};
use crate::dom::{Dom, DomId, DomPoint};
use crate::input::{InputState, SelectionOrigin};
use crate::model::{EditorState, Selection, Transaction, selection_context_changed};
use crate::props::{
    DirectEditorProps, DomEvent, EditorProps, MarkViews, NodeViews, Plugin, build_mark_views,
    build_node_views, changed_mark_views, changed_node_views, some_prop,
};
use crate::selection::{DomSelectionRange, NativeSelection};
use crate::viewdesc::{DescId, DescTree};

/// An editor mounted on the root element of a [`Dom`].
///
/// `update` records the requested state as pending. The renderer then
/// commits DOM for it and calls [`EditorView::commit_pending_effects`],
/// which validates the descriptor tree and selection against the pending
/// state and makes it the committed one.
pub struct EditorView {
    pub(crate) dom: Dom,
    pub(crate) descs: DescTree,
    pub(crate) input: InputState,
    pub(crate) native: Box<dyn NativeSelection>,
    pub(crate) config: ViewConfig,
    pub(crate) clock: Rc<dyn Clock>,
    props: DirectEditorProps,
    committed: Option<EditorState>,
    pub(crate) node_views: NodeViews,
    pub(crate) mark_views: MarkViews,
    deco_cache: DecorationCache,
    cursor_wrapper: Option<DecorationSet>,
    pub(crate) last_selected_desc: Option<DescId>,
    editable: bool,
    /// Native selection changes before this instant echo our own write.
    pub(crate) suppress_until: Option<Instant>,
    /// The native selection as of the last read or write.
    pub(crate) last_snapshot: DomSelectionRange,
    /// Decorations the committed state was validated with.
    committed_deco: Option<DecorationSource>,
    /// A selection write was skipped while composing.
    selection_deferred: bool,
}

impl EditorView {
    pub fn new(dom: Dom, props: DirectEditorProps, native: Box<dyn NativeSelection>) -> Self {
        let node_views = build_node_views(&props.props, &props.state);
        let mark_views = build_mark_views(&props.props, &props.state);
        let mut view = Self {
            dom,
            descs: DescTree::new(),
            input: InputState::default(),
            native,
            config: ViewConfig::default(),
            clock: Rc::new(SystemClock),
            props,
            committed: None,
            node_views,
            mark_views,
            deco_cache: DecorationCache::new(),
            cursor_wrapper: None,
            last_selected_desc: None,
            editable: true,
            suppress_until: None,
            last_snapshot: DomSelectionRange::default(),
            committed_deco: None,
            selection_deferred: false,
        };
        view.editable = view.compute_editable();
        view
    }

    pub fn with_config(mut self, config: ViewConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The state most recently requested. Renders show this state.
    pub fn state(&self) -> &EditorState {
        &self.props.state
    }

    /// The state the DOM and selection were last validated against.
    pub fn committed_state(&self) -> Option<&EditorState> {
        self.committed.as_ref()
    }

    pub fn props(&self) -> &EditorProps {
        &self.props.props
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    /// The DOM arena, for hosts mirroring changes made outside the
    /// renderer.
    pub fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    pub fn descs(&self) -> &DescTree {
        &self.descs
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn node_views(&self) -> &NodeViews {
        &self.node_views
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn has_focus(&self) -> bool {
        self.native.has_focus()
    }

    pub(crate) fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Replace props and state. Takes effect in the DOM at the next commit.
    pub fn update(&mut self, props: DirectEditorProps) {
        let plugins_changed = !same_plugins(&self.props.props.plugins, &props.props.plugins)
            || !Rc::ptr_eq(self.props.state.plugins(), props.state.plugins());
        let views_changed = plugins_changed
            || self.props.props.node_views.is_some() != props.props.node_views.is_some()
            || self.props.props.mark_views.is_some() != props.props.mark_views.is_some();
        self.props = props;
        if views_changed || self.props.props.node_views.is_some() {
            let node_views = build_node_views(&self.props.props, &self.props.state);
            if changed_node_views(&self.node_views, &node_views) {
                debug!(target: "weaver::view", count = node_views.len(), "node views changed");
                self.node_views = node_views;
            }
        }
        if views_changed || self.props.props.mark_views.is_some() {
            let mark_views = build_mark_views(&self.props.props, &self.props.state);
            if changed_mark_views(&self.mark_views, &mark_views) {
                self.mark_views = mark_views;
            }
        }
        self.editable = self.compute_editable();
    }

    pub fn set_props(&mut self, props: EditorProps) {
        let state = self.props.state.clone();
        self.update(DirectEditorProps { state, props });
    }

    pub fn update_state(&mut self, state: EditorState) {
        let props = self.props.props.clone();
        self.update(DirectEditorProps { state, props });
    }

    /// First value `f` produces across the prop sources.
    pub fn some_prop<T>(&self, f: impl FnMut(&EditorProps) -> Option<T>) -> Option<T> {
        some_prop(&self.props.props, &self.props.state, f)
    }

    fn compute_editable(&self) -> bool {
        let state = &self.props.state;
        self.some_prop(|p| p.editable.as_ref().map(|f| f(state)))
            .unwrap_or(true)
    }

    /// Hand a transaction to the dispatch prop, or apply it directly.
    pub fn dispatch(&mut self, mut tr: Transaction) {
        if self.input.composing {
            tr.meta.composing = true;
            if tr.meta.composition.is_none() {
                tr.meta.composition = Some(self.input.composition_id);
            }
            if tr.doc_changed() {
                self.input.composition_pending_changes += 1;
            }
        }
        let dispatch = self.some_prop(|p| p.dispatch_transaction.clone());
        match dispatch {
            Some(dispatch) => dispatch(tr),
            None => {
                let state = self.props.state.apply(tr);
                self.update_state(state);
            }
        }
    }

    /// Merged decorations from every prop source, plus the cursor wrapper.
    /// Recomputed only when one of the input sets changes.
    pub fn decorations(&mut self) -> DecorationSource {
        let state = &self.props.state;
        let mut sets: Vec<DecorationSet> = crate::props::prop_sources(&self.props.props, state)
            .filter_map(|p| p.decorations.as_ref())
            .map(|f| f(state))
            .filter(|set| !set.is_empty())
            .collect();
        if let Some(wrapper) = &self.cursor_wrapper {
            sets.push(wrapper.clone());
        }
        self.deco_cache.get(sets)
    }

    /// Place a zero-width caret anchor at `pos`, or remove it.
    pub fn set_cursor_wrapper(&mut self, pos: Option<usize>) {
        self.cursor_wrapper = pos.map(|pos| {
            let mut spec = WidgetSpec::new("img").with_key("cursor-wrapper").ignore_selection();
            spec.attrs.insert("class".into(), "ProseMirror-separator".into());
            spec.attrs.insert("mark-placeholder".into(), "true".into());
            spec.attrs.insert("alt".into(), "".into());
            DecorationSet::create(vec![Decoration::widget(pos, spec)])
        });
    }

    /// Validate the descriptor tree and selection against the pending
    /// state, then make it the committed state. Runs after the renderer
    /// committed its DOM and every region's layout effect has fired.
    ///
    /// The previously committed state decides how much is checked. When
    /// neither the document, the decorations nor the selection changed,
    /// the selection is left alone.
    pub fn commit_pending_effects(&mut self) {
        let prev = self.committed.take();
        let state = self.props.state.clone();
        let selection = state.selection();

        let deco = self.decorations();
        let redraw = prev.as_ref().is_none_or(|prev| !prev.doc().ptr_eq(state.doc()))
            || self.committed_deco.as_ref() != Some(&deco);
        if redraw && !self.descs.matches_doc(state.doc(), &deco) {
            warn!(target: "weaver::view", "descriptor tree does not match the pending document");
        }

        let root = self.dom.root();
        self.dom
            .set_attr(root, "contenteditable", if self.editable { "true" } else { "false" });
        self.dom.add_class(root, "ProseMirror");

        let selection_changed = prev.as_ref().is_none_or(|prev| prev.selection() != selection);
        if redraw || selection_changed || self.selection_deferred {
            // A redraw can leave the native selection on equivalent but
            // stale nodes; rewrite it when the selection moved to another
            // parent.
            let force = redraw
                && !self.input.composing
                && prev.as_ref().is_some_and(|prev| {
                    !prev.selection().is_empty()
                        && !selection.is_empty()
                        && selection_context_changed(prev.doc(), &prev.selection(), state.doc(), &selection)
                });
            trace!(target: "weaver::view", redraw, selection_changed, force, "validating selection");
            self.sync_node_selection(&selection);
            if self.input.composing {
                trace!(target: "weaver::view", "composing, leaving native selection alone");
                self.selection_deferred = true;
            } else {
                self.selection_deferred = false;
                self.selection_to_dom(&selection, force);
            }
        } else {
            trace!(target: "weaver::view", "committed state unchanged");
        }
        self.committed = Some(state);
        self.committed_deco = Some(deco);
    }

    /// Drop the committed snapshot once its DOM is gone, so the next
    /// commit validates from scratch.
    pub(crate) fn forget_committed(&mut self) {
        self.committed = None;
        self.committed_deco = None;
        self.last_selected_desc = None;
    }

    /// Apply node selection styling to the selected node's descriptor and
    /// clear it from the previously selected one.
    pub(crate) fn sync_node_selection(&mut self, selection: &Selection) {
        let selected = match *selection {
            Selection::Node { from, .. } => self
                .descs
                .desc_at(from)
                .filter(|&id| self.descs.get(id).is_some_and(|d| d.node_desc().is_some())),
            Selection::Text { .. } => None,
        };
        if selected == self.last_selected_desc {
            return;
        }
        if let Some(prev) = self.last_selected_desc.take() {
            if self.descs.contains(prev) {
                self.descs.deselect_node(&mut self.dom, prev);
            }
        }
        if let Some(id) = selected {
            self.descs.select_node(&mut self.dom, id);
            self.last_selected_desc = Some(id);
        }
    }

    pub fn nearest_desc(&self, node: DomId) -> Option<DescId> {
        self.descs.nearest_desc(&self.dom, node, false)
    }

    pub fn pos_from_dom(&self, node: DomId, offset: usize, bias: i32) -> Option<usize> {
        self.descs.pos_from_dom(&self.dom, node, offset, bias)
    }

    pub fn dom_from_pos(&self, pos: usize, side: i32) -> Option<DomPoint> {
        self.descs.dom_from_pos(&self.dom, pos, side)
    }

    pub fn desc_size(&self, id: DescId) -> usize {
        self.descs.size(id)
    }

    /// Whether the editor should handle `event`, rather than a node view
    /// that claimed it.
    pub fn event_belongs_to_view(&self, event: &DomEvent) -> bool {
        let root = self.dom.root();
        let mut cur = Some(event.target);
        while let Some(node) = cur {
            if node == root {
                break;
            }
            if let Some(desc) = self.dom.desc(node).and_then(|id| self.descs.get(id)) {
                if desc.stop_event(event) {
                    trace!(target: "weaver::view", kind = %event.kind, "event stopped by node view");
                    return false;
                }
            }
            cur = self.dom.parent(node);
        }
        true
    }

    pub fn record_focus(&mut self) {
        self.input.last_focus = Some(self.now());
    }

    pub fn record_pointer_down(&mut self) {
        let now = self.now();
        self.input.last_click = Some(now);
        self.input.set_selection_origin(SelectionOrigin::Pointer, now);
    }

    pub fn record_touch(&mut self) {
        let now = self.now();
        self.input.last_touch = Some(now);
        self.input.set_selection_origin(SelectionOrigin::Pointer, now);
    }

    pub fn record_key_down(&mut self) {
        let now = self.now();
        self.input.last_key = Some(now);
        self.input.set_selection_origin(SelectionOrigin::Key, now);
    }

    pub fn composition_start(&mut self) {
        self.input.start_composition();
        debug!(target: "weaver::view", id = self.input.composition_id, "composition started");
    }

    /// End the composition. The next render releases frozen text and
    /// replaces composition descriptors.
    pub fn composition_end(&mut self) {
        self.input.end_composition();
        debug!(target: "weaver::view", id = self.input.composition_id, "composition ended");
    }
}

fn same_plugins(a: &[Plugin], b: &[Plugin]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(a, b)| a.key() == b.key() && std::ptr::eq(a.props(), b.props()))
}
