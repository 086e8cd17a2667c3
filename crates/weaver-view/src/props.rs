//! Editor props and the ordered lookup chain over their sources.
//!
//! A prop is looked up in the view's direct props first, then in the props
//! of each plugin passed with them, then in the props of each plugin
//! attached to the editor state. The first source that yields a value
//! wins.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use smol_str::SmolStr;

use crate::decoration::{Decoration, DecorationSet, DecorationSource};
use crate::dom::{Dom, DomId};
use crate::model::{EditorState, Mark, Node, OutputSpec, Selection, Transaction};
use crate::viewdesc::GetPos;

pub type DecorationsFn = Rc<dyn Fn(&EditorState) -> DecorationSet>;
pub type EditableFn = Rc<dyn Fn(&EditorState) -> bool>;
pub type CreateSelectionFn = Rc<dyn Fn(&EditorState, usize, usize) -> Option<Selection>>;
pub type DispatchFn = Rc<dyn Fn(Transaction)>;

/// Builds the rendered form of a node, plus any hooks the node view wants
/// to expose.
pub type NodeViewConstructor = Rc<dyn Fn(&NodeViewProps) -> NodeViewSpec>;

/// Builds the rendered form of a mark. The flag is true for marks wrapping
/// inline content.
pub type MarkViewConstructor = Rc<dyn Fn(&Mark, bool) -> Option<OutputSpec>>;

pub type NodeViews = BTreeMap<SmolStr, NodeViewConstructor>;
pub type MarkViews = BTreeMap<SmolStr, MarkViewConstructor>;

/// A native event offered to a node view before the editor handles it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomEvent {
    pub kind: SmolStr,
    pub target: DomId,
}

/// A DOM change or selection change inside a node view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewMutation {
    Selection,
    ChildList { target: DomId },
    CharacterData { target: DomId },
    Attributes { target: DomId, name: SmolStr },
}

pub type SelectHook = Rc<dyn Fn(&mut Dom, DomId)>;
pub type StopEventHook = Rc<dyn Fn(&DomEvent) -> bool>;
pub type IgnoreMutationHook = Rc<dyn Fn(&ViewMutation) -> bool>;
pub type DestroyHook = Rc<dyn Fn()>;

/// Hooks a node view may register. Unset hooks fall back to the default
/// behaviour of the descriptor.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub select_node: Option<SelectHook>,
    pub deselect_node: Option<SelectHook>,
    pub stop_event: Option<StopEventHook>,
    pub ignore_mutation: Option<IgnoreMutationHook>,
    pub destroy: Option<DestroyHook>,
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("select_node", &self.select_node.is_some())
            .field("deselect_node", &self.deselect_node.is_some())
            .field("stop_event", &self.stop_event.is_some())
            .field("ignore_mutation", &self.ignore_mutation.is_some())
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}

/// Capabilities shared between a node view instance and its descriptor,
/// so the instance can register hooks after the descriptor exists.
pub type SharedCapabilities = Rc<RefCell<Capabilities>>;

/// What a node view receives when it renders.
#[derive(Clone)]
pub struct NodeViewProps {
    pub node: Node,
    pub get_pos: GetPos,
    pub outer_deco: Vec<Decoration>,
    pub inner_deco: DecorationSource,
}

/// What a node view renders: an output template, whose hole (if any)
/// becomes the content DOM, and its hooks.
pub struct NodeViewSpec {
    pub output: OutputSpec,
    pub capabilities: Capabilities,
}

impl NodeViewSpec {
    pub fn new(output: OutputSpec) -> Self {
        Self {
            output,
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// Props a view, or a plugin, can provide.
#[derive(Clone, Default)]
pub struct EditorProps {
    pub decorations: Option<DecorationsFn>,
    pub editable: Option<EditableFn>,
    pub node_views: Option<NodeViews>,
    pub mark_views: Option<MarkViews>,
    pub create_selection_between: Option<CreateSelectionFn>,
    pub dispatch_transaction: Option<DispatchFn>,
    /// Plugins supplied with the view rather than the state. Ignored on
    /// plugin props.
    pub plugins: Vec<Plugin>,
}

impl fmt::Debug for EditorProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorProps")
            .field("decorations", &self.decorations.is_some())
            .field("editable", &self.editable.is_some())
            .field(
                "node_views",
                &self.node_views.as_ref().map(|v| v.keys().collect::<Vec<_>>()),
            )
            .field(
                "mark_views",
                &self.mark_views.as_ref().map(|v| v.keys().collect::<Vec<_>>()),
            )
            .field("create_selection_between", &self.create_selection_between.is_some())
            .field("dispatch_transaction", &self.dispatch_transaction.is_some())
            .field("plugins", &self.plugins)
            .finish()
    }
}

/// A named bundle of props.
#[derive(Clone, Debug)]
pub struct Plugin {
    key: SmolStr,
    props: Rc<EditorProps>,
}

impl Plugin {
    pub fn new(key: impl Into<SmolStr>, props: EditorProps) -> Self {
        Self {
            key: key.into(),
            props: Rc::new(props),
        }
    }

    pub fn key(&self) -> &SmolStr {
        &self.key
    }

    pub fn props(&self) -> &EditorProps {
        &self.props
    }
}

/// Everything a view is configured with: its props and the state to show.
#[derive(Clone)]
pub struct DirectEditorProps {
    pub state: EditorState,
    pub props: EditorProps,
}

impl DirectEditorProps {
    pub fn new(state: EditorState) -> Self {
        Self {
            state,
            props: EditorProps::default(),
        }
    }

    pub fn with_props(mut self, props: EditorProps) -> Self {
        self.props = props;
        self
    }
}

/// Prop sources in lookup order.
pub fn prop_sources<'a>(
    props: &'a EditorProps,
    state: &'a EditorState,
) -> impl Iterator<Item = &'a EditorProps> {
    std::iter::once(props)
        .chain(props.plugins.iter().map(Plugin::props))
        .chain(state.plugins().iter().map(Plugin::props))
}

/// First value produced by `f` across the sources, in lookup order.
pub fn some_prop<'a, T>(
    props: &'a EditorProps,
    state: &'a EditorState,
    f: impl FnMut(&'a EditorProps) -> Option<T>,
) -> Option<T> {
    prop_sources(props, state).find_map(f)
}

/// Merge every source's node views. Earlier sources win per node type.
pub fn build_node_views(props: &EditorProps, state: &EditorState) -> NodeViews {
    let mut result = NodeViews::new();
    for source in prop_sources(props, state) {
        if let Some(views) = &source.node_views {
            for (name, view) in views {
                result.entry(name.clone()).or_insert_with(|| view.clone());
            }
        }
    }
    result
}

pub fn build_mark_views(props: &EditorProps, state: &EditorState) -> MarkViews {
    let mut result = MarkViews::new();
    for source in prop_sources(props, state) {
        if let Some(views) = &source.mark_views {
            for (name, view) in views {
                result.entry(name.clone()).or_insert_with(|| view.clone());
            }
        }
    }
    result
}

/// Whether two node view registries differ in any entry.
pub fn changed_node_views(a: &NodeViews, b: &NodeViews) -> bool {
    a.len() != b.len()
        || a.iter().any(|(name, view)| {
            b.get(name)
                .is_none_or(|other| !Rc::ptr_eq(view, other))
        })
}

pub fn changed_mark_views(a: &MarkViews, b: &MarkViews) -> bool {
    a.len() != b.len()
        || a.iter().any(|(name, view)| {
            b.get(name)
                .is_none_or(|other| !Rc::ptr_eq(view, other))
        })
}
