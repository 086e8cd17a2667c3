#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use weaver_view::model::Attrs;
use weaver_view::{
    DirectEditorProps, DocRenderer, Dom, DomId, EditorProps, EditorState, EditorView, ManualClock,
    Mark, MarkType, Node, NodeType, OutputSpec, SimulatedSelection, Transaction,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Schema {
    pub doc: NodeType,
    pub paragraph: NodeType,
    pub heading: NodeType,
    pub blockquote: NodeType,
    pub hr: NodeType,
    pub image: NodeType,
    pub text: NodeType,
    pub strong: MarkType,
    pub em: MarkType,
}

pub fn schema() -> Schema {
    Schema {
        doc: NodeType::doc(),
        paragraph: NodeType::textblock("paragraph", "p"),
        heading: NodeType::textblock("heading", "h1"),
        blockquote: NodeType::container("blockquote", "blockquote"),
        hr: NodeType::block_leaf("horizontal_rule", "hr"),
        image: NodeType::inline_leaf("image", "img"),
        text: NodeType::text(),
        strong: MarkType::new("strong", Some(OutputSpec::wrapping("strong"))),
        em: MarkType::new("em", Some(OutputSpec::wrapping("em"))),
    }
}

impl Schema {
    pub fn doc(&self, children: Vec<Node>) -> Node {
        Node::new(self.doc.clone(), Attrs::new(), children)
    }

    pub fn p(&self, text: &str) -> Node {
        let content = if text.is_empty() {
            Vec::new()
        } else {
            vec![Node::text(text, Vec::new())]
        };
        Node::new(self.paragraph.clone(), Attrs::new(), content)
    }

    pub fn p_with(&self, content: Vec<Node>) -> Node {
        Node::new(self.paragraph.clone(), Attrs::new(), content)
    }

    pub fn h1(&self, text: &str) -> Node {
        Node::new(
            self.heading.clone(),
            Attrs::new(),
            vec![Node::text(text, Vec::new())],
        )
    }

    pub fn quote(&self, children: Vec<Node>) -> Node {
        Node::new(self.blockquote.clone(), Attrs::new(), children)
    }

    pub fn hr(&self) -> Node {
        Node::new(self.hr.clone(), Attrs::new(), Vec::new())
    }

    pub fn img(&self) -> Node {
        Node::new(self.image.clone(), Attrs::new(), Vec::new())
    }

    pub fn strong(&self) -> Mark {
        Mark::new(self.strong.clone(), Attrs::new())
    }

    pub fn em(&self) -> Mark {
        Mark::new(self.em.clone(), Attrs::new())
    }
}

/// A view wired to a simulated selection and a manual clock, with a
/// renderer to drive it.
pub struct Harness {
    pub view: EditorView,
    pub renderer: DocRenderer,
    pub selection: SimulatedSelection,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new(state: EditorState) -> Self {
        Self::with_props(state, EditorProps::default())
    }

    pub fn with_props(state: EditorState, props: EditorProps) -> Self {
        init_tracing();
        let selection = SimulatedSelection::new();
        let clock = ManualClock::new();
        let view = EditorView::new(
            Dom::new("div"),
            DirectEditorProps::new(state).with_props(props),
            Box::new(selection.clone()),
        )
        .with_clock(Rc::new(clock.clone()));
        Self {
            view,
            renderer: DocRenderer::new(),
            selection,
            clock,
        }
    }

    pub fn render(&mut self) {
        self.renderer.render(&mut self.view).unwrap();
    }

    /// Apply a transaction to the view's state and render.
    pub fn apply(&mut self, tr: Transaction) {
        let state = self.view.state().apply(tr);
        self.view.update_state(state);
        self.render();
    }

    pub fn root(&self) -> DomId {
        self.view.dom().root()
    }

    pub fn html(&self) -> String {
        self.view.dom().to_html(self.root())
    }

    /// Inner HTML of the mount.
    pub fn content_html(&self) -> String {
        let dom = self.view.dom();
        dom.children(self.root())
            .iter()
            .map(|&child| dom.to_html(child))
            .collect()
    }

    pub fn dump(&self) -> String {
        self.view.descs().dump()
    }

    /// The DOM child of the mount at `index`.
    pub fn block(&self, index: usize) -> DomId {
        self.view.dom().child(self.root(), index).unwrap()
    }

    /// First text node under the block at `index`.
    pub fn text_in(&self, index: usize) -> DomId {
        self.view.dom().first_text_leaf(self.block(index)).unwrap()
    }
}

/// A `dispatch_transaction` prop that counts calls and applies nothing.
pub fn counting_dispatch() -> (Rc<Cell<usize>>, EditorProps) {
    let count = Rc::new(Cell::new(0));
    let props = EditorProps {
        dispatch_transaction: Some({
            let count = count.clone();
            Rc::new(move |_tr: Transaction| count.set(count.get() + 1))
        }),
        ..EditorProps::default()
    };
    (count, props)
}
