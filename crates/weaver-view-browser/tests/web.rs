//! WASM browser tests for weaver-view-browser.
//!
//! Run with: `wasm-pack test --headless --firefox` or `--chrome`

use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

use weaver_view::model::Attrs;
use weaver_view_browser::{
    BrowserView, DirectEditorProps, EditorState, Node, NodeType, Selection,
};

struct Schema {
    doc: NodeType,
    paragraph: NodeType,
}

fn schema() -> Schema {
    Schema {
        doc: NodeType::doc(),
        paragraph: NodeType::textblock("paragraph", "p"),
    }
}

impl Schema {
    fn doc(&self, texts: &[&str]) -> Node {
        let paragraphs = texts
            .iter()
            .map(|text| {
                let content = if text.is_empty() {
                    Vec::new()
                } else {
                    vec![Node::text(*text, Vec::new())]
                };
                Node::new(self.paragraph.clone(), Attrs::new(), content)
            })
            .collect();
        Node::new(self.doc.clone(), Attrs::new(), paragraphs)
    }
}

fn mount() -> web_sys::HtmlElement {
    let document = gloo_utils::document();
    let element = document
        .create_element("div")
        .unwrap()
        .dyn_into::<web_sys::HtmlElement>()
        .unwrap();
    gloo_utils::body().append_child(&element).unwrap();
    element
}

fn view(mount: &web_sys::HtmlElement, state: EditorState) -> BrowserView {
    let mut view = BrowserView::new(mount.clone().into(), DirectEditorProps::new(state)).unwrap();
    view.render().unwrap();
    view
}

#[wasm_bindgen_test]
fn test_render_writes_browser_dom() {
    let s = schema();
    let mount = mount();
    let _view = view(&mount, EditorState::new(s.doc(&["hello", ""])));

    assert_eq!(
        mount.inner_html(),
        r#"<p>hello</p><p><br class="ProseMirror-trailingBreak"></p>"#
    );
    assert_eq!(mount.get_attribute("contenteditable").as_deref(), Some("true"));
    assert!(mount.class_list().contains("ProseMirror"));
}

#[wasm_bindgen_test]
fn test_update_keeps_unchanged_nodes() {
    let s = schema();
    let mount = mount();
    let mut view = view(&mount, EditorState::new(s.doc(&["one", "two"])).with_node_keys());
    let second = mount.last_element_child().unwrap();

    let mut tr = view.view().state().tr();
    tr.replace_with(1, 4, vec![Node::text("uno", Vec::new())]).unwrap();
    let state = view.view().state().apply(tr);
    view.update_state(state).unwrap();

    assert_eq!(mount.inner_html(), "<p>uno</p><p>two</p>");
    assert!(mount.last_element_child().unwrap().is_same_node(Some(&second)));
}

#[wasm_bindgen_test]
fn test_destroy_empties_mount() {
    let s = schema();
    let mount = mount();
    let mut view = view(&mount, EditorState::new(s.doc(&["a", "b"])));
    view.destroy().unwrap();
    assert_eq!(mount.inner_html(), "");
}

#[wasm_bindgen_test]
fn test_selection_written_when_focused() {
    let s = schema();
    let mount = mount();
    let state = EditorState::new(s.doc(&["hello"]));
    let mut view = view(&mount, state);
    mount.focus().unwrap();
    assert!(view.has_focus());

    let mut tr = view.view().state().tr();
    tr.set_selection(Selection::cursor(3));
    let state = view.view().state().apply(tr);
    view.update_state(state).unwrap();

    let selection = gloo_utils::window().get_selection().unwrap().unwrap();
    let text = mount.first_element_child().unwrap().first_child().unwrap();
    assert!(selection.anchor_node().unwrap().is_same_node(Some(&text)));
    assert_eq!(selection.anchor_offset(), 2);
}

#[wasm_bindgen_test]
fn test_native_selection_maps_to_arena() {
    let s = schema();
    let mount = mount();
    let view = view(&mount, EditorState::new(s.doc(&["hello"])));
    let text = mount.first_element_child().unwrap().first_child().unwrap();

    let selection = gloo_utils::window().get_selection().unwrap().unwrap();
    selection.collapse_with_offset(Some(&text), 4).unwrap();

    let mirrored = view.mirror().id_of(&text).unwrap();
    assert_eq!(view.view().pos_from_dom(mirrored, 4, 0), Some(5));
}
