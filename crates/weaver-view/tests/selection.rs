mod common;

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use common::{Harness, counting_dispatch, schema};
use weaver_view::props::NodeViewConstructor;
use weaver_view::{
    Capabilities, Dom, DomId, DomPoint, EditorProps, EditorState, Node, NodeViewProps, NodeViewSpec,
    OutputSpec, Selection,
};

#[test]
fn test_write_then_read_round_trips() {
    let s = schema();
    let doc = s.doc(vec![s.p("hello"), s.p("world")]);
    let state = EditorState::new(doc.clone());
    let mut h = Harness::new(state);
    h.selection.focus();
    h.render();

    for selection in [
        Selection::cursor(1),
        Selection::cursor(4),
        Selection::cursor(13),
        Selection::text(2, 10),
        Selection::text(12, 3),
    ] {
        let mut tr = h.view.state().tr();
        tr.set_selection(selection);
        h.apply(tr);
        assert_eq!(h.view.state().selection(), selection);

        h.clock.advance_ms(100);
        h.view.flush_selection();
        assert_eq!(h.view.state().selection(), selection, "read back {selection:?}");
    }
}

#[test]
fn test_node_selection_round_trips() {
    let s = schema();
    let doc = s.doc(vec![s.p("ab"), s.hr(), s.p("cd")]);
    let mut h = Harness::new(EditorState::new(doc));
    h.selection.focus();
    h.render();

    let node = Selection::Node { from: 4, to: 5 };
    let mut tr = h.view.state().tr();
    tr.set_selection(node);
    h.apply(tr);
    let hr = h.block(1);
    assert!(h.view.dom().has_class(hr, "ProseMirror-selectednode"));

    h.clock.advance_ms(100);
    h.view.flush_selection();
    assert_eq!(h.view.state().selection(), node);

    let mut tr = h.view.state().tr();
    tr.set_selection(Selection::cursor(1));
    h.apply(tr);
    assert!(!h.view.dom().has_class(hr, "ProseMirror-selectednode"));
}

#[test]
fn test_range_over_block_atom_reads_as_node_selection() {
    let s = schema();
    let doc = s.doc(vec![s.p("ab"), s.hr(), s.p("cd")]);
    let mut h = Harness::new(EditorState::new(doc));
    h.selection.focus();
    h.render();
    h.clock.advance_ms(100);

    let root = h.root();
    h.selection
        .set_range(DomPoint::new(root, 1), DomPoint::new(root, 2));
    h.view.on_selection_change();
    assert_eq!(h.view.state().selection(), Selection::Node { from: 4, to: 5 });

    h.clock.advance_ms(100);
    h.selection.collapse(DomPoint::new(h.block(1), 0));
    h.view.on_selection_change();
    assert_eq!(h.view.state().selection(), Selection::Node { from: 4, to: 5 });
}

#[test]
fn test_own_write_is_not_read_back() {
    let s = schema();
    let doc = s.doc(vec![s.p("hello")]);
    let (dispatched, props) = counting_dispatch();
    let state = EditorState::new(doc).with_selection(Selection::cursor(3));
    let mut h = Harness::with_props(state, props);
    h.selection.focus();
    h.render();
    assert_eq!(h.selection.writes(), 1);

    // The browser reports the change our own write caused.
    h.view.on_selection_change();
    assert_eq!(dispatched.get(), 0);

    // Later notifications for the same range are no-ops too.
    h.clock.advance_ms(100);
    h.view.on_selection_change();
    assert_eq!(dispatched.get(), 0);

    // A rerender with an unchanged selection doesn't write again.
    h.render();
    assert_eq!(h.selection.writes(), 1);

    // A real user change does reach the state.
    h.clock.advance_ms(100);
    h.selection.collapse(DomPoint::new(h.text_in(0), 1));
    h.view.on_selection_change();
    assert_eq!(dispatched.get(), 1);
}

#[test]
fn test_changes_inside_suppression_window_restore_model_selection() {
    let s = schema();
    let doc = s.doc(vec![s.p("hello")]);
    let (dispatched, props) = counting_dispatch();
    let state = EditorState::new(doc).with_selection(Selection::cursor(3));
    let mut h = Harness::with_props(state, props);
    h.selection.focus();
    h.render();
    let expected = Some(DomPoint::new(h.text_in(0), 2));
    assert_eq!(h.selection.current().focus, expected);

    h.clock.advance_ms(10);
    h.selection.collapse(DomPoint::new(h.text_in(0), 4));
    h.view.on_selection_change();
    assert_eq!(dispatched.get(), 0);
    assert_eq!(h.selection.current().focus, expected);

    // After the window closes, native and model still agree.
    h.clock.advance_ms(1000);
    h.view.on_selection_change();
    assert_eq!(dispatched.get(), 0);
    assert_eq!(h.view.state().selection(), Selection::cursor(3));
    assert_eq!(h.selection.current().focus, expected);
    assert_eq!(h.selection.current().anchor, expected);
}

#[test]
fn test_echo_inside_suppression_window_is_not_rewritten() {
    let s = schema();
    let doc = s.doc(vec![s.p("hello")]);
    let mut h = Harness::new(EditorState::new(doc).with_selection(Selection::cursor(3)));
    h.selection.focus();
    h.render();
    let writes = h.selection.writes();

    h.clock.advance_ms(10);
    h.view.on_selection_change();
    assert_eq!(h.selection.writes(), writes);
}

#[test]
fn test_unmappable_selection_is_ignored() {
    let s = schema();
    let doc = s.doc(vec![s.p("hello")]);
    let mut h = Harness::new(EditorState::new(doc).with_selection(Selection::cursor(3)));
    h.selection.focus();
    h.render();
    h.clock.advance_ms(100);

    let outside = h.view.dom_mut().create_element("div");
    h.selection.collapse(DomPoint::new(outside, 0));
    h.view.on_selection_change();
    assert_eq!(h.view.state().selection(), Selection::cursor(3));
}

#[test]
fn test_focus_reset_is_overridden() {
    let s = schema();
    let doc = s.doc(vec![s.p("hello"), s.p("world")]);
    let mut h = Harness::new(EditorState::new(doc).with_selection(Selection::cursor(10)));
    h.selection.focus();
    h.render();
    h.clock.advance_ms(1000);

    h.selection.blur();
    h.clock.advance_ms(1000);
    h.selection.focus();
    h.view.record_focus();
    h.clock.advance_ms(60);
    h.selection.collapse(DomPoint::new(h.text_in(0), 0));
    h.view.on_selection_change();

    assert_eq!(h.view.state().selection(), Selection::cursor(10));
    assert_eq!(h.selection.writes(), 2);
    assert_eq!(h.selection.current().focus, Some(DomPoint::new(h.text_in(1), 2)));
}

#[test]
fn test_focus_reset_after_click_is_accepted() {
    let s = schema();
    let doc = s.doc(vec![s.p("hello"), s.p("world")]);
    let mut h = Harness::new(EditorState::new(doc).with_selection(Selection::cursor(10)));
    h.selection.focus();
    h.render();
    h.clock.advance_ms(1000);

    h.selection.blur();
    h.clock.advance_ms(1000);
    h.selection.focus();
    h.view.record_focus();
    h.view.record_pointer_down();
    h.clock.advance_ms(60);
    h.selection.collapse(DomPoint::new(h.text_in(0), 0));
    h.view.on_selection_change();

    assert_eq!(h.view.state().selection(), Selection::cursor(1));
}

#[test]
fn test_no_writes_without_focus() {
    let s = schema();
    let doc = s.doc(vec![s.p("hello")]);
    let mut h = Harness::new(EditorState::new(doc).with_selection(Selection::cursor(3)));
    h.render();
    assert_eq!(h.selection.writes(), 0);
}

#[test]
fn test_unchanged_commit_leaves_selection_alone() {
    let s = schema();
    let selected = Rc::new(Cell::new(0));
    let rule: NodeViewConstructor = {
        let selected = selected.clone();
        Rc::new(move |_props: &NodeViewProps| {
            let selected = selected.clone();
            NodeViewSpec::new(OutputSpec::element("div")).with_capabilities(Capabilities {
                select_node: Some(Rc::new(move |_dom: &mut Dom, _node: DomId| {
                    selected.set(selected.get() + 1)
                })),
                deselect_node: Some(Rc::new(|_dom: &mut Dom, _node: DomId| {})),
                ..Capabilities::default()
            })
        })
    };
    let props = EditorProps {
        node_views: Some(BTreeMap::from([("horizontal_rule".into(), rule)])),
        ..EditorProps::default()
    };
    let doc = s.doc(vec![s.p("ab"), s.hr(), s.p("cd")]);
    let state = EditorState::new(doc)
        .with_selection(Selection::Node { from: 4, to: 5 })
        .with_node_keys();
    let mut h = Harness::with_props(state, props);
    h.selection.focus();
    h.render();
    assert_eq!(h.selection.writes(), 1);
    assert_eq!(selected.get(), 1);

    // Nothing was dispatched, so a rerender validates nothing, even with
    // the native selection elsewhere.
    let elsewhere = DomPoint::new(h.text_in(0), 1);
    h.selection.collapse(elsewhere);
    h.render();
    assert_eq!(h.selection.writes(), 1);
    assert_eq!(selected.get(), 1);
    assert_eq!(h.selection.current().focus, Some(elsewhere));
}

#[test]
fn test_doc_change_revalidates_equal_selection() {
    let s = schema();
    let doc = s.doc(vec![s.p("hello"), s.p("world")]);
    let mut h = Harness::new(
        EditorState::new(doc)
            .with_selection(Selection::cursor(3))
            .with_node_keys(),
    );
    h.selection.focus();
    h.render();
    assert_eq!(h.selection.writes(), 1);

    h.selection.collapse(DomPoint::new(h.text_in(0), 4));
    let mut tr = h.view.state().tr();
    tr.replace_with(8, 13, vec![Node::text("earth", Vec::new())])
        .unwrap();
    h.apply(tr);

    assert_eq!(h.view.state().selection(), Selection::cursor(3));
    assert_eq!(h.selection.writes(), 2);
    assert_eq!(h.selection.current().focus, Some(DomPoint::new(h.text_in(0), 2)));
}
