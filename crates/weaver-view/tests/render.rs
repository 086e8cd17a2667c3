mod common;

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use common::{Harness, schema};
use weaver_view::model::Attrs;
use weaver_view::props::NodeViewConstructor;
use weaver_view::{
    Capabilities, Decoration, DecorationSet, DescId, DescTree, DocRenderer, DomEvent, EditorProps,
    EditorState, EffectOrder, Node, NodeType, NodeViewProps, NodeViewSpec, OutputSpec, Transaction,
    ViewError, WidgetSpec,
};

fn class(name: &str) -> Attrs {
    Attrs::from([("class".into(), name.into())])
}

/// Every descriptor in the tree, parents before children.
fn all_descs(descs: &DescTree) -> Vec<DescId> {
    fn walk(descs: &DescTree, id: DescId, out: &mut Vec<DescId>) {
        out.push(id);
        for &child in descs.children(id) {
            walk(descs, child, out);
        }
    }
    let mut out = Vec::new();
    if let Some(root) = descs.root() {
        walk(descs, root, &mut out);
    }
    out
}

#[test]
fn test_initial_render() {
    let s = schema();
    let doc = s.doc(vec![s.p("hello"), s.p("")]);
    let mut h = Harness::new(EditorState::new(doc));
    h.render();

    insta::assert_snapshot!(
        h.html(),
        @r#"<div class="ProseMirror" contenteditable="true"><p>hello</p><p><br class="ProseMirror-trailingBreak"></br></p></div>"#
    );
    insta::assert_snapshot!(h.dump(), @r#"
    doc doc 0..9
      node paragraph 0..7
        text "hello" 1..6
      node paragraph 7..9
        trailing 8..8
    "#);
    assert!(h.view.committed_state().is_some());
}

#[test]
fn test_marks_group_text() {
    let s = schema();
    let doc = s.doc(vec![s.p_with(vec![
        Node::text("a", Vec::new()),
        Node::text("bc", vec![s.strong()]),
    ])]);
    let mut h = Harness::new(EditorState::new(doc));
    h.render();

    insta::assert_snapshot!(h.content_html(), @"<p>a<strong>bc</strong></p>");
    insta::assert_snapshot!(h.dump(), @r#"
    doc doc 0..5
      node paragraph 0..5
        text "a" 1..2
        mark strong 2..4
          text "bc" 2..4
    "#);
}

#[test]
fn test_rerender_is_idempotent() {
    let s = schema();
    let doc = s.doc(vec![
        s.h1("title"),
        s.quote(vec![s.p("inside")]),
        s.p_with(vec![Node::text("x", vec![s.em()]), s.img()]),
    ]);
    let mut h = Harness::new(EditorState::new(doc).with_node_keys());
    h.render();
    let descs = all_descs(h.view.descs());
    let html = h.html();
    let dump = h.dump();

    h.render();
    assert_eq!(all_descs(h.view.descs()), descs);
    assert_eq!(h.html(), html);
    assert_eq!(h.dump(), dump);
}

#[test]
fn test_typing_reuses_dom() {
    let s = schema();
    let doc = s.doc(vec![s.p("hello"), s.p("world")]);
    let mut h = Harness::new(EditorState::new(doc).with_node_keys());
    h.render();
    let first = h.block(0);
    let text = h.text_in(0);
    let second = h.block(1);

    let mut tr = h.view.state().tr();
    tr.replace_with(1, 6, vec![Node::text("hello!", Vec::new())])
        .unwrap();
    h.apply(tr);

    assert_eq!(h.block(0), first);
    assert_eq!(h.text_in(0), text);
    assert_eq!(h.block(1), second);
    insta::assert_snapshot!(h.content_html(), @"<p>hello!</p><p>world</p>");
    assert_eq!(h.view.descs().pos_before(h.view.nearest_desc(second).unwrap()), 8);
}

#[test]
fn test_removed_blocks_are_unmounted() {
    let s = schema();
    let doc = s.doc(vec![s.p("one"), s.hr(), s.p("two")]);
    let mut h = Harness::new(EditorState::new(doc).with_node_keys());
    h.render();
    let hr = h.block(1);
    let before = h.view.descs().len();

    let mut tr = h.view.state().tr();
    tr.replace_with(5, 6, Vec::new()).unwrap();
    h.apply(tr);

    assert!(!h.view.dom().exists(hr));
    assert_eq!(h.view.descs().len(), before - 1);
    insta::assert_snapshot!(h.content_html(), @"<p>one</p><p>two</p>");
}

#[test]
fn test_type_change_rebuilds_node() {
    let s = schema();
    let doc = s.doc(vec![s.p("same")]);
    let mut h = Harness::new(EditorState::new(doc).with_node_keys());
    h.render();
    let old = h.block(0);

    let mut tr = h.view.state().tr();
    tr.replace_with(0, 6, vec![s.h1("same")]).unwrap();
    h.apply(tr);

    assert!(!h.view.dom().exists(old));
    insta::assert_snapshot!(h.content_html(), @"<h1>same</h1>");
}

#[test]
fn test_decorations() {
    let s = schema();
    let doc = s.doc(vec![s.p("hello")]);
    let props = EditorProps {
        decorations: Some(Rc::new(|_state: &EditorState| {
            DecorationSet::create(vec![
                Decoration::node(0, 7, class("sel")),
                Decoration::inline(2, 4, class("hl")),
                Decoration::widget(6, WidgetSpec::new("span").with_key("w")),
            ])
        })),
        ..EditorProps::default()
    };
    let mut h = Harness::with_props(EditorState::new(doc), props);
    h.render();

    insta::assert_snapshot!(
        h.content_html(),
        @r#"<p class="sel">h<span class="hl">el</span>lo<span class="ProseMirror-widget" contenteditable="false"></span><br class="ProseMirror-trailingBreak"></br></p>"#
    );
    insta::assert_snapshot!(h.dump(), @r#"
    doc doc 0..7
      node paragraph 0..7
        text "h" 1..2
        text "el" 2..4
        text "lo" 4..6
        widget 6..6
        trailing 6..6
    "#);
}

#[test]
fn test_cursor_wrapper_widget() {
    let s = schema();
    let doc = s.doc(vec![s.p("ab")]);
    let mut h = Harness::new(EditorState::new(doc));
    h.view.set_cursor_wrapper(Some(2));
    h.render();
    insta::assert_snapshot!(
        h.content_html(),
        @r#"<p>a<img class="ProseMirror-separator ProseMirror-widget" alt="" contenteditable="false" mark-placeholder="true"></img>b</p>"#
    );

    h.view.set_cursor_wrapper(None);
    h.render();
    insta::assert_snapshot!(h.content_html(), @"<p>ab</p>");
}

#[test]
fn test_missing_renderer_aborts_render() {
    let s = schema();
    let mystery = NodeType::builder("mystery").build();
    let doc = s.doc(vec![Node::new(mystery, Attrs::new(), Vec::new())]);
    let mut h = Harness::new(EditorState::new(doc));

    let err = h.renderer.render(&mut h.view).unwrap_err();
    assert!(matches!(err, ViewError::MissingRenderer { ref node_type } if node_type == "mystery"));
    assert!(h.view.committed_state().is_none());
}

#[test]
fn test_node_view_capabilities() {
    let s = schema();
    let destroyed = Rc::new(Cell::new(0));
    let rule: NodeViewConstructor = {
        let destroyed = destroyed.clone();
        Rc::new(move |_props: &NodeViewProps| {
            let destroyed = destroyed.clone();
            NodeViewSpec::new(OutputSpec::element("div").with_attr("class", "rule")).with_capabilities(
                Capabilities {
                    stop_event: Some(Rc::new(|event: &DomEvent| event.kind == "mousedown")),
                    destroy: Some(Rc::new(move || destroyed.set(destroyed.get() + 1))),
                    ..Capabilities::default()
                },
            )
        })
    };
    let props = EditorProps {
        node_views: Some(BTreeMap::from([("horizontal_rule".into(), rule)])),
        ..EditorProps::default()
    };
    let doc = s.doc(vec![s.p("a"), s.hr()]);
    let mut h = Harness::with_props(EditorState::new(doc).with_node_keys(), props);
    h.render();

    let rule_dom = h.block(1);
    insta::assert_snapshot!(h.view.dom().to_html(rule_dom), @r#"<div class="rule"></div>"#);
    let event = |kind: &str| DomEvent {
        kind: kind.into(),
        target: rule_dom,
    };
    assert!(!h.view.event_belongs_to_view(&event("mousedown")));
    assert!(h.view.event_belongs_to_view(&event("keydown")));

    let mut tr = h.view.state().tr();
    tr.replace_with(3, 4, Vec::new()).unwrap();
    h.apply(tr);
    assert_eq!(destroyed.get(), 1);
}

#[test]
fn test_reversed_effect_order_sorts_children() {
    let s = schema();
    let doc = s.doc(vec![s.p("a"), s.quote(vec![s.p("b"), s.p("c")]), s.p("d")]);
    let mut h = Harness::new(EditorState::new(doc));
    h.renderer = DocRenderer::new().with_effect_order(EffectOrder::Reversed);
    h.render();

    insta::assert_snapshot!(h.dump(), @r#"
    doc doc 0..14
      node paragraph 0..3
        text "a" 1..2
      node blockquote 3..11
        node paragraph 4..7
          text "b" 5..6
        node paragraph 7..10
          text "c" 8..9
      node paragraph 11..14
        text "d" 12..13
    "#);
}

#[test]
fn test_unmount_tears_down() {
    let s = schema();
    let doc = s.doc(vec![s.p("a"), s.hr()]);
    let mut h = Harness::new(EditorState::new(doc));
    h.render();
    assert!(!h.view.descs().is_empty());

    h.renderer.unmount(&mut h.view);
    assert!(h.view.descs().is_empty());
    assert!(h.view.dom().children(h.root()).is_empty());
}

mod sort_invariant {
    use proptest::prelude::*;

    use super::*;

    fn assert_sorted(descs: &DescTree, id: DescId) {
        let children = descs.children(id);
        for pair in children.windows(2) {
            assert!(descs.pos_before(pair[0]) <= descs.pos_before(pair[1]));
        }
        for &child in children {
            assert_eq!(descs.get(child).and_then(|desc| desc.parent), Some(id));
            assert_sorted(descs, child);
        }
    }

    proptest! {
        #[test]
        fn children_sorted_after_any_effect_order(
            texts in prop::collection::vec("[a-z]{0,4}", 1..6),
            swaps in prop::collection::vec((0usize..6, 0usize..6), 0..6),
            reversed in any::<bool>(),
        ) {
            let s = schema();
            let doc = s.doc(texts.iter().map(|t| s.p(t)).collect());
            let mut h = Harness::new(EditorState::new(doc).with_node_keys());
            let effect_order = if reversed { EffectOrder::Reversed } else { EffectOrder::InOrder };
            h.renderer = DocRenderer::new().with_effect_order(effect_order);
            h.render();
            let root = h.view.descs().root().unwrap();
            assert_sorted(h.view.descs(), root);

            let mut perm: Vec<usize> = (0..texts.len()).collect();
            for &(i, j) in &swaps {
                perm.swap(i % texts.len(), j % texts.len());
            }
            let state = h.view.state().clone();
            let mut next = None;
            weaver_view::commands::reorder_siblings(0, &perm, &state, Some(&mut |tr: Transaction| next = Some(tr)));
            if let Some(tr) = next {
                h.renderer.set_effect_order(if reversed { EffectOrder::InOrder } else { EffectOrder::Reversed });
                h.apply(tr);
            }
            let root = h.view.descs().root().unwrap();
            assert_sorted(h.view.descs(), root);
            let deco = h.view.decorations();
            prop_assert!(h.view.descs().matches_doc(h.view.state().doc(), &deco));
        }
    }
}
