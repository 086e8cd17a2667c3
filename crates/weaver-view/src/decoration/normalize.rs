//! Merging decoration sets from independent sources into one.

use std::sync::Arc;

use tracing::trace;

use super::{Decoration, DecorationSet, by_pos};
use crate::model::{Mapping, Node};

/// Several decoration sets acting as one.
#[derive(Clone, Debug)]
pub struct DecorationGroup {
    members: Arc<[DecorationSet]>,
}

impl DecorationGroup {
    pub fn members(&self) -> &[DecorationSet] {
        &self.members
    }
}

/// Either a single decoration set or a group of them.
#[derive(Clone, Debug)]
pub enum DecorationSource {
    Set(DecorationSet),
    Group(DecorationGroup),
}

impl Default for DecorationSource {
    fn default() -> Self {
        DecorationSource::empty()
    }
}

impl From<DecorationSet> for DecorationSource {
    fn from(set: DecorationSet) -> Self {
        DecorationSource::Set(set)
    }
}

impl PartialEq for DecorationSource {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DecorationSource::Set(a), DecorationSource::Set(b)) => a == b,
            (DecorationSource::Group(a), DecorationSource::Group(b)) => {
                Arc::ptr_eq(&a.members, &b.members)
                    || (a.members.len() == b.members.len()
                        && a.members.iter().zip(b.members.iter()).all(|(a, b)| a == b))
            }
            _ => false,
        }
    }
}

impl DecorationSource {
    pub fn empty() -> Self {
        DecorationSource::Set(DecorationSet::empty())
    }

    /// Combine sources. No members yields the empty set, one member is
    /// returned as is, and nested groups are flattened.
    pub fn from_members(members: Vec<DecorationSource>) -> Self {
        let mut flat: Vec<DecorationSet> = Vec::with_capacity(members.len());
        for member in members {
            match member {
                DecorationSource::Set(set) => flat.push(set),
                DecorationSource::Group(group) => flat.extend(group.members.iter().cloned()),
            }
        }
        match flat.len() {
            0 => Self::empty(),
            1 => DecorationSource::Set(flat.remove(0)),
            _ => DecorationSource::Group(DecorationGroup {
                members: Arc::from(flat),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            DecorationSource::Set(set) => set.is_empty(),
            DecorationSource::Group(group) => group.members.iter().all(DecorationSet::is_empty),
        }
    }

    /// Decorations that apply inside `child`, starting at `offset`.
    pub fn for_child(&self, offset: usize, child: &Node) -> DecorationSource {
        match self {
            DecorationSource::Set(set) => DecorationSource::Set(set.for_child(offset, child)),
            DecorationSource::Group(group) => {
                let found = group
                    .members
                    .iter()
                    .map(|member| member.for_child(offset, child))
                    .filter(|set| !set.is_empty())
                    .map(DecorationSource::Set)
                    .collect();
                Self::from_members(found)
            }
        }
    }

    /// Decorations at `node`'s own level, sorted, with partial overlaps
    /// split into nested or disjoint spans.
    pub fn locals(&self, node: &Node) -> Vec<Decoration> {
        match self {
            DecorationSource::Set(set) => set.locals(node),
            DecorationSource::Group(group) => {
                let mut merged = Vec::new();
                for member in group.members.iter() {
                    merged.extend(member.locals_inner(node));
                }
                merged.sort_by(by_pos);
                remove_overlap(merged)
            }
        }
    }

    pub fn map(&self, mapping: &Mapping) -> DecorationSource {
        match self {
            DecorationSource::Set(set) => DecorationSource::Set(set.map(mapping)),
            DecorationSource::Group(group) => DecorationSource::Group(DecorationGroup {
                members: group.members.iter().map(|m| m.map(mapping)).collect(),
            }),
        }
    }
}

/// Split partially overlapping spans so that any two spans in the result
/// are either disjoint or nested. Input must be sorted by start, then end.
pub fn remove_overlap(mut spans: Vec<Decoration>) -> Vec<Decoration> {
    let mut i = 0;
    while i + 1 < spans.len() {
        let mut span = spans[i].clone();
        if span.from != span.to {
            let mut j = i + 1;
            while j < spans.len() {
                let next = spans[j].clone();
                if next.from == span.from {
                    if next.to != span.to {
                        // A longer span starting at the same place. Cut it
                        // at this span's end.
                        spans[j] = next.copy(next.from, span.to);
                        insert_ahead(&mut spans, j + 1, next.copy(span.to, next.to));
                    }
                } else if next.from >= span.to {
                    break;
                } else if next.to > span.to {
                    // Crossing: cut this span where the next one starts and
                    // rescan, since spans nested in the old range may now
                    // cross the shorter one.
                    spans[i] = span.copy(span.from, next.from);
                    insert_ahead(&mut spans, j, span.copy(next.from, span.to));
                    span = spans[i].clone();
                    j = i + 1;
                    continue;
                }
                j += 1;
            }
        }
        i += 1;
    }
    spans
}

fn insert_ahead(spans: &mut Vec<Decoration>, mut index: usize, deco: Decoration) {
    while index < spans.len() && by_pos(&deco, &spans[index]).is_gt() {
        index += 1;
    }
    spans.insert(index, deco);
}

/// Memoized normalisation of a view's decoration sources.
///
/// The cached group is reused for as long as every input set is the same
/// instance as last time.
#[derive(Debug, Default)]
pub struct DecorationCache {
    inputs: Vec<DecorationSet>,
    output: Option<DecorationSource>,
}

impl DecorationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, inputs: Vec<DecorationSet>) -> DecorationSource {
        if let Some(output) = &self.output {
            let same = inputs.len() == self.inputs.len()
                && inputs.iter().zip(self.inputs.iter()).all(|(a, b)| a.ptr_eq(b));
            if same {
                return output.clone();
            }
        }
        trace!(
            target: "weaver::decorations",
            sources = inputs.len(),
            "rebuilding decoration group"
        );
        let output = DecorationSource::from_members(
            inputs.iter().cloned().map(DecorationSource::Set).collect(),
        );
        self.inputs = inputs;
        self.output = Some(output.clone());
        output
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::model::{Attrs, NodeType};

    fn inline(from: usize, to: usize, class: &str) -> Decoration {
        let mut attrs = Attrs::new();
        attrs.insert("class".into(), class.into());
        Decoration::inline(from, to, attrs)
    }

    fn ranges(spans: &[Decoration]) -> Vec<(usize, usize)> {
        spans.iter().map(|d| (d.from, d.to)).collect()
    }

    /// A root that holds inline content directly, five units long.
    fn inline_doc() -> Node {
        let doc = NodeType::builder("doc")
            .inline_content()
            .output(crate::model::OutputSpec::wrapping("div"))
            .build();
        Node::new(doc, Attrs::new(), vec![Node::text("hello", vec![])])
    }

    #[test]
    fn test_from_members_shapes() {
        assert!(matches!(
            DecorationSource::from_members(vec![]),
            DecorationSource::Set(set) if set.ptr_eq(&DecorationSet::empty())
        ));

        let one = DecorationSet::create(vec![inline(0, 1, "a")]);
        match DecorationSource::from_members(vec![one.clone().into()]) {
            DecorationSource::Set(set) => assert!(set.ptr_eq(&one)),
            other => panic!("expected a plain set, got {other:?}"),
        }

        let two = DecorationSet::create(vec![inline(1, 2, "b")]);
        let group = DecorationSource::from_members(vec![one.clone().into(), two.clone().into()]);
        let nested = DecorationSource::from_members(vec![group, one.into()]);
        match nested {
            DecorationSource::Group(group) => assert_eq!(group.members().len(), 3),
            other => panic!("expected a group, got {other:?}"),
        }
    }

    #[test]
    fn test_nested_sources_stay_nested() {
        let a = DecorationSet::create(vec![inline(2, 3, "inner")]);
        let b = DecorationSet::create(vec![inline(0, 5, "outer")]);
        let source = DecorationSource::from_members(vec![a.into(), b.into()]);
        assert_eq!(ranges(&source.locals(&inline_doc())), vec![(0, 5), (2, 3)]);
    }

    #[test]
    fn test_crossing_spans_split() {
        let spans = remove_overlap(vec![inline(0, 4, "a"), inline(2, 6, "b")]);
        assert_eq!(ranges(&spans), vec![(0, 2), (2, 4), (2, 4), (4, 6)]);
    }

    #[test]
    fn test_shared_start_split() {
        let spans = remove_overlap(vec![inline(1, 3, "a"), inline(1, 7, "b")]);
        assert_eq!(ranges(&spans), vec![(1, 3), (1, 3), (3, 7)]);
    }

    #[test]
    fn test_cache_reuses_by_identity() {
        let mut cache = DecorationCache::new();
        let a = DecorationSet::create(vec![inline(0, 1, "a")]);
        let b = DecorationSet::create(vec![inline(1, 2, "b")]);
        let first = cache.get(vec![a.clone(), b.clone()]);
        let second = cache.get(vec![a.clone(), b.clone()]);
        match (&first, &second) {
            (DecorationSource::Group(x), DecorationSource::Group(y)) => {
                assert!(Arc::ptr_eq(&x.members, &y.members))
            }
            _ => panic!("expected groups"),
        }

        let b2 = DecorationSet::create(vec![inline(1, 2, "b")]);
        let third = cache.get(vec![a, b2]);
        match (&first, &third) {
            (DecorationSource::Group(x), DecorationSource::Group(y)) => {
                assert!(!Arc::ptr_eq(&x.members, &y.members));
                assert_eq!(first, third);
            }
            _ => panic!("expected groups"),
        }
    }

    fn span_strategy() -> impl Strategy<Value = Vec<(usize, usize)>> {
        prop::collection::vec((0usize..20, 1usize..10), 1..8)
            .prop_map(|v| v.into_iter().map(|(from, len)| (from, from + len)).collect())
    }

    proptest! {
        #[test]
        fn overlap_removed_and_coverage_kept(raw in span_strategy()) {
            let mut spans: Vec<Decoration> = raw
                .iter()
                .enumerate()
                .map(|(i, &(from, to))| inline(from, to, &i.to_string()))
                .collect();
            spans.sort_by(by_pos);
            let originals = spans.clone();
            let out = remove_overlap(spans);

            for (i, a) in out.iter().enumerate() {
                for b in &out[i + 1..] {
                    let disjoint = a.to <= b.from || b.to <= a.from;
                    let nested = (a.from <= b.from && b.to <= a.to)
                        || (b.from <= a.from && a.to <= b.to);
                    prop_assert!(disjoint || nested, "{:?} and {:?} overlap", (a.from, a.to), (b.from, b.to));
                }
            }

            for original in &originals {
                let mut pieces: Vec<(usize, usize)> = out
                    .iter()
                    .filter(|d| d.same_origin(original))
                    .map(|d| (d.from, d.to))
                    .collect();
                pieces.sort();
                let mut cursor = original.from;
                for (from, to) in pieces {
                    prop_assert_eq!(from, cursor);
                    cursor = to;
                }
                prop_assert_eq!(cursor, original.to);
            }
        }
    }
}
