//! Output templates describing how a node or mark renders to DOM.

use smol_str::SmolStr;

use super::Attrs;

/// A declarative DOM template.
///
/// `Hole` marks the place where child content is rendered. A template
/// contains at most one hole; an element without a hole renders as a leaf
/// for child-rendering purposes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputSpec {
    Element {
        tag: SmolStr,
        attrs: Attrs,
        children: Vec<OutputSpec>,
    },
    Text(SmolStr),
    Hole,
}

impl OutputSpec {
    /// An empty element with the given tag.
    pub fn element(tag: impl Into<SmolStr>) -> Self {
        OutputSpec::Element {
            tag: tag.into(),
            attrs: Attrs::new(),
            children: Vec::new(),
        }
    }

    /// An element whose only child is the content hole.
    pub fn wrapping(tag: impl Into<SmolStr>) -> Self {
        Self::element(tag).with_hole()
    }

    pub fn with_attr(mut self, name: impl Into<SmolStr>, value: impl Into<SmolStr>) -> Self {
        if let OutputSpec::Element { attrs, .. } = &mut self {
            attrs.insert(name.into(), value.into());
        }
        self
    }

    pub fn with_child(mut self, child: OutputSpec) -> Self {
        if let OutputSpec::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }

    pub fn with_hole(self) -> Self {
        self.with_child(OutputSpec::Hole)
    }

    /// Whether this template renders child content somewhere.
    pub fn has_hole(&self) -> bool {
        match self {
            OutputSpec::Hole => true,
            OutputSpec::Text(_) => false,
            OutputSpec::Element { children, .. } => children.iter().any(OutputSpec::has_hole),
        }
    }
}
