use std::ops::Range;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use miette::SourceSpan;

type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Where a label was defined and the byte offset it stands for.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LabelDef {
    /// Offset of the instruction following the label
    pub offset: usize,
    pub line: usize,
    pub span: Span,
}

/// Label name -> definition, in source order. Owned by a single assembly.
#[derive(Default, Debug)]
pub struct LabelTable {
    map: FxMap<String, LabelDef>,
}

impl LabelTable {
    pub fn new() -> Self {
        LabelTable {
            map: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Define `name`. Fails with the earlier definition if the label already exists.
    pub fn insert(&mut self, name: &str, def: LabelDef) -> Result<(), LabelDef> {
        if let Some(prev) = self.map.get(name) {
            return Err(*prev);
        }
        self.map.insert(name.to_string(), def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&LabelDef> {
        self.map.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LabelDef)> {
        self.map.iter().map(|(name, def)| (name.as_str(), def))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Used to refer to offsets from the start of a source file.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct SrcOffset(pub usize);

/// Location within source
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Span {
    offs: SrcOffset,
    len: usize,
}

impl Span {
    pub fn new(offs: SrcOffset, len: usize) -> Self {
        Span { offs, len }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(&self, other: Span) -> Span {
        let start = self.offs().min(other.offs());
        let end = self.end().max(other.end());
        Span::new(SrcOffset(start), end - start)
    }

    pub fn range(&self) -> Range<usize> {
        self.offs.0..self.offs.0 + self.len
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn offs(&self) -> usize {
        self.offs.0
    }

    pub fn end(&self) -> usize {
        self.offs.0 + self.len
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}
