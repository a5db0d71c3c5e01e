//! Known installation layouts.

use crate::{FileNode, GameKind};

/// A named signature tree for one engine layout.
#[derive(Debug, Clone)]
pub struct Signature {
    name: String,
    kind: GameKind,
    tree: FileNode,
}

impl Signature {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> GameKind {
        self.kind
    }

    pub fn tree(&self) -> &FileNode {
        &self.tree
    }
}

/// Ordered, append-only list of signatures.
///
/// Order matters: when two signatures match at the same depth the one
/// pushed first wins.
#[derive(Debug, Clone, Default)]
pub struct SignatureCatalog {
    signatures: Vec<Signature>,
}

impl SignatureCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of the layouts shipped by the supported engines.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.push("tr1-cfg-data-shaders", GameKind::Tr1, ["CFG", "DATA", "SHADERS"]);
        catalog.push("tr1-dos", GameKind::Tr1, ["TOMBRAID"]);
        catalog.push("tr2-data", GameKind::Tr2, ["DATA"]);
        catalog.push("tr3-audio-data", GameKind::Tr3, ["AUDIO", "DATA"]);
        catalog.push("tr4-audio-data", GameKind::Tr4, ["AUDIO", "DATA"]);
        catalog.push("tr5-audio-data-pix", GameKind::Tr5, ["AUDIO", "DATA", "PIX"]);
        catalog.push("tr5-data", GameKind::Tr5, ["DATA"]);
        catalog.push("ten-executable", GameKind::Ten, ["TOMBENGINE.EXE"]);
        catalog
    }

    /// Appends a signature built from a list of required entries.
    pub fn push<I, S>(&mut self, name: impl Into<String>, kind: GameKind, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.signatures.push(Signature {
            name: name.into(),
            kind,
            tree: FileNode::from_signature(entries),
        });
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Signature> {
        self.signatures.iter()
    }

    /// Signatures registered for `kind`, in catalog order.
    pub fn for_kind(&self, kind: GameKind) -> impl Iterator<Item = &Signature> {
        self.signatures.iter().filter(move |s| s.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

impl<'a> IntoIterator for &'a SignatureCatalog {
    type Item = &'a Signature;
    type IntoIter = std::slice::Iter<'a, Signature>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
