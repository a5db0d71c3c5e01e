//! Containment matching of signature trees against scan trees.

use std::path::{Path, PathBuf};

use crate::tree::{FileNode, names_equal};
use crate::{GameKind, SignatureCatalog};

/// Returns `true` if `signature` is contained in `subject`.
///
/// Node names compare case-insensitively; a root (empty name) on either
/// side matches any name. Every child of `signature` must match some child
/// of `subject`, recursively. Extra children on `subject` are ignored.
pub fn matches(signature: &FileNode, subject: &FileNode) -> bool {
    let names_match =
        signature.is_root() || subject.is_root() || names_equal(signature.name(), subject.name());
    if !names_match {
        return false;
    }

    signature.children().iter().all(|required| {
        subject
            .children()
            .iter()
            .any(|candidate| matches(required, candidate))
    })
}

/// Finds every non-leaf node of `scan` that contains `signature`.
///
/// Nodes are tested level by level, so the returned paths are ordered by
/// depth, then by discovery order. The scan root itself is reported as an
/// empty path.
pub fn find_all(scan: &FileNode, signature: &FileNode) -> Vec<PathBuf> {
    scan.breadth_first()
        .filter(|node| !node.is_leaf())
        .filter(|node| matches(signature, node))
        .map(|node| node.path().to_path_buf())
        .collect()
}

/// Location of a game executable inside a scanned tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOffset {
    /// Directory relative to the scan root; empty when the root matched.
    pub offset: PathBuf,
    /// Name of the catalog signature that matched.
    pub signature: String,
    pub kind: GameKind,
}

impl ResolvedOffset {
    pub fn depth(&self) -> usize {
        self.offset.components().count()
    }

    /// Joins the offset onto the directory that was scanned.
    pub fn absolute(&self, scan_root: &Path) -> PathBuf {
        scan_root.join(&self.offset)
    }
}

/// Finds the shallowest directory in `scan` matching any catalog signature.
///
/// When `kind` is set only signatures for that kind are tried. Ties between
/// signatures go to the one listed first in the catalog.
pub fn resolve_executable_offset(
    scan: &FileNode,
    catalog: &SignatureCatalog,
    kind: Option<GameKind>,
) -> Option<ResolvedOffset> {
    let mut best: Option<ResolvedOffset> = None;

    for signature in catalog
        .iter()
        .filter(|s| kind.is_none_or(|k| s.kind() == k))
    {
        let Some(offset) = find_all(scan, signature.tree()).into_iter().next() else {
            continue;
        };
        let depth = offset.components().count();
        tracing::debug!(
            signature = signature.name(),
            offset = %offset.display(),
            depth,
            "signature matched"
        );

        if best.as_ref().is_none_or(|b| depth < b.depth()) {
            best = Some(ResolvedOffset {
                offset,
                signature: signature.name().to_string(),
                kind: signature.kind(),
            });
        }
    }

    best
}
