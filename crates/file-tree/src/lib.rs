//! Directory trees and structural matching of game layouts.
//!
//! A [`FileNode`] tree is built either from a short literal list of names
//! (a *signature*) or from a breadth-first walk of a real directory (a
//! *scan*). [`matches`] tests whether a signature is contained in a subject
//! node, and [`resolve_executable_offset`] searches a scan for the
//! shallowest subdirectory that satisfies any signature of a
//! [`SignatureCatalog`].

mod catalog;
mod kind;
mod matcher;
mod tree;

use std::path::PathBuf;

pub use catalog::{Signature, SignatureCatalog};
pub use kind::{GameKind, ParseGameKindError};
pub use matcher::{ResolvedOffset, find_all, matches, resolve_executable_offset};
pub use tree::{BreadthFirst, FileNode, names_equal};

/// Errors produced while building a tree from the filesystem.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
