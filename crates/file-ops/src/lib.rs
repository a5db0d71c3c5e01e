//! Sandboxed file operations for game installation slots.
//!
//! Provides path confinement, directory management, checksum-free copying,
//! link creation and replacement, and idempotent removal. Every mutating
//! function takes a [`ConfinedPath`] obtained from a [`Sandbox`].

mod copy;
mod link;
mod remove;
mod sandbox;

use std::path::PathBuf;

pub use copy::{copy_file, ensure_dir, rename_preserving, set_executable};
pub use link::{EntryKind, Relink, inspect, relink};
pub use remove::{Removal, remove};
pub use sandbox::{ConfinedPath, Root, Sandbox, validate_relative_path};

/// Errors produced while confining a path.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("path is not absolute: {}", .0.display())]
    NotAbsolute(PathBuf),

    #[error("path escapes the {root} root: {}", path.display())]
    OutsideSandbox { root: Root, path: PathBuf },

    #[error("refusing to operate on the {root} root itself")]
    IsRoot { root: Root },

    #[error("parent directory traversal not allowed: {}", .0.display())]
    Traversal(PathBuf),

    #[error("invalid relative path: {0}")]
    InvalidRelative(String),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to resolve {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors produced by file operations.
#[derive(Debug, thiserror::Error)]
pub enum FileOpsError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to replace non-link content at {}", .0.display())]
    TargetOccupied(PathBuf),

    #[error("failed to link {} -> {}: {source}", link.display(), target.display())]
    LinkFailed {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),
}

impl FileOpsError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        FileOpsError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Returns the user's home directory.
pub fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

/// Expands a `~` prefix to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        home_dir().join(rest)
    } else if path == "~" {
        home_dir()
    } else {
        PathBuf::from(path)
    }
}
