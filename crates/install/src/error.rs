//! Pipeline error types.

use std::path::PathBuf;

use slotkeeper_file_ops::{FileOpsError, SandboxError};
use slotkeeper_file_tree::{GameKind, TreeError};
use slotkeeper_integrity::IntegrityError;

use crate::collaborators::{ArchiveError, FetchError, MetadataError};

/// Errors produced by pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("original file does not match its manifest: {}", .0.display())]
    SourceModified(PathBuf),

    #[error("checksum mismatch for {}: expected {expected}, found {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to link {} -> {}: {source}", link.display(), target.display())]
    LinkFailed {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to replace existing content at {}", .0.display())]
    TargetOccupied(PathBuf),

    #[error("failed to extract {entry} from {}: {source}", archive.display())]
    ExtractionFailed {
        archive: PathBuf,
        entry: String,
        #[source]
        source: ArchiveError,
    },

    #[error("download of {url} failed: {source}")]
    DownloadFailed {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("live path is not a plain directory: {}", .0.display())]
    NotPlainDirectory(PathBuf),

    #[error("no {kind} executable located under {}", dir.display())]
    ExecutableNotLocated { dir: PathBuf, kind: GameKind },
}

impl InstallError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn missing(path: impl Into<PathBuf>) -> Self {
        Self::io(path, std::io::ErrorKind::NotFound.into())
    }
}

impl From<FileOpsError> for InstallError {
    fn from(err: FileOpsError) -> Self {
        match err {
            FileOpsError::Sandbox(e) => InstallError::Sandbox(e),
            FileOpsError::Io { path, source } => InstallError::Io { path, source },
            FileOpsError::TargetOccupied(path) | FileOpsError::AlreadyExists(path) => {
                InstallError::TargetOccupied(path)
            }
            FileOpsError::LinkFailed {
                link,
                target,
                source,
            } => InstallError::LinkFailed {
                link,
                target,
                source,
            },
            FileOpsError::NotFound(path) => InstallError::missing(path),
        }
    }
}

impl From<IntegrityError> for InstallError {
    fn from(err: IntegrityError) -> Self {
        match err {
            IntegrityError::Io { path, source } => InstallError::Io { path, source },
        }
    }
}

impl From<TreeError> for InstallError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::NotFound(path) => InstallError::missing(path),
            TreeError::NotADirectory(path) => {
                InstallError::io(path, std::io::ErrorKind::NotADirectory.into())
            }
            TreeError::Io { path, source } => InstallError::Io { path, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_ops_errors_map_onto_install_taxonomy() {
        let occupied: InstallError = FileOpsError::AlreadyExists(PathBuf::from("/g.old")).into();
        assert!(matches!(occupied, InstallError::TargetOccupied(p) if p == PathBuf::from("/g.old")));

        let missing: InstallError = FileOpsError::NotFound(PathBuf::from("/x")).into();
        match missing {
            InstallError::Io { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn display_names_the_kind() {
        let err = InstallError::ExecutableNotLocated {
            dir: PathBuf::from("/lib/4242.TRLE"),
            kind: GameKind::Tr4,
        };
        assert_eq!(err.to_string(), "no TR4 executable located under /lib/4242.TRLE");
    }
}
