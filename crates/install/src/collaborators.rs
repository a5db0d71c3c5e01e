//! Collaborator traits the pipeline is driven through.
//!
//! The pipeline never talks to the network, an archive format or a metadata
//! database directly. Default implementations live in [`crate::archive`],
//! [`crate::transport`] and [`crate::metadata`]; tests use in-memory doubles.

use std::path::{Path, PathBuf};

use slotkeeper_file_tree::GameKind;

use crate::types::{ArchiveEntry, DownloadRecord, LaunchTarget, LevelId, ManifestEntry};

/// Read-only source of manifests and download records.
pub trait MetadataStore: Send + Sync {
    /// Files of the pristine original installation of `game`.
    fn original_manifest(&self, game: GameKind) -> Result<Vec<ManifestEntry>, MetadataError>;

    /// Download record of a level.
    fn download(&self, level_id: LevelId) -> Result<DownloadRecord, MetadataError>;

    /// Records the digest actually observed for a freshly fetched archive.
    ///
    /// The store decides whether and when to trust it.
    fn record_observed_digest(&self, level_id: LevelId, digest: &str)
    -> Result<(), MetadataError>;
}

/// Blocking fetch of a URL into a file.
pub trait Transport: Send + Sync {
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), FetchError>;
}

/// Entry-level access to an archive file.
pub trait ArchiveReader: Send + Sync {
    fn list_entries(&self, archive: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError>;

    /// Writes the entry `name` to `destination`, returning the bytes written.
    fn extract_entry(
        &self,
        archive: &Path,
        name: &str,
        destination: &Path,
    ) -> Result<u64, ArchiveError>;
}

/// Starts a prepared game.
pub trait Launcher {
    fn launch(&self, target: &LaunchTarget) -> Result<(), LaunchError>;
}

/// Errors reported by a [`MetadataStore`].
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("no manifest for {0}")]
    UnknownGame(GameKind),

    #[error("manifest for {0} is empty")]
    EmptyManifest(GameKind),

    #[error("no download record for level {0}")]
    UnknownLevel(LevelId),

    #[error("cannot access metadata at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed metadata: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors reported by a [`Transport`].
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("server answered HTTP {0}")]
    Status(u16),

    #[error("{0}")]
    Other(String),
}

/// Errors reported by an [`ArchiveReader`].
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid archive: {0}")]
    Format(String),

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("entry escapes the destination: {0}")]
    UnsafeEntry(String),
}

/// Errors reported by a [`Launcher`].
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("game exited with status {0}")]
    Exit(i32),

    #[error("game was terminated by a signal")]
    Killed,
}
