//! JSON-file implementation of [`MetadataStore`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use slotkeeper_file_tree::GameKind;

use crate::collaborators::{MetadataError, MetadataStore};
use crate::types::{DownloadRecord, LevelId, ManifestEntry};

/// On-disk document read by [`JsonMetadataStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    /// Manifest of each game's pristine installation.
    #[serde(default)]
    pub originals: BTreeMap<GameKind, Vec<ManifestEntry>>,
    #[serde(default)]
    pub downloads: BTreeMap<LevelId, DownloadRecord>,
    /// Digests seen on fetched archives that did not match `downloads`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub observed: BTreeMap<LevelId, String>,
}

/// Metadata kept in a single JSON file.
///
/// The document is read once at load time; changes are written back to the
/// same path.
#[derive(Debug)]
pub struct JsonMetadataStore {
    path: PathBuf,
    document: Mutex<MetadataDocument>,
}

impl JsonMetadataStore {
    /// Loads the document at `path`. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let document = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no metadata file, starting empty");
                MetadataDocument::default()
            }
            Err(source) => {
                return Err(MetadataError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Ok(Self::with_document(path, document))
    }

    /// Wraps an in-memory document that will be saved to `path`.
    pub fn with_document(path: &Path, document: MetadataDocument) -> Self {
        Self {
            path: path.to_path_buf(),
            document: Mutex::new(document),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns a copy of the current document.
    pub fn document(&self) -> MetadataDocument {
        self.lock().clone()
    }

    /// Digest last observed for a level's archive, if any.
    pub fn observed_digest(&self, level_id: LevelId) -> Option<String> {
        self.lock().observed.get(&level_id).cloned()
    }

    /// Replaces the manifest of `game` and saves the document.
    pub fn set_manifest(
        &self,
        game: GameKind,
        entries: Vec<ManifestEntry>,
    ) -> Result<(), MetadataError> {
        let mut doc = self.lock();
        doc.originals.insert(game, entries);
        self.write(&doc)
    }

    /// Adds or replaces a download record and saves the document.
    pub fn set_download(
        &self,
        level_id: LevelId,
        record: DownloadRecord,
    ) -> Result<(), MetadataError> {
        let mut doc = self.lock();
        doc.downloads.insert(level_id, record);
        self.write(&doc)
    }

    fn lock(&self) -> MutexGuard<'_, MetadataDocument> {
        self.document.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Written to a sibling file and renamed so readers never see a torn
    // document.
    fn write(&self, doc: &MetadataDocument) -> Result<(), MetadataError> {
        let io_err = |source| MetadataError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(doc)?;
        let mut staging = self.path.as_os_str().to_owned();
        staging.push(".tmp");
        std::fs::write(&staging, json).map_err(io_err)?;
        std::fs::rename(&staging, &self.path).map_err(io_err)?;

        tracing::debug!(path = %self.path.display(), "metadata saved");
        Ok(())
    }
}

impl MetadataStore for JsonMetadataStore {
    fn original_manifest(&self, game: GameKind) -> Result<Vec<ManifestEntry>, MetadataError> {
        match self.lock().originals.get(&game) {
            None => Err(MetadataError::UnknownGame(game)),
            Some(entries) if entries.is_empty() => Err(MetadataError::EmptyManifest(game)),
            Some(entries) => Ok(entries.clone()),
        }
    }

    fn download(&self, level_id: LevelId) -> Result<DownloadRecord, MetadataError> {
        self.lock()
            .downloads
            .get(&level_id)
            .cloned()
            .ok_or(MetadataError::UnknownLevel(level_id))
    }

    fn record_observed_digest(
        &self,
        level_id: LevelId,
        digest: &str,
    ) -> Result<(), MetadataError> {
        let mut doc = self.lock();
        doc.observed.insert(level_id, digest.trim().to_ascii_lowercase());
        tracing::info!(level_id, digest, "recorded observed archive digest");
        self.write(&doc)
    }
}
