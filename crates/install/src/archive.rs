//! Zip implementation of [`ArchiveReader`].

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use zip::ZipArchive;
use zip::result::ZipError;

use crate::collaborators::{ArchiveError, ArchiveReader};
use crate::types::ArchiveEntry;

/// Reads zip archives with the `zip` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveReader;

impl ZipArchiveReader {
    pub fn new() -> Self {
        Self
    }
}

fn open(archive: &Path) -> Result<ZipArchive<BufReader<File>>, ArchiveError> {
    let file = File::open(archive).map_err(|source| ArchiveError::Io {
        path: archive.to_path_buf(),
        source,
    })?;
    ZipArchive::new(BufReader::new(file)).map_err(|e| ArchiveError::Format(e.to_string()))
}

impl ArchiveReader for ZipArchiveReader {
    fn list_entries(&self, archive: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut zip = open(archive)?;
        let mut entries = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let file = zip
                .by_index_raw(index)
                .map_err(|e| ArchiveError::Format(e.to_string()))?;
            entries.push(ArchiveEntry {
                name: file.name().to_string(),
                size: file.size(),
                is_dir: file.is_dir(),
            });
        }
        Ok(entries)
    }

    fn extract_entry(
        &self,
        archive: &Path,
        name: &str,
        destination: &Path,
    ) -> Result<u64, ArchiveError> {
        let mut zip = open(archive)?;
        let mut file = match zip.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Err(ArchiveError::EntryNotFound(name.into())),
            Err(e) => return Err(ArchiveError::Format(e.to_string())),
        };
        if file.enclosed_name().is_none() {
            return Err(ArchiveError::UnsafeEntry(name.into()));
        }

        let io_err = |source| ArchiveError::Io {
            path: destination.to_path_buf(),
            source,
        };
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut out = File::create(destination).map_err(io_err)?;
        let written = std::io::copy(&mut file, &mut out).map_err(io_err)?;

        tracing::debug!(entry = name, to = %destination.display(), bytes = written, "extracted");
        Ok(written)
    }
}
