//! Shared fixtures for pipeline scenarios.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use slotkeeper_file_tree::{GameKind, SignatureCatalog};
use slotkeeper_install::{
    ArchiveEntry, ArchiveError, ArchiveReader, Collaborators, DownloadRecord, FetchError,
    JsonMetadataStore, LevelId, MetadataStore, Pipeline, PipelineConfig, Transport,
    ZipArchiveReader, build_manifest,
};
use zip::write::SimpleFileOptions;

/// Serves canned bodies by URL and counts fetches.
#[derive(Default)]
pub struct FakeTransport {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    fetches: AtomicUsize,
}

impl FakeTransport {
    pub fn serve(&self, url: &str, body: Vec<u8>) {
        self.bodies.lock().unwrap().insert(url.to_string(), body);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl Transport for FakeTransport {
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let bodies = self.bodies.lock().unwrap();
        let body = bodies.get(url).ok_or(FetchError::Status(404))?;
        fs::write(destination, body).map_err(|e| FetchError::Other(e.to_string()))
    }
}

/// Wraps the zip reader, counting extractions and optionally failing on
/// one entry.
pub struct CountingArchive {
    inner: ZipArchiveReader,
    fail_on: Option<String>,
    extracted: AtomicUsize,
}

impl CountingArchive {
    pub fn new() -> Self {
        Self {
            inner: ZipArchiveReader::new(),
            fail_on: None,
            extracted: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(entry: &str) -> Self {
        Self {
            fail_on: Some(entry.to_string()),
            ..Self::new()
        }
    }

    pub fn extracted(&self) -> usize {
        self.extracted.load(Ordering::SeqCst)
    }
}

impl ArchiveReader for CountingArchive {
    fn list_entries(&self, archive: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        self.inner.list_entries(archive)
    }

    fn extract_entry(
        &self,
        archive: &Path,
        name: &str,
        destination: &Path,
    ) -> Result<u64, ArchiveError> {
        if self.fail_on.as_deref() == Some(name) {
            return Err(ArchiveError::Format("corrupt entry".into()));
        }
        self.extracted.fetch_add(1, Ordering::SeqCst);
        self.inner.extract_entry(archive, name, destination)
    }
}

/// Install and library roots in a temporary directory, with a JSON
/// metadata store next to them.
pub struct Fixture {
    _tmp: tempfile::TempDir,
    pub scratch: PathBuf,
    pub install: PathBuf,
    pub library: PathBuf,
    pub metadata: Arc<JsonMetadataStore>,
    pub transport: Arc<FakeTransport>,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let base = fs::canonicalize(tmp.path()).unwrap();
        let install = base.join("install");
        let library = base.join("library");
        let scratch = base.join("scratch");
        for dir in [&install, &library, &scratch] {
            fs::create_dir_all(dir).unwrap();
        }
        let metadata = Arc::new(JsonMetadataStore::load(&base.join("metadata.json")).unwrap());
        Self {
            _tmp: tmp,
            scratch,
            install,
            library,
            metadata,
            transport: Arc::new(FakeTransport::default()),
        }
    }

    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            install_root: self.install.clone(),
            library_root: self.library.clone(),
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline_with(SignatureCatalog::builtin(), Arc::new(ZipArchiveReader::new()))
    }

    pub fn pipeline_with(
        &self,
        catalog: SignatureCatalog,
        archive: Arc<dyn ArchiveReader>,
    ) -> Pipeline {
        let collaborators = Collaborators {
            metadata: self.metadata.clone(),
            transport: self.transport.clone(),
            archive,
        };
        Pipeline::new(&self.config(), catalog, collaborators).unwrap()
    }

    pub fn live(&self, game: GameKind) -> PathBuf {
        self.install.join(game.folder_name())
    }

    /// Creates an original TR4 installation and records its manifest.
    pub fn original_tr4(&self) -> PathBuf {
        let live = self.live(GameKind::Tr4);
        write(&live, "tomb4.exe", "MZ tomb4");
        write(&live, "data/title.tr4", "title level");
        write(&live, "audio/track01.wav", "RIFF audio");
        let manifest = build_manifest(&live).unwrap();
        assert_eq!(manifest.len(), 3);
        self.metadata.set_manifest(GameKind::Tr4, manifest).unwrap();
        live
    }

    /// Writes a zip into the scratch directory and registers it as a
    /// download whose digest matches.
    pub fn level_archive(
        &self,
        level_id: LevelId,
        kind: GameKind,
        files: &[(&str, &str)],
    ) -> PathBuf {
        let archive = self.scratch.join(format!("{level_id}.zip"));
        write_zip(&archive, files);
        let digest = slotkeeper_integrity::digest_file(&archive).unwrap();
        self.metadata
            .set_download(
                level_id,
                DownloadRecord {
                    archive_name: format!("{level_id}.zip"),
                    digest,
                    url: format!("https://levels.invalid/{level_id}.zip"),
                    kind,
                },
            )
            .unwrap();
        archive
    }

    pub fn record(&self, level_id: LevelId) -> DownloadRecord {
        self.metadata.download(level_id).unwrap()
    }
}

pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

pub fn write_zip(path: &Path, files: &[(&str, &str)]) {
    let mut zip = zip::ZipWriter::new(fs::File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    for (name, data) in files {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
    }
    zip.finish().unwrap();
}

/// A level laid out the way mod packagers nest it: the game folder one
/// level down, next to a readme.
pub const NESTED_TR4_LEVEL: &[(&str, &str)] = &[
    ("readme.txt", "have fun"),
    ("The Level/", ""),
    ("The Level/AUDIO/", ""),
    ("The Level/AUDIO/track.wav", "RIFF"),
    ("The Level/DATA/", ""),
    ("The Level/DATA/level.tr4", "level data"),
    ("The Level/tomb4.exe", "MZ level exe"),
];
