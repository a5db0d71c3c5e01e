//! The installation pipeline: backup, extraction and link swapping.
//!
//! Every step inspects the on-disk state before acting, so a call that was
//! interrupted (crash, I/O error) can simply be repeated. Between calls a
//! game's live path is either absent, a plain directory, or a link into the
//! library.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use slotkeeper_file_ops::{
    self as file_ops, ConfinedPath, EntryKind, Removal, Root, Sandbox, copy_file, ensure_dir,
    inspect, rename_preserving, set_executable, validate_relative_path,
};
use slotkeeper_file_tree::{
    FileNode, GameKind, ResolvedOffset, SignatureCatalog, names_equal, resolve_executable_offset,
};
use slotkeeper_integrity::{IntegrityError, digest_file, digests_equal, verify_file};
use tracing::{debug, info, warn};

use crate::collaborators::{ArchiveReader, MetadataStore, Transport};
use crate::error::InstallError;
use crate::progress::{PercentTicker, ProgressCallback};
use crate::types::{
    InstallOutcome, LaunchTarget, LevelId, ManifestEntry, MaterializeReport, PipelineConfig,
    Slot, SlotRef, SlotState,
};

/// The collaborators a [`Pipeline`] is driven through.
#[derive(Clone)]
pub struct Collaborators {
    pub metadata: Arc<dyn MetadataStore>,
    pub transport: Arc<dyn Transport>,
    pub archive: Arc<dyn ArchiveReader>,
}

/// Installation pipeline over one install root and one library root.
pub struct Pipeline {
    sandbox: Sandbox,
    catalog: SignatureCatalog,
    metadata: Arc<dyn MetadataStore>,
    transport: Arc<dyn Transport>,
    archive: Arc<dyn ArchiveReader>,
}

impl Pipeline {
    /// Creates a pipeline. Both configured roots must exist.
    pub fn new(
        config: &PipelineConfig,
        catalog: SignatureCatalog,
        collaborators: Collaborators,
    ) -> Result<Self, InstallError> {
        let sandbox = Sandbox::new(&config.install_root, &config.library_root)?;
        debug!(
            install = %sandbox.root(Root::Install).display(),
            library = %sandbox.root(Root::Library).display(),
            signatures = catalog.len(),
            "pipeline ready"
        );
        Ok(Self {
            sandbox,
            catalog,
            metadata: collaborators.metadata,
            transport: collaborators.transport,
            archive: collaborators.archive,
        })
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn catalog(&self) -> &SignatureCatalog {
        &self.catalog
    }

    /// `<install>/<folder name>`.
    pub fn live_path(&self, game: GameKind) -> Result<ConfinedPath, InstallError> {
        Ok(self.sandbox.join_root(Root::Install, game.folder_name())?)
    }

    /// `<install>/<folder name>.old`.
    pub fn backup_path(&self, game: GameKind) -> Result<ConfinedPath, InstallError> {
        let name = format!("{}.old", game.folder_name());
        Ok(self.sandbox.join_root(Root::Install, &name)?)
    }

    /// `<library>/Original.<code>`.
    pub fn quarantine_path(&self, game: GameKind) -> Result<ConfinedPath, InstallError> {
        let name = format!("Original.{}", game.code());
        Ok(self.sandbox.join_root(Root::Library, &name)?)
    }

    /// `<library>/<level id>.TRLE`.
    pub fn level_root(&self, level_id: LevelId) -> Result<ConfinedPath, InstallError> {
        Ok(self
            .sandbox
            .join_root(Root::Library, &format!("{level_id}.TRLE"))?)
    }

    /// Resolves a user-typed slot, looking the level's kind up in metadata.
    pub fn slot(&self, slot: SlotRef) -> Result<Slot, InstallError> {
        match slot {
            SlotRef::Original(game) => Ok(Slot::Original(game)),
            SlotRef::Level(id) => {
                let record = self.metadata.download(id)?;
                Ok(Slot::Level {
                    id,
                    kind: record.kind,
                })
            }
        }
    }

    /// Reports what sits at the live path of `game`, without following it.
    pub fn slot_state(&self, game: GameKind) -> Result<SlotState, InstallError> {
        let live = self.live_path(game)?;
        Ok(match inspect(live.as_path())? {
            EntryKind::Missing => SlotState::Absent,
            EntryKind::Directory => SlotState::Installed,
            EntryKind::Link(target) => SlotState::Linked(target),
            EntryKind::File => SlotState::Occupied,
        })
    }

    /// Scans `dir` and finds the executable offset inside it.
    pub fn resolve(
        &self,
        dir: &Path,
        kind: Option<GameKind>,
    ) -> Result<Option<ResolvedOffset>, InstallError> {
        let scan = FileNode::scan(dir)?;
        Ok(resolve_executable_offset(&scan, &self.catalog, kind))
    }

    /// Backs up the original installation of `game` and links it back.
    ///
    /// Every manifest file is verified and copied into the quarantine
    /// directory. The live directory is then renamed to `<name>.old` and
    /// replaced by a link to the quarantine. A verification failure
    /// discards the quarantine and leaves the live directory untouched.
    pub fn materialize_original(&self, game: GameKind) -> Result<MaterializeReport, InstallError> {
        let live = self.live_path(game)?;
        let backup = self.backup_path(game)?;
        let quarantine = self.quarantine_path(game)?;
        let manifest = self.metadata.original_manifest(game)?;

        let (source, renamed) = match inspect(live.as_path())? {
            EntryKind::Directory => {
                if inspect(backup.as_path())? != EntryKind::Missing {
                    return Err(InstallError::TargetOccupied(backup.into_path_buf()));
                }
                (live.clone(), false)
            }
            // Only a link to a verified quarantine counts as done; any other
            // link is an active slot and stays untouched.
            EntryKind::Link(target) => {
                if target != quarantine.as_path()
                    || !self.quarantine_verified(&quarantine, &manifest)?
                {
                    return Err(InstallError::NotPlainDirectory(live.into_path_buf()));
                }
                info!(game = %game, "original already materialized");
                return Ok(MaterializeReport {
                    quarantine: quarantine.into_path_buf(),
                    backup: backup.into_path_buf(),
                    copied: 0,
                    skipped: manifest.len(),
                });
            }
            // Interrupted between rename and link.
            EntryKind::Missing if inspect(backup.as_path())? == EntryKind::Directory => {
                info!(game = %game, backup = %backup, "resuming interrupted backup");
                (backup.clone(), true)
            }
            EntryKind::Missing | EntryKind::File => {
                return Err(InstallError::NotPlainDirectory(live.into_path_buf()));
            }
        };

        ensure_dir(&quarantine)?;
        let mut copied = 0;
        let mut skipped = 0;
        for entry in &manifest {
            let src = self.sandbox.join(&source, &entry.relative_path)?;
            let dst = self.sandbox.join(&quarantine, &entry.relative_path)?;

            if !source_intact(src.as_path(), &entry.digest)? {
                warn!(game = %game, path = %src, "original file modified, discarding backup");
                file_ops::remove(&quarantine)?;
                return Err(InstallError::SourceModified(src.into_path_buf()));
            }

            if dst.as_path().is_file() && verify_file(dst.as_path(), &entry.digest)? {
                debug!(path = %dst, "already backed up");
                skipped += 1;
                continue;
            }
            copy_file(src.as_path(), &dst)?;
            copied += 1;
        }
        info!(game = %game, copied, skipped, to = %quarantine, "original verified and copied");

        if !renamed {
            rename_preserving(&live, &backup)?;
        }
        file_ops::relink(&quarantine, &live)?;
        info!(game = %game, live = %live, "live path now links to backup");

        Ok(MaterializeReport {
            quarantine: quarantine.into_path_buf(),
            backup: backup.into_path_buf(),
            copied,
            skipped,
        })
    }

    /// Verifies, extracts and resolves a downloaded archive.
    ///
    /// The archive must match the digest recorded for `level_id`; nothing
    /// is extracted otherwise. Entries already present with the right size
    /// are skipped. Progress covers `0..=100` across the entries.
    pub fn install_downloaded(
        &self,
        level_id: LevelId,
        archive: &Path,
        kind: GameKind,
        progress: ProgressCallback<'_>,
    ) -> Result<InstallOutcome, InstallError> {
        let record = self.metadata.download(level_id)?;
        let actual = digest_file(archive)?;
        if !digests_equal(&actual, &record.digest) {
            return Err(InstallError::ChecksumMismatch {
                path: archive.to_path_buf(),
                expected: record.digest.trim().to_string(),
                actual,
            });
        }
        self.extract_level(level_id, archive, kind, progress)
    }

    /// Downloads the archive of `level_id` if needed, then installs it.
    ///
    /// An archive already in the library with the right digest is reused.
    /// A fresh download with a different digest is reported to the
    /// metadata store and rejected.
    pub fn fetch_and_install(
        &self,
        level_id: LevelId,
        progress: ProgressCallback<'_>,
    ) -> Result<InstallOutcome, InstallError> {
        let record = self.metadata.download(level_id)?;
        let archive = self.sandbox.join_root(Root::Library, &record.archive_name)?;

        let cached =
            archive.as_path().is_file() && verify_file(archive.as_path(), &record.digest)?;
        if cached {
            info!(level_id, archive = %archive, "archive already downloaded");
        } else {
            info!(level_id, url = %record.url, "downloading archive");
            self.transport
                .fetch(&record.url, archive.as_path())
                .map_err(|source| InstallError::DownloadFailed {
                    url: record.url.clone(),
                    source,
                })?;

            let actual = digest_file(archive.as_path())?;
            if !digests_equal(&actual, &record.digest) {
                warn!(level_id, expected = %record.digest, actual = %actual, "downloaded archive digest differs");
                self.metadata.record_observed_digest(level_id, &actual)?;
                return Err(InstallError::ChecksumMismatch {
                    path: archive.into_path_buf(),
                    expected: record.digest.trim().to_string(),
                    actual,
                });
            }
        }

        self.extract_level(level_id, archive.as_path(), record.kind, progress)
    }

    /// Removes whatever is at `path` below `root`. A relative `path` is
    /// taken relative to the root.
    pub fn remove(&self, root: Root, path: &Path) -> Result<Removal, InstallError> {
        let confined = self.sandbox.confine(root, &self.absolute(root, path))?;
        Ok(file_ops::remove(&confined)?)
    }

    /// Points the link `to` at `from`, both below `root`.
    pub fn relink(
        &self,
        root: Root,
        from: &Path,
        to: &Path,
    ) -> Result<file_ops::Relink, InstallError> {
        let target = self
            .sandbox
            .confine_link_target(root, &self.absolute(root, from))?;
        let link = self.sandbox.confine(root, &self.absolute(root, to))?;
        Ok(file_ops::relink(&target, &link)?)
    }

    /// Links the live path of the slot's game to the slot's content.
    ///
    /// A plain directory at the live path is refused; back it up with
    /// [`materialize_original`](Self::materialize_original) first. Returns
    /// the link target.
    pub fn activate(&self, slot: &Slot) -> Result<PathBuf, InstallError> {
        let live = self.live_path(slot.kind())?;
        if matches!(
            inspect(live.as_path())?,
            EntryKind::Directory | EntryKind::File
        ) {
            return Err(InstallError::TargetOccupied(live.into_path_buf()));
        }

        let target = self.slot_target(slot)?;
        let outcome = file_ops::relink(&target, &live)?;
        info!(slot = %slot, target = %target, outcome = ?outcome, "slot activated");
        Ok(target.into_path_buf())
    }

    /// Makes the slot live and locates its executable.
    ///
    /// An original that was never backed up runs in place. The executable
    /// is marked runnable before it is returned.
    pub fn prepare_launch(&self, slot: &Slot) -> Result<LaunchTarget, InstallError> {
        let game = slot.kind();
        let live = self.live_path(game)?;
        match (slot, inspect(live.as_path())?) {
            (Slot::Original(_), EntryKind::Directory) => {}
            (_, EntryKind::Directory | EntryKind::File) => {
                return Err(InstallError::TargetOccupied(live.into_path_buf()));
            }
            (_, EntryKind::Missing | EntryKind::Link(_)) => {
                self.activate(slot)?;
            }
        }

        let Some(executable) = find_executable(live.as_path(), game)? else {
            return Err(InstallError::ExecutableNotLocated {
                dir: live.into_path_buf(),
                kind: game,
            });
        };
        set_executable(&executable)?;
        debug!(slot = %slot, exe = %executable.display(), "launch prepared");

        Ok(LaunchTarget {
            working_dir: live.into_path_buf(),
            executable,
        })
    }

    fn absolute(&self, root: Root, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.sandbox.root(root).join(path)
        }
    }

    /// Directory a slot's live link should point at.
    fn slot_target(&self, slot: &Slot) -> Result<ConfinedPath, InstallError> {
        match slot {
            Slot::Original(game) => {
                let quarantine = self.quarantine_path(*game)?;
                if inspect(quarantine.as_path())? != EntryKind::Directory {
                    return Err(InstallError::missing(quarantine.into_path_buf()));
                }
                Ok(self
                    .sandbox
                    .confine_link_target(Root::Library, quarantine.as_path())?)
            }
            Slot::Level { id, kind } => {
                let root = self.level_root(*id)?;
                let Some(offset) = self.resolve(root.as_path(), Some(*kind))? else {
                    return Err(InstallError::ExecutableNotLocated {
                        dir: root.into_path_buf(),
                        kind: *kind,
                    });
                };
                Ok(self
                    .sandbox
                    .confine_link_target(Root::Library, &offset.absolute(root.as_path()))?)
            }
        }
    }

    fn quarantine_verified(
        &self,
        quarantine: &ConfinedPath,
        manifest: &[ManifestEntry],
    ) -> Result<bool, InstallError> {
        if inspect(quarantine.as_path())? != EntryKind::Directory {
            return Ok(false);
        }
        for entry in manifest {
            let path = self.sandbox.join(quarantine, &entry.relative_path)?;
            if !path.as_path().is_file() || !verify_file(path.as_path(), &entry.digest)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn extract_level(
        &self,
        level_id: LevelId,
        archive: &Path,
        kind: GameKind,
        progress: ProgressCallback<'_>,
    ) -> Result<InstallOutcome, InstallError> {
        let failed = |entry: &str, source| InstallError::ExtractionFailed {
            archive: archive.to_path_buf(),
            entry: entry.to_string(),
            source,
        };

        let entries = self
            .archive
            .list_entries(archive)
            .map_err(|e| failed("", e))?;
        // Refuse the whole archive before writing anything if one name escapes.
        for entry in entries.iter().filter(|e| !e.is_dir) {
            validate_relative_path(&entry.name)?;
        }

        let root = self.level_root(level_id)?;
        ensure_dir(&root)?;

        let mut ticker = PercentTicker::new(0, 100, entries.len());
        let mut extracted = 0;
        let mut resumed = 0;
        for (index, entry) in entries.iter().enumerate() {
            if !entry.is_dir {
                let dest = self.sandbox.join(&root, &entry.name)?;
                if already_extracted(dest.as_path(), entry.size) {
                    debug!(entry = %entry.name, "already extracted");
                    resumed += 1;
                } else {
                    if let Some(parent) = dest.as_path().parent() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| InstallError::io(parent, e))?;
                    }
                    self.archive
                        .extract_entry(archive, &entry.name, dest.as_path())
                        .map_err(|e| failed(&entry.name, e))?;
                    extracted += 1;
                }
            }
            ticker.advance(index + 1, &mut *progress);
        }
        ticker.finish(&mut *progress);
        info!(level_id, extracted, resumed, to = %root, "archive extracted");

        let Some(offset) = self.resolve(root.as_path(), Some(kind))? else {
            warn!(level_id, kind = %kind, root = %root, "executable not located");
            return Ok(InstallOutcome::ExecutableNotLocated {
                root: root.into_path_buf(),
            });
        };
        info!(
            level_id,
            offset = %offset.offset.display(),
            signature = %offset.signature,
            "executable offset resolved"
        );
        self.link_executable(&root, &offset, kind)?;

        Ok(InstallOutcome::Installed {
            root: root.into_path_buf(),
            offset,
        })
    }

    /// Links `<root>/<exe>` to the executable inside the resolved offset.
    fn link_executable(
        &self,
        root: &ConfinedPath,
        offset: &ResolvedOffset,
        kind: GameKind,
    ) -> Result<(), InstallError> {
        if offset.offset.as_os_str().is_empty() {
            return Ok(());
        }
        let Some(executable) = find_executable(&offset.absolute(root.as_path()), kind)? else {
            debug!(offset = %offset.offset.display(), "no executable in offset, not linking");
            return Ok(());
        };

        let link = self.sandbox.join(root, kind.executable_name())?;
        if matches!(
            inspect(link.as_path())?,
            EntryKind::Directory | EntryKind::File
        ) {
            debug!(link = %link, "executable already present at extraction root");
            return Ok(());
        }
        let target = self
            .sandbox
            .confine_link_target(Root::Library, &executable)?;
        file_ops::relink(&target, &link)?;
        Ok(())
    }
}

/// Checks a source file against its manifest digest. A missing file counts
/// as modified.
fn source_intact(path: &Path, digest: &str) -> Result<bool, InstallError> {
    match verify_file(path, digest) {
        Ok(intact) => Ok(intact),
        Err(IntegrityError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn already_extracted(dest: &Path, size: u64) -> bool {
    std::fs::symlink_metadata(dest)
        .map(|m| m.is_file() && m.len() == size)
        .unwrap_or(false)
}

/// Finds the executable of `kind` directly inside `dir`, ignoring case.
fn find_executable(dir: &Path, kind: GameKind) -> Result<Option<PathBuf>, InstallError> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| InstallError::io(dir, e))?;
    let mut candidates = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| InstallError::io(dir, e))?;
        let name = entry.file_name();
        if names_equal(&name.to_string_lossy(), kind.executable_name()) && entry.path().is_file()
        {
            candidates.push(entry.path());
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// Files the game or its launcher rewrites during play: numbered
/// savegames, DXVK shader caches and Steam's install script.
pub fn is_volatile_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    let savegame = lower
        .strip_prefix("savegame.")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
    savegame || name.ends_with(".dxvk-cache") || name == "installscript.vdf"
}

/// Builds a manifest of every file below `dir`, for recording a pristine
/// installation. Volatile files (see [`is_volatile_file`]) are left out.
pub fn build_manifest(dir: &Path) -> Result<Vec<ManifestEntry>, InstallError> {
    let scan = FileNode::scan(dir)?;
    let mut entries = Vec::new();
    for node in scan.breadth_first().filter(|n| n.is_leaf() && !n.is_root()) {
        let path = dir.join(node.path());
        if !path.is_file() {
            continue;
        }
        if is_volatile_file(node.name()) {
            debug!(path = %path.display(), "skipping volatile file");
            continue;
        }
        let relative_path = node
            .path()
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push(ManifestEntry {
            relative_path,
            digest: digest_file(&path)?,
        });
    }
    debug!(dir = %dir.display(), files = entries.len(), "manifest built");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn find_executable_ignores_case() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("TOMB4.EXE"), b"MZ").unwrap();
        fs::create_dir(tmp.path().join("tomb3.exe")).unwrap();

        let found = find_executable(tmp.path(), GameKind::Tr4).unwrap();
        assert_eq!(found, Some(tmp.path().join("TOMB4.EXE")));
        // A directory with the right name is not an executable.
        assert_eq!(find_executable(tmp.path(), GameKind::Tr3).unwrap(), None);
    }

    #[test]
    fn missing_source_counts_as_modified() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!source_intact(&tmp.path().join("gone"), "00").unwrap());
    }

    #[test]
    fn already_extracted_compares_size() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("level.tr4");
        fs::write(&path, b"12345").unwrap();
        assert!(already_extracted(&path, 5));
        assert!(!already_extracted(&path, 6));
        assert!(!already_extracted(&tmp.path().join("missing"), 0));
    }

    #[test]
    fn manifest_lists_files_with_forward_slashes() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("data")).unwrap();
        fs::create_dir_all(tmp.path().join("empty")).unwrap();
        fs::write(tmp.path().join("tomb4.exe"), b"MZ").unwrap();
        fs::write(tmp.path().join("data/title.tr4"), b"title").unwrap();

        let manifest = build_manifest(tmp.path()).unwrap();
        let paths: Vec<_> = manifest.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["tomb4.exe", "data/title.tr4"]);
        assert_eq!(manifest[0].digest, slotkeeper_integrity::digest_bytes(b"MZ"));
    }

    #[test]
    fn volatile_files_are_recognised() {
        assert!(is_volatile_file("savegame.0"));
        assert!(is_volatile_file("SAVEGAME.12"));
        assert!(is_volatile_file("tomb4.dxvk-cache"));
        assert!(is_volatile_file("installscript.vdf"));
        assert!(!is_volatile_file("savegame."));
        assert!(!is_volatile_file("savegame.bak"));
        assert!(!is_volatile_file("savegame.0.txt"));
        assert!(!is_volatile_file("title.tr4"));
    }

    #[test]
    fn manifest_skips_savegames_and_caches() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("data")).unwrap();
        fs::write(tmp.path().join("tomb4.exe"), b"MZ").unwrap();
        fs::write(tmp.path().join("savegame.0"), b"slot 0").unwrap();
        fs::write(tmp.path().join("tomb4.dxvk-cache"), b"cache").unwrap();
        fs::write(tmp.path().join("installscript.vdf"), b"vdf").unwrap();
        fs::write(tmp.path().join("data/title.tr4"), b"title").unwrap();

        let manifest = build_manifest(tmp.path()).unwrap();
        let paths: Vec<_> = manifest.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["tomb4.exe", "data/title.tr4"]);
    }
}
