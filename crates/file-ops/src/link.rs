//! Link inspection and replacement.
//!
//! Links are absolute symlinks. A link is only ever replaced by another link;
//! real content sitting where a link belongs is reported, never removed.

use std::path::{Path, PathBuf};

use crate::{ConfinedPath, FileOpsError};

/// What occupies a path, without following a final link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Missing,
    /// A link and the raw target it stores.
    Link(PathBuf),
    Directory,
    File,
}

/// Inspects `path` without following it.
pub fn inspect(path: &Path) -> Result<EntryKind, FileOpsError> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(EntryKind::Missing),
        Err(e) => return Err(FileOpsError::io(path, e)),
    };

    let file_type = metadata.file_type();
    if file_type.is_symlink() {
        let target = std::fs::read_link(path).map_err(|e| FileOpsError::io(path, e))?;
        Ok(EntryKind::Link(target))
    } else if file_type.is_dir() {
        Ok(EntryKind::Directory)
    } else {
        Ok(EntryKind::File)
    }
}

/// Result of [`relink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relink {
    /// Nothing was at the link path.
    Created,
    /// An existing link pointed elsewhere and was replaced.
    Replaced,
    /// The link already pointed at the target.
    Unchanged,
}

/// Points `link` at `target`, creating or replacing a link.
///
/// The parent directory of `link` is created if missing. Anything other
/// than a link at `link` fails with [`FileOpsError::TargetOccupied`].
pub fn relink(target: &ConfinedPath, link: &ConfinedPath) -> Result<Relink, FileOpsError> {
    let link_path = link.as_path();
    let target_path = target.as_path();

    let outcome = match inspect(link_path)? {
        EntryKind::Missing => {
            if let Some(parent) = link_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| FileOpsError::io(parent, e))?;
            }
            make_link(target_path, link_path)?;
            Relink::Created
        }
        EntryKind::Link(current) if current == target_path => Relink::Unchanged,
        EntryKind::Link(_) => {
            replace_link(target_path, link_path)?;
            Relink::Replaced
        }
        EntryKind::Directory | EntryKind::File => {
            return Err(FileOpsError::TargetOccupied(link_path.to_path_buf()));
        }
    };

    tracing::info!(
        link = %link_path.display(),
        target = %target_path.display(),
        outcome = ?outcome,
        "relinked"
    );
    Ok(outcome)
}

fn link_failed(target: &Path, link: &Path, source: std::io::Error) -> FileOpsError {
    FileOpsError::LinkFailed {
        link: link.to_path_buf(),
        target: target.to_path_buf(),
        source,
    }
}

#[cfg(unix)]
fn make_link(target: &Path, link: &Path) -> Result<(), FileOpsError> {
    std::os::unix::fs::symlink(target, link).map_err(|e| link_failed(target, link, e))
}

#[cfg(windows)]
fn make_link(target: &Path, link: &Path) -> Result<(), FileOpsError> {
    let result = if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    };
    result.map_err(|e| link_failed(target, link, e))
}

// A fresh link is renamed over the old one so the slot is never empty.
#[cfg(unix)]
fn replace_link(target: &Path, link: &Path) -> Result<(), FileOpsError> {
    let mut staging = link.as_os_str().to_owned();
    staging.push(".relink");
    let staging = PathBuf::from(staging);

    if std::fs::symlink_metadata(&staging).is_ok() {
        crate::remove::remove_link(&staging)?;
    }
    make_link(target, &staging)?;
    if let Err(e) = std::fs::rename(&staging, link) {
        let _ = std::fs::remove_file(&staging);
        return Err(link_failed(target, link, e));
    }
    Ok(())
}

// Renaming over a directory link is not supported on Windows.
#[cfg(windows)]
fn replace_link(target: &Path, link: &Path) -> Result<(), FileOpsError> {
    crate::remove::remove_link(link)?;
    make_link(target, link)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::{Root, Sandbox};
    use std::fs;

    fn setup() -> (tempfile::TempDir, Sandbox) {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("install")).unwrap();
        fs::create_dir_all(tmp.path().join("library")).unwrap();
        let sb = Sandbox::new(&tmp.path().join("install"), &tmp.path().join("library")).unwrap();
        (tmp, sb)
    }

    fn dir(sb: &Sandbox, root: Root, rel: &str) -> ConfinedPath {
        let p = sb.join_root(root, rel).unwrap();
        fs::create_dir_all(p.as_path()).unwrap();
        p
    }

    #[test]
    fn inspect_reports_each_kind() {
        let (tmp, _sb) = setup();
        let base = tmp.path();
        fs::write(base.join("file"), b"x").unwrap();
        std::os::unix::fs::symlink(base.join("file"), base.join("link")).unwrap();

        assert_eq!(inspect(&base.join("missing")).unwrap(), EntryKind::Missing);
        assert_eq!(inspect(&base.join("file")).unwrap(), EntryKind::File);
        assert_eq!(inspect(base).unwrap(), EntryKind::Directory);
        assert_eq!(
            inspect(&base.join("link")).unwrap(),
            EntryKind::Link(base.join("file"))
        );
    }

    #[test]
    fn creates_then_reports_unchanged() {
        let (_tmp, sb) = setup();
        let target = dir(&sb, Root::Library, "Original.TR4");
        let link = sb
            .join_root(Root::Install, "Tomb Raider (IV) The Last Revelation")
            .unwrap();

        assert_eq!(relink(&target, &link).unwrap(), Relink::Created);
        assert_eq!(fs::read_link(link.as_path()).unwrap(), target.as_path());
        assert_eq!(relink(&target, &link).unwrap(), Relink::Unchanged);
    }

    #[test]
    fn replaces_existing_link() {
        let (_tmp, sb) = setup();
        let original = dir(&sb, Root::Library, "Original.TR4");
        let level = dir(&sb, Root::Library, "4242.TRLE");
        let link = sb.join_root(Root::Install, "Game").unwrap();

        relink(&original, &link).unwrap();
        assert_eq!(relink(&level, &link).unwrap(), Relink::Replaced);
        assert_eq!(fs::read_link(link.as_path()).unwrap(), level.as_path());
        assert!(fs::symlink_metadata(link.as_path().with_file_name("Game.relink")).is_err());
    }

    #[test]
    fn refuses_to_replace_real_content() {
        let (_tmp, sb) = setup();
        let target = dir(&sb, Root::Library, "Original.TR4");
        let occupied = dir(&sb, Root::Install, "Game");
        fs::write(occupied.as_path().join("tomb4.exe"), b"x").unwrap();

        let err = relink(&target, &occupied).unwrap_err();
        assert!(matches!(err, FileOpsError::TargetOccupied(_)));
        assert!(occupied.as_path().join("tomb4.exe").exists());
    }

    #[test]
    fn creates_missing_parent_directories() {
        let (_tmp, sb) = setup();
        let target = dir(&sb, Root::Library, "4242.TRLE/Mod");
        let link = sb.join_root(Root::Library, "nested/dir/link").unwrap();

        assert_eq!(relink(&target, &link).unwrap(), Relink::Created);
        assert!(link.as_path().is_dir());
    }
}
