//! Idempotent removal of files, directories and links.

use crate::{ConfinedPath, FileOpsError};

/// What [`remove`] found and deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Directory,
    File,
    /// A link was removed; its target was left alone.
    Link,
    /// Nothing existed at the path.
    NotFound,
}

/// Removes whatever is at `path`.
///
/// Directories are removed recursively, files and links plainly. A link is
/// never followed. A missing path is reported as [`Removal::NotFound`]
/// rather than an error so removal can be retried freely.
pub fn remove(path: &ConfinedPath) -> Result<Removal, FileOpsError> {
    let p = path.as_path();
    let metadata = match std::fs::symlink_metadata(p) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %p.display(), "nothing to remove");
            return Ok(Removal::NotFound);
        }
        Err(e) => return Err(FileOpsError::io(p, e)),
    };

    let file_type = metadata.file_type();
    let removal = if file_type.is_symlink() {
        remove_link(p)?;
        Removal::Link
    } else if file_type.is_dir() {
        std::fs::remove_dir_all(p).map_err(|e| FileOpsError::io(p, e))?;
        Removal::Directory
    } else {
        std::fs::remove_file(p).map_err(|e| FileOpsError::io(p, e))?;
        Removal::File
    };

    tracing::info!(path = %p.display(), kind = ?removal, "removed");
    Ok(removal)
}

#[cfg(not(windows))]
pub(crate) fn remove_link(path: &std::path::Path) -> Result<(), FileOpsError> {
    std::fs::remove_file(path).map_err(|e| FileOpsError::io(path, e))
}

// Directory symlinks on Windows are removed as directories.
#[cfg(windows)]
pub(crate) fn remove_link(path: &std::path::Path) -> Result<(), FileOpsError> {
    std::fs::remove_file(path)
        .or_else(|_| std::fs::remove_dir(path))
        .map_err(|e| FileOpsError::io(path, e))
}
