//! Directory preparation, file copies and preserving renames.

use std::path::Path;

use crate::{ConfinedPath, FileOpsError};

/// Ensures the directory exists, creating it and its parents if necessary.
pub fn ensure_dir(path: &ConfinedPath) -> Result<(), FileOpsError> {
    let dir = path.as_path();
    std::fs::create_dir_all(dir).map_err(|e| FileOpsError::io(dir, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| FileOpsError::io(dir, e))?;
    }

    Ok(())
}

/// Copies `source` to `destination`, creating intermediate directories.
///
/// The data is written to a `.partial` sibling first and renamed into place,
/// so an interrupted copy never leaves a truncated file under the final
/// name. Returns the number of bytes copied.
pub fn copy_file(source: &Path, destination: &ConfinedPath) -> Result<u64, FileOpsError> {
    let dest = destination.as_path();
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FileOpsError::io(parent, e))?;
    }

    let mut partial = dest.as_os_str().to_owned();
    partial.push(".partial");
    let partial = Path::new(&partial);

    let bytes = std::fs::copy(source, partial).map_err(|e| FileOpsError::io(source, e))?;
    std::fs::rename(partial, dest).map_err(|e| FileOpsError::io(dest, e))?;

    tracing::debug!(
        from = %source.display(),
        to = %dest.display(),
        bytes,
        "copied file"
    );
    Ok(bytes)
}

/// Renames `from` to `to`, refusing to overwrite anything at `to`.
pub fn rename_preserving(from: &ConfinedPath, to: &ConfinedPath) -> Result<(), FileOpsError> {
    if std::fs::symlink_metadata(to.as_path()).is_ok() {
        return Err(FileOpsError::AlreadyExists(to.as_path().to_path_buf()));
    }
    if std::fs::symlink_metadata(from.as_path()).is_err() {
        return Err(FileOpsError::NotFound(from.as_path().to_path_buf()));
    }

    std::fs::rename(from.as_path(), to.as_path()).map_err(|e| FileOpsError::io(from.as_path(), e))?;
    tracing::info!(from = %from, to = %to, "renamed");
    Ok(())
}

/// Sets a file as executable (Unix only, 755).
pub fn set_executable(path: &Path) -> Result<(), FileOpsError> {
    if !path.exists() {
        return Err(FileOpsError::NotFound(path.to_path_buf()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| FileOpsError::io(path, e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Root, Sandbox};
    use std::fs;

    fn sandbox(tmp: &tempfile::TempDir) -> Sandbox {
        fs::create_dir_all(tmp.path().join("install")).unwrap();
        fs::create_dir_all(tmp.path().join("library")).unwrap();
        Sandbox::new(&tmp.path().join("install"), &tmp.path().join("library")).unwrap()
    }

    #[test]
    fn ensure_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let sb = sandbox(&tmp);
        let dir = sb.join_root(Root::Library, "Original.TR4/data").unwrap();

        ensure_dir(&dir).unwrap();
        assert!(dir.as_path().is_dir());
        // Second call is a no-op.
        ensure_dir(&dir).unwrap();
    }

    #[test]
    fn copy_creates_parents_and_leaves_no_partial() {
        let tmp = tempfile::tempdir().unwrap();
        let sb = sandbox(&tmp);
        let source = tmp.path().join("install").join("tomb4.exe");
        fs::write(&source, b"MZ...").unwrap();

        let dest = sb.join_root(Root::Library, "Original.TR4/bin/tomb4.exe").unwrap();
        let bytes = copy_file(&source, &dest).unwrap();

        assert_eq!(bytes, 5);
        assert_eq!(fs::read(dest.as_path()).unwrap(), b"MZ...");
        assert!(!dest.as_path().with_file_name("tomb4.exe.partial").exists());
    }

    #[test]
    fn copy_missing_source_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let sb = sandbox(&tmp);
        let dest = sb.join_root(Root::Library, "x").unwrap();
        let err = copy_file(&tmp.path().join("missing"), &dest).unwrap_err();
        assert!(matches!(err, FileOpsError::Io { .. }));
    }

    #[test]
    fn rename_preserving_refuses_existing_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let sb = sandbox(&tmp);
        let from = sb.join_root(Root::Install, "Game").unwrap();
        let to = sb.join_root(Root::Install, "Game.old").unwrap();
        fs::create_dir_all(from.as_path()).unwrap();
        fs::create_dir_all(to.as_path()).unwrap();

        let err = rename_preserving(&from, &to).unwrap_err();
        assert!(matches!(err, FileOpsError::AlreadyExists(_)));
        assert!(from.as_path().exists());
    }

    #[test]
    fn rename_preserving_moves_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let sb = sandbox(&tmp);
        let from = sb.join_root(Root::Install, "Game").unwrap();
        let to = sb.join_root(Root::Install, "Game.old").unwrap();
        fs::create_dir_all(from.as_path()).unwrap();
        fs::write(from.as_path().join("tomb4.exe"), b"x").unwrap();

        rename_preserving(&from, &to).unwrap();
        assert!(!from.as_path().exists());
        assert!(to.as_path().join("tomb4.exe").exists());

        let err = rename_preserving(&from, &to).unwrap_err();
        assert!(matches!(err, FileOpsError::AlreadyExists(_)));
    }

    #[test]
    fn set_executable_nonexistent() {
        let result = set_executable(Path::new("/nonexistent/path"));
        assert!(matches!(result, Err(FileOpsError::NotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn set_executable_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::NamedTempFile::new().unwrap();
        set_executable(tmp.path()).unwrap();
        let mode = fs::metadata(tmp.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o755, 0o755);
    }
}
