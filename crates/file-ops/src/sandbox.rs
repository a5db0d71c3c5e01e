//! Path confinement to the two configured roots.
//!
//! Every destructive operation in this crate takes a [`ConfinedPath`], and a
//! `ConfinedPath` can only be obtained from a [`Sandbox`]. The final segment
//! of a confined path is never followed, so a link sitting in a slot can be
//! replaced or removed without resolving where it points.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::SandboxError;

/// One of the two roots all file operations are confined to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Root {
    /// Live game installations (`<install>/<game>`).
    Install,
    /// Downloaded archives, extracted levels and original backups.
    Library,
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Root::Install => write!(f, "install"),
            Root::Library => write!(f, "library"),
        }
    }
}

/// An absolute path known to lie strictly below one sandbox root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfinedPath {
    root: Root,
    path: PathBuf,
}

impl ConfinedPath {
    pub fn root(&self) -> Root {
        self.root
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }
}

impl AsRef<Path> for ConfinedPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ConfinedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.path.display().fmt(f)
    }
}

/// Confines paths to an install root and a library root.
#[derive(Debug, Clone)]
pub struct Sandbox {
    install_root: PathBuf,
    library_root: PathBuf,
}

impl Sandbox {
    /// Creates a sandbox over two existing directories.
    ///
    /// Both roots are canonicalized so later comparisons are immune to
    /// links in their ancestry.
    pub fn new(install_root: &Path, library_root: &Path) -> Result<Self, SandboxError> {
        Ok(Self {
            install_root: canonical_root(install_root)?,
            library_root: canonical_root(library_root)?,
        })
    }

    /// Canonical path of `root`.
    pub fn root(&self, root: Root) -> &Path {
        match root {
            Root::Install => &self.install_root,
            Root::Library => &self.library_root,
        }
    }

    /// Confines `path` to `root` without following its final segment.
    ///
    /// The deepest existing ancestor is canonicalized and the missing
    /// remainder appended, so paths that do not exist yet can be confined.
    /// The root itself is rejected.
    pub fn confine(&self, root: Root, path: &Path) -> Result<ConfinedPath, SandboxError> {
        let located = locate(path)?;
        self.check_inside(root, located)
    }

    /// Confines a link target, following links all the way.
    ///
    /// The target must exist.
    pub fn confine_link_target(
        &self,
        root: Root,
        path: &Path,
    ) -> Result<ConfinedPath, SandboxError> {
        if !path.is_absolute() {
            return Err(SandboxError::NotAbsolute(path.to_path_buf()));
        }
        let resolved = std::fs::canonicalize(path).map_err(|source| SandboxError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.check_inside(root, resolved)
    }

    /// Confines `relative` joined onto the root directory.
    pub fn join_root(&self, root: Root, relative: &str) -> Result<ConfinedPath, SandboxError> {
        let relative = validate_relative_path(relative)?;
        self.confine(root, &self.root(root).join(relative))
    }

    /// Confines `relative` joined onto an already confined base.
    ///
    /// The join is confined again rather than trusted, since a directory
    /// below `base` may itself be a link.
    pub fn join(&self, base: &ConfinedPath, relative: &str) -> Result<ConfinedPath, SandboxError> {
        let relative = validate_relative_path(relative)?;
        self.confine(base.root, &base.path.join(relative))
    }

    fn check_inside(&self, root: Root, located: PathBuf) -> Result<ConfinedPath, SandboxError> {
        let root_path = self.root(root);
        if located == root_path {
            return Err(SandboxError::IsRoot { root });
        }
        if !located.starts_with(root_path) {
            tracing::warn!(%root, path = %located.display(), "path rejected by sandbox");
            return Err(SandboxError::OutsideSandbox {
                root,
                path: located,
            });
        }
        Ok(ConfinedPath {
            root,
            path: located,
        })
    }
}

/// Validates that a relative path does not escape the directory it is
/// joined onto.
///
/// Rejects empty paths, absolute paths, `..` and platform prefixes.
pub fn validate_relative_path(relative: &str) -> Result<&Path, SandboxError> {
    if relative.is_empty() {
        return Err(SandboxError::InvalidRelative("empty path".into()));
    }

    let path = Path::new(relative);
    if path.is_absolute() {
        return Err(SandboxError::InvalidRelative(format!(
            "absolute path not allowed: {relative}"
        )));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(SandboxError::InvalidRelative(format!(
                    "parent directory traversal not allowed: {relative}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(SandboxError::InvalidRelative(format!(
                    "absolute path not allowed: {relative}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(path)
}

fn canonical_root(root: &Path) -> Result<PathBuf, SandboxError> {
    if !root.is_absolute() {
        return Err(SandboxError::NotAbsolute(root.to_path_buf()));
    }
    let canonical = std::fs::canonicalize(root).map_err(|source| SandboxError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    if !canonical.is_dir() {
        return Err(SandboxError::NotADirectory(canonical));
    }
    Ok(canonical)
}

/// Canonical location of `path` with its final segment left unresolved.
fn locate(path: &Path) -> Result<PathBuf, SandboxError> {
    if !path.is_absolute() {
        return Err(SandboxError::NotAbsolute(path.to_path_buf()));
    }
    let (Some(mut existing), Some(name)) = (path.parent(), path.file_name()) else {
        // `/` or a path ending in `..`.
        return Err(SandboxError::Traversal(path.to_path_buf()));
    };

    let mut missing = Vec::new();
    loop {
        match std::fs::canonicalize(existing) {
            Ok(mut located) => {
                located.extend(missing.iter().rev());
                located.push(name);
                return Ok(located);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let (Some(parent), Some(segment)) = (existing.parent(), existing.file_name())
                else {
                    return Err(SandboxError::Traversal(path.to_path_buf()));
                };
                missing.push(segment);
                existing = parent;
            }
            Err(source) => {
                return Err(SandboxError::Io {
                    path: existing.to_path_buf(),
                    source,
                });
            }
        }
    }
}
