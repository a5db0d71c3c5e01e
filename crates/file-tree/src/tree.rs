//! In-memory directory trees.
//!
//! Nodes own their children exclusively. Instead of a back-reference to the
//! parent, every node records its path relative to the tree root when it is
//! created, which is all the matcher needs to report where a match sits.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::TreeError;

/// One path segment of a directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    name: String,
    path: PathBuf,
    children: Vec<FileNode>,
}

/// Compares two path segments case-insensitively.
pub fn names_equal(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

impl FileNode {
    /// Creates an empty root node.
    pub fn root() -> Self {
        Self {
            name: String::new(),
            path: PathBuf::new(),
            children: Vec::new(),
        }
    }

    /// Builds a signature tree from a list of required entries.
    ///
    /// Each entry is split on `/` and `\`. A single segment adds one child
    /// under the root; several segments add a chain of nested nodes. Shared
    /// prefixes are merged, so `["DATA", "data/level.tr4"]` yields one
    /// `DATA` node with one child.
    pub fn from_signature<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut root = Self::root();
        for entry in entries {
            root.insert_path(entry.as_ref());
        }
        root
    }

    /// Builds a scan tree by walking `dir` breadth-first.
    ///
    /// Every entry is recorded, hidden ones included. Entries of one
    /// directory are visited in name order. Links are recorded but never
    /// descended into.
    pub fn scan(dir: &Path) -> Result<Self, TreeError> {
        let metadata = std::fs::metadata(dir).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                TreeError::NotFound(dir.to_path_buf())
            } else {
                TreeError::Io {
                    path: dir.to_path_buf(),
                    source,
                }
            }
        })?;
        if !metadata.is_dir() {
            return Err(TreeError::NotADirectory(dir.to_path_buf()));
        }

        let mut root = Self::root();
        let mut queue = VecDeque::from([PathBuf::new()]);

        while let Some(relative) = queue.pop_front() {
            let current = dir.join(&relative);
            let io_err = |source| TreeError::Io {
                path: current.clone(),
                source,
            };

            let mut entries = std::fs::read_dir(&current)
                .map_err(io_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(io_err)?;
            entries.sort_by_key(|entry| entry.file_name());

            for entry in entries {
                let child = relative.join(entry.file_name());
                root.insert_components(child.iter().map(|c| c.to_string_lossy()));

                if entry.file_type().map_err(io_err)?.is_dir() {
                    queue.push_back(child);
                }
            }
        }

        tracing::debug!(
            root = %dir.display(),
            nodes = root.breadth_first().count() - 1,
            "scanned directory tree"
        );
        Ok(root)
    }

    /// Adds a `/`- or `\`-separated path below this node.
    pub fn insert_path(&mut self, path: &str) {
        self.insert_components(path.split(['/', '\\']));
    }

    fn insert_components<I, S>(&mut self, components: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut current = self;
        for component in components {
            let component = component.as_ref();
            if component.is_empty() || component == "." {
                continue;
            }

            let index = match current
                .children
                .iter()
                .position(|child| names_equal(&child.name, component))
            {
                Some(index) => index,
                None => {
                    let path = current.path.join(component);
                    current.children.push(FileNode {
                        name: component.to_string(),
                        path,
                        children: Vec::new(),
                    });
                    current.children.len() - 1
                }
            };
            current = &mut current.children[index];
        }
    }

    /// Segment name as first inserted (empty for the root).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path from the tree root to this node (empty for the root).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Child nodes in insertion order.
    pub fn children(&self) -> &[FileNode] {
        &self.children
    }

    /// Returns the child whose name matches `name` case-insensitively.
    pub fn child(&self, name: &str) -> Option<&FileNode> {
        self.children.iter().find(|c| names_equal(&c.name, name))
    }

    /// Follows a `/`-separated path down from this node.
    pub fn descend(&self, path: &str) -> Option<&FileNode> {
        path.split(['/', '\\'])
            .filter(|s| !s.is_empty() && *s != ".")
            .try_fold(self, |node, segment| node.child(segment))
    }

    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of segments between the tree root and this node.
    pub fn depth(&self) -> usize {
        self.path.components().count()
    }

    /// Iterates this node and all descendants, level by level.
    pub fn breadth_first(&self) -> BreadthFirst<'_> {
        BreadthFirst {
            queue: VecDeque::from([self]),
        }
    }
}

/// Level-order iterator over a [`FileNode`] tree.
pub struct BreadthFirst<'a> {
    queue: VecDeque<&'a FileNode>,
}

impl<'a> Iterator for BreadthFirst<'a> {
    type Item = &'a FileNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.pop_front()?;
        self.queue.extend(node.children.iter());
        Some(node)
    }
}
