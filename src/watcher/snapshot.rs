//! Directory snapshots.
//!
//! A snapshot records size and modification time for every regular file
//! under a root, keyed by path relative to that root. Snapshots are built in
//! one pass and never mutated afterwards.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use walkdir::WalkDir;

use super::event::FileState;

/// Relative path → file state, in scan order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    files: IndexMap<PathBuf, FileState>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, relative_path: &Path) -> Option<&FileState> {
        self.files.get(relative_path)
    }

    pub fn contains(&self, relative_path: &Path) -> bool {
        self.files.contains_key(relative_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Entries in scan order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &FileState)> {
        self.files.iter()
    }
}

impl FromIterator<(PathBuf, FileState)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (PathBuf, FileState)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// Walk `root` and record every regular file.
///
/// Directories are traversed but not recorded and symlinks are not followed.
/// Errors never abort the scan: an unreadable entry is logged and skipped,
/// and an unreadable root yields whatever was collected (usually nothing).
pub fn scan(root: &Path) -> Snapshot {
    let mut files = IndexMap::new();

    let walker = WalkDir::new(root).follow_links(false).sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if e.depth() == 0 {
                    tracing::error!("[scan] error walking {}: {e}", root.display());
                } else {
                    let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                    tracing::warn!("[scan] error accessing {path}: {e}");
                }
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = match entry.path().strip_prefix(root) {
            Ok(relative) => relative.to_path_buf(),
            Err(e) => {
                tracing::warn!(
                    "[scan] cannot relativize {}: {e}",
                    entry.path().display()
                );
                continue;
            }
        };

        let state = entry
            .metadata()
            .map_err(|e| e.to_string())
            .and_then(|meta| {
                let modified = meta.modified().map_err(|e| e.to_string())?;
                Ok(FileState::new(meta.len(), modified))
            });

        match state {
            Ok(state) => {
                files.insert(relative, state);
            }
            Err(e) => {
                tracing::warn!("[scan] error reading metadata of {}: {e}", entry.path().display());
            }
        }
    }

    crate::debug_event!("scan", "complete", "{} files under {}", files.len(), root.display());

    Snapshot { files }
}
