//! Change event types produced by the detector.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Observable metadata of one file at scan time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileState {
    pub size: u64,
    pub modified: SystemTime,
}

impl FileState {
    pub fn new(size: u64, modified: SystemTime) -> Self {
        Self { size, modified }
    }
}

/// What happened to a path between two scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed change for one path.
///
/// Deleted events only carry the relative path: the file is gone, so there
/// is neither an absolute location to read nor metadata to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub relative_path: PathBuf,
    pub kind: ChangeKind,
    pub absolute_path: Option<PathBuf>,
    pub state: Option<FileState>,
}

impl ChangeEvent {
    pub fn created(root: &Path, relative_path: PathBuf, state: FileState) -> Self {
        Self {
            absolute_path: Some(root.join(&relative_path)),
            relative_path,
            kind: ChangeKind::Created,
            state: Some(state),
        }
    }

    pub fn modified(root: &Path, relative_path: PathBuf, state: FileState) -> Self {
        Self {
            absolute_path: Some(root.join(&relative_path)),
            relative_path,
            kind: ChangeKind::Modified,
            state: Some(state),
        }
    }

    pub fn deleted(relative_path: PathBuf) -> Self {
        Self {
            relative_path,
            kind: ChangeKind::Deleted,
            absolute_path: None,
            state: None,
        }
    }

    pub fn size(&self) -> Option<u64> {
        self.state.map(|s| s.size)
    }

    pub fn modified_at(&self) -> Option<SystemTime> {
        self.state.map(|s| s.modified)
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            Some(state) => write!(
                f,
                "{} {} ({} bytes)",
                self.kind,
                self.relative_path.display(),
                state.size
            ),
            None => write!(f, "{} {}", self.kind, self.relative_path.display()),
        }
    }
}
