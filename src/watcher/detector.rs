//! Snapshot comparison.
//!
//! Turns two complete snapshots into an ordered list of change events:
//! creations and modifications in scan order, then deletions. Deletions can
//! only be known once the current scan is complete, which is why they come
//! last.

use std::path::Path;

use super::event::ChangeEvent;
use super::snapshot::Snapshot;

/// Compare `previous` against `current`.
///
/// With `initial` set, creations and deletions are suppressed: the first scan
/// only establishes the baseline. Modifications are still reported, though
/// against an empty baseline there are none.
pub fn diff(
    root: &Path,
    previous: &Snapshot,
    current: &Snapshot,
    initial: bool,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for (path, state) in current.iter() {
        match previous.get(path) {
            Some(old) if old != state => {
                events.push(ChangeEvent::modified(root, path.clone(), *state));
            }
            Some(_) => {}
            None if !initial => {
                events.push(ChangeEvent::created(root, path.clone(), *state));
            }
            None => {}
        }
    }

    if !initial {
        for (path, _) in previous.iter() {
            if !current.contains(path) {
                events.push(ChangeEvent::deleted(path.clone()));
            }
        }
    }

    events
}

/// Stateful detector holding the last complete snapshot.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    known: Snapshot,
    initialized: bool,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `current` with the stored snapshot, then replace it wholesale.
    ///
    /// The first call establishes the baseline and returns no events.
    pub fn apply(&mut self, root: &Path, current: Snapshot) -> Vec<ChangeEvent> {
        let initial = !self.initialized;
        let events = diff(root, &self.known, &current, initial);

        self.known = current;
        self.initialized = true;

        events
    }

    /// The last snapshot passed to [`apply`](Self::apply).
    pub fn known(&self) -> &Snapshot {
        &self.known
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}
