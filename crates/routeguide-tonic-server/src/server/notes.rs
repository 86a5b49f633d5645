//! Location-keyed, append-only log of chat notes.
//!
//! The [`NoteRegistry`] is the only state shared between calls. It is a sharded
//! concurrent map from an exact [`Point`] to a [`NoteLog`], and each log has its
//! own lock, so chats at different locations never contend on one mutex.
//!
//! ## Guarantees
//!
//! - [`NoteRegistry::get_or_create`] is an atomic insert-if-absent: callers
//!   racing on a new location all receive the same log.
//! - Appends to one log are totally ordered, in the order they happen.
//! - [`NoteLog::snapshot`] copies the log, so callers can stream it while other
//!   sessions keep appending.
//! - Entries are never removed while the registry lives.

use dashmap::DashMap;
use parking_lot::Mutex;
use routeguide_tonic_core::proto::{Point, RouteNote};
use std::sync::Arc;

/// Shared handle to the notes recorded at one location.
#[derive(Clone, Debug, Default)]
pub struct NoteLog {
    notes: Arc<Mutex<Vec<RouteNote>>>,
}

impl NoteLog {
    pub fn append(&self, note: RouteNote) {
        self.notes.lock().push(note);
    }

    /// Copies the notes recorded so far, oldest first.
    pub fn snapshot(&self) -> Vec<RouteNote> {
        self.notes.lock().clone()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.notes.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether both handles refer to the same underlying log.
    #[cfg(test)]
    pub fn same_log(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.notes, &other.notes)
    }
}

#[derive(Debug, Default)]
pub struct NoteRegistry {
    logs: DashMap<Point, NoteLog>,
}

impl NoteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the log for `location`, creating an empty one if needed.
    pub fn get_or_create(&self, location: Point) -> NoteLog {
        // The shard guard is released at the end of the statement; only the
        // handle escapes.
        self.logs.entry(location).or_default().clone()
    }

    /// Copies the notes at `location` without creating a log for it.
    #[cfg(test)]
    pub fn snapshot(&self, location: &Point) -> Vec<RouteNote> {
        self.logs
            .get(location)
            .map(|log| log.snapshot())
            .unwrap_or_default()
    }

    /// Number of locations with a log.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.logs.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}
