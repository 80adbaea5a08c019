//! The live list of tracked entries.
//!
//! The list is an immutable snapshot held in a `watch` channel. Every change
//! replaces the snapshot in one step, and every per-entry change looks the
//! entry up by id at the moment it is applied. A change for an id that is no
//! longer tracked is dropped, so work that settles after a removal can never
//! bring the entry back.

use intake_core::FileEntry;
use std::sync::Arc;
use tokio::sync::watch;

pub type BatchSnapshot = Arc<Vec<FileEntry>>;

/// Result of applying a change to a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryUpdate {
    Applied,
    /// The entry exists but the change did not alter it.
    Unchanged,
    /// No entry with that id is tracked anymore.
    Vanished,
}

#[derive(Debug)]
pub struct Batch {
    tx: watch::Sender<BatchSnapshot>,
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

impl Batch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
        Self { tx }
    }

    pub fn snapshot(&self) -> BatchSnapshot {
        self.tx.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<FileEntry> {
        self.tx.borrow().iter().find(|e| e.id() == id).cloned()
    }

    /// Receiver that observes every replaced snapshot.
    pub fn subscribe(&self) -> watch::Receiver<BatchSnapshot> {
        self.tx.subscribe()
    }

    /// Append entries produced by `build`, which sees the current entries.
    ///
    /// Deciding and appending happen under the channel lock, so two concurrent
    /// selections cannot both pass a size check against the same snapshot.
    pub fn insert_with<T>(&self, build: impl FnOnce(&[FileEntry]) -> (Vec<FileEntry>, T)) -> T {
        let mut output = None;
        self.tx.send_if_modified(|snapshot| {
            let (entries, value) = build(snapshot.as_slice());
            output = Some(value);
            if entries.is_empty() {
                return false;
            }
            Arc::make_mut(snapshot).extend(entries);
            true
        });
        // send_if_modified always runs the closure.
        match output {
            Some(value) => value,
            None => unreachable!("insert_with closure did not run"),
        }
    }

    /// Apply `change` to the entry with `id`. `change` returns whether it
    /// modified the entry.
    pub fn update(&self, id: &str, change: impl FnOnce(&mut FileEntry) -> bool) -> EntryUpdate {
        let mut outcome = EntryUpdate::Vanished;
        self.tx.send_if_modified(|snapshot| {
            let Some(index) = snapshot.iter().position(|e| e.id() == id) else {
                return false;
            };
            let entries = Arc::make_mut(snapshot);
            if change(&mut entries[index]) {
                outcome = EntryUpdate::Applied;
                true
            } else {
                outcome = EntryUpdate::Unchanged;
                false
            }
        });
        outcome
    }

    pub fn remove(&self, id: &str) -> Option<FileEntry> {
        let mut removed = None;
        self.tx.send_if_modified(|snapshot| {
            let Some(index) = snapshot.iter().position(|e| e.id() == id) else {
                return false;
            };
            removed = Some(Arc::make_mut(snapshot).remove(index));
            true
        });
        removed
    }
}
