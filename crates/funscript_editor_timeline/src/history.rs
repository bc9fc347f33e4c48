// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo journal built on serialized state snapshots.
//!
//! Every committed entry stores the complete state *before* an edit. Undoing
//! swaps that snapshot with the current state, which becomes the redo entry,
//! so each entry is self-contained and evicting the oldest one never leaves
//! the journal pointing at a partial state.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Default journal depth
pub const DEFAULT_UNDO_DEPTH: usize = 100;

/// History errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Unique operation ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationID(u64);

impl OperationID {
    /// Get the raw ID value
    pub fn value(&self) -> u64 {
        self.0
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Serialized state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Serialized state
    pub data: Vec<u8>,
    /// Timestamp when snapshot was taken
    pub timestamp: u64,
}

impl StateSnapshot {
    /// Create from serializable value
    pub fn from_value<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            data: bincode::serialize(value)?,
            timestamp: now_secs(),
        })
    }

    /// Deserialize to value
    pub fn to_value<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(bincode::deserialize(&self.data)?)
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// One undoable (or redoable) step
#[derive(Debug, Clone)]
pub struct JournalEntry {
    /// Operation ID
    pub id: OperationID,
    /// Human-readable label, e.g. "Move selection"
    pub label: String,
    /// State to restore
    pub snapshot: StateSnapshot,
}

/// Journal statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Entries in the undo stack
    pub undo_count: usize,
    /// Entries in the redo stack
    pub redo_count: usize,
    /// Total bytes held by both stacks
    pub memory_used: usize,
    /// Maximum undo depth
    pub max_depth: usize,
}

/// Linear undo/redo history
#[derive(Debug)]
pub struct UndoJournal {
    undo_stack: VecDeque<JournalEntry>,
    redo_stack: VecDeque<JournalEntry>,
    next_id: u64,
    max_depth: usize,
    memory_used: usize,
}

impl UndoJournal {
    /// Create a journal with the default depth
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_UNDO_DEPTH)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            next_id: 1,
            max_depth,
            memory_used: 0,
        }
    }

    fn next_id(&mut self) -> OperationID {
        let id = OperationID(self.next_id);
        self.next_id += 1;
        id
    }

    /// Record the state an edit started from.
    ///
    /// Truncates the redo tail and evicts the oldest entries past the depth
    /// limit.
    pub fn commit<T: Serialize>(&mut self, label: &str, before: &T) -> Result<OperationID> {
        let snapshot = StateSnapshot::from_value(before)?;
        let id = self.next_id();

        for dropped in self.redo_stack.drain(..) {
            self.memory_used = self.memory_used.saturating_sub(dropped.snapshot.size());
        }

        self.memory_used += snapshot.size();
        self.undo_stack.push_back(JournalEntry {
            id,
            label: label.to_owned(),
            snapshot,
        });

        while self.undo_stack.len() > self.max_depth {
            if let Some(old) = self.undo_stack.pop_front() {
                self.memory_used = self.memory_used.saturating_sub(old.snapshot.size());
                tracing::trace!(label = %old.label, "evicted oldest undo entry");
            }
        }

        Ok(id)
    }

    /// Step back one entry.
    ///
    /// `current` is stored as the matching redo entry; the returned value is
    /// the state to restore. The journal is untouched on error.
    pub fn undo<T: Serialize + DeserializeOwned>(&mut self, current: &T) -> Result<T> {
        let entry = self.undo_stack.back().ok_or(HistoryError::NothingToUndo)?;
        let restored = entry.snapshot.to_value()?;
        let current = StateSnapshot::from_value(current)?;

        if let Some(entry) = self.undo_stack.pop_back() {
            self.memory_used = self.memory_used.saturating_sub(entry.snapshot.size());
            self.memory_used += current.size();
            self.redo_stack.push_back(JournalEntry {
                id: entry.id,
                label: entry.label,
                snapshot: current,
            });
        }

        Ok(restored)
    }

    /// Step forward one entry. Mirror image of [`UndoJournal::undo`].
    pub fn redo<T: Serialize + DeserializeOwned>(&mut self, current: &T) -> Result<T> {
        let entry = self.redo_stack.back().ok_or(HistoryError::NothingToRedo)?;
        let restored = entry.snapshot.to_value()?;
        let current = StateSnapshot::from_value(current)?;

        if let Some(entry) = self.redo_stack.pop_back() {
            self.memory_used = self.memory_used.saturating_sub(entry.snapshot.size());
            self.memory_used += current.size();
            self.undo_stack.push_back(JournalEntry {
                id: entry.id,
                label: entry.label,
                snapshot: current,
            });
        }

        Ok(restored)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get undo stack depth
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get redo stack depth
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Maximum number of undo entries kept
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.memory_used = 0;
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            memory_used: self.memory_used,
            max_depth: self.max_depth,
        }
    }

    /// Label of the next undo entry
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.label.as_str())
    }

    /// Label of the next redo entry
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.label.as_str())
    }
}

impl Default for UndoJournal {
    fn default() -> Self {
        Self::new()
    }
}
