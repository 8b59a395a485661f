//! Bounded undo/redo.
//!
//! Entries are whole-document snapshots paired with the selection at the time
//! they were taken. The undo stack is a FIFO-evicting ring capped at the
//! configured depth; recording anything clears the redo stack.
//!
//! Typing is grouped: the first keystroke of a burst records an entry and
//! opens a group, later keystrokes record nothing until the group is sealed
//! (by a pause, an undo/redo, or any other command).

use crate::doc::Document;
use crate::selection::SelectionDescriptor;
use std::collections::VecDeque;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub snapshot: Document,
    pub cursor: Option<SelectionDescriptor>,
}

impl HistoryEntry {
    pub fn new(snapshot: Document, cursor: Option<SelectionDescriptor>) -> Self {
        Self { snapshot, cursor }
    }
}

#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    depth: usize,
    typing: bool,
}

impl Default for History {
    fn default() -> Self {
        Self::with_depth(100)
    }
}

impl History {
    /// `depth` below 1 is raised to 1.
    pub fn with_depth(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            undo: VecDeque::with_capacity(depth.min(1024)),
            redo: Vec::new(),
            depth,
            typing: false,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Pushes the state from before a mutation.
    pub fn record(&mut self, snapshot: Document, cursor: Option<SelectionDescriptor>) {
        self.redo.clear();
        self.push_undo(HistoryEntry::new(snapshot, cursor));
    }

    /// Pops the latest entry, pushing `current` onto the redo stack first.
    /// `None` when there is nothing to undo.
    pub fn undo(&mut self, current: HistoryEntry) -> Option<HistoryEntry> {
        self.typing = false;
        let entry = self.undo.pop_back()?;
        self.redo.push(current);
        trace!(undo = self.undo.len(), redo = self.redo.len(), "undo");
        Some(entry)
    }

    pub fn redo(&mut self, current: HistoryEntry) -> Option<HistoryEntry> {
        self.typing = false;
        let entry = self.redo.pop()?;
        self.push_undo(current);
        trace!(undo = self.undo.len(), redo = self.redo.len(), "redo");
        Some(entry)
    }

    /// Starts or continues a typing group. `true` means this keystroke opens
    /// a new group and its pre-edit state must be recorded.
    pub fn begin_typing(&mut self) -> bool {
        !std::mem::replace(&mut self.typing, true)
    }

    pub fn seal_typing(&mut self) {
        self.typing = false;
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.typing = false;
    }

    fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo.push_back(entry);
        while self.undo.len() > self.depth {
            self.undo.pop_front();
            debug!(depth = self.depth, "evicted oldest undo entry");
        }
    }
}
