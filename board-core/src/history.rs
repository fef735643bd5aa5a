//! Undo/redo history over whole document snapshots.

use crate::document::Document;

/// One reversible step: the label shown to the user and the snapshot that
/// undoing the step restores.
#[derive(Debug, Clone)]
struct HistoryEntry {
    label: String,
    snapshot: Document,
}

/// Undo/redo stacks for a single document.
///
/// The history owns its snapshots by value, so later edits can never reach
/// back and corrupt a parked state.
#[derive(Debug, Clone, Default)]
pub struct EditHistory {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
}

impl EditHistory {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly performed step. `before` is the snapshot that undoing
    /// the step restores. Any redoable steps are invalidated.
    pub fn record(&mut self, label: impl Into<String>, before: Document) {
        self.undo.push(HistoryEntry {
            label: label.into(),
            snapshot: before,
        });
        self.redo.clear();
    }

    /// Undo the most recent step.
    ///
    /// Returns the snapshot to restore; `current` is parked on the redo stack
    /// under the same label. `None` when there is nothing to undo.
    pub fn undo(&mut self, current: Document) -> Option<Document> {
        let HistoryEntry { label, snapshot } = self.undo.pop()?;
        self.redo.push(HistoryEntry {
            label,
            snapshot: current,
        });
        Some(snapshot)
    }

    /// Redo the most recently undone step.
    ///
    /// Returns the snapshot to restore; `current` moves back onto the undo
    /// stack under the same label. `None` when there is nothing to redo.
    pub fn redo(&mut self, current: Document) -> Option<Document> {
        let HistoryEntry { label, snapshot } = self.redo.pop()?;
        self.undo.push(HistoryEntry {
            label,
            snapshot: current,
        });
        Some(snapshot)
    }

    /// True when at least one step can be undone.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// True when at least one step can be redone.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Label of the step `undo` would revert.
    #[must_use]
    pub fn undo_label(&self) -> Option<&str> {
        self.undo.last().map(|entry| entry.label.as_str())
    }

    /// Label of the step `redo` would re-apply.
    #[must_use]
    pub fn redo_label(&self) -> Option<&str> {
        self.redo.last().map(|entry| entry.label.as_str())
    }
}
