//! Per-document editing state: the live snapshot plus its history.

use crate::background::Background;
use crate::document::{Document, Edit};
use crate::emoji::{EmojiId, Position};
use crate::history::EditHistory;

/// The live editing state for one document.
///
/// All mutation funnels through [`BoardState::perform`], which is what keeps
/// every step reversible. `&mut` access already serializes callers on one
/// thread; sharing across threads goes through
/// [`DocumentStore`](crate::DocumentStore), which guards this state with a
/// lock.
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    document: Document,
    history: EditHistory,
}

impl BoardState {
    /// Fresh state around a new empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing document (e.g. one decoded from disk). History starts
    /// empty; steps taken before persistence are not replayable.
    #[must_use]
    pub fn from_document(document: Document) -> Self {
        Self {
            document,
            history: EditHistory::new(),
        }
    }

    /// The current snapshot.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// Perform an edit under the given undo label.
    ///
    /// The pre-edit snapshot lands on the undo stack and the redo stack is
    /// cleared; the mutation and its stack push are one step.
    pub fn perform(&mut self, label: impl Into<String>, edit: &Edit) {
        let before = self.document.clone();
        self.document = self.document.apply(edit);
        self.history.record(label, before);
    }

    /// Revert the most recent step. Returns false when there was nothing to
    /// undo.
    pub fn undo(&mut self) -> bool {
        match self.history.undo(self.document.clone()) {
            Some(snapshot) => {
                self.document = snapshot;
                true
            }
            None => false,
        }
    }

    /// Re-apply the most recently undone step. Returns false when there was
    /// nothing to redo.
    pub fn redo(&mut self) -> bool {
        match self.history.redo(self.document.clone()) {
            Some(snapshot) => {
                self.document = snapshot;
                true
            }
            None => false,
        }
    }

    /// True when at least one step can be undone.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// True when at least one step can be redone.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Label of the step `undo` would revert, for UI display.
    #[must_use]
    pub fn undo_label(&self) -> Option<&str> {
        self.history.undo_label()
    }

    /// Label of the step `redo` would re-apply, for UI display.
    #[must_use]
    pub fn redo_label(&self) -> Option<&str> {
        self.history.redo_label()
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    /// Place `glyph` at `position` with the given nominal size.
    pub fn add_emoji(&mut self, glyph: &str, position: Position, size: u32) {
        self.perform(
            format!("Add {glyph}"),
            &Edit::AddEmoji {
                glyph: glyph.to_owned(),
                position,
                size,
            },
        );
    }

    /// Delete an emoji. Unknown ids record nothing.
    pub fn remove_emoji(&mut self, id: EmojiId) {
        let Some(glyph) = self.glyph_of(id) else {
            return;
        };
        self.perform(format!("Remove {glyph}"), &Edit::RemoveEmoji { id });
    }

    /// Translate an emoji by an integer delta. Unknown ids record nothing.
    pub fn move_emoji(&mut self, id: EmojiId, dx: i32, dy: i32) {
        let Some(glyph) = self.glyph_of(id) else {
            return;
        };
        self.perform(format!("Move {glyph}"), &Edit::MoveEmoji { id, dx, dy });
    }

    /// Scale an emoji's nominal size. Unknown ids record nothing.
    pub fn resize_emoji(&mut self, id: EmojiId, scale: f64) {
        let Some(glyph) = self.glyph_of(id) else {
            return;
        };
        self.perform(format!("Resize {glyph}"), &Edit::ResizeEmoji { id, scale });
    }

    /// Replace the background.
    pub fn set_background(&mut self, background: Background) {
        self.perform("Set Background", &Edit::SetBackground { background });
    }

    /// Reset the background to blank.
    pub fn clear_background(&mut self) {
        self.perform("Remove Background", &Edit::ClearBackground);
    }

    fn glyph_of(&self, id: EmojiId) -> Option<String> {
        let Some(emoji) = self.document.emoji(id) else {
            tracing::debug!(%id, "intent targeted an unknown emoji, skipping");
            return None;
        };
        Some(emoji.glyph.clone())
    }
}
