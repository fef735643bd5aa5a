//! Document snapshots and the pure mutation protocol.

use uuid::Uuid;

use crate::background::Background;
use crate::emoji::{Emoji, EmojiId, Position, MIN_EMOJI_SIZE};

/// An intent to change a document.
///
/// Edits are data; applying one is [`Document::apply`]. Edits that target an
/// emoji id no document knows are deliberate no-ops, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Place a new emoji. The document assigns the id.
    AddEmoji {
        /// The glyph to place.
        glyph: String,
        /// Center-origin offset to place it at.
        position: Position,
        /// Nominal glyph size.
        size: u32,
    },
    /// Delete an emoji.
    RemoveEmoji {
        /// Target emoji.
        id: EmojiId,
    },
    /// Translate an emoji by an integer delta.
    MoveEmoji {
        /// Target emoji.
        id: EmojiId,
        /// Horizontal delta.
        dx: i32,
        /// Vertical delta, positive upward.
        dy: i32,
    },
    /// Scale an emoji's nominal size by a factor in `(0, inf)`.
    ///
    /// The result is rounded, then clamped to at least [`MIN_EMOJI_SIZE`].
    ResizeEmoji {
        /// Target emoji.
        id: EmojiId,
        /// Scale factor.
        scale: f64,
    },
    /// Replace the background unconditionally.
    SetBackground {
        /// The new background reference.
        background: Background,
    },
    /// Reset the background to blank.
    ClearBackground,
}

/// One immutable version of an emoji document.
///
/// Mutation never happens in place: [`Document::apply`] returns the next
/// snapshot and leaves the input untouched, which is what makes whole
/// snapshots safe to park on an undo stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: Uuid,
    emojis: Vec<Emoji>,
    background: Background,
    next_emoji_id: EmojiId,
}

impl Document {
    /// Create a new empty document with a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            emojis: Vec::new(),
            background: Background::Blank,
            next_emoji_id: EmojiId::new(0),
        }
    }

    /// Rebuild a document from its persisted parts.
    ///
    /// The id counter is raised to `max(id) + 1` when the stored counter
    /// would otherwise hand out an id that is already taken.
    pub(crate) fn from_parts(
        id: Uuid,
        emojis: Vec<Emoji>,
        background: Background,
        next_emoji_id: EmojiId,
    ) -> Self {
        let floor = emojis
            .iter()
            .map(|emoji| emoji.id.next())
            .max()
            .unwrap_or(EmojiId::new(0));
        Self {
            id,
            emojis,
            background,
            next_emoji_id: next_emoji_id.max(floor),
        }
    }

    /// Stable identity of the whole document, assigned once at creation.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Emojis in insertion order (the back of the slice renders on top).
    #[must_use]
    pub fn emojis(&self) -> &[Emoji] {
        &self.emojis
    }

    /// The emoji with the given id, if present.
    #[must_use]
    pub fn emoji(&self, id: EmojiId) -> Option<&Emoji> {
        self.emojis.iter().find(|emoji| emoji.id == id)
    }

    /// The current background reference.
    #[must_use]
    pub const fn background(&self) -> &Background {
        &self.background
    }

    /// Number of placed emojis.
    #[must_use]
    pub fn emoji_count(&self) -> usize {
        self.emojis.len()
    }

    /// True when no emoji has been placed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emojis.is_empty()
    }

    /// The id the next added emoji will receive.
    pub(crate) const fn next_emoji_id(&self) -> EmojiId {
        self.next_emoji_id
    }

    /// Apply an edit, producing the next snapshot.
    ///
    /// Total over all inputs: edits that target an unknown emoji return an
    /// unchanged copy.
    #[must_use]
    pub fn apply(&self, edit: &Edit) -> Self {
        let mut next = self.clone();
        match edit {
            Edit::AddEmoji {
                glyph,
                position,
                size,
            } => next.add_emoji(glyph.clone(), *position, *size),
            Edit::RemoveEmoji { id } => next.remove_emoji(*id),
            Edit::MoveEmoji { id, dx, dy } => next.move_emoji(*id, *dx, *dy),
            Edit::ResizeEmoji { id, scale } => next.resize_emoji(*id, *scale),
            Edit::SetBackground { background } => next.background = background.clone(),
            Edit::ClearBackground => next.background = Background::Blank,
        }
        next
    }

    fn add_emoji(&mut self, glyph: String, position: Position, size: u32) {
        let id = self.next_emoji_id;
        self.next_emoji_id = id.next();
        self.emojis.push(Emoji {
            id,
            glyph,
            position,
            size: size.max(MIN_EMOJI_SIZE),
        });
    }

    fn remove_emoji(&mut self, id: EmojiId) {
        let before = self.emojis.len();
        self.emojis.retain(|emoji| emoji.id != id);
        if self.emojis.len() == before {
            tracing::debug!(%id, "remove targeted an unknown emoji");
        }
    }

    fn move_emoji(&mut self, id: EmojiId, dx: i32, dy: i32) {
        if let Some(emoji) = self.emojis.iter_mut().find(|emoji| emoji.id == id) {
            emoji.position = emoji.position.offset_by(dx, dy);
        }
    }

    fn resize_emoji(&mut self, id: EmojiId, scale: f64) {
        if let Some(emoji) = self.emojis.iter_mut().find(|emoji| emoji.id == id) {
            let scaled = (f64::from(emoji.size) * scale).round();
            // Tiny factors and non-finite input both land on the minimum size.
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let size = if scaled.is_finite() && scaled >= f64::from(MIN_EMOJI_SIZE) {
                scaled.min(f64::from(u32::MAX)) as u32
            } else {
                MIN_EMOJI_SIZE
            };
            emoji.size = size;
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
