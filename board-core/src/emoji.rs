//! Emoji placements - the building blocks of a document.

use serde::{Deserialize, Serialize};

/// Smallest nominal size an emoji may shrink to.
pub const MIN_EMOJI_SIZE: u32 = 1;

/// Unique identifier for an emoji within one document.
///
/// Ids are assigned monotonically by the owning [`Document`](crate::Document)
/// and are never reused, even after the emoji is deleted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EmojiId(u64);

impl EmojiId {
    /// Create an id from its raw counter value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw counter value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The id that follows this one.
    pub(crate) const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for EmojiId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Integer offset from the document center.
///
/// `y` grows upward in the logical model; the rendering layer flips it when
/// mapping to screen coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal offset from center.
    pub x: i32,
    /// Vertical offset from center, positive upward.
    pub y: i32,
}

impl Position {
    /// The document center.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Create a position from its offsets.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// This position translated by an integer delta.
    #[must_use]
    pub const fn offset_by(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A placed emoji glyph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emoji {
    /// Document-unique identifier.
    pub id: EmojiId,
    /// The displayed text content (may span multiple codepoints).
    pub glyph: String,
    /// Offset from the document center.
    pub position: Position,
    /// Nominal glyph size, always at least [`MIN_EMOJI_SIZE`].
    pub size: u32,
}
