//! Persisted document format.
//!
//! The on-disk shape (JSON):
//!
//! ```json
//! {
//!   "id": "7f9c0c1c-8a3f-4a59-9d3e-6f2b9f0a1c2d",
//!   "background": { "url": "https://example.com/bg.png" },
//!   "emojis": [
//!     { "string": "🎉", "position": { "x": 0, "y": 0 }, "size": 40, "id": 0 }
//!   ],
//!   "nextEmojiID": 1
//! }
//! ```
//!
//! Unknown or missing background variants decode to blank, and a missing
//! `nextEmojiID` is rebuilt from the highest emoji id, so older blobs stay
//! loadable. Anything else that does not match the schema is a corrupt
//! document.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::background::Background;
use crate::document::Document;
use crate::emoji::{Emoji, EmojiId, Position, MIN_EMOJI_SIZE};
use crate::error::{BoardError, BoardResult};

/// Wire representation of one emoji placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmojiRecord {
    /// The glyph, stored under the historical `string` key.
    #[serde(rename = "string")]
    pub glyph: String,
    /// Center-origin offset.
    pub position: Position,
    /// Nominal glyph size.
    pub size: u32,
    /// Document-unique id.
    pub id: EmojiId,
}

impl From<&Emoji> for EmojiRecord {
    fn from(emoji: &Emoji) -> Self {
        Self {
            glyph: emoji.glyph.clone(),
            position: emoji.position,
            size: emoji.size,
            id: emoji.id,
        }
    }
}

impl From<EmojiRecord> for Emoji {
    fn from(record: EmojiRecord) -> Self {
        Self {
            id: record.id,
            glyph: record.glyph,
            position: record.position,
            size: record.size.max(MIN_EMOJI_SIZE),
        }
    }
}

/// Wire representation of a whole document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Document identity (UUID-formatted string).
    pub id: Uuid,
    /// Background in its lenient wire shape.
    #[serde(default)]
    pub background: Background,
    /// Placed emojis in z-order.
    #[serde(default)]
    pub emojis: Vec<EmojiRecord>,
    /// Monotonic id counter; rebuilt from the emoji list when absent.
    #[serde(rename = "nextEmojiID", default)]
    pub next_emoji_id: Option<EmojiId>,
}

impl From<&Document> for DocumentRecord {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id(),
            background: document.background().clone(),
            emojis: document.emojis().iter().map(EmojiRecord::from).collect(),
            next_emoji_id: Some(document.next_emoji_id()),
        }
    }
}

impl From<DocumentRecord> for Document {
    fn from(record: DocumentRecord) -> Self {
        let emojis = record.emojis.into_iter().map(Emoji::from).collect();
        Self::from_parts(
            record.id,
            emojis,
            record.background,
            record.next_emoji_id.unwrap_or(EmojiId::new(0)),
        )
    }
}

impl Document {
    /// Encode to the persisted byte format.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::CorruptDocument`] if encoding fails; it does not
    /// for any constructible document.
    pub fn to_bytes(&self) -> BoardResult<Vec<u8>> {
        serde_json::to_vec(&DocumentRecord::from(self)).map_err(BoardError::from)
    }

    /// Decode from the persisted byte format.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::CorruptDocument`] when the bytes do not match
    /// the document schema. No partial state is produced.
    pub fn from_bytes(bytes: &[u8]) -> BoardResult<Self> {
        let record: DocumentRecord = serde_json::from_slice(bytes)?;
        Ok(record.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Edit;
    use url::Url;

    fn round_trip(document: &Document) -> Document {
        let bytes = document.to_bytes().expect("encode");
        Document::from_bytes(&bytes).expect("decode")
    }

    #[test]
    fn test_round_trip_empty_document() {
        let document = Document::new();
        assert_eq!(round_trip(&document), document);
    }

    #[test]
    fn test_round_trip_each_background_variant() {
        let backgrounds = [
            Background::Blank,
            Background::Url(Url::parse("https://example.com/bg.png").expect("valid")),
            Background::Bytes(vec![0, 1, 254, 255]),
        ];
        for background in backgrounds {
            let document = Document::new().apply(&Edit::SetBackground {
                background: background.clone(),
            });
            assert_eq!(round_trip(&document), document, "variant: {background:?}");
        }
    }

    #[test]
    fn test_round_trip_preserves_counter_after_removals() {
        let document = Document::new()
            .apply(&Edit::AddEmoji {
                glyph: "🎉".to_owned(),
                position: Position::new(3, -4),
                size: 40,
            })
            .apply(&Edit::AddEmoji {
                glyph: "🚀".to_owned(),
                position: Position::ZERO,
                size: 20,
            })
            .apply(&Edit::RemoveEmoji { id: EmojiId::new(0) })
            .apply(&Edit::RemoveEmoji { id: EmojiId::new(1) });

        let reloaded = round_trip(&document);
        assert_eq!(reloaded, document);

        // The counter survives, so new ids never collide with removed ones.
        let grown = reloaded.apply(&Edit::AddEmoji {
            glyph: "🐸".to_owned(),
            position: Position::ZERO,
            size: 30,
        });
        assert_eq!(grown.emojis()[0].id, EmojiId::new(2));
    }

    #[test]
    fn test_decode_uses_original_key_names() {
        let json = r#"{
            "id": "7f9c0c1c-8a3f-4a59-9d3e-6f2b9f0a1c2d",
            "background": "blank",
            "emojis": [
                { "string": "🎉", "position": { "x": 1, "y": 2 }, "size": 40, "id": 0 }
            ],
            "nextEmojiID": 1
        }"#;
        let document = Document::from_bytes(json.as_bytes()).expect("decode");
        assert_eq!(document.emojis()[0].glyph, "🎉");
        assert_eq!(document.emojis()[0].position, Position::new(1, 2));
    }

    #[test]
    fn test_decode_rebuilds_missing_counter() {
        let json = r#"{
            "id": "7f9c0c1c-8a3f-4a59-9d3e-6f2b9f0a1c2d",
            "background": "blank",
            "emojis": [
                { "string": "🎉", "position": { "x": 0, "y": 0 }, "size": 40, "id": 4 }
            ]
        }"#;
        let document = Document::from_bytes(json.as_bytes()).expect("decode");
        let grown = document.apply(&Edit::AddEmoji {
            glyph: "🚀".to_owned(),
            position: Position::ZERO,
            size: 20,
        });
        assert_eq!(grown.emojis()[1].id, EmojiId::new(5));
    }

    #[test]
    fn test_decode_unknown_background_variant_is_blank() {
        let json = r#"{
            "id": "7f9c0c1c-8a3f-4a59-9d3e-6f2b9f0a1c2d",
            "background": { "gradient": ["red", "blue"] },
            "emojis": []
        }"#;
        let document = Document::from_bytes(json.as_bytes()).expect("decode");
        assert!(document.background().is_blank());
    }

    #[test]
    fn test_decode_garbage_is_corrupt() {
        let result = Document::from_bytes(b"definitely not json");
        assert!(matches!(result, Err(BoardError::CorruptDocument(_))));

        let result = Document::from_bytes(br#"{"id": "not-a-uuid", "emojis": []}"#);
        assert!(matches!(result, Err(BoardError::CorruptDocument(_))));
    }
}
