//! Named emoji palettes and the keyed store that holds them.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from palette store operations that refuse to apply.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaletteError {
    /// Removing would leave the store with no palettes.
    #[error("a palette store must keep at least one palette")]
    WouldEmpty,

    /// The index does not point at a palette.
    #[error("no palette at index {0}")]
    OutOfRange(usize),
}

/// A named, duplicate-free set of emoji glyphs.
///
/// Identity is the `id`, not the name; the name is freely editable and may
/// be empty while the user is still typing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    id: Uuid,
    name: String,
    glyphs: Vec<String>,
}

impl Palette {
    /// Create a palette, deduplicating `glyphs` while keeping first-seen
    /// order.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        glyphs: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            glyphs: uniqued(glyphs),
        }
    }

    /// Stable identity, independent of the name.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the palette. Identity is unaffected.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The glyphs, in insertion order, free of duplicates.
    #[must_use]
    pub fn glyphs(&self) -> &[String] {
        &self.glyphs
    }

    /// Append a glyph unless an identical one is already present. Returns
    /// whether the palette changed.
    pub fn add_glyph(&mut self, glyph: impl Into<String>) -> bool {
        let glyph = glyph.into();
        if self.glyphs.contains(&glyph) {
            return false;
        }
        self.glyphs.push(glyph);
        true
    }

    /// Remove a glyph if present. Returns whether the palette changed.
    pub fn remove_glyph(&mut self, glyph: &str) -> bool {
        let before = self.glyphs.len();
        self.glyphs.retain(|existing| existing != glyph);
        self.glyphs.len() != before
    }

    /// True when the palette holds no glyphs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// The starter palettes a fresh store is seeded with.
    #[must_use]
    pub fn builtins() -> Vec<Self> {
        vec![
            Self::new("Faces", ["😀", "😂", "🥹", "😎", "🥺", "😡", "🤯", "😴"]),
            Self::new("Sports", ["⚽", "🏀", "🏈", "⚾", "🎾", "🏐", "🏓", "⛳"]),
            Self::new("Animals", ["🐶", "🐱", "🦊", "🐻", "🐼", "🦁", "🐸", "🐙"]),
            Self::new("Food", ["🍎", "🍕", "🍔", "🌮", "🍣", "🍩", "🍪", "☕"]),
            Self::new("Travel", ["🚗", "✈️", "🚀", "🚲", "🚂", "🏝️", "🗼", "🗽"]),
        ]
    }
}

/// Deduplicate glyphs keeping first-seen order.
fn uniqued(glyphs: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for glyph in glyphs {
        let glyph = glyph.into();
        if !out.contains(&glyph) {
            out.push(glyph);
        }
    }
    out
}

/// An ordered, never-empty collection of palettes with a wrapping cursor.
///
/// Insertion dedups by palette identity so editing a palette "in place" from
/// anywhere can never create duplicates. Removal refuses to empty the
/// collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteStore {
    name: String,
    palettes: Vec<Palette>,
    cursor: usize,
}

impl PaletteStore {
    /// Store seeded with the builtin palettes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            palettes: Palette::builtins(),
            cursor: 0,
        }
    }

    /// Store over an explicit palette list.
    ///
    /// # Errors
    ///
    /// Returns [`PaletteError::WouldEmpty`] if `palettes` is empty.
    pub fn with_palettes(
        name: impl Into<String>,
        palettes: Vec<Palette>,
    ) -> Result<Self, PaletteError> {
        if palettes.is_empty() {
            return Err(PaletteError::WouldEmpty);
        }
        Ok(Self {
            name: name.into(),
            palettes,
            cursor: 0,
        })
    }

    /// The store's name, which doubles as its persistence key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All palettes in order.
    #[must_use]
    pub fn palettes(&self) -> &[Palette] {
        &self.palettes
    }

    /// Number of palettes; always at least one.
    #[must_use]
    pub fn count(&self) -> usize {
        self.palettes.len()
    }

    /// The current cursor position, always within `[0, count)`.
    #[must_use]
    pub const fn cursor_index(&self) -> usize {
        self.cursor
    }

    /// The palette under the cursor.
    #[must_use]
    pub fn current(&self) -> &Palette {
        &self.palettes[self.cursor]
    }

    /// Move the cursor by `by` positions, wrapping in both directions.
    pub fn advance_cursor(&mut self, by: i64) {
        self.cursor = self.wrapped(index_as_i64(self.cursor) + by);
    }

    /// Point the cursor at `index`, wrapping it into range.
    pub fn set_cursor(&mut self, index: i64) {
        self.cursor = self.wrapped(index);
    }

    /// Insert `palette` at `at` (default: the cursor position).
    ///
    /// If a palette with the same id already exists it is moved to that
    /// position and replaced with the new content instead of being
    /// duplicated.
    pub fn insert_or_replace(&mut self, palette: Palette, at: Option<usize>) {
        let at = self.wrapped(index_as_i64(at.unwrap_or(self.cursor)));
        if let Some(existing) = self.position_of(palette.id()) {
            self.palettes.remove(existing);
            let at = at.min(self.palettes.len());
            self.palettes.insert(at, palette);
        } else {
            self.palettes.insert(at, palette);
        }
    }

    /// Append `palette` at the end.
    ///
    /// Same dedup rule as [`PaletteStore::insert_or_replace`]; when the store
    /// holds exactly one palette and it is the duplicate, it is replaced
    /// wholesale so the collection can never empty out in between.
    pub fn append_or_replace(&mut self, palette: Palette) {
        if let Some(existing) = self.position_of(palette.id()) {
            if self.palettes.len() == 1 {
                self.palettes[0] = palette;
            } else {
                self.palettes.remove(existing);
                self.palettes.push(palette);
            }
        } else {
            self.palettes.push(palette);
        }
    }

    /// Remove the palette at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`PaletteError::OutOfRange`] for an index past the end, or
    /// [`PaletteError::WouldEmpty`] when the removal would leave the store
    /// with no palettes.
    pub fn remove(&mut self, index: usize) -> Result<Palette, PaletteError> {
        if index >= self.palettes.len() {
            return Err(PaletteError::OutOfRange(index));
        }
        if self.palettes.len() == 1 {
            return Err(PaletteError::WouldEmpty);
        }
        let removed = self.palettes.remove(index);
        self.cursor = self.wrapped(index_as_i64(self.cursor));
        Ok(removed)
    }

    /// Load the store saved under `name`, falling back to a builtin-seeded
    /// store when nothing readable is stored there.
    #[must_use]
    pub fn load(name: &str, store: &dyn KeyValueStore) -> Self {
        let Some(bytes) = store.get(name) else {
            return Self::new(name);
        };
        match serde_json::from_slice::<Self>(&bytes) {
            Ok(mut loaded) if !loaded.palettes.is_empty() => {
                loaded.cursor = loaded.wrapped(index_as_i64(loaded.cursor));
                loaded
            }
            Ok(_) => {
                tracing::warn!(name, "stored palette store was empty, reseeding builtins");
                Self::new(name)
            }
            Err(e) => {
                tracing::warn!(name, "stored palette store unreadable: {e}");
                Self::new(name)
            }
        }
    }

    /// Persist this store under its name.
    pub fn save(&self, store: &dyn KeyValueStore) {
        match serde_json::to_vec(self) {
            Ok(bytes) => store.set(&self.name, bytes),
            Err(e) => tracing::warn!(name = %self.name, "failed to encode palette store: {e}"),
        }
    }

    fn position_of(&self, id: Uuid) -> Option<usize> {
        self.palettes.iter().position(|palette| palette.id() == id)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn wrapped(&self, index: i64) -> usize {
        index.rem_euclid(index_as_i64(self.palettes.len())) as usize
    }
}

#[allow(clippy::cast_possible_wrap)]
const fn index_as_i64(index: usize) -> i64 {
    index as i64
}

/// Keyed blob storage backing palette persistence.
///
/// Decouples the palette store from any particular medium (user defaults, a
/// file, a database); implementations are injected by the embedding
/// application.
pub trait KeyValueStore: Send + Sync {
    /// The blob stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store `value` under `key`, replacing any previous blob.
    fn set(&self, key: &str, value: Vec<u8>);
}

/// In-process [`KeyValueStore`] for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Vec<u8>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_store() -> PaletteStore {
        PaletteStore::with_palettes(
            "test",
            vec![
                Palette::new("a", ["😀"]),
                Palette::new("b", ["🚀"]),
                Palette::new("c", ["🐸"]),
            ],
        )
        .expect("non-empty")
    }

    #[test]
    fn test_palette_dedups_glyphs_on_construction() {
        let palette = Palette::new("p", ["😀", "🚀", "😀", "🚀", "🐸"]);
        assert_eq!(palette.glyphs(), &["😀", "🚀", "🐸"]);
    }

    #[test]
    fn test_add_glyph_refuses_duplicates() {
        let mut palette = Palette::new("p", ["😀"]);
        assert!(!palette.add_glyph("😀"));
        assert!(palette.add_glyph("🚀"));
        assert_eq!(palette.glyphs(), &["😀", "🚀"]);
    }

    #[test]
    fn test_new_store_is_seeded_with_builtins() {
        let store = PaletteStore::new("Main");
        assert!(store.count() > 0);
        assert_eq!(store.cursor_index(), 0);
    }

    #[test]
    fn test_with_palettes_rejects_empty() {
        assert_eq!(
            PaletteStore::with_palettes("empty", Vec::new()).unwrap_err(),
            PaletteError::WouldEmpty
        );
    }

    #[test]
    fn test_cursor_wraps_both_directions() {
        let mut store = small_store();
        store.advance_cursor(1);
        assert_eq!(store.cursor_index(), 1);
        store.advance_cursor(5);
        assert_eq!(store.cursor_index(), 0);
        store.advance_cursor(-1);
        assert_eq!(store.cursor_index(), 2);
        store.advance_cursor(-7);
        assert_eq!(store.cursor_index(), 1);
    }

    #[test]
    fn test_cursor_always_lands_in_range() {
        let mut store = small_store();
        for by in [-10_i64, -3, -1, 0, 1, 4, 99, -99] {
            store.advance_cursor(by);
            assert!(store.cursor_index() < store.count(), "by = {by}");
        }
    }

    #[test]
    fn test_insert_or_replace_moves_existing() {
        let mut store = small_store();
        let mut edited = store.palettes()[2].clone();
        edited.set_name("edited");

        store.insert_or_replace(edited.clone(), Some(0));

        assert_eq!(store.count(), 3);
        assert_eq!(store.palettes()[0], edited);
    }

    #[test]
    fn test_insert_or_replace_defaults_to_cursor() {
        let mut store = small_store();
        store.advance_cursor(1);
        let fresh = Palette::new("fresh", ["✨"]);

        store.insert_or_replace(fresh.clone(), None);

        assert_eq!(store.count(), 4);
        assert_eq!(store.palettes()[1], fresh);
    }

    #[test]
    fn test_append_or_replace_moves_duplicate_to_end() {
        let mut store = small_store();
        let mut edited = store.palettes()[0].clone();
        edited.add_glyph("✨");

        store.append_or_replace(edited.clone());

        assert_eq!(store.count(), 3);
        assert_eq!(*store.palettes().last().expect("non-empty"), edited);
    }

    #[test]
    fn test_append_or_replace_single_palette_swaps_wholesale() {
        let only = Palette::new("only", ["😀"]);
        let mut store =
            PaletteStore::with_palettes("one", vec![only.clone()]).expect("non-empty");

        let mut edited = only;
        edited.set_name("renamed");
        store.append_or_replace(edited.clone());

        assert_eq!(store.count(), 1);
        assert_eq!(store.palettes()[0], edited);
    }

    #[test]
    fn test_remove_refuses_to_empty_the_store() {
        let mut store =
            PaletteStore::with_palettes("one", vec![Palette::new("only", ["😀"])])
                .expect("non-empty");
        assert_eq!(store.remove(0).unwrap_err(), PaletteError::WouldEmpty);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut store = small_store();
        assert_eq!(store.remove(7).unwrap_err(), PaletteError::OutOfRange(7));
    }

    #[test]
    fn test_remove_keeps_cursor_in_range() {
        let mut store = small_store();
        store.advance_cursor(2);
        store.remove(2).expect("removable");
        assert!(store.cursor_index() < store.count());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let kv = MemoryKeyValueStore::new();
        let mut store = small_store();
        store.advance_cursor(1);
        store.save(&kv);

        let loaded = PaletteStore::load("test", &kv);
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_load_missing_falls_back_to_builtins() {
        let kv = MemoryKeyValueStore::new();
        let store = PaletteStore::load("nowhere", &kv);
        assert_eq!(store.palettes().len(), Palette::builtins().len());
    }

    #[test]
    fn test_load_corrupt_falls_back_to_builtins() {
        let kv = MemoryKeyValueStore::new();
        kv.set("broken", b"not json at all".to_vec());
        let store = PaletteStore::load("broken", &kv);
        assert_eq!(store.name(), "broken");
        assert!(store.count() > 0);
    }
}
