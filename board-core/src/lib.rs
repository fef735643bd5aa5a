//! # Board Core
//!
//! Core document model for an emoji board editor: immutable document
//! snapshots, an undo-aware mutation protocol, asynchronous background image
//! resolution, and named emoji palettes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 board-core                  │
//! ├─────────────────────────────────────────────┤
//! │  Document        │  Edit History            │
//! │  - Emoji         │  - Labelled steps        │
//! │  - Background    │  - Snapshot stacks       │
//! ├─────────────────────────────────────────────┤
//! │  Background      │  Palette Store           │
//! │  Resolver        │  - Dedup by identity     │
//! │  - Fetch/decode  │  - Wrapping cursor       │
//! │  - Stale guard   │  - Keyed persistence     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Presentation code observes snapshots and statuses; it never mutates
//! shared objects directly. Every user-facing mutation goes through
//! [`BoardState::perform`] (or a [`DocumentStore`] passthrough), which makes
//! it undoable under a display label.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod background;
pub mod document;
pub mod emoji;
pub mod error;
pub mod history;
pub mod palette;
pub mod resolver;
pub mod schema;
pub mod state;
pub mod store;

pub use background::Background;
pub use document::{Document, Edit};
pub use emoji::{Emoji, EmojiId, Position, MIN_EMOJI_SIZE};
pub use error::{BoardError, BoardResult};
pub use history::EditHistory;
pub use palette::{KeyValueStore, MemoryKeyValueStore, Palette, PaletteError, PaletteStore};
pub use resolver::{
    BackgroundImage, BackgroundResolver, FetchStatus, HttpFetcher, ImageDecoder, ImageFetcher,
    PixelDecoder,
};
pub use schema::{DocumentRecord, EmojiRecord};
pub use state::BoardState;
pub use store::{DocumentStore, StoreError};

/// Board core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
