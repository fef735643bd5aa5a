//! Shared multi-document storage.
//!
//! [`DocumentStore`] owns the open documents, serializes all mutation behind
//! one lock, wires each document to its own background resolver, and
//! autosaves into a data directory when one is configured. It is the
//! thread-safe surface the presentation layer talks to.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::background::Background;
use crate::document::Document;
use crate::emoji::{EmojiId, Position};
use crate::error::BoardError;
use crate::resolver::{
    BackgroundImage, BackgroundResolver, FetchStatus, HttpFetcher, ImageDecoder, ImageFetcher,
    PixelDecoder,
};
use crate::state::BoardState;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested document is not open in this store.
    #[error("document not open: {0}")]
    DocumentNotOpen(Uuid),

    /// The persisted bytes could not be decoded.
    #[error(transparent)]
    Corrupt(#[from] BoardError),

    /// An I/O error occurred during persistence.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// No data directory is configured for disk persistence.
    #[error("no data directory configured")]
    NoDataDir,
}

/// One open document: its editing state plus its resolver.
struct OpenDocument {
    state: BoardState,
    resolver: BackgroundResolver,
}

/// Thread-safe registry of open documents.
///
/// Mutation is serialized through a single lock, so an edit and its history
/// push land atomically; reads hand out cloned snapshots, never references
/// into shared state. Remote background fetches are spawned onto the ambient
/// tokio runtime; blank and inline backgrounds settle without one.
#[derive(Clone)]
pub struct DocumentStore {
    documents: Arc<Mutex<HashMap<Uuid, OpenDocument>>>,
    fetcher: Arc<dyn ImageFetcher>,
    decoder: Arc<dyn ImageDecoder>,
    /// Optional directory for autosave persistence.
    data_dir: Option<PathBuf>,
}

impl DocumentStore {
    /// In-memory store with the default fetch/decode collaborators.
    #[must_use]
    pub fn new() -> Self {
        Self::with_collaborators(Arc::new(HttpFetcher::new()), Arc::new(PixelDecoder))
    }

    /// Store with injected fetch/decode collaborators.
    #[must_use]
    pub fn with_collaborators(
        fetcher: Arc<dyn ImageFetcher>,
        decoder: Arc<dyn ImageDecoder>,
    ) -> Self {
        Self {
            documents: Arc::new(Mutex::new(HashMap::new())),
            fetcher,
            decoder,
            data_dir: None,
        }
    }

    /// Store that autosaves documents into `data_dir` after every edit.
    ///
    /// The directory is created if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir: Some(data_dir),
            ..Self::new()
        })
    }

    /// Open a fresh empty document and return its id.
    #[must_use]
    pub fn create(&self) -> Uuid {
        let state = BoardState::new();
        let id = state.document().id();
        self.install(id, state);
        tracing::debug!(%id, "created document");
        id
    }

    /// Open a document from persisted bytes.
    ///
    /// The stored background starts resolving right away.
    ///
    /// # Errors
    ///
    /// Returns a corrupt-document error when the bytes do not match the
    /// schema; nothing is installed in that case.
    pub fn open_bytes(&self, bytes: &[u8]) -> Result<Uuid, StoreError> {
        let document = Document::from_bytes(bytes)?;
        let id = document.id();
        let background = document.background().clone();
        let resolver = self.install(id, BoardState::from_document(document));
        resolver.resolve_detached(&background);
        Ok(id)
    }

    /// Close a document, dropping its history and fetch status.
    pub fn close(&self, id: Uuid) {
        self.lock().remove(&id);
    }

    /// Snapshot of a document.
    #[must_use]
    pub fn document(&self, id: Uuid) -> Option<Document> {
        self.lock().get(&id).map(|open| open.state.document().clone())
    }

    /// Ids of all open documents.
    #[must_use]
    pub fn document_ids(&self) -> Vec<Uuid> {
        self.lock().keys().copied().collect()
    }

    /// Run `f` against a document's editing state.
    ///
    /// Background changes produced by `f` - edits, but also undo/redo
    /// restoring an older background - re-trigger resolution, and the
    /// document is autosaved afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentNotOpen`] if the document is not open.
    pub fn edit<F, R>(&self, id: Uuid, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut BoardState) -> R,
    {
        let result = {
            let mut documents = self.lock();
            let open = documents
                .get_mut(&id)
                .ok_or(StoreError::DocumentNotOpen(id))?;
            let before = open.state.document().background().clone();
            let result = f(&mut open.state);
            let after = open.state.document().background();
            if *after != before {
                open.resolver.resolve_detached(after);
            }
            result
        };
        self.autosave(id);
        Ok(result)
    }

    /// Run `f` against a read-only view of a document's editing state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentNotOpen`] if the document is not open.
    fn read<F, R>(&self, id: Uuid, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&BoardState) -> R,
    {
        let documents = self.lock();
        let open = documents.get(&id).ok_or(StoreError::DocumentNotOpen(id))?;
        Ok(f(&open.state))
    }

    // -----------------------------------------------------------------------
    // Intent passthroughs
    // -----------------------------------------------------------------------

    /// Place an emoji (undoable).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentNotOpen`] if the document is not open.
    pub fn add_emoji(
        &self,
        id: Uuid,
        glyph: &str,
        position: Position,
        size: u32,
    ) -> Result<(), StoreError> {
        self.edit(id, |state| state.add_emoji(glyph, position, size))
    }

    /// Delete an emoji (undoable; unknown emoji ids are a no-op).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentNotOpen`] if the document is not open.
    pub fn remove_emoji(&self, id: Uuid, emoji: EmojiId) -> Result<(), StoreError> {
        self.edit(id, |state| state.remove_emoji(emoji))
    }

    /// Move an emoji by an integer delta (undoable; unknown ids no-op).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentNotOpen`] if the document is not open.
    pub fn move_emoji(
        &self,
        id: Uuid,
        emoji: EmojiId,
        dx: i32,
        dy: i32,
    ) -> Result<(), StoreError> {
        self.edit(id, |state| state.move_emoji(emoji, dx, dy))
    }

    /// Scale an emoji's nominal size (undoable; unknown ids no-op).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentNotOpen`] if the document is not open.
    pub fn resize_emoji(&self, id: Uuid, emoji: EmojiId, scale: f64) -> Result<(), StoreError> {
        self.edit(id, |state| state.resize_emoji(emoji, scale))
    }

    /// Replace the background (undoable).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentNotOpen`] if the document is not open.
    pub fn set_background(&self, id: Uuid, background: Background) -> Result<(), StoreError> {
        self.edit(id, |state| state.set_background(background))
    }

    /// Reset the background to blank (undoable).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentNotOpen`] if the document is not open.
    pub fn clear_background(&self, id: Uuid) -> Result<(), StoreError> {
        self.edit(id, BoardState::clear_background)
    }

    /// Undo the most recent step. Returns whether anything was undone.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentNotOpen`] if the document is not open.
    pub fn undo(&self, id: Uuid) -> Result<bool, StoreError> {
        self.edit(id, BoardState::undo)
    }

    /// Re-apply the most recently undone step. Returns whether anything was
    /// redone.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentNotOpen`] if the document is not open.
    pub fn redo(&self, id: Uuid) -> Result<bool, StoreError> {
        self.edit(id, BoardState::redo)
    }

    /// True when the document has at least one undoable step.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentNotOpen`] if the document is not open.
    pub fn can_undo(&self, id: Uuid) -> Result<bool, StoreError> {
        self.read(id, BoardState::can_undo)
    }

    /// True when the document has at least one redoable step.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentNotOpen`] if the document is not open.
    pub fn can_redo(&self, id: Uuid) -> Result<bool, StoreError> {
        self.read(id, BoardState::can_redo)
    }

    /// Label of the step undo would revert, for UI display.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentNotOpen`] if the document is not open.
    pub fn undo_label(&self, id: Uuid) -> Result<Option<String>, StoreError> {
        self.read(id, |state| state.undo_label().map(str::to_owned))
    }

    /// Label of the step redo would re-apply, for UI display.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentNotOpen`] if the document is not open.
    pub fn redo_label(&self, id: Uuid) -> Result<Option<String>, StoreError> {
        self.read(id, |state| state.redo_label().map(str::to_owned))
    }

    // -----------------------------------------------------------------------
    // Background resolution
    // -----------------------------------------------------------------------

    /// Current background fetch status for a document.
    #[must_use]
    pub fn fetch_status(&self, id: Uuid) -> Option<FetchStatus> {
        self.lock().get(&id).map(|open| open.resolver.status())
    }

    /// Subscribe to a document's background fetch transitions.
    #[must_use]
    pub fn watch_fetch_status(&self, id: Uuid) -> Option<watch::Receiver<FetchStatus>> {
        self.lock().get(&id).map(|open| open.resolver.watch_status())
    }

    /// The last successfully decoded background image for a document,
    /// retained across later failures.
    #[must_use]
    pub fn last_good_image(&self, id: Uuid) -> Option<BackgroundImage> {
        self.lock()
            .get(&id)
            .and_then(|open| open.resolver.last_good_image())
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Encode a document to its persisted byte format.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentNotOpen`] if the document is not open,
    /// or a corrupt-document error if encoding fails.
    pub fn serialize(&self, id: Uuid) -> Result<Vec<u8>, StoreError> {
        let document = self.document(id).ok_or(StoreError::DocumentNotOpen(id))?;
        Ok(document.to_bytes()?)
    }

    /// Load a document previously saved under `id` from the data directory
    /// and open it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoDataDir`] without a data directory,
    /// [`StoreError::Io`] if the file cannot be read, or a corrupt-document
    /// error if the bytes do not match the schema.
    pub fn load_from_disk(&self, id: Uuid) -> Result<Uuid, StoreError> {
        let data_dir = self.data_dir.as_ref().ok_or(StoreError::NoDataDir)?;
        let bytes = std::fs::read(data_dir.join(format!("{id}.json")))?;
        self.open_bytes(&bytes)
    }

    /// Ids of every document persisted in the data directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoDataDir`] without a data directory, or
    /// [`StoreError::Io`] if the directory cannot be read.
    pub fn saved_document_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let data_dir = self.data_dir.as_ref().ok_or(StoreError::NoDataDir)?;
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(data_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    if let Ok(id) = Uuid::parse_str(stem) {
                        ids.push(id);
                    }
                }
            }
        }
        Ok(ids)
    }

    /// Delete a document's persisted file. No-op without a data directory or
    /// when no file exists.
    pub fn delete_saved(&self, id: Uuid) {
        let Some(ref data_dir) = self.data_dir else {
            return;
        };
        let path = data_dir.join(format!("{id}.json"));
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(%id, "failed to delete saved document: {e}");
            }
        }
    }

    /// Save a document into the data directory. No-op without one; autosave
    /// failure is logged, never fatal.
    fn autosave(&self, id: Uuid) {
        let Some(ref data_dir) = self.data_dir else {
            return;
        };
        let Some(document) = self.document(id) else {
            return;
        };
        let bytes = match document.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%id, "autosave failed to encode document: {e}");
                return;
            }
        };
        let path = data_dir.join(format!("{id}.json"));
        if let Err(e) = std::fs::write(&path, bytes) {
            tracing::warn!(%id, path = %path.display(), "autosave failed: {e}");
        }
    }

    fn install(&self, id: Uuid, state: BoardState) -> BackgroundResolver {
        let resolver =
            BackgroundResolver::with_collaborators(self.fetcher.clone(), self.decoder.clone());
        self.lock().insert(
            id,
            OpenDocument {
                state,
                resolver: resolver.clone(),
            },
        );
        resolver
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, OpenDocument>> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("open", &self.lock().len())
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}
