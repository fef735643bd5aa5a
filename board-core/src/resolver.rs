//! Asynchronous background image resolution.
//!
//! [`BackgroundResolver`] turns a document's [`Background`] reference into
//! decoded pixels, tracking progress through [`FetchStatus`]. Any reference
//! change restarts the cycle, including while a fetch is in flight; a fetch
//! that completes after its reference was replaced is detected and dropped,
//! so a slow stale fetch can never clobber a newer request's outcome.
//! Last-write-wins is decided by reference identity, not by completion time.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use url::Url;

use crate::background::Background;
use crate::error::BoardError;

/// Decoded RGBA pixels for a background image.
///
/// Pixels sit behind an `Arc`, so cloning a status or handing images to
/// observers is cheap.
#[derive(Clone, PartialEq, Eq)]
pub struct BackgroundImage {
    width: u32,
    height: u32,
    pixels: Arc<Vec<u8>>,
}

impl BackgroundImage {
    /// Wrap raw RGBA pixel data (4 bytes per pixel, row-major).
    #[must_use]
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels: Arc::new(pixels),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// RGBA bytes, `width * height * 4` of them.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

// Keep pixel dumps out of logs and assertion output.
impl fmt::Debug for BackgroundImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BackgroundImage({}x{})", self.width, self.height)
    }
}

/// Where resolution currently stands for one document. Ephemeral, never
/// persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FetchStatus {
    /// No background to resolve.
    #[default]
    Idle,
    /// A remote reference is being fetched.
    Fetching(Url),
    /// The background decoded successfully.
    Resolved(BackgroundImage),
    /// Fetching or decoding failed. Sticky until the next background change;
    /// the UI is expected to offer undoing the background change.
    Failed(String),
}

impl FetchStatus {
    /// The decoded image, if resolution succeeded.
    #[must_use]
    pub fn image(&self) -> Option<&BackgroundImage> {
        match self {
            Self::Resolved(image) => Some(image),
            _ => None,
        }
    }

    /// The URL currently in flight, if any.
    #[must_use]
    pub fn url_being_fetched(&self) -> Option<&Url> {
        match self {
            Self::Fetching(url) => Some(url),
            _ => None,
        }
    }

    /// True while a remote fetch is in flight.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        matches!(self, Self::Fetching(_))
    }

    /// The failure reason, if resolution failed.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Retrieves raw image bytes for a remote reference.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the bytes behind `url`.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Fetch`] when the bytes cannot be retrieved.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, BoardError>;
}

/// Decodes raw bytes into displayable pixels.
pub trait ImageDecoder: Send + Sync {
    /// Decode `bytes` into an RGBA image.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Decode`] when the bytes are not a readable
    /// image.
    fn decode(&self, bytes: &[u8]) -> Result<BackgroundImage, BoardError>;
}

/// Default fetcher backed by a shared reqwest client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a fresh client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, BoardError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| BoardError::Fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| BoardError::Fetch(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BoardError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Default decoder backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelDecoder;

impl ImageDecoder for PixelDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<BackgroundImage, BoardError> {
        let decoded =
            image::load_from_memory(bytes).map_err(|e| BoardError::Decode(e.to_string()))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(BackgroundImage::from_rgba(width, height, rgba.into_raw()))
    }
}

/// The background resolution state machine for one document.
///
/// Cheap to clone; clones share the state machine and the status channel.
#[derive(Clone)]
pub struct BackgroundResolver {
    fetcher: Arc<dyn ImageFetcher>,
    decoder: Arc<dyn ImageDecoder>,
    /// The reference most recently handed to resolution. A completing fetch
    /// must still match this to publish its outcome.
    current: Arc<Mutex<Background>>,
    /// Most recent successfully decoded image, kept across failures so the
    /// UI can keep showing the last good background.
    last_good: Arc<Mutex<Option<BackgroundImage>>>,
    status: watch::Sender<FetchStatus>,
}

impl BackgroundResolver {
    /// Resolver with the default HTTP fetcher and pixel decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::with_collaborators(Arc::new(HttpFetcher::new()), Arc::new(PixelDecoder))
    }

    /// Resolver with injected fetch/decode collaborators.
    #[must_use]
    pub fn with_collaborators(
        fetcher: Arc<dyn ImageFetcher>,
        decoder: Arc<dyn ImageDecoder>,
    ) -> Self {
        let (status, _) = watch::channel(FetchStatus::Idle);
        Self {
            fetcher,
            decoder,
            current: Arc::new(Mutex::new(Background::Blank)),
            last_good: Arc::new(Mutex::new(None)),
            status,
        }
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> FetchStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to status transitions.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<FetchStatus> {
        self.status.subscribe()
    }

    /// The most recent successfully decoded image. Survives later failures,
    /// so a failed replacement can keep rendering the previous background.
    #[must_use]
    pub fn last_good_image(&self) -> Option<BackgroundImage> {
        self.last_good
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drive resolution for a new background reference, inline.
    ///
    /// Blank and inline-byte references settle synchronously before the
    /// first await; remote references are fetched to completion. A newer
    /// resolution issued concurrently supersedes this one.
    pub async fn resolve(&self, background: &Background) {
        if let Some(url) = self.begin(background) {
            self.run_fetch(url).await;
        }
    }

    /// Drive resolution on a background task.
    ///
    /// The reference swap and the blank/inline cases still happen
    /// synchronously before this returns; only a remote fetch is spawned.
    /// Must be called within a tokio runtime when `background` is a remote
    /// reference.
    pub fn resolve_detached(&self, background: &Background) {
        if let Some(url) = self.begin(background) {
            let resolver = self.clone();
            tokio::spawn(async move { resolver.run_fetch(url).await });
        }
    }

    /// Install `background` as the current reference and settle every case
    /// that needs no network. Returns the URL still left to fetch, if any.
    ///
    /// The reference guard is held across the synchronous publish, so a
    /// completing fetch can never interleave with it.
    fn begin(&self, background: &Background) -> Option<Url> {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *current = background.clone();
        match background {
            Background::Blank => {
                self.status.send_replace(FetchStatus::Idle);
                None
            }
            Background::Bytes(bytes) => {
                match self.decoder.decode(bytes) {
                    Ok(image) => self.publish_resolved(image),
                    Err(e) => {
                        tracing::warn!("inline background failed to decode: {e}");
                        self.status.send_replace(FetchStatus::Failed(e.to_string()));
                    }
                }
                None
            }
            Background::Url(url) => {
                self.status
                    .send_replace(FetchStatus::Fetching(url.clone()));
                Some(url.clone())
            }
        }
    }

    async fn run_fetch(&self, url: Url) {
        let outcome = match self.fetcher.fetch(&url).await {
            Ok(bytes) => self.decoder.decode(&bytes),
            Err(e) => Err(e),
        };

        // Publish only while the document still points at the reference this
        // fetch was started for; otherwise a newer request owns the status.
        // The guard stays held across the publish so no newer begin() can
        // slip in between the check and the send.
        let current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *current != Background::Url(url.clone()) {
            tracing::debug!(%url, "discarding stale background fetch");
            return;
        }
        match outcome {
            Ok(image) => self.publish_resolved(image),
            Err(e) => {
                tracing::warn!(%url, "background resolution failed: {e}");
                self.status.send_replace(FetchStatus::Failed(e.to_string()));
            }
        }
    }

    fn publish_resolved(&self, image: BackgroundImage) {
        *self
            .last_good
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(image.clone());
        self.status.send_replace(FetchStatus::Resolved(image));
    }
}

impl Default for BackgroundResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BackgroundResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundResolver")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
