//! Background resolver integration tests: the full fetch/decode cycle,
//! stale-fetch suppression, and resolver wiring through the document store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;
use url::Url;

use board_core::{
    Background, BackgroundImage, BackgroundResolver, BoardError, DocumentStore, FetchStatus,
    ImageDecoder, ImageFetcher,
};

/// Serves canned bytes per URL. URLs with a gate block until the gate is
/// released, which lets tests hold a fetch in flight.
struct StubFetcher {
    responses: HashMap<Url, Vec<u8>>,
    gates: HashMap<Url, Arc<Notify>>,
}

impl StubFetcher {
    fn new() -> Self {
        Self {
            responses: HashMap::new(),
            gates: HashMap::new(),
        }
    }

    fn serve(mut self, url: &Url, bytes: &[u8]) -> Self {
        self.responses.insert(url.clone(), bytes.to_vec());
        self
    }

    fn gate(mut self, url: &Url, gate: Arc<Notify>) -> Self {
        self.gates.insert(url.clone(), gate);
        self
    }
}

#[async_trait]
impl ImageFetcher for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, BoardError> {
        if let Some(gate) = self.gates.get(url) {
            gate.notified().await;
        }
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| BoardError::Fetch(format!("no canned response for {url}")))
    }
}

/// Treats any non-empty payload as a 1x1 image carrying the payload, so each
/// test can tell exactly which bytes made it through.
struct StubDecoder;

impl ImageDecoder for StubDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<BackgroundImage, BoardError> {
        if bytes.is_empty() {
            return Err(BoardError::Decode("empty payload".into()));
        }
        Ok(BackgroundImage::from_rgba(1, 1, bytes.to_vec()))
    }
}

fn url(s: &str) -> Url {
    Url::parse(s).expect("valid test url")
}

fn resolved_pixels(status: &FetchStatus) -> Option<&[u8]> {
    status.image().map(BackgroundImage::pixels)
}

#[tokio::test]
async fn test_remote_fetch_resolves() {
    let bg = url("https://example.com/a.png");
    let fetcher = StubFetcher::new().serve(&bg, b"pixels-a");
    let resolver = BackgroundResolver::with_collaborators(Arc::new(fetcher), Arc::new(StubDecoder));

    resolver.resolve(&Background::Url(bg)).await;
    assert_eq!(resolved_pixels(&resolver.status()), Some(&b"pixels-a"[..]));
}

#[tokio::test]
async fn test_remote_fetch_failure_is_reported_not_fatal() {
    let bg = url("https://example.com/missing.png");
    let resolver = BackgroundResolver::with_collaborators(
        Arc::new(StubFetcher::new()),
        Arc::new(StubDecoder),
    );

    resolver.resolve(&Background::Url(bg)).await;
    assert!(resolver.status().failure_reason().is_some());
    assert!(resolver.last_good_image().is_none());
}

#[tokio::test]
async fn test_stale_fetch_is_discarded() {
    let url_a = url("https://example.com/slow.png");
    let url_b = url("https://example.com/fast.png");
    let gate = Arc::new(Notify::new());
    let fetcher = StubFetcher::new()
        .serve(&url_a, b"stale")
        .serve(&url_b, b"fresh")
        .gate(&url_a, gate.clone());
    let resolver = BackgroundResolver::with_collaborators(Arc::new(fetcher), Arc::new(StubDecoder));

    // A's fetch starts and parks on the gate.
    resolver.resolve_detached(&Background::Url(url_a.clone()));
    assert_eq!(resolver.status(), FetchStatus::Fetching(url_a));

    // B supersedes A while A is still in flight.
    resolver.resolve(&Background::Url(url_b)).await;
    assert_eq!(resolved_pixels(&resolver.status()), Some(&b"fresh"[..]));

    // A's fetch now completes, but its reference is no longer current, so
    // its result must be dropped.
    gate.notify_one();
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
    assert_eq!(resolved_pixels(&resolver.status()), Some(&b"fresh"[..]));
    let kept = resolver.last_good_image().expect("fresh image kept");
    assert_eq!(kept.pixels(), b"fresh");
}

#[tokio::test]
async fn test_failure_after_success_keeps_last_good() {
    let good = url("https://example.com/good.png");
    let bad = url("https://example.com/bad.png");
    let fetcher = StubFetcher::new().serve(&good, b"good").serve(&bad, b"");
    let resolver = BackgroundResolver::with_collaborators(Arc::new(fetcher), Arc::new(StubDecoder));

    resolver.resolve(&Background::Url(good)).await;
    resolver.resolve(&Background::Url(bad)).await;

    assert!(resolver.status().failure_reason().is_some());
    let kept = resolver.last_good_image().expect("kept across failure");
    assert_eq!(kept.pixels(), b"good");
}

#[tokio::test]
async fn test_blank_preempts_in_flight_fetch() {
    let slow = url("https://example.com/slow.png");
    let gate = Arc::new(Notify::new());
    let fetcher = StubFetcher::new()
        .serve(&slow, b"late")
        .gate(&slow, gate.clone());
    let resolver = BackgroundResolver::with_collaborators(Arc::new(fetcher), Arc::new(StubDecoder));

    resolver.resolve_detached(&Background::Url(slow));
    resolver.resolve(&Background::Blank).await;
    assert_eq!(resolver.status(), FetchStatus::Idle);

    gate.notify_one();
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
    assert_eq!(resolver.status(), FetchStatus::Idle);
}

#[tokio::test]
async fn test_store_publishes_status_transitions() {
    let bg = url("https://example.com/board.png");
    let fetcher = StubFetcher::new().serve(&bg, b"board-pixels");
    let store = DocumentStore::with_collaborators(Arc::new(fetcher), Arc::new(StubDecoder));
    let id = store.create();

    let mut statuses = store.watch_fetch_status(id).expect("open");
    store
        .set_background(id, Background::Url(bg.clone()))
        .expect("open");

    // Fetching first, then resolved, without ever surfacing a stale result.
    let mut saw_fetching = false;
    loop {
        let status = statuses.borrow_and_update().clone();
        match status {
            FetchStatus::Fetching(ref in_flight) => {
                assert_eq!(*in_flight, bg);
                saw_fetching = true;
            }
            FetchStatus::Resolved(image) => {
                assert_eq!(image.pixels(), b"board-pixels");
                break;
            }
            FetchStatus::Idle => {}
            FetchStatus::Failed(reason) => panic!("unexpected failure: {reason}"),
        }
        statuses.changed().await.expect("resolver alive");
    }
    assert!(saw_fetching, "fetch should pass through the fetching state");
}

#[tokio::test]
async fn test_store_undo_after_failed_fetch_restores_previous_background() {
    let good = url("https://example.com/good.png");
    let bad = url("https://example.com/bad.png");
    let fetcher = StubFetcher::new().serve(&good, b"good");
    let store = DocumentStore::with_collaborators(Arc::new(fetcher), Arc::new(StubDecoder));
    let id = store.create();

    let mut statuses = store.watch_fetch_status(id).expect("open");
    store
        .set_background(id, Background::Url(good.clone()))
        .expect("open");
    wait_for(&mut statuses, |status| status.image().is_some()).await;

    store
        .set_background(id, Background::Url(bad))
        .expect("open");
    wait_for(&mut statuses, |status| status.failure_reason().is_some()).await;

    // The failure is reported, never auto-reverted; the last good image is
    // still there for display, and undo is the recovery path.
    assert_eq!(
        store.last_good_image(id).expect("kept").pixels(),
        b"good"
    );
    assert!(store.undo(id).expect("open"));
    assert_eq!(
        *store.document(id).expect("open").background(),
        Background::Url(good)
    );
    wait_for(&mut statuses, |status| status.image().is_some()).await;
}

async fn wait_for(
    statuses: &mut tokio::sync::watch::Receiver<FetchStatus>,
    predicate: impl Fn(&FetchStatus) -> bool,
) {
    loop {
        if predicate(&statuses.borrow_and_update()) {
            return;
        }
        statuses.changed().await.expect("resolver alive");
    }
}
