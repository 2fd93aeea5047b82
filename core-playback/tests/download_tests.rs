//! Download coordinator tests with a mocked transport.

mod common;

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{BridgeError, HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use common::{ManualClock, MemoryFileSystem, START_TIME};
use core_playback::cache::{CacheKeyStrategy, DiskCache};
use core_playback::download::{DownloadCoordinator, DownloadOutcome};
use core_playback::PlaybackError;
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use mockall::mock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const URL: &str = "https://media.example.com/show/ep07.mp4";

mock! {
    pub Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

fn response(status: u16, body: &'static [u8]) -> HttpResponse {
    HttpResponse {
        status,
        headers: HashMap::new(),
        body: Bytes::from_static(body),
    }
}

struct Fixture {
    coordinator: DownloadCoordinator,
    outcomes: mpsc::UnboundedReceiver<DownloadOutcome>,
    cache: Arc<DiskCache>,
    bus: EventBus,
}

async fn fixture(http: MockHttp) -> Fixture {
    let clock = Arc::new(ManualClock::new(START_TIME));
    let fs = Arc::new(MemoryFileSystem::new(Arc::clone(&clock)));
    let cache = Arc::new(DiskCache::new(
        fs,
        clock,
        PathBuf::from("/cache/queue-player"),
        CacheKeyStrategy::LastPathSegment,
    ));
    cache.ensure_root().await.unwrap();

    let bus = EventBus::new(32);
    let (tx, outcomes) = mpsc::unbounded_channel();
    let coordinator = DownloadCoordinator::spawn(
        Arc::new(http),
        Arc::clone(&cache),
        Some(bus.clone()),
        move |outcome| {
            let _ = tx.send(outcome);
        },
    );

    Fixture {
        coordinator,
        outcomes,
        cache,
        bus,
    }
}

async fn next_outcome(rx: &mut mpsc::UnboundedReceiver<DownloadOutcome>) -> DownloadOutcome {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no download outcome")
        .expect("download worker stopped")
}

#[tokio::test]
async fn test_duplicate_fetch_issues_one_request() {
    let mut http = MockHttp::new();
    http.expect_execute()
        .withf(|request| request.url == URL && request.method == HttpMethod::Get)
        .times(1)
        .returning(|_| Ok(response(200, b"episode seven")));
    let mut f = fixture(http).await;

    assert!(f.coordinator.fetch(URL, 0, 0));
    assert!(!f.coordinator.fetch(URL, 0, 0));
    assert!(f.coordinator.in_flight().contains(URL));

    let outcome = next_outcome(&mut f.outcomes).await;
    assert!(f.coordinator.complete(&outcome));
    assert!(f.coordinator.in_flight().is_empty());

    let (path, size) = outcome.result.unwrap();
    assert_eq!(path, f.cache.local_path(URL));
    assert_eq!(size, 13);
    assert!(f.cache.has(URL).await.unwrap());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(f.outcomes.try_recv().is_err());
}

#[tokio::test]
async fn test_no_store_response_is_still_cached() {
    let mut http = MockHttp::new();
    http.expect_execute()
        .withf(|request| request.headers.is_empty())
        .times(1)
        .returning(|_| {
            let mut resp = response(200, b"episode seven");
            resp.headers
                .insert("Cache-Control".to_string(), "no-store".to_string());
            Ok(resp)
        });
    let mut f = fixture(http).await;

    f.coordinator.fetch(URL, 0, 0);
    let outcome = next_outcome(&mut f.outcomes).await;

    assert!(outcome.result.is_ok());
    assert!(f.cache.has(URL).await.unwrap());
}

#[tokio::test]
async fn test_http_error_status_is_reported() {
    let mut http = MockHttp::new();
    http.expect_execute()
        .times(1)
        .returning(|_| Ok(response(404, b"")));
    let mut f = fixture(http).await;

    f.coordinator.fetch(URL, 2, 0);
    let outcome = next_outcome(&mut f.outcomes).await;
    f.coordinator.complete(&outcome);

    let err = outcome.result.unwrap_err();
    assert!(matches!(err, PlaybackError::HttpStatus { status: 404, .. }));
    assert!(!err.is_transient());
    assert!(!f.cache.has(URL).await.unwrap());
    assert!(f.coordinator.in_flight().is_empty());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let mut http = MockHttp::new();
    http.expect_execute()
        .times(1)
        .returning(|_| Ok(response(503, b"")));
    let mut f = fixture(http).await;

    f.coordinator.fetch(URL, 0, 0);
    let outcome = next_outcome(&mut f.outcomes).await;

    assert!(outcome.result.unwrap_err().is_transient());
}

#[tokio::test]
async fn test_transport_failure_becomes_download_failed() {
    let mut http = MockHttp::new();
    http.expect_execute()
        .times(1)
        .returning(|_| Err(BridgeError::OperationFailed("connection reset".into())));
    let mut f = fixture(http).await;
    let mut events = f.bus.subscribe();

    f.coordinator.fetch(URL, 0, 0);
    let outcome = next_outcome(&mut f.outcomes).await;
    f.coordinator.complete(&outcome);

    match &outcome.result {
        Err(PlaybackError::DownloadFailed { identifier, reason }) => {
            assert_eq!(identifier, URL);
            assert!(reason.contains("connection reset"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(
        events.try_recv().unwrap(),
        CoreEvent::Download(DownloadEvent::Started {
            identifier: URL.to_string()
        })
    );
    assert!(matches!(
        events.try_recv().unwrap(),
        CoreEvent::Download(DownloadEvent::Failed { .. })
    ));
}

#[tokio::test]
async fn test_completion_from_cleared_generation_keeps_new_entry() {
    let mut http = MockHttp::new();
    http.expect_execute()
        .times(2)
        .returning(|_| Ok(response(200, b"payload")));
    let mut f = fixture(http).await;

    assert!(f.coordinator.fetch(URL, 0, 0));
    f.coordinator.clear();
    assert!(f.coordinator.fetch(URL, 0, 1));

    let mut outcomes = vec![
        next_outcome(&mut f.outcomes).await,
        next_outcome(&mut f.outcomes).await,
    ];
    outcomes.sort_by_key(|o| o.job.generation);

    assert!(!f.coordinator.complete(&outcomes[0]));
    assert!(f.coordinator.complete(&outcomes[1]));
    assert!(f.coordinator.in_flight().is_empty());
}

#[tokio::test]
async fn test_fetch_after_shutdown_is_refused() {
    let http = MockHttp::new();
    let f = fixture(http).await;

    f.coordinator.shutdown();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!f.coordinator.fetch(URL, 0, 0));
    assert!(f.coordinator.in_flight().is_empty());
}
