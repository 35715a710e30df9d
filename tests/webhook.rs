// Webhook responder tests
//
// Drive the router in-process with an in-memory store and a recording
// notifier, then wait for the post-response side effects to land.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::middleware::map_response;
use axum::response::Response;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tower::ServiceExt;
use yo9gag::error::NotifyError;
use yo9gag::notify::Notifier;
use yo9gag::store::{KeyValueStore, LinkStore, MemoryStore};
use yo9gag::{router, stats, AppState};
use yo9gag_config::StoreKeys;

#[derive(Default)]
struct RecordingNotifier {
    yos: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    fn yos(&self) -> Vec<(String, String)> {
        self.yos.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn yo(&self, username: &str, link: &str) -> Result<(), NotifyError> {
        self.yos
            .lock()
            .unwrap()
            .push((username.to_string(), link.to_string()));
        Ok(())
    }

    async fn yo_all(&self, _link: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Never finishes a Yo until released
#[derive(Default)]
struct GatedNotifier {
    release: Notify,
}

#[async_trait]
impl Notifier for GatedNotifier {
    async fn yo(&self, _username: &str, _link: &str) -> Result<(), NotifyError> {
        self.release.notified().await;
        Ok(())
    }

    async fn yo_all(&self, _link: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

struct Fixture {
    backend: Arc<MemoryStore>,
    state: AppState,
}

async fn fixture(links: &[&str], notifier: Arc<dyn Notifier>) -> Fixture {
    let backend = Arc::new(MemoryStore::new());
    let links: Vec<String> = links.iter().map(|l| l.to_string()).collect();
    backend.add_members("top9gags", &links).await.unwrap();

    let store = LinkStore::new(backend.clone(), StoreKeys::default());
    let state = AppState::new(store, notifier, links.len());
    Fixture { backend, state }
}

async fn get(state: &AppState, uri: &str) -> StatusCode {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router(state.clone())
        .oneshot(request)
        .await
        .unwrap()
        .status()
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test]
async fn test_yo_callback_scenario() {
    let notifier = Arc::new(RecordingNotifier::default());
    let fx = fixture(&["urlA"], notifier.clone()).await;
    let today = stats::today();

    let status = get(&fx.state, "/yo/?username=alice&user_ip=1.2.3.4").await;
    assert_eq!(status, StatusCode::OK);

    wait_for(|| {
        !notifier.yos().is_empty()
            && fx.backend.counter("statistics:yo", &today).is_some()
            && fx
                .backend
                .counter("statistics:new_subscribers", &today)
                .is_some()
    })
    .await;

    assert_eq!(
        notifier.yos(),
        vec![("ALICE".to_string(), "urlA".to_string())]
    );
    assert_eq!(fx.backend.members("yo9gag_subscribers"), vec!["ALICE"]);
    assert_eq!(fx.backend.counter("statistics:yo", &today), Some(1));
    assert_eq!(
        fx.backend.counter("statistics:new_subscribers", &today),
        Some(1)
    );
}

#[tokio::test]
async fn test_missing_or_empty_username_is_rejected_without_side_effects() {
    let notifier = Arc::new(RecordingNotifier::default());
    let fx = fixture(&["urlA"], notifier.clone()).await;

    assert_eq!(get(&fx.state, "/yo/").await, StatusCode::BAD_REQUEST);
    assert_eq!(
        get(&fx.state, "/yo/?username=&user_ip=1.2.3.4").await,
        StatusCode::BAD_REQUEST
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(notifier.yos().is_empty());
    assert!(fx.backend.members("yo9gag_subscribers").is_empty());
    assert_eq!(fx.backend.counter("statistics:yo", &stats::today()), None);
}

#[tokio::test]
async fn test_username_casing_maps_to_one_subscriber() {
    let notifier = Arc::new(RecordingNotifier::default());
    let fx = fixture(&["urlA"], notifier.clone()).await;
    let today = stats::today();

    assert_eq!(get(&fx.state, "/yo/?username=alice").await, StatusCode::OK);
    wait_for(|| fx.backend.counter("statistics:yo", &today) == Some(1)).await;
    wait_for(|| fx.backend.counter("statistics:new_subscribers", &today) == Some(1)).await;

    assert_eq!(get(&fx.state, "/yo/?username=AlIcE").await, StatusCode::OK);
    wait_for(|| fx.backend.counter("statistics:yo", &today) == Some(2)).await;
    wait_for(|| notifier.yos().len() == 2).await;

    assert_eq!(fx.backend.members("yo9gag_subscribers"), vec!["ALICE"]);
    assert_eq!(
        fx.backend.counter("statistics:new_subscribers", &today),
        Some(1)
    );
}

#[tokio::test]
async fn test_received_counter_counts_every_yo() {
    let notifier = Arc::new(RecordingNotifier::default());
    let fx = fixture(&["urlA", "urlB"], notifier.clone()).await;
    let today = stats::today();

    for name in ["bob", "carol", "dave", "bob"] {
        let uri = format!("/yo/?username={}", name);
        assert_eq!(get(&fx.state, &uri).await, StatusCode::OK);
    }

    wait_for(|| fx.backend.counter("statistics:yo", &today) == Some(4)).await;
    wait_for(|| notifier.yos().len() == 4).await;
    wait_for(|| fx.backend.counter("statistics:new_subscribers", &today) == Some(3)).await;

    for (_, link) in notifier.yos() {
        assert!(link == "urlA" || link == "urlB");
    }
}

#[tokio::test]
async fn test_empty_candidate_set_still_records_statistics() {
    let notifier = Arc::new(RecordingNotifier::default());
    let fx = fixture(&[], notifier.clone()).await;
    let today = stats::today();

    assert_eq!(get(&fx.state, "/yo/?username=erin").await, StatusCode::OK);

    wait_for(|| {
        fx.backend.counter("statistics:yo", &today) == Some(1)
            && fx.backend.counter("statistics:new_subscribers", &today) == Some(1)
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(notifier.yos().is_empty());
}

#[tokio::test]
async fn test_response_does_not_wait_for_the_yo() {
    let notifier = Arc::new(GatedNotifier::default());
    let fx = fixture(&["urlA"], notifier.clone()).await;
    let today = stats::today();

    // The Yo never completes, yet the callback is answered and the other
    // side effects still land
    let status = tokio::time::timeout(
        Duration::from_secs(2),
        get(&fx.state, "/yo/?username=frank"),
    )
    .await
    .expect("response must not wait for side effects");
    assert_eq!(status, StatusCode::OK);

    wait_for(|| {
        fx.backend.counter("statistics:yo", &today) == Some(1)
            && fx.backend.members("yo9gag_subscribers") == vec!["FRANK".to_string()]
    })
    .await;

    notifier.release.notify_waiters();
}

fn side_effects_seen(backend: &MemoryStore, notifier: &RecordingNotifier) -> bool {
    backend.counter("statistics:yo", &stats::today()).is_some()
        || !backend.members("yo9gag_subscribers").is_empty()
        || !notifier.yos().is_empty()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_side_effects_start_after_the_response_is_delivered() {
    let notifier = Arc::new(RecordingNotifier::default());
    let fx = fixture(&["urlA"], notifier.clone()).await;
    let today = stats::today();
    let touched_before_delivery = Arc::new(AtomicBool::new(false));

    // Slow response path between the handler and the client
    let backend = fx.backend.clone();
    let seen = notifier.clone();
    let flag = touched_before_delivery.clone();
    let app = router(fx.state.clone()).layer(map_response(move |response: Response| {
        let backend = backend.clone();
        let seen = seen.clone();
        let flag = flag.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(side_effects_seen(&backend, &seen), Ordering::SeqCst);
            response
        }
    }));

    let request = Request::builder()
        .uri("/yo/?username=alice")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!touched_before_delivery.load(Ordering::SeqCst));

    // Headers are out but the body is still held by the client
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!side_effects_seen(&fx.backend, &notifier));

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], br#"{"status":"ok"}"#);

    wait_for(|| {
        notifier.yos().len() == 1
            && fx.backend.counter("statistics:yo", &today) == Some(1)
            && fx.backend.counter("statistics:new_subscribers", &today) == Some(1)
    })
    .await;
}

#[tokio::test]
async fn test_health_check() {
    let fx = fixture(&[], Arc::new(RecordingNotifier::default())).await;
    assert_eq!(get(&fx.state, "/health").await, StatusCode::OK);
}
