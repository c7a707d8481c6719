use axum::body::Body;
use axum::http::{Request, StatusCode};
use rusty_cqrs_store::adapters::memory::InMemoryEventStore;
use rusty_cqrs_store::api::handlers::AppState;
use rusty_cqrs_store::api::router::create_router;
use rusty_cqrs_store::api::types::*;
use rusty_cqrs_store::application::repository::{SaveContext, SaveFlags};
use rusty_cqrs_store::domain::{AggregateRoot, ExpectedVersion};
use rusty_cqrs_store::ports::EventStore;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower::ServiceExt;

mod common;

use common::*;

// ============================================================================
// テスト用のヘルパー関数
// ============================================================================

/// Account を2件のイベントで保存した状態のルーターを作成する
async fn setup_app() -> (axum::Router, Arc<dyn EventStore>) {
    let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
    let fixture = account_fixture(store.clone());

    let mut root = AggregateRoot::<Account>::new("acc-1".to_string());
    root.publish(AccountEvent::Opened {
        owner: "alice".to_string(),
    })
    .unwrap();
    root.publish(AccountEvent::Deposited { amount: 25 }).unwrap();
    fixture
        .repository
        .save(&mut root, &SaveContext::new(), SaveFlags::create())
        .await
        .unwrap();

    let app_state = Arc::new(AppState {
        event_store: store.clone(),
    });
    (create_router(app_state), store)
}

async fn get<T: DeserializeOwned>(app: &axum::Router, uri: &str) -> (StatusCode, T) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

// ============================================================================
// エンドポイント
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_get_stream() {
    let (app, _) = setup_app().await;

    let (status, stream): (_, StreamResponse) = get(&app, "/streams/Account-acc-1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(stream.name, "Account-acc-1");
    assert_eq!(stream.version, 2);
    assert_eq!(stream.snapshot_version, 0);
}

#[tokio::test]
async fn test_get_missing_stream_returns_404() {
    let (app, _) = setup_app().await;

    let (status, error): (_, ErrorResponse) = get(&app, "/streams/Account-nobody").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error.error, "STREAM_NOT_FOUND");

    let (status, _): (_, ErrorResponse) = get(&app, "/streams/Account-nobody/events").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_stream_events_expands_messages() {
    let (app, _) = setup_app().await;

    let (status, events): (_, Vec<EventResponse>) =
        get(&app, "/streams/Account-acc-1/events").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].version, 1);
    assert!(events[0].published);
    assert!(
        events[1]
            .headers
            .contains(&("TypePath".to_string(), "Account/Deposited".to_string()))
    );
    assert_eq!(
        events[1].body,
        Some(serde_json::json!({ "Deposited": { "amount": 25 } }))
    );

    let (_, tail): (_, Vec<EventResponse>) =
        get(&app, "/streams/Account-acc-1/events?from=2").await;
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].version, 2);
}

#[tokio::test]
async fn test_events_since_and_unpublished() {
    let (app, store) = setup_app().await;
    store
        .append("raw", ExpectedVersion::Any, vec![b"not a message".to_vec()])
        .await
        .unwrap();

    let (status, all): (_, Vec<EventResponse>) = get(&app, "/events").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.len(), 3);

    let (_, since): (_, Vec<EventResponse>) =
        get(&app, &format!("/events?since={}", all[1].clock)).await;
    assert_eq!(since.len(), 2);
    assert_eq!(since[0].clock, all[1].clock);

    let (_, unpublished): (_, Vec<EventResponse>) = get(&app, "/events/unpublished").await;
    assert_eq!(unpublished.len(), 1);
    assert_eq!(unpublished[0].stream, "raw");
    // メッセージとして読めないペイロードは展開しない
    assert!(unpublished[0].headers.is_empty());
    assert_eq!(unpublished[0].body, None);
    assert_eq!(unpublished[0].size, 13);
}
