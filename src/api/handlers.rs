use crate::domain::events::OpenMode;
use crate::ports::EventStore;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use super::{
    error::ApiError,
    types::{EventResponse, EventsSinceQuery, StreamEventsQuery, StreamResponse},
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub event_store: Arc<dyn EventStore>,
}

// ============================================================================
// Query handlers (GET)
// ============================================================================

/// GET /streams/:name - ストリームの現在のバージョンとスナップショットバージョン
pub async fn get_stream(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<StreamResponse>, ApiError> {
    let info = state
        .event_store
        .open_stream(&name, OpenMode::OpenExisting)
        .await?
        .ok_or_else(|| ApiError::StreamNotFound(name.clone()))?;

    Ok(Json(StreamResponse::from(info)))
}

/// GET /streams/:name/events?from=N - ストリームのイベント（バージョン順）
pub async fn get_stream_events(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<StreamEventsQuery>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    state
        .event_store
        .open_stream(&name, OpenMode::OpenExisting)
        .await?;

    let events = state
        .event_store
        .load_events(&name, query.from.unwrap_or(1))
        .await?;

    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

/// GET /events?since=N - ストア全体のイベント（クロック順）
///
/// 購読者は最後に受け取ったクロック値 + 1 を次の since に渡す。
pub async fn get_events_since(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsSinceQuery>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let events = state
        .event_store
        .events_since(query.since.unwrap_or(0))
        .await?;

    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

/// GET /events/unpublished - バスへ未発行のイベント
pub async fn get_unpublished_events(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let events = state.event_store.unpublished_events().await?;

    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}
