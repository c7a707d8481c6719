use crate::domain::errors::EventStoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// イベントストアのエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub enum ApiError {
    StreamNotFound(String),
    Store(EventStoreError),
}

impl From<EventStoreError> for ApiError {
    fn from(err: EventStoreError) -> Self {
        match err {
            EventStoreError::StreamDoesNotExist(name) => ApiError::StreamNotFound(name),
            other => ApiError::Store(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            // 404 Not Found - リクエストされたストリームが存在しない
            ApiError::StreamNotFound(name) => (
                StatusCode::NOT_FOUND,
                "STREAM_NOT_FOUND",
                format!("Stream {} not found", name),
            ),

            // 409 Conflict - 楽観的同時実行制御の衝突
            ApiError::Store(ref e) if e.is_conflict() => {
                (StatusCode::CONFLICT, "VERSION_CONFLICT", e.to_string())
            }

            // 500 Internal Server Error - システム障害
            // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
            ApiError::Store(ref e) => {
                tracing::error!("Event store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EVENT_STORE_ERROR",
                    "Failed to read from event store".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
