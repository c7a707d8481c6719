use serde::{Deserialize, Serialize};

use crate::domain::events::{StoredEvent, StreamInfo};
use crate::domain::message::Message;

/// ストリームのイベント取得のクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct StreamEventsQuery {
    /// このバージョン以降（既定は 1）
    pub from: Option<u64>,
}

/// ストア全体のイベント取得のクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct EventsSinceQuery {
    /// このクロック値以降（既定は 0 = すべて）
    pub since: Option<u64>,
}

/// ストリームレスポンス（GET /streams/:name）
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamResponse {
    pub name: String,
    pub version: u64,
    pub snapshot_version: u64,
}

impl From<StreamInfo> for StreamResponse {
    fn from(info: StreamInfo) -> Self {
        Self {
            name: info.name,
            version: info.version,
            snapshot_version: info.snapshot_version,
        }
    }
}

/// イベントレスポンス
///
/// ペイロードがメッセージとして読めればヘッダーと本文を展開する。
/// 本文は JSON として読める場合のみ含める。
#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    pub stream: String,
    pub version: u64,
    pub clock: u64,
    pub published: bool,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub size: usize,
}

impl From<StoredEvent> for EventResponse {
    fn from(event: StoredEvent) -> Self {
        let size = event.payload.len();
        let (headers, body) = match Message::from_bytes(&event.payload) {
            Ok(message) => (
                message.headers().to_pairs(),
                serde_json::from_slice(message.body()).ok(),
            ),
            Err(_) => (Vec::new(), None),
        };

        Self {
            stream: event.stream,
            version: event.version,
            clock: event.clock,
            published: event.published,
            headers,
            body,
            size,
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
