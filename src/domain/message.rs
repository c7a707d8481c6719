use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::errors::MessageError;
use super::value_objects::{CorrelationId, MessageId};

/// 型付きアクセサを持つヘッダー名
pub mod names {
    pub const ID: &str = "Id";
    pub const CORRELATION_ID: &str = "CorrelationId";
    pub const CREATED: &str = "Created";
    pub const DELIVERY_DELAY: &str = "DeliveryDelay";
    pub const TIME_TO_LIVE: &str = "TimeToLive";
    pub const RETRY_COUNT: &str = "RetryCount";
    pub const RESOURCE_PATH: &str = "ResourcePath";
    pub const TYPE_PATH: &str = "TypePath";
}

/// タイムスタンプのワイヤ形式（UTC、秒精度）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// メッセージヘッダー
///
/// 固定のヘッダー名は型付きで保持し、それ以外の拡張ヘッダーは文字列のまま保存する。
/// ワイヤ形式では名前と値の文字列ペアとして表現され、
/// 型付きヘッダーは既定値でない場合のみ、拡張ヘッダーは値が空でない場合のみ出力される。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    id: Option<MessageId>,
    correlation_id: Option<CorrelationId>,
    created: Option<DateTime<Utc>>,
    delivery_delay: Option<Duration>,
    time_to_live: Option<Duration>,
    retry_count: u32,
    resource_path: Option<String>,
    type_path: Option<String>,
    extensions: BTreeMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<MessageId> {
        self.id
    }

    pub fn set_id(&mut self, id: MessageId) {
        self.id = Some(id);
    }

    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
    }

    pub fn set_correlation_id(&mut self, id: CorrelationId) {
        self.correlation_id = Some(id);
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    /// 作成日時を設定する（ワイヤ形式に合わせて秒未満は切り捨て）
    pub fn set_created(&mut self, created: DateTime<Utc>) {
        self.created = Some(created.with_nanosecond(0).unwrap_or(created));
    }

    pub fn delivery_delay(&self) -> Option<Duration> {
        self.delivery_delay
    }

    pub fn set_delivery_delay(&mut self, delay: Duration) {
        self.delivery_delay = non_zero(delay);
    }

    /// 配信日時 = 作成日時 + 配信遅延（遅延がなければ作成日時）
    pub fn delivery_time(&self) -> Option<DateTime<Utc>> {
        self.created
            .map(|created| created + self.delivery_delay.unwrap_or_else(Duration::zero))
    }

    pub fn time_to_live(&self) -> Option<Duration> {
        self.time_to_live
    }

    pub fn set_time_to_live(&mut self, ttl: Duration) {
        self.time_to_live = non_zero(ttl);
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match (self.created, self.time_to_live) {
            (Some(created), Some(ttl)) => Some(created + ttl),
            _ => None,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn set_retry_count(&mut self, count: u32) {
        self.retry_count = count;
    }

    pub fn resource_path(&self) -> Option<&str> {
        self.resource_path.as_deref()
    }

    pub fn set_resource_path(&mut self, path: impl Into<String>) {
        self.resource_path = non_empty(path.into());
    }

    pub fn type_path(&self) -> Option<&str> {
        self.type_path.as_deref()
    }

    pub fn set_type_path(&mut self, path: impl Into<String>) {
        self.type_path = non_empty(path.into());
    }

    /// 拡張ヘッダーの値
    pub fn extension(&self, name: &str) -> Option<&str> {
        self.extensions.get(name).map(String::as_str)
    }

    pub fn extensions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.extensions
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// 名前でヘッダーを設定する
    ///
    /// 固定のヘッダー名は正規の文字列形式として解析され、それ以外は拡張ヘッダーとして
    /// そのまま保持される（空の値は保持しない）。
    pub fn insert(&mut self, name: &str, value: &str) -> Result<(), MessageError> {
        let invalid = || MessageError::InvalidHeader {
            name: name.to_string(),
            value: value.to_string(),
        };

        match name {
            names::ID => {
                let uuid = Uuid::parse_str(value).map_err(|_| invalid())?;
                self.id = Some(MessageId::from_uuid(uuid));
            }
            names::CORRELATION_ID => {
                let uuid = Uuid::parse_str(value).map_err(|_| invalid())?;
                self.correlation_id = Some(CorrelationId::from_uuid(uuid));
            }
            names::CREATED => {
                let created = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
                    .map_err(|_| invalid())?;
                self.created = Some(created.and_utc());
            }
            names::DELIVERY_DELAY => {
                let seconds: i64 = value.parse().map_err(|_| invalid())?;
                let delay = Duration::try_seconds(seconds).ok_or_else(invalid)?;
                self.delivery_delay = non_zero(delay);
            }
            names::TIME_TO_LIVE => {
                let seconds: i64 = value.parse().map_err(|_| invalid())?;
                let ttl = Duration::try_seconds(seconds).ok_or_else(invalid)?;
                self.time_to_live = non_zero(ttl);
            }
            names::RETRY_COUNT => {
                self.retry_count = value.parse().map_err(|_| invalid())?;
            }
            names::RESOURCE_PATH => self.resource_path = non_empty(value.to_string()),
            names::TYPE_PATH => self.type_path = non_empty(value.to_string()),
            _ => {
                if value.is_empty() {
                    self.extensions.remove(name);
                } else {
                    self.extensions.insert(name.to_string(), value.to_string());
                }
            }
        }
        Ok(())
    }

    /// ワイヤ形式（名前と値のペア）に変換する
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut push = |name: &str, value: String| pairs.push((name.to_string(), value));

        if let Some(id) = self.id {
            push(names::ID, id.to_string());
        }
        if let Some(correlation_id) = self.correlation_id {
            push(names::CORRELATION_ID, correlation_id.to_string());
        }
        if let Some(created) = self.created {
            push(names::CREATED, created.format(TIMESTAMP_FORMAT).to_string());
        }
        if let Some(delay) = self.delivery_delay {
            push(names::DELIVERY_DELAY, delay.num_seconds().to_string());
        }
        if let Some(ttl) = self.time_to_live {
            push(names::TIME_TO_LIVE, ttl.num_seconds().to_string());
        }
        if self.retry_count > 0 {
            push(names::RETRY_COUNT, self.retry_count.to_string());
        }
        if let Some(path) = &self.resource_path {
            push(names::RESOURCE_PATH, path.clone());
        }
        if let Some(path) = &self.type_path {
            push(names::TYPE_PATH, path.clone());
        }
        for (name, value) in &self.extensions {
            push(name, value.clone());
        }
        pairs
    }

    /// ワイヤ形式から復元する
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, MessageError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut headers = Headers::new();
        for (name, value) in pairs {
            headers.insert(name.as_ref(), value.as_ref())?;
        }
        Ok(headers)
    }
}

fn non_zero(duration: Duration) -> Option<Duration> {
    (duration.num_seconds() != 0).then_some(duration)
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// トランスポートメッセージ
///
/// ヘッダー + 不透明なペイロード（本文）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    headers: Headers,
    body: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Message {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: Headers::new(),
            body: body.into(),
        }
    }

    pub fn with_headers(headers: Headers, body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MessageError> {
        let wire = WireMessage {
            headers: self.headers.to_pairs(),
            body: self.body.clone(),
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        let wire: WireMessage = serde_json::from_slice(bytes)?;
        Ok(Self {
            headers: Headers::from_pairs(wire.headers)?,
            body: wire.body,
        })
    }
}
