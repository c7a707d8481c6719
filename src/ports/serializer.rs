use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// ペイロードのシリアライズエラー
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode payload")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to decode payload")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// シリアライザポート
///
/// ドメインイベント・スナップショットと不透明なバイト列を相互に変換する。
/// ストアやインボックスはペイロードの中身を解釈しない。
pub trait PayloadCodec: Send + Sync + 'static {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}
