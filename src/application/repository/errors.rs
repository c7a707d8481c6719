use crate::domain::errors::{AggregateError, EventStoreError, MessageError};
use crate::ports::message_bus::BusError;
use crate::ports::serializer::CodecError;
use thiserror::Error;

/// リポジトリ層のエラー
///
/// ストアのエラー（UnexpectedVersion など）は変換せずにそのまま伝播する。
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// イベントストアのエラー
    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    /// 履歴の再生に失敗（ハンドラ未登録）
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// イベント・スナップショットのシリアライズ失敗
    #[error("payload codec error")]
    Codec(#[from] CodecError),

    /// メッセージのワイヤ形式の不正
    #[error("message envelope error")]
    Message(#[from] MessageError),

    /// メッセージバスへの発行失敗
    #[error("message bus error")]
    Bus(#[from] BusError),
}

impl RepositoryError {
    /// 楽観的同時実行制御の衝突か（呼び出し側は再読み込みしてリトライする）
    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::EventStore(e) if e.is_conflict())
    }
}

/// リポジトリ層の Result型
pub type Result<T> = std::result::Result<T, RepositoryError>;
