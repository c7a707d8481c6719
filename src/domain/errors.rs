use thiserror::Error;

use super::events::ExpectedVersion;
use super::table::{ColumnType, RowId};

/// テーブルストアの契約違反・障害
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    /// 挿入済みの行を再度挿入しようとした
    #[error("row {0} has already been inserted")]
    AlreadyInserted(RowId),

    /// 更新・削除対象の行が存在しない
    #[error("row {0} does not exist")]
    RowNotFound(RowId),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("column {0} is read-only")]
    ReadOnlyColumn(String),

    #[error("type mismatch on column {column}: expected {expected}")]
    TypeMismatch { column: String, expected: ColumnType },

    /// 比較不能な型の列に範囲条件を指定した
    #[error("column {0} cannot be used in a range filter")]
    UnorderableColumn(String),

    #[error("row has {actual} columns, schema expects {expected}")]
    ArityMismatch { expected: usize, actual: usize },

    /// バックエンドの障害（ロックの破損など）
    #[error("table storage failure: {0}")]
    Storage(String),
}

/// イベントストリームストアのエラー
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// 楽観的同時実行制御の違反
    ///
    /// 内部でリトライはしない。呼び出し側で集約を再読み込みしてやり直すこと。
    #[error("unexpected version on stream {stream}: expected {expected}, actual {actual}")]
    UnexpectedVersion {
        stream: String,
        expected: ExpectedVersion,
        actual: u64,
    },

    #[error("stream {0} does not exist")]
    StreamDoesNotExist(String),

    #[error("stream {0} already exists")]
    StreamAlreadyExists(String),

    /// スナップショットのバージョンがストリームの現在バージョンを超えている
    #[error("snapshot version {version} exceeds current version {current} of stream {stream}")]
    InvalidSnapshotVersion {
        stream: String,
        version: u64,
        current: u64,
    },

    #[error("event {version} of stream {stream} does not exist")]
    EventNotFound { stream: String, version: u64 },

    /// 保存済みデータが不正（負のバージョンなど）
    #[error("corrupt stored data: {0}")]
    Corrupt(String),

    #[error("table error")]
    Table(#[from] TableError),

    #[error("storage backend error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EventStoreError {
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        EventStoreError::Storage(Box::new(err))
    }

    /// 楽観的同時実行制御の衝突か
    pub fn is_conflict(&self) -> bool {
        matches!(self, EventStoreError::UnexpectedVersion { .. })
    }
}

/// 集約のエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    /// イベント種別に対応するハンドラが登録されていない
    ///
    /// コードとデータの不整合を示す致命的エラー。リトライしない。
    #[error("aggregate {aggregate} has no handler for event kind {kind}")]
    HandlerNotFound {
        aggregate: &'static str,
        kind: String,
    },
}

/// メッセージ（ヘッダー・ワイヤ形式）のエラー
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid value {value:?} for header {name}")]
    InvalidHeader { name: String, value: String },

    #[error("malformed message encoding")]
    Encoding(#[from] serde_json::Error),
}
