use serde::{Deserialize, Serialize};

use super::errors::EventStoreError;

/// ストリームを開くモード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// 存在しなければ「ストリームなし」を返す（エラーではない）
    Open,
    /// 存在しなければ StreamDoesNotExist
    OpenExisting,
    /// 存在しなければ作成。空でない既存ストリームには StreamAlreadyExists
    Create,
}

/// 追記時の期待バージョン
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// 無条件に追記する
    Any,
    /// ストリームが存在しない、または空であること
    NoStream,
    /// ストリームのバージョンがちょうどこの値であること
    Exact(u64),
}

impl ExpectedVersion {
    /// 整数表現から変換する（-1 = 無条件、0 = 空、正数 = 完全一致）
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            r if r < 0 => ExpectedVersion::Any,
            0 => ExpectedVersion::NoStream,
            n => ExpectedVersion::Exact(n as u64),
        }
    }

    /// バージョン番号から変換する（0 は NoStream）
    pub fn exact(version: u64) -> Self {
        if version == 0 {
            ExpectedVersion::NoStream
        } else {
            ExpectedVersion::Exact(version)
        }
    }

    pub fn is_satisfied_by(&self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::NoStream => actual == 0,
            ExpectedVersion::Exact(expected) => *expected == actual,
        }
    }

    /// 実際のバージョンと照合し、不一致なら UnexpectedVersion を返す
    pub fn check(&self, stream: &str, actual: u64) -> Result<(), EventStoreError> {
        if self.is_satisfied_by(actual) {
            Ok(())
        } else {
            Err(EventStoreError::UnexpectedVersion {
                stream: stream.to_string(),
                expected: *self,
                actual,
            })
        }
    }
}

impl std::fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpectedVersion::Any => f.write_str("any"),
            ExpectedVersion::NoStream => f.write_str("0"),
            ExpectedVersion::Exact(v) => write!(f, "{}", v),
        }
    }
}

/// ストリームの状態
///
/// 不変条件：snapshot_version ≤ version、version は最後にコミットされたイベントのバージョン。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub name: String,
    pub version: u64,
    /// スナップショットがなければ 0
    pub snapshot_version: u64,
}

impl StreamInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 0,
            snapshot_version: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.version == 0
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot_version > 0
    }
}

/// 保存済みイベント
///
/// version はストリーム内で1から始まる連番、clock はストア全体で狭義単調増加。
/// payload は不透明なバイト列。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub stream: String,
    pub version: u64,
    pub clock: u64,
    pub published: bool,
    pub payload: Vec<u8>,
}

/// 保存済みスナップショット
///
/// version より大きいバージョンのイベントはスナップショットの上に再生する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub stream: String,
    pub version: u64,
    pub payload: Vec<u8>,
}
