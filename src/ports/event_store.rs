use crate::domain::errors::EventStoreError;
use crate::domain::events::{ExpectedVersion, OpenMode, StoredEvent, StoredSnapshot, StreamInfo};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, EventStoreError>;

/// イベントストリームストアポート
///
/// ストリーム名ごとに、バージョン付きのイベント列と任意のスナップショットを保持する。
/// 追記は楽観的同時実行制御で保護される。
/// 保証はすべてストリーム単位であり、ストリームをまたぐトランザクションはない。
#[async_trait]
pub trait EventStore: Send + Sync {
    /// ストリームを開く
    ///
    /// - Open: 存在しなければ `None`
    /// - OpenExisting: 存在しなければ `StreamDoesNotExist`
    /// - Create: 空でない既存ストリームなら `StreamAlreadyExists`、なければ作成
    async fn open_stream(&self, name: &str, mode: OpenMode) -> Result<Option<StreamInfo>>;

    /// ストリームの最新スナップショットを読み込む
    ///
    /// スナップショットのペイロードはこの呼び出しで初めて取得される。
    async fn load_snapshot(&self, name: &str) -> Result<Option<StoredSnapshot>>;

    /// min_version 以上のイベントをバージョン順に返す
    async fn load_events(&self, name: &str, min_version: u64) -> Result<Vec<StoredEvent>>;

    /// イベントを追記する
    ///
    /// 期待バージョンが一致しなければ `UnexpectedVersion` を返し、何も追記しない。
    /// 成功時は直前のバージョン + 1, 2, ... を配列順に割り当て、追記したイベントを返す。
    /// 存在しないストリームはバージョン0として扱い、作成する。
    async fn append(
        &self,
        name: &str,
        expected: ExpectedVersion,
        payloads: Vec<Vec<u8>>,
    ) -> Result<Vec<StoredEvent>>;

    /// スナップショットを保存する（イベントには影響しない）
    ///
    /// # エラー
    /// - ストリームが存在しない: `StreamDoesNotExist`
    /// - バージョンが現在のバージョンを超える: `InvalidSnapshotVersion`
    async fn save_snapshot(&self, snapshot: StoredSnapshot) -> Result<()>;

    /// clock 以上のイベントを（全ストリームから）クロック順に返す
    ///
    /// ストア全体の購読フィードの基礎となる。
    async fn events_since(&self, clock: u64) -> Result<Vec<StoredEvent>>;

    /// まだメッセージバスに渡されていないイベントをクロック順に返す
    async fn unpublished_events(&self) -> Result<Vec<StoredEvent>>;

    /// イベントを発行済みにする（一方向のフラグ。二重に呼んでも変化なし）
    async fn mark_published(&self, event: &StoredEvent) -> Result<()>;
}
