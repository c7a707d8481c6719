use crate::adapters::json_codec::JsonCodec;
use crate::domain::aggregate::{Aggregate, AggregateRoot, DomainEvent};
use crate::domain::events::{OpenMode, StoredEvent, StoredSnapshot, StreamInfo};
use crate::domain::message::{Headers, Message};
use crate::domain::value_objects::{CorrelationId, MessageId};
use crate::ports::*;
use std::marker::PhantomData;
use std::sync::Arc;

use super::errors::Result;
use super::recovery::recover_unpublished;
use super::save_flags::SaveFlags;

/// 保存時にメッセージのヘッダーへ引き継ぐ文脈
///
/// 相関IDと拡張ヘッダーを、保存されるすべてのイベントのメッセージに付与する。
#[derive(Debug, Clone, Default)]
pub struct SaveContext {
    pub correlation_id: Option<CorrelationId>,
    pub headers: Vec<(String, String)>,
}

impl SaveContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// イベントソーシングされた集約のリポジトリ
///
/// 集約ID からストリーム名 `"{KIND}-{id}"` を導出し、
/// スナップショット + 後続イベントで集約を復元、未コミットイベントを追記・発行する。
///
/// 同じストリームへの書き込みを直列化しない。並行する書き込みの一方は
/// UnexpectedVersion で失敗するため、呼び出し側が再読み込みしてリトライする。
pub struct Repository<A: Aggregate, C: PayloadCodec = JsonCodec> {
    store: Arc<dyn EventStore>,
    bus: Arc<dyn MessageBus>,
    clock: Arc<dyn TimeSource>,
    codec: C,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A: Aggregate> Repository<A, JsonCodec> {
    pub fn new(
        store: Arc<dyn EventStore>,
        bus: Arc<dyn MessageBus>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self::with_codec(store, bus, clock, JsonCodec)
    }
}

impl<A: Aggregate, C: PayloadCodec> Repository<A, C> {
    pub fn with_codec(
        store: Arc<dyn EventStore>,
        bus: Arc<dyn MessageBus>,
        clock: Arc<dyn TimeSource>,
        codec: C,
    ) -> Self {
        Self {
            store,
            bus,
            clock,
            codec,
            _aggregate: PhantomData,
        }
    }

    /// 集約IDに対応するストリーム名
    pub fn stream_name(id: &A::Id) -> String {
        format!("{}-{}", A::KIND, id)
    }

    /// 集約を読み込む
    ///
    /// # 戻り値
    /// ストリームが存在しなければ `None`
    ///
    /// # エラー
    /// - EventStore: ストアの読み込み失敗
    /// - Aggregate: 未登録のイベント種別（コードとデータの不整合）
    /// - Codec / Message: ペイロードの復元失敗
    #[tracing::instrument(skip_all, fields(aggregate = A::KIND, id = %id))]
    pub async fn get(&self, id: &A::Id) -> Result<Option<AggregateRoot<A>>> {
        let name = Self::stream_name(id);

        let Some(info) = self.store.open_stream(&name, OpenMode::Open).await? else {
            return Ok(None);
        };

        let snapshot = if info.has_snapshot() {
            self.store.load_snapshot(&name).await?
        } else {
            None
        };
        let (snapshot, snapshot_version) = match snapshot {
            Some(stored) => (
                Some(self.codec.decode::<A::Snapshot>(&stored.payload)?),
                stored.version,
            ),
            None => (None, 0),
        };

        let stored = self.store.load_events(&name, snapshot_version + 1).await?;
        let version = stored.last().map_or(snapshot_version, |e| e.version);
        let events = stored
            .iter()
            .map(|event| self.unwrap_event(event))
            .collect::<Result<Vec<_>>>()?;

        let mut root = AggregateRoot::new(id.clone());
        root.load_from_history(snapshot, events)?;
        root.mark_persisted(version);

        tracing::debug!(
            stream = %name,
            version,
            snapshot_version,
            "aggregate loaded"
        );
        Ok(Some(root))
    }

    /// 集約の未コミットイベントを保存する
    ///
    /// 処理順：
    /// 1. モードに従ってストリームを開く／作成する
    /// 2. 各イベントをメッセージに包んでシリアライズ
    /// 3. 期待バージョン付きで追記（失敗時は集約を変更しない）
    /// 4. イベントごとにバスへ発行し、発行済みとしてマーク
    /// 5. スナップショット方針を評価し、必要ならスナップショットを保存
    /// 6. 未コミットバッファを空にする
    ///
    /// 各手順はトランザクションでまとめられていない。途中で失敗した場合、
    /// それ以前の手順は取り消されない（未発行のイベントは `republish_unpublished` で回復する）。
    ///
    /// # 戻り値
    /// 保存後のストリームバージョン。未コミットイベントがなければ何もせず現在のバージョンを返す
    #[tracing::instrument(skip_all, fields(aggregate = A::KIND, id = %root.id()))]
    pub async fn save(
        &self,
        root: &mut AggregateRoot<A>,
        context: &SaveContext,
        flags: SaveFlags,
    ) -> Result<u64> {
        let name = Self::stream_name(root.id());

        let info = self
            .store
            .open_stream(&name, flags.mode.open_mode())
            .await?
            .unwrap_or_else(|| StreamInfo::new(&name));

        if !root.has_uncommitted() {
            return Ok(info.version);
        }

        let messages = root
            .events()
            .iter()
            .map(|event| self.wrap(&name, event, context))
            .collect::<Result<Vec<_>>>()?;
        let payloads = messages
            .iter()
            .map(Message::to_bytes)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let appended = self
            .store
            .append(&name, flags.mode.expected_version(), payloads)
            .await?;
        let version = appended.last().map_or(info.version, |e| e.version);
        root.mark_persisted(version);

        for (event, message) in appended.iter().zip(&messages) {
            self.bus.publish(message).await?;
            self.store.mark_published(event).await?;
        }

        if flags.snapshot.is_due(version, info.snapshot_version) {
            // スナップショット非対応の集約は None を返す
            if let Some(snapshot) = root.snapshot() {
                let payload = self.codec.encode(&snapshot)?;
                self.store
                    .save_snapshot(StoredSnapshot {
                        stream: name.clone(),
                        version,
                        payload,
                    })
                    .await?;
            }
        }

        root.commit();

        tracing::info!(stream = %name, version, count = appended.len(), "aggregate saved");
        Ok(version)
    }

    /// 未発行のイベントを再発行する
    ///
    /// 追記後・発行前にプロセスが停止した場合の回復手段（少なくとも1回の配信）。
    pub async fn republish_unpublished(&self) -> Result<usize> {
        recover_unpublished(self.store.as_ref(), self.bus.as_ref()).await
    }

    fn wrap(&self, stream: &str, event: &A::Event, context: &SaveContext) -> Result<Message> {
        let body = self.codec.encode(event)?;

        let mut headers = Headers::new();
        for (name, value) in &context.headers {
            headers.insert(name, value)?;
        }
        headers.set_id(MessageId::new());
        headers.set_created(self.clock.now());
        if let Some(correlation_id) = context.correlation_id {
            headers.set_correlation_id(correlation_id);
        }
        headers.set_resource_path(stream);
        headers.set_type_path(format!("{}/{}", A::KIND, event.kind()));

        Ok(Message::with_headers(headers, body))
    }

    fn unwrap_event(&self, stored: &StoredEvent) -> Result<A::Event> {
        let message = Message::from_bytes(&stored.payload)?;
        Ok(self.codec.decode(message.body())?)
    }
}
