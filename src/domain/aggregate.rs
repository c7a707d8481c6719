use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::fmt::Display;

use super::errors::AggregateError;

/// ドメインイベント
///
/// 実行時のイベント種別は判別タグ（kind）で表す。
/// 通常は列挙型で実装し、バリアントごとに固定の文字列を返す。
pub trait DomainEvent: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    fn kind(&self) -> &'static str;
}

/// イベント適用関数
pub type ApplyFn<A> = fn(&mut A, &<A as Aggregate>::Event);

/// イベント種別 → 適用関数の対応表
///
/// 集約の型ごとに一度だけ構築する（`Aggregate::handlers` を参照）。
pub struct Handlers<A: Aggregate> {
    table: HashMap<&'static str, ApplyFn<A>>,
}

impl<A: Aggregate> Handlers<A> {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// イベント種別に適用関数を登録する
    pub fn on(mut self, kind: &'static str, apply: ApplyFn<A>) -> Self {
        self.table.insert(kind, apply);
        self
    }

    pub fn handles(&self, kind: &str) -> bool {
        self.table.contains_key(kind)
    }

    /// イベント種別に対応する適用関数を引く
    ///
    /// # エラー
    /// 未登録の種別は `AggregateError::HandlerNotFound`
    pub fn resolve(&self, event: &A::Event) -> Result<ApplyFn<A>, AggregateError> {
        let kind = event.kind();
        self.table
            .get(kind)
            .copied()
            .ok_or_else(|| AggregateError::HandlerNotFound {
                aggregate: A::KIND,
                kind: kind.to_string(),
            })
    }

    pub fn apply(&self, state: &mut A, event: &A::Event) -> Result<(), AggregateError> {
        let apply = self.resolve(event)?;
        apply(state, event);
        Ok(())
    }
}

impl<A: Aggregate> Default for Handlers<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// イベントソーシングされる集約
///
/// 実装例:
///
/// ```ignore
/// fn handlers() -> &'static Handlers<Self> {
///     static HANDLERS: OnceLock<Handlers<Account>> = OnceLock::new();
///     HANDLERS.get_or_init(|| {
///         Handlers::new()
///             .on("Opened", Account::apply_opened)
///             .on("Deposited", Account::apply_deposited)
///     })
/// }
/// ```
pub trait Aggregate: Default + Send + Sync + Sized + 'static {
    /// 集約の種別名（ストリーム名の接頭辞に使われる）
    const KIND: &'static str;

    type Id: Clone + Display + Send + Sync;
    type Event: DomainEvent;
    type Snapshot: Serialize + DeserializeOwned + Send + Sync;

    /// 型ごとに一度だけ構築される適用関数の対応表
    fn handlers() -> &'static Handlers<Self>;

    /// 現在の状態のスナップショット（既定ではスナップショット非対応）
    fn snapshot(&self) -> Option<Self::Snapshot> {
        None
    }

    /// スナップショットから状態を復元する
    fn restore(snapshot: Self::Snapshot) -> Self {
        let _ = snapshot;
        Self::default()
    }
}

/// 集約ルート
///
/// 状態・未コミットイベント・永続化済みバージョンを保持する。
/// ストリームの状態は Repository が管理し、commit は未コミットバッファを空にするだけ。
pub struct AggregateRoot<A: Aggregate> {
    id: A::Id,
    state: A,
    version: u64,
    uncommitted: Vec<A::Event>,
}

impl<A: Aggregate> AggregateRoot<A> {
    pub fn new(id: A::Id) -> Self {
        Self {
            id,
            state: A::default(),
            version: 0,
            uncommitted: Vec::new(),
        }
    }

    pub fn id(&self) -> &A::Id {
        &self.id
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    /// 最後に永続化（または読み込み）されたストリームのバージョン
    pub fn version(&self) -> u64 {
        self.version
    }

    /// 新しいイベントを発行する
    ///
    /// 未コミットバッファに追加し、直ちに状態へ適用する。
    /// ハンドラが未登録の場合はバッファにも状態にも変更を加えない。
    pub fn publish(&mut self, event: A::Event) -> Result<(), AggregateError> {
        let apply = A::handlers().resolve(&event)?;
        apply(&mut self.state, &event);
        self.uncommitted.push(event);
        Ok(())
    }

    /// 履歴から状態を再構築する
    ///
    /// スナップショットがあれば先に復元し、その後イベントを与えられた順（バージョン順）に適用する。
    /// 履歴のイベントは未コミットバッファに追加されない。
    pub fn load_from_history<I>(
        &mut self,
        snapshot: Option<A::Snapshot>,
        events: I,
    ) -> Result<(), AggregateError>
    where
        I: IntoIterator<Item = A::Event>,
    {
        if let Some(snapshot) = snapshot {
            self.state = A::restore(snapshot);
        }
        let handlers = A::handlers();
        for event in events {
            handlers.apply(&mut self.state, &event)?;
        }
        Ok(())
    }

    /// 未コミットイベント（発行順）
    pub fn events(&self) -> &[A::Event] {
        &self.uncommitted
    }

    pub fn has_uncommitted(&self) -> bool {
        !self.uncommitted.is_empty()
    }

    /// 未コミットバッファを空にする
    pub fn commit(&mut self) {
        self.uncommitted.clear();
    }

    pub fn snapshot(&self) -> Option<A::Snapshot> {
        self.state.snapshot()
    }

    /// 永続化されたバージョンを記録する（Repository から呼ばれる）
    pub fn mark_persisted(&mut self, version: u64) {
        self.version = version;
    }
}

impl<A> std::fmt::Debug for AggregateRoot<A>
where
    A: Aggregate + std::fmt::Debug,
    A::Event: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateRoot")
            .field("id", &self.id.to_string())
            .field("state", &self.state)
            .field("version", &self.version)
            .field("uncommitted", &self.uncommitted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::OnceLock;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum CounterEvent {
        Incremented(i64),
        Reset,
        Renamed(String),
    }

    impl DomainEvent for CounterEvent {
        fn kind(&self) -> &'static str {
            match self {
                CounterEvent::Incremented(_) => "Incremented",
                CounterEvent::Reset => "Reset",
                CounterEvent::Renamed(_) => "Renamed",
            }
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Counter {
        value: i64,
    }

    impl Counter {
        fn apply_incremented(&mut self, event: &CounterEvent) {
            if let CounterEvent::Incremented(by) = event {
                self.value += by;
            }
        }

        fn apply_reset(&mut self, _event: &CounterEvent) {
            self.value = 0;
        }
    }

    // Renamed は意図的に未登録
    impl Aggregate for Counter {
        const KIND: &'static str = "Counter";
        type Id = String;
        type Event = CounterEvent;
        type Snapshot = i64;

        fn handlers() -> &'static Handlers<Self> {
            static HANDLERS: OnceLock<Handlers<Counter>> = OnceLock::new();
            HANDLERS.get_or_init(|| {
                Handlers::new()
                    .on("Incremented", Counter::apply_incremented)
                    .on("Reset", Counter::apply_reset)
            })
        }

        fn snapshot(&self) -> Option<i64> {
            Some(self.value)
        }

        fn restore(snapshot: i64) -> Self {
            Counter { value: snapshot }
        }
    }

    #[test]
    fn test_publish_buffers_and_applies() {
        let mut root = AggregateRoot::<Counter>::new("c-1".to_string());

        root.publish(CounterEvent::Incremented(2)).unwrap();
        root.publish(CounterEvent::Incremented(3)).unwrap();

        assert_eq!(root.state().value, 5);
        assert_eq!(
            root.events(),
            &[CounterEvent::Incremented(2), CounterEvent::Incremented(3)]
        );
        // 複数回読み取れる
        assert_eq!(root.events().len(), 2);
    }

    #[test]
    fn test_commit_clears_buffer_but_keeps_state() {
        let mut root = AggregateRoot::<Counter>::new("c-1".to_string());
        root.publish(CounterEvent::Incremented(4)).unwrap();

        root.commit();

        assert!(!root.has_uncommitted());
        assert_eq!(root.state().value, 4);
    }

    #[test]
    fn test_load_from_history_does_not_buffer() {
        let mut root = AggregateRoot::<Counter>::new("c-1".to_string());

        root.load_from_history(
            None,
            vec![
                CounterEvent::Incremented(1),
                CounterEvent::Reset,
                CounterEvent::Incremented(7),
            ],
        )
        .unwrap();

        assert_eq!(root.state().value, 7);
        assert!(root.events().is_empty());
    }

    #[test]
    fn test_snapshot_plus_tail_matches_full_replay() {
        let history = vec![
            CounterEvent::Incremented(1),
            CounterEvent::Incremented(2),
            CounterEvent::Incremented(3),
            CounterEvent::Incremented(4),
        ];

        let mut full = AggregateRoot::<Counter>::new("c-1".to_string());
        full.load_from_history(None, history.clone()).unwrap();

        let mut prefix = AggregateRoot::<Counter>::new("c-1".to_string());
        prefix.load_from_history(None, history[..2].to_vec()).unwrap();
        let snapshot = prefix.snapshot();

        let mut resumed = AggregateRoot::<Counter>::new("c-1".to_string());
        resumed
            .load_from_history(snapshot, history[2..].to_vec())
            .unwrap();

        assert_eq!(resumed.state(), full.state());
    }

    #[test]
    fn test_unregistered_kind_fails_lookup() {
        let mut root = AggregateRoot::<Counter>::new("c-1".to_string());

        let err = root
            .load_from_history(None, vec![CounterEvent::Renamed("x".to_string())])
            .unwrap_err();

        assert_eq!(
            err,
            AggregateError::HandlerNotFound {
                aggregate: "Counter",
                kind: "Renamed".to_string(),
            }
        );
    }

    #[test]
    fn test_publish_of_unregistered_kind_leaves_buffer_untouched() {
        let mut root = AggregateRoot::<Counter>::new("c-1".to_string());

        let result = root.publish(CounterEvent::Renamed("x".to_string()));

        assert!(result.is_err());
        assert!(root.events().is_empty());
    }
}
