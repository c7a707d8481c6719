#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusty_cqrs_store::adapters::{
    ManualClock,
    memory::{InMemoryEventStore, InMemoryMessageBus, MemoryTable},
    table::TableEventStore,
};
use rusty_cqrs_store::application::inbox::inbox_schema;
use rusty_cqrs_store::application::repository::Repository;
use rusty_cqrs_store::domain::{Aggregate, DomainEvent, Handlers, Message};
use rusty_cqrs_store::ports::{BusError, EventStore, MessageBus};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, OnceLock};

// ============================================================================
// テスト用の集約: Account（スナップショット対応）
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccountEvent {
    Opened { owner: String },
    Deposited { amount: i64 },
    Withdrawn { amount: i64 },
    /// ハンドラ未登録（再生時の検索失敗を確認するため）
    Frozen,
}

impl DomainEvent for AccountEvent {
    fn kind(&self) -> &'static str {
        match self {
            AccountEvent::Opened { .. } => "Opened",
            AccountEvent::Deposited { .. } => "Deposited",
            AccountEvent::Withdrawn { .. } => "Withdrawn",
            AccountEvent::Frozen => "Frozen",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub owner: Option<String>,
    pub balance: i64,
    pub transactions: u64,
}

impl Account {
    fn apply_opened(&mut self, event: &AccountEvent) {
        if let AccountEvent::Opened { owner } = event {
            self.owner = Some(owner.clone());
        }
    }

    fn apply_deposited(&mut self, event: &AccountEvent) {
        if let AccountEvent::Deposited { amount } = event {
            self.balance += amount;
            self.transactions += 1;
        }
    }

    fn apply_withdrawn(&mut self, event: &AccountEvent) {
        if let AccountEvent::Withdrawn { amount } = event {
            self.balance -= amount;
            self.transactions += 1;
        }
    }
}

impl Aggregate for Account {
    const KIND: &'static str = "Account";
    type Id = String;
    type Event = AccountEvent;
    type Snapshot = Account;

    fn handlers() -> &'static Handlers<Self> {
        static HANDLERS: OnceLock<Handlers<Account>> = OnceLock::new();
        HANDLERS.get_or_init(|| {
            Handlers::new()
                .on("Opened", Account::apply_opened)
                .on("Deposited", Account::apply_deposited)
                .on("Withdrawn", Account::apply_withdrawn)
        })
    }

    fn snapshot(&self) -> Option<Account> {
        Some(self.clone())
    }

    fn restore(snapshot: Account) -> Self {
        snapshot
    }
}

// ============================================================================
// テスト用の集約: Tally（スナップショット非対応）
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TallyEvent {
    Counted,
}

impl DomainEvent for TallyEvent {
    fn kind(&self) -> &'static str {
        "Counted"
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct Tally {
    pub count: u64,
}

impl Tally {
    fn apply_counted(&mut self, _event: &TallyEvent) {
        self.count += 1;
    }
}

impl Aggregate for Tally {
    const KIND: &'static str = "Tally";
    type Id = u32;
    type Event = TallyEvent;
    type Snapshot = u64;

    fn handlers() -> &'static Handlers<Self> {
        static HANDLERS: OnceLock<Handlers<Tally>> = OnceLock::new();
        HANDLERS.get_or_init(|| Handlers::new().on("Counted", Tally::apply_counted))
    }
}

// ============================================================================
// テスト用のメッセージバス
// ============================================================================

/// 指定件数だけ受け付け、それ以降の発行を拒否するバス
pub struct FailingBus {
    remaining: Mutex<usize>,
    accepted: Mutex<Vec<Message>>,
}

impl FailingBus {
    pub fn accepting(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            accepted: Mutex::new(Vec::new()),
        }
    }

    pub fn accepted(&self) -> Vec<Message> {
        self.accepted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageBus for FailingBus {
    async fn publish(&self, message: &Message) -> Result<(), BusError> {
        let mut remaining = self.remaining.lock().unwrap();
        if *remaining == 0 {
            return Err(BusError::Rejected("bus is down".to_string()));
        }
        *remaining -= 1;
        self.accepted.lock().unwrap().push(message.clone());
        Ok(())
    }
}

// ============================================================================
// ヘルパー関数
// ============================================================================

/// テストで使う固定の開始時刻
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(start_time()))
}

/// 2つの実装を同じ振る舞いで検証するためのイベントストア一覧
pub fn event_stores() -> Vec<(&'static str, Arc<dyn EventStore>)> {
    let memory: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
    let table: Arc<dyn EventStore> = Arc::new(TableEventStore::in_memory());
    vec![("memory", memory), ("table", table)]
}

/// Account リポジトリとその依存
pub struct AccountFixture {
    pub store: Arc<dyn EventStore>,
    pub bus: Arc<InMemoryMessageBus>,
    pub clock: Arc<ManualClock>,
    pub repository: Repository<Account>,
}

pub fn account_fixture(store: Arc<dyn EventStore>) -> AccountFixture {
    let bus = Arc::new(InMemoryMessageBus::new());
    let clock = manual_clock();
    let repository = Repository::new(store.clone(), bus.clone(), clock.clone());

    AccountFixture {
        store,
        bus,
        clock,
        repository,
    }
}

/// インボックス用の空テーブル
pub fn inbox_table() -> Arc<MemoryTable> {
    Arc::new(MemoryTable::new("inbox", inbox_schema()))
}
