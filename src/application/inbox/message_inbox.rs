use crate::domain::message::Message;
use crate::domain::table::{ColumnType, Filter, ROW_ID_COLUMN, Row, Schema};
use crate::domain::value_objects::MessageId;
use crate::ports::*;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use super::errors::Result;

/// 空のインボックスを再確認するまでの既定の間隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 未配信
pub const STATUS_PENDING: i64 = 0;
/// 取り出し済み（処理中）
pub const STATUS_TAKEN: i64 = 1;

/// インボックステーブルの列
///
/// inbox(delivery_time, status, queue, data)
pub mod columns {
    /// delivery_time INT - UNIX エポックからのミリ秒
    pub const DELIVERY_TIME: usize = 1;
    /// status INT - 0 = 未配信、1 = 取り出し済み
    pub const STATUS: usize = 2;
    /// queue TEXT - キュー名（パーティション）。未指定は Null
    pub const QUEUE: usize = 3;
    /// data BLOB - シリアライズされたメッセージ
    pub const DATA: usize = 4;
}

use columns::*;

/// インボックステーブルのスキーマ
pub fn inbox_schema() -> Schema {
    Schema::new(&[
        ("delivery_time", ColumnType::Int),
        ("status", ColumnType::Int),
        ("queue", ColumnType::Text),
        ("data", ColumnType::Blob),
    ])
}

/// `receive` の結果
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Message(Message),
    /// メッセージが見つかる前にキャンセルされた
    Cancelled,
}

impl Delivery {
    pub fn into_message(self) -> Option<Message> {
        match self {
            Delivery::Message(message) => Some(message),
            Delivery::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Delivery::Cancelled)
    }
}

/// テーブルストア上のメッセージインボックス（1リーダー分）
///
/// リーダーは自分が取り出した行をメッセージIDごとに記録する。
/// 記録済みのメッセージを再度 `put` すると同じ行を未配信に戻し（再配信）、
/// `delete` でその行を削除する。
///
/// `receive` は `&mut self` を取るため、1つのリーダーで同時に待機できる `receive` は1つだけ。
/// 複数のリーダーが同じテーブルを共有しても、状態遷移がテーブルに保存されるため
/// 同じ行が二重に取り出されることはない（ただし配信は少なくとも1回の保証）。
pub struct MessageInbox {
    table: Arc<dyn Table>,
    queue: Option<String>,
    clock: Arc<dyn TimeSource>,
    poll_interval: Duration,
    candidates: VecDeque<Row>,
    taken: HashMap<MessageId, Row>,
}

impl MessageInbox {
    /// キュー名なしのインボックスを作成する
    pub fn new(table: Arc<dyn Table>, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            table,
            queue: None,
            clock,
            poll_interval: DEFAULT_POLL_INTERVAL,
            candidates: VecDeque::new(),
            taken: HashMap::new(),
        }
    }

    /// 名前付きキューのインボックスを作成する
    pub fn for_queue(
        table: Arc<dyn Table>,
        clock: Arc<dyn TimeSource>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            queue: Some(queue.into()),
            ..Self::new(table, clock)
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn queue(&self) -> Option<&str> {
        self.queue.as_deref()
    }

    /// このリーダーが取り出し、まだ削除・再投入していないメッセージ数
    pub fn in_flight(&self) -> usize {
        self.taken.len()
    }

    /// メッセージを投入する
    ///
    /// ID・作成日時がなければ割り当てる（渡されたメッセージを直接更新する）。
    /// 配信日時は作成日時 + 配信遅延。
    /// このリーダーが取り出したメッセージと同じIDなら、その行を上書きして未配信に戻す。
    ///
    /// # 戻り値
    /// メッセージID
    pub async fn put(&mut self, message: &mut Message) -> Result<MessageId> {
        let now = self.clock.now();
        let headers = message.headers_mut();
        let id = match headers.id() {
            Some(id) => id,
            None => {
                let id = MessageId::new();
                headers.set_id(id);
                id
            }
        };
        if headers.created().is_none() {
            headers.set_created(now);
        }
        let delivery_time = headers.delivery_time().unwrap_or(now);
        let data = message.to_bytes()?;

        if let Some(previous) = self.taken.get(&id) {
            let mut row = previous.clone();
            fill_row(&mut row, delivery_time, data)?;
            self.table.update(&row).await?;
            self.taken.remove(&id);

            tracing::debug!(message_id = %id, row_id = row.id(), "message requeued");
            return Ok(id);
        }

        let mut row = self.table.new_row();
        fill_row(&mut row, delivery_time, data)?;
        row.set(QUEUE, self.queue.clone())?;
        let row_id = self.table.insert(&mut row).await?;

        tracing::debug!(message_id = %id, row_id, queue = ?self.queue, %delivery_time, "message queued");
        Ok(id)
    }

    /// このリーダーが取り出したメッセージの行を削除する
    ///
    /// # 戻り値
    /// 行を削除した場合は true、取り出していないメッセージなら何もせず false
    pub async fn delete(&mut self, message: &Message) -> Result<bool> {
        let Some(id) = message.headers().id() else {
            return Ok(false);
        };
        let Some(row) = self.taken.get(&id) else {
            return Ok(false);
        };

        self.table.delete(row).await?;
        self.taken.remove(&id);

        tracing::debug!(message_id = %id, "message deleted");
        Ok(true)
    }

    /// 次のメッセージを受け取る
    ///
    /// 配信可能なメッセージがなければ、`poll_interval` ごとに再確認しながら待機する。
    /// 先にキャンセルされた場合は `Delivery::Cancelled` を返す。
    pub async fn receive(&mut self, cancel: &CancelSignal) -> Result<Delivery> {
        loop {
            if cancel.is_cancelled() {
                return Ok(Delivery::Cancelled);
            }
            if let Some(message) = self.try_take().await? {
                return Ok(Delivery::Message(message));
            }

            let deadline = self.clock.now() + poll_step(self.poll_interval);
            if self.clock.wait_until(deadline, cancel).await == Wait::Cancelled {
                self.candidates.clear();
                tracing::debug!(queue = ?self.queue, "receive cancelled");
                return Ok(Delivery::Cancelled);
            }
        }
    }

    /// 待機せずに次のメッセージを1つ取り出す
    ///
    /// 候補のFIFOが空ならテーブルを走査して補充する。
    /// 候補は取り出す直前に読み直し、未配信のままである場合に限り条件付きで
    /// 取り出し済みに更新する。他のリーダーが先に取り出した行は飛ばす。
    pub async fn try_take(&mut self) -> Result<Option<Message>> {
        let now = self.clock.now();

        loop {
            if self.candidates.is_empty() {
                let rows = self.scan(now).await?;
                if rows.is_empty() {
                    return Ok(None);
                }
                self.candidates.extend(rows);
            }
            let Some(candidate) = self.candidates.pop_front() else {
                return Ok(None);
            };

            let current = self
                .table
                .rows(&[Filter::eq(ROW_ID_COLUMN, candidate.id())])
                .await?;
            let Some(mut row) = current.into_iter().next() else {
                continue;
            };
            if row.int(STATUS)? != STATUS_PENDING {
                continue;
            }

            let delivery_time = row.int(DELIVERY_TIME)?;
            row.set(STATUS, STATUS_TAKEN)?;
            let taken = self
                .table
                .update_where(
                    &row,
                    &[
                        Filter::eq(STATUS, STATUS_PENDING),
                        Filter::eq(DELIVERY_TIME, delivery_time),
                    ],
                )
                .await?;
            if !taken {
                continue;
            }

            let message = Message::from_bytes(row.blob(DATA)?)?;
            if let Some(id) = message.headers().id() {
                self.taken.insert(id, row.clone());
            }

            tracing::debug!(
                message_id = ?message.headers().id(),
                row_id = row.id(),
                queue = ?self.queue,
                "message taken"
            );
            return Ok(Some(message));
        }
    }

    /// このキューの未配信メッセージ数（配信日時が未来のものも含む）
    pub async fn pending_count(&self) -> Result<usize> {
        let rows = self
            .table
            .rows(&[
                Filter::eq(QUEUE, self.queue.clone()),
                Filter::eq(STATUS, STATUS_PENDING),
            ])
            .await?;
        Ok(rows.len())
    }

    /// 配信可能な未配信行を (配信日時, 行ID) の順で返す
    async fn scan(&self, now: DateTime<Utc>) -> Result<Vec<Row>> {
        let mut rows = self
            .table
            .rows(&[
                Filter::eq(QUEUE, self.queue.clone()),
                Filter::eq(STATUS, STATUS_PENDING),
                Filter::at_most(DELIVERY_TIME, now.timestamp_millis()),
            ])
            .await?;
        rows.sort_by_key(|row| (row.int(DELIVERY_TIME).unwrap_or(i64::MAX), row.id()));

        tracing::trace!(queue = ?self.queue, count = rows.len(), "inbox scanned");
        Ok(rows)
    }
}

fn fill_row(row: &mut Row, delivery_time: DateTime<Utc>, data: Vec<u8>) -> Result<()> {
    row.set(DELIVERY_TIME, delivery_time.timestamp_millis())?;
    row.set(STATUS, STATUS_PENDING)?;
    row.set(DATA, data)?;
    Ok(())
}

fn poll_step(interval: Duration) -> chrono::Duration {
    chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::days(1))
}
