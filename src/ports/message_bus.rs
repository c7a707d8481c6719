use crate::domain::message::Message;
use async_trait::async_trait;
use thiserror::Error;

/// メッセージバスのエラー
#[derive(Debug, Error)]
pub enum BusError {
    #[error("message bus is closed")]
    Closed,

    #[error("message rejected: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, BusError>;

/// メッセージバスポート
///
/// 受け付け（accepted）以上の確認応答は前提としない。
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, message: &Message) -> Result<()>;
}
