use crate::domain::errors::{MessageError, TableError};
use thiserror::Error;

/// メッセージインボックスのエラー
///
/// キャンセルはエラーではなく `Delivery::Cancelled` として返される。
#[derive(Debug, Error)]
pub enum InboxError {
    /// 背後のテーブルストアのエラー
    #[error("inbox table error")]
    Table(#[from] TableError),

    /// 保存されたメッセージの復元・シリアライズ失敗
    #[error("inbox message error")]
    Message(#[from] MessageError),
}

/// インボックスの Result型
pub type Result<T> = std::result::Result<T, InboxError>;
