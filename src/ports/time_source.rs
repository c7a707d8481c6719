use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;

/// 待機の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    Elapsed,
    Cancelled,
}

/// 時刻ソースポート
///
/// インボックスのポーリングを決定的にテストできるよう注入可能にする。
#[async_trait]
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// deadline まで待機する。先にキャンセルされた場合は `Wait::Cancelled`
    async fn wait_until(&self, deadline: DateTime<Utc>, cancel: &CancelSignal) -> Wait;
}

/// キャンセルを発火する側
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// キャンセルを待つ側
///
/// ハンドルが発火せずに破棄された場合、キャンセルは起きない。
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
    _keepalive: Option<Arc<watch::Sender<bool>>>,
}

/// キャンセルのハンドルとシグナルの組を作成する
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (
        CancelHandle { tx },
        CancelSignal {
            rx,
            _keepalive: None,
        },
    )
}

impl CancelSignal {
    /// 決してキャンセルされないシグナル
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _keepalive: Some(Arc::new(tx)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// キャンセルされるまで待つ
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // ハンドルが破棄された：もうキャンセルされることはない
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_resolves_waiters() {
        let (handle, signal) = cancellation();
        assert!(!signal.is_cancelled());

        let waiter = tokio::spawn({
            let signal = signal.clone();
            async move { signal.cancelled().await }
        });
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should resolve")
            .unwrap();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_handle_never_cancels() {
        let (handle, signal) = cancellation();
        drop(handle);

        let result = tokio::time::timeout(Duration::from_millis(50), signal.cancelled()).await;

        assert!(result.is_err());
        assert!(!signal.is_cancelled());
    }
}
