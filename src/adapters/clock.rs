use crate::ports::time_source::{CancelSignal, TimeSource as TimeSourceTrait, Wait};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Wall-clock TimeSource backed by tokio timers
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TimeSourceTrait for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn wait_until(&self, deadline: DateTime<Utc>, cancel: &CancelSignal) -> Wait {
        if cancel.is_cancelled() {
            return Wait::Cancelled;
        }
        // A deadline in the past converts to a zero sleep
        let remaining = (deadline - Utc::now()).to_std().unwrap_or_default();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Wait::Cancelled,
            _ = tokio::time::sleep(remaining) => Wait::Elapsed,
        }
    }
}

/// Deterministic TimeSource for tests
///
/// `wait_until` jumps the clock straight to the deadline instead of sleeping,
/// then yields once so other tasks can make progress. Every completed wait is
/// counted.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    waits: AtomicUsize,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            waits: AtomicUsize::new(0),
        }
    }

    /// Move the clock forward by `by`
    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    /// Set the clock, ignoring attempts to move it backwards
    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            if to > *now {
                *now = to;
            }
        }
    }

    /// Number of waits that elapsed
    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

#[async_trait]
impl TimeSourceTrait for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
    }

    async fn wait_until(&self, deadline: DateTime<Utc>, cancel: &CancelSignal) -> Wait {
        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            return Wait::Cancelled;
        }
        self.set(deadline);
        self.waits.fetch_add(1, Ordering::SeqCst);
        Wait::Elapsed
    }
}
