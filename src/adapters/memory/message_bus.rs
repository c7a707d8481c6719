use crate::domain::message::Message;
use crate::ports::message_bus::{BusError, MessageBus as MessageBusTrait, Result};
use async_trait::async_trait;
use std::sync::Mutex;

/// In-memory implementation of MessageBus
///
/// Records every accepted message in publish order. Useful for tests and for
/// wiring a process that has no external transport.
pub struct MessageBus {
    published: Mutex<Vec<Message>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
        }
    }

    /// Messages accepted so far, in publish order
    pub fn published(&self) -> Vec<Message> {
        self.published
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBusTrait for MessageBus {
    async fn publish(&self, message: &Message) -> Result<()> {
        let mut published = self.published.lock().map_err(|_| BusError::Closed)?;
        tracing::debug!(
            message_id = ?message.headers().id(),
            type_path = ?message.headers().type_path(),
            "message published"
        );
        published.push(message.clone());
        Ok(())
    }
}
