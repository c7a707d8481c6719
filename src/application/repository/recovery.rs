use crate::domain::message::Message;
use crate::ports::{EventStore, MessageBus};

use super::errors::Result;

/// 未発行のイベントをクロック順にバスへ再発行し、発行済みとしてマークする
///
/// 発行とマークの間で停止した場合は再度発行されるため、購読側は重複を許容すること。
///
/// # 戻り値
/// 再発行したイベント数
pub async fn recover_unpublished(store: &dyn EventStore, bus: &dyn MessageBus) -> Result<usize> {
    let pending = store.unpublished_events().await?;
    if pending.is_empty() {
        return Ok(0);
    }

    tracing::warn!(count = pending.len(), "republishing unpublished events");

    for event in &pending {
        let message = Message::from_bytes(&event.payload)?;
        bus.publish(&message).await?;
        store.mark_published(event).await?;
        tracing::debug!(stream = %event.stream, version = event.version, clock = event.clock, "event republished");
    }

    Ok(pending.len())
}
