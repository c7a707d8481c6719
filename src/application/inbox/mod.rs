mod errors;
mod message_inbox;

pub use errors::{InboxError, Result};
pub use message_inbox::{
    DEFAULT_POLL_INTERVAL, Delivery, MessageInbox, STATUS_PENDING, STATUS_TAKEN, columns,
    inbox_schema,
};
