pub mod event_store;
pub mod message_bus;
pub mod serializer;
pub mod table;
pub mod time_source;

pub use event_store::EventStore;
pub use message_bus::{BusError, MessageBus};
pub use serializer::{CodecError, PayloadCodec};
pub use table::Table;
pub use time_source::{CancelHandle, CancelSignal, TimeSource, Wait, cancellation};
