pub mod event_store;
pub mod message_bus;
pub mod table;

// パブリックに型を再エクスポート
pub use event_store::EventStore as InMemoryEventStore;
pub use message_bus::MessageBus as InMemoryMessageBus;
pub use table::Table as MemoryTable;
