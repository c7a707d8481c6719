pub mod event_store;
pub mod schema;

// パブリックに型を再エクスポート
pub use event_store::EventStore as TableEventStore;
