pub mod event_store;

// パブリックに型を再エクスポート
pub use event_store::EventStore as PostgresEventStore;
