//! Column layouts for the three tables behind the table-backed event store.
//!
//! Positions are ordinals into `Row`; ordinal 0 is always the row id.

use crate::domain::errors::EventStoreError;
use crate::domain::table::{ColumnType, Schema};

/// Column mappings for the `streams` table.
///
/// streams(name, version, snapshotversion)
pub mod streams {
    use super::*;

    pub const TABLE_NAME: &str = "streams";
    /// name TEXT
    pub const NAME: usize = 1;
    /// version INT - version of the last committed event
    pub const VERSION: usize = 2;
    /// snapshot_version INT - 0 when no snapshot exists
    pub const SNAPSHOT_VERSION: usize = 3;

    pub fn schema() -> Schema {
        Schema::new(&[
            ("name", ColumnType::Text),
            ("version", ColumnType::Int),
            ("snapshot_version", ColumnType::Int),
        ])
    }
}

/// Column mappings for the `events` table.
///
/// events(name, version, clock, published, data)
pub mod events {
    use super::*;

    pub const TABLE_NAME: &str = "events";
    /// name TEXT
    pub const NAME: usize = 1;
    /// version INT - dense per stream, starting at 1
    pub const VERSION: usize = 2;
    /// clock INT - strictly increasing across the store
    pub const CLOCK: usize = 3;
    /// published BOOL
    pub const PUBLISHED: usize = 4;
    /// data BLOB
    pub const DATA: usize = 5;

    pub fn schema() -> Schema {
        Schema::new(&[
            ("name", ColumnType::Text),
            ("version", ColumnType::Int),
            ("clock", ColumnType::Int),
            ("published", ColumnType::Bool),
            ("data", ColumnType::Blob),
        ])
    }
}

/// Column mappings for the `snapshots` table.
///
/// snapshots(name, snapshot)
pub mod snapshots {
    use super::*;

    pub const TABLE_NAME: &str = "snapshots";
    /// name TEXT
    pub const NAME: usize = 1;
    /// snapshot BLOB
    pub const SNAPSHOT: usize = 2;

    pub fn schema() -> Schema {
        Schema::new(&[("name", ColumnType::Text), ("snapshot", ColumnType::Blob)])
    }
}

/// Stored integers are signed; versions and clocks never are.
pub(crate) fn to_u64(value: i64, what: &str) -> Result<u64, EventStoreError> {
    u64::try_from(value).map_err(|_| EventStoreError::Corrupt(format!("negative {what}: {value}")))
}

pub(crate) fn to_i64(value: u64, what: &str) -> Result<i64, EventStoreError> {
    i64::try_from(value).map_err(|_| EventStoreError::Corrupt(format!("{what} out of range: {value}")))
}
