use crate::adapters::memory::MemoryTable;
use crate::domain::errors::EventStoreError;
use crate::domain::events::{ExpectedVersion, OpenMode, StoredEvent, StoredSnapshot, StreamInfo};
use crate::domain::table::{Filter, Row};
use crate::ports::event_store::{EventStore as EventStoreTrait, Result};
use crate::ports::table::Table;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::schema::{events, snapshots, streams, to_i64, to_u64};

/// Table-backed implementation of EventStore
///
/// Built purely from three tables (streams, events, snapshots) using the
/// filter contract: equality on stream name, range on version or clock.
/// Snapshot payloads are read from the snapshots table only when
/// `load_snapshot` asks for them.
///
/// Writes go through one async mutex that also owns the next clock value, so a
/// version check and the rows it guards are never interleaved with another
/// writer on the same store instance.
pub struct EventStore {
    streams: Arc<dyn Table>,
    events: Arc<dyn Table>,
    snapshots: Arc<dyn Table>,
    /// Next clock value; loaded lazily from the events table
    writer: Mutex<Option<u64>>,
}

impl EventStore {
    pub fn new(streams: Arc<dyn Table>, events: Arc<dyn Table>, snapshots: Arc<dyn Table>) -> Self {
        Self {
            streams,
            events,
            snapshots,
            writer: Mutex::new(None),
        }
    }

    /// Create a store over three fresh in-memory tables
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryTable::new(streams::TABLE_NAME, streams::schema())),
            Arc::new(MemoryTable::new(events::TABLE_NAME, events::schema())),
            Arc::new(MemoryTable::new(snapshots::TABLE_NAME, snapshots::schema())),
        )
    }

    async fn stream_row(&self, name: &str) -> Result<Option<Row>> {
        let rows = self.streams.rows(&[Filter::eq(streams::NAME, name)]).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_stream_row(&self, name: &str) -> Result<Row> {
        let mut row = self.streams.new_row();
        row.set(streams::NAME, name)?;
        row.set(streams::VERSION, 0i64)?;
        row.set(streams::SNAPSHOT_VERSION, 0i64)?;
        self.streams.insert(&mut row).await?;
        tracing::debug!(stream = %name, "stream created");
        Ok(row)
    }

    async fn snapshot_row(&self, name: &str) -> Result<Option<Row>> {
        let rows = self
            .snapshots
            .rows(&[Filter::eq(snapshots::NAME, name)])
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Resolve the next clock value, scanning the events table on first use
    async fn next_clock(&self, cached: &mut Option<u64>) -> Result<u64> {
        if let Some(clock) = *cached {
            return Ok(clock);
        }

        let mut highest = 0;
        for row in self.events.rows(&[]).await? {
            highest = highest.max(to_u64(row.int(events::CLOCK)?, "clock")?);
        }
        let next = highest + 1;
        *cached = Some(next);
        Ok(next)
    }

    fn stream_info(row: &Row) -> Result<StreamInfo> {
        Ok(StreamInfo {
            name: row.text(streams::NAME)?.to_string(),
            version: to_u64(row.int(streams::VERSION)?, "version")?,
            snapshot_version: to_u64(row.int(streams::SNAPSHOT_VERSION)?, "snapshot version")?,
        })
    }

    fn stored_event(row: &Row) -> Result<StoredEvent> {
        Ok(StoredEvent {
            stream: row.text(events::NAME)?.to_string(),
            version: to_u64(row.int(events::VERSION)?, "version")?,
            clock: to_u64(row.int(events::CLOCK)?, "clock")?,
            published: row.bool(events::PUBLISHED)?,
            payload: row.blob(events::DATA)?.to_vec(),
        })
    }

    fn stored_events(rows: Vec<Row>, sort_key: fn(&StoredEvent) -> u64) -> Result<Vec<StoredEvent>> {
        let mut events = rows
            .iter()
            .map(Self::stored_event)
            .collect::<Result<Vec<_>>>()?;
        events.sort_by_key(sort_key);
        Ok(events)
    }
}

#[async_trait]
impl EventStoreTrait for EventStore {
    async fn open_stream(&self, name: &str, mode: OpenMode) -> Result<Option<StreamInfo>> {
        match mode {
            OpenMode::Open => self
                .stream_row(name)
                .await?
                .map(|row| Self::stream_info(&row))
                .transpose(),
            OpenMode::OpenExisting => match self.stream_row(name).await? {
                Some(row) => Ok(Some(Self::stream_info(&row)?)),
                None => Err(EventStoreError::StreamDoesNotExist(name.to_string())),
            },
            OpenMode::Create => {
                let _writer = self.writer.lock().await;
                match self.stream_row(name).await? {
                    Some(row) => {
                        let info = Self::stream_info(&row)?;
                        if info.is_empty() {
                            Ok(Some(info))
                        } else {
                            Err(EventStoreError::StreamAlreadyExists(name.to_string()))
                        }
                    }
                    None => {
                        self.insert_stream_row(name).await?;
                        Ok(Some(StreamInfo::new(name)))
                    }
                }
            }
        }
    }

    async fn load_snapshot(&self, name: &str) -> Result<Option<StoredSnapshot>> {
        // save_snapshot writes the payload and the version in two steps
        let _writer = self.writer.lock().await;

        let Some(stream_row) = self.stream_row(name).await? else {
            return Ok(None);
        };
        let info = Self::stream_info(&stream_row)?;
        if !info.has_snapshot() {
            return Ok(None);
        }

        self.snapshot_row(name)
            .await?
            .map(|row| {
                Ok(StoredSnapshot {
                    stream: name.to_string(),
                    version: info.snapshot_version,
                    payload: row.blob(snapshots::SNAPSHOT)?.to_vec(),
                })
            })
            .transpose()
    }

    async fn load_events(&self, name: &str, min_version: u64) -> Result<Vec<StoredEvent>> {
        let rows = self
            .events
            .rows(&[
                Filter::eq(events::NAME, name),
                Filter::at_least(events::VERSION, to_i64(min_version, "version")?),
            ])
            .await?;
        Self::stored_events(rows, |e| e.version)
    }

    async fn append(
        &self,
        name: &str,
        expected: ExpectedVersion,
        payloads: Vec<Vec<u8>>,
    ) -> Result<Vec<StoredEvent>> {
        let mut writer = self.writer.lock().await;

        let stream_row = self.stream_row(name).await?;
        let current = match &stream_row {
            Some(row) => Self::stream_info(row)?.version,
            None => 0,
        };
        expected.check(name, current)?;

        if payloads.is_empty() {
            return Ok(Vec::new());
        }

        let mut stream_row = match stream_row {
            Some(row) => row,
            None => self.insert_stream_row(name).await?,
        };
        let mut clock = self.next_clock(&mut writer).await?;
        let mut appended = Vec::with_capacity(payloads.len());

        for (i, payload) in payloads.into_iter().enumerate() {
            let event = StoredEvent {
                stream: name.to_string(),
                version: current + i as u64 + 1,
                clock,
                published: false,
                payload,
            };

            let mut row = self.events.new_row();
            row.set(events::NAME, name)?;
            row.set(events::VERSION, to_i64(event.version, "version")?)?;
            row.set(events::CLOCK, to_i64(event.clock, "clock")?)?;
            row.set(events::PUBLISHED, false)?;
            row.set(events::DATA, event.payload.clone())?;
            self.events.insert(&mut row).await?;

            clock += 1;
            *writer = Some(clock);
            appended.push(event);
        }

        let version = current + appended.len() as u64;
        stream_row.set(streams::VERSION, to_i64(version, "version")?)?;
        self.streams.update(&stream_row).await?;

        tracing::debug!(stream = %name, count = appended.len(), version, "events appended");
        Ok(appended)
    }

    async fn save_snapshot(&self, snapshot: StoredSnapshot) -> Result<()> {
        let _writer = self.writer.lock().await;

        let mut stream_row = self
            .stream_row(&snapshot.stream)
            .await?
            .ok_or_else(|| EventStoreError::StreamDoesNotExist(snapshot.stream.clone()))?;
        let info = Self::stream_info(&stream_row)?;
        if snapshot.version > info.version {
            return Err(EventStoreError::InvalidSnapshotVersion {
                stream: snapshot.stream.clone(),
                version: snapshot.version,
                current: info.version,
            });
        }

        match self.snapshot_row(&snapshot.stream).await? {
            Some(mut row) => {
                row.set(snapshots::SNAPSHOT, snapshot.payload)?;
                self.snapshots.update(&row).await?;
            }
            None => {
                let mut row = self.snapshots.new_row();
                row.set(snapshots::NAME, snapshot.stream.as_str())?;
                row.set(snapshots::SNAPSHOT, snapshot.payload)?;
                self.snapshots.insert(&mut row).await?;
            }
        }

        stream_row.set(
            streams::SNAPSHOT_VERSION,
            to_i64(snapshot.version, "snapshot version")?,
        )?;
        self.streams.update(&stream_row).await?;

        tracing::debug!(stream = %snapshot.stream, version = snapshot.version, "snapshot saved");
        Ok(())
    }

    async fn events_since(&self, clock: u64) -> Result<Vec<StoredEvent>> {
        let rows = self
            .events
            .rows(&[Filter::at_least(events::CLOCK, to_i64(clock, "clock")?)])
            .await?;
        Self::stored_events(rows, |e| e.clock)
    }

    async fn unpublished_events(&self) -> Result<Vec<StoredEvent>> {
        let rows = self
            .events
            .rows(&[Filter::eq(events::PUBLISHED, false)])
            .await?;
        Self::stored_events(rows, |e| e.clock)
    }

    async fn mark_published(&self, event: &StoredEvent) -> Result<()> {
        let _writer = self.writer.lock().await;

        let mut row = self
            .events
            .rows(&[
                Filter::eq(events::NAME, event.stream.as_str()),
                Filter::eq(events::VERSION, to_i64(event.version, "version")?),
            ])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EventStoreError::EventNotFound {
                stream: event.stream.clone(),
                version: event.version,
            })?;

        if !row.bool(events::PUBLISHED)? {
            row.set(events::PUBLISHED, true)?;
            self.events.update(&row).await?;
        }
        Ok(())
    }
}
