use crate::domain::errors::EventStoreError;
use crate::domain::events::{ExpectedVersion, OpenMode, StoredEvent, StoredSnapshot, StreamInfo};
use crate::ports::event_store::{EventStore as EventStoreTrait, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// In-memory implementation of EventStore
///
/// Single process, no durability. The whole store sits behind one mutex, which
/// makes the version check and the append a single critical section.
pub struct EventStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    streams: HashMap<String, StreamState>,
    next_clock: u64,
}

#[derive(Default)]
struct StreamState {
    events: Vec<StoredEvent>,
    snapshot: Option<StoredSnapshot>,
}

impl StreamState {
    fn version(&self) -> u64 {
        self.events.len() as u64
    }

    fn info(&self, name: &str) -> StreamInfo {
        StreamInfo {
            name: name.to_string(),
            version: self.version(),
            snapshot_version: self.snapshot.as_ref().map_or(0, |s| s.version),
        }
    }
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                streams: HashMap::new(),
                next_clock: 1,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| EventStoreError::Corrupt("in-memory event store lock poisoned".into()))
    }

    fn collect_sorted(inner: &Inner, predicate: impl Fn(&StoredEvent) -> bool) -> Vec<StoredEvent> {
        let mut events: Vec<StoredEvent> = inner
            .streams
            .values()
            .flat_map(|s| s.events.iter())
            .filter(|e| predicate(e))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.clock);
        events
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStoreTrait for EventStore {
    async fn open_stream(&self, name: &str, mode: OpenMode) -> Result<Option<StreamInfo>> {
        let mut inner = self.lock()?;
        let existing = inner.streams.get(name).map(|s| s.info(name));
        match (existing, mode) {
            (Some(info), OpenMode::Create) if !info.is_empty() => {
                Err(EventStoreError::StreamAlreadyExists(name.to_string()))
            }
            (Some(info), _) => Ok(Some(info)),
            (None, OpenMode::Open) => Ok(None),
            (None, OpenMode::OpenExisting) => {
                Err(EventStoreError::StreamDoesNotExist(name.to_string()))
            }
            (None, OpenMode::Create) => {
                inner.streams.insert(name.to_string(), StreamState::default());
                tracing::debug!(stream = %name, "stream created");
                Ok(Some(StreamInfo::new(name)))
            }
        }
    }

    async fn load_snapshot(&self, name: &str) -> Result<Option<StoredSnapshot>> {
        let inner = self.lock()?;
        Ok(inner.streams.get(name).and_then(|s| s.snapshot.clone()))
    }

    async fn load_events(&self, name: &str, min_version: u64) -> Result<Vec<StoredEvent>> {
        let inner = self.lock()?;
        Ok(inner
            .streams
            .get(name)
            .map(|s| {
                s.events
                    .iter()
                    .filter(|e| e.version >= min_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append(
        &self,
        name: &str,
        expected: ExpectedVersion,
        payloads: Vec<Vec<u8>>,
    ) -> Result<Vec<StoredEvent>> {
        let mut inner = self.lock()?;
        let current = inner.streams.get(name).map_or(0, StreamState::version);
        expected.check(name, current)?;

        if payloads.is_empty() {
            return Ok(Vec::new());
        }

        let mut clock = inner.next_clock;
        let appended: Vec<StoredEvent> = payloads
            .into_iter()
            .enumerate()
            .map(|(i, payload)| {
                let event = StoredEvent {
                    stream: name.to_string(),
                    version: current + i as u64 + 1,
                    clock,
                    published: false,
                    payload,
                };
                clock += 1;
                event
            })
            .collect();
        inner.next_clock = clock;

        let stream = inner.streams.entry(name.to_string()).or_default();
        stream.events.extend(appended.iter().cloned());

        tracing::debug!(
            stream = %name,
            count = appended.len(),
            version = stream.version(),
            "events appended"
        );
        Ok(appended)
    }

    async fn save_snapshot(&self, snapshot: StoredSnapshot) -> Result<()> {
        let mut inner = self.lock()?;
        let stream = inner
            .streams
            .get_mut(&snapshot.stream)
            .ok_or_else(|| EventStoreError::StreamDoesNotExist(snapshot.stream.clone()))?;

        if snapshot.version > stream.version() {
            return Err(EventStoreError::InvalidSnapshotVersion {
                stream: snapshot.stream.clone(),
                version: snapshot.version,
                current: stream.version(),
            });
        }

        tracing::debug!(stream = %snapshot.stream, version = snapshot.version, "snapshot saved");
        stream.snapshot = Some(snapshot);
        Ok(())
    }

    async fn events_since(&self, clock: u64) -> Result<Vec<StoredEvent>> {
        let inner = self.lock()?;
        Ok(Self::collect_sorted(&inner, |e| e.clock >= clock))
    }

    async fn unpublished_events(&self) -> Result<Vec<StoredEvent>> {
        let inner = self.lock()?;
        Ok(Self::collect_sorted(&inner, |e| !e.published))
    }

    async fn mark_published(&self, event: &StoredEvent) -> Result<()> {
        let mut inner = self.lock()?;
        let not_found = || EventStoreError::EventNotFound {
            stream: event.stream.clone(),
            version: event.version,
        };

        let stream = inner.streams.get_mut(&event.stream).ok_or_else(not_found)?;
        let index = usize::try_from(event.version)
            .ok()
            .and_then(|v| v.checked_sub(1))
            .ok_or_else(not_found)?;
        let stored = stream.events.get_mut(index).ok_or_else(not_found)?;
        stored.published = true;
        Ok(())
    }
}
