use crate::domain::errors::TableError;
use crate::domain::table::{Filter, Row, RowId, Schema, matches_all};
use crate::ports::table::{Result, Table as TableTrait};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// In-memory implementation of Table
///
/// Rows live in a `BTreeMap` keyed by row id behind a mutex. Every read hands
/// out clones, so callers never observe later writes through a returned row.
pub struct Table {
    name: String,
    schema: Schema,
    inner: Mutex<Inner>,
}

struct Inner {
    rows: BTreeMap<RowId, Row>,
    next_id: RowId,
}

impl Table {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            inner: Mutex::new(Inner {
                rows: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stored rows
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.rows.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| TableError::Storage(format!("table {} lock poisoned", self.name)))
    }
}

#[async_trait]
impl TableTrait for Table {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn insert(&self, row: &mut Row) -> Result<RowId> {
        if row.is_inserted() {
            return Err(TableError::AlreadyInserted(row.id()));
        }
        self.schema.validate_row(row)?;

        let mut inner = self.lock()?;
        let id = inner.next_id;
        inner.next_id += 1;
        row.assign_id(id);
        inner.rows.insert(id, row.clone());

        tracing::trace!(table = %self.name, row_id = id, "row inserted");
        Ok(id)
    }

    async fn update(&self, row: &Row) -> Result<()> {
        self.schema.validate_row(row)?;

        let mut inner = self.lock()?;
        match inner.rows.get_mut(&row.id()) {
            Some(stored) => {
                *stored = row.clone();
                Ok(())
            }
            None => Err(TableError::RowNotFound(row.id())),
        }
    }

    async fn update_where(&self, row: &Row, filters: &[Filter]) -> Result<bool> {
        self.schema.validate_row(row)?;
        for filter in filters {
            self.schema.validate_filter(filter)?;
        }

        let mut inner = self.lock()?;
        match inner.rows.get_mut(&row.id()) {
            Some(stored) if matches_all(filters, stored) => {
                *stored = row.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, row: &Row) -> Result<()> {
        let mut inner = self.lock()?;
        inner
            .rows
            .remove(&row.id())
            .map(|_| ())
            .ok_or(TableError::RowNotFound(row.id()))
    }

    async fn rows(&self, filters: &[Filter]) -> Result<Vec<Row>> {
        for filter in filters {
            self.schema.validate_filter(filter)?;
        }

        let inner = self.lock()?;
        Ok(inner
            .rows
            .values()
            .filter(|row| matches_all(filters, row))
            .cloned()
            .collect())
    }
}
