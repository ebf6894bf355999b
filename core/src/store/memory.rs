use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::{RecordStore, StoreError, StoreResult, stamp};
use crate::records::{Record, RecordBody, RecordId, RecordKind};

#[derive(Debug, Default)]
struct Tables {
    /// Insertion-ordered rows per kind.
    rows: HashMap<RecordKind, Vec<Record>>,
    /// (kind, id) -> position in `rows[kind]`.
    by_id: HashMap<(RecordKind, RecordId), usize>,
    /// (kind, upstream id) -> positions in `rows[kind]`, ascending.
    by_upstream: HashMap<(RecordKind, RecordId), Vec<usize>>,
}

/// Process-local record store.
///
/// Same semantics as the SQLite backend, minus durability across restarts.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: RwLock<Tables>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn put_with_id(
        &self,
        id: RecordId,
        body: RecordBody,
        created_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Record> {
        let record = stamp(id, body, created_at);
        let kind = record.kind();

        let mut tables = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        if tables.by_id.contains_key(&(kind, id)) {
            return Err(StoreError::DuplicateId { kind, id });
        }

        let rows = tables.rows.entry(kind).or_default();
        let position = rows.len();
        rows.push(record.clone());
        tables.by_id.insert((kind, id), position);
        if let Some(upstream) = record.upstream() {
            tables
                .by_upstream
                .entry((kind, upstream))
                .or_default()
                .push(position);
        }

        Ok(record)
    }
}

impl RecordStore for MemoryRecordStore {
    fn put(&self, body: RecordBody, created_at: Option<DateTime<Utc>>) -> StoreResult<Record> {
        self.put_with_id(RecordId::new(), body, created_at)
    }

    fn get(&self, kind: RecordKind, id: &RecordId) -> StoreResult<Record> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        tables
            .by_id
            .get(&(kind, *id))
            .and_then(|&position| tables.rows.get(&kind)?.get(position))
            .cloned()
            .ok_or(StoreError::NotFound { kind, id: *id })
    }

    fn find_by_reference(
        &self,
        kind: RecordKind,
        upstream: &RecordId,
    ) -> StoreResult<Vec<Record>> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        let (Some(positions), Some(rows)) = (
            tables.by_upstream.get(&(kind, *upstream)),
            tables.rows.get(&kind),
        ) else {
            return Ok(Vec::new());
        };

        Ok(positions
            .iter()
            .filter_map(|&position| rows.get(position).cloned())
            .collect())
    }

    fn count(&self, kind: RecordKind) -> StoreResult<u64> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tables.rows.get(&kind).map_or(0, |rows| rows.len() as u64))
    }
}
