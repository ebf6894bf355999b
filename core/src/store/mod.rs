//! Record store: durable keyed storage for the four record kinds.
//!
//! Records are append-only. The trait has no update or delete
//! method, and the SQLite schema backs that up with triggers.
//!
//! Two backends:
//! - [`SqliteRecordStore`]: pooled rusqlite connections, WAL, durable writes
//! - [`MemoryRecordStore`]: process-local, for embedding and tests

use chrono::{DateTime, SubsecRound, Utc};

use crate::records::{Record, RecordBody, RecordId, RecordKind};

mod memory;
pub mod migrations;
mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::{Durability, SqliteOptions, SqliteRecordStore};

/// Errors from the store layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} record not found: {id}")]
    NotFound { kind: RecordKind, id: RecordId },

    #[error("{kind} identifier already in use: {id}")]
    DuplicateId { kind: RecordKind, id: RecordId },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub trait RecordStore: Send + Sync {
    /// Persist `body` under a freshly minted identifier.
    ///
    /// `created_at` is stamped with the current time when absent. The write
    /// is durable by the time this returns, and an existing record is never
    /// overwritten.
    fn put(&self, body: RecordBody, created_at: Option<DateTime<Utc>>) -> StoreResult<Record>;

    /// Look up one record. An id stored under a different kind is `NotFound`.
    fn get(&self, kind: RecordKind, id: &RecordId) -> StoreResult<Record>;

    /// All `kind` records whose upstream reference is `upstream`, earliest
    /// insertion first.
    fn find_by_reference(&self, kind: RecordKind, upstream: &RecordId)
    -> StoreResult<Vec<Record>>;

    /// Number of stored records of `kind`.
    fn count(&self, kind: RecordKind) -> StoreResult<u64>;
}

/// Build the record `put` will persist. Timestamps are kept at microsecond
/// precision so a stored record reads back equal to what `put` returned.
pub(crate) fn stamp(
    id: RecordId,
    body: RecordBody,
    created_at: Option<DateTime<Utc>>,
) -> Record {
    let created_at = created_at.unwrap_or_else(Utc::now).trunc_subsecs(6);
    Record {
        id,
        created_at,
        body,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::records::{
        Actor, Collection, GeoPoint, LabTest, Processing, RecordBody, RecordId, SensorReadings,
        Transport,
    };

    pub fn collection_body(species: &str) -> RecordBody {
        RecordBody::Collection(Collection {
            collector: Actor::new("collector-1"),
            species: species.to_string(),
            quantity_kg: 25.0,
            method: "organic".to_string(),
            location: GeoPoint::new(26.91, 75.79),
            sensors: SensorReadings {
                temperature_c: Some(24.5),
                humidity_pct: Some(61.2),
                soil_moisture_pct: None,
                ph: Some(6.4),
            },
        })
    }

    pub fn transport_body(collection_id: RecordId, destination: &str) -> RecordBody {
        RecordBody::Transport(Transport {
            collection_id,
            carrier: Actor::new("carrier-1"),
            quantity_kg: 25.0,
            destination: destination.to_string(),
            location: GeoPoint::new(26.92, 75.80),
        })
    }

    pub fn processing_body(collection_id: RecordId) -> RecordBody {
        RecordBody::Processing(Processing {
            collection_id,
            operator: Actor::new("operator-1"),
            received_quantity_kg: 25.0,
            processed_quantity_kg: 20.0,
            method: "drying".to_string(),
            location: GeoPoint::new(26.95, 75.81),
        })
    }

    pub fn lab_test_body(collection_id: RecordId) -> RecordBody {
        RecordBody::LabTest(LabTest {
            collection_id,
            technician: Actor::new("tech-1"),
            tested_quantity_kg: 0.5,
            test_type: "heavy metals".to_string(),
            result: "Pass".to_string(),
            certificate_links: vec!["https://lab.example/cert/1".to_string()],
            location: GeoPoint::new(26.99, 75.85),
        })
    }
}
