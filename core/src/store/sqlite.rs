use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use super::{RecordStore, StoreError, StoreResult, migrations, stamp};
use crate::records::{
    Actor, Collection, GeoPoint, LabTest, Processing, Record, RecordBody, RecordId, RecordKind,
    SensorReadings, Transport,
};

/// `PRAGMA synchronous` level for committed writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// fsync on every commit; a returned `put` survives power loss.
    #[default]
    Full,
    /// WAL default; a crash may roll back the most recent commits.
    Normal,
}

impl Durability {
    fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Normal => "NORMAL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub pool_size: u32,
    pub busy_timeout: Duration,
    pub durability: Durability,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout: Duration::from_millis(5_000),
            durability: Durability::Full,
        }
    }
}

/// Durable record store over a pool of SQLite connections.
pub struct SqliteRecordStore {
    pool: Pool<SqliteConnectionManager>,
    path: Option<PathBuf>,
}

impl SqliteRecordStore {
    /// Open (creating if needed) the database at `path` and migrate it.
    pub fn open(path: &Path, options: &SqliteOptions) -> StoreResult<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let busy_timeout = options.busy_timeout;
        let durability = options.durability;
        let manager = SqliteConnectionManager::file(path)
            .with_init(move |conn| apply_pragmas(conn, busy_timeout, durability));
        let pool = Pool::builder()
            .max_size(options.pool_size.max(1))
            .build(manager)
            .map_err(pool_error)?;

        let store = Self {
            pool,
            path: Some(path.to_path_buf()),
        };
        store.migrate()?;

        tracing::debug!(
            path = %path.display(),
            pool_size = options.pool_size,
            durability = ?options.durability,
            "Record store opened"
        );
        Ok(store)
    }

    /// Single-connection in-memory database. The connection is pinned so the
    /// data lives as long as the store.
    pub fn open_in_memory() -> StoreResult<Self> {
        let options = SqliteOptions::default();
        let busy_timeout = options.busy_timeout;
        let durability = options.durability;
        let manager = SqliteConnectionManager::memory()
            .with_init(move |conn| apply_pragmas(conn, busy_timeout, durability));
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)
            .map_err(pool_error)?;

        let store = Self { pool, path: None };
        store.migrate()?;
        Ok(store)
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> StoreResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(pool_error)
    }

    fn migrate(&self) -> StoreResult<()> {
        let mut conn = self.conn()?;
        migrations::migrate_to_latest(&mut conn)
    }

    pub(crate) fn put_with_id(
        &self,
        id: RecordId,
        body: RecordBody,
        created_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Record> {
        let record = stamp(id, body, created_at);
        let conn = self.conn()?;
        insert(&conn, &record)?;
        Ok(record)
    }
}

impl RecordStore for SqliteRecordStore {
    fn put(&self, body: RecordBody, created_at: Option<DateTime<Utc>>) -> StoreResult<Record> {
        self.put_with_id(RecordId::new(), body, created_at)
    }

    fn get(&self, kind: RecordKind, id: &RecordId) -> StoreResult<Record> {
        let conn = self.conn()?;
        let sql = format!("{} WHERE id = ?1", select_sql(kind));
        let mut stmt = conn.prepare_cached(&sql)?;
        stmt.query_row(params![id.to_string()], |row| map_row(kind, row))
            .optional()?
            .ok_or(StoreError::NotFound { kind, id: *id })
    }

    fn find_by_reference(
        &self,
        kind: RecordKind,
        upstream: &RecordId,
    ) -> StoreResult<Vec<Record>> {
        if kind == RecordKind::Collection {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let sql = format!(
            "{} WHERE collection_id = ?1 ORDER BY seq ASC",
            select_sql(kind)
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![upstream.to_string()], |row| map_row(kind, row))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn count(&self, kind: RecordKind) -> StoreResult<u64> {
        let conn = self.conn()?;
        let sql = format!("SELECT COUNT(*) FROM {}", table_name(kind));
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn pool_error(err: r2d2::Error) -> StoreError {
    StoreError::Pool(err.to_string())
}

fn apply_pragmas(
    conn: &mut Connection,
    busy_timeout: Duration,
    durability: Durability,
) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    // journal_mode answers with the resulting mode, so it has to be queried.
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", durability.pragma_value())?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(())
}

fn table_name(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Collection => "collections",
        RecordKind::Transport => "transports",
        RecordKind::Processing => "processings",
        RecordKind::LabTest => "lab_tests",
    }
}

fn select_sql(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Collection => {
            "SELECT id, created_at, collector, species, quantity_kg, method, lat, lng,
                    temperature_c, humidity_pct, soil_moisture_pct, ph
             FROM collections"
        }
        RecordKind::Transport => {
            "SELECT id, created_at, collection_id, carrier, quantity_kg, destination, lat, lng
             FROM transports"
        }
        RecordKind::Processing => {
            "SELECT id, created_at, collection_id, operator, received_quantity_kg,
                    processed_quantity_kg, method, lat, lng
             FROM processings"
        }
        RecordKind::LabTest => {
            "SELECT id, created_at, collection_id, technician, tested_quantity_kg, test_type,
                    result, certificate_links, lat, lng
             FROM lab_tests"
        }
    }
}

fn insert(conn: &Connection, record: &Record) -> StoreResult<()> {
    let id = record.id.to_string();
    let created_at = record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true);

    let result = match &record.body {
        RecordBody::Collection(c) => conn.execute(
            "INSERT INTO collections
                (id, created_at, collector, species, quantity_kg, method, lat, lng,
                 temperature_c, humidity_pct, soil_moisture_pct, ph)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                id,
                created_at,
                c.collector.as_str(),
                c.species,
                c.quantity_kg,
                c.method,
                c.location.lat,
                c.location.lng,
                c.sensors.temperature_c,
                c.sensors.humidity_pct,
                c.sensors.soil_moisture_pct,
                c.sensors.ph,
            ],
        ),
        RecordBody::Transport(t) => conn.execute(
            "INSERT INTO transports
                (id, collection_id, created_at, carrier, quantity_kg, destination, lat, lng)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                t.collection_id.to_string(),
                created_at,
                t.carrier.as_str(),
                t.quantity_kg,
                t.destination,
                t.location.lat,
                t.location.lng,
            ],
        ),
        RecordBody::Processing(p) => conn.execute(
            "INSERT INTO processings
                (id, collection_id, created_at, operator, received_quantity_kg,
                 processed_quantity_kg, method, lat, lng)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                p.collection_id.to_string(),
                created_at,
                p.operator.as_str(),
                p.received_quantity_kg,
                p.processed_quantity_kg,
                p.method,
                p.location.lat,
                p.location.lng,
            ],
        ),
        RecordBody::LabTest(l) => {
            let links = serde_json::to_string(&l.certificate_links)?;
            conn.execute(
                "INSERT INTO lab_tests
                    (id, collection_id, created_at, technician, tested_quantity_kg, test_type,
                     result, certificate_links, lat, lng)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id,
                    l.collection_id.to_string(),
                    created_at,
                    l.technician.as_str(),
                    l.tested_quantity_kg,
                    l.test_type,
                    l.result,
                    links,
                    l.location.lat,
                    l.location.lng,
                ],
            )
        }
    };

    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Err(StoreError::DuplicateId {
                kind: record.kind(),
                id: record.id,
            })
        }
        Err(err) => Err(err.into()),
    }
}

fn map_row(kind: RecordKind, row: &Row<'_>) -> rusqlite::Result<Record> {
    let id = id_column(row, 0)?;
    let created_at = time_column(row, 1)?;

    let body = match kind {
        RecordKind::Collection => RecordBody::Collection(Collection {
            collector: Actor::new(row.get::<_, String>(2)?),
            species: row.get(3)?,
            quantity_kg: row.get(4)?,
            method: row.get(5)?,
            location: GeoPoint::new(row.get(6)?, row.get(7)?),
            sensors: SensorReadings {
                temperature_c: row.get(8)?,
                humidity_pct: row.get(9)?,
                soil_moisture_pct: row.get(10)?,
                ph: row.get(11)?,
            },
        }),
        RecordKind::Transport => RecordBody::Transport(Transport {
            collection_id: id_column(row, 2)?,
            carrier: Actor::new(row.get::<_, String>(3)?),
            quantity_kg: row.get(4)?,
            destination: row.get(5)?,
            location: GeoPoint::new(row.get(6)?, row.get(7)?),
        }),
        RecordKind::Processing => RecordBody::Processing(Processing {
            collection_id: id_column(row, 2)?,
            operator: Actor::new(row.get::<_, String>(3)?),
            received_quantity_kg: row.get(4)?,
            processed_quantity_kg: row.get(5)?,
            method: row.get(6)?,
            location: GeoPoint::new(row.get(7)?, row.get(8)?),
        }),
        RecordKind::LabTest => {
            let raw_links: String = row.get(7)?;
            let certificate_links: Vec<String> = serde_json::from_str(&raw_links)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;
            RecordBody::LabTest(LabTest {
                collection_id: id_column(row, 2)?,
                technician: Actor::new(row.get::<_, String>(3)?),
                tested_quantity_kg: row.get(4)?,
                test_type: row.get(5)?,
                result: row.get(6)?,
                certificate_links,
                location: GeoPoint::new(row.get(8)?, row.get(9)?),
            })
        }
    };

    Ok(Record {
        id,
        created_at,
        body,
    })
}

fn id_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<RecordId> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: uuid::Error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
