//! Schema versioning and migrations
//!
//! Forward-only. The applied version lives in `PRAGMA user_version`; each
//! migration is idempotent (`IF NOT EXISTS`) and runs inside an IMMEDIATE
//! transaction so two processes opening the same file cannot interleave.

use rusqlite::{Connection, TransactionBehavior};

use super::{StoreError, StoreResult};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

const MIGRATION_V1: &str = include_str!("schema_v1.sql");

/// Apply all migrations to bring the DB to the current version.
pub fn migrate_to_latest(conn: &mut Connection) -> StoreResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = schema_version(&tx)?;

    if current > SCHEMA_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {current} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    if current < 1 {
        tx.execute_batch(MIGRATION_V1)?;
        tracing::debug!(version = 1, "Applied record store migration");
    }

    if current < SCHEMA_VERSION {
        tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }

    tx.commit()?;
    Ok(())
}

/// Read the applied schema version.
pub fn schema_version(conn: &Connection) -> StoreResult<i32> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}
