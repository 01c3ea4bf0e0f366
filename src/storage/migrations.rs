//! Schema migrations keyed on `PRAGMA user_version`.

use super::{StorageError, StorageResult};
use rusqlite::Connection;

const LATEST_SCHEMA_VERSION: i64 = 2;

pub(super) fn apply_migrations(conn: &mut Connection) -> StorageResult<()> {
    let mut user_version = read_user_version(conn)?;

    if !(0..=LATEST_SCHEMA_VERSION).contains(&user_version) {
        return Err(StorageError::Migration(format!(
            "unsupported sqlite schema version: user_version={user_version} (expected 0..={LATEST_SCHEMA_VERSION})"
        )));
    }

    let start_version = user_version;
    while user_version < LATEST_SCHEMA_VERSION {
        match user_version {
            0 => create_baseline_v1(conn)?,
            1 => migrate_v1_to_v2(conn)?,
            v => {
                return Err(StorageError::Migration(format!(
                    "no migration from user_version={v}"
                )))
            }
        }
        let from_version = user_version;
        user_version = read_user_version(conn)?;
        tracing::debug!(from_version, to_version = user_version, "sqlite migration step completed");
    }

    if start_version < user_version {
        tracing::info!(
            from_version = start_version,
            to_version = user_version,
            "sqlite migrations completed"
        );
    }
    Ok(())
}

fn read_user_version(conn: &Connection) -> StorageResult<i64> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

fn create_baseline_v1(conn: &mut Connection) -> StorageResult<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS part_types (
  part_type_id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL COLLATE NOCASE UNIQUE
);

CREATE TABLE IF NOT EXISTS parts (
  part_id INTEGER PRIMARY KEY AUTOINCREMENT,
  part_number TEXT NOT NULL COLLATE NOCASE UNIQUE,
  quantity INTEGER NOT NULL DEFAULT 0,
  low_stock_threshold INTEGER NOT NULL DEFAULT 0,
  part_type TEXT,
  keywords TEXT NOT NULL DEFAULT '',
  description TEXT,
  datasheet_url TEXT,
  digikey_part_number TEXT,
  mouser_part_number TEXT,
  location TEXT COLLATE NOCASE,
  bin_number TEXT,
  bin_number2 TEXT,
  cost REAL NOT NULL DEFAULT 0,
  lowest_cost_supplier TEXT,
  lowest_cost_supplier_url TEXT,
  product_url TEXT,
  manufacturer TEXT COLLATE NOCASE,
  manufacturer_part_number TEXT,
  image_url TEXT,
  project_id INTEGER,
  date_created_utc TEXT NOT NULL
);

PRAGMA user_version = 1;
"#,
    )?;
    tx.commit()?;
    Ok(())
}

fn migrate_v1_to_v2(conn: &mut Connection) -> StorageResult<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE INDEX IF NOT EXISTS idx_parts_date_created ON parts(date_created_utc);
CREATE INDEX IF NOT EXISTS idx_parts_low_stock ON parts(quantity, low_stock_threshold);

PRAGMA user_version = 2;
"#,
    )?;
    tx.commit()?;
    Ok(())
}
