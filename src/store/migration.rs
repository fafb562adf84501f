//! Schema migration for the graveyard store.
//!
//! The schema version lives in SQLite's `user_version` header field. Version 0
//! is the legacy layout: the world id is split into two integer columns, the
//! permission group column is called `group_name`, there are no safety
//! columns, and discoveries carry a `player_uid` without a timestamp.
//!
//! Migration reads every legacy row through the same row mapping the store
//! uses, drops and recreates the table, and re-inserts what mapped to a valid
//! record. Everything happens in one transaction, and the version marker is
//! written inside it, so a structural failure leaves both the data and the
//! marker untouched and the migration retries on the next start. Rows that
//! fail to map or re-insert are logged and counted, not fatal. Discoveries of
//! graveyards that did not survive are counted as invalid.
//!
//! # Adding a version
//!
//! 1. Increment `CURRENT_SCHEMA_VERSION`
//! 2. Teach `GraveyardRow::read` / `DiscoveryRow::read` any renamed columns
//! 3. Add a migration test that builds the previous layout by hand

use chrono::Utc;
use log::{error, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use super::errors::StoreError;
use super::schema::{
    insert_discovery, insert_graveyard, table_exists, DiscoveryRow, GraveyardRow,
    CREATE_DISCOVERIES, CREATE_GRAVEYARDS, TABLE_DISCOVERIES, TABLE_GRAVEYARDS,
};
use crate::logutil::escape_log;
use crate::model::{Discovery, Graveyard, ValidSearchKey, WorldDirectory};

pub const CURRENT_SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    NeedsMigration { from: i32 },
    UpToDate,
}

/// Per-table outcome of a migration step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMigration {
    pub table: &'static str,
    /// Rows present before the rewrite.
    pub read: usize,
    /// Rows that mapped to a valid record and were written back.
    pub reinserted: usize,
    /// Rows that failed to read, mapped to an invalid record, or point at a
    /// graveyard that was not carried forward.
    pub invalid: usize,
    /// Valid rows the new table refused (duplicate keys after normalization).
    pub failed: usize,
    /// Legacy duplicates folded into an existing row.
    pub merged: usize,
}

impl TableMigration {
    fn new(table: &'static str) -> Self {
        Self {
            table,
            read: 0,
            reinserted: 0,
            invalid: 0,
            failed: 0,
            merged: 0,
        }
    }

    pub fn lost(&self) -> usize {
        self.invalid + self.failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: i32,
    pub to_version: i32,
    pub tables: Vec<TableMigration>,
}

impl MigrationReport {
    pub fn table(&self, table: &str) -> Option<&TableMigration> {
        self.tables.iter().find(|t| t.table == table)
    }

    /// Rows that existed before migration and do not exist after it.
    pub fn lost(&self) -> usize {
        self.tables.iter().map(TableMigration::lost).sum()
    }
}

pub fn schema_version(conn: &Connection) -> rusqlite::Result<i32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> rusqlite::Result<()> {
    // PRAGMA does not take bound parameters
    conn.execute_batch(&format!("PRAGMA user_version = {}", version))
}

pub fn detect(conn: &Connection) -> Result<MigrationState, StoreError> {
    let found = schema_version(conn)?;
    if found > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::FutureSchema {
            found,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }
    if found < CURRENT_SCHEMA_VERSION {
        Ok(MigrationState::NeedsMigration { from: found })
    } else {
        Ok(MigrationState::UpToDate)
    }
}

/// Bring the store to `CURRENT_SCHEMA_VERSION`. Returns `None` when it already was.
///
/// A fresh file has version 0 and no tables; it goes through the same path and
/// ends with empty tables and an empty report.
pub fn migrate(
    conn: &mut Connection,
    directory: &dyn WorldDirectory,
) -> Result<Option<MigrationReport>, StoreError> {
    let from = match detect(conn)? {
        MigrationState::UpToDate => {
            conn.execute_batch(CREATE_GRAVEYARDS)?;
            conn.execute_batch(CREATE_DISCOVERIES)?;
            return Ok(None);
        }
        MigrationState::NeedsMigration { from } => from,
    };

    info!(
        "Migrating graveyard store from schema v{} to v{}",
        from, CURRENT_SCHEMA_VERSION
    );

    let tx = conn.transaction()?;
    let mut tables = Vec::new();
    if table_exists(&tx, TABLE_GRAVEYARDS)? {
        tables.push(migrate_graveyards(&tx, directory)?);
    }
    tx.execute_batch(CREATE_GRAVEYARDS)?;
    if table_exists(&tx, TABLE_DISCOVERIES)? {
        tables.push(migrate_discoveries(&tx)?);
    }
    tx.execute_batch(CREATE_DISCOVERIES)?;
    set_schema_version(&tx, CURRENT_SCHEMA_VERSION)?;
    tx.commit()?;

    let report = MigrationReport {
        from_version: from,
        to_version: CURRENT_SCHEMA_VERSION,
        tables,
    };
    for table in &report.tables {
        if table.lost() > 0 {
            error!(
                "Migration of {}: {} of {} rows were not carried forward ({} invalid, {} rejected)",
                table.table,
                table.lost(),
                table.read,
                table.invalid,
                table.failed
            );
        } else {
            info!(
                "Migration of {}: {} rows carried forward",
                table.table, table.reinserted
            );
        }
    }
    info!(
        "Graveyard store now at schema v{}",
        report.to_version
    );
    Ok(Some(report))
}

/// Drop `table` and create it again from `create`, tagging failures with the table name.
fn recreate(tx: &Transaction<'_>, table: &'static str, create: &str) -> Result<(), StoreError> {
    tx.execute_batch(&format!("DROP TABLE {}", table))
        .and_then(|_| tx.execute_batch(create))
        .map_err(|source| {
            error!("Could not rebuild table {}: {}", table, source);
            StoreError::Migration { table, source }
        })
}

fn migrate_graveyards(
    tx: &Transaction<'_>,
    directory: &dyn WorldDirectory,
) -> Result<TableMigration, StoreError> {
    let mut outcome = TableMigration::new(TABLE_GRAVEYARDS);
    let mut valid = Vec::new();
    {
        let mut stmt = tx
            .prepare("SELECT * FROM graveyards ORDER BY rowid")
            .map_err(|source| StoreError::Migration {
                table: TABLE_GRAVEYARDS,
                source,
            })?;
        let rows = stmt
            .query_map([], GraveyardRow::read)
            .map_err(|source| StoreError::Migration {
                table: TABLE_GRAVEYARDS,
                source,
            })?;
        for row in rows {
            outcome.read += 1;
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!("Skipping unreadable graveyard row: {}", e);
                    outcome.invalid += 1;
                    continue;
                }
            };
            let key = row.search_key().unwrap_or("<none>").to_string();
            match row.into_graveyard(directory) {
                Graveyard::Valid(graveyard) => valid.push(graveyard),
                Graveyard::Invalid(invalid) => {
                    warn!(
                        "Dropping graveyard '{}' during migration: {}",
                        escape_log(&key),
                        invalid.reason()
                    );
                    outcome.invalid += 1;
                }
            }
        }
    }

    recreate(tx, TABLE_GRAVEYARDS, CREATE_GRAVEYARDS)?;

    for graveyard in &valid {
        match insert_graveyard(tx, graveyard) {
            Ok(_) => outcome.reinserted += 1,
            Err(e) => {
                warn!(
                    "Could not re-insert graveyard '{}': {}",
                    escape_log(graveyard.search_key().as_str()),
                    e
                );
                outcome.failed += 1;
            }
        }
    }
    Ok(outcome)
}

fn migrate_discoveries(tx: &Transaction<'_>) -> Result<TableMigration, StoreError> {
    let mut outcome = TableMigration::new(TABLE_DISCOVERIES);
    let migrated_at = Utc::now();
    let mut valid = Vec::new();
    {
        let mut stmt = tx
            .prepare("SELECT * FROM discoveries ORDER BY rowid")
            .map_err(|source| StoreError::Migration {
                table: TABLE_DISCOVERIES,
                source,
            })?;
        let rows = stmt
            .query_map([], DiscoveryRow::read)
            .map_err(|source| StoreError::Migration {
                table: TABLE_DISCOVERIES,
                source,
            })?;
        for row in rows {
            outcome.read += 1;
            match row.map(|r| r.into_discovery(migrated_at)) {
                Ok(Discovery::Valid(discovery)) => valid.push(discovery),
                Ok(Discovery::Invalid(reason)) => {
                    warn!("Dropping discovery during migration: {}", reason);
                    outcome.invalid += 1;
                }
                Err(e) => {
                    warn!("Skipping unreadable discovery row: {}", e);
                    outcome.invalid += 1;
                }
            }
        }
    }

    recreate(tx, TABLE_DISCOVERIES, CREATE_DISCOVERIES)?;

    for discovery in &valid {
        if !graveyard_exists(tx, discovery.search_key())? {
            warn!(
                "Dropping discovery of missing graveyard '{}' during migration",
                escape_log(discovery.search_key().as_str())
            );
            outcome.invalid += 1;
            continue;
        }
        match insert_discovery(tx, discovery) {
            Ok(1) => outcome.reinserted += 1,
            // the legacy table had no uniqueness constraint
            Ok(_) => outcome.merged += 1,
            Err(e) => {
                warn!("Could not re-insert discovery: {}", e);
                outcome.failed += 1;
            }
        }
    }
    Ok(outcome)
}

/// Runs against the already migrated graveyards table.
fn graveyard_exists(tx: &Transaction<'_>, key: &ValidSearchKey) -> Result<bool, StoreError> {
    tx.query_row(
        "SELECT 1 FROM graveyards WHERE search_key = ?1",
        params![key.as_str()],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(|source| StoreError::Migration {
        table: TABLE_DISCOVERIES,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EveryWorldLoaded;

    #[test]
    fn fresh_database_is_created_at_current_version() {
        let mut conn = Connection::open_in_memory().expect("open");
        let report = migrate(&mut conn, &EveryWorldLoaded).expect("migrate");
        let report = report.expect("fresh file goes through migration");
        assert!(report.tables.is_empty());
        assert_eq!(schema_version(&conn).expect("version"), CURRENT_SCHEMA_VERSION);
        assert!(table_exists(&conn, TABLE_GRAVEYARDS).expect("exists"));
        assert!(table_exists(&conn, TABLE_DISCOVERIES).expect("exists"));

        let again = migrate(&mut conn, &EveryWorldLoaded).expect("migrate");
        assert_eq!(again, None);
    }

    #[test]
    fn newer_schema_is_refused() {
        let conn = Connection::open_in_memory().expect("open");
        set_schema_version(&conn, CURRENT_SCHEMA_VERSION + 1).expect("set");
        assert!(matches!(
            detect(&conn),
            Err(StoreError::FutureSchema { .. })
        ));
    }

    #[test]
    fn detect_reports_legacy_version() {
        let conn = Connection::open_in_memory().expect("open");
        assert_eq!(
            detect(&conn).expect("detect"),
            MigrationState::NeedsMigration { from: 0 }
        );
    }
}
