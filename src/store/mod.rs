//! SQLite-backed persistence for graveyards and discoveries.
//!
//! The store is the boundary between the domain model and the database. Every
//! public operation catches storage errors, logs them, and returns an empty or
//! invalid result instead: an `Invalid` graveyard with
//! [`GraveyardReason::Storage`], an empty list, `false`, or zero. Nothing is
//! retried.
//!
//! Opening a store takes an exclusive lock file next to the database and runs
//! the schema migration before the handle is returned, so no caller ever sees
//! a half-migrated store.

pub mod errors;
pub mod migration;
pub(crate) mod schema;

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fs2::FileExt;
use log::{debug, error, info, warn};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::host::{may_use, Actor};
use crate::logutil::{escape_log, escape_name};
use crate::model::{
    normalize_prefix, EveryWorldLoaded, Graveyard, GraveyardReason, ValidDiscovery,
    ValidGraveyard, ValidLocation, ValidSearchKey, WorldDirectory,
};

pub use errors::StoreError;
pub use migration::{MigrationReport, MigrationState, TableMigration, CURRENT_SCHEMA_VERSION};

use schema::{GraveyardRow, GRAVEYARD_COLUMNS};

/// Result of recording a discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// A new row was written.
    Recorded,
    /// The actor had already discovered this graveyard; nothing was written.
    AlreadyKnown,
    /// The store reported an error (already logged).
    Failed,
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct GraveyardStoreBuilder {
    path: PathBuf,
    directory: Arc<dyn WorldDirectory>,
}

impl GraveyardStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            directory: Arc::new(EveryWorldLoaded),
        }
    }

    /// Ask `directory` whether a stored world is loaded when rebuilding locations.
    pub fn with_world_directory(mut self, directory: Arc<dyn WorldDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn open(self) -> Result<GraveyardStore, StoreError> {
        GraveyardStore::open_with_directory(self.path, self.directory)
    }
}

pub struct GraveyardStore {
    conn: Mutex<Connection>,
    directory: Arc<dyn WorldDirectory>,
    migration: Option<MigrationReport>,
    _lock: File,
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "graveyards.db".into());
    name.push(".lock");
    path.with_file_name(name)
}

/// Escape LIKE wildcards so a prefix matches literally.
fn like_prefix(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

impl GraveyardStore {
    /// Open (or create) the store at `path`, migrating it to the current schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with_directory(path, Arc::new(EveryWorldLoaded))
    }

    fn open_with_directory<P: AsRef<Path>>(
        path: P,
        directory: Arc<dyn WorldDirectory>,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(lock_path(path))?;
        if lock.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(path.to_path_buf()));
        }

        let mut conn = Connection::open(path)?;
        let migration = migration::migrate(&mut conn, directory.as_ref())?;
        info!("Opened graveyard store at {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            directory,
            migration,
            _lock: lock,
        })
    }

    /// What the startup migration did, if one ran.
    pub fn migration_report(&self) -> Option<&MigrationReport> {
        self.migration.as_ref()
    }

    pub fn schema_version(&self) -> i32 {
        self.guarded("schema_version", 0, |conn| {
            Ok(migration::schema_version(conn)?)
        })
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        // a panic while holding the lock cannot leave the connection itself unusable
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` against the connection, logging and replacing any error with `fallback`.
    fn guarded<T>(
        &self,
        operation: &str,
        fallback: T,
        op: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> T {
        let mut conn = self.connection();
        match op(&mut conn) {
            Ok(value) => value,
            Err(e) => {
                error!("graveyard store: {} failed: {}", operation, e);
                fallback
            }
        }
    }

    fn storage_failure() -> Graveyard {
        Graveyard::invalid(None, None, GraveyardReason::Storage)
    }

    fn query_graveyards(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
        directory: &dyn WorldDirectory,
    ) -> Result<Vec<Graveyard>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, GraveyardRow::read)?;
        let mut out = Vec::new();
        for row in rows {
            match row {
                Ok(row) => out.push(row.into_graveyard(directory)),
                Err(e) => {
                    warn!("graveyard store: unreadable row: {}", e);
                    out.push(Self::storage_failure());
                }
            }
        }
        Ok(out)
    }

    fn query_keys(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<String>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let keys = stmt
            .query_map(params, |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// Fetch one graveyard. Invalid with `NotFound` when absent.
    pub fn get(&self, key: &ValidSearchKey) -> Graveyard {
        self.guarded("get", Self::storage_failure(), |conn| {
            Ok(schema::select_graveyard(conn, key, self.directory.as_ref())?
                .unwrap_or_else(|| Graveyard::not_found(key)))
        })
    }

    /// Every stored graveyard in insertion order, damaged rows included as `Invalid`.
    pub fn get_all(&self) -> Vec<Graveyard> {
        self.guarded("get_all", Vec::new(), |conn| {
            let sql = format!("SELECT {} FROM graveyards ORDER BY rowid", GRAVEYARD_COLUMNS);
            Self::query_graveyards(conn, &sql, &[], self.directory.as_ref())
        })
    }

    pub fn count(&self) -> usize {
        self.guarded("count", 0, |conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM graveyards", [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or(0))
        })
    }

    pub fn exists(&self, key: &ValidSearchKey) -> bool {
        self.guarded("exists", false, |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM graveyards WHERE search_key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )?;
            Ok(n > 0)
        })
    }

    /// Insert a new graveyard and return it as stored. An existing graveyard with
    /// the same key (compared without case) is never overwritten: the result is
    /// Invalid with `Duplicate`.
    pub fn save(&self, graveyard: &ValidGraveyard) -> Graveyard {
        let key = graveyard.search_key();
        self.guarded("save", Self::storage_failure(), |conn| {
            match schema::insert_graveyard(conn, graveyard).map_err(StoreError::from) {
                Ok(_) => {}
                Err(e) if e.is_constraint_violation() => {
                    debug!("graveyard '{}' already exists", escape_log(key.as_str()));
                    return Ok(Graveyard::invalid(
                        Some(graveyard.display_name().as_str().to_string()),
                        Some(graveyard.world_name().to_string()),
                        GraveyardReason::Duplicate,
                    ));
                }
                Err(e) => return Err(e),
            }
            info!("Saved graveyard '{}'", escape_name(graveyard.display_name().as_str()));
            Ok(schema::select_graveyard(conn, &key, self.directory.as_ref())?
                .unwrap_or_else(|| Graveyard::not_found(&key)))
        })
    }

    /// Insert each graveyard independently; returns how many were written.
    pub fn save_all(&self, graveyards: &[ValidGraveyard]) -> usize {
        self.guarded("save_all", 0, |conn| {
            let mut saved = 0;
            for graveyard in graveyards {
                match schema::insert_graveyard(conn, graveyard) {
                    Ok(_) => saved += 1,
                    Err(e) => warn!(
                        "graveyard store: could not save '{}': {}",
                        escape_log(graveyard.search_key().as_str()),
                        e
                    ),
                }
            }
            Ok(saved)
        })
    }

    /// Replace the graveyard stored under `old_key` with `graveyard` and return the
    /// previous value. A rename moves the graveyard's discoveries to the new key.
    pub fn update(&self, old_key: &ValidSearchKey, graveyard: &ValidGraveyard) -> Graveyard {
        self.guarded("update", Self::storage_failure(), |conn| {
            let tx = conn.transaction()?;
            let Some(previous) = schema::select_graveyard(&tx, old_key, self.directory.as_ref())? else {
                return Ok(Graveyard::not_found(old_key));
            };
            match schema::update_graveyard(&tx, old_key, graveyard).map_err(StoreError::from) {
                Ok(_) => {}
                Err(e) if e.is_constraint_violation() => {
                    return Ok(Graveyard::invalid(
                        Some(graveyard.display_name().as_str().to_string()),
                        Some(graveyard.world_name().to_string()),
                        GraveyardReason::Duplicate,
                    ));
                }
                Err(e) => return Err(e),
            }
            let new_key = graveyard.search_key();
            if new_key != *old_key {
                tx.execute(
                    "UPDATE discoveries SET search_key = ?1 WHERE search_key = ?2",
                    params![new_key.as_str(), old_key.as_str()],
                )?;
            }
            tx.commit()?;
            Ok(previous)
        })
    }

    /// Delete a graveyard and its discoveries; returns what was deleted.
    pub fn delete(&self, key: &ValidSearchKey) -> Graveyard {
        self.guarded("delete", Self::storage_failure(), |conn| {
            let tx = conn.transaction()?;
            let Some(previous) = schema::select_graveyard(&tx, key, self.directory.as_ref())? else {
                return Ok(Graveyard::not_found(key));
            };
            tx.execute(
                "DELETE FROM discoveries WHERE search_key = ?1",
                params![key.as_str()],
            )?;
            tx.execute(
                "DELETE FROM graveyards WHERE search_key = ?1",
                params![key.as_str()],
            )?;
            tx.commit()?;
            info!("Deleted graveyard '{}'", escape_log(key.as_str()));
            Ok(previous)
        })
    }

    /// Enabled graveyards in the actor's world, nearest first. Hidden graveyards
    /// only count once the actor has discovered them, and restricted ones only
    /// when the actor holds the group permission. Equal distances keep
    /// insertion order.
    pub fn nearest_n(&self, actor: &dyn Actor, limit: usize) -> Vec<ValidGraveyard> {
        let Some(location) = actor.location().as_valid().cloned() else {
            return Vec::new();
        };
        if limit == 0 {
            return Vec::new();
        }
        let candidates = self.guarded("nearest", Vec::new(), |conn| {
            Self::nearest_candidates(conn, &location, actor.uid(), self.directory.as_ref())
        });
        candidates
            .into_iter()
            .filter_map(Graveyard::into_valid)
            .filter(|graveyard| may_use(actor, graveyard))
            .take(limit)
            .collect()
    }

    pub fn nearest(&self, actor: &dyn Actor) -> Option<ValidGraveyard> {
        self.nearest_n(actor, 1).into_iter().next()
    }

    fn nearest_candidates(
        conn: &Connection,
        location: &ValidLocation,
        actor: Uuid,
        directory: &dyn WorldDirectory,
    ) -> Result<Vec<Graveyard>, StoreError> {
        let position = location.position();
        let sql = format!(
            "SELECT {}, \
             ((x - ?1) * (x - ?1) + (y - ?2) * (y - ?2) + (z - ?3) * (z - ?3)) AS distance_squared \
             FROM graveyards \
             WHERE world_uid = ?4 AND enabled = 1 \
             AND (hidden = 0 OR search_key IN \
                  (SELECT search_key FROM discoveries WHERE actor_uid = ?5)) \
             ORDER BY distance_squared ASC, rowid ASC",
            GRAVEYARD_COLUMNS
        );
        Self::query_graveyards(
            conn,
            &sql,
            params![
                position.x,
                position.y,
                position.z,
                location.world_uid().to_string(),
                actor.to_string(),
            ],
            directory,
        )
    }

    /// Enabled graveyards in the actor's current world the actor has not discovered,
    /// in insertion order. Visible graveyards are included: discovering one still records the
    /// visit and sends its discovery message.
    pub fn undiscovered(&self, actor: &dyn Actor) -> Vec<ValidGraveyard> {
        let Some(location) = actor.location().as_valid().cloned() else {
            return Vec::new();
        };
        let sql = format!(
            "SELECT {} FROM graveyards g \
             WHERE world_uid = ?1 AND enabled = 1 \
             AND NOT EXISTS (SELECT 1 FROM discoveries d \
                             WHERE d.search_key = g.search_key AND d.actor_uid = ?2) \
             ORDER BY rowid",
            GRAVEYARD_COLUMNS
        );
        self.guarded("undiscovered", Vec::new(), |conn| {
            Self::query_graveyards(
                conn,
                &sql,
                params![location.world_uid().to_string(), actor.uid().to_string()],
                self.directory.as_ref(),
            )
        })
        .into_iter()
        .filter_map(Graveyard::into_valid)
        .collect()
    }

    pub fn undiscovered_keys(&self, actor: &dyn Actor) -> HashSet<String> {
        self.undiscovered(actor)
            .into_iter()
            .map(|graveyard| graveyard.search_key().as_str().to_string())
            .collect()
    }

    /// Record a discovery. Recording the same pair twice is not an error.
    pub fn discover(&self, discovery: &ValidDiscovery) -> DiscoveryOutcome {
        self.guarded("discover", DiscoveryOutcome::Failed, |conn| {
            Ok(match schema::insert_discovery(conn, discovery)? {
                0 => DiscoveryOutcome::AlreadyKnown,
                _ => DiscoveryOutcome::Recorded,
            })
        })
    }

    /// Remove a discovery; true when one existed.
    pub fn forget(&self, key: &ValidSearchKey, actor: Uuid) -> bool {
        self.guarded("forget", false, |conn| {
            let removed = conn.execute(
                "DELETE FROM discoveries WHERE search_key = ?1 AND actor_uid = ?2",
                params![key.as_str(), actor.to_string()],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn is_discovered(&self, key: &ValidSearchKey, actor: Uuid) -> bool {
        self.guarded("is_discovered", false, |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM discoveries WHERE search_key = ?1 AND actor_uid = ?2",
                params![key.as_str(), actor.to_string()],
                |row| row.get(0),
            )?;
            Ok(n > 0)
        })
    }

    pub fn discovered_keys(&self, actor: Uuid) -> HashSet<String> {
        self.guarded("discovered_keys", Vec::new(), |conn| {
            Self::query_keys(
                conn,
                "SELECT search_key FROM discoveries WHERE actor_uid = ?1",
                params![actor.to_string()],
            )
        })
        .into_iter()
        .collect()
    }

    /// Keys starting with `prefix`, ignoring case and treating spaces as underscores.
    /// An empty or absent prefix matches everything. Case is folded for ASCII
    /// letters only, as in SQLite's `NOCASE` and `LIKE`.
    pub fn matching_keys(&self, prefix: Option<&str>) -> Vec<String> {
        let pattern = like_prefix(&normalize_prefix(prefix));
        self.guarded("matching_keys", Vec::new(), |conn| {
            Self::query_keys(
                conn,
                "SELECT search_key FROM graveyards WHERE search_key LIKE ?1 ESCAPE '\\' ORDER BY search_key",
                params![pattern],
            )
        })
    }

    /// Display names (markup removed) of the graveyards whose keys match `prefix`.
    pub fn matching_names(&self, prefix: Option<&str>) -> Vec<String> {
        let pattern = like_prefix(&normalize_prefix(prefix));
        let sql = format!(
            "SELECT {} FROM graveyards WHERE search_key LIKE ?1 ESCAPE '\\' ORDER BY search_key",
            GRAVEYARD_COLUMNS
        );
        self.guarded("matching_names", Vec::new(), |conn| {
            Self::query_graveyards(conn, &sql, params![pattern], self.directory.as_ref())
        })
        .into_iter()
        .filter_map(Graveyard::into_valid)
        .map(|graveyard| graveyard.display_name().plain())
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("Old_T"), "Old\\_T%");
        assert_eq!(like_prefix("100%"), "100\\%%");
        assert_eq!(like_prefix(""), "%");
    }

    #[test]
    fn second_open_is_refused_while_locked() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("graveyards.db");
        let store = GraveyardStore::open(&path).expect("store");
        assert!(matches!(
            GraveyardStore::open(&path),
            Err(StoreError::Locked(_))
        ));
        drop(store);
        GraveyardStore::open(&path).expect("reopen after drop");
    }

    #[test]
    fn fresh_store_is_at_current_version() {
        let dir = TempDir::new().expect("tempdir");
        let store = GraveyardStoreBuilder::new(dir.path().join("g.db"))
            .open()
            .expect("store");
        assert_eq!(store.schema_version(), CURRENT_SCHEMA_VERSION);
        assert_eq!(store.count(), 0);
        assert!(store.get_all().is_empty());
    }
}
