//! Table layout and row mapping.
//!
//! Rows are read by column name and every column is optional, so the same
//! mapping works on the current layout and on the narrower legacy layout the
//! migration reads from. Missing columns fall back to attribute defaults.

use chrono::{DateTime, Duration, Utc};
use rusqlite::types::FromSql;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::model::{
    Attributes, Discovery, DisplayName, Graveyard, GraveyardReason, Location, Position, SearchKey, ValidDiscovery,
    ValidGraveyard, ValidSearchKey, World, WorldDirectory,
};

pub const TABLE_GRAVEYARDS: &str = "graveyards";
pub const TABLE_DISCOVERIES: &str = "discoveries";

pub const CREATE_GRAVEYARDS: &str = r#"
CREATE TABLE IF NOT EXISTS graveyards (
  search_key TEXT NOT NULL COLLATE NOCASE PRIMARY KEY,
  display_name TEXT NOT NULL,
  enabled INTEGER NOT NULL,
  hidden INTEGER NOT NULL,
  discovery_range INTEGER NOT NULL,
  discovery_message TEXT NOT NULL DEFAULT '',
  respawn_message TEXT NOT NULL DEFAULT '',
  permission_group TEXT NOT NULL DEFAULT '',
  safety_range INTEGER NOT NULL,
  safety_time INTEGER NOT NULL,
  world_name TEXT NOT NULL,
  world_uid TEXT NOT NULL,
  x REAL NOT NULL,
  y REAL NOT NULL,
  z REAL NOT NULL,
  yaw REAL NOT NULL,
  pitch REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS graveyards_world ON graveyards (world_uid);
"#;

pub const CREATE_DISCOVERIES: &str = r#"
CREATE TABLE IF NOT EXISTS discoveries (
  search_key TEXT NOT NULL COLLATE NOCASE,
  actor_uid TEXT NOT NULL,
  discovered_at INTEGER NOT NULL,
  PRIMARY KEY (search_key, actor_uid)
);
"#;

pub const GRAVEYARD_COLUMNS: &str = "search_key, display_name, enabled, hidden, discovery_range, \
     discovery_message, respawn_message, permission_group, safety_range, safety_time, \
     world_name, world_uid, x, y, z, yaw, pitch";

/// Read a column that may not exist in older layouts.
fn column<T: FromSql>(row: &Row<'_>, name: &str) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<T>>(name) {
        Ok(value) => Ok(value),
        Err(rusqlite::Error::InvalidColumnName(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn parse_uid(text: Option<String>) -> Option<Uuid> {
    text.and_then(|t| Uuid::parse_str(t.trim()).ok())
}

/// Raw column values of one graveyard row, current or legacy layout.
#[derive(Debug, Default)]
pub(crate) struct GraveyardRow {
    search_key: Option<String>,
    display_name: Option<String>,
    enabled: Option<bool>,
    hidden: Option<bool>,
    discovery_range: Option<i32>,
    discovery_message: Option<String>,
    respawn_message: Option<String>,
    permission_group: Option<String>,
    safety_range: Option<i32>,
    safety_time: Option<i64>,
    world_name: Option<String>,
    world_uid: Option<Uuid>,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    yaw: Option<f64>,
    pitch: Option<f64>,
}

impl GraveyardRow {
    pub(crate) fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        // legacy rows split the world uuid into two signed halves
        let world_uid = match parse_uid(column(row, "world_uid")?) {
            Some(uid) => Some(uid),
            None => match (
                column::<i64>(row, "world_uid_msb")?,
                column::<i64>(row, "world_uid_lsb")?,
            ) {
                (Some(msb), Some(lsb)) => Some(Uuid::from_u64_pair(msb as u64, lsb as u64)),
                _ => None,
            },
        };
        let permission_group = match column(row, "permission_group")? {
            Some(group) => Some(group),
            None => column(row, "group_name")?,
        };
        Ok(Self {
            search_key: column(row, "search_key")?,
            display_name: column(row, "display_name")?,
            enabled: column(row, "enabled")?,
            hidden: column(row, "hidden")?,
            discovery_range: column(row, "discovery_range")?,
            discovery_message: column(row, "discovery_message")?,
            respawn_message: column(row, "respawn_message")?,
            permission_group,
            safety_range: column(row, "safety_range")?,
            safety_time: column(row, "safety_time")?,
            world_name: column(row, "world_name")?,
            world_uid,
            x: column(row, "x")?,
            y: column(row, "y")?,
            z: column(row, "z")?,
            yaw: column(row, "yaw")?,
            pitch: column(row, "pitch")?,
        })
    }

    pub(crate) fn search_key(&self) -> Option<&str> {
        self.search_key.as_deref()
    }

    /// Rebuild the aggregate through the regular validating constructors.
    pub(crate) fn into_graveyard(self, directory: &dyn WorldDirectory) -> Graveyard {
        let defaults = Attributes::default();
        let safety_time = match self.safety_time {
            None => defaults.safety_time(),
            Some(seconds) => match Duration::try_seconds(seconds) {
                Some(time) => time,
                None => {
                    return Graveyard::invalid(
                        self.display_name.or(self.search_key),
                        self.world_name,
                        GraveyardReason::SafetyTime,
                    );
                }
            },
        };

        let display_name = match self.display_name.as_deref() {
            Some(name) => DisplayName::of(Some(name)),
            None => match SearchKey::of(self.search_key.as_deref()) {
                SearchKey::Valid(key) => DisplayName::Valid(key.to_display_name()),
                SearchKey::Invalid { .. } => DisplayName::of(None),
            },
        };

        let attributes = Attributes::default()
            .with_enabled(self.enabled.unwrap_or(defaults.enabled()))
            .with_hidden(self.hidden.unwrap_or(defaults.hidden()))
            .with_discovery_range(self.discovery_range.unwrap_or(defaults.discovery_range()))
            .with_discovery_message(self.discovery_message.unwrap_or_default())
            .with_respawn_message(self.respawn_message.unwrap_or_default())
            .with_permission_group(self.permission_group.unwrap_or_default())
            .with_safety_range(self.safety_range.unwrap_or(defaults.safety_range()))
            .with_safety_time(safety_time);

        let location = match (self.x, self.y, self.z) {
            (Some(x), Some(y), Some(z)) => Location::of(
                World::of(self.world_name.as_deref(), self.world_uid, directory),
                Position::new(
                    x,
                    y,
                    z,
                    self.yaw.unwrap_or_default() as f32,
                    self.pitch.unwrap_or_default() as f32,
                ),
            ),
            _ => Location::null(),
        };

        Graveyard::of(display_name, attributes, location)
    }
}

/// Raw column values of one discovery row, current or legacy layout.
#[derive(Debug, Default)]
pub(crate) struct DiscoveryRow {
    search_key: Option<String>,
    actor: Option<Uuid>,
    discovered_at: Option<i64>,
}

impl DiscoveryRow {
    pub(crate) fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        let actor = match parse_uid(column(row, "actor_uid")?) {
            Some(uid) => Some(uid),
            None => parse_uid(column(row, "player_uid")?),
        };
        Ok(Self {
            search_key: column(row, "search_key")?,
            actor,
            discovered_at: column(row, "discovered_at")?,
        })
    }

    /// Rows without a timestamp are stamped with `fallback`.
    pub(crate) fn into_discovery(self, fallback: DateTime<Utc>) -> Discovery {
        let timestamp = self
            .discovered_at
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or(fallback);
        Discovery::of(SearchKey::of(self.search_key.as_deref()), self.actor, timestamp)
    }
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

pub(crate) fn insert_graveyard(conn: &Connection, graveyard: &ValidGraveyard) -> rusqlite::Result<usize> {
    let attrs = graveyard.attributes();
    let position = graveyard.location().position();
    conn.execute(
        "INSERT INTO graveyards (search_key, display_name, enabled, hidden, discovery_range, \
         discovery_message, respawn_message, permission_group, safety_range, safety_time, \
         world_name, world_uid, x, y, z, yaw, pitch) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            graveyard.search_key().as_str(),
            graveyard.display_name().as_str(),
            attrs.enabled(),
            attrs.hidden(),
            attrs.discovery_range(),
            attrs.raw_discovery_message(),
            attrs.raw_respawn_message(),
            attrs.raw_permission_group(),
            attrs.safety_range(),
            attrs.safety_time().num_seconds(),
            graveyard.world_name(),
            graveyard.world_uid().to_string(),
            position.x,
            position.y,
            position.z,
            f64::from(position.yaw),
            f64::from(position.pitch),
        ],
    )
}

pub(crate) fn update_graveyard(
    conn: &Connection,
    old_key: &ValidSearchKey,
    graveyard: &ValidGraveyard,
) -> rusqlite::Result<usize> {
    let attrs = graveyard.attributes();
    let position = graveyard.location().position();
    conn.execute(
        "UPDATE graveyards SET search_key = ?1, display_name = ?2, enabled = ?3, hidden = ?4, \
         discovery_range = ?5, discovery_message = ?6, respawn_message = ?7, \
         permission_group = ?8, safety_range = ?9, safety_time = ?10, world_name = ?11, \
         world_uid = ?12, x = ?13, y = ?14, z = ?15, yaw = ?16, pitch = ?17 \
         WHERE search_key = ?18",
        params![
            graveyard.search_key().as_str(),
            graveyard.display_name().as_str(),
            attrs.enabled(),
            attrs.hidden(),
            attrs.discovery_range(),
            attrs.raw_discovery_message(),
            attrs.raw_respawn_message(),
            attrs.raw_permission_group(),
            attrs.safety_range(),
            attrs.safety_time().num_seconds(),
            graveyard.world_name(),
            graveyard.world_uid().to_string(),
            position.x,
            position.y,
            position.z,
            f64::from(position.yaw),
            f64::from(position.pitch),
            old_key.as_str(),
        ],
    )
}

pub(crate) fn select_graveyard(
    conn: &Connection,
    key: &ValidSearchKey,
    directory: &dyn WorldDirectory,
) -> rusqlite::Result<Option<Graveyard>> {
    let sql = format!(
        "SELECT {} FROM graveyards WHERE search_key = ?1",
        GRAVEYARD_COLUMNS
    );
    conn.query_row(&sql, params![key.as_str()], GraveyardRow::read)
        .optional()
        .map(|row| row.map(|r| r.into_graveyard(directory)))
}

/// Returns the number of rows written: 0 when the pair was already recorded.
pub(crate) fn insert_discovery(conn: &Connection, discovery: &ValidDiscovery) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO discoveries (search_key, actor_uid, discovered_at) VALUES (?1, ?2, ?3)",
        params![
            discovery.search_key().as_str(),
            discovery.actor().to_string(),
            discovery.timestamp().timestamp_millis(),
        ],
    )
}
