//! SQLite-backed observation storage.
//!
//! Every operation runs in its own [`Session`], a connection that is opened on
//! demand and closed when it goes out of scope. The HTTP side and the hourly
//! pipeline therefore never share a connection.

use rusqlite::{Connection, OpenFlags, params};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    error::StorageError,
    model::{WeatherObservation, format_timestamp, parse_timestamp},
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Inclusive textual timestamp bounds for a range scan.
///
/// Bounds are plain strings in the storage timestamp format so that a day
/// which is not a real calendar date simply matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

impl TimeRange {
    /// Cover a whole `YYYY-MM-DD` day: `[day T00:00:00, day T23:59:59]`.
    pub fn for_day(day: &str) -> Self {
        Self {
            start: format!("{day}T00:00:00"),
            end: format!("{day}T23:59:59"),
        }
    }
}

/// Append-only store of weather observations.
pub trait ObservationStore: Send + Sync {
    /// Insert one observation and commit it. Returns the new row id.
    fn insert(&self, observation: &WeatherObservation) -> Result<i64, StorageError>;

    /// All rows for `city` whose timestamp lies within `range`, oldest first.
    fn range(&self, city: &str, range: &TimeRange) -> Result<Vec<WeatherObservation>, StorageError>;
}

/// Observation store persisted in a single SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open the store at `path`, creating the file, parent directories and
    /// schema if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let store = Self { path };
        store.session_with(OpenFlags::default())?.init_schema()?;
        Ok(store)
    }

    /// Open a scoped session. The connection is closed when the session drops.
    pub fn session(&self) -> Result<Session, StorageError> {
        self.session_with(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX)
    }

    fn session_with(&self, flags: OpenFlags) -> Result<Session, StorageError> {
        let conn = Connection::open_with_flags(&self.path, flags)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Session { conn })
    }
}

impl ObservationStore for SqliteStore {
    fn insert(&self, observation: &WeatherObservation) -> Result<i64, StorageError> {
        self.session()?.insert(observation)
    }

    fn range(
        &self,
        city: &str,
        range: &TimeRange,
    ) -> Result<Vec<WeatherObservation>, StorageError> {
        self.session()?.range(city, range)
    }
}

/// A single open connection to the store.
pub struct Session {
    conn: Connection,
}

impl Session {
    fn init_schema(&self) -> Result<(), StorageError> {
        // WAL lets the hourly writer and concurrent HTTP readers proceed together.
        self.conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))?;

        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS weather (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                city TEXT,
                timestamp TEXT,
                temp REAL,
                weather_main TEXT,
                weather_desc TEXT
            );

            CREATE INDEX IF NOT EXISTS ix_weather_city ON weather(city);
            CREATE INDEX IF NOT EXISTS ix_weather_timestamp ON weather(timestamp);
            "#,
        )?;
        Ok(())
    }

    pub fn insert(&self, observation: &WeatherObservation) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO weather (city, timestamp, temp, weather_main, weather_desc)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                observation.city,
                format_timestamp(&observation.timestamp),
                observation.temperature,
                observation.condition_code,
                observation.condition_description,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn range(
        &self,
        city: &str,
        range: &TimeRange,
    ) -> Result<Vec<WeatherObservation>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT city, timestamp, temp, weather_main, weather_desc
             FROM weather
             WHERE city = ?1 AND timestamp >= ?2 AND timestamp <= ?3
             ORDER BY timestamp ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![city, range.start, range.end], |row| {
            Ok(RawRow {
                city: row.get(0)?,
                timestamp: row.get(1)?,
                temp: row.get(2)?,
                weather_main: row.get(3)?,
                weather_desc: row.get(4)?,
            })
        })?;

        rows.map(|row| row?.into_observation()).collect()
    }

    /// Total number of stored rows across all cities.
    pub fn count(&self) -> Result<usize, StorageError> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM weather", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

struct RawRow {
    city: Option<String>,
    timestamp: String,
    temp: Option<f64>,
    weather_main: Option<String>,
    weather_desc: Option<String>,
}

impl RawRow {
    fn into_observation(self) -> Result<WeatherObservation, StorageError> {
        let timestamp =
            parse_timestamp(&self.timestamp).ok_or(StorageError::CorruptTimestamp(self.timestamp))?;

        Ok(WeatherObservation {
            city: self.city.unwrap_or_default(),
            timestamp,
            temperature: self.temp.unwrap_or(f64::NAN),
            condition_code: self.weather_main.unwrap_or_default(),
            condition_description: self.weather_desc.unwrap_or_default(),
        })
    }
}
