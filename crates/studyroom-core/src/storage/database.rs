//! SQLite-based session storage.
//!
//! Provides persistent storage for:
//! - Completed study sessions (one row per natural completion)
//! - Key-value store for application state, including timer progress

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{data_dir, migrations, ProgressStore};
use crate::error::{DatabaseError, Result};
use crate::timer::{CompletedSession, SessionType, TimerProgress};

const PROGRESS_KEY: &str = "timer_progress";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub session_id: Option<Uuid>,
    pub cycle_id: Option<Uuid>,
    pub session_type: SessionType,
    pub round: u32,
    pub subject_id: Option<String>,
    pub duration_secs: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
}

/// SQLite database for session storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data_dir>/studyroom.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("studyroom.db"))
    }

    /// Open (or create) the database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        migrations::migrate(&db.conn).map_err(DatabaseError::from)?;
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        let db = Self { conn };
        migrations::migrate(&db.conn).map_err(DatabaseError::from)?;
        Ok(db)
    }

    /// Record a naturally completed session.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_session(&self, session: &CompletedSession) -> Result<i64, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO sessions (session_id, cycle_id, session_type, round, subject_id,
                                   duration_secs, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session.session_id.map(|id| id.to_string()),
                session.cycle_id.map(|id| id.to_string()),
                session.session_type.as_str(),
                session.round,
                session.subject_id,
                session.duration_secs,
                session.started_at.map(|t| t.to_rfc3339()),
                session.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent completed sessions, newest first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, cycle_id, session_type, round, subject_id,
                    duration_secs, started_at, completed_at
             FROM sessions
             ORDER BY completed_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], row_to_session)?;
        rows.collect()
    }

    pub fn session_count(&self) -> Result<u64, rusqlite::Error> {
        self.conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get::<_, u64>(0))
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl ProgressStore for Database {
    fn load_progress(&self) -> Result<Option<TimerProgress>> {
        match self.kv_get(PROGRESS_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save_progress(&self, progress: &TimerProgress) -> Result<()> {
        let json = serde_json::to_string(progress)?;
        self.kv_set(PROGRESS_KEY, &json)?;
        Ok(())
    }
}

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_uuid(idx: usize, value: Option<String>) -> Result<Option<Uuid>, rusqlite::Error> {
    value
        .map(|s| Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn parse_time(idx: usize, value: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn row_to_session(row: &rusqlite::Row) -> Result<SessionRecord, rusqlite::Error> {
    let type_str: String = row.get(3)?;
    let session_type = SessionType::parse(&type_str).ok_or_else(|| {
        conversion_error(
            3,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown session type '{type_str}'"),
            ),
        )
    })?;
    let started_at: Option<String> = row.get(7)?;
    let completed_at: String = row.get(8)?;

    Ok(SessionRecord {
        id: row.get(0)?,
        session_id: parse_uuid(1, row.get(1)?)?,
        cycle_id: parse_uuid(2, row.get(2)?)?,
        session_type,
        round: row.get(4)?,
        subject_id: row.get(5)?,
        duration_secs: row.get(6)?,
        started_at: started_at.as_deref().map(|s| parse_time(7, s)).transpose()?,
        completed_at: parse_time(8, &completed_at)?,
    })
}
