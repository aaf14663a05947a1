use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use rusqlite::types::{Type, Value, ValueRef};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Result};
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::solve::{Penalty, SolveRecord};
use crate::stats::{Average, CurrentStats};

/// Timestamp format of the `Date` column
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Names created on first launch
pub const DEFAULT_SESSIONS: [&str; 5] = ["1", "2", "3", "4", "5"];

/// Name recreated when the last session is deleted
pub const FALLBACK_SESSION: &str = "Default";

/// Average columns of the `solves` table, keyed by window size. A pending
/// average is NULL, a DNF average the text `DNF`, anything else seconds.
const AVERAGE_COLUMNS: [(usize, &str); 6] = [
    (5, "avg5"),
    (12, "avg12"),
    (100, "avg100"),
    (1000, "avg1000"),
    (5000, "avg5000"),
    (10000, "avg10000"),
];

const DNF_AVERAGE: &str = "DNF";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS solves (
        Session TEXT NOT NULL,
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        Date TEXT NOT NULL,
        Time INTEGER,
        Penalty TEXT NOT NULL DEFAULT '',
        Mix TEXT NOT NULL DEFAULT '',
        avg5 REAL,
        avg12 REAL,
        avg100 REAL,
        avg1000 REAL,
        avg5000 REAL,
        avg10000 REAL
    );
    CREATE INDEX IF NOT EXISTS idx_solves_session ON solves(Session);
    CREATE TABLE IF NOT EXISTS sessions (
        name TEXT PRIMARY KEY
    );
"#;

/// SQLite-backed store of sessions and their solves
#[derive(Debug)]
pub struct SolveStore {
    conn: Connection,
}

impl SolveStore {
    /// Open the store at the default location, creating tables if needed
    pub fn new() -> Result<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("cubestats.db"));
        Self::open(db_path)
    }

    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }

        Self::with_connection(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(SolveStore { conn })
    }

    /// Session names in creation order, seeding the defaults on first use
    pub fn load_sessions(&self) -> Result<Vec<String>> {
        let mut names = self.session_names()?;
        if names.is_empty() {
            for name in DEFAULT_SESSIONS {
                self.insert_session(name)?;
            }
            names = DEFAULT_SESSIONS.iter().map(|s| s.to_string()).collect();
        }
        Ok(names)
    }

    pub fn session_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM sessions ORDER BY rowid")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
        names.collect()
    }

    /// Returns false when a session with that name already exists
    pub fn create_session(&self, name: &str) -> Result<bool> {
        match self.insert_session(name) {
            Ok(()) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn insert_session(&self, name: &str) -> Result<()> {
        self.conn
            .execute("INSERT INTO sessions(name) VALUES (?1)", [name])?;
        Ok(())
    }

    /// Delete a session and all its solves. When no session is left the
    /// fallback one is recreated. Returns the remaining names.
    pub fn delete_session(&mut self, name: &str) -> Result<Vec<String>> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM solves WHERE Session = ?1", [name])?;
        tx.execute("DELETE FROM sessions WHERE name = ?1", [name])?;
        tx.commit()?;

        let names = self.session_names()?;
        if names.is_empty() {
            self.insert_session(FALLBACK_SESSION)?;
            return Ok(vec![FALLBACK_SESSION.to_string()]);
        }
        Ok(names)
    }

    /// Persist a solve and return its row id
    pub fn insert_solve(&self, record: &SolveRecord) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO solves (Session, Date, Time, Penalty, Mix)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.session_id,
                record.timestamp.format(DATE_FORMAT).to_string(),
                record.raw_time_ms.map(|ms| i64::try_from(ms).unwrap_or(i64::MAX)),
                record.penalty.label(),
                record.scramble,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Write the averages that were current right after solve `id`
    pub fn update_averages(&self, id: i64, stats: &CurrentStats) -> Result<()> {
        for (size, column) in AVERAGE_COLUMNS {
            if !stats.current.contains_key(&size) {
                continue;
            }
            let value = match stats.current(size) {
                Average::Pending => Value::Null,
                Average::Dnf => Value::Text(DNF_AVERAGE.to_string()),
                Average::Secs(v) => Value::Real(v),
            };
            self.conn.execute(
                &format!("UPDATE solves SET {column} = ?1 WHERE id = ?2"),
                params![value, id],
            )?;
        }
        Ok(())
    }

    /// Solves of `session` in insertion order, numbered from 1
    pub fn fetch_solves(&self, session: &str) -> Result<Vec<SolveRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, Date, Time, Penalty, Mix
            FROM solves
            WHERE Session = ?1
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map([session], |row| {
            let id: i64 = row.get(0)?;
            let date: String = row.get(1)?;
            let time: Option<i64> = row.get(2)?;
            let penalty: String = row.get(3)?;
            let mix: String = row.get(4)?;
            Ok((id, date, time, penalty, mix))
        })?;

        let mut solves = Vec::new();
        for (idx, row) in rows.enumerate() {
            let (id, date, time, penalty, mix) = row?;
            let timestamp = parse_date(&date).ok_or_else(|| {
                rusqlite::Error::InvalidColumnType(1, "Date".to_string(), Type::Text)
            })?;
            let penalty = Penalty::from_label(&penalty).ok_or_else(|| {
                rusqlite::Error::InvalidColumnType(3, "Penalty".to_string(), Type::Text)
            })?;
            solves.push(
                SolveRecord::new(
                    session,
                    idx + 1,
                    time.and_then(|t| u64::try_from(t).ok()),
                    penalty,
                    timestamp,
                )
                .with_scramble(mix)
                .with_id(id),
            );
        }

        Ok(solves)
    }

    pub fn set_penalty(&self, id: i64, penalty: Penalty) -> Result<()> {
        self.conn.execute(
            "UPDATE solves SET Penalty = ?1 WHERE id = ?2",
            params![penalty.label(), id],
        )?;
        Ok(())
    }

    pub fn remove_solve(&self, id: i64) -> Result<()> {
        self.conn.execute("DELETE FROM solves WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn solve_count(&self, session: &str) -> Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM solves WHERE Session = ?1",
            [session],
            |row| row.get(0),
        )
    }

    /// Stored average column for a solve, mostly useful for inspection.
    /// Unknown solves and untracked sizes read as pending.
    pub fn stored_average(&self, id: i64, size: usize) -> Result<Average> {
        let Some((_, column)) = AVERAGE_COLUMNS.iter().find(|(n, _)| *n == size) else {
            return Ok(Average::Pending);
        };
        let value = self
            .conn
            .query_row(
                &format!("SELECT {column} FROM solves WHERE id = ?1"),
                [id],
                |row| match row.get_ref(0)? {
                    ValueRef::Null => Ok(Average::Pending),
                    ValueRef::Real(v) => Ok(Average::Secs(v)),
                    ValueRef::Integer(v) => Ok(Average::Secs(v as f64)),
                    ValueRef::Text(t) if t == DNF_AVERAGE.as_bytes() => Ok(Average::Dnf),
                    other => Err(rusqlite::Error::InvalidColumnType(
                        0,
                        column.to_string(),
                        other.data_type(),
                    )),
                },
            )
            .optional()?;
        Ok(value.unwrap_or(Average::Pending))
    }

    /// Get the actual database file path being used (for debugging)
    pub fn get_database_path() -> Option<PathBuf> {
        AppDirs::db_path()
    }
}

fn parse_date(date: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(date, DATE_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}
