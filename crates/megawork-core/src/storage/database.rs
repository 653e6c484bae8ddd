//! SQLite-based session storage.
//!
//! Provides persistent storage for:
//! - Sessions: preparation answers, timer settings, state machine, debrief
//! - Cycles: per-cycle plan and review, keyed by session and raw cycle index

use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{CoreError, DatabaseError, Result};
use crate::session::{
    CyclePlan, CycleReview, Debrief, Level, Preparation, SessionMachine, Target,
};
use crate::timer::CycleTimer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    /// Name of the machine state, duplicated for querying.
    pub status: String,
    pub num_cycles: i64,
    pub start_at: DateTime<Utc>,
    pub origin: DateTime<Utc>,
    pub work_secs: i64,
    pub rest_secs: i64,
    pub machine: SessionMachine,
    pub preparation: Preparation,
    pub debrief: Option<Debrief>,
}

impl SessionRecord {
    /// Rebuild the timer this session was started with.
    pub fn timer(&self) -> Result<CycleTimer> {
        Ok(CycleTimer::new(
            TimeDelta::seconds(self.work_secs),
            TimeDelta::seconds(self.rest_secs),
            self.origin,
            self.start_at,
            self.num_cycles,
        )?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub session_id: i64,
    pub timer_id: i64,
    pub number: i64,
    pub plan: CyclePlan,
    pub review: Option<CycleReview>,
}

const SESSION_COLUMNS: &str = "id, created_at, status, num_cycles, start_at, origin, work_secs,
    rest_secs, machine, start_mode, accomplish, important, complete, distractions, measurable,
    noteworthy, target, done, nextsteps, compare, bogged, replicate, takeaways";

const CYCLE_COLUMNS: &str = "id, created_at, session_id, cycle_timer_id, number, accomplish,
    started, hazards, energy, morale, target, noteworthy, distractions, improve";

/// SQLite database for sessions and their cycles.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data dir>/megawork.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the database
    /// cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("megawork.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at   TEXT NOT NULL,
                status       TEXT NOT NULL,
                num_cycles   INTEGER NOT NULL,
                start_at     TEXT NOT NULL,
                origin       TEXT NOT NULL,
                work_secs    INTEGER NOT NULL,
                rest_secs    INTEGER NOT NULL,
                machine      TEXT NOT NULL,
                start_mode   TEXT NOT NULL DEFAULT 'now',
                accomplish   TEXT NOT NULL DEFAULT '',
                important    TEXT NOT NULL DEFAULT '',
                complete     TEXT NOT NULL DEFAULT '',
                distractions TEXT NOT NULL DEFAULT '',
                measurable   TEXT NOT NULL DEFAULT '',
                noteworthy   TEXT NOT NULL DEFAULT '',
                target       INTEGER,
                done         TEXT,
                nextsteps    TEXT,
                compare      TEXT,
                bogged       TEXT,
                replicate    TEXT,
                takeaways    TEXT
            );

            CREATE TABLE IF NOT EXISTS cycles (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at     TEXT NOT NULL,
                session_id     INTEGER NOT NULL REFERENCES sessions(id),
                cycle_timer_id INTEGER NOT NULL,
                number         INTEGER NOT NULL,
                accomplish     TEXT NOT NULL DEFAULT '',
                started        TEXT NOT NULL DEFAULT '',
                hazards        TEXT NOT NULL DEFAULT '',
                energy         INTEGER NOT NULL DEFAULT 0,
                morale         INTEGER NOT NULL DEFAULT 0,
                target         INTEGER,
                noteworthy     TEXT,
                distractions   TEXT,
                improve        TEXT,
                UNIQUE (session_id, cycle_timer_id)
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);
            CREATE INDEX IF NOT EXISTS idx_cycles_session ON cycles(session_id);",
        )?;
        Ok(())
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Store a prepared session.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn create_session(
        &self,
        prep: &Preparation,
        timer: &CycleTimer,
        machine: &SessionMachine,
    ) -> Result<SessionRecord> {
        self.conn.execute(
            "INSERT INTO sessions (created_at, status, num_cycles, start_at, origin, work_secs,
                rest_secs, machine, start_mode, accomplish, important, complete, distractions,
                measurable, noteworthy)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                Utc::now().to_rfc3339(),
                machine.state.name(),
                timer.num_cycles(),
                timer.start_at().to_rfc3339(),
                timer.origin().to_rfc3339(),
                timer.work_duration().num_seconds(),
                timer.rest_duration().num_seconds(),
                serde_json::to_string(machine)?,
                prep.start.as_str(),
                prep.accomplish,
                prep.important,
                prep.complete,
                prep.distractions,
                prep.measurable,
                prep.noteworthy,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.session(id)?.ok_or_else(|| missing("sessions", id))
    }

    pub fn session(&self, id: i64) -> Result<Option<SessionRecord>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id], row_to_session)
            .optional()?;
        row.transpose()
    }

    /// The most recent session that has not completed.
    pub fn current_session(&self) -> Result<Option<SessionRecord>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE status != 'completed'
             ORDER BY id DESC LIMIT 1"
        );
        let row = self.conn.query_row(&sql, [], row_to_session).optional()?;
        row.transpose()
    }

    /// All sessions, newest first.
    pub fn sessions(&self) -> Result<Vec<SessionRecord>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY id DESC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_session)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row??);
        }
        Ok(sessions)
    }

    pub fn save_machine(&self, id: i64, machine: &SessionMachine) -> Result<()> {
        self.conn.execute(
            "UPDATE sessions SET machine = ?1, status = ?2 WHERE id = ?3",
            params![serde_json::to_string(machine)?, machine.state.name(), id],
        )?;
        Ok(())
    }

    pub fn debrief_session(&self, id: i64, debrief: &Debrief) -> Result<()> {
        self.conn.execute(
            "UPDATE sessions
             SET target = ?1, done = ?2, nextsteps = ?3, compare = ?4, bogged = ?5,
                 replicate = ?6, takeaways = ?7
             WHERE id = ?8",
            params![
                debrief.target.percent(),
                debrief.done,
                debrief.nextsteps,
                debrief.compare,
                debrief.bogged,
                debrief.replicate,
                debrief.takeaways,
                id,
            ],
        )?;
        Ok(())
    }

    // ── Cycles ───────────────────────────────────────────────────────

    /// Store the plan for a cycle, replacing an earlier plan for the same
    /// cycle.
    pub fn create_cycle(
        &self,
        session_id: i64,
        timer_id: i64,
        number: i64,
        plan: &CyclePlan,
    ) -> Result<CycleRecord> {
        self.conn.execute(
            "INSERT INTO cycles (created_at, session_id, cycle_timer_id, number, accomplish,
                started, hazards, energy, morale)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (session_id, cycle_timer_id) DO UPDATE SET
                accomplish = excluded.accomplish,
                started = excluded.started,
                hazards = excluded.hazards,
                energy = excluded.energy,
                morale = excluded.morale",
            params![
                Utc::now().to_rfc3339(),
                session_id,
                timer_id,
                number,
                plan.accomplish,
                plan.started,
                plan.hazards,
                plan.energy.score(),
                plan.morale.score(),
            ],
        )?;
        self.cycle_by_timer_id(session_id, timer_id)?
            .ok_or_else(|| missing("cycles", timer_id))
    }

    /// Attach a review to a cycle. A cycle that was never planned gets a row
    /// with an empty plan.
    pub fn review_cycle(
        &self,
        session_id: i64,
        timer_id: i64,
        number: i64,
        review: &CycleReview,
    ) -> Result<CycleRecord> {
        self.conn.execute(
            "INSERT INTO cycles (created_at, session_id, cycle_timer_id, number, target,
                noteworthy, distractions, improve)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (session_id, cycle_timer_id) DO UPDATE SET
                target = excluded.target,
                noteworthy = excluded.noteworthy,
                distractions = excluded.distractions,
                improve = excluded.improve",
            params![
                Utc::now().to_rfc3339(),
                session_id,
                timer_id,
                number,
                review.target.percent(),
                review.noteworthy,
                review.distractions,
                review.improve,
            ],
        )?;
        self.cycle_by_timer_id(session_id, timer_id)?
            .ok_or_else(|| missing("cycles", timer_id))
    }

    pub fn cycle_by_timer_id(&self, session_id: i64, timer_id: i64) -> Result<Option<CycleRecord>> {
        let sql = format!(
            "SELECT {CYCLE_COLUMNS} FROM cycles WHERE session_id = ?1 AND cycle_timer_id = ?2"
        );
        let row = self
            .conn
            .query_row(&sql, params![session_id, timer_id], row_to_cycle)
            .optional()?;
        Ok(row)
    }

    /// Cycles of a session in cycle order.
    pub fn session_cycles(&self, session_id: i64) -> Result<Vec<CycleRecord>> {
        let sql = format!(
            "SELECT {CYCLE_COLUMNS} FROM cycles WHERE session_id = ?1 ORDER BY cycle_timer_id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![session_id], row_to_cycle)?;
        let mut cycles = Vec::new();
        for row in rows {
            cycles.push(row?);
        }
        Ok(cycles)
    }
}

fn missing(table: &'static str, id: i64) -> CoreError {
    DatabaseError::CorruptRow {
        table,
        message: format!("row {id} vanished after write"),
    }
    .into()
}

/// Parse a required timestamp column.
fn parse_datetime(row: &rusqlite::Row, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Build a SessionRecord from a database row.
///
/// The outer error is a column read failure; the inner one a machine column
/// that no longer deserializes.
fn row_to_session(row: &rusqlite::Row) -> Result<Result<SessionRecord>, rusqlite::Error> {
    let machine_json: String = row.get(8)?;
    let start_mode: String = row.get(9)?;
    let target: Option<i64> = row.get(16)?;

    let debrief = match target {
        Some(percent) => Some(Debrief {
            target: Target::from_percent(percent),
            done: row.get::<_, Option<String>>(17)?.unwrap_or_default(),
            nextsteps: row.get::<_, Option<String>>(18)?.unwrap_or_default(),
            compare: row.get::<_, Option<String>>(19)?.unwrap_or_default(),
            bogged: row.get::<_, Option<String>>(20)?.unwrap_or_default(),
            replicate: row.get::<_, Option<String>>(21)?.unwrap_or_default(),
            takeaways: row.get::<_, Option<String>>(22)?.unwrap_or_default(),
        }),
        None => None,
    };

    let preparation = Preparation {
        num_cycles: row.get(3)?,
        start: start_mode.parse().unwrap_or_default(),
        accomplish: row.get(10)?,
        important: row.get(11)?,
        complete: row.get(12)?,
        distractions: row.get(13)?,
        measurable: row.get(14)?,
        noteworthy: row.get(15)?,
    };

    let id: i64 = row.get(0)?;
    let created_at = parse_datetime(row, 1)?;
    let status: String = row.get(2)?;
    let num_cycles: i64 = row.get(3)?;
    let start_at = parse_datetime(row, 4)?;
    let origin = parse_datetime(row, 5)?;
    let work_secs: i64 = row.get(6)?;
    let rest_secs: i64 = row.get(7)?;

    Ok(serde_json::from_str::<SessionMachine>(&machine_json)
        .map_err(|e| {
            CoreError::from(DatabaseError::CorruptRow {
                table: "sessions",
                message: format!("session {id}: {e}"),
            })
        })
        .map(|machine| SessionRecord {
            id,
            created_at,
            status,
            num_cycles,
            start_at,
            origin,
            work_secs,
            rest_secs,
            machine,
            preparation,
            debrief,
        }))
}

fn row_to_cycle(row: &rusqlite::Row) -> Result<CycleRecord, rusqlite::Error> {
    let target: Option<i64> = row.get(10)?;
    let review = match target {
        Some(percent) => Some(CycleReview {
            target: Target::from_percent(percent),
            noteworthy: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
            distractions: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
            improve: row.get::<_, Option<String>>(13)?.unwrap_or_default(),
        }),
        None => None,
    };

    Ok(CycleRecord {
        id: row.get(0)?,
        created_at: parse_datetime(row, 1)?,
        session_id: row.get(2)?,
        timer_id: row.get(3)?,
        number: row.get(4)?,
        plan: CyclePlan {
            accomplish: row.get(5)?,
            started: row.get(6)?,
            hazards: row.get(7)?,
            energy: Level::from_score(row.get(8)?),
            morale: Level::from_score(row.get(9)?),
        },
        review,
    })
}
