//! SQLite-backed gamification store
//!
//! Uses WAL mode so dashboards can read while orchestrations write, and
//! `BEGIN IMMEDIATE` transactions for commits. Connections are pooled so
//! orchestrations for different students do not queue behind one handle.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior, params};

use super::{GamificationStore, StateCommit, StoreError, XpAwardRecord};
use crate::domain::{ActivityType, StudentId};
use crate::gamification::{DailyTally, StudentGamificationState};

const DAY_FORMAT: &str = "%Y-%m-%d";
const MAX_IDLE_CONNECTIONS: usize = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

struct Inner {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
}

/// Gamification store in a SQLite database file
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<Inner>,
}

impl SqliteStore {
    /// Open or create the database at `path` and bring the schema up to date
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database dir: {}", parent.display())
                })?;
            }
        }

        let conn = open_connection(path)
            .with_context(|| format!("Failed to open gamification db: {}", path.display()))?;
        init_schema(&conn).context("Failed to initialize gamification schema")?;

        tracing::debug!(path = %path.display(), "Opened gamification database");

        Ok(Self {
            inner: Arc::new(Inner {
                path: path.to_path_buf(),
                idle: Mutex::new(vec![conn]),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Run `f` on a pooled connection
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let pooled = self
            .inner
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let mut conn = match pooled {
            Some(conn) => conn,
            None => open_connection(&self.inner.path)?,
        };

        let result = f(&mut conn);

        let mut idle = self.inner.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < MAX_IDLE_CONNECTIONS {
            idle.push(conn);
        }
        result
    }

    /// Create the zero-default row for a new student (no-op if it exists)
    pub fn create_student(&self, student: &StudentId) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                r#"INSERT OR IGNORE INTO student_gamification (student_id, updated_at)
                   VALUES (?1, ?2)"#,
                params![student.as_str(), Utc::now().timestamp_millis()],
            )?;
            Ok(())
        })
    }

    /// Remove all gamification data of a student (cascades to log and unlocks)
    pub fn delete_student(&self, student: &StudentId) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM student_gamification WHERE student_id = ?1",
                params![student.as_str()],
            )?;
            Ok(deleted > 0)
        })
    }

    /// Student ids with a gamification row
    pub fn student_ids(&self) -> Result<Vec<StudentId>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT student_id FROM student_gamification ORDER BY student_id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids.into_iter().map(StudentId::from).collect())
        })
    }
}

fn open_connection(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA_SQL)?;
    run_migrations(conn)
}

/// Run any pending migrations
fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    // Migration 2: learning tallies kept for the bundled stats provider
    if version < 2 {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS learning_tallies (
                student_id TEXT PRIMARY KEY,
                sessions_completed INTEGER NOT NULL DEFAULT 0,
                perfect_sessions INTEGER NOT NULL DEFAULT 0,
                flashcard_reviews INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS subject_sessions (
                student_id TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                sessions INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (student_id, subject_id)
            );
            CREATE TABLE IF NOT EXISTS mastered_outcomes (
                student_id TEXT NOT NULL,
                outcome_id TEXT NOT NULL,
                mastered_at INTEGER NOT NULL,
                PRIMARY KEY (student_id, outcome_id)
            );
            "#,
        )?;
        conn.execute("INSERT OR REPLACE INTO schema_version VALUES (2)", [])?;
    }

    Ok(())
}

pub(crate) fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

pub(crate) fn parse_day(value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value, DAY_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("invalid day '{}': {}", value, e)))
}

/// XP values are `u64` in memory but SQLite integers are signed
fn xp_column(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("XP value {} does not fit in the database", value)))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("invalid timestamp {}", ms)))
}

fn parse_activity(value: &str) -> Result<ActivityType, StoreError> {
    ActivityType::from_str(value)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown activity type '{}'", value)))
}

/// Busy/locked databases are lock-acquisition failures, not data errors
fn classify(err: rusqlite::Error, student: &StudentId, expected_version: u64) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => StoreError::Conflict {
            student: student.to_string(),
            expected_version,
        },
        _ => StoreError::Sqlite(err),
    }
}

fn load_state_with(
    conn: &Connection,
    student: &StudentId,
    as_of: NaiveDate,
) -> Result<StudentGamificationState, StoreError> {
    let mut state = StudentGamificationState::new(student);

    let row = conn
        .query_row(
            r#"SELECT total_xp, level, streak_current, streak_longest, last_active_day, version
               FROM student_gamification WHERE student_id = ?1"#,
            params![student.as_str()],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, i64>(3)?,
                    r.get::<_, Option<String>>(4)?,
                    r.get::<_, i64>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((total_xp, level, current, longest, last_day, version)) = row else {
        return Ok(state);
    };

    state.total_xp = u64::try_from(total_xp)
        .map_err(|_| StoreError::Corrupt(format!("negative total XP {} for {}", total_xp, student)))?;
    state.level = level.max(1) as u32;
    state.streak_current = current.max(0) as u32;
    state.streak_longest = longest.max(0) as u32;
    state.last_active_date = last_day.as_deref().map(parse_day).transpose()?;
    state.version = version.max(0) as u64;

    // Daily tallies for the requested day, rebuilt from the award log
    let day = format_day(as_of);
    let mut stmt = conn.prepare(
        r#"SELECT activity_type, SUM(amount) FROM xp_awards
           WHERE student_id = ?1 AND day = ?2
           GROUP BY activity_type"#,
    )?;
    let tallies = stmt
        .query_map(params![student.as_str(), day], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (activity, awarded) in tallies {
        state.daily_xp.insert(
            parse_activity(&activity)?,
            DailyTally {
                date: as_of,
                awarded: awarded.max(0) as u64,
            },
        );
    }

    let mut stmt = conn.prepare(
        "SELECT achievement_id, unlocked_at FROM student_achievements WHERE student_id = ?1",
    )?;
    let unlocked = stmt
        .query_map(params![student.as_str()], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (id, unlocked_at) in unlocked {
        state.unlocked_achievements.insert(id, from_millis(unlocked_at)?);
    }

    Ok(state)
}

fn commit_with(conn: &mut Connection, commit: &StateCommit) -> Result<u64, StoreError> {
    let state = &commit.state;
    let student = state.student_id.as_str();
    let expected = state.version;
    let next_version = expected + 1;
    let now = Utc::now().timestamp_millis();
    let last_day = state.last_active_date.map(format_day);

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let updated = tx.execute(
        r#"UPDATE student_gamification
           SET total_xp = ?2, level = ?3, streak_current = ?4, streak_longest = ?5,
               last_active_day = ?6, version = ?7, updated_at = ?8
           WHERE student_id = ?1 AND version = ?9"#,
        params![
            student,
            xp_column(state.total_xp)?,
            state.level as i64,
            state.streak_current as i64,
            state.streak_longest as i64,
            last_day,
            next_version as i64,
            now,
            expected as i64,
        ],
    )?;

    if updated == 0 {
        let exists: bool = tx
            .query_row(
                "SELECT COUNT(*) FROM student_gamification WHERE student_id = ?1",
                params![student],
                |r| r.get::<_, i64>(0),
            )
            .map(|c| c > 0)?;

        if exists || expected != 0 {
            // Dropping the transaction rolls it back
            return Err(StoreError::Conflict {
                student: student.to_string(),
                expected_version: expected,
            });
        }

        tx.execute(
            r#"INSERT INTO student_gamification
               (student_id, total_xp, level, streak_current, streak_longest,
                last_active_day, version, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            params![
                student,
                xp_column(state.total_xp)?,
                state.level as i64,
                state.streak_current as i64,
                state.streak_longest as i64,
                last_day,
                next_version as i64,
                now,
            ],
        )?;
    }

    {
        let mut stmt = tx.prepare_cached(
            r#"INSERT INTO xp_awards
               (id, student_id, activity_type, amount, day, resulting_total, recorded_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        )?;
        for award in &commit.awards {
            stmt.execute(params![
                award.id,
                student,
                award.activity_type.as_str(),
                xp_column(award.amount)?,
                format_day(award.day),
                xp_column(award.resulting_total)?,
                award.recorded_at.timestamp_millis(),
            ])?;
        }

        let mut stmt = tx.prepare_cached(
            r#"INSERT INTO student_achievements (student_id, achievement_id, unlocked_at)
               VALUES (?1, ?2, ?3)"#,
        )?;
        for (id, unlocked_at) in &commit.unlocked {
            stmt.execute(params![student, id, unlocked_at.timestamp_millis()])?;
        }
    }

    tx.commit()?;
    Ok(next_version)
}

impl GamificationStore for SqliteStore {
    fn load_state(
        &self,
        student: &StudentId,
        as_of: NaiveDate,
    ) -> Result<StudentGamificationState, StoreError> {
        self.with_conn(|conn| load_state_with(conn, student, as_of))
    }

    fn commit(&self, commit: &StateCommit) -> Result<u64, StoreError> {
        let student = &commit.state.student_id;
        let expected = commit.state.version;
        self.with_conn(|conn| {
            commit_with(conn, commit).map_err(|err| match err {
                StoreError::Sqlite(e) => classify(e, student, expected),
                other => other,
            })
        })
    }

    fn xp_history(
        &self,
        student: &StudentId,
        limit: usize,
    ) -> Result<Vec<XpAwardRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"SELECT id, activity_type, amount, day, resulting_total, recorded_at
                   FROM xp_awards WHERE student_id = ?1
                   ORDER BY recorded_at DESC, resulting_total DESC
                   LIMIT ?2"#,
            )?;
            let rows = stmt
                .query_map(params![student.as_str(), limit as i64], |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, i64>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, i64>(4)?,
                        r.get::<_, i64>(5)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, activity, amount, day, total, recorded_at)| {
                    Ok(XpAwardRecord {
                        id,
                        student_id: student.clone(),
                        activity_type: parse_activity(&activity)?,
                        amount: amount.max(0) as u64,
                        day: parse_day(&day)?,
                        resulting_total: total.max(0) as u64,
                        recorded_at: from_millis(recorded_at)?,
                    })
                })
                .collect()
        })
    }
}

/// SQL schema for the gamification database
const SCHEMA_SQL: &str = r#"
-- One row per student
CREATE TABLE IF NOT EXISTS student_gamification (
    student_id TEXT PRIMARY KEY,
    total_xp INTEGER NOT NULL DEFAULT 0,
    level INTEGER NOT NULL DEFAULT 1,
    streak_current INTEGER NOT NULL DEFAULT 0,
    streak_longest INTEGER NOT NULL DEFAULT 0,
    last_active_day TEXT,
    version INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL
);

-- Append-only XP award log
CREATE TABLE IF NOT EXISTS xp_awards (
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL REFERENCES student_gamification(student_id) ON DELETE CASCADE,
    activity_type TEXT NOT NULL,
    amount INTEGER NOT NULL,
    day TEXT NOT NULL,
    resulting_total INTEGER NOT NULL,
    recorded_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_xp_awards_student_day ON xp_awards(student_id, day);
CREATE INDEX IF NOT EXISTS idx_xp_awards_recorded ON xp_awards(student_id, recorded_at);

-- Unlocked achievements
CREATE TABLE IF NOT EXISTS student_achievements (
    student_id TEXT NOT NULL REFERENCES student_gamification(student_id) ON DELETE CASCADE,
    achievement_id TEXT NOT NULL,
    unlocked_at INTEGER NOT NULL,
    PRIMARY KEY (student_id, achievement_id)
);

-- Schema version
CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
INSERT OR IGNORE INTO schema_version VALUES (1);
"#;
