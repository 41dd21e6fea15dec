//! Learning tallies kept next to the gamification tables
//!
//! Stands in for the session, flashcard and curriculum subsystems when the
//! engine runs on its own (the CLI). Shares the database of [`SqliteStore`].

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use super::{SqliteStore, StoreError};
use crate::domain::{ActivityEvent, ActivityPayload, StudentId};
use crate::gamification::{LearningStats, StatsProvider};

/// [`StatsProvider`] backed by the `learning_tallies` tables
#[derive(Clone)]
pub struct SqliteTallyProvider {
    store: SqliteStore,
}

impl SqliteTallyProvider {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    /// Count a learning event. Call before handing the event to the engine so
    /// the snapshot includes it.
    pub fn record_event(&self, event: &ActivityEvent) -> Result<(), StoreError> {
        let student = event.student_id.as_str();
        self.store.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO learning_tallies (student_id) VALUES (?1)",
                params![student],
            )?;

            match &event.payload {
                ActivityPayload::Session { .. } => {
                    let perfect = i64::from(event.payload.is_perfect_session());
                    tx.execute(
                        r#"UPDATE learning_tallies
                           SET sessions_completed = sessions_completed + 1,
                               perfect_sessions = perfect_sessions + ?2
                           WHERE student_id = ?1"#,
                        params![student, perfect],
                    )?;
                    if let Some(subject) = &event.subject_id {
                        tx.execute(
                            r#"INSERT INTO subject_sessions (student_id, subject_id, sessions)
                               VALUES (?1, ?2, 1)
                               ON CONFLICT(student_id, subject_id)
                               DO UPDATE SET sessions = sessions + 1"#,
                            params![student, subject],
                        )?;
                    }
                }
                ActivityPayload::FlashcardReview { .. } => {
                    tx.execute(
                        r#"UPDATE learning_tallies
                           SET flashcard_reviews = flashcard_reviews + 1
                           WHERE student_id = ?1"#,
                        params![student],
                    )?;
                }
                ActivityPayload::Goal { goal_id } => {
                    tx.execute(
                        r#"INSERT OR IGNORE INTO mastered_outcomes (student_id, outcome_id, mastered_at)
                           VALUES (?1, ?2, ?3)"#,
                        params![student, goal_id, Utc::now().timestamp_millis()],
                    )?;
                }
            }

            tx.commit()?;
            Ok(())
        })
    }
}

impl StatsProvider for SqliteTallyProvider {
    fn learning_stats(&self, student: &StudentId) -> Result<LearningStats, StoreError> {
        self.store.with_conn(|conn| {
            let mut stats = LearningStats::default();

            let counts = conn
                .query_row(
                    r#"SELECT sessions_completed, perfect_sessions, flashcard_reviews
                       FROM learning_tallies WHERE student_id = ?1"#,
                    params![student.as_str()],
                    |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?, r.get::<_, i64>(2)?)),
                )
                .optional()?;
            if let Some((sessions, perfect, flashcards)) = counts {
                stats.sessions_completed = sessions.max(0) as u64;
                stats.perfect_sessions = perfect.max(0) as u64;
                stats.flashcard_reviews = flashcards.max(0) as u64;
            }

            stats.outcomes_mastered = conn.query_row(
                "SELECT COUNT(*) FROM mastered_outcomes WHERE student_id = ?1",
                params![student.as_str()],
                |r| r.get::<_, i64>(0),
            )? as u64;

            let mut stmt = conn
                .prepare("SELECT subject_id, sessions FROM subject_sessions WHERE student_id = ?1")?;
            let subjects = stmt
                .query_map(params![student.as_str()], |r| {
                    Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            for (subject, sessions) in subjects {
                stats.sessions_by_subject.insert(subject, sessions.max(0) as u64);
            }

            Ok(stats)
        })
    }
}
