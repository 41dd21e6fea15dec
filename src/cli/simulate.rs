//! Simulate command implementation
//!
//! Drives many students through several days of activity at once against an
//! in-memory store, retrying retryable failures with backoff.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use studyquest::config::EngineConfig;
use studyquest::gamification::{GamificationEngine, InMemoryStatsProvider};
use studyquest::store::MemoryStore;
use studyquest::{ActivityEvent, StudentId};

type MemoryEngine = GamificationEngine<MemoryStore, InMemoryStatsProvider>;

const MAX_ATTEMPTS: u32 = 5;

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    retries: AtomicU64,
    dropped: AtomicU64,
    unlocks: AtomicU64,
    level_ups: AtomicU64,
}

/// Deterministic mix of activities
fn event_for(student: &StudentId, student_idx: usize, day: NaiveDate, day_idx: u32, i: usize) -> ActivityEvent {
    let roll = (student_idx * 31 + day_idx as usize * 7 + i * 13) % 10;
    match roll {
        0..=4 => ActivityEvent::flashcard(student, day, true),
        5 => ActivityEvent::flashcard(student, day, false),
        6 | 7 => ActivityEvent::session(student, day, 8, 10).with_subject("math"),
        8 => ActivityEvent::session(student, day, 10, 10).with_subject("science"),
        _ => ActivityEvent::goal(student, day, format!("goal-{}-{}", day_idx, i)),
    }
}

async fn run_event(engine: Arc<MemoryEngine>, event: ActivityEvent, counters: Arc<Counters>) {
    engine.stats_provider().record_event(&event);

    for attempt in 1..=MAX_ATTEMPTS {
        match Arc::clone(&engine).process_event_async(event.clone()).await {
            Ok(outcome) => {
                counters.processed.fetch_add(1, Ordering::Relaxed);
                counters
                    .unlocks
                    .fetch_add(outcome.newly_unlocked.len() as u64, Ordering::Relaxed);
                if outcome.leveled_up {
                    counters.level_ups.fetch_add(1, Ordering::Relaxed);
                }
                return;
            }
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                counters.retries.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(student = %event.student_id, attempt, error = %err, "Retrying event");
                tokio::time::sleep(Duration::from_millis(5 * 2u64.pow(attempt))).await;
            }
            Err(err) => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(student = %event.student_id, error = %err, "Event dropped");
                return;
            }
        }
    }
}

pub async fn simulate_command(
    config_path: Option<&Path>,
    students: usize,
    days: u32,
    events_per_day: usize,
) -> Result<()> {
    let config = EngineConfig::load(config_path)?;
    let (settings, catalog) = config.build().context("Invalid configuration")?;
    let engine = Arc::new(GamificationEngine::new(
        settings,
        Arc::new(catalog),
        MemoryStore::new(),
        InMemoryStatsProvider::new(),
    ));
    let counters = Arc::new(Counters::default());

    let student_ids: Vec<StudentId> = (0..students)
        .map(|i| StudentId::new(format!("student-{:03}", i + 1)))
        .collect();
    let start = Utc::now().date_naive() - ChronoDuration::days(i64::from(days));

    for day_idx in 0..days {
        let day = start + ChronoDuration::days(i64::from(day_idx));
        let mut tasks = tokio::task::JoinSet::new();

        for (student_idx, student) in student_ids.iter().enumerate() {
            // Odd students skip every fifth day and lose their streak
            if student_idx % 2 == 1 && (day_idx as usize + student_idx) % 5 == 4 {
                continue;
            }
            for i in 0..events_per_day {
                let event = event_for(student, student_idx, day, day_idx, i);
                tasks.spawn(run_event(Arc::clone(&engine), event, Arc::clone(&counters)));
            }
        }

        while let Some(joined) = tasks.join_next().await {
            joined.context("Simulation task panicked")?;
        }
    }

    println!(
        "Processed {} events ({} retries, {} dropped), {} achievements unlocked, {} level-ups\n",
        counters.processed.load(Ordering::Relaxed),
        counters.retries.load(Ordering::Relaxed),
        counters.dropped.load(Ordering::Relaxed),
        counters.unlocks.load(Ordering::Relaxed),
        counters.level_ups.load(Ordering::Relaxed),
    );

    let today = Utc::now().date_naive();
    for student in &student_ids {
        let stats = engine.get_stats_on(student, today)?;
        println!(
            "  {}  level {:>2} {:<10} {:>6} XP  streak {:>2} (best {:>2})  achievements {}/{}",
            student,
            stats.level.level,
            stats.level.title,
            stats.level.total_xp,
            stats.current_streak,
            stats.longest_streak,
            stats.achievements_unlocked,
            stats.achievements_total
        );
    }

    Ok(())
}
