//! End-to-end scenarios for event processing

mod common;

use common::{achievement, date, memory_engine, requirement};
use studyquest::gamification::{GamificationError, GamificationEvent, StreakChange};
use studyquest::{ActivityEvent, ActivityType, StudentId};

#[test]
fn test_award_crossing_threshold_levels_up() {
    let engine = memory_engine(&[]);
    let outcome = engine
        .process_event(&ActivityEvent::goal("s1", date(2024, 3, 10), "g1").with_base_xp(150))
        .expect("process");

    assert_eq!(outcome.total_xp, 150);
    assert_eq!(outcome.new_level, 2);
    assert!(outcome.leveled_up);
    assert!(outcome
        .events()
        .iter()
        .any(|e| matches!(e, GamificationEvent::LevelUp(l) if l.old_level == 1 && l.new_level == 2)));
}

#[test]
fn test_seven_day_streak_multiplies_xp() {
    let engine = memory_engine(&[]);
    for day in 4..10 {
        engine
            .process_event(&ActivityEvent::goal("s1", date(2024, 3, day), "warmup").with_base_xp(0))
            .expect("process");
    }

    let outcome = engine
        .process_event(&ActivityEvent::goal("s1", date(2024, 3, 10), "g").with_base_xp(10))
        .expect("process");
    assert_eq!(outcome.streak.current, 7);
    assert_eq!(outcome.activity_xp, 11);
}

#[test]
fn test_flashcard_daily_cap_is_enforced() {
    let engine = memory_engine(&[]);
    let day = date(2024, 3, 10);

    let awarded: Vec<u64> = (0..3)
        .map(|_| {
            engine
                .process_event(&ActivityEvent::flashcard("s1", day, true).with_base_xp(20))
                .expect("process")
                .activity_xp
        })
        .collect();
    assert_eq!(awarded, vec![20, 20, 10]);

    // Exhausted cap is a normal zero award
    let outcome = engine
        .process_event(&ActivityEvent::flashcard("s1", day, true).with_base_xp(20))
        .expect("process");
    assert_eq!(outcome.activity_xp, 0);
    assert!(outcome.capped);
    assert!(outcome.events().contains(&GamificationEvent::DailyCapReached {
        activity: ActivityType::FlashcardReview,
        requested: 20,
        awarded: 0,
    }));

    // A new day starts a new tally
    let next_day = engine
        .process_event(&ActivityEvent::flashcard("s1", date(2024, 3, 11), true).with_base_xp(20))
        .expect("process");
    assert_eq!(next_day.activity_xp, 20);
}

#[test]
fn test_missed_day_resets_streak() {
    let engine = memory_engine(&[]);
    engine
        .process_event(&ActivityEvent::goal("s1", date(2024, 3, 9), "a"))
        .expect("process");
    engine
        .process_event(&ActivityEvent::goal("s1", date(2024, 3, 10), "b"))
        .expect("process");

    let outcome = engine
        .process_event(&ActivityEvent::goal("s1", date(2024, 3, 12), "c"))
        .expect("process");
    assert_eq!(outcome.streak.change, StreakChange::ResetThenStarted);
    assert_eq!(outcome.streak.current, 1);
    assert_eq!(outcome.streak.longest, 2);
    assert_eq!(outcome.events()[0], GamificationEvent::StreakReset { previous: 2 });
}

#[test]
fn test_same_day_events_leave_streak_unchanged() {
    let engine = memory_engine(&[]);
    let day = date(2024, 3, 10);
    let first = engine
        .process_event(&ActivityEvent::session("s1", day, 1, 2))
        .expect("process");
    let second = engine
        .process_event(&ActivityEvent::session("s1", day, 1, 2))
        .expect("process");

    assert_eq!(first.streak.change, StreakChange::Started);
    assert_eq!(second.streak.change, StreakChange::UnchangedSameDay);
    assert_eq!(second.streak.current, 1);
}

#[test]
fn test_backdated_event_keeps_streak_and_uses_its_own_cap() {
    let engine = memory_engine(&[]);
    let student = StudentId::new("s1");
    for _ in 0..3 {
        engine
            .process_event(&ActivityEvent::flashcard("s1", date(2024, 3, 12), true).with_base_xp(20))
            .expect("process");
    }

    let late = engine
        .process_event(&ActivityEvent::flashcard("s1", date(2024, 3, 10), true).with_base_xp(20))
        .expect("process");
    assert_eq!(late.streak.change, StreakChange::UnchangedSameDay);
    assert_eq!(late.streak.last_active_date, Some(date(2024, 3, 12)));
    // March 10 has its own, untouched cap
    assert_eq!(late.activity_xp, 20);

    let history = engine.xp_history(&student, 1).expect("history");
    assert_eq!(history[0].day, date(2024, 3, 10));
}

#[test]
fn test_total_xp_never_decreases_and_longest_covers_current() {
    let engine = memory_engine(&[achievement("first", 25, vec![requirement("session_count", 1)])]);
    let days = [1, 2, 3, 5, 6, 6, 9, 10, 11, 12];
    let mut last_total = 0;

    for (i, day) in days.iter().enumerate() {
        let event = if i % 2 == 0 {
            ActivityEvent::session("s1", date(2024, 4, *day), 3, 4)
        } else {
            ActivityEvent::flashcard("s1", date(2024, 4, *day), i % 3 == 0)
        };
        engine.stats_provider().record_event(&event);
        let outcome = engine.process_event(&event).expect("process");

        assert!(outcome.total_xp >= last_total);
        assert!(outcome.streak.longest >= outcome.streak.current);
        last_total = outcome.total_xp;
    }
}

#[test]
fn test_achievement_reward_is_paid_once() {
    let engine = memory_engine(&[achievement("first", 40, vec![requirement("session_count", 1)])]);
    let student = StudentId::new("s1");

    for day in 10..15 {
        let event = ActivityEvent::session("s1", date(2024, 3, day), 2, 2);
        engine.stats_provider().record_event(&event);
        engine.process_event(&event).expect("process");
    }

    let rewards: Vec<_> = engine
        .xp_history(&student, 100)
        .expect("history")
        .into_iter()
        .filter(|r| r.activity_type == ActivityType::AchievementReward)
        .collect();
    assert_eq!(rewards.len(), 1);
    assert_eq!(rewards[0].amount, 40);
    assert_eq!(engine.get_unlocked_achievements(&student).expect("unlocked").len(), 1);
}

#[test]
fn test_unknown_requirement_fails_closed() {
    let configs = vec![achievement("karma", 10, vec![requirement("karma_points", 1)])];
    let catalog = studyquest::gamification::AchievementCatalog::from_configs(&configs, false)
        .expect("lenient catalog");
    let engine = studyquest::gamification::GamificationEngine::new(
        common::scenario_settings(),
        std::sync::Arc::new(catalog),
        studyquest::store::MemoryStore::new(),
        studyquest::gamification::InMemoryStatsProvider::new(),
    );

    let outcome = engine
        .process_event(&ActivityEvent::session("s1", date(2024, 3, 10), 5, 5))
        .expect("process");
    assert!(outcome.newly_unlocked.is_empty());

    let locked = engine
        .get_locked_achievements_with_progress(&StudentId::new("s1"))
        .expect("locked");
    assert_eq!(locked[0].progress.percent, 0);
}

#[test]
fn test_subject_and_mastery_requirements() {
    let mut by_subject = requirement("subject_session_count", 2);
    by_subject.subject = Some("math".to_string());
    let engine = memory_engine(&[
        achievement("math_fan", 10, vec![by_subject]),
        achievement("two_goals", 10, vec![requirement("outcomes_mastered", 2)]),
    ]);
    let day = date(2024, 3, 10);

    let events = [
        ActivityEvent::session("s1", day, 1, 3).with_subject("math"),
        ActivityEvent::goal("s1", day, "fractions"),
        ActivityEvent::session("s1", day, 2, 3).with_subject("math"),
        ActivityEvent::goal("s1", day, "decimals"),
    ];
    let mut unlocked = Vec::new();
    for event in &events {
        engine.stats_provider().record_event(event);
        let outcome = engine.process_event(event).expect("process");
        unlocked.extend(outcome.newly_unlocked.into_iter().map(|u| u.id));
    }
    assert_eq!(unlocked, vec!["math_fan".to_string(), "two_goals".to_string()]);
}

#[test]
fn test_or_log_swallows_failures() {
    let engine = memory_engine(&[]);
    engine.store().fail_next_commits(1);
    let event = ActivityEvent::goal("s1", date(2024, 3, 10), "g");

    assert!(engine.process_event_or_log(&event).is_none());
    assert!(engine.process_event_or_log(&event).is_some());
}

#[test]
fn test_huge_same_day_awards_fail_without_panicking() {
    let engine = memory_engine(&[]);
    let student = StudentId::new("s1");
    let day = date(2024, 3, 10);

    let first = engine
        .process_event(&ActivityEvent::goal("s1", day, "a").with_base_xp(i64::MAX))
        .expect("process");
    assert_eq!(first.total_xp, i64::MAX as u64);

    for goal in ["b", "c"] {
        let err = engine
            .process_event(&ActivityEvent::goal("s1", day, goal).with_base_xp(i64::MAX))
            .expect_err("total would overflow");
        assert!(matches!(err, GamificationError::InvalidAmount(i64::MAX)));
    }

    let stats = engine.get_stats_on(&student, day).expect("stats");
    assert_eq!(stats.level.total_xp, i64::MAX as u64);
    assert_eq!(engine.store().commit_count(), 1);
}
