//! StudyQuest - gamification for student learning activity
//!
//! Learning events (completed study sessions, flashcard reviews, achieved
//! goals) earn XP. XP drives levels, consecutive active days build a streak
//! that multiplies XP, and a data-driven catalog of achievements grants
//! one-time rewards.
//!
//! ## Layout
//!
//! - [`gamification`]: level table, streaks, XP ledger, achievements, engine
//! - [`store`]: transactional persistence (SQLite or in-memory)
//! - [`config`]: TOML configuration for tables, caps and the catalog

pub mod config;
pub mod domain;
pub mod gamification;
pub mod store;

pub use domain::*;
