//! Core domain types for StudyQuest

mod activity;
mod student;

pub use activity::{ActivityEvent, ActivityPayload, ActivityType};
pub use student::StudentId;
