//! Settings sections of the config file

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Database location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file; defaults to `~/.studyquest/studyquest.db` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Orchestration limits and catalog strictness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineTuning {
    /// Deadline for one orchestration in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// How long to wait for another orchestration of the same student
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,

    /// Reject unknown requirement types at load time instead of failing closed
    #[serde(default)]
    pub strict_catalog: bool,
}

fn default_timeout_ms() -> u64 {
    500
}

fn default_lock_wait_ms() -> u64 {
    250
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            lock_wait_ms: default_lock_wait_ms(),
            strict_catalog: false,
        }
    }
}

impl EngineTuning {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
}
