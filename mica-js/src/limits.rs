//! Resource limits for script evaluation

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wall-clock limit per evaluation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of evaluations allowed to run at once
pub const DEFAULT_WORKERS: usize = 32;

/// Default number of QuickJS interrupt checks an evaluation may reach
pub const DEFAULT_STEP_BUDGET: u64 = 1_000_000;

/// Default heap ceiling per runtime
pub const DEFAULT_MEMORY_LIMIT: usize = 64 * 1024 * 1024;

/// Default native stack ceiling per runtime
pub const DEFAULT_MAX_STACK_SIZE: usize = 1024 * 1024;

/// Limits applied to every evaluation of a [`crate::ScriptEvaluator`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptLimits {
    /// Wall-clock budget, from submission to result
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// Upper bound on concurrent evaluations
    pub workers: usize,
    /// Interrupt checks allowed before the script is stopped
    pub step_budget: u64,
    /// Heap bytes per runtime
    pub memory_limit: usize,
    /// Stack bytes per runtime
    pub max_stack_size: usize,
}

impl ScriptLimits {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_step_budget(mut self, step_budget: u64) -> Self {
        self.step_budget = step_budget;
        self
    }

    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            workers: DEFAULT_WORKERS,
            step_budget: DEFAULT_STEP_BUDGET,
            memory_limit: DEFAULT_MEMORY_LIMIT,
            max_stack_size: DEFAULT_MAX_STACK_SIZE,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
