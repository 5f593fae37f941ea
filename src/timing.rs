use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::trigger::ExecutionHook;

/// How long the engine spent on one level of the result tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelTiming {
    pub level: usize,
    /// Time from the end of the previous level (or the start of execution) to the end of this
    /// one.
    pub duration_ns: u64,
}

struct TimingState {
    level_started: Instant,
    levels: Vec<LevelTiming>,
    total: Option<Duration>,
}

/// Records per-level durations of one execution.
///
/// Chain it in front of the [`DispatchTrigger`](crate::DispatchTrigger) so each level's time
/// is taken before its loaders are flushed.
pub struct TracingHook {
    started: Instant,
    state: Mutex<TimingState>,
}

impl Default for TracingHook {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingHook {
    pub fn new() -> Self {
        let started = Instant::now();
        let state = TimingState { level_started: started, levels: Vec::new(), total: None };
        Self { started, state: Mutex::new(state) }
    }

    fn state(&self) -> MutexGuard<'_, TimingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn levels(&self) -> Vec<LevelTiming> {
        self.state().levels.clone()
    }

    /// Wall time of the whole execution, once it has completed.
    pub fn total(&self) -> Option<Duration> {
        self.state().total
    }

    /// The timings in the shape reported under `extensions.tracing`.
    pub fn to_extension(&self) -> Value {
        let state = self.state();
        json!({
            "durationNs": state.total.map(nanos),
            "execution": { "levels": state.levels },
        })
    }
}

#[async_trait]
impl ExecutionHook for TracingHook {
    async fn on_level_complete(&self, level: usize) {
        let now = Instant::now();
        let mut state = self.state();
        let duration_ns = nanos(now - state.level_started);
        state.level_started = now;
        state.levels.push(LevelTiming { level, duration_ns });
        tracing::debug!(level, duration_ns, "level resolved");
    }

    async fn on_execution_complete(&self) {
        let total = self.started.elapsed();
        self.state().total = Some(total);
        tracing::debug!(duration_ns = nanos(total), "execution timed");
    }
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
