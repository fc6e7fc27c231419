//! Serializable execution state for scripts and patterns.
//!
//! These are plain data contracts. The interpreter that produces and consumes
//! [`RunnerState`] lives in the script system crate; the snapshot summary only
//! needs to carry it around.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version tag stamped into [`PatternState::Script`] blobs.
pub const SCRIPT_STATE_VERSION: u32 = 1;

/// Instrumentation counters gathered by a script task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptMetrics {
    /// Steps processed, counting every visit to a suspended step.
    pub steps: u64,
    /// Actions invoked.
    pub do_calls: u64,
    /// Conditional predicates evaluated.
    pub if_evaluations: u64,
    /// Loop body iterations started.
    pub loop_iterations: u64,
    /// Fork groups launched.
    pub fork_launches: u64,
    /// Ticks spent suspended on a wait.
    pub wait_frames: u64,
    /// Ticks spent suspended on an unfinished join.
    pub join_wait_frames: u64,
    /// Raw generator draws consumed by actions and predicates.
    pub rng_draws: u64,
}

impl ScriptMetrics {
    /// Adds every counter of `other` into `self`.
    pub fn absorb(&mut self, other: &ScriptMetrics) {
        self.steps += other.steps;
        self.do_calls += other.do_calls;
        self.if_evaluations += other.if_evaluations;
        self.loop_iterations += other.loop_iterations;
        self.fork_launches += other.fork_launches;
        self.wait_frames += other.wait_frames;
        self.join_wait_frames += other.join_wait_frames;
        self.rng_draws += other.rng_draws;
    }
}

/// One entry of a task's frame stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameState {
    /// Compiled block the frame executes.
    pub block: usize,
    /// Index of the next step within the block.
    pub pc: usize,
    /// Fork token the frame is joining on, when suspended at a launched fork.
    pub joining: Option<u32>,
}

/// Complete state of one script task and, recursively, its forked children.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskState {
    /// Frame stack, outermost first.
    pub frames: Vec<FrameState>,
    /// Remaining frames of a latched wait.
    pub wait_remaining: Option<u32>,
    /// Whether the task finished.
    pub done: bool,
    /// Whether the task was aborted.
    pub aborted: bool,
    /// Token handed to the next fork this task launches.
    pub next_fork_token: u32,
    /// Unjoined fork groups keyed by token.
    pub forks: BTreeMap<u32, Vec<TaskState>>,
    /// Executions per action label, including joined children.
    pub label_counts: BTreeMap<String, u64>,
    /// Counters including joined children.
    pub metrics: ScriptMetrics,
}

/// Serialized script runner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerState {
    /// Structural fingerprint of the program the state belongs to.
    pub program: u64,
    /// Per-tick step budget the runner was configured with.
    pub step_limit: usize,
    /// Root task.
    pub task: TaskState,
}

/// Versioned pattern state stored in the snapshot summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PatternState {
    /// State of a pattern driven by the script engine.
    Script {
        /// Layout version of this variant.
        version: u32,
        /// Serialized runner.
        runner: RunnerState,
    },
    /// State of a hand-written pattern in its own format.
    Custom {
        /// Pattern-defined layout version.
        version: u32,
        /// Pattern-defined payload.
        data: Value,
    },
}

impl PatternState {
    /// Wraps a runner state in the current script layout.
    #[must_use]
    pub fn script(runner: RunnerState) -> Self {
        Self::Script {
            version: SCRIPT_STATE_VERSION,
            runner,
        }
    }

    /// Layout version carried by the blob.
    #[must_use]
    pub const fn version(&self) -> u32 {
        match self {
            Self::Script { version, .. } | Self::Custom { version, .. } => *version,
        }
    }
}
