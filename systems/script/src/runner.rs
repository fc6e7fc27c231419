//! Public driver that owns a compiled program and its root task.

use std::collections::BTreeMap;

use danmaku_core::{RunnerState, ScriptMetrics, TickContext};
use serde::{Deserialize, Serialize};

use crate::{
    compile::{compile, Callbacks, Code},
    error::{ScriptError, ScriptFault},
    step::Step,
    task::Task,
};

const DEFAULT_STEP_LIMIT: usize = 100;

/// Tuning knobs for a [`ScriptRunner`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerConfig {
    step_limit: usize,
}

impl RunnerConfig {
    /// Creates a configuration with the provided per-tick step budget.
    #[must_use]
    pub const fn new(step_limit: usize) -> Self {
        Self { step_limit }
    }

    /// Steps a single task may process in one tick before the runner fails.
    #[must_use]
    pub const fn step_limit(&self) -> usize {
        self.step_limit
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_LIMIT)
    }
}

/// Supervision state of the root task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// Executing or suspended on a wait.
    Running,
    /// Suspended until launched branches finish.
    AwaitingJoin,
    /// Finished or aborted.
    Done,
}

/// Introspection view over a runner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerMetrics {
    /// Counters gathered so far, including joined branches.
    pub counters: ScriptMetrics,
    /// Executions per `do` label, including joined branches.
    pub label_counts: BTreeMap<String, u64>,
    /// Block the root task is executing.
    pub block: usize,
    /// Position within that block.
    pub index: usize,
    /// Depth of the root task's frame stack.
    pub depth: usize,
    /// Whether the runner finished.
    pub done: bool,
    /// Whether the runner was aborted.
    pub aborted: bool,
}

/// Interpreter that advances a script by one tick per [`ScriptRunner::update`].
#[derive(Debug)]
pub struct ScriptRunner {
    code: Code,
    callbacks: Callbacks,
    root: Task,
    config: RunnerConfig,
}

impl ScriptRunner {
    /// Compiles `steps` with the default step budget.
    #[must_use]
    pub fn new(steps: Vec<Step>) -> Self {
        Self::with_config(steps, RunnerConfig::default())
    }

    /// Compiles `steps` with an explicit configuration.
    #[must_use]
    pub fn with_config(steps: Vec<Step>, config: RunnerConfig) -> Self {
        let (code, callbacks) = compile(steps);
        Self {
            code,
            callbacks,
            root: Task::new(0),
            config,
        }
    }

    /// Rebuilds a runner over `steps` positioned where `state` left off.
    ///
    /// `steps` must be structurally identical to the program the state was
    /// captured from; a different program is rejected as a determinism
    /// violation.
    pub fn restore(steps: Vec<Step>, state: RunnerState) -> Result<Self, ScriptError> {
        let mut runner = Self::with_config(steps, RunnerConfig::new(state.step_limit));
        runner.restore_state(state)?;
        Ok(runner)
    }

    /// Replaces the position of this runner with `state`.
    pub fn restore_state(&mut self, state: RunnerState) -> Result<(), ScriptError> {
        if state.program != self.code.fingerprint() {
            return Err(ScriptError::restore(ScriptFault::ProgramMismatch {
                expected: state.program,
                actual: self.code.fingerprint(),
            }));
        }
        self.root = Task::from_state(state.task, &self.code).map_err(ScriptError::restore)?;
        self.config = RunnerConfig::new(state.step_limit);
        log::debug!(
            "restored script {:016x} at depth {}",
            self.code.fingerprint(),
            self.root.depth()
        );
        Ok(())
    }

    /// Processes steps until the script suspends or finishes. Returns whether
    /// it is done.
    pub fn update(&mut self, ctx: &mut TickContext<'_>) -> Result<bool, ScriptError> {
        self.root.poll(
            &self.code,
            &mut self.callbacks,
            ctx,
            self.config.step_limit(),
        )
    }

    /// Stops the script; the next update reports it done without running anything.
    pub fn abort(&mut self) {
        self.root.abort();
    }

    /// Whether the script finished or was aborted.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.root.is_done()
    }

    /// Whether the script was aborted.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        self.root.is_aborted()
    }

    /// Supervision state of the root task.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        if self.root.is_done() {
            TaskStatus::Done
        } else if self.root.is_joining() {
            TaskStatus::AwaitingJoin
        } else {
            TaskStatus::Running
        }
    }

    /// Counters, label counts and position.
    #[must_use]
    pub fn metrics(&self) -> RunnerMetrics {
        let position = self.root.position();
        RunnerMetrics {
            counters: *self.root.metrics(),
            label_counts: self.root.label_counts().clone(),
            block: position.map_or(0, |frame| frame.block),
            index: position.map_or(0, |frame| frame.pc),
            depth: self.root.depth(),
            done: self.root.is_done(),
            aborted: self.root.is_aborted(),
        }
    }

    /// Executions per `do` label, including joined branches.
    #[must_use]
    pub fn executed_label_counts(&self) -> &BTreeMap<String, u64> {
        self.root.label_counts()
    }

    /// Generator draws consumed by actions and predicates, including joined branches.
    #[must_use]
    pub const fn rng_draws(&self) -> u64 {
        self.root.metrics().rng_draws
    }

    /// Structural fingerprint of the compiled program.
    #[must_use]
    pub const fn program_fingerprint(&self) -> u64 {
        self.code.fingerprint()
    }

    /// Captures everything needed to resume this runner on the same program.
    #[must_use]
    pub fn serialize(&self) -> RunnerState {
        RunnerState {
            program: self.code.fingerprint(),
            step_limit: self.config.step_limit(),
            task: self.root.to_state(),
        }
    }
}
