use danmaku_core::{PatternState, TickContext, SCRIPT_STATE_VERSION};
use danmaku_system_script::{ScriptRunner, Step};

use crate::{Pattern, PatternChain, PatternError};

/// Pattern whose behaviour is a script program.
///
/// Its state is the serialized runner, so a session can be resumed onto a
/// freshly built copy of the same program.
#[derive(Debug)]
pub struct ScriptPattern {
    id: String,
    version: u32,
    runner: ScriptRunner,
    chain: Option<PatternChain>,
}

impl ScriptPattern {
    /// Compiles `steps` into a pattern registered under `id`.
    #[must_use]
    pub fn new(id: impl Into<String>, version: u32, steps: Vec<Step>) -> Self {
        Self::from_runner(id, version, ScriptRunner::new(steps))
    }

    /// Wraps an already configured runner.
    #[must_use]
    pub fn from_runner(id: impl Into<String>, version: u32, runner: ScriptRunner) -> Self {
        Self {
            id: id.into(),
            version,
            runner,
            chain: None,
        }
    }

    /// Declares the successor started when the script finishes.
    #[must_use]
    pub fn chained(mut self, chain: PatternChain) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Underlying runner, for metrics.
    #[must_use]
    pub const fn runner(&self) -> &ScriptRunner {
        &self.runner
    }
}

impl Pattern for ScriptPattern {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn start(&mut self, _ctx: &mut TickContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn update(&mut self, _dt: f64, ctx: &mut TickContext<'_>) -> anyhow::Result<bool> {
        Ok(self.runner.update(ctx)?)
    }

    fn chain(&mut self) -> Option<PatternChain> {
        if self.runner.is_aborted() {
            return None;
        }
        self.chain.take()
    }

    fn abort(&mut self) {
        self.runner.abort();
    }

    fn serialize_state(&self) -> Option<PatternState> {
        Some(PatternState::script(self.runner.serialize()))
    }

    fn restore_state(&mut self, state: PatternState) -> anyhow::Result<()> {
        match state {
            PatternState::Script { version, runner } if version == SCRIPT_STATE_VERSION => {
                self.runner.restore_state(runner)?;
                Ok(())
            }
            other => Err(PatternError::StateVersion {
                pattern: self.id.clone(),
                expected: SCRIPT_STATE_VERSION,
                actual: other.version(),
            }
            .into()),
        }
    }
}
