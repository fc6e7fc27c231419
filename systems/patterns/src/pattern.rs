use danmaku_core::{PatternState, TickContext};
use serde_json::Value;

use crate::PatternError;

/// Successor declared by a pattern that finished.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternChain {
    /// Catalog identifier of the next pattern.
    pub next: String,
    /// Opaque handoff data for the successor's factory.
    pub payload: Option<Value>,
}

impl PatternChain {
    /// Chains to `next` without a payload.
    #[must_use]
    pub fn to(next: impl Into<String>) -> Self {
        Self {
            next: next.into(),
            payload: None,
        }
    }

    /// Attaches handoff data.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Stateful attack pattern driven by the [`crate::PatternDirector`].
///
/// Hooks run inside the scheduler tick, so every random draw must go through
/// the context generator. Errors propagate to the scheduler uncaught.
pub trait Pattern {
    /// Catalog identifier.
    fn id(&self) -> &str;

    /// Content version, recorded in snapshots and checked on restore.
    fn version(&self) -> u32;

    /// Called once when the pattern becomes active.
    fn start(&mut self, ctx: &mut TickContext<'_>) -> anyhow::Result<()>;

    /// Advances the pattern; returns `true` once it has finished.
    fn update(&mut self, dt: f64, ctx: &mut TickContext<'_>) -> anyhow::Result<bool>;

    /// Called after the pattern finished or was aborted.
    fn end(&mut self, _ctx: &mut TickContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Successor to start once this pattern finishes. Queried once, after `end`.
    fn chain(&mut self) -> Option<PatternChain> {
        None
    }

    /// Notifies the pattern that it is being stopped externally.
    fn abort(&mut self) {}

    /// Resumable state, stored into the snapshot summary after every update.
    fn serialize_state(&self) -> Option<PatternState> {
        None
    }

    /// Reinstates state captured by [`Pattern::serialize_state`].
    fn restore_state(&mut self, _state: PatternState) -> anyhow::Result<()> {
        Err(PatternError::RestoreUnsupported {
            pattern: self.id().to_owned(),
        }
        .into())
    }
}
