use thiserror::Error;

use crate::step::StepKind;

/// Failure raised while running or restoring a script, located at the step
/// that caused it.
#[derive(Debug, Error)]
#[error("script {step_kind} step {index}{} failed at frame {frame}: {cause}", label_suffix(.label))]
pub struct ScriptError {
    /// Kind of the failing step, [`StepKind::Limit`] for runaway expansion, or
    /// [`StepKind::State`] when restored state is rejected.
    pub step_kind: StepKind,
    /// Label of the failing step.
    pub label: Option<String>,
    /// Position of the failing step within its block.
    pub index: usize,
    /// Frame being processed.
    pub frame: u64,
    /// What went wrong.
    #[source]
    pub cause: ScriptFault,
}

/// Underlying reason for a [`ScriptError`].
#[derive(Debug, Error)]
pub enum ScriptFault {
    /// More steps were processed in one tick than the runner allows.
    #[error("more than {limit} steps processed in one tick")]
    RunawayExpansion {
        /// Configured per-tick step budget.
        limit: usize,
        /// Kind of the step that would have exceeded the budget.
        last_step: StepKind,
    },
    /// A `do` action returned an error.
    #[error("action failed")]
    Action(#[source] anyhow::Error),
    /// Restored state does not describe a valid position in the program.
    #[error("corrupt runner state: {0}")]
    CorruptState(String),
    /// Restored state was captured from a different program.
    #[error("state belongs to program {expected:016x}, not {actual:016x}")]
    ProgramMismatch {
        /// Fingerprint recorded in the state.
        expected: u64,
        /// Fingerprint of the program being restored onto.
        actual: u64,
    },
}

impl ScriptError {
    pub(crate) fn restore(cause: ScriptFault) -> Self {
        Self {
            step_kind: StepKind::State,
            label: None,
            index: 0,
            frame: 0,
            cause,
        }
    }

    /// Whether the error is a determinism violation rather than a runtime fault.
    #[must_use]
    pub const fn is_determinism_violation(&self) -> bool {
        matches!(self.cause, ScriptFault::ProgramMismatch { .. })
    }
}

fn label_suffix(label: &Option<String>) -> String {
    label
        .as_deref()
        .map(|label| format!(" `{label}`"))
        .unwrap_or_default()
}
