//! Script AST and the builder functions patterns use to write it.

use danmaku_core::TickContext;

/// Side effect run by a [`Step::Do`].
pub type Action = Box<dyn FnMut(&mut TickContext<'_>) -> anyhow::Result<()>>;

/// Condition evaluated by [`Step::If`] and [`Step::LoopUntil`].
pub type Predicate = Box<dyn FnMut(&mut TickContext<'_>) -> bool>;

/// One instruction of a script.
///
/// Steps own their callbacks, so a program is consumed when a runner is built
/// from it. Rebuild the program from the same builder to restore a runner.
pub enum Step {
    /// Suspend for a number of ticks.
    Wait {
        /// Ticks to stay suspended.
        frames: u32,
        /// Optional diagnostic label.
        label: Option<String>,
    },
    /// Invoke an action once.
    Do {
        /// Callback to run.
        action: Action,
        /// Label whose execution count is tracked.
        label: Option<String>,
    },
    /// Run one of two branches.
    If {
        /// Condition, evaluated once per visit.
        predicate: Predicate,
        /// Steps run when the predicate holds.
        then: Vec<Step>,
        /// Steps run otherwise.
        otherwise: Vec<Step>,
        /// Optional diagnostic label.
        label: Option<String>,
    },
    /// Repeat a body until a predicate holds, checking before each iteration.
    LoopUntil {
        /// Exit condition.
        predicate: Predicate,
        /// Steps of one iteration.
        body: Vec<Step>,
        /// Optional diagnostic label.
        label: Option<String>,
    },
    /// Launch concurrent branches and wait for all of them.
    Fork {
        /// Branch programs.
        branches: Vec<Vec<Step>>,
        /// Optional diagnostic label.
        label: Option<String>,
    },
    /// Wait for a previously launched fork group.
    Join {
        /// Token of the fork group.
        token: u32,
        /// Optional diagnostic label.
        label: Option<String>,
    },
}

impl Step {
    /// Attaches a label to the step.
    #[must_use]
    pub fn labeled(mut self, name: impl Into<String>) -> Self {
        let name = Some(name.into());
        match &mut self {
            Self::Wait { label, .. }
            | Self::Do { label, .. }
            | Self::If { label, .. }
            | Self::LoopUntil { label, .. }
            | Self::Fork { label, .. }
            | Self::Join { label, .. } => *label = name,
        }
        self
    }

    /// Label attached to the step, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Wait { label, .. }
            | Self::Do { label, .. }
            | Self::If { label, .. }
            | Self::LoopUntil { label, .. }
            | Self::Fork { label, .. }
            | Self::Join { label, .. } => label.as_deref(),
        }
    }

    /// Kind of the step, as reported in errors.
    #[must_use]
    pub const fn kind(&self) -> StepKind {
        match self {
            Self::Wait { .. } => StepKind::Wait,
            Self::Do { .. } => StepKind::Do,
            Self::If { .. } => StepKind::If,
            Self::LoopUntil { .. } => StepKind::LoopUntil,
            Self::Fork { .. } => StepKind::Fork,
            Self::Join { .. } => StepKind::Join,
        }
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("Step");
        let _ = out.field("kind", &self.kind()).field("label", &self.label());
        match self {
            Self::Wait { frames, .. } => {
                let _ = out.field("frames", frames);
            }
            Self::If {
                then, otherwise, ..
            } => {
                let _ = out.field("then", then).field("otherwise", otherwise);
            }
            Self::LoopUntil { body, .. } => {
                let _ = out.field("body", body);
            }
            Self::Fork { branches, .. } => {
                let _ = out.field("branches", branches);
            }
            Self::Join { token, .. } => {
                let _ = out.field("token", token);
            }
            Self::Do { .. } => {}
        }
        out.finish()
    }
}

/// Step discriminant used in diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// [`Step::Wait`].
    Wait,
    /// [`Step::Do`].
    Do,
    /// [`Step::If`].
    If,
    /// [`Step::LoopUntil`].
    LoopUntil,
    /// [`Step::Fork`].
    Fork,
    /// [`Step::Join`].
    Join,
    /// The per-tick step budget, reported when it is exhausted.
    Limit,
    /// Restored runner state as a whole, reported when it cannot be resumed.
    State,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Wait => "wait",
            Self::Do => "do",
            Self::If => "if",
            Self::LoopUntil => "loopUntil",
            Self::Fork => "fork",
            Self::Join => "join",
            Self::Limit => "limit",
            Self::State => "state",
        };
        f.write_str(name)
    }
}

/// Suspends for `frames` ticks, resuming on the tick after the last one.
///
/// `wait(0)` does not suspend: execution continues with the next step in the
/// same tick.
#[must_use]
pub fn wait(frames: u32) -> Step {
    Step::Wait {
        frames,
        label: None,
    }
}

/// Runs `action` once when reached.
#[must_use]
pub fn do_step<F>(action: F) -> Step
where
    F: FnMut(&mut TickContext<'_>) -> anyhow::Result<()> + 'static,
{
    Step::Do {
        action: Box::new(action),
        label: None,
    }
}

/// Runs `then` when `predicate` holds and `otherwise` when it does not.
#[must_use]
pub fn if_step<P>(predicate: P, then: Vec<Step>, otherwise: Vec<Step>) -> Step
where
    P: FnMut(&mut TickContext<'_>) -> bool + 'static,
{
    Step::If {
        predicate: Box::new(predicate),
        then,
        otherwise,
        label: None,
    }
}

/// Runs `body` repeatedly until `predicate` holds.
#[must_use]
pub fn loop_until<P>(predicate: P, body: Vec<Step>) -> Step
where
    P: FnMut(&mut TickContext<'_>) -> bool + 'static,
{
    Step::LoopUntil {
        predicate: Box::new(predicate),
        body,
        label: None,
    }
}

/// Runs every branch concurrently and continues once all finish.
#[must_use]
pub fn fork(branches: Vec<Vec<Step>>) -> Step {
    Step::Fork {
        branches,
        label: None,
    }
}

/// Waits on the fork group identified by `token`.
///
/// Tokens are handed out per task in launch order, starting at zero. A fork
/// already joins its own group, so explicit joins are rarely needed; joining
/// an unknown or finished token does nothing.
#[must_use]
pub fn join(token: u32) -> Step {
    Step::Join { token, label: None }
}
