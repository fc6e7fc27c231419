//! Interpreter for one script task and its forked children.

use std::collections::BTreeMap;

use danmaku_core::{FrameState, ScriptMetrics, TaskState, TickContext};

use crate::{
    compile::{Callbacks, Code, Instruction, Node},
    error::{ScriptError, ScriptFault},
    step::StepKind,
};

enum Flow {
    Continue,
    Suspend,
}

/// Program counter stack plus the bookkeeping a task carries between ticks.
#[derive(Debug)]
pub(crate) struct Task {
    frames: Vec<FrameState>,
    wait_remaining: Option<u32>,
    done: bool,
    aborted: bool,
    next_fork_token: u32,
    forks: BTreeMap<u32, Vec<Task>>,
    label_counts: BTreeMap<String, u64>,
    metrics: ScriptMetrics,
}

impl Task {
    pub(crate) fn new(block: usize) -> Self {
        Self {
            frames: vec![FrameState {
                block,
                pc: 0,
                joining: None,
            }],
            wait_remaining: None,
            done: false,
            aborted: false,
            next_fork_token: 0,
            forks: BTreeMap::new(),
            label_counts: BTreeMap::new(),
            metrics: ScriptMetrics::default(),
        }
    }

    pub(crate) fn abort(&mut self) {
        self.aborted = true;
    }

    pub(crate) const fn is_done(&self) -> bool {
        self.done || self.aborted
    }

    pub(crate) const fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub(crate) fn is_joining(&self) -> bool {
        !self.forks.is_empty()
    }

    pub(crate) fn position(&self) -> Option<FrameState> {
        self.frames.last().copied()
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) const fn metrics(&self) -> &ScriptMetrics {
        &self.metrics
    }

    pub(crate) fn label_counts(&self) -> &BTreeMap<String, u64> {
        &self.label_counts
    }

    /// Runs until the task suspends or finishes. Returns whether it finished.
    pub(crate) fn poll(
        &mut self,
        code: &Code,
        callbacks: &mut Callbacks,
        ctx: &mut TickContext<'_>,
        limit: usize,
    ) -> Result<bool, ScriptError> {
        if self.aborted {
            self.done = true;
        }
        if self.done {
            return Ok(true);
        }

        let mut executed = 0;
        loop {
            let Some(frame) = self.frames.last().copied() else {
                self.done = true;
                return Ok(true);
            };
            let block = code.block(frame.block).ok_or_else(|| ScriptError {
                step_kind: StepKind::State,
                label: None,
                index: frame.pc,
                frame: ctx.frame(),
                cause: ScriptFault::CorruptState(format!("unknown block {}", frame.block)),
            })?;
            let Some(instruction) = block.get(frame.pc) else {
                let _ = self.frames.pop();
                continue;
            };

            if executed == limit {
                return Err(ScriptError {
                    step_kind: StepKind::Limit,
                    label: instruction.label.clone(),
                    index: frame.pc,
                    frame: ctx.frame(),
                    cause: ScriptFault::RunawayExpansion {
                        limit,
                        last_step: instruction.node.kind(),
                    },
                });
            }
            executed += 1;
            self.metrics.steps += 1;

            match self.execute(instruction, frame, code, callbacks, ctx, limit)? {
                Flow::Continue => {}
                Flow::Suspend => return Ok(false),
            }
        }
    }

    fn execute(
        &mut self,
        instruction: &Instruction,
        frame: FrameState,
        code: &Code,
        callbacks: &mut Callbacks,
        ctx: &mut TickContext<'_>,
        limit: usize,
    ) -> Result<Flow, ScriptError> {
        match &instruction.node {
            Node::Wait { frames } => {
                let remaining = self.wait_remaining.unwrap_or(*frames);
                if remaining > 0 {
                    self.wait_remaining = Some(remaining - 1);
                    self.metrics.wait_frames += 1;
                    return Ok(Flow::Suspend);
                }
                self.wait_remaining = None;
                self.advance();
            }
            Node::Do { action } => {
                let before = ctx.rng().draws();
                let result = (callbacks.actions[*action])(ctx);
                self.metrics.rng_draws += ctx.rng().draws().saturating_sub(before);
                self.metrics.do_calls += 1;
                result.map_err(|error| ScriptError {
                    step_kind: StepKind::Do,
                    label: instruction.label.clone(),
                    index: frame.pc,
                    frame: ctx.frame(),
                    cause: ScriptFault::Action(error),
                })?;
                if let Some(label) = &instruction.label {
                    *self.label_counts.entry(label.clone()).or_default() += 1;
                }
                self.advance();
            }
            Node::If {
                predicate,
                then,
                otherwise,
            } => {
                let holds = self.evaluate(callbacks, *predicate, ctx);
                self.metrics.if_evaluations += 1;
                self.advance();
                self.enter(if holds { *then } else { *otherwise });
            }
            Node::LoopUntil { predicate, body } => {
                if self.evaluate(callbacks, *predicate, ctx) {
                    self.advance();
                } else {
                    self.metrics.loop_iterations += 1;
                    self.enter(*body);
                }
            }
            Node::Fork { branches } => {
                let token = match frame.joining {
                    Some(token) => token,
                    None => self.launch(branches),
                };
                return self.join(token, code, callbacks, ctx, limit);
            }
            Node::Join { token } => return self.join(*token, code, callbacks, ctx, limit),
        }
        Ok(Flow::Continue)
    }

    fn evaluate(
        &mut self,
        callbacks: &mut Callbacks,
        predicate: usize,
        ctx: &mut TickContext<'_>,
    ) -> bool {
        let before = ctx.rng().draws();
        let holds = (callbacks.predicates[predicate])(ctx);
        self.metrics.rng_draws += ctx.rng().draws().saturating_sub(before);
        holds
    }

    fn launch(&mut self, branches: &[usize]) -> u32 {
        let token = self.next_fork_token;
        self.next_fork_token += 1;
        let children = branches.iter().map(|block| Task::new(*block)).collect();
        let _ = self.forks.insert(token, children);
        self.metrics.fork_launches += 1;
        if let Some(top) = self.frames.last_mut() {
            top.joining = Some(token);
        }
        token
    }

    fn join(
        &mut self,
        token: u32,
        code: &Code,
        callbacks: &mut Callbacks,
        ctx: &mut TickContext<'_>,
        limit: usize,
    ) -> Result<Flow, ScriptError> {
        let Some(children) = self.forks.get_mut(&token) else {
            self.advance();
            return Ok(Flow::Continue);
        };

        let mut all_done = true;
        for child in children.iter_mut() {
            if !child.poll(code, callbacks, ctx, limit)? {
                all_done = false;
            }
        }

        if !all_done {
            self.metrics.join_wait_frames += 1;
            return Ok(Flow::Suspend);
        }

        if let Some(children) = self.forks.remove(&token) {
            for child in children {
                self.absorb(child);
            }
        }
        self.advance();
        Ok(Flow::Continue)
    }

    fn absorb(&mut self, child: Task) {
        for (label, count) in child.label_counts {
            *self.label_counts.entry(label).or_default() += count;
        }
        self.metrics.absorb(&child.metrics);
    }

    fn enter(&mut self, block: usize) {
        self.frames.push(FrameState {
            block,
            pc: 0,
            joining: None,
        });
    }

    fn advance(&mut self) {
        if let Some(top) = self.frames.last_mut() {
            top.pc += 1;
            top.joining = None;
        }
    }

    pub(crate) fn to_state(&self) -> TaskState {
        TaskState {
            frames: self.frames.clone(),
            wait_remaining: self.wait_remaining,
            done: self.done,
            aborted: self.aborted,
            next_fork_token: self.next_fork_token,
            forks: self
                .forks
                .iter()
                .map(|(token, children)| (*token, children.iter().map(Task::to_state).collect()))
                .collect(),
            label_counts: self.label_counts.clone(),
            metrics: self.metrics,
        }
    }

    /// Rebuilds a task after checking that every position in `state` exists in `code`.
    pub(crate) fn from_state(state: TaskState, code: &Code) -> Result<Self, ScriptFault> {
        let top = state.frames.len().checked_sub(1);
        for (depth, frame) in state.frames.iter().enumerate() {
            let block = code.block(frame.block).ok_or_else(|| {
                ScriptFault::CorruptState(format!(
                    "frame {depth} references block {} of {}",
                    frame.block,
                    code.block_count()
                ))
            })?;
            if frame.pc > block.len() {
                return Err(ScriptFault::CorruptState(format!(
                    "frame {depth} is at step {} of a {}-step block",
                    frame.pc,
                    block.len()
                )));
            }
            if let Some(token) = frame.joining {
                let at_fork = matches!(
                    block.get(frame.pc).map(|instruction| &instruction.node),
                    Some(Node::Fork { .. })
                );
                if !at_fork || Some(depth) != top || !state.forks.contains_key(&token) {
                    return Err(ScriptFault::CorruptState(format!(
                        "frame {depth} joins fork {token} that is not pending"
                    )));
                }
            }
        }

        if state.wait_remaining.is_some() {
            let at_wait = state.frames.last().is_some_and(|frame| {
                matches!(
                    code.block(frame.block)
                        .and_then(|block| block.get(frame.pc))
                        .map(|instruction| &instruction.node),
                    Some(Node::Wait { .. })
                )
            });
            if !at_wait {
                return Err(ScriptFault::CorruptState(
                    "wait latch set away from a wait step".to_owned(),
                ));
            }
        }

        if let Some(token) = state.forks.keys().find(|token| **token >= state.next_fork_token) {
            return Err(ScriptFault::CorruptState(format!(
                "fork {token} was never handed out"
            )));
        }

        let mut forks = BTreeMap::new();
        for (token, children) in state.forks {
            let children = children
                .into_iter()
                .map(|child| Task::from_state(child, code))
                .collect::<Result<Vec<_>, _>>()?;
            let _ = forks.insert(token, children);
        }

        Ok(Self {
            frames: state.frames,
            wait_remaining: state.wait_remaining,
            done: state.done,
            aborted: state.aborted,
            next_fork_token: state.next_fork_token,
            forks,
            label_counts: state.label_counts,
            metrics: state.metrics,
        })
    }
}
