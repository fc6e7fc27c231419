use std::collections::BTreeMap;

use danmaku_core::{EventBus, Rng, RunnerState, ScriptMetrics, TickContext};
use danmaku_system_script::{
    do_step, fork, if_step, loop_until, wait, ScriptFault, ScriptRunner, Step, StepKind,
};

const SEED: u32 = 0x5eed_0042;
const MAX_TICKS: u64 = 64;

fn draw(label: &str) -> Step {
    do_step(|ctx| {
        let _ = ctx.rng().int(0, 359)?;
        Ok(())
    })
    .labeled(label)
}

/// Two levels of forks, a frame-driven loop and a random branch.
fn program() -> Vec<Step> {
    vec![
        draw("intro"),
        fork(vec![
            vec![
                wait(1),
                draw("left"),
                fork(vec![
                    vec![wait(2), draw("inner-a")],
                    vec![draw("inner-b"), wait(1), draw("inner-b")],
                ]),
                draw("left-tail"),
            ],
            vec![loop_until(
                |ctx| ctx.frame() >= 4,
                vec![draw("spin"), wait(1)],
            )],
        ]),
        if_step(
            |ctx| ctx.rng().next_unit() < 0.5,
            vec![draw("heads")],
            vec![draw("tails")],
        ),
        wait(2),
        draw("finale"),
    ]
}

#[derive(Debug, PartialEq)]
struct Outcome {
    ticks: u64,
    rng_state: u32,
    rng_draws: u64,
    labels: BTreeMap<String, u64>,
    metrics: ScriptMetrics,
}

struct Harness {
    rng: Rng,
    events: EventBus,
    frame: u64,
}

impl Harness {
    fn new() -> Self {
        Self {
            rng: Rng::new(SEED),
            events: EventBus::new(),
            frame: 0,
        }
    }

    fn tick(&mut self, runner: &mut ScriptRunner) -> bool {
        let mut ctx = TickContext::new(self.frame, 0.0, &mut self.rng, &mut self.events);
        let done = runner.update(&mut ctx).expect("script tick");
        self.frame += 1;
        done
    }

    fn outcome(&self, runner: &ScriptRunner) -> Outcome {
        Outcome {
            ticks: self.frame,
            rng_state: self.rng.snapshot(),
            rng_draws: runner.rng_draws(),
            labels: runner.executed_label_counts().clone(),
            metrics: runner.metrics().counters,
        }
    }
}

fn reference() -> Outcome {
    let mut runner = ScriptRunner::new(program());
    let mut harness = Harness::new();
    while !harness.tick(&mut runner) {
        assert!(harness.frame < MAX_TICKS, "reference run never finished");
    }
    harness.outcome(&runner)
}

fn through_json(state: &RunnerState) -> RunnerState {
    let json = serde_json::to_string(state).expect("encode runner state");
    serde_json::from_str(&json).expect("decode runner state")
}

#[test]
fn reference_run_executes_every_label() {
    let outcome = reference();

    assert_eq!(outcome.labels.get("intro"), Some(&1));
    assert_eq!(outcome.labels.get("left"), Some(&1));
    assert_eq!(outcome.labels.get("inner-a"), Some(&1));
    assert_eq!(outcome.labels.get("inner-b"), Some(&2));
    assert_eq!(outcome.labels.get("left-tail"), Some(&1));
    assert_eq!(outcome.labels.get("spin"), Some(&4));
    assert_eq!(outcome.labels.get("finale"), Some(&1));
    let coin = outcome.labels.get("heads").or(outcome.labels.get("tails"));
    assert_eq!(coin, Some(&1));
    assert_eq!(outcome.metrics.fork_launches, 2);
    assert_eq!(outcome.rng_draws, outcome.metrics.rng_draws);
    // one draw per action plus the coin flip
    assert_eq!(outcome.rng_draws, 13);
}

#[test]
fn resuming_at_any_tick_matches_the_uninterrupted_run() {
    let expected = reference();

    for split in 0..expected.ticks {
        let mut runner = ScriptRunner::new(program());
        let mut harness = Harness::new();
        for _ in 0..split {
            assert!(!harness.tick(&mut runner));
        }

        let state = through_json(&runner.serialize());
        let mut resumed = ScriptRunner::restore(program(), state).expect("restore runner");
        while !harness.tick(&mut resumed) {
            assert!(harness.frame < MAX_TICKS, "resumed run never finished");
        }

        assert_eq!(harness.outcome(&resumed), expected, "split at tick {split}");
    }
}

#[test]
fn restoring_at_every_tick_boundary_matches_the_uninterrupted_run() {
    let expected = reference();

    let mut runner = ScriptRunner::new(program());
    let mut harness = Harness::new();
    loop {
        let state = through_json(&runner.serialize());
        runner = ScriptRunner::restore(program(), state).expect("restore runner");
        if harness.tick(&mut runner) {
            break;
        }
        assert!(harness.frame < MAX_TICKS, "run never finished");
    }

    assert_eq!(harness.outcome(&runner), expected);
}

#[test]
fn state_from_another_program_is_rejected() {
    let runner = ScriptRunner::new(program());
    let state = runner.serialize();

    let error = ScriptRunner::restore(vec![wait(1), draw("other")], state)
        .expect_err("different program");
    assert!(error.is_determinism_violation());
    assert_eq!(error.step_kind, StepKind::State);
}

#[test]
fn corrupt_positions_are_rejected() {
    let mut runner = ScriptRunner::new(program());
    let mut harness = Harness::new();
    let _ = harness.tick(&mut runner);

    let mut state = runner.serialize();
    state.task.frames[0].block = 999;
    let error = ScriptRunner::restore(program(), state).expect_err("unknown block");
    assert!(matches!(error.cause, ScriptFault::CorruptState(_)));

    let mut state = runner.serialize();
    state.task.forks.clear();
    let error = ScriptRunner::restore(program(), state).expect_err("dangling join");
    assert!(matches!(error.cause, ScriptFault::CorruptState(_)));
}
