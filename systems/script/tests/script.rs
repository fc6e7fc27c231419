use std::{cell::RefCell, rc::Rc};

use danmaku_core::{EventBus, Rng, TickContext};
use danmaku_system_script::{
    do_step, fork, if_step, join, loop_until, wait, RunnerConfig, ScriptError, ScriptFault,
    ScriptRunner, Step, StepKind, TaskStatus,
};

type Trace = Rc<RefCell<Vec<(u64, &'static str)>>>;

struct Harness {
    rng: Rng,
    events: EventBus,
    frame: u64,
}

impl Harness {
    fn new() -> Self {
        Self {
            rng: Rng::new(2024_u32),
            events: EventBus::new(),
            frame: 0,
        }
    }

    fn tick(&mut self, runner: &mut ScriptRunner) -> Result<bool, ScriptError> {
        let mut ctx = TickContext::new(
            self.frame,
            self.frame as f64 / 60.0,
            &mut self.rng,
            &mut self.events,
        );
        let result = runner.update(&mut ctx);
        self.frame += 1;
        result
    }
}

fn record(trace: &Trace, name: &'static str) -> Step {
    let trace = Rc::clone(trace);
    do_step(move |ctx| {
        trace.borrow_mut().push((ctx.frame(), name));
        Ok(())
    })
    .labeled(name)
}

#[test]
fn steps_run_in_order_and_wait_suspends_whole_ticks() {
    let trace = Trace::default();
    let mut runner = ScriptRunner::new(vec![
        record(&trace, "a"),
        record(&trace, "b"),
        wait(2),
        record(&trace, "c"),
    ]);
    let mut harness = Harness::new();

    assert!(!harness.tick(&mut runner).expect("tick 0"));
    assert!(!harness.tick(&mut runner).expect("tick 1"));
    assert!(harness.tick(&mut runner).expect("tick 2"));

    assert_eq!(*trace.borrow(), vec![(0, "a"), (0, "b"), (2, "c")]);
    let metrics = runner.metrics();
    assert_eq!(metrics.counters.do_calls, 3);
    assert_eq!(metrics.counters.wait_frames, 2);
    assert!(metrics.done);
}

#[test]
fn zero_frame_wait_does_not_suspend() {
    let trace = Trace::default();
    let mut runner = ScriptRunner::new(vec![record(&trace, "a"), wait(0), record(&trace, "b")]);
    let mut harness = Harness::new();

    assert!(harness.tick(&mut runner).expect("tick"));
    assert_eq!(*trace.borrow(), vec![(0, "a"), (0, "b")]);
}

#[test]
fn fork_waits_for_the_slowest_branch() {
    let trace = Trace::default();
    let mut runner = ScriptRunner::new(vec![
        fork(vec![
            vec![wait(1), record(&trace, "left")],
            vec![wait(3), record(&trace, "right")],
        ]),
        record(&trace, "after"),
    ]);
    let mut harness = Harness::new();

    assert!(!harness.tick(&mut runner).expect("tick 0"));
    assert_eq!(runner.status(), TaskStatus::AwaitingJoin);
    assert!(!harness.tick(&mut runner).expect("tick 1"));
    assert!(!harness.tick(&mut runner).expect("tick 2"));
    assert!(harness.tick(&mut runner).expect("tick 3"));

    assert_eq!(
        *trace.borrow(),
        vec![(1, "left"), (3, "right"), (3, "after")]
    );
    assert_eq!(runner.status(), TaskStatus::Done);
    let counts = runner.executed_label_counts();
    assert_eq!(counts.get("left"), Some(&1));
    assert_eq!(counts.get("right"), Some(&1));
    assert_eq!(counts.get("after"), Some(&1));
    let metrics = runner.metrics();
    assert_eq!(metrics.counters.fork_launches, 1);
    assert_eq!(metrics.counters.join_wait_frames, 3);
}

#[test]
fn joining_an_unknown_token_is_a_no_op() {
    let trace = Trace::default();
    let mut runner = ScriptRunner::new(vec![join(7), record(&trace, "a")]);
    let mut harness = Harness::new();

    assert!(harness.tick(&mut runner).expect("tick"));
    assert_eq!(*trace.borrow(), vec![(0, "a")]);
}

#[test]
fn abort_during_wait_stops_everything() {
    let trace = Trace::default();
    let mut runner = ScriptRunner::new(vec![record(&trace, "a"), wait(5), record(&trace, "b")]);
    let mut harness = Harness::new();

    assert!(!harness.tick(&mut runner).expect("tick 0"));
    runner.abort();
    assert!(runner.is_done());

    for _ in 0..10 {
        assert!(harness.tick(&mut runner).expect("aborted tick"));
    }
    assert_eq!(*trace.borrow(), vec![(0, "a")]);
    assert!(runner.is_aborted());
    assert_eq!(runner.status(), TaskStatus::Done);
}

#[test]
fn runaway_loop_trips_the_step_limit() {
    let trace = Trace::default();
    let mut runner = ScriptRunner::new(vec![loop_until(
        |_| false,
        vec![record(&trace, "spin")],
    )]);
    let mut harness = Harness::new();

    let error = harness.tick(&mut runner).expect_err("loop never yields");
    assert_eq!(error.step_kind, StepKind::Limit);
    assert_eq!(error.frame, 0);
    assert!(matches!(
        error.cause,
        ScriptFault::RunawayExpansion {
            limit: 100,
            last_step: StepKind::LoopUntil,
        }
    ));
    assert_eq!(trace.borrow().len(), 50);
}

#[test]
fn step_limit_is_configurable() {
    let trace = Trace::default();
    let mut runner = ScriptRunner::with_config(
        vec![loop_until(|_| false, vec![record(&trace, "spin")])],
        RunnerConfig::new(10),
    );
    let mut harness = Harness::new();

    let error = harness.tick(&mut runner).expect_err("loop never yields");
    assert_eq!(error.step_kind, StepKind::Limit);
    assert_eq!(trace.borrow().len(), 5);
}

#[test]
fn loop_runs_one_body_iteration_per_false_predicate() {
    let trace = Trace::default();
    let mut runner = ScriptRunner::new(vec![
        loop_until(
            |ctx| ctx.frame() >= 3,
            vec![record(&trace, "spin"), wait(1)],
        ),
        record(&trace, "done"),
    ]);
    let mut harness = Harness::new();

    while !harness.tick(&mut runner).expect("tick") {}

    assert_eq!(
        *trace.borrow(),
        vec![(0, "spin"), (1, "spin"), (2, "spin"), (3, "done")]
    );
    assert_eq!(runner.metrics().counters.loop_iterations, 3);
}

#[test]
fn failing_action_reports_its_position() {
    let mut runner = ScriptRunner::new(vec![
        wait(0),
        do_step(|_| anyhow::bail!("emitter missing")).labeled("spawn"),
    ]);
    let mut harness = Harness::new();

    let error = harness.tick(&mut runner).expect_err("action fails");
    assert_eq!(error.step_kind, StepKind::Do);
    assert_eq!(error.label.as_deref(), Some("spawn"));
    assert_eq!(error.index, 1);
    assert!(matches!(error.cause, ScriptFault::Action(_)));
}

#[test]
fn predicates_and_actions_account_rng_draws() {
    let trace = Trace::default();
    let mut runner = ScriptRunner::new(vec![
        if_step(
            |ctx| ctx.rng().next_unit() < 2.0,
            vec![record(&trace, "then")],
            vec![record(&trace, "else")],
        ),
        do_step(|ctx| {
            let _ = ctx.rng().int(1, 6)?;
            let _ = ctx.rng().int(1, 6)?;
            Ok(())
        }),
    ]);
    let mut harness = Harness::new();

    assert!(harness.tick(&mut runner).expect("tick"));
    assert_eq!(*trace.borrow(), vec![(0, "then")]);
    assert_eq!(runner.rng_draws(), 3);
    assert_eq!(harness.rng.draws(), 3);
    assert_eq!(runner.metrics().counters.if_evaluations, 1);
}
