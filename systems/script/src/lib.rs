#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Cooperative script engine for timed, branching, concurrent patterns.
//!
//! Scripts are written as a tree of [`Step`]s using the builder functions in
//! this crate and compiled once into flat blocks. A [`ScriptRunner`] then walks
//! the compiled program with an explicit frame stack, one tick per
//! [`ScriptRunner::update`], suspending on waits and unfinished joins. Because
//! the program never changes after compilation, a runner's position is plain
//! data that can be serialized into a snapshot and restored onto a freshly
//! built copy of the same program.
//!
//! ```
//! use danmaku_core::{EventBus, Rng, TickContext};
//! use danmaku_system_script::{do_step, wait, ScriptRunner};
//!
//! let mut runner = ScriptRunner::new(vec![
//!     do_step(|_| Ok(())).labeled("open"),
//!     wait(1),
//!     do_step(|_| Ok(())).labeled("close"),
//! ]);
//! let mut rng = Rng::new(3_u32);
//! let mut events = EventBus::new();
//! let mut frame = 0;
//! while !runner.is_done() {
//!     let mut ctx = TickContext::new(frame, 0.0, &mut rng, &mut events);
//!     let _ = runner.update(&mut ctx).expect("script runs");
//!     frame += 1;
//! }
//! assert_eq!(frame, 2);
//! ```

mod compile;
mod error;
mod runner;
mod step;
mod task;

pub use error::{ScriptError, ScriptFault};
pub use runner::{RunnerConfig, RunnerMetrics, ScriptRunner, TaskStatus};
pub use step::{do_step, fork, if_step, join, loop_until, wait, Action, Predicate, Step, StepKind};
