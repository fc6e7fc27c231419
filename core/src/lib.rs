#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the danmaku simulation substrate.
//!
//! This crate defines everything that crosses a boundary between the
//! scheduler, the systems it drives, and the host: the deterministic [`Rng`],
//! the [`EventBus`] and its typed [`Event`] surface, the per-tick
//! [`TickContext`] and [`System`] contract, pooled allocation, and the
//! versioned [`Snapshot`] format with its upgrade chain. Systems receive a
//! context each fixed step, draw randomness and publish notifications only
//! through it, and report their counters into snapshot summaries.

mod context;
mod events;
mod pool;
mod registry;
mod rng;
mod snapshot;
mod state;

pub use context::{System, TickContext};
pub use events::{Event, EventBus, EventKind, Handler, Subscription};
pub use pool::{Pool, PoolConfig, PoolSlot, PoolStats};
pub use registry::{ContentRegistry, RegistrySnapshot, StaticRegistry, VersionMap};
pub use rng::{Rng, RngError, RngSeed};
pub use snapshot::{
    create_snapshot, upgrade_snapshot, validate_snapshot_registries, BossSummary,
    GrazeSummary, RegistryDivergence, RestorePoint, RunSummary, Snapshot, SnapshotError,
    LEGACY_SNAPSHOT_VERSION, SNAPSHOT_VERSION,
};
pub use state::{
    FrameState, PatternState, RunnerState, ScriptMetrics, TaskState, SCRIPT_STATE_VERSION,
};
