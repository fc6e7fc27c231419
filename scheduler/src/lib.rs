#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Fixed-step orchestrator that drives registered systems deterministically.
//!
//! The scheduler owns the generator, the event bus and the time accumulator.
//! Hosts feed it variable wall-clock deltas through [`Scheduler::advance`]; it
//! consumes them in whole fixed steps so that identical totals of elapsed time
//! always produce identical simulations, however the deltas were chunked.

mod config;
mod profiler;

use std::time::Instant;

use danmaku_core::{
    create_snapshot, upgrade_snapshot, validate_snapshot_registries, ContentRegistry, Event,
    EventBus, RegistryDivergence, RestorePoint, Rng, RunSummary, Snapshot, StaticRegistry, System,
    TickContext,
};
use serde::Serialize;
use thiserror::Error;

pub use config::{ConfigurationError, SchedulerConfig};
pub use profiler::SystemTiming;

use profiler::Profiler;

/// Failures surfaced by scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler or one of its registrations is misconfigured.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// A resumed snapshot does not match the live content registry.
    #[error("determinism violation")]
    Determinism(#[from] RegistryDivergence),
    /// A system hook failed; the tick was abandoned.
    #[error("system `{system}` failed during {phase} at frame {frame}")]
    System {
        /// Identifier of the failing system.
        system: String,
        /// Hook that failed.
        phase: &'static str,
        /// Frame being processed.
        frame: u64,
        /// Error returned by the hook.
        #[source]
        source: anyhow::Error,
    },
}

/// Controls what [`Scheduler::resume`] does beyond repositioning time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResumeOptions {
    /// Reject snapshots whose registry hash differs from the live registry.
    pub validate_registry: bool,
    /// Hand the snapshot summary to every system's restore hook.
    pub restore_systems: bool,
}

impl Default for ResumeOptions {
    fn default() -> Self {
        Self {
            validate_registry: true,
            restore_systems: true,
        }
    }
}

/// Point-in-time view of scheduler progress.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerMetrics {
    /// Frames processed, including any restored offset.
    pub frame: u64,
    /// Simulated seconds elapsed.
    pub time: f64,
    /// Ticks executed by this instance.
    pub ticks: u64,
    /// Unconsumed time in the accumulator.
    pub accumulator: f64,
    /// Whether update timing is enabled.
    pub profiling: bool,
    /// Per-system timings gathered while profiling.
    pub systems: Vec<SystemTiming>,
}

struct Entry {
    system: Box<dyn System>,
    order: i32,
    sequence: u64,
    initialized: bool,
}

/// Deterministic fixed-step driver for a set of [`System`]s.
pub struct Scheduler {
    config: SchedulerConfig,
    rng: Rng,
    events: EventBus,
    registry: Box<dyn ContentRegistry>,
    entries: Vec<Entry>,
    next_sequence: u64,
    accumulator: f64,
    frame: u64,
    time: f64,
    ticks: u64,
    profiler: Profiler,
}

impl Scheduler {
    /// Creates a scheduler seeded from `config`.
    ///
    /// Fails when the configuration carries no seed or an unusable step.
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigurationError> {
        let seed = config
            .seed()
            .cloned()
            .ok_or(ConfigurationError::MissingSeed)?;
        Self::with_rng(Rng::new(seed), config)
    }

    /// Creates a scheduler around a pre-built generator. Any seed in `config`
    /// is ignored.
    pub fn with_rng(rng: Rng, config: SchedulerConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let profiler = Profiler::new(config.profile());
        Ok(Self {
            config,
            rng,
            events: EventBus::new(),
            registry: Box::new(StaticRegistry::new()),
            entries: Vec::new(),
            next_sequence: 0,
            accumulator: 0.0,
            frame: 0,
            time: 0.0,
            ticks: 0,
            profiler,
        })
    }

    /// Replaces the content registry that snapshots are stamped and validated against.
    #[must_use]
    pub fn with_registry<R>(mut self, registry: R) -> Self
    where
        R: ContentRegistry + 'static,
    {
        self.registry = Box::new(registry);
        self
    }

    /// Adds a system, keeping the run order sorted by `(order, registration)`.
    pub fn register<S>(&mut self, system: S) -> Result<(), ConfigurationError>
    where
        S: System + 'static,
    {
        if self
            .entries
            .iter()
            .any(|entry| entry.system.id() == system.id())
        {
            return Err(ConfigurationError::DuplicateSystemId {
                id: system.id().to_owned(),
            });
        }

        let order = system.order();
        log::debug!("registering system `{}` with order {order}", system.id());
        self.entries.push(Entry {
            system: Box::new(system),
            order,
            sequence: self.next_sequence,
            initialized: false,
        });
        self.next_sequence += 1;
        self.entries
            .sort_by_key(|entry| (entry.order, entry.sequence));
        Ok(())
    }

    /// Runs the `init` hook of every system that has not been initialized yet.
    pub fn init(&mut self) -> Result<(), SchedulerError> {
        let (frame, time) = (self.frame, self.time);
        for entry in self.entries.iter_mut().filter(|entry| !entry.initialized) {
            let mut ctx = TickContext::new(frame, time, &mut self.rng, &mut self.events);
            entry
                .system
                .init(&mut ctx)
                .map_err(|source| SchedulerError::System {
                    system: entry.system.id().to_owned(),
                    phase: "init",
                    frame,
                    source,
                })?;
            entry.initialized = true;
        }
        Ok(())
    }

    /// Accumulates `elapsed` seconds and runs every whole fixed step it covers.
    ///
    /// Negative or non-finite deltas contribute nothing. Returns the number of
    /// ticks processed.
    pub fn advance(&mut self, elapsed: f64) -> Result<u32, SchedulerError> {
        if elapsed.is_finite() && elapsed > 0.0 {
            self.accumulator += elapsed;
        }

        let step = self.config.fixed_step();
        let epsilon = self.config.epsilon();
        let mut ticks = 0;
        while self.accumulator + epsilon >= step {
            self.accumulator -= step;
            self.tick()?;
            ticks += 1;
        }
        self.accumulator = self.accumulator.max(0.0);
        Ok(ticks)
    }

    /// Runs exactly one fixed step, bypassing the accumulator.
    pub fn step(&mut self) -> Result<(), SchedulerError> {
        self.tick()
    }

    fn tick(&mut self) -> Result<(), SchedulerError> {
        let step = self.config.fixed_step();
        let (frame, time) = (self.frame, self.time);

        for entry in &mut self.entries {
            let started = self.profiler.enabled().then(Instant::now);
            let mut ctx = TickContext::new(frame, time, &mut self.rng, &mut self.events);
            entry
                .system
                .update(step, &mut ctx)
                .map_err(|source| SchedulerError::System {
                    system: entry.system.id().to_owned(),
                    phase: "update",
                    frame,
                    source,
                })?;

            if let Some(started) = started {
                let micros = self.profiler.record(entry.system.id(), started.elapsed());
                self.events.emit(&Event::PerfSample {
                    system: entry.system.id().to_owned(),
                    frame,
                    micros,
                });
            }
        }

        self.frame += 1;
        self.time += step;
        self.ticks += 1;
        self.events.emit(&Event::Frame {
            frame: self.frame,
            time: self.time,
        });
        Ok(())
    }

    /// Gathers the summary every system reports.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::current();
        for entry in &self.entries {
            entry.system.summarize(&mut summary);
        }
        summary
    }

    /// Captures the current position, registry identity and system summary.
    pub fn snapshot(&mut self) -> Snapshot {
        let snapshot = create_snapshot(
            self.restore_point(),
            self.registry.as_ref(),
            self.summary(),
        );
        self.events.emit(&Event::Snapshot { frame: self.frame });
        snapshot
    }

    /// Frame, time and generator state at this instant.
    #[must_use]
    pub fn restore_point(&self) -> RestorePoint {
        RestorePoint {
            frame: self.frame,
            time: self.time,
            rng_state: self.rng.snapshot(),
        }
    }

    /// Repositions frame, time and generator. System state is left untouched.
    pub fn restore(&mut self, point: RestorePoint) {
        log::debug!(
            "restoring scheduler to frame {} (time {:.6})",
            point.frame,
            point.time
        );
        self.frame = point.frame;
        self.time = point.time;
        self.accumulator = 0.0;
        self.rng.restore(point.rng_state);
    }

    /// Upgrades `snapshot`, optionally validates it against the live registry,
    /// and restores the scheduler (and optionally its systems) from it.
    ///
    /// Returns the upgraded snapshot.
    pub fn resume(
        &mut self,
        snapshot: Snapshot,
        options: ResumeOptions,
    ) -> Result<Snapshot, SchedulerError> {
        let snapshot = upgrade_snapshot(snapshot);
        if options.validate_registry {
            if let Err(divergence) =
                validate_snapshot_registries(&snapshot, self.registry.as_ref())
            {
                log::error!("refusing to resume frame {}: {divergence}", snapshot.frame);
                return Err(divergence.into());
            }
        }

        self.restore(snapshot.restore_point());
        if options.restore_systems {
            self.restore_systems(&snapshot.summary)?;
        }
        Ok(snapshot)
    }

    /// Hands `summary` to every system's restore hook in run order.
    pub fn restore_systems(&mut self, summary: &RunSummary) -> Result<(), SchedulerError> {
        let frame = self.frame;
        for entry in &mut self.entries {
            entry
                .system
                .restore_summary(summary)
                .map_err(|source| SchedulerError::System {
                    system: entry.system.id().to_owned(),
                    phase: "restore",
                    frame,
                    source,
                })?;
        }
        Ok(())
    }

    /// Turns per-system update timing and `PerfSample` events on or off.
    pub fn enable_profiler(&mut self, enabled: bool) {
        self.profiler.set_enabled(enabled);
    }

    /// Progress counters and profiler timings.
    #[must_use]
    pub fn metrics(&self) -> SchedulerMetrics {
        SchedulerMetrics {
            frame: self.frame,
            time: self.time,
            ticks: self.ticks,
            accumulator: self.accumulator,
            profiling: self.profiler.enabled(),
            systems: self.profiler.timings().to_vec(),
        }
    }

    /// Tears systems down in reverse run order and drops every subscription.
    pub fn teardown(&mut self) {
        for entry in self.entries.iter_mut().rev() {
            log::debug!("tearing down system `{}`", entry.system.id());
            entry.system.teardown();
        }
        self.events.clear();
    }

    /// Event bus owned by the scheduler, for host subscriptions and host events.
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Generator driving the simulation.
    #[must_use]
    pub fn rng(&self) -> &Rng {
        &self.rng
    }

    /// Frames processed.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Simulated seconds elapsed.
    #[must_use]
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// Length of one tick in seconds.
    #[must_use]
    pub fn fixed_step(&self) -> f64 {
        self.config.fixed_step()
    }

    /// Identifiers of registered systems in run order.
    #[must_use]
    pub fn system_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.system.id()).collect()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("frame", &self.frame)
            .field("time", &self.time)
            .field("accumulator", &self.accumulator)
            .field("rng", &self.rng)
            .field("systems", &self.system_ids())
            .finish_non_exhaustive()
    }
}
