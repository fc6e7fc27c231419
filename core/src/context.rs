//! Per-tick context and the contract every scheduled system implements.

use crate::{
    events::{Event, EventBus, EventKind, Subscription},
    rng::Rng,
    snapshot::RunSummary,
};

/// View of one fixed step handed to systems, patterns, and script callbacks.
///
/// Frame and time are fixed for the duration of the tick. The generator and
/// the event bus are lent mutably because drawing and emitting are the only
/// ways code running inside a tick may touch shared state.
#[derive(Debug)]
pub struct TickContext<'a> {
    frame: u64,
    time: f64,
    rng: &'a mut Rng,
    events: &'a mut EventBus,
}

impl<'a> TickContext<'a> {
    /// Assembles a context for the given frame.
    #[must_use]
    pub fn new(frame: u64, time: f64, rng: &'a mut Rng, events: &'a mut EventBus) -> Self {
        Self {
            frame,
            time,
            rng,
            events,
        }
    }

    /// Frame counter of the tick being processed.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Simulated time in seconds at the start of the tick.
    #[must_use]
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// Deterministic generator shared by everything in the tick.
    pub fn rng(&mut self) -> &mut Rng {
        &mut *self.rng
    }

    /// Publishes `event` synchronously to current subscribers.
    pub fn emit(&mut self, event: Event) {
        self.events.emit(&event);
    }

    /// Subscribes to future events of `kind`.
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> Subscription
    where
        F: FnMut(&Event) -> anyhow::Result<()> + 'static,
    {
        self.events.on(kind, handler)
    }

    /// Cancels a subscription made through [`TickContext::on`].
    pub fn off(&mut self, subscription: Subscription) -> bool {
        self.events.off(subscription)
    }
}

/// Unit of simulation work driven by the scheduler once per fixed step.
///
/// Systems run in ascending [`System::order`], ties broken by registration
/// order. Errors returned from any hook abort the current scheduler call and
/// propagate to the host.
pub trait System {
    /// Identifier that is unique within one scheduler.
    fn id(&self) -> &str;

    /// Sort key; lower values run first.
    fn order(&self) -> i32 {
        0
    }

    /// Called once by `Scheduler::init`, before the first tick.
    fn init(&mut self, _ctx: &mut TickContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Advances the system by one fixed step of `dt` seconds.
    fn update(&mut self, dt: f64, ctx: &mut TickContext<'_>) -> anyhow::Result<()>;

    /// Releases resources when the scheduler shuts down.
    fn teardown(&mut self) {}

    /// Writes this system's counters into a snapshot summary.
    fn summarize(&self, _summary: &mut RunSummary) {}

    /// Reinstates this system's counters from a snapshot summary.
    fn restore_summary(&mut self, _summary: &RunSummary) -> anyhow::Result<()> {
        Ok(())
    }
}
