//! Typed notifications and the synchronous bus that fans them out.

use std::{
    collections::BTreeMap,
    panic::{self, AssertUnwindSafe},
};

use serde_json::Value;

/// Notifications published by the scheduler, systems, and patterns.
///
/// Events are fire-and-forget: handlers observe them but cannot reach back
/// into the state of whoever emitted them.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A fixed step completed.
    Frame {
        /// Frame counter after the step.
        frame: u64,
        /// Simulated time in seconds after the step.
        time: f64,
    },
    /// A snapshot was captured.
    Snapshot {
        /// Frame at which the snapshot was taken.
        frame: u64,
    },
    /// Wall-clock timing of one system update, emitted only while profiling.
    PerfSample {
        /// Identifier of the timed system.
        system: String,
        /// Frame during which the update ran.
        frame: u64,
        /// Elapsed wall-clock time in microseconds.
        micros: u64,
    },
    /// A new wave began.
    WaveStarted {
        /// One-based wave number.
        wave: u32,
    },
    /// An enemy was destroyed.
    Kill {
        /// Content identifier of the destroyed enemy.
        enemy: String,
    },
    /// The player grazed a projectile.
    Graze {
        /// Overdrive meter gain granted by the graze.
        meter_gain: f64,
    },
    /// Overdrive mode engaged.
    OverdriveStart,
    /// Overdrive mode ended and drained the meter.
    OverdriveEnd,
    /// A pattern session started with the given pattern.
    PatternStarted {
        /// Identifier of the started pattern.
        pattern: String,
        /// Frame at which it started.
        frame: u64,
    },
    /// A pattern completed and handed over to its declared successor.
    PatternChained {
        /// Identifier of the completed pattern.
        from: String,
        /// Identifier of the successor pattern.
        to: String,
        /// Frame at which the handover happened.
        frame: u64,
        /// Opaque handoff data passed to the successor.
        payload: Option<Value>,
    },
    /// A pattern session concluded normally.
    PatternEnded {
        /// Identifier of the final pattern in the session.
        pattern: String,
        /// Frame at which the session ended.
        frame: u64,
    },
    /// A pattern session was aborted externally.
    PatternAborted {
        /// Identifier of the pattern that was active.
        pattern: String,
        /// Frame at which the abort was observed.
        frame: u64,
    },
}

impl Event {
    /// Discriminant used to route the event to subscribers.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Frame { .. } => EventKind::Frame,
            Self::Snapshot { .. } => EventKind::Snapshot,
            Self::PerfSample { .. } => EventKind::PerfSample,
            Self::WaveStarted { .. } => EventKind::WaveStarted,
            Self::Kill { .. } => EventKind::Kill,
            Self::Graze { .. } => EventKind::Graze,
            Self::OverdriveStart => EventKind::OverdriveStart,
            Self::OverdriveEnd => EventKind::OverdriveEnd,
            Self::PatternStarted { .. } => EventKind::PatternStarted,
            Self::PatternChained { .. } => EventKind::PatternChained,
            Self::PatternEnded { .. } => EventKind::PatternEnded,
            Self::PatternAborted { .. } => EventKind::PatternAborted,
        }
    }
}

/// Routing key for [`Event`] subscriptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Routes [`Event::Frame`].
    Frame,
    /// Routes [`Event::Snapshot`].
    Snapshot,
    /// Routes [`Event::PerfSample`].
    PerfSample,
    /// Routes [`Event::WaveStarted`].
    WaveStarted,
    /// Routes [`Event::Kill`].
    Kill,
    /// Routes [`Event::Graze`].
    Graze,
    /// Routes [`Event::OverdriveStart`].
    OverdriveStart,
    /// Routes [`Event::OverdriveEnd`].
    OverdriveEnd,
    /// Routes [`Event::PatternStarted`].
    PatternStarted,
    /// Routes [`Event::PatternChained`].
    PatternChained,
    /// Routes [`Event::PatternEnded`].
    PatternEnded,
    /// Routes [`Event::PatternAborted`].
    PatternAborted,
}

/// Handle returned by [`EventBus::on`] and accepted by [`EventBus::off`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
}

impl Subscription {
    /// Event kind the subscription listens to.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }
}

/// Boxed event listener. A returned error or a panic is logged and discarded.
pub type Handler = Box<dyn FnMut(&Event) -> anyhow::Result<()>>;

/// Synchronous, in-process publish/subscribe.
///
/// Handlers run in subscription order. Listeners only observe events emitted
/// after they subscribed.
#[derive(Default)]
pub struct EventBus {
    handlers: BTreeMap<EventKind, Vec<(u64, Handler)>>,
    next_id: u64,
}

impl EventBus {
    /// Creates a bus without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to events of `kind`.
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> Subscription
    where
        F: FnMut(&Event) -> anyhow::Result<()> + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.handlers
            .entry(kind)
            .or_default()
            .push((id, Box::new(handler)));
        Subscription { kind, id }
    }

    /// Removes a subscription. Returns `false` when it was already gone.
    pub fn off(&mut self, subscription: Subscription) -> bool {
        let Some(listeners) = self.handlers.get_mut(&subscription.kind) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription.id);
        listeners.len() != before
    }

    /// Delivers `event` to every current subscriber of its kind.
    ///
    /// A handler that fails or panics is logged and skipped; the remaining
    /// handlers still run.
    pub fn emit(&mut self, event: &Event) {
        let Some(listeners) = self.handlers.get_mut(&event.kind()) else {
            return;
        };
        for (id, handler) in listeners.iter_mut() {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => log::warn!(
                    "event handler {id} failed on {:?}: {error:#}",
                    event.kind()
                ),
                Err(_) => log::warn!("event handler {id} panicked on {:?}", event.kind()),
            }
        }
    }

    /// Number of live subscriptions for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Drops every subscription.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<EventKind, usize> = self
            .handlers
            .iter()
            .map(|(kind, listeners)| (*kind, listeners.len()))
            .collect();
        f.debug_struct("EventBus")
            .field("listeners", &counts)
            .field("next_id", &self.next_id)
            .finish()
    }
}
