#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Domain counters kept from gameplay events and reported into run summaries.

use std::{cell::RefCell, rc::Rc};

use danmaku_core::{Event, EventKind, GrazeSummary, RunSummary, System, TickContext};

const TALLY_ID: &str = "tally";
const OVERDRIVE_METER_MAX: f64 = 1.0;

/// Snapshot of the counters maintained by [`Tally`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Counters {
    /// Enemies destroyed.
    pub kills: u32,
    /// Highest wave announced.
    pub wave: u32,
    /// Projectiles grazed.
    pub graze_count: u32,
    /// Overdrive meter fill in `[0, 1]`.
    pub overdrive_meter: f64,
    /// Whether overdrive is engaged.
    pub overdrive_active: bool,
}

impl Counters {
    fn apply(&mut self, event: &Event) {
        match event {
            Event::Kill { .. } => self.kills += 1,
            Event::WaveStarted { wave } => self.wave = self.wave.max(*wave),
            Event::Graze { meter_gain } => {
                self.graze_count += 1;
                if meter_gain.is_finite() {
                    self.overdrive_meter =
                        (self.overdrive_meter + meter_gain).clamp(0.0, OVERDRIVE_METER_MAX);
                }
            }
            Event::OverdriveStart => self.overdrive_active = true,
            Event::OverdriveEnd => {
                self.overdrive_active = false;
                self.overdrive_meter = 0.0;
            }
            _ => {}
        }
    }
}

/// System that listens for kills, grazes, waves and overdrive toggles.
///
/// Counters are updated synchronously as events are emitted, so they are
/// current by the time the scheduler captures a summary.
#[derive(Debug, Default)]
pub struct Tally {
    counters: Rc<RefCell<Counters>>,
    order: i32,
}

impl Tally {
    /// Creates a tally with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tally seeded from a snapshot summary.
    #[must_use]
    pub fn from_summary(summary: &RunSummary) -> Self {
        let tally = Self::new();
        tally.load(summary);
        tally
    }

    /// Overrides the scheduler sort key.
    #[must_use]
    pub const fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Current counter values.
    #[must_use]
    pub fn counters(&self) -> Counters {
        *self.counters.borrow()
    }

    fn load(&self, summary: &RunSummary) {
        let graze = summary.graze.unwrap_or_default();
        *self.counters.borrow_mut() = Counters {
            kills: summary.kills,
            wave: summary.wave,
            graze_count: graze.graze_count,
            overdrive_meter: graze.overdrive_meter,
            overdrive_active: graze.overdrive_active,
        };
    }
}

impl System for Tally {
    fn id(&self) -> &str {
        TALLY_ID
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn init(&mut self, ctx: &mut TickContext<'_>) -> anyhow::Result<()> {
        for kind in [
            EventKind::Kill,
            EventKind::WaveStarted,
            EventKind::Graze,
            EventKind::OverdriveStart,
            EventKind::OverdriveEnd,
        ] {
            let counters = Rc::clone(&self.counters);
            let _ = ctx.on(kind, move |event| {
                counters.borrow_mut().apply(event);
                Ok(())
            });
        }
        log::debug!("tally subscribed to gameplay events");
        Ok(())
    }

    fn update(&mut self, _dt: f64, _ctx: &mut TickContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn summarize(&self, summary: &mut RunSummary) {
        let counters = self.counters();
        summary.kills = counters.kills;
        summary.wave = counters.wave;
        *summary.graze_mut() = GrazeSummary {
            graze_count: counters.graze_count,
            overdrive_meter: counters.overdrive_meter,
            overdrive_active: counters.overdrive_active,
        };
    }

    fn restore_summary(&mut self, summary: &RunSummary) -> anyhow::Result<()> {
        self.load(summary);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use danmaku_core::{EventBus, Rng};

    fn subscribed(tally: &mut Tally) -> (Rng, EventBus) {
        let mut rng = Rng::new(1_u32);
        let mut events = EventBus::new();
        let mut ctx = TickContext::new(0, 0.0, &mut rng, &mut events);
        tally.init(&mut ctx).expect("init");
        (rng, events)
    }

    #[test]
    fn counts_domain_events() {
        let mut tally = Tally::new();
        let (_rng, mut events) = subscribed(&mut tally);

        events.emit(&Event::WaveStarted { wave: 3 });
        events.emit(&Event::WaveStarted { wave: 2 });
        for _ in 0..4 {
            events.emit(&Event::Kill {
                enemy: "drone".into(),
            });
        }
        for _ in 0..3 {
            events.emit(&Event::Graze { meter_gain: 0.4 });
        }
        events.emit(&Event::OverdriveStart);

        let counters = tally.counters();
        assert_eq!(counters.kills, 4);
        assert_eq!(counters.wave, 3);
        assert_eq!(counters.graze_count, 3);
        assert!((counters.overdrive_meter - 1.0).abs() < f64::EPSILON);
        assert!(counters.overdrive_active);

        events.emit(&Event::OverdriveEnd);
        let counters = tally.counters();
        assert!(!counters.overdrive_active);
        assert_eq!(counters.overdrive_meter, 0.0);
    }

    #[test]
    fn summary_round_trips_through_restore() {
        let mut tally = Tally::new();
        let (_rng, mut events) = subscribed(&mut tally);
        events.emit(&Event::Kill {
            enemy: "turret".into(),
        });
        events.emit(&Event::Graze { meter_gain: 0.25 });

        let mut summary = RunSummary::current();
        tally.summarize(&mut summary);
        assert_eq!(summary.kills, 1);
        assert_eq!(summary.graze.map(|graze| graze.graze_count), Some(1));

        let restored = Tally::from_summary(&summary);
        assert_eq!(restored.counters(), tally.counters());
    }

    #[test]
    fn legacy_summary_restores_zeroed_graze() {
        let summary = RunSummary {
            kills: 7,
            wave: 2,
            ..RunSummary::default()
        };
        let restored = Tally::from_summary(&summary);
        assert_eq!(
            restored.counters(),
            Counters {
                kills: 7,
                wave: 2,
                ..Counters::default()
            }
        );
    }
}
