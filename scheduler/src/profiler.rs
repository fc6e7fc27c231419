//! Optional wall-clock timing of system updates.

use std::time::Duration;

use serde::Serialize;

/// Accumulated timings for one system.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemTiming {
    /// Identifier of the timed system.
    pub id: String,
    /// Updates timed so far.
    pub samples: u64,
    /// Sum of all timed updates in microseconds.
    pub total_micros: u64,
    /// Most recent update in microseconds.
    pub last_micros: u64,
}

impl SystemTiming {
    /// Mean update duration in microseconds, or zero before the first sample.
    #[must_use]
    pub fn mean_micros(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_micros as f64 / self.samples as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Profiler {
    enabled: bool,
    timings: Vec<SystemTiming>,
}

impl Profiler {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            timings: Vec::new(),
        }
    }

    pub(crate) fn enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Records `elapsed` for `id` and returns it in whole microseconds.
    pub(crate) fn record(&mut self, id: &str, elapsed: Duration) -> u64 {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        let timing = match self.timings.iter().position(|timing| timing.id == id) {
            Some(index) => &mut self.timings[index],
            None => {
                self.timings.push(SystemTiming {
                    id: id.to_owned(),
                    ..SystemTiming::default()
                });
                let last = self.timings.len() - 1;
                &mut self.timings[last]
            }
        };
        timing.samples += 1;
        timing.total_micros = timing.total_micros.saturating_add(micros);
        timing.last_micros = micros;
        micros
    }

    pub(crate) fn timings(&self) -> &[SystemTiming] {
        &self.timings
    }
}
