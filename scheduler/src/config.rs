//! Construction parameters for the scheduler.

use danmaku_core::RngSeed;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_FIXED_STEP: f64 = 1.0 / 60.0;
const DEFAULT_EPSILON: f64 = 1e-9;

/// Configuration parameters required to construct a [`crate::Scheduler`].
///
/// Deserializes from camelCase JSON so hosts can keep run settings next to
/// their other data. The seed is optional in the type only so that a missing
/// seed is reported as a [`ConfigurationError`] instead of silently defaulting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    #[serde(default)]
    seed: Option<RngSeed>,
    #[serde(default = "default_fixed_step")]
    fixed_step: f64,
    #[serde(default = "default_epsilon")]
    epsilon: f64,
    #[serde(default)]
    profile: bool,
}

impl SchedulerConfig {
    /// Creates a configuration with the provided seed and a 60 Hz step.
    #[must_use]
    pub fn new(seed: impl Into<RngSeed>) -> Self {
        Self {
            seed: Some(seed.into()),
            ..Self::unseeded()
        }
    }

    /// Creates a configuration without a seed; construction will fail until
    /// one is supplied.
    #[must_use]
    pub const fn unseeded() -> Self {
        Self {
            seed: None,
            fixed_step: DEFAULT_FIXED_STEP,
            epsilon: DEFAULT_EPSILON,
            profile: false,
        }
    }

    /// Replaces the fixed step, in seconds.
    #[must_use]
    pub const fn with_fixed_step(mut self, fixed_step: f64) -> Self {
        self.fixed_step = fixed_step;
        self
    }

    /// Replaces the tolerance used to absorb floating-point drift in the
    /// accumulator.
    #[must_use]
    pub const fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Starts the scheduler with per-system timing enabled.
    #[must_use]
    pub const fn with_profiler(mut self, enabled: bool) -> Self {
        self.profile = enabled;
        self
    }

    /// Seed material, if any.
    #[must_use]
    pub const fn seed(&self) -> Option<&RngSeed> {
        self.seed.as_ref()
    }

    /// Fixed step in seconds.
    #[must_use]
    pub const fn fixed_step(&self) -> f64 {
        self.fixed_step
    }

    /// Accumulator tolerance in seconds.
    #[must_use]
    pub const fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Whether profiling starts enabled.
    #[must_use]
    pub const fn profile(&self) -> bool {
        self.profile
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.fixed_step.is_finite() || self.fixed_step <= 0.0 {
            return Err(ConfigurationError::InvalidFixedStep {
                step: self.fixed_step,
            });
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(ConfigurationError::InvalidEpsilon {
                epsilon: self.epsilon,
            });
        }
        Ok(())
    }
}

fn default_fixed_step() -> f64 {
    DEFAULT_FIXED_STEP
}

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

/// Fatal setup mistakes. These are never retried.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigurationError {
    /// The scheduler was constructed without a seed.
    #[error("a seed is required; determinism cannot be retrofitted")]
    MissingSeed,
    /// The fixed step is not a positive finite number of seconds.
    #[error("fixed step must be positive and finite, got {step}")]
    InvalidFixedStep {
        /// Rejected step.
        step: f64,
    },
    /// The accumulator tolerance is negative or not finite.
    #[error("step epsilon must be non-negative and finite, got {epsilon}")]
    InvalidEpsilon {
        /// Rejected tolerance.
        epsilon: f64,
    },
    /// A system with the same identifier is already registered.
    #[error("a system with id `{id}` is already registered")]
    DuplicateSystemId {
        /// Conflicting identifier.
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_config_fills_defaults() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{ "seed": "stage-1" }"#).expect("config parses");
        assert_eq!(config.seed(), Some(&RngSeed::Text("stage-1".into())));
        assert!((config.fixed_step() - DEFAULT_FIXED_STEP).abs() < f64::EPSILON);
        assert!(!config.profile());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn non_positive_steps_are_rejected() {
        let config = SchedulerConfig::new(1_u32).with_fixed_step(0.0);
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::InvalidFixedStep { step: 0.0 })
        );
    }
}
