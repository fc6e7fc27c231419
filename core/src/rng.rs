//! Seeded linear-congruential generator that every deterministic consumer draws from.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const LCG_MULTIPLIER: u32 = 1_664_525;
const LCG_INCREMENT: u32 = 1_013_904_223;
const DJB2_BASIS: u32 = 5_381;
const UNIT_SCALE: f64 = 4_294_967_296.0;

/// Seed material accepted when constructing an [`Rng`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RngSeed {
    /// Numeric seed used directly as the initial state.
    Number(u32),
    /// Textual seed reduced to 32 bits with a djb2 hash.
    Text(String),
}

impl RngSeed {
    /// Resolves the seed into the raw generator state it produces.
    ///
    /// Text seeds are hashed over their UTF-16 code units so that the same
    /// string yields the same state regardless of how the host stores it. A
    /// resolved seed of zero is coerced to one.
    #[must_use]
    pub fn to_state(&self) -> u32 {
        let raw = match self {
            Self::Number(value) => *value,
            Self::Text(text) => djb2(text),
        };
        coerce_state(raw)
    }
}

impl From<u32> for RngSeed {
    fn from(value: u32) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RngSeed {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for RngSeed {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Failures reported by the sampling helpers on [`Rng`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RngError {
    /// The requested inclusive range has its upper bound below its lower bound.
    #[error("invalid range: max {max} is below min {min}")]
    InvalidRange {
        /// Requested lower bound.
        min: i64,
        /// Requested upper bound.
        max: i64,
    },
    /// A choice was requested from an empty slice.
    #[error("cannot choose from an empty input")]
    EmptyInput,
}

/// Deterministic 32-bit LCG.
///
/// Two generators built from the same seed produce the same infinite sequence.
/// The generator also counts how many raw draws it has served so callers can
/// attribute randomness consumption to the code that performed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rng {
    state: u32,
    draws: u64,
}

impl Rng {
    /// Creates a generator from numeric or textual seed material.
    #[must_use]
    pub fn new(seed: impl Into<RngSeed>) -> Self {
        Self::from_state(seed.into().to_state())
    }

    /// Creates a generator positioned at the provided raw state.
    #[must_use]
    pub fn from_state(state: u32) -> Self {
        Self {
            state: coerce_state(state),
            draws: 0,
        }
    }

    /// Advances the generator and returns a value in `[0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        f64::from(self.step()) / UNIT_SCALE
    }

    /// Draws an integer from the inclusive range `[min, max]`.
    pub fn int(&mut self, min: i64, max: i64) -> Result<i64, RngError> {
        if max < min {
            return Err(RngError::InvalidRange { min, max });
        }

        let span = (i128::from(max) - i128::from(min) + 1) as f64;
        let offset = (self.next_unit() * span).floor() as i128;
        Ok((i128::from(min) + offset) as i64)
    }

    /// Picks one element of `items` uniformly.
    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> Result<&'a T, RngError> {
        if items.is_empty() {
            return Err(RngError::EmptyInput);
        }

        let last = i64::try_from(items.len() - 1).unwrap_or(i64::MAX);
        let index = self.int(0, last)?;
        usize::try_from(index)
            .ok()
            .and_then(|index| items.get(index))
            .ok_or(RngError::EmptyInput)
    }

    /// Returns the raw generator state for snapshotting.
    #[must_use]
    pub const fn snapshot(&self) -> u32 {
        self.state
    }

    /// Repositions the generator at a previously captured raw state.
    ///
    /// The state is taken verbatim. The draw counter is instrumentation and
    /// is left untouched.
    pub fn restore(&mut self, state: u32) {
        self.state = state;
    }

    /// Number of raw draws served since construction.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }

    fn step(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        self.draws += 1;
        self.state
    }
}

impl RngCore for Rng {
    fn next_u32(&mut self) -> u32 {
        self.step()
    }

    fn next_u64(&mut self) -> u64 {
        let high = u64::from(self.step());
        let low = u64::from(self.step());
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.step().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

fn djb2(text: &str) -> u32 {
    text.encode_utf16().fold(DJB2_BASIS, |hash, unit| {
        hash.wrapping_mul(33).wrapping_add(u32::from(unit))
    })
}

const fn coerce_state(state: u32) -> u32 {
    if state == 0 {
        1
    } else {
        state
    }
}
