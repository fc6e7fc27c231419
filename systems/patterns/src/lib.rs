#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pattern lifecycle glue: the [`Pattern`] contract, a catalog of factories,
//! and the [`PatternDirector`] system that runs one boss session per run.

mod catalog;
mod director;
mod pattern;
mod script_pattern;

use thiserror::Error;

pub use catalog::{PatternCatalog, PatternFactory, PatternSelection};
pub use director::{AbortHandle, DirectorConfig, PatternDirector};
pub use pattern::{Pattern, PatternChain};
pub use script_pattern::ScriptPattern;

/// Failures raised while selecting, building or restoring patterns.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    /// No factory is registered under the identifier.
    #[error("no pattern factory registered for `{pattern}`")]
    MissingFactory {
        /// Requested identifier.
        pattern: String,
    },
    /// No registered identifier occurs in the seed text.
    #[error("no registered pattern matches seed `{seed}`")]
    NoSeedMatch {
        /// Seed text that was searched.
        seed: String,
    },
    /// The pattern cannot resume from stored state.
    #[error("pattern `{pattern}` does not support state restore")]
    RestoreUnsupported {
        /// Identifier of the pattern.
        pattern: String,
    },
    /// Stored state or content has a different version than the live pattern.
    #[error("pattern `{pattern}` expects version {expected}, found {actual}")]
    StateVersion {
        /// Identifier of the pattern.
        pattern: String,
        /// Version the live pattern understands.
        expected: u32,
        /// Version found in the stored state.
        actual: u32,
    },
    /// The snapshot recorded a different content version for the pattern.
    #[error("snapshot recorded `{pattern}` version {expected}, catalog builds version {actual}")]
    VersionMismatch {
        /// Identifier of the pattern.
        pattern: String,
        /// Version recorded in the snapshot.
        expected: u32,
        /// Version of the freshly built pattern.
        actual: u32,
    },
    /// Boss summary fields contradict each other.
    #[error("corrupt boss session: {reason}")]
    CorruptSession {
        /// What is inconsistent.
        reason: &'static str,
    },
}
