//! Versioned snapshot format and the upgrade chain that brings older captures current.
//!
//! The JSON shape uses camelCase keys and a flat `summary` object. Fields are
//! grouped by the schema version that introduced them:
//!
//! | version | summary fields added                                        |
//! |---------|-------------------------------------------------------------|
//! | 1       | `kills`, `wave`                                             |
//! | 2       | `grazeCount`, `overdriveMeter`, `overdriveActive`           |
//! | 3       | `bossActive`, `bossPatternId`, ... `bossPatternState`       |
//!
//! Later groups are optional in the type so a legacy capture deserializes
//! without them; [`upgrade_snapshot`] fills them with defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    registry::{ContentRegistry, RegistrySnapshot, VersionMap},
    state::PatternState,
};

/// Schema version stamped on every snapshot created by this crate.
pub const SNAPSHOT_VERSION: u32 = 3;

/// Oldest schema version the upgrade chain understands.
pub const LEGACY_SNAPSHOT_VERSION: u32 = 1;

type Upgrade = fn(&mut Snapshot);

const UPGRADES: [(u32, Upgrade); 2] = [(1, upgrade_v1_to_v2), (2, upgrade_v2_to_v3)];

/// Versioned capture of scheduler time, generator state, registry identity and
/// domain counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Schema version of this capture.
    #[serde(default)]
    pub version: u32,
    /// Frames processed when the capture was taken.
    pub frame: u64,
    /// Simulated seconds elapsed when the capture was taken.
    pub time: f64,
    /// Raw generator state.
    pub rng_state: u32,
    /// Identifiers reported by the content registry.
    #[serde(default)]
    pub registries: RegistrySnapshot,
    /// Digest of the content registry at capture time.
    #[serde(default)]
    pub registry_hash: String,
    /// Content versions at capture time.
    #[serde(default)]
    pub version_map: VersionMap,
    /// Domain counters.
    #[serde(default)]
    pub summary: RunSummary,
}

impl Snapshot {
    /// Frame, time and generator state needed to reposition a scheduler.
    #[must_use]
    pub fn restore_point(&self) -> RestorePoint {
        RestorePoint {
            frame: self.frame,
            time: self.time,
            rng_state: self.rng_state,
        }
    }

    /// Encodes the snapshot as JSON.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(SnapshotError::Encode)
    }

    /// Decodes a snapshot of any known version and upgrades it to the current one.
    pub fn from_json_upgraded(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json).map_err(SnapshotError::Decode)?;
        Ok(upgrade_snapshot(snapshot))
    }
}

/// Scheduler position restored from a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorePoint {
    /// Frame counter to resume from.
    pub frame: u64,
    /// Simulated time to resume from.
    pub time: f64,
    /// Raw generator state to resume from.
    pub rng_state: u32,
}

/// Domain counters carried by a snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Enemies destroyed.
    #[serde(default)]
    pub kills: u32,
    /// Current wave number.
    #[serde(default)]
    pub wave: u32,
    /// Graze and overdrive counters, present from version 2.
    #[serde(flatten)]
    pub graze: Option<GrazeSummary>,
    /// Boss lifecycle fields, present from version 3.
    #[serde(flatten)]
    pub boss: Option<BossSummary>,
}

impl RunSummary {
    /// Summary with every field of the current schema at its default.
    #[must_use]
    pub fn current() -> Self {
        Self {
            graze: Some(GrazeSummary::default()),
            boss: Some(BossSummary::default()),
            ..Self::default()
        }
    }

    /// Graze counters, inserting defaults when absent.
    pub fn graze_mut(&mut self) -> &mut GrazeSummary {
        self.graze.get_or_insert_with(GrazeSummary::default)
    }

    /// Boss fields, inserting defaults when absent.
    pub fn boss_mut(&mut self) -> &mut BossSummary {
        self.boss.get_or_insert_with(BossSummary::default)
    }
}

/// Graze and overdrive counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrazeSummary {
    /// Projectiles grazed.
    pub graze_count: u32,
    /// Overdrive meter fill in `[0, 1]`.
    pub overdrive_meter: f64,
    /// Whether overdrive is engaged.
    pub overdrive_active: bool,
}

/// Boss session lifecycle fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BossSummary {
    /// Whether a pattern session is running.
    pub boss_active: bool,
    /// Identifier of the active or last pattern.
    pub boss_pattern_id: Option<String>,
    /// Version of the active or last pattern.
    pub boss_pattern_version: Option<u32>,
    /// Frame at which the session started.
    pub boss_start_frame: Option<u64>,
    /// Frame at which the session ended or was aborted.
    pub boss_end_frame: Option<u64>,
    /// Whether the session ended through an external abort.
    #[serde(default)]
    pub boss_aborted: bool,
    /// State of the active pattern, refreshed every tick.
    pub boss_pattern_state: Option<PatternState>,
    /// Generator draws consumed per pattern identifier.
    #[serde(default)]
    pub boss_rng_draws: BTreeMap<String, u64>,
}

/// Failures while encoding or decoding snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot could not be encoded.
    #[error("failed to encode snapshot")]
    Encode(#[source] serde_json::Error),
    /// The input is not a snapshot of any known shape.
    #[error("failed to decode snapshot")]
    Decode(#[source] serde_json::Error),
}

/// A snapshot was captured against different content than is loaded now.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("registry divergence: snapshot hash {expected} does not match live hash {actual}")]
pub struct RegistryDivergence {
    /// Hash recorded in the snapshot.
    pub expected: String,
    /// Hash of the live registry.
    pub actual: String,
}

/// Captures a snapshot stamped with [`SNAPSHOT_VERSION`].
#[must_use]
pub fn create_snapshot(
    restore_point: RestorePoint,
    registry: &dyn ContentRegistry,
    summary: RunSummary,
) -> Snapshot {
    Snapshot {
        version: SNAPSHOT_VERSION,
        frame: restore_point.frame,
        time: restore_point.time,
        rng_state: restore_point.rng_state,
        registries: registry.snapshot(),
        registry_hash: registry.hash(),
        version_map: registry.version_map(),
        summary,
    }
}

/// Brings a snapshot of any version to [`SNAPSHOT_VERSION`].
///
/// A current snapshot is returned as is, without copying. Older snapshots run
/// through every upgrade step after their version; each step defaults the
/// fields its version introduced and keeps everything already present. A
/// version this crate does not know is treated as
/// [`LEGACY_SNAPSHOT_VERSION`].
#[must_use]
pub fn upgrade_snapshot(mut snapshot: Snapshot) -> Snapshot {
    if snapshot.version == SNAPSHOT_VERSION {
        return snapshot;
    }

    let mut version = snapshot.version;
    if !(LEGACY_SNAPSHOT_VERSION..SNAPSHOT_VERSION).contains(&version) {
        log::warn!(
            "unrecognised snapshot version {version}; upgrading as version {LEGACY_SNAPSHOT_VERSION}"
        );
        version = LEGACY_SNAPSHOT_VERSION;
    }

    for (from, upgrade) in UPGRADES {
        if version == from {
            upgrade(&mut snapshot);
            version = from + 1;
        }
    }

    snapshot.version = version;
    snapshot
}

/// Checks that `snapshot` was captured against the content `registry` holds now.
pub fn validate_snapshot_registries(
    snapshot: &Snapshot,
    registry: &dyn ContentRegistry,
) -> Result<(), RegistryDivergence> {
    let actual = registry.hash();
    if snapshot.registry_hash == actual {
        Ok(())
    } else {
        Err(RegistryDivergence {
            expected: snapshot.registry_hash.clone(),
            actual,
        })
    }
}

fn upgrade_v1_to_v2(snapshot: &mut Snapshot) {
    let _ = snapshot.summary.graze_mut();
}

fn upgrade_v2_to_v3(snapshot: &mut Snapshot) {
    let _ = snapshot.summary.boss_mut();
}
