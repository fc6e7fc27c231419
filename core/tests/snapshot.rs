use danmaku_core::{
    create_snapshot, upgrade_snapshot, validate_snapshot_registries, BossSummary,
    GrazeSummary, PatternState, RestorePoint, RunSummary, Snapshot, StaticRegistry,
    LEGACY_SNAPSHOT_VERSION, SNAPSHOT_VERSION,
};

fn registry() -> StaticRegistry {
    StaticRegistry::new()
        .with_entry("enemies", "drone", 1)
        .with_entry("patterns", "spiral", 2)
}

fn current_snapshot() -> Snapshot {
    let mut summary = RunSummary::current();
    summary.kills = 12;
    summary.wave = 4;
    summary.graze_mut().graze_count = 9;
    summary.boss_mut().boss_active = true;
    summary.boss_mut().boss_pattern_id = Some("spiral".into());
    summary.boss_mut().boss_pattern_state = Some(PatternState::Custom {
        version: 1,
        data: serde_json::json!({ "phase": 1 }),
    });
    create_snapshot(
        RestorePoint {
            frame: 600,
            time: 10.0,
            rng_state: 0xdead_beef,
        },
        &registry(),
        summary,
    )
}

#[test]
fn created_snapshots_carry_the_current_version_and_registry_identity() {
    let snapshot = current_snapshot();
    assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    assert_eq!(snapshot.registries["patterns"], vec!["spiral".to_owned()]);
    assert_eq!(snapshot.version_map["enemies:drone"], 1);
    assert!(validate_snapshot_registries(&snapshot, &registry()).is_ok());
}

#[test]
fn upgrading_a_current_snapshot_is_the_identity() {
    let snapshot = current_snapshot();
    let expected = snapshot.clone();
    let hash_buffer = snapshot.registry_hash.as_ptr();

    let upgraded = upgrade_snapshot(snapshot);
    assert_eq!(upgraded, expected);
    assert_eq!(
        upgraded.registry_hash.as_ptr(),
        hash_buffer,
        "a current snapshot must be moved through, not rebuilt"
    );
}

#[test]
fn legacy_snapshots_gain_defaults_and_keep_existing_fields() {
    let legacy = r#"{
        "version": 1,
        "frame": 300,
        "time": 5.0,
        "rngState": 77,
        "registryHash": "abc",
        "summary": { "kills": 31, "wave": 6 }
    }"#;

    let snapshot = Snapshot::from_json_upgraded(legacy).expect("legacy snapshot decodes");
    assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    assert_eq!(snapshot.summary.kills, 31);
    assert_eq!(snapshot.summary.wave, 6);
    assert_eq!(snapshot.summary.graze, Some(GrazeSummary::default()));
    let graze = snapshot.summary.graze.expect("graze defaults");
    assert_eq!(graze.graze_count, 0);
    assert_eq!(graze.overdrive_meter, 0.0);
    assert!(!graze.overdrive_active);
    assert_eq!(snapshot.summary.boss, Some(BossSummary::default()));
    assert_eq!(snapshot.registry_hash, "abc");
}

#[test]
fn version_two_snapshots_keep_graze_counters() {
    let v2 = r#"{
        "version": 2,
        "frame": 10,
        "time": 0.5,
        "rngState": 5,
        "registryHash": "h",
        "summary": {
            "kills": 1, "wave": 2,
            "grazeCount": 14, "overdriveMeter": 0.5, "overdriveActive": true
        }
    }"#;

    let snapshot = Snapshot::from_json_upgraded(v2).expect("v2 decodes");
    let graze = snapshot.summary.graze.expect("graze kept");
    assert_eq!(graze.graze_count, 14);
    assert!(graze.overdrive_active);
    let boss = snapshot.summary.boss.expect("boss defaulted");
    assert!(!boss.boss_active);
    assert_eq!(boss.boss_pattern_id, None);
}

#[test]
fn unknown_future_versions_degrade_to_the_legacy_shape() {
    let mut snapshot = current_snapshot();
    snapshot.version = SNAPSHOT_VERSION + 7;
    snapshot.summary.graze = None;

    let upgraded = upgrade_snapshot(snapshot);
    assert_eq!(upgraded.version, SNAPSHOT_VERSION);
    assert_eq!(upgraded.summary.graze, Some(GrazeSummary::default()));
    assert_eq!(
        upgraded
            .summary
            .boss
            .and_then(|boss| boss.boss_pattern_id),
        Some("spiral".to_owned()),
        "fields present in the input survive the legacy upgrade path"
    );
    assert!(LEGACY_SNAPSHOT_VERSION < SNAPSHOT_VERSION);
}

#[test]
fn json_round_trip_preserves_the_flat_summary_shape() {
    let snapshot = current_snapshot();
    let json = snapshot.to_json().expect("encode");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    assert_eq!(value["summary"]["grazeCount"], 9);
    assert_eq!(value["summary"]["bossActive"], true);
    assert_eq!(value["summary"]["bossPatternState"]["kind"], "custom");
    assert_eq!(value["rngState"], 0xdead_beef_u32);

    let decoded = Snapshot::from_json_upgraded(&json).expect("decode");
    assert_eq!(decoded, snapshot);
}

#[test]
fn drifted_registries_are_rejected() {
    let snapshot = current_snapshot();
    let drifted = registry().with_entry("patterns", "spiral", 3);
    let error = validate_snapshot_registries(&snapshot, &drifted).expect_err("drift detected");
    assert_eq!(error.expected, snapshot.registry_hash);
    assert_ne!(error.actual, snapshot.registry_hash);
}
