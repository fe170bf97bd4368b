//! Integration tests for the `lockstep-db` storage layer.
//!
//! Each test works in its own directory under the system temp dir and
//! removes it afterwards.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::indexing_slicing
)]

use std::path::PathBuf;

use lockstep_core::genesis::Genesis;
use lockstep_core::snapshot::{Snapshot, SnapshotError, SnapshotStore, StorageId};
use lockstep_core::tick::AuthorityPipeline;
use lockstep_db::{
    EventJournal, FileSnapshotStore, ObservationFeed, StoreError, read_entries, read_observations,
};
use lockstep_events::{EventLog, EventLogError};
use lockstep_rng::StreamKey;
use lockstep_types::{Action, EntityId, InputEvent, SourceId, Subsystem};
use lockstep_world::{EntitySpec, WorldSpec};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A scratch directory removed on drop.
struct Scratch(PathBuf);

impl Scratch {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("lockstep-db-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn genesis() -> Genesis {
    let world = WorldSpec {
        width: 4,
        height: 4,
        entities: vec![EntitySpec {
            id: EntityId(1),
            owner: SourceId(10),
            x: 0,
            y: 0,
            energy: Decimal::from(4),
            stock: 0,
        }],
        ..WorldSpec::default()
    }
    .build(SourceId(1))
    .unwrap();
    Genesis::new(
        5,
        2,
        SourceId(1),
        [
            StreamKey::new(Subsystem::Biology, 0),
            StreamKey::new(Subsystem::Cognition, 0),
            StreamKey::new(Subsystem::Environment, 0),
        ],
        world,
    )
    .unwrap()
}

fn rest(tick: u64) -> InputEvent {
    InputEvent::new(tick, SourceId(10), 0, Action::Rest { entity: EntityId(1) })
}

/// Run four ticks and return the genesis snapshot plus the two cadence
/// snapshots (ticks 0, 2, 4).
fn snapshots(genesis: &Genesis) -> Vec<Snapshot> {
    let mut log = EventLog::new();
    log.append(rest(1)).unwrap();
    log.append(rest(3)).unwrap();
    let mut pipeline = AuthorityPipeline::new(genesis).unwrap();
    let mut out = vec![pipeline.latest_snapshot().clone()];
    for _ in 0..4 {
        out.extend(pipeline.tick(&mut log).unwrap().snapshot);
    }
    out
}

// =========================================================================
// FileSnapshotStore
// =========================================================================

#[test]
fn persisted_snapshot_loads_back_identical() {
    let scratch = Scratch::new();
    let g = genesis();
    let snaps = snapshots(&g);
    let mut store = FileSnapshotStore::open(scratch.0.join("snapshots")).unwrap();

    let id = store.persist(&snaps[1]).unwrap();
    assert!(id.0.starts_with("snapshot_000000000002_"));
    let loaded = store.load(&id).unwrap();
    assert_eq!(loaded, snaps[1]);
    assert!(loaded.verify(g.fingerprint()).is_ok());
}

#[test]
fn every_write_gets_a_fresh_file() {
    let scratch = Scratch::new();
    let snaps = snapshots(&genesis());
    let mut store = FileSnapshotStore::open(&scratch.0).unwrap();

    let a = store.persist(&snaps[0]).unwrap();
    let b = store.persist(&snaps[0]).unwrap();
    assert_ne!(a, b);
    assert_eq!(store.list().unwrap().len(), 2);
}

#[test]
fn latest_is_the_highest_tick() {
    let scratch = Scratch::new();
    let snaps = snapshots(&genesis());
    let mut store = FileSnapshotStore::open(&scratch.0).unwrap();
    assert!(store.latest().unwrap().is_none());

    for snapshot in [&snaps[2], &snaps[0], &snaps[1]] {
        store.persist(snapshot).unwrap();
    }
    let (_, latest) = store.latest().unwrap().unwrap();
    assert_eq!(latest.tick, 4);

    let ticks: Vec<u64> = store
        .list()
        .unwrap()
        .iter()
        .map(|id| store.load(id).unwrap().tick)
        .collect();
    assert_eq!(ticks, vec![0, 2, 4]);
}

#[test]
fn latest_verified_skips_corrupt_files() {
    let scratch = Scratch::new();
    let g = genesis();
    let snaps = snapshots(&g);
    let mut store = FileSnapshotStore::open(&scratch.0).unwrap();
    store.persist(&snaps[1]).unwrap();

    // A newer file that is not JSON at all.
    std::fs::write(
        scratch.0.join(format!("snapshot_000000000009_{}.json", Uuid::now_v7())),
        b"{ truncated",
    )
    .unwrap();
    // A newer file whose state bytes were altered after sealing.
    let mut tampered = snaps[2].clone();
    if let Some(byte) = tampered.canonical_state_bytes.get_mut(3) {
        *byte ^= 0xff;
    }
    store.persist(&tampered).unwrap();

    let found = store.latest_verified(g.fingerprint()).unwrap().unwrap();
    assert_eq!(found, snaps[1]);
}

#[test]
fn unknown_and_malformed_ids_are_not_found() {
    let scratch = Scratch::new();
    let store = FileSnapshotStore::open(&scratch.0).unwrap();

    let missing = StorageId("snapshot_000000000001_nope.json".to_owned());
    assert!(matches!(
        store.load(&missing),
        Err(SnapshotError::NotFound { .. })
    ));
    let escape = StorageId("../outside.json".to_owned());
    assert!(matches!(
        store.read(&escape),
        Err(StoreError::Snapshot(SnapshotError::NotFound { .. }))
    ));
}

// =========================================================================
// EventJournal
// =========================================================================

fn filled_log() -> EventLog {
    let mut log = EventLog::new();
    for tick in 1..=3 {
        log.append(rest(tick)).unwrap();
    }
    log
}

#[test]
fn reopened_journal_rebuilds_the_log() {
    let scratch = Scratch::new();
    let path = scratch.0.join("data").join("events.jsonl");
    let log = filled_log();

    let (mut journal, restored) = EventJournal::open(&path).unwrap();
    assert!(journal.is_empty());
    assert!(restored.records().is_empty());
    assert_eq!(journal.append(log.records()).unwrap(), 3);
    drop(journal);

    let (journal, restored) = EventJournal::open(&path).unwrap();
    assert_eq!(journal.len(), 3);
    assert_eq!(restored.records(), log.records());
    assert_eq!(restored.head(), log.head());
    assert_eq!(read_entries(&path).unwrap().len(), 3);
}

#[test]
fn appends_continue_after_reopen() {
    let scratch = Scratch::new();
    let path = scratch.0.join("events.jsonl");
    let mut log = filled_log();
    {
        let (mut journal, _) = EventJournal::open(&path).unwrap();
        journal.append(log.records()).unwrap();
    }

    let (mut journal, mut restored) = EventJournal::open(&path).unwrap();
    let before = restored.len();
    restored.append(rest(4)).unwrap();
    log.append(rest(4)).unwrap();
    journal.append(&restored.records()[before..]).unwrap();

    let (_, again) = EventJournal::open(&path).unwrap();
    assert_eq!(again.records(), log.records());
}

#[test]
fn out_of_order_records_are_refused_without_writing() {
    let scratch = Scratch::new();
    let path = scratch.0.join("events.jsonl");
    let log = filled_log();
    let (mut journal, _) = EventJournal::open(&path).unwrap();

    let err = journal.append(&log.records()[1..]).unwrap_err();
    assert!(matches!(err, StoreError::OutOfOrder { expected: 0, found: 1 }));
    assert!(journal.is_empty());
    assert!(read_entries(&path).unwrap().is_empty());
}

#[test]
fn edited_journal_fails_closed() {
    let scratch = Scratch::new();
    let path = scratch.0.join("events.jsonl");
    {
        let (mut journal, _) = EventJournal::open(&path).unwrap();
        journal.append(filled_log().records()).unwrap();
    }

    let contents = std::fs::read_to_string(&path).unwrap();
    let mut lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    lines[1]["record"]["event"]["sequence"] = serde_json::json!(7);
    let rewritten: String = lines.iter().map(|v| format!("{v}\n")).collect();
    std::fs::write(&path, rewritten).unwrap();

    let err = EventJournal::open(&path).unwrap_err();
    assert!(matches!(
        err,
        StoreError::EventLog(EventLogError::ChainBroken { position: 1 })
    ));
}

#[test]
fn truncated_line_names_the_line() {
    let scratch = Scratch::new();
    let path = scratch.0.join("events.jsonl");
    {
        let (mut journal, _) = EventJournal::open(&path).unwrap();
        journal.append(filled_log().records()).unwrap();
    }
    let mut contents = std::fs::read_to_string(&path).unwrap();
    contents.push_str("{\"received_at\":");
    std::fs::write(&path, contents).unwrap();

    let err = EventJournal::open(&path).unwrap_err();
    assert!(matches!(err, StoreError::CorruptJournal { line: 4, .. }));
}

// =========================================================================
// ObservationFeed
// =========================================================================

#[test]
fn observation_feed_appends_across_reopen() {
    let scratch = Scratch::new();
    let path = scratch.0.join("out").join("observations.jsonl");
    let g = genesis();
    let mut log = EventLog::new();
    log.append(rest(1)).unwrap();
    let mut pipeline = AuthorityPipeline::new(&g).unwrap();
    let first = pipeline.tick(&mut log).unwrap().observations;
    let second = pipeline.tick(&mut log).unwrap().observations;
    assert!(!first.is_empty());

    {
        let mut feed = ObservationFeed::open(&path).unwrap();
        assert_eq!(feed.append(&first).unwrap(), first.len());
        assert_eq!(feed.append(&[]).unwrap(), 0);
    }
    let mut feed = ObservationFeed::open(&path).unwrap();
    feed.append(&second).unwrap();
    assert_eq!(feed.written(), u64::try_from(second.len()).unwrap());

    let mut expected = first;
    expected.extend(second);
    assert_eq!(read_observations(&path).unwrap(), expected);
}
