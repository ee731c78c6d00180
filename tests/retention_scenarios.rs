//! Quota scenario tests: the two-tier retention policy driven end-to-end
//! through `enforce` and the collection gate, with byte-level thresholds
//! standing in for the GB-scale production quotas.

mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use logvault::collector::{CollectionOutcome, Collector};
use logvault::core::store::ConfigStore;
use logvault::logger::activity::ActivityLoggerHandle;
use logvault::retention::{QuotaVerdict, RetentionPolicy, enforce};

use common::AppFixture;

const DAY: Duration = Duration::from_secs(86_400);

fn policy(max_bytes: u64, auto_clean: bool) -> RetentionPolicy {
    RetentionPolicy {
        max_bytes,
        shallow_age: 7 * DAY,
        deep_age: 2 * DAY,
        auto_clean,
    }
}

// Scenario A: over quota, clean_auto=false -> abort, nothing deleted.
#[test]
fn over_quota_with_auto_clean_disabled_reports_and_deletes_nothing() {
    let dir = TempDir::new().unwrap();
    common::aged_snapshot(dir.path(), "2026-06-01_03-00-00", 8_000, 30);
    common::aged_snapshot(dir.path(), "2026-07-28_03-00-00", 4_000, 1);

    let report = enforce(dir.path(), &policy(10_000, false)).unwrap();
    assert_eq!(report.verdict, QuotaVerdict::ManualCleanupRequired);
    assert!(!report.cleaned);
    assert_eq!(report.dirs_deleted, 0);
    assert_eq!(report.final_size_bytes, 12_000);
    assert!(dir.path().join("2026-06-01_03-00-00").exists());
    assert!(dir.path().join("2026-07-28_03-00-00").exists());
}

// Scenario B: shallow pass frees enough -> deep pass skipped.
#[test]
fn shallow_pass_brings_usage_under_quota_and_deep_pass_is_skipped() {
    let dir = TempDir::new().unwrap();
    common::aged_snapshot(dir.path(), "ancient", 4_000, 30); // shallow target
    common::aged_snapshot(dir.path(), "middle", 4_000, 4); // deep-age range only
    common::aged_snapshot(dir.path(), "recent", 4_000, 1);

    let report = enforce(dir.path(), &policy(10_000, true)).unwrap();
    assert_eq!(report.verdict, QuotaVerdict::CleanedUnder);
    assert_eq!(report.dirs_deleted, 1);
    assert_eq!(report.final_size_bytes, 8_000);
    // Deep pass never ran: "middle" is older than the deep age but survives.
    assert!(!dir.path().join("ancient").exists());
    assert!(dir.path().join("middle").exists());
    assert!(dir.path().join("recent").exists());
}

// Scenario C: shallow pass insufficient -> deep pass executes.
#[test]
fn deep_pass_runs_when_shallow_pass_leaves_usage_over_quota() {
    let dir = TempDir::new().unwrap();
    common::aged_snapshot(dir.path(), "ancient", 1_000, 30);
    common::aged_snapshot(dir.path(), "middle", 7_000, 4);
    common::aged_snapshot(dir.path(), "recent", 4_000, 1);

    let report = enforce(dir.path(), &policy(10_000, true)).unwrap();
    assert_eq!(report.verdict, QuotaVerdict::CleanedUnder);
    assert_eq!(report.dirs_deleted, 2);
    assert_eq!(report.final_size_bytes, 4_000);
    assert!(!dir.path().join("ancient").exists());
    assert!(!dir.path().join("middle").exists());
    assert!(dir.path().join("recent").exists());
}

// Scenario C continued: still over quota after both passes -> no copy.
#[test]
fn still_over_quota_after_both_passes_blocks_collection() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("logs");
    fs::create_dir_all(&logs).unwrap();
    fs::write(logs.join("api.log"), b"fresh content").unwrap();

    let target = dir.path().join("archive");
    fs::create_dir_all(&target).unwrap();
    common::aged_snapshot(&target, "ancient", 500, 30);
    // Recent snapshots alone exceed the quota; no pass may remove them.
    common::aged_snapshot(&target, "recent", 6_000, 1);

    let config_path = common::write_config(
        &dir.path().join("config.yaml"),
        &target,
        10,
        true,
        &[AppFixture::new("api", &logs, &["api.log"])],
    );
    let store = Arc::new(ConfigStore::open(&config_path).unwrap());
    let snapshot = store.current();
    // Byte-level quota: anything non-empty is over a zero-GB threshold.
    let mut global = snapshot.global.clone();
    global.max_size = 0;

    let collector = Collector::new(Arc::clone(&store), ActivityLoggerHandle::disconnected());
    let report = collector.collect(&snapshot.apps[0], &global).unwrap();

    assert_eq!(report.outcome, CollectionOutcome::StillOverQuota);
    assert!(report.snapshot_dir.is_none());
    // The aged snapshot was deleted by the passes, the fresh one survived,
    // and no new snapshot directory was created.
    assert!(!target.join("ancient").exists());
    assert!(target.join("recent").exists());
    let remaining: Vec<_> = fs::read_dir(&target)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(remaining, vec!["recent"]);
}

// Scenario B continued: collection proceeds in the same fire after a
// successful clean.
#[test]
fn collection_proceeds_after_successful_clean() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("logs");
    fs::create_dir_all(&logs).unwrap();
    fs::write(logs.join("api.log"), b"fresh content").unwrap();

    let target = dir.path().join("archive");
    fs::create_dir_all(&target).unwrap();
    common::aged_snapshot(&target, "ancient", 6_000, 30);

    let config_path = common::write_config(
        &dir.path().join("config.yaml"),
        &target,
        10,
        true,
        &[AppFixture::new("api", &logs, &["api.log"])],
    );
    let store = Arc::new(ConfigStore::open(&config_path).unwrap());
    let snapshot = store.current();
    let mut global = snapshot.global.clone();
    global.max_size = 0;

    let collector = Collector::new(Arc::clone(&store), ActivityLoggerHandle::disconnected());
    let report = collector.collect(&snapshot.apps[0], &global).unwrap();

    // A zero quota can never be satisfied (0 >= 0), even by an emptied tree.
    assert_eq!(report.outcome, CollectionOutcome::StillOverQuota);
    assert!(!target.join("ancient").exists());

    global.max_size = 1;
    let report = collector.collect(&snapshot.apps[0], &global).unwrap();
    match report.outcome {
        CollectionOutcome::Archived { files, .. } => assert_eq!(files, 1),
        other => panic!("expected Archived, got {other:?}"),
    }
    let snapshot_dir = report.snapshot_dir.unwrap();
    assert_eq!(fs::read(snapshot_dir.join("api.log")).unwrap(), b"fresh content");
}

// Scenario D: empty_origin truncates the source without harming the copy.
#[test]
fn empty_origin_truncates_source_after_copy() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("logs");
    fs::create_dir_all(&logs).unwrap();
    fs::write(logs.join("api.log"), b"about to be archived and emptied").unwrap();

    let target = dir.path().join("archive");
    fs::create_dir_all(&target).unwrap();

    let mut app = AppFixture::new("api", &logs, &["api.log"]);
    app.empty_origin = true;
    let config_path = common::write_config(
        &dir.path().join("config.yaml"),
        &target,
        10,
        true,
        &[app],
    );
    let store = Arc::new(ConfigStore::open(&config_path).unwrap());
    let snapshot = store.current();

    let collector = Collector::new(Arc::clone(&store), ActivityLoggerHandle::disconnected());
    let report = collector
        .collect(&snapshot.apps[0], &snapshot.global)
        .unwrap();

    let snapshot_dir = report.snapshot_dir.unwrap();
    assert_eq!(
        fs::read(snapshot_dir.join("api.log")).unwrap(),
        b"about to be archived and emptied"
    );
    // Exactly zero bytes — true truncation, not a placeholder string.
    let source = fs::read(logs.join("api.log")).unwrap();
    assert!(source.is_empty(), "source should be empty, got {source:?}");
}
