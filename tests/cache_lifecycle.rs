//! Integration tests for the cache tiers and their housekeeping
//!
//! Exercises the local and global report caches, the snapshot-keyed test
//! result cache, and the manager operations over all three, through the
//! engine facade where possible.

use buildwise::cache::{CacheKind, MissReason};
use buildwise::{EngineConfig, IncrementalEngine};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn engine_for(dir: &TempDir) -> IncrementalEngine {
    let config = EngineConfig {
        global_cache_dir: Some(dir.path().join("global-cache")),
        ..Default::default()
    };
    IncrementalEngine::new(dir.path(), config).unwrap()
}

fn engine_with_ttls(dir: &TempDir, ttl: Duration) -> IncrementalEngine {
    let config = EngineConfig {
        global_cache_dir: Some(dir.path().join("global-cache")),
        local_ttl: ttl,
        global_ttl: ttl,
        test_ttl: ttl,
        ..Default::default()
    };
    IncrementalEngine::new(dir.path(), config).unwrap()
}

#[test]
fn test_local_report_round_trip_through_engine() {
    let dir = TempDir::new().unwrap();
    let engine = engine_for(&dir);
    let report = "# Research\n\nFindings with unicode: \u{2713}\n";

    engine
        .local_cache()
        .put("Build a weather app", "research", report)
        .unwrap();
    let hit = engine
        .local_cache()
        .get("build  a  WEATHER app!", "research")
        .unwrap();
    assert_eq!(hit, report);
}

#[test]
fn test_expired_local_report_misses() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with_ttls(&dir, Duration::ZERO);

    engine
        .local_cache()
        .put("task", "research", "report")
        .unwrap();
    std::thread::sleep(Duration::from_millis(10));

    assert!(matches!(
        engine.local_cache().get("task", "research").unwrap_err(),
        MissReason::Expired { .. }
    ));
}

#[test]
fn test_global_similarity_bridges_rephrased_tasks() {
    let dir = TempDir::new().unwrap();
    let engine = engine_for(&dir);
    let stack = vec!["React".to_string(), "Flask".to_string()];

    engine
        .global_cache()
        .put(
            "Build weather app with React",
            "web-app",
            &stack,
            "cached research report",
            BTreeMap::new(),
        )
        .unwrap();

    // Rephrased task: exact key misses, similarity search recovers it
    let rephrased = "Build weather application with React";
    assert!(engine.global_cache().get(rephrased, "web-app", &stack).is_err());

    let matches = engine.global_cache().find_similar(rephrased, "web-app", &stack);
    assert_eq!(matches.len(), 1);
    assert!(matches[0].score >= 0.85);
    assert_eq!(matches[0].entry.payload, "cached research report");
}

#[test]
fn test_test_results_invalidate_on_any_file_change() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();
    fs::write(dir.path().join("test_app.py"), "def test(): pass\n").unwrap();

    let engine = engine_for(&dir);
    let snapshot = engine.commit_snapshot().unwrap();
    engine
        .test_cache()
        .put(json!({"passed": 5, "failed": 0}), &snapshot.file_hashes)
        .unwrap();

    // Identical tree hits
    let hit = engine.test_cache().get(&snapshot.file_hashes).unwrap();
    assert_eq!(hit["passed"], 5);

    // A one-byte edit to any tracked file is a miss
    fs::write(dir.path().join("app.py"), "x = 2\n").unwrap();
    let edited = engine.commit_snapshot().unwrap();
    match engine.test_cache().get(&edited.file_hashes).unwrap_err() {
        MissReason::SnapshotMismatch { changed, .. } => {
            assert_eq!(changed, vec!["app.py"]);
        }
        other => panic!("expected snapshot mismatch, got {}", other),
    }
}

#[test]
fn test_manager_stats_cover_all_tiers() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
    let engine = engine_for(&dir);

    engine.local_cache().put("t1", "research", "r1").unwrap();
    engine.local_cache().put("t2", "plan", "r2").unwrap();
    engine
        .global_cache()
        .put("t1", "web-app", &[], "r", BTreeMap::new())
        .unwrap();
    let snapshot = engine.commit_snapshot().unwrap();
    engine
        .test_cache()
        .put(json!({"passed": 1}), &snapshot.file_hashes)
        .unwrap();

    let stats = engine.cache_manager().stats();
    assert_eq!(stats.local.entries, 2);
    assert_eq!(stats.local.valid, 2);
    assert_eq!(stats.global.entries, 1);
    assert_eq!(stats.test_results.entries, 1);
    assert!(stats.total_bytes() > 0);
}

#[test]
fn test_clean_expired_removes_only_stale_entries() {
    let dir = TempDir::new().unwrap();
    let stale_engine = engine_with_ttls(&dir, Duration::ZERO);
    stale_engine
        .local_cache()
        .put("old task", "research", "old")
        .unwrap();
    std::thread::sleep(Duration::from_millis(10));

    let removed = stale_engine.cache_manager().clean_expired();
    assert_eq!(removed, 1);

    // A fresh entry under a normal TTL survives the sweep
    let engine = engine_for(&dir);
    engine.local_cache().put("new task", "research", "new").unwrap();
    assert_eq!(engine.cache_manager().clean_expired(), 0);
    assert_eq!(engine.local_cache().get("new task", "research").unwrap(), "new");
}

#[test]
fn test_clear_by_type_is_scoped() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
    let engine = engine_for(&dir);

    engine.local_cache().put("task", "research", "r").unwrap();
    let snapshot = engine.commit_snapshot().unwrap();
    engine
        .test_cache()
        .put(json!({"passed": 1}), &snapshot.file_hashes)
        .unwrap();

    engine
        .cache_manager()
        .clear_by_type(CacheKind::LocalReports)
        .unwrap();

    assert!(matches!(
        engine.local_cache().get("task", "research").unwrap_err(),
        MissReason::NotFound
    ));
    assert!(engine.test_cache().get(&snapshot.file_hashes).is_ok());
}

#[test]
fn test_size_limit_evicts_oldest_entries_first() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig {
        global_cache_dir: Some(dir.path().join("global-cache")),
        max_cache_bytes: 8 * 1024,
        ..Default::default()
    };
    let engine = IncrementalEngine::new(dir.path(), config).unwrap();

    let old_key = engine
        .local_cache()
        .put("old task", "research", &"x".repeat(6 * 1024))
        .unwrap();
    engine
        .local_cache()
        .put("new task", "research", &"y".repeat(6 * 1024))
        .unwrap();

    // Back-date the old entry so eviction order is deterministic
    let old_time = filetime::FileTime::from_unix_time(1_000_000, 0);
    for suffix in [".payload", ".meta.json"] {
        let path = engine
            .local_cache()
            .dir()
            .join(format!("{}{}", old_key, suffix));
        filetime::set_file_mtime(&path, old_time).unwrap();
    }

    let freed = engine.cache_manager().enforce_size_limit().unwrap();
    assert!(freed > 0);
    assert!(matches!(
        engine.local_cache().get("old task", "research").unwrap_err(),
        MissReason::NotFound
    ));
    assert_eq!(
        engine.local_cache().get("new task", "research").unwrap().len(),
        6 * 1024
    );
}

#[test]
fn test_clear_all_empties_every_tier() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.py"), "x = 1\n").unwrap();
    let engine = engine_for(&dir);

    engine.local_cache().put("task", "research", "r").unwrap();
    engine
        .global_cache()
        .put("task", "web-app", &[], "r", BTreeMap::new())
        .unwrap();
    let snapshot = engine.commit_snapshot().unwrap();
    engine
        .test_cache()
        .put(json!({}), &snapshot.file_hashes)
        .unwrap();

    engine.cache_manager().clear_all().unwrap();
    let stats = engine.cache_manager().stats();
    assert_eq!(stats.local.entries, 0);
    assert_eq!(stats.global.entries, 0);
    assert_eq!(stats.test_results.entries, 0);
}
