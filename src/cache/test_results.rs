//! Whole-snapshot-keyed test result cache
//!
//! The key is the entire file-hash map, not a digest of it: a hit
//! requires the cached map and the current map to be exactly equal. Any
//! discrepancy is a miss with the differing paths surfaced. This trades
//! precision for correctness: an unnecessary re-run is acceptable, a
//! stale pass is not.

use super::{is_expired, CacheResult, MissReason, CACHE_SCHEMA_VERSION};
use crate::fs::{read_json_opt, write_json_atomic, FileHashes};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const RESULTS_FILE: &str = "test-results.json";
const HASHES_FILE: &str = "file-hashes.json";

/// Opaque test run result plus creation time
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResultsEntry {
    schema_version: u32,
    created_at: DateTime<Utc>,
    payload: serde_json::Value,
}

/// Snapshot sidecar; `created_at` ties it to its results file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HashesEntry {
    schema_version: u32,
    created_at: DateTime<Utc>,
    file_hashes: FileHashes,
}

pub struct TestResultCache {
    dir: PathBuf,
    ttl: Duration,
}

impl TestResultCache {
    pub fn new(dir: PathBuf, ttl: Duration) -> Self {
        Self { dir, ttl }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the cached result only when the snapshot maps are equal
    ///
    /// Both files must exist, parse, and carry the same `created_at`;
    /// otherwise the pair is treated as inconsistent and missed.
    pub fn get(&self, current: &FileHashes) -> CacheResult<serde_json::Value> {
        let results_path = self.dir.join(RESULTS_FILE);
        let hashes_path = self.dir.join(HASHES_FILE);
        if !results_path.exists() || !hashes_path.exists() {
            return Err(MissReason::NotFound);
        }

        let results: ResultsEntry = read_json_opt(&results_path)
            .ok_or_else(|| MissReason::Corrupt("unreadable test results".to_string()))?;
        let hashes: HashesEntry = read_json_opt(&hashes_path)
            .ok_or_else(|| MissReason::Corrupt("unreadable snapshot sidecar".to_string()))?;

        if results.schema_version != CACHE_SCHEMA_VERSION
            || hashes.schema_version != CACHE_SCHEMA_VERSION
        {
            return Err(MissReason::Corrupt("schema version unsupported".to_string()));
        }
        if results.created_at != hashes.created_at {
            return Err(MissReason::Corrupt(
                "results and snapshot sidecar are mutually inconsistent".to_string(),
            ));
        }
        if is_expired(results.created_at, self.ttl) {
            return Err(MissReason::Expired {
                created_at: results.created_at,
            });
        }

        let mut changed = Vec::new();
        let mut added = Vec::new();
        let mut removed = Vec::new();
        for (path, digest) in current {
            match hashes.file_hashes.get(path) {
                Some(cached) if cached == digest => {}
                Some(_) => changed.push(path.clone()),
                None => added.push(path.clone()),
            }
        }
        for path in hashes.file_hashes.keys() {
            if !current.contains_key(path) {
                removed.push(path.clone());
            }
        }
        if !changed.is_empty() || !added.is_empty() || !removed.is_empty() {
            return Err(MissReason::SnapshotMismatch {
                changed,
                added,
                removed,
            });
        }

        debug!("Test result cache hit, snapshot maps identical");
        Ok(results.payload)
    }

    /// Stores the result payload and snapshot map as one unit
    ///
    /// A shared `created_at` keeps the pair mutually consistent; each
    /// file is written atomically.
    pub fn put(&self, payload: serde_json::Value, file_hashes: &FileHashes) -> Result<()> {
        let now = Utc::now();
        write_json_atomic(
            &self.dir.join(HASHES_FILE),
            &HashesEntry {
                schema_version: CACHE_SCHEMA_VERSION,
                created_at: now,
                file_hashes: file_hashes.clone(),
            },
        )?;
        write_json_atomic(
            &self.dir.join(RESULTS_FILE),
            &ResultsEntry {
                schema_version: CACHE_SCHEMA_VERSION,
                created_at: now,
                payload,
            },
        )?;
        debug!(files = file_hashes.len(), "Test results cached");
        Ok(())
    }
}
