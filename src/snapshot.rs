//! Build snapshots: the persisted file-hash baseline
//!
//! A snapshot is written once per completed build and fully replaced by
//! the next one, never merged. A missing or corrupt snapshot degrades to
//! "no baseline", which the change detector treats as everything-added.

use crate::fs::{read_json_opt, write_json_atomic, FileHashes};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Schema version for forward compatibility
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Persisted file-hash baseline from the end of a build
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildSnapshot {
    pub schema_version: u32,
    pub timestamp: DateTime<Utc>,
    pub vcs_revision: Option<String>,
    pub vcs_available: bool,
    pub file_hashes: FileHashes,
    pub total_files: usize,
}

impl BuildSnapshot {
    pub fn new(vcs_revision: Option<String>, file_hashes: FileHashes) -> Self {
        let total_files = file_hashes.len();
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            timestamp: Utc::now(),
            vcs_available: vcs_revision.is_some(),
            vcs_revision,
            file_hashes,
            total_files,
        }
    }
}

/// Loads the previous snapshot, treating absence and corruption alike
pub fn load_snapshot(path: &Path) -> Option<BuildSnapshot> {
    let snapshot: BuildSnapshot = read_json_opt(path)?;
    if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
        debug!(
            found = snapshot.schema_version,
            expected = SNAPSHOT_SCHEMA_VERSION,
            "Snapshot schema mismatch, discarding"
        );
        return None;
    }
    debug!(
        files = snapshot.total_files,
        revision = ?snapshot.vcs_revision,
        "Loaded previous snapshot"
    );
    Some(snapshot)
}

/// Persists a snapshot atomically, replacing any previous one wholesale
pub fn save_snapshot(path: &Path, snapshot: &BuildSnapshot) -> Result<()> {
    write_json_atomic(path, snapshot)?;
    info!(
        path = %path.display(),
        files = snapshot.total_files,
        "Snapshot persisted"
    );
    Ok(())
}
