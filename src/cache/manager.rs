//! Cross-cutting cache housekeeping: stats, sweeps, and size limits

use super::is_expired;
use crate::fs::read_json_opt;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Which cache a housekeeping operation targets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    LocalReports,
    GlobalReports,
    TestResults,
}

/// Per-tier counts and sizes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub valid: usize,
    pub expired: usize,
    pub total_bytes: u64,
}

/// Aggregated stats across all tiers, serializable for host dashboards
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheManagerStats {
    pub local: CacheStats,
    pub global: CacheStats,
    pub test_results: CacheStats,
}

impl CacheManagerStats {
    pub fn total_bytes(&self) -> u64 {
        self.local.total_bytes + self.global.total_bytes + self.test_results.total_bytes
    }
}

/// Housekeeping over the three cache directories
///
/// The manager never interprets payloads; it only reads entry metadata
/// for expiry and file metadata for sizes and eviction order.
pub struct CacheManager {
    local_dir: PathBuf,
    global_dir: PathBuf,
    test_dir: PathBuf,
    local_ttl: Duration,
    global_ttl: Duration,
    test_ttl: Duration,
    max_total_bytes: u64,
}

impl CacheManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        local_dir: PathBuf,
        global_dir: PathBuf,
        test_dir: PathBuf,
        local_ttl: Duration,
        global_ttl: Duration,
        test_ttl: Duration,
        max_total_bytes: u64,
    ) -> Self {
        Self {
            local_dir,
            global_dir,
            test_dir,
            local_ttl,
            global_ttl,
            test_ttl,
            max_total_bytes,
        }
    }

    /// Counts, validity breakdowns, and sizes for every tier
    pub fn stats(&self) -> CacheManagerStats {
        CacheManagerStats {
            local: tier_stats(&self.local_dir, ".meta.json", self.local_ttl),
            global: tier_stats(&self.global_dir, ".json", self.global_ttl),
            test_results: tier_stats(&self.test_dir, "test-results.json", self.test_ttl),
        }
    }

    /// Deletes expired entries across all tiers, returning the count
    pub fn clean_expired(&self) -> usize {
        let mut removed = 0;
        removed += sweep_tier(&self.local_dir, ".meta.json", self.local_ttl);
        removed += sweep_tier(&self.global_dir, ".json", self.global_ttl);
        removed += sweep_tier(&self.test_dir, "test-results.json", self.test_ttl);
        if removed > 0 {
            info!(removed, "Expired cache entries cleaned");
        }
        removed
    }

    /// Deletes everything in every tier
    pub fn clear_all(&self) -> Result<()> {
        for kind in [
            CacheKind::LocalReports,
            CacheKind::GlobalReports,
            CacheKind::TestResults,
        ] {
            self.clear_by_type(kind)?;
        }
        Ok(())
    }

    /// Deletes everything in one tier
    pub fn clear_by_type(&self, kind: CacheKind) -> Result<()> {
        let dir = match kind {
            CacheKind::LocalReports => &self.local_dir,
            CacheKind::GlobalReports => &self.global_dir,
            CacheKind::TestResults => &self.test_dir,
        };
        if dir.exists() {
            fs::remove_dir_all(dir)
                .with_context(|| format!("Failed to clear cache dir {}", dir.display()))?;
        }
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to recreate cache dir {}", dir.display()))?;
        info!(kind = ?kind, "Cache cleared");
        Ok(())
    }

    /// Evicts oldest-by-mtime files until total bytes fit the budget
    ///
    /// Returns the bytes freed. Sidecar pairs (payload + metadata) are
    /// evicted together so no orphan halves remain.
    pub fn enforce_size_limit(&self) -> Result<u64> {
        let mut files = Vec::new();
        for dir in [&self.local_dir, &self.global_dir, &self.test_dir] {
            collect_files(dir, &mut files);
        }

        let total: u64 = files.iter().map(|f| f.size).sum();
        if total <= self.max_total_bytes {
            return Ok(0);
        }

        files.sort_by_key(|f| f.modified);
        let mut remaining = total;
        let mut freed = 0u64;
        for file in &files {
            if remaining <= self.max_total_bytes {
                break;
            }
            if !file.path.exists() {
                continue;
            }
            match fs::remove_file(&file.path) {
                Ok(()) => {
                    remaining = remaining.saturating_sub(file.size);
                    freed += file.size;
                }
                Err(err) => {
                    warn!(path = %file.path.display(), error = %err, "Failed to evict cache file");
                    continue;
                }
            }
            for sibling in sidecar_paths(&file.path) {
                if let Ok(metadata) = fs::metadata(&sibling) {
                    if fs::remove_file(&sibling).is_ok() {
                        remaining = remaining.saturating_sub(metadata.len());
                        freed += metadata.len();
                    }
                }
            }
        }

        info!(
            freed_bytes = freed,
            budget_bytes = self.max_total_bytes,
            "Cache size limit enforced"
        );
        Ok(freed)
    }
}

struct CacheFile {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

fn collect_files(dir: &Path, out: &mut Vec<CacheFile>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(_) => continue,
        };
        out.push(CacheFile {
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            path,
        });
    }
}

/// Minimal view of any entry file: only `created_at` matters here
#[derive(Deserialize)]
struct EntryStamp {
    created_at: DateTime<Utc>,
}

fn tier_stats(dir: &Path, entry_suffix: &str, ttl: Duration) -> CacheStats {
    let mut stats = CacheStats::default();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return stats,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Ok(metadata) = entry.metadata() {
            stats.total_bytes += metadata.len();
        }
        if !is_entry_file(&path, entry_suffix) {
            continue;
        }
        stats.entries += 1;
        match read_json_opt::<EntryStamp>(&path) {
            Some(stamp) if !is_expired(stamp.created_at, ttl) => stats.valid += 1,
            _ => stats.expired += 1,
        }
    }
    stats
}

fn sweep_tier(dir: &Path, entry_suffix: &str, ttl: Duration) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !is_entry_file(&path, entry_suffix) {
            continue;
        }
        let expired = match read_json_opt::<EntryStamp>(&path) {
            Some(stamp) => is_expired(stamp.created_at, ttl),
            // Unreadable entries are dead weight; sweep them too
            None => true,
        };
        if !expired {
            continue;
        }
        debug!(path = %path.display(), "Sweeping expired cache entry");
        if fs::remove_file(&path).is_ok() {
            removed += 1;
        }
        for sibling in sidecar_paths(&path) {
            let _ = fs::remove_file(sibling);
        }
    }
    removed
}

fn is_entry_file(path: &Path, suffix: &str) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };
    if suffix == "test-results.json" {
        return name == suffix;
    }
    if suffix == ".json" {
        // Global tier: every .json is an entry
        return name.ends_with(".json");
    }
    name.ends_with(suffix)
}

/// Companion files that must live and die with an entry file
fn sidecar_paths(path: &Path) -> Vec<PathBuf> {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return Vec::new(),
    };
    let parent = match path.parent() {
        Some(p) => p,
        None => return Vec::new(),
    };
    if let Some(key) = name.strip_suffix(".meta.json") {
        return vec![parent.join(format!("{}.payload", key))];
    }
    if let Some(key) = name.strip_suffix(".payload") {
        return vec![parent.join(format!("{}.meta.json", key))];
    }
    if name == "test-results.json" {
        return vec![parent.join("file-hashes.json")];
    }
    if name == "file-hashes.json" {
        return vec![parent.join("test-results.json")];
    }
    Vec::new()
}
