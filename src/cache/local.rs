//! Project-scoped report cache: exact key match, 24h default TTL
//!
//! One payload file per key plus a sidecar metadata JSON. The payload is
//! stored verbatim so a hit returns it byte-identical.

use super::{cache_key, is_expired, normalize_task, CacheResult, MissReason, CACHE_SCHEMA_VERSION};
use crate::fs::{read_json_opt, write_bytes_atomic, write_json_atomic};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Sidecar metadata stored next to each payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalEntryMetadata {
    pub schema_version: u32,
    pub original_query: String,
    pub normalized_query: String,
    pub mode: String,
    pub cache_key: String,
    pub created_at: DateTime<Utc>,
    pub accessed_count: u64,
    pub last_accessed: DateTime<Utc>,
}

pub struct LocalReportCache {
    dir: PathBuf,
    ttl: Duration,
}

impl LocalReportCache {
    pub fn new(dir: PathBuf, ttl: Duration) -> Self {
        Self { dir, ttl }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable key over the normalized task and mode
    pub fn key_for(task: &str, mode: &str) -> String {
        cache_key(&[&normalize_task(task), mode])
    }

    /// Looks up a report, bumping access metadata on a hit
    ///
    /// Expiry is checked lazily here; nothing sweeps eagerly except the
    /// cache manager.
    pub fn get(&self, task: &str, mode: &str) -> CacheResult<String> {
        let key = Self::key_for(task, mode);
        let mut metadata: LocalEntryMetadata =
            read_json_required(&self.metadata_path(&key))?;
        if metadata.schema_version != CACHE_SCHEMA_VERSION {
            return Err(MissReason::Corrupt(format!(
                "schema version {} unsupported",
                metadata.schema_version
            )));
        }
        if is_expired(metadata.created_at, self.ttl) {
            return Err(MissReason::Expired {
                created_at: metadata.created_at,
            });
        }

        let payload = fs::read_to_string(self.payload_path(&key)).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                MissReason::NotFound
            } else {
                MissReason::Corrupt(err.to_string())
            }
        })?;

        metadata.accessed_count += 1;
        metadata.last_accessed = Utc::now();
        if let Err(err) = write_json_atomic(&self.metadata_path(&key), &metadata) {
            warn!(error = %err, "Failed to update cache access metadata");
        }

        debug!(key = %key, mode = %mode, "Local report cache hit");
        Ok(payload)
    }

    /// Stores a report, refreshing metadata on overwrite
    pub fn put(&self, task: &str, mode: &str, payload: &str) -> Result<String> {
        let key = Self::key_for(task, mode);
        let now = Utc::now();
        let metadata = LocalEntryMetadata {
            schema_version: CACHE_SCHEMA_VERSION,
            original_query: task.to_string(),
            normalized_query: normalize_task(task),
            mode: mode.to_string(),
            cache_key: key.clone(),
            created_at: now,
            accessed_count: 0,
            last_accessed: now,
        };

        write_bytes_atomic(&self.payload_path(&key), payload.as_bytes())?;
        write_json_atomic(&self.metadata_path(&key), &metadata)?;
        debug!(key = %key, mode = %mode, "Local report cached");
        Ok(key)
    }

    fn payload_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.payload", key))
    }

    fn metadata_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.meta.json", key))
    }
}

/// Missing file is `NotFound`; unreadable or unparseable is `Corrupt`
fn read_json_required<T: serde::de::DeserializeOwned>(path: &Path) -> CacheResult<T> {
    if !path.exists() {
        return Err(MissReason::NotFound);
    }
    read_json_opt(path).ok_or_else(|| MissReason::Corrupt("unreadable metadata".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache(dir: &TempDir, ttl: Duration) -> LocalReportCache {
        LocalReportCache::new(dir.path().to_path_buf(), ttl)
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, Duration::from_secs(3600));
        let payload = "# Research Report\n\nWeather APIs: \u{2600}\n";

        cache.put("Build weather app", "research", payload).unwrap();
        let hit = cache.get("Build weather app", "research").unwrap();
        assert_eq!(hit, payload);
    }

    #[test]
    fn test_key_is_normalization_insensitive() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, Duration::from_secs(3600));

        cache.put("Build Weather App!", "research", "report").unwrap();
        assert!(cache.get("build   weather app", "research").is_ok());
    }

    #[test]
    fn test_mode_separates_entries() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, Duration::from_secs(3600));

        cache.put("task", "research", "r1").unwrap();
        cache.put("task", "plan", "r2").unwrap();
        assert_eq!(cache.get("task", "research").unwrap(), "r1");
        assert_eq!(cache.get("task", "plan").unwrap(), "r2");
    }

    #[test]
    fn test_miss_is_not_found() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, Duration::from_secs(3600));
        assert_eq!(
            cache.get("never stored", "research").unwrap_err(),
            MissReason::NotFound
        );
    }

    #[test]
    fn test_zero_ttl_expires() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, Duration::ZERO);

        cache.put("task", "research", "report").unwrap();
        std::thread::sleep(Duration::from_millis(10));
        assert!(matches!(
            cache.get("task", "research").unwrap_err(),
            MissReason::Expired { .. }
        ));
    }

    #[test]
    fn test_corrupt_metadata_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, Duration::from_secs(3600));

        let key = cache.put("task", "research", "report").unwrap();
        std::fs::write(dir.path().join(format!("{}.meta.json", key)), "{oops").unwrap();
        assert!(matches!(
            cache.get("task", "research").unwrap_err(),
            MissReason::Corrupt(_)
        ));
    }

    #[test]
    fn test_access_count_increments() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, Duration::from_secs(3600));

        let key = cache.put("task", "research", "report").unwrap();
        cache.get("task", "research").unwrap();
        cache.get("task", "research").unwrap();

        let metadata: LocalEntryMetadata =
            read_json_opt(&dir.path().join(format!("{}.meta.json", key))).unwrap();
        assert_eq!(metadata.accessed_count, 2);
    }

    #[test]
    fn test_overwrite_refreshes_metadata() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir, Duration::from_secs(3600));

        let key = cache.put("task", "research", "v1").unwrap();
        cache.get("task", "research").unwrap();
        cache.put("task", "research", "v2").unwrap();

        assert_eq!(cache.get("task", "research").unwrap(), "v2");
        let metadata: LocalEntryMetadata =
            read_json_opt(&dir.path().join(format!("{}.meta.json", key))).unwrap();
        // Overwrite reset the counter; the get above brought it to 1
        assert_eq!(metadata.accessed_count, 1);
    }
}
