//! Tiered caches for generated reports and test results
//!
//! Two report tiers (project-local exact-match, machine-global with
//! opt-in similarity search) plus a whole-snapshot-keyed test result
//! cache, all wrapped by [`CacheManager`] for housekeeping.
//!
//! Every lookup returns `Result<T, MissReason>`: parse and IO failures
//! never cross the cache API as errors, they are misses with a reason.

mod global;
mod local;
mod manager;
mod test_results;

pub use global::{GlobalEntry, GlobalReportCache, SimilarMatch};
pub use local::{LocalEntryMetadata, LocalReportCache};
pub use manager::{CacheKind, CacheManager, CacheManagerStats, CacheStats};
pub use test_results::TestResultCache;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// Schema version stamped into every persisted cache entry
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Why a cache lookup missed
///
/// Corruption is deliberately a miss, not an error: a broken entry is
/// ignored and overwritten by the next write.
#[derive(Debug, Clone, PartialEq)]
pub enum MissReason {
    /// No entry under this key
    NotFound,
    /// Entry present but older than its TTL
    Expired { created_at: DateTime<Utc> },
    /// Entry present but unreadable or schema-incompatible
    Corrupt(String),
    /// Test cache only: the snapshot maps differ; paths listed for
    /// diagnostics
    SnapshotMismatch {
        changed: Vec<String>,
        added: Vec<String>,
        removed: Vec<String>,
    },
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissReason::NotFound => write!(f, "not found"),
            MissReason::Expired { created_at } => {
                write!(f, "expired (created {})", created_at)
            }
            MissReason::Corrupt(detail) => write!(f, "corrupt entry: {}", detail),
            MissReason::SnapshotMismatch {
                changed,
                added,
                removed,
            } => write!(
                f,
                "snapshot mismatch ({} changed, {} added, {} removed)",
                changed.len(),
                added.len(),
                removed.len()
            ),
        }
    }
}

/// Result type for every cache lookup
pub type CacheResult<T> = Result<T, MissReason>;

/// Normalizes a task description for keying and similarity
///
/// Lowercases, strips punctuation, and collapses whitespace so phrasing
/// differences do not fragment the key space.
pub fn normalize_task(task: &str) -> String {
    task.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hashes key parts into a stable hex cache key
pub fn cache_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    hex::encode(hasher.finalize())
}

/// Lazy expiry check: an entry is expired once `now - created_at >= ttl`
///
/// A `created_at` in the future (clock skew) counts as not expired.
pub(crate) fn is_expired(created_at: DateTime<Utc>, ttl: Duration) -> bool {
    let age = Utc::now().signed_duration_since(created_at);
    match age.to_std() {
        Ok(age) => age >= ttl,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_task() {
        assert_eq!(
            normalize_task("  Build a Weather App, with React!  "),
            "build a weather app with react"
        );
        assert_eq!(normalize_task("CRUD-API"), "crud api");
    }

    #[test]
    fn test_cache_key_stable_and_distinct() {
        let a = cache_key(&["task", "mode"]);
        let b = cache_key(&["task", "mode"]);
        let c = cache_key(&["task", "other"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        assert!(is_expired(now - chrono::Duration::hours(25), Duration::from_secs(24 * 3600)));
        assert!(!is_expired(now, Duration::from_secs(24 * 3600)));
        // Zero TTL expires immediately
        assert!(is_expired(now - chrono::Duration::seconds(1), Duration::ZERO));
        // Future timestamps are not expired
        assert!(!is_expired(now + chrono::Duration::hours(1), Duration::ZERO));
    }

    #[test]
    fn test_miss_reason_display() {
        assert_eq!(MissReason::NotFound.to_string(), "not found");
        let mismatch = MissReason::SnapshotMismatch {
            changed: vec!["a.py".to_string()],
            added: vec![],
            removed: vec![],
        };
        assert!(mismatch.to_string().contains("1 changed"));
    }
}
