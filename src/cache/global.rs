//! Machine-scoped report cache shared across projects
//!
//! Keyed by task + project type + tech stack, 7-day default TTL. When an
//! exact key misses, callers may opt into a similarity search over
//! non-expired entries of the same project type. The search is never
//! automatic: surprising stale reuse is worse than a recomputation.

use super::{cache_key, is_expired, normalize_task, CacheResult, MissReason, CACHE_SCHEMA_VERSION};
use crate::fs::{read_json_opt, write_json_atomic};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Weighting of the two similarity components
const TASK_SIMILARITY_WEIGHT: f64 = 0.7;
const STACK_OVERLAP_WEIGHT: f64 = 0.3;

/// One global cache entry, self-describing on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalEntry {
    pub schema_version: u32,
    pub cache_key: String,
    pub task: String,
    pub normalized_task: String,
    pub project_type: String,
    pub tech_stack: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub accessed_count: u64,
    pub last_accessed: DateTime<Utc>,
    pub payload: String,
    pub metadata: BTreeMap<String, String>,
}

/// A similarity-search candidate with its score
#[derive(Debug, Clone)]
pub struct SimilarMatch {
    pub entry: GlobalEntry,
    pub score: f64,
}

pub struct GlobalReportCache {
    dir: PathBuf,
    ttl: Duration,
    similarity_threshold: f64,
}

impl GlobalReportCache {
    pub fn new(dir: PathBuf, ttl: Duration, similarity_threshold: f64) -> Self {
        Self {
            dir,
            ttl,
            similarity_threshold,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable key over normalized task, project type, and sorted stack
    pub fn key_for(task: &str, project_type: &str, tech_stack: &[String]) -> String {
        let mut stack: Vec<String> = tech_stack.iter().map(|s| s.to_lowercase()).collect();
        stack.sort();
        cache_key(&[&normalize_task(task), project_type, &stack.join(",")])
    }

    /// Exact-key lookup, bumping access metadata on a hit
    pub fn get(
        &self,
        task: &str,
        project_type: &str,
        tech_stack: &[String],
    ) -> CacheResult<GlobalEntry> {
        let key = Self::key_for(task, project_type, tech_stack);
        let path = self.entry_path(&key);
        if !path.exists() {
            return Err(MissReason::NotFound);
        }
        let mut entry: GlobalEntry = read_json_opt(&path)
            .ok_or_else(|| MissReason::Corrupt("unreadable entry".to_string()))?;
        if entry.schema_version != CACHE_SCHEMA_VERSION {
            return Err(MissReason::Corrupt(format!(
                "schema version {} unsupported",
                entry.schema_version
            )));
        }
        if is_expired(entry.created_at, self.ttl) {
            return Err(MissReason::Expired {
                created_at: entry.created_at,
            });
        }

        entry.accessed_count += 1;
        entry.last_accessed = Utc::now();
        if let Err(err) = write_json_atomic(&path, &entry) {
            warn!(error = %err, "Failed to update global cache access metadata");
        }

        debug!(key = %key, project_type = %project_type, "Global report cache hit");
        Ok(entry)
    }

    /// Stores an entry, refreshing metadata on overwrite
    pub fn put(
        &self,
        task: &str,
        project_type: &str,
        tech_stack: &[String],
        payload: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<String> {
        let key = Self::key_for(task, project_type, tech_stack);
        let now = Utc::now();
        let entry = GlobalEntry {
            schema_version: CACHE_SCHEMA_VERSION,
            cache_key: key.clone(),
            task: task.to_string(),
            normalized_task: normalize_task(task),
            project_type: project_type.to_string(),
            tech_stack: tech_stack.to_vec(),
            created_at: now,
            accessed_count: 0,
            last_accessed: now,
            payload: payload.to_string(),
            metadata,
        };

        write_json_atomic(&self.entry_path(&key), &entry)?;
        debug!(key = %key, project_type = %project_type, "Global report cached");
        Ok(key)
    }

    /// Opt-in similarity search over non-expired entries
    ///
    /// Scans entries sharing `project_type`, scores each by weighted task
    /// word similarity and tech-stack overlap, and returns candidates at
    /// or above the threshold sorted by descending score.
    pub fn find_similar(
        &self,
        task: &str,
        project_type: &str,
        tech_stack: &[String],
    ) -> Vec<SimilarMatch> {
        let query_words = task_words(&normalize_task(task));
        let query_stack = stack_set(tech_stack);

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut matches = Vec::new();
        for dir_entry in entries.flatten() {
            let path = dir_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let entry: GlobalEntry = match read_json_opt(&path) {
                Some(e) => e,
                None => continue,
            };
            if entry.project_type != project_type {
                continue;
            }
            if is_expired(entry.created_at, self.ttl) {
                continue;
            }

            let task_score = word_jaccard(&query_words, &task_words(&entry.normalized_task));
            let stack_score = overlap_ratio(&query_stack, &stack_set(&entry.tech_stack));
            let score =
                TASK_SIMILARITY_WEIGHT * task_score + STACK_OVERLAP_WEIGHT * stack_score;
            if score >= self.similarity_threshold {
                matches.push(SimilarMatch { entry, score });
            }
        }

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        debug!(
            candidates = matches.len(),
            project_type = %project_type,
            "Similarity search complete"
        );
        matches
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

fn task_words(normalized: &str) -> BTreeSet<String> {
    normalized.split_whitespace().map(|w| w.to_string()).collect()
}

fn stack_set(stack: &[String]) -> BTreeSet<String> {
    stack.iter().map(|s| s.to_lowercase()).collect()
}

/// Two words match when identical or one is a prefix of the other
/// ("app" / "application"); short words must match exactly
fn words_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    a.len() >= 3 && b.len() >= 3 && (a.starts_with(b) || b.starts_with(a))
}

/// Jaccard over word sets with prefix-tolerant matching
fn word_jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let matched = a
        .iter()
        .filter(|word| b.iter().any(|other| words_match(word, other)))
        .count();
    let union = a.len() + b.len() - matched;
    if union == 0 {
        return 1.0;
    }
    matched as f64 / union as f64
}

/// Plain intersection-over-union for tech stacks
fn overlap_ratio(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache(dir: &TempDir) -> GlobalReportCache {
        GlobalReportCache::new(dir.path().to_path_buf(), Duration::from_secs(3600), 0.85)
    }

    fn stack(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        cache
            .put(
                "Build weather app with React",
                "web-app",
                &stack(&["React", "Flask"]),
                "report body",
                BTreeMap::new(),
            )
            .unwrap();
        let entry = cache
            .get(
                "Build weather app with React",
                "web-app",
                &stack(&["React", "Flask"]),
            )
            .unwrap();
        assert_eq!(entry.payload, "report body");
        assert_eq!(entry.project_type, "web-app");
    }

    #[test]
    fn test_stack_order_does_not_matter() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        cache
            .put("task", "web-app", &stack(&["React", "Flask"]), "r", BTreeMap::new())
            .unwrap();
        assert!(cache
            .get("task", "web-app", &stack(&["flask", "react"]))
            .is_ok());
    }

    #[test]
    fn test_similarity_finds_rephrased_task() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        cache
            .put(
                "Build weather app with React",
                "web-app",
                &stack(&["React"]),
                "cached report",
                BTreeMap::new(),
            )
            .unwrap();

        // Different phrasing: exact key misses, similarity hits
        let query = "Build weather application with React";
        assert_eq!(
            cache.get(query, "web-app", &stack(&["React"])).unwrap_err(),
            MissReason::NotFound
        );
        let matches = cache.find_similar(query, "web-app", &stack(&["React"]));
        assert_eq!(matches.len(), 1);
        assert!(matches[0].score >= 0.85);
        assert_eq!(matches[0].entry.payload, "cached report");
    }

    #[test]
    fn test_similarity_is_project_type_scoped() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        cache
            .put("Build weather app", "cli-tool", &stack(&["python"]), "r", BTreeMap::new())
            .unwrap();
        let matches = cache.find_similar("Build weather app", "web-app", &stack(&["python"]));
        assert!(matches.is_empty());
    }

    #[test]
    fn test_unrelated_task_scores_below_threshold() {
        let dir = TempDir::new().unwrap();
        let cache = cache(&dir);

        cache
            .put(
                "Build inventory tracker dashboard",
                "web-app",
                &stack(&["Vue"]),
                "r",
                BTreeMap::new(),
            )
            .unwrap();
        let matches = cache.find_similar("Write a chess engine", "web-app", &stack(&["Rust"]));
        assert!(matches.is_empty());
    }

    #[test]
    fn test_expired_entries_excluded_from_similarity() {
        let dir = TempDir::new().unwrap();
        let cache = GlobalReportCache::new(dir.path().to_path_buf(), Duration::ZERO, 0.85);

        cache
            .put("Build weather app", "web-app", &stack(&["React"]), "r", BTreeMap::new())
            .unwrap();
        std::thread::sleep(Duration::from_millis(10));
        let matches = cache.find_similar("Build weather app", "web-app", &stack(&["React"]));
        assert!(matches.is_empty());
    }

    #[test]
    fn test_word_jaccard_prefix_tolerance() {
        let a = task_words("build weather app with react");
        let b = task_words("build weather application with react");
        assert!(word_jaccard(&a, &b) > 0.9);
    }

    #[test]
    fn test_overlap_ratio() {
        let a: BTreeSet<String> = ["react", "flask"].iter().map(|s| s.to_string()).collect();
        let b: BTreeSet<String> = ["react"].iter().map(|s| s.to_string()).collect();
        assert!((overlap_ratio(&a, &b) - 0.5).abs() < 1e-9);
    }
}
