//! Change detection between the current tree and the last build snapshot
//!
//! Detection prefers a VCS diff (cheap, no tree hashing) and falls back to
//! full SHA-256 comparison when the VCS is unavailable or fails. Nothing
//! in here fails hard: every internal error degrades to the conservative
//! "treat everything as changed" report with a logged reason.

use crate::config::EngineConfig;
use crate::error::DetectionError;
use crate::fs::{hash_files, FileEnumerator, FileHashes};
use crate::snapshot::BuildSnapshot;
use crate::vcs::VcsAdapter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How a change report was produced
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    /// VCS diff between recorded and current revision
    Vcs,
    /// Full file-hash comparison against the snapshot
    Hash,
    /// No baseline available; everything treated as added
    None,
}

/// Classification of every tracked file relative to the last snapshot
///
/// `changed ∪ added ∪ deleted ∪ unchanged` covers `previous ∪ current`,
/// with each file in exactly one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeReport {
    pub changed: BTreeSet<String>,
    pub added: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
    pub unchanged: BTreeSet<String>,
    /// Fraction of considered files that changed, in `0.0..=1.0`
    pub change_ratio: f64,
    pub method: DetectionMethod,
}

impl ChangeReport {
    /// Report for a tree with no usable baseline: everything is new
    pub fn all_added(current: &[String]) -> Self {
        Self {
            changed: BTreeSet::new(),
            added: current.iter().cloned().collect(),
            deleted: BTreeSet::new(),
            unchanged: BTreeSet::new(),
            change_ratio: 1.0,
            method: DetectionMethod::None,
        }
    }

    /// Files that changed or appeared; the seed set for impact analysis
    pub fn touched(&self) -> BTreeSet<String> {
        self.changed.union(&self.added).cloned().collect()
    }

    pub fn total_considered(&self) -> usize {
        self.changed.len() + self.added.len() + self.deleted.len() + self.unchanged.len()
    }

    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty() || !self.added.is_empty() || !self.deleted.is_empty()
    }

    fn finalize(mut self) -> Self {
        let total = self.total_considered();
        let touched = self.changed.len() + self.added.len() + self.deleted.len();
        self.change_ratio = if total == 0 {
            0.0
        } else {
            touched as f64 / total as f64
        };
        self
    }
}

/// Computes a [`ChangeReport`] for a project root against a prior snapshot
pub struct ChangeDetector {
    root: PathBuf,
    config: EngineConfig,
    vcs: Arc<dyn VcsAdapter>,
}

impl ChangeDetector {
    pub fn new(root: PathBuf, config: &EngineConfig, vcs: Arc<dyn VcsAdapter>) -> Self {
        Self {
            root,
            config: config.clone(),
            vcs,
        }
    }

    /// Detects changes since `previous`
    ///
    /// Never fails: VCS errors fall back to hashing, and hashing errors
    /// fall back to the everything-added report.
    pub fn detect(&self, previous: Option<&BuildSnapshot>) -> ChangeReport {
        let start = Instant::now();
        let current = FileEnumerator::new(self.root.clone(), &self.config).enumerate();

        let previous = match previous {
            Some(p) => p,
            None => {
                info!(
                    files = current.len(),
                    "No previous snapshot, treating all files as added"
                );
                return ChangeReport::all_added(&current);
            }
        };

        let report = match self.detect_via_vcs(previous, &current) {
            Ok(report) => report,
            Err(err) => {
                warn!(reason = %err, "VCS detection unavailable, falling back to hash comparison");
                match self.detect_via_hashes(previous, &current) {
                    Ok(report) => report,
                    Err(err) => {
                        warn!(reason = %err, "Hash comparison failed, treating all files as changed");
                        ChangeReport::all_added(&current)
                    }
                }
            }
        };

        info!(
            method = ?report.method,
            changed = report.changed.len(),
            added = report.added.len(),
            deleted = report.deleted.len(),
            unchanged = report.unchanged.len(),
            change_ratio = format!("{:.1}%", report.change_ratio * 100.0),
            duration_ms = start.elapsed().as_millis() as u64,
            "Change detection complete"
        );
        report
    }

    /// Hashes the current tree and packages it as the next snapshot
    pub fn snapshot_now(&self) -> Result<BuildSnapshot, DetectionError> {
        let files = FileEnumerator::new(self.root.clone(), &self.config).enumerate();
        let abort = AtomicBool::new(false);
        let hashes = hash_files(&self.root, &files, self.config.max_parallelism, &abort)?;
        let revision = if self.vcs.is_available() {
            self.vcs.current_revision().ok()
        } else {
            None
        };
        Ok(BuildSnapshot::new(revision, hashes))
    }

    fn detect_via_vcs(
        &self,
        previous: &BuildSnapshot,
        current: &[String],
    ) -> Result<ChangeReport, DetectionError> {
        let previous_revision = previous
            .vcs_revision
            .as_deref()
            .ok_or_else(|| DetectionError::Vcs("Snapshot has no recorded revision".to_string()))?;
        if !self.vcs.is_available() {
            return Err(DetectionError::Vcs("VCS not available".to_string()));
        }

        let current_revision = self.vcs.current_revision()?;
        let diff = self
            .vcs
            .changed_paths(previous_revision, &current_revision)?;

        let current_set: BTreeSet<String> = current.iter().cloned().collect();
        let mut changed = BTreeSet::new();
        let mut added = BTreeSet::new();
        let mut deleted = BTreeSet::new();

        for path in diff.changed.iter().chain(diff.added.iter()) {
            if !self.is_tracked(path) {
                continue;
            }
            if !current_set.contains(path) {
                continue;
            }
            if previous.file_hashes.contains_key(path) {
                changed.insert(path.clone());
            } else {
                added.insert(path.clone());
            }
        }
        for path in &diff.deleted {
            if previous.file_hashes.contains_key(path) && !current_set.contains(path) {
                deleted.insert(path.clone());
            }
        }
        // Files the snapshot knew about that vanished without the diff
        // noticing (e.g., deleted while untracked) still count as deleted.
        for path in previous.file_hashes.keys() {
            if !current_set.contains(path) {
                deleted.insert(path.clone());
            }
        }

        let unchanged: BTreeSet<String> = current_set
            .iter()
            .filter(|p| !changed.contains(*p) && !added.contains(*p))
            .cloned()
            .collect();

        debug!(
            from = previous_revision,
            to = %current_revision,
            "Detected changes via VCS diff"
        );
        Ok(ChangeReport {
            changed,
            added,
            deleted,
            unchanged,
            change_ratio: 0.0,
            method: DetectionMethod::Vcs,
        }
        .finalize())
    }

    fn detect_via_hashes(
        &self,
        previous: &BuildSnapshot,
        current: &[String],
    ) -> Result<ChangeReport, DetectionError> {
        let abort = AtomicBool::new(false);
        let current_hashes: FileHashes =
            hash_files(&self.root, current, self.config.max_parallelism, &abort)?;

        let mut changed = BTreeSet::new();
        let mut added = BTreeSet::new();
        let mut deleted = BTreeSet::new();
        let mut unchanged = BTreeSet::new();

        for (path, digest) in &current_hashes {
            match previous.file_hashes.get(path) {
                Some(previous_digest) if previous_digest == digest => {
                    unchanged.insert(path.clone());
                }
                Some(_) => {
                    changed.insert(path.clone());
                }
                None => {
                    added.insert(path.clone());
                }
            }
        }
        for path in previous.file_hashes.keys() {
            if !current_hashes.contains_key(path) {
                deleted.insert(path.clone());
            }
        }

        Ok(ChangeReport {
            changed,
            added,
            deleted,
            unchanged,
            change_ratio: 0.0,
            method: DetectionMethod::Hash,
        }
        .finalize())
    }

    fn is_tracked(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.config.is_tracked_extension(ext))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::NoVcs;
    use std::fs;
    use tempfile::TempDir;

    fn detector(root: &Path) -> ChangeDetector {
        ChangeDetector::new(
            root.to_path_buf(),
            &EngineConfig::default(),
            Arc::new(NoVcs),
        )
    }

    #[test]
    fn test_no_snapshot_means_all_added() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "x = 1").unwrap();
        fs::write(dir.path().join("b.py"), "y = 2").unwrap();

        let report = detector(dir.path()).detect(None);
        assert_eq!(report.method, DetectionMethod::None);
        assert_eq!(report.added.len(), 2);
        assert!(report.changed.is_empty());
        assert_eq!(report.change_ratio, 1.0);
    }

    #[test]
    fn test_idempotent_detection() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "x = 1").unwrap();

        let d = detector(dir.path());
        let snapshot = d.snapshot_now().unwrap();
        let report = d.detect(Some(&snapshot));

        assert_eq!(report.method, DetectionMethod::Hash);
        assert!(!report.has_changes());
        assert_eq!(report.change_ratio, 0.0);
        assert_eq!(report.unchanged.len(), 1);
    }

    #[test]
    fn test_modified_file_is_changed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.py"), "x = 1").unwrap();
        fs::write(dir.path().join("b.py"), "y = 2").unwrap();

        let d = detector(dir.path());
        let snapshot = d.snapshot_now().unwrap();
        fs::write(dir.path().join("a.py"), "x = 999").unwrap();

        let report = d.detect(Some(&snapshot));
        assert_eq!(report.changed.iter().collect::<Vec<_>>(), vec!["a.py"]);
        assert_eq!(report.unchanged.iter().collect::<Vec<_>>(), vec!["b.py"]);
        assert!((report.change_ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_categories_partition_all_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("keep.py"), "k").unwrap();
        fs::write(dir.path().join("edit.py"), "before").unwrap();
        fs::write(dir.path().join("gone.py"), "bye").unwrap();

        let d = detector(dir.path());
        let snapshot = d.snapshot_now().unwrap();

        fs::write(dir.path().join("edit.py"), "after").unwrap();
        fs::remove_file(dir.path().join("gone.py")).unwrap();
        fs::write(dir.path().join("new.py"), "hi").unwrap();

        let report = d.detect(Some(&snapshot));
        assert_eq!(report.changed.iter().collect::<Vec<_>>(), vec!["edit.py"]);
        assert_eq!(report.added.iter().collect::<Vec<_>>(), vec!["new.py"]);
        assert_eq!(report.deleted.iter().collect::<Vec<_>>(), vec!["gone.py"]);
        assert_eq!(report.unchanged.iter().collect::<Vec<_>>(), vec!["keep.py"]);

        // Exactly one category per file, covering previous ∪ current
        assert_eq!(report.total_considered(), 4);
        assert!((report.change_ratio - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_touched_is_changed_union_added() {
        let report = ChangeReport {
            changed: ["a.py".to_string()].into_iter().collect(),
            added: ["b.py".to_string()].into_iter().collect(),
            deleted: BTreeSet::new(),
            unchanged: BTreeSet::new(),
            change_ratio: 1.0,
            method: DetectionMethod::Hash,
        };
        let touched = report.touched();
        assert!(touched.contains("a.py"));
        assert!(touched.contains("b.py"));
        assert_eq!(touched.len(), 2);
    }
}
