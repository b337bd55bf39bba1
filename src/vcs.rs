//! Version control adapters for change detection
//!
//! The change detector prefers a VCS diff over hashing the whole tree.
//! Adapters are a trait so tests can substitute fakes, mirroring how the
//! filesystem seam is abstracted elsewhere in the codebase. Any adapter
//! failure is recoverable: the detector falls back to hash comparison.

use crate::error::DetectionError;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Paths touched between two revisions, already split by kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VcsChanges {
    pub changed: Vec<String>,
    pub added: Vec<String>,
    pub deleted: Vec<String>,
}

impl VcsChanges {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.deleted.is_empty()
    }
}

/// Abstraction over version control queries
///
/// Implementations must report paths relative to the project root with
/// forward-slash separators.
pub trait VcsAdapter: Send + Sync {
    /// Whether the adapter can answer queries for this project at all
    fn is_available(&self) -> bool;

    /// Identifier of the current revision (e.g., a commit hash)
    fn current_revision(&self) -> Result<String, DetectionError>;

    /// Paths changed between two revisions, including uncommitted
    /// working-tree edits on top of `to`
    fn changed_paths(&self, from: &str, to: &str) -> Result<VcsChanges, DetectionError>;
}

/// Git adapter shelling out to the `git` binary
///
/// Process-level timeouts are the caller's concern; any git failure maps
/// to a [`DetectionError`] and triggers the hash fallback upstream.
pub struct GitVcs {
    root: PathBuf,
}

impl GitVcs {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn git(&self, args: &[&str]) -> Result<String, DetectionError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| DetectionError::Vcs(format!("Failed to spawn git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DetectionError::Vcs(format!(
                "git {} failed: {}",
                args.first().unwrap_or(&"?"),
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| DetectionError::Vcs(format!("git produced non-UTF8 output: {}", e)))
    }

    /// Uncommitted working-tree edits from `git status --porcelain`
    ///
    /// Committed-diff-only detection misses in-progress edits, so these
    /// are always unioned into the result.
    fn working_tree_changes(&self, changes: &mut VcsChanges) -> Result<(), DetectionError> {
        let output = self.git(&["status", "--porcelain"])?;
        parse_status_porcelain(&output, changes);
        Ok(())
    }
}

impl VcsAdapter for GitVcs {
    fn is_available(&self) -> bool {
        self.root.join(".git").exists()
    }

    fn current_revision(&self) -> Result<String, DetectionError> {
        let output = self.git(&["rev-parse", "HEAD"])?;
        let revision = output.trim().to_string();
        if revision.is_empty() {
            return Err(DetectionError::Vcs("Empty revision from git".to_string()));
        }
        Ok(revision)
    }

    fn changed_paths(&self, from: &str, to: &str) -> Result<VcsChanges, DetectionError> {
        let mut changes = VcsChanges::default();

        if from != to {
            let output = self.git(&["diff", "--name-status", from, to])?;
            for line in output.lines() {
                let mut parts = line.split('\t');
                let status = match parts.next() {
                    Some(s) if !s.is_empty() => s,
                    _ => continue,
                };
                match status.chars().next() {
                    Some('A') => {
                        if let Some(path) = parts.next() {
                            push_unique(&mut changes.added, path.to_string());
                        }
                    }
                    Some('D') => {
                        if let Some(path) = parts.next() {
                            push_unique(&mut changes.deleted, path.to_string());
                        }
                    }
                    Some('R') | Some('C') => {
                        // Rename/copy: old path goes away, new path appears
                        if let Some(old) = parts.next() {
                            push_unique(&mut changes.deleted, old.to_string());
                        }
                        if let Some(new) = parts.next() {
                            push_unique(&mut changes.added, new.to_string());
                        }
                    }
                    Some(_) => {
                        if let Some(path) = parts.next() {
                            push_unique(&mut changes.changed, path.to_string());
                        }
                    }
                    None => continue,
                }
            }
        }

        if let Err(err) = self.working_tree_changes(&mut changes) {
            warn!(error = %err, "Failed to read working tree status, diff may miss uncommitted edits");
        }

        debug!(
            changed = changes.changed.len(),
            added = changes.added.len(),
            deleted = changes.deleted.len(),
            "VCS diff computed"
        );
        Ok(changes)
    }
}

/// Null adapter for projects without version control
///
/// Always reports unavailable, forcing the hash comparison path.
pub struct NoVcs;

impl VcsAdapter for NoVcs {
    fn is_available(&self) -> bool {
        false
    }

    fn current_revision(&self) -> Result<String, DetectionError> {
        Err(DetectionError::Vcs("No VCS adapter configured".to_string()))
    }

    fn changed_paths(&self, _from: &str, _to: &str) -> Result<VcsChanges, DetectionError> {
        Err(DetectionError::Vcs("No VCS adapter configured".to_string()))
    }
}

/// Picks the right adapter for a project root
pub fn detect_vcs(root: &Path) -> Box<dyn VcsAdapter> {
    if root.join(".git").exists() {
        Box::new(GitVcs::new(root.to_path_buf()))
    } else {
        Box::new(NoVcs)
    }
}

/// Parses `git status --porcelain` output into the change buckets
fn parse_status_porcelain(output: &str, changes: &mut VcsChanges) {
    for line in output.lines() {
        if line.len() < 4 {
            continue;
        }
        let status = line[..2].trim();
        let path = line[3..].trim();

        // Renames and copies carry "old -> new" in the path field
        if status.starts_with('R') || status.starts_with('C') {
            if let Some((old, new)) = path.split_once(" -> ") {
                push_unique(&mut changes.deleted, old.trim().to_string());
                push_unique(&mut changes.added, new.trim().to_string());
                continue;
            }
        }

        match status {
            "??" | "A" | "AM" => push_unique(&mut changes.added, path.to_string()),
            "D" | "AD" => push_unique(&mut changes.deleted, path.to_string()),
            _ => push_unique(&mut changes.changed, path.to_string()),
        }
    }
}

fn push_unique(list: &mut Vec<String>, path: String) {
    if !list.contains(&path) {
        list.push(path);
    }
}
