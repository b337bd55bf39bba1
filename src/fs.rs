//! File enumeration, hashing, and atomic JSON persistence
//!
//! Everything the engine knows about a project tree flows through this
//! module: which files are tracked (extension allow-list plus ignore
//! globs), their SHA-256 digests, and how persisted artifacts are written
//! so concurrent readers never observe a partial file.

use crate::config::EngineConfig;
use crate::error::DetectionError;
use anyhow::{Context, Result};
use ignore::{overrides::OverrideBuilder, WalkBuilder};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Map from root-relative normalized path to SHA-256 hex digest
pub type FileHashes = BTreeMap<String, String>;

/// Normalizes a path to a project-root-relative string with forward slashes
///
/// Returns `None` for paths outside the root.
pub fn normalize_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        parts.push(component.as_os_str().to_str()?);
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Enumerates tracked files under a project root
///
/// Walks the tree with gitignore support, applies the configured deny
/// globs and extension allow-list, and caps the result at the configured
/// file limit. Walk errors are logged and skipped rather than failing the
/// whole scan.
pub struct FileEnumerator {
    root: PathBuf,
    config: EngineConfig,
}

impl FileEnumerator {
    pub fn new(root: PathBuf, config: &EngineConfig) -> Self {
        Self {
            root,
            config: config.clone(),
        }
    }

    /// Returns tracked files as normalized root-relative paths, sorted
    pub fn enumerate(&self) -> Vec<String> {
        let mut override_builder = OverrideBuilder::new(&self.root);
        for glob in &self.config.ignore_globs {
            if override_builder.add(&format!("!{}", glob)).is_err() {
                warn!(glob = %glob, "Invalid ignore glob, skipping");
            }
        }
        let overrides = match override_builder.build() {
            Ok(o) => Some(o),
            Err(err) => {
                warn!(error = %err, "Failed to build ignore overrides, walking without them");
                None
            }
        };

        let mut builder = WalkBuilder::new(&self.root);
        builder.hidden(false).git_ignore(true);
        if let Some(overrides) = overrides {
            builder.overrides(overrides);
        }

        let mut files = Vec::new();
        for result in builder.build() {
            let entry = match result {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "Failed to read directory entry");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let ext = match path.extension().and_then(|e| e.to_str()) {
                Some(e) => e,
                None => continue,
            };
            if !self.config.is_tracked_extension(ext) {
                continue;
            }

            if files.len() >= self.config.max_tracked_files {
                warn!(
                    max_files = self.config.max_tracked_files,
                    "Reached tracked file limit, stopping scan"
                );
                break;
            }

            if let Some(normalized) = normalize_path(&self.root, path) {
                files.push(normalized);
            }
        }

        files.sort();
        debug!(count = files.len(), root = %self.root.display(), "Enumerated tracked files");
        files
    }
}

/// Computes the SHA-256 hex digest of a single file
pub fn hash_file(path: &Path) -> Result<String, DetectionError> {
    let bytes = fs::read(path).map_err(|source| DetectionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Hashes a set of tracked files with a bounded worker pool
///
/// `abort` is checked cooperatively per file; setting it mid-hash aborts
/// the whole operation. Files that vanish between enumeration and hashing
/// are skipped with a warning.
pub fn hash_files(
    root: &Path,
    files: &[String],
    max_parallelism: usize,
    abort: &AtomicBool,
) -> Result<FileHashes, DetectionError> {
    let workers = max_parallelism.min(files.len()).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| DetectionError::Vcs(format!("Failed to build hashing pool: {}", e)))?;

    let results: Vec<Option<(String, String)>> = pool.install(|| {
        files
            .par_iter()
            .map(|relative| {
                if abort.load(Ordering::Relaxed) {
                    return None;
                }
                let absolute = root.join(relative);
                match hash_file(&absolute) {
                    Ok(digest) => Some((relative.clone(), digest)),
                    Err(err) => {
                        warn!(path = %relative, error = %err, "Failed to hash file, skipping");
                        None
                    }
                }
            })
            .collect()
    });

    if abort.load(Ordering::Relaxed) {
        return Err(DetectionError::Aborted);
    }

    Ok(results.into_iter().flatten().collect())
}

/// Writes a JSON value via temp-file-then-rename
///
/// The temp file lives next to the target so the rename stays on one
/// filesystem. Concurrent writers race benignly: last rename wins and
/// readers only ever see a complete file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let tmp_name = format!(
        ".{}.tmp-{}-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("artifact"),
        process::id(),
        nanos
    );
    let tmp_path = path.with_file_name(tmp_name);

    let json = serde_json::to_string_pretty(value).context("Failed to serialize artifact")?;
    fs::write(&tmp_path, json)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(anyhow::Error::new(err)
            .context(format!("Failed to rename into {}", path.display())));
    }
    Ok(())
}

/// Writes raw bytes via temp-file-then-rename
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let tmp_name = format!(
        ".{}.tmp-{}-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("artifact"),
        process::id(),
        nanos
    );
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, bytes)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to rename into {}", path.display()))?;
    Ok(())
}

/// Reads and parses a JSON artifact, treating absence and corruption alike
///
/// Returns `None` when the file is missing or unparseable; corruption is
/// logged so the caller can rebuild the artifact.
pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Failed to read artifact");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Corrupt artifact, ignoring");
            None
        }
    }
}
