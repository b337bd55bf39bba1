//! Error types shared across the engine
//!
//! The engine deliberately recovers from most failures internally (falling
//! back to hashing, full rebuilds, or cache misses), so these types mostly
//! show up in logs rather than in caller-facing results.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while detecting changes against the previous snapshot
///
/// Every variant is recovered locally: a VCS failure falls back to hash
/// comparison, and a filesystem failure falls back to treating the whole
/// tree as changed.
#[derive(Debug, Error)]
pub enum DetectionError {
    /// VCS command failed, produced garbage, or no adapter is configured
    #[error("VCS operation failed: {0}")]
    Vcs(String),

    /// Filesystem operation failed for a specific path
    #[error("Filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Hashing was aborted cooperatively via the caller's abort flag
    #[error("Hashing aborted by caller")]
    Aborted,
}

/// Errors raised while constructing the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Project root does not exist
    #[error("Project root not found: {0}")]
    PathNotFound(PathBuf),

    /// Project root is not a directory
    #[error("Project root is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Configuration validation failed
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Filesystem error while preparing engine state directories
    #[error("Failed to prepare engine state: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_error_display() {
        let err = DetectionError::Vcs("git not found".to_string());
        assert!(err.to_string().contains("git not found"));
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::PathNotFound(PathBuf::from("/missing"));
        assert!(err.to_string().contains("/missing"));
    }
}
