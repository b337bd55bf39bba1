//! Configuration for the incremental engine
//!
//! This module provides the tunable knobs for change detection, planning
//! policy, and the cache tiers. Configuration loads from environment
//! variables with sensible defaults.
//!
//! # Environment Variables
//!
//! - `BUILDWISE_LOCAL_TTL_HOURS`: Local report cache TTL - default: "24"
//! - `BUILDWISE_GLOBAL_TTL_HOURS`: Global report cache TTL - default: "168" (7 days)
//! - `BUILDWISE_SIMILARITY_THRESHOLD`: Minimum similarity score for global
//!   cache matches (0.0-1.0) - default: "0.85"
//! - `BUILDWISE_CHANGE_RATIO_BAILOUT`: Change ratio above which test/docs
//!   planning falls back to run-all (0.0-1.0) - default: "0.3"
//! - `BUILDWISE_MAX_CACHE_MB`: Total cache size ceiling in MB - default: "100"
//! - `BUILDWISE_MAX_PARALLELISM`: Worker pool ceiling for hashing - default: "8"
//! - `BUILDWISE_GLOBAL_CACHE_DIR`: Machine-scoped cache root - default:
//!   the platform cache directory + "buildwise"
//! - `BUILDWISE_LOG_LEVEL`: Logging level - default: "info"
//!
//! The similarity and bailout thresholds are tuning knobs, not invariants;
//! they only need to stay inside `0.0..=1.0`.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default values for configuration
const DEFAULT_LOCAL_TTL_HOURS: u64 = 24;
const DEFAULT_GLOBAL_TTL_HOURS: u64 = 168; // 7 days
const DEFAULT_TEST_TTL_HOURS: u64 = 24;
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;
const DEFAULT_CHANGE_RATIO_BAILOUT: f64 = 0.30;
const DEFAULT_PER_FILE_COST_SECS: f64 = 30.0;
const DEFAULT_PER_TEST_COST_SECS: f64 = 2.0;
const DEFAULT_MAX_CACHE_BYTES: u64 = 100 * 1024 * 1024; // 100MB
const DEFAULT_MAX_PARALLELISM: usize = 8;
const DEFAULT_MAX_TRACKED_FILES: usize = 10_000;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Extensions considered part of the tracked source tree
const DEFAULT_TRACKED_EXTENSIONS: &[&str] = &[
    "py", "pyi", "js", "jsx", "ts", "tsx", "mjs", "cjs", "json", "css", "html", "md", "toml",
    "yaml", "yml", "txt", "cfg", "ini",
];

/// Directories never tracked, regardless of extension
const DEFAULT_IGNORE_GLOBS: &[&str] = &[
    "node_modules/",
    "__pycache__/",
    ".venv/",
    "venv/",
    "dist/",
    "build/",
    ".next/",
    "coverage/",
    "target/",
    ".git/",
    ".buildwise/",
];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Failed to parse configuration value
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

/// Main configuration structure for the engine
///
/// Construct with `Default::default()` for built-in defaults, or with
/// [`EngineConfig::from_env`] to apply `BUILDWISE_*` environment overrides
/// on top of them.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// TTL for the project-scoped report cache
    pub local_ttl: Duration,

    /// TTL for the machine-scoped report cache
    pub global_ttl: Duration,

    /// TTL for cached test results
    pub test_ttl: Duration,

    /// Minimum score for similarity-based global cache matches (0.0-1.0)
    pub similarity_threshold: f64,

    /// Change ratio above which test/docs planning gives up on selection
    /// and runs everything (0.0-1.0)
    pub change_ratio_bailout: f64,

    /// Advisory per-file rebuild cost used for time-saved estimates, seconds
    pub per_file_cost_secs: f64,

    /// Advisory per-test cost used for time-saved estimates, seconds
    pub per_test_cost_secs: f64,

    /// Ceiling on total cache bytes before LRU eviction kicks in
    pub max_cache_bytes: u64,

    /// Upper bound on the hashing worker pool
    pub max_parallelism: usize,

    /// Upper bound on files considered per scan
    pub max_tracked_files: usize,

    /// Extension allow-list for tracked files (no leading dot)
    pub tracked_extensions: Vec<String>,

    /// Gitignore-style deny globs applied on top of .gitignore
    pub ignore_globs: Vec<String>,

    /// Machine-scoped cache root; `None` means platform cache dir + "buildwise"
    pub global_cache_dir: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_ttl: Duration::from_secs(DEFAULT_LOCAL_TTL_HOURS * 3600),
            global_ttl: Duration::from_secs(DEFAULT_GLOBAL_TTL_HOURS * 3600),
            test_ttl: Duration::from_secs(DEFAULT_TEST_TTL_HOURS * 3600),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            change_ratio_bailout: DEFAULT_CHANGE_RATIO_BAILOUT,
            per_file_cost_secs: DEFAULT_PER_FILE_COST_SECS,
            per_test_cost_secs: DEFAULT_PER_TEST_COST_SECS,
            max_cache_bytes: DEFAULT_MAX_CACHE_BYTES,
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            max_tracked_files: DEFAULT_MAX_TRACKED_FILES,
            tracked_extensions: DEFAULT_TRACKED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignore_globs: DEFAULT_IGNORE_GLOBS.iter().map(|s| s.to_string()).collect(),
            global_cache_dir: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration from environment variables with defaults
    ///
    /// Reads `BUILDWISE_*` variables and falls back to built-in defaults for
    /// any missing or unparseable values.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(hours) = parse_env_u64("BUILDWISE_LOCAL_TTL_HOURS") {
            config.local_ttl = Duration::from_secs(hours * 3600);
        }
        if let Some(hours) = parse_env_u64("BUILDWISE_GLOBAL_TTL_HOURS") {
            config.global_ttl = Duration::from_secs(hours * 3600);
        }
        if let Some(v) = parse_env_f64("BUILDWISE_SIMILARITY_THRESHOLD") {
            config.similarity_threshold = v;
        }
        if let Some(v) = parse_env_f64("BUILDWISE_CHANGE_RATIO_BAILOUT") {
            config.change_ratio_bailout = v;
        }
        if let Some(mb) = parse_env_u64("BUILDWISE_MAX_CACHE_MB") {
            config.max_cache_bytes = mb * 1024 * 1024;
        }
        if let Some(v) = parse_env_u64("BUILDWISE_MAX_PARALLELISM") {
            config.max_parallelism = v as usize;
        }
        if let Ok(dir) = env::var("BUILDWISE_GLOBAL_CACHE_DIR") {
            if !dir.is_empty() {
                config.global_cache_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(level) = env::var("BUILDWISE_LOG_LEVEL") {
            config.log_level = level.to_lowercase();
        }

        config
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::ValidationFailed(format!(
                "Similarity threshold must be between 0.0 and 1.0, got {}",
                self.similarity_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.change_ratio_bailout) {
            return Err(ConfigError::ValidationFailed(format!(
                "Change ratio bailout must be between 0.0 and 1.0, got {}",
                self.change_ratio_bailout
            )));
        }
        if self.max_parallelism == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max parallelism must be at least 1".to_string(),
            ));
        }
        if self.max_tracked_files == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max tracked files must be at least 1".to_string(),
            ));
        }
        if self.tracked_extensions.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Tracked extension list cannot be empty".to_string(),
            ));
        }
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    /// Resolved machine-scoped cache root
    ///
    /// Falls back to the platform cache directory, and finally to the
    /// system temp directory when neither is available.
    pub fn resolved_global_cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.global_cache_dir {
            return dir.clone();
        }
        dirs::cache_dir()
            .unwrap_or_else(env::temp_dir)
            .join("buildwise")
    }

    /// Returns true if the extension (without dot) is tracked
    pub fn is_tracked_extension(&self, ext: &str) -> bool {
        self.tracked_extensions.iter().any(|e| e == ext)
    }
}

fn parse_env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.parse::<u64>().ok())
}

fn parse_env_f64(key: &str) -> Option<f64> {
    env::var(key).ok().and_then(|v| v.parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_ttls() {
        let config = EngineConfig::default();
        assert_eq!(config.local_ttl, Duration::from_secs(24 * 3600));
        assert_eq!(config.global_ttl, Duration::from_secs(168 * 3600));
    }

    #[test]
    fn test_invalid_similarity_threshold() {
        let config = EngineConfig {
            similarity_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let config = EngineConfig {
            log_level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tracked_extension_lookup() {
        let config = EngineConfig::default();
        assert!(config.is_tracked_extension("py"));
        assert!(config.is_tracked_extension("tsx"));
        assert!(!config.is_tracked_extension("exe"));
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("BUILDWISE_SIMILARITY_THRESHOLD", "0.9");
        env::set_var("BUILDWISE_LOCAL_TTL_HOURS", "48");
        let config = EngineConfig::from_env();
        assert_eq!(config.similarity_threshold, 0.9);
        assert_eq!(config.local_ttl, Duration::from_secs(48 * 3600));
        env::remove_var("BUILDWISE_SIMILARITY_THRESHOLD");
        env::remove_var("BUILDWISE_LOCAL_TTL_HOURS");
    }
}
