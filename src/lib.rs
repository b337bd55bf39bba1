//! buildwise - incremental build, test, and docs planning with tiered caching
//!
//! This library decides what actually needs rebuilding, retesting, and
//! regenerating between runs of a code-generation pipeline. It compares the
//! working tree against the last committed snapshot, follows import edges to
//! find the blast radius of each change, and plans the minimal set of work,
//! while caching expensive generated reports and test results across runs.
//!
//! # Core Concepts
//!
//! - **Snapshot**: The persisted file-hash baseline from the end of the last
//!   build. Detection classifies every tracked file against it.
//! - **Change Report**: Each file lands in exactly one of changed, added,
//!   deleted, or unchanged, with an overall change ratio.
//! - **Impact**: The transitive closure of importers over the dependency
//!   graph; a change to a file affects everything that imports it.
//! - **Plans**: Build, test, and docs planners turn a report plus impact
//!   into preserve/rebuild, run/skip, and keep/regenerate splits. When
//!   selection would be unreliable (too much churn, no coverage signal),
//!   planners fall back to doing everything, with the reason recorded.
//! - **Caches**: A project-local exact-match report cache, a machine-global
//!   report cache with opt-in similarity search, and a whole-snapshot-keyed
//!   test result cache, all under one housekeeping manager.
//!
//! # Example Usage
//!
//! ```ignore
//! use buildwise::{EngineConfig, IncrementalEngine};
//!
//! fn plan(root: &std::path::Path) -> anyhow::Result<()> {
//!     let engine = IncrementalEngine::new(root, EngineConfig::from_env())?;
//!
//!     let report = engine.detect_changes();
//!     let build = engine.plan_build(&report);
//!     let tests = engine.plan_tests(&report);
//!
//!     println!("rebuild {} files: {}", build.rebuild.len(), build.reason);
//!     println!("run {} tests: {}", tests.run.len(), tests.reason);
//!
//!     // ... perform the build, then commit the new baseline
//!     engine.commit_snapshot()?;
//!     Ok(())
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`engine`]: The facade wiring detection, planning, and caches
//! - [`detect`]: Change detection (VCS diff with hash fallback)
//! - [`graph`]: Import extraction and the dependency graph
//! - [`impact`]: Transitive closure over reverse import edges
//! - [`plan`]: Build, test, and docs planners
//! - [`cache`]: Report and test-result cache tiers plus housekeeping

// Public modules
pub mod cache;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod fs;
pub mod graph;
pub mod impact;
pub mod plan;
pub mod snapshot;
pub mod util;
pub mod vcs;

// Re-export key types for convenient access
pub use cache::{
    CacheKind, CacheManager, CacheManagerStats, CacheStats, GlobalReportCache, LocalReportCache,
    MissReason, TestResultCache,
};
pub use config::{ConfigError, EngineConfig};
pub use detect::{ChangeDetector, ChangeReport, DetectionMethod};
pub use engine::IncrementalEngine;
pub use error::{DetectionError, EngineError};
pub use graph::{DependencyGraph, GraphBuilder};
pub use impact::ImpactAnalyzer;
pub use plan::{
    BuildPlan, BuildPlanner, DocsImpactPlanner, DocsPlan, TestImpactAnalyzer, TestPlan,
};
pub use snapshot::BuildSnapshot;
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_buildwise() {
        assert_eq!(NAME, "buildwise");
    }
}
