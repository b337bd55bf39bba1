//! The engine facade: one object wiring detection, planning, and caches
//!
//! [`IncrementalEngine`] owns the project root, the resolved configuration,
//! and the state directory layout under `.buildwise/`. Hosts construct it
//! once per project and drive the detect / plan / commit cycle through it.

use crate::cache::{CacheManager, GlobalReportCache, LocalReportCache, TestResultCache};
use crate::config::EngineConfig;
use crate::detect::{ChangeDetector, ChangeReport};
use crate::error::EngineError;
use crate::fs::FileEnumerator;
use crate::graph::{load_graph, save_graph, DependencyGraph, GraphBuilder};
use crate::impact::ImpactAnalyzer;
use crate::plan::{
    BuildPlan, BuildPlanner, DocsImpactPlanner, DocsPlan, TestImpactAnalyzer, TestPlan,
};
use crate::snapshot::{load_snapshot, save_snapshot, BuildSnapshot};
use crate::vcs::{detect_vcs, VcsAdapter};
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Name of the per-project state directory
const STATE_DIR: &str = ".buildwise";
const SNAPSHOT_FILE: &str = "snapshot.json";
const GRAPH_FILE: &str = "graph.json";
const REPORTS_DIR: &str = "reports";
const TEST_RESULTS_DIR: &str = "test-results";

pub struct IncrementalEngine {
    root: PathBuf,
    config: EngineConfig,
    vcs: Arc<dyn VcsAdapter>,
    local_cache: LocalReportCache,
    global_cache: GlobalReportCache,
    test_cache: TestResultCache,
}

impl IncrementalEngine {
    /// Creates an engine for a project root, preparing its state directory
    ///
    /// # Errors
    ///
    /// Returns `EngineError` when the root is missing or not a directory,
    /// the configuration is invalid, or state directories cannot be created.
    pub fn new(root: impl Into<PathBuf>, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let root = root.into();
        if !root.exists() {
            return Err(EngineError::PathNotFound(root));
        }
        if !root.is_dir() {
            return Err(EngineError::NotADirectory(root));
        }
        let root = root.canonicalize()?;

        let state_dir = root.join(STATE_DIR);
        let local_dir = state_dir.join(REPORTS_DIR);
        let test_dir = state_dir.join(TEST_RESULTS_DIR);
        let global_dir = config.resolved_global_cache_dir().join(REPORTS_DIR);
        fs::create_dir_all(&local_dir)?;
        fs::create_dir_all(&test_dir)?;
        fs::create_dir_all(&global_dir)?;

        let vcs: Arc<dyn VcsAdapter> = Arc::from(detect_vcs(&root));
        info!(
            root = %root.display(),
            vcs_available = vcs.is_available(),
            "Incremental engine initialized"
        );

        Ok(Self {
            local_cache: LocalReportCache::new(local_dir, config.local_ttl),
            global_cache: GlobalReportCache::new(
                global_dir,
                config.global_ttl,
                config.similarity_threshold,
            ),
            test_cache: TestResultCache::new(test_dir, config.test_ttl),
            root,
            config,
            vcs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    fn snapshot_path(&self) -> PathBuf {
        self.state_dir().join(SNAPSHOT_FILE)
    }

    fn graph_path(&self) -> PathBuf {
        self.state_dir().join(GRAPH_FILE)
    }

    fn detector(&self) -> ChangeDetector {
        ChangeDetector::new(self.root.clone(), &self.config, Arc::clone(&self.vcs))
    }

    /// Classifies the tree against the last committed snapshot
    ///
    /// Never fails; with no usable snapshot every file reports as added.
    pub fn detect_changes(&self) -> ChangeReport {
        let previous = load_snapshot(&self.snapshot_path());
        self.detector().detect(previous.as_ref())
    }

    /// Builds the dependency graph from the current tree and persists it
    pub fn build_graph(&self) -> DependencyGraph {
        let start = Instant::now();
        let files = FileEnumerator::new(self.root.clone(), &self.config).enumerate();
        let graph = GraphBuilder::new(self.root.clone()).build(&files);
        if let Err(err) = save_graph(&self.graph_path(), &graph) {
            warn!(error = %err, "Failed to persist dependency graph");
        }
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Dependency graph built"
        );
        graph
    }

    /// Returns the persisted graph if present, otherwise builds one
    ///
    /// Only safe when the tree is known unchanged since the graph was
    /// saved; planning always rebuilds instead.
    pub fn load_or_build_graph(&self) -> DependencyGraph {
        match load_graph(&self.graph_path()) {
            Some(graph) => graph,
            None => self.build_graph(),
        }
    }

    /// Produces a build plan for the current tree
    ///
    /// The graph is rebuilt from the tree rather than loaded, since the
    /// report may include edits that invalidate persisted edges.
    pub fn plan_build(&self, report: &ChangeReport) -> BuildPlan {
        let graph = self.build_graph();
        let affected = ImpactAnalyzer::new(&graph).affected_files(&report.touched());
        BuildPlanner::new(&self.config).plan(report, &graph, &affected)
    }

    /// Produces a test selection plan for the current tree
    pub fn plan_tests(&self, report: &ChangeReport) -> TestPlan {
        let files = FileEnumerator::new(self.root.clone(), &self.config).enumerate();
        let analyzer = TestImpactAnalyzer::new(&self.config);
        let coverage = analyzer.build_coverage_map(&files);
        analyzer.plan(report, coverage.as_ref())
    }

    /// Produces a docs regeneration plan for the current tree
    pub fn plan_docs(&self, report: &ChangeReport) -> DocsPlan {
        let files = FileEnumerator::new(self.root.clone(), &self.config).enumerate();
        let planner = DocsImpactPlanner::new(&self.config);
        let manifest = planner.build_manifest(&files);
        planner.plan(report, manifest.as_ref())
    }

    /// Hashes the current tree and commits it as the new baseline
    ///
    /// Called after a successful build; the previous snapshot is replaced
    /// wholesale.
    pub fn commit_snapshot(&self) -> Result<BuildSnapshot> {
        let snapshot = self.detector().snapshot_now()?;
        save_snapshot(&self.snapshot_path(), &snapshot)?;
        Ok(snapshot)
    }

    pub fn local_cache(&self) -> &LocalReportCache {
        &self.local_cache
    }

    pub fn global_cache(&self) -> &GlobalReportCache {
        &self.global_cache
    }

    pub fn test_cache(&self) -> &TestResultCache {
        &self.test_cache
    }

    /// Housekeeping view over all three cache directories
    pub fn cache_manager(&self) -> CacheManager {
        CacheManager::new(
            self.local_cache.dir().to_path_buf(),
            self.global_cache.dir().to_path_buf(),
            self.test_cache.dir().to_path_buf(),
            self.config.local_ttl,
            self.config.global_ttl,
            self.config.test_ttl,
            self.config.max_cache_bytes,
        )
    }
}
