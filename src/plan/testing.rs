//! Test impact analysis via naming-convention coverage heuristics
//!
//! Coverage here is inferred, not instrumented: a test named
//! `test_models.py` is assumed to cover files named `models.py`. That
//! imprecision is acceptable because every fallback direction runs more
//! tests, never fewer.

use crate::config::EngineConfig;
use crate::detect::ChangeReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Detected test framework
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TestFramework {
    Pytest,
    Jest,
    Unknown,
}

/// Inferred coverage for one test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCoverage {
    /// Source files this test is assumed to cover
    pub covers: Vec<String>,
    /// Last observed duration, if the runner reported one
    pub duration_secs: Option<f64>,
}

/// Framework plus per-test inferred coverage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCoverageMap {
    pub framework: TestFramework,
    pub tests: BTreeMap<String, TestCoverage>,
}

/// Run/skip partition for the next test phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPlan {
    pub run: Vec<String>,
    pub skip: Vec<String>,
    pub run_all: bool,
    pub reason: String,
    /// Advisory estimate, seconds
    pub estimated_time_saved_secs: f64,
}

/// Plans test runs from changes and inferred coverage
pub struct TestImpactAnalyzer<'a> {
    config: &'a EngineConfig,
}

impl<'a> TestImpactAnalyzer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Builds a coverage map from the tracked file list
    ///
    /// Returns `None` when no test files are found, which the planner
    /// treats as a run-all condition.
    pub fn build_coverage_map(&self, files: &[String]) -> Option<TestCoverageMap> {
        let test_files: Vec<&String> = files.iter().filter(|f| is_test_file(f)).collect();
        if test_files.is_empty() {
            return None;
        }

        let framework = detect_framework(&test_files);
        let mut tests = BTreeMap::new();
        for test_file in &test_files {
            let mut covers = vec![(*test_file).clone()];
            if let Some(subject) = subject_stem(test_file) {
                for file in files {
                    if is_test_file(file) {
                        continue;
                    }
                    if file_stem(file) == subject {
                        covers.push(file.clone());
                    }
                }
            }
            covers.sort();
            covers.dedup();
            tests.insert(
                (*test_file).clone(),
                TestCoverage {
                    covers,
                    duration_secs: None,
                },
            );
        }

        Some(TestCoverageMap { framework, tests })
    }

    /// Produces a run/skip partition, or a run-all plan when selection
    /// cannot be trusted
    ///
    /// Run-all triggers: change ratio above the configured threshold, no
    /// coverage map, or zero tests matching the changed files.
    pub fn plan(&self, report: &ChangeReport, coverage: Option<&TestCoverageMap>) -> TestPlan {
        let threshold = self.config.change_ratio_bailout;
        if report.change_ratio > threshold {
            let reason = format!(
                "change ratio {:.0}% exceeds threshold {:.0}%",
                report.change_ratio * 100.0,
                threshold * 100.0
            );
            warn!(reason = %reason, "Running all tests");
            return self.run_all_plan(coverage, reason);
        }

        let coverage = match coverage {
            Some(c) => c,
            None => {
                let reason = "no coverage map available".to_string();
                warn!(reason = %reason, "Running all tests");
                return self.run_all_plan(None, reason);
            }
        };

        let touched = report.touched();
        let mut run = Vec::new();
        let mut skip = Vec::new();
        let mut saved = 0.0;
        for (test_id, info) in &coverage.tests {
            if info.covers.iter().any(|c| touched.contains(c)) {
                run.push(test_id.clone());
            } else {
                skip.push(test_id.clone());
                saved += info
                    .duration_secs
                    .unwrap_or(self.config.per_test_cost_secs);
            }
        }

        if run.is_empty() {
            let reason = "no tests matched the changed files".to_string();
            warn!(reason = %reason, "Running all tests");
            return self.run_all_plan(Some(coverage), reason);
        }

        info!(
            run = run.len(),
            skip = skip.len(),
            "Test plan ready"
        );
        TestPlan {
            run,
            skip,
            run_all: false,
            reason: format!("{} tests cover the changed files", coverage.tests.len()),
            estimated_time_saved_secs: saved,
        }
    }

    fn run_all_plan(&self, coverage: Option<&TestCoverageMap>, reason: String) -> TestPlan {
        let run = coverage
            .map(|c| c.tests.keys().cloned().collect())
            .unwrap_or_default();
        TestPlan {
            run,
            skip: Vec::new(),
            run_all: true,
            reason,
            estimated_time_saved_secs: 0.0,
        }
    }
}

/// Test-file naming conventions for the supported frameworks
fn is_test_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    if name == "conftest.py" {
        return true;
    }
    if name.ends_with(".py") {
        return name.starts_with("test_") || name.trim_end_matches(".py").ends_with("_test");
    }
    for ext in ["js", "jsx", "ts", "tsx", "mjs", "cjs"] {
        let suffix_test = format!(".test.{}", ext);
        let suffix_spec = format!(".spec.{}", ext);
        if name.ends_with(&suffix_test) || name.ends_with(&suffix_spec) {
            return true;
        }
    }
    path.contains("__tests__/")
}

fn detect_framework(test_files: &[&String]) -> TestFramework {
    let python = test_files.iter().any(|f| f.ends_with(".py"));
    let js = test_files.iter().any(|f| !f.ends_with(".py"));
    match (python, js) {
        (true, false) => TestFramework::Pytest,
        (false, true) => TestFramework::Jest,
        _ => TestFramework::Unknown,
    }
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.split_once('.').map(|(stem, _)| stem).unwrap_or(name)
}

/// The source stem a test name points at, e.g. `test_models` → `models`
fn subject_stem(path: &str) -> Option<String> {
    let stem = file_stem(path);
    if let Some(rest) = stem.strip_prefix("test_") {
        return Some(rest.to_string());
    }
    if let Some(rest) = stem.strip_suffix("_test") {
        return Some(rest.to_string());
    }
    // Jest style: api.test.ts → stem is "api" after split_once('.')
    if path.contains(".test.") || path.contains(".spec.") || path.contains("__tests__/") {
        return Some(stem.to_string());
    }
    None
}
