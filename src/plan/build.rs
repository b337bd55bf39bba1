//! Build planning: preserve/rebuild/create partition and build ordering

use crate::config::EngineConfig;
use crate::detect::ChangeReport;
use crate::graph::DependencyGraph;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Work partition for the next build
///
/// `build_order` is a total order over the rebuild set consistent with
/// the dependency graph: dependencies come before their importers. When
/// the rebuild subgraph has a cycle, `cycle_fallback` is set and the
/// order degrades to stable lexicographic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPlan {
    /// Unaffected files to copy from the previous build output
    pub preserve: Vec<String>,
    /// Affected files that must be rebuilt
    pub rebuild: Vec<String>,
    /// Newly added files with no previous artifact
    pub create: Vec<String>,
    pub build_order: Vec<String>,
    pub cycle_fallback: bool,
    pub reason: String,
    /// Advisory estimate, seconds
    pub estimated_time_saved_secs: f64,
}

/// Result of copying preserved artifacts forward
#[derive(Debug, Clone, Default)]
pub struct PreserveOutcome {
    pub copied: Vec<String>,
    /// Files missing from the previous output, demoted to rebuild
    pub demoted: Vec<String>,
}

/// Turns a change report plus impact analysis into a [`BuildPlan`]
pub struct BuildPlanner<'a> {
    config: &'a EngineConfig,
}

impl<'a> BuildPlanner<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn plan(
        &self,
        report: &ChangeReport,
        graph: &DependencyGraph,
        affected: &BTreeSet<String>,
    ) -> BuildPlan {
        let rebuild: Vec<String> = affected.iter().cloned().collect();
        let create: Vec<String> = report.added.iter().cloned().collect();
        let preserve: Vec<String> = report
            .unchanged
            .iter()
            .filter(|p| !affected.contains(*p))
            .cloned()
            .collect();

        let (build_order, cycle_fallback) = topological_order(graph, affected);
        if cycle_fallback {
            warn!(
                rebuild = rebuild.len(),
                "Dependency cycle in rebuild set, falling back to lexicographic build order"
            );
        }

        let estimated_time_saved_secs = preserve.len() as f64 * self.config.per_file_cost_secs;
        let reason = format!(
            "{} of {} files affected ({} changed, {} added); preserving {}{}",
            rebuild.len(),
            report.total_considered(),
            report.changed.len(),
            report.added.len(),
            preserve.len(),
            if cycle_fallback {
                "; cycle fallback ordering"
            } else {
                ""
            }
        );

        info!(
            rebuild = rebuild.len(),
            create = create.len(),
            preserve = preserve.len(),
            cycle_fallback,
            "Build plan ready"
        );

        BuildPlan {
            preserve,
            rebuild,
            create,
            build_order,
            cycle_fallback,
            reason,
            estimated_time_saved_secs,
        }
    }
}

/// Kahn's algorithm over the rebuild subgraph
///
/// Edge `(from, to)` means `from` imports `to`, so `to` must be ordered
/// first. Ties break lexicographically for stable output. Returns the
/// lexicographic order plus a fallback flag when a cycle prevents a
/// complete topological order.
fn topological_order(
    graph: &DependencyGraph,
    set: &BTreeSet<String>,
) -> (Vec<String>, bool) {
    let mut indegree: BTreeMap<&str, usize> = set.iter().map(|p| (p.as_str(), 0)).collect();
    for (from, to) in &graph.edges {
        if set.contains(from) && set.contains(to) {
            if let Some(count) = indegree.get_mut(from.as_str()) {
                *count += 1;
            }
        }
    }

    let mut ready: BTreeSet<&str> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(path, _)| *path)
        .collect();
    let mut order: Vec<String> = Vec::with_capacity(set.len());

    while let Some(&next) = ready.iter().next() {
        ready.remove(next);
        order.push(next.to_string());
        for importer in graph.importers_of(next) {
            if let Some(count) = indegree.get_mut(importer.as_str()) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(importer.as_str());
                }
            }
        }
    }

    if order.len() != set.len() {
        debug!(
            ordered = order.len(),
            expected = set.len(),
            "Topological sort incomplete"
        );
        return (set.iter().cloned().collect(), true);
    }
    (order, false)
}

/// Copies preserved files byte-for-byte from the previous build output
///
/// A file missing from the previous output is demoted to `rebuild` rather
/// than silently skipped; the plan is updated in place. Copy order is
/// unconstrained.
pub fn apply_preserve(
    plan: &mut BuildPlan,
    previous_output: &Path,
    output: &Path,
) -> Result<PreserveOutcome> {
    let mut outcome = PreserveOutcome::default();

    for path in std::mem::take(&mut plan.preserve) {
        let source = previous_output.join(&path);
        if !source.is_file() {
            warn!(path = %path, "Preserved artifact missing from previous output, demoting to rebuild");
            plan.rebuild.push(path.clone());
            outcome.demoted.push(path);
            continue;
        }

        let target = output.join(&path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::copy(&source, &target)
            .with_context(|| format!("Failed to copy preserved file {}", path))?;
        outcome.copied.push(path);
    }

    plan.preserve = outcome.copied.clone();
    plan.rebuild.sort();

    // Demoted files were unaffected, so nothing in the ordered rebuild set
    // depends on being built before them, but they may be imported by it.
    // Prepending keeps dependencies ahead of their importers.
    if !outcome.demoted.is_empty() {
        let mut order = outcome.demoted.clone();
        order.sort();
        order.extend(std::mem::take(&mut plan.build_order));
        plan.build_order = order;
    }

    if !outcome.demoted.is_empty() {
        info!(
            copied = outcome.copied.len(),
            demoted = outcome.demoted.len(),
            "Preserve pass complete with demotions"
        );
    }
    Ok(outcome)
}
