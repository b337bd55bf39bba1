//! Transitive impact analysis over the dependency graph
//!
//! A file is affected if it changed, was added, or is (transitively)
//! imported into by an affected file. The closure runs breadth-first over
//! reverse edges with a visited set, so cycles terminate and the cost is
//! O(V+E). The analyzer only ever adds files to the affected set; when in
//! doubt, rebuild.

use crate::graph::DependencyGraph;
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

/// Computes affected-file sets from a seed of changed/added files
pub struct ImpactAnalyzer<'a> {
    graph: &'a DependencyGraph,
}

impl<'a> ImpactAnalyzer<'a> {
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self { graph }
    }

    /// Reverse-reachability closure from the seed set
    ///
    /// Seeds are always included, even when they are not graph nodes;
    /// a changed file is never dropped from the affected set.
    pub fn affected_files(&self, seeds: &BTreeSet<String>) -> BTreeSet<String> {
        let mut affected: BTreeSet<String> = seeds.clone();
        let mut queue: VecDeque<String> = seeds.iter().cloned().collect();

        while let Some(current) = queue.pop_front() {
            for importer in self.graph.importers_of(&current) {
                if affected.insert(importer.clone()) {
                    queue.push_back(importer.clone());
                }
            }
        }

        debug!(
            seeds = seeds.len(),
            affected = affected.len(),
            "Impact closure computed"
        );
        affected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use std::fs;
    use tempfile::TempDir;

    fn graph_of(files: &[(&str, &str)]) -> DependencyGraph {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let names: Vec<String> = files.iter().map(|(n, _)| n.to_string()).collect();
        GraphBuilder::new(dir.path().to_path_buf()).build(&names)
    }

    fn seeds(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_direct_importer_is_affected() {
        let graph = graph_of(&[
            ("a.py", "import b\n"),
            ("b.py", "x = 1\n"),
            ("c.py", "y = 2\n"),
        ]);
        let affected = ImpactAnalyzer::new(&graph).affected_files(&seeds(&["b.py"]));
        assert_eq!(
            affected.iter().collect::<Vec<_>>(),
            vec!["a.py", "b.py"]
        );
    }

    #[test]
    fn test_transitive_importers_are_affected() {
        let graph = graph_of(&[
            ("top.py", "import mid\n"),
            ("mid.py", "import base\n"),
            ("base.py", "x = 1\n"),
        ]);
        let affected = ImpactAnalyzer::new(&graph).affected_files(&seeds(&["base.py"]));
        assert_eq!(affected.len(), 3);
    }

    #[test]
    fn test_affected_superset_of_seeds() {
        let graph = graph_of(&[("a.py", "x = 1\n")]);
        // Seed not in the graph at all: still affected
        let affected = ImpactAnalyzer::new(&graph).affected_files(&seeds(&["phantom.py"]));
        assert!(affected.contains("phantom.py"));
    }

    #[test]
    fn test_cycle_terminates() {
        let graph = graph_of(&[("a.py", "import b\n"), ("b.py", "import a\n")]);
        let affected = ImpactAnalyzer::new(&graph).affected_files(&seeds(&["a.py"]));
        assert_eq!(affected.len(), 2);
    }

    #[test]
    fn test_unrelated_files_untouched() {
        let graph = graph_of(&[
            ("a.py", "import b\n"),
            ("b.py", "x = 1\n"),
            ("c.py", "y = 2\n"),
        ]);
        let affected = ImpactAnalyzer::new(&graph).affected_files(&seeds(&["c.py"]));
        assert_eq!(affected.iter().collect::<Vec<_>>(), vec!["c.py"]);
    }
}
