//! Lightweight import graph over the project's source files
//!
//! The graph is heuristic by design: per-language extractors pull import
//! tokens at regex level and resolve them to in-project paths. Tokens that
//! cannot be resolved are assumed third-party and dropped, never guessed.
//! Files with no extractor become opaque nodes so they still participate
//! in change tracking.
//!
//! The graph is persisted as a rebuildable cache artifact; a stale or
//! corrupt graph file is simply rebuilt from the tree.

mod extractor;
mod javascript;
mod python;

pub use extractor::{ExtractorRegistry, ImportExtractor, OpaqueExtractor};
pub use javascript::JsImportExtractor;
pub use python::PythonExtractor;

use crate::fs::{read_json_opt, write_json_atomic};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// What kind of extractor produced a node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Python,
    JavaScript,
    /// No import semantics; participates in hashing only
    Opaque,
}

/// A single file in the graph with its raw import tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    pub kind: NodeKind,
    pub imports: Vec<String>,
}

/// Import graph: edge `(from, to)` means `from` imports `to`
///
/// The graph need not be acyclic; consumers handle cycles via fallbacks.
/// The reverse-adjacency index (file → importers) is rebuilt once per
/// construction or load and reused by impact analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: BTreeMap<String, GraphNode>,
    pub edges: Vec<(String, String)>,
    #[serde(skip)]
    reverse: BTreeMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Files that directly import `path`
    pub fn importers_of(&self, path: &str) -> &[String] {
        self.reverse.get(path).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Resolved in-project imports of `path`
    pub fn imports_of<'a>(&'a self, path: &str) -> Vec<&'a str> {
        self.edges
            .iter()
            .filter(|(from, _)| from == path)
            .map(|(_, to)| to.as_str())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn rebuild_reverse(&mut self) {
        self.reverse.clear();
        for (from, to) in &self.edges {
            self.reverse
                .entry(to.clone())
                .or_default()
                .push(from.clone());
        }
        for importers in self.reverse.values_mut() {
            importers.sort();
            importers.dedup();
        }
    }
}

/// Builds a [`DependencyGraph`] from source files on disk
pub struct GraphBuilder {
    root: PathBuf,
    registry: Arc<ExtractorRegistry>,
}

impl GraphBuilder {
    pub fn new(root: PathBuf) -> Self {
        Self::with_registry(root, Arc::new(ExtractorRegistry::with_defaults()))
    }

    pub fn with_registry(root: PathBuf, registry: Arc<ExtractorRegistry>) -> Self {
        Self { root, registry }
    }

    /// Builds the graph for the given tracked files
    ///
    /// Unreadable files become opaque nodes with a warning; the build
    /// itself never fails.
    pub fn build(&self, files: &[String]) -> DependencyGraph {
        let file_set: BTreeSet<String> = files.iter().cloned().collect();
        let mut graph = DependencyGraph::default();

        for file in files {
            let extractor = self.registry.for_path(file);
            let tokens = if extractor.kind() == NodeKind::Opaque {
                Vec::new()
            } else {
                match std::fs::read_to_string(self.root.join(file)) {
                    Ok(content) => extractor.extract(&content),
                    Err(err) => {
                        warn!(path = %file, error = %err, "Failed to read file, treating as opaque");
                        Vec::new()
                    }
                }
            };

            for token in &tokens {
                if let Some(target) = extractor.resolve(token, file, &file_set) {
                    if target != *file {
                        graph.edges.push((file.clone(), target));
                    }
                }
            }

            graph.nodes.insert(
                file.clone(),
                GraphNode {
                    kind: extractor.kind(),
                    imports: tokens,
                },
            );
        }

        graph.edges.sort();
        graph.edges.dedup();
        graph.rebuild_reverse();

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Dependency graph built"
        );
        graph
    }
}

/// Loads a cached graph, treating absence, corruption, or staleness as
/// "rebuild it"
pub fn load_graph(path: &Path) -> Option<DependencyGraph> {
    let mut graph: DependencyGraph = read_json_opt(path)?;
    graph.rebuild_reverse();
    Some(graph)
}

/// Persists the graph cache artifact atomically
pub fn save_graph(path: &Path, graph: &DependencyGraph) -> Result<()> {
    write_json_atomic(path, graph)
}
