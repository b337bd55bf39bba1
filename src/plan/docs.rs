//! Documentation impact planning
//!
//! Structural twin of test planning: a manifest maps each doc artifact
//! and README section to inferred source dependencies (filename-keyword
//! heuristics), and a high change ratio bails out to regenerate-all.

use crate::config::EngineConfig;
use crate::detect::ChangeReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// One documentation artifact and its inferred inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocEntry {
    pub source_deps: Vec<String>,
    pub is_generated: bool,
    pub is_ui: bool,
}

/// One README section and its inferred inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionEntry {
    pub source_deps: Vec<String>,
}

/// Doc artifacts and README sections mapped to source dependencies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocsManifest {
    pub documents: BTreeMap<String, DocEntry>,
    pub sections: BTreeMap<String, SectionEntry>,
}

/// Regenerate/keep partition for the docs phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocsPlan {
    pub regenerate: Vec<String>,
    pub keep: Vec<String>,
    pub regenerate_all: bool,
    pub reason: String,
    /// Advisory estimate, seconds
    pub estimated_time_saved_secs: f64,
}

/// Plans documentation regeneration from changes and a manifest
pub struct DocsImpactPlanner<'a> {
    config: &'a EngineConfig,
}

impl<'a> DocsImpactPlanner<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Infers a manifest from the tracked file list
    ///
    /// A doc named `api-reference.md` is assumed to depend on source
    /// files whose paths contain `api` or `reference`. README sections
    /// map to conventional inputs (manifests for installation, entry
    /// points for usage).
    pub fn build_manifest(&self, files: &[String]) -> Option<DocsManifest> {
        let docs: Vec<&String> = files.iter().filter(|f| f.ends_with(".md")).collect();
        if docs.is_empty() {
            return None;
        }

        let mut manifest = DocsManifest::default();
        for doc in &docs {
            let keywords = doc_keywords(doc);
            let mut source_deps: Vec<String> = files
                .iter()
                .filter(|f| !f.ends_with(".md"))
                .filter(|f| {
                    let lower = f.to_lowercase();
                    keywords.iter().any(|k| lower.contains(k.as_str()))
                })
                .cloned()
                .collect();
            source_deps.sort();

            let lower = doc.to_lowercase();
            manifest.documents.insert(
                (*doc).clone(),
                DocEntry {
                    source_deps,
                    is_generated: lower.contains("generated"),
                    is_ui: lower.contains("ui")
                        || lower.contains("frontend")
                        || lower.contains("component"),
                },
            );
        }

        if docs.iter().any(|d| is_readme(d)) {
            manifest.sections.insert(
                "installation".to_string(),
                SectionEntry {
                    source_deps: files
                        .iter()
                        .filter(|f| is_manifest_file(f))
                        .cloned()
                        .collect(),
                },
            );
            manifest.sections.insert(
                "usage".to_string(),
                SectionEntry {
                    source_deps: files
                        .iter()
                        .filter(|f| is_entry_point(f))
                        .cloned()
                        .collect(),
                },
            );
        }

        Some(manifest)
    }

    /// Produces a regenerate/keep partition, or regenerate-all when
    /// selection cannot be trusted
    pub fn plan(&self, report: &ChangeReport, manifest: Option<&DocsManifest>) -> DocsPlan {
        let threshold = self.config.change_ratio_bailout;
        if report.change_ratio > threshold {
            let reason = format!(
                "change ratio {:.0}% exceeds threshold {:.0}%",
                report.change_ratio * 100.0,
                threshold * 100.0
            );
            warn!(reason = %reason, "Regenerating all documentation");
            return self.regenerate_all_plan(manifest, reason);
        }

        let manifest = match manifest {
            Some(m) => m,
            None => {
                let reason = "no docs manifest available".to_string();
                warn!(reason = %reason, "Regenerating all documentation");
                return self.regenerate_all_plan(None, reason);
            }
        };

        let touched = report.touched();
        let mut regenerate = Vec::new();
        let mut keep = Vec::new();
        for (doc, entry) in &manifest.documents {
            let doc_changed = touched.contains(doc);
            let deps_changed = entry.source_deps.iter().any(|d| touched.contains(d));
            if doc_changed || deps_changed {
                regenerate.push(doc.clone());
            } else {
                keep.push(doc.clone());
            }
        }

        let saved = keep.len() as f64 * self.config.per_file_cost_secs;
        let reason = format!(
            "{} of {} documents depend on changed files",
            regenerate.len(),
            manifest.documents.len()
        );
        info!(
            regenerate = regenerate.len(),
            keep = keep.len(),
            "Docs plan ready"
        );
        DocsPlan {
            regenerate,
            keep,
            regenerate_all: false,
            reason,
            estimated_time_saved_secs: saved,
        }
    }

    fn regenerate_all_plan(&self, manifest: Option<&DocsManifest>, reason: String) -> DocsPlan {
        let regenerate = manifest
            .map(|m| m.documents.keys().cloned().collect())
            .unwrap_or_default();
        DocsPlan {
            regenerate,
            keep: Vec::new(),
            regenerate_all: true,
            reason,
            estimated_time_saved_secs: 0.0,
        }
    }
}

fn is_readme(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .map(|n| n.eq_ignore_ascii_case("readme.md"))
        .unwrap_or(false)
}

fn is_manifest_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    matches!(
        name,
        "requirements.txt" | "package.json" | "pyproject.toml" | "setup.py" | "Pipfile"
    )
}

fn is_entry_point(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    matches!(
        name,
        "main.py" | "app.py" | "index.js" | "index.ts" | "index.jsx" | "index.tsx"
    )
}

/// Keywords from a doc filename, e.g. `api-reference.md` → [api, reference]
fn doc_keywords(path: &str) -> Vec<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let stem = name.strip_suffix(".md").unwrap_or(name);
    stem.to_lowercase()
        .split(|c: char| c == '-' || c == '_' || c == '.')
        .filter(|k| k.len() >= 3 && *k != "readme")
        .map(|k| k.to_string())
        .collect()
}
