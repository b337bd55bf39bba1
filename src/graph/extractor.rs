//! Pluggable import extraction
//!
//! Each language gets an [`ImportExtractor`] variant selected by file
//! extension; adding a language means adding a variant and registering it.

use super::NodeKind;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Heuristic, regex-level import extraction for one language
///
/// Extraction is deliberately not a full parser: it pulls import tokens
/// from source text and resolves them against the set of in-project
/// paths. Resolution returns `None` for anything it cannot place inside
/// the project (assumed third-party).
pub trait ImportExtractor: Send + Sync {
    fn kind(&self) -> NodeKind;

    /// File extensions (without dot) this extractor handles
    fn extensions(&self) -> &[&str];

    /// Raw import tokens found in the file content
    fn extract(&self, content: &str) -> Vec<String>;

    /// Resolves a token to a project-relative path, or `None`
    fn resolve(&self, token: &str, importer: &str, files: &BTreeSet<String>) -> Option<String>;
}

/// Extractor for file types without import semantics
pub struct OpaqueExtractor;

impl ImportExtractor for OpaqueExtractor {
    fn kind(&self) -> NodeKind {
        NodeKind::Opaque
    }

    fn extensions(&self) -> &[&str] {
        &[]
    }

    fn extract(&self, _content: &str) -> Vec<String> {
        Vec::new()
    }

    fn resolve(&self, _token: &str, _importer: &str, _files: &BTreeSet<String>) -> Option<String> {
        None
    }
}

/// Registry selecting an extractor by file extension
#[derive(Clone)]
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn ImportExtractor>>,
    opaque: Arc<dyn ImportExtractor>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
            opaque: Arc::new(OpaqueExtractor),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::PythonExtractor::new()));
        registry.register(Arc::new(super::JsImportExtractor::new()));
        registry
    }

    pub fn register(&mut self, extractor: Arc<dyn ImportExtractor>) {
        self.extractors.push(extractor);
    }

    /// Extractor for a path, falling back to the opaque extractor
    pub fn for_path(&self, path: &str) -> Arc<dyn ImportExtractor> {
        let ext = match path.rsplit_once('.') {
            Some((_, ext)) => ext,
            None => return Arc::clone(&self.opaque),
        };
        for extractor in &self.extractors {
            if extractor.extensions().contains(&ext) {
                return Arc::clone(extractor);
            }
        }
        Arc::clone(&self.opaque)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Directory part of a normalized relative path, "" for top-level files
pub(crate) fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Joins a `./`-style relative token onto the importer's directory
///
/// Returns `None` when `..` escapes the project root.
pub(crate) fn resolve_relative(importer: &str, token: &str) -> Option<String> {
    let mut segments: Vec<&str> = parent_dir(importer)
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    for part in token.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_selects_by_extension() {
        let registry = ExtractorRegistry::with_defaults();
        assert_eq!(registry.for_path("app.py").kind(), NodeKind::Python);
        assert_eq!(registry.for_path("app.tsx").kind(), NodeKind::JavaScript);
        assert_eq!(registry.for_path("notes.css").kind(), NodeKind::Opaque);
        assert_eq!(registry.for_path("Makefile").kind(), NodeKind::Opaque);
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("src/app/main.py"), "src/app");
        assert_eq!(parent_dir("main.py"), "");
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(
            resolve_relative("src/app/main.js", "./util"),
            Some("src/app/util".to_string())
        );
        assert_eq!(
            resolve_relative("src/app/main.js", "../shared/api"),
            Some("src/shared/api".to_string())
        );
        assert_eq!(resolve_relative("main.js", "../outside"), None);
    }
}
