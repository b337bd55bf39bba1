//! JavaScript/TypeScript import extraction (`import`, `require`, re-exports)

use super::extractor::{resolve_relative, ImportExtractor};
use super::NodeKind;
use regex::Regex;
use std::collections::BTreeSet;

const PROBE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs"];

pub struct JsImportExtractor {
    import_re: Regex,
    export_re: Regex,
    require_re: Regex,
}

impl JsImportExtractor {
    pub fn new() -> Self {
        Self {
            import_re: Regex::new(r#"(?m)^\s*import\s+(?:[^'"]+\s+from\s+)?['"]([^'"]+)['"]"#)
                .expect("valid regex"),
            export_re: Regex::new(r#"(?m)^\s*export\s+[^'"\n]+\s+from\s+['"]([^'"]+)['"]"#)
                .expect("valid regex"),
            require_re: Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).expect("valid regex"),
        }
    }
}

impl Default for JsImportExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportExtractor for JsImportExtractor {
    fn kind(&self) -> NodeKind {
        NodeKind::JavaScript
    }

    fn extensions(&self) -> &[&str] {
        PROBE_EXTENSIONS
    }

    fn extract(&self, content: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for re in [&self.import_re, &self.export_re, &self.require_re] {
            for cap in re.captures_iter(content) {
                let token = cap[1].to_string();
                if !tokens.contains(&token) {
                    tokens.push(token);
                }
            }
        }
        tokens
    }

    /// Resolves relative specifiers with extension and index probing
    ///
    /// Bare specifiers (`react`, `lodash/merge`) are package imports and
    /// resolve to `None`.
    fn resolve(&self, token: &str, importer: &str, files: &BTreeSet<String>) -> Option<String> {
        if !token.starts_with("./") && !token.starts_with("../") && token != "." && token != ".." {
            return None;
        }

        let base = resolve_relative(importer, token)?;

        // Exact path with an extension already present
        if !base.is_empty() && files.contains(&base) {
            return Some(base);
        }

        for ext in PROBE_EXTENSIONS {
            let candidate = format!("{}.{}", base, ext);
            if files.contains(&candidate) {
                return Some(candidate);
            }
        }
        for ext in PROBE_EXTENSIONS {
            let candidate = if base.is_empty() {
                format!("index.{}", ext)
            } else {
                format!("{}/index.{}", base, ext)
            };
            if files.contains(&candidate) {
                return Some(candidate);
            }
        }

        None
    }
}
