//! Python import extraction (`import x`, `from x import y`)

use super::extractor::{parent_dir, ImportExtractor};
use super::NodeKind;
use regex::Regex;
use std::collections::BTreeSet;

pub struct PythonExtractor {
    import_re: Regex,
    from_re: Regex,
}

impl PythonExtractor {
    pub fn new() -> Self {
        Self {
            import_re: Regex::new(r"(?m)^\s*import\s+([\w.]+(?:\s*,\s*[\w.]+)*)")
                .expect("valid regex"),
            from_re: Regex::new(r"(?m)^\s*from\s+([.\w]+)\s+import\s").expect("valid regex"),
        }
    }

    /// Resolves a dotted module path against the project file set
    ///
    /// Probes both `pkg/mod.py` and `pkg/mod/__init__.py`, rooted at the
    /// project and, failing that, at the importer's own directory.
    fn resolve_dotted(
        &self,
        dotted: &str,
        importer: &str,
        files: &BTreeSet<String>,
    ) -> Option<String> {
        let slashed = dotted.replace('.', "/");
        let mut candidates = vec![
            format!("{}.py", slashed),
            format!("{}/__init__.py", slashed),
        ];
        let dir = parent_dir(importer);
        if !dir.is_empty() {
            candidates.push(format!("{}/{}.py", dir, slashed));
            candidates.push(format!("{}/{}/__init__.py", dir, slashed));
        }
        candidates.into_iter().find(|c| files.contains(c))
    }

    /// Resolves a `from .mod import x` style relative token
    fn resolve_relative_module(
        &self,
        token: &str,
        importer: &str,
        files: &BTreeSet<String>,
    ) -> Option<String> {
        let dots = token.chars().take_while(|c| *c == '.').count();
        let rest = &token[dots..];

        // One dot anchors at the importer's package; each extra dot
        // climbs one package up.
        let mut dir = parent_dir(importer).to_string();
        for _ in 1..dots {
            if dir.is_empty() {
                return None;
            }
            dir = parent_dir(&dir).to_string();
        }

        if rest.is_empty() {
            let candidate = if dir.is_empty() {
                "__init__.py".to_string()
            } else {
                format!("{}/__init__.py", dir)
            };
            return files.contains(&candidate).then_some(candidate);
        }

        let slashed = rest.replace('.', "/");
        let base = if dir.is_empty() {
            slashed
        } else {
            format!("{}/{}", dir, slashed)
        };
        let candidates = [format!("{}.py", base), format!("{}/__init__.py", base)];
        candidates.into_iter().find(|c| files.contains(c))
    }
}

impl Default for PythonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportExtractor for PythonExtractor {
    fn kind(&self) -> NodeKind {
        NodeKind::Python
    }

    fn extensions(&self) -> &[&str] {
        &["py", "pyi", "pyw"]
    }

    fn extract(&self, content: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for cap in self.from_re.captures_iter(content) {
            let token = cap[1].to_string();
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        for cap in self.import_re.captures_iter(content) {
            for part in cap[1].split(',') {
                let token = part.trim().to_string();
                if !token.is_empty() && !tokens.contains(&token) {
                    tokens.push(token);
                }
            }
        }
        tokens
    }

    fn resolve(&self, token: &str, importer: &str, files: &BTreeSet<String>) -> Option<String> {
        if token.starts_with('.') {
            self.resolve_relative_module(token, importer, files)
        } else {
            self.resolve_dotted(token, importer, files)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_extract_plain_imports() {
        let extractor = PythonExtractor::new();
        let tokens = extractor.extract("import os\nimport models, utils\n");
        assert_eq!(tokens, vec!["os", "models", "utils"]);
    }

    #[test]
    fn test_extract_from_imports() {
        let extractor = PythonExtractor::new();
        let tokens = extractor.extract("from app.models import User\nfrom . import db\n");
        assert_eq!(tokens, vec!["app.models", "."]);
    }

    #[test]
    fn test_resolve_top_level_module() {
        let extractor = PythonExtractor::new();
        let set = files(&["a.py", "b.py"]);
        assert_eq!(
            extractor.resolve("b", "a.py", &set),
            Some("b.py".to_string())
        );
    }

    #[test]
    fn test_resolve_dotted_module_and_package() {
        let extractor = PythonExtractor::new();
        let set = files(&["app/models.py", "app/api/__init__.py"]);
        assert_eq!(
            extractor.resolve("app.models", "main.py", &set),
            Some("app/models.py".to_string())
        );
        assert_eq!(
            extractor.resolve("app.api", "main.py", &set),
            Some("app/api/__init__.py".to_string())
        );
    }

    #[test]
    fn test_resolve_sibling_from_nested_importer() {
        let extractor = PythonExtractor::new();
        let set = files(&["app/models.py", "app/views.py"]);
        assert_eq!(
            extractor.resolve("models", "app/views.py", &set),
            Some("app/models.py".to_string())
        );
    }

    #[test]
    fn test_resolve_relative_imports() {
        let extractor = PythonExtractor::new();
        let set = files(&["pkg/__init__.py", "pkg/db.py", "shared/util.py"]);
        assert_eq!(
            extractor.resolve(".db", "pkg/api.py", &set),
            Some("pkg/db.py".to_string())
        );
        assert_eq!(
            extractor.resolve(".", "pkg/api.py", &set),
            Some("pkg/__init__.py".to_string())
        );
        assert_eq!(
            extractor.resolve("..shared.util", "pkg/api.py", &set),
            Some("shared/util.py".to_string())
        );
    }

    #[test]
    fn test_unresolvable_is_none() {
        let extractor = PythonExtractor::new();
        let set = files(&["a.py"]);
        assert_eq!(extractor.resolve("requests", "a.py", &set), None);
        assert_eq!(extractor.resolve("...way.too.far", "a.py", &set), None);
    }
}
