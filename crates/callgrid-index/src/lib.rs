//! Best-effort Rust source analyzer.
//!
//! Scans a file line by line for declarations, tracks their brace extents
//! and derives an intra-file call graph from `name(` occurrences. This is
//! a heuristic scanner, not a parser.

mod calls;
mod lexer;
mod scanner;

use callgrid_core::{Analysis, AnalysisError, Declaration};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Analyze `source` without touching any cache.
pub fn analyze_source(source: &str, file: &str) -> Result<Analysis, AnalysisError> {
    let raw: Vec<&str> = source
        .split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .collect();
    let code = lexer::sanitize(source);
    let scan = scanner::scan(&raw, &code)?;
    let declarations = assign_unique_names(scan.declarations);
    let edges = calls::extract(&declarations, &code);
    let edge_count = edges.values().map(Vec::len).sum();

    Ok(Analysis {
        file: file.to_string(),
        declaration_count: declarations.len(),
        edge_count,
        impl_count: scan.impl_count,
        declarations: declarations
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect::<BTreeMap<_, _>>(),
        edges,
        error: None,
    })
}

/// Re-scan `source` and return the declaration called `name`, matching the
/// bare or qualified name.
pub fn find_declaration(source: &str, name: &str) -> Option<Declaration> {
    let analysis = analyze_source(source, "").ok()?;
    if let Some(decl) = analysis.declarations.get(name) {
        return Some(decl.clone());
    }
    analysis
        .declarations
        .into_values()
        .find(|d| d.qualified_name == name)
}

/// First declaration keeps its bare name; later duplicates fall back to the
/// qualified name, then to `name@line`.
fn assign_unique_names(declarations: Vec<Declaration>) -> Vec<Declaration> {
    let mut taken = std::collections::HashSet::new();
    declarations
        .into_iter()
        .map(|mut decl| {
            if !taken.insert(decl.name.clone()) {
                let alternate = if taken.contains(&decl.qualified_name) {
                    format!("{}@{}", decl.qualified_name, decl.start_line)
                } else {
                    decl.qualified_name.clone()
                };
                tracing::debug!("Renaming duplicate declaration {} to {}", decl.name, alternate);
                taken.insert(alternate.clone());
                decl.name = alternate;
            }
            decl
        })
        .collect()
}

fn cache_key(file: &str) -> PathBuf {
    std::path::absolute(file).unwrap_or_else(|_| PathBuf::from(file))
}

/// Analyzer with a per-path memory of the last successful result.
///
/// When a scan fails, the previous good analysis for the same absolute path
/// is returned with `error` set, so a transient syntax error does not wipe
/// the visualization.
#[derive(Debug, Default)]
pub struct Analyzer {
    last_good: Mutex<HashMap<PathBuf, Analysis>>,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(&self, source: &str, file: &str) -> Analysis {
        let key = cache_key(file);
        match analyze_source(source, file) {
            Ok(analysis) => {
                self.last_good.lock().insert(key, analysis.clone());
                analysis
            }
            Err(err) => {
                tracing::warn!("Analysis of {} failed: {}", file, err);
                let mut fallback = self
                    .last_good
                    .lock()
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| Analysis::empty(file));
                fallback.file = file.to_string();
                fallback.error = Some(err.to_string());
                fallback
            }
        }
    }

    /// Read and analyze a file on disk.
    pub fn analyze_file(&self, path: &Path) -> std::io::Result<Analysis> {
        let source = std::fs::read_to_string(path)?;
        Ok(self.analyze(&source, &path.to_string_lossy()))
    }

    pub fn last_good(&self, file: &str) -> Option<Analysis> {
        self.last_good.lock().get(&cache_key(file)).cloned()
    }

    pub fn forget(&self, file: &str) {
        self.last_good.lock().remove(&cache_key(file));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callgrid_core::{CallEdge, DeclarationKind};

    const CHAIN: &str = "fn a(){ b(); }\nfn b(){ c(); }\nfn c(){}\n";

    #[test]
    fn test_simple_chain() {
        let analysis = analyze_source(CHAIN, "chain.rs").unwrap();
        assert_eq!(analysis.declaration_count, 3);
        assert_eq!(analysis.edge_count, 2);
        assert_eq!(analysis.callees("a"), ["b"]);
        assert_eq!(analysis.callees("b"), ["c"]);
        assert!(analysis.callees("c").is_empty());
        assert_eq!(
            analysis.call_edges(),
            vec![CallEdge::new("a", "b"), CallEdge::new("b", "c")]
        );
    }

    #[test]
    fn test_reanalysis_is_identical() {
        let analyzer = Analyzer::new();
        let first = analyzer.analyze(CHAIN, "chain.rs");
        let second = analyzer.analyze(CHAIN, "chain.rs");
        assert_eq!(first, second);
    }

    #[test]
    fn test_stale_result_on_error() {
        let analyzer = Analyzer::new();
        let good = analyzer.analyze(CHAIN, "stale.rs");
        assert!(good.is_ok());

        let broken = analyzer.analyze("fn a(){ b();\nfn b(){ c(); }\n", "stale.rs");
        assert!(broken.error.is_some());
        assert_eq!(broken.declarations, good.declarations);
        assert_eq!(broken.edges, good.edges);
    }

    #[test]
    fn test_error_without_history_is_empty() {
        let analyzer = Analyzer::new();
        let broken = analyzer.analyze("}", "never_seen.rs");
        assert!(broken.error.is_some());
        assert!(broken.declarations.is_empty());
        assert_eq!(broken.declaration_count, 0);
    }

    #[test]
    fn test_cache_is_keyed_by_absolute_path() {
        let analyzer = Analyzer::new();
        assert!(analyzer.last_good("keyed.rs").is_none());
        analyzer.analyze(CHAIN, "keyed.rs");
        assert!(analyzer.last_good("./keyed.rs").is_some());
        analyzer.forget("keyed.rs");
        assert!(analyzer.last_good("keyed.rs").is_none());
    }

    #[test]
    fn test_duplicate_names_are_disambiguated() {
        let src = "struct A;\nstruct B;\nimpl A {\n    fn new() -> Self { A }\n}\nimpl B {\n    fn new() -> Self { B }\n}\n";
        let analysis = analyze_source(src, "dup.rs").unwrap();
        assert_eq!(analysis.declarations["new"].qualified_name, "A::new");
        assert_eq!(analysis.declarations["B::new"].kind, DeclarationKind::Method);
        assert_eq!(analysis.declaration_count, 4);
    }

    #[test]
    fn test_find_declaration() {
        let src = "impl Engine {\n    fn start(&self) {}\n}\n";
        assert_eq!(find_declaration(src, "start").unwrap().start_line, 2);
        assert_eq!(find_declaration(src, "Engine::start").unwrap().name, "start");
        assert!(find_declaration(src, "stop").is_none());
        assert!(find_declaration("fn broken() {", "broken").is_none());
    }
}
