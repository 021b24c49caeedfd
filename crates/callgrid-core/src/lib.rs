use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod color;
pub mod error;

pub use color::{Color, ColorParseError, PALETTE, palette_color};
pub use error::AnalysisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclarationKind {
    Function,
    Method,
    Struct,
    Enum,
    Trait,
    TypeAlias,
    Const,
    Module,
}

impl DeclarationKind {
    pub fn is_callable(self) -> bool {
        matches!(self, DeclarationKind::Function | DeclarationKind::Method)
    }

    pub fn label(self) -> &'static str {
        match self {
            DeclarationKind::Function => "Function",
            DeclarationKind::Method => "Method",
            DeclarationKind::Struct => "Struct",
            DeclarationKind::Enum => "Enum",
            DeclarationKind::Trait => "Trait",
            DeclarationKind::TypeAlias => "Type Alias",
            DeclarationKind::Const => "Const",
            DeclarationKind::Module => "Module",
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named item extracted from one source file.
///
/// Lines are 1-based and inclusive. `source` holds the raw text of
/// `start_line..=end_line`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub qualified_name: String,
    pub kind: DeclarationKind,
    pub start_line: usize,
    pub end_line: usize,
    pub params: Vec<String>,
    pub doc: String,
    pub return_type: Option<String>,
    pub complexity: u32,
    pub source: String,
}

impl Declaration {
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn contains_line(&self, line: usize) -> bool {
        (self.start_line..=self.end_line).contains(&line)
    }
}

/// Directed "caller calls callee" relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller: String,
    pub callee: String,
}

impl CallEdge {
    pub fn new(caller: impl Into<String>, callee: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            callee: callee.into(),
        }
    }
}

/// Result of analysing one file.
///
/// `edges` has an entry for every declaration (possibly empty), listing
/// callees in first-occurrence order. When `error` is set the remaining
/// fields are either the last good result for the same path or empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub file: String,
    pub declarations: BTreeMap<String, Declaration>,
    pub edges: BTreeMap<String, Vec<String>>,
    pub declaration_count: usize,
    pub edge_count: usize,
    pub impl_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Analysis {
    pub fn empty(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            declarations: BTreeMap::new(),
            edges: BTreeMap::new(),
            declaration_count: 0,
            edge_count: 0,
            impl_count: 0,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn callees(&self, name: &str) -> &[String] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Declarations ordered by start line, then name.
    pub fn declarations_by_line(&self) -> Vec<&Declaration> {
        let mut decls: Vec<&Declaration> = self.declarations.values().collect();
        decls.sort_by(|a, b| {
            a.start_line
                .cmp(&b.start_line)
                .then_with(|| a.name.cmp(&b.name))
        });
        decls
    }

    /// All call edges, callers in line order and callees in first-occurrence order.
    pub fn call_edges(&self) -> Vec<CallEdge> {
        self.declarations_by_line()
            .into_iter()
            .flat_map(|decl| {
                self.callees(&decl.name)
                    .iter()
                    .map(move |callee| CallEdge::new(decl.name.clone(), callee.clone()))
            })
            .collect()
    }

    /// Find the declaration whose line range encloses `line`, preferring the innermost.
    pub fn declaration_at_line(&self, line: usize) -> Option<&Declaration> {
        self.declarations
            .values()
            .filter(|d| d.contains_line(line))
            .min_by_key(|d| d.line_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str, start: usize, end: usize) -> Declaration {
        Declaration {
            name: name.to_string(),
            qualified_name: name.to_string(),
            kind: DeclarationKind::Function,
            start_line: start,
            end_line: end,
            params: Vec::new(),
            doc: String::new(),
            return_type: None,
            complexity: 1,
            source: String::new(),
        }
    }

    #[test]
    fn test_call_edges_follow_line_order() {
        let mut analysis = Analysis::empty("lib.rs");
        analysis.declarations.insert("b".into(), decl("b", 5, 7));
        analysis.declarations.insert("a".into(), decl("a", 1, 3));
        analysis.edges.insert("a".into(), vec!["b".into()]);
        analysis.edges.insert("b".into(), Vec::new());

        let edges = analysis.call_edges();
        assert_eq!(edges, vec![CallEdge::new("a", "b")]);
        assert!(analysis.callees("missing").is_empty());
    }

    #[test]
    fn test_declaration_at_line_prefers_innermost() {
        let mut analysis = Analysis::empty("lib.rs");
        analysis.declarations.insert("outer".into(), decl("outer", 1, 20));
        analysis.declarations.insert("inner".into(), decl("inner", 4, 6));

        assert_eq!(analysis.declaration_at_line(5).map(|d| d.name.as_str()), Some("inner"));
        assert_eq!(analysis.declaration_at_line(15).map(|d| d.name.as_str()), Some("outer"));
        assert!(analysis.declaration_at_line(30).is_none());
    }

    #[test]
    fn test_analysis_serde_skips_missing_error() {
        let analysis = Analysis::empty("main.rs");
        let json = serde_json::to_string(&analysis).unwrap();
        assert!(!json.contains("error"));
        let back: Analysis = serde_json::from_str(&json).unwrap();
        assert_eq!(back, analysis);
    }
}
