//! Compiler errors reported by an external build, mapped onto nodes.

use crate::scene::Scene;
use crate::session::absolute_path;
use callgrid_graph::graph::NodeError;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    pub func: Option<String>,
    pub line: usize,
    pub message: String,
}

/// At most one pending error per file. Entries disappear as soon as a later
/// call trace or a successful run touches the file.
#[derive(Debug, Clone, Default)]
pub struct ErrorRegistry {
    entries: HashMap<PathBuf, FileError>,
}

impl ErrorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, file: &Path, func: Option<&str>, line: usize, message: &str) {
        self.entries.insert(
            absolute_path(file),
            FileError {
                func: func.filter(|f| !f.is_empty()).map(str::to_string),
                line,
                message: message.to_string(),
            },
        );
    }

    /// Returns true when an error was pending for `file`.
    pub fn clear_file(&mut self, file: &Path) -> bool {
        self.entries.remove(&absolute_path(file)).is_some()
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, file: &Path) -> Option<&FileError> {
        self.entries.get(&absolute_path(file))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recompute every node's error flag.
    ///
    /// Errors in the analyzed file land on the named function, or on the
    /// declaration enclosing the line. Errors in other files land on that
    /// file's module node if one exists.
    pub fn apply(&self, scene: &mut Scene, modules: &BTreeMap<PathBuf, String>) {
        for node in scene.model.nodes_mut() {
            node.error = None;
        }
        let current = scene.file.as_deref().map(absolute_path);

        for (path, entry) in &self.entries {
            let target = if current.as_ref() == Some(path) {
                entry
                    .func
                    .as_deref()
                    .filter(|f| scene.model.contains(f))
                    .map(str::to_string)
                    .or_else(|| {
                        scene
                            .analysis
                            .declaration_at_line(entry.line)
                            .map(|d| d.name.clone())
                    })
            } else {
                modules.get(path).cloned()
            };

            match target.and_then(|name| scene.model.node_mut(&name)) {
                Some(node) => {
                    node.error = Some(NodeError {
                        line: entry.line,
                        message: entry.message.clone(),
                    });
                }
                None => tracing::debug!(
                    "No node for compiler error at {}:{}",
                    path.display(),
                    entry.line
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callgrid_graph::GraphModel;
    use callgrid_index::analyze_source;

    fn scene() -> Scene {
        let mut scene = Scene::default();
        let analysis = analyze_source(
            "fn foo() {\n    let x = 1;\n    bar();\n    x / 0;\n}\nfn bar() {}\n",
            "/tmp/errs.rs",
        )
        .unwrap();
        scene.model = GraphModel::from_analysis(&analysis);
        scene.analysis = analysis;
        scene.file = Some(PathBuf::from("/tmp/errs.rs"));
        scene
    }

    #[test]
    fn test_error_by_function_then_clear() {
        let mut scene = scene();
        let mut registry = ErrorRegistry::new();
        registry.mark(Path::new("/tmp/errs.rs"), Some("foo"), 4, "divide by zero");
        registry.apply(&mut scene, &BTreeMap::new());
        let error = scene.model.node("foo").unwrap().error.clone().unwrap();
        assert_eq!(error.line, 4);
        assert_eq!(error.message, "divide by zero");
        assert!(scene.model.node("bar").unwrap().error.is_none());

        assert!(registry.clear_file(Path::new("/tmp/errs.rs")));
        registry.apply(&mut scene, &BTreeMap::new());
        assert!(scene.model.node("foo").unwrap().error.is_none());
        assert!(!registry.clear_file(Path::new("/tmp/errs.rs")));
    }

    #[test]
    fn test_error_by_line_and_module() {
        let mut scene = scene();
        scene
            .model
            .add_node(callgrid_graph::Node::module("util.rs", "/tmp/util.rs"))
            .unwrap();
        let modules = BTreeMap::from([(PathBuf::from("/tmp/util.rs"), "util.rs".to_string())]);

        let mut registry = ErrorRegistry::new();
        registry.mark(Path::new("/tmp/errs.rs"), None, 6, "unused");
        registry.mark(Path::new("/tmp/util.rs"), Some("helper"), 2, "type mismatch");
        registry.apply(&mut scene, &modules);

        assert_eq!(scene.model.node("bar").unwrap().error.as_ref().unwrap().line, 6);
        assert_eq!(
            scene.model.node("util.rs").unwrap().error.as_ref().unwrap().message,
            "type mismatch"
        );
        registry.clear_all();
        assert!(registry.is_empty());
    }
}
