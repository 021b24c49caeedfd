//! Saved canvas layout.
//!
//! A [`LayoutDocument`] captures everything needed to put a file's canvas
//! back the way the user left it: node positions and overrides, extra
//! nodes, hidden and hand-drawn connections, the camera and annotations.

use crate::annotations::Annotations;
use crate::scene::Scene;
use crate::session::absolute_path;
use callgrid_core::{Color, Declaration};
use callgrid_graph::{CameraState, ConnectionKind, CustomContent, Node, NodeKind, Vec2};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("layout I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid layout document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("layout belongs to {found}, not {expected}")]
    WrongFile { expected: PathBuf, found: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Lowercased `path::qualified_name`, stable across renames of duplicates.
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration: Option<Declaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<CustomContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub hidden: bool,
    /// Drawn by the user rather than derived from a call.
    #[serde(default)]
    pub ui: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDocument {
    pub version: u32,
    pub file: PathBuf,
    pub saved_at: DateTime<Utc>,
    pub viewport: CameraState,
    pub nodes: Vec<NodeRecord>,
    pub connections: Vec<ConnectionRecord>,
    #[serde(default)]
    pub annotations: Annotations,
}

/// Identity of a node that survives re-analysis.
pub fn node_id(file: &Path, node: &Node) -> String {
    let qualified = node
        .declaration
        .as_ref()
        .map_or(node.name.as_str(), |d| d.qualified_name.as_str());
    format!("{}::{}", file.display(), qualified).to_lowercase()
}

/// What [`LayoutDocument::apply`] could and could not restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub placed: usize,
    pub created: usize,
    pub skipped: usize,
}

impl LayoutDocument {
    /// Snapshot the scene's current state.
    pub fn capture(scene: &Scene) -> Self {
        let file = scene
            .file
            .as_deref()
            .map(absolute_path)
            .unwrap_or_default();
        let nodes = scene
            .model
            .nodes()
            .iter()
            .map(|node| NodeRecord {
                id: node_id(&file, node),
                name: node.name.clone(),
                kind: node.kind,
                x: node.original.x,
                y: node.original.y,
                declaration: node.declaration.clone(),
                color: node.color_override,
                icon: node.icon.clone(),
                content: node.content.clone(),
                file: node.file.clone(),
            })
            .collect();
        let connections = scene
            .model
            .connections()
            .iter()
            .map(|c| ConnectionRecord {
                from: c.from.clone(),
                to: c.to.clone(),
                hidden: c.hidden,
                ui: c.kind == ConnectionKind::Ui,
            })
            .collect();

        Self {
            version: DOCUMENT_VERSION,
            file,
            saved_at: Utc::now(),
            viewport: scene.camera.target(),
            nodes,
            connections,
            annotations: scene.annotations.clone(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reproduce the saved layout on `scene`, which must show the same file.
    ///
    /// Nodes are matched by id, then by name. Saved nodes that are not
    /// declarations are recreated; declarations that no longer exist and
    /// records with unusable values are skipped with a warning.
    pub fn apply(&self, scene: &mut Scene) -> Result<ApplyReport, DocumentError> {
        let expected = scene
            .file
            .as_deref()
            .map(absolute_path)
            .unwrap_or_default();
        if absolute_path(&self.file) != expected {
            return Err(DocumentError::WrongFile {
                expected,
                found: self.file.clone(),
            });
        }

        let mut report = ApplyReport::default();
        let ids: HashMap<String, String> = scene
            .model
            .nodes()
            .iter()
            .map(|n| (node_id(&expected, n), n.name.clone()))
            .collect();

        for record in &self.nodes {
            if !record.x.is_finite() || !record.y.is_finite() {
                tracing::warn!("Skipping layout entry {} with invalid position", record.name);
                report.skipped += 1;
                continue;
            }
            let position = Vec2::new(record.x, record.y);
            let existing = ids
                .get(&record.id)
                .cloned()
                .or_else(|| scene.model.contains(&record.name).then(|| record.name.clone()));

            match existing {
                Some(name) => {
                    if let Some(node) = scene.model.node_mut(&name) {
                        node.place(position);
                        // saved positions need not sit on a layout cell
                        node.grid = None;
                        node.color_override = record.color;
                        if record.icon.is_some() {
                            node.icon = record.icon.clone();
                        }
                        report.placed += 1;
                    }
                }
                None => match recreate(record) {
                    Some(mut node) => {
                        node.place(position);
                        node.color_override = record.color;
                        match scene.model.add_node(node) {
                            Ok(()) => report.created += 1,
                            Err(e) => {
                                tracing::warn!("Skipping layout entry {}: {}", record.name, e);
                                report.skipped += 1;
                            }
                        }
                    }
                    None => {
                        tracing::warn!("Declaration {} no longer exists", record.name);
                        report.skipped += 1;
                    }
                },
            }
        }

        // connections the document does not list are shown
        for conn in scene.model.connections_mut() {
            conn.hidden = false;
        }
        for record in &self.connections {
            if !scene.model.contains(&record.from) || !scene.model.contains(&record.to) {
                tracing::warn!(
                    "Skipping connection {} -> {}: missing endpoint",
                    record.from,
                    record.to
                );
                report.skipped += 1;
                continue;
            }
            if scene.model.connection_index(&record.from, &record.to).is_none() {
                let kind = if record.ui {
                    ConnectionKind::Ui
                } else {
                    ConnectionKind::Call
                };
                if let Err(e) = scene.model.connect(&record.from, &record.to, kind) {
                    tracing::warn!("Skipping connection {} -> {}: {}", record.from, record.to, e);
                    report.skipped += 1;
                    continue;
                }
            }
            if let Some(i) = scene.model.connection_index(&record.from, &record.to) {
                scene.model.connections_mut()[i].hidden = record.hidden;
            }
        }

        scene.annotations = self.annotations.clone();
        scene.camera.set_state(self.viewport);
        Ok(report)
    }
}

fn recreate(record: &NodeRecord) -> Option<Node> {
    let file = record.file.clone().unwrap_or_default();
    let mut node = match record.kind {
        NodeKind::Declaration => return None,
        NodeKind::Dynamic => Node::dynamic(record.declaration.clone()?, file),
        NodeKind::EntryFile => Node::entry_file(&record.name, file),
        NodeKind::Module => Node::module(&record.name, file),
        NodeKind::Custom => Node::custom(&record.name, record.content.clone()?),
        NodeKind::AddTool => Node::add_tool(&record.name),
    };
    if record.icon.is_some() {
        node.icon = record.icon.clone();
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::Stroke;
    use callgrid_graph::{GraphModel, GridPos};
    use callgrid_index::analyze_source;

    const SOURCE: &str = "fn a(){ b(); }\nfn b(){ c(); }\nfn c(){}\n";

    fn scene(path: &Path) -> Scene {
        let mut scene = Scene::default();
        let analysis = analyze_source(SOURCE, &path.to_string_lossy()).unwrap();
        scene.model = GraphModel::from_analysis(&analysis);
        scene.analysis = analysis;
        scene.file = Some(path.to_path_buf());
        scene
    }

    #[test]
    fn test_save_load_apply_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("chain.rs");
        let doc_path = dir.path().join("layouts").join("chain.json");

        let mut original = scene(&source_path);
        original.model.node_mut("b").unwrap().place(Vec2::new(512.0, -40.0));
        original.model.node_mut("c").unwrap().color_override = Some(Color::rgb(1, 2, 3));
        original
            .model
            .add_node(Node::custom_text("note", "remember"))
            .unwrap();
        original.model.node_mut("note").unwrap().place(Vec2::new(9.0, 9.0));
        original
            .model
            .connect("c", "note", ConnectionKind::Ui)
            .unwrap();
        original.model.connections_mut()[0].hidden = true;
        original.annotations.strokes.push(Stroke {
            points: vec![Vec2::ZERO, Vec2::new(3.0, 4.0)],
            color: Color::WHITE,
            width: 2.5,
        });
        original.camera.set_state(CameraState {
            x: 12.0,
            y: -8.0,
            zoom: 1.25,
        });

        LayoutDocument::capture(&original).save(&doc_path).unwrap();
        let loaded = LayoutDocument::load(&doc_path).unwrap();
        assert_eq!(loaded.version, DOCUMENT_VERSION);

        let mut restored = scene(&source_path);
        let report = loaded.apply(&mut restored).unwrap();
        assert_eq!(report, ApplyReport { placed: 3, created: 1, skipped: 0 });

        for node in original.model.nodes() {
            let other = restored.model.node(&node.name).unwrap();
            assert_eq!(other.position, node.position, "{}", node.name);
            assert_eq!(other.color_override, node.color_override);
        }
        let hidden: Vec<bool> = restored.model.connections().iter().map(|c| c.hidden).collect();
        assert_eq!(hidden, vec![true, false, false]);
        assert_eq!(restored.model.connections()[2].kind, ConnectionKind::Ui);
        assert_eq!(restored.annotations, original.annotations);
        assert_eq!(restored.camera.state(), original.camera.state());
    }

    #[test]
    fn test_apply_skips_stale_entries() {
        let path = PathBuf::from("/tmp/chain.rs");
        let mut doc = LayoutDocument::capture(&scene(&path));
        doc.nodes.push(NodeRecord {
            id: "gone".into(),
            name: "gone".into(),
            kind: NodeKind::Declaration,
            x: 0.0,
            y: 0.0,
            declaration: None,
            color: None,
            icon: None,
            content: None,
            file: None,
        });
        doc.nodes[0].x = f32::NAN;
        doc.connections.push(ConnectionRecord {
            from: "a".into(),
            to: "gone".into(),
            hidden: false,
            ui: true,
        });

        let mut target = scene(&path);
        let report = doc.apply(&mut target).unwrap();
        assert_eq!(report.skipped, 3);
        assert!(!target.model.contains("gone"));
    }

    #[test]
    fn test_apply_resets_state_the_document_does_not_carry() {
        let path = PathBuf::from("/tmp/chain.rs");
        let mut doc = LayoutDocument::capture(&scene(&path));
        doc.connections.clear();

        let mut target = scene(&path);
        target.model.connections_mut()[0].hidden = true;
        target.model.node_mut("a").unwrap().grid = Some(GridPos::new(4, 0));

        doc.apply(&mut target).unwrap();
        assert!(target.model.connections().iter().all(|c| !c.hidden));
        assert!(target.model.nodes().iter().all(|n| n.grid.is_none()));
    }

    #[test]
    fn test_apply_rejects_other_file() {
        let doc = LayoutDocument::capture(&scene(Path::new("/tmp/one.rs")));
        let mut other = scene(Path::new("/tmp/two.rs"));
        assert!(matches!(
            doc.apply(&mut other),
            Err(DocumentError::WrongFile { .. })
        ));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(LayoutDocument::load(&path), Err(DocumentError::Json(_))));
        assert!(matches!(
            LayoutDocument::load(&dir.path().join("missing.json")),
            Err(DocumentError::Json(_)) | Err(DocumentError::Io(_))
        ));
    }
}
