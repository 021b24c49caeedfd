use crate::geometry::{Rect, Vec2};
use crate::layout::{GridLayout, GridLayouter, GridPos};
use crate::style;
use callgrid_core::{Analysis, Color, Declaration, palette_color};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;

/// Default radius for nodes that carry no declaration.
const SYNTHETIC_RADIUS: f32 = 40.0;
/// Rate of the exponential approach used for scale and opacity.
const ANIMATION_RATE: f32 = 10.0;
const SETTLE_EPSILON: f32 = 1e-3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node `{0}` already exists")]
    DuplicateNode(String),
    #[error("node `{0}` not found")]
    MissingNode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// One per analyzed declaration.
    Declaration,
    /// The analyzed file itself, used as the trace entry point when no `main` exists.
    EntryFile,
    /// Aggregated proxy for calls observed in another file.
    Module,
    /// Declaration discovered at runtime and added on the fly.
    Dynamic,
    /// User-placed text, image or video box.
    Custom,
    /// Affordance that asks the host to add a node.
    AddTool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CustomContent {
    Text(String),
    Image(String),
    Video(String),
}

/// Compiler error attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeError {
    pub line: usize,
    pub message: String,
}

/// Visual and logical unit on the canvas.
///
/// `original` is the authoritative position; `position` is restored from it
/// on every animation tick. `opacity` and `target_scale` are the logical
/// values, while `display_opacity` and `scale` approach them over time.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub declaration: Option<Declaration>,
    /// Source file for module proxies and dynamic nodes.
    pub file: Option<String>,
    pub content: Option<CustomContent>,
    pub position: Vec2,
    pub original: Vec2,
    pub grid: Option<GridPos>,
    pub base_color: Color,
    pub color_override: Option<Color>,
    pub icon: Option<String>,
    pub radius: f32,
    pub scale: f32,
    pub target_scale: f32,
    pub opacity: f32,
    pub display_opacity: f32,
    pub active: bool,
    pub active_until: Option<Instant>,
    pub error: Option<NodeError>,
    pub calls: Vec<String>,
    pub called_by: Vec<String>,
}

impl Node {
    fn base(name: impl Into<String>, kind: NodeKind) -> Self {
        let name = name.into();
        Self {
            base_color: palette_color(&name),
            name,
            kind,
            declaration: None,
            file: None,
            content: None,
            position: Vec2::ZERO,
            original: Vec2::ZERO,
            grid: None,
            color_override: None,
            icon: None,
            radius: SYNTHETIC_RADIUS,
            scale: 1.0,
            target_scale: 1.0,
            opacity: 1.0,
            display_opacity: 1.0,
            active: false,
            active_until: None,
            error: None,
            calls: Vec::new(),
            called_by: Vec::new(),
        }
    }

    pub fn from_declaration(decl: Declaration) -> Self {
        let mut node = Self::base(decl.name.clone(), NodeKind::Declaration);
        node.radius = style::node_radius(&decl);
        node.declaration = Some(decl);
        node
    }

    pub fn dynamic(decl: Declaration, file: impl Into<String>) -> Self {
        let mut node = Self::from_declaration(decl);
        node.kind = NodeKind::Dynamic;
        node.file = Some(file.into());
        node
    }

    pub fn entry_file(name: impl Into<String>, file: impl Into<String>) -> Self {
        let mut node = Self::base(name, NodeKind::EntryFile);
        node.file = Some(file.into());
        node.base_color = style::COLOR_ENTRY_ACCENT;
        node.icon = Some("rust".to_string());
        node
    }

    pub fn module(name: impl Into<String>, file: impl Into<String>) -> Self {
        let mut node = Self::base(name, NodeKind::Module);
        node.file = Some(file.into());
        node.base_color = style::COLOR_MODULE;
        node.icon = Some("rust".to_string());
        node
    }

    pub fn custom(name: impl Into<String>, content: CustomContent) -> Self {
        let mut node = Self::base(name, NodeKind::Custom);
        node.content = Some(content);
        node
    }

    pub fn custom_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::custom(name, CustomContent::Text(text.into()))
    }

    pub fn add_tool(name: impl Into<String>) -> Self {
        let mut node = Self::base(name, NodeKind::AddTool);
        node.base_color = style::COLOR_ADD_TOOL_BORDER;
        node
    }

    pub fn color(&self) -> Color {
        self.color_override.unwrap_or(self.base_color)
    }

    pub fn is_custom(&self) -> bool {
        self.kind == NodeKind::Custom
    }

    pub fn start_line(&self) -> Option<usize> {
        self.declaration.as_ref().map(|d| d.start_line)
    }

    /// Move the node, updating the authoritative position too.
    pub fn place(&mut self, position: Vec2) {
        self.position = position;
        self.original = position;
    }

    pub fn restore_position(&mut self) {
        self.position = self.original;
    }

    /// Advance scale and opacity toward their targets. Returns true while moving.
    pub fn animate(&mut self, dt: f32) -> bool {
        let k = 1.0 - (-dt * ANIMATION_RATE).exp();
        let scale_moving = approach(&mut self.scale, self.target_scale, k);
        let opacity_moving = approach(&mut self.display_opacity, self.opacity, k);
        scale_moving || opacity_moving
    }
}

fn approach(value: &mut f32, target: f32, k: f32) -> bool {
    if (*value - target).abs() <= SETTLE_EPSILON {
        let moved = *value != target;
        *value = target;
        return moved;
    }
    *value += (target - *value) * k;
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    /// Derived from a call edge.
    Call,
    /// Drawn by the user.
    Ui,
}

/// Directed visual edge between two nodes, referenced by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub from: String,
    pub to: String,
    pub kind: ConnectionKind,
    pub hidden: bool,
    pub highlighted: bool,
    pub opacity: f32,
    pub display_opacity: f32,
}

pub const CONNECTION_REST_OPACITY: f32 = 0.6;

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: ConnectionKind) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
            hidden: false,
            highlighted: false,
            opacity: CONNECTION_REST_OPACITY,
            display_opacity: CONNECTION_REST_OPACITY,
        }
    }

    pub fn touches(&self, name: &str) -> bool {
        self.from == name || self.to == name
    }

    pub fn animate(&mut self, dt: f32) -> bool {
        let k = 1.0 - (-dt * ANIMATION_RATE).exp();
        approach(&mut self.display_opacity, self.opacity, k)
    }
}

/// A node removed from the model together with the connections that went
/// with it, kept so the removal can be reverted.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedNode {
    pub index: usize,
    pub node: Node,
    pub connections: Vec<(usize, Connection)>,
}

/// Nodes and connections of one graph snapshot.
///
/// Node names are unique. Structural changes go through the model so the
/// name index and the caller/callee lists stay in sync.
#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    nodes: Vec<Node>,
    connections: Vec<Connection>,
    index: HashMap<String, usize>,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// One node per declaration and one connection per call edge.
    pub fn from_analysis(analysis: &Analysis) -> Self {
        let mut model = Self::new();
        for decl in analysis.declarations_by_line() {
            model.index.insert(decl.name.clone(), model.nodes.len());
            model.nodes.push(Node::from_declaration(decl.clone()));
        }
        for edge in analysis.call_edges() {
            if model.contains(&edge.caller) && model.contains(&edge.callee) {
                model
                    .connections
                    .push(Connection::new(edge.caller, edge.callee, ConnectionKind::Call));
            }
        }
        model.rebuild_index();
        model
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connections_mut(&mut self) -> &mut [Connection] {
        &mut self.connections
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        match self.index.get(name) {
            Some(&i) => self.nodes.get_mut(i),
            None => None,
        }
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.contains(&node.name) {
            return Err(GraphError::DuplicateNode(node.name));
        }
        self.index.insert(node.name.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Remove a node and every connection touching it.
    pub fn remove_node(&mut self, name: &str) -> Result<RemovedNode, GraphError> {
        let index = self
            .index_of(name)
            .ok_or_else(|| GraphError::MissingNode(name.to_string()))?;

        let mut connections = Vec::new();
        let mut kept = Vec::with_capacity(self.connections.len());
        for (i, conn) in self.connections.drain(..).enumerate() {
            if conn.touches(name) {
                connections.push((i, conn));
            } else {
                kept.push(conn);
            }
        }
        self.connections = kept;

        let node = self.nodes.remove(index);
        self.rebuild_index();
        Ok(RemovedNode {
            index,
            node,
            connections,
        })
    }

    /// Put back a node removed by [`GraphModel::remove_node`] at its old slot.
    pub fn restore_node(&mut self, removed: RemovedNode) -> Result<(), GraphError> {
        if self.contains(&removed.node.name) {
            return Err(GraphError::DuplicateNode(removed.node.name));
        }
        let index = removed.index.min(self.nodes.len());
        self.nodes.insert(index, removed.node);
        for (i, conn) in removed.connections {
            let at = i.min(self.connections.len());
            self.connections.insert(at, conn);
        }
        self.rebuild_index();
        Ok(())
    }

    /// Add a connection. Returns false when an identical one already exists.
    pub fn connect(
        &mut self,
        from: &str,
        to: &str,
        kind: ConnectionKind,
    ) -> Result<bool, GraphError> {
        for name in [from, to] {
            if !self.contains(name) {
                return Err(GraphError::MissingNode(name.to_string()));
            }
        }
        if from == to || self.connection_index(from, to).is_some() {
            return Ok(false);
        }
        self.connections.push(Connection::new(from, to, kind));
        if let Some(node) = self.node_mut(from) {
            node.calls.push(to.to_string());
        }
        if let Some(node) = self.node_mut(to) {
            node.called_by.push(from.to_string());
        }
        Ok(true)
    }

    pub fn remove_connection(&mut self, from: &str, to: &str) -> Option<(usize, Connection)> {
        let i = self.connection_index(from, to)?;
        let conn = self.connections.remove(i);
        self.rebuild_index();
        Some((i, conn))
    }

    pub fn connection_index(&self, from: &str, to: &str) -> Option<usize> {
        self.connections
            .iter()
            .position(|c| c.from == from && c.to == to)
    }

    /// Indices of the connections touching `name`.
    pub fn connections_of(&self, name: &str) -> Vec<usize> {
        self.connections
            .iter()
            .enumerate()
            .filter(|(_, c)| c.touches(name))
            .map(|(i, _)| i)
            .collect()
    }

    /// Callers and callees of `name`.
    pub fn related(&self, name: &str) -> Vec<&str> {
        let Some(node) = self.node(name) else {
            return Vec::new();
        };
        node.calls
            .iter()
            .chain(node.called_by.iter())
            .map(String::as_str)
            .collect()
    }

    /// `base`, or `base_2`, `base_3`... whichever is free first.
    pub fn unique_name(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Edges the grid layout must keep axis-aligned.
    pub fn layout_edges(&self) -> Vec<(String, String)> {
        self.connections
            .iter()
            .map(|c| (c.from.clone(), c.to.clone()))
            .collect()
    }

    /// Bounding box of all nodes, each expanded by its radius.
    pub fn bounds(&self) -> Option<Rect> {
        self.nodes
            .iter()
            .map(|n| Rect::from_center_size(n.original, Vec2::new(n.radius * 2.0, n.radius * 2.0)))
            .reduce(|acc, r| acc.union(&r))
    }

    /// Write grid cells and their pixel positions onto the nodes.
    pub fn apply_layout(&mut self, layout: &GridLayout, layouter: &GridLayouter) {
        for node in &mut self.nodes {
            if let Some(&cell) = layout.cells.get(&node.name) {
                node.grid = Some(cell);
                node.place(layouter.to_pixel(cell));
            }
        }
    }

    /// Recompute the name index and the caller/callee lists from the connections.
    pub fn rebuild_index(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.name.clone(), i))
            .collect();
        for node in &mut self.nodes {
            node.calls.clear();
            node.called_by.clear();
        }
        for conn in &self.connections {
            if let Some(&i) = self.index.get(&conn.from) {
                push_unique(&mut self.nodes[i].calls, &conn.to);
            }
            if let Some(&i) = self.index.get(&conn.to) {
                push_unique(&mut self.nodes[i].called_by, &conn.from);
            }
        }
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callgrid_core::DeclarationKind;
    use std::collections::BTreeMap;

    fn decl(name: &str, line: usize) -> Declaration {
        Declaration {
            name: name.to_string(),
            qualified_name: name.to_string(),
            kind: DeclarationKind::Function,
            start_line: line,
            end_line: line,
            params: Vec::new(),
            doc: String::new(),
            return_type: None,
            complexity: 1,
            source: String::new(),
        }
    }

    fn chain() -> Analysis {
        let mut analysis = Analysis::empty("chain.rs");
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            analysis
                .declarations
                .insert(name.to_string(), decl(name, i + 1));
        }
        analysis.edges = BTreeMap::from([
            ("a".to_string(), vec!["b".to_string()]),
            ("b".to_string(), vec!["c".to_string()]),
            ("c".to_string(), vec![]),
        ]);
        analysis
    }

    #[test]
    fn test_from_analysis_builds_relations() {
        let model = GraphModel::from_analysis(&chain());
        assert_eq!(model.node_count(), 3);
        assert_eq!(model.connections().len(), 2);
        let b = model.node("b").unwrap();
        assert_eq!(b.calls, vec!["c"]);
        assert_eq!(b.called_by, vec!["a"]);
        assert_eq!(model.related("b"), vec!["c", "a"]);
    }

    #[test]
    fn test_remove_and_restore_node() {
        let mut model = GraphModel::from_analysis(&chain());
        let removed = model.remove_node("b").unwrap();
        assert_eq!(removed.connections.len(), 2);
        assert!(model.connections().is_empty());
        assert!(model.node("a").unwrap().calls.is_empty());

        model.restore_node(removed).unwrap();
        assert_eq!(model.index_of("b"), Some(1));
        assert_eq!(model.connections().len(), 2);
        assert_eq!(model.node("c").unwrap().called_by, vec!["b"]);
    }

    #[test]
    fn test_duplicate_and_missing() {
        let mut model = GraphModel::from_analysis(&chain());
        assert_eq!(
            model.add_node(Node::custom_text("a", "x")),
            Err(GraphError::DuplicateNode("a".into()))
        );
        assert!(matches!(
            model.connect("a", "zzz", ConnectionKind::Ui),
            Err(GraphError::MissingNode(_))
        ));
        assert_eq!(model.connect("a", "b", ConnectionKind::Ui), Ok(false));
        assert_eq!(model.connect("c", "a", ConnectionKind::Ui), Ok(true));
        assert_eq!(model.node("a").unwrap().called_by, vec!["c"]);
    }

    #[test]
    fn test_unique_name() {
        let mut model = GraphModel::new();
        assert_eq!(model.unique_name("note"), "note");
        model.add_node(Node::custom_text("note", "")).unwrap();
        model.add_node(Node::custom_text("note_2", "")).unwrap();
        assert_eq!(model.unique_name("note"), "note_3");
    }

    #[test]
    fn test_animate_settles() {
        let mut node = Node::custom_text("n", "");
        node.opacity = 0.5;
        let mut steps = 0;
        while node.animate(0.032) {
            steps += 1;
            assert!(steps < 200);
        }
        assert_eq!(node.display_opacity, 0.5);
    }
}
