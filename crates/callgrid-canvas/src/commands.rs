//! Undo/redo for canvas edits.
//!
//! Every entry is self-contained: it carries the values it needs to apply
//! and revert itself, so a failing entry never leaves the stacks out of
//! step with each other.

use crate::annotations::{Annotations, Stroke, TextNote};
use crate::scene::Scene;
use callgrid_events::{Event, EventBus};
use callgrid_graph::graph::RemovedNode;
use callgrid_graph::{ConnectionKind, GraphError, Node, Vec2};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
    #[error("node `{0}` does not exist")]
    MissingNode(String),
    #[error("annotation index {0} is out of range")]
    IndexOutOfRange(usize),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// A reversible edit of a [`Scene`].
pub trait Command: std::fmt::Debug + Send {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError>;

    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError>;

    fn description(&self) -> String;
}

/// Manages command history for undo/redo
pub struct CommandHistory {
    undo_stack: Vec<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
    max_size: usize,
    event_bus: EventBus,
}

impl std::fmt::Debug for CommandHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHistory")
            .field("undo", &self.undo_stack.len())
            .field("redo", &self.redo_stack.len())
            .field("max_size", &self.max_size)
            .finish()
    }
}

impl CommandHistory {
    pub fn new(max_size: usize, event_bus: EventBus) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_size,
            event_bus,
        }
    }

    /// Execute a command and add it to the history
    pub fn execute(
        &mut self,
        mut cmd: Box<dyn Command>,
        scene: &mut Scene,
    ) -> Result<(), CommandError> {
        cmd.execute(scene)?;
        self.push(cmd);
        Ok(())
    }

    /// Add a command whose effect is already visible, e.g. a finished drag.
    pub fn record(&mut self, cmd: Box<dyn Command>) {
        self.push(cmd);
    }

    fn push(&mut self, cmd: Box<dyn Command>) {
        self.redo_stack.clear();
        self.undo_stack.push(cmd);
        while self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
        self.notify_change();
    }

    /// Undo the last command. The entry moves to the redo stack even when
    /// reverting it fails.
    pub fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        let mut cmd = self.undo_stack.pop().ok_or(CommandError::NothingToUndo)?;
        let result = cmd.undo(scene);
        if let Err(e) = &result {
            tracing::warn!("Undo of '{}' failed: {}", cmd.description(), e);
        }
        self.redo_stack.push(cmd);
        self.notify_change();
        result
    }

    /// Redo the last undone command, with the same failure rule as [`CommandHistory::undo`].
    pub fn redo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        let mut cmd = self.redo_stack.pop().ok_or(CommandError::NothingToRedo)?;
        let result = cmd.execute(scene);
        if let Err(e) = &result {
            tracing::warn!("Redo of '{}' failed: {}", cmd.description(), e);
        }
        self.undo_stack.push(cmd);
        self.notify_change();
        result
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.last().map(|c| c.description())
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.last().map(|c| c.description())
    }

    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.notify_change();
    }

    fn notify_change(&self) {
        self.event_bus.publish(Event::UndoStackChanged {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            undo_description: self.undo_description(),
            redo_description: self.redo_description(),
        });
    }
}

// ============================================================================
// Graph commands
// ============================================================================

#[derive(Debug, Clone)]
pub struct MoveNode {
    pub name: String,
    pub from: Vec2,
    pub to: Vec2,
}

impl MoveNode {
    pub fn new(name: impl Into<String>, from: Vec2, to: Vec2) -> Self {
        Self {
            name: name.into(),
            from,
            to,
        }
    }

    fn place(&self, scene: &mut Scene, at: Vec2) -> Result<(), CommandError> {
        let node = scene
            .model
            .node_mut(&self.name)
            .ok_or_else(|| CommandError::MissingNode(self.name.clone()))?;
        node.place(at);
        Ok(())
    }
}

impl Command for MoveNode {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        self.place(scene, self.to)
    }

    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        self.place(scene, self.from)
    }

    fn description(&self) -> String {
        format!("Move {}", self.name)
    }
}

/// Add a node, optionally wired from an existing one with a UI connection.
#[derive(Debug, Clone)]
pub struct AddNode {
    node: Node,
    link_from: Option<String>,
    removed: Option<RemovedNode>,
}

impl AddNode {
    pub fn new(node: Node, link_from: Option<String>) -> Self {
        Self {
            node,
            link_from,
            removed: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }
}

impl Command for AddNode {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        if let Some(removed) = self.removed.take() {
            scene.model.restore_node(removed)?;
            return Ok(());
        }
        if let Some(source) = &self.link_from
            && !scene.model.contains(source)
        {
            return Err(CommandError::MissingNode(source.clone()));
        }
        scene.model.add_node(self.node.clone())?;
        if let Some(source) = &self.link_from {
            scene
                .model
                .connect(source, &self.node.name, ConnectionKind::Ui)?;
        }
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        self.removed = Some(scene.model.remove_node(&self.node.name)?);
        Ok(())
    }

    fn description(&self) -> String {
        format!("Add {}", self.node.name)
    }
}

/// Hide every connection touching a node. The call edges stay in the analysis.
#[derive(Debug, Clone)]
pub struct HideConnections {
    pub node: String,
    previous: Vec<(String, String, bool)>,
}

impl HideConnections {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            previous: Vec::new(),
        }
    }
}

impl Command for HideConnections {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        if !scene.model.contains(&self.node) {
            return Err(CommandError::MissingNode(self.node.clone()));
        }
        self.previous.clear();
        for conn in scene.model.connections_mut() {
            if conn.touches(&self.node) {
                self.previous
                    .push((conn.from.clone(), conn.to.clone(), conn.hidden));
                conn.hidden = true;
            }
        }
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        for (from, to, hidden) in &self.previous {
            if let Some(i) = scene.model.connection_index(from, to) {
                scene.model.connections_mut()[i].hidden = *hidden;
            }
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("Hide connections of {}", self.node)
    }
}

#[derive(Debug, Clone)]
pub struct DeleteNode {
    pub name: String,
    removed: Option<RemovedNode>,
}

impl DeleteNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            removed: None,
        }
    }
}

impl Command for DeleteNode {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        self.removed = Some(scene.model.remove_node(&self.name)?);
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        let removed = self
            .removed
            .take()
            .ok_or_else(|| CommandError::MissingNode(self.name.clone()))?;
        scene.model.restore_node(removed)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Delete {}", self.name)
    }
}

// ============================================================================
// Annotation commands
// ============================================================================

#[derive(Debug, Clone)]
pub struct AddStroke {
    pub stroke: Stroke,
    index: usize,
}

impl AddStroke {
    pub fn new(stroke: Stroke) -> Self {
        Self { stroke, index: 0 }
    }
}

impl Command for AddStroke {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        self.index = scene.annotations.strokes.len();
        scene.annotations.strokes.push(self.stroke.clone());
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        if self.index >= scene.annotations.strokes.len() {
            return Err(CommandError::IndexOutOfRange(self.index));
        }
        scene.annotations.strokes.remove(self.index);
        Ok(())
    }

    fn description(&self) -> String {
        "Draw".to_string()
    }
}

#[derive(Debug, Clone)]
pub struct AddText {
    pub note: TextNote,
    index: usize,
}

impl AddText {
    pub fn new(note: TextNote) -> Self {
        Self { note, index: 0 }
    }
}

impl Command for AddText {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        self.index = scene.annotations.texts.len();
        scene.annotations.texts.push(self.note.clone());
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        if self.index >= scene.annotations.texts.len() {
            return Err(CommandError::IndexOutOfRange(self.index));
        }
        scene.annotations.texts.remove(self.index);
        Ok(())
    }

    fn description(&self) -> String {
        format!("Add text \"{}\"", self.note.text)
    }
}

/// One whole eraser gesture, covering both strokes and texts.
#[derive(Debug, Clone)]
pub struct Erase {
    pub before: Annotations,
    pub after: Annotations,
}

impl Command for Erase {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        scene.annotations = self.after.clone();
        Ok(())
    }

    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        scene.annotations = self.before.clone();
        Ok(())
    }

    fn description(&self) -> String {
        "Erase".to_string()
    }
}

/// Move, resize or retype a text annotation.
#[derive(Debug, Clone)]
pub struct UpdateText {
    pub index: usize,
    pub before: TextNote,
    pub after: TextNote,
}

impl UpdateText {
    fn set(&self, scene: &mut Scene, note: &TextNote) -> Result<(), CommandError> {
        let slot = scene
            .annotations
            .texts
            .get_mut(self.index)
            .ok_or(CommandError::IndexOutOfRange(self.index))?;
        *slot = note.clone();
        Ok(())
    }
}

impl Command for UpdateText {
    fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        self.set(scene, &self.after)
    }

    fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        self.set(scene, &self.before)
    }

    fn description(&self) -> String {
        "Edit text".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callgrid_core::Color;

    fn scene() -> Scene {
        let mut scene = Scene::default();
        scene.model.add_node(Node::custom_text("a", "a")).unwrap();
        scene.model.add_node(Node::custom_text("b", "b")).unwrap();
        scene.model.connect("a", "b", ConnectionKind::Call).unwrap();
        scene
    }

    #[test]
    fn test_history_stacks_and_events() {
        let bus = EventBus::new();
        let mut history = CommandHistory::new(2, bus.clone());
        let mut scene = scene();
        for x in [1.0, 2.0, 3.0] {
            let from = scene.model.node("a").unwrap().position;
            history
                .execute(Box::new(MoveNode::new("a", from, Vec2::new(x, 0.0))), &mut scene)
                .unwrap();
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.undo_description().as_deref(), Some("Move a"));

        history.undo(&mut scene).unwrap();
        assert_eq!(scene.model.node("a").unwrap().position, Vec2::new(2.0, 0.0));
        assert!(history.can_redo());
        history.undo(&mut scene).unwrap();
        assert!(matches!(history.undo(&mut scene), Err(CommandError::NothingToUndo)));

        let events = bus.drain();
        assert!(matches!(
            events.last(),
            Some(Event::UndoStackChanged { can_undo: false, can_redo: true, .. })
        ));
    }

    #[test]
    fn test_failed_undo_still_advances() {
        let mut history = CommandHistory::new(10, EventBus::new());
        let mut scene = scene();
        history
            .execute(Box::new(MoveNode::new("b", Vec2::ZERO, Vec2::new(5.0, 5.0))), &mut scene)
            .unwrap();
        scene.model.remove_node("b").unwrap();

        assert!(matches!(history.undo(&mut scene), Err(CommandError::MissingNode(_))));
        assert!(!history.can_undo());
        assert!(history.can_redo());
        assert!(history.redo(&mut scene).is_err());
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_add_node_with_link_round_trip() {
        let mut history = CommandHistory::new(10, EventBus::new());
        let mut scene = scene();
        let node = Node::custom_text("note", "hello");
        history
            .execute(Box::new(AddNode::new(node, Some("b".into()))), &mut scene)
            .unwrap();
        let added = scene.model.clone();
        assert_eq!(scene.model.related("note"), vec!["b"]);
        assert_eq!(scene.model.connections()[1].kind, ConnectionKind::Ui);

        history.undo(&mut scene).unwrap();
        assert!(!scene.model.contains("note"));
        assert_eq!(scene.model.connections().len(), 1);

        history.redo(&mut scene).unwrap();
        assert_eq!(scene.model.nodes(), added.nodes());
        assert_eq!(scene.model.connections(), added.connections());
    }

    #[test]
    fn test_hide_connections_restores_flags() {
        let mut history = CommandHistory::new(10, EventBus::new());
        let mut scene = scene();
        history
            .execute(Box::new(HideConnections::new("b")), &mut scene)
            .unwrap();
        assert!(scene.model.connections()[0].hidden);
        history.undo(&mut scene).unwrap();
        assert!(!scene.model.connections()[0].hidden);
    }

    #[test]
    fn test_text_edits() {
        let mut history = CommandHistory::new(10, EventBus::new());
        let mut scene = scene();
        let note = TextNote {
            position: Vec2::ZERO,
            text: "hi".into(),
            size: 14.0,
            color: Color::WHITE,
        };
        history
            .execute(Box::new(AddText::new(note.clone())), &mut scene)
            .unwrap();
        let bigger = TextNote {
            size: 20.0,
            ..note.clone()
        };
        history
            .execute(
                Box::new(UpdateText {
                    index: 0,
                    before: note.clone(),
                    after: bigger.clone(),
                }),
                &mut scene,
            )
            .unwrap();
        assert_eq!(scene.annotations.texts, vec![bigger]);
        history.undo(&mut scene).unwrap();
        assert_eq!(scene.annotations.texts, vec![note]);
        history.undo(&mut scene).unwrap();
        assert!(scene.annotations.texts.is_empty());
    }
}
