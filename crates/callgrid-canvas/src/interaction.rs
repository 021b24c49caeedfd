//! Pointer and keyboard handling.
//!
//! [`InteractionController`] is a state machine over one gesture at a time.
//! It mutates the scene only through the borrowed [`InteractionContext`],
//! pushes undo entries for finished edits and forwards everything it does
//! not own (code views, editors, dialogs) to the host.

use crate::annotations::{AnnotationTool, Annotations, Stroke, TextNote};
use crate::commands::{
    AddStroke, AddText, CommandError, CommandHistory, DeleteNode, Erase, HideConnections, MoveNode,
    UpdateText,
};
use crate::config::CanvasConfig;
use crate::input::{Key, Modifiers, PointerButton};
use crate::scene::Scene;
use callgrid_core::Color;
use callgrid_events::HostCallbacks;
use callgrid_graph::{NodeKind, Rect, TextMetrics, Vec2};
use std::path::PathBuf;
use std::time::Instant;

/// Everything a handler may touch, borrowed from the canvas for one call.
pub struct InteractionContext<'a> {
    pub scene: &'a mut Scene,
    pub history: &'a mut CommandHistory,
    pub host: &'a mut dyn HostCallbacks,
    pub config: &'a CanvasConfig,
    pub metrics: &'a dyn TextMetrics,
    pub now: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    Drawing(Stroke),
    Erasing { before: Annotations, last: Vec2 },
    ResizingText { index: usize, before: TextNote, start: Vec2 },
    DraggingText { index: usize, before: TextNote, offset: Vec2 },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    DraggingNode {
        name: String,
        start: Vec2,
        offset: Vec2,
    },
    PanningCamera {
        last: Vec2,
        travelled: f32,
    },
    BoxSelecting {
        start: Vec2,
        current: Vec2,
    },
    ConnectionDragging {
        source: String,
        current: Vec2,
    },
    TransformGrab {
        nodes: Vec<(String, Vec2)>,
        anchor: Vec2,
        axis: Option<Axis>,
    },
    Annotating(Gesture),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContextTarget {
    Node(String),
    Background(Vec2),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextAction {
    GoToFile,
    OpenEditor,
    HideConnections,
    ShowInfo,
    Delete,
    Undo,
    Redo,
    SaveLayout,
    OpenLayout,
    Search,
    ToggleTraceOverlay,
    StopRun,
    ResetView,
}

impl ContextAction {
    pub fn for_target(target: &ContextTarget) -> &'static [ContextAction] {
        match target {
            ContextTarget::Node(_) => &[
                Self::GoToFile,
                Self::OpenEditor,
                Self::HideConnections,
                Self::ShowInfo,
                Self::Delete,
            ],
            ContextTarget::Background(_) => &[
                Self::Undo,
                Self::Redo,
                Self::SaveLayout,
                Self::OpenLayout,
                Self::Search,
                Self::ToggleTraceOverlay,
                Self::StopRun,
                Self::ResetView,
            ],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::GoToFile => "Go to File",
            Self::OpenEditor => "Open in Editor",
            Self::HideConnections => "Hide Connections",
            Self::ShowInfo => "Show Info",
            Self::Delete => "Delete",
            Self::Undo => "Undo",
            Self::Redo => "Redo",
            Self::SaveLayout => "Save Layout",
            Self::OpenLayout => "Open Layout",
            Self::Search => "Search",
            Self::ToggleTraceOverlay => "Toggle Call Trace",
            Self::StopRun => "Stop Run",
            Self::ResetView => "Reset View",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InteractionController {
    state: InteractionState,
    pub tool: AnnotationTool,
    pub box_select_mode: bool,
    /// An inline text editor has keyboard focus; shortcuts are suppressed.
    pub text_editing: bool,
    pub annotation_color: Color,
    pub brush_width: f32,
    /// Eraser radius in screen pixels.
    pub eraser_radius: f32,
    pending_text: Option<Vec2>,
    color_picker_requested: bool,
    last_pointer: Vec2,
}

impl InteractionController {
    pub fn new(config: &CanvasConfig) -> Self {
        Self {
            state: InteractionState::Idle,
            tool: AnnotationTool::Cursor,
            box_select_mode: false,
            text_editing: false,
            annotation_color: config.annotation_color,
            brush_width: config.brush_width,
            eraser_radius: config.eraser_radius,
            pending_text: None,
            color_picker_requested: false,
            last_pointer: Vec2::ZERO,
        }
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == InteractionState::Idle
    }

    pub fn set_tool(&mut self, tool: AnnotationTool) {
        self.tool = tool;
        if tool != AnnotationTool::Text {
            self.pending_text = None;
        }
    }

    /// World position waiting for the text the GUI will ask for.
    pub fn pending_text(&self) -> Option<Vec2> {
        self.pending_text
    }

    /// Returns true once after the color picker tool was used.
    pub fn take_color_picker_request(&mut self) -> bool {
        std::mem::take(&mut self.color_picker_requested)
    }

    /// Source and world end point of an in-progress connection drag.
    pub fn drag_preview(&self) -> Option<(&str, Vec2)> {
        match &self.state {
            InteractionState::ConnectionDragging { source, current } => {
                Some((source.as_str(), *current))
            }
            _ => None,
        }
    }

    /// Screen-space rectangle of an in-progress box selection.
    pub fn selection_box(&self) -> Option<Rect> {
        match &self.state {
            InteractionState::BoxSelecting { start, current } => {
                Some(Rect::from_min_max(*start, *current))
            }
            _ => None,
        }
    }

    /// Stroke being drawn, not yet in the scene.
    pub fn live_stroke(&self) -> Option<&Stroke> {
        match &self.state {
            InteractionState::Annotating(Gesture::Drawing(stroke)) => Some(stroke),
            _ => None,
        }
    }

    /// Short hint describing the active mode, if any.
    pub fn mode_hint(&self) -> Option<String> {
        if let InteractionState::TransformGrab { nodes, axis, .. } = &self.state {
            let axis = match axis {
                Some(Axis::X) => " along X",
                Some(Axis::Y) => " along Y",
                None => "",
            };
            return Some(format!(
                "Moving {} node(s){axis}. Click to confirm, Esc to cancel",
                nodes.len()
            ));
        }
        if self.box_select_mode {
            return Some("Box select (S to exit)".to_string());
        }
        if self.tool != AnnotationTool::Cursor {
            return Some(format!("{} tool", self.tool.label()));
        }
        None
    }

    // ------------------------------------------------------------------
    // Pointer
    // ------------------------------------------------------------------

    pub fn pointer_pressed(
        &mut self,
        ctx: &mut InteractionContext<'_>,
        screen: Vec2,
        button: PointerButton,
        modifiers: Modifiers,
    ) {
        self.last_pointer = screen;
        let world = ctx.scene.camera.screen_to_world(screen);

        match button {
            PointerButton::Secondary => {
                if matches!(self.state, InteractionState::TransformGrab { .. }) {
                    self.cancel_grab(ctx);
                } else if matches!(self.state, InteractionState::ConnectionDragging { .. }) {
                    self.state = InteractionState::Idle;
                }
                return;
            }
            PointerButton::Middle => {
                self.state = InteractionState::PanningCamera {
                    last: screen,
                    travelled: 0.0,
                };
                return;
            }
            PointerButton::Primary => {}
        }

        if matches!(self.state, InteractionState::TransformGrab { .. }) {
            self.confirm_grab(ctx);
            return;
        }

        let annotations = &ctx.scene.annotations;
        let camera = &ctx.scene.camera;
        if let Some(index) =
            annotations.handle_at(screen, camera, ctx.metrics, ctx.config.resize_handle)
        {
            self.state = InteractionState::Annotating(Gesture::ResizingText {
                index,
                before: annotations.texts[index].clone(),
                start: screen,
            });
            return;
        }

        match self.tool {
            AnnotationTool::Cursor => {}
            AnnotationTool::Brush => {
                self.state = InteractionState::Annotating(Gesture::Drawing(Stroke::new(
                    world,
                    self.annotation_color,
                    self.brush_width,
                )));
                return;
            }
            AnnotationTool::Text => {
                match annotations.text_at(screen, camera, ctx.metrics) {
                    Some(index) => {
                        let before = annotations.texts[index].clone();
                        self.state = InteractionState::Annotating(Gesture::DraggingText {
                            index,
                            offset: before.position - world,
                            before,
                        });
                    }
                    None => self.pending_text = Some(world),
                }
                return;
            }
            AnnotationTool::Erase => {
                let before = ctx.scene.annotations.clone();
                let radius = self.world_eraser_radius(ctx);
                let scene = &mut *ctx.scene;
                scene
                    .annotations
                    .erase_path(world, world, radius, &scene.camera, ctx.metrics);
                self.state = InteractionState::Annotating(Gesture::Erasing {
                    before,
                    last: world,
                });
                return;
            }
            AnnotationTool::ColorPicker => {
                self.color_picker_requested = true;
                return;
            }
        }

        if self.box_select_mode {
            self.state = InteractionState::BoxSelecting {
                start: screen,
                current: screen,
            };
            return;
        }

        let hit = ctx
            .scene
            .hit_tester(ctx.metrics)
            .node_at(world)
            .map(str::to_string);
        let Some(name) = hit else {
            self.state = InteractionState::PanningCamera {
                last: screen,
                travelled: 0.0,
            };
            return;
        };
        let Some(node) = ctx.scene.model.node(&name) else {
            return;
        };

        if modifiers.ctrl && !node.is_custom() {
            self.state = InteractionState::ConnectionDragging {
                source: name,
                current: world,
            };
            return;
        }

        let start = node.original;
        ctx.scene.select(Some(&name), ctx.config);
        ctx.host.node_selected(Some(&name));
        self.state = InteractionState::DraggingNode {
            name,
            start,
            offset: start - world,
        };
    }

    pub fn pointer_moved(&mut self, ctx: &mut InteractionContext<'_>, screen: Vec2) {
        self.last_pointer = screen;
        let world = ctx.scene.camera.screen_to_world(screen);

        match &mut self.state {
            InteractionState::Idle => {}
            InteractionState::DraggingNode { name, offset, .. } => {
                if let Some(node) = ctx.scene.model.node_mut(name) {
                    node.place(world + *offset);
                }
            }
            InteractionState::PanningCamera { last, travelled } => {
                let delta = screen - *last;
                *travelled += delta.length();
                *last = screen;
                ctx.scene.camera.pan_by(delta);
            }
            InteractionState::BoxSelecting { start, current } => {
                *current = screen;
                let area = Rect::from_min_max(
                    ctx.scene.camera.screen_to_world(*start),
                    ctx.scene.camera.screen_to_world(*current),
                );
                let names: Vec<String> = ctx
                    .scene
                    .hit_tester(ctx.metrics)
                    .nodes_in(area)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                ctx.scene.highlight(names, ctx.config);
            }
            InteractionState::ConnectionDragging { current, .. } => *current = world,
            InteractionState::TransformGrab {
                nodes,
                anchor,
                axis,
            } => {
                let delta = constrain(world - *anchor, *axis);
                for (name, start) in nodes.iter() {
                    if let Some(node) = ctx.scene.model.node_mut(name) {
                        node.place(*start + delta);
                    }
                }
            }
            InteractionState::Annotating(gesture) => match gesture {
                Gesture::Drawing(stroke) => {
                    stroke.extend_to(world, ctx.config.brush_min_step);
                }
                Gesture::Erasing { last, .. } => {
                    let radius = self.eraser_radius / ctx.scene.camera.zoom();
                    let scene = &mut *ctx.scene;
                    scene
                        .annotations
                        .erase_path(*last, world, radius, &scene.camera, ctx.metrics);
                    *last = world;
                }
                Gesture::ResizingText {
                    index,
                    before,
                    start,
                } => {
                    let drag = (screen.x - start.x) + (screen.y - start.y);
                    let size = (before.size + drag * ctx.config.text_resize_factor)
                        .max(ctx.config.min_text_size);
                    if let Some(note) = ctx.scene.annotations.texts.get_mut(*index) {
                        note.size = size;
                    }
                }
                Gesture::DraggingText { index, offset, .. } => {
                    if let Some(note) = ctx.scene.annotations.texts.get_mut(*index) {
                        note.position = world + *offset;
                    }
                }
            },
        }
    }

    pub fn pointer_released(
        &mut self,
        ctx: &mut InteractionContext<'_>,
        screen: Vec2,
        button: PointerButton,
    ) {
        self.last_pointer = screen;
        if button == PointerButton::Secondary {
            return;
        }
        let world = ctx.scene.camera.screen_to_world(screen);
        let state = std::mem::take(&mut self.state);

        match state {
            InteractionState::Idle => {}
            // grabs end with a click, not a release
            grab @ InteractionState::TransformGrab { .. } => self.state = grab,
            InteractionState::DraggingNode { name, start, .. } => {
                let Some(node) = ctx.scene.model.node(&name) else {
                    return;
                };
                let end = node.original;
                if end.distance(start) > ctx.config.move_epsilon {
                    ctx.history.record(Box::new(MoveNode::new(name, start, end)));
                }
            }
            InteractionState::PanningCamera { travelled, .. } => {
                if button == PointerButton::Primary
                    && travelled <= ctx.config.click_slop
                    && !ctx.scene.selection.is_empty()
                {
                    ctx.scene.clear_selection(ctx.config);
                    ctx.host.node_selected(None);
                }
            }
            InteractionState::BoxSelecting { start, current } => {
                let area = Rect::from_min_max(
                    ctx.scene.camera.screen_to_world(start),
                    ctx.scene.camera.screen_to_world(current),
                );
                let names: Vec<String> = ctx
                    .scene
                    .hit_tester(ctx.metrics)
                    .nodes_in(area)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                match names.len() {
                    0 => {
                        ctx.scene.clear_selection(ctx.config);
                        ctx.host.node_selected(None);
                    }
                    1 => {
                        ctx.scene.select(Some(&names[0]), ctx.config);
                        ctx.host.node_selected(Some(&names[0]));
                    }
                    _ => ctx.scene.highlight(names, ctx.config),
                }
            }
            InteractionState::ConnectionDragging { source, .. } => {
                let over_node = ctx.scene.hit_tester(ctx.metrics).node_at(world).is_some();
                if !over_node {
                    ctx.host.connection_drag_completed(&source, world.x, world.y);
                }
            }
            InteractionState::Annotating(gesture) => self.finish_gesture(ctx, gesture),
        }
    }

    fn finish_gesture(&mut self, ctx: &mut InteractionContext<'_>, gesture: Gesture) {
        let result = match gesture {
            Gesture::Drawing(stroke) => {
                if stroke.points.len() < 2 {
                    return;
                }
                ctx.history
                    .execute(Box::new(AddStroke::new(stroke)), ctx.scene)
            }
            Gesture::Erasing { before, .. } => {
                if before != ctx.scene.annotations {
                    let after = ctx.scene.annotations.clone();
                    ctx.history.record(Box::new(Erase { before, after }));
                }
                Ok(())
            }
            Gesture::ResizingText { index, before, .. }
            | Gesture::DraggingText { index, before, .. } => {
                if let Some(after) = ctx.scene.annotations.texts.get(index)
                    && *after != before
                {
                    let after = after.clone();
                    ctx.history.record(Box::new(UpdateText {
                        index,
                        before,
                        after,
                    }));
                }
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::warn!("Annotation edit failed: {}", e);
        }
    }

    pub fn double_clicked(&mut self, ctx: &mut InteractionContext<'_>, screen: Vec2) {
        let world = ctx.scene.camera.screen_to_world(screen);
        let hit = ctx
            .scene
            .hit_tester(ctx.metrics)
            .node_at(world)
            .map(str::to_string);
        match hit {
            Some(name) => {
                let is_add_tool = ctx
                    .scene
                    .model
                    .node(&name)
                    .is_some_and(|n| n.kind == NodeKind::AddTool);
                if is_add_tool {
                    ctx.host.add_requested(None);
                } else {
                    ctx.host.show_code(&name);
                    ctx.host.node_double_clicked(&name);
                }
            }
            None => ctx.scene.reset_view(ctx.config, ctx.now),
        }
    }

    /// Wheel zoom toward the cursor.
    pub fn scrolled(&mut self, ctx: &mut InteractionContext<'_>, screen: Vec2, delta_y: f32) {
        if delta_y == 0.0 {
            return;
        }
        let factor = if delta_y > 0.0 {
            ctx.config.wheel_in_step
        } else {
            ctx.config.wheel_out_step
        };
        ctx.scene.camera.zoom_at(screen, factor);
    }

    // ------------------------------------------------------------------
    // Keyboard
    // ------------------------------------------------------------------

    /// Returns true when the key was consumed.
    pub fn key_pressed(
        &mut self,
        ctx: &mut InteractionContext<'_>,
        key: Key,
        modifiers: Modifiers,
    ) -> bool {
        if self.text_editing {
            return false;
        }

        if modifiers.ctrl {
            return match key {
                Key::Char('z') if modifiers.shift => {
                    self.redo(ctx);
                    true
                }
                Key::Char('z') => {
                    self.undo(ctx);
                    true
                }
                Key::Char('y') => {
                    self.redo(ctx);
                    true
                }
                Key::Char('s') if modifiers.alt => {
                    ctx.host.save_layout_requested();
                    true
                }
                Key::Char('o') => {
                    ctx.host.open_layout_requested();
                    true
                }
                Key::Char('r') => {
                    ctx.scene.reset_view(ctx.config, ctx.now);
                    true
                }
                Key::Char('f') => {
                    ctx.host.search_requested();
                    true
                }
                _ => false,
            };
        }

        match key {
            Key::Escape => {
                if matches!(self.state, InteractionState::TransformGrab { .. }) {
                    self.cancel_grab(ctx);
                } else if matches!(self.state, InteractionState::ConnectionDragging { .. }) {
                    self.state = InteractionState::Idle;
                } else if self.box_select_mode {
                    self.box_select_mode = false;
                } else if self.pending_text.is_some() {
                    self.pending_text = None;
                } else {
                    ctx.scene.clear_selection(ctx.config);
                    ctx.host.node_selected(None);
                }
                true
            }
            Key::Enter => {
                let Some(name) = ctx.scene.selection.selected.clone() else {
                    return false;
                };
                let (path, line) = node_location(ctx.scene, &name);
                ctx.host.open_editor(&name, &path, line);
                true
            }
            Key::Delete | Key::Backspace => {
                let members = ctx.scene.selection.members();
                if members.is_empty() {
                    return false;
                }
                for name in members {
                    if let Err(e) = ctx.history.execute(Box::new(DeleteNode::new(&name)), ctx.scene)
                    {
                        tracing::warn!("Could not delete {}: {}", name, e);
                    }
                }
                ctx.scene.refresh_emphasis(ctx.config);
                true
            }
            Key::Char(c @ '1'..='5') => match AnnotationTool::from_digit(c) {
                Some(tool) => {
                    self.set_tool(tool);
                    true
                }
                None => false,
            },
            Key::Char('s') => {
                self.box_select_mode = !self.box_select_mode;
                true
            }
            Key::Char('g') => self.start_grab(ctx),
            Key::Char(c @ ('x' | 'y')) => {
                let wanted = if c == 'x' { Axis::X } else { Axis::Y };
                let InteractionState::TransformGrab { axis, .. } = &mut self.state else {
                    return false;
                };
                *axis = if *axis == Some(wanted) {
                    None
                } else {
                    Some(wanted)
                };
                let pointer = self.last_pointer;
                self.pointer_moved(ctx, pointer);
                true
            }
            Key::Char('+' | '=') => {
                ctx.scene.zoom_by(ctx.config.zoom_in_step, ctx.now);
                true
            }
            Key::Char('-') => {
                ctx.scene.zoom_by(ctx.config.zoom_out_step, ctx.now);
                true
            }
            _ => false,
        }
    }

    fn start_grab(&mut self, ctx: &mut InteractionContext<'_>) -> bool {
        if !self.is_idle() {
            return false;
        }
        let nodes: Vec<(String, Vec2)> = ctx
            .scene
            .selection
            .members()
            .into_iter()
            .filter_map(|name| {
                let start = ctx.scene.model.node(&name)?.original;
                Some((name, start))
            })
            .collect();
        if nodes.is_empty() {
            return false;
        }
        self.state = InteractionState::TransformGrab {
            nodes,
            anchor: ctx.scene.camera.screen_to_world(self.last_pointer),
            axis: None,
        };
        true
    }

    /// Keep the moved positions, one undo entry per node that moved.
    fn confirm_grab(&mut self, ctx: &mut InteractionContext<'_>) {
        let InteractionState::TransformGrab { nodes, .. } = std::mem::take(&mut self.state) else {
            return;
        };
        for (name, start) in nodes {
            let Some(end) = ctx.scene.model.node(&name).map(|n| n.original) else {
                continue;
            };
            if end.distance(start) > ctx.config.move_epsilon {
                ctx.history.record(Box::new(MoveNode::new(name, start, end)));
            }
        }
    }

    fn cancel_grab(&mut self, ctx: &mut InteractionContext<'_>) {
        let InteractionState::TransformGrab { nodes, .. } = std::mem::take(&mut self.state) else {
            return;
        };
        for (name, start) in nodes {
            if let Some(node) = ctx.scene.model.node_mut(&name) {
                node.place(start);
            }
        }
    }

    /// Abandon whatever gesture is running without recording it.
    pub fn cancel(&mut self, ctx: &mut InteractionContext<'_>) {
        match std::mem::take(&mut self.state) {
            InteractionState::TransformGrab { nodes, .. } => {
                for (name, start) in nodes {
                    if let Some(node) = ctx.scene.model.node_mut(&name) {
                        node.place(start);
                    }
                }
            }
            InteractionState::DraggingNode { name, start, .. } => {
                if let Some(node) = ctx.scene.model.node_mut(&name) {
                    node.place(start);
                }
            }
            InteractionState::Annotating(Gesture::Erasing { before, .. }) => {
                ctx.scene.annotations = before;
            }
            InteractionState::Annotating(
                Gesture::ResizingText { index, before, .. }
                | Gesture::DraggingText { index, before, .. },
            ) => {
                if let Some(note) = ctx.scene.annotations.texts.get_mut(index) {
                    *note = before;
                }
            }
            _ => {}
        }
    }

    /// Drop gesture state when the scene is replaced.
    pub fn reset(&mut self) {
        self.state = InteractionState::Idle;
        self.pending_text = None;
        self.text_editing = false;
        self.color_picker_requested = false;
    }

    fn world_eraser_radius(&self, ctx: &InteractionContext<'_>) -> f32 {
        self.eraser_radius / ctx.scene.camera.zoom()
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub fn undo(&mut self, ctx: &mut InteractionContext<'_>) {
        if let Err(e) = ctx.history.undo(ctx.scene)
            && !matches!(e, CommandError::NothingToUndo)
        {
            tracing::warn!("Undo failed: {}", e);
        }
        ctx.scene.refresh_emphasis(ctx.config);
    }

    pub fn redo(&mut self, ctx: &mut InteractionContext<'_>) {
        if let Err(e) = ctx.history.redo(ctx.scene)
            && !matches!(e, CommandError::NothingToRedo)
        {
            tracing::warn!("Redo failed: {}", e);
        }
        ctx.scene.refresh_emphasis(ctx.config);
    }

    /// Add the text the GUI collected for the pending text position.
    pub fn commit_text(
        &mut self,
        ctx: &mut InteractionContext<'_>,
        text: &str,
    ) -> Result<bool, CommandError> {
        let Some(position) = self.pending_text.take() else {
            return Ok(false);
        };
        self.text_editing = false;
        let text = text.trim();
        if text.is_empty() {
            return Ok(false);
        }
        let note = TextNote {
            position,
            text: text.to_string(),
            size: ctx.config.text_size,
            color: self.annotation_color,
        };
        ctx.history.execute(Box::new(AddText::new(note)), ctx.scene)?;
        Ok(true)
    }

    /// What a right click at `screen` refers to.
    pub fn context_target(&self, ctx: &InteractionContext<'_>, screen: Vec2) -> ContextTarget {
        let world = ctx.scene.camera.screen_to_world(screen);
        match ctx.scene.hit_tester(ctx.metrics).node_at(world) {
            Some(name) => ContextTarget::Node(name.to_string()),
            None => ContextTarget::Background(world),
        }
    }

    pub fn perform(
        &mut self,
        ctx: &mut InteractionContext<'_>,
        action: ContextAction,
        target: &ContextTarget,
    ) -> Result<(), CommandError> {
        let node = match target {
            ContextTarget::Node(name) => name.as_str(),
            ContextTarget::Background(_) => "",
        };
        let node_action = matches!(
            action,
            ContextAction::GoToFile
                | ContextAction::OpenEditor
                | ContextAction::HideConnections
                | ContextAction::ShowInfo
                | ContextAction::Delete
        );
        if node_action && !ctx.scene.model.contains(node) {
            return Err(CommandError::MissingNode(node.to_string()));
        }

        match action {
            ContextAction::GoToFile => {
                let (path, line) = node_location(ctx.scene, node);
                ctx.host.open_file(&path, line);
            }
            ContextAction::OpenEditor => {
                let (path, line) = node_location(ctx.scene, node);
                ctx.host.open_editor(node, &path, line);
            }
            ContextAction::HideConnections => {
                ctx.history
                    .execute(Box::new(HideConnections::new(node)), ctx.scene)?;
                ctx.scene.refresh_emphasis(ctx.config);
            }
            ContextAction::ShowInfo => ctx.host.show_info(node),
            ContextAction::Delete => {
                ctx.history
                    .execute(Box::new(DeleteNode::new(node)), ctx.scene)?;
                ctx.scene.refresh_emphasis(ctx.config);
            }
            ContextAction::Undo => self.undo(ctx),
            ContextAction::Redo => self.redo(ctx),
            ContextAction::SaveLayout => ctx.host.save_layout_requested(),
            ContextAction::OpenLayout => ctx.host.open_layout_requested(),
            ContextAction::Search => ctx.host.search_requested(),
            ContextAction::ToggleTraceOverlay => ctx.host.toggle_trace_overlay(),
            ContextAction::StopRun => ctx.host.stop_run(),
            ContextAction::ResetView => ctx.scene.reset_view(ctx.config, ctx.now),
        }
        Ok(())
    }
}

fn constrain(delta: Vec2, axis: Option<Axis>) -> Vec2 {
    match axis {
        Some(Axis::X) => Vec2::new(delta.x, 0.0),
        Some(Axis::Y) => Vec2::new(0.0, delta.y),
        None => delta,
    }
}

/// File and first line to open for a node: its own file for synthetic
/// nodes, the analyzed file otherwise.
pub fn node_location(scene: &Scene, name: &str) -> (PathBuf, Option<usize>) {
    let node = scene.model.node(name);
    let path = node
        .and_then(|n| n.file.as_ref())
        .map(PathBuf::from)
        .or_else(|| scene.file.clone())
        .unwrap_or_default();
    (path, node.and_then(|n| n.start_line()))
}
