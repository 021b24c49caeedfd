use crate::commands::{AddNode, CommandError, CommandHistory};
use crate::config::CanvasConfig;
use crate::document::{ApplyReport, DocumentError, LayoutDocument};
use crate::errors::ErrorRegistry;
use crate::input::{Key, Modifiers, PointerButton};
use crate::interaction::{ContextAction, ContextTarget, InteractionContext, InteractionController};
use crate::pacer::FramePacer;
use crate::render::RenderList;
use crate::scene::Scene;
use crate::session::{SessionCache, absolute_path};
use crate::tracer::LiveTracer;
use callgrid_core::{Analysis, Declaration, DeclarationKind};
use callgrid_events::{Event, EventBus, HostCallbacks, NewNode};
use callgrid_graph::{
    ConnectionKind, CustomContent, EdgeRouter, FixedMetrics, GraphModel, GridLayouter, Layouter,
    Node, NodeKind, TextMetrics, Vec2,
};
use callgrid_index::Analyzer;
use callgrid_trace::{ListenerConfig, TraceError, TraceEvent};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// The headless canvas.
///
/// Owns one [`Scene`] and the parts that act on it: the interaction state
/// machine, undo history, live tracer, compiler error registry, session
/// cache and frame pacer. A GUI feeds it input and draws [`RenderList`]s;
/// requests it cannot serve itself go to the injected [`HostCallbacks`].
pub struct Canvas {
    config: CanvasConfig,
    scene: Scene,
    history: CommandHistory,
    interaction: InteractionController,
    tracer: LiveTracer,
    errors: ErrorRegistry,
    pacer: FramePacer,
    sessions: SessionCache,
    host: Box<dyn HostCallbacks>,
    analyzer: Analyzer,
    layouter: GridLayouter,
    router: EdgeRouter,
    metrics: Box<dyn TextMetrics>,
    bus: EventBus,
    last_tick: Option<Instant>,
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("file", &self.scene.file)
            .field("nodes", &self.scene.model.node_count())
            .field("history", &self.history)
            .field("tracer", &self.tracer)
            .finish()
    }
}

impl Canvas {
    pub fn new(config: CanvasConfig, host: Box<dyn HostCallbacks>, bus: EventBus) -> Self {
        Self {
            scene: Scene::new(&config),
            history: CommandHistory::new(config.undo_limit, bus.clone()),
            interaction: InteractionController::new(&config),
            tracer: LiveTracer::new(),
            errors: ErrorRegistry::new(),
            pacer: FramePacer::new(config.frame_fast, config.frame_slow, config.idle_ticks),
            sessions: SessionCache::new(),
            host,
            analyzer: Analyzer::new(),
            layouter: GridLayouter::new(),
            router: EdgeRouter::new(),
            metrics: Box::new(FixedMetrics::default()),
            bus,
            last_tick: None,
            config,
        }
    }

    /// Use real font measurements for box sizes and hit testing.
    pub fn set_metrics(&mut self, metrics: Box<dyn TextMetrics>) {
        self.metrics = metrics;
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn model(&self) -> &GraphModel {
        &self.scene.model
    }

    pub fn analysis(&self) -> &Analysis {
        &self.scene.analysis
    }

    pub fn file(&self) -> Option<&Path> {
        self.scene.file.as_deref()
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn interaction(&self) -> &InteractionController {
        &self.interaction
    }

    pub fn interaction_mut(&mut self) -> &mut InteractionController {
        &mut self.interaction
    }

    pub fn tracer(&self) -> &LiveTracer {
        &self.tracer
    }

    pub fn errors(&self) -> &ErrorRegistry {
        &self.errors
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionCache {
        &mut self.sessions
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn router(&self) -> &EdgeRouter {
        &self.router
    }

    pub fn metrics(&self) -> &dyn TextMetrics {
        self.metrics.as_ref()
    }

    pub fn runtime_focus_mode(&self) -> bool {
        self.scene.runtime_focus_mode()
    }

    pub fn set_viewport(&mut self, size: Vec2) {
        if size != self.scene.viewport {
            self.scene.viewport = size;
            self.pacer.wake();
        }
    }

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// Read and show a file from disk.
    pub fn open_file(&mut self, path: &Path, now: Instant) -> std::io::Result<&Analysis> {
        let source = std::fs::read_to_string(path)?;
        Ok(self.load_source(path, &source, now))
    }

    /// Analyze `source` as the contents of `path` and show the result.
    ///
    /// Loading the file already on screen keeps positions, selection,
    /// extra nodes and pending errors. Loading another file stores the
    /// current layout in the session cache and starts fresh.
    pub fn load_source(&mut self, path: &Path, source: &str, now: Instant) -> &Analysis {
        let path = absolute_path(path);
        let analysis = self.analyzer.analyze(source, &path.to_string_lossy());
        if let Some(error) = &analysis.error {
            self.bus.publish(Event::AnalysisFailed {
                path: path.clone(),
                error: error.clone(),
            });
        }
        let counts = (analysis.declaration_count, analysis.edge_count);

        if self.scene.file.as_deref() == Some(path.as_path()) {
            self.reload(analysis);
        } else {
            self.switch_to(path.clone(), analysis, now);
        }

        tracing::info!(
            "Loaded {} ({} declarations, {} edges)",
            path.display(),
            counts.0,
            counts.1
        );
        self.bus.publish(Event::FileLoaded {
            path,
            declarations: counts.0,
            edges: counts.1,
        });
        self.pacer.wake();
        &self.scene.analysis
    }

    fn laid_out(&self, analysis: &Analysis) -> GraphModel {
        let mut model = GraphModel::from_analysis(analysis);
        let layout = self.layouter.execute(&model);
        model.apply_layout(&layout, &self.layouter);
        model
    }

    fn reload(&mut self, analysis: Analysis) {
        let mut model = self.laid_out(&analysis);
        let old = std::mem::take(&mut self.scene.model);

        for node in model.nodes_mut() {
            if let Some(previous) = old.node(&node.name) {
                node.place(previous.original);
                node.grid = previous.grid;
                node.color_override = previous.color_override;
                node.scale = previous.scale;
                node.display_opacity = previous.display_opacity;
                node.active = previous.active;
                node.active_until = previous.active_until;
            }
        }
        for previous in old.nodes() {
            if previous.kind != NodeKind::Declaration
                && !model.contains(&previous.name)
                && let Err(e) = model.add_node(previous.clone())
            {
                tracing::warn!("Dropping {} on reload: {}", previous.name, e);
            }
        }
        for conn in old.connections() {
            let keep = conn.kind == ConnectionKind::Ui
                || [&conn.from, &conn.to]
                    .iter()
                    .any(|n| old.node(n).is_some_and(|n| n.kind != NodeKind::Declaration));
            if keep
                && model.contains(&conn.from)
                && model.contains(&conn.to)
                && let Err(e) = model.connect(&conn.from, &conn.to, conn.kind)
            {
                tracing::warn!("Dropping {} -> {} on reload: {}", conn.from, conn.to, e);
            }
            if let Some(i) = model.connection_index(&conn.from, &conn.to) {
                model.connections_mut()[i].hidden = conn.hidden;
            }
        }

        self.scene.model = model;
        self.scene.analysis = analysis;
        self.refresh();
    }

    fn switch_to(&mut self, path: PathBuf, analysis: Analysis, now: Instant) {
        if self.scene.file.is_some() && !self.scene.model.is_empty() {
            self.sessions.store(LayoutDocument::capture(&self.scene));
        }
        self.history.clear();
        self.tracer.reset();
        self.interaction.reset();

        let viewport = self.scene.viewport;
        self.scene = Scene::new(&self.config);
        self.scene.viewport = viewport;
        self.scene.model = self.laid_out(&analysis);
        self.scene.analysis = analysis;
        self.scene.file = Some(path.clone());

        let restored = match self.sessions.get(&path).cloned() {
            Some(document) if self.config.restore_sessions => match document.apply(&mut self.scene)
            {
                Ok(report) => {
                    tracing::debug!("Restored session for {}: {:?}", path.display(), report);
                    true
                }
                Err(e) => {
                    tracing::warn!("Could not restore session for {}: {}", path.display(), e);
                    false
                }
            },
            _ => false,
        };
        if !restored {
            self.scene.reset_view(&self.config, now);
        }
        self.refresh();
    }

    /// Re-derive everything computed from the model after a structural change.
    fn refresh(&mut self) {
        self.tracer.sync(&self.scene);
        self.errors.apply(&mut self.scene, self.tracer.module_nodes());
        self.scene.refresh_emphasis(&self.config);
        self.pacer.wake();
    }

    // ------------------------------------------------------------------
    // Layout documents
    // ------------------------------------------------------------------

    pub fn layout_document(&self) -> LayoutDocument {
        LayoutDocument::capture(&self.scene)
    }

    pub fn apply_layout_document(
        &mut self,
        document: &LayoutDocument,
    ) -> Result<ApplyReport, DocumentError> {
        let report = document.apply(&mut self.scene)?;
        self.refresh();
        Ok(report)
    }

    pub fn save_layout(&self, path: &Path) -> Result<(), DocumentError> {
        self.layout_document().save(path)?;
        tracing::info!("Saved layout to {}", path.display());
        self.bus.publish(Event::LayoutSaved {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    pub fn load_layout(&mut self, path: &Path) -> Result<ApplyReport, DocumentError> {
        let document = LayoutDocument::load(path)?;
        let report = self.apply_layout_document(&document)?;
        self.bus.publish(Event::LayoutLoaded {
            path: path.to_path_buf(),
        });
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    fn split(&mut self, now: Instant) -> (&mut InteractionController, InteractionContext<'_>) {
        (
            &mut self.interaction,
            InteractionContext {
                scene: &mut self.scene,
                history: &mut self.history,
                host: self.host.as_mut(),
                config: &self.config,
                metrics: self.metrics.as_ref(),
                now,
            },
        )
    }

    pub fn pointer_pressed(
        &mut self,
        screen: Vec2,
        button: PointerButton,
        modifiers: Modifiers,
        now: Instant,
    ) {
        let (interaction, mut ctx) = self.split(now);
        interaction.pointer_pressed(&mut ctx, screen, button, modifiers);
        self.refresh();
    }

    pub fn pointer_moved(&mut self, screen: Vec2, now: Instant) {
        let (interaction, mut ctx) = self.split(now);
        interaction.pointer_moved(&mut ctx, screen);
        if !self.interaction.is_idle() {
            self.pacer.wake();
        }
    }

    pub fn pointer_released(&mut self, screen: Vec2, button: PointerButton, now: Instant) {
        let (interaction, mut ctx) = self.split(now);
        interaction.pointer_released(&mut ctx, screen, button);
        self.refresh();
    }

    pub fn double_clicked(&mut self, screen: Vec2, now: Instant) {
        let (interaction, mut ctx) = self.split(now);
        interaction.double_clicked(&mut ctx, screen);
        self.pacer.wake();
    }

    pub fn scrolled(&mut self, screen: Vec2, delta_y: f32, now: Instant) {
        let (interaction, mut ctx) = self.split(now);
        interaction.scrolled(&mut ctx, screen, delta_y);
        self.pacer.wake();
    }

    pub fn key_pressed(&mut self, key: Key, modifiers: Modifiers, now: Instant) -> bool {
        let (interaction, mut ctx) = self.split(now);
        let handled = interaction.key_pressed(&mut ctx, key, modifiers);
        if handled {
            self.refresh();
        }
        handled
    }

    pub fn commit_text(&mut self, text: &str, now: Instant) -> Result<bool, CommandError> {
        let (interaction, mut ctx) = self.split(now);
        let added = interaction.commit_text(&mut ctx, text)?;
        self.pacer.wake();
        Ok(added)
    }

    pub fn context_target(&mut self, screen: Vec2, now: Instant) -> ContextTarget {
        let (interaction, ctx) = self.split(now);
        interaction.context_target(&ctx, screen)
    }

    pub fn perform(
        &mut self,
        action: ContextAction,
        target: &ContextTarget,
        now: Instant,
    ) -> Result<(), CommandError> {
        let (interaction, mut ctx) = self.split(now);
        let result = interaction.perform(&mut ctx, action, target);
        self.refresh();
        result
    }

    pub fn undo(&mut self, now: Instant) {
        let (interaction, mut ctx) = self.split(now);
        interaction.undo(&mut ctx);
        self.refresh();
    }

    pub fn redo(&mut self, now: Instant) {
        let (interaction, mut ctx) = self.split(now);
        interaction.redo(&mut ctx);
        self.refresh();
    }

    // ------------------------------------------------------------------
    // Navigation and selection
    // ------------------------------------------------------------------

    pub fn select(&mut self, name: Option<&str>) {
        self.scene.select(name, &self.config);
        let selected = self.scene.selection.selected.clone();
        self.host.node_selected(selected.as_deref());
        self.pacer.wake();
    }

    pub fn search(&mut self, query: &str, now: Instant) -> Option<String> {
        let found = self.scene.search(query, &self.config, now)?;
        self.host.node_selected(Some(&found));
        self.pacer.wake();
        Some(found)
    }

    pub fn reset_view(&mut self, now: Instant) {
        self.scene.reset_view(&self.config, now);
        self.pacer.wake();
    }

    pub fn focus_on_node(&mut self, name: &str, now: Instant) -> bool {
        self.pacer.wake();
        self.scene.focus_on_node(name, &self.config, now)
    }

    pub fn zoom_in(&mut self, now: Instant) {
        self.scene.zoom_by(self.config.zoom_in_step, now);
        self.pacer.wake();
    }

    pub fn zoom_out(&mut self, now: Instant) {
        self.scene.zoom_by(self.config.zoom_out_step, now);
        self.pacer.wake();
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Create the node picked after a connection drag and wire `source` to it.
    pub fn add_connection_node(
        &mut self,
        source: &str,
        new_node: NewNode,
        world: Vec2,
    ) -> Result<String, CommandError> {
        if !self.scene.model.contains(source) {
            return Err(CommandError::MissingNode(source.to_string()));
        }
        self.add_node(new_node, world, Some(source.to_string()))
    }

    /// Create a node at `world`, optionally linked from `link_from`. Undoable.
    pub fn add_node(
        &mut self,
        new_node: NewNode,
        world: Vec2,
        link_from: Option<String>,
    ) -> Result<String, CommandError> {
        let mut node = self.build_node(new_node);
        node.place(world);
        let name = node.name.clone();
        self.history
            .execute(Box::new(AddNode::new(node, link_from)), &mut self.scene)?;
        self.refresh();
        Ok(name)
    }

    fn build_node(&self, new_node: NewNode) -> Node {
        let model = &self.scene.model;
        match new_node {
            NewNode::Declaration { name } => {
                let name = model.unique_name(name.trim());
                let file = self
                    .scene
                    .file
                    .as_deref()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Node::dynamic(stub_declaration(&name), file)
            }
            NewNode::Text { text } => Node::custom_text(model.unique_name("text"), text),
            NewNode::Image { path } => {
                Node::custom(model.unique_name("image"), CustomContent::Image(path))
            }
            NewNode::Video { path } => {
                Node::custom(model.unique_name("video"), CustomContent::Video(path))
            }
        }
    }

    // ------------------------------------------------------------------
    // Compiler errors
    // ------------------------------------------------------------------

    pub fn mark_error(&mut self, file: &Path, func: Option<&str>, line: usize, message: &str) {
        self.errors.mark(file, func, line, message);
        self.errors.apply(&mut self.scene, self.tracer.module_nodes());
        self.bus.publish(Event::CompilerError {
            file: file.to_path_buf(),
            line,
            message: message.to_string(),
        });
        self.pacer.wake();
    }

    pub fn clear_error_for_file(&mut self, file: &Path) -> bool {
        let cleared = self.errors.clear_file(file);
        if cleared {
            self.errors.apply(&mut self.scene, self.tracer.module_nodes());
            self.pacer.wake();
        }
        cleared
    }

    /// An external run ended. Success clears every pending error.
    pub fn run_finished(&mut self, success: bool) {
        if success && !self.errors.is_empty() {
            self.errors.clear_all();
            self.errors.apply(&mut self.scene, self.tracer.module_nodes());
            self.pacer.wake();
        }
    }

    // ------------------------------------------------------------------
    // Live trace
    // ------------------------------------------------------------------

    /// Start listening for trace lines. `waker` runs on the listener thread
    /// after each event, typically to request a repaint.
    pub fn start_trace(
        &mut self,
        config: ListenerConfig,
        waker: impl Fn() + Send + Sync + 'static,
    ) -> Result<u16, TraceError> {
        let port = self.tracer.start(config, waker)?;
        self.bus.publish(Event::TraceListening { port });
        Ok(port)
    }

    pub fn stop_trace(&mut self) {
        if self.tracer.stop() {
            self.bus.publish(Event::TraceStopped);
        }
    }

    /// Apply one trace event. Called from [`Canvas::tick`] for events from
    /// the listener; callers with their own event source may call it directly.
    pub fn handle_trace_event(&mut self, event: TraceEvent, now: Instant) {
        match event {
            TraceEvent::Call { func, module, file } => {
                self.clear_error_for_file(Path::new(&file));
                let resolved = self.tracer.handle_call(
                    &mut self.scene,
                    &self.config,
                    &self.layouter,
                    &func,
                    &module,
                    &file,
                    now,
                );
                if let Some(resolved) = resolved {
                    if resolved.created {
                        self.refresh();
                    }
                    if resolved.activated {
                        self.bus.publish(Event::TraceCall {
                            node: resolved.node,
                        });
                    }
                }
                self.scene.refresh_emphasis(&self.config);
            }
            TraceEvent::Error {
                file,
                func,
                line,
                message,
            } => {
                let func = (!func.is_empty()).then_some(func.as_str());
                self.mark_error(Path::new(&file), func, line, &message);
            }
            TraceEvent::Target { file } => {
                self.clear_error_for_file(Path::new(&file));
            }
        }
        self.pacer.wake();
    }

    // ------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------

    /// Advance animations and runtime state to `now`. Returns the interval
    /// until the next tick.
    pub fn tick(&mut self, now: Instant) -> Duration {
        let dt = self
            .last_tick
            .map_or(0.0, |t| now.saturating_duration_since(t).as_secs_f32())
            .min(self.config.max_dt);
        self.last_tick = Some(now);

        let mut changed = false;
        for event in self.tracer.drain() {
            self.handle_trace_event(event, now);
            changed = true;
        }
        if self.tracer.tick(&mut self.scene, &self.config, now) {
            self.scene.refresh_emphasis(&self.config);
            changed = true;
        }

        for node in self.scene.model.nodes_mut() {
            node.restore_position();
            changed |= node.animate(dt);
        }
        for conn in self.scene.model.connections_mut() {
            changed |= conn.animate(dt);
        }
        changed |= self.scene.camera.tick(now);
        changed |= self.tracer.has_active(&self.scene);

        self.pacer.tick(changed)
    }

    pub fn frame_interval(&self) -> Duration {
        self.pacer.interval()
    }

    pub fn render(&self) -> RenderList {
        RenderList::build(
            &self.scene,
            &self.interaction,
            &self.config,
            self.metrics.as_ref(),
            &self.router,
        )
    }
}

fn stub_declaration(name: &str) -> Declaration {
    Declaration {
        name: name.to_string(),
        qualified_name: name.to_string(),
        kind: DeclarationKind::Function,
        start_line: 0,
        end_line: 0,
        params: Vec::new(),
        doc: String::new(),
        return_type: None,
        complexity: 1,
        source: format!("fn {name}() {{\n}}\n"),
    }
}
