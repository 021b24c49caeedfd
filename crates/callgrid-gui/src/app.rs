use crate::file_watcher::FileWatcher;
use crate::input_map::{self, to_canvas};
use crate::notifications::NotificationManager;
use crate::painter;
use crate::panels::{self, DialogOutcome, Inspector, NewNodeDialog, SearchBar};
use crate::runner::{self, Runner};
use crate::settings::AppSettings;
use callgrid_canvas::{Canvas, ContextAction, ContextTarget, PointerButton};
use callgrid_events::{BusHost, Event, EventBus, EventListener};
use callgrid_graph::Vec2;
use callgrid_trace::ListenerConfig;
use eframe::egui;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Instant;

const TRACE_LOG_LIMIT: usize = 200;

/// Startup options from the command line.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub file: Option<PathBuf>,
    pub port: Option<u16>,
    pub no_trace: bool,
    pub run: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct UndoState {
    can_undo: bool,
    can_redo: bool,
    undo_description: Option<String>,
    redo_description: Option<String>,
}

pub struct CallgridApp {
    canvas: Canvas,
    bus: EventBus,
    settings: AppSettings,
    notifications: NotificationManager,
    runner: Runner,

    inspector: Inspector,
    search: SearchBar,
    new_node: Option<NewNodeDialog>,
    text_draft: String,
    color_open: bool,
    show_preferences: bool,
    trace_overlay: bool,
    trace_log: VecDeque<String>,
    undo: UndoState,
    status: String,

    watcher: Option<FileWatcher>,
    origin: egui::Pos2,
    pointer_captured: bool,
    context_target: Option<ContextTarget>,
}

impl CallgridApp {
    pub fn new(cc: &eframe::CreationContext<'_>, options: LaunchOptions) -> Self {
        let mut settings = AppSettings::load();
        if let Some(port) = options.port {
            settings.trace.port = port;
        }
        if options.no_trace {
            settings.trace.auto_start = false;
        }

        let bus = EventBus::new();
        let canvas = Canvas::new(
            settings.canvas_config(),
            Box::new(BusHost::new(bus.clone())),
            bus.clone(),
        );

        let mut app = Self {
            canvas,
            bus,
            settings,
            notifications: NotificationManager::new(),
            runner: Runner::new(options.run),
            inspector: Inspector::Hidden,
            search: SearchBar::default(),
            new_node: None,
            text_draft: String::new(),
            color_open: false,
            show_preferences: false,
            trace_overlay: false,
            trace_log: VecDeque::new(),
            undo: UndoState::default(),
            status: "Open a Rust file to begin".to_string(),
            watcher: FileWatcher::new()
                .inspect_err(|e| tracing::warn!("File watching unavailable: {}", e))
                .ok(),
            origin: egui::Pos2::ZERO,
            pointer_captured: false,
            context_target: None,
        };

        if app.settings.trace.auto_start {
            app.start_trace(&cc.egui_ctx);
        }
        let file = options
            .file
            .or_else(|| app.settings.last_opened_file.clone().filter(|p| p.exists()));
        if let Some(path) = file {
            app.open_file(&path);
        }
        app
    }

    fn open_file(&mut self, path: &Path) {
        let now = Instant::now();
        match self.canvas.open_file(path, now) {
            Ok(_) => {
                let path = self
                    .canvas
                    .file()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| path.to_path_buf());
                if let Some(watcher) = &mut self.watcher
                    && let Err(e) = watcher.watch(&path)
                {
                    tracing::warn!("Could not watch {:?}: {}", path, e);
                }
            }
            Err(e) => {
                tracing::warn!("Could not read {:?}: {}", path, e);
                self.notifications
                    .error(format!("Could not read {}: {}", path.display(), e));
            }
        }
    }

    fn reload(&mut self) {
        if let Some(path) = self.canvas.file().map(Path::to_path_buf) {
            self.open_file(&path);
        }
    }

    /// Reload when the open file changed on disk.
    fn poll_file_change(&mut self, now: Instant) {
        let changed = self.watcher.as_mut().is_some_and(|w| w.poll(now));
        if changed {
            tracing::debug!("{:?} changed on disk, reloading", self.canvas.file());
            self.reload();
        }
    }

    fn start_trace(&mut self, ctx: &egui::Context) {
        let config = ListenerConfig {
            port: self.settings.trace.port,
            ..ListenerConfig::default()
        };
        let repaint = ctx.clone();
        if let Err(e) = self.canvas.start_trace(config, move || repaint.request_repaint()) {
            tracing::error!("Trace listener failed: {}", e);
            self.notifications.error(format!("Trace listener: {e}"));
        }
    }

    fn start_run(&mut self) {
        let cwd = self.canvas.file().and_then(Path::parent).map(Path::to_path_buf);
        match self.runner.start(cwd.as_deref()) {
            Ok(()) => self.status = "Running…".to_string(),
            Err(e) => self.notifications.error(format!("{e:#}")),
        }
    }

    fn poll_run(&mut self) {
        if let Some(success) = self.runner.poll() {
            self.canvas.run_finished(success);
            if success {
                self.notifications.success("Run finished");
            } else {
                self.notifications.warning("Run failed");
            }
        }
    }

    fn save_layout_dialog(&mut self) {
        let Some(file) = self.canvas.file() else {
            self.notifications.warning("Open a file before saving a layout");
            return;
        };
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "layout".to_string());
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Layout", &["json"])
            .set_file_name(format!("{stem}.layout.json"))
            .save_file()
        else {
            return;
        };
        if let Err(e) = self.canvas.save_layout(&path) {
            self.notifications.error(format!("Save failed: {e}"));
        }
    }

    fn open_layout_dialog(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Layout", &["json"])
            .pick_file()
        else {
            return;
        };
        match self.canvas.load_layout(&path) {
            Ok(report) if report.skipped > 0 => self.notifications.warning(format!(
                "Layout applied, {} entries skipped",
                report.skipped
            )),
            Ok(_) => {}
            Err(e) => self.notifications.error(format!("Open failed: {e}")),
        }
    }

    fn push_trace_log(&mut self, line: String) {
        self.trace_log.push_back(line);
        while self.trace_log.len() > TRACE_LOG_LIMIT {
            self.trace_log.pop_front();
        }
    }

    fn viewport_center_world(&self) -> Vec2 {
        let scene = self.canvas.scene();
        scene.camera.screen_to_world(scene.viewport * 0.5)
    }

    fn dispatch_events(&mut self) {
        let bus = self.bus.clone();
        bus.dispatch_to(self);
    }

    // ------------------------------------------------------------------
    // Panels
    // ------------------------------------------------------------------

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open…").clicked() {
                        ui.close();
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Rust", &["rs"])
                            .pick_file()
                        {
                            self.open_file(&path);
                        }
                    }
                    ui.add_enabled_ui(!self.settings.recent_files.is_empty(), |ui| {
                        ui.menu_button("Open Recent", |ui| {
                            for path in self.settings.recent_files.clone() {
                                if ui.button(path.display().to_string()).clicked() {
                                    ui.close();
                                    self.open_file(&path);
                                }
                            }
                        });
                    });
                    if ui
                        .add_enabled(self.canvas.file().is_some(), egui::Button::new("Reload"))
                        .clicked()
                    {
                        ui.close();
                        self.reload();
                    }
                    ui.separator();
                    if ui.button("Save Layout…").clicked() {
                        ui.close();
                        self.save_layout_dialog();
                    }
                    if ui.button("Open Layout…").clicked() {
                        ui.close();
                        self.open_layout_dialog();
                    }
                    ui.separator();
                    if ui.button("Preferences…").clicked() {
                        ui.close();
                        self.show_preferences = true;
                    }
                });

                ui.menu_button("Edit", |ui| {
                    let undo_label = match &self.undo.undo_description {
                        Some(d) => format!("Undo {d}"),
                        None => "Undo".to_string(),
                    };
                    if ui
                        .add_enabled(self.undo.can_undo, egui::Button::new(undo_label))
                        .clicked()
                    {
                        ui.close();
                        self.canvas.undo(Instant::now());
                    }
                    let redo_label = match &self.undo.redo_description {
                        Some(d) => format!("Redo {d}"),
                        None => "Redo".to_string(),
                    };
                    if ui
                        .add_enabled(self.undo.can_redo, egui::Button::new(redo_label))
                        .clicked()
                    {
                        ui.close();
                        self.canvas.redo(Instant::now());
                    }
                    ui.separator();
                    if ui.button("Find…").clicked() {
                        ui.close();
                        self.search.show_bar();
                    }
                    if ui.button("Add Node…").clicked() {
                        ui.close();
                        self.new_node = Some(NewNodeDialog::new(None, self.viewport_center_world()));
                    }
                });

                ui.menu_button("View", |ui| {
                    if ui.button("Zoom In").clicked() {
                        self.canvas.zoom_in(Instant::now());
                    }
                    if ui.button("Zoom Out").clicked() {
                        self.canvas.zoom_out(Instant::now());
                    }
                    if ui.button("Reset View").clicked() {
                        ui.close();
                        self.canvas.reset_view(Instant::now());
                    }
                    ui.separator();
                    ui.checkbox(&mut self.trace_overlay, "Call Trace");
                });

                ui.menu_button("Run", |ui| {
                    let listening = self.canvas.tracer().is_listening();
                    if listening {
                        if ui.button("Stop Listening").clicked() {
                            ui.close();
                            self.canvas.stop_trace();
                        }
                    } else if ui.button("Start Listening").clicked() {
                        ui.close();
                        self.start_trace(ui.ctx());
                    }
                    ui.separator();
                    let label = match self.runner.command() {
                        Some(cmd) => format!("Run `{cmd}`"),
                        None => "Run (no command)".to_string(),
                    };
                    if ui
                        .add_enabled(
                            self.runner.command().is_some() && !self.runner.is_running(),
                            egui::Button::new(label),
                        )
                        .clicked()
                    {
                        ui.close();
                        self.start_run();
                    }
                    if ui
                        .add_enabled(self.runner.is_running(), egui::Button::new("Stop Run"))
                        .clicked()
                    {
                        ui.close();
                        self.bus.publish(Event::StopRun);
                    }
                });
            });
        });
    }

    fn status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    match self.canvas.tracer().port() {
                        Some(port) => ui.label(format!("trace :{port}")),
                        None => ui.weak("trace off"),
                    };
                    let errors = self.canvas.errors().len();
                    if errors > 0 {
                        ui.colored_label(
                            egui::Color32::LIGHT_RED,
                            format!("{errors} error(s)"),
                        );
                    }
                    let model = self.canvas.model();
                    ui.label(format!(
                        "{} nodes, {} connections",
                        model.node_count(),
                        model.connections().len()
                    ));
                });
            });
        });
    }

    fn trace_panel(&mut self, ctx: &egui::Context) {
        if !self.trace_overlay {
            return;
        }
        egui::TopBottomPanel::bottom("trace_log")
            .resizable(true)
            .default_height(140.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.strong("Call trace");
                    if ui.small_button("Clear").clicked() {
                        self.trace_log.clear();
                    }
                });
                egui::ScrollArea::vertical()
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for line in &self.trace_log {
                            ui.monospace(line);
                        }
                    });
            });
    }

    fn preferences_window(&mut self, ctx: &egui::Context) {
        if !self.show_preferences {
            return;
        }
        let mut open = true;
        let mut save = false;
        egui::Window::new("Preferences")
            .open(&mut open)
            .resizable(false)
            .show(ctx, |ui| {
                let settings = &mut self.settings;
                ui.horizontal(|ui| {
                    ui.label("Trace port");
                    ui.add(egui::DragValue::new(&mut settings.trace.port).range(1..=65535));
                });
                ui.checkbox(&mut settings.trace.auto_start, "Listen for traces on startup");
                ui.checkbox(&mut settings.restore_sessions, "Restore layouts when reopening files");
                ui.checkbox(&mut settings.animations, "Animate camera");
                ui.horizontal(|ui| {
                    ui.label("Eraser radius");
                    ui.add(egui::Slider::new(&mut settings.annotations.eraser_radius, 4.0..=48.0));
                });
                ui.horizontal(|ui| {
                    ui.label("Brush width");
                    ui.add(egui::Slider::new(&mut settings.annotations.brush_width, 0.5..=12.0));
                });
                ui.weak("Port, session and animation changes apply on next start.");
                save = ui.button("Save").clicked();
            });
        if save {
            let interaction = self.canvas.interaction_mut();
            interaction.eraser_radius = self.settings.annotations.eraser_radius;
            interaction.brush_width = self.settings.annotations.brush_width;
            self.settings.save();
            self.notifications.success("Preferences saved");
        }
        self.show_preferences = open && !save;
    }

    // ------------------------------------------------------------------
    // Canvas
    // ------------------------------------------------------------------

    fn canvas_ui(&mut self, ui: &mut egui::Ui) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let rect = response.rect;
        self.origin = rect.min;
        self.canvas.set_viewport(Vec2::new(rect.width(), rect.height()));

        let ctx = ui.ctx().clone();
        let keyboard_taken = ctx.wants_keyboard_input();
        self.canvas.interaction_mut().text_editing =
            keyboard_taken || self.canvas.interaction().pending_text().is_some();

        let now = Instant::now();
        let hovered = response.hovered();
        let events = ui.input(|i| i.events.clone());
        for event in events {
            match event {
                egui::Event::PointerButton {
                    pos,
                    button,
                    pressed,
                    modifiers,
                    ..
                } => {
                    let Some(button) = input_map::button(button) else {
                        continue;
                    };
                    let screen = to_canvas(pos, self.origin);
                    if pressed && hovered {
                        self.pointer_captured = true;
                        if button == PointerButton::Secondary {
                            self.context_target = Some(self.canvas.context_target(screen, now));
                        }
                        self.canvas.pointer_pressed(
                            screen,
                            button,
                            input_map::modifiers(modifiers),
                            now,
                        );
                    } else if !pressed && self.pointer_captured {
                        self.pointer_captured = false;
                        self.canvas.pointer_released(screen, button, now);
                    }
                }
                egui::Event::PointerMoved(pos) if hovered || self.pointer_captured => {
                    self.canvas.pointer_moved(to_canvas(pos, self.origin), now);
                }
                egui::Event::MouseWheel { delta, .. } if hovered => {
                    if let Some(pos) = response.hover_pos() {
                        self.canvas.scrolled(to_canvas(pos, self.origin), delta.y, now);
                    }
                }
                egui::Event::Key {
                    key,
                    pressed: true,
                    modifiers,
                    ..
                } if !keyboard_taken => {
                    if let Some(key) = input_map::key(key) {
                        self.canvas
                            .key_pressed(key, input_map::modifiers(modifiers), now);
                    }
                }
                _ => {}
            }
        }

        if response.double_clicked()
            && let Some(pos) = response.interact_pointer_pos()
        {
            self.canvas.double_clicked(to_canvas(pos, self.origin), now);
        }

        if let Some(target) = self.context_target.clone() {
            response.context_menu(|ui| {
                if let ContextTarget::Node(name) = &target {
                    ui.label(egui::RichText::new(name).strong());
                    ui.separator();
                }
                for action in ContextAction::for_target(&target) {
                    if ui.button(action.label()).clicked() {
                        if let Err(e) = self.canvas.perform(*action, &target, Instant::now()) {
                            self.notifications.warning(e.to_string());
                        }
                        ui.close();
                    }
                }
            });
        }

        painter::paint(ui, &painter, self.origin, &self.canvas.render());
    }

    fn dialogs(&mut self, ctx: &egui::Context) {
        if let Some(dialog) = &mut self.new_node {
            match panels::new_node_dialog(ctx, dialog) {
                DialogOutcome::Pending => {}
                DialogOutcome::Cancelled => self.new_node = None,
                DialogOutcome::Create(new_node) => {
                    let at = dialog.at;
                    let result = match dialog.source.clone() {
                        Some(source) => self.canvas.add_connection_node(&source, new_node, at),
                        None => self.canvas.add_node(new_node, at, None),
                    };
                    match result {
                        Ok(name) => self.canvas.select(Some(&name)),
                        Err(e) => self.notifications.error(format!("Could not add node: {e}")),
                    }
                    self.new_node = None;
                }
            }
        }

        if let Some(world) = self.canvas.interaction().pending_text() {
            let screen = self.canvas.scene().camera.world_to_screen(world);
            let anchor = input_map::to_screen(screen, self.origin);
            if let Some(text) =
                panels::text_popup(ctx, &mut self.canvas, &mut self.text_draft, anchor)
                && let Err(e) = self.canvas.commit_text(&text, Instant::now())
            {
                self.notifications.error(e.to_string());
            }
        }

        panels::tool_palette(ctx, &mut self.canvas, &mut self.color_open);
    }
}

impl EventListener for CallgridApp {
    fn handle_event(&mut self, event: &Event) {
        match event {
            Event::FileLoaded {
                path,
                declarations,
                edges,
            } => {
                self.status = format!(
                    "{}: {} declarations, {} calls",
                    path.display(),
                    declarations,
                    edges
                );
                self.settings.add_recent(path.clone());
                self.settings.save();
            }
            Event::AnalysisFailed { path, error } => {
                self.notifications
                    .error(format!("{}: {}", path.display(), error));
            }
            Event::LayoutSaved { path } => {
                self.notifications
                    .success(format!("Layout saved to {}", path.display()));
            }
            Event::LayoutLoaded { path } => {
                self.notifications
                    .success(format!("Layout loaded from {}", path.display()));
            }
            Event::NodeSelected { name } => {
                if let Some(name) = name {
                    self.status = format!("Selected {name}");
                    if matches!(self.inspector, Inspector::Info(_)) {
                        self.inspector = Inspector::Info(name.clone());
                    }
                }
            }
            Event::NodeDoubleClicked { .. } => {}
            Event::ShowCode { name } => self.inspector = Inspector::Code(name.clone()),
            Event::ShowNodeInfo { name } => self.inspector = Inspector::Info(name.clone()),
            Event::AddRequested { source } => {
                self.new_node = Some(NewNodeDialog::new(
                    source.clone(),
                    self.viewport_center_world(),
                ));
            }
            Event::ConnectionDragCompleted { source, x, y } => {
                self.new_node = Some(NewNodeDialog::new(
                    Some(source.clone()),
                    Vec2::new(*x, *y),
                ));
            }
            Event::OpenFile { path, line } => {
                let result = match line {
                    Some(_) => runner::open_in_editor(path, *line),
                    None => runner::open_with_system(path),
                };
                if let Err(e) = result {
                    self.notifications.error(format!("{e:#}"));
                }
            }
            Event::OpenEditor { node, path, line } => {
                tracing::info!("Opening {} in editor", node);
                if let Err(e) = runner::open_in_editor(path, *line) {
                    self.notifications.error(format!("{e:#}"));
                }
            }
            Event::StopRun => {
                if self.runner.stop() {
                    self.canvas.run_finished(false);
                    self.notifications.info("Run stopped");
                } else {
                    self.notifications.info("Nothing is running");
                }
            }
            Event::ToggleTraceOverlay => self.trace_overlay = !self.trace_overlay,
            Event::SaveLayoutRequested => self.save_layout_dialog(),
            Event::OpenLayoutRequested => self.open_layout_dialog(),
            Event::SearchRequested => self.search.show_bar(),
            Event::UndoStackChanged {
                can_undo,
                can_redo,
                undo_description,
                redo_description,
            } => {
                self.undo = UndoState {
                    can_undo: *can_undo,
                    can_redo: *can_redo,
                    undo_description: undo_description.clone(),
                    redo_description: redo_description.clone(),
                };
            }
            Event::TraceListening { port } => {
                self.status = format!("Listening for trace events on port {port}");
            }
            Event::TraceStopped => self.status = "Trace listener stopped".to_string(),
            Event::TraceCall { node } => self.push_trace_log(format!("→ {node}")),
            Event::CompilerError {
                file,
                line,
                message,
            } => {
                let text = format!("{}:{}: {}", file.display(), line, message);
                self.push_trace_log(format!("✕ {text}"));
                self.notifications.error(text);
            }
            Event::ShowInfo { message } => self.notifications.info(message),
            Event::ShowSuccess { message } => self.notifications.success(message),
            Event::ShowWarning { message } => self.notifications.warning(message),
            Event::ShowError { message } => self.notifications.error(message),
            Event::StatusUpdate { message } => self.status = message.clone(),
        }
    }
}

impl eframe::App for CallgridApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.poll_run();
        self.poll_file_change(now);
        let interval = self.canvas.tick(now);
        self.dispatch_events();

        self.menu_bar(ctx);
        self.status_bar(ctx);
        self.trace_panel(ctx);

        if let Some(query) = self.search.show(ctx) {
            self.search.not_found = self.canvas.search(&query, now).is_none();
        }
        panels::inspector_panel(ctx, &mut self.inspector, &self.canvas);

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.canvas_ui(ui));

        self.dialogs(ctx);
        self.preferences_window(ctx);
        self.dispatch_events();
        self.notifications.render(ctx);

        ctx.request_repaint_after(interval);
    }
}

impl Drop for CallgridApp {
    fn drop(&mut self) {
        self.canvas.stop_trace();
        self.settings.save();
    }
}
