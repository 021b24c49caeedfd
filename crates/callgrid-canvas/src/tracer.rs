//! Runtime call highlighting.
//!
//! Trace events arrive from a [`TraceListener`] worker and are only applied
//! here, on the UI thread, during the canvas tick. Each call marks one node
//! active until a deadline; expiry is checked once per tick.

use crate::config::CanvasConfig;
use crate::scene::Scene;
use crate::session::absolute_path;
use callgrid_graph::{ConnectionKind, GridLayouter, GridPos, Node, NodeKind, Vec2};
use callgrid_trace::{ListenerConfig, TraceError, TraceEvent, TraceListener};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Outcome of resolving one call event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub node: String,
    /// The node was idle before this call.
    pub activated: bool,
    /// A node was added to the graph to represent the call.
    pub created: bool,
}

#[derive(Debug, Default)]
pub struct LiveTracer {
    listener: Option<TraceListener>,
    last_activity: Option<Instant>,
    module_nodes: BTreeMap<PathBuf, String>,
    entry_node: Option<String>,
}

/// Paths like `<frozen importlib>` or `[eval]` come from the runtime itself.
pub fn is_synthetic_path(path: &str) -> bool {
    let path = path.trim();
    path.is_empty()
        || path.starts_with('<')
        || path.starts_with('[')
        || path.contains("/<")
        || Path::new(path).extension().is_none()
}

/// `Type::method` and `module.func` resolve by their last segment.
fn short_name(func: &str) -> &str {
    func.rsplit([':', '.'])
        .find(|s| !s.is_empty())
        .unwrap_or(func)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl LiveTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(
        &mut self,
        config: ListenerConfig,
        waker: impl Fn() + Send + Sync + 'static,
    ) -> Result<u16, TraceError> {
        self.stop();
        let listener = TraceListener::start_with_waker(config, waker)?;
        let port = listener.port();
        self.listener = Some(listener);
        Ok(port)
    }

    pub fn stop(&mut self) -> bool {
        match self.listener.take() {
            Some(mut listener) => {
                listener.stop();
                true
            }
            None => false,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listener.as_ref().is_some_and(TraceListener::is_running)
    }

    pub fn port(&self) -> Option<u16> {
        self.listener.as_ref().map(TraceListener::port)
    }

    pub fn drain(&self) -> Vec<TraceEvent> {
        self.listener
            .as_ref()
            .map(TraceListener::drain)
            .unwrap_or_default()
    }

    pub fn module_nodes(&self) -> &BTreeMap<PathBuf, String> {
        &self.module_nodes
    }

    pub fn entry_node(&self) -> Option<&str> {
        self.entry_node.as_deref()
    }

    /// Forget per-file state when the canvas switches files. The listener keeps running.
    pub fn reset(&mut self) {
        self.last_activity = None;
        self.module_nodes.clear();
        self.entry_node = None;
    }

    /// Drop module bookkeeping for nodes that no longer exist.
    pub fn sync(&mut self, scene: &Scene) {
        self.module_nodes.retain(|_, name| scene.model.contains(name));
        if self
            .entry_node
            .as_deref()
            .is_some_and(|n| !scene.model.contains(n))
        {
            self.entry_node = None;
        }
    }

    /// Resolve a call to a node and mark it active.
    ///
    /// Returns `None` when the event is ignored: a synthetic path, or a
    /// function that neither exists nor can be found on disk.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_call(
        &mut self,
        scene: &mut Scene,
        config: &CanvasConfig,
        layouter: &GridLayouter,
        func: &str,
        module: &str,
        file: &str,
        now: Instant,
    ) -> Option<Resolved> {
        if is_synthetic_path(file) {
            tracing::debug!("Ignoring call from synthetic path {}", file);
            return None;
        }
        scene.runtime_focus.get_or_insert_with(HashSet::new);
        self.last_activity = Some(now);

        let (name, created) = match lookup(scene, func, module) {
            Some(name) => (name, false),
            None => {
                let path = absolute_path(Path::new(file));
                let is_current = scene
                    .file
                    .as_deref()
                    .is_some_and(|f| absolute_path(f) == path);
                let name = if is_current {
                    self.dynamic_node(scene, layouter, func, &path)
                } else {
                    Some(self.module_node(scene, config, layouter, &path))
                };
                let Some(name) = name else {
                    tracing::debug!("No node for call {} in {}", func, file);
                    return None;
                };
                (name, true)
            }
        };

        let node = scene.model.node_mut(&name)?;
        let activated = !node.active;
        node.active = true;
        node.active_until = Some(now + config.active_duration);
        if let Some(seen) = scene.runtime_focus.as_mut() {
            seen.insert(name.clone());
        }
        Some(Resolved {
            node: name,
            activated,
            created,
        })
    }

    /// Expire active nodes and leave focus mode after the idle timeout.
    /// Returns true when anything changed.
    pub fn tick(&mut self, scene: &mut Scene, config: &CanvasConfig, now: Instant) -> bool {
        let mut changed = false;
        let mut any_active = false;
        for node in scene.model.nodes_mut() {
            if !node.active {
                continue;
            }
            if node.active_until.is_none_or(|until| now > until) {
                node.active = false;
                node.active_until = None;
                changed = true;
            } else {
                any_active = true;
            }
        }

        if scene.runtime_focus.is_some() && !any_active {
            let idle = self
                .last_activity
                .is_none_or(|t| now.saturating_duration_since(t) >= config.focus_idle_timeout);
            if idle {
                scene.runtime_focus = None;
                self.last_activity = None;
                changed = true;
            }
        }
        changed
    }

    pub fn has_active(&self, scene: &Scene) -> bool {
        scene.model.nodes().iter().any(|n| n.active)
    }

    /// `main` when the file declares it; otherwise a node for the file itself,
    /// left of the grid origin.
    fn ensure_entry(&mut self, scene: &mut Scene, layouter: &GridLayouter) -> Option<String> {
        if let Some(name) = &self.entry_node
            && scene.model.contains(name)
        {
            return Some(name.clone());
        }
        if scene
            .model
            .node("main")
            .is_some_and(|n| n.kind == NodeKind::Declaration)
        {
            self.entry_node = Some("main".to_string());
            return self.entry_node.clone();
        }

        let file = scene.file.clone().unwrap_or_default();
        let name = scene.model.unique_name(&file_label(&file));
        let mut node = Node::entry_file(&name, file.to_string_lossy());
        let cell = free_cell_left(scene, layouter);
        node.grid = Some(cell);
        node.place(layouter.to_pixel(cell));
        if let Err(e) = scene.model.add_node(node) {
            tracing::debug!("Could not add entry node: {}", e);
            return None;
        }
        self.entry_node = Some(name.clone());
        Some(name)
    }

    fn dynamic_node(
        &mut self,
        scene: &mut Scene,
        layouter: &GridLayouter,
        func: &str,
        path: &Path,
    ) -> Option<String> {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                tracing::debug!("Cannot read {} for {}: {}", path.display(), func, e);
                return None;
            }
        };
        let decl = callgrid_index::find_declaration(&source, func)
            .or_else(|| callgrid_index::find_declaration(&source, short_name(func)))?;
        if scene.model.contains(&decl.name) {
            return Some(decl.name);
        }

        let cell = free_cell_right(scene, layouter);
        let mut node = Node::dynamic(decl, path.to_string_lossy());
        node.grid = Some(cell);
        node.place(layouter.to_pixel(cell));
        let name = node.name.clone();
        scene.model.add_node(node).ok()?;
        if let Some(entry) = self.ensure_entry(scene, layouter)
            && let Err(e) = scene.model.connect(&entry, &name, ConnectionKind::Call)
        {
            tracing::debug!("Could not connect {} to {}: {}", entry, name, e);
        }
        tracing::info!("Added runtime node {}", name);
        Some(name)
    }

    fn module_node(
        &mut self,
        scene: &mut Scene,
        config: &CanvasConfig,
        layouter: &GridLayouter,
        path: &Path,
    ) -> String {
        if let Some(name) = self.module_nodes.get(path)
            && scene.model.contains(name)
        {
            return name.clone();
        }

        let name = scene.model.unique_name(&file_label(path));
        // the name is fresh, so adding cannot collide
        if scene
            .model
            .add_node(Node::module(&name, path.to_string_lossy()))
            .is_ok()
        {
            self.module_nodes.insert(path.to_path_buf(), name.clone());
            if let Some(entry) = self.ensure_entry(scene, layouter)
                && let Err(e) = scene.model.connect(&entry, &name, ConnectionKind::Call)
            {
                tracing::debug!("Could not connect {} to {}: {}", entry, name, e);
            }
            self.arrange_modules(scene, config);
            tracing::info!("Added module node {} for {}", name, path.display());
        }
        name
    }

    /// Place module nodes evenly on a ring around the entry node, ordered by
    /// name. The ring widens once there are more modules than free slots.
    pub fn arrange_modules(&self, scene: &mut Scene, config: &CanvasConfig) {
        let center = self
            .entry_node
            .as_deref()
            .and_then(|n| scene.model.node(n))
            .map_or(Vec2::ZERO, |n| n.original);

        let mut names: Vec<String> = self
            .module_nodes
            .values()
            .filter(|n| scene.model.contains(n))
            .cloned()
            .collect();
        names.sort_by_key(|n| n.to_lowercase());

        let count = names.len();
        if count == 0 {
            return;
        }
        let radius = ring_radius(config, scene.viewport, count);
        for (i, name) in names.iter().enumerate() {
            let angle = std::f32::consts::TAU * i as f32 / count as f32;
            if let Some(node) = scene.model.node_mut(name) {
                node.place(center + Vec2::new(angle.cos(), angle.sin()) * radius);
            }
        }
    }
}

pub fn ring_radius(config: &CanvasConfig, viewport: Vec2, count: usize) -> f32 {
    let base = config
        .module_ring_min_radius
        .max(config.module_ring_viewport_factor * viewport.x.min(viewport.y));
    base + config.module_ring_step * count.saturating_sub(config.module_ring_free_slots) as f32
}

/// Exact name, then case-insensitive, then qualified name, then `module::name`.
fn lookup(scene: &Scene, func: &str, module: &str) -> Option<String> {
    let model = &scene.model;
    if model.contains(func) {
        return Some(func.to_string());
    }
    let short = short_name(func);
    if model.contains(short) {
        return Some(short.to_string());
    }
    let lower = short.to_lowercase();
    let qualified_module = format!("{module}::{short}");
    model
        .nodes()
        .iter()
        .find(|n| n.name.to_lowercase() == lower)
        .or_else(|| {
            model.nodes().iter().find(|n| {
                n.declaration
                    .as_ref()
                    .is_some_and(|d| d.qualified_name == func)
            })
        })
        .or_else(|| {
            model.nodes().iter().find(|n| {
                !module.is_empty()
                    && n.declaration
                        .as_ref()
                        .is_some_and(|d| d.qualified_name == qualified_module)
            })
        })
        .map(|n| n.name.clone())
}

/// Cells under the nodes' current positions, so dragged nodes count where
/// they are now rather than where the layout put them.
fn occupied_cells(scene: &Scene, layouter: &GridLayouter) -> HashSet<GridPos> {
    scene
        .model
        .nodes()
        .iter()
        .map(|n| layouter.to_grid(n.original))
        .collect()
}

/// First free cell on row 0 right of every placed node.
fn free_cell_right(scene: &Scene, layouter: &GridLayouter) -> GridPos {
    let taken = occupied_cells(scene, layouter);
    let start = taken.iter().map(|g| g.col + 1).max().unwrap_or(0);
    (start..)
        .map(|col| GridPos::new(col, 0))
        .find(|cell| !taken.contains(cell))
        .unwrap_or(GridPos::new(start, 0))
}

/// First free cell on row 0 left of the grid origin.
fn free_cell_left(scene: &Scene, layouter: &GridLayouter) -> GridPos {
    let taken = occupied_cells(scene, layouter);
    let leftmost = taken.iter().map(|g| g.col - 1).min().unwrap_or(-1).min(-1);
    (leftmost..=-1)
        .rev()
        .map(|col| GridPos::new(col, 0))
        .find(|cell| !taken.contains(cell))
        .unwrap_or(GridPos::new(leftmost, 0))
}
