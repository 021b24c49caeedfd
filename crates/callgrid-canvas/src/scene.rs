use crate::annotations::Annotations;
use crate::config::CanvasConfig;
use callgrid_core::Analysis;
use callgrid_graph::{Camera, CameraState, GraphModel, HitTester, TextMetrics, Vec2};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

/// Which nodes the user picked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Single selected node.
    pub selected: Option<String>,
    /// Members of a multi-node box selection.
    pub highlighted: Vec<String>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.selected.is_none() && self.highlighted.is_empty()
    }

    /// Every node a grab or delete applies to.
    pub fn members(&self) -> Vec<String> {
        let mut members = self.highlighted.clone();
        if let Some(name) = &self.selected
            && !members.contains(name)
        {
            members.push(name.clone());
        }
        members
    }

    pub fn contains(&self, name: &str) -> bool {
        self.selected.as_deref() == Some(name) || self.highlighted.iter().any(|n| n == name)
    }

    /// Forget names no longer in the model.
    pub fn retain_existing(&mut self, model: &GraphModel) {
        if self.selected.as_deref().is_some_and(|n| !model.contains(n)) {
            self.selected = None;
        }
        self.highlighted.retain(|n| model.contains(n));
    }
}

/// Everything the canvas draws: the graph, the view onto it, annotations
/// and selection, for one analyzed file.
#[derive(Debug, Clone)]
pub struct Scene {
    pub file: Option<PathBuf>,
    pub analysis: Analysis,
    pub model: GraphModel,
    pub camera: Camera,
    pub annotations: Annotations,
    pub selection: Selection,
    /// Nodes seen during the current trace session; `Some` while runtime
    /// focus mode is on.
    pub runtime_focus: Option<HashSet<String>>,
    pub viewport: Vec2,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            file: None,
            analysis: Analysis::empty(""),
            model: GraphModel::new(),
            camera: Camera::new(),
            annotations: Annotations::default(),
            selection: Selection::default(),
            runtime_focus: None,
            viewport: Vec2::new(1280.0, 800.0),
        }
    }
}

impl Scene {
    pub fn new(config: &CanvasConfig) -> Self {
        let mut scene = Self::default();
        scene.camera.min_zoom = config.min_zoom;
        scene.camera.max_zoom = config.max_zoom;
        scene.camera.duration = config.tween;
        scene
    }

    pub fn runtime_focus_mode(&self) -> bool {
        self.runtime_focus.is_some()
    }

    pub fn select(&mut self, name: Option<&str>, config: &CanvasConfig) {
        self.selection = Selection {
            selected: name.filter(|n| self.model.contains(n)).map(str::to_string),
            highlighted: Vec::new(),
        };
        self.refresh_emphasis(config);
    }

    pub fn highlight(&mut self, names: Vec<String>, config: &CanvasConfig) {
        self.selection = Selection {
            selected: None,
            highlighted: names,
        };
        self.selection.retain_existing(&self.model);
        self.refresh_emphasis(config);
    }

    pub fn clear_selection(&mut self, config: &CanvasConfig) {
        self.selection = Selection::default();
        self.refresh_emphasis(config);
    }

    pub fn hit_tester(&self, metrics: &dyn TextMetrics) -> HitTester {
        HitTester::new(&self.model, metrics)
    }

    /// Animate so every node fits the viewport.
    pub fn reset_view(&mut self, config: &CanvasConfig, now: Instant) {
        match self.model.bounds() {
            Some(bounds) => self.camera.fit(
                bounds,
                self.viewport,
                config.fit_fill,
                config.fit_max_zoom,
                now,
            ),
            None => self.camera.animate_to(CameraState::default(), now),
        }
    }

    /// Animate to the focus zoom centered on a node.
    pub fn focus_on_node(&mut self, name: &str, config: &CanvasConfig, now: Instant) -> bool {
        let Some(node) = self.model.node(name) else {
            return false;
        };
        let target = self
            .camera
            .centered_on(node.original, self.viewport, config.focus_zoom);
        self.camera.animate_to(target, now);
        true
    }

    /// Animated zoom about the viewport center.
    pub fn zoom_by(&mut self, factor: f32, now: Instant) {
        self.camera.zoom_about(self.viewport * 0.5, factor, now);
    }

    /// Select and focus the first node whose name contains `query`,
    /// ignoring case. An exact match wins.
    pub fn search(&mut self, query: &str, config: &CanvasConfig, now: Instant) -> Option<String> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }
        let nodes = self.model.nodes();
        let found = nodes
            .iter()
            .find(|n| n.name.to_lowercase() == query)
            .or_else(|| nodes.iter().find(|n| n.name.to_lowercase().contains(&query)))
            .map(|n| n.name.clone())?;
        self.select(Some(&found), config);
        self.focus_on_node(&found, config, now);
        Some(found)
    }

    /// Recompute target scale and opacity of every node and connection.
    ///
    /// Runtime focus mode wins over selection: only nodes observed during
    /// the run stay opaque. Otherwise the selection and its callers and
    /// callees stay bright and everything else is dimmed.
    pub fn refresh_emphasis(&mut self, config: &CanvasConfig) {
        self.selection.retain_existing(&self.model);

        let mut related: HashSet<String> = HashSet::new();
        if let Some(name) = &self.selection.selected {
            related.extend(self.model.related(name).into_iter().map(str::to_string));
        }
        related.extend(self.selection.highlighted.iter().cloned());
        let has_selection = !self.selection.is_empty();
        let selected = self.selection.selected.clone();

        for node in self.model.nodes_mut() {
            let is_selected = selected.as_deref() == Some(node.name.as_str());
            node.target_scale = if is_selected { config.selected_scale } else { 1.0 };
            node.opacity = match &self.runtime_focus {
                Some(seen) if node.active || seen.contains(&node.name) => 1.0,
                Some(_) => config.dim_opacity,
                None if !has_selection || is_selected => 1.0,
                None if related.contains(&node.name) => config.related_opacity,
                None => config.dim_opacity,
            };
        }

        for conn in self.model.connections_mut() {
            let touches_selection = selected.as_deref().is_some_and(|s| conn.touches(s))
                || (related.contains(&conn.from) && related.contains(&conn.to));
            conn.highlighted = has_selection && touches_selection;
            conn.opacity = if !has_selection {
                callgrid_graph::graph::CONNECTION_REST_OPACITY
            } else if touches_selection {
                config.connection_related_opacity
            } else {
                config.connection_dim_opacity
            };
        }
    }
}
