//! Frame description in screen space.
//!
//! [`RenderList::build`] turns the scene into flat shapes a painter can draw
//! in order: background, dot grid, connections, drag preview, nodes,
//! annotations, then screen overlays. Anything outside the visible world
//! rectangle (plus a margin) is left out.

use crate::config::CanvasConfig;
use crate::interaction::InteractionController;
use crate::scene::Scene;
use callgrid_core::Color;
use callgrid_graph::graph::NodeError;
use callgrid_graph::{
    CustomContent, EdgeRouter, NodeKind, Rect, TextMetrics, Vec2, node_rect, style,
};

/// Below this on-screen spacing the dot grid turns into noise and is skipped.
const MIN_DOT_SPACING_PX: f32 = 6.0;
const CURVE_SEGMENTS: usize = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct DotGrid {
    pub visible: bool,
    /// Screen distance between dots.
    pub spacing: f32,
    /// Screen position of one dot; the rest repeat from it.
    pub origin: Vec2,
    pub radius: f32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionShape {
    pub from: String,
    pub to: String,
    pub points: Vec<Vec2>,
    pub color: Color,
    pub width: f32,
    /// One endpoint has a compiler error; draw the red overlay.
    pub error: bool,
    /// Tip, left and right corners.
    pub arrow: Option<[Vec2; 3]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeShape {
    pub name: String,
    pub kind: NodeKind,
    pub rect: Rect,
    pub corner_radius: f32,
    pub fill: Color,
    pub border: Color,
    pub text: Color,
    pub font_size: f32,
    pub icon: Option<String>,
    pub content: Option<CustomContent>,
    pub selected: bool,
    pub active: bool,
    pub error: Option<NodeError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrokeShape {
    pub points: Vec<Vec2>,
    pub color: Color,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextShape {
    pub anchor: Vec2,
    pub text: String,
    pub size: f32,
    pub color: Color,
    pub handle: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderList {
    pub background: Color,
    pub dots: DotGrid,
    pub connections: Vec<ConnectionShape>,
    pub preview: Option<(Vec2, Vec2)>,
    pub nodes: Vec<NodeShape>,
    pub strokes: Vec<StrokeShape>,
    pub texts: Vec<TextShape>,
    pub selection_box: Option<Rect>,
    pub hint: Option<String>,
    /// Nodes left out by culling.
    pub culled: usize,
}

impl RenderList {
    pub fn build(
        scene: &Scene,
        interaction: &InteractionController,
        config: &CanvasConfig,
        metrics: &dyn TextMetrics,
        router: &EdgeRouter,
    ) -> Self {
        let camera = &scene.camera;
        let zoom = camera.zoom();
        let visible = camera.visible_rect(scene.viewport, config.cull_margin);

        let rects: Vec<(usize, Rect)> = scene
            .model
            .nodes()
            .iter()
            .enumerate()
            .map(|(i, n)| (i, node_rect(n, metrics)))
            .collect();
        let rect_of = |name: &str| {
            scene
                .model
                .index_of(name)
                .and_then(|i| rects.get(i))
                .map(|(_, r)| *r)
        };
        let is_visible = |rect: Rect| rect.intersects(&visible);

        let mut nodes = Vec::new();
        let mut culled = 0;
        for (i, rect) in &rects {
            let node = &scene.model.nodes()[*i];
            if !is_visible(*rect) {
                culled += 1;
                continue;
            }
            let selected = scene.selection.contains(&node.name);
            let colors = style::node_colors(node, selected);
            let opacity = node.display_opacity;
            nodes.push(NodeShape {
                name: node.name.clone(),
                kind: node.kind,
                rect: Rect::from_min_max(
                    camera.world_to_screen(rect.min),
                    camera.world_to_screen(rect.max),
                ),
                corner_radius: style::NODE_CORNER_RADIUS * zoom,
                fill: colors.fill.faded(opacity),
                border: colors.border.faded(opacity),
                text: colors.text.faded(opacity),
                font_size: style::NODE_FONT_SIZE * node.scale * zoom,
                icon: node.icon.clone(),
                content: node.content.clone(),
                selected,
                active: node.active,
                error: node.error.clone(),
            });
        }

        let mut connections = Vec::new();
        for conn in scene.model.connections() {
            if conn.hidden {
                continue;
            }
            let (Some(from), Some(to)) = (scene.model.node(&conn.from), scene.model.node(&conn.to))
            else {
                continue;
            };
            let (Some(from_rect), Some(to_rect)) = (rect_of(&conn.from), rect_of(&conn.to)) else {
                continue;
            };
            if !is_visible(from_rect) && !is_visible(to_rect) {
                continue;
            }
            let curve = router.route(from.position, to.position);
            let world_points = curve.flatten(CURVE_SEGMENTS);
            let arrow = arrow_head(&world_points, &to_rect).map(|corners| {
                corners.map(|p| camera.world_to_screen(p))
            });
            let error = from.error.is_some() || to.error.is_some();
            connections.push(ConnectionShape {
                from: conn.from.clone(),
                to: conn.to.clone(),
                points: world_points
                    .into_iter()
                    .map(|p| camera.world_to_screen(p))
                    .collect(),
                color: from.color().faded(conn.display_opacity),
                width: if error {
                    style::CONNECTION_ERROR_WIDTH
                } else {
                    style::CONNECTION_WIDTH
                } * zoom.max(0.5),
                error,
                arrow,
            });
        }

        let preview = interaction.drag_preview().and_then(|(source, current)| {
            let node = scene.model.node(source)?;
            Some((
                camera.world_to_screen(node.position),
                camera.world_to_screen(current),
            ))
        });

        let strokes: Vec<StrokeShape> = scene
            .annotations
            .strokes
            .iter()
            .chain(interaction.live_stroke())
            .filter(|s| s.points.iter().any(|p| visible.contains(*p)))
            .map(|s| StrokeShape {
                points: s.points.iter().map(|p| camera.world_to_screen(*p)).collect(),
                color: s.color,
                width: s.width * zoom,
            })
            .collect();

        let texts = scene
            .annotations
            .texts
            .iter()
            .filter(|t| visible.contains(t.position))
            .map(|t| TextShape {
                anchor: camera.world_to_screen(t.position),
                text: t.text.clone(),
                size: t.size,
                color: t.color,
                handle: t.handle_rect(camera, metrics, config.resize_handle),
            })
            .collect();

        Self {
            background: style::COLOR_BACKGROUND,
            dots: dot_grid(scene, config),
            connections,
            preview,
            nodes,
            strokes,
            texts,
            selection_box: interaction.selection_box(),
            hint: interaction.mode_hint(),
            culled,
        }
    }
}

fn dot_grid(scene: &Scene, config: &CanvasConfig) -> DotGrid {
    let spacing = config.dot_spacing * scene.camera.zoom();
    let offset = scene.camera.offset();
    DotGrid {
        visible: spacing >= MIN_DOT_SPACING_PX,
        spacing,
        origin: Vec2::new(
            offset.x.rem_euclid(spacing.max(f32::EPSILON)),
            offset.y.rem_euclid(spacing.max(f32::EPSILON)),
        ),
        radius: style::DOT_RADIUS,
        color: style::COLOR_DOT,
    }
}

/// Arrow at the point where the curve enters the target box, pointing along
/// the curve.
fn arrow_head(points: &[Vec2], target: &Rect) -> Option<[Vec2; 3]> {
    let entry = points.windows(2).find(|w| !target.contains(w[0]) && target.contains(w[1]))?;
    let (outside, tip) = (entry[0], entry[1]);
    let direction = tip - outside;
    let length = direction.length();
    if length < f32::EPSILON {
        return None;
    }
    let dir = direction * (1.0 / length);
    let normal = Vec2::new(-dir.y, dir.x);
    let base = tip - dir * style::ARROW_SIZE;
    Some([
        tip,
        base + normal * style::ARROW_HALF_WIDTH,
        base - normal * style::ARROW_HALF_WIDTH,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use callgrid_graph::{CameraState, ConnectionKind, FixedMetrics, GraphModel, Node};

    fn scene() -> Scene {
        let mut scene = Scene::default();
        let mut model = GraphModel::new();
        for (name, x) in [("a", 100.0), ("b", 500.0), ("far", 50_000.0)] {
            let mut node = Node::custom_text(name, name);
            node.place(Vec2::new(x, 100.0));
            model.add_node(node).unwrap();
        }
        model.connect("a", "b", ConnectionKind::Call).unwrap();
        model.connect("b", "far", ConnectionKind::Call).unwrap();
        scene.model = model;
        scene.viewport = Vec2::new(1000.0, 600.0);
        scene
    }

    fn build(scene: &Scene) -> RenderList {
        let config = CanvasConfig::default();
        RenderList::build(
            scene,
            &InteractionController::new(&config),
            &config,
            &FixedMetrics::default(),
            &EdgeRouter::new(),
        )
    }

    #[test]
    fn test_culls_offscreen_nodes_but_keeps_edges_with_one_visible_end() {
        let list = build(&scene());
        let names: Vec<&str> = list.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(list.culled, 1);
        assert_eq!(list.connections.len(), 2);
    }

    #[test]
    fn test_hidden_connections_are_skipped() {
        let mut scene = scene();
        scene.model.connections_mut()[0].hidden = true;
        let list = build(&scene);
        assert_eq!(list.connections.len(), 1);
        assert_eq!(list.connections[0].from, "b");
    }

    #[test]
    fn test_arrow_points_into_target() {
        let list = build(&scene());
        let conn = &list.connections[0];
        let [tip, left, right] = conn.arrow.unwrap();
        let target = list.nodes[1].rect;
        assert!(target.contains(tip));
        assert!(left.x < tip.x && right.x < tip.x);
    }

    #[test]
    fn test_error_overlay_and_screen_transform() {
        let mut scene = scene();
        scene.model.node_mut("b").unwrap().error = Some(NodeError {
            line: 3,
            message: "boom".into(),
        });
        scene.camera.set_state(CameraState {
            x: 10.0,
            y: 20.0,
            zoom: 2.0,
        });
        let list = build(&scene);
        assert!(list.connections.iter().all(|c| c.error));
        let a = list.nodes.iter().find(|n| n.name == "a").unwrap();
        assert_eq!(a.rect.center(), Vec2::new(210.0, 220.0));
        assert!(list.dots.visible);
        assert_eq!(list.dots.spacing, 56.0);
        assert_eq!(list.dots.origin, Vec2::new(10.0, 20.0));
    }
}
