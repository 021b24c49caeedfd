use crate::edge_router::EdgeRouter;
use crate::geometry::{Rect, Vec2};
use crate::graph::{GraphModel, Node, NodeKind};
use crate::style;

/// Font measurements supplied by whoever draws text.
///
/// Sizes are in the same units as the returned values; the renderer passes
/// screen pixels, headless callers can use [`FixedMetrics`].
pub trait TextMetrics {
    fn text_width(&self, text: &str, size: f32) -> f32;
    fn line_height(&self, size: f32) -> f32;
    fn ascent(&self, size: f32) -> f32;
    fn descent(&self, size: f32) -> f32 {
        self.line_height(size) - self.ascent(size)
    }
}

/// Monospace approximation used when no font system is available.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedMetrics {
    /// Advance per character as a fraction of the font size.
    pub advance: f32,
    pub line_factor: f32,
    pub ascent_factor: f32,
}

impl Default for FixedMetrics {
    fn default() -> Self {
        Self {
            advance: 0.6,
            line_factor: 1.25,
            ascent_factor: 0.9,
        }
    }
}

impl TextMetrics for FixedMetrics {
    fn text_width(&self, text: &str, size: f32) -> f32 {
        text.chars().count() as f32 * size * self.advance
    }

    fn line_height(&self, size: f32) -> f32 {
        size * self.line_factor
    }

    fn ascent(&self, size: f32) -> f32 {
        size * self.ascent_factor
    }
}

/// World-space box of a node, centered on its position.
///
/// Declaration boxes are sized from the label width, clamped between the
/// minimum and maximum node widths; custom content and the add tool are
/// squares; nodes with an icon are tall enough for it.
pub fn node_rect(node: &Node, metrics: &dyn TextMetrics) -> Rect {
    let line_height = metrics.line_height(style::NODE_FONT_SIZE);
    let size = match node.kind {
        NodeKind::Custom => {
            let side = (style::CUSTOM_CONTENT_SIDE + style::SQUARE_PADDING) * node.scale;
            Vec2::new(side, side)
        }
        NodeKind::AddTool => {
            let side = (style::ADD_TOOL_SIDE + style::SQUARE_PADDING) * node.scale;
            Vec2::new(side, side)
        }
        _ => {
            let text = metrics.text_width(&node.name, style::NODE_FONT_SIZE);
            let width = (text + style::NODE_TEXT_PADDING)
                .clamp(style::NODE_MIN_WIDTH, style::NODE_MAX_WIDTH)
                * node.scale;
            let mut height = (line_height + style::NODE_VERTICAL_PADDING) * node.scale;
            if node.icon.is_some() {
                height = height.max(
                    (style::NODE_ICON_SIZE + line_height + style::SQUARE_PADDING) * node.scale,
                );
            }
            Vec2::new(width, height)
        }
    };
    Rect::from_center_size(node.position, size)
}

/// Node boxes of one frame, in draw order.
#[derive(Debug, Clone, Default)]
pub struct HitTester {
    node_rects: Vec<(String, Rect)>,
    /// World-space distance that still counts as touching a connection.
    pub edge_tolerance: f32,
}

impl HitTester {
    pub fn new(model: &GraphModel, metrics: &dyn TextMetrics) -> Self {
        Self {
            node_rects: model
                .nodes()
                .iter()
                .map(|n| (n.name.clone(), node_rect(n, metrics)))
                .collect(),
            edge_tolerance: 8.0,
        }
    }

    pub fn rect(&self, name: &str) -> Option<Rect> {
        self.node_rects
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| *r)
    }

    /// Topmost node under a world point.
    pub fn node_at(&self, point: Vec2) -> Option<&str> {
        self.node_rects
            .iter()
            .rev()
            .find(|(_, rect)| rect.contains(point))
            .map(|(name, _)| name.as_str())
    }

    /// Nodes whose center lies inside `area`.
    pub fn nodes_in(&self, area: Rect) -> Vec<&str> {
        self.node_rects
            .iter()
            .filter(|(_, rect)| area.contains(rect.center()))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Index of the nearest visible connection within tolerance.
    pub fn connection_at(
        &self,
        model: &GraphModel,
        router: &EdgeRouter,
        point: Vec2,
    ) -> Option<usize> {
        model
            .connections()
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.hidden)
            .filter_map(|(i, c)| {
                let from = model.node(&c.from)?.position;
                let to = model.node(&c.to)?.position;
                let distance = router.route(from, to).point_distance(point, 24);
                (distance <= self.edge_tolerance).then_some((i, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ConnectionKind;

    fn model() -> GraphModel {
        let mut model = GraphModel::new();
        let mut a = Node::custom_text("a", "");
        a.place(Vec2::new(0.0, 0.0));
        let mut b = Node::custom_text("b", "");
        b.place(Vec2::new(400.0, 0.0));
        model.add_node(a).unwrap();
        model.add_node(b).unwrap();
        model.connect("a", "b", ConnectionKind::Ui).unwrap();
        model
    }

    #[test]
    fn test_label_width_is_clamped() {
        let metrics = FixedMetrics::default();
        let mut node = Node::entry_file("x", "x.rs");
        node.icon = None;
        assert_eq!(node_rect(&node, &metrics).width(), style::NODE_MIN_WIDTH);
        node.name = "a".repeat(200);
        assert_eq!(node_rect(&node, &metrics).width(), style::NODE_MAX_WIDTH);
    }

    #[test]
    fn test_icon_makes_box_taller() {
        let metrics = FixedMetrics::default();
        let mut node = Node::entry_file("main.rs", "main.rs");
        let tall = node_rect(&node, &metrics).height();
        node.icon = None;
        assert!(tall > node_rect(&node, &metrics).height());
    }

    #[test]
    fn test_node_and_box_hits() {
        let model = model();
        let hits = HitTester::new(&model, &FixedMetrics::default());
        assert_eq!(hits.node_at(Vec2::new(10.0, 10.0)), Some("a"));
        assert_eq!(hits.node_at(Vec2::new(200.0, 0.0)), None);
        let area = Rect::from_min_max(Vec2::new(300.0, -50.0), Vec2::new(500.0, 50.0));
        assert_eq!(hits.nodes_in(area), vec!["b"]);
    }

    #[test]
    fn test_hidden_connections_are_not_hit() {
        let mut model = model();
        let router = EdgeRouter::new();
        let hits = HitTester::new(&model, &FixedMetrics::default());
        assert_eq!(hits.connection_at(&model, &router, Vec2::new(200.0, 3.0)), Some(0));
        model.connections_mut()[0].hidden = true;
        assert_eq!(hits.connection_at(&model, &router, Vec2::new(200.0, 3.0)), None);
    }
}
