//! Draws a [`RenderList`] with egui shapes.

use crate::input_map::{color32, to_screen};
use callgrid_canvas::RenderList;
use callgrid_canvas::render::{ConnectionShape, NodeShape};
use callgrid_graph::{CustomContent, NodeKind, Rect, style};
use eframe::egui::{self, Align2, FontId, Pos2, Shape, Stroke, StrokeKind};

const DASH: f32 = 6.0;
const GAP: f32 = 4.0;
const ERROR_OVERLAY_EXTRA: f32 = 3.0;

pub fn paint(ui: &egui::Ui, painter: &egui::Painter, origin: Pos2, list: &RenderList) {
    let clip = painter.clip_rect();
    painter.rect_filled(clip, 0.0, color32(list.background));

    if list.dots.visible {
        paint_dots(painter, origin, clip, list);
    }

    for conn in &list.connections {
        paint_connection(painter, origin, conn);
    }

    if let Some((from, to)) = list.preview {
        let stroke = Stroke::new(style::CONNECTION_WIDTH, color32(style::COLOR_DRAG_PREVIEW));
        painter.extend(Shape::dashed_line(
            &[to_screen(from, origin), to_screen(to, origin)],
            stroke,
            DASH,
            GAP,
        ));
    }

    for node in &list.nodes {
        paint_node(ui, painter, origin, node);
    }

    for stroke in &list.strokes {
        let points: Vec<Pos2> = stroke.points.iter().map(|p| to_screen(*p, origin)).collect();
        if let [single] = points.as_slice() {
            painter.circle_filled(*single, stroke.width / 2.0, color32(stroke.color));
        } else {
            painter.add(Shape::line(
                points,
                Stroke::new(stroke.width, color32(stroke.color)),
            ));
        }
    }

    for text in &list.texts {
        painter.text(
            to_screen(text.anchor, origin),
            Align2::LEFT_BOTTOM,
            &text.text,
            FontId::proportional(text.size),
            color32(text.color),
        );
        painter.rect_filled(
            to_rect(text.handle, origin),
            1.0,
            color32(text.color).gamma_multiply(0.6),
        );
    }

    if let Some(rect) = list.selection_box {
        let rect = to_rect(rect, origin);
        painter.rect_filled(rect, 0.0, color32(style::COLOR_SELECTION_FILL));
        painter.rect_stroke(
            rect,
            0.0,
            Stroke::new(1.0, color32(style::COLOR_SELECTION_BORDER)),
            StrokeKind::Inside,
        );
    }

    if let Some(hint) = &list.hint {
        painter.text(
            clip.left_bottom() + egui::vec2(12.0, -12.0),
            Align2::LEFT_BOTTOM,
            hint,
            FontId::proportional(13.0),
            color32(style::COLOR_HINT_TEXT),
        );
    }
}

fn paint_dots(painter: &egui::Painter, origin: Pos2, clip: egui::Rect, list: &RenderList) {
    let dots = &list.dots;
    let color = color32(dots.color);
    let start = to_screen(dots.origin, origin);
    let mut x = start.x - (start.x - clip.left()).div_euclid(dots.spacing) * dots.spacing;
    let first_y = start.y - (start.y - clip.top()).div_euclid(dots.spacing) * dots.spacing;
    while x <= clip.right() {
        let mut y = first_y;
        while y <= clip.bottom() {
            painter.circle_filled(egui::pos2(x, y), dots.radius, color);
            y += dots.spacing;
        }
        x += dots.spacing;
    }
}

fn paint_connection(painter: &egui::Painter, origin: Pos2, conn: &ConnectionShape) {
    let points: Vec<Pos2> = conn.points.iter().map(|p| to_screen(*p, origin)).collect();
    if conn.error {
        painter.add(Shape::line(
            points.clone(),
            Stroke::new(
                conn.width + ERROR_OVERLAY_EXTRA,
                color32(style::COLOR_ERROR_OVERLAY).gamma_multiply(0.5),
            ),
        ));
    }
    let color = if conn.error {
        color32(style::COLOR_ERROR)
    } else {
        color32(conn.color)
    };
    painter.add(Shape::line(points, Stroke::new(conn.width, color)));
    if let Some(arrow) = conn.arrow {
        painter.add(Shape::convex_polygon(
            arrow.iter().map(|p| to_screen(*p, origin)).collect(),
            color,
            Stroke::NONE,
        ));
    }
}

fn paint_node(ui: &egui::Ui, painter: &egui::Painter, origin: Pos2, node: &NodeShape) {
    let rect = to_rect(node.rect, origin);
    let radius = node.corner_radius;

    if node.active {
        painter.rect_filled(
            rect.expand(6.0),
            radius + 6.0,
            color32(style::COLOR_ACTIVE_GLOW),
        );
    }

    let border_width = if node.selected { 2.5 } else { 1.5 };
    match node.kind {
        NodeKind::AddTool => {
            painter.rect_stroke(
                rect,
                radius,
                Stroke::new(border_width, color32(node.border)),
                StrokeKind::Inside,
            );
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "+",
                FontId::proportional(node.font_size * 2.0),
                color32(node.border),
            );
            return;
        }
        NodeKind::Module | NodeKind::EntryFile => {
            painter.circle_filled(rect.center(), rect.width().min(rect.height()) / 2.0, color32(node.fill));
            painter.circle_stroke(
                rect.center(),
                rect.width().min(rect.height()) / 2.0,
                Stroke::new(border_width, color32(node.border)),
            );
        }
        _ => {
            painter.rect_filled(rect, radius, color32(node.fill));
            painter.rect_stroke(
                rect,
                radius,
                Stroke::new(border_width, color32(node.border)),
                StrokeKind::Inside,
            );
        }
    }

    let font = FontId::monospace(node.font_size);
    let text = color32(node.text);
    match &node.content {
        Some(CustomContent::Text(body)) => {
            painter.text(rect.center(), Align2::CENTER_CENTER, body, font, text);
        }
        Some(CustomContent::Image(path)) => {
            egui::Image::new(format!("file://{path}"))
                .corner_radius(radius)
                .paint_at(ui, rect.shrink(4.0));
        }
        Some(CustomContent::Video(path)) => {
            painter.text(rect.center(), Align2::CENTER_BOTTOM, "▶", font.clone(), text);
            painter.text(
                rect.center(),
                Align2::CENTER_TOP,
                file_name(path),
                FontId::proportional(node.font_size * 0.7),
                text,
            );
        }
        None => {
            painter.text(rect.center(), Align2::CENTER_CENTER, &node.name, font, text);
        }
    }

    if node.icon.is_some() {
        painter.text(
            rect.center_top() + egui::vec2(0.0, node.font_size * 0.4),
            Align2::CENTER_TOP,
            ".rs",
            FontId::proportional(node.font_size * 0.7),
            color32(style::COLOR_NODE_SUBTEXT),
        );
    }

    if let Some(error) = &node.error {
        painter.text(
            rect.center_bottom() + egui::vec2(0.0, 4.0),
            Align2::CENTER_TOP,
            format!("line {}: {}", error.line, error.message),
            FontId::proportional((node.font_size * 0.8).max(9.0)),
            color32(style::COLOR_ERROR),
        );
    }
}

fn to_rect(rect: Rect, origin: Pos2) -> egui::Rect {
    egui::Rect::from_min_max(to_screen(rect.min, origin), to_screen(rect.max, origin))
}

fn file_name(path: &str) -> &str {
    std::path::Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_falls_back_to_input() {
        assert_eq!(file_name("/tmp/clips/demo.mp4"), "demo.mp4");
        assert_eq!(file_name(""), "");
    }
}
