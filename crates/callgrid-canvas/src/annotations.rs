//! Freehand strokes and text labels drawn over the graph.

use callgrid_core::Color;
use callgrid_graph::{Camera, Rect, TextMetrics, Vec2};
use serde::{Deserialize, Serialize};

/// Polyline in world coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<Vec2>,
    pub color: Color,
    pub width: f32,
}

impl Stroke {
    pub fn new(start: Vec2, color: Color, width: f32) -> Self {
        Self {
            points: vec![start],
            color,
            width,
        }
    }

    /// Append `point` unless it is within `min_step` of the last one.
    pub fn extend_to(&mut self, point: Vec2, min_step: f32) -> bool {
        if self
            .points
            .last()
            .is_some_and(|last| last.distance(point) <= min_step)
        {
            return false;
        }
        self.points.push(point);
        true
    }
}

/// Text label anchored at its baseline start. `size` is in screen pixels,
/// so labels keep their size while zooming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNote {
    pub position: Vec2,
    pub text: String,
    pub size: f32,
    pub color: Color,
}

const TEXT_HIT_PADDING: f32 = 3.0;
const HANDLE_GAP: f32 = 6.0;

impl TextNote {
    /// Screen-space box around the rendered text, from font metrics.
    pub fn screen_rect(&self, camera: &Camera, metrics: &dyn TextMetrics) -> Rect {
        let anchor = camera.world_to_screen(self.position);
        let width = metrics.text_width(&self.text, self.size);
        Rect::from_min_max(
            Vec2::new(
                anchor.x - TEXT_HIT_PADDING,
                anchor.y - metrics.ascent(self.size) - TEXT_HIT_PADDING,
            ),
            Vec2::new(
                anchor.x + width + TEXT_HIT_PADDING,
                anchor.y + metrics.descent(self.size) + TEXT_HIT_PADDING,
            ),
        )
    }

    /// Square resize handle just right of the text, vertically centered on it.
    pub fn handle_rect(&self, camera: &Camera, metrics: &dyn TextMetrics, side: f32) -> Rect {
        let anchor = camera.world_to_screen(self.position);
        let width = metrics.text_width(&self.text, self.size);
        let min = Vec2::new(
            anchor.x + width + HANDLE_GAP,
            anchor.y - metrics.ascent(self.size) / 2.0 - side / 2.0,
        );
        Rect::from_min_max(min, min + Vec2::new(side, side))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnnotationTool {
    #[default]
    Cursor,
    Brush,
    Text,
    Erase,
    ColorPicker,
}

impl AnnotationTool {
    /// Tool bound to the number keys 1 to 5.
    pub fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '1' => Some(Self::Cursor),
            '2' => Some(Self::Brush),
            '3' => Some(Self::Text),
            '4' => Some(Self::Erase),
            '5' => Some(Self::ColorPicker),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Cursor => "Cursor",
            Self::Brush => "Brush",
            Self::Text => "Text",
            Self::Erase => "Eraser",
            Self::ColorPicker => "Color",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    pub strokes: Vec<Stroke>,
    pub texts: Vec<TextNote>,
}

impl Annotations {
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.texts.is_empty()
    }

    /// Topmost text whose box contains a screen point.
    pub fn text_at(&self, screen: Vec2, camera: &Camera, metrics: &dyn TextMetrics) -> Option<usize> {
        self.texts
            .iter()
            .rposition(|t| t.screen_rect(camera, metrics).contains(screen))
    }

    pub fn handle_at(
        &self,
        screen: Vec2,
        camera: &Camera,
        metrics: &dyn TextMetrics,
        side: f32,
    ) -> Option<usize> {
        self.texts
            .iter()
            .rposition(|t| t.handle_rect(camera, metrics, side).contains(screen))
    }

    /// Drag the eraser from `from` to `to` (world space): strokes are split
    /// as in [`erase_along`] and any text whose box the eraser touches is
    /// removed. Returns whether anything changed.
    pub fn erase_path(
        &mut self,
        from: Vec2,
        to: Vec2,
        radius: f32,
        camera: &Camera,
        metrics: &dyn TextMetrics,
    ) -> bool {
        let strokes = erase_along(&self.strokes, from, to, radius);
        let mut changed = strokes != self.strokes;
        self.strokes = strokes;

        let screen_radius = radius * camera.zoom();
        let (a, b) = (camera.world_to_screen(from), camera.world_to_screen(to));
        let samples = sample_count(a, b, screen_radius);
        let before = self.texts.len();
        self.texts.retain(|note| {
            let rect = note.screen_rect(camera, metrics);
            !(0..=samples)
                .any(|i| rect.intersects_circle(a.lerp(b, i as f32 / samples as f32), screen_radius))
        });
        changed |= self.texts.len() != before;
        changed
    }
}

fn sample_count(from: Vec2, to: Vec2, radius: f32) -> usize {
    let step = (radius * 0.5).max(f32::EPSILON);
    ((from.distance(to) / step).ceil() as usize).max(1)
}

/// Remove every point within `radius` of `center`, splitting strokes.
///
/// Each stroke becomes the runs of consecutive surviving points; runs with
/// fewer than two points are dropped. Surviving points are kept exactly.
pub fn erase(strokes: &[Stroke], center: Vec2, radius: f32) -> Vec<Stroke> {
    let mut out = Vec::with_capacity(strokes.len());
    for stroke in strokes {
        let mut run: Vec<Vec2> = Vec::new();
        for &point in &stroke.points {
            if point.distance(center) > radius {
                run.push(point);
            } else {
                flush_run(&mut out, &mut run, stroke);
            }
        }
        flush_run(&mut out, &mut run, stroke);
    }
    out
}

fn flush_run(out: &mut Vec<Stroke>, run: &mut Vec<Vec2>, template: &Stroke) {
    let points = std::mem::take(run);
    if points.len() >= 2 {
        out.push(Stroke {
            points,
            color: template.color,
            width: template.width,
        });
    }
}

/// [`erase`] at points spaced half a radius apart along `from -> to`.
pub fn erase_along(strokes: &[Stroke], from: Vec2, to: Vec2, radius: f32) -> Vec<Stroke> {
    let samples = sample_count(from, to, radius);
    let mut current = strokes.to_vec();
    for i in 0..=samples {
        current = erase(&current, from.lerp(to, i as f32 / samples as f32), radius);
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use callgrid_graph::FixedMetrics;

    fn line(count: usize) -> Stroke {
        Stroke {
            points: (0..count).map(|i| Vec2::new(i as f32 * 10.0, 0.0)).collect(),
            color: Color::WHITE,
            width: 2.5,
        }
    }

    #[test]
    fn test_erase_midpoint_splits_stroke() {
        let stroke = line(10);
        let result = erase(&[stroke.clone()], Vec2::new(40.0, 0.0), 15.0);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].points, stroke.points[..3].to_vec());
        assert_eq!(result[1].points, stroke.points[6..].to_vec());
        assert!(result.iter().all(|s| s.width == 2.5 && s.color == Color::WHITE));
    }

    #[test]
    fn test_erase_whole_stroke_and_short_runs() {
        assert!(erase(&[line(3)], Vec2::new(10.0, 0.0), 50.0).is_empty());
        // removing the second point leaves a single-point run at the start
        let result = erase(&[line(5)], Vec2::new(10.0, 0.0), 5.0);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].points.len(), 3);
    }

    #[test]
    fn test_erase_misses_leave_strokes_untouched() {
        let strokes = vec![line(4), line(2)];
        assert_eq!(erase(&strokes, Vec2::new(500.0, 500.0), 12.0), strokes);
    }

    #[test]
    fn test_erase_along_path() {
        let result = erase_along(&[line(10)], Vec2::new(30.0, -50.0), Vec2::new(30.0, 50.0), 6.0);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].points.len(), 3);
        assert_eq!(result[1].points.len(), 6);
    }

    #[test]
    fn test_brush_min_step() {
        let mut stroke = Stroke::new(Vec2::ZERO, Color::WHITE, 2.5);
        assert!(!stroke.extend_to(Vec2::new(0.3, 0.0), 0.5));
        assert!(stroke.extend_to(Vec2::new(0.6, 0.0), 0.5));
        assert_eq!(stroke.points.len(), 2);
    }

    #[test]
    fn test_text_hit_covers_whole_label() {
        let metrics = FixedMetrics::default();
        let camera = Camera::new();
        let mut annotations = Annotations::default();
        annotations.texts.push(TextNote {
            position: Vec2::new(100.0, 100.0),
            text: "a fairly long annotation label".into(),
            size: 20.0,
            color: Color::WHITE,
        });
        let width = metrics.text_width(&annotations.texts[0].text, 20.0);
        assert_eq!(annotations.text_at(Vec2::new(100.0 + width - 1.0, 95.0), &camera, &metrics), Some(0));
        assert_eq!(annotations.text_at(Vec2::new(100.0 + width + 20.0, 95.0), &camera, &metrics), None);

        let handle = annotations.texts[0].handle_rect(&camera, &metrics, 15.0);
        assert_eq!(handle.min.x, 100.0 + width + 6.0);
        assert_eq!(handle.width(), 15.0);
        assert_eq!(annotations.handle_at(handle.center(), &camera, &metrics, 15.0), Some(0));
    }

    #[test]
    fn test_erase_path_removes_touched_texts() {
        let metrics = FixedMetrics::default();
        let camera = Camera::new();
        let note = |x: f32, text: &str| TextNote {
            position: Vec2::new(x, 100.0),
            text: text.into(),
            size: 20.0,
            color: Color::WHITE,
        };
        let mut annotations = Annotations {
            strokes: vec![line(10)],
            texts: vec![note(100.0, "keep"), note(400.0, "erase me")],
        };

        // crosses the middle of the second label, far from the stroke
        assert!(annotations.erase_path(
            Vec2::new(420.0, 60.0),
            Vec2::new(420.0, 140.0),
            6.0,
            &camera,
            &metrics
        ));
        assert_eq!(annotations.texts, vec![note(100.0, "keep")]);
        assert_eq!(annotations.strokes, vec![line(10)]);

        assert!(!annotations.erase_path(
            Vec2::new(600.0, 600.0),
            Vec2::new(610.0, 600.0),
            6.0,
            &camera,
            &metrics
        ));
    }

    #[test]
    fn test_tool_digits() {
        assert_eq!(AnnotationTool::from_digit('2'), Some(AnnotationTool::Brush));
        assert_eq!(AnnotationTool::from_digit('5'), Some(AnnotationTool::ColorPicker));
        assert_eq!(AnnotationTool::from_digit('6'), None);
    }
}
