use crate::geometry::{Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::time::{Duration, Instant};

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 3.0;

/// Serializable camera values: `screen = world * zoom + (x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub x: f32,
    pub y: f32,
    pub zoom: f32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tween {
    from: CameraState,
    to: CameraState,
    start: Instant,
    duration: Duration,
}

fn ease_in_out_sine(t: f32) -> f32 {
    -((PI * t).cos() - 1.0) / 2.0
}

/// Pannable, zoomable view with animated transitions.
///
/// Animated moves tween x, y and zoom together; any direct pan or zoom
/// cancels a running tween.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    state: CameraState,
    tween: Option<Tween>,
    pub duration: Duration,
    pub min_zoom: f32,
    pub max_zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            state: CameraState::default(),
            tween: None,
            duration: Duration::from_millis(300),
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn zoom(&self) -> f32 {
        self.state.zoom
    }

    pub fn offset(&self) -> Vec2 {
        Vec2::new(self.state.x, self.state.y)
    }

    pub fn is_animating(&self) -> bool {
        self.tween.is_some()
    }

    /// Jump to a state without animation.
    pub fn set_state(&mut self, state: CameraState) {
        self.tween = None;
        self.state = CameraState {
            zoom: self.clamp_zoom(state.zoom),
            ..state
        };
    }

    fn clamp_zoom(&self, zoom: f32) -> f32 {
        if zoom.is_finite() {
            zoom.clamp(self.min_zoom, self.max_zoom)
        } else {
            1.0
        }
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        world * self.state.zoom + self.offset()
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        (screen - self.offset()) * (1.0 / self.state.zoom)
    }

    /// World-space rectangle covered by a viewport, grown by `margin` world units.
    pub fn visible_rect(&self, viewport: Vec2, margin: f32) -> Rect {
        Rect::from_min_max(
            self.screen_to_world(Vec2::ZERO),
            self.screen_to_world(viewport),
        )
        .expand(margin)
    }

    pub fn pan_by(&mut self, screen_delta: Vec2) {
        self.tween = None;
        self.state.x += screen_delta.x;
        self.state.y += screen_delta.y;
    }

    /// Zoom by `factor` keeping the world point under `anchor` fixed.
    pub fn zoom_at(&mut self, anchor: Vec2, factor: f32) {
        self.tween = None;
        self.state = self.zoomed_about(anchor, factor);
    }

    /// Animated zoom about a screen point, typically the viewport center.
    pub fn zoom_about(&mut self, anchor: Vec2, factor: f32, now: Instant) {
        let target = self.zoomed_about(anchor, factor);
        self.animate_to(target, now);
    }

    fn zoomed_about(&self, anchor: Vec2, factor: f32) -> CameraState {
        let world = self.screen_to_world(anchor);
        let zoom = self.clamp_zoom(self.state.zoom * factor);
        CameraState {
            x: anchor.x - world.x * zoom,
            y: anchor.y - world.y * zoom,
            zoom,
        }
    }

    /// State that shows `world` at the center of `viewport` at `zoom`.
    pub fn centered_on(&self, world: Vec2, viewport: Vec2, zoom: f32) -> CameraState {
        let zoom = self.clamp_zoom(zoom);
        CameraState {
            x: viewport.x * 0.5 - world.x * zoom,
            y: viewport.y * 0.5 - world.y * zoom,
            zoom,
        }
    }

    /// Animate so `bounds` fills `fill` of the viewport, zoom capped at `max_fit_zoom`.
    pub fn fit(&mut self, bounds: Rect, viewport: Vec2, fill: f32, max_fit_zoom: f32, now: Instant) {
        let width = bounds.width().max(1.0);
        let height = bounds.height().max(1.0);
        let zoom = (viewport.x * fill / width)
            .min(viewport.y * fill / height)
            .min(max_fit_zoom);
        let target = self.centered_on(bounds.center(), viewport, zoom);
        self.animate_to(target, now);
    }

    pub fn animate_to(&mut self, target: CameraState, now: Instant) {
        let target = CameraState {
            zoom: self.clamp_zoom(target.zoom),
            ..target
        };
        self.tween = Some(Tween {
            from: self.state,
            to: target,
            start: now,
            duration: self.duration,
        });
    }

    /// Advance a running tween. Returns true when the camera moved.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(tween) = self.tween else {
            return false;
        };
        let elapsed = now.saturating_duration_since(tween.start);
        let t = if tween.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f32() / tween.duration.as_secs_f32()).min(1.0)
        };
        let k = ease_in_out_sine(t);
        let lerp = |a: f32, b: f32| a + (b - a) * k;
        self.state = CameraState {
            x: lerp(tween.from.x, tween.to.x),
            y: lerp(tween.from.y, tween.to.y),
            zoom: lerp(tween.from.zoom, tween.to.zoom),
        };
        if t >= 1.0 {
            self.state = tween.to;
            self.tween = None;
        }
        true
    }

    /// Final state of the running tween, or the current state.
    pub fn target(&self) -> CameraState {
        self.tween.map_or(self.state, |t| t.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_transform() {
        let mut camera = Camera::new();
        camera.set_state(CameraState {
            x: 40.0,
            y: -20.0,
            zoom: 2.0,
        });
        let world = Vec2::new(13.0, 7.5);
        let screen = camera.world_to_screen(world);
        assert_eq!(screen, Vec2::new(66.0, -5.0));
        assert!(camera.screen_to_world(screen).approx_eq(world, 1e-4));
    }

    #[test]
    fn test_zoom_at_keeps_anchor_fixed() {
        let mut camera = Camera::new();
        let anchor = Vec2::new(300.0, 200.0);
        let before = camera.screen_to_world(anchor);
        camera.zoom_at(anchor, 1.4);
        assert!(camera.screen_to_world(anchor).approx_eq(before, 1e-3));
        assert!((camera.zoom() - 1.4).abs() < 1e-6);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = Camera::new();
        for _ in 0..40 {
            camera.zoom_at(Vec2::ZERO, 0.7);
        }
        assert_eq!(camera.zoom(), MIN_ZOOM);
        for _ in 0..40 {
            camera.zoom_at(Vec2::ZERO, 1.4);
        }
        assert_eq!(camera.zoom(), MAX_ZOOM);
    }

    #[test]
    fn test_tween_completes_after_duration() {
        let start = Instant::now();
        let mut camera = Camera::new();
        let target = CameraState {
            x: 100.0,
            y: 50.0,
            zoom: 1.7,
        };
        camera.animate_to(target, start);
        assert!(camera.tick(start + Duration::from_millis(150)));
        let halfway = camera.state();
        assert!((halfway.x - 50.0).abs() < 1e-3, "sine ease is symmetric");
        assert!(camera.is_animating());

        camera.tick(start + Duration::from_millis(300));
        assert_eq!(camera.state(), target);
        assert!(!camera.is_animating());
        assert!(!camera.tick(start + Duration::from_millis(400)));
    }

    #[test]
    fn test_fit_caps_zoom_and_centers() {
        let start = Instant::now();
        let mut camera = Camera::new();
        let bounds = Rect::from_min_max(Vec2::new(0.0, 0.0), Vec2::new(100.0, 100.0));
        let viewport = Vec2::new(1000.0, 800.0);
        camera.fit(bounds, viewport, 0.8, 1.5, start);
        camera.tick(start + Duration::from_secs(1));
        assert_eq!(camera.zoom(), 1.5);
        let center = camera.world_to_screen(bounds.center());
        assert!(center.approx_eq(Vec2::new(500.0, 400.0), 1e-3));
    }

    #[test]
    fn test_visible_rect() {
        let mut camera = Camera::new();
        camera.set_state(CameraState {
            x: -100.0,
            y: 0.0,
            zoom: 2.0,
        });
        let rect = camera.visible_rect(Vec2::new(800.0, 600.0), 100.0);
        assert_eq!(rect.min, Vec2::new(-50.0, -100.0));
        assert_eq!(rect.max, Vec2::new(550.0, 400.0));
    }
}
