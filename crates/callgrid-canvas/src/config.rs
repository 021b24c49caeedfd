use callgrid_core::Color;
use std::time::Duration;

/// Tunables for the canvas. Everything time- or size-related lives here.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasConfig {
    // Live tracing
    pub active_duration: Duration,
    pub focus_idle_timeout: Duration,
    pub dim_opacity: f32,
    pub module_ring_min_radius: f32,
    pub module_ring_viewport_factor: f32,
    pub module_ring_step: f32,
    pub module_ring_free_slots: usize,

    // Selection
    pub selected_scale: f32,
    pub related_opacity: f32,
    pub connection_related_opacity: f32,
    pub connection_dim_opacity: f32,

    // Camera
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub focus_zoom: f32,
    pub fit_fill: f32,
    pub fit_max_zoom: f32,
    pub zoom_in_step: f32,
    pub zoom_out_step: f32,
    pub wheel_in_step: f32,
    pub wheel_out_step: f32,
    pub tween: Duration,

    // Rendering
    pub cull_margin: f32,
    pub dot_spacing: f32,
    pub max_dt: f32,
    pub frame_fast: Duration,
    pub frame_slow: Duration,
    pub idle_ticks: u32,

    // Interaction
    pub move_epsilon: f32,
    pub click_slop: f32,
    pub undo_limit: usize,

    // Annotations
    pub eraser_radius: f32,
    pub brush_width: f32,
    pub brush_min_step: f32,
    pub annotation_color: Color,
    pub text_size: f32,
    pub min_text_size: f32,
    pub text_resize_factor: f32,
    pub resize_handle: f32,

    /// Restore a file's previous layout from the session cache when it is reopened.
    pub restore_sessions: bool,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            active_duration: Duration::from_millis(450),
            focus_idle_timeout: Duration::from_millis(1500),
            dim_opacity: 0.5,
            module_ring_min_radius: 220.0,
            module_ring_viewport_factor: 0.32,
            module_ring_step: 22.0,
            module_ring_free_slots: 6,

            selected_scale: 1.1,
            related_opacity: 0.9,
            connection_related_opacity: 0.9,
            connection_dim_opacity: 0.3,

            min_zoom: 0.1,
            max_zoom: 3.0,
            focus_zoom: 1.7,
            fit_fill: 0.8,
            fit_max_zoom: 1.5,
            zoom_in_step: 1.2,
            zoom_out_step: 0.8,
            wheel_in_step: 1.4,
            wheel_out_step: 0.7,
            tween: Duration::from_millis(300),

            cull_margin: 100.0,
            dot_spacing: 28.0,
            max_dt: 0.032,
            frame_fast: Duration::from_millis(33),
            frame_slow: Duration::from_millis(100),
            idle_ticks: 30,

            move_epsilon: 0.01,
            click_slop: 3.0,
            undo_limit: 200,

            eraser_radius: 12.0,
            brush_width: 2.5,
            brush_min_step: 0.5,
            annotation_color: Color::WHITE,
            text_size: 14.0,
            min_text_size: 6.0,
            text_resize_factor: 0.25,
            resize_handle: 15.0,

            restore_sessions: true,
        }
    }
}
