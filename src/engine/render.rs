// Drawing interface for debug overlays and the global debug switch

use std::sync::atomic::{AtomicBool, Ordering};

use glam::Vec2;

/// Linear RGBA
pub type Color = [f32; 4];

pub const WHITE: Color = [1.0, 1.0, 1.0, 0.8];
pub const GRAY: Color = [0.5, 0.5, 0.5, 0.8];
pub const GREEN: Color = [0.0, 1.0, 0.0, 0.8];
pub const BLUE: Color = [0.0, 0.5, 1.0, 0.8];
pub const RED: Color = [1.0, 0.2, 0.2, 0.8];
pub const YELLOW: Color = [1.0, 1.0, 0.0, 0.8];

static DEBUG_MODE: AtomicBool = AtomicBool::new(false);

/// Turn debug overlays on or off for every component
pub fn set_debug_mode(enabled: bool) {
    DEBUG_MODE.store(enabled, Ordering::Relaxed);
}

pub fn debug_mode() -> bool {
    DEBUG_MODE.load(Ordering::Relaxed)
}

/// Something that can draw world-space outlines
pub trait RenderContext {
    fn draw_line(&mut self, from: Vec2, to: Vec2, color: Color);

    /// Arc around `center`, angles in radians counter-clockwise from +X
    fn draw_arc(&mut self, center: Vec2, radius: f32, start_angle: f32, end_angle: f32, color: Color);

    /// Axis-aligned rectangle outline
    fn draw_rectangle(&mut self, min: Vec2, max: Vec2, color: Color);

    fn draw_circle(&mut self, center: Vec2, radius: f32, color: Color) {
        self.draw_arc(center, radius, 0.0, std::f32::consts::TAU, color);
    }
}
