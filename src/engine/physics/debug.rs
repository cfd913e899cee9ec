use std::f32::consts::TAU;

use glam::{Mat2, Vec2};

use super::body::{Body, Shape};
use super::joints::JointKind;
use super::world::Simulation;
use crate::engine::render::{self, Color, RenderContext};

/// Segments in a full circle
const SEGMENTS: usize = 16;

/// Line-list vertex, laid out for direct upload to a vertex buffer
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DebugVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

/// Debug renderer for physics objects.
/// Collects body outlines and joint lines as an indexed line list.
pub struct DebugRenderer {
    vertices: Vec<DebugVertex>,
    indices: Vec<u16>,
    enabled: bool,
}

impl DebugRenderer {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            enabled: false, // Disabled by default
        }
    }

    /// Enable or disable debug rendering
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Check if debug rendering is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    pub fn vertices(&self) -> &[DebugVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Vertex data as raw bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn line_count(&self) -> usize {
        self.indices.len() / 2
    }

    /// Rebuild the geometry for every body and joint in the simulation
    pub fn prepare(&mut self, sim: &Simulation) {
        if !self.enabled {
            return;
        }

        self.clear();

        for (_, body) in sim.bodies() {
            self.draw_body(body, body_color(body));
        }

        for (_, joint) in sim.joints() {
            let (Some(b1), Some(b2)) = (sim.body(joint.body1()), sim.body(joint.body2())) else {
                continue;
            };
            let anchor1 = joint.anchor1(b1);
            let anchor2 = joint.anchor2(b2);

            match joint.kind() {
                JointKind::Pulley(pulley) => {
                    self.draw_line(pulley.ground_anchor1(), anchor1, render::YELLOW);
                    self.draw_line(pulley.ground_anchor2(), anchor2, render::YELLOW);
                    self.draw_line(pulley.ground_anchor1(), pulley.ground_anchor2(), render::YELLOW);
                }
                JointKind::Mouse(_) => {
                    self.draw_cross(anchor1, 0.25, render::YELLOW);
                    self.draw_line(anchor1, anchor2, render::YELLOW);
                }
                _ => {
                    self.draw_line(b1.position(), anchor1, render::YELLOW);
                    self.draw_line(anchor1, anchor2, render::YELLOW);
                    self.draw_line(b2.position(), anchor2, render::YELLOW);
                }
            }
        }

        log::trace!("Prepared {} debug lines", self.line_count());
    }

    fn draw_body(&mut self, body: &Body, color: Color) {
        match *body.shape() {
            Shape::Circle { radius } => {
                self.draw_circle(body.position(), radius, color);
                // Radius line to show rotation
                let spoke = body.world_point(Vec2::new(radius, 0.0));
                self.draw_line(body.position(), spoke, color);
            }
            Shape::Box { half_extents } => {
                self.draw_box(body.position(), body.rotation(), half_extents, color);
            }
        }
    }

    /// Draw a rotated box
    fn draw_box(&mut self, origin: Vec2, rotation: Mat2, half_extents: Vec2, color: Color) {
        let corners = [
            Vec2::new(-half_extents.x, -half_extents.y),
            Vec2::new(half_extents.x, -half_extents.y),
            Vec2::new(half_extents.x, half_extents.y),
            Vec2::new(-half_extents.x, half_extents.y),
        ]
        .map(|corner| origin + rotation * corner);

        self.draw_polygon(&corners, color);
    }

    /// Draw a cross
    fn draw_cross(&mut self, center: Vec2, size: f32, color: Color) {
        self.draw_line(center - Vec2::X * size, center + Vec2::X * size, color);
        self.draw_line(center - Vec2::Y * size, center + Vec2::Y * size, color);
    }

    /// Closed outline through `points`
    fn draw_polygon(&mut self, points: &[Vec2], color: Color) {
        let Some(start_idx) = self.reserve(points.len()) else { return };

        for point in points {
            self.vertices.push(DebugVertex {
                position: point.to_array(),
                color,
            });
        }

        let count = points.len() as u16;
        for i in 0..count {
            self.indices.push(start_idx + i);
            self.indices.push(start_idx + (i + 1) % count);
        }
    }

    /// First index of `count` new vertices, or None when the u16 index space is used up
    fn reserve(&self, count: usize) -> Option<u16> {
        let start = self.vertices.len();
        if start + count > u16::MAX as usize {
            log::warn!("Debug geometry is full, dropping {} vertices", count);
            return None;
        }
        Some(start as u16)
    }
}

impl Default for DebugRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContext for DebugRenderer {
    fn draw_line(&mut self, from: Vec2, to: Vec2, color: Color) {
        let Some(start_idx) = self.reserve(2) else { return };

        self.vertices.push(DebugVertex {
            position: from.to_array(),
            color,
        });
        self.vertices.push(DebugVertex {
            position: to.to_array(),
            color,
        });
        self.indices.push(start_idx);
        self.indices.push(start_idx + 1);
    }

    fn draw_arc(&mut self, center: Vec2, radius: f32, start_angle: f32, end_angle: f32, color: Color) {
        let sweep = end_angle - start_angle;
        let segments = ((sweep.abs() / TAU * SEGMENTS as f32).ceil() as usize).max(1);

        if (sweep.abs() - TAU).abs() < f32::EPSILON {
            let points: Vec<Vec2> = (0..segments)
                .map(|i| center + radius * Vec2::from_angle(start_angle + sweep * i as f32 / segments as f32))
                .collect();
            self.draw_polygon(&points, color);
            return;
        }

        let Some(start_idx) = self.reserve(segments + 1) else { return };
        for i in 0..=segments {
            let angle = start_angle + sweep * i as f32 / segments as f32;
            self.vertices.push(DebugVertex {
                position: (center + radius * Vec2::from_angle(angle)).to_array(),
                color,
            });
        }
        for i in 0..segments as u16 {
            self.indices.push(start_idx + i);
            self.indices.push(start_idx + i + 1);
        }
    }

    fn draw_rectangle(&mut self, min: Vec2, max: Vec2, color: Color) {
        self.draw_box((min + max) * 0.5, Mat2::IDENTITY, (max - min) * 0.5, color);
    }
}

/// Color based on body state
fn body_color(body: &Body) -> Color {
    if body.is_frozen() {
        render::RED
    } else if body.is_static() {
        render::GRAY // Gray for static
    } else if body.is_sleeping() {
        render::BLUE
    } else {
        render::GREEN // Green for awake dynamic bodies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::physics::body::BodyDef;
    use crate::engine::physics::joints::{DistanceJointDef, JointDef};

    #[test]
    fn test_disabled_renderer_draws_nothing() {
        let mut sim = Simulation::default();
        sim.add_body(BodyDef::dynamic(Shape::ball(1.0))).unwrap();

        let mut renderer = DebugRenderer::new();
        renderer.prepare(&sim);
        assert!(renderer.vertices().is_empty());
    }

    #[test]
    fn test_bodies_and_joints_become_lines() {
        let mut sim = Simulation::default();
        let ground = sim.add_body(BodyDef::fixed(Shape::cuboid(5.0, 0.5))).unwrap();
        let ball = sim
            .add_body(BodyDef::dynamic(Shape::ball(0.5)).position(0.0, 3.0))
            .unwrap();

        let mut def = DistanceJointDef::default();
        def.initialize(
            sim.body(ground).unwrap(),
            sim.body(ball).unwrap(),
            Vec2::ZERO,
            Vec2::new(0.0, 3.0),
        );
        sim.add_joint(JointDef::from(def).bodies(ground, ball)).unwrap();

        let mut renderer = DebugRenderer::new();
        renderer.set_enabled(true);
        renderer.prepare(&sim);

        // Box outline, circle plus spoke, three joint lines
        assert_eq!(renderer.line_count(), 4 + SEGMENTS + 1 + 3);
        assert_eq!(renderer.vertices()[0].color, render::GRAY);
        assert_eq!(
            renderer.vertex_bytes().len(),
            renderer.vertices().len() * std::mem::size_of::<DebugVertex>()
        );
        assert_eq!(renderer.index_bytes().len(), renderer.indices().len() * 2);

        renderer.prepare(&sim);
        assert_eq!(renderer.line_count(), 4 + SEGMENTS + 1 + 3, "Prepare should start from scratch");
    }

    #[test]
    fn test_half_arc_is_open() {
        let mut renderer = DebugRenderer::new();
        renderer.draw_arc(Vec2::ZERO, 1.0, 0.0, TAU / 2.0, render::WHITE);

        assert_eq!(renderer.line_count(), SEGMENTS / 2);
        assert_eq!(renderer.vertices().len(), SEGMENTS / 2 + 1);
        let last = renderer.vertices().last().unwrap().position;
        assert!((last[0] + 1.0).abs() < 1e-5 && last[1].abs() < 1e-5);
    }

    #[test]
    fn test_rectangle_has_four_edges() {
        let mut renderer = DebugRenderer::new();
        renderer.draw_rectangle(Vec2::ZERO, Vec2::new(2.0, 1.0), render::WHITE);

        assert_eq!(renderer.line_count(), 4);
        assert_eq!(renderer.vertices()[0].position, [0.0, 0.0]);
        assert_eq!(renderer.vertices()[2].position, [2.0, 1.0]);
    }
}
