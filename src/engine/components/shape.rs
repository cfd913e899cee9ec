// Shape definitions held by body components

use glam::Vec2;

use crate::core::math::Aabb;
use crate::engine::physics::Shape;

/// What a body component needs to know about its shape
pub trait ShapeDefinition: Clone + std::fmt::Debug {
    /// Collision shape handed to the simulation
    fn shape(&self) -> Shape;

    /// Offset from the render origin to the physical centre
    fn local_origin(&self) -> Vec2;

    /// Local bounds with the render origin at (0, 0)
    fn bounding_box(&self) -> Aabb;
}

/// Rectangle given by its full width and height
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxShape {
    pub extents: Vec2,
}

impl BoxShape {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            extents: Vec2::new(width, height),
        }
    }
}

impl ShapeDefinition for BoxShape {
    fn shape(&self) -> Shape {
        Shape::cuboid(self.extents.x * 0.5, self.extents.y * 0.5)
    }

    fn local_origin(&self) -> Vec2 {
        self.extents * 0.5
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::from_origin_size(Vec2::ZERO, self.extents)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleShape {
    pub radius: f32,
}

impl CircleShape {
    pub fn new(radius: f32) -> Self {
        Self { radius }
    }
}

impl ShapeDefinition for CircleShape {
    fn shape(&self) -> Shape {
        Shape::ball(self.radius)
    }

    fn local_origin(&self) -> Vec2 {
        Vec2::splat(self.radius)
    }

    fn bounding_box(&self) -> Aabb {
        Aabb::from_origin_size(Vec2::ZERO, Vec2::splat(2.0 * self.radius))
    }
}
