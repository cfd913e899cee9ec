// Host objects: the scene-side owners that components attach to

use glam::Vec2;

use crate::core::math::Aabb;

/// A scene object that body components write their transform back into
pub trait HostObject {
    /// Render origin, which sits at the shape's lower corner
    fn position(&self) -> Vec2;

    fn set_position(&mut self, position: Vec2);

    /// Rotation in degrees
    fn rotation(&self) -> f32;

    fn set_rotation(&mut self, degrees: f32);

    /// World bounds, when the object knows its size
    fn bounding_box(&self) -> Option<Aabb> {
        None
    }
}

/// Plain scene object with an optional size
#[derive(Debug, Clone, PartialEq)]
pub struct GameObject {
    pub name: String,
    position: Vec2,
    rotation: f32,
    size: Option<Vec2>,
}

impl GameObject {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            position: Vec2::ZERO,
            rotation: 0.0,
            size: None,
        }
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.size = Some(Vec2::new(width, height));
        self
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Vec2::new(x, y);
        self
    }

    pub fn size(&self) -> Option<Vec2> {
        self.size
    }
}

impl HostObject for GameObject {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    fn rotation(&self) -> f32 {
        self.rotation
    }

    fn set_rotation(&mut self, degrees: f32) {
        self.rotation = degrees;
    }

    fn bounding_box(&self) -> Option<Aabb> {
        self.size
            .map(|size| Aabb::from_origin_size(self.position, size))
    }
}
