// Body component: one shape definition bound to one simulated body

use glam::Vec2;
use log::{debug, warn};

use super::host::HostObject;
use super::shape::{BoxShape, CircleShape, ShapeDefinition};
use crate::core::math::Aabb;
use crate::engine::physics::{BodyDef, BodyId, CollisionFilter, PhysicsError, Shape, Simulation};
use crate::engine::render::{self, RenderContext};

/// Puts a host object into the simulation as a rigid body.
///
/// Material and shape setters only affect the next `start_simulation`;
/// a running body keeps what it was created with.
#[derive(Debug, Clone)]
pub struct BodyComponent<S: ShapeDefinition> {
    name: String,
    shape: S,
    position: Vec2,
    /// Degrees
    rotation: f32,
    density: f32,
    friction: f32,
    restitution: f32,
    is_static: bool,
    filter: CollisionFilter,
    body: Option<BodyId>,
}

impl<S: ShapeDefinition> BodyComponent<S> {
    pub fn new(name: &str, shape: S) -> Self {
        Self {
            name: name.to_string(),
            shape,
            position: Vec2::ZERO,
            rotation: 0.0,
            density: 1.0,
            friction: 0.2,
            restitution: 0.0,
            is_static: false,
            filter: CollisionFilter::default(),
            body: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create the body. Does nothing when already simulating.
    pub fn start_simulation(&mut self, sim: &mut Simulation) -> Result<BodyId, PhysicsError> {
        if let Some(id) = self.body {
            if sim.body(id).is_some() {
                return Ok(id);
            }
            warn!("Body component '{}' lost {:?}, recreating it", self.name, id);
            self.body = None;
        }

        let def = if self.is_static {
            BodyDef::fixed(self.shape.shape())
        } else {
            BodyDef::dynamic(self.shape.shape()).density(self.density)
        };
        let def = def
            .position(self.position.x, self.position.y)
            .angle(self.rotation.to_radians())
            .friction(self.friction)
            .restitution(self.restitution)
            .filter(self.filter);

        let id = sim.add_body(def)?;
        self.body = Some(id);
        debug!("Body component '{}' started as {:?}", self.name, id);
        Ok(id)
    }

    /// Remove the body. Its last transform is kept as the spawn point.
    pub fn stop_simulation(&mut self, sim: &mut Simulation) {
        let Some(id) = self.body.take() else {
            return;
        };

        match sim.remove_body(id) {
            Ok(body) => {
                self.position = body.position();
                self.rotation = body.angle().to_degrees();
                debug!("Body component '{}' stopped", self.name);
            }
            Err(err) => warn!("Body component '{}' lost its body: {}", self.name, err),
        }
    }

    /// Is the body this component created still in `sim`
    pub fn is_simulating(&self, sim: &Simulation) -> bool {
        self.body.is_some_and(|id| sim.body(id).is_some())
    }

    pub fn body(&self) -> Option<BodyId> {
        self.body
    }

    pub fn shape(&self) -> &S {
        &self.shape
    }

    /// Physical centre, as of the last `update` while simulating
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Move the body. A running body is teleported.
    pub fn set_position(&mut self, sim: &mut Simulation, position: Vec2) -> Result<(), PhysicsError> {
        self.position = position;
        self.apply_transform(sim)
    }

    /// Degrees
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn set_rotation(&mut self, sim: &mut Simulation, degrees: f32) -> Result<(), PhysicsError> {
        self.rotation = degrees;
        self.apply_transform(sim)
    }

    fn apply_transform(&self, sim: &mut Simulation) -> Result<(), PhysicsError> {
        match self.body {
            Some(id) => sim.set_body_transform(id, self.position, self.rotation.to_radians()),
            None => Ok(()),
        }
    }

    pub fn density(&self) -> f32 {
        self.density
    }

    pub fn set_density(&mut self, density: f32) {
        self.density = density;
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn set_static(&mut self, is_static: bool) {
        self.is_static = is_static;
    }

    pub fn filter(&self) -> CollisionFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: CollisionFilter) {
        self.filter = filter;
    }

    pub fn local_origin(&self) -> Vec2 {
        self.shape.local_origin()
    }

    pub fn bounding_box(&self) -> Aabb {
        self.shape.bounding_box()
    }

    /// Pull the body transform and copy it onto the host
    pub fn update(&mut self, sim: &Simulation, host: &mut dyn HostObject) {
        if let Some(body) = self.body.and_then(|id| sim.body(id)) {
            self.position = body.position();
            self.rotation = body.angle().to_degrees();
        }

        host.set_position(self.position - self.shape.local_origin());
        host.set_rotation(self.rotation);
    }

    /// Outline the body when debug mode is on
    pub fn debug_draw(&self, sim: &Simulation, ctx: &mut dyn RenderContext) {
        if !render::debug_mode() {
            return;
        }
        let Some(body) = self.body.and_then(|id| sim.body(id)) else {
            return;
        };

        match *body.shape() {
            Shape::Circle { radius } => ctx.draw_circle(body.position(), radius, render::GREEN),
            Shape::Box { .. } => {
                let aabb = body.aabb();
                ctx.draw_rectangle(aabb.lower, aabb.upper, render::GREEN);
            }
        }
    }
}

impl BodyComponent<BoxShape> {
    /// Full width and height
    pub fn extents(&self) -> Vec2 {
        self.shape.extents
    }

    /// Recorded for the next start; a running body keeps its shape
    pub fn set_extents(&mut self, width: f32, height: f32) {
        self.shape.extents = Vec2::new(width, height);
    }
}

impl BodyComponent<CircleShape> {
    pub fn radius(&self) -> f32 {
        self.shape.radius
    }

    /// Recorded for the next start; a running body keeps its shape
    pub fn set_radius(&mut self, radius: f32) {
        self.shape.radius = radius;
    }
}
