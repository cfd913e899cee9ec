use bitflags::bitflags;
use glam::{Mat2, Vec2};
use slab::Slab;

use super::collision::CollisionFilter;
use super::joints::JointId;
use super::proxy::ProxyId;
use crate::core::math::{cross, Aabb};

/// Handle to identify rigid bodies: a slab slot and the generation the
/// body in that slot was stamped with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId(pub(crate) usize, pub(crate) u32);

impl BodyId {
    pub fn index(self) -> usize {
        self.0
    }

    pub fn generation(self) -> u32 {
        self.1
    }

    /// The body this handle names, None once its slot holds another body
    pub(crate) fn resolve(self, bodies: &Slab<Body>) -> Option<&Body> {
        bodies.get(self.0).filter(|body| body.generation == self.1)
    }

    pub(crate) fn resolve_mut(self, bodies: &mut Slab<Body>) -> Option<&mut Body> {
        bodies.get_mut(self.0).filter(|body| body.generation == self.1)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BodyFlags: u16 {
        /// Infinite mass, never integrated
        const STATIC = 0b0000_0001;
        /// Left the world bounds, no longer simulated
        const FROZEN = 0b0000_0010;
        /// Already placed in the island being built
        const ISLAND = 0b0000_0100;
        const SLEEP = 0b0000_1000;
        const ALLOW_SLEEP = 0b0001_0000;
        const FIXED_ROTATION = 0b0010_0000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    /// Completely immovable
    Static,
    /// Affected by gravity, forces and joints
    Dynamic,
}

/// Collision shape, centred on the body origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Box { half_extents: Vec2 },
    Circle { radius: f32 },
}

/// Mass properties of a shape
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MassData {
    pub mass: f32,
    /// Centre of mass relative to the body origin
    pub center: Vec2,
    /// Rotational inertia about the centre of mass
    pub inertia: f32,
}

impl Shape {
    pub fn cuboid(half_width: f32, half_height: f32) -> Self {
        Shape::Box {
            half_extents: Vec2::new(half_width, half_height),
        }
    }

    pub fn ball(radius: f32) -> Self {
        Shape::Circle { radius }
    }

    pub fn area(&self) -> f32 {
        match *self {
            Shape::Box { half_extents } => 4.0 * half_extents.x * half_extents.y,
            Shape::Circle { radius } => std::f32::consts::PI * radius * radius,
        }
    }

    pub fn mass_data(&self, density: f32) -> MassData {
        let mass = density * self.area();
        let inertia = match *self {
            Shape::Box { half_extents } => mass * half_extents.length_squared() / 3.0,
            Shape::Circle { radius } => 0.5 * mass * radius * radius,
        };
        MassData {
            mass,
            center: Vec2::ZERO,
            inertia,
        }
    }

    /// World bounds of the shape placed at `position` with `rotation`
    pub fn compute_aabb(&self, position: Vec2, rotation: Mat2) -> Aabb {
        match *self {
            Shape::Box { half_extents } => {
                let abs = Mat2::from_cols(rotation.x_axis.abs(), rotation.y_axis.abs());
                Aabb::from_center_half_extents(position, abs * half_extents)
            }
            Shape::Circle { radius } => {
                Aabb::from_center_half_extents(position, Vec2::splat(radius))
            }
        }
    }
}

/// Description of a body to create, built in the builder style
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDef {
    pub body_type: BodyType,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub allow_sleep: bool,
    pub is_sleeping: bool,
    pub fixed_rotation: bool,
    pub shape: Shape,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub filter: CollisionFilter,
    pub user_data: Option<u64>,
}

impl BodyDef {
    /// Create a new dynamic body (affected by forces and joints)
    pub fn dynamic(shape: Shape) -> Self {
        Self {
            body_type: BodyType::Dynamic,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            is_sleeping: false,
            fixed_rotation: false,
            shape,
            density: 1.0,
            friction: 0.2,
            restitution: 0.0,
            filter: CollisionFilter::default(),
            user_data: None,
        }
    }

    /// Create a new fixed (static) body (completely immovable)
    pub fn fixed(shape: Shape) -> Self {
        Self {
            body_type: BodyType::Static,
            density: 0.0,
            ..Self::dynamic(shape)
        }
    }

    /// Set the initial position of the body
    pub fn position(mut self, x: f32, y: f32) -> Self {
        self.position = Vec2::new(x, y);
        self
    }

    /// Set the initial rotation (radians)
    pub fn angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn linvel(mut self, x: f32, y: f32) -> Self {
        self.linear_velocity = Vec2::new(x, y);
        self
    }

    /// Set the initial angular velocity (radians per second)
    pub fn angvel(mut self, angvel: f32) -> Self {
        self.angular_velocity = angvel;
        self
    }

    pub fn damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Set whether the body can sleep when inactive
    pub fn can_sleep(mut self, can_sleep: bool) -> Self {
        self.allow_sleep = can_sleep;
        self
    }

    /// Start the body asleep
    pub fn sleeping(mut self, sleeping: bool) -> Self {
        self.is_sleeping = sleeping;
        self
    }

    /// Lock rotation (useful for player characters)
    pub fn lock_rotation(mut self) -> Self {
        self.fixed_rotation = true;
        self
    }

    /// Set density (mass will be calculated from shape area)
    pub fn density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn user_data(mut self, user_data: u64) -> Self {
        self.user_data = Some(user_data);
        self
    }
}

/// A rigid body.
///
/// `origin` is where the shape is placed; `center` is the centre of mass the
/// solver works on. `synchronize_transform` rebuilds the former from the latter.
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) flags: BodyFlags,
    pub(crate) generation: u32,

    pub(crate) origin: Vec2,
    pub(crate) rotation: Mat2,
    pub(crate) center: Vec2,
    pub(crate) angle: f32,
    pub(crate) local_center: Vec2,

    pub(crate) linear_velocity: Vec2,
    pub(crate) angular_velocity: f32,
    pub(crate) force: Vec2,
    pub(crate) torque: f32,

    pub(crate) mass: f32,
    pub(crate) inv_mass: f32,
    pub(crate) inertia: f32,
    pub(crate) inv_inertia: f32,

    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,
    pub(crate) sleep_time: f32,

    shape: Shape,
    density: f32,
    friction: f32,
    restitution: f32,
    filter: CollisionFilter,

    pub(crate) proxy: Option<ProxyId>,
    /// Joints attached to this body
    pub(crate) joints: Vec<JointId>,
    user_data: Option<u64>,
}

impl Body {
    pub fn new(def: &BodyDef) -> Self {
        let mut flags = BodyFlags::empty();
        if def.allow_sleep {
            flags |= BodyFlags::ALLOW_SLEEP;
        }
        if def.is_sleeping {
            flags |= BodyFlags::SLEEP;
        }
        if def.fixed_rotation {
            flags |= BodyFlags::FIXED_ROTATION;
        }

        let rotation = Mat2::from_angle(def.angle);
        let mut body = Self {
            flags,
            generation: 0,
            origin: def.position,
            rotation,
            center: def.position,
            angle: def.angle,
            local_center: Vec2::ZERO,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            force: Vec2::ZERO,
            torque: 0.0,
            mass: 0.0,
            inv_mass: 0.0,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            sleep_time: 0.0,
            shape: def.shape,
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            filter: def.filter,
            proxy: None,
            joints: Vec::new(),
            user_data: def.user_data,
        };

        match def.body_type {
            BodyType::Dynamic => body.set_mass_from_shape(),
            BodyType::Static => body.flags.insert(BodyFlags::STATIC),
        }

        if body.is_static() {
            body.flags.remove(BodyFlags::SLEEP);
        } else {
            body.linear_velocity = def.linear_velocity;
            body.angular_velocity = def.angular_velocity;
        }

        body
    }

    fn set_mass_from_shape(&mut self) {
        let mass_data = self.shape.mass_data(self.density);

        self.mass = mass_data.mass;
        self.inv_mass = if self.mass > 0.0 { 1.0 / self.mass } else { 0.0 };
        self.local_center = mass_data.center;

        if mass_data.inertia > 0.0 && !self.flags.contains(BodyFlags::FIXED_ROTATION) {
            self.inertia = mass_data.inertia;
            self.inv_inertia = 1.0 / self.inertia;
        } else {
            self.inertia = 0.0;
            self.inv_inertia = 0.0;
        }

        self.center = self.origin + self.rotation * self.local_center;

        // Nothing to move: treat as static
        if self.inv_mass == 0.0 && self.inv_inertia == 0.0 {
            self.flags.insert(BodyFlags::STATIC);
        }
    }

    pub fn body_type(&self) -> BodyType {
        if self.is_static() {
            BodyType::Static
        } else {
            BodyType::Dynamic
        }
    }

    pub fn flags(&self) -> BodyFlags {
        self.flags
    }

    /// Body origin in world coordinates
    pub fn position(&self) -> Vec2 {
        self.origin
    }

    /// Rotation in radians
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn rotation(&self) -> Mat2 {
        self.rotation
    }

    pub fn world_center(&self) -> Vec2 {
        self.center
    }

    pub fn local_center(&self) -> Vec2 {
        self.local_center
    }

    pub fn linear_velocity(&self) -> Vec2 {
        self.linear_velocity
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec2) {
        if self.is_static() {
            return;
        }
        self.linear_velocity = velocity;
        self.wake_up();
    }

    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    pub fn set_angular_velocity(&mut self, omega: f32) {
        if self.is_static() {
            return;
        }
        self.angular_velocity = omega;
        self.wake_up();
    }

    /// Accumulate a force applied at a world point, consumed by the next step
    pub fn apply_force(&mut self, force: Vec2, point: Vec2) {
        if self.is_static() {
            return;
        }
        self.wake_up();
        self.force += force;
        self.torque += cross(point - self.center, force);
    }

    pub fn apply_torque(&mut self, torque: f32) {
        if self.is_static() {
            return;
        }
        self.wake_up();
        self.torque += torque;
    }

    /// Immediately change the velocity by an impulse applied at a world point
    pub fn apply_impulse(&mut self, impulse: Vec2, point: Vec2) {
        if self.is_static() {
            return;
        }
        self.wake_up();
        self.linear_velocity += self.inv_mass * impulse;
        self.angular_velocity += self.inv_inertia * cross(point - self.center, impulse);
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn inertia(&self) -> f32 {
        self.inertia
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(BodyFlags::STATIC)
    }

    pub fn is_dynamic(&self) -> bool {
        !self.is_static()
    }

    pub fn is_sleeping(&self) -> bool {
        self.flags.contains(BodyFlags::SLEEP)
    }

    pub fn is_frozen(&self) -> bool {
        self.flags.contains(BodyFlags::FROZEN)
    }

    pub fn allow_sleeping(&mut self, allow: bool) {
        if allow {
            self.flags.insert(BodyFlags::ALLOW_SLEEP);
        } else {
            self.flags.remove(BodyFlags::ALLOW_SLEEP);
            self.wake_up();
        }
    }

    pub fn wake_up(&mut self) {
        self.flags.remove(BodyFlags::SLEEP);
        self.sleep_time = 0.0;
    }

    pub fn put_to_sleep(&mut self) {
        self.flags.insert(BodyFlags::SLEEP);
        self.sleep_time = 0.0;
        self.linear_velocity = Vec2::ZERO;
        self.angular_velocity = 0.0;
        self.force = Vec2::ZERO;
        self.torque = 0.0;
    }

    pub fn world_point(&self, local_point: Vec2) -> Vec2 {
        self.origin + self.rotation * local_point
    }

    pub fn world_vector(&self, local_vector: Vec2) -> Vec2 {
        self.rotation * local_vector
    }

    pub fn local_point(&self, world_point: Vec2) -> Vec2 {
        self.rotation.transpose() * (world_point - self.origin)
    }

    pub fn local_vector(&self, world_vector: Vec2) -> Vec2 {
        self.rotation.transpose() * world_vector
    }

    /// Teleport the body origin. Velocities are kept.
    pub(crate) fn set_transform(&mut self, position: Vec2, angle: f32) {
        self.origin = position;
        self.angle = angle;
        self.rotation = Mat2::from_angle(angle);
        self.center = self.origin + self.rotation * self.local_center;
        self.wake_up();
    }

    /// Rebuild the origin transform from the solver's centre and angle
    pub(crate) fn synchronize_transform(&mut self) {
        self.rotation = Mat2::from_angle(self.angle);
        self.origin = self.center - self.rotation * self.local_center;
    }

    /// Arm from the centre of mass to a local anchor, in world space
    pub(crate) fn anchor_arm(&self, local_anchor: Vec2) -> Vec2 {
        self.rotation * (local_anchor - self.local_center)
    }

    pub fn aabb(&self) -> Aabb {
        self.shape.compute_aabb(self.origin, self.rotation)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn density(&self) -> f32 {
        self.density
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn filter(&self) -> &CollisionFilter {
        &self.filter
    }

    pub fn proxy(&self) -> Option<ProxyId> {
        self.proxy
    }

    /// Joints attached to this body
    pub fn joints(&self) -> &[JointId] {
        &self.joints
    }

    pub fn user_data(&self) -> Option<u64> {
        self.user_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_body_def_dynamic() {
        let body = Body::new(&BodyDef::dynamic(Shape::cuboid(1.0, 2.0)).position(10.0, 20.0).linvel(5.0, 0.0));

        assert_eq!(body.body_type(), BodyType::Dynamic);
        assert_eq!(body.position(), Vec2::new(10.0, 20.0));
        assert_eq!(body.linear_velocity(), Vec2::new(5.0, 0.0));
        assert_relative_eq!(body.mass(), 8.0);
        assert_relative_eq!(body.inertia(), 8.0 * 5.0 / 3.0);
    }

    #[test]
    fn test_body_def_fixed() {
        let body = Body::new(&BodyDef::fixed(Shape::cuboid(5.0, 1.0)).linvel(3.0, 0.0));

        assert!(body.is_static());
        assert_eq!(body.mass(), 0.0);
        assert_eq!(body.linear_velocity(), Vec2::ZERO, "static bodies ignore velocity");
    }

    #[test]
    fn test_zero_density_dynamic_becomes_static() {
        let body = Body::new(&BodyDef::dynamic(Shape::ball(1.0)).density(0.0));
        assert!(body.is_static());
    }

    #[test]
    fn test_lock_rotation() {
        let body = Body::new(&BodyDef::dynamic(Shape::ball(1.0)).lock_rotation());
        assert_eq!(body.inv_inertia, 0.0);
        assert!(body.inv_mass > 0.0);
    }

    #[test]
    fn test_local_world_roundtrip() {
        let body = Body::new(
            &BodyDef::dynamic(Shape::ball(1.0))
                .position(3.0, -2.0)
                .angle(std::f32::consts::FRAC_PI_2),
        );

        let world = body.world_point(Vec2::new(1.0, 0.0));
        assert_relative_eq!(world.x, 3.0, epsilon = 1e-5);
        assert_relative_eq!(world.y, -1.0, epsilon = 1e-5);

        let local = body.local_point(world);
        assert_relative_eq!(local.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(local.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_rotated_box_aabb() {
        let body = Body::new(
            &BodyDef::dynamic(Shape::cuboid(2.0, 1.0)).angle(std::f32::consts::FRAC_PI_2),
        );
        let aabb = body.aabb();
        assert_relative_eq!(aabb.upper.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(aabb.upper.y, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_impulse_wakes_and_spins() {
        let mut body = Body::new(&BodyDef::dynamic(Shape::ball(1.0)).sleeping(true));
        assert!(body.is_sleeping());

        body.apply_impulse(Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0));
        assert!(!body.is_sleeping());
        assert!(body.linear_velocity().y > 0.0);
        assert!(body.angular_velocity() > 0.0);
    }
}
