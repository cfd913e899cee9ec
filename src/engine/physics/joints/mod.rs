// Joints: definitions, the type-dispatching factory and the solver contract

mod distance;
mod gear;
mod mouse;
mod prismatic;
mod pulley;
mod revolute;

pub use distance::{DistanceJoint, DistanceJointDef};
pub use gear::{GearJoint, GearJointDef};
pub use mouse::{MouseJoint, MouseJointDef};
pub use prismatic::{PrismaticJoint, PrismaticJointDef};
pub use pulley::{PulleyJoint, PulleyJointDef};
pub use revolute::{RevoluteJoint, RevoluteJointDef};

use glam::Vec2;
use slab::Slab;

use super::body::{Body, BodyId};
use super::island::TimeStep;
use super::PhysicsError;

/// Handle to identify joints: a slab slot and the joint's generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JointId(pub(crate) usize, pub(crate) u32);

impl JointId {
    pub fn index(self) -> usize {
        self.0
    }

    pub fn generation(self) -> u32 {
        self.1
    }

    /// The joint this handle names, None once its slot holds another joint
    pub(crate) fn resolve(self, joints: &Slab<Joint>) -> Option<&Joint> {
        joints.get(self.0).filter(|joint| joint.generation == self.1)
    }

    pub(crate) fn resolve_mut(self, joints: &mut Slab<Joint>) -> Option<&mut Joint> {
        joints.get_mut(self.0).filter(|joint| joint.generation == self.1)
    }
}

/// Numeric joint type tags
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointType {
    Unknown = 0,
    Revolute = 1,
    Prismatic = 2,
    Distance = 3,
    Pulley = 4,
    Mouse = 5,
    Gear = 6,
}

impl TryFrom<u8> for JointType {
    type Error = PhysicsError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(JointType::Unknown),
            1 => Ok(JointType::Revolute),
            2 => Ok(JointType::Prismatic),
            3 => Ok(JointType::Distance),
            4 => Ok(JointType::Pulley),
            5 => Ok(JointType::Mouse),
            6 => Ok(JointType::Gear),
            other => Err(PhysicsError::UnknownJointType(other)),
        }
    }
}

/// Which side of a limit a joint is pressed against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitState {
    #[default]
    Inactive,
    AtLower,
    AtUpper,
    /// Lower and upper limits coincide
    Equal,
}

/// A 1D constraint row: the velocity map of both bodies onto one scalar
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Jacobian {
    pub linear1: Vec2,
    pub angular1: f32,
    pub linear2: Vec2,
    pub angular2: f32,
}

impl Jacobian {
    pub fn set(&mut self, linear1: Vec2, angular1: f32, linear2: Vec2, angular2: f32) {
        *self = Self {
            linear1,
            angular1,
            linear2,
            angular2,
        };
    }

    pub fn set_zero(&mut self) {
        *self = Self::default();
    }

    pub fn compute(&self, v1: Vec2, w1: f32, v2: Vec2, w2: f32) -> f32 {
        self.linear1.dot(v1) + self.angular1 * w1 + self.linear2.dot(v2) + self.angular2 * w2
    }

    /// Effective inverse mass of the row for the two bodies
    pub(crate) fn inv_mass(&self, b1: &Body, b2: &Body) -> f32 {
        b1.inv_mass * self.linear1.length_squared()
            + b1.inv_inertia * self.angular1 * self.angular1
            + b2.inv_mass * self.linear2.length_squared()
            + b2.inv_inertia * self.angular2 * self.angular2
    }
}

/// Invert an effective mass, zero when nothing can move
#[inline]
pub(crate) fn effective_mass(inv_mass: f32) -> f32 {
    if inv_mass > 0.0 {
        1.0 / inv_mass
    } else {
        0.0
    }
}

/// Kind-specific part of a joint definition
#[derive(Debug, Clone, PartialEq)]
pub enum JointDefKind {
    Revolute(RevoluteJointDef),
    Prismatic(PrismaticJointDef),
    Distance(DistanceJointDef),
    Pulley(PulleyJointDef),
    Mouse(MouseJointDef),
    Gear(GearJointDef),
}

/// Everything needed to create a joint.
///
/// The definition is a plain value: the joint copies what it needs and the
/// definition can be dropped or reused afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct JointDef {
    pub body1: Option<BodyId>,
    pub body2: Option<BodyId>,
    /// Should the two connected bodies still collide with each other
    pub collide_connected: bool,
    pub user_data: Option<u64>,
    pub kind: JointDefKind,
}

impl JointDef {
    fn with_kind(kind: JointDefKind) -> Self {
        Self {
            body1: None,
            body2: None,
            collide_connected: false,
            user_data: None,
            kind,
        }
    }

    /// Default definition for a type tag
    pub fn for_type(joint_type: JointType) -> Result<Self, PhysicsError> {
        match joint_type {
            JointType::Revolute => Ok(RevoluteJointDef::default().into()),
            JointType::Prismatic => Ok(PrismaticJointDef::default().into()),
            JointType::Distance => Ok(DistanceJointDef::default().into()),
            JointType::Pulley => Ok(PulleyJointDef::default().into()),
            JointType::Mouse => Ok(MouseJointDef::default().into()),
            JointType::Gear => Ok(GearJointDef::default().into()),
            JointType::Unknown => Err(PhysicsError::UnknownJointType(JointType::Unknown as u8)),
        }
    }

    pub fn joint_type(&self) -> JointType {
        match self.kind {
            JointDefKind::Revolute(_) => JointType::Revolute,
            JointDefKind::Prismatic(_) => JointType::Prismatic,
            JointDefKind::Distance(_) => JointType::Distance,
            JointDefKind::Pulley(_) => JointType::Pulley,
            JointDefKind::Mouse(_) => JointType::Mouse,
            JointDefKind::Gear(_) => JointType::Gear,
        }
    }

    /// Attach the definition to two bodies
    pub fn bodies(mut self, body1: BodyId, body2: BodyId) -> Self {
        self.body1 = Some(body1);
        self.body2 = Some(body2);
        self
    }

    pub fn collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }

    pub fn user_data(mut self, user_data: u64) -> Self {
        self.user_data = Some(user_data);
        self
    }
}

impl From<RevoluteJointDef> for JointDef {
    fn from(def: RevoluteJointDef) -> Self {
        Self::with_kind(JointDefKind::Revolute(def))
    }
}

impl From<PrismaticJointDef> for JointDef {
    fn from(def: PrismaticJointDef) -> Self {
        Self::with_kind(JointDefKind::Prismatic(def))
    }
}

impl From<DistanceJointDef> for JointDef {
    fn from(def: DistanceJointDef) -> Self {
        Self::with_kind(JointDefKind::Distance(def))
    }
}

impl From<PulleyJointDef> for JointDef {
    /// Bodies hanging off the same pulley collide by default
    fn from(def: PulleyJointDef) -> Self {
        Self {
            collide_connected: true,
            ..Self::with_kind(JointDefKind::Pulley(def))
        }
    }
}

impl From<MouseJointDef> for JointDef {
    fn from(def: MouseJointDef) -> Self {
        Self::with_kind(JointDefKind::Mouse(def))
    }
}

impl From<GearJointDef> for JointDef {
    fn from(def: GearJointDef) -> Self {
        Self::with_kind(JointDefKind::Gear(def))
    }
}

/// Live constraint state, one variant per joint kind
#[derive(Debug, Clone)]
pub enum JointKind {
    Revolute(RevoluteJoint),
    Prismatic(PrismaticJoint),
    Distance(DistanceJoint),
    Pulley(PulleyJoint),
    Mouse(MouseJoint),
    Gear(GearJoint),
}

/// A constraint between two bodies.
///
/// The joint refers to its bodies by id and never owns them. The simulation
/// destroys a joint before either of its bodies.
#[derive(Debug, Clone)]
pub struct Joint {
    kind: JointKind,
    body1: BodyId,
    body2: BodyId,
    collide_connected: bool,
    pub(crate) island_flag: bool,
    pub(crate) generation: u32,
    user_data: Option<u64>,
}

impl Joint {
    /// Build a joint from its definition.
    ///
    /// Fails without side effects when a body is missing, both ends are the
    /// same body, or the kind-specific data is unusable.
    pub fn create(
        def: &JointDef,
        bodies: &Slab<Body>,
        joints: &Slab<Joint>,
    ) -> Result<Self, PhysicsError> {
        let (id1, id2) = match &def.kind {
            JointDefKind::Gear(gear_def) => gear::resolve_bodies(def, gear_def, joints)?,
            _ => (
                def.body1.ok_or(PhysicsError::MissingBody)?,
                def.body2.ok_or(PhysicsError::MissingBody)?,
            ),
        };

        if id1 == id2 {
            return Err(PhysicsError::SameBody);
        }

        if id1.resolve(bodies).is_none() {
            return Err(PhysicsError::MissingBody);
        }
        let b2 = id2.resolve(bodies).ok_or(PhysicsError::MissingBody)?;

        let kind = match &def.kind {
            JointDefKind::Revolute(d) => JointKind::Revolute(RevoluteJoint::new(d)),
            JointDefKind::Prismatic(d) => JointKind::Prismatic(PrismaticJoint::new(d)),
            JointDefKind::Distance(d) => JointKind::Distance(DistanceJoint::new(d)),
            JointDefKind::Pulley(d) => JointKind::Pulley(PulleyJoint::new(d)?),
            JointDefKind::Mouse(d) => JointKind::Mouse(MouseJoint::new(d, b2)),
            JointDefKind::Gear(d) => JointKind::Gear(GearJoint::new(d, bodies, joints)?),
        };

        log::trace!("Built {:?} joint between {:?} and {:?}", def.joint_type(), id1, id2);

        Ok(Self {
            kind,
            body1: id1,
            body2: id2,
            collide_connected: def.collide_connected,
            island_flag: false,
            generation: 0,
            user_data: def.user_data,
        })
    }

    pub fn joint_type(&self) -> JointType {
        match self.kind {
            JointKind::Revolute(_) => JointType::Revolute,
            JointKind::Prismatic(_) => JointType::Prismatic,
            JointKind::Distance(_) => JointType::Distance,
            JointKind::Pulley(_) => JointType::Pulley,
            JointKind::Mouse(_) => JointType::Mouse,
            JointKind::Gear(_) => JointType::Gear,
        }
    }

    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut JointKind {
        &mut self.kind
    }

    pub fn body1(&self) -> BodyId {
        self.body1
    }

    pub fn body2(&self) -> BodyId {
        self.body2
    }

    /// The body on the other end from `body`
    pub fn other(&self, body: BodyId) -> BodyId {
        if body == self.body1 {
            self.body2
        } else {
            self.body1
        }
    }

    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    pub fn user_data(&self) -> Option<u64> {
        self.user_data
    }

    /// Does this joint depend on `joint` staying alive
    pub fn references(&self, joint: JointId) -> bool {
        match &self.kind {
            JointKind::Gear(gear) => gear.joint1() == joint || gear.joint2() == joint,
            _ => false,
        }
    }

    /// World anchor on body1
    pub fn anchor1(&self, b1: &Body) -> Vec2 {
        match &self.kind {
            JointKind::Revolute(j) => b1.world_point(j.local_anchor1()),
            JointKind::Prismatic(j) => b1.world_point(j.local_anchor1()),
            JointKind::Distance(j) => b1.world_point(j.local_anchor1()),
            JointKind::Pulley(j) => b1.world_point(j.local_anchor1()),
            JointKind::Mouse(j) => j.target(),
            JointKind::Gear(j) => b1.world_point(j.local_anchor1()),
        }
    }

    /// World anchor on body2
    pub fn anchor2(&self, b2: &Body) -> Vec2 {
        match &self.kind {
            JointKind::Revolute(j) => b2.world_point(j.local_anchor2()),
            JointKind::Prismatic(j) => b2.world_point(j.local_anchor2()),
            JointKind::Distance(j) => b2.world_point(j.local_anchor2()),
            JointKind::Pulley(j) => b2.world_point(j.local_anchor2()),
            JointKind::Mouse(j) => b2.world_point(j.local_anchor()),
            JointKind::Gear(j) => b2.world_point(j.local_anchor2()),
        }
    }

    /// Compute Jacobians and effective masses and rescale the accumulated
    /// impulses for this step. Reads the bodies only.
    pub fn init_velocity_constraints(&mut self, step: &TimeStep, b1: &Body, b2: &Body) {
        match &mut self.kind {
            JointKind::Revolute(j) => j.init_velocity_constraints(step, b1, b2),
            JointKind::Prismatic(j) => j.init_velocity_constraints(step, b1, b2),
            JointKind::Distance(j) => j.init_velocity_constraints(step, b1, b2),
            JointKind::Pulley(j) => j.init_velocity_constraints(step, b1, b2),
            JointKind::Mouse(j) => j.init_velocity_constraints(step, b2),
            JointKind::Gear(j) => j.init_velocity_constraints(step, b1, b2),
        }
    }

    /// Apply the impulses carried over from the previous step. Runs after
    /// every joint in the island is initialized, before the first velocity
    /// iteration.
    pub fn warm_start(&self, b1: &mut Body, b2: &mut Body) {
        match &self.kind {
            JointKind::Revolute(j) => j.warm_start(b1, b2),
            JointKind::Prismatic(j) => j.warm_start(b1, b2),
            JointKind::Distance(j) => j.warm_start(b1, b2),
            JointKind::Pulley(j) => j.warm_start(b1, b2),
            JointKind::Mouse(j) => j.warm_start(b2),
            JointKind::Gear(j) => j.warm_start(b1, b2),
        }
    }

    /// One velocity iteration
    pub fn solve_velocity_constraints(&mut self, step: &TimeStep, b1: &mut Body, b2: &mut Body) {
        match &mut self.kind {
            JointKind::Revolute(j) => j.solve_velocity_constraints(step, b1, b2),
            JointKind::Prismatic(j) => j.solve_velocity_constraints(step, b1, b2),
            JointKind::Distance(j) => j.solve_velocity_constraints(b1, b2),
            JointKind::Pulley(j) => j.solve_velocity_constraints(b1, b2),
            JointKind::Mouse(j) => j.solve_velocity_constraints(step, b2),
            JointKind::Gear(j) => j.solve_velocity_constraints(b1, b2),
        }
    }

    /// Reset accumulated position impulses before the position iterations
    pub fn init_position_constraints(&mut self) {
        match &mut self.kind {
            JointKind::Revolute(j) => j.init_position_constraints(),
            JointKind::Prismatic(j) => j.init_position_constraints(),
            JointKind::Pulley(j) => j.init_position_constraints(),
            JointKind::Distance(_) | JointKind::Mouse(_) | JointKind::Gear(_) => {}
        }
    }

    /// One position iteration. Returns true when the joint is within tolerance.
    pub fn solve_position_constraints(&mut self, b1: &mut Body, b2: &mut Body) -> bool {
        match &mut self.kind {
            JointKind::Revolute(j) => j.solve_position_constraints(b1, b2),
            JointKind::Prismatic(j) => j.solve_position_constraints(b1, b2),
            JointKind::Distance(j) => j.solve_position_constraints(b1, b2),
            JointKind::Pulley(j) => j.solve_position_constraints(b1, b2),
            JointKind::Mouse(_) => true,
            JointKind::Gear(j) => j.solve_position_constraints(b1, b2),
        }
    }
}

/// `as_<kind>` / `as_<kind>_mut` views of a joint's variant state
macro_rules! variant_accessors {
    ($($variant:ident($ty:ty) => $get:ident, $get_mut:ident;)*) => {
        impl Joint {
            $(
                pub fn $get(&self) -> Option<&$ty> {
                    match &self.kind {
                        JointKind::$variant(j) => Some(j),
                        _ => None,
                    }
                }

                pub fn $get_mut(&mut self) -> Option<&mut $ty> {
                    match &mut self.kind {
                        JointKind::$variant(j) => Some(j),
                        _ => None,
                    }
                }
            )*
        }
    };
}

variant_accessors! {
    Revolute(RevoluteJoint) => as_revolute, as_revolute_mut;
    Prismatic(PrismaticJoint) => as_prismatic, as_prismatic_mut;
    Distance(DistanceJoint) => as_distance, as_distance_mut;
    Pulley(PulleyJoint) => as_pulley, as_pulley_mut;
    Mouse(MouseJoint) => as_mouse, as_mouse_mut;
    Gear(GearJoint) => as_gear, as_gear_mut;
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::physics::body::{BodyDef, Shape};

    fn two_bodies() -> (Slab<Body>, BodyId, BodyId) {
        let mut bodies = Slab::new();
        let a = bodies.insert(Body::new(&BodyDef::fixed(Shape::cuboid(1.0, 1.0))));
        let b = bodies.insert(Body::new(&BodyDef::dynamic(Shape::ball(0.5)).position(0.0, -3.0)));
        (bodies, BodyId(a, 0), BodyId(b, 0))
    }

    #[test]
    fn test_joint_type_tags() {
        assert_eq!(JointType::try_from(0).ok(), Some(JointType::Unknown));
        assert_eq!(JointType::try_from(3).ok(), Some(JointType::Distance));
        assert_eq!(JointType::try_from(6).ok(), Some(JointType::Gear));
        assert!(matches!(
            JointType::try_from(7),
            Err(PhysicsError::UnknownJointType(7))
        ));
        assert_eq!(JointType::Pulley as u8, 4);
    }

    #[test]
    fn test_for_type_rejects_unknown() {
        assert!(matches!(
            JointDef::for_type(JointType::Unknown),
            Err(PhysicsError::UnknownJointType(0))
        ));

        for tag in 1..=6u8 {
            let joint_type = JointType::try_from(tag).unwrap();
            let def = JointDef::for_type(joint_type).unwrap();
            assert_eq!(def.joint_type(), joint_type);
        }
    }

    #[test]
    fn test_only_pulley_collides_connected_by_default() {
        assert!(JointDef::from(PulleyJointDef::default()).collide_connected);
        assert!(!JointDef::from(DistanceJointDef::default()).collide_connected);
        assert!(!JointDef::from(RevoluteJointDef::default()).collide_connected);
        assert!(!JointDef::from(PrismaticJointDef::default()).collide_connected);
        assert!(!JointDef::from(MouseJointDef::default()).collide_connected);
        assert!(!JointDef::from(GearJointDef::default()).collide_connected);
    }

    #[test]
    fn test_create_requires_bodies() {
        let (bodies, a, _) = two_bodies();
        let joints = Slab::new();

        let def = JointDef::from(DistanceJointDef::default());
        assert!(matches!(
            Joint::create(&def, &bodies, &joints),
            Err(PhysicsError::MissingBody)
        ));

        let def = JointDef::from(DistanceJointDef::default()).bodies(a, BodyId(99, 0));
        assert!(matches!(
            Joint::create(&def, &bodies, &joints),
            Err(PhysicsError::MissingBody)
        ));

        let def = JointDef::from(DistanceJointDef::default()).bodies(a, a);
        assert!(matches!(
            Joint::create(&def, &bodies, &joints),
            Err(PhysicsError::SameBody)
        ));
    }

    #[test]
    fn test_create_dispatches_by_kind() {
        let (bodies, a, b) = two_bodies();
        let joints = Slab::new();

        for joint_type in [
            JointType::Revolute,
            JointType::Prismatic,
            JointType::Distance,
            JointType::Pulley,
            JointType::Mouse,
        ] {
            let def = JointDef::for_type(joint_type).unwrap().bodies(a, b).user_data(7);
            let joint = Joint::create(&def, &bodies, &joints).unwrap();
            assert_eq!(joint.joint_type(), joint_type);
            assert_eq!(joint.body1(), a);
            assert_eq!(joint.other(a), b);
            assert_eq!(joint.user_data(), Some(7));
        }
    }

    #[test]
    fn test_init_reads_bodies_and_warm_start_applies_impulse() {
        use super::test_support::{ball_at, create_joint, ground, run_step, step};

        let anchor_body = ground();
        let bob = ball_at(3.0, 0.0);

        let mut distance = DistanceJointDef::default();
        distance.initialize(&anchor_body, &bob, Vec2::ZERO, bob.position());
        let mut revolute = RevoluteJointDef::default();
        revolute.initialize(&anchor_body, &bob, Vec2::ZERO);

        let step = step(1.0 / 60.0);
        for def in [JointDef::from(distance), JointDef::from(revolute)] {
            let (mut b1, mut b2) = (anchor_body.clone(), bob.clone());
            let mut joint = create_joint(def, &b1, &b2);
            for _ in 0..10 {
                run_step(&mut joint, &step, &mut b1, &mut b2, Vec2::new(0.0, -10.0));
            }

            let before = (b2.linear_velocity(), b2.angular_velocity());
            joint.init_velocity_constraints(&step, &b1, &b2);
            assert_eq!((b2.linear_velocity(), b2.angular_velocity()), before);

            joint.warm_start(&mut b1, &mut b2);
            assert_ne!(
                b2.linear_velocity(),
                before.0,
                "{:?} joint should carry an impulse into the step",
                joint.joint_type()
            );
        }
    }

    #[test]
    fn test_jacobian_compute() {
        let mut j = Jacobian::default();
        j.set(Vec2::new(-1.0, 0.0), 0.5, Vec2::new(1.0, 0.0), -0.5);
        assert_eq!(j.compute(Vec2::new(2.0, 3.0), 2.0, Vec2::new(5.0, 1.0), 4.0), -2.0 + 1.0 + 5.0 - 2.0);

        j.set_zero();
        assert_eq!(j, Jacobian::default());
    }
}
