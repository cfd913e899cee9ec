use glam::{Mat2, Vec2};
use slab::Slab;

use super::{effective_mass, Jacobian, Joint, JointDef, JointId, JointKind};
use crate::core::math::cross;
use crate::engine::physics::body::{Body, BodyId};
use crate::engine::physics::island::TimeStep;
use crate::engine::physics::settings::LINEAR_SLOP;
use crate::engine::physics::PhysicsError;

/// Couples two revolute or prismatic joints so that
/// `coordinate1 + ratio * coordinate2` stays constant.
///
/// Both referenced joints must have a static body1. The gear's bodies are
/// the referenced joints' body2s. Remove the gear before either joint.
#[derive(Debug, Clone, PartialEq)]
pub struct GearJointDef {
    pub joint1: Option<JointId>,
    pub joint2: Option<JointId>,
    pub ratio: f32,
}

impl Default for GearJointDef {
    fn default() -> Self {
        Self {
            joint1: None,
            joint2: None,
            ratio: 1.0,
        }
    }
}

/// Snapshot of a static ground body's transform
#[derive(Debug, Clone, Copy, PartialEq)]
struct GroundFrame {
    origin: Vec2,
    rotation: Mat2,
    angle: f32,
}

impl GroundFrame {
    fn of(body: &Body) -> Self {
        Self {
            origin: body.position(),
            rotation: body.rotation(),
            angle: body.angle(),
        }
    }

    fn world_point(&self, local: Vec2) -> Vec2 {
        self.origin + self.rotation * local
    }
}

/// How one side of the gear measures its coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
enum GearSide {
    Revolute {
        ground: GroundFrame,
        reference_angle: f32,
    },
    Prismatic {
        ground: GroundFrame,
        ground_anchor: Vec2,
        local_axis: Vec2,
    },
}

impl GearSide {
    /// Read the side from a referenced joint. Returns the side, the
    /// body-side local anchor and the joint's body2.
    fn from_joint(joint: &Joint, bodies: &Slab<Body>) -> Result<(Self, Vec2, BodyId), PhysicsError> {
        let ground = joint.body1().resolve(bodies).ok_or(PhysicsError::MissingBody)?;
        if !ground.is_static() {
            return Err(PhysicsError::InvalidGearJoint(
                "referenced joint must hang off a static body".to_string(),
            ));
        }
        let ground_frame = GroundFrame::of(ground);

        match joint.kind() {
            JointKind::Revolute(revolute) => Ok((
                GearSide::Revolute {
                    ground: ground_frame,
                    reference_angle: revolute.reference_angle(),
                },
                revolute.local_anchor2(),
                joint.body2(),
            )),
            JointKind::Prismatic(prismatic) => Ok((
                GearSide::Prismatic {
                    ground: ground_frame,
                    ground_anchor: prismatic.local_anchor1(),
                    local_axis: prismatic.local_axis1(),
                },
                prismatic.local_anchor2(),
                joint.body2(),
            )),
            _ => Err(PhysicsError::InvalidGearJoint(format!(
                "cannot gear a {:?} joint",
                joint.joint_type()
            ))),
        }
    }

    fn coordinate(&self, body: &Body, local_anchor: Vec2) -> f32 {
        match *self {
            GearSide::Revolute {
                ground,
                reference_angle,
            } => body.angle - ground.angle - reference_angle,
            GearSide::Prismatic {
                ground,
                ground_anchor,
                local_axis,
            } => {
                let axis = ground.rotation * local_axis;
                axis.dot(body.world_point(local_anchor) - ground.world_point(ground_anchor))
            }
        }
    }

    /// Jacobian terms `(linear, angular)` of this side for `body`
    fn jacobian(&self, body: &Body, local_anchor: Vec2) -> (Vec2, f32) {
        match *self {
            GearSide::Revolute { .. } => (Vec2::ZERO, -1.0),
            GearSide::Prismatic {
                ground, local_axis, ..
            } => {
                let ug = ground.rotation * local_axis;
                let r = body.anchor_arm(local_anchor);
                (-ug, -cross(r, ug))
            }
        }
    }
}

/// Look up the bodies a gear definition connects
pub(super) fn resolve_bodies(
    def: &JointDef,
    gear_def: &GearJointDef,
    joints: &Slab<Joint>,
) -> Result<(BodyId, BodyId), PhysicsError> {
    let lookup = |id: Option<JointId>| {
        id.and_then(|id| id.resolve(joints))
            .ok_or_else(|| PhysicsError::InvalidGearJoint("referenced joint does not exist".to_string()))
    };
    let joint1 = lookup(gear_def.joint1)?;
    let joint2 = lookup(gear_def.joint2)?;

    let body1 = joint1.body2();
    let body2 = joint2.body2();
    if def.body1.is_some_and(|id| id != body1) || def.body2.is_some_and(|id| id != body2) {
        return Err(PhysicsError::InvalidGearJoint(
            "gear bodies must be the referenced joints' second bodies".to_string(),
        ));
    }

    Ok((body1, body2))
}

#[derive(Debug, Clone)]
pub struct GearJoint {
    joint1: JointId,
    joint2: JointId,
    side1: GearSide,
    side2: GearSide,
    local_anchor1: Vec2,
    local_anchor2: Vec2,

    constant: f32,
    ratio: f32,

    jacobian: Jacobian,
    mass: f32,
    impulse: f32,
}

impl GearJoint {
    pub(crate) fn new(
        def: &GearJointDef,
        bodies: &Slab<Body>,
        joints: &Slab<Joint>,
    ) -> Result<Self, PhysicsError> {
        if def.ratio == 0.0 || !def.ratio.is_finite() {
            return Err(PhysicsError::InvalidRatio(def.ratio));
        }

        let missing = || PhysicsError::InvalidGearJoint("referenced joint does not exist".to_string());
        let joint1 = def.joint1.ok_or_else(missing)?;
        let joint2 = def.joint2.ok_or_else(missing)?;
        let referenced1 = joint1.resolve(joints).ok_or_else(missing)?;
        let referenced2 = joint2.resolve(joints).ok_or_else(missing)?;

        let (side1, local_anchor1, body1) = GearSide::from_joint(referenced1, bodies)?;
        let (side2, local_anchor2, body2) = GearSide::from_joint(referenced2, bodies)?;

        let b1 = body1.resolve(bodies).ok_or(PhysicsError::MissingBody)?;
        let b2 = body2.resolve(bodies).ok_or(PhysicsError::MissingBody)?;

        let constant = side1.coordinate(b1, local_anchor1) + def.ratio * side2.coordinate(b2, local_anchor2);

        Ok(Self {
            joint1,
            joint2,
            side1,
            side2,
            local_anchor1,
            local_anchor2,
            constant,
            ratio: def.ratio,
            jacobian: Jacobian::default(),
            mass: 0.0,
            impulse: 0.0,
        })
    }

    pub fn joint1(&self) -> JointId {
        self.joint1
    }

    pub fn joint2(&self) -> JointId {
        self.joint2
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn constant(&self) -> f32 {
        self.constant
    }

    pub fn local_anchor1(&self) -> Vec2 {
        self.local_anchor1
    }

    pub fn local_anchor2(&self) -> Vec2 {
        self.local_anchor2
    }

    /// `coordinate1 + ratio * coordinate2` for the current body state
    pub fn coordinate_sum(&self, b1: &Body, b2: &Body) -> f32 {
        self.side1.coordinate(b1, self.local_anchor1) + self.ratio * self.side2.coordinate(b2, self.local_anchor2)
    }

    pub(crate) fn init_velocity_constraints(&mut self, step: &TimeStep, b1: &Body, b2: &Body) {
        let (linear1, angular1) = self.side1.jacobian(b1, self.local_anchor1);
        let (linear2, angular2) = self.side2.jacobian(b2, self.local_anchor2);
        self.jacobian
            .set(linear1, angular1, self.ratio * linear2, self.ratio * angular2);

        self.mass = effective_mass(self.jacobian.inv_mass(b1, b2));

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
        } else {
            self.impulse = 0.0;
        }
    }

    pub(crate) fn warm_start(&self, b1: &mut Body, b2: &mut Body) {
        self.apply(self.impulse, b1, b2);
    }

    fn apply(&self, impulse: f32, b1: &mut Body, b2: &mut Body) {
        b1.linear_velocity += b1.inv_mass * impulse * self.jacobian.linear1;
        b1.angular_velocity += b1.inv_inertia * impulse * self.jacobian.angular1;
        b2.linear_velocity += b2.inv_mass * impulse * self.jacobian.linear2;
        b2.angular_velocity += b2.inv_inertia * impulse * self.jacobian.angular2;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, b1: &mut Body, b2: &mut Body) {
        let cdot = self.jacobian.compute(
            b1.linear_velocity,
            b1.angular_velocity,
            b2.linear_velocity,
            b2.angular_velocity,
        );

        let impulse = -self.mass * cdot;
        self.impulse += impulse;
        self.apply(impulse, b1, b2);
    }

    pub(crate) fn solve_position_constraints(&mut self, b1: &mut Body, b2: &mut Body) -> bool {
        let c = self.constant - self.coordinate_sum(b1, b2);
        let impulse = -self.mass * c;

        b1.center += b1.inv_mass * impulse * self.jacobian.linear1;
        b1.angle += b1.inv_inertia * impulse * self.jacobian.angular1;
        b2.center += b2.inv_mass * impulse * self.jacobian.linear2;
        b2.angle += b2.inv_inertia * impulse * self.jacobian.angular2;
        b1.synchronize_transform();
        b2.synchronize_transform();

        c.abs() < LINEAR_SLOP
    }
}
