use glam::Vec2;

use super::{effective_mass, LimitState};
use crate::core::math::{clamp, cross, cross_sv};
use crate::engine::physics::body::Body;
use crate::engine::physics::island::TimeStep;
use crate::engine::physics::settings::{LINEAR_SLOP, MAX_LINEAR_CORRECTION, MIN_PULLEY_LENGTH};
use crate::engine::physics::PhysicsError;

/// Two bodies hanging from fixed ground points by a shared rope.
///
/// `length1 + ratio * length2` stays constant; `ratio` scales the force
/// transmitted to the second side like a block and tackle.
#[derive(Debug, Clone, PartialEq)]
pub struct PulleyJointDef {
    /// First ground anchor, world coordinates
    pub ground_anchor1: Vec2,
    /// Second ground anchor, world coordinates
    pub ground_anchor2: Vec2,
    pub local_anchor1: Vec2,
    pub local_anchor2: Vec2,
    /// Reference length of the first side
    pub length1: f32,
    pub max_length1: f32,
    /// Reference length of the second side
    pub length2: f32,
    pub max_length2: f32,
    pub ratio: f32,
}

impl Default for PulleyJointDef {
    fn default() -> Self {
        Self {
            ground_anchor1: Vec2::new(-1.0, 1.0),
            ground_anchor2: Vec2::new(1.0, 1.0),
            local_anchor1: Vec2::new(-1.0, 0.0),
            local_anchor2: Vec2::new(1.0, 0.0),
            length1: 0.0,
            max_length1: 0.0,
            length2: 0.0,
            max_length2: 0.0,
            ratio: 1.0,
        }
    }
}

impl PulleyJointDef {
    /// Hang two bodies from ground points; the rope lengths are taken from the
    /// current anchor positions.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        body1: &Body,
        body2: &Body,
        ground_anchor1: Vec2,
        ground_anchor2: Vec2,
        anchor1: Vec2,
        anchor2: Vec2,
        ratio: f32,
    ) {
        self.ground_anchor1 = ground_anchor1;
        self.ground_anchor2 = ground_anchor2;
        self.local_anchor1 = body1.local_point(anchor1);
        self.local_anchor2 = body2.local_point(anchor2);
        self.length1 = (anchor1 - ground_anchor1).length();
        self.length2 = (anchor2 - ground_anchor2).length();
        self.ratio = ratio;

        let constant = self.length1 + ratio * self.length2;
        self.max_length1 = constant - ratio * MIN_PULLEY_LENGTH;
        self.max_length2 = (constant - MIN_PULLEY_LENGTH) / ratio;
    }
}

#[derive(Debug, Clone)]
pub struct PulleyJoint {
    ground_anchor1: Vec2,
    ground_anchor2: Vec2,
    local_anchor1: Vec2,
    local_anchor2: Vec2,

    constant: f32,
    ratio: f32,
    max_length1: f32,
    max_length2: f32,

    u1: Vec2,
    u2: Vec2,
    r1: Vec2,
    r2: Vec2,

    pulley_mass: f32,
    limit_mass1: f32,
    limit_mass2: f32,

    state: LimitState,
    limit_state1: LimitState,
    limit_state2: LimitState,

    impulse: f32,
    limit_impulse1: f32,
    limit_impulse2: f32,

    position_impulse: f32,
    limit_position_impulse1: f32,
    limit_position_impulse2: f32,
}

/// Unit direction from a ground anchor to a body anchor, and the rope length
fn rope(from: Vec2, to: Vec2) -> (Vec2, f32) {
    let d = to - from;
    let length = d.length();
    if length > LINEAR_SLOP {
        (d / length, length)
    } else {
        (Vec2::ZERO, length)
    }
}

impl PulleyJoint {
    pub(crate) fn new(def: &PulleyJointDef) -> Result<Self, PhysicsError> {
        if !(def.ratio > 0.0 && def.ratio.is_finite()) {
            return Err(PhysicsError::InvalidRatio(def.ratio));
        }

        let constant = def.length1 + def.ratio * def.length2;

        Ok(Self {
            ground_anchor1: def.ground_anchor1,
            ground_anchor2: def.ground_anchor2,
            local_anchor1: def.local_anchor1,
            local_anchor2: def.local_anchor2,
            constant,
            ratio: def.ratio,
            max_length1: def.max_length1.min(constant - def.ratio * MIN_PULLEY_LENGTH),
            max_length2: def.max_length2.min((constant - MIN_PULLEY_LENGTH) / def.ratio),
            u1: Vec2::ZERO,
            u2: Vec2::ZERO,
            r1: Vec2::ZERO,
            r2: Vec2::ZERO,
            pulley_mass: 0.0,
            limit_mass1: 0.0,
            limit_mass2: 0.0,
            state: LimitState::Inactive,
            limit_state1: LimitState::Inactive,
            limit_state2: LimitState::Inactive,
            impulse: 0.0,
            limit_impulse1: 0.0,
            limit_impulse2: 0.0,
            position_impulse: 0.0,
            limit_position_impulse1: 0.0,
            limit_position_impulse2: 0.0,
        })
    }

    pub fn ground_anchor1(&self) -> Vec2 {
        self.ground_anchor1
    }

    pub fn ground_anchor2(&self) -> Vec2 {
        self.ground_anchor2
    }

    pub fn local_anchor1(&self) -> Vec2 {
        self.local_anchor1
    }

    pub fn local_anchor2(&self) -> Vec2 {
        self.local_anchor2
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// `length1 + ratio * length2`, fixed at creation
    pub fn constant(&self) -> f32 {
        self.constant
    }

    pub fn max_lengths(&self) -> (f32, f32) {
        (self.max_length1, self.max_length2)
    }

    /// Current rope length on the first side
    pub fn length1(&self, b1: &Body) -> f32 {
        (b1.world_point(self.local_anchor1) - self.ground_anchor1).length()
    }

    /// Current rope length on the second side
    pub fn length2(&self, b2: &Body) -> f32 {
        (b2.world_point(self.local_anchor2) - self.ground_anchor2).length()
    }

    pub(crate) fn init_velocity_constraints(&mut self, step: &TimeStep, b1: &Body, b2: &Body) {
        self.r1 = b1.anchor_arm(self.local_anchor1);
        self.r2 = b2.anchor_arm(self.local_anchor2);

        let (u1, length1) = rope(self.ground_anchor1, b1.center + self.r1);
        let (u2, length2) = rope(self.ground_anchor2, b2.center + self.r2);
        self.u1 = u1;
        self.u2 = u2;

        let c = self.constant - length1 - self.ratio * length2;
        if c > 0.0 {
            self.state = LimitState::Inactive;
            self.impulse = 0.0;
        } else {
            self.state = LimitState::AtUpper;
        }

        if length1 < self.max_length1 {
            self.limit_state1 = LimitState::Inactive;
            self.limit_impulse1 = 0.0;
        } else {
            self.limit_state1 = LimitState::AtUpper;
        }

        if length2 < self.max_length2 {
            self.limit_state2 = LimitState::Inactive;
            self.limit_impulse2 = 0.0;
        } else {
            self.limit_state2 = LimitState::AtUpper;
        }

        let cr1u1 = cross(self.r1, self.u1);
        let cr2u2 = cross(self.r2, self.u2);

        let limit_inv_mass1 = b1.inv_mass + b1.inv_inertia * cr1u1 * cr1u1;
        let limit_inv_mass2 = b2.inv_mass + b2.inv_inertia * cr2u2 * cr2u2;
        self.limit_mass1 = effective_mass(limit_inv_mass1);
        self.limit_mass2 = effective_mass(limit_inv_mass2);
        self.pulley_mass = effective_mass(limit_inv_mass1 + self.ratio * self.ratio * limit_inv_mass2);

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            self.limit_impulse1 *= step.dt_ratio;
            self.limit_impulse2 *= step.dt_ratio;
        } else {
            self.impulse = 0.0;
            self.limit_impulse1 = 0.0;
            self.limit_impulse2 = 0.0;
        }
    }

    pub(crate) fn warm_start(&self, b1: &mut Body, b2: &mut Body) {
        let p1 = -(self.impulse + self.limit_impulse1) * self.u1;
        let p2 = (-self.ratio * self.impulse - self.limit_impulse2) * self.u2;
        b1.linear_velocity += b1.inv_mass * p1;
        b1.angular_velocity += b1.inv_inertia * cross(self.r1, p1);
        b2.linear_velocity += b2.inv_mass * p2;
        b2.angular_velocity += b2.inv_inertia * cross(self.r2, p2);
    }

    pub(crate) fn solve_velocity_constraints(&mut self, b1: &mut Body, b2: &mut Body) {
        if self.state == LimitState::AtUpper {
            let v1 = b1.linear_velocity + cross_sv(b1.angular_velocity, self.r1);
            let v2 = b2.linear_velocity + cross_sv(b2.angular_velocity, self.r2);

            let cdot = -self.u1.dot(v1) - self.ratio * self.u2.dot(v2);
            let old = self.impulse;
            self.impulse = (old - self.pulley_mass * cdot).max(0.0);
            let impulse = self.impulse - old;

            let p1 = -impulse * self.u1;
            let p2 = -self.ratio * impulse * self.u2;
            b1.linear_velocity += b1.inv_mass * p1;
            b1.angular_velocity += b1.inv_inertia * cross(self.r1, p1);
            b2.linear_velocity += b2.inv_mass * p2;
            b2.angular_velocity += b2.inv_inertia * cross(self.r2, p2);
        }

        if self.limit_state1 == LimitState::AtUpper {
            let v1 = b1.linear_velocity + cross_sv(b1.angular_velocity, self.r1);
            let cdot = -self.u1.dot(v1);
            let old = self.limit_impulse1;
            self.limit_impulse1 = (old - self.limit_mass1 * cdot).max(0.0);
            let impulse = self.limit_impulse1 - old;

            let p1 = -impulse * self.u1;
            b1.linear_velocity += b1.inv_mass * p1;
            b1.angular_velocity += b1.inv_inertia * cross(self.r1, p1);
        }

        if self.limit_state2 == LimitState::AtUpper {
            let v2 = b2.linear_velocity + cross_sv(b2.angular_velocity, self.r2);
            let cdot = -self.u2.dot(v2);
            let old = self.limit_impulse2;
            self.limit_impulse2 = (old - self.limit_mass2 * cdot).max(0.0);
            let impulse = self.limit_impulse2 - old;

            let p2 = -impulse * self.u2;
            b2.linear_velocity += b2.inv_mass * p2;
            b2.angular_velocity += b2.inv_inertia * cross(self.r2, p2);
        }
    }

    pub(crate) fn init_position_constraints(&mut self) {
        self.position_impulse = 0.0;
        self.limit_position_impulse1 = 0.0;
        self.limit_position_impulse2 = 0.0;
    }

    pub(crate) fn solve_position_constraints(&mut self, b1: &mut Body, b2: &mut Body) -> bool {
        let mut linear_error: f32 = 0.0;

        if self.state == LimitState::AtUpper {
            let r1 = b1.anchor_arm(self.local_anchor1);
            let r2 = b2.anchor_arm(self.local_anchor2);
            let (u1, length1) = rope(self.ground_anchor1, b1.center + r1);
            let (u2, length2) = rope(self.ground_anchor2, b2.center + r2);

            let c = self.constant - length1 - self.ratio * length2;
            linear_error = linear_error.max(-c);

            let c = clamp(c + LINEAR_SLOP, -MAX_LINEAR_CORRECTION, 0.0);
            let old = self.position_impulse;
            self.position_impulse = (old - self.pulley_mass * c).max(0.0);
            let impulse = self.position_impulse - old;

            let p1 = -impulse * u1;
            let p2 = -self.ratio * impulse * u2;
            b1.center += b1.inv_mass * p1;
            b1.angle += b1.inv_inertia * cross(r1, p1);
            b2.center += b2.inv_mass * p2;
            b2.angle += b2.inv_inertia * cross(r2, p2);
            b1.synchronize_transform();
            b2.synchronize_transform();
        }

        if self.limit_state1 == LimitState::AtUpper {
            let r1 = b1.anchor_arm(self.local_anchor1);
            let (u1, length1) = rope(self.ground_anchor1, b1.center + r1);

            let c = self.max_length1 - length1;
            linear_error = linear_error.max(-c);

            let c = clamp(c + LINEAR_SLOP, -MAX_LINEAR_CORRECTION, 0.0);
            let old = self.limit_position_impulse1;
            self.limit_position_impulse1 = (old - self.limit_mass1 * c).max(0.0);
            let impulse = self.limit_position_impulse1 - old;

            let p1 = -impulse * u1;
            b1.center += b1.inv_mass * p1;
            b1.angle += b1.inv_inertia * cross(r1, p1);
            b1.synchronize_transform();
        }

        if self.limit_state2 == LimitState::AtUpper {
            let r2 = b2.anchor_arm(self.local_anchor2);
            let (u2, length2) = rope(self.ground_anchor2, b2.center + r2);

            let c = self.max_length2 - length2;
            linear_error = linear_error.max(-c);

            let c = clamp(c + LINEAR_SLOP, -MAX_LINEAR_CORRECTION, 0.0);
            let old = self.limit_position_impulse2;
            self.limit_position_impulse2 = (old - self.limit_mass2 * c).max(0.0);
            let impulse = self.limit_position_impulse2 - old;

            let p2 = -impulse * u2;
            b2.center += b2.inv_mass * p2;
            b2.angle += b2.inv_inertia * cross(r2, p2);
            b2.synchronize_transform();
        }

        linear_error < LINEAR_SLOP
    }
}
