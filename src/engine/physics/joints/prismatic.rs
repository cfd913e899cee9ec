use glam::Vec2;

use super::{effective_mass, Jacobian, LimitState};
use crate::core::math::{clamp, cross, cross_sv};
use crate::engine::physics::body::Body;
use crate::engine::physics::island::TimeStep;
use crate::engine::physics::settings::{
    ANGULAR_SLOP, LINEAR_SLOP, MAX_ANGULAR_CORRECTION, MAX_LINEAR_CORRECTION,
};

/// Lets body2 slide along an axis fixed in body1, with no relative rotation
#[derive(Debug, Clone, PartialEq)]
pub struct PrismaticJointDef {
    pub local_anchor1: Vec2,
    pub local_anchor2: Vec2,
    /// Sliding axis in body1's frame
    pub local_axis1: Vec2,
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_translation: f32,
    pub upper_translation: f32,
    pub enable_motor: bool,
    pub max_motor_force: f32,
    pub motor_speed: f32,
}

impl Default for PrismaticJointDef {
    fn default() -> Self {
        Self {
            local_anchor1: Vec2::ZERO,
            local_anchor2: Vec2::ZERO,
            local_axis1: Vec2::X,
            reference_angle: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            max_motor_force: 0.0,
            motor_speed: 0.0,
        }
    }
}

impl PrismaticJointDef {
    /// Anchor both bodies at a world point and slide along a world axis
    pub fn initialize(&mut self, body1: &Body, body2: &Body, anchor: Vec2, axis: Vec2) {
        self.local_anchor1 = body1.local_point(anchor);
        self.local_anchor2 = body2.local_point(anchor);
        self.local_axis1 = body1.local_vector(axis);
        self.reference_angle = body2.angle() - body1.angle();
    }
}

#[derive(Debug, Clone)]
pub struct PrismaticJoint {
    local_anchor1: Vec2,
    local_anchor2: Vec2,
    local_xaxis1: Vec2,
    local_yaxis1: Vec2,
    reference_angle: f32,

    enable_limit: bool,
    lower_translation: f32,
    upper_translation: f32,
    limit_state: LimitState,

    enable_motor: bool,
    max_motor_force: f32,
    motor_speed: f32,

    linear_jacobian: Jacobian,
    linear_mass: f32,
    angular_mass: f32,
    motor_jacobian: Jacobian,
    motor_mass: f32,

    linear_impulse: f32,
    angular_impulse: f32,
    motor_impulse: f32,
    limit_impulse: f32,
    limit_position_impulse: f32,
}

impl PrismaticJoint {
    pub(crate) fn new(def: &PrismaticJointDef) -> Self {
        let axis = def.local_axis1.normalize_or_zero();
        Self {
            local_anchor1: def.local_anchor1,
            local_anchor2: def.local_anchor2,
            local_xaxis1: axis,
            local_yaxis1: axis.perp(),
            reference_angle: def.reference_angle,
            enable_limit: def.enable_limit,
            lower_translation: def.lower_translation,
            upper_translation: def.upper_translation,
            limit_state: LimitState::Inactive,
            enable_motor: def.enable_motor,
            max_motor_force: def.max_motor_force,
            motor_speed: def.motor_speed,
            linear_jacobian: Jacobian::default(),
            linear_mass: 0.0,
            angular_mass: 0.0,
            motor_jacobian: Jacobian::default(),
            motor_mass: 0.0,
            linear_impulse: 0.0,
            angular_impulse: 0.0,
            motor_impulse: 0.0,
            limit_impulse: 0.0,
            limit_position_impulse: 0.0,
        }
    }

    pub fn local_anchor1(&self) -> Vec2 {
        self.local_anchor1
    }

    pub fn local_anchor2(&self) -> Vec2 {
        self.local_anchor2
    }

    pub fn local_axis1(&self) -> Vec2 {
        self.local_xaxis1
    }

    pub fn reference_angle(&self) -> f32 {
        self.reference_angle
    }

    /// Displacement of anchor2 from anchor1 along the axis
    pub fn joint_translation(&self, b1: &Body, b2: &Body) -> f32 {
        let p1 = b1.world_point(self.local_anchor1);
        let p2 = b2.world_point(self.local_anchor2);
        b1.world_vector(self.local_xaxis1).dot(p2 - p1)
    }

    pub fn joint_speed(&self, b1: &Body, b2: &Body) -> f32 {
        let r1 = b1.anchor_arm(self.local_anchor1);
        let r2 = b2.anchor_arm(self.local_anchor2);
        let d = b2.center + r2 - b1.center - r1;
        let axis = b1.world_vector(self.local_xaxis1);

        let v1 = b1.linear_velocity;
        let v2 = b2.linear_velocity;
        let w1 = b1.angular_velocity;
        let w2 = b2.angular_velocity;

        d.dot(cross_sv(w1, axis)) + axis.dot(v2 + cross_sv(w2, r2) - v1 - cross_sv(w1, r1))
    }

    pub fn is_limit_enabled(&self) -> bool {
        self.enable_limit
    }

    pub fn enable_limit(&mut self, flag: bool) {
        self.enable_limit = flag;
    }

    pub fn lower_limit(&self) -> f32 {
        self.lower_translation
    }

    pub fn upper_limit(&self) -> f32 {
        self.upper_translation
    }

    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        debug_assert!(lower <= upper);
        self.lower_translation = lower;
        self.upper_translation = upper;
    }

    pub fn limit_state(&self) -> LimitState {
        self.limit_state
    }

    pub fn is_motor_enabled(&self) -> bool {
        self.enable_motor
    }

    pub fn enable_motor(&mut self, flag: bool) {
        self.enable_motor = flag;
    }

    pub fn motor_speed(&self) -> f32 {
        self.motor_speed
    }

    pub fn set_motor_speed(&mut self, speed: f32) {
        self.motor_speed = speed;
    }

    pub fn set_max_motor_force(&mut self, force: f32) {
        self.max_motor_force = force;
    }

    pub fn motor_force(&self, inv_dt: f32) -> f32 {
        self.motor_impulse * inv_dt
    }

    pub(crate) fn init_velocity_constraints(&mut self, step: &TimeStep, b1: &Body, b2: &Body) {
        let r1 = b1.anchor_arm(self.local_anchor1);
        let r2 = b2.anchor_arm(self.local_anchor2);
        let (i1, i2) = (b1.inv_inertia, b2.inv_inertia);

        // Perpendicular to the axis
        let ay1 = b1.world_vector(self.local_yaxis1);
        let e = b2.center + r2 - b1.center;
        self.linear_jacobian.set(-ay1, -cross(e, ay1), ay1, cross(r2, ay1));
        self.linear_mass = effective_mass(self.linear_jacobian.inv_mass(b1, b2));

        // Relative rotation
        self.angular_mass = effective_mass(i1 + i2);

        if self.enable_limit || self.enable_motor {
            let ax1 = b1.world_vector(self.local_xaxis1);
            self.motor_jacobian.set(-ax1, -cross(e, ax1), ax1, cross(r2, ax1));
            self.motor_mass = effective_mass(self.motor_jacobian.inv_mass(b1, b2));

            if self.enable_limit {
                let translation = ax1.dot(e - r1);
                if (self.upper_translation - self.lower_translation).abs() < 2.0 * LINEAR_SLOP {
                    self.limit_state = LimitState::Equal;
                } else if translation <= self.lower_translation {
                    if self.limit_state != LimitState::AtLower {
                        self.limit_impulse = 0.0;
                    }
                    self.limit_state = LimitState::AtLower;
                } else if translation >= self.upper_translation {
                    if self.limit_state != LimitState::AtUpper {
                        self.limit_impulse = 0.0;
                    }
                    self.limit_state = LimitState::AtUpper;
                } else {
                    self.limit_state = LimitState::Inactive;
                    self.limit_impulse = 0.0;
                }
            }
        }

        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }
        if !self.enable_limit {
            self.limit_state = LimitState::Inactive;
            self.limit_impulse = 0.0;
        }

        if step.warm_starting {
            self.linear_impulse *= step.dt_ratio;
            self.angular_impulse *= step.dt_ratio;
            self.motor_impulse *= step.dt_ratio;
            self.limit_impulse *= step.dt_ratio;
        } else {
            self.linear_impulse = 0.0;
            self.angular_impulse = 0.0;
            self.motor_impulse = 0.0;
            self.limit_impulse = 0.0;
        }
    }

    pub(crate) fn warm_start(&self, b1: &mut Body, b2: &mut Body) {
        let axial = self.motor_impulse + self.limit_impulse;
        let lj = &self.linear_jacobian;
        let mj = &self.motor_jacobian;

        let p1 = self.linear_impulse * lj.linear1 + axial * mj.linear1;
        let p2 = self.linear_impulse * lj.linear2 + axial * mj.linear2;
        let l1 = self.linear_impulse * lj.angular1 - self.angular_impulse + axial * mj.angular1;
        let l2 = self.linear_impulse * lj.angular2 + self.angular_impulse + axial * mj.angular2;

        b1.linear_velocity += b1.inv_mass * p1;
        b1.angular_velocity += b1.inv_inertia * l1;
        b2.linear_velocity += b2.inv_mass * p2;
        b2.angular_velocity += b2.inv_inertia * l2;
    }

    /// Apply an impulse along a constraint row
    fn apply_row(jacobian: &Jacobian, impulse: f32, b1: &mut Body, b2: &mut Body) {
        b1.linear_velocity += b1.inv_mass * impulse * jacobian.linear1;
        b1.angular_velocity += b1.inv_inertia * impulse * jacobian.angular1;
        b2.linear_velocity += b2.inv_mass * impulse * jacobian.linear2;
        b2.angular_velocity += b2.inv_inertia * impulse * jacobian.angular2;
    }

    fn row_velocity(jacobian: &Jacobian, b1: &Body, b2: &Body) -> f32 {
        jacobian.compute(
            b1.linear_velocity,
            b1.angular_velocity,
            b2.linear_velocity,
            b2.angular_velocity,
        )
    }

    pub(crate) fn solve_velocity_constraints(&mut self, step: &TimeStep, b1: &mut Body, b2: &mut Body) {
        // Perpendicular
        let cdot = Self::row_velocity(&self.linear_jacobian, b1, b2);
        let impulse = -self.linear_mass * cdot;
        self.linear_impulse += impulse;
        Self::apply_row(&self.linear_jacobian, impulse, b1, b2);

        // Rotation
        let cdot = b2.angular_velocity - b1.angular_velocity;
        let impulse = -self.angular_mass * cdot;
        self.angular_impulse += impulse;
        b1.angular_velocity -= b1.inv_inertia * impulse;
        b2.angular_velocity += b2.inv_inertia * impulse;

        if self.enable_motor && self.limit_state != LimitState::Equal {
            let cdot = Self::row_velocity(&self.motor_jacobian, b1, b2) - self.motor_speed;
            let max_impulse = step.dt * self.max_motor_force;

            let old = self.motor_impulse;
            self.motor_impulse = clamp(old - self.motor_mass * cdot, -max_impulse, max_impulse);
            let impulse = self.motor_impulse - old;
            Self::apply_row(&self.motor_jacobian, impulse, b1, b2);
        }

        if self.enable_limit && self.limit_state != LimitState::Inactive {
            let cdot = Self::row_velocity(&self.motor_jacobian, b1, b2);
            let mut impulse = -self.motor_mass * cdot;

            match self.limit_state {
                LimitState::Equal => self.limit_impulse += impulse,
                LimitState::AtLower => {
                    let old = self.limit_impulse;
                    self.limit_impulse = (old + impulse).max(0.0);
                    impulse = self.limit_impulse - old;
                }
                LimitState::AtUpper => {
                    let old = self.limit_impulse;
                    self.limit_impulse = (old + impulse).min(0.0);
                    impulse = self.limit_impulse - old;
                }
                LimitState::Inactive => {}
            }

            Self::apply_row(&self.motor_jacobian, impulse, b1, b2);
        }
    }

    pub(crate) fn init_position_constraints(&mut self) {
        self.limit_position_impulse = 0.0;
    }

    /// Move both bodies by a position-level impulse along a row
    fn apply_row_position(jacobian: &Jacobian, impulse: f32, b1: &mut Body, b2: &mut Body) {
        b1.center += b1.inv_mass * impulse * jacobian.linear1;
        b1.angle += b1.inv_inertia * impulse * jacobian.angular1;
        b2.center += b2.inv_mass * impulse * jacobian.linear2;
        b2.angle += b2.inv_inertia * impulse * jacobian.angular2;
        b1.synchronize_transform();
        b2.synchronize_transform();
    }

    pub(crate) fn solve_position_constraints(&mut self, b1: &mut Body, b2: &mut Body) -> bool {
        let r1 = b1.anchor_arm(self.local_anchor1);
        let r2 = b2.anchor_arm(self.local_anchor2);
        let d = b2.center + r2 - b1.center - r1;

        // Perpendicular
        let ay1 = b1.world_vector(self.local_yaxis1);
        let linear_c = ay1.dot(d);
        let mut linear_error = linear_c.abs();
        let linear_c = clamp(linear_c, -MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION);
        Self::apply_row_position(&self.linear_jacobian, -self.linear_mass * linear_c, b1, b2);

        // Rotation
        let angular_c = b2.angle - b1.angle - self.reference_angle;
        let angular_error = angular_c.abs();
        let angular_c = clamp(angular_c, -MAX_ANGULAR_CORRECTION, MAX_ANGULAR_CORRECTION);
        let impulse = -self.angular_mass * angular_c;
        b1.angle -= b1.inv_inertia * impulse;
        b2.angle += b2.inv_inertia * impulse;
        b1.synchronize_transform();
        b2.synchronize_transform();

        if self.enable_limit && self.limit_state != LimitState::Inactive {
            let r1 = b1.anchor_arm(self.local_anchor1);
            let r2 = b2.anchor_arm(self.local_anchor2);
            let d = b2.center + r2 - b1.center - r1;
            let translation = b1.world_vector(self.local_xaxis1).dot(d);
            let mut limit_impulse = 0.0;

            match self.limit_state {
                LimitState::Equal => {
                    let c = clamp(
                        translation - self.lower_translation,
                        -MAX_LINEAR_CORRECTION,
                        MAX_LINEAR_CORRECTION,
                    );
                    limit_impulse = -self.motor_mass * c;
                    linear_error = linear_error.max(c.abs());
                }
                LimitState::AtLower => {
                    let c = translation - self.lower_translation;
                    linear_error = linear_error.max(-c);

                    let c = clamp(c + LINEAR_SLOP, -MAX_LINEAR_CORRECTION, 0.0);
                    let old = self.limit_position_impulse;
                    self.limit_position_impulse = (old - self.motor_mass * c).max(0.0);
                    limit_impulse = self.limit_position_impulse - old;
                }
                LimitState::AtUpper => {
                    let c = translation - self.upper_translation;
                    linear_error = linear_error.max(c);

                    let c = clamp(c - LINEAR_SLOP, 0.0, MAX_LINEAR_CORRECTION);
                    let old = self.limit_position_impulse;
                    self.limit_position_impulse = (old - self.motor_mass * c).min(0.0);
                    limit_impulse = self.limit_position_impulse - old;
                }
                LimitState::Inactive => {}
            }

            Self::apply_row_position(&self.motor_jacobian, limit_impulse, b1, b2);
        }

        linear_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}
