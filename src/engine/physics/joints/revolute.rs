use glam::{Mat2, Vec2};

use super::{effective_mass, LimitState};
use crate::core::math::{clamp, cross, cross_sv, invert_mat2, mat2_from_rows, solve_mat2};
use crate::engine::physics::body::Body;
use crate::engine::physics::island::TimeStep;
use crate::engine::physics::settings::{ANGULAR_SLOP, LINEAR_SLOP, MAX_ANGULAR_CORRECTION};

/// Pins two bodies together at a shared point, leaving relative rotation free
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RevoluteJointDef {
    pub local_anchor1: Vec2,
    pub local_anchor2: Vec2,
    /// body2 angle minus body1 angle in the reference state
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_angle: f32,
    pub upper_angle: f32,
    pub enable_motor: bool,
    /// Target relative speed in radians per second
    pub motor_speed: f32,
    pub max_motor_torque: f32,
}

impl RevoluteJointDef {
    /// Pin both bodies at a world anchor, using the current angles as reference
    pub fn initialize(&mut self, body1: &Body, body2: &Body, anchor: Vec2) {
        self.local_anchor1 = body1.local_point(anchor);
        self.local_anchor2 = body2.local_point(anchor);
        self.reference_angle = body2.angle() - body1.angle();
    }
}

#[derive(Debug, Clone)]
pub struct RevoluteJoint {
    local_anchor1: Vec2,
    local_anchor2: Vec2,
    reference_angle: f32,

    enable_limit: bool,
    lower_angle: f32,
    upper_angle: f32,
    limit_state: LimitState,

    enable_motor: bool,
    motor_speed: f32,
    max_motor_torque: f32,

    r1: Vec2,
    r2: Vec2,
    pivot_mass: Mat2,
    motor_mass: f32,

    pivot_impulse: Vec2,
    motor_impulse: f32,
    limit_impulse: f32,
    limit_position_impulse: f32,
}

/// Point-constraint effective mass matrix
fn point_mass_matrix(b1: &Body, b2: &Body, r1: Vec2, r2: Vec2) -> Mat2 {
    let (m1, m2) = (b1.inv_mass, b2.inv_mass);
    let (i1, i2) = (b1.inv_inertia, b2.inv_inertia);

    let k11 = m1 + m2 + i1 * r1.y * r1.y + i2 * r2.y * r2.y;
    let k12 = -i1 * r1.x * r1.y - i2 * r2.x * r2.y;
    let k22 = m1 + m2 + i1 * r1.x * r1.x + i2 * r2.x * r2.x;
    mat2_from_rows(k11, k12, k12, k22)
}

impl RevoluteJoint {
    pub(crate) fn new(def: &RevoluteJointDef) -> Self {
        Self {
            local_anchor1: def.local_anchor1,
            local_anchor2: def.local_anchor2,
            reference_angle: def.reference_angle,
            enable_limit: def.enable_limit,
            lower_angle: def.lower_angle,
            upper_angle: def.upper_angle,
            limit_state: LimitState::Inactive,
            enable_motor: def.enable_motor,
            motor_speed: def.motor_speed,
            max_motor_torque: def.max_motor_torque,
            r1: Vec2::ZERO,
            r2: Vec2::ZERO,
            pivot_mass: Mat2::ZERO,
            motor_mass: 0.0,
            pivot_impulse: Vec2::ZERO,
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

    pub fn reference_angle(&self) -> f32 {
        self.reference_angle
    }

    /// Current relative angle, zero in the reference state
    pub fn joint_angle(&self, b1: &Body, b2: &Body) -> f32 {
        b2.angle - b1.angle - self.reference_angle
    }

    pub fn joint_speed(&self, b1: &Body, b2: &Body) -> f32 {
        b2.angular_velocity - b1.angular_velocity
    }

    pub fn is_limit_enabled(&self) -> bool {
        self.enable_limit
    }

    pub fn enable_limit(&mut self, flag: bool) {
        self.enable_limit = flag;
    }

    pub fn lower_limit(&self) -> f32 {
        self.lower_angle
    }

    pub fn upper_limit(&self) -> f32 {
        self.upper_angle
    }

    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        debug_assert!(lower <= upper);
        self.lower_angle = lower;
        self.upper_angle = upper;
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

    pub fn set_max_motor_torque(&mut self, torque: f32) {
        self.max_motor_torque = torque;
    }

    /// Motor torque applied over the last step
    pub fn motor_torque(&self, inv_dt: f32) -> f32 {
        self.motor_impulse * inv_dt
    }

    pub(crate) fn init_velocity_constraints(&mut self, step: &TimeStep, b1: &Body, b2: &Body) {
        self.r1 = b1.anchor_arm(self.local_anchor1);
        self.r2 = b2.anchor_arm(self.local_anchor2);

        self.pivot_mass = invert_mat2(point_mass_matrix(b1, b2, self.r1, self.r2));
        self.motor_mass = effective_mass(b1.inv_inertia + b2.inv_inertia);

        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if self.enable_limit {
            let joint_angle = self.joint_angle(b1, b2);
            if (self.upper_angle - self.lower_angle).abs() < 2.0 * ANGULAR_SLOP {
                self.limit_state = LimitState::Equal;
            } else if joint_angle <= self.lower_angle {
                if self.limit_state != LimitState::AtLower {
                    self.limit_impulse = 0.0;
                }
                self.limit_state = LimitState::AtLower;
            } else if joint_angle >= self.upper_angle {
                if self.limit_state != LimitState::AtUpper {
                    self.limit_impulse = 0.0;
                }
                self.limit_state = LimitState::AtUpper;
            } else {
                self.limit_state = LimitState::Inactive;
                self.limit_impulse = 0.0;
            }
        } else {
            self.limit_state = LimitState::Inactive;
            self.limit_impulse = 0.0;
        }

        if step.warm_starting {
            self.pivot_impulse *= step.dt_ratio;
            self.motor_impulse *= step.dt_ratio;
            self.limit_impulse *= step.dt_ratio;
        } else {
            self.pivot_impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.limit_impulse = 0.0;
        }
    }

    pub(crate) fn warm_start(&self, b1: &mut Body, b2: &mut Body) {
        let p = self.pivot_impulse;
        let angular = self.motor_impulse + self.limit_impulse;
        b1.linear_velocity -= b1.inv_mass * p;
        b1.angular_velocity -= b1.inv_inertia * (cross(self.r1, p) + angular);
        b2.linear_velocity += b2.inv_mass * p;
        b2.angular_velocity += b2.inv_inertia * (cross(self.r2, p) + angular);
    }

    pub(crate) fn solve_velocity_constraints(&mut self, step: &TimeStep, b1: &mut Body, b2: &mut Body) {
        // Point
        let cdot = b2.linear_velocity + cross_sv(b2.angular_velocity, self.r2)
            - b1.linear_velocity
            - cross_sv(b1.angular_velocity, self.r1);
        let impulse = -(self.pivot_mass * cdot);
        self.pivot_impulse += impulse;

        b1.linear_velocity -= b1.inv_mass * impulse;
        b1.angular_velocity -= b1.inv_inertia * cross(self.r1, impulse);
        b2.linear_velocity += b2.inv_mass * impulse;
        b2.angular_velocity += b2.inv_inertia * cross(self.r2, impulse);

        if self.enable_motor && self.limit_state != LimitState::Equal {
            let cdot = b2.angular_velocity - b1.angular_velocity - self.motor_speed;
            let max_impulse = step.dt * self.max_motor_torque;

            let old = self.motor_impulse;
            self.motor_impulse = clamp(old - self.motor_mass * cdot, -max_impulse, max_impulse);
            let impulse = self.motor_impulse - old;

            b1.angular_velocity -= b1.inv_inertia * impulse;
            b2.angular_velocity += b2.inv_inertia * impulse;
        }

        if self.enable_limit && self.limit_state != LimitState::Inactive {
            let cdot = b2.angular_velocity - b1.angular_velocity;
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

            b1.angular_velocity -= b1.inv_inertia * impulse;
            b2.angular_velocity += b2.inv_inertia * impulse;
        }
    }

    pub(crate) fn init_position_constraints(&mut self) {
        self.limit_position_impulse = 0.0;
    }

    pub(crate) fn solve_position_constraints(&mut self, b1: &mut Body, b2: &mut Body) -> bool {
        let mut angular_error = 0.0;

        if self.enable_limit && self.limit_state != LimitState::Inactive {
            let angle = self.joint_angle(b1, b2);
            let mut limit_impulse = 0.0;

            match self.limit_state {
                LimitState::Equal => {
                    let c = clamp(angle - self.lower_angle, -MAX_ANGULAR_CORRECTION, MAX_ANGULAR_CORRECTION);
                    limit_impulse = -self.motor_mass * c;
                    angular_error = c.abs();
                }
                LimitState::AtLower => {
                    let c = angle - self.lower_angle;
                    angular_error = (-c).max(0.0);

                    let c = clamp(c + ANGULAR_SLOP, -MAX_ANGULAR_CORRECTION, 0.0);
                    let old = self.limit_position_impulse;
                    self.limit_position_impulse = (old - self.motor_mass * c).max(0.0);
                    limit_impulse = self.limit_position_impulse - old;
                }
                LimitState::AtUpper => {
                    let c = angle - self.upper_angle;
                    angular_error = c.max(0.0);

                    let c = clamp(c - ANGULAR_SLOP, 0.0, MAX_ANGULAR_CORRECTION);
                    let old = self.limit_position_impulse;
                    self.limit_position_impulse = (old - self.motor_mass * c).min(0.0);
                    limit_impulse = self.limit_position_impulse - old;
                }
                LimitState::Inactive => {}
            }

            b1.angle -= b1.inv_inertia * limit_impulse;
            b2.angle += b2.inv_inertia * limit_impulse;
            b1.synchronize_transform();
            b2.synchronize_transform();
        }

        let r1 = b1.anchor_arm(self.local_anchor1);
        let r2 = b2.anchor_arm(self.local_anchor2);
        let c = b2.center + r2 - b1.center - r1;
        let position_error = c.length();

        let impulse = solve_mat2(point_mass_matrix(b1, b2, r1, r2), -c);

        b1.center -= b1.inv_mass * impulse;
        b1.angle -= b1.inv_inertia * cross(r1, impulse);
        b2.center += b2.inv_mass * impulse;
        b2.angle += b2.inv_inertia * cross(r2, impulse);

        b1.synchronize_transform();
        b2.synchronize_transform();

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}
