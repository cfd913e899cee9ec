use std::f32::consts::PI;

use glam::Vec2;

use super::effective_mass;
use crate::core::math::{clamp, cross, cross_sv};
use crate::engine::physics::body::Body;
use crate::engine::physics::island::TimeStep;
use crate::engine::physics::settings::{LINEAR_SLOP, MAX_LINEAR_CORRECTION};

/// Keeps two anchor points a fixed distance apart, rigidly or as a spring
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceJointDef {
    /// Anchor on body1 in its local frame
    pub local_anchor1: Vec2,
    /// Anchor on body2 in its local frame
    pub local_anchor2: Vec2,
    /// Rest length
    pub length: f32,
    /// Mass-spring-damper frequency in Hz. Zero means rigid.
    pub frequency_hz: f32,
    /// 0 = no damping, 1 = critical damping
    pub damping_ratio: f32,
}

impl Default for DistanceJointDef {
    fn default() -> Self {
        Self {
            local_anchor1: Vec2::ZERO,
            local_anchor2: Vec2::ZERO,
            length: 1.0,
            frequency_hz: 0.0,
            damping_ratio: 0.0,
        }
    }
}

impl DistanceJointDef {
    /// Bind the anchors to world points on the two bodies. The rest length is
    /// the current distance between them.
    pub fn initialize(&mut self, body1: &Body, body2: &Body, anchor1: Vec2, anchor2: Vec2) {
        self.local_anchor1 = body1.local_point(anchor1);
        self.local_anchor2 = body2.local_point(anchor2);
        self.length = (anchor2 - anchor1).length();
    }
}

#[derive(Debug, Clone)]
pub struct DistanceJoint {
    local_anchor1: Vec2,
    local_anchor2: Vec2,
    length: f32,
    frequency_hz: f32,
    damping_ratio: f32,

    u: Vec2,
    r1: Vec2,
    r2: Vec2,
    mass: f32,
    gamma: f32,
    bias: f32,
    impulse: f32,
}

impl DistanceJoint {
    pub(crate) fn new(def: &DistanceJointDef) -> Self {
        Self {
            local_anchor1: def.local_anchor1,
            local_anchor2: def.local_anchor2,
            length: def.length,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            u: Vec2::ZERO,
            r1: Vec2::ZERO,
            r2: Vec2::ZERO,
            mass: 0.0,
            gamma: 0.0,
            bias: 0.0,
            impulse: 0.0,
        }
    }

    pub fn local_anchor1(&self) -> Vec2 {
        self.local_anchor1
    }

    pub fn local_anchor2(&self) -> Vec2 {
        self.local_anchor2
    }

    /// Target distance between the anchors
    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn set_length(&mut self, length: f32) {
        self.length = length;
    }

    pub fn frequency(&self) -> f32 {
        self.frequency_hz
    }

    pub fn set_frequency(&mut self, hz: f32) {
        self.frequency_hz = hz;
    }

    pub fn damping_ratio(&self) -> f32 {
        self.damping_ratio
    }

    pub fn set_damping_ratio(&mut self, ratio: f32) {
        self.damping_ratio = ratio;
    }

    pub fn is_soft(&self) -> bool {
        self.frequency_hz > 0.0
    }

    /// Accumulated impulse along the joint axis
    pub fn impulse(&self) -> f32 {
        self.impulse
    }

    pub(crate) fn init_velocity_constraints(&mut self, step: &TimeStep, b1: &Body, b2: &Body) {
        self.r1 = b1.anchor_arm(self.local_anchor1);
        self.r2 = b2.anchor_arm(self.local_anchor2);

        self.u = b2.center + self.r2 - b1.center - self.r1;
        let length = self.u.length();
        if length > LINEAR_SLOP {
            self.u /= length;
        } else {
            self.u = Vec2::ZERO;
        }

        let cr1u = cross(self.r1, self.u);
        let cr2u = cross(self.r2, self.u);
        let inv_mass =
            b1.inv_mass + b1.inv_inertia * cr1u * cr1u + b2.inv_mass + b2.inv_inertia * cr2u * cr2u;
        self.mass = effective_mass(inv_mass);

        self.gamma = 0.0;
        self.bias = 0.0;
        if self.is_soft() && step.dt > 0.0 {
            let c = length - self.length;

            let omega = 2.0 * PI * self.frequency_hz;
            let d = 2.0 * self.mass * self.damping_ratio * omega;
            let k = self.mass * omega * omega;

            self.gamma = effective_mass(step.dt * (d + step.dt * k));
            self.bias = c * step.dt * k * self.gamma;
            self.mass = effective_mass(inv_mass + self.gamma);
        }

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
        } else {
            self.impulse = 0.0;
        }
    }

    pub(crate) fn warm_start(&self, b1: &mut Body, b2: &mut Body) {
        let p = self.impulse * self.u;
        b1.linear_velocity -= b1.inv_mass * p;
        b1.angular_velocity -= b1.inv_inertia * cross(self.r1, p);
        b2.linear_velocity += b2.inv_mass * p;
        b2.angular_velocity += b2.inv_inertia * cross(self.r2, p);
    }

    pub(crate) fn solve_velocity_constraints(&mut self, b1: &mut Body, b2: &mut Body) {
        let v1 = b1.linear_velocity + cross_sv(b1.angular_velocity, self.r1);
        let v2 = b2.linear_velocity + cross_sv(b2.angular_velocity, self.r2);
        let cdot = self.u.dot(v2 - v1);

        let impulse = -self.mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = impulse * self.u;
        b1.linear_velocity -= b1.inv_mass * p;
        b1.angular_velocity -= b1.inv_inertia * cross(self.r1, p);
        b2.linear_velocity += b2.inv_mass * p;
        b2.angular_velocity += b2.inv_inertia * cross(self.r2, p);
    }

    pub(crate) fn solve_position_constraints(&mut self, b1: &mut Body, b2: &mut Body) -> bool {
        // Springs are allowed to stretch
        if self.is_soft() {
            return true;
        }

        let r1 = b1.anchor_arm(self.local_anchor1);
        let r2 = b2.anchor_arm(self.local_anchor2);

        let d = b2.center + r2 - b1.center - r1;
        let length = d.length();
        let u = if length > f32::EPSILON { d / length } else { Vec2::ZERO };
        let c = clamp(length - self.length, -MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION);

        let cr1u = cross(r1, u);
        let cr2u = cross(r2, u);
        let mass = effective_mass(
            b1.inv_mass + b1.inv_inertia * cr1u * cr1u + b2.inv_mass + b2.inv_inertia * cr2u * cr2u,
        );

        let p = -mass * c * u;
        b1.center -= b1.inv_mass * p;
        b1.angle -= b1.inv_inertia * cross(r1, p);
        b2.center += b2.inv_mass * p;
        b2.angle += b2.inv_inertia * cross(r2, p);

        b1.synchronize_transform();
        b2.synchronize_transform();

        c.abs() < LINEAR_SLOP
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{ball_at, create_joint, ground, run_step, step};
    use super::super::Joint;
    use super::*;
    use approx::assert_relative_eq;

    fn pendulum(frequency_hz: f32) -> (Joint, Body, Body) {
        let b1 = ground();
        let b2 = ball_at(3.0, 0.0);

        let mut def = DistanceJointDef::default();
        def.initialize(&b1, &b2, b1.position(), b2.position());
        def.frequency_hz = frequency_hz;
        def.damping_ratio = 0.5;
        let joint = create_joint(def, &b1, &b2);

        (joint, b1, b2)
    }

    #[test]
    fn test_initialize_sets_length() {
        let b1 = ball_at(0.0, 0.0);
        let b2 = ball_at(10.0, 0.0);
        let mut def = DistanceJointDef::default();
        def.initialize(&b1, &b2, b1.position(), b2.position());

        assert_relative_eq!(def.length, 10.0);
        assert_eq!(def.local_anchor1, Vec2::ZERO);
        assert_eq!(def.local_anchor2, Vec2::ZERO);
    }

    #[test]
    fn test_rigid_distance_holds_under_gravity() {
        let (mut joint, mut b1, mut b2) = pendulum(0.0);
        let step = step(1.0 / 60.0);

        for _ in 0..120 {
            run_step(&mut joint, &step, &mut b1, &mut b2, Vec2::new(0.0, -10.0));
        }

        let distance = (b2.position() - b1.position()).length();
        assert_relative_eq!(distance, 3.0, epsilon = 0.05);
        assert!(b2.position().y < -1.0, "Pendulum should have swung down");
    }

    #[test]
    fn test_soft_joint_skips_position_solve() {
        let (mut joint, mut b1, mut b2) = pendulum(4.0);
        assert!(joint.as_distance().unwrap().is_soft());

        b2.center = Vec2::new(5.0, 0.0);
        b2.synchronize_transform();
        assert!(joint.solve_position_constraints(&mut b1, &mut b2));
        assert_eq!(b2.position(), Vec2::new(5.0, 0.0), "Spring must not be snapped back");
    }

    #[test]
    fn test_parameters_mutable_after_construction() {
        let (mut joint, _, _) = pendulum(0.0);
        let distance = joint.as_distance_mut().unwrap();
        distance.set_frequency(2.0);
        distance.set_damping_ratio(1.0);
        distance.set_length(4.0);

        assert_eq!(distance.frequency(), 2.0);
        assert_eq!(distance.damping_ratio(), 1.0);
        assert_eq!(distance.length(), 4.0);
    }
}
