use std::f32::consts::PI;

use glam::{Mat2, Vec2};

use crate::core::math::{cross, cross_sv, invert_mat2, mat2_from_rows};
use crate::engine::physics::body::Body;
use crate::engine::physics::island::TimeStep;

/// Drags a point on body2 toward a world target with a soft spring.
///
/// body1 is only a placeholder (usually the ground) and is never touched.
#[derive(Debug, Clone, PartialEq)]
pub struct MouseJointDef {
    /// Initial world target. Also where the body is grabbed.
    pub target: Vec2,
    /// Cap on the spring force, usually some multiple of the body weight
    pub max_force: f32,
    pub frequency_hz: f32,
    pub damping_ratio: f32,
}

impl Default for MouseJointDef {
    fn default() -> Self {
        Self {
            target: Vec2::ZERO,
            max_force: 0.0,
            frequency_hz: 5.0,
            damping_ratio: 0.7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MouseJoint {
    local_anchor: Vec2,
    target: Vec2,
    max_force: f32,
    frequency_hz: f32,
    damping_ratio: f32,

    r: Vec2,
    mass: Mat2,
    c: Vec2,
    beta: f32,
    gamma: f32,
    impulse: Vec2,
}

impl MouseJoint {
    pub(crate) fn new(def: &MouseJointDef, body2: &Body) -> Self {
        Self {
            local_anchor: body2.local_point(def.target),
            target: def.target,
            max_force: def.max_force,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            r: Vec2::ZERO,
            mass: Mat2::ZERO,
            c: Vec2::ZERO,
            beta: 0.0,
            gamma: 0.0,
            impulse: Vec2::ZERO,
        }
    }

    /// Grab point on body2, local frame
    pub fn local_anchor(&self) -> Vec2 {
        self.local_anchor
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    /// Move the target. The simulation wakes body2 when this goes through it.
    pub fn set_target(&mut self, target: Vec2) {
        self.target = target;
    }

    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    pub fn set_max_force(&mut self, force: f32) {
        self.max_force = force;
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

    pub(crate) fn init_velocity_constraints(&mut self, step: &TimeStep, b: &Body) {
        let mass = b.mass;

        let omega = 2.0 * PI * self.frequency_hz;
        let d = 2.0 * mass * self.damping_ratio * omega;
        let k = mass * omega * omega;

        // Soft constraint coefficients; zero for a massless or stiff-less setup
        let denominator = step.dt * (d + step.dt * k);
        self.gamma = if denominator > 0.0 { 1.0 / denominator } else { 0.0 };
        self.beta = step.dt * k * self.gamma;

        self.r = b.anchor_arm(self.local_anchor);

        let (m, i) = (b.inv_mass, b.inv_inertia);
        let r = self.r;
        let k = mat2_from_rows(
            m + i * r.y * r.y + self.gamma,
            -i * r.x * r.y,
            -i * r.x * r.y,
            m + i * r.x * r.x + self.gamma,
        );
        self.mass = invert_mat2(k);

        self.c = b.center + self.r - self.target;

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
        } else {
            self.impulse = Vec2::ZERO;
        }
    }

    pub(crate) fn warm_start(&self, b: &mut Body) {
        // Damp rotation while dragged
        b.angular_velocity *= 0.98;

        b.linear_velocity += b.inv_mass * self.impulse;
        b.angular_velocity += b.inv_inertia * cross(self.r, self.impulse);
    }

    pub(crate) fn solve_velocity_constraints(&mut self, step: &TimeStep, b: &mut Body) {
        let cdot = b.linear_velocity + cross_sv(b.angular_velocity, self.r);
        let mut impulse = self.mass * -(cdot + self.beta * self.c + self.gamma * self.impulse);

        let old = self.impulse;
        self.impulse += impulse;
        let max_impulse = step.dt * self.max_force;
        if self.impulse.length_squared() > max_impulse * max_impulse {
            self.impulse *= max_impulse / self.impulse.length();
        }
        impulse = self.impulse - old;

        b.linear_velocity += b.inv_mass * impulse;
        b.angular_velocity += b.inv_inertia * cross(self.r, impulse);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{ball_at, create_joint, ground, run_step, step};
    use super::super::JointDef;
    use super::*;

    #[test]
    fn test_mouse_def_defaults() {
        let def = MouseJointDef::default();
        assert_eq!(def.frequency_hz, 5.0);
        assert_eq!(def.damping_ratio, 0.7);
        assert!(!JointDef::from(def).collide_connected);
    }

    #[test]
    fn test_drags_body_toward_target() {
        let mut b1 = ground();
        let mut b2 = ball_at(0.0, 0.0);
        let def = MouseJointDef {
            target: b2.position(),
            max_force: 1000.0 * b2.mass(),
            ..Default::default()
        };
        let mut joint = create_joint(def, &b1, &b2);
        joint.as_mouse_mut().unwrap().set_target(Vec2::new(3.0, 1.0));

        let step = step(1.0 / 60.0);
        for _ in 0..180 {
            run_step(&mut joint, &step, &mut b1, &mut b2, Vec2::ZERO);
        }

        let p = b2.position();
        assert!((p - Vec2::new(3.0, 1.0)).length() < 0.05, "Body should settle on the target, got {p:?}");
        assert_eq!(b1.position(), Vec2::ZERO, "Ground must not move");
    }

    #[test]
    fn test_force_is_capped() {
        let mut b1 = ground();
        let mut b2 = ball_at(0.0, 0.0);
        let def = MouseJointDef {
            target: b2.position(),
            max_force: 1.0,
            ..Default::default()
        };
        let mut joint = create_joint(def, &b1, &b2);
        joint.as_mouse_mut().unwrap().set_target(Vec2::new(100.0, 0.0));

        let step = step(1.0 / 60.0);
        run_step(&mut joint, &step, &mut b1, &mut b2, Vec2::ZERO);

        let max_dv = step.dt * 1.0 / b2.mass();
        assert!(b2.linear_velocity().length() <= max_dv * 1.0001);
    }
}
