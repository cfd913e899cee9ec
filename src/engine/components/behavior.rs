// Joint behaviors: build a joint definition from the bodies' current state

use glam::Vec2;

use crate::engine::physics::joints::{
    DistanceJointDef, PrismaticJointDef, PulleyJointDef, RevoluteJointDef,
};
use crate::engine::physics::{Body, JointDef, PhysicsError};

/// Per-kind part of a joint component.
///
/// `joint_def` runs when the component starts, so anchors come from where
/// the bodies are at that moment rather than where they were when the
/// component was built.
pub trait JointBehavior {
    fn joint_def(&self, body1: &Body, body2: &Body) -> Result<JointDef, PhysicsError>;

    fn default_collide_connected(&self) -> bool {
        false
    }
}

/// Keeps the two body origins at the distance they had on start
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DistanceBehavior {
    pub frequency_hz: f32,
    pub damping_ratio: f32,
}

impl DistanceBehavior {
    pub fn soft(frequency_hz: f32, damping_ratio: f32) -> Self {
        Self {
            frequency_hz,
            damping_ratio,
        }
    }
}

impl JointBehavior for DistanceBehavior {
    fn joint_def(&self, body1: &Body, body2: &Body) -> Result<JointDef, PhysicsError> {
        let mut def = DistanceJointDef {
            frequency_hz: self.frequency_hz,
            damping_ratio: self.damping_ratio,
            ..Default::default()
        };
        def.initialize(body1, body2, body1.position(), body2.position());
        Ok(def.into())
    }
}

/// Hinge at a world point, body2's origin unless given
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RevoluteBehavior {
    pub anchor: Option<Vec2>,
    /// Lower and upper angle in radians
    pub limits: Option<(f32, f32)>,
    /// Speed in radians per second and maximum torque
    pub motor: Option<(f32, f32)>,
}

impl JointBehavior for RevoluteBehavior {
    fn joint_def(&self, body1: &Body, body2: &Body) -> Result<JointDef, PhysicsError> {
        let mut def = RevoluteJointDef::default();
        def.initialize(body1, body2, self.anchor.unwrap_or(body2.position()));

        if let Some((lower, upper)) = self.limits {
            def.enable_limit = true;
            def.lower_angle = lower;
            def.upper_angle = upper;
        }
        if let Some((speed, max_torque)) = self.motor {
            def.enable_motor = true;
            def.motor_speed = speed;
            def.max_motor_torque = max_torque;
        }
        Ok(def.into())
    }
}

/// Slider along a world axis through body2's origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrismaticBehavior {
    pub axis: Vec2,
    /// Lower and upper translation
    pub limits: Option<(f32, f32)>,
    /// Speed and maximum force
    pub motor: Option<(f32, f32)>,
}

impl PrismaticBehavior {
    pub fn along(axis: Vec2) -> Self {
        Self {
            axis,
            limits: None,
            motor: None,
        }
    }
}

impl Default for PrismaticBehavior {
    fn default() -> Self {
        Self::along(Vec2::X)
    }
}

impl JointBehavior for PrismaticBehavior {
    fn joint_def(&self, body1: &Body, body2: &Body) -> Result<JointDef, PhysicsError> {
        let axis = self.axis.try_normalize().ok_or_else(|| {
            PhysicsError::InvalidEndpoint(format!("Prismatic axis {} has no direction", self.axis))
        })?;

        let mut def = PrismaticJointDef::default();
        def.initialize(body1, body2, body2.position(), axis);

        if let Some((lower, upper)) = self.limits {
            def.enable_limit = true;
            def.lower_translation = lower;
            def.upper_translation = upper;
        }
        if let Some((speed, max_force)) = self.motor {
            def.enable_motor = true;
            def.motor_speed = speed;
            def.max_motor_force = max_force;
        }
        Ok(def.into())
    }
}

/// Both bodies hang from fixed ground points by their origins
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulleyBehavior {
    pub ground_anchor1: Vec2,
    pub ground_anchor2: Vec2,
    pub ratio: f32,
}

impl JointBehavior for PulleyBehavior {
    fn joint_def(&self, body1: &Body, body2: &Body) -> Result<JointDef, PhysicsError> {
        if self.ratio <= 0.0 || !self.ratio.is_finite() {
            return Err(PhysicsError::InvalidRatio(self.ratio));
        }

        let mut def = PulleyJointDef::default();
        def.initialize(
            body1,
            body2,
            self.ground_anchor1,
            self.ground_anchor2,
            body1.position(),
            body2.position(),
            self.ratio,
        );
        Ok(def.into())
    }

    fn default_collide_connected(&self) -> bool {
        true
    }
}
