// Island solver: integrates and constrains one connected group of bodies

use glam::Vec2;
use slab::Slab;

use super::body::{Body, BodyFlags, BodyId};
use super::joints::{Joint, JointId};
use super::settings::{
    ANGULAR_SLEEP_TOLERANCE, LINEAR_SLEEP_TOLERANCE, MAX_ANGULAR_VELOCITY, MAX_LINEAR_VELOCITY,
    TIME_TO_SLEEP,
};
use crate::core::math::clamp;

/// Parameters of one simulation step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStep {
    pub dt: f32,
    pub inv_dt: f32,
    /// `dt` of this step over `dt` of the previous one, scales warm-start impulses
    pub dt_ratio: f32,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub warm_starting: bool,
}

impl TimeStep {
    pub fn new(dt: f32, velocity_iterations: u32, position_iterations: u32, warm_starting: bool) -> Self {
        Self {
            dt,
            inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
            dt_ratio: 1.0,
            velocity_iterations,
            position_iterations,
            warm_starting,
        }
    }
}

/// Global knobs an island needs besides the step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IslandSettings {
    pub gravity: Vec2,
    pub allow_sleep: bool,
    pub position_correction: bool,
}

/// Bodies and joints connected through joints, solved together
#[derive(Debug, Default)]
pub struct Island {
    pub(crate) bodies: Vec<BodyId>,
    pub(crate) joints: Vec<JointId>,
}

impl Island {
    pub fn with_capacity(body_capacity: usize, joint_capacity: usize) -> Self {
        Self {
            bodies: Vec::with_capacity(body_capacity),
            joints: Vec::with_capacity(joint_capacity),
        }
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
        self.joints.clear();
    }

    pub fn add_body(&mut self, id: BodyId) {
        self.bodies.push(id);
    }

    pub fn add_joint(&mut self, id: JointId) {
        self.joints.push(id);
    }

    pub fn bodies(&self) -> &[BodyId] {
        &self.bodies
    }

    pub fn joints(&self) -> &[JointId] {
        &self.joints
    }

    /// Step the island. Every joint is prepared before any is warm started
    /// or solved, and the velocity pass finishes before the position pass
    /// starts.
    pub fn solve(
        &self,
        step: &TimeStep,
        settings: &IslandSettings,
        bodies: &mut Slab<Body>,
        joints: &mut Slab<Joint>,
    ) {
        // Integrate velocities
        for id in &self.bodies {
            let Some(b) = bodies.get_mut(id.0) else { continue };
            if b.is_static() {
                continue;
            }

            b.linear_velocity += step.dt * (settings.gravity + b.inv_mass * b.force);
            b.angular_velocity += step.dt * b.inv_inertia * b.torque;

            b.linear_velocity *= clamp(1.0 - step.dt * b.linear_damping, 0.0, 1.0);
            b.angular_velocity *= clamp(1.0 - step.dt * b.angular_damping, 0.0, 1.0);
        }

        for id in &self.joints {
            with_bodies(joints, bodies, *id, |joint, b1, b2| {
                joint.init_velocity_constraints(step, b1, b2)
            });
        }

        // Impulses were zeroed during init when warm starting is off
        for id in &self.joints {
            with_bodies(joints, bodies, *id, |joint, b1, b2| joint.warm_start(b1, b2));
        }

        for _ in 0..step.velocity_iterations {
            for id in &self.joints {
                with_bodies(joints, bodies, *id, |joint, b1, b2| {
                    joint.solve_velocity_constraints(step, b1, b2)
                });
            }
        }

        // Integrate positions
        for id in &self.bodies {
            let Some(b) = bodies.get_mut(id.0) else { continue };
            if b.is_static() {
                continue;
            }

            if b.linear_velocity.length_squared() > MAX_LINEAR_VELOCITY * MAX_LINEAR_VELOCITY {
                b.linear_velocity = b.linear_velocity.normalize_or_zero() * MAX_LINEAR_VELOCITY;
            }
            b.angular_velocity = clamp(b.angular_velocity, -MAX_ANGULAR_VELOCITY, MAX_ANGULAR_VELOCITY);

            b.center += step.dt * b.linear_velocity;
            b.angle += step.dt * b.angular_velocity;
            b.synchronize_transform();

            b.force = Vec2::ZERO;
            b.torque = 0.0;
        }

        if settings.position_correction {
            for id in &self.joints {
                if let Some(joint) = joints.get_mut(id.0) {
                    joint.init_position_constraints();
                }
            }

            for iteration in 0..step.position_iterations {
                let mut joints_okay = true;
                for id in &self.joints {
                    let ok = with_bodies(joints, bodies, *id, |joint, b1, b2| {
                        joint.solve_position_constraints(b1, b2)
                    });
                    joints_okay &= ok.unwrap_or(true);
                }

                if joints_okay {
                    log::trace!("Island positions converged after {} iterations", iteration + 1);
                    break;
                }
            }
        }

        if settings.allow_sleep {
            self.update_sleep(step, bodies);
        }
    }

    /// Put the whole island to sleep once every body has been still long enough
    fn update_sleep(&self, step: &TimeStep, bodies: &mut Slab<Body>) {
        let mut min_sleep_time = f32::MAX;

        let linear_tolerance_sqr = LINEAR_SLEEP_TOLERANCE * LINEAR_SLEEP_TOLERANCE;
        let angular_tolerance_sqr = ANGULAR_SLEEP_TOLERANCE * ANGULAR_SLEEP_TOLERANCE;

        for id in &self.bodies {
            let Some(b) = bodies.get_mut(id.0) else { continue };
            if b.inv_mass == 0.0 {
                continue;
            }

            if !b.flags.contains(BodyFlags::ALLOW_SLEEP)
                || b.angular_velocity * b.angular_velocity > angular_tolerance_sqr
                || b.linear_velocity.length_squared() > linear_tolerance_sqr
            {
                b.sleep_time = 0.0;
                min_sleep_time = 0.0;
            } else {
                b.sleep_time += step.dt;
                min_sleep_time = min_sleep_time.min(b.sleep_time);
            }
        }

        if min_sleep_time >= TIME_TO_SLEEP {
            for id in &self.bodies {
                if let Some(b) = bodies.get_mut(id.0) {
                    if !b.is_static() {
                        b.put_to_sleep();
                    }
                }
            }
            log::trace!("Island of {} bodies went to sleep", self.bodies.len());
        }
    }
}

/// Run `f` on a joint and mutable borrows of both its bodies
fn with_bodies<R>(
    joints: &mut Slab<Joint>,
    bodies: &mut Slab<Body>,
    id: JointId,
    f: impl FnOnce(&mut Joint, &mut Body, &mut Body) -> R,
) -> Option<R> {
    let joint = joints.get_mut(id.0)?;
    let (b1, b2) = bodies.get2_mut(joint.body1().0, joint.body2().0)?;
    Some(f(joint, b1, b2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::physics::body::{BodyDef, Shape};
    use crate::engine::physics::joints::{DistanceJointDef, JointDef};
    use approx::assert_relative_eq;

    fn settings(gravity: Vec2) -> IslandSettings {
        IslandSettings {
            gravity,
            allow_sleep: true,
            position_correction: true,
        }
    }

    #[test]
    fn test_time_step_inverse() {
        let step = TimeStep::new(0.5, 10, 8, true);
        assert_eq!(step.inv_dt, 2.0);
        assert_eq!(step.dt_ratio, 1.0);

        let paused = TimeStep::new(0.0, 10, 8, true);
        assert_eq!(paused.inv_dt, 0.0);
    }

    #[test]
    fn test_free_fall() {
        let mut bodies = Slab::new();
        let mut joints = Slab::new();
        let id = BodyId(bodies.insert(Body::new(&BodyDef::dynamic(Shape::ball(0.5)).position(0.0, 10.0))), 0);

        let mut island = Island::default();
        island.add_body(id);

        let step = TimeStep::new(0.1, 10, 8, true);
        island.solve(&step, &settings(Vec2::new(0.0, -10.0)), &mut bodies, &mut joints);

        let body = &bodies[id.0];
        assert_relative_eq!(body.linear_velocity().y, -1.0);
        assert_relative_eq!(body.position().y, 9.9);
    }

    #[test]
    fn test_static_bodies_do_not_move() {
        let mut bodies = Slab::new();
        let mut joints = Slab::new();
        let id = BodyId(bodies.insert(Body::new(&BodyDef::fixed(Shape::cuboid(1.0, 1.0)))), 0);

        let mut island = Island::default();
        island.add_body(id);
        island.solve(
            &TimeStep::new(0.1, 10, 8, true),
            &settings(Vec2::new(0.0, -10.0)),
            &mut bodies,
            &mut joints,
        );

        assert_eq!(bodies[id.0].position(), Vec2::ZERO);
    }

    #[test]
    fn test_velocity_is_clamped() {
        let mut bodies = Slab::new();
        let mut joints = Slab::new();
        let body = Body::new(&BodyDef::dynamic(Shape::ball(0.5)).linvel(10_000.0, 0.0).angvel(10_000.0));
        let id = BodyId(bodies.insert(body), 0);

        let mut island = Island::default();
        island.add_body(id);
        island.solve(&TimeStep::new(0.01, 10, 8, true), &settings(Vec2::ZERO), &mut bodies, &mut joints);

        assert_relative_eq!(bodies[id.0].linear_velocity().x, MAX_LINEAR_VELOCITY);
        assert_relative_eq!(bodies[id.0].angular_velocity(), MAX_ANGULAR_VELOCITY);
    }

    #[test]
    fn test_still_island_goes_to_sleep() {
        let mut bodies = Slab::new();
        let mut joints = Slab::new();
        let a = BodyId(bodies.insert(Body::new(&BodyDef::dynamic(Shape::ball(0.5)))), 0);
        let b = BodyId(bodies.insert(Body::new(&BodyDef::dynamic(Shape::ball(0.5)).position(2.0, 0.0))), 0);

        let mut def = DistanceJointDef::default();
        def.initialize(&bodies[a.0], &bodies[b.0], Vec2::ZERO, Vec2::new(2.0, 0.0));
        let joint = Joint::create(&JointDef::from(def).bodies(a, b), &bodies, &joints).unwrap();
        let j = JointId(joints.insert(joint), 0);

        let mut island = Island::default();
        island.add_body(a);
        island.add_body(b);
        island.add_joint(j);

        let step = TimeStep::new(1.0 / 60.0, 10, 8, true);
        let settings = settings(Vec2::ZERO);
        for _ in 0..20 {
            island.solve(&step, &settings, &mut bodies, &mut joints);
        }
        assert!(!bodies[a.0].is_sleeping(), "Not still for long enough yet");

        for _ in 0..20 {
            island.solve(&step, &settings, &mut bodies, &mut joints);
        }
        assert!(bodies[a.0].is_sleeping());
        assert!(bodies[b.0].is_sleeping());
    }

    #[test]
    fn test_body_that_cannot_sleep_keeps_island_awake() {
        let mut bodies = Slab::new();
        let mut joints = Slab::new();
        let a = BodyId(bodies.insert(Body::new(&BodyDef::dynamic(Shape::ball(0.5)))), 0);
        let b = BodyId(bodies.insert(Body::new(&BodyDef::dynamic(Shape::ball(0.5)).can_sleep(false))), 0);

        let mut island = Island::default();
        island.add_body(a);
        island.add_body(b);

        let step = TimeStep::new(1.0 / 60.0, 10, 8, true);
        for _ in 0..120 {
            island.solve(&step, &settings(Vec2::ZERO), &mut bodies, &mut joints);
        }
        assert!(!bodies[a.0].is_sleeping());
        assert!(!bodies[b.0].is_sleeping());
    }

    #[test]
    fn test_forces_are_consumed() {
        let mut bodies = Slab::new();
        let mut joints = Slab::new();
        let id = BodyId(bodies.insert(Body::new(&BodyDef::dynamic(Shape::cuboid(0.5, 0.5)))), 0);
        bodies[id.0].apply_force(Vec2::new(10.0, 0.0), Vec2::ZERO);

        let mut island = Island::default();
        island.add_body(id);
        island.solve(&TimeStep::new(0.1, 10, 8, true), &settings(Vec2::ZERO), &mut bodies, &mut joints);

        // mass 1, so dv = 10 * 0.1
        assert_relative_eq!(bodies[id.0].linear_velocity().x, 1.0);
        assert_eq!(bodies[id.0].force, Vec2::ZERO);
    }
}
