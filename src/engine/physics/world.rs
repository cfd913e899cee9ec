use std::collections::HashMap;

use glam::Vec2;
use log::{debug, trace, warn};
use slab::Slab;

use super::body::{Body, BodyDef, BodyFlags, BodyId};
use super::broad_phase::BroadPhase;
use super::collision::{CollisionEvent, CollisionEventQueue};
use super::config::SimulationConfig;
use super::island::{Island, IslandSettings, TimeStep};
use super::joints::{Joint, JointDef, JointId};
use super::pair_manager::PairCallback;
use super::settings::MAX_PROXIES;
use super::PhysicsError;
use crate::core::math::Aabb;

/// Two bodies whose bounds overlap and that are allowed to collide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactCandidate {
    pub body1: BodyId,
    pub body2: BodyId,
}

/// The physics world: owns bodies, joints and the broad phase and steps them
pub struct Simulation {
    config: SimulationConfig,
    bodies: Slab<Body>,
    joints: Slab<Joint>,
    broad_phase: BroadPhase,
    contacts: Slab<ContactCandidate>,
    collision_event_queue: CollisionEventQueue,
    body_to_entity: HashMap<BodyId, u64>,

    // Scratch reused by every step
    island: Island,
    stack: Vec<BodyId>,

    // Inverse of the previous step's dt
    inv_dt0: f32,

    // Last generation handed to a body or joint
    generation: u32,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            broad_phase: BroadPhase::new(config.world_bounds),
            config,
            bodies: Slab::new(),
            joints: Slab::new(),
            contacts: Slab::new(),
            collision_event_queue: CollisionEventQueue::new(),
            body_to_entity: HashMap::new(),
            island: Island::default(),
            stack: Vec::new(),
            inv_dt0: 0.0,
            generation: 0,
        }
    }

    /// Create a simulation with custom gravity and default everything else
    pub fn with_gravity(x: f32, y: f32) -> Self {
        Self::new(SimulationConfig::new().gravity(x, y))
    }

    /// Step the simulation forward by the configured timestep
    pub fn step(&mut self) {
        self.step_with(self.config.timestep);
    }

    /// Step the simulation forward by `dt` seconds
    pub fn step_with(&mut self, dt: f32) {
        // Clear previous frame's collision events
        self.collision_event_queue.clear();

        let mut step = TimeStep::new(
            dt,
            self.config.velocity_iterations,
            self.config.position_iterations,
            self.config.warm_starting,
        );
        step.dt_ratio = self.inv_dt0 * dt;

        if step.dt > 0.0 {
            self.solve(&step);
        }

        self.inv_dt0 = step.inv_dt;
    }

    fn solve(&mut self, step: &TimeStep) {
        let settings = IslandSettings {
            gravity: self.config.gravity,
            allow_sleep: self.config.allow_sleep,
            position_correction: self.config.position_correction,
        };

        for (_, body) in self.bodies.iter_mut() {
            body.flags.remove(BodyFlags::ISLAND);
        }
        for (_, joint) in self.joints.iter_mut() {
            joint.island_flag = false;
        }

        let mut moved = Vec::new();
        let seeds: Vec<usize> = self.bodies.iter().map(|(key, _)| key).collect();

        for seed in seeds {
            let seed = {
                let body = &mut self.bodies[seed];
                if body.is_static()
                    || body
                        .flags
                        .intersects(BodyFlags::ISLAND | BodyFlags::SLEEP | BodyFlags::FROZEN)
                {
                    continue;
                }
                body.flags.insert(BodyFlags::ISLAND);
                BodyId(seed, body.generation)
            };

            self.island.clear();
            self.stack.clear();
            self.stack.push(seed);

            // Depth first search through the joint graph
            while let Some(id) = self.stack.pop() {
                self.island.add_body(id);

                let body = &mut self.bodies[id.0];
                body.flags.remove(BodyFlags::SLEEP);

                // Static bodies do not carry the island across them
                if body.is_static() {
                    continue;
                }

                let attached = body.joints.clone();
                for joint_id in attached {
                    let Some(joint) = self.joints.get_mut(joint_id.0) else { continue };
                    if joint.island_flag {
                        continue;
                    }

                    let other_id = joint.other(id);
                    let Some(other) = self.bodies.get_mut(other_id.0) else { continue };
                    if other.is_frozen() {
                        continue;
                    }

                    joint.island_flag = true;
                    self.island.add_joint(joint_id);

                    if !other.flags.contains(BodyFlags::ISLAND) {
                        other.flags.insert(BodyFlags::ISLAND);
                        self.stack.push(other_id);
                    }
                }
            }

            self.island.solve(step, &settings, &mut self.bodies, &mut self.joints);

            // Static bodies may join other islands
            for id in self.island.bodies() {
                let body = &mut self.bodies[id.0];
                if body.is_static() {
                    body.flags.remove(BodyFlags::ISLAND);
                } else {
                    moved.push(*id);
                }
            }
        }

        trace!("Solved step of {} moving bodies", moved.len());

        for id in moved {
            self.synchronize_proxy(id);
        }

        let (broad_phase, mut filter) = self.split_pairs();
        broad_phase.commit(&mut filter);
    }

    /// Move a body's proxy to its current bounds, freezing it when it has
    /// left the world
    fn synchronize_proxy(&mut self, id: BodyId) {
        let Some(body) = self.bodies.get(id.0) else { return };
        let Some(proxy) = body.proxy else { return };
        let aabb = body.aabb();

        if self.broad_phase.in_range(&aabb) {
            self.broad_phase.move_proxy(proxy, aabb);
        } else {
            self.freeze(id);
        }
    }

    fn freeze(&mut self, id: BodyId) {
        let Some(body) = self.bodies.get_mut(id.0) else { return };
        warn!("Body {:?} left the world bounds and was frozen", id);

        body.flags.insert(BodyFlags::FROZEN);
        body.linear_velocity = Vec2::ZERO;
        body.angular_velocity = 0.0;

        if let Some(proxy) = body.proxy.take() {
            let (broad_phase, mut filter) = self.split_pairs();
            broad_phase.destroy_proxy(proxy, &mut filter);
        }
    }

    /// Borrow the broad phase next to a filter over everything else
    fn split_pairs(&mut self) -> (&mut BroadPhase, PairFilter<'_>) {
        let filter = PairFilter {
            bodies: &self.bodies,
            joints: &self.joints,
            contacts: &mut self.contacts,
            events: &mut self.collision_event_queue,
        };
        (&mut self.broad_phase, filter)
    }

    fn next_generation(&mut self) -> u32 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    /// Add a body. Bodies created outside the world bounds start frozen.
    pub fn add_body(&mut self, def: BodyDef) -> Result<BodyId, PhysicsError> {
        let mut body = Body::new(&def);
        body.generation = self.next_generation();
        let aabb = body.aabb();
        let id = BodyId(self.bodies.insert(body), self.generation);

        if !self.broad_phase.in_range(&aabb) {
            warn!("Body {:?} created outside the world bounds", id);
            self.bodies[id.0].flags.insert(BodyFlags::FROZEN);
            return Ok(id);
        }

        match self.broad_phase.create_proxy(aabb, id.0) {
            Ok(proxy) => {
                self.bodies[id.0].proxy = Some(proxy);
                debug!("Added body {:?} with proxy {:?}", id, proxy);
                Ok(id)
            }
            Err(err) => {
                warn!("Rejected body: {}", err);
                self.bodies.remove(id.0);
                Err(err)
            }
        }
    }

    /// Remove a body along with every joint attached to it
    pub fn remove_body(&mut self, id: BodyId) -> Result<Body, PhysicsError> {
        let attached = id
            .resolve(&self.bodies)
            .ok_or(PhysicsError::UnknownBody(id))?
            .joints
            .clone();

        for joint_id in attached {
            // A gear may already have gone with the joint it referenced
            if joint_id.resolve(&self.joints).is_some() {
                self.remove_joint(joint_id)?;
            }
        }

        if let Some(proxy) = self.bodies[id.0].proxy.take() {
            let (broad_phase, mut filter) = self.split_pairs();
            broad_phase.destroy_proxy(proxy, &mut filter);
        }

        self.body_to_entity.remove(&id);
        debug!("Removed body {:?}", id);
        Ok(self.bodies.remove(id.0))
    }

    /// The body behind `id`, None once it has been removed
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        id.resolve(&self.bodies)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        id.resolve_mut(&mut self.bodies)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &Body)> {
        self.bodies.iter().map(|(key, body)| (BodyId(key, body.generation), body))
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Teleport a body and update its proxy
    pub fn set_body_transform(
        &mut self,
        id: BodyId,
        position: Vec2,
        angle: f32,
    ) -> Result<(), PhysicsError> {
        let body = id.resolve_mut(&mut self.bodies).ok_or(PhysicsError::UnknownBody(id))?;
        if body.is_frozen() {
            return Ok(());
        }

        body.set_transform(position, angle);
        self.synchronize_proxy(id);
        Ok(())
    }

    /// Build a joint from its definition and attach it to both bodies
    pub fn add_joint(&mut self, def: impl Into<JointDef>) -> Result<JointId, PhysicsError> {
        let def = def.into();
        let mut joint = Joint::create(&def, &self.bodies, &self.joints)?;
        joint.generation = self.next_generation();
        let (body1, body2) = (joint.body1(), joint.body2());
        let collide_connected = joint.collide_connected();

        let id = JointId(self.joints.insert(joint), self.generation);
        for body_id in [body1, body2] {
            let body = &mut self.bodies[body_id.0];
            body.joints.push(id);
            body.wake_up();
        }

        if !collide_connected {
            self.refilter(body1, body2);
        }

        debug!("Added {:?} joint {:?}", def.joint_type(), id);
        Ok(id)
    }

    /// Detach and drop a joint. Gear joints built on top of it go first.
    pub fn remove_joint(&mut self, id: JointId) -> Result<Joint, PhysicsError> {
        if id.resolve(&self.joints).is_none() {
            return Err(PhysicsError::UnknownJoint(id));
        }

        let dependents: Vec<JointId> = self
            .joints()
            .filter(|(_, joint)| joint.references(id))
            .map(|(gear, _)| gear)
            .collect();
        for gear in dependents {
            self.remove_joint(gear)?;
        }

        let joint = self.joints.remove(id.0);
        let (body1, body2) = (joint.body1(), joint.body2());
        for body_id in [body1, body2] {
            if let Some(body) = self.bodies.get_mut(body_id.0) {
                body.joints.retain(|j| *j != id);
                body.wake_up();
            }
        }

        if !joint.collide_connected() {
            self.refilter(body1, body2);
        }

        debug!("Removed {:?} joint {:?}", joint.joint_type(), id);
        Ok(joint)
    }

    /// Recreate one body's proxy so its pairs go through the filter again
    fn refilter(&mut self, body1: BodyId, body2: BodyId) {
        let target = match self.bodies.get(body1.0) {
            Some(b1) if b1.is_dynamic() && b1.proxy.is_some() => body1,
            _ => body2,
        };
        let Some(body) = self.bodies.get_mut(target.0) else { return };
        let Some(proxy) = body.proxy.take() else { return };
        let aabb = body.aabb();

        let (broad_phase, mut filter) = self.split_pairs();
        broad_phase.destroy_proxy(proxy, &mut filter);

        match self.broad_phase.create_proxy(aabb, target.0) {
            Ok(proxy) => self.bodies[target.0].proxy = Some(proxy),
            // The slot freed above is reused, so this only fails on a corrupt pool
            Err(err) => {
                warn!("Refiltering body {:?} failed: {}", target, err);
                self.freeze(target);
            }
        }
    }

    /// The joint behind `id`, None once it has been removed
    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        id.resolve(&self.joints)
    }

    pub fn joint_mut(&mut self, id: JointId) -> Option<&mut Joint> {
        id.resolve_mut(&mut self.joints)
    }

    pub fn joints(&self) -> impl Iterator<Item = (JointId, &Joint)> {
        self.joints.iter().map(|(key, joint)| (JointId(key, joint.generation), joint))
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Move a mouse joint's target and wake the dragged body
    pub fn set_mouse_target(&mut self, id: JointId, target: Vec2) -> Result<(), PhysicsError> {
        let joint = id.resolve_mut(&mut self.joints).ok_or(PhysicsError::UnknownJoint(id))?;
        let body2 = joint.body2();
        let mouse = joint
            .as_mouse_mut()
            .ok_or_else(|| PhysicsError::InvalidEndpoint(format!("{id:?} is not a mouse joint")))?;
        mouse.set_target(target);

        if let Some(body) = self.bodies.get_mut(body2.0) {
            body.wake_up();
        }
        Ok(())
    }

    /// Bodies whose proxies overlap `aabb`
    pub fn query(&mut self, aabb: &Aabb) -> Vec<BodyId> {
        let keys = self.broad_phase.query(aabb, MAX_PROXIES);
        keys.into_iter()
            .filter_map(|key| self.bodies.get(key).map(|body| BodyId(key, body.generation)))
            .collect()
    }

    /// Pairs that started or stopped overlapping during the last step
    pub fn collision_events(&self) -> &[CollisionEvent] {
        self.collision_event_queue.events()
    }

    /// Overlapping body pairs that passed filtering
    pub fn contacts(&self) -> impl Iterator<Item = &ContactCandidate> {
        self.contacts.iter().map(|(_, contact)| contact)
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    pub fn broad_phase(&self) -> &BroadPhase {
        &self.broad_phase
    }

    /// Associate a game entity ID with a body
    pub fn set_entity_mapping(&mut self, body: BodyId, entity_id: u64) {
        self.body_to_entity.insert(body, entity_id);
    }

    /// Get the entity ID associated with a body
    pub fn entity_id(&self, body: BodyId) -> Option<u64> {
        self.body_to_entity.get(&body).copied()
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.config.gravity = gravity;
    }

    pub fn gravity(&self) -> Vec2 {
        self.config.gravity
    }

    pub fn set_timestep(&mut self, dt: f32) {
        self.config.timestep = dt;
    }

    pub fn timestep(&self) -> f32 {
        self.config.timestep
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SimulationConfig {
        &mut self.config
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

/// Decides which broad-phase pairs become contacts and records the events
struct PairFilter<'a> {
    bodies: &'a Slab<Body>,
    joints: &'a Slab<Joint>,
    contacts: &'a mut Slab<ContactCandidate>,
    events: &'a mut CollisionEventQueue,
}

impl PairFilter<'_> {
    fn should_collide(&self, id1: BodyId, id2: BodyId) -> bool {
        let (Some(b1), Some(b2)) = (id1.resolve(self.bodies), id2.resolve(self.bodies)) else {
            return false;
        };

        if b1.is_static() && b2.is_static() {
            return false;
        }

        // Joints that do not collide their bodies suppress the pair
        let connected = b1.joints.iter().any(|joint_id| {
            self.joints
                .get(joint_id.0)
                .is_some_and(|joint| joint.other(id1) == id2 && !joint.collide_connected())
        });
        if connected {
            return false;
        }

        b1.filter().should_collide(b2.filter())
    }
}

impl PairCallback for PairFilter<'_> {
    fn pair_added(&mut self, user_data1: usize, user_data2: usize) -> Option<usize> {
        let body1 = BodyId(user_data1, self.bodies.get(user_data1)?.generation);
        let body2 = BodyId(user_data2, self.bodies.get(user_data2)?.generation);
        if !self.should_collide(body1, body2) {
            return None;
        }

        self.events.push(CollisionEvent::Started { body1, body2 });
        Some(self.contacts.insert(ContactCandidate { body1, body2 }))
    }

    fn pair_removed(&mut self, _user_data1: usize, _user_data2: usize, pair_data: Option<usize>) {
        let Some(contact) = pair_data.and_then(|key| self.contacts.try_remove(key)) else {
            return;
        };
        self.events.push(CollisionEvent::Stopped {
            body1: contact.body1,
            body2: contact.body2,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::physics::body::Shape;
    use crate::engine::physics::collision::CollisionFilter;
    use crate::engine::physics::joints::{DistanceJointDef, GearJointDef, MouseJointDef, RevoluteJointDef};
    use approx::assert_relative_eq;

    fn zero_g() -> Simulation {
        Simulation::new(SimulationConfig::new().gravity(0.0, 0.0))
    }

    fn ball(sim: &mut Simulation, x: f32, y: f32) -> BodyId {
        sim.add_body(BodyDef::dynamic(Shape::ball(0.5)).position(x, y)).unwrap()
    }

    #[test]
    fn test_stale_ids_do_not_reach_reused_slots() {
        let mut sim = zero_g();
        let a = ball(&mut sim, 0.0, 0.0);
        let b = ball(&mut sim, 3.0, 0.0);

        sim.remove_body(b).unwrap();
        let c = ball(&mut sim, 6.0, 0.0);
        assert_eq!(b.index(), c.index());
        assert!(sim.body(b).is_none());
        assert!(matches!(sim.remove_body(b), Err(PhysicsError::UnknownBody(_))));
        assert!(matches!(
            sim.add_joint(JointDef::from(DistanceJointDef::default()).bodies(a, b)),
            Err(PhysicsError::MissingBody)
        ));

        let mut def = DistanceJointDef::default();
        def.initialize(sim.body(a).unwrap(), sim.body(c).unwrap(), Vec2::ZERO, Vec2::new(6.0, 0.0));
        let old = sim.add_joint(JointDef::from(def.clone()).bodies(a, c)).unwrap();
        sim.remove_joint(old).unwrap();
        let new = sim.add_joint(JointDef::from(def).bodies(a, c)).unwrap();
        assert_eq!(old.index(), new.index());
        assert!(matches!(sim.remove_joint(old), Err(PhysicsError::UnknownJoint(_))));
        assert!(sim.joint(new).is_some());
        assert_eq!(sim.body(a).unwrap().joints().len(), 1);
    }

    #[test]
    fn test_body_falls_under_gravity() {
        let mut sim = Simulation::default();
        let id = ball(&mut sim, 0.0, 10.0);

        for _ in 0..60 {
            sim.step();
        }

        let body = sim.body(id).unwrap();
        assert!(body.position().y < 6.0);
        assert_relative_eq!(body.position().x, 0.0);
    }

    #[test]
    fn test_overlapping_bodies_start_and_stop() {
        let mut sim = zero_g();
        let a = ball(&mut sim, 0.0, 0.0);
        let b = ball(&mut sim, 0.5, 0.0);

        sim.step();
        assert_eq!(sim.contact_count(), 1);
        assert!(matches!(
            sim.collision_events(),
            [CollisionEvent::Started { .. }]
        ));

        sim.set_body_transform(b, Vec2::new(10.0, 0.0), 0.0).unwrap();
        sim.step();
        assert_eq!(sim.contact_count(), 0);
        let stopped = sim
            .collision_events()
            .iter()
            .find(|event| matches!(event, CollisionEvent::Stopped { .. }))
            .expect("Moving apart should report a stop");
        let (x, y) = stopped.bodies();
        assert!((x, y) == (a, b) || (x, y) == (b, a));
    }

    #[test]
    fn test_static_pairs_are_ignored() {
        let mut sim = zero_g();
        sim.add_body(BodyDef::fixed(Shape::cuboid(1.0, 1.0))).unwrap();
        sim.add_body(BodyDef::fixed(Shape::cuboid(1.0, 1.0)).position(0.5, 0.0))
            .unwrap();

        sim.step();
        assert_eq!(sim.contact_count(), 0);
        assert!(sim.collision_events().is_empty());
    }

    #[test]
    fn test_filter_masks_suppress_contacts() {
        let mut sim = zero_g();
        sim.add_body(
            BodyDef::dynamic(Shape::ball(0.5)).filter(CollisionFilter::new(0x0002, 0xFFFD)),
        )
        .unwrap();
        sim.add_body(
            BodyDef::dynamic(Shape::ball(0.5))
                .position(0.2, 0.0)
                .filter(CollisionFilter::new(0x0002, 0xFFFD)),
        )
        .unwrap();

        sim.step();
        assert_eq!(sim.contact_count(), 0);
    }

    #[test]
    fn test_joint_suppresses_contact_until_removed() {
        let mut sim = zero_g();
        let a = ball(&mut sim, 0.0, 0.0);
        let b = ball(&mut sim, 0.5, 0.0);
        sim.step();
        assert_eq!(sim.contact_count(), 1);

        let mut def = DistanceJointDef::default();
        def.initialize(
            sim.body(a).unwrap(),
            sim.body(b).unwrap(),
            Vec2::new(0.0, 0.0),
            Vec2::new(0.5, 0.0),
        );
        let joint = sim.add_joint(JointDef::from(def).bodies(a, b)).unwrap();
        assert_eq!(sim.contact_count(), 0, "Joint should drop the existing contact");

        sim.step();
        assert_eq!(sim.contact_count(), 0);

        sim.remove_joint(joint).unwrap();
        sim.step();
        assert_eq!(sim.contact_count(), 1);
    }

    #[test]
    fn test_collide_connected_keeps_contact() {
        let mut sim = zero_g();
        let a = ball(&mut sim, 0.0, 0.0);
        let b = ball(&mut sim, 0.5, 0.0);

        let mut def = DistanceJointDef::default();
        def.initialize(
            sim.body(a).unwrap(),
            sim.body(b).unwrap(),
            Vec2::new(0.0, 0.0),
            Vec2::new(0.5, 0.0),
        );
        sim.add_joint(JointDef::from(def).bodies(a, b).collide_connected(true))
            .unwrap();

        sim.step();
        assert_eq!(sim.contact_count(), 1);
    }

    #[test]
    fn test_joint_links_bodies_and_unlinks_on_remove() {
        let mut sim = Simulation::default();
        let ground = sim.add_body(BodyDef::fixed(Shape::cuboid(5.0, 0.5))).unwrap();
        let bob = ball(&mut sim, 0.0, -3.0);

        let mut def = RevoluteJointDef::default();
        def.initialize(sim.body(ground).unwrap(), sim.body(bob).unwrap(), Vec2::ZERO);
        let joint = sim.add_joint(JointDef::from(def).bodies(ground, bob)).unwrap();

        assert_eq!(sim.body(ground).unwrap().joints(), &[joint]);
        assert_eq!(sim.body(bob).unwrap().joints(), &[joint]);
        assert_eq!(sim.joint_count(), 1);

        sim.remove_joint(joint).unwrap();
        assert!(sim.body(bob).unwrap().joints().is_empty());
        assert!(matches!(sim.remove_joint(joint), Err(PhysicsError::UnknownJoint(_))));
    }

    #[test]
    fn test_pendulum_keeps_its_length() {
        let mut sim = Simulation::default();
        let ground = sim.add_body(BodyDef::fixed(Shape::cuboid(0.5, 0.5))).unwrap();
        let bob = ball(&mut sim, 3.0, 0.0);

        let mut def = DistanceJointDef::default();
        def.initialize(
            sim.body(ground).unwrap(),
            sim.body(bob).unwrap(),
            Vec2::ZERO,
            Vec2::new(3.0, 0.0),
        );
        sim.add_joint(JointDef::from(def).bodies(ground, bob)).unwrap();

        for _ in 0..120 {
            sim.step();
        }

        let length = sim.body(bob).unwrap().position().length();
        assert_relative_eq!(length, 3.0, epsilon = 0.05);
    }

    #[test]
    fn test_removing_body_removes_its_joints() {
        let mut sim = Simulation::default();
        let ground = sim.add_body(BodyDef::fixed(Shape::cuboid(5.0, 0.5))).unwrap();
        let wheel1 = ball(&mut sim, -2.0, 2.0);
        let wheel2 = ball(&mut sim, 2.0, 2.0);

        let hinge = |sim: &mut Simulation, body: BodyId| {
            let mut def = RevoluteJointDef::default();
            let anchor = sim.body(body).unwrap().position();
            def.initialize(sim.body(ground).unwrap(), sim.body(body).unwrap(), anchor);
            sim.add_joint(JointDef::from(def).bodies(ground, body)).unwrap()
        };
        let j1 = hinge(&mut sim, wheel1);
        let j2 = hinge(&mut sim, wheel2);

        let gear = GearJointDef {
            joint1: Some(j1),
            joint2: Some(j2),
            ratio: 1.0,
        };
        sim.add_joint(gear).unwrap();
        assert_eq!(sim.joint_count(), 3);

        sim.remove_body(wheel1).unwrap();
        assert_eq!(sim.joint_count(), 1, "Hinge and gear of the removed wheel should go");
        assert!(sim.joint(j2).is_some());
        assert_eq!(sim.body(wheel2).unwrap().joints(), &[j2]);
        assert!(sim.body(wheel1).is_none());
    }

    #[test]
    fn test_idle_bodies_fall_asleep_and_wake_on_impulse() {
        let mut sim = zero_g();
        let id = ball(&mut sim, 0.0, 0.0);

        for _ in 0..60 {
            sim.step();
        }
        assert!(sim.body(id).unwrap().is_sleeping());

        sim.body_mut(id)
            .unwrap()
            .apply_impulse(Vec2::new(1.0, 0.0), Vec2::ZERO);
        assert!(!sim.body(id).unwrap().is_sleeping());
        sim.step();
        assert!(sim.body(id).unwrap().position().x > 0.0);
    }

    #[test]
    fn test_body_leaving_world_freezes() {
        let config = SimulationConfig::new()
            .gravity(0.0, 0.0)
            .world_bounds(Aabb::new(Vec2::new(-10.0, -10.0), Vec2::new(10.0, 10.0)));
        let mut sim = Simulation::new(config);
        let id = sim
            .add_body(BodyDef::dynamic(Shape::ball(0.5)).linvel(200.0, 0.0))
            .unwrap();

        for _ in 0..10 {
            sim.step();
        }

        let body = sim.body(id).unwrap();
        assert!(body.is_frozen());
        assert!(body.proxy().is_none());
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
    }

    #[test]
    fn test_mouse_target_wakes_body() {
        let mut sim = zero_g();
        let ground = sim.add_body(BodyDef::fixed(Shape::cuboid(0.5, 0.5)).position(0.0, -5.0)).unwrap();
        let id = sim
            .add_body(BodyDef::dynamic(Shape::ball(0.5)).sleeping(true))
            .unwrap();

        let def = MouseJointDef {
            target: Vec2::ZERO,
            max_force: 1000.0,
            ..Default::default()
        };
        let joint = sim.add_joint(JointDef::from(def).bodies(ground, id)).unwrap();

        sim.body_mut(id).unwrap().put_to_sleep();
        sim.set_mouse_target(joint, Vec2::new(2.0, 0.0)).unwrap();
        assert!(!sim.body(id).unwrap().is_sleeping());

        for _ in 0..120 {
            sim.step();
        }
        assert_relative_eq!(sim.body(id).unwrap().position().x, 2.0, epsilon = 0.05);
    }

    #[test]
    fn test_query_and_entity_mapping() {
        let mut sim = zero_g();
        let a = ball(&mut sim, 0.0, 0.0);
        ball(&mut sim, 20.0, 0.0);
        sim.set_entity_mapping(a, 42);

        let hits = sim.query(&Aabb::from_center_half_extents(Vec2::ZERO, Vec2::splat(1.0)));
        assert_eq!(hits, vec![a]);
        assert_eq!(sim.entity_id(a), Some(42));

        sim.remove_body(a).unwrap();
        assert_eq!(sim.entity_id(a), None);
        assert!(matches!(sim.remove_body(a), Err(PhysicsError::UnknownBody(_))));
    }

    #[test]
    fn test_proxy_capacity_rejects_body() {
        let mut sim = zero_g();
        for i in 0..MAX_PROXIES {
            let x = (i % 32) as f32 * 3.0 - 48.0;
            let y = (i / 32) as f32 * 3.0 - 48.0;
            ball(&mut sim, x, y);
        }

        let result = sim.add_body(BodyDef::dynamic(Shape::ball(0.5)));
        assert!(matches!(result, Err(PhysicsError::ProxyCapacity(_))));
        assert_eq!(sim.body_count(), MAX_PROXIES);
    }
}
