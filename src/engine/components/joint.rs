// Joint component: registers one joint between two simulated bodies

use log::{debug, warn};

use super::behavior::{DistanceBehavior, JointBehavior};
use crate::engine::physics::{BodyId, JointDef, JointId, PhysicsError, Simulation};
use crate::engine::render::{self, RenderContext};

/// Owns the registration of one joint with the simulation.
///
/// The component is the only place that adds or removes its joint, and both
/// directions are idempotent.
#[derive(Debug, Clone)]
pub struct JointComponent<J: JointBehavior> {
    name: String,
    body1: BodyId,
    body2: BodyId,
    behavior: J,
    collide_bodies: bool,
    joint: Option<JointId>,
    joint_def: Option<JointDef>,
}

impl<J: JointBehavior> JointComponent<J> {
    /// Both endpoints must already be simulating bodies
    pub fn new(
        name: &str,
        sim: &Simulation,
        body1: Option<BodyId>,
        body2: Option<BodyId>,
        behavior: J,
    ) -> Result<Self, PhysicsError> {
        let endpoint = |body: Option<BodyId>, which: &str| {
            body.filter(|id| sim.body(*id).is_some()).ok_or_else(|| {
                PhysicsError::InvalidEndpoint(format!("{which} of joint '{name}' is not in the simulation"))
            })
        };
        let body1 = endpoint(body1, "body1")?;
        let body2 = endpoint(body2, "body2")?;

        Ok(Self {
            name: name.to_string(),
            body1,
            body2,
            collide_bodies: behavior.default_collide_connected(),
            behavior,
            joint: None,
            joint_def: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build the definition from the bodies as they are now and register it.
    /// Does nothing when already simulating.
    pub fn start_simulation(&mut self, sim: &mut Simulation) -> Result<JointId, PhysicsError> {
        if let Some(id) = self.joint {
            if sim.joint(id).is_some() {
                return Ok(id);
            }
            warn!("Joint component '{}' lost {:?} with one of its bodies", self.name, id);
            self.joint = None;
        }

        let missing = |id: BodyId| PhysicsError::InvalidEndpoint(format!("{id:?} left the simulation"));
        let b1 = sim.body(self.body1).ok_or_else(|| missing(self.body1))?;
        let b2 = sim.body(self.body2).ok_or_else(|| missing(self.body2))?;

        let def = self
            .behavior
            .joint_def(b1, b2)?
            .bodies(self.body1, self.body2)
            .collide_connected(self.collide_bodies);

        let id = sim.add_joint(def.clone())?;
        self.joint = Some(id);
        self.joint_def = Some(def);
        debug!("Joint component '{}' started as {:?}", self.name, id);
        Ok(id)
    }

    /// Remove the joint. Body transforms are left alone.
    pub fn stop_simulation(&mut self, sim: &mut Simulation) {
        let Some(id) = self.joint.take() else {
            return;
        };

        match sim.remove_joint(id) {
            Ok(_) => debug!("Joint component '{}' stopped", self.name),
            // Removing a body takes its joints with it
            Err(err) => warn!("Joint component '{}' was already gone: {}", self.name, err),
        }
    }

    /// Is the joint this component registered still in `sim`
    pub fn is_simulating(&self, sim: &Simulation) -> bool {
        self.joint.is_some_and(|id| sim.joint(id).is_some())
    }

    pub fn joint(&self) -> Option<JointId> {
        self.joint
    }

    /// The definition used by the last start
    pub fn joint_def(&self) -> Option<&JointDef> {
        self.joint_def.as_ref()
    }

    pub fn body1(&self) -> BodyId {
        self.body1
    }

    pub fn body2(&self) -> BodyId {
        self.body2
    }

    pub fn behavior(&self) -> &J {
        &self.behavior
    }

    pub fn collide_bodies(&self) -> bool {
        self.collide_bodies
    }

    /// Takes effect on the next start
    pub fn set_collide_bodies(&mut self, collide: bool) {
        self.collide_bodies = collide;
    }

    /// Line between the two bodies when debug mode is on
    pub fn debug_draw(&self, sim: &Simulation, ctx: &mut dyn RenderContext) {
        if !render::debug_mode() || !self.is_simulating(sim) {
            return;
        }
        if let (Some(b1), Some(b2)) = (sim.body(self.body1), sim.body(self.body2)) {
            ctx.draw_line(b1.position(), b2.position(), render::WHITE);
        }
    }
}

impl JointComponent<DistanceBehavior> {
    pub fn frequency(&self) -> f32 {
        self.behavior.frequency_hz
    }

    /// Applies to the live joint too
    pub fn set_frequency(&mut self, sim: &mut Simulation, hz: f32) {
        self.behavior.frequency_hz = hz;
        if let Some(joint) = self.live_distance(sim) {
            joint.set_frequency(hz);
        }
    }

    pub fn damping_ratio(&self) -> f32 {
        self.behavior.damping_ratio
    }

    /// Applies to the live joint too
    pub fn set_damping_ratio(&mut self, sim: &mut Simulation, ratio: f32) {
        self.behavior.damping_ratio = ratio;
        if let Some(joint) = self.live_distance(sim) {
            joint.set_damping_ratio(ratio);
        }
    }

    /// Rest length of the live joint
    pub fn target_distance(&self, sim: &Simulation) -> Option<f32> {
        let joint = sim.joint(self.joint?)?;
        joint.as_distance().map(|distance| distance.length())
    }

    fn live_distance<'a>(
        &self,
        sim: &'a mut Simulation,
    ) -> Option<&'a mut crate::engine::physics::joints::DistanceJoint> {
        sim.joint_mut(self.joint?)?.as_distance_mut()
    }
}
