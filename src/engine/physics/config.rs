// Runtime simulation configuration

use glam::Vec2;

use crate::core::math::Aabb;

/// Default fixed timestep (60 steps per second)
pub const DEFAULT_TIMESTEP: f32 = 1.0 / 60.0;

/// Per-simulation tuning.
///
/// Everything here can differ between two simulations in the same process;
/// the process-wide constants live in `settings`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Gravity vector (default: -9.81 m/s² in y-axis)
    pub gravity: Vec2,

    /// Seconds advanced by one `Simulation::step`
    pub timestep: f32,

    /// Velocity solver iterations per step
    pub velocity_iterations: u32,

    /// Position solver iterations per step (upper bound, exits early when satisfied)
    pub position_iterations: u32,

    /// Seed the velocity solver with last step's impulses
    pub warm_starting: bool,

    /// Run the position solver at all
    pub position_correction: bool,

    /// Let still islands go to sleep
    pub allow_sleep: bool,

    /// Bodies whose bounds leave this box are frozen
    pub world_bounds: Aabb,
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self {
            gravity: Vec2::new(0.0, -9.81),
            timestep: DEFAULT_TIMESTEP,
            velocity_iterations: 10,
            position_iterations: 8,
            warm_starting: true,
            position_correction: true,
            allow_sleep: true,
            world_bounds: Aabb::new(Vec2::splat(-1000.0), Vec2::splat(1000.0)),
        }
    }

    pub fn gravity(mut self, x: f32, y: f32) -> Self {
        self.gravity = Vec2::new(x, y);
        self
    }

    pub fn timestep(mut self, dt: f32) -> Self {
        self.timestep = dt;
        self
    }

    pub fn iterations(mut self, velocity: u32, position: u32) -> Self {
        self.velocity_iterations = velocity;
        self.position_iterations = position;
        self
    }

    pub fn warm_starting(mut self, enabled: bool) -> Self {
        self.warm_starting = enabled;
        self
    }

    pub fn position_correction(mut self, enabled: bool) -> Self {
        self.position_correction = enabled;
        self
    }

    pub fn allow_sleep(mut self, allow: bool) -> Self {
        self.allow_sleep = allow;
        self
    }

    pub fn world_bounds(mut self, bounds: Aabb) -> Self {
        self.world_bounds = bounds;
        self
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}
