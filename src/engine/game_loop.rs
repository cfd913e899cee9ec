/// Game loop timing and control system
///
/// Fixed timestep for the simulation, variable rate for everything else.
/// Frame time is accumulated and spent in whole simulation steps; the
/// remainder is exposed as an interpolation alpha.
use std::time::{Duration, Instant};

use crate::engine::physics::config::DEFAULT_TIMESTEP;
use crate::engine::physics::Simulation;

/// Target simulation rate (60 steps per second)
pub const FIXED_TIMESTEP: f32 = DEFAULT_TIMESTEP;

/// Maximum number of physics steps per frame to prevent spiral of death
pub const MAX_PHYSICS_STEPS: u32 = 5;

/// Game loop timing state
pub struct GameLoop {
    /// Seconds per simulation step
    timestep: Duration,

    /// Accumulated time not yet spent on steps
    accumulator: Duration,

    /// Time of last frame
    last_frame_time: Instant,

    paused: bool,

    frame_count: u64,

    /// Total simulation steps executed
    step_count: u64,
}

impl GameLoop {
    pub fn new() -> Self {
        Self::with_timestep(FIXED_TIMESTEP)
    }

    /// Loop with a custom step length in seconds
    pub fn with_timestep(timestep: f32) -> Self {
        Self {
            timestep: Duration::from_secs_f32(timestep),
            accumulator: Duration::ZERO,
            last_frame_time: Instant::now(),
            paused: false,
            frame_count: 0,
            step_count: 0,
        }
    }

    /// Begin a new frame measured from the wall clock, returns the number of steps to run
    pub fn begin_frame(&mut self) -> u32 {
        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time);
        self.last_frame_time = now;
        self.advance(frame_time)
    }

    /// Account for `frame_time` and return how many fixed steps it pays for
    pub fn advance(&mut self, frame_time: Duration) -> u32 {
        self.frame_count += 1;

        // If paused, don't accumulate time for updates
        if self.paused {
            return 0;
        }

        self.accumulator += frame_time;

        let mut steps = 0;
        while self.accumulator >= self.timestep && steps < MAX_PHYSICS_STEPS {
            self.accumulator -= self.timestep;
            steps += 1;
        }

        // Drop time we could not catch up on
        if steps == MAX_PHYSICS_STEPS && self.accumulator >= self.timestep {
            log::debug!("Frame overran by {:?}, dropping backlog", self.accumulator);
            self.accumulator = Duration::ZERO;
        }

        self.step_count += steps as u64;
        steps
    }

    /// Advance by `frame_time` and step the simulation accordingly
    pub fn run(&mut self, sim: &mut Simulation, frame_time: Duration) -> u32 {
        let steps = self.advance(frame_time);
        let dt = self.timestep.as_secs_f32();
        for _ in 0..steps {
            sim.step_with(dt);
        }
        steps
    }

    /// Step length in seconds
    pub fn fixed_timestep(&self) -> f32 {
        self.timestep.as_secs_f32()
    }

    /// Get the interpolation alpha for smooth rendering between physics steps
    /// Alpha = accumulated_time / fixed_timestep
    pub fn alpha(&self) -> f32 {
        self.accumulator.as_secs_f32() / self.timestep.as_secs_f32()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Simulated time in seconds
    pub fn simulated_time(&self) -> f32 {
        self.step_count as f32 * self.timestep.as_secs_f32()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            log::info!("Simulation paused");
        }
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            // Reset accumulator to prevent update burst
            self.accumulator = Duration::ZERO;
            self.last_frame_time = Instant::now();
            log::info!("Simulation resumed");
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
    }
}

impl Default for GameLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::physics::{BodyDef, Shape};

    fn frames(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn test_fixed_timestep() {
        let game_loop = GameLoop::new();
        assert!((game_loop.fixed_timestep() - 1.0 / 60.0).abs() < 0.0001);
    }

    #[test]
    fn test_accumulates_partial_frames() {
        let mut game_loop = GameLoop::with_timestep(0.01);

        assert_eq!(game_loop.advance(frames(6)), 0);
        assert_eq!(game_loop.advance(frames(6)), 1);
        assert!((game_loop.alpha() - 0.2).abs() < 0.01);
        assert_eq!(game_loop.advance(frames(25)), 2);
        assert_eq!(game_loop.step_count(), 3);
        assert_eq!(game_loop.frame_count(), 3);
    }

    #[test]
    fn test_max_physics_steps_limit() {
        let mut game_loop = GameLoop::new();

        // 300ms would pay for 18 steps
        assert_eq!(game_loop.advance(frames(300)), MAX_PHYSICS_STEPS);
        assert!(game_loop.alpha() < 1.0, "Backlog should be dropped");
    }

    #[test]
    fn test_paused_no_updates() {
        let mut game_loop = GameLoop::new();
        game_loop.pause();
        assert_eq!(game_loop.advance(frames(100)), 0);

        game_loop.toggle_pause();
        assert!(!game_loop.is_paused());
        assert_eq!(game_loop.alpha(), 0.0);
    }

    #[test]
    fn test_run_steps_simulation() {
        let mut sim = Simulation::default();
        let id = sim
            .add_body(BodyDef::dynamic(Shape::ball(0.5)).position(0.0, 10.0))
            .unwrap();

        let mut game_loop = GameLoop::with_timestep(0.01);
        let steps = game_loop.run(&mut sim, frames(50));

        assert_eq!(steps, 5);
        assert!(sim.body(id).unwrap().position().y < 10.0);
        assert!((game_loop.simulated_time() - 0.05).abs() < 1e-4);
    }
}
