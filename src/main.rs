use std::time::Duration;

use anyhow::Result;
use glam::Vec2;
use log::info;

use render_engine::engine::components::{
    BodyComponent, BoxShape, CircleShape, DistanceBehavior, GameObject, HostObject, JointComponent,
    RevoluteBehavior,
};
use render_engine::engine::game_loop::GameLoop;
use render_engine::engine::physics::{DebugRenderer, Simulation, SimulationConfig};
use render_engine::engine::render;

/// Simulated seconds to run
const DEMO_SECONDS: u32 = 5;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Starting Render Engine physics demo...");

    let mut sim = Simulation::new(SimulationConfig::default());
    let mut game_loop = GameLoop::new();

    // Ground and a pendulum hanging from a hinge on it
    let mut ground = BodyComponent::new("ground", BoxShape::new(40.0, 1.0));
    ground.set_static(true);
    ground.start_simulation(&mut sim)?;

    let mut arm = BodyComponent::new("arm", BoxShape::new(4.0, 0.5));
    arm.set_position(&mut sim, Vec2::new(2.0, 8.0))?;
    arm.start_simulation(&mut sim)?;

    let mut anchor = BodyComponent::new("anchor", BoxShape::new(0.5, 0.5));
    anchor.set_static(true);
    anchor.set_position(&mut sim, Vec2::new(0.0, 8.0))?;
    anchor.start_simulation(&mut sim)?;

    let mut hinge = JointComponent::new(
        "hinge",
        &sim,
        anchor.body(),
        arm.body(),
        RevoluteBehavior {
            anchor: Some(Vec2::new(0.0, 8.0)),
            ..Default::default()
        },
    )?;
    hinge.start_simulation(&mut sim)?;

    // Ball on a soft rope from the end of the arm
    let mut ball = BodyComponent::new("ball", CircleShape::new(0.5));
    ball.set_position(&mut sim, Vec2::new(4.0, 5.0))?;
    ball.start_simulation(&mut sim)?;

    let mut rope = JointComponent::new("rope", &sim, arm.body(), ball.body(), DistanceBehavior::soft(4.0, 0.5))?;
    rope.start_simulation(&mut sim)?;
    if let Some(length) = rope.target_distance(&sim) {
        info!("Rope length {:.2}", length);
    }

    let mut ball_host = GameObject::new("ball").with_size(1.0, 1.0);
    let mut debug = DebugRenderer::new();
    debug.set_enabled(true);
    render::set_debug_mode(true);

    let frame = Duration::from_secs_f32(game_loop.fixed_timestep());
    let mut last_report = 0;
    while game_loop.simulated_time() < DEMO_SECONDS as f32 {
        game_loop.run(&mut sim, frame);
        ball.update(&sim, &mut ball_host);

        for event in sim.collision_events() {
            info!("Collision event: {:?}", event);
        }

        let second = game_loop.simulated_time() as u32;
        if second > last_report {
            last_report = second;
            debug.prepare(&sim);
            hinge.debug_draw(&sim, &mut debug);
            rope.debug_draw(&sim, &mut debug);
            info!(
                "t={}s ball at ({:.2}, {:.2}), host origin ({:.2}, {:.2}), {} contacts, {} debug lines",
                second,
                ball.position().x,
                ball.position().y,
                ball_host.position().x,
                ball_host.position().y,
                sim.contact_count(),
                debug.line_count()
            );
        }
    }

    rope.stop_simulation(&mut sim);
    hinge.stop_simulation(&mut sim);
    info!("Demo finished after {} steps", game_loop.step_count());

    Ok(())
}
