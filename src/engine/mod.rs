// Engine modules: physics, components, render hooks, game loop

pub mod components;
pub mod game_loop;
pub mod physics;
pub mod render;
