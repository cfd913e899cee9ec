// The Render Engine: 2D rigid-body physics core and the components that
// bind game objects to it

pub mod core;
pub mod engine;
