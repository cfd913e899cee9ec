// Physics system: broad phase, joints and island solver

pub mod body;
pub mod broad_phase;
pub mod collision;
pub mod config;
mod debug;
pub mod feature_id;
pub mod island;
pub mod joints;
pub mod pair;
pub mod pair_manager;
pub mod proxy;
pub mod settings;
mod world;

pub use body::{Body, BodyDef, BodyId, BodyType, Shape};
pub use broad_phase::BroadPhase;
pub use collision::{CollisionEvent, CollisionFilter};
pub use config::SimulationConfig;
pub use debug::{DebugRenderer, DebugVertex};
pub use feature_id::FeatureId;
pub use joints::{Joint, JointDef, JointId, JointType};
pub use world::{ContactCandidate, Simulation};

/// Physics construction errors
#[derive(Debug, thiserror::Error)]
pub enum PhysicsError {
    #[error("Joint definition is missing a body")]
    MissingBody,

    #[error("Joint cannot connect a body to itself")]
    SameBody,

    #[error("Joint endpoint is not a simulating body: {0}")]
    InvalidEndpoint(String),

    #[error("Unknown joint type: {0}")]
    UnknownJointType(u8),

    #[error("Invalid gear joint: {0}")]
    InvalidGearJoint(String),

    #[error("Invalid ratio: {0}")]
    InvalidRatio(f32),

    #[error("Broad phase is full ({0} proxies)")]
    ProxyCapacity(usize),

    #[error("Unknown body: {0:?}")]
    UnknownBody(BodyId),

    #[error("Unknown joint: {0:?}")]
    UnknownJoint(JointId),
}
