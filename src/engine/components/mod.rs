// Components that bind host objects to the physics simulation

pub mod behavior;
pub mod body;
pub mod collider;
pub mod host;
pub mod joint;
pub mod shape;

pub use behavior::{DistanceBehavior, JointBehavior, PrismaticBehavior, PulleyBehavior, RevoluteBehavior};
pub use body::BodyComponent;
pub use collider::{BoxCollider, CircleCollider, Collider, CollisionStatus};
pub use host::{GameObject, HostObject};
pub use joint::JointComponent;
pub use shape::{BoxShape, CircleShape, ShapeDefinition};
