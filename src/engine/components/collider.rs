// Lightweight colliders that test host objects against each other by bounds

use log::warn;

use super::host::HostObject;

/// Capability name every collider registers under
pub const COLLIDER_TYPE: &str = "Collider";

/// Outcome of a collider test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionStatus {
    Colliding,
    Clear,
    /// One of the hosts cannot be tested
    NotApplicable,
}

pub trait Collider {
    fn name(&self) -> &'static str;

    /// The capability this collider is registered against
    fn collider_type(&self) -> &'static str {
        COLLIDER_TYPE
    }

    fn test(&self, host: &dyn HostObject, other: &dyn HostObject) -> CollisionStatus;
}

/// Overlap of the two hosts' bounding boxes
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxCollider;

impl Collider for BoxCollider {
    fn name(&self) -> &'static str {
        "BoxCollider"
    }

    fn test(&self, host: &dyn HostObject, other: &dyn HostObject) -> CollisionStatus {
        let (Some(a), Some(b)) = (host.bounding_box(), other.bounding_box()) else {
            warn!("{}: host has no bounding box, skipping test", self.name());
            return CollisionStatus::NotApplicable;
        };

        if a.overlaps(&b) {
            CollisionStatus::Colliding
        } else {
            CollisionStatus::Clear
        }
    }
}

/// Circles inscribed in the two hosts' bounding boxes
#[derive(Debug, Clone, Copy, Default)]
pub struct CircleCollider;

impl Collider for CircleCollider {
    fn name(&self) -> &'static str {
        "CircleCollider"
    }

    fn test(&self, host: &dyn HostObject, other: &dyn HostObject) -> CollisionStatus {
        let (Some(a), Some(b)) = (host.bounding_box(), other.bounding_box()) else {
            warn!("{}: host has no bounding box, skipping test", self.name());
            return CollisionStatus::NotApplicable;
        };

        let radius_a = a.extents().min_element() * 0.5;
        let radius_b = b.extents().min_element() * 0.5;
        let reach = radius_a + radius_b;

        if a.center().distance_squared(b.center()) <= reach * reach {
            CollisionStatus::Colliding
        } else {
            CollisionStatus::Clear
        }
    }
}
