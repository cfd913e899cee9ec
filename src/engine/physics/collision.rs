use super::body::BodyId;

/// Collision filtering data for a body.
///
/// Bodies in the same non-zero group always collide (positive group) or
/// never collide (negative group). Otherwise the category and mask bits
/// decide, in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionFilter {
    /// What this body is
    pub category_bits: u16,
    /// What this body collides with
    pub mask_bits: u16,
    pub group_index: i16,
}

impl CollisionFilter {
    pub fn new(category_bits: u16, mask_bits: u16) -> Self {
        Self {
            category_bits,
            mask_bits,
            group_index: 0,
        }
    }

    pub fn group(mut self, group_index: i16) -> Self {
        self.group_index = group_index;
        self
    }

    pub fn should_collide(&self, other: &CollisionFilter) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }

        (self.mask_bits & other.category_bits) != 0 && (self.category_bits & other.mask_bits) != 0
    }
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self::new(0x0001, 0xFFFF)
    }
}

/// Broad-phase contact event for game logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionEvent {
    /// Two bodies' bounds started overlapping
    Started { body1: BodyId, body2: BodyId },

    /// Two bodies' bounds stopped overlapping
    Stopped { body1: BodyId, body2: BodyId },
}

impl CollisionEvent {
    pub fn bodies(&self) -> (BodyId, BodyId) {
        match *self {
            CollisionEvent::Started { body1, body2 } | CollisionEvent::Stopped { body1, body2 } => {
                (body1, body2)
            }
        }
    }
}

/// Queue for storing collision events during physics step
#[derive(Debug)]
pub struct CollisionEventQueue {
    events: Vec<CollisionEvent>,
}

impl CollisionEventQueue {
    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(32), // Pre-allocate for common case
        }
    }

    /// Clear all events (call at start of physics step)
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Collision events from the last step
    pub fn events(&self) -> &[CollisionEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub(crate) fn push(&mut self, event: CollisionEvent) {
        self.events.push(event);
    }
}

impl Default for CollisionEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_collides_with_itself() {
        let filter = CollisionFilter::default();
        assert!(filter.should_collide(&filter));
    }

    #[test]
    fn test_negative_group_never_collides() {
        let a = CollisionFilter::default().group(-3);
        let b = CollisionFilter::default().group(-3);
        assert!(!a.should_collide(&b), "Same negative group must not collide");

        let c = CollisionFilter::default().group(-4);
        assert!(a.should_collide(&c), "Different groups fall back to the masks");
    }

    #[test]
    fn test_positive_group_overrides_masks() {
        let a = CollisionFilter::new(0x0002, 0x0000).group(5);
        let b = CollisionFilter::new(0x0004, 0x0000).group(5);
        assert!(a.should_collide(&b), "Same positive group always collides");
    }

    #[test]
    fn test_mask_must_match_both_ways() {
        let player = CollisionFilter::new(0x0002, 0x0008);
        let platform = CollisionFilter::new(0x0008, 0xFFFF);
        let other_player = CollisionFilter::new(0x0002, 0x0008);

        assert!(player.should_collide(&platform));
        assert!(platform.should_collide(&player));
        assert!(
            !player.should_collide(&other_player),
            "Players should not collide with other players"
        );
    }

    #[test]
    fn test_event_queue() {
        let mut queue = CollisionEventQueue::new();
        assert!(queue.is_empty());

        queue.push(CollisionEvent::Started {
            body1: BodyId(0, 0),
            body2: BodyId(1, 0),
        });
        assert_eq!(queue.events().len(), 1);
        assert_eq!(queue.events()[0].bodies(), (BodyId(0, 0), BodyId(1, 0)));

        queue.clear();
        assert!(queue.is_empty());
    }
}
