// Broad-phase proxy record

use super::settings::INVALID;

/// Index of a proxy slot in the broad phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProxyId(pub(crate) u16);

impl ProxyId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a proxy slot currently holds.
///
/// A free slot only knows the next free slot; an allocated slot only knows its
/// endpoint indices. The two can never be read as each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Free {
        next: Option<ProxyId>,
    },
    Allocated {
        /// Index of the lower endpoint in each axis' sorted bound array
        lower_bounds: [usize; 2],
        /// Index of the upper endpoint in each axis' sorted bound array
        upper_bounds: [usize; 2],
    },
}

/// One shape's slot in the sweep-and-prune structure.
///
/// The proxy is a passive record; the broad phase owns allocation and the
/// free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proxy {
    state: ProxyState,
    /// Query scratch counter, or `INVALID` while the slot is free
    pub overlap_count: u16,
    /// Query stamp of the last query that touched this proxy
    pub time_stamp: u32,
    /// Opaque payload, usually the owning body's index
    pub user_data: usize,
}

impl Proxy {
    /// A free slot pointing at `next`
    pub fn free(next: Option<ProxyId>) -> Self {
        Self {
            state: ProxyState::Free { next },
            overlap_count: INVALID,
            time_stamp: 0,
            user_data: 0,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.overlap_count != INVALID
    }

    pub fn state(&self) -> &ProxyState {
        &self.state
    }

    /// Free-list successor. `None` while the slot is allocated or at the list tail.
    pub fn next(&self) -> Option<ProxyId> {
        match self.state {
            ProxyState::Free { next } => next,
            ProxyState::Allocated { .. } => None,
        }
    }

    /// Relink a free slot. Ignored for allocated slots.
    pub fn set_next(&mut self, next: Option<ProxyId>) {
        debug_assert!(!self.is_valid(), "set_next on a live proxy");
        if let ProxyState::Free { next: slot } = &mut self.state {
            *slot = next;
        }
    }

    /// Take the slot off the free list
    pub(crate) fn allocate(&mut self, user_data: usize) {
        self.state = ProxyState::Allocated {
            lower_bounds: [0; 2],
            upper_bounds: [0; 2],
        };
        self.overlap_count = 0;
        self.time_stamp = 0;
        self.user_data = user_data;
    }

    /// Return the slot to the free list, chained in front of `next`
    pub(crate) fn release(&mut self, next: Option<ProxyId>) {
        *self = Self::free(next);
    }

    pub fn lower_bound(&self, axis: usize) -> Option<usize> {
        match self.state {
            ProxyState::Allocated { lower_bounds, .. } => Some(lower_bounds[axis]),
            ProxyState::Free { .. } => None,
        }
    }

    pub fn upper_bound(&self, axis: usize) -> Option<usize> {
        match self.state {
            ProxyState::Allocated { upper_bounds, .. } => Some(upper_bounds[axis]),
            ProxyState::Free { .. } => None,
        }
    }

    pub(crate) fn set_lower_bound(&mut self, axis: usize, index: usize) {
        if let ProxyState::Allocated { lower_bounds, .. } = &mut self.state {
            lower_bounds[axis] = index;
        }
    }

    pub(crate) fn set_upper_bound(&mut self, axis: usize, index: usize) {
        if let ProxyState::Allocated { upper_bounds, .. } = &mut self.state {
            upper_bounds[axis] = index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_follows_overlap_count() {
        let mut proxy = Proxy::free(None);
        assert!(!proxy.is_valid());

        proxy.overlap_count = 0;
        assert!(proxy.is_valid());

        proxy.overlap_count = 2;
        assert!(proxy.is_valid());

        proxy.overlap_count = INVALID;
        assert!(!proxy.is_valid());
    }

    #[test]
    fn test_free_link_and_bounds_do_not_alias() {
        let mut proxy = Proxy::free(Some(ProxyId(7)));
        assert_eq!(proxy.next(), Some(ProxyId(7)));
        assert_eq!(proxy.lower_bound(0), None);

        proxy.set_next(Some(ProxyId(3)));
        assert_eq!(proxy.next(), Some(ProxyId(3)));

        proxy.allocate(42);
        proxy.set_lower_bound(0, 5);
        proxy.set_upper_bound(1, 9);
        assert!(proxy.is_valid());
        assert_eq!(proxy.user_data, 42);
        assert_eq!(proxy.next(), None);
        assert_eq!(proxy.lower_bound(0), Some(5));
        assert_eq!(proxy.upper_bound(1), Some(9));

        proxy.release(Some(ProxyId(1)));
        assert!(!proxy.is_valid());
        assert_eq!(proxy.next(), Some(ProxyId(1)));
        assert_eq!(proxy.lower_bound(0), None);
    }
}
