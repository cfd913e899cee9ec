// Sweep-and-prune broad phase
//
// Every proxy contributes a lower and an upper endpoint to a sorted array per
// axis. Two proxies overlap when their endpoint intervals interleave on both
// axes, which can be decided from endpoint indices alone.

use glam::Vec2;
use log::{debug, warn};

use super::pair_manager::{PairCallback, PairManager};
use super::proxy::{Proxy, ProxyId, ProxyState};
use super::settings::{MAX_PAIRS, MAX_PROXIES, TABLE_CAPACITY};
use super::PhysicsError;
use crate::core::math::Aabb;

/// One endpoint of a proxy on one axis
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bound {
    value: f32,
    proxy_id: ProxyId,
    is_lower: bool,
}

#[inline]
fn axis_value(v: Vec2, axis: usize) -> f32 {
    if axis == 0 {
        v.x
    } else {
        v.y
    }
}

/// Owner of the proxy pool and the pair manager
#[derive(Debug)]
pub struct BroadPhase {
    proxies: Vec<Proxy>,
    free_proxy: Option<ProxyId>,
    bounds: [Vec<Bound>; 2],
    pair_manager: PairManager,
    proxy_count: usize,
    query_stamp: u32,
    world_bounds: Aabb,
}

impl BroadPhase {
    pub fn new(world_bounds: Aabb) -> Self {
        Self::with_capacity(world_bounds, MAX_PROXIES, MAX_PAIRS, TABLE_CAPACITY)
    }

    pub(crate) fn with_capacity(
        world_bounds: Aabb,
        max_proxies: usize,
        max_pairs: usize,
        table_capacity: usize,
    ) -> Self {
        debug_assert!(world_bounds.is_valid());

        let proxies = (0..max_proxies)
            .map(|i| Proxy::free((i + 1 < max_proxies).then(|| ProxyId((i + 1) as u16))))
            .collect();

        Self {
            proxies,
            free_proxy: (max_proxies > 0).then_some(ProxyId(0)),
            bounds: [
                Vec::with_capacity(2 * max_proxies),
                Vec::with_capacity(2 * max_proxies),
            ],
            pair_manager: PairManager::with_capacity(max_pairs, table_capacity),
            proxy_count: 0,
            query_stamp: 0,
            world_bounds,
        }
    }

    pub fn world_bounds(&self) -> Aabb {
        self.world_bounds
    }

    /// Whether the box still touches the world bounds
    pub fn in_range(&self, aabb: &Aabb) -> bool {
        self.world_bounds.overlaps(aabb)
    }

    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    pub fn proxy(&self, id: ProxyId) -> Option<&Proxy> {
        self.proxies.get(id.index()).filter(|proxy| proxy.is_valid())
    }

    pub fn pair_manager(&self) -> &PairManager {
        &self.pair_manager
    }

    /// Current bounds of a live proxy
    pub fn proxy_aabb(&self, id: ProxyId) -> Option<Aabb> {
        let (lower, upper) = self.bound_indices(id)?;
        let value = |axis: usize, index: usize| self.bounds[axis][index].value;
        Some(Aabb::new(
            Vec2::new(value(0, lower[0]), value(1, lower[1])),
            Vec2::new(value(0, upper[0]), value(1, upper[1])),
        ))
    }

    /// Insert a proxy and buffer pairs with everything it overlaps
    pub fn create_proxy(&mut self, aabb: Aabb, user_data: usize) -> Result<ProxyId, PhysicsError> {
        let id = self
            .free_proxy
            .ok_or(PhysicsError::ProxyCapacity(self.proxies.len()))?;

        self.free_proxy = self.proxies[id.index()].next();
        self.proxies[id.index()].allocate(user_data);

        for axis in 0..2 {
            self.insert_bounds(axis, id, &aabb);
        }
        self.reindex();
        self.proxy_count += 1;

        for other in self.overlapping(id) {
            self.pair_manager.add_buffered_pair(id, other);
        }

        debug!("Created proxy {:?} for user data {}", id, user_data);
        Ok(id)
    }

    /// Remove a proxy. Its pairs are reported through `callback` before the
    /// slot returns to the free list.
    pub fn destroy_proxy(&mut self, id: ProxyId, callback: &mut dyn PairCallback) {
        if self.proxy(id).is_none() {
            warn!("Destroying proxy {:?} that is not live", id);
            return;
        }

        let partners = self.overlapping(id);
        self.pair_manager.remove_buffered_pairs_of(id, partners);
        self.pair_manager.commit(&self.proxies, callback);

        for bounds in &mut self.bounds {
            bounds.retain(|bound| bound.proxy_id != id);
        }
        self.reindex();

        self.proxies[id.index()].release(self.free_proxy);
        self.free_proxy = Some(id);
        self.proxy_count -= 1;

        debug!("Destroyed proxy {:?}", id);
    }

    /// Update a proxy's bounds and buffer the pairs that start or stop overlapping.
    ///
    /// Each endpoint slides to its new slot one swap at a time. Only proxies
    /// whose opposite endpoint was passed on some axis can change overlap
    /// status, so the cost follows the distance moved in sorted order.
    pub fn move_proxy(&mut self, id: ProxyId, aabb: Aabb) {
        let Some((lower_indices, upper_indices)) = self.bound_indices(id) else {
            warn!("Moving proxy {:?} that is not live", id);
            return;
        };

        let mut crossed = Vec::new();
        for axis in 0..2 {
            let (lower_index, upper_index) = (lower_indices[axis], upper_indices[axis]);
            let old_lower = self.bounds[axis][lower_index].value;
            let old_upper = self.bounds[axis][upper_index].value;
            let lower = axis_value(aabb.lower, axis);
            let upper = axis_value(aabb.upper, axis);
            self.bounds[axis][lower_index].value = lower;
            self.bounds[axis][upper_index].value = upper;

            // Grow first so the two endpoints never pass each other
            if lower < old_lower {
                self.sift_down(axis, lower_index, &mut crossed);
            }
            if upper > old_upper {
                self.sift_up(axis, upper_index, &mut crossed);
            }
            if lower > old_lower {
                self.sift_up(axis, lower_index, &mut crossed);
            }
            if upper < old_upper {
                self.sift_down(axis, upper_index, &mut crossed);
            }
        }

        crossed.sort_unstable();
        crossed.dedup();

        for other in crossed {
            let overlap = self.test_overlap(id, other);
            let existing = self
                .pair_manager
                .find(id, other)
                .map(|pair_id| self.pair_manager.pair(pair_id).is_removed());

            match (overlap, existing) {
                (true, None) | (true, Some(true)) => self.pair_manager.add_buffered_pair(id, other),
                (false, Some(false)) => self.pair_manager.remove_buffered_pair(id, other),
                _ => {}
            }
        }
    }

    /// Report buffered pair changes
    pub fn commit(&mut self, callback: &mut dyn PairCallback) {
        self.pair_manager.commit(&self.proxies, callback);
    }

    /// User data of up to `max_count` proxies overlapping `aabb`.
    ///
    /// Each proxy's overlap counter and time stamp intersect the two per-axis
    /// sweeps without any extra allocation per proxy.
    pub fn query(&mut self, aabb: &Aabb, max_count: usize) -> Vec<usize> {
        self.query_stamp = self.query_stamp.wrapping_add(1).max(1);
        let stamp = self.query_stamp;
        let mut results = Vec::new();

        for axis in 0..2 {
            let lower = axis_value(aabb.lower, axis);
            let upper = axis_value(aabb.upper, axis);
            let bounds = &self.bounds[axis];

            for bound in bounds.iter().filter(|bound| bound.is_lower) {
                if bound.value > upper {
                    // Sorted: no later lower bound can overlap
                    break;
                }

                let proxy = &mut self.proxies[bound.proxy_id.index()];
                let Some(upper_index) = proxy.upper_bound(axis) else {
                    continue;
                };
                if bounds[upper_index].value < lower {
                    continue;
                }

                if axis == 0 {
                    proxy.time_stamp = stamp;
                    proxy.overlap_count = 1;
                } else if proxy.time_stamp == stamp && proxy.overlap_count == 1 {
                    proxy.overlap_count = 2;
                    if results.len() < max_count {
                        results.push(proxy.user_data);
                    }
                }
            }
        }

        for proxy in self.proxies.iter_mut() {
            if proxy.is_valid() && proxy.time_stamp == stamp {
                proxy.overlap_count = 0;
            }
        }

        results
    }

    /// Structural self-check: sorted endpoints, consistent indices, live pairs
    pub fn validate(&self) -> bool {
        for axis in 0..2 {
            let bounds = &self.bounds[axis];
            if bounds.len() != 2 * self.proxy_count {
                return false;
            }
            if bounds.windows(2).any(|w| w[0].value > w[1].value) {
                return false;
            }
            for (index, bound) in bounds.iter().enumerate() {
                let proxy = &self.proxies[bound.proxy_id.index()];
                let expected = if bound.is_lower {
                    proxy.lower_bound(axis)
                } else {
                    proxy.upper_bound(axis)
                };
                if expected != Some(index) {
                    return false;
                }
            }
        }

        self.proxies.iter().all(|proxy| match proxy.state() {
            ProxyState::Allocated {
                lower_bounds,
                upper_bounds,
            } => proxy.is_valid() && (0..2).all(|axis| lower_bounds[axis] < upper_bounds[axis]),
            ProxyState::Free { .. } => !proxy.is_valid(),
        }) && self.pair_manager.iter().all(|pair| {
            [pair.proxy_id1, pair.proxy_id2]
                .into_iter()
                .all(|id| id.and_then(|id| self.proxy(id)).is_some())
        })
    }

    fn insert_bounds(&mut self, axis: usize, id: ProxyId, aabb: &Aabb) {
        let lower = axis_value(aabb.lower, axis);
        let upper = axis_value(aabb.upper, axis);
        let bounds = &mut self.bounds[axis];

        // Lower endpoints go before equal values and upper endpoints after,
        // so touching boxes interleave and count as overlapping.
        let lower_index = bounds.partition_point(|bound| bound.value < lower);
        bounds.insert(
            lower_index,
            Bound {
                value: lower,
                proxy_id: id,
                is_lower: true,
            },
        );

        let upper_index = bounds.partition_point(|bound| bound.value <= upper);
        bounds.insert(
            upper_index,
            Bound {
                value: upper,
                proxy_id: id,
                is_lower: false,
            },
        );
    }

    fn reindex(&mut self) {
        let Self {
            bounds, proxies, ..
        } = self;
        for (axis, axis_bounds) in bounds.iter().enumerate() {
            for (index, bound) in axis_bounds.iter().enumerate() {
                place(proxies, axis, bound, index);
            }
        }
    }

    /// Move the endpoint at `index` towards the front until its axis is sorted
    fn sift_down(&mut self, axis: usize, mut index: usize, crossed: &mut Vec<ProxyId>) {
        let Self {
            bounds, proxies, ..
        } = self;
        let bounds = &mut bounds[axis];
        let bound = bounds[index];

        while index > 0 {
            let prev = bounds[index - 1];
            // Lower endpoints sit before equal values
            if prev.value < bound.value || (prev.value == bound.value && !bound.is_lower) {
                break;
            }
            if prev.is_lower != bound.is_lower {
                crossed.push(prev.proxy_id);
            }
            bounds[index] = prev;
            place(proxies, axis, &prev, index);
            index -= 1;
        }

        bounds[index] = bound;
        place(proxies, axis, &bound, index);
    }

    /// Move the endpoint at `index` towards the back until its axis is sorted
    fn sift_up(&mut self, axis: usize, mut index: usize, crossed: &mut Vec<ProxyId>) {
        let Self {
            bounds, proxies, ..
        } = self;
        let bounds = &mut bounds[axis];
        let bound = bounds[index];

        while index + 1 < bounds.len() {
            let next = bounds[index + 1];
            // Upper endpoints sit after equal values
            if next.value > bound.value || (next.value == bound.value && bound.is_lower) {
                break;
            }
            if next.is_lower != bound.is_lower {
                crossed.push(next.proxy_id);
            }
            bounds[index] = next;
            place(proxies, axis, &next, index);
            index += 1;
        }

        bounds[index] = bound;
        place(proxies, axis, &bound, index);
    }

    /// Live proxies whose bounds interleave with `id`'s on both axes
    fn overlapping(&self, id: ProxyId) -> Vec<ProxyId> {
        let Some((_, upper)) = self.bound_indices(id) else {
            return Vec::new();
        };
        // Any overlapping proxy starts before this one ends on the x axis
        self.bounds[0][..upper[0]]
            .iter()
            .filter(|bound| bound.is_lower && bound.proxy_id != id)
            .map(|bound| bound.proxy_id)
            .filter(|&other| self.test_overlap(id, other))
            .collect()
    }

    fn bound_indices(&self, id: ProxyId) -> Option<([usize; 2], [usize; 2])> {
        match self.proxies.get(id.index())?.state() {
            ProxyState::Allocated {
                lower_bounds,
                upper_bounds,
            } => Some((*lower_bounds, *upper_bounds)),
            ProxyState::Free { .. } => None,
        }
    }

    fn test_overlap(&self, a: ProxyId, b: ProxyId) -> bool {
        let (Some((a_lower, a_upper)), Some((b_lower, b_upper))) =
            (self.bound_indices(a), self.bound_indices(b))
        else {
            return false;
        };
        (0..2).all(|axis| !(a_upper[axis] < b_lower[axis] || b_upper[axis] < a_lower[axis]))
    }
}

fn place(proxies: &mut [Proxy], axis: usize, bound: &Bound, index: usize) {
    let proxy = &mut proxies[bound.proxy_id.index()];
    if bound.is_lower {
        proxy.set_lower_bound(axis, index);
    } else {
        proxy.set_upper_bound(axis, index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        added: Vec<(usize, usize)>,
        removed: Vec<(usize, usize)>,
    }

    impl PairCallback for Recorder {
        fn pair_added(&mut self, user_data1: usize, user_data2: usize) -> Option<usize> {
            self.added.push((user_data1.min(user_data2), user_data1.max(user_data2)));
            None
        }

        fn pair_removed(&mut self, user_data1: usize, user_data2: usize, _pair_data: Option<usize>) {
            self.removed.push((user_data1.min(user_data2), user_data1.max(user_data2)));
        }
    }

    fn world() -> BroadPhase {
        BroadPhase::new(Aabb::new(Vec2::splat(-100.0), Vec2::splat(100.0)))
    }

    fn square(x: f32, y: f32, half: f32) -> Aabb {
        Aabb::from_center_half_extents(Vec2::new(x, y), Vec2::splat(half))
    }

    #[test]
    fn test_overlapping_proxies_pair_up_on_commit() {
        let mut broad_phase = world();
        let mut recorder = Recorder::default();

        broad_phase.create_proxy(square(0.0, 0.0, 1.0), 10).unwrap();
        broad_phase.create_proxy(square(1.5, 0.0, 1.0), 11).unwrap();
        broad_phase.create_proxy(square(10.0, 0.0, 1.0), 12).unwrap();
        assert!(broad_phase.validate());

        broad_phase.commit(&mut recorder);
        assert_eq!(recorder.added, vec![(10, 11)]);
        assert_eq!(broad_phase.pair_manager().pair_count(), 1);
    }

    #[test]
    fn test_moving_apart_and_back_reports_both_edges() {
        let mut broad_phase = world();
        let mut recorder = Recorder::default();

        let a = broad_phase.create_proxy(square(0.0, 0.0, 1.0), 1).unwrap();
        broad_phase.create_proxy(square(1.0, 1.0, 1.0), 2).unwrap();
        broad_phase.commit(&mut recorder);

        broad_phase.move_proxy(a, square(-20.0, 0.0, 1.0));
        assert!(broad_phase.validate());
        broad_phase.commit(&mut recorder);
        assert_eq!(recorder.removed, vec![(1, 2)]);

        broad_phase.move_proxy(a, square(0.5, 0.5, 1.0));
        broad_phase.commit(&mut recorder);
        assert_eq!(recorder.added, vec![(1, 2), (1, 2)]);
        assert_eq!(
            broad_phase.proxy_aabb(a),
            Some(square(0.5, 0.5, 1.0)),
            "bounds follow the move"
        );
    }

    #[test]
    fn test_move_within_gap_buffers_nothing() {
        let mut broad_phase = world();
        let mut recorder = Recorder::default();

        let a = broad_phase.create_proxy(square(0.0, 0.0, 1.0), 1).unwrap();
        broad_phase.create_proxy(square(1.5, 0.0, 1.0), 2).unwrap();
        broad_phase.create_proxy(square(20.0, 0.0, 1.0), 3).unwrap();
        broad_phase.commit(&mut recorder);

        // Still overlapping 2, still short of 3
        broad_phase.move_proxy(a, square(0.25, 0.1, 1.0));
        assert_eq!(broad_phase.pair_manager().buffered_count(), 0);
        assert!(broad_phase.validate());

        // Sweeping across 3 and back out leaves only the pair with 2
        broad_phase.move_proxy(a, square(40.0, 0.0, 1.0));
        broad_phase.move_proxy(a, square(0.5, 0.0, 1.0));
        broad_phase.commit(&mut recorder);
        assert_eq!(recorder.added, vec![(1, 2)]);
        assert!(recorder.removed.is_empty());
    }

    #[test]
    fn test_pairs_track_overlaps_through_random_moves() {
        let mut broad_phase = world();
        let mut recorder = Recorder::default();

        // Small deterministic LCG
        let mut seed = 0x2545_f491_u32;
        let mut next = move || {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (seed >> 8) as f32 / (1u32 << 24) as f32
        };

        let mut boxes = Vec::new();
        for user_data in 0..12 {
            let aabb = square(next() * 40.0 - 20.0, next() * 40.0 - 20.0, 1.0 + next() * 4.0);
            let id = broad_phase.create_proxy(aabb, user_data).unwrap();
            boxes.push((id, aabb));
        }

        for round in 0..40 {
            let slot = round % boxes.len();
            let aabb = square(next() * 40.0 - 20.0, next() * 40.0 - 20.0, 1.0 + next() * 4.0);
            broad_phase.move_proxy(boxes[slot].0, aabb);
            boxes[slot].1 = aabb;
            broad_phase.commit(&mut recorder);
            assert!(broad_phase.validate());

            let mut expected = Vec::new();
            for i in 0..boxes.len() {
                for j in i + 1..boxes.len() {
                    if boxes[i].1.overlaps(&boxes[j].1) {
                        expected.push((i, j));
                    }
                }
            }

            let user_data = |id: Option<ProxyId>| broad_phase.proxy(id.unwrap()).unwrap().user_data;
            let mut actual: Vec<(usize, usize)> = broad_phase
                .pair_manager()
                .iter()
                .map(|pair| {
                    let (a, b) = (user_data(pair.proxy_id1), user_data(pair.proxy_id2));
                    (a.min(b), a.max(b))
                })
                .collect();
            actual.sort_unstable();
            assert_eq!(actual, expected, "round {}", round);
        }

        // Destroying reports exactly the pairs the proxy still had
        let (victim, _) = boxes[0];
        let held = broad_phase
            .pair_manager()
            .iter()
            .filter(|pair| pair.proxy_id1 == Some(victim) || pair.proxy_id2 == Some(victim))
            .count();
        recorder.removed.clear();
        broad_phase.destroy_proxy(victim, &mut recorder);
        assert_eq!(recorder.removed.len(), held);
        assert!(broad_phase.validate());
    }

    #[test]
    fn test_overlap_on_one_axis_is_not_a_pair() {
        let mut broad_phase = world();
        let mut recorder = Recorder::default();

        broad_phase.create_proxy(square(0.0, 0.0, 1.0), 1).unwrap();
        broad_phase.create_proxy(square(0.0, 5.0, 1.0), 2).unwrap();
        broad_phase.commit(&mut recorder);

        assert!(recorder.added.is_empty());
    }

    #[test]
    fn test_destroy_reports_pairs_and_recycles_slot() {
        let mut broad_phase = world();
        let mut recorder = Recorder::default();

        let a = broad_phase.create_proxy(square(0.0, 0.0, 1.0), 1).unwrap();
        broad_phase.create_proxy(square(0.5, 0.0, 1.0), 2).unwrap();
        broad_phase.commit(&mut recorder);

        broad_phase.destroy_proxy(a, &mut recorder);
        assert_eq!(recorder.removed, vec![(1, 2)]);
        assert_eq!(broad_phase.proxy_count(), 1);
        assert!(broad_phase.proxy(a).is_none());
        assert!(broad_phase.validate());

        // The freed slot is handed out first
        let c = broad_phase.create_proxy(square(30.0, 0.0, 1.0), 3).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn test_query_intersects_both_axes() {
        let mut broad_phase = world();
        broad_phase.create_proxy(square(0.0, 0.0, 1.0), 1).unwrap();
        broad_phase.create_proxy(square(5.0, 0.0, 1.0), 2).unwrap();
        broad_phase.create_proxy(square(0.0, 5.0, 1.0), 3).unwrap();

        let mut hits = broad_phase.query(&square(0.0, 0.0, 2.0), 10);
        hits.sort_unstable();
        assert_eq!(hits, vec![1]);

        let mut hits = broad_phase.query(&Aabb::new(Vec2::splat(-1.0), Vec2::splat(6.0)), 10);
        hits.sort_unstable();
        assert_eq!(hits, vec![1, 2, 3]);

        assert_eq!(broad_phase.query(&square(0.0, 0.0, 50.0), 2).len(), 2);

        // Scratch counters are back to a valid resting value
        assert!(broad_phase.validate());
    }

    #[test]
    fn test_capacity_exhaustion_is_an_error() {
        let mut broad_phase =
            BroadPhase::with_capacity(Aabb::new(Vec2::splat(-10.0), Vec2::splat(10.0)), 2, 8, 8);
        broad_phase.create_proxy(square(0.0, 0.0, 1.0), 1).unwrap();
        broad_phase.create_proxy(square(4.0, 0.0, 1.0), 2).unwrap();

        let err = broad_phase.create_proxy(square(8.0, 0.0, 1.0), 3).unwrap_err();
        assert!(matches!(err, PhysicsError::ProxyCapacity(2)));
    }

    #[test]
    fn test_in_range() {
        let broad_phase = world();
        assert!(broad_phase.in_range(&square(0.0, 0.0, 1.0)));
        assert!(broad_phase.in_range(&square(100.0, 0.0, 1.0)));
        assert!(!broad_phase.in_range(&square(500.0, 0.0, 1.0)));
    }
}
