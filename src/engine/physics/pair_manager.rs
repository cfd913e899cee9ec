// Pair hash table and commit buffer

use log::{trace, warn};

use super::pair::{Pair, PairId};
use super::proxy::{Proxy, ProxyId};
use super::settings::{MAX_PAIRS, TABLE_CAPACITY};

/// Receives pair lifecycle notifications at commit time
pub trait PairCallback {
    /// A pair went final. The returned payload is stored on the pair and
    /// handed back in `pair_removed`.
    fn pair_added(&mut self, user_data1: usize, user_data2: usize) -> Option<usize>;

    /// A final pair was removed
    fn pair_removed(&mut self, user_data1: usize, user_data2: usize, pair_data: Option<usize>);
}

/// Integer hash of an ordered proxy pair (Thomas Wang's 32-bit mix)
pub fn hash_pair(id1: ProxyId, id2: ProxyId) -> u32 {
    let mut key = ((id2.0 as u32) << 16) | id1.0 as u32;
    key = (!key).wrapping_add(key << 15);
    key ^= key >> 12;
    key = key.wrapping_add(key << 2);
    key ^= key >> 4;
    key = key.wrapping_mul(2057);
    key ^= key >> 16;
    key
}

fn ordered(id1: ProxyId, id2: ProxyId) -> (ProxyId, ProxyId) {
    if id1 > id2 {
        (id2, id1)
    } else {
        (id1, id2)
    }
}

/// Fixed-capacity open hash table of pairs plus the per-step pair buffer.
///
/// Pair slots are recycled through a free list chained on `Pair::next`; the
/// same field chains pairs within a bucket once allocated.
#[derive(Debug)]
pub struct PairManager {
    pairs: Vec<Pair>,
    hash_table: Vec<Option<PairId>>,
    table_mask: usize,
    free_pair: Option<PairId>,
    pair_count: usize,
    pair_buffer: Vec<(ProxyId, ProxyId)>,
}

impl PairManager {
    pub fn new() -> Self {
        Self::with_capacity(MAX_PAIRS, TABLE_CAPACITY)
    }

    pub(crate) fn with_capacity(max_pairs: usize, table_capacity: usize) -> Self {
        debug_assert!(table_capacity.is_power_of_two());
        debug_assert!(max_pairs < u16::MAX as usize);

        let pairs = (0..max_pairs)
            .map(|i| {
                let next = (i + 1 < max_pairs).then(|| PairId((i + 1) as u16));
                Pair::empty(next)
            })
            .collect();

        Self {
            pairs,
            hash_table: vec![None; table_capacity],
            table_mask: table_capacity - 1,
            free_pair: (max_pairs > 0).then_some(PairId(0)),
            pair_count: 0,
            pair_buffer: Vec::with_capacity(64),
        }
    }

    pub fn pair_count(&self) -> usize {
        self.pair_count
    }

    pub fn capacity(&self) -> usize {
        self.pairs.len()
    }

    pub fn buffered_count(&self) -> usize {
        self.pair_buffer.len()
    }

    pub fn pair(&self, id: PairId) -> &Pair {
        &self.pairs[id.index()]
    }

    /// Live pairs, in slot order
    pub fn iter(&self) -> impl Iterator<Item = &Pair> {
        self.pairs.iter().filter(|pair| pair.proxy_id1.is_some())
    }

    fn bucket(&self, id1: ProxyId, id2: ProxyId) -> usize {
        hash_pair(id1, id2) as usize & self.table_mask
    }

    pub fn find(&self, id1: ProxyId, id2: ProxyId) -> Option<PairId> {
        let (id1, id2) = ordered(id1, id2);
        let mut cursor = self.hash_table[self.bucket(id1, id2)];
        while let Some(pair_id) = cursor {
            let pair = &self.pairs[pair_id.index()];
            if pair.matches(id1, id2) {
                return Some(pair_id);
            }
            cursor = pair.next;
        }
        None
    }

    pub fn find_mut(&mut self, id1: ProxyId, id2: ProxyId) -> Option<&mut Pair> {
        self.find(id1, id2).map(|id| &mut self.pairs[id.index()])
    }

    /// Find or insert the pair. `None` when the table is full.
    pub fn add_pair(&mut self, id1: ProxyId, id2: ProxyId) -> Option<PairId> {
        let (id1, id2) = ordered(id1, id2);
        if let Some(existing) = self.find(id1, id2) {
            return Some(existing);
        }

        let pair_id = self.free_pair?;
        let bucket = self.bucket(id1, id2);
        let pair = &mut self.pairs[pair_id.index()];
        self.free_pair = pair.next;

        pair.reset(self.hash_table[bucket]);
        pair.proxy_id1 = Some(id1);
        pair.proxy_id2 = Some(id2);
        self.hash_table[bucket] = Some(pair_id);
        self.pair_count += 1;

        Some(pair_id)
    }

    /// Unlink and recycle the pair, returning its payload
    pub fn remove_pair(&mut self, id1: ProxyId, id2: ProxyId) -> Option<usize> {
        let (id1, id2) = ordered(id1, id2);
        let bucket = self.bucket(id1, id2);

        let mut previous: Option<PairId> = None;
        let mut cursor = self.hash_table[bucket];
        while let Some(pair_id) = cursor {
            let pair = self.pairs[pair_id.index()];
            if pair.matches(id1, id2) {
                match previous {
                    Some(prev) => self.pairs[prev.index()].next = pair.next,
                    None => self.hash_table[bucket] = pair.next,
                }
                self.pairs[pair_id.index()].reset(self.free_pair);
                self.free_pair = Some(pair_id);
                self.pair_count -= 1;
                return pair.user_data;
            }
            previous = Some(pair_id);
            cursor = pair.next;
        }

        None
    }

    /// Schedule the pair for creation at the next commit
    pub fn add_buffered_pair(&mut self, id1: ProxyId, id2: ProxyId) {
        let Some(pair_id) = self.add_pair(id1, id2) else {
            warn!(
                "Pair table full ({} pairs), dropping pair {:?}/{:?}",
                self.capacity(),
                id1,
                id2
            );
            return;
        };

        let pair = &mut self.pairs[pair_id.index()];
        if !pair.is_buffered() {
            pair.set_buffered();
            if let (Some(a), Some(b)) = (pair.proxy_id1, pair.proxy_id2) {
                self.pair_buffer.push((a, b));
            }
        }
        pair.clear_removed();
    }

    /// Schedule the pair for removal at the next commit. Unknown pairs are ignored.
    pub fn remove_buffered_pair(&mut self, id1: ProxyId, id2: ProxyId) {
        let Some(pair_id) = self.find(id1, id2) else {
            return;
        };

        let pair = &mut self.pairs[pair_id.index()];
        if !pair.is_buffered() {
            pair.set_buffered();
            if let (Some(a), Some(b)) = (pair.proxy_id1, pair.proxy_id2) {
                self.pair_buffer.push((a, b));
            }
        }
        pair.set_removed();
    }

    /// Buffer the removal of `proxy`'s pairs with each of `partners`
    pub fn remove_buffered_pairs_of(
        &mut self,
        proxy: ProxyId,
        partners: impl IntoIterator<Item = ProxyId>,
    ) {
        for other in partners {
            self.remove_buffered_pair(proxy, other);
        }
    }

    /// Flush the pair buffer through `callback`.
    ///
    /// New pairs are reported once and go final; removed final pairs are
    /// reported and deleted; pairs added and removed within the same step are
    /// deleted without a report.
    pub fn commit(&mut self, proxies: &[Proxy], callback: &mut dyn PairCallback) {
        let buffer = std::mem::take(&mut self.pair_buffer);
        let mut doomed = Vec::new();

        for &(id1, id2) in &buffer {
            let Some(pair_id) = self.find(id1, id2) else {
                continue;
            };
            let user_data1 = proxies[id1.index()].user_data;
            let user_data2 = proxies[id2.index()].user_data;

            let pair = &mut self.pairs[pair_id.index()];
            pair.clear_buffered();

            if pair.is_removed() {
                if pair.is_final() {
                    callback.pair_removed(user_data1, user_data2, pair.user_data);
                }
                doomed.push((id1, id2));
            } else if !pair.is_final() {
                pair.user_data = callback.pair_added(user_data1, user_data2);
                pair.set_final();
            }
        }

        for (id1, id2) in doomed {
            self.remove_pair(id1, id2);
        }

        trace!(
            "Committed {} buffered pairs, {} live",
            buffer.len(),
            self.pair_count
        );

        // Keep the allocation for the next step
        self.pair_buffer = buffer;
        self.pair_buffer.clear();
    }
}

impl Default for PairManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records callback traffic and hands out increasing payloads
    #[derive(Default)]
    struct Recorder {
        added: Vec<(usize, usize)>,
        removed: Vec<(usize, usize, Option<usize>)>,
        next_payload: usize,
    }

    impl PairCallback for Recorder {
        fn pair_added(&mut self, user_data1: usize, user_data2: usize) -> Option<usize> {
            self.added.push((user_data1, user_data2));
            self.next_payload += 1;
            Some(self.next_payload)
        }

        fn pair_removed(&mut self, user_data1: usize, user_data2: usize, pair_data: Option<usize>) {
            self.removed.push((user_data1, user_data2, pair_data));
        }
    }

    fn proxies(count: usize) -> Vec<Proxy> {
        (0..count)
            .map(|i| {
                let mut proxy = Proxy::free(None);
                proxy.allocate(100 + i);
                proxy
            })
            .collect()
    }

    #[test]
    fn test_add_find_remove() {
        let mut manager = PairManager::new();
        let a = ProxyId(3);
        let b = ProxyId(1);

        let id = manager.add_pair(a, b).unwrap();
        assert_eq!(manager.pair_count(), 1);
        assert_eq!(manager.find(b, a), Some(id));
        assert_eq!(manager.pair(id).proxy_id1, Some(b), "ids are stored ordered");

        // Adding again returns the same slot
        assert_eq!(manager.add_pair(b, a), Some(id));
        assert_eq!(manager.pair_count(), 1);

        manager.remove_pair(a, b);
        assert_eq!(manager.pair_count(), 0);
        assert_eq!(manager.find(a, b), None);
    }

    #[test]
    fn test_bucket_chains_survive_middle_removal() {
        // A single bucket forces every pair onto one chain
        let mut manager = PairManager::with_capacity(8, 1);
        let ids: Vec<_> = (1..5).map(|i| (ProxyId(0), ProxyId(i))).collect();
        for &(a, b) in &ids {
            manager.add_pair(a, b).unwrap();
        }

        manager.remove_pair(ids[1].0, ids[1].1);
        for (i, &(a, b)) in ids.iter().enumerate() {
            assert_eq!(manager.find(a, b).is_some(), i != 1);
        }
        assert_eq!(manager.pair_count(), 3);
    }

    #[test]
    fn test_capacity_exhaustion_drops_pair() {
        let mut manager = PairManager::with_capacity(2, 2);
        manager.add_buffered_pair(ProxyId(0), ProxyId(1));
        manager.add_buffered_pair(ProxyId(0), ProxyId(2));
        manager.add_buffered_pair(ProxyId(1), ProxyId(2));

        assert_eq!(manager.pair_count(), 2);
        assert_eq!(manager.buffered_count(), 2);
        assert_eq!(manager.find(ProxyId(1), ProxyId(2)), None);

        // Freed slots are reusable
        manager.remove_pair(ProxyId(0), ProxyId(1));
        assert!(manager.add_pair(ProxyId(1), ProxyId(2)).is_some());
    }

    #[test]
    fn test_commit_reports_new_pairs_once() {
        let proxies = proxies(3);
        let mut manager = PairManager::new();
        let mut recorder = Recorder::default();

        manager.add_buffered_pair(ProxyId(0), ProxyId(2));
        manager.add_buffered_pair(ProxyId(2), ProxyId(0));
        assert_eq!(manager.buffered_count(), 1);

        manager.commit(&proxies, &mut recorder);
        assert_eq!(recorder.added, vec![(100, 102)]);

        let pair = manager.pair(manager.find(ProxyId(0), ProxyId(2)).unwrap());
        assert!(pair.is_final());
        assert!(!pair.is_buffered());
        assert_eq!(pair.user_data, Some(1));

        // Re-buffering a final pair does not report it again
        manager.add_buffered_pair(ProxyId(0), ProxyId(2));
        manager.commit(&proxies, &mut recorder);
        assert_eq!(recorder.added.len(), 1);
    }

    #[test]
    fn test_commit_removes_final_pairs_with_payload() {
        let proxies = proxies(2);
        let mut manager = PairManager::new();
        let mut recorder = Recorder::default();

        manager.add_buffered_pair(ProxyId(0), ProxyId(1));
        manager.commit(&proxies, &mut recorder);

        manager.remove_buffered_pair(ProxyId(0), ProxyId(1));
        {
            let pair = manager.pair(manager.find(ProxyId(0), ProxyId(1)).unwrap());
            assert!(pair.is_removed());
            assert!(pair.is_buffered());
        }
        manager.commit(&proxies, &mut recorder);

        assert_eq!(recorder.removed, vec![(100, 101, Some(1))]);
        assert_eq!(manager.pair_count(), 0);
    }

    #[test]
    fn test_transient_pairs_are_silent() {
        let proxies = proxies(2);
        let mut manager = PairManager::new();
        let mut recorder = Recorder::default();

        manager.add_buffered_pair(ProxyId(0), ProxyId(1));
        manager.remove_buffered_pair(ProxyId(0), ProxyId(1));
        manager.commit(&proxies, &mut recorder);

        assert!(recorder.added.is_empty());
        assert!(recorder.removed.is_empty());
        assert_eq!(manager.pair_count(), 0);
    }

    #[test]
    fn test_remove_then_readd_keeps_pair() {
        let proxies = proxies(2);
        let mut manager = PairManager::new();
        let mut recorder = Recorder::default();

        manager.add_buffered_pair(ProxyId(0), ProxyId(1));
        manager.commit(&proxies, &mut recorder);

        manager.remove_buffered_pair(ProxyId(0), ProxyId(1));
        manager.add_buffered_pair(ProxyId(0), ProxyId(1));
        manager.commit(&proxies, &mut recorder);

        assert!(recorder.removed.is_empty());
        assert_eq!(manager.pair_count(), 1);
        assert!(manager.iter().all(|pair| !pair.is_buffered() && !pair.is_removed()));
    }

    #[test]
    fn test_remove_unknown_pair_is_noop() {
        let mut manager = PairManager::new();
        manager.remove_buffered_pair(ProxyId(4), ProxyId(5));
        assert_eq!(manager.buffered_count(), 0);
        assert_eq!(manager.remove_pair(ProxyId(4), ProxyId(5)), None);
    }

    #[test]
    fn test_hash_is_order_sensitive_but_lookup_is_not() {
        assert_ne!(hash_pair(ProxyId(1), ProxyId(2)), hash_pair(ProxyId(2), ProxyId(1)));

        let mut manager = PairManager::new();
        manager.add_pair(ProxyId(2), ProxyId(1));
        assert!(manager.find(ProxyId(1), ProxyId(2)).is_some());
    }
}
