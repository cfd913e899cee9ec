// Broad-phase pair record

use bitflags::bitflags;

use super::proxy::ProxyId;

/// Index of a pair slot in the pair table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairId(pub(crate) u16);

impl PairId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    /// Lifecycle bits of a pair. Each bit is set and cleared on its own.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PairStatus: u8 {
        /// Touched this step, waiting for the commit
        const BUFFERED = 0b0000_0001;
        /// Scheduled for deletion at commit
        const REMOVED = 0b0000_0010;
        /// Reported to the pair callback and persistent
        const FINAL = 0b0000_0100;
    }
}

/// Candidate overlap between two proxies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair {
    /// Smaller proxy id of the two
    pub proxy_id1: Option<ProxyId>,
    /// Larger proxy id of the two
    pub proxy_id2: Option<ProxyId>,
    /// Next pair in the same hash bucket, or next free slot
    pub next: Option<PairId>,
    /// Payload returned by the pair callback when the pair went final
    pub user_data: Option<usize>,
    status: PairStatus,
}

impl Pair {
    pub fn empty(next: Option<PairId>) -> Self {
        Self {
            proxy_id1: None,
            proxy_id2: None,
            next,
            user_data: None,
            status: PairStatus::empty(),
        }
    }

    pub fn status(&self) -> PairStatus {
        self.status
    }

    pub fn set_buffered(&mut self) {
        self.status.insert(PairStatus::BUFFERED);
    }

    pub fn clear_buffered(&mut self) {
        self.status.remove(PairStatus::BUFFERED);
    }

    pub fn is_buffered(&self) -> bool {
        self.status.contains(PairStatus::BUFFERED)
    }

    pub fn set_removed(&mut self) {
        self.status.insert(PairStatus::REMOVED);
    }

    pub fn clear_removed(&mut self) {
        self.status.remove(PairStatus::REMOVED);
    }

    pub fn is_removed(&self) -> bool {
        self.status.contains(PairStatus::REMOVED)
    }

    /// There is no way back from final short of recycling the slot
    pub fn set_final(&mut self) {
        self.status.insert(PairStatus::FINAL);
    }

    pub fn is_final(&self) -> bool {
        self.status.contains(PairStatus::FINAL)
    }

    /// Wipe the slot for reuse, chaining it in front of `next`
    pub(crate) fn reset(&mut self, next: Option<PairId>) {
        *self = Self::empty(next);
    }

    pub fn matches(&self, id1: ProxyId, id2: ProxyId) -> bool {
        self.proxy_id1 == Some(id1) && self.proxy_id2 == Some(id2)
    }
}
