// Contact feature key

/// Identifies which pair of features produced a contact point.
///
/// Four 8-bit fields share one packed 32-bit key so contact points can be
/// matched across steps with a single comparison. The packed key is only
/// reachable through `key()`; the setters keep both views in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FeatureId {
    key: u32,
}

const REFERENCE_FACE_SHIFT: u32 = 0;
const INCIDENT_EDGE_SHIFT: u32 = 8;
const INCIDENT_VERTEX_SHIFT: u32 = 16;
const FLIP_SHIFT: u32 = 24;

impl FeatureId {
    pub fn new() -> Self {
        Self::default()
    }

    /// The packed form: `face | edge << 8 | vertex << 16 | flip << 24`
    pub fn key(&self) -> u32 {
        self.key
    }

    pub fn reference_face(&self) -> u8 {
        self.field(REFERENCE_FACE_SHIFT)
    }

    pub fn set_reference_face(&mut self, value: u32) {
        self.set_field(REFERENCE_FACE_SHIFT, value);
    }

    pub fn incident_edge(&self) -> u8 {
        self.field(INCIDENT_EDGE_SHIFT)
    }

    pub fn set_incident_edge(&mut self, value: u32) {
        self.set_field(INCIDENT_EDGE_SHIFT, value);
    }

    pub fn incident_vertex(&self) -> u8 {
        self.field(INCIDENT_VERTEX_SHIFT)
    }

    pub fn set_incident_vertex(&mut self, value: u32) {
        self.set_field(INCIDENT_VERTEX_SHIFT, value);
    }

    pub fn flip(&self) -> u8 {
        self.field(FLIP_SHIFT)
    }

    pub fn set_flip(&mut self, value: u32) {
        self.set_field(FLIP_SHIFT, value);
    }

    #[inline]
    fn field(&self, shift: u32) -> u8 {
        ((self.key >> shift) & 0xff) as u8
    }

    // Only the low byte of `value` is kept
    #[inline]
    fn set_field(&mut self, shift: u32, value: u32) {
        let mask = 0xffu32 << shift;
        self.key = (self.key & !mask) | ((value & 0xff) << shift);
    }
}
