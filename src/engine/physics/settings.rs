// Global tuning constants for the physics core.
//
// These are fixed at compile time; anything a game may want to change per
// simulation lives in `SimulationConfig` instead.

use std::f32::consts::PI;

/// Length units per meter. Tune this if the game works in pixels.
pub const LENGTH_UNITS_PER_METER: f32 = 1.0;

/// Mass units per kilogram
pub const MASS_UNITS_PER_KILOGRAM: f32 = 1.0;

/// Time units per second
pub const TIME_UNITS_PER_SECOND: f32 = 1.0;

// Collision

/// Number of manifold points in a contact
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Maximum number of vertices on a convex polygon
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Maximum number of shapes a body may own
pub const MAX_SHAPES_PER_BODY: usize = 64;

/// Broad-phase proxy capacity. Must be a power of two.
pub const MAX_PROXIES: usize = 512;

/// Broad-phase pair capacity. Must be a power of two.
pub const MAX_PAIRS: usize = 8 * MAX_PROXIES;

/// Number of hash buckets in the pair table
pub const TABLE_CAPACITY: usize = MAX_PAIRS;

/// Bucket mask, used instead of a modulo
pub const TABLE_MASK: usize = TABLE_CAPACITY - 1;

const _: () = assert!(MAX_PROXIES.is_power_of_two());
const _: () = assert!(MAX_PAIRS.is_power_of_two());
const _: () = assert!(MAX_PROXIES < INVALID as usize);

/// Sentinel for "no value" in 16-bit index slots
pub const INVALID: u16 = u16::MAX;

/// A collision and constraint tolerance, chosen to be numerically significant
/// but visually insignificant.
pub const LINEAR_SLOP: f32 = 0.005 * LENGTH_UNITS_PER_METER;

/// Angular counterpart of `LINEAR_SLOP`
pub const ANGULAR_SLOP: f32 = 2.0 / 180.0 * PI;

/// Maximum linear position correction applied in one position iteration
pub const MAX_LINEAR_CORRECTION: f32 = 0.2 * LENGTH_UNITS_PER_METER;

/// Maximum angular position correction applied in one position iteration
pub const MAX_ANGULAR_CORRECTION: f32 = 8.0 / 180.0 * PI;

/// Fraction of the position error fed back per step (Baumgarte)
pub const CONTACT_BAUMGARTE: f32 = 0.2;

/// Relative speeds below this are treated as inelastic
pub const VELOCITY_THRESHOLD: f32 = 1.0 * LENGTH_UNITS_PER_METER / TIME_UNITS_PER_SECOND;

/// Velocity clamp, keeps a bad step from exploding
pub const MAX_LINEAR_VELOCITY: f32 = 200.0 * LENGTH_UNITS_PER_METER;

/// Angular velocity clamp
pub const MAX_ANGULAR_VELOCITY: f32 = 250.0;

/// Shortest rope a pulley side may be pulled to
pub const MIN_PULLEY_LENGTH: f32 = 2.0 * LENGTH_UNITS_PER_METER;

// Sleep

/// Time a body must be still before it sleeps
pub const TIME_TO_SLEEP: f32 = 0.5 * TIME_UNITS_PER_SECOND;

/// A body cannot sleep if its linear velocity is above this tolerance
pub const LINEAR_SLEEP_TOLERANCE: f32 = 0.01 * LENGTH_UNITS_PER_METER / TIME_UNITS_PER_SECOND;

/// A body cannot sleep if its angular velocity is above this tolerance (2 degrees per second)
pub const ANGULAR_SLEEP_TOLERANCE: f32 = 2.0 / 180.0 * PI / TIME_UNITS_PER_SECOND;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_table_mask_matches_capacity() {
        assert_eq!(TABLE_MASK + 1, TABLE_CAPACITY);
        assert_eq!(TABLE_CAPACITY & TABLE_MASK, 0);
        assert_eq!(37 & TABLE_MASK, 37 % TABLE_CAPACITY);
    }

    #[test]
    fn test_slop_is_smaller_than_correction() {
        assert!(LINEAR_SLOP < MAX_LINEAR_CORRECTION);
        assert!(ANGULAR_SLOP < MAX_ANGULAR_CORRECTION);
    }

    #[test]
    fn test_angular_tolerances_are_radians() {
        assert_relative_eq!(ANGULAR_SLOP, 2.0_f32.to_radians());
        assert_relative_eq!(
            ANGULAR_SLEEP_TOLERANCE * TIME_UNITS_PER_SECOND,
            2.0_f32.to_radians()
        );
    }
}
