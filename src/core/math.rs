// Math utilities and helper functions

use glam::{Mat2, Vec2};

/// Clamp a value between min and max
pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Linear interpolation
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Check if two f32 values are approximately equal
pub fn approx_equal(a: f32, b: f32, epsilon: f32) -> bool {
    (a - b).abs() < epsilon
}

/// 2D cross product of two vectors (the z component of the 3D cross)
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.perp_dot(b)
}

/// Cross product of a scalar (z axis) and a vector: `s x v`
#[inline]
pub fn cross_sv(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// Cross product of a vector and a scalar (z axis): `v x s`
#[inline]
pub fn cross_vs(v: Vec2, s: f32) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

/// Normalize in place, returning the original length.
///
/// Vectors shorter than `f32::EPSILON` are left untouched and report zero.
pub fn normalize(v: &mut Vec2) -> f32 {
    let length = v.length();
    if length < f32::EPSILON {
        return 0.0;
    }
    *v /= length;
    length
}

/// Build a 2x2 matrix from its rows, matching how constraint blocks are written out
#[inline]
pub fn mat2_from_rows(a11: f32, a12: f32, a21: f32, a22: f32) -> Mat2 {
    Mat2::from_cols(Vec2::new(a11, a21), Vec2::new(a12, a22))
}

/// Invert a 2x2 matrix, producing zero for singular input
pub fn invert_mat2(m: Mat2) -> Mat2 {
    let det = m.determinant();
    if det == 0.0 {
        return Mat2::ZERO;
    }
    m.inverse()
}

/// Solve `m * x = b` for `x`, producing zero for singular input
pub fn solve_mat2(m: Mat2, b: Vec2) -> Vec2 {
    let (a11, a21) = (m.x_axis.x, m.x_axis.y);
    let (a12, a22) = (m.y_axis.x, m.y_axis.y);
    let mut det = a11 * a22 - a12 * a21;
    if det != 0.0 {
        det = 1.0 / det;
    }
    Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub lower: Vec2,
    pub upper: Vec2,
}

impl Aabb {
    pub fn new(lower: Vec2, upper: Vec2) -> Self {
        Self { lower, upper }
    }

    /// Box with its top-left corner at `origin` and the given size
    pub fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self::new(origin, origin + size)
    }

    pub fn from_center_half_extents(center: Vec2, half_extents: Vec2) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    pub fn center(&self) -> Vec2 {
        (self.lower + self.upper) * 0.5
    }

    pub fn extents(&self) -> Vec2 {
        self.upper - self.lower
    }

    /// Lower must not exceed upper on either axis
    pub fn is_valid(&self) -> bool {
        let d = self.upper - self.lower;
        d.x >= 0.0 && d.y >= 0.0 && self.lower.is_finite() && self.upper.is_finite()
    }

    /// Touching boxes count as overlapping
    pub fn overlaps(&self, other: &Aabb) -> bool {
        let d1 = other.lower - self.upper;
        let d2 = self.lower - other.upper;
        !(d1.x > 0.0 || d1.y > 0.0 || d2.x > 0.0 || d2.y > 0.0)
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        self.lower.x <= other.lower.x
            && self.lower.y <= other.lower.y
            && other.upper.x <= self.upper.x
            && other.upper.y <= self.upper.y
    }

    pub fn translated(&self, offset: Vec2) -> Self {
        Self::new(self.lower + offset, self.upper + offset)
    }
}
