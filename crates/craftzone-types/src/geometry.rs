//! Minimal 3D geometry used by the proximity scan.
//!
//! The spatial query itself is owned by the host; the tracker only needs to
//! expand an agent's bounding volume into a conservative query region and
//! compute the true separation between two boxes to reject candidates the
//! pre-filter let through.

use serde::{Deserialize, Serialize};

/// A point or offset in world space, in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// East-west axis.
    pub x: f32,
    /// Vertical axis.
    pub y: f32,
    /// North-south axis.
    pub z: f32,
}

impl Vec3 {
    /// The origin.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Construct a vector from its components.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Component-wise sum.
    #[must_use]
    pub const fn plus(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Component-wise difference.
    #[must_use]
    pub const fn minus(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// Scale every component by `factor`.
    #[must_use]
    pub const fn scaled(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Euclidean length.
    pub fn length(self) -> f32 {
        self.x
            .mul_add(self.x, self.y.mul_add(self.y, self.z * self.z))
            .sqrt()
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Construct a box from its two corners.
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Construct a box centered on `center` with the given half extents.
    pub const fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center.minus(half_extents), center.plus(half_extents))
    }

    /// Center point of the box.
    pub const fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    /// Half extents of the box.
    pub const fn half_extents(&self) -> Vec3 {
        self.max.minus(self.min).scaled(0.5)
    }

    /// Grow the box by `margin` meters on every side.
    #[must_use]
    pub const fn expanded(&self, margin: f32) -> Self {
        let m = Vec3::new(margin, margin, margin);
        Self::new(self.min.minus(m), self.max.plus(m))
    }

    /// Whether two boxes overlap (touching counts as overlapping).
    pub const fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Shortest distance between the surfaces of two boxes; `0.0` when they
    /// overlap.
    pub fn separation(&self, other: &Self) -> f32 {
        let gap = |a_min: f32, a_max: f32, b_min: f32, b_max: f32| -> f32 {
            (b_min - a_max).max(a_min - b_max).max(0.0)
        };
        Vec3::new(
            gap(self.min.x, self.max.x, other.min.x, other.max.x),
            gap(self.min.y, self.max.y, other.min.y, other.max.y),
            gap(self.min.z, self.max.z, other.min.z, other.max.z),
        )
        .length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box_at(x: f32) -> Aabb {
        Aabb::from_center(Vec3::new(x, 0.0, 0.0), Vec3::new(0.5, 0.5, 0.5))
    }

    #[test]
    fn overlapping_boxes_have_zero_separation() {
        let a = unit_box_at(0.0);
        let b = unit_box_at(0.5);
        assert!(a.intersects(&b));
        assert!(a.separation(&b) <= f32::EPSILON);
    }

    #[test]
    fn separation_along_one_axis() {
        let a = unit_box_at(0.0);
        let b = unit_box_at(4.0);
        // Faces at 0.5 and 3.5.
        assert!((a.separation(&b) - 3.0).abs() < 1e-5);
        assert!((b.separation(&a) - 3.0).abs() < 1e-5);
    }

    #[test]
    fn separation_is_diagonal_across_corners() {
        let a = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 1.0));
        let b = Aabb::new(Vec3::new(4.0, 5.0, 0.0), Vec3::new(5.0, 6.0, 1.0));
        // Gaps of 3 on x and 4 on y.
        assert!((a.separation(&b) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn expanded_box_catches_nearby_box() {
        let a = unit_box_at(0.0);
        let b = unit_box_at(4.0);
        assert!(!a.intersects(&b));
        assert!(a.expanded(3.0).intersects(&b));
        assert!(!a.expanded(2.9).intersects(&b));
    }

    #[test]
    fn center_and_half_extents_roundtrip() {
        let b = Aabb::from_center(Vec3::new(2.0, 1.0, -3.0), Vec3::new(1.0, 2.0, 0.5));
        assert_eq!(b.center(), Vec3::new(2.0, 1.0, -3.0));
        assert_eq!(b.half_extents(), Vec3::new(1.0, 2.0, 0.5));
    }
}
