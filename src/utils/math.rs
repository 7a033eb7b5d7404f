//! Geometric primitives shared by the spatial queries and the movement
//! resolver.

use glam::Vec3;

/// Axis-aligned bounding box, the sole collision shape used by the core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Strict variant of [`AABB::intersects`]: boxes that merely share a
    /// face do not overlap. Movement resolution uses this so resting
    /// contact does not read as a collision.
    pub fn overlaps(&self, other: &AABB) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    pub fn contains_aabb(&self, other: &AABB) -> bool {
        other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.y >= self.min.y
            && other.max.y <= self.max.y
            && other.min.z >= self.min.z
            && other.max.z <= self.max.z
    }

    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Returns the box grown uniformly about its center by `factor`.
    pub fn scaled_about_center(&self, factor: f32) -> Self {
        let center = self.center();
        let half = self.size() * 0.5 * factor;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// One-dimensional overlap depth along `axis` when this box moved into
    /// `other` in the direction of `motion`. Negative means no overlap on
    /// that axis.
    pub fn penetration(&self, other: &AABB, axis: usize, motion: f32) -> f32 {
        if motion > 0.0 {
            self.max[axis] - other.min[axis]
        } else {
            other.max[axis] - self.min[axis]
        }
    }
}
