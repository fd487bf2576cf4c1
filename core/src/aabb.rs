//! Axis-aligned bounding boxes.
//!
//! [`Aabb`] is the bounding volume used throughout the collision pipeline:
//! shapes produce one under a world transform, and the broad-phase tree
//! stores fattened copies on its leaves.

use crate::math::{Point3, Real, Vector3};

/// An axis-aligned bounding box: an interval per axis.
///
/// Degenerate boxes (zero extent on an axis, or even `min > max` from bad
/// world data) are accepted as-is; queries treat them like any other box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Lower corner.
    pub min: Point3,
    /// Upper corner.
    pub max: Point3,
}

impl Aabb {
    /// Creates a box from its two corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Creates a box from a center point and half extents along each axis.
    pub fn from_center_half_extents(center: Point3, half_extents: Vector3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Center of the box.
    pub fn center(&self) -> Point3 {
        Point3::from((self.min.coords + self.max.coords) * 0.5)
    }

    /// Full extent along each axis.
    pub fn extents(&self) -> Vector3 {
        self.max - self.min
    }

    /// Smallest box enclosing `self` and `other`.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: Point3::from(self.min.coords.inf(&other.min.coords)),
            max: Point3::from(self.max.coords.sup(&other.max.coords)),
        }
    }

    /// Whether the two boxes overlap. Touching boxes count as overlapping.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
            && self.min.z <= other.max.z
            && other.min.z <= self.max.z
    }

    /// Whether `other` lies entirely inside `self` (boundaries included).
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
            && other.max.z <= self.max.z
    }

    /// Whether a point lies inside the box (boundaries included).
    pub fn contains_point(&self, point: &Point3) -> bool {
        self.min.x <= point.x
            && point.x <= self.max.x
            && self.min.y <= point.y
            && point.y <= self.max.y
            && self.min.z <= point.z
            && point.z <= self.max.z
    }

    /// Surface area of the box. The insertion cost metric of the
    /// broad-phase tree.
    pub fn surface_area(&self) -> Real {
        let e = self.extents();
        2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
    }

    /// A copy grown by `margin` on every side.
    pub fn fattened(&self, margin: Real) -> Aabb {
        let m = Vector3::new(margin, margin, margin);
        Aabb {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// A copy stretched along `displacement`: each axis grows on the side
    /// the displacement points toward.
    pub fn extended_toward(&self, displacement: &Vector3) -> Aabb {
        let mut out = *self;
        for axis in 0..3 {
            if displacement[axis] < 0.0 {
                out.min[axis] += displacement[axis];
            } else {
                out.max[axis] += displacement[axis];
            }
        }
        out
    }

    /// Slab test of the segment `point1 + t * (point2 - point1)` for
    /// `t` in `[0, max_fraction]` against the box.
    pub fn raycast_segment(&self, point1: &Point3, point2: &Point3, max_fraction: Real) -> bool {
        let direction = point2 - point1;
        let mut t_min: Real = 0.0;
        let mut t_max = max_fraction;

        for axis in 0..3 {
            let d = direction[axis];
            if d.abs() < Real::EPSILON {
                // Parallel to the slab: reject unless the origin is inside it.
                if point1[axis] < self.min[axis] || point1[axis] > self.max[axis] {
                    return false;
                }
            } else {
                let inv = 1.0 / d;
                let mut t1 = (self.min[axis] - point1[axis]) * inv;
                let mut t2 = (self.max[axis] - point1[axis]) * inv;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                t_min = t_min.max(t1);
                t_max = t_max.min(t2);
                if t_min > t_max {
                    return false;
                }
            }
        }

        true
    }
}
