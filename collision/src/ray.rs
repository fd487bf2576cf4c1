//! Rays and raycast plumbing.

use copperfern_core::math::{Point3, Real, Vector3};
use copperfern_ecs::Entity;

/// A ray represented as a segment from `point1` to `point2`.
///
/// `max_fraction` limits the usable part of the segment:
/// `point1 + t * (point2 - point1)` for `t` in `[0, max_fraction]`.
/// With `max_fraction = 1` the ray is the full segment.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Start of the segment, in world space.
    pub point1: Point3,
    /// End of the segment, in world space.
    pub point2: Point3,
    /// Fraction of the segment that is searched.
    pub max_fraction: Real,
}

impl Ray {
    /// Creates a ray covering the whole segment from `point1` to `point2`.
    pub fn new(point1: Point3, point2: Point3) -> Self {
        Self {
            point1,
            point2,
            max_fraction: 1.0,
        }
    }

    /// Creates a ray covering a prefix of the segment.
    pub fn with_max_fraction(point1: Point3, point2: Point3, max_fraction: Real) -> Self {
        Self {
            point1,
            point2,
            max_fraction,
        }
    }

    /// The point at fraction `t` along the segment.
    pub fn point_at(&self, t: Real) -> Point3 {
        self.point1 + (self.point2 - self.point1) * t
    }
}

/// Result of a successful raycast against a shape, in world space.
#[derive(Debug, Clone, Copy)]
pub struct RaycastInfo {
    /// Hit point on the shape surface.
    pub world_point: Point3,
    /// Unit surface normal at the hit point.
    pub world_normal: Vector3,
    /// Fraction along the ray segment where the hit occurred.
    pub hit_fraction: Real,
    /// The proxy shape that was hit.
    pub proxy_entity: Entity,
    /// The body owning the hit shape.
    pub body_entity: Entity,
}

/// Narrow-phase raycast capability consumed by the broad phase.
///
/// For every leaf whose bounds the ray touches (and whose category bits
/// pass the query mask), the broad phase hands the proxy to this trait.
/// The returned fraction steers traversal exactly like the tree's raycast
/// callback: negative ignores the shape, `0` terminates the query, a value
/// in `(0, 1]` clips the ray for all later candidates.
pub trait RaycastTest {
    /// Tests the ray against one proxy shape, returning the hit fraction.
    fn raycast_against_shape(&mut self, proxy: Entity, ray: &Ray) -> Real;
}
