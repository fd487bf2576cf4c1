//! Collision shape geometry.
//!
//! Shapes are pure geometry in their own local space: no pose, no owner.
//! A shape instance is typically shared between several proxy shapes
//! through an [`Arc`](std::sync::Arc) and must stay geometrically immutable
//! while a simulation step is running; pose lives on the proxy-shape
//! component row, not here.

use copperfern_core::aabb::Aabb;
use copperfern_core::math::{Point3, Real, Vector3};

use crate::ray::Ray;

/// A collision shape, dispatched over its concrete geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum CollisionShape {
    /// Sphere centered at the local origin.
    Sphere {
        /// Sphere radius.
        radius: Real,
    },
    /// Box centered at the local origin, defined by half extents per axis.
    Cuboid {
        /// Half extents along each local axis.
        half_extents: Vector3,
    },
}

/// Result of a raycast against a shape, in the shape's local space.
#[derive(Debug, Clone, Copy)]
pub struct ShapeHit {
    /// Fraction along the ray segment where the surface was hit.
    pub fraction: Real,
    /// Hit point on the surface.
    pub point: Point3,
    /// Unit outward normal at the hit point.
    pub normal: Vector3,
}

impl CollisionShape {
    /// Creates a sphere shape.
    pub fn sphere(radius: Real) -> Self {
        debug_assert!(radius > 0.0);
        Self::Sphere { radius }
    }

    /// Creates a box shape from its half extents.
    pub fn cuboid(half_extents: Vector3) -> Self {
        debug_assert!(half_extents.x > 0.0 && half_extents.y > 0.0 && half_extents.z > 0.0);
        Self::Cuboid { half_extents }
    }

    /// Computes the world-space bounds of the shape under `transform`.
    pub fn compute_aabb(&self, transform: &copperfern_core::math::Transform) -> Aabb {
        let center = Point3::from(transform.translation.vector);
        match self {
            Self::Sphere { radius } => {
                Aabb::from_center_half_extents(center, Vector3::new(*radius, *radius, *radius))
            }
            Self::Cuboid { half_extents } => {
                // Component-wise absolute rotation maps local extents to the
                // tight world extents of the rotated box.
                let abs_rotation = transform.rotation.to_rotation_matrix().into_inner().abs();
                Aabb::from_center_half_extents(center, abs_rotation * half_extents)
            }
        }
    }

    /// Casts a local-space ray segment against the shape.
    ///
    /// Returns `None` when the segment misses, starts inside the shape, or
    /// only reaches the surface beyond `ray.max_fraction`.
    pub fn raycast(&self, ray: &Ray) -> Option<ShapeHit> {
        match self {
            Self::Sphere { radius } => raycast_sphere(*radius, ray),
            Self::Cuboid { half_extents } => raycast_cuboid(half_extents, ray),
        }
    }

    /// Whether a local-space point lies inside the shape.
    pub fn test_point_inside(&self, point: &Point3) -> bool {
        match self {
            Self::Sphere { radius } => point.coords.norm_squared() < radius * radius,
            Self::Cuboid { half_extents } => {
                point.x.abs() <= half_extents.x
                    && point.y.abs() <= half_extents.y
                    && point.z.abs() <= half_extents.z
            }
        }
    }
}

fn raycast_sphere(radius: Real, ray: &Ray) -> Option<ShapeHit> {
    let origin = ray.point1.coords;
    let direction = ray.point2 - ray.point1;

    // A segment starting inside the sphere reports no hit.
    let c = origin.norm_squared() - radius * radius;
    if c < 0.0 {
        return None;
    }

    let a = direction.norm_squared();
    if a < Real::EPSILON {
        return None;
    }
    let b = origin.dot(&direction);
    let discriminant = b * b - a * c;
    if discriminant < 0.0 {
        return None;
    }

    let t = (-b - discriminant.sqrt()) / a;
    if t < 0.0 || t > ray.max_fraction {
        return None;
    }

    let point = ray.point1 + direction * t;
    Some(ShapeHit {
        fraction: t,
        point,
        normal: point.coords.normalize(),
    })
}

fn raycast_cuboid(half_extents: &Vector3, ray: &Ray) -> Option<ShapeHit> {
    let direction = ray.point2 - ray.point1;
    let mut t_min = Real::NEG_INFINITY;
    let mut t_max = Real::INFINITY;
    let mut entry_axis = usize::MAX;

    for axis in 0..3 {
        let extent = half_extents[axis];
        let o = ray.point1[axis];
        let d = direction[axis];
        if d.abs() < Real::EPSILON {
            if o < -extent || o > extent {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t1 = (-extent - o) * inv;
        let mut t2 = (extent - o) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        if t1 > t_min {
            t_min = t1;
            entry_axis = axis;
        }
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }

    // No entering face: the segment runs inside the box or starts in it.
    if entry_axis == usize::MAX || t_min < 0.0 || t_min > ray.max_fraction {
        return None;
    }

    let mut normal = Vector3::zeros();
    normal[entry_axis] = if direction[entry_axis] > 0.0 { -1.0 } else { 1.0 };

    Some(ShapeHit {
        fraction: t_min,
        point: ray.point1 + direction * t_min,
        normal,
    })
}
