//! Per-shape facade over the component columns.
//!
//! Engine users do not touch the columns directly; they borrow one of
//! these views from the world for the shape they care about. All state
//! lives in the columns, the view only forwards — and, for the setters
//! that change geometry, notifies the broad phase.

use copperfern_core::aabb::Aabb;
use copperfern_core::math::{Point3, Transform};
use copperfern_ecs::Entity;
use std::sync::Arc;

use crate::broad_phase::BroadPhaseSystem;
use crate::components::{BodyComponents, ProxyShapeComponents, TransformComponents};
use crate::ray::{Ray, RaycastInfo};
use crate::shape::CollisionShape;

/// Read-only view of one proxy shape.
pub struct ProxyShape<'a> {
    pub(crate) entity: Entity,
    pub(crate) proxies: &'a ProxyShapeComponents,
    pub(crate) transforms: &'a TransformComponents,
    pub(crate) bodies: &'a BodyComponents,
}

impl ProxyShape<'_> {
    /// The proxy's entity id.
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// The owning body.
    pub fn body_entity(&self) -> Entity {
        self.proxies.body_entity(self.entity)
    }

    /// The shared collision shape geometry.
    pub fn collision_shape(&self) -> &Arc<CollisionShape> {
        self.proxies.collision_shape(self.entity)
    }

    /// Offset of the shape within its body.
    pub fn local_to_body_transform(&self) -> &Transform {
        self.proxies.local_to_body_transform(self.entity)
    }

    /// Composed shape-to-world transform.
    pub fn local_to_world_transform(&self) -> Transform {
        self.transforms.transform(self.body_entity()) * self.local_to_body_transform()
    }

    /// The shape's bounds in world space, computed fresh from the current
    /// pose (not the fattened bounds stored in the broad phase).
    pub fn world_aabb(&self) -> Aabb {
        self.collision_shape()
            .compute_aabb(&self.local_to_world_transform())
    }

    /// The broad-phase node id, or
    /// [`NULL_NODE`](crate::broad_phase::NULL_NODE) when unindexed.
    pub fn broad_phase_id(&self) -> i32 {
        self.proxies.broad_phase_id(self.entity)
    }

    /// Collision category bits.
    pub fn category_bits(&self) -> u16 {
        self.proxies.category_bits(self.entity)
    }

    /// Collide-with mask bits.
    pub fn mask_bits(&self) -> u16 {
        self.proxies.mask_bits(self.entity)
    }

    /// User data attached to the shape.
    pub fn user_data(&self) -> usize {
        self.proxies.user_data(self.entity)
    }

    /// Whether a world-space point lies inside the shape.
    pub fn test_point_inside(&self, world_point: &Point3) -> bool {
        let local = self.local_to_world_transform().inverse() * world_point;
        self.collision_shape().test_point_inside(&local)
    }

    /// Casts a world-space ray against this one shape.
    ///
    /// Shapes on inactive bodies report a miss. The ray is mapped into the
    /// shape's local space, tested there, and the hit mapped back out.
    pub fn raycast(&self, ray: &Ray) -> Option<RaycastInfo> {
        if !self.bodies.is_active(self.body_entity()) {
            return None;
        }

        let local_to_world = self.local_to_world_transform();
        let world_to_local = local_to_world.inverse();
        let local_ray = Ray::with_max_fraction(
            world_to_local * ray.point1,
            world_to_local * ray.point2,
            ray.max_fraction,
        );

        let hit = self.collision_shape().raycast(&local_ray)?;
        Some(RaycastInfo {
            world_point: local_to_world * hit.point,
            world_normal: (local_to_world.rotation * hit.normal).normalize(),
            hit_fraction: hit.fraction,
            proxy_entity: self.entity,
            body_entity: self.body_entity(),
        })
    }
}

/// Mutable view of one proxy shape.
///
/// Repositioning the shape wakes its body and refreshes the spatial index;
/// the filter-bit setters deliberately touch neither, they only change
/// which queries see the shape.
pub struct ProxyShapeMut<'a> {
    pub(crate) entity: Entity,
    pub(crate) proxies: &'a mut ProxyShapeComponents,
    pub(crate) transforms: &'a TransformComponents,
    pub(crate) bodies: &'a mut BodyComponents,
    pub(crate) broad_phase: &'a mut BroadPhaseSystem,
}

impl ProxyShapeMut<'_> {
    /// Read-only view of the same shape.
    pub fn as_ref(&self) -> ProxyShape<'_> {
        ProxyShape {
            entity: self.entity,
            proxies: self.proxies,
            transforms: self.transforms,
            bodies: self.bodies,
        }
    }

    /// Moves the shape within its body: wakes the body and refreshes the
    /// shape's broad-phase bounds.
    pub fn set_local_to_body_transform(&mut self, transform: Transform) {
        self.proxies
            .set_local_to_body_transform(self.entity, transform);

        let body = self.proxies.body_entity(self.entity);
        self.bodies.set_sleeping(body, false);
        self.broad_phase
            .update_proxy_shape(self.proxies, self.transforms, self.entity);
        log::debug!("proxy shape {}: local-to-body transform set", self.entity);
    }

    /// Sets the collision category bits. Filter state only; the spatial
    /// index and the body's sleep state are untouched.
    pub fn set_category_bits(&mut self, bits: u16) {
        self.proxies.set_category_bits(self.entity, bits);
        log::debug!("proxy shape {}: category bits set to {bits:#06x}", self.entity);
    }

    /// Sets the collide-with mask bits. Filter state only.
    pub fn set_mask_bits(&mut self, bits: u16) {
        self.proxies.set_mask_bits(self.entity, bits);
        log::debug!("proxy shape {}: mask bits set to {bits:#06x}", self.entity);
    }

    /// Attaches user data to the shape.
    pub fn set_user_data(&mut self, data: usize) {
        self.proxies.set_user_data(self.entity, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BroadPhaseConfig;
    use copperfern_core::math::{
        rotation_z, transform_from_parts, transform_from_translation, Real, Vector3,
    };
    use copperfern_ecs::EntityAllocator;

    const PI: Real = std::f64::consts::PI as Real;

    struct Fixture {
        transforms: TransformComponents,
        bodies: BodyComponents,
        proxies: ProxyShapeComponents,
        broad_phase: BroadPhaseSystem,
        body: Entity,
        proxy: Entity,
    }

    impl Fixture {
        /// One sphere of radius 1 on a body at (5, 0, 0), shape offset
        /// (0, 1, 0) inside the body.
        fn new() -> Self {
            let mut alloc = EntityAllocator::new();
            let mut transforms = TransformComponents::new();
            let mut bodies = BodyComponents::new();
            let mut proxies = ProxyShapeComponents::new();
            let mut broad_phase = BroadPhaseSystem::new(&BroadPhaseConfig::default());

            let body = alloc.allocate();
            transforms.insert(body, transform_from_translation(Vector3::new(5.0, 0.0, 0.0)));
            bodies.insert(body);

            let proxy = alloc.allocate();
            proxies.insert(
                proxy,
                body,
                Arc::new(CollisionShape::sphere(1.0)),
                transform_from_translation(Vector3::new(0.0, 1.0, 0.0)),
            );
            let aabb = proxies.collision_shape(proxy).compute_aabb(
                &(transforms.transform(body) * proxies.local_to_body_transform(proxy)),
            );
            broad_phase.add_proxy_shape(&mut proxies, proxy, &aabb);

            Self {
                transforms,
                bodies,
                proxies,
                broad_phase,
                body,
                proxy,
            }
        }

        fn view(&self) -> ProxyShape<'_> {
            ProxyShape {
                entity: self.proxy,
                proxies: &self.proxies,
                transforms: &self.transforms,
                bodies: &self.bodies,
            }
        }

        fn view_mut(&mut self) -> ProxyShapeMut<'_> {
            ProxyShapeMut {
                entity: self.proxy,
                proxies: &mut self.proxies,
                transforms: &self.transforms,
                bodies: &mut self.bodies,
                broad_phase: &mut self.broad_phase,
            }
        }
    }

    #[test]
    fn world_aabb_composes_body_and_local_offsets() {
        let fx = Fixture::new();
        let aabb = fx.view().world_aabb();
        assert_eq!(aabb.min, Point3::new(4.0, 0.0, -1.0));
        assert_eq!(aabb.max, Point3::new(6.0, 2.0, 1.0));
    }

    #[test]
    fn raycast_maps_hit_back_to_world_space() {
        let fx = Fixture::new();
        // Horizontal ray at the sphere's center height.
        let ray = Ray::new(Point3::new(0.0, 1.0, 0.0), Point3::new(10.0, 1.0, 0.0));
        let info = fx.view().raycast(&ray).unwrap();

        assert!((info.world_point - Point3::new(4.0, 1.0, 0.0)).norm() < 1e-6);
        assert!((info.world_normal - Vector3::new(-1.0, 0.0, 0.0)).norm() < 1e-6);
        assert!((info.hit_fraction - 0.4).abs() < 1e-6);
        assert_eq!(info.proxy_entity, fx.proxy);
        assert_eq!(info.body_entity, fx.body);
    }

    #[test]
    fn raycast_under_rotated_body_renormalizes_normal() {
        let mut fx = Fixture::new();
        fx.transforms.set_transform(
            fx.body,
            transform_from_parts(Vector3::new(5.0, 0.0, 0.0), rotation_z(PI / 3.0)),
        );

        let ray = Ray::new(Point3::new(-10.0, 0.0, 0.0), Point3::new(20.0, 0.0, 0.0));
        if let Some(info) = fx.view().raycast(&ray) {
            assert!((info.world_normal.norm() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn inactive_body_is_invisible_to_rays() {
        let mut fx = Fixture::new();
        fx.bodies.set_active(fx.body, false);
        let ray = Ray::new(Point3::new(0.0, 1.0, 0.0), Point3::new(10.0, 1.0, 0.0));
        assert!(fx.view().raycast(&ray).is_none());
    }

    #[test]
    fn point_inside_uses_world_coordinates() {
        let fx = Fixture::new();
        assert!(fx.view().test_point_inside(&Point3::new(5.0, 1.2, 0.0)));
        assert!(!fx.view().test_point_inside(&Point3::new(5.0, 3.0, 0.0)));
    }

    #[test]
    fn moving_the_shape_wakes_the_body() {
        let mut fx = Fixture::new();
        fx.bodies.set_sleeping(fx.body, true);

        fx.view_mut()
            .set_local_to_body_transform(transform_from_translation(Vector3::new(0.0, 2.0, 0.0)));

        assert!(!fx.bodies.is_sleeping(fx.body));
        let aabb = fx.view().world_aabb();
        assert_eq!(aabb.max.y, 3.0);
    }

    #[test]
    fn filter_setters_do_not_wake_the_body() {
        let mut fx = Fixture::new();
        fx.bodies.set_sleeping(fx.body, true);

        {
            let mut view = fx.view_mut();
            view.set_category_bits(0x0008);
            view.set_mask_bits(0x00f0);
            view.set_user_data(42);
        }

        assert!(fx.bodies.is_sleeping(fx.body));
        let view = fx.view();
        assert_eq!(view.category_bits(), 0x0008);
        assert_eq!(view.mask_bits(), 0x00f0);
        assert_eq!(view.user_data(), 42);
    }

    #[test]
    fn big_shape_move_reenters_moved_set() {
        let mut fx = Fixture::new();
        // Drain the creation-time mark.
        let proxies = &fx.proxies;
        fx.broad_phase
            .compute_overlapping_pairs(proxies, &mut |_: Entity, _: Entity| {});

        fx.view_mut()
            .set_local_to_body_transform(transform_from_translation(Vector3::new(3.0, 0.0, 0.0)));

        // The leaf was re-inserted, so its stored bounds follow the shape.
        let node = fx.proxies.broad_phase_id(fx.proxy);
        assert!(fx
            .broad_phase
            .fat_aabb(node)
            .contains(&fx.view().world_aabb()));
    }
}
