//! The collision world: owner of the columns and the broad phase.

use std::sync::Arc;

use copperfern_core::aabb::Aabb;
use copperfern_core::math::{Point3, Real, Transform};
use copperfern_ecs::{Entity, EntityAllocator};

use crate::broad_phase::{BroadPhaseSystem, OverlapHandler};
use crate::components::{BodyComponents, ProxyShapeComponents, TransformComponents};
use crate::config::BroadPhaseConfig;
use crate::proxy_shape::{ProxyShape, ProxyShapeMut};
use crate::ray::{Ray, RaycastInfo, RaycastTest};
use crate::shape::CollisionShape;

/// Owns the entity allocator, the component columns, and the broad phase,
/// and wires them together for the rest of the engine.
///
/// A simulation step against this world is:
///
/// 1. move bodies ([`set_body_transform`](Self::set_body_transform)) and
///    shapes (through [`proxy_shape_mut`](Self::proxy_shape_mut));
/// 2. call [`update`](Self::update) with the narrow phase's pair handler.
///
/// The handler receives each unique overlapping pair of shapes on
/// different bodies, in a deterministic order.
pub struct CollisionWorld {
    entities: EntityAllocator,
    transforms: TransformComponents,
    bodies: BodyComponents,
    proxies: ProxyShapeComponents,
    broad_phase: BroadPhaseSystem,
}

impl CollisionWorld {
    /// Creates a world with default tuning.
    pub fn new() -> Self {
        Self::with_config(BroadPhaseConfig::default())
    }

    /// Creates a world with explicit broad-phase tuning.
    pub fn with_config(config: BroadPhaseConfig) -> Self {
        Self {
            entities: EntityAllocator::new(),
            transforms: TransformComponents::new(),
            bodies: BodyComponents::new(),
            proxies: ProxyShapeComponents::new(),
            broad_phase: BroadPhaseSystem::new(&config),
        }
    }

    // ---- Body lifecycle ----

    /// Creates a body at the given world pose, active and awake.
    pub fn create_body(&mut self, transform: Transform) -> Entity {
        let body = self.entities.allocate();
        self.transforms.insert(body, transform);
        self.bodies.insert(body);
        log::debug!("body {body} created");
        body
    }

    /// Destroys a body together with all of its proxy shapes.
    pub fn destroy_body(&mut self, body: Entity) {
        for proxy in self.proxies_of(body) {
            self.destroy_proxy_shape(proxy);
        }
        self.transforms.remove(body);
        self.bodies.remove(body);
        self.entities.deallocate(body);
        log::debug!("body {body} destroyed");
    }

    /// The body's current world transform.
    pub fn body_transform(&self, body: Entity) -> &Transform {
        self.transforms.transform(body)
    }

    /// Moves a body: wakes it and refreshes the broad-phase bounds of its
    /// shapes.
    pub fn set_body_transform(&mut self, body: Entity, transform: Transform) {
        self.transforms.set_transform(body, transform);
        self.bodies.set_sleeping(body, false);
        for proxy in self.proxies_of(body) {
            self.broad_phase
                .update_proxy_shape(&self.proxies, &self.transforms, proxy);
        }
    }

    /// Activates or deactivates a body. Deactivating pulls its shapes out
    /// of the broad phase (and the enabled prefix); activating puts them
    /// back under their current pose.
    pub fn set_body_active(&mut self, body: Entity, active: bool) {
        if self.bodies.is_active(body) == active {
            return;
        }
        self.bodies.set_active(body, active);

        for proxy in self.proxies_of(body) {
            if active {
                self.proxies.set_enabled(proxy, true);
                let aabb = self.world_aabb_of(proxy);
                self.broad_phase
                    .add_proxy_shape(&mut self.proxies, proxy, &aabb);
            } else {
                self.broad_phase
                    .remove_proxy_shape(&mut self.proxies, proxy);
                self.proxies.set_enabled(proxy, false);
            }
        }
    }

    /// Whether the body is currently active.
    pub fn is_body_active(&self, body: Entity) -> bool {
        self.bodies.is_active(body)
    }

    /// Whether the body is currently asleep.
    pub fn is_body_sleeping(&self, body: Entity) -> bool {
        self.bodies.is_sleeping(body)
    }

    /// Marks a body asleep or awake.
    pub fn set_body_sleeping(&mut self, body: Entity, sleeping: bool) {
        self.bodies.set_sleeping(body, sleeping);
    }

    // ---- Proxy-shape lifecycle ----

    /// Attaches a collision shape to a body at the given offset and indexes
    /// it in the broad phase. Returns the proxy's entity id.
    pub fn create_proxy_shape(
        &mut self,
        body: Entity,
        shape: Arc<CollisionShape>,
        local_to_body: Transform,
    ) -> Entity {
        debug_assert!(self.entities.is_alive(body));

        let proxy = self.entities.allocate();
        self.proxies.insert(proxy, body, shape, local_to_body);
        let aabb = self.world_aabb_of(proxy);
        self.broad_phase
            .add_proxy_shape(&mut self.proxies, proxy, &aabb);
        proxy
    }

    /// Detaches and destroys a proxy shape.
    pub fn destroy_proxy_shape(&mut self, proxy: Entity) {
        if self.proxies.broad_phase_id(proxy) != crate::broad_phase::NULL_NODE {
            self.broad_phase
                .remove_proxy_shape(&mut self.proxies, proxy);
        }
        self.proxies.remove(proxy);
        self.entities.deallocate(proxy);
    }

    /// Read-only view of a proxy shape.
    pub fn proxy_shape(&self, proxy: Entity) -> Option<ProxyShape<'_>> {
        self.proxies.contains(proxy).then(|| ProxyShape {
            entity: proxy,
            proxies: &self.proxies,
            transforms: &self.transforms,
            bodies: &self.bodies,
        })
    }

    /// Mutable view of a proxy shape.
    pub fn proxy_shape_mut(&mut self, proxy: Entity) -> Option<ProxyShapeMut<'_>> {
        self.proxies.contains(proxy).then(|| ProxyShapeMut {
            entity: proxy,
            proxies: &mut self.proxies,
            transforms: &self.transforms,
            bodies: &mut self.bodies,
            broad_phase: &mut self.broad_phase,
        })
    }

    // ---- Stepping & queries ----

    /// Runs one broad-phase step: refreshes every enabled shape's bounds,
    /// then streams the unique overlapping pairs into `handler`.
    pub fn update(&mut self, handler: &mut impl OverlapHandler) {
        self.broad_phase
            .update_proxy_shapes(&self.proxies, &self.transforms);
        self.broad_phase
            .compute_overlapping_pairs(&self.proxies, handler);
    }

    /// Whether the stored broad-phase bounds of two shapes overlap.
    pub fn test_overlapping_shapes(&self, shape1: Entity, shape2: Entity) -> bool {
        self.broad_phase
            .test_overlapping_shapes(&self.proxies, shape1, shape2)
    }

    /// Whether a world-space point is inside the given shape.
    pub fn test_point_inside(&self, proxy: Entity, world_point: &Point3) -> bool {
        self.proxy_shape(proxy)
            .is_some_and(|view| view.test_point_inside(world_point))
    }

    /// Closest hit of a world-space ray against every shape.
    pub fn raycast(&self, ray: &Ray) -> Option<RaycastInfo> {
        self.raycast_with_mask(ray, u16::MAX)
    }

    /// Closest hit of a world-space ray against shapes whose category bits
    /// intersect `category_mask`.
    pub fn raycast_with_mask(&self, ray: &Ray, category_mask: u16) -> Option<RaycastInfo> {
        let mut closest = ClosestHit {
            proxies: &self.proxies,
            transforms: &self.transforms,
            bodies: &self.bodies,
            best: None,
        };
        self.broad_phase
            .raycast(&self.proxies, ray, &mut closest, category_mask);
        closest.best
    }

    // ---- Internals ----

    /// Proxy entities attached to `body`.
    fn proxies_of(&self, body: Entity) -> Vec<Entity> {
        (0..self.proxies.len())
            .filter(|&row| self.proxies.body_entity_at(row) == body)
            .map(|row| self.proxies.entity_at(row))
            .collect()
    }

    fn world_aabb_of(&self, proxy: Entity) -> Aabb {
        let world = self.transforms.transform(self.proxies.body_entity(proxy))
            * self.proxies.local_to_body_transform(proxy);
        self.proxies.collision_shape(proxy).compute_aabb(&world)
    }
}

impl Default for CollisionWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the nearest [`RaycastInfo`] seen so far and clips the ray to it.
struct ClosestHit<'a> {
    proxies: &'a ProxyShapeComponents,
    transforms: &'a TransformComponents,
    bodies: &'a BodyComponents,
    best: Option<RaycastInfo>,
}

impl RaycastTest for ClosestHit<'_> {
    fn raycast_against_shape(&mut self, proxy: Entity, ray: &Ray) -> Real {
        let view = ProxyShape {
            entity: proxy,
            proxies: self.proxies,
            transforms: self.transforms,
            bodies: self.bodies,
        };
        match view.raycast(ray) {
            Some(info) => {
                let fraction = info.hit_fraction;
                self.best = Some(info);
                fraction
            }
            None => -1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copperfern_core::math::{transform_from_translation, Vector3};

    fn sphere(radius: Real) -> Arc<CollisionShape> {
        Arc::new(CollisionShape::sphere(radius))
    }

    fn body_with_sphere(world: &mut CollisionWorld, x: Real) -> (Entity, Entity) {
        let body = world.create_body(transform_from_translation(Vector3::new(x, 0.0, 0.0)));
        let proxy = world.create_proxy_shape(body, sphere(1.0), Transform::identity());
        (body, proxy)
    }

    #[test]
    fn freshly_created_overlapping_shapes_pair_up() {
        let mut world = CollisionWorld::new();
        let (_b0, s0) = body_with_sphere(&mut world, 0.0);
        let (_b1, s1) = body_with_sphere(&mut world, 1.5);
        let (_b2, _s2) = body_with_sphere(&mut world, 10.0);

        let mut pairs = Vec::new();
        world.update(&mut |a: Entity, b: Entity| pairs.push((a, b)));

        assert_eq!(pairs.len(), 1);
        let (a, b) = pairs[0];
        assert!((a == s0 && b == s1) || (a == s1 && b == s0));
    }

    #[test]
    fn destroying_a_body_removes_its_shapes_from_the_stream() {
        let mut world = CollisionWorld::new();
        let (b0, _s0) = body_with_sphere(&mut world, 0.0);
        let (_b1, _s1) = body_with_sphere(&mut world, 1.5);

        world.destroy_body(b0);

        let mut pairs = Vec::new();
        world.update(&mut |a: Entity, b: Entity| pairs.push((a, b)));
        assert!(pairs.is_empty());
    }

    #[test]
    fn moving_a_body_wakes_it_and_updates_pairs() {
        let mut world = CollisionWorld::new();
        let (b0, s0) = body_with_sphere(&mut world, 0.0);
        let (_b1, s1) = body_with_sphere(&mut world, 10.0);
        world.update(&mut |_: Entity, _: Entity| {});

        world.set_body_sleeping(b0, true);
        world.set_body_transform(b0, transform_from_translation(Vector3::new(9.0, 0.0, 0.0)));
        assert!(!world.is_body_sleeping(b0));

        let mut pairs = Vec::new();
        world.update(&mut |a: Entity, b: Entity| pairs.push((a, b)));
        assert_eq!(pairs.len(), 1);
        let (a, b) = pairs[0];
        assert!((a == s0 && b == s1) || (a == s1 && b == s0));
    }

    #[test]
    fn deactivated_body_drops_out_and_comes_back() {
        let mut world = CollisionWorld::new();
        let (b0, s0) = body_with_sphere(&mut world, 0.0);
        let (_b1, s1) = body_with_sphere(&mut world, 1.5);

        world.set_body_active(b0, false);
        assert!(!world.test_overlapping_shapes(s0, s1));
        let mut pairs = Vec::new();
        world.update(&mut |a: Entity, b: Entity| pairs.push((a, b)));
        assert!(pairs.is_empty());

        world.set_body_active(b0, true);
        pairs.clear();
        world.update(&mut |a: Entity, b: Entity| pairs.push((a, b)));
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn raycast_returns_the_closest_shape() {
        let mut world = CollisionWorld::new();
        let (_b0, s0) = body_with_sphere(&mut world, 3.0);
        let (_b1, _s1) = body_with_sphere(&mut world, 8.0);

        let ray = Ray::new(Point3::new(-10.0, 0.0, 0.0), Point3::new(20.0, 0.0, 0.0));
        let info = world.raycast(&ray).unwrap();
        assert_eq!(info.proxy_entity, s0);
        assert!((info.world_point.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn raycast_mask_skips_filtered_categories() {
        let mut world = CollisionWorld::new();
        let (_b0, s0) = body_with_sphere(&mut world, 3.0);
        let (_b1, s1) = body_with_sphere(&mut world, 8.0);
        world.proxy_shape_mut(s0).unwrap().set_category_bits(0x0001);
        world.proxy_shape_mut(s1).unwrap().set_category_bits(0x0002);

        let ray = Ray::new(Point3::new(-10.0, 0.0, 0.0), Point3::new(20.0, 0.0, 0.0));
        let info = world.raycast_with_mask(&ray, 0x0002).unwrap();
        assert_eq!(info.proxy_entity, s1);
        assert!(world.raycast_with_mask(&ray, 0x0004).is_none());
    }

    #[test]
    fn stale_proxy_views_are_refused() {
        let mut world = CollisionWorld::new();
        let (_b0, s0) = body_with_sphere(&mut world, 0.0);
        world.destroy_proxy_shape(s0);
        assert!(world.proxy_shape(s0).is_none());
        assert!(world.proxy_shape_mut(s0).is_none());
    }
}
