//! The broad-phase stage: cheap filtering of candidate colliding pairs.
//!
//! [`BroadPhaseSystem`] owns the spatial index ([`DynamicAabbTree`]) plus
//! the per-step scratch state, and leans on the component columns that are
//! passed into each operation. It never stores references to them; the
//! columns are owned by the world above (see
//! [`CollisionWorld`](crate::CollisionWorld)).

mod dynamic_tree;

pub use dynamic_tree::{DynamicAabbTree, NULL_NODE};

use copperfern_core::aabb::Aabb;
use copperfern_core::math::Vector3;
use copperfern_core::profile_scope;
use copperfern_ecs::Entity;
use fixedbitset::FixedBitSet;

use crate::components::{ProxyShapeComponents, TransformComponents};
use crate::config::BroadPhaseConfig;
use crate::ray::{Ray, RaycastTest};

/// Narrow-phase seam: receives each unique overlapping shape pair, in
/// canonical order, once per step.
pub trait OverlapHandler {
    /// Called for every pair of proxy shapes whose bounds overlap and whose
    /// owning bodies differ.
    fn notify_overlapping_pair(&mut self, shape1: Entity, shape2: Entity);
}

impl<F: FnMut(Entity, Entity)> OverlapHandler for F {
    fn notify_overlapping_pair(&mut self, shape1: Entity, shape2: Entity) {
        self(shape1, shape2)
    }
}

/// An unordered pair of tree leaves, stored canonically with the smaller
/// node id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct BroadPhasePair {
    shape1_id: i32,
    shape2_id: i32,
}

impl BroadPhasePair {
    fn new(a: i32, b: i32) -> Self {
        Self {
            shape1_id: a.min(b),
            shape2_id: a.max(b),
        }
    }
}

/// Tracks which shapes moved and turns the spatial index into a
/// deduplicated stream of potentially overlapping shape pairs.
///
/// Within one simulation step the expected call order is: any number of
/// add/remove/update operations, then one
/// [`compute_overlapping_pairs`](Self::compute_overlapping_pairs). Pairs
/// come out sorted by canonical `(min, max)` node id, so the narrow phase
/// sees a deterministic stream. Scratch buffers keep their capacity from
/// step to step.
pub struct BroadPhaseSystem {
    tree: DynamicAabbTree<Entity>,
    /// Leaves whose tight bounds changed since the last sweep, in insertion
    /// order. Removed shapes leave a `NULL_NODE` tombstone.
    moved_shapes: Vec<i32>,
    /// Which node ids currently sit in `moved_shapes`; keeps insertion
    /// idempotent without disturbing the order.
    moved_membership: FixedBitSet,
    /// Candidate pairs gathered during a sweep; cleared, not shrunk.
    potential_pairs: Vec<BroadPhasePair>,
    /// Per-moved-shape query results; cleared, not shrunk.
    overlapping_nodes: Vec<i32>,
}

impl BroadPhaseSystem {
    /// Creates a broad phase configured by `config`.
    pub fn new(config: &BroadPhaseConfig) -> Self {
        Self {
            tree: DynamicAabbTree::new(config),
            moved_shapes: Vec::new(),
            moved_membership: FixedBitSet::new(),
            potential_pairs: Vec::new(),
            overlapping_nodes: Vec::new(),
        }
    }

    /// Indexes a proxy shape under its initial world bounds and marks it
    /// moved so the next sweep sees it.
    pub fn add_proxy_shape(
        &mut self,
        proxies: &mut ProxyShapeComponents,
        proxy: Entity,
        aabb: &Aabb,
    ) {
        debug_assert_eq!(proxies.broad_phase_id(proxy), NULL_NODE);

        let node_id = self.tree.add_object(aabb, proxy);
        proxies.set_broad_phase_id(proxy, node_id);
        self.add_moved_shape(node_id);
        log::debug!("proxy shape {proxy} indexed as broad-phase node {node_id}");
    }

    /// Unindexes a proxy shape and forgets any pending moved mark.
    pub fn remove_proxy_shape(&mut self, proxies: &mut ProxyShapeComponents, proxy: Entity) {
        let node_id = proxies.broad_phase_id(proxy);
        debug_assert_ne!(node_id, NULL_NODE);

        proxies.set_broad_phase_id(proxy, NULL_NODE);
        self.tree.remove_object(node_id);
        self.remove_moved_shape(node_id);
        log::debug!("proxy shape {proxy} left the broad phase (node {node_id})");
    }

    /// Recomputes one proxy shape's world bounds and refreshes its leaf.
    pub fn update_proxy_shape(
        &mut self,
        proxies: &ProxyShapeComponents,
        transforms: &TransformComponents,
        proxy: Entity,
    ) {
        let Some(row) = proxies.row_of(proxy) else {
            debug_assert!(false, "updating unknown proxy shape {proxy}");
            return;
        };
        self.update_rows(proxies, transforms, row, row + 1, |_| Vector3::zeros());
    }

    /// Recomputes world bounds for every enabled proxy shape. Shapes whose
    /// leaves had to be re-inserted join the moved set.
    pub fn update_proxy_shapes(
        &mut self,
        proxies: &ProxyShapeComponents,
        transforms: &TransformComponents,
    ) {
        profile_scope!("BroadPhaseSystem::update_proxy_shapes");
        self.update_rows(proxies, transforms, 0, proxies.enabled_count(), |_| {
            Vector3::zeros()
        });
    }

    /// Like [`update_proxy_shapes`](Self::update_proxy_shapes), with a
    /// per-body displacement supplied by the caller (typically
    /// `dt * linear_velocity`). Only has an effect beyond the plain update
    /// when the configuration enables displacement prediction.
    pub fn update_proxy_shapes_with(
        &mut self,
        proxies: &ProxyShapeComponents,
        transforms: &TransformComponents,
        displacement_of: impl Fn(Entity) -> Vector3,
    ) {
        profile_scope!("BroadPhaseSystem::update_proxy_shapes");
        self.update_rows(proxies, transforms, 0, proxies.enabled_count(), displacement_of);
    }

    fn update_rows(
        &mut self,
        proxies: &ProxyShapeComponents,
        transforms: &TransformComponents,
        start: usize,
        end: usize,
        displacement_of: impl Fn(Entity) -> Vector3,
    ) {
        debug_assert!(start <= end && end <= proxies.len());

        // Disabled rows live past the prefix and are never refreshed.
        let start = start.min(proxies.enabled_count());
        let end = end.min(proxies.enabled_count());

        for row in start..end {
            let node_id = proxies.broad_phase_id_at(row);
            if node_id == NULL_NODE {
                continue;
            }

            let body = proxies.body_entity_at(row);
            let world_transform = transforms.transform(body) * proxies.local_to_body_at(row);
            let aabb = proxies.shape_at(row).compute_aabb(&world_transform);
            let displacement = displacement_of(body);

            if self.tree.update_object(node_id, &aabb, &displacement) {
                self.add_moved_shape(node_id);
            }
        }
    }

    /// Whether the stored bounds of two indexed shapes overlap. Unindexed
    /// shapes overlap nothing.
    pub fn test_overlapping_shapes(
        &self,
        proxies: &ProxyShapeComponents,
        shape1: Entity,
        shape2: Entity,
    ) -> bool {
        let id1 = proxies.broad_phase_id(shape1);
        let id2 = proxies.broad_phase_id(shape2);
        if id1 == NULL_NODE || id2 == NULL_NODE {
            return false;
        }
        self.tree.fat_aabb(id1).overlaps(self.tree.fat_aabb(id2))
    }

    /// Casts a ray through the index, forwarding each candidate shape whose
    /// category bits intersect `category_mask` to `raycast_test`. The
    /// fraction it returns clips the ray exactly like the tree callback
    /// contract.
    pub fn raycast(
        &self,
        proxies: &ProxyShapeComponents,
        ray: &Ray,
        raycast_test: &mut impl RaycastTest,
        category_mask: u16,
    ) {
        profile_scope!("BroadPhaseSystem::raycast");
        self.tree.raycast(ray, |node_id, current_ray| {
            let proxy = *self.tree.payload(node_id);
            if proxies.category_bits(proxy) & category_mask != 0 {
                raycast_test.raycast_against_shape(proxy, current_ray)
            } else {
                -1.0
            }
        });
    }

    /// Sweeps the moved set, emitting every unique overlapping pair whose
    /// shapes belong to different bodies, then clears the moved set.
    pub fn compute_overlapping_pairs(
        &mut self,
        proxies: &ProxyShapeComponents,
        handler: &mut impl OverlapHandler,
    ) {
        profile_scope!("BroadPhaseSystem::compute_overlapping_pairs");
        self.potential_pairs.clear();

        for i in 0..self.moved_shapes.len() {
            let moved_id = self.moved_shapes[i];
            if moved_id == NULL_NODE {
                continue;
            }

            // Collect every leaf overlapping the moved leaf's stored bounds.
            self.overlapping_nodes.clear();
            let query = *self.tree.fat_aabb(moved_id);
            self.tree
                .report_overlaps(&query, |id| self.overlapping_nodes.push(id));

            for &other_id in &self.overlapping_nodes {
                if other_id != moved_id {
                    self.potential_pairs
                        .push(BroadPhasePair::new(moved_id, other_id));
                }
            }
        }

        self.moved_shapes.clear();
        self.moved_membership.clear();

        // Canonical order, then a forward walk that collapses runs of the
        // same pair into one notification.
        self.potential_pairs.sort_unstable();

        let mut i = 0;
        while i < self.potential_pairs.len() {
            let pair = self.potential_pairs[i];
            i += 1;
            debug_assert_ne!(pair.shape1_id, pair.shape2_id);

            let shape1 = *self.tree.payload(pair.shape1_id);
            let shape2 = *self.tree.payload(pair.shape2_id);
            if proxies.body_entity(shape1) != proxies.body_entity(shape2) {
                handler.notify_overlapping_pair(shape1, shape2);
            }

            while i < self.potential_pairs.len() && self.potential_pairs[i] == pair {
                i += 1;
            }
        }
    }

    /// World-bounds accessor for an indexed shape.
    pub fn fat_aabb(&self, node_id: i32) -> &Aabb {
        self.tree.fat_aabb(node_id)
    }

    /// Marks a leaf as moved. Idempotent: a leaf already in the set keeps
    /// its original position.
    fn add_moved_shape(&mut self, node_id: i32) {
        let index = node_id as usize;
        if self.moved_membership.len() <= index {
            self.moved_membership.grow(index + 1);
        }
        if !self.moved_membership.contains(index) {
            self.moved_membership.insert(index);
            self.moved_shapes.push(node_id);
        }
    }

    /// Drops a leaf from the moved set, leaving a tombstone so the sweep's
    /// insertion order is untouched.
    fn remove_moved_shape(&mut self, node_id: i32) {
        let index = node_id as usize;
        if self.moved_membership.len() <= index || !self.moved_membership.contains(index) {
            return;
        }
        self.moved_membership.set(index, false);
        if let Some(slot) = self.moved_shapes.iter().position(|&id| id == node_id) {
            self.moved_shapes[slot] = NULL_NODE;
        }
    }

    #[cfg(test)]
    fn moved_shape_ids(&self) -> &[i32] {
        &self.moved_shapes
    }
}
