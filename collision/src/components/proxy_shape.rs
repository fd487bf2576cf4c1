//! The proxy-shape component column.

use std::collections::HashMap;
use std::sync::Arc;

use copperfern_core::math::Transform;
use copperfern_ecs::Entity;

use crate::broad_phase::NULL_NODE;
use crate::shape::CollisionShape;

const DEFAULT_CATEGORY_BITS: u16 = 0x0001;
const DEFAULT_MASK_BITS: u16 = 0xffff;

/// Columnar store of per-proxy-shape attributes.
///
/// Rows are dense and partitioned: rows `[0, enabled_count)` are enabled,
/// rows `[enabled_count, len)` are disabled. The per-step bounds refresh
/// walks only the enabled prefix, so disabling a shape removes it from the
/// hot loop without deleting its data. The entity→row map always agrees
/// with the arrays; swap-remove and enable/disable moves patch it.
#[derive(Default)]
pub struct ProxyShapeComponents {
    entities: Vec<Entity>,
    bodies: Vec<Entity>,
    shapes: Vec<Arc<CollisionShape>>,
    local_to_body: Vec<Transform>,
    broad_phase_ids: Vec<i32>,
    category_bits: Vec<u16>,
    mask_bits: Vec<u16>,
    user_data: Vec<usize>,
    rows: HashMap<Entity, usize>,
    enabled_count: usize,
}

impl ProxyShapeComponents {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a proxy-shape row, enabled, not yet indexed by the broad phase.
    pub fn insert(
        &mut self,
        proxy: Entity,
        body: Entity,
        shape: Arc<CollisionShape>,
        local_to_body: Transform,
    ) {
        debug_assert!(!self.rows.contains_key(&proxy));

        let row = self.entities.len();
        self.entities.push(proxy);
        self.bodies.push(body);
        self.shapes.push(shape);
        self.local_to_body.push(local_to_body);
        self.broad_phase_ids.push(NULL_NODE);
        self.category_bits.push(DEFAULT_CATEGORY_BITS);
        self.mask_bits.push(DEFAULT_MASK_BITS);
        self.user_data.push(0);
        self.rows.insert(proxy, row);

        // New rows land in the enabled prefix.
        if self.enabled_count < row {
            self.swap_rows(self.enabled_count, row);
        }
        self.enabled_count += 1;
        debug_assert!(self.enabled_count <= self.entities.len());
    }

    /// Removes a proxy-shape row, preserving the enabled-prefix partition.
    pub fn remove(&mut self, proxy: Entity) {
        let Some(&row) = self.rows.get(&proxy) else {
            debug_assert!(false, "removing unknown proxy shape {proxy}");
            return;
        };

        let last = self.entities.len() - 1;
        if row < self.enabled_count {
            // Fill the hole with the last enabled row, then move the hole
            // to the very end where it can be popped.
            let last_enabled = self.enabled_count - 1;
            self.swap_rows(row, last_enabled);
            self.swap_rows(last_enabled, last);
            self.enabled_count -= 1;
        } else {
            self.swap_rows(row, last);
        }

        self.entities.pop();
        self.bodies.pop();
        self.shapes.pop();
        self.local_to_body.pop();
        self.broad_phase_ids.pop();
        self.category_bits.pop();
        self.mask_bits.pop();
        self.user_data.pop();
        self.rows.remove(&proxy);
        debug_assert!(self.enabled_count <= self.entities.len());
    }

    /// Moves a row across the enabled/disabled boundary.
    pub fn set_enabled(&mut self, proxy: Entity, enabled: bool) {
        let row = self.rows[&proxy];
        if (row < self.enabled_count) == enabled {
            return;
        }
        if enabled {
            self.swap_rows(row, self.enabled_count);
            self.enabled_count += 1;
        } else {
            self.swap_rows(row, self.enabled_count - 1);
            self.enabled_count -= 1;
        }
    }

    /// Whether the proxy's row is inside the enabled prefix.
    pub fn is_enabled(&self, proxy: Entity) -> bool {
        self.rows[&proxy] < self.enabled_count
    }

    /// Whether a row exists for this proxy.
    pub fn contains(&self, proxy: Entity) -> bool {
        self.rows.contains_key(&proxy)
    }

    /// Row index of a proxy, if it has one.
    pub fn row_of(&self, proxy: Entity) -> Option<usize> {
        self.rows.get(&proxy).copied()
    }

    /// Total number of rows.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of enabled rows; they occupy the prefix `[0, enabled_count)`.
    pub fn enabled_count(&self) -> usize {
        self.enabled_count
    }

    // ---- Row-indexed accessors (the per-step sweep) ----

    /// Proxy entity stored at `row`.
    pub fn entity_at(&self, row: usize) -> Entity {
        self.entities[row]
    }

    /// Owning body of the proxy at `row`.
    pub fn body_entity_at(&self, row: usize) -> Entity {
        self.bodies[row]
    }

    /// Broad-phase node id of the proxy at `row` (`NULL_NODE` if unindexed).
    pub fn broad_phase_id_at(&self, row: usize) -> i32 {
        self.broad_phase_ids[row]
    }

    /// Collision shape of the proxy at `row`.
    pub fn shape_at(&self, row: usize) -> &Arc<CollisionShape> {
        &self.shapes[row]
    }

    /// Local-to-body offset of the proxy at `row`.
    pub fn local_to_body_at(&self, row: usize) -> &Transform {
        &self.local_to_body[row]
    }

    // ---- Entity-keyed accessors (the view layer) ----

    /// Owning body of a proxy.
    pub fn body_entity(&self, proxy: Entity) -> Entity {
        self.bodies[self.rows[&proxy]]
    }

    /// Collision shape of a proxy.
    pub fn collision_shape(&self, proxy: Entity) -> &Arc<CollisionShape> {
        &self.shapes[self.rows[&proxy]]
    }

    /// Local-to-body offset of a proxy.
    pub fn local_to_body_transform(&self, proxy: Entity) -> &Transform {
        &self.local_to_body[self.rows[&proxy]]
    }

    /// Replaces the local-to-body offset of a proxy.
    pub fn set_local_to_body_transform(&mut self, proxy: Entity, transform: Transform) {
        let row = self.rows[&proxy];
        self.local_to_body[row] = transform;
    }

    /// Broad-phase node id of a proxy (`NULL_NODE` if unindexed).
    pub fn broad_phase_id(&self, proxy: Entity) -> i32 {
        self.broad_phase_ids[self.rows[&proxy]]
    }

    /// Records the broad-phase node id of a proxy.
    pub fn set_broad_phase_id(&mut self, proxy: Entity, id: i32) {
        let row = self.rows[&proxy];
        self.broad_phase_ids[row] = id;
    }

    /// Collision category bits of a proxy.
    pub fn category_bits(&self, proxy: Entity) -> u16 {
        self.category_bits[self.rows[&proxy]]
    }

    /// Sets the collision category bits of a proxy.
    pub fn set_category_bits(&mut self, proxy: Entity, bits: u16) {
        let row = self.rows[&proxy];
        self.category_bits[row] = bits;
    }

    /// Collide-with mask bits of a proxy.
    pub fn mask_bits(&self, proxy: Entity) -> u16 {
        self.mask_bits[self.rows[&proxy]]
    }

    /// Sets the collide-with mask bits of a proxy.
    pub fn set_mask_bits(&mut self, proxy: Entity, bits: u16) {
        let row = self.rows[&proxy];
        self.mask_bits[row] = bits;
    }

    /// User data attached to a proxy.
    pub fn user_data(&self, proxy: Entity) -> usize {
        self.user_data[self.rows[&proxy]]
    }

    /// Attaches user data to a proxy.
    pub fn set_user_data(&mut self, proxy: Entity, data: usize) {
        let row = self.rows[&proxy];
        self.user_data[row] = data;
    }

    /// Swaps two rows across every column and patches the entity→row map.
    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.entities.swap(a, b);
        self.bodies.swap(a, b);
        self.shapes.swap(a, b);
        self.local_to_body.swap(a, b);
        self.broad_phase_ids.swap(a, b);
        self.category_bits.swap(a, b);
        self.mask_bits.swap(a, b);
        self.user_data.swap(a, b);
        self.rows.insert(self.entities[a], a);
        self.rows.insert(self.entities[b], b);
    }
}
